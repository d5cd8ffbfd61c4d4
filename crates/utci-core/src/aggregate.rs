//! Batch statistics and ranking.
//!
//! Normalization and the shade threshold are relative to the whole batch,
//! so routes are always aggregated together.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::SampledRoute;

/// Percentile of the batch value range below which a point counts as shaded.
pub const DEFAULT_SHADE_PERCENTILE: f64 = 90.0;

/// Means closer than this share a rank, and a mean range narrower than
/// this normalizes every route to 0.
pub const TIE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values.into_iter().fold(None, |acc, v| {
            Some(match acc {
                None => ValueRange { min: v, max: v },
                Some(r) => ValueRange {
                    min: r.min.min(v),
                    max: r.max.max(v),
                },
            })
        })
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStats {
    pub route_id: usize,
    pub point_count: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// 0 for the coolest route, 100 for the warmest.
    pub normalized_score: Option<f64>,
    pub shade_percentage: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    /// One entry per input route, in input order.
    pub routes: Vec<RouteStats>,
    pub shade_threshold: Option<f64>,
    /// Range over every point of every route.
    pub overall: Option<ValueRange>,
    /// Range of the per-route means.
    pub mean_range: Option<ValueRange>,
}

impl BatchStats {
    pub fn route(&self, route_id: usize) -> Option<&RouteStats> {
        self.routes.iter().find(|r| r.route_id == route_id)
    }
}

/// Score a batch of sampled routes.
pub fn aggregate(routes: &[SampledRoute], shade_percentile: f64) -> BatchStats {
    let overall = ValueRange::of(routes.iter().flat_map(|r| r.values.iter().copied()));
    let shade_threshold = overall.map(|r| r.min + r.span() * shade_percentile / 100.0);

    let mut stats: Vec<RouteStats> = routes
        .iter()
        .map(|route| {
            let n = route.values.len();
            let range = ValueRange::of(route.values.iter().copied());
            let mean = (n > 0).then(|| route.values.iter().sum::<f64>() / n as f64);
            let shaded = match shade_threshold {
                Some(t) if n > 0 => route.values.iter().filter(|v| **v < t).count(),
                _ => 0,
            };
            RouteStats {
                route_id: route.route_id,
                point_count: n,
                mean,
                min: range.map(|r| r.min),
                max: range.map(|r| r.max),
                normalized_score: None,
                shade_percentage: if n > 0 {
                    100.0 * shaded as f64 / n as f64
                } else {
                    0.0
                },
                rank: 0,
            }
        })
        .collect();

    let mean_range = ValueRange::of(stats.iter().filter_map(|s| s.mean));
    if let Some(range) = mean_range {
        let span = range.span();
        for s in &mut stats {
            s.normalized_score = s.mean.map(|mean| {
                if span.abs() <= TIE_EPSILON {
                    0.0
                } else {
                    (mean - range.min) / span * 100.0
                }
            });
        }
    }

    assign_ranks(&mut stats);

    BatchStats {
        routes: stats,
        shade_threshold,
        overall,
        mean_range,
    }
}

/// Ascending by mean; ties keep the rank of their sorted predecessor.
/// Routes without a mean sort last.
fn assign_ranks(stats: &mut [RouteStats]) {
    let mut order: Vec<usize> = (0..stats.len()).collect();
    order.sort_by(|&a, &b| compare_means(stats[a].mean, stats[b].mean));

    let mut previous: Option<(Option<f64>, usize)> = None;
    for (position, &index) in order.iter().enumerate() {
        let mean = stats[index].mean;
        let rank = match previous {
            Some((prev_mean, prev_rank)) if tied(prev_mean, mean) => prev_rank,
            _ => position,
        };
        stats[index].rank = rank;
        previous = Some((mean, rank));
    }
}

fn compare_means(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn tied(previous: Option<f64>, current: Option<f64>) -> bool {
    match (previous, current) {
        (Some(p), Some(c)) => c <= p + TIE_EPSILON,
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;

    fn sampled(route_id: usize, values: &[f64]) -> SampledRoute {
        SampledRoute {
            route_id,
            points: vec![GeoPoint::new(30.0, -97.0); values.len()],
            projected: vec![Default::default(); values.len()],
            values: values.to_vec(),
        }
    }

    fn ranks(stats: &BatchStats) -> Vec<usize> {
        stats.routes.iter().map(|r| r.rank).collect()
    }

    #[test]
    fn per_route_reductions() {
        let stats = aggregate(&[sampled(0, &[1.0, 2.0, 6.0])], 90.0);
        let r = &stats.routes[0];
        assert_eq!(r.point_count, 3);
        assert_eq!(r.mean, Some(3.0));
        assert_eq!(r.min, Some(1.0));
        assert_eq!(r.max, Some(6.0));
    }

    #[test]
    fn tied_means_share_the_later_rank() {
        let batch = [
            sampled(0, &[5.0]),
            sampled(1, &[5.0]),
            sampled(2, &[3.0]),
        ];
        assert_eq!(ranks(&aggregate(&batch, 90.0)), vec![1, 1, 0]);
    }

    #[test]
    fn ranks_skip_after_a_tie_group() {
        let batch = [
            sampled(0, &[1.0]),
            sampled(1, &[1.0 + 1e-12]),
            sampled(2, &[2.0]),
            sampled(3, &[0.5]),
        ];
        assert_eq!(ranks(&aggregate(&batch, 90.0)), vec![1, 1, 3, 0]);
    }

    #[test]
    fn two_route_scenario() {
        let batch = [sampled(0, &[20.0; 10]), sampled(1, &[30.0; 10])];
        let stats = aggregate(&batch, 90.0);
        assert_eq!(stats.shade_threshold, Some(29.0));
        assert_eq!(stats.routes[0].normalized_score, Some(0.0));
        assert_eq!(stats.routes[1].normalized_score, Some(100.0));
        assert_eq!(stats.routes[0].shade_percentage, 100.0);
        assert_eq!(stats.routes[1].shade_percentage, 0.0);
        assert_eq!(ranks(&stats), vec![0, 1]);
        assert_eq!(stats.mean_range, Some(ValueRange { min: 20.0, max: 30.0 }));
    }

    #[test]
    fn constant_field_is_well_defined() {
        let batch = [
            sampled(0, &[27.5; 4]),
            sampled(1, &[27.5; 9]),
            sampled(2, &[27.5; 2]),
        ];
        let stats = aggregate(&batch, 90.0);
        for r in &stats.routes {
            assert_eq!(r.mean, Some(27.5));
            assert_eq!(r.normalized_score, Some(0.0));
            assert!(r.shade_percentage == 0.0 || r.shade_percentage == 100.0);
            assert_eq!(r.rank, 0);
        }
    }

    #[test]
    fn shade_uses_strict_comparison() {
        let batch = [sampled(0, &[0.0, 5.0, 10.0, 9.0])];
        // Threshold = 0 + 10 * 0.9 = 9; only 0 and 5 are below it.
        let stats = aggregate(&batch, 90.0);
        assert_eq!(stats.routes[0].shade_percentage, 50.0);
    }

    #[test]
    fn threshold_spans_the_whole_batch() {
        let batch = [sampled(0, &[10.0, 12.0]), sampled(1, &[20.0, 30.0])];
        let stats = aggregate(&batch, 50.0);
        assert_eq!(stats.overall, Some(ValueRange { min: 10.0, max: 30.0 }));
        assert_eq!(stats.shade_threshold, Some(20.0));
        assert_eq!(stats.routes[0].shade_percentage, 100.0);
        assert_eq!(stats.routes[1].shade_percentage, 0.0);
    }

    #[test]
    fn empty_route_has_no_mean_and_sorts_last() {
        let batch = [sampled(0, &[]), sampled(1, &[25.0]), sampled(2, &[22.0])];
        let stats = aggregate(&batch, 90.0);
        let empty = stats.route(0).unwrap();
        assert_eq!(empty.mean, None);
        assert_eq!(empty.normalized_score, None);
        assert_eq!(empty.shade_percentage, 0.0);
        assert_eq!(ranks(&stats), vec![2, 1, 0]);
    }

    #[test]
    fn empty_batch() {
        let stats = aggregate(&[], 90.0);
        assert!(stats.routes.is_empty());
        assert_eq!(stats.shade_threshold, None);
        assert_eq!(stats.mean_range, None);
    }
}
