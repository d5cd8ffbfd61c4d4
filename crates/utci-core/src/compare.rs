//! Agreement check between two raster encodings.
//!
//! The same batch is scored against the dense reference and the quantized
//! candidate; ranks must match exactly and means and shade percentages
//! must stay within tolerance.

use serde::{Deserialize, Serialize};

use crate::aggregate::BatchStats;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Largest accepted absolute difference of route means.
    pub mean: f64,
    /// Largest accepted difference of shade percentages, in points.
    pub shade_pct: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            mean: 0.02,
            shade_pct: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteComparison {
    pub route_id: usize,
    pub reference_rank: usize,
    /// `None` when the candidate batch has no such route.
    pub candidate_rank: Option<usize>,
    pub mean_delta: Option<f64>,
    pub shade_delta: Option<f64>,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodingComparison {
    pub routes: Vec<RouteComparison>,
    pub max_mean_delta: f64,
    pub max_shade_delta: f64,
    pub passed: bool,
}

pub fn compare_batches(
    reference: &BatchStats,
    candidate: &BatchStats,
    tolerance: &Tolerance,
) -> EncodingComparison {
    let mut routes = Vec::with_capacity(reference.routes.len());
    let mut max_mean_delta = 0.0f64;
    let mut max_shade_delta = 0.0f64;

    for expected in &reference.routes {
        let Some(actual) = candidate.route(expected.route_id) else {
            routes.push(RouteComparison {
                route_id: expected.route_id,
                reference_rank: expected.rank,
                candidate_rank: None,
                mean_delta: None,
                shade_delta: None,
                passed: false,
            });
            continue;
        };

        let mean_delta = match (expected.mean, actual.mean) {
            (Some(a), Some(b)) => Some((a - b).abs()),
            (None, None) => Some(0.0),
            _ => None,
        };
        let shade_delta = (expected.shade_percentage - actual.shade_percentage).abs();
        if let Some(d) = mean_delta {
            max_mean_delta = max_mean_delta.max(d);
        }
        max_shade_delta = max_shade_delta.max(shade_delta);

        let passed = expected.rank == actual.rank
            && mean_delta.is_some_and(|d| d <= tolerance.mean)
            && shade_delta <= tolerance.shade_pct;
        routes.push(RouteComparison {
            route_id: expected.route_id,
            reference_rank: expected.rank,
            candidate_rank: Some(actual.rank),
            mean_delta,
            shade_delta: Some(shade_delta),
            passed,
        });
    }

    let passed = routes.iter().all(|r| r.passed)
        && candidate.routes.len() == reference.routes.len();
    EncodingComparison {
        routes,
        max_mean_delta,
        max_shade_delta,
        passed,
    }
}
