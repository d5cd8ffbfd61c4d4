//! Plain-text reports.

use std::fmt::Write as _;

use utci_core::{BatchStats, EncodingComparison, Tolerance};

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}"),
        None => "-".to_string(),
    }
}

/// Side-by-side table of two scorings, one block per route. `names` label
/// the reference and candidate columns, e.g. `["tif", "npz"]`.
pub fn comparison_table(
    names: [&str; 2],
    labels: &[String],
    reference: &BatchStats,
    candidate: &BatchStats,
    comparison: &EncodingComparison,
    tolerance: &Tolerance,
) -> String {
    let mut out = String::new();
    let rule = "=".repeat(78);
    let _ = writeln!(out, "{rule}");
    let [a, b] = names;
    let _ = writeln!(
        out,
        "{} vs {}: route ranks, shade % and mean UTCI",
        a.to_uppercase(),
        b.to_uppercase()
    );
    let _ = writeln!(
        out,
        "tolerance: mean <= {}, shade <= {} pts, ranks must match",
        tolerance.mean, tolerance.shade_pct
    );
    let _ = writeln!(out, "{rule}");

    for row in &comparison.routes {
        let label = labels
            .get(row.route_id)
            .map(String::as_str)
            .unwrap_or("(unlabelled)");
        let expected = reference.route(row.route_id);
        let actual = candidate.route(row.route_id);
        let _ = writeln!(
            out,
            "[{}] route {}: {}",
            if row.passed { " ok " } else { "FAIL" },
            row.route_id,
            label
        );
        let _ = writeln!(
            out,
            "       rank    {a}={} {b}={}",
            row.reference_rank,
            row.candidate_rank
                .map_or_else(|| "-".to_string(), |r| r.to_string())
        );
        let _ = writeln!(
            out,
            "       mean    {a}={} {b}={} |d|={}",
            fmt_opt(expected.and_then(|s| s.mean), 4),
            fmt_opt(actual.and_then(|s| s.mean), 4),
            fmt_opt(row.mean_delta, 4)
        );
        let _ = writeln!(
            out,
            "       shade%  {a}={} {b}={} |d|={}",
            fmt_opt(expected.map(|s| s.shade_percentage), 2),
            fmt_opt(actual.map(|s| s.shade_percentage), 2),
            fmt_opt(row.shade_delta, 2)
        );
    }

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "max |d mean| = {:.4}, max |d shade| = {:.2}",
        comparison.max_mean_delta, comparison.max_shade_delta
    );
    let verdict = if comparison.passed {
        "PASS: agree"
    } else {
        "FAIL: disagree"
    };
    let _ = writeln!(out, "{verdict} ({a} vs {b})");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use utci_core::{aggregate, compare_batches, GeoPoint, SampledRoute};

    fn batch(means: &[f64]) -> BatchStats {
        let routes: Vec<SampledRoute> = means
            .iter()
            .enumerate()
            .map(|(route_id, &mean)| SampledRoute {
                route_id,
                points: vec![GeoPoint::new(30.0, -97.0); 2],
                projected: Vec::new(),
                values: vec![mean, mean],
            })
            .collect();
        aggregate(&routes, 90.0)
    }

    #[test]
    fn table_marks_each_route() {
        let reference = batch(&[31.0, 32.0]);
        let candidate = batch(&[31.01, 31.5]);
        let tolerance = Tolerance::default();
        let comparison = compare_batches(&reference, &candidate, &tolerance);
        let labels = vec!["a -> b (alt 1)".to_string(), "a -> b (alt 2)".to_string()];

        let table = comparison_table(
            ["tif", "npz"],
            &labels,
            &reference,
            &candidate,
            &comparison,
            &tolerance,
        );
        assert!(table.contains("TIF vs NPZ: route ranks"));
        assert!(table.contains("[ ok ] route 0: a -> b (alt 1)"));
        assert!(table.contains("[FAIL] route 1: a -> b (alt 2)"));
        assert!(table.contains("mean    tif=32.0000 npz=31.5000 |d|=0.5000"));
        assert!(table.ends_with("FAIL: disagree (tif vs npz)\n"));
    }

    #[test]
    fn missing_candidate_route_prints_dashes() {
        let reference = batch(&[31.0, 32.0]);
        let candidate = batch(&[31.0]);
        let tolerance = Tolerance::default();
        let comparison = compare_batches(&reference, &candidate, &tolerance);

        let table = comparison_table(
            ["tif", "api"],
            &[],
            &reference,
            &candidate,
            &comparison,
            &tolerance,
        );
        assert!(table.contains("rank    tif=1 api=-"));
        assert!(table.contains("route 1: (unlabelled)"));
    }
}
