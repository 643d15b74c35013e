//! Metric status classification.
//!
//! A metric is graded by comparing its value with its target. Whether lower
//! or higher is better is decided by the metric's name alone: names that
//! contain "Time", "Spill" or "Skew" (case-sensitive) are costs, everything
//! else is a throughput or utilization figure.
//!
//! | direction         | excellent    | good          | fair          | poor      |
//! |-------------------|--------------|---------------|---------------|-----------|
//! | lower is better   | ≤ target     | ≤ 1.5×target  | ≤ 2×target    | otherwise |
//! | higher is better  | ≥ target     | ≥ 0.75×target | ≥ 0.5×target  | otherwise |

use crate::model::Grade;

const COST_MARKERS: &[&str] = &["Time", "Spill", "Skew"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricDirection {
    LowerIsBetter,
    HigherIsBetter,
}

impl MetricDirection {
    pub fn for_metric(name: &str) -> MetricDirection {
        if COST_MARKERS.iter().any(|marker| name.contains(marker)) {
            MetricDirection::LowerIsBetter
        } else {
            MetricDirection::HigherIsBetter
        }
    }
}

/// Grade `value` against `target`. Total: a NaN on either side is poor.
pub fn classify(name: &str, value: f64, target: f64) -> Grade {
    if value.is_nan() || target.is_nan() {
        return Grade::Poor;
    }

    match MetricDirection::for_metric(name) {
        MetricDirection::LowerIsBetter => {
            if value <= target {
                Grade::Excellent
            } else if value <= target * 1.5 {
                Grade::Good
            } else if value <= target * 2.0 {
                Grade::Fair
            } else {
                Grade::Poor
            }
        }
        MetricDirection::HigherIsBetter => {
            if value >= target {
                Grade::Excellent
            } else if value >= target * 0.75 {
                Grade::Good
            } else if value >= target * 0.5 {
                Grade::Fair
            } else {
                Grade::Poor
            }
        }
    }
}
