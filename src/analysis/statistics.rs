//! Descriptive statistics over an unordered collection of values.
//!
//! Percentiles use the nearest-rank method: the value at zero-based index
//! `ceil(k/100 * n) - 1` of the sorted data, with no interpolation.

use serde::Serialize;
use std::fmt;

/// Immutable statistical summary of one group of observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation (divisor n).
    pub std_dev: f64,
    pub median: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub observations: usize,
}

impl Summary {
    /// Returned for empty input instead of failing.
    pub const EMPTY: Summary = Summary {
        min: 0.0,
        max: 0.0,
        mean: 0.0,
        std_dev: 0.0,
        median: 0.0,
        p90: 0.0,
        p95: 0.0,
        p99: 0.0,
        observations: 0,
    };

    /// Compute the summary for a collection of values.
    pub fn compute<I>(values: I) -> Summary
    where
        I: IntoIterator<Item = f64>,
    {
        let mut sorted: Vec<f64> = values.into_iter().collect();
        if sorted.is_empty() {
            return Self::EMPTY;
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let p90_index = nearest_rank_index(90, n);
        let p95_index = nearest_rank_index(95, n);
        let p99_index = nearest_rank_index(99, n);

        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut sum = 0.0;
        let mut sum_of_squares = 0.0;
        for &value in &sorted {
            min = min.min(value);
            max = max.max(value);
            sum += value;
            sum_of_squares += value * value;
        }

        let mean = sum / n as f64;
        // Cancellation can push the variance slightly below zero.
        let variance = (sum_of_squares / n as f64 - mean * mean).max(0.0);

        Summary {
            min,
            max,
            mean,
            std_dev: variance.sqrt(),
            median: median_of_sorted(&sorted),
            p90: sorted[p90_index],
            p95: sorted[p95_index],
            p99: sorted[p99_index],
            observations: n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observations == 0
    }

    /// `key|value` pairs joined by `|`, without a leading or trailing pipe.
    pub fn machine_readable(&self) -> String {
        format!(
            "Min|{:.2}|Max|{:.2}|99%|{:.2}|95%|{:.2}|90%|{:.2}|Average|{:.2}|Standard deviation|{:.2}|Median|{:.2}|Observations|{}",
            self.min,
            self.max,
            self.p99,
            self.p95,
            self.p90,
            self.mean,
            self.std_dev,
            self.median,
            self.observations
        )
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "NOT MEASURED");
        }
        write!(
            f,
            "Statistics: Min: {:8.2}, Max: {:8.2}, 99%: {:8.2}, 95%: {:8.2}, 90%: {:8.2}, Average: {:8.2}, Standard deviation: {:8.2}, Median: {:8.2}, Observations: {:8}",
            self.min,
            self.max,
            self.p99,
            self.p95,
            self.p90,
            self.mean,
            self.std_dev,
            self.median,
            self.observations
        )
    }
}

/// Zero-based nearest-rank index for percentile `k` over `n` sorted values.
///
/// Computed in integers so `ceil` is exact. `n` must be non-zero.
pub fn nearest_rank_index(k: usize, n: usize) -> usize {
    debug_assert!(n > 0 && (1..=100).contains(&k));
    (k * n).div_ceil(100) - 1
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let middle = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[middle - 1] + sorted[middle]) / 2.0
    } else {
        sorted[middle]
    }
}
