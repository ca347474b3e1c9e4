//! Keyword mention trends: daily counts from posts and a short-horizon forecast.
//!
//! The forecast models first differences of the daily counts as AR(3) with an
//! intercept, fitted by least squares, and integrates back to levels. Short or
//! degenerate series fall back to the mean difference (a drift model).

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::posts::Post;

pub const DEFAULT_FORECAST_DAYS: usize = 15;
const AR_ORDER: usize = 3;
/// Fewer differences than this and the AR fit is skipped.
const MIN_DIFFS: usize = 8;
const PIVOT_EPS: f64 = 1e-9;

/// One count per consecutive calendar day, starting at `start`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySeries {
    pub start: NaiveDate,
    pub counts: Vec<f64>,
}

impl DailySeries {
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn day(&self, i: usize) -> NaiveDate {
        self.start + Duration::days(i as i64)
    }

    pub fn mean(&self) -> f64 {
        mean(&self.counts)
    }
}

/// Counts posts mentioning `keyword` (case-insensitive) per day, zero-filling days without posts.
/// Posts without a recognised timestamp are ignored. `None` when no post has a date.
pub fn daily_mentions(posts: &[Post], keyword: &str) -> Option<DailySeries> {
    let kw = keyword.to_lowercase();
    let dated: Vec<(NaiveDate, bool)> = posts
        .iter()
        .filter_map(|p| p.date().map(|d| (d, p.clean_text.to_lowercase().contains(&kw))))
        .collect();
    let start = dated.iter().map(|(d, _)| *d).min()?;
    let end = dated.iter().map(|(d, _)| *d).max()?;
    let days = (end - start).num_days() as usize + 1;
    let mut counts = vec![0.0; days];
    for (d, hit) in dated {
        if hit {
            counts[(d - start).num_days() as usize] += 1.0;
        }
    }
    Some(DailySeries { start, counts })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    Autoregressive,
    Drift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    /// Day after the last observed day.
    pub start: NaiveDate,
    pub values: Vec<f64>,
    pub method: ForecastMethod,
    pub direction: Direction,
}

impl Forecast {
    /// Calendar day of the `i`-th forecast value.
    pub fn day(&self, i: usize) -> NaiveDate {
        self.start + Duration::days(i as i64)
    }

    pub fn mean(&self) -> f64 {
        mean(&self.values)
    }
}

/// Forecasts the next `steps` days of `series`.
pub fn forecast(series: &DailySeries, steps: usize) -> Result<Forecast, TrendError> {
    let Some(&last) = series.counts.last() else {
        return Err(TrendError::EmptySeries);
    };
    let diffs: Vec<f64> = series.counts.windows(2).map(|w| w[1] - w[0]).collect();

    let (diff_forecast, method) = match fit_ar(&diffs) {
        Some(coef) => (project_ar(&diffs, &coef, steps), ForecastMethod::Autoregressive),
        None => (vec![mean(&diffs); steps], ForecastMethod::Drift),
    };
    debug!(?method, diffs = diffs.len(), "trend model fitted");

    let mut level = last;
    let values: Vec<f64> = diff_forecast
        .into_iter()
        .map(|d| {
            level += d;
            level
        })
        .collect();

    let delta = mean(&values) - series.mean();
    let direction = if values.is_empty() || delta.abs() <= PIVOT_EPS {
        Direction::Stable
    } else if delta > 0.0 {
        Direction::Increasing
    } else {
        Direction::Decreasing
    };

    Ok(Forecast {
        start: series.day(series.len()),
        values,
        method,
        direction,
    })
}

/// Least-squares fit of `d[t] = c + Σ φ_i d[t-i]`. Returns `[c, φ_1, .., φ_p]`.
fn fit_ar(diffs: &[f64]) -> Option<Vec<f64>> {
    if diffs.len() < MIN_DIFFS {
        return None;
    }
    let n = AR_ORDER + 1;
    let mut xtx = vec![vec![0.0; n]; n];
    let mut xty = vec![0.0; n];
    for t in AR_ORDER..diffs.len() {
        let mut row = Vec::with_capacity(n);
        row.push(1.0);
        row.extend((1..=AR_ORDER).map(|i| diffs[t - i]));
        for i in 0..n {
            xty[i] += row[i] * diffs[t];
            for j in 0..n {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    solve(xtx, xty)
}

fn project_ar(diffs: &[f64], coef: &[f64], steps: usize) -> Vec<f64> {
    let mut history = diffs.to_vec();
    let mut out = Vec::with_capacity(steps);
    for _ in 0..steps {
        let len = history.len();
        let next = coef[0]
            + (1..=AR_ORDER)
                .map(|i| coef[i] * history[len - i])
                .sum::<f64>();
        history.push(next);
        out.push(next);
    }
    out
}

/// Gaussian elimination with partial pivoting. `None` when the system is singular.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    let scale = a
        .iter()
        .flatten()
        .fold(0.0_f64, |m, v| m.max(v.abs()))
        .max(1.0);
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() <= PIVOT_EPS * scale {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[derive(Debug, thiserror::Error)]
pub enum TrendError {
    #[error("no dated data to forecast")]
    EmptySeries,
}
