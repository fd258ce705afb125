//! # Portfolio Data Utilities
//!
//! $$
//! r_t = \ln\frac{P_t}{P_{t-1}}, \qquad \Sigma_{ij} = \sigma_i \sigma_j \rho_{ij}
//! $$
//!
//! Return preprocessing, universe preparation and correlation/covariance construction.

use std::collections::BTreeMap;
use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::AllocationError;

fn sample_mean(xs: &[f64]) -> f64 {
  if xs.is_empty() {
    0.0
  } else {
    xs.iter().sum::<f64>() / xs.len() as f64
  }
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
  let n = x.len().min(y.len());
  if n < 2 {
    return 0.0;
  }

  let mx = sample_mean(&x[..n]);
  let my = sample_mean(&y[..n]);

  let mut cov = 0.0;
  let mut sx = 0.0;
  let mut sy = 0.0;

  for i in 0..n {
    let dx = x[i] - mx;
    let dy = y[i] - my;
    cov += dx * dy;
    sx += dx * dx;
    sy += dy * dy;
  }

  let denom = (sx * sy).sqrt();
  if denom < 1e-15 {
    0.0
  } else {
    (cov / denom).clamp(-1.0, 1.0)
  }
}

/// Per-ticker periodic returns, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReturnSeries {
  series: BTreeMap<String, Vec<f64>>,
}

impl ReturnSeries {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build from close prices, converting each series with [`log_returns_series`].
  pub fn from_prices<I, S>(prices: I) -> Self
  where
    I: IntoIterator<Item = (S, Vec<f64>)>,
    S: Into<String>,
  {
    Self {
      series: prices
        .into_iter()
        .map(|(t, closes)| (t.into(), log_returns_series(&closes)))
        .collect(),
    }
  }

  pub fn insert(&mut self, ticker: impl Into<String>, returns: Vec<f64>) {
    self.series.insert(ticker.into(), returns);
  }

  pub fn get(&self, ticker: &str) -> Option<&[f64]> {
    self.series.get(ticker).map(Vec::as_slice)
  }

  pub fn len(&self) -> usize {
    self.series.len()
  }

  pub fn is_empty(&self) -> bool {
    self.series.is_empty()
  }

  pub fn tickers(&self) -> impl Iterator<Item = &str> + '_ {
    self.series.keys().map(String::as_str)
  }
}

impl<S: Into<String>> FromIterator<(S, Vec<f64>)> for ReturnSeries {
  fn from_iter<I: IntoIterator<Item = (S, Vec<f64>)>>(iter: I) -> Self {
    Self {
      series: iter.into_iter().map(|(t, r)| (t.into(), r)).collect(),
    }
  }
}

/// Convert close prices to log-return series.
pub fn log_returns_series(closes: &[f64]) -> Vec<f64> {
  let mut out = Vec::with_capacity(closes.len().saturating_sub(1));
  for i in 1..closes.len() {
    if closes[i - 1] > 0.0 && closes[i] > 0.0 {
      out.push((closes[i] / closes[i - 1]).ln());
    } else {
      out.push(f64::NAN);
    }
  }
  out
}

/// Align multiple return series to common tail length.
pub fn align_return_series(all_returns: &[Vec<f64>]) -> Vec<Vec<f64>> {
  let min_len = all_returns.iter().map(|r| r.len()).min().unwrap_or(0);
  all_returns
    .iter()
    .map(|r| r[r.len().saturating_sub(min_len)..].to_vec())
    .collect()
}

/// Reject a series with more than half non-finite observations or fewer than
/// `min_history` observations; otherwise replace the remaining non-finite values by 0.
pub fn clean_series(
  ticker: &str,
  raw: &[f64],
  min_history: usize,
) -> Result<Vec<f64>, AllocationError> {
  if raw.is_empty() {
    return Err(AllocationError::data_unavailable(ticker, "empty return series"));
  }

  let missing = raw.iter().filter(|r| !r.is_finite()).count();
  if missing * 2 > raw.len() {
    return Err(AllocationError::data_unavailable(
      ticker,
      format!("{missing} of {} observations missing", raw.len()),
    ));
  }
  if raw.len() < min_history {
    return Err(AllocationError::data_unavailable(
      ticker,
      format!("{} observations, need {min_history}", raw.len()),
    ));
  }
  if missing > 0 {
    warn!(ticker, missing, "non-finite returns replaced by 0");
  }

  Ok(
    raw
      .iter()
      .map(|&r| if r.is_finite() { r } else { 0.0 })
      .collect(),
  )
}

/// Requested tickers split into an aligned, optimizable subset and explicit exclusions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PreparedUniverse {
  /// Originally requested tickers, de-duplicated, in request order.
  pub requested: Vec<String>,
  /// Tickers with usable history, in request order.
  pub tickers: Vec<String>,
  /// Tail-aligned returns, one row per entry of `tickers`.
  pub returns: Vec<Vec<f64>>,
  pub excluded: Vec<AllocationError>,
}

impl PreparedUniverse {
  pub fn len(&self) -> usize {
    self.tickers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tickers.is_empty()
  }

  pub fn periods(&self) -> usize {
    self.returns.first().map_or(0, Vec::len)
  }

  /// Requested tickers that were not kept.
  pub fn excluded_tickers(&self) -> Vec<String> {
    self
      .requested
      .iter()
      .filter(|t| !self.tickers.contains(t))
      .cloned()
      .collect()
  }
}

/// Clean and tail-align the series of every requested ticker.
pub fn prepare_universe<S: AsRef<str>>(
  requested: &[S],
  series: &ReturnSeries,
  min_history: usize,
) -> PreparedUniverse {
  let mut seen = HashSet::new();
  let mut universe = PreparedUniverse::default();
  let mut rows = Vec::new();

  for ticker in requested {
    let ticker = ticker.as_ref();
    if !seen.insert(ticker.to_string()) {
      debug!(ticker, "duplicate ticker ignored");
      continue;
    }
    universe.requested.push(ticker.to_string());

    let cleaned = match series.get(ticker) {
      Some(raw) => clean_series(ticker, raw, min_history),
      None => Err(AllocationError::data_unavailable(ticker, "no return series")),
    };

    match cleaned {
      Ok(returns) => {
        universe.tickers.push(ticker.to_string());
        rows.push(returns);
      }
      Err(error) => {
        warn!(ticker, %error, "ticker excluded from optimization");
        universe.excluded.push(error);
      }
    }
  }

  universe.returns = align_return_series(&rows);
  info!(
    requested = universe.requested.len(),
    valid = universe.tickers.len(),
    periods = universe.periods(),
    "prepared return universe"
  );
  universe
}

/// Mean periodic return per series scaled by `periods_per_year`.
pub fn annualized_mean_returns(aligned_returns: &[Vec<f64>], periods_per_year: f64) -> Vec<f64> {
  aligned_returns
    .iter()
    .map(|r| sample_mean(r) * periods_per_year)
    .collect()
}

/// Sample covariance (`n - 1` denominator) of aligned series.
pub fn sample_covariance(aligned_returns: &[Vec<f64>]) -> Vec<Vec<f64>> {
  let n = aligned_returns.len();
  let t = aligned_returns.first().map_or(0, Vec::len);
  let mut cov = vec![vec![0.0; n]; n];
  if t < 2 {
    return cov;
  }

  let means: Vec<f64> = aligned_returns.iter().map(|r| sample_mean(r)).collect();
  for i in 0..n {
    for j in i..n {
      let mut acc = 0.0;
      for k in 0..t {
        acc += (aligned_returns[i][k] - means[i]) * (aligned_returns[j][k] - means[j]);
      }
      let c = acc / (t - 1) as f64;
      cov[i][j] = c;
      cov[j][i] = c;
    }
  }
  cov
}

/// Multiply every entry by `factor`.
pub fn scale_matrix(mat: &mut [Vec<f64>], factor: f64) {
  for row in mat.iter_mut() {
    for v in row.iter_mut() {
      *v *= factor;
    }
  }
}

/// Build a Pearson correlation matrix from aligned return series.
pub fn correlation_matrix(aligned_returns: &[Vec<f64>]) -> Vec<Vec<f64>> {
  let n = aligned_returns.len();
  let mut corr = vec![vec![1.0; n]; n];

  for i in 0..n {
    for j in (i + 1)..n {
      let r = pearson(&aligned_returns[i], &aligned_returns[j]);
      corr[i][j] = r;
      corr[j][i] = r;
    }
  }

  corr
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use tracing_test::traced_test;

  use super::*;

  #[test]
  fn log_returns_mark_invalid_prices() {
    let r = log_returns_series(&[10.0, 11.0, 0.0, 12.0]);
    assert_eq!(r.len(), 3);
    assert_abs_diff_eq!(r[0], (1.1f64).ln(), epsilon = 1e-12);
    assert!(r[1].is_nan());
    assert!(r[2].is_nan());
  }

  #[test]
  fn mostly_missing_series_is_rejected() {
    let raw = vec![f64::NAN, f64::NAN, 0.01, f64::NAN];
    assert!(matches!(
      clean_series("X", &raw, 1),
      Err(AllocationError::DataUnavailable { .. })
    ));
  }

  #[traced_test]
  #[test]
  fn remaining_gaps_are_zero_filled() {
    let raw = vec![0.01, f64::NAN, 0.02, 0.03];
    let cleaned = clean_series("X", &raw, 2).unwrap();
    assert_eq!(cleaned, vec![0.01, 0.0, 0.02, 0.03]);
    assert!(logs_contain("non-finite returns replaced by 0"));
  }

  #[test]
  fn universe_keeps_request_order_and_records_exclusions() {
    let series: ReturnSeries = vec![
      ("B", vec![0.01; 30]),
      ("A", vec![0.02; 40]),
      ("C", vec![0.01; 5]),
    ]
    .into_iter()
    .collect();

    let universe = prepare_universe(&["A", "B", "C", "D", "A"], &series, 20);
    assert_eq!(universe.requested, vec!["A", "B", "C", "D"]);
    assert_eq!(universe.tickers, vec!["A", "B"]);
    assert_eq!(universe.periods(), 30);
    assert_eq!(universe.excluded.len(), 2);
    assert_eq!(universe.excluded_tickers(), vec!["C", "D"]);
  }

  #[test]
  fn covariance_and_correlation_agree() {
    let returns = vec![
      vec![0.01, -0.02, 0.03, 0.0, 0.01],
      vec![0.02, -0.01, 0.02, 0.01, -0.01],
    ];
    let cov = sample_covariance(&returns);
    let corr = correlation_matrix(&returns);
    let implied = cov[0][1] / (cov[0][0] * cov[1][1]).sqrt();
    assert_abs_diff_eq!(corr[0][1], implied, epsilon = 1e-12);
    assert_abs_diff_eq!(cov[0][1], cov[1][0], epsilon = 1e-15);
    assert_eq!(corr[0][0], 1.0);
  }

  #[test]
  fn annualized_means_scale_by_periods() {
    let mu = annualized_mean_returns(&[vec![0.001, 0.003]], 252.0);
    assert_abs_diff_eq!(mu[0], 0.504, epsilon = 1e-12);
  }
}
