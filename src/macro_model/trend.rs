//! # Macro Trend
//!
//! $$
//! \hat\beta = \frac{\sum_t (t-\bar t)(x_t-\bar x)}{\sum_t (t-\bar t)^2},
//! \qquad
//! \lambda = \operatorname{clip}\left(\frac{1}{1+\overline{\mathrm{CV}}}, 0.5, 1\right)
//! $$
//!
//! Least-squares trend per raw indicator and a stability damping factor derived from the
//! coefficient of variation of the headline indicators.

use linreg::linear_regression;
use serde::Serialize;
use statrs::statistics::Statistics;
use tracing::debug;

use super::indicators::IndicatorScoreSet;
use super::indicators::MacroIndicatorSet;
use super::indicators::RawIndicator;
use super::scorer::IndicatorScorer;

/// Minimum number of finite observations for a trend estimate.
pub const MIN_TREND_POINTS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
  Up,
  Down,
  Flat,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct IndicatorTrend {
  pub indicator: RawIndicator,
  /// Change per observation.
  pub slope: f64,
  /// Fitted value one step past the last observation.
  pub next_value: f64,
  pub direction: TrendDirection,
  pub observations: usize,
}

fn finite_points(history: &[MacroIndicatorSet], indicator: RawIndicator) -> (Vec<f64>, Vec<f64>) {
  history
    .iter()
    .enumerate()
    .filter_map(|(t, set)| set.finite(indicator).map(|v| (t as f64, v)))
    .unzip()
}

/// Fit a linear trend to every raw indicator with at least [`MIN_TREND_POINTS`]
/// finite observations in `history` (oldest first).
///
/// Slopes with magnitude at most `flat_tolerance` are labelled [`TrendDirection::Flat`].
pub fn predict_trends(history: &[MacroIndicatorSet], flat_tolerance: f64) -> Vec<IndicatorTrend> {
  let mut trends = Vec::new();

  for indicator in RawIndicator::ALL {
    let (xs, ys) = finite_points(history, indicator);
    if xs.len() < MIN_TREND_POINTS {
      continue;
    }

    let Ok((slope, intercept)) = linear_regression::<f64, f64, f64>(&xs, &ys) else {
      debug!(indicator = indicator.name(), "degenerate trend fit skipped");
      continue;
    };

    let direction = if slope > flat_tolerance {
      TrendDirection::Up
    } else if slope < -flat_tolerance {
      TrendDirection::Down
    } else {
      TrendDirection::Flat
    };

    trends.push(IndicatorTrend {
      indicator,
      slope,
      next_value: intercept + slope * history.len() as f64,
      direction,
      observations: xs.len(),
    });
  }

  trends
}

/// Damping factor in `[0.5, 1.0]`, lower for unstable headline history; `1.0` without
/// enough data.
pub fn volatility_adjustment(history: &[MacroIndicatorSet]) -> f64 {
  let mut cvs = Vec::new();

  for indicator in RawIndicator::HEADLINE {
    let (_, values) = finite_points(history, indicator);
    if values.len() < 2 {
      continue;
    }
    let mean = values.iter().mean();
    if mean.abs() < 1e-12 {
      continue;
    }
    let cv = values.iter().std_dev() / mean.abs();
    if cv.is_finite() {
      cvs.push(cv);
    }
  }

  if cvs.is_empty() {
    return 1.0;
  }

  let mean_cv = cvs.iter().mean();
  (1.0 / (1.0 + mean_cv)).clamp(0.5, 1.0)
}

/// Score `macro_set` and damp the aggregate by the history's [`volatility_adjustment`].
pub fn score_with_history(
  scorer: &IndicatorScorer,
  macro_set: &MacroIndicatorSet,
  history: &[MacroIndicatorSet],
) -> IndicatorScoreSet {
  let mut scores = scorer.score_indicators(macro_set);
  let factor = volatility_adjustment(history);
  scores.aggregate *= factor;
  debug!(factor, aggregate = scores.aggregate, "history-adjusted aggregate");
  scores
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;

  fn base() -> MacroIndicatorSet {
    MacroIndicatorSet {
      selic: Some(7.0),
      ipca: Some(3.0),
      dolar: Some(5.3),
      pib: Some(2.0),
      ..Default::default()
    }
  }

  #[test]
  fn rising_policy_rate_trends_up() {
    let history: Vec<_> = (0..12)
      .map(|i| MacroIndicatorSet {
        selic: Some(8.0 + 0.5 * i as f64),
        ..base()
      })
      .collect();

    let trends = predict_trends(&history, 1e-6);
    let selic = trends
      .iter()
      .find(|t| t.indicator == RawIndicator::Selic)
      .unwrap();
    assert_eq!(selic.direction, TrendDirection::Up);
    assert_abs_diff_eq!(selic.slope, 0.5, epsilon = 1e-9);
    assert_abs_diff_eq!(selic.next_value, 14.0, epsilon = 1e-9);

    let ipca = trends
      .iter()
      .find(|t| t.indicator == RawIndicator::Ipca)
      .unwrap();
    assert_eq!(ipca.direction, TrendDirection::Flat);
  }

  #[test]
  fn sparse_series_are_skipped() {
    let history = vec![base(), base()];
    assert!(predict_trends(&history, 1e-6).is_empty());
  }

  #[test]
  fn stable_history_is_not_penalized() {
    let history = vec![base(); 10];
    assert_eq!(volatility_adjustment(&history), 1.0);
    assert_eq!(volatility_adjustment(&[]), 1.0);
  }

  #[test]
  fn noisy_history_is_penalized_within_bounds() {
    let mut rng = StdRng::seed_from_u64(7);
    let noise = Normal::new(0.0, 2.0).unwrap();
    let history: Vec<_> = (0..24)
      .map(|_| MacroIndicatorSet {
        selic: Some(10.0 + noise.sample(&mut rng)),
        ..base()
      })
      .collect();

    let factor = volatility_adjustment(&history);
    assert!(factor < 1.0);
    assert!((0.5..=1.0).contains(&factor));
  }

  #[test]
  fn history_damps_only_the_aggregate() {
    let scorer = IndicatorScorer::default();
    let history: Vec<_> = (0..6)
      .map(|i| MacroIndicatorSet {
        pib: Some(if i % 2 == 0 { 0.5 } else { 3.5 }),
        ..base()
      })
      .collect();

    let plain = scorer.score_indicators(&base());
    let damped = score_with_history(&scorer, &base(), &history);
    assert!(damped.aggregate < plain.aggregate);
    assert!(damped.aggregate >= 0.5 * plain.aggregate);
    assert_eq!(damped.as_array(), plain.as_array());
  }
}
