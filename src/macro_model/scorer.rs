//! # Indicator Scorer
//!
//! $$
//! s_{fx} = \max\left(0,\ 10 - 2\,|x - x^\*|\right)
//! $$
//!
//! Per-indicator scoring rules. Every rule is total and returns `0` for non-finite input.

use super::indicators::Indicator;
use super::indicators::IndicatorScoreSet;
use super::indicators::MacroIndicatorSet;
use super::indicators::ScoringWeights;
use super::params::Commodity;
use super::params::InflationBandOrdering;
use super::params::MacroParams;

/// Scores raw indicator values against a [`MacroParams`] snapshot.
#[derive(Clone, Debug, Default)]
pub struct IndicatorScorer {
  params: MacroParams,
  weights: ScoringWeights,
}

impl IndicatorScorer {
  pub fn new(params: MacroParams, weights: ScoringWeights) -> Self {
    Self { params, weights }
  }

  pub fn params(&self) -> &MacroParams {
    &self.params
  }

  pub fn weights(&self) -> &ScoringWeights {
    &self.weights
  }

  pub fn score_inflation(&self, ipca: f64) -> f64 {
    if !ipca.is_finite() {
      return 0.0;
    }
    let lo = self.params.ipca_target - self.params.ipca_tolerance;
    let hi = self.params.ipca_target + self.params.ipca_tolerance;

    match self.params.inflation_ordering {
      InflationBandOrdering::Literal => {
        if (lo..=hi).contains(&ipca) {
          10.0
        } else if ipca <= hi + 1.0 {
          5.0
        } else if ipca > hi + 1.0 {
          0.0
        } else {
          // unreachable for finite input
          3.0
        }
      }
      InflationBandOrdering::DeflationAware => {
        if (lo..=hi).contains(&ipca) {
          10.0
        } else if ipca < lo {
          3.0
        } else if ipca <= hi + 1.0 {
          5.0
        } else {
          0.0
        }
      }
    }
  }

  pub fn score_policy_rate(&self, selic: f64) -> f64 {
    if !selic.is_finite() {
      return 0.0;
    }
    let neutral = self.params.selic_neutral;
    if (selic - neutral).abs() <= 0.5 {
      10.0
    } else if selic > neutral && selic <= neutral + 2.0 {
      4.0
    } else if selic > neutral + 2.0 {
      0.0
    } else {
      6.0
    }
  }

  pub fn score_fx(&self, dolar: f64) -> f64 {
    if !dolar.is_finite() {
      return 0.0;
    }
    (10.0 - 2.0 * (dolar - self.params.dolar_ideal).abs()).max(0.0)
  }

  pub fn score_gdp(&self, pib: f64) -> f64 {
    if !pib.is_finite() {
      return 0.0;
    }
    let ideal = self.params.pib_ideal;
    if pib >= ideal {
      (8.0 + 2.0 * (pib - ideal)).min(10.0)
    } else {
      (8.0 - 3.0 * (ideal - pib)).max(0.0)
    }
  }

  /// Distance of `price` from the commodity's trailing reference; `0` without a reference.
  pub fn score_commodity(&self, commodity: Commodity, price: f64) -> f64 {
    if !price.is_finite() {
      return 0.0;
    }
    match self.params.commodity_ideals.get(commodity) {
      Some(ideal) if ideal.is_finite() => {
        (10.0 - commodity.slope() * (price - ideal).abs()).max(0.0)
      }
      _ => 0.0,
    }
  }

  /// Mean of the soy and corn scores.
  pub fn score_agro(&self, soy: f64, corn: f64) -> f64 {
    (self.score_commodity(Commodity::Soy, soy) + self.score_commodity(Commodity::Corn, corn)) / 2.0
  }

  /// Score every indicator after explicit zero substitution of missing values.
  pub fn score_indicators(&self, macro_set: &MacroIndicatorSet) -> IndicatorScoreSet {
    self.score_indicators_weighted(macro_set, &self.weights)
  }

  pub fn score_indicators_weighted(
    &self,
    macro_set: &MacroIndicatorSet,
    weights: &ScoringWeights,
  ) -> IndicatorScoreSet {
    let m = macro_set.normalized();
    let mut scores = [0.0; Indicator::COUNT];
    scores[Indicator::PolicyRate.index()] = self.score_policy_rate(m.selic);
    scores[Indicator::Inflation.index()] = self.score_inflation(m.ipca);
    scores[Indicator::Fx.index()] = self.score_fx(m.dolar);
    scores[Indicator::Gdp.index()] = self.score_gdp(m.pib);
    scores[Indicator::AgroCommodities.index()] = self.score_agro(m.soy, m.corn);
    scores[Indicator::IronOre.index()] = self.score_commodity(Commodity::IronOre, m.iron_ore);
    scores[Indicator::Oil.index()] = self.score_commodity(Commodity::Oil, m.oil);
    IndicatorScoreSet::new(scores, weights)
  }
}

/// Score `macro_set` with `params`, using default weights when none are given.
pub fn score_indicators(
  macro_set: &MacroIndicatorSet,
  params: &MacroParams,
  weights: Option<&ScoringWeights>,
) -> IndicatorScoreSet {
  let weights = weights.copied().unwrap_or_default();
  IndicatorScorer::new(params.clone(), weights).score_indicators(macro_set)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;
  use crate::macro_model::params::CommodityIdeals;

  fn scorer() -> IndicatorScorer {
    IndicatorScorer::default()
  }

  fn deflation_aware() -> IndicatorScorer {
    IndicatorScorer::new(
      MacroParams {
        inflation_ordering: InflationBandOrdering::DeflationAware,
        ..Default::default()
      },
      ScoringWeights::default(),
    )
  }

  #[test]
  fn inflation_band_literal_ordering() {
    let s = scorer();
    assert_eq!(s.score_inflation(3.0), 10.0);
    assert_eq!(s.score_inflation(4.5), 10.0);
    assert_eq!(s.score_inflation(5.0), 5.0);
    assert_eq!(s.score_inflation(3.0 + 1.5 + 2.0), 0.0);
    // below the band falls into the "within one point above" branch
    assert_eq!(s.score_inflation(1.0), 5.0);
    assert_eq!(s.score_inflation(-2.0), 5.0);
    assert_eq!(s.score_inflation(f64::NAN), 0.0);
  }

  #[test]
  fn inflation_band_deflation_aware_ordering() {
    let s = deflation_aware();
    assert_eq!(s.score_inflation(3.0), 10.0);
    assert_eq!(s.score_inflation(1.0), 3.0);
    assert_eq!(s.score_inflation(5.0), 5.0);
    assert_eq!(s.score_inflation(6.5), 0.0);
  }

  #[test]
  fn policy_rate_steps() {
    let s = scorer();
    assert_eq!(s.score_policy_rate(7.0), 10.0);
    assert_eq!(s.score_policy_rate(7.5), 10.0);
    assert_eq!(s.score_policy_rate(8.0), 4.0);
    assert_eq!(s.score_policy_rate(9.0), 4.0);
    assert_eq!(s.score_policy_rate(10.0), 0.0);
    assert_eq!(s.score_policy_rate(12.0), 0.0);
    assert_eq!(s.score_policy_rate(5.0), 6.0);
    assert_eq!(s.score_policy_rate(f64::NAN), 0.0);
  }

  #[test]
  fn fx_and_gdp_scores() {
    let s = scorer();
    assert_abs_diff_eq!(s.score_fx(5.30), 10.0, epsilon = 1e-12);
    assert_abs_diff_eq!(s.score_fx(5.80), 9.0, epsilon = 1e-9);
    assert_abs_diff_eq!(s.score_fx(6.30), 8.0, epsilon = 1e-9);
    assert_eq!(s.score_fx(20.0), 0.0);

    assert_eq!(s.score_gdp(2.0), 8.0);
    assert_eq!(s.score_gdp(3.0), 10.0);
    assert_eq!(s.score_gdp(5.0), 10.0);
    assert_abs_diff_eq!(s.score_gdp(0.5), 3.5, epsilon = 1e-12);
    assert_eq!(s.score_gdp(-5.0), 0.0);
  }

  #[test]
  fn commodity_scores_use_reference_and_slope() {
    let s = scorer();
    assert_eq!(s.score_commodity(Commodity::Soy, 13.0), 10.0);
    assert_abs_diff_eq!(s.score_commodity(Commodity::Soy, 14.0), 8.5, epsilon = 1e-12);
    assert_abs_diff_eq!(s.score_commodity(Commodity::Corn, 6.0), 9.0, epsilon = 1e-12);
    assert_abs_diff_eq!(
      s.score_commodity(Commodity::IronOre, 120.0),
      8.0,
      epsilon = 1e-12
    );
    assert_abs_diff_eq!(s.score_commodity(Commodity::Oil, 85.0), 9.0, epsilon = 1e-12);
    assert_abs_diff_eq!(s.score_agro(13.0, 6.0), 9.5, epsilon = 1e-12);
  }

  #[test]
  fn commodity_scores_are_zero_without_reference() {
    let s = IndicatorScorer::new(
      MacroParams {
        commodity_ideals: CommodityIdeals::unavailable(),
        ..Default::default()
      },
      ScoringWeights::default(),
    );
    for commodity in Commodity::ALL {
      assert_eq!(s.score_commodity(commodity, 50.0), 0.0);
    }
  }

  #[test]
  fn every_score_stays_in_range() {
    let s = scorer();
    let grid = [-100.0, -1.0, 0.0, 0.5, 2.0, 3.0, 5.3, 7.0, 13.0, 80.0, 1e6];
    for &x in &grid {
      let scores = [
        s.score_inflation(x),
        s.score_policy_rate(x),
        s.score_fx(x),
        s.score_gdp(x),
        s.score_agro(x, x),
        s.score_commodity(Commodity::IronOre, x),
        s.score_commodity(Commodity::Oil, x),
      ];
      for v in scores {
        assert!((0.0..=10.0).contains(&v), "score {v} out of range for {x}");
      }
    }
  }

  #[test]
  fn score_indicators_fills_every_slot() {
    let macro_set = MacroIndicatorSet {
      selic: Some(7.0),
      ipca: Some(3.0),
      dolar: Some(5.30),
      pib: Some(2.0),
      soy: Some(13.0),
      corn: Some(5.5),
      iron_ore: Some(100.0),
      oil: Some(80.0),
    };
    let scores = score_indicators(&macro_set, &MacroParams::default(), None);

    assert_eq!(scores.get(Indicator::PolicyRate), 10.0);
    assert_eq!(scores.get(Indicator::Inflation), 10.0);
    assert_eq!(scores.get(Indicator::Fx), 10.0);
    assert_eq!(scores.get(Indicator::Gdp), 8.0);
    assert_eq!(scores.get(Indicator::AgroCommodities), 10.0);
    assert_abs_diff_eq!(scores.aggregate, 68.0 / 7.0, epsilon = 1e-12);
  }
}
