//! # Asset Scorer
//!
//! $$
//! \text{score} = \operatorname{clip}\left(3\,\operatorname{sgn}(u)\ln(1+|u|) + 0.2\,m + b + 2f,\ -10,\ 10\right),
//! \qquad u = \frac{t-p}{p}
//! $$
//!
//! Bounded attractiveness score combining damped price-target upside, sector alignment,
//! favorability and the commodity-exporter bonus.

use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::error::AllocationError;
use crate::macro_model::indicators::IndicatorScoreSet;
use crate::macro_model::indicators::MacroIndicatorSet;
use crate::macro_model::params::MacroParams;
use crate::macro_model::sector::alignment;
use crate::macro_model::sector::resolve_favorability;
use crate::macro_model::sector::Sector;

use super::registry::TickerRegistry;

pub const SCORE_LIMIT: f64 = 10.0;
const MACRO_TERM_WEIGHT: f64 = 0.20;
const FAVORABILITY_WEIGHT: f64 = 2.0;
const FX_BONUS: f64 = 0.10;
const OIL_BONUS: f64 = 0.05;
const MAX_EXPORTER_BONUS: f64 = 0.15;

/// Macro conditions that trigger the exporter bonus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExporterContext {
  pub fx_above_ideal: bool,
  pub oil_above_ideal: bool,
}

impl ExporterContext {
  /// Compare raw FX and oil values against their current references. A missing value or
  /// reference never triggers the bonus.
  pub fn from_macro(macro_set: &MacroIndicatorSet, params: &MacroParams) -> Self {
    let fx_above_ideal = macro_set
      .dolar
      .is_some_and(|d| d.is_finite() && d > params.dolar_ideal);
    let oil_above_ideal = match (macro_set.oil, params.commodity_ideals.oil) {
      (Some(oil), Some(ideal)) => oil.is_finite() && oil > ideal,
      _ => false,
    };
    Self {
      fx_above_ideal,
      oil_above_ideal,
    }
  }

  pub fn bonus(&self, is_exporter: bool) -> f64 {
    if !is_exporter {
      return 0.0;
    }
    let mut bonus = 0.0;
    if self.fx_above_ideal {
      bonus += FX_BONUS;
    }
    if self.oil_above_ideal {
      bonus += OIL_BONUS;
    }
    bonus.clamp(0.0, MAX_EXPORTER_BONUS)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ScoreBreakdown {
  pub upside: f64,
  pub base: f64,
  pub macro_term: f64,
  pub exporter_bonus: f64,
  pub favorability: f64,
}

/// Attractiveness score. `score` is `-inf` exactly when `invalid` is set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssetScore {
  pub score: f64,
  pub breakdown: Option<ScoreBreakdown>,
  pub detail: String,
  #[serde(skip)]
  pub invalid: Option<AllocationError>,
}

impl AssetScore {
  fn rejected(error: AllocationError) -> Self {
    Self {
      score: f64::NEG_INFINITY,
      breakdown: None,
      detail: error.to_string(),
      invalid: Some(error),
    }
  }

  pub fn is_rankable(&self) -> bool {
    self.invalid.is_none()
  }
}

#[derive(Clone, Copy, Debug)]
pub struct AssetScorer {
  exporter: ExporterContext,
  use_macro_weights: bool,
}

impl Default for AssetScorer {
  fn default() -> Self {
    Self {
      exporter: ExporterContext::default(),
      use_macro_weights: true,
    }
  }
}

impl AssetScorer {
  /// `use_macro_weights = false` drops the sector and favorability terms.
  pub fn new(exporter: ExporterContext, use_macro_weights: bool) -> Self {
    Self {
      exporter,
      use_macro_weights,
    }
  }

  pub fn exporter(&self) -> &ExporterContext {
    &self.exporter
  }

  #[allow(clippy::too_many_arguments)]
  pub fn score_asset(
    &self,
    ticker: &str,
    current_price: f64,
    target_price: f64,
    favorability: f64,
    sector: Option<Sector>,
    scores: &IndicatorScoreSet,
    is_exporter: bool,
  ) -> AssetScore {
    if !current_price.is_finite() || current_price <= 0.0 {
      return AssetScore::rejected(AllocationError::invalid_input(
        ticker,
        format!("current price must be positive, got {current_price}"),
      ));
    }
    if !target_price.is_finite() || target_price < 0.0 {
      return AssetScore::rejected(AllocationError::invalid_input(
        ticker,
        format!("target price must be finite and non-negative, got {target_price}"),
      ));
    }

    let upside = (target_price - current_price) / current_price;
    let base = upside.signum() * upside.abs().ln_1p() * 3.0;

    let macro_term = match sector {
      Some(sector) if self.use_macro_weights => {
        alignment(sector, scores).clamp(-SCORE_LIMIT, SCORE_LIMIT)
      }
      _ => 0.0,
    };
    let favorability = if favorability.is_finite() {
      favorability
    } else {
      0.0
    };
    let favorability_weight = if self.use_macro_weights {
      FAVORABILITY_WEIGHT
    } else {
      0.0
    };
    let exporter_bonus = self.exporter.bonus(is_exporter);

    let score = (base
      + MACRO_TERM_WEIGHT * macro_term
      + exporter_bonus
      + favorability_weight * favorability)
      .clamp(-SCORE_LIMIT, SCORE_LIMIT);

    AssetScore {
      score,
      breakdown: Some(ScoreBreakdown {
        upside,
        base,
        macro_term,
        exporter_bonus,
        favorability,
      }),
      detail: format!(
        "upside={upside:.2}, base={base:.2}, macro={macro_term:.2}, bonus={exporter_bonus:.2}, favorability={favorability:.2}, score={score:.2}"
      ),
      invalid: None,
    }
  }
}

/// Favorability of every ticker's sector; unresolved tickers get `0.0` and a condition.
pub fn favorability_by_ticker<S: AsRef<str>>(
  registry: &TickerRegistry,
  tickers: &[S],
  scores: &IndicatorScoreSet,
) -> (Vec<(String, f64)>, Vec<AllocationError>) {
  let mut values = Vec::with_capacity(tickers.len());
  let mut conditions = Vec::new();

  for ticker in tickers {
    let ticker = ticker.as_ref();
    let (f, condition) = resolve_favorability(ticker, registry.sector(ticker), scores);
    values.push((ticker.to_string(), f));
    conditions.extend(condition);
  }

  if !conditions.is_empty() {
    warn!(unresolved = conditions.len(), "tickers without sector");
  }
  debug!(tickers = values.len(), "computed favorability per ticker");
  (values, conditions)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;
  use crate::macro_model::indicators::Indicator;
  use crate::macro_model::indicators::ScoringWeights;

  fn scores() -> IndicatorScoreSet {
    IndicatorScoreSet::from_pairs(
      &[
        (Indicator::PolicyRate, 10.0),
        (Indicator::Inflation, 10.0),
        (Indicator::Fx, 10.0),
        (Indicator::Gdp, 8.0),
      ],
      &ScoringWeights::default(),
    )
  }

  #[test]
  fn non_positive_price_is_unrankable() {
    let scorer = AssetScorer::default();
    for price in [0.0, -3.0, f64::NAN] {
      let s = scorer.score_asset("ITUB4.SA", price, 30.0, 0.5, Some(Sector::Banks), &scores(), false);
      assert_eq!(s.score, f64::NEG_INFINITY);
      assert!(matches!(s.invalid, Some(AllocationError::InvalidInput { .. })));
      assert!(!s.is_rankable());
    }
  }

  #[test]
  fn score_combines_every_term() {
    let scorer = AssetScorer::default();
    let s = scorer.score_asset(
      "HAPV3.SA",
      10.0,
      12.0,
      0.3,
      Some(Sector::Healthcare),
      &scores(),
      false,
    );
    let base = 0.2f64.ln_1p() * 3.0;
    // healthcare alignment: 8 * 0.6
    let expected = base + 0.2 * 4.8 + 2.0 * 0.3;
    assert_abs_diff_eq!(s.score, expected, epsilon = 1e-12);
    let b = s.breakdown.unwrap();
    assert_abs_diff_eq!(b.upside, 0.2, epsilon = 1e-12);
    assert_abs_diff_eq!(b.macro_term, 4.8, epsilon = 1e-12);
    assert!(s.detail.contains("upside=0.20"));
  }

  #[test]
  fn downside_is_negative_and_score_is_clipped() {
    let scorer = AssetScorer::default();
    let down = scorer.score_asset("X", 10.0, 5.0, 0.0, None, &scores(), false);
    assert_abs_diff_eq!(down.score, -(0.5f64.ln_1p()) * 3.0, epsilon = 1e-12);

    let up = scorer.score_asset("X", 1.0, 1e9, 1.99, Some(Sector::Insurance), &scores(), true);
    assert_eq!(up.score, SCORE_LIMIT);
  }

  #[test]
  fn macro_term_is_clipped_to_ten() {
    let scorer = AssetScorer::default();
    // insurance alignment: 20 + 2 + 5.6 = 27.6
    let s = scorer.score_asset("BBSE3.SA", 10.0, 10.0, 0.0, Some(Sector::Insurance), &scores(), false);
    assert_eq!(s.breakdown.unwrap().macro_term, 10.0);
    assert_abs_diff_eq!(s.score, 2.0, epsilon = 1e-12);
  }

  #[test]
  fn exporter_bonus_depends_on_fx_and_oil() {
    let params = MacroParams::default();
    let both = ExporterContext::from_macro(
      &MacroIndicatorSet {
        dolar: Some(5.8),
        oil: Some(90.0),
        ..Default::default()
      },
      &params,
    );
    assert_abs_diff_eq!(both.bonus(true), 0.15, epsilon = 1e-12);
    assert_eq!(both.bonus(false), 0.0);

    let fx_only = ExporterContext::from_macro(
      &MacroIndicatorSet {
        dolar: Some(5.8),
        oil: Some(70.0),
        ..Default::default()
      },
      &params,
    );
    assert_abs_diff_eq!(fx_only.bonus(true), 0.10, epsilon = 1e-12);

    let missing = ExporterContext::from_macro(&MacroIndicatorSet::default(), &params);
    assert_eq!(missing.bonus(true), 0.0);
  }

  #[test]
  fn macro_weights_can_be_disabled() {
    let scorer = AssetScorer::new(ExporterContext::default(), false);
    let s = scorer.score_asset("ITUB4.SA", 10.0, 11.0, 1.5, Some(Sector::Banks), &scores(), false);
    assert_abs_diff_eq!(s.score, 0.1f64.ln_1p() * 3.0, epsilon = 1e-12);
  }

  #[test]
  fn favorability_by_ticker_flags_unknown_tickers() {
    let registry = TickerRegistry::default();
    let (values, conditions) =
      favorability_by_ticker(&registry, &["ITUB4.SA", "NOPE3.SA"], &scores());
    assert_eq!(values.len(), 2);
    assert!(values[0].1 > 0.0);
    assert_eq!(values[1].1, 0.0);
    assert_eq!(conditions.len(), 1);
  }
}
