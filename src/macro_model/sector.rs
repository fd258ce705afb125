//! # Sector Favorability
//!
//! $$
//! f(\text{sector}) = 2\tanh\left(\frac{1}{5}\sum_k s_k\,\beta_{\text{sector},k}\right) \in (-2, 2)
//! $$
//!
//! Closed sector enumeration, its fixed sensitivity table and the saturating favorability map.

use std::fmt::Display;

use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use super::indicators::Indicator;
use super::indicators::IndicatorScoreSet;
use super::scenario::ScenarioLabel;
use crate::error::AllocationError;

/// Largest magnitude returned by [`favorability`].
const FAVORABILITY_LIMIT: f64 = 2.0 * (1.0 - f64::EPSILON);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
  ConsumerDiscretionary,
  Technology,
  IndustrialsCapitalGoods,
  MiningSteel,
  OilGasBiofuels,
  Agribusiness,
  Healthcare,
  ConsumerStaples,
  PublicUtilities,
  ElectricPower,
  Banks,
  Insurance,
  ExchangesFinancialServices,
  Communication,
}

impl Sector {
  pub const COUNT: usize = 14;

  pub const ALL: [Sector; Self::COUNT] = [
    Sector::ConsumerDiscretionary,
    Sector::Technology,
    Sector::IndustrialsCapitalGoods,
    Sector::MiningSteel,
    Sector::OilGasBiofuels,
    Sector::Agribusiness,
    Sector::Healthcare,
    Sector::ConsumerStaples,
    Sector::PublicUtilities,
    Sector::ElectricPower,
    Sector::Banks,
    Sector::Insurance,
    Sector::ExchangesFinancialServices,
    Sector::Communication,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Sector::ConsumerDiscretionary => "Consumer Discretionary",
      Sector::Technology => "Technology",
      Sector::IndustrialsCapitalGoods => "Industrials & Capital Goods",
      Sector::MiningSteel => "Mining & Steel",
      Sector::OilGasBiofuels => "Oil, Gas & Biofuels",
      Sector::Agribusiness => "Agribusiness",
      Sector::Healthcare => "Healthcare",
      Sector::ConsumerStaples => "Consumer Staples",
      Sector::PublicUtilities => "Public Utilities",
      Sector::ElectricPower => "Electric Power",
      Sector::Banks => "Banks",
      Sector::Insurance => "Insurance",
      Sector::ExchangesFinancialServices => "Exchanges & Financial Services",
      Sector::Communication => "Communication",
    }
  }

  /// Sensitivity weights in [`Indicator::ALL`] order: policy rate, inflation, FX, GDP,
  /// agricultural commodities, iron ore, oil.
  pub fn sensitivity(self) -> [f64; Indicator::COUNT] {
    match self {
      // pro-cyclical
      Sector::ConsumerDiscretionary => [-2.0, -1.0, -1.0, 2.5, -0.5, -0.5, -0.2],
      Sector::Technology => [-1.5, 0.0, -1.0, 2.0, -0.2, -0.2, 0.0],
      Sector::IndustrialsCapitalGoods => [-1.0, -0.5, -0.5, 2.2, 0.0, 0.2, 0.0],
      Sector::MiningSteel => [0.0, 0.0, 2.0, 1.2, 0.0, 2.5, 0.6],
      Sector::OilGasBiofuels => [0.0, 0.0, 1.5, 1.0, 0.0, 0.0, 2.7],
      Sector::Agribusiness => [-0.5, -0.6, 1.7, 1.1, 2.7, 0.0, 0.4],
      // defensive
      Sector::Healthcare => [0.0, 0.0, 0.0, 0.6, 0.0, 0.0, 0.0],
      Sector::ConsumerStaples => [0.7, -1.2, -0.7, 0.6, -0.2, -0.2, -0.1],
      Sector::PublicUtilities => [1.2, 0.7, -0.6, -0.6, -0.2, -0.2, 0.0],
      Sector::ElectricPower => [0.5, 0.5, -0.7, -0.7, -0.3, -0.2, 0.1],
      // financials
      Sector::Banks => [1.6, -0.1, -0.3, 1.1, 0.3, 0.2, 0.0],
      Sector::Insurance => [2.0, 0.2, 0.0, 0.7, 0.0, 0.0, 0.0],
      Sector::ExchangesFinancialServices => [1.0, 0.0, 0.0, 1.5, 0.0, 0.0, 0.0],
      Sector::Communication => [0.0, 0.0, -0.3, 0.5, 0.0, 0.0, 0.0],
    }
  }

  pub fn weight(self, indicator: Indicator) -> f64 {
    self.sensitivity()[indicator.index()]
  }
}

impl Display for Sector {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.name())
  }
}

/// Raw alignment `Σ_k s_k β_k` between the current scores and a sector's sensitivity.
pub fn alignment(sector: Sector, scores: &IndicatorScoreSet) -> f64 {
  scores
    .iter()
    .map(|(indicator, score)| score * sector.weight(indicator))
    .sum()
}

/// Saturating favorability in the open interval `(-2, 2)`.
pub fn favorability(sector: Sector, scores: &IndicatorScoreSet) -> f64 {
  let raw = alignment(sector, scores);
  if !raw.is_finite() {
    return 0.0;
  }
  ((raw / 5.0).tanh() * 2.0).clamp(-FAVORABILITY_LIMIT, FAVORABILITY_LIMIT)
}

/// Favorability for a possibly unresolved sector.
///
/// An unresolved sector yields `0.0` together with an [`AllocationError::UnresolvedSector`]
/// condition for the caller to surface.
pub fn resolve_favorability(
  ticker: &str,
  sector: Option<Sector>,
  scores: &IndicatorScoreSet,
) -> (f64, Option<AllocationError>) {
  match sector {
    Some(sector) => (favorability(sector, scores), None),
    None => {
      warn!(ticker, "unresolved sector, favorability set to 0");
      (
        0.0,
        Some(AllocationError::UnresolvedSector {
          ticker: ticker.to_string(),
        }),
      )
    }
  }
}

/// Sectors most favored in each phase of the cycle.
pub fn favored_sectors(label: ScenarioLabel) -> &'static [Sector] {
  match label {
    ScenarioLabel::StrongExpansion => &[
      Sector::ConsumerDiscretionary,
      Sector::Technology,
      Sector::IndustrialsCapitalGoods,
      Sector::Agribusiness,
      Sector::MiningSteel,
      Sector::OilGasBiofuels,
    ],
    ScenarioLabel::ModerateExpansion => &[
      Sector::ConsumerDiscretionary,
      Sector::Technology,
      Sector::IndustrialsCapitalGoods,
      Sector::Agribusiness,
      Sector::MiningSteel,
      Sector::OilGasBiofuels,
      Sector::Healthcare,
    ],
    ScenarioLabel::Stable => &[
      Sector::Healthcare,
      Sector::Banks,
      Sector::Insurance,
      Sector::ExchangesFinancialServices,
      Sector::ConsumerStaples,
      Sector::PublicUtilities,
      Sector::Communication,
    ],
    ScenarioLabel::ModerateContraction => &[
      Sector::Banks,
      Sector::Insurance,
      Sector::ConsumerStaples,
      Sector::PublicUtilities,
      Sector::Healthcare,
      Sector::ElectricPower,
      Sector::Communication,
    ],
    ScenarioLabel::StrongContraction => &[
      Sector::PublicUtilities,
      Sector::ConsumerStaples,
      Sector::ElectricPower,
      Sector::Healthcare,
    ],
  }
}
