//! # Macro Indicators
//!
//! $$
//! \bar s = \frac{\sum_k w_k s_k}{\sum_k w_k}, \qquad s_k \in [0, 10]
//! $$
//!
//! Raw indicator inputs and the bounded per-indicator score set derived from them.

use std::fmt::Display;

use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

/// Scored macro dimension. Soy and corn collapse into [`Indicator::AgroCommodities`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
  PolicyRate,
  Inflation,
  Fx,
  Gdp,
  AgroCommodities,
  IronOre,
  Oil,
}

impl Indicator {
  pub const COUNT: usize = 7;

  pub const ALL: [Indicator; Self::COUNT] = [
    Indicator::PolicyRate,
    Indicator::Inflation,
    Indicator::Fx,
    Indicator::Gdp,
    Indicator::AgroCommodities,
    Indicator::IronOre,
    Indicator::Oil,
  ];

  /// Position in fixed-shape score and sensitivity vectors.
  pub fn index(self) -> usize {
    self as usize
  }

  pub fn name(self) -> &'static str {
    match self {
      Indicator::PolicyRate => "policy_rate",
      Indicator::Inflation => "inflation",
      Indicator::Fx => "fx",
      Indicator::Gdp => "gdp",
      Indicator::AgroCommodities => "agro_commodities",
      Indicator::IronOre => "iron_ore",
      Indicator::Oil => "oil",
    }
  }
}

impl Display for Indicator {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.name())
  }
}

/// Raw macro series as supplied by the data layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawIndicator {
  Selic,
  Ipca,
  Dolar,
  Pib,
  Soy,
  Corn,
  IronOre,
  Oil,
}

impl RawIndicator {
  pub const ALL: [RawIndicator; 8] = [
    RawIndicator::Selic,
    RawIndicator::Ipca,
    RawIndicator::Dolar,
    RawIndicator::Pib,
    RawIndicator::Soy,
    RawIndicator::Corn,
    RawIndicator::IronOre,
    RawIndicator::Oil,
  ];

  /// Headline indicators feeding the scenario core score.
  pub const HEADLINE: [RawIndicator; 4] = [
    RawIndicator::Selic,
    RawIndicator::Ipca,
    RawIndicator::Dolar,
    RawIndicator::Pib,
  ];

  pub fn name(self) -> &'static str {
    match self {
      RawIndicator::Selic => "selic",
      RawIndicator::Ipca => "ipca",
      RawIndicator::Dolar => "dolar",
      RawIndicator::Pib => "pib",
      RawIndicator::Soy => "soy",
      RawIndicator::Corn => "corn",
      RawIndicator::IronOre => "iron_ore",
      RawIndicator::Oil => "oil",
    }
  }
}

/// Macro indicator values for one analysis run. Any field may be absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroIndicatorSet {
  /// Policy rate (% p.a.).
  pub selic: Option<f64>,
  /// Inflation (% p.a.).
  pub ipca: Option<f64>,
  /// FX rate (BRL per USD).
  pub dolar: Option<f64>,
  /// GDP growth (%).
  pub pib: Option<f64>,
  pub soy: Option<f64>,
  pub corn: Option<f64>,
  pub iron_ore: Option<f64>,
  pub oil: Option<f64>,
}

impl MacroIndicatorSet {
  pub fn get(&self, indicator: RawIndicator) -> Option<f64> {
    match indicator {
      RawIndicator::Selic => self.selic,
      RawIndicator::Ipca => self.ipca,
      RawIndicator::Dolar => self.dolar,
      RawIndicator::Pib => self.pib,
      RawIndicator::Soy => self.soy,
      RawIndicator::Corn => self.corn,
      RawIndicator::IronOre => self.iron_ore,
      RawIndicator::Oil => self.oil,
    }
  }

  /// Value if present and finite.
  pub fn finite(&self, indicator: RawIndicator) -> Option<f64> {
    self.get(indicator).filter(|v| v.is_finite())
  }

  /// Replace every absent or non-finite value by `0.0`, logging each substitution.
  pub fn normalized(&self) -> ResolvedIndicators {
    let resolve = |indicator: RawIndicator| match self.finite(indicator) {
      Some(v) => v,
      None => {
        warn!(
          indicator = indicator.name(),
          "macro indicator missing or invalid, substituting 0.0"
        );
        0.0
      }
    };

    ResolvedIndicators {
      selic: resolve(RawIndicator::Selic),
      ipca: resolve(RawIndicator::Ipca),
      dolar: resolve(RawIndicator::Dolar),
      pib: resolve(RawIndicator::Pib),
      soy: resolve(RawIndicator::Soy),
      corn: resolve(RawIndicator::Corn),
      iron_ore: resolve(RawIndicator::IronOre),
      oil: resolve(RawIndicator::Oil),
    }
  }
}

/// [`MacroIndicatorSet`] after explicit zero substitution.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ResolvedIndicators {
  pub selic: f64,
  pub ipca: f64,
  pub dolar: f64,
  pub pib: f64,
  pub soy: f64,
  pub corn: f64,
  pub iron_ore: f64,
  pub oil: f64,
}

/// Per-indicator scores in `[0, 10]` plus their weighted aggregate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct IndicatorScoreSet {
  scores: [f64; Indicator::COUNT],
  /// Weighted mean of all indicator scores.
  pub aggregate: f64,
}

impl IndicatorScoreSet {
  /// Build from raw scores and compute the aggregate with `weights`.
  pub fn new(scores: [f64; Indicator::COUNT], weights: &ScoringWeights) -> Self {
    let aggregate = weights.aggregate(&scores);
    Self { scores, aggregate }
  }

  /// Build from `(indicator, score)` pairs; indicators not listed score 0.
  pub fn from_pairs(pairs: &[(Indicator, f64)], weights: &ScoringWeights) -> Self {
    let mut scores = [0.0; Indicator::COUNT];
    for &(indicator, score) in pairs {
      scores[indicator.index()] = score;
    }
    Self::new(scores, weights)
  }

  pub fn get(&self, indicator: Indicator) -> f64 {
    self.scores[indicator.index()]
  }

  pub fn as_array(&self) -> &[f64; Indicator::COUNT] {
    &self.scores
  }

  pub fn iter(&self) -> impl Iterator<Item = (Indicator, f64)> + '_ {
    Indicator::ALL.iter().map(move |&i| (i, self.scores[i.index()]))
  }
}

/// Aggregation weight per indicator, 1 by default.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
  pub policy_rate: f64,
  pub inflation: f64,
  pub fx: f64,
  pub gdp: f64,
  pub agro_commodities: f64,
  pub iron_ore: f64,
  pub oil: f64,
}

impl Default for ScoringWeights {
  fn default() -> Self {
    Self {
      policy_rate: 1.0,
      inflation: 1.0,
      fx: 1.0,
      gdp: 1.0,
      agro_commodities: 1.0,
      iron_ore: 1.0,
      oil: 1.0,
    }
  }
}

impl ScoringWeights {
  pub fn as_array(&self) -> [f64; Indicator::COUNT] {
    [
      self.policy_rate,
      self.inflation,
      self.fx,
      self.gdp,
      self.agro_commodities,
      self.iron_ore,
      self.oil,
    ]
  }

  /// Weighted arithmetic mean; `0` when the weights sum to zero or less.
  pub fn aggregate(&self, scores: &[f64; Indicator::COUNT]) -> f64 {
    let weights = self.as_array();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
      return 0.0;
    }
    scores
      .iter()
      .zip(weights.iter())
      .map(|(s, w)| s * w)
      .sum::<f64>()
      / total
  }
}
