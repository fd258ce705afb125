//! # Scenario Classifier
//!
//! $$
//! S = s_{rate} + s_{infl} + s_{fx} + s_{gdp} + 0.1\,(s_{agro} + s_{iron} + s_{oil})
//! $$
//!
//! Step-function mapping from the total indicator score to one of five ordered macro
//! scenarios, with an optional regime-aware threshold set.

use std::fmt::Display;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::indicators::Indicator;
use super::indicators::IndicatorScoreSet;

/// Macro scenario, ordered from strongest expansion to strongest contraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioLabel {
  StrongExpansion,
  ModerateExpansion,
  Stable,
  ModerateContraction,
  StrongContraction,
}

impl ScenarioLabel {
  pub const ALL: [ScenarioLabel; 5] = [
    ScenarioLabel::StrongExpansion,
    ScenarioLabel::ModerateExpansion,
    ScenarioLabel::Stable,
    ScenarioLabel::ModerateContraction,
    ScenarioLabel::StrongContraction,
  ];
}

impl Display for ScenarioLabel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ScenarioLabel::StrongExpansion => write!(f, "Strong Expansion"),
      ScenarioLabel::ModerateExpansion => write!(f, "Moderate Expansion"),
      ScenarioLabel::Stable => write!(f, "Stable"),
      ScenarioLabel::ModerateContraction => write!(f, "Moderate Contraction"),
      ScenarioLabel::StrongContraction => write!(f, "Strong Contraction"),
    }
  }
}

/// Lower bounds of the total score for the four upper scenarios.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ThresholdSet {
  pub name: &'static str,
  pub strong_expansion: f64,
  pub moderate_expansion: f64,
  pub stable: f64,
  pub moderate_contraction: f64,
}

impl ThresholdSet {
  pub const BASE: ThresholdSet = ThresholdSet {
    name: "base",
    strong_expansion: 38.0,
    moderate_expansion: 32.0,
    stable: 26.0,
    moderate_contraction: 14.0,
  };

  /// Looser set used while a recession is identified.
  pub const RECESSION: ThresholdSet = ThresholdSet {
    name: "recession",
    strong_expansion: 34.0,
    moderate_expansion: 28.0,
    stable: 22.0,
    moderate_contraction: 12.0,
  };

  /// Tighter set used while strong growth is identified.
  pub const STRONG_GROWTH: ThresholdSet = ThresholdSet {
    name: "strong_growth",
    strong_expansion: 39.0,
    moderate_expansion: 34.0,
    stable: 28.0,
    moderate_contraction: 16.0,
  };

  pub fn label(&self, total: f64) -> ScenarioLabel {
    if total >= self.strong_expansion {
      ScenarioLabel::StrongExpansion
    } else if total >= self.moderate_expansion {
      ScenarioLabel::ModerateExpansion
    } else if total >= self.stable {
      ScenarioLabel::Stable
    } else if total >= self.moderate_contraction {
      ScenarioLabel::ModerateContraction
    } else {
      ScenarioLabel::StrongContraction
    }
  }
}

/// Macro regime identified from the headline scores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroRegime {
  StrongGrowth,
  Stability,
  Slowdown,
  Recession,
}

impl Display for MacroRegime {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      MacroRegime::StrongGrowth => write!(f, "Strong Growth"),
      MacroRegime::Stability => write!(f, "Stability"),
      MacroRegime::Slowdown => write!(f, "Slowdown"),
      MacroRegime::Recession => write!(f, "Recession"),
    }
  }
}

/// Classify the regime: growth above ideal with contained inflation and rates is strong
/// growth, GDP two or more points under ideal is recession, any headline strain is slowdown.
pub fn identify_regime(scores: &IndicatorScoreSet) -> MacroRegime {
  let gdp = scores.get(Indicator::Gdp);
  let inflation = scores.get(Indicator::Inflation);
  let rate = scores.get(Indicator::PolicyRate);

  if gdp >= 9.0 && inflation >= 5.0 && rate >= 4.0 {
    MacroRegime::StrongGrowth
  } else if gdp <= 2.0 {
    MacroRegime::Recession
  } else if gdp < 8.0 || rate <= 0.0 || inflation <= 0.0 {
    MacroRegime::Slowdown
  } else {
    MacroRegime::Stability
  }
}

/// Threshold selection policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeAdjustment {
  /// Always use [`ThresholdSet::BASE`].
  #[default]
  Disabled,
  /// Pick the threshold set from the identified [`MacroRegime`].
  RegimeAware,
}

impl RegimeAdjustment {
  pub fn thresholds(self, regime: MacroRegime) -> ThresholdSet {
    match self {
      RegimeAdjustment::Disabled => ThresholdSet::BASE,
      RegimeAdjustment::RegimeAware => match regime {
        MacroRegime::StrongGrowth => ThresholdSet::STRONG_GROWTH,
        MacroRegime::Recession => ThresholdSet::RECESSION,
        MacroRegime::Stability | MacroRegime::Slowdown => ThresholdSet::BASE,
      },
    }
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
  pub regime_adjustment: RegimeAdjustment,
}

/// Full classification detail.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ScenarioAssessment {
  pub core_score: f64,
  pub commodity_score: f64,
  pub total_score: f64,
  pub regime: MacroRegime,
  pub thresholds: ThresholdSet,
  pub label: ScenarioLabel,
}

/// Sum of the four headline scores.
pub fn core_score(scores: &IndicatorScoreSet) -> f64 {
  scores.get(Indicator::PolicyRate)
    + scores.get(Indicator::Inflation)
    + scores.get(Indicator::Fx)
    + scores.get(Indicator::Gdp)
}

/// One tenth of the commodity scores.
pub fn commodity_score(scores: &IndicatorScoreSet) -> f64 {
  0.1
    * (scores.get(Indicator::AgroCommodities)
      + scores.get(Indicator::IronOre)
      + scores.get(Indicator::Oil))
}

pub fn total_score(scores: &IndicatorScoreSet) -> f64 {
  core_score(scores) + commodity_score(scores)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ScenarioClassifier {
  config: ScenarioConfig,
}

impl ScenarioClassifier {
  pub fn new(config: ScenarioConfig) -> Self {
    Self { config }
  }

  pub fn assess(&self, scores: &IndicatorScoreSet) -> ScenarioAssessment {
    let core = core_score(scores);
    let commodity = commodity_score(scores);
    let total = core + commodity;
    let regime = identify_regime(scores);
    let thresholds = self.config.regime_adjustment.thresholds(regime);
    let label = thresholds.label(total);

    debug!(
      total,
      %regime,
      thresholds = thresholds.name,
      %label,
      "classified macro scenario"
    );

    ScenarioAssessment {
      core_score: core,
      commodity_score: commodity,
      total_score: total,
      regime,
      thresholds,
      label,
    }
  }

  pub fn classify(&self, scores: &IndicatorScoreSet) -> ScenarioLabel {
    self.assess(scores).label
  }
}

/// Classify with the base thresholds.
pub fn classify_scenario(scores: &IndicatorScoreSet) -> ScenarioLabel {
  ThresholdSet::BASE.label(total_score(scores))
}
