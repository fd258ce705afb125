//! # Analysis Configuration
//!
//! $$
//! \mathcal C = (\theta_{\text{macro}}, \omega, \tau, \theta_{\text{engine}}, \theta_{\text{valid}})
//! $$
//!
//! Every tunable of one analysis run, loadable from TOML. Missing sections and fields
//! fall back to their defaults.

use serde::Deserialize;
use serde::Serialize;

use crate::asset::registry::RegistryOverrides;
use crate::error::AllocationError;
use crate::macro_model::indicators::ScoringWeights;
use crate::macro_model::params::MacroParams;
use crate::macro_model::scenario::ScenarioConfig;
use crate::portfolio::engine::EngineConfig;
use crate::portfolio::validator::ValidatorConfig;

/// Asset scoring options.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
  /// Include the macro term and favorability in asset scores.
  pub use_macro_weights: bool,
  /// Drop ranked assets scoring below this value.
  pub min_score: Option<f64>,
  /// Allocate only ranked tickers whose sector the current scenario favors.
  pub favored_sectors_only: bool,
  /// Slope magnitude below which a macro trend counts as flat.
  pub trend_flat_tolerance: f64,
}

impl Default for AssetConfig {
  fn default() -> Self {
    Self {
      use_macro_weights: true,
      min_score: None,
      favored_sectors_only: false,
      trend_flat_tolerance: 1e-3,
    }
  }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
  pub params: MacroParams,
  pub weights: ScoringWeights,
  pub scenario: ScenarioConfig,
  pub assets: AssetConfig,
  pub registry: RegistryOverrides,
  pub engine: EngineConfig,
  pub validator: ValidatorConfig,
}

impl AnalysisConfig {
  pub fn from_toml_str(s: &str) -> Result<Self, AllocationError> {
    let config: Self = toml::from_str(s).map_err(|e| AllocationError::Config(e.to_string()))?;
    config.check()?;
    Ok(config)
  }

  /// Reject values no strategy can work with.
  pub fn check(&self) -> Result<(), AllocationError> {
    let engine = &self.engine;
    if !(engine.periods_per_year.is_finite() && engine.periods_per_year > 0.0) {
      return Err(AllocationError::Config(format!(
        "periods_per_year must be positive, got {}",
        engine.periods_per_year
      )));
    }
    if !(0.0..=1.0).contains(&engine.ensemble_alpha) {
      return Err(AllocationError::Config(format!(
        "ensemble_alpha must lie in [0, 1], got {}",
        engine.ensemble_alpha
      )));
    }
    if !(0.0..=1.0).contains(&engine.sharpe_lower_bound) {
      return Err(AllocationError::Config(format!(
        "sharpe_lower_bound must lie in [0, 1], got {}",
        engine.sharpe_lower_bound
      )));
    }
    if engine.max_iters == 0 {
      return Err(AllocationError::Config("max_iters must be at least 1".to_string()));
    }
    if self.validator.tolerance < 0.0 {
      return Err(AllocationError::Config(format!(
        "validator tolerance must be non-negative, got {}",
        self.validator.tolerance
      )));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::macro_model::params::InflationBandOrdering;
  use crate::macro_model::scenario::RegimeAdjustment;
  use crate::macro_model::sector::Sector;
  use crate::portfolio::optimizers::SamplerKind;
  use crate::portfolio::shrinkage::CovarianceMethod;

  #[test]
  fn empty_document_gives_defaults() {
    let config = AnalysisConfig::from_toml_str("").unwrap();
    assert_eq!(config, AnalysisConfig::default());
    assert_eq!(config.engine.max_iters, 1000);
    assert_eq!(config.validator.min_diversification, 5);
  }

  #[test]
  fn sections_override_selected_fields() {
    let config = AnalysisConfig::from_toml_str(
      r#"
        [params]
        selic_neutral = 10.5
        inflation_ordering = "deflation_aware"

        [params.commodity_ideals]
        oil = 75.0

        [scenario]
        regime_adjustment = "regime_aware"

        [engine]
        covariance = "sample"
        sampler = "dirichlet"
        monte_carlo_samples = 1000
        time_budget_ms = 250

        [registry.sectors]
        "NEWC3.SA" = "banks"
      "#,
    )
    .unwrap();

    assert_eq!(config.params.selic_neutral, 10.5);
    assert_eq!(config.params.ipca_target, 3.0);
    assert_eq!(
      config.params.inflation_ordering,
      InflationBandOrdering::DeflationAware
    );
    assert_eq!(config.params.commodity_ideals.oil, Some(75.0));
    assert_eq!(config.params.commodity_ideals.soy, Some(13.0));
    assert_eq!(
      config.scenario.regime_adjustment,
      RegimeAdjustment::RegimeAware
    );
    assert_eq!(config.engine.covariance, CovarianceMethod::Sample);
    assert_eq!(config.engine.sampler, SamplerKind::Dirichlet);
    assert_eq!(config.engine.time_budget_ms, Some(250));
    assert_eq!(config.engine.seed, 42);
    assert_eq!(
      config.registry.sectors.get("NEWC3.SA"),
      Some(&Sector::Banks)
    );
  }

  #[test]
  fn invalid_values_are_config_errors() {
    let err = AnalysisConfig::from_toml_str("[engine]\nensemble_alpha = 1.5").unwrap_err();
    assert!(matches!(err, AllocationError::Config(_)));

    let err = AnalysisConfig::from_toml_str("[engine]\ncovariance = \"shrunk\"").unwrap_err();
    assert!(matches!(err, AllocationError::Config(_)));
  }
}
