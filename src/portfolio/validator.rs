//! # Portfolio Validator
//!
//! $$
//! \#\{i : w_i > s\} \ge k_{\min}, \qquad \max_i w_i \le c_{\max}, \qquad \Big|\sum_i w_i - 1\Big| \le \varepsilon
//! $$
//!
//! Diversification and concentration produce warnings. A broken normalization makes
//! the vector invalid.

use std::fmt::Display;

use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use super::types::WeightVector;
use crate::error::AllocationError;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
  /// Fewest tickers above `significance` before a warning.
  pub min_diversification: usize,
  /// Largest single weight before a warning.
  pub max_concentration: f64,
  pub significance: f64,
  /// Allowed distance of the weight sum from 1.
  pub tolerance: f64,
}

impl Default for ValidatorConfig {
  fn default() -> Self {
    Self {
      min_diversification: 5,
      max_concentration: 0.40,
      significance: 0.01,
      tolerance: 1e-3,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ValidationWarning {
  LowDiversification { significant: usize, minimum: usize },
  Concentration { ticker: String, weight: f64, maximum: f64 },
}

impl Display for ValidationWarning {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ValidationWarning::LowDiversification {
        significant,
        minimum,
      } => write!(
        f,
        "low diversification: {significant} significant positions, recommended minimum {minimum}"
      ),
      ValidationWarning::Concentration {
        ticker,
        weight,
        maximum,
      } => write!(
        f,
        "high concentration: {ticker} holds {:.1}%, recommended maximum {:.1}%",
        weight * 100.0,
        maximum * 100.0
      ),
    }
  }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ValidationReport {
  pub is_valid: bool,
  pub warnings: Vec<ValidationWarning>,
  pub errors: Vec<AllocationError>,
}

/// Check `weights` against `config`. Never modifies the vector.
pub fn validate(weights: &WeightVector, config: &ValidatorConfig) -> ValidationReport {
  let mut report = ValidationReport {
    is_valid: true,
    ..Default::default()
  };

  let non_finite: Vec<&str> = weights
    .iter()
    .filter(|(_, w)| !w.is_finite())
    .map(|(t, _)| t)
    .collect();
  if !non_finite.is_empty() {
    report.errors.push(AllocationError::ValidationFailure(format!(
      "non-finite weights for {}",
      non_finite.join(", ")
    )));
  }

  let significant = weights
    .iter()
    .filter(|(_, w)| *w > config.significance)
    .count();
  if significant < config.min_diversification {
    report.warnings.push(ValidationWarning::LowDiversification {
      significant,
      minimum: config.min_diversification,
    });
  }

  if let Some((ticker, weight)) = weights.max_entry() {
    if weight > config.max_concentration {
      report.warnings.push(ValidationWarning::Concentration {
        ticker: ticker.to_string(),
        weight,
        maximum: config.max_concentration,
      });
    }
  }

  let total = weights.sum();
  let normalized = (total - 1.0).abs() <= config.tolerance;
  if !normalized {
    report.errors.push(AllocationError::ValidationFailure(format!(
      "weights sum to {total:.3}, expected 1"
    )));
  }

  report.is_valid = report.errors.is_empty();
  for warning in &report.warnings {
    warn!(%warning, "portfolio validation warning");
  }
  for error in &report.errors {
    warn!(%error, "portfolio validation error");
  }
  info!(
    is_valid = report.is_valid,
    warnings = report.warnings.len(),
    errors = report.errors.len(),
    "portfolio validated"
  );
  report
}
