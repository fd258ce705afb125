//! # Errors
//!
//! $$
//! \text{outcome} \in \{\text{value}\} \cup \{\text{flagged condition}\}
//! $$
//!
//! Error taxonomy shared by scoring, allocation and validation. Most entry points
//! are total and carry these as values next to their result instead of returning them.

use serde::Serialize;
use thiserror::Error;

use crate::portfolio::types::Strategy;

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationError {
  /// Missing price, target or return history for a ticker.
  #[error("data unavailable for {ticker}: {reason}")]
  DataUnavailable { ticker: String, reason: String },
  /// Input present but unusable (e.g. non-positive price).
  #[error("invalid input for {ticker}: {reason}")]
  InvalidInput { ticker: String, reason: String },
  /// Ticker has no known sector.
  #[error("unresolved sector for {ticker}")]
  UnresolvedSector { ticker: String },
  /// Solver did not converge, even after the randomized retry.
  #[error("{strategy} optimization failed: {reason}")]
  OptimizationFailure { strategy: Strategy, reason: String },
  /// Too few usable tickers for the strategy.
  #[error("{strategy} needs at least {required} valid tickers, got {available}")]
  InsufficientData {
    strategy: Strategy,
    required: usize,
    available: usize,
  },
  /// Weight vector is malformed.
  #[error("validation failed: {0}")]
  ValidationFailure(String),
  #[error("invalid configuration: {0}")]
  Config(String),
}

impl AllocationError {
  pub fn data_unavailable(ticker: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::DataUnavailable {
      ticker: ticker.into(),
      reason: reason.into(),
    }
  }

  pub fn invalid_input(ticker: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::InvalidInput {
      ticker: ticker.into(),
      reason: reason.into(),
    }
  }
}
