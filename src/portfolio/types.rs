//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\mathbb E[R_p]-r_f}{\sigma_p},
//! \qquad \sum_i w_i = 1,\ l_i \le w_i \le u_i
//! $$
//!
//! Shared enums and result containers for the allocation strategies.

use std::fmt::Display;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::error::AllocationError;

/// Supported allocation strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
  /// Sharpe maximization with macro-scaled returns and favorability-dependent caps.
  SharpeMacro,
  /// Expected-return maximization under a fixed per-asset cap.
  MaxReturn,
  /// Hierarchical Risk Parity (Lopez de Prado).
  Hrp,
  /// Argmax-Sharpe candidate of a random weight cloud.
  MonteCarlo,
  /// Sharpe-macro solve started from the Monte-Carlo candidate.
  SharpeFromMonteCarloSeed,
  /// Convex blend of HRP and Monte-Carlo weights.
  Ensemble,
}

impl Strategy {
  pub const ALL: [Strategy; 6] = [
    Strategy::SharpeMacro,
    Strategy::MaxReturn,
    Strategy::Hrp,
    Strategy::MonteCarlo,
    Strategy::SharpeFromMonteCarloSeed,
    Strategy::Ensemble,
  ];

  /// Fewest valid tickers the strategy runs on.
  pub fn min_tickers(self) -> usize {
    match self {
      Strategy::SharpeMacro
      | Strategy::MaxReturn
      | Strategy::MonteCarlo
      | Strategy::SharpeFromMonteCarloSeed => 2,
      Strategy::Hrp | Strategy::Ensemble => 3,
    }
  }
}

impl Display for Strategy {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Strategy::SharpeMacro => write!(f, "Sharpe-macro"),
      Strategy::MaxReturn => write!(f, "max-return"),
      Strategy::Hrp => write!(f, "HRP"),
      Strategy::MonteCarlo => write!(f, "Monte-Carlo"),
      Strategy::SharpeFromMonteCarloSeed => write!(f, "Sharpe-from-MC-seed"),
      Strategy::Ensemble => write!(f, "ensemble"),
    }
  }
}

impl FromStr for Strategy {
  type Err = AllocationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().replace('_', "-").as_str() {
      "sharpe" | "sharpe-macro" => Ok(Self::SharpeMacro),
      "max-return" | "maxreturn" => Ok(Self::MaxReturn),
      "hrp" => Ok(Self::Hrp),
      "mc" | "monte-carlo" | "montecarlo" => Ok(Self::MonteCarlo),
      "sharpe-mc" | "sharpe-from-mc-seed" | "sharpe-from-monte-carlo-seed" => {
        Ok(Self::SharpeFromMonteCarloSeed)
      }
      "ensemble" | "hrp-mc" => Ok(Self::Ensemble),
      other => Err(AllocationError::Config(format!("unknown strategy '{other}'"))),
    }
  }
}

/// Ticker to weight mapping in a fixed ticker order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WeightVector {
  entries: Vec<(String, f64)>,
}

impl WeightVector {
  pub fn new(entries: Vec<(String, f64)>) -> Self {
    Self { entries }
  }

  /// Pair `tickers` with `weights`; missing weights are 0.
  pub fn from_parts<S: AsRef<str>>(tickers: &[S], weights: &[f64]) -> Self {
    Self {
      entries: tickers
        .iter()
        .enumerate()
        .map(|(i, t)| (t.as_ref().to_string(), weights.get(i).copied().unwrap_or(0.0)))
        .collect(),
    }
  }

  pub fn zeros<S: AsRef<str>>(tickers: &[S]) -> Self {
    Self::from_parts(tickers, &[])
  }

  pub fn get(&self, ticker: &str) -> Option<f64> {
    self
      .entries
      .iter()
      .find(|(t, _)| t == ticker)
      .map(|&(_, w)| w)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
    self.entries.iter().map(|(t, w)| (t.as_str(), *w))
  }

  pub fn tickers(&self) -> Vec<&str> {
    self.entries.iter().map(|(t, _)| t.as_str()).collect()
  }

  pub fn weights(&self) -> Vec<f64> {
    self.entries.iter().map(|&(_, w)| w).collect()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn sum(&self) -> f64 {
    self.entries.iter().map(|&(_, w)| w).sum()
  }

  /// Ticker with the largest weight.
  pub fn max_entry(&self) -> Option<(&str, f64)> {
    self
      .iter()
      .fold(None, |best: Option<(&str, f64)>, (t, w)| match best {
        Some((_, bw)) if bw >= w => best,
        _ => Some((t, w)),
      })
  }
}

/// Per-asset box constraints aligned with a ticker list.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Bounds {
  pub lower: Vec<f64>,
  pub upper: Vec<f64>,
}

impl Bounds {
  pub fn uniform(n: usize, lower: f64, upper: f64) -> Self {
    Self {
      lower: vec![lower; n],
      upper: vec![upper; n],
    }
  }

  pub fn len(&self) -> usize {
    self.lower.len()
  }

  pub fn is_empty(&self) -> bool {
    self.lower.is_empty()
  }

  /// Whether some `w` with `Σw = 1` fits inside the box.
  pub fn is_feasible(&self) -> bool {
    let lo: f64 = self.lower.iter().sum();
    let hi: f64 = self.upper.iter().sum();
    lo <= 1.0 + 1e-12 && hi >= 1.0 - 1e-12 && self.lower.iter().zip(&self.upper).all(|(l, u)| l <= u)
  }

  /// Make the box feasible: caps summing below 1 are lifted by a common shift, floors
  /// summing above 1 are dropped to 0. Returns whether anything changed.
  pub fn repair(&mut self) -> bool {
    let n = self.len();
    if n == 0 {
      return false;
    }
    let mut repaired = false;

    let lo: f64 = self.lower.iter().sum();
    if lo > 1.0 {
      warn!(sum_lower = lo, "lower bounds exceed 1, dropping floors");
      self.lower.iter_mut().for_each(|l| *l = 0.0);
      repaired = true;
    }

    let hi: f64 = self.upper.iter().sum();
    if hi < 1.0 {
      let shift = (1.0 - hi) / n as f64;
      warn!(sum_upper = hi, shift, "upper bounds below 1, lifting caps");
      for u in &mut self.upper {
        *u = (*u + shift).min(1.0);
      }
      repaired = true;
    }

    for (l, u) in self.lower.iter_mut().zip(self.upper.iter_mut()) {
      if *l > *u {
        *l = *u;
        repaired = true;
      }
    }

    repaired
  }

  /// Whether `w` respects every bound within `tol`.
  pub fn contains(&self, w: &[f64], tol: f64) -> bool {
    w.len() == self.len()
      && w
        .iter()
        .zip(self.lower.iter().zip(&self.upper))
        .all(|(&x, (&l, &u))| x >= l - tol && x <= u + tol)
  }
}

/// How a strategy arrived at its weights.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStatus {
  /// Solved on the first attempt.
  #[default]
  Converged,
  /// Solved after the randomized restart.
  Retried,
  /// Both attempts failed, uniform weights returned.
  Fallback,
  /// Too few valid tickers, all-zero weights returned.
  InsufficientData,
}

/// Model statistics of a weight vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PortfolioStats {
  pub expected_return: f64,
  pub volatility: f64,
  pub sharpe: f64,
}

impl PortfolioStats {
  pub fn compute(w: &[f64], mu: &[f64], cov: &[Vec<f64>], risk_free: f64) -> Self {
    let expected_return = dot(w, mu);
    let sigma_w = mat_vec_mul(cov, w);
    let volatility = dot(w, &sigma_w).max(0.0).sqrt();
    let sharpe = if volatility > 1e-15 {
      (expected_return - risk_free) / volatility
    } else {
      0.0
    };
    Self {
      expected_return,
      volatility,
      sharpe,
    }
  }
}

/// One sample of the Monte-Carlo cloud.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct CloudPoint {
  pub expected_return: f64,
  pub volatility: f64,
  pub sharpe: f64,
}

/// One solved point of the efficient frontier.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FrontierPoint {
  pub target_return: f64,
  pub expected_return: f64,
  pub volatility: f64,
  pub sharpe: f64,
  pub weights: WeightVector,
}

/// Output of one strategy run, always over the originally requested tickers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OptimizationResult {
  pub strategy: Strategy,
  pub weights: WeightVector,
  pub expected_return: f64,
  pub volatility: f64,
  pub sharpe: f64,
  pub success: bool,
  pub status: OptimizationStatus,
  pub message: String,
  /// Bounds actually enforced, aligned with `weights`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub bounds: Option<Bounds>,
  pub conditions: Vec<AllocationError>,
  /// Requested tickers that were not optimized.
  pub excluded: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cloud: Option<Vec<CloudPoint>>,
}

impl OptimizationResult {
  /// All-zero result for a strategy that could not run.
  pub fn insufficient<S: AsRef<str>>(
    strategy: Strategy,
    tickers: &[S],
    available: usize,
    excluded: Vec<String>,
  ) -> Self {
    let condition = AllocationError::InsufficientData {
      strategy,
      required: strategy.min_tickers(),
      available,
    };
    Self {
      strategy,
      weights: WeightVector::zeros(tickers),
      expected_return: 0.0,
      volatility: 0.0,
      sharpe: 0.0,
      success: false,
      status: OptimizationStatus::InsufficientData,
      message: condition.to_string(),
      bounds: None,
      conditions: vec![condition],
      excluded,
      cloud: None,
    }
  }

  pub fn is_fallback(&self) -> bool {
    self.status == OptimizationStatus::Fallback
  }
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
  a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub(crate) fn mat_vec_mul(mat: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
  mat
    .iter()
    .map(|row| row.iter().zip(v.iter()).map(|(a, b)| a * b).sum())
    .collect()
}
