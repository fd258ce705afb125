//! # Allocation Engine
//!
//! $$
//! \mathbf{w}^\* = \operatorname{Optimize}_{s}(\mu, \Sigma, \rho, \mathbf f)
//! $$
//!
//! Single entry point running every allocation strategy on a prepared return universe.
//! Every result is expressed over the originally requested tickers.

use std::collections::BTreeMap;
use std::time::Duration;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use super::data::annualized_mean_returns;
use super::data::correlation_matrix;
use super::data::prepare_universe;
use super::data::scale_matrix;
use super::data::PreparedUniverse;
use super::data::ReturnSeries;
use super::optimizers::apply_favorability_tilt;
use super::optimizers::blend_weights;
use super::optimizers::checked_outcome;
use super::optimizers::efficient_frontier;
use super::optimizers::hrp_weights;
use super::optimizers::macro_adjusted_returns;
use super::optimizers::monte_carlo_frontier;
use super::optimizers::monte_carlo_multipliers;
use super::optimizers::proportional_start;
use super::optimizers::sharpe_bounds;
use super::optimizers::sharpe_multipliers;
use super::optimizers::solve_with_retry;
use super::optimizers::MonteCarloConfig;
use super::optimizers::MonteCarloFrontier;
use super::optimizers::NegativeReturn;
use super::optimizers::NegativeSharpe;
use super::optimizers::SamplerKind;
use super::optimizers::SolveOutcome;
use super::shrinkage::estimate_covariance;
use super::shrinkage::CovarianceMethod;
use super::solver::minimize;
use super::solver::SolverConfig;
use super::types::Bounds;
use super::types::CloudPoint;
use super::types::FrontierPoint;
use super::types::OptimizationResult;
use super::types::OptimizationStatus;
use super::types::PortfolioStats;
use super::types::Strategy;
use super::types::WeightVector;
use crate::error::AllocationError;

/// Runtime configuration for [`AllocationEngine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Annual risk-free rate used in every Sharpe ratio.
  pub risk_free: f64,
  /// Periods per year used to annualize mean and covariance.
  pub periods_per_year: f64,
  pub covariance: CovarianceMethod,
  pub max_iters: u64,
  pub ftol: f64,
  /// Wall-clock budget per optimization request.
  pub time_budget_ms: Option<u64>,
  pub monte_carlo_samples: usize,
  pub sampler: SamplerKind,
  pub seed: u64,
  /// Fewest return observations a ticker needs to be optimized.
  pub min_history: usize,
  /// Tilt HRP weights by positive favorability when favorability is supplied.
  pub hrp_favorability_tilt: bool,
  pub ensemble_alpha: f64,
  /// Floor of every Sharpe-macro weight.
  pub sharpe_lower_bound: f64,
  /// Per-asset cap of the max-return strategy.
  pub max_return_cap: f64,
  pub frontier_points: usize,
  /// Per-asset cap along the efficient frontier.
  pub frontier_cap: f64,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      risk_free: 0.0,
      periods_per_year: 252.0,
      covariance: CovarianceMethod::LedoitWolf,
      max_iters: 1000,
      ftol: 1e-9,
      time_budget_ms: None,
      monte_carlo_samples: 50_000,
      sampler: SamplerKind::UniformNormalized,
      seed: 42,
      min_history: 20,
      hrp_favorability_tilt: true,
      ensemble_alpha: 0.5,
      sharpe_lower_bound: 0.01,
      max_return_cap: 0.20,
      frontier_points: 50,
      frontier_cap: 1.0,
    }
  }
}

/// Per-request inputs beyond the return series.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptimizeParams {
  /// Sector favorability per ticker; missing tickers count as 0.
  pub favorability: Option<BTreeMap<String, f64>>,
  /// Ensemble blend weight on HRP, overrides the configured default.
  pub alpha: Option<f64>,
  /// Hard cut-off for iterative solvers, overrides the configured budget.
  pub deadline: Option<Instant>,
  /// Keep the Monte-Carlo cloud in the result.
  pub include_cloud: bool,
}

impl OptimizeParams {
  pub fn with_favorability<I, S>(favorability: I) -> Self
  where
    I: IntoIterator<Item = (S, f64)>,
    S: Into<String>,
  {
    Self {
      favorability: Some(favorability.into_iter().map(|(t, f)| (t.into(), f)).collect()),
      ..Default::default()
    }
  }
}

/// Re-insert every requested ticker, zero-filling the ones absent from `partial`.
pub fn complete_weights<S: AsRef<str>>(original: &[S], partial: &WeightVector) -> WeightVector {
  WeightVector::new(
    original
      .iter()
      .map(|t| {
        let t = t.as_ref();
        (t.to_string(), partial.get(t).unwrap_or(0.0))
      })
      .collect(),
  )
}

/// Estimates shared by every strategy of one request.
struct MarketInputs {
  universe: PreparedUniverse,
  mu: Vec<f64>,
  cov: Vec<Vec<f64>>,
  corr: Vec<Vec<f64>>,
  favorability: Vec<f64>,
  has_favorability: bool,
}

/// Single entry point for allocation workflows.
#[derive(Clone, Debug, Default)]
pub struct AllocationEngine {
  config: EngineConfig,
}

impl AllocationEngine {
  pub fn new(config: EngineConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  fn deadline(&self, params: &OptimizeParams) -> Option<Instant> {
    params.deadline.or_else(|| {
      self
        .config
        .time_budget_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms))
    })
  }

  fn solver_config(&self, deadline: Option<Instant>) -> SolverConfig {
    SolverConfig {
      max_iters: self.config.max_iters,
      ftol: self.config.ftol,
      deadline,
      ..Default::default()
    }
  }

  fn market_inputs<S: AsRef<str>>(
    &self,
    tickers: &[S],
    returns: &ReturnSeries,
    params: &OptimizeParams,
  ) -> MarketInputs {
    let universe = prepare_universe(tickers, returns, self.config.min_history);
    let mu = annualized_mean_returns(&universe.returns, self.config.periods_per_year);
    let mut cov = estimate_covariance(&universe.returns, self.config.covariance);
    scale_matrix(&mut cov, self.config.periods_per_year);
    let corr = correlation_matrix(&universe.returns);
    let favorability = universe
      .tickers
      .iter()
      .map(|t| {
        params
          .favorability
          .as_ref()
          .and_then(|f| f.get(t))
          .copied()
          .filter(|f| f.is_finite())
          .unwrap_or(0.0)
      })
      .collect();

    MarketInputs {
      universe,
      mu,
      cov,
      corr,
      favorability,
      has_favorability: params.favorability.is_some(),
    }
  }

  /// Run one strategy.
  pub fn optimize<S: AsRef<str>>(
    &self,
    strategy: Strategy,
    tickers: &[S],
    returns: &ReturnSeries,
    params: &OptimizeParams,
  ) -> OptimizationResult {
    let inputs = self.market_inputs(tickers, returns, params);
    let mut run = StrategyRun::new(self, &inputs, params, self.deadline(params));
    run.result(strategy)
  }

  /// Run every strategy on one shared universe, reusing intermediate allocations.
  pub fn optimize_all<S: AsRef<str>>(
    &self,
    tickers: &[S],
    returns: &ReturnSeries,
    params: &OptimizeParams,
  ) -> Vec<OptimizationResult> {
    let inputs = self.market_inputs(tickers, returns, params);
    let mut run = StrategyRun::new(self, &inputs, params, self.deadline(params));
    Strategy::ALL.iter().map(|&s| run.result(s)).collect()
  }

  /// Efficient frontier over the usable tickers, weights completed to the request.
  pub fn efficient_frontier<S: AsRef<str>>(
    &self,
    tickers: &[S],
    returns: &ReturnSeries,
    params: &OptimizeParams,
  ) -> Vec<FrontierPoint> {
    let inputs = self.market_inputs(tickers, returns, params);
    if inputs.universe.len() < 2 {
      warn!(
        valid = inputs.universe.len(),
        "efficient frontier needs at least 2 valid tickers"
      );
      return Vec::new();
    }

    let solver = self.solver_config(self.deadline(params));
    efficient_frontier(
      &inputs.universe.tickers,
      &inputs.mu,
      &inputs.cov,
      self.config.risk_free,
      self.config.frontier_points,
      self.config.frontier_cap,
      &solver,
    )
    .into_iter()
    .map(|p| FrontierPoint {
      weights: complete_weights(&inputs.universe.requested, &p.weights),
      ..p
    })
    .collect()
  }
}

/// Lazily computed allocations of one request, shared between strategies.
struct StrategyRun<'a> {
  engine: &'a AllocationEngine,
  inputs: &'a MarketInputs,
  params: &'a OptimizeParams,
  solver: SolverConfig,
  rng: StdRng,
  sharpe: Option<OptimizationResult>,
  monte_carlo: Option<MonteCarloFrontier>,
  hrp: Option<Vec<f64>>,
}

impl<'a> StrategyRun<'a> {
  fn new(
    engine: &'a AllocationEngine,
    inputs: &'a MarketInputs,
    params: &'a OptimizeParams,
    deadline: Option<Instant>,
  ) -> Self {
    Self {
      engine,
      inputs,
      params,
      solver: engine.solver_config(deadline),
      rng: StdRng::seed_from_u64(engine.config.seed),
      sharpe: None,
      monte_carlo: None,
      hrp: None,
    }
  }

  fn result(&mut self, strategy: Strategy) -> OptimizationResult {
    let valid = self.inputs.universe.len();
    if valid < strategy.min_tickers() {
      warn!(%strategy, valid, "not enough valid tickers, returning zero weights");
      let mut result = OptimizationResult::insufficient(
        strategy,
        &self.inputs.universe.requested,
        valid,
        self.inputs.universe.excluded_tickers(),
      );
      let mut conditions = self.inputs.universe.excluded.clone();
      conditions.append(&mut result.conditions);
      result.conditions = conditions;
      return result;
    }

    let result = match strategy {
      Strategy::SharpeMacro => self.sharpe_macro(),
      Strategy::MaxReturn => self.max_return(),
      Strategy::Hrp => self.hrp(),
      Strategy::MonteCarlo => self.monte_carlo(),
      Strategy::SharpeFromMonteCarloSeed => self.sharpe_from_seed(),
      Strategy::Ensemble => self.ensemble(),
    };
    info!(
      %strategy,
      status = ?result.status,
      sharpe = result.sharpe,
      "strategy finished"
    );
    result
  }

  fn finish(
    &self,
    strategy: Strategy,
    outcome: SolveOutcome,
    bounds: Bounds,
    cloud: Option<Vec<CloudPoint>>,
  ) -> OptimizationResult {
    let universe = &self.inputs.universe;
    let stats = PortfolioStats::compute(
      &outcome.weights,
      &self.inputs.mu,
      &self.inputs.cov,
      self.engine.config.risk_free,
    );
    let partial = WeightVector::from_parts(&universe.tickers, &outcome.weights);

    let mut full_bounds = Bounds::default();
    for ticker in &universe.requested {
      match universe.tickers.iter().position(|t| t == ticker) {
        Some(i) => {
          full_bounds.lower.push(bounds.lower[i]);
          full_bounds.upper.push(bounds.upper[i]);
        }
        None => {
          full_bounds.lower.push(0.0);
          full_bounds.upper.push(0.0);
        }
      }
    }

    let mut conditions = universe.excluded.clone();
    conditions.extend(outcome.conditions);

    OptimizationResult {
      strategy,
      weights: complete_weights(&universe.requested, &partial),
      expected_return: stats.expected_return,
      volatility: stats.volatility,
      sharpe: stats.sharpe,
      success: matches!(
        outcome.status,
        OptimizationStatus::Converged | OptimizationStatus::Retried
      ),
      status: outcome.status,
      message: outcome.message,
      bounds: Some(full_bounds),
      conditions,
      excluded: universe.excluded_tickers(),
      cloud,
    }
  }

  fn sharpe_problem(&self) -> (NegativeSharpe, Bounds, Vec<f64>) {
    let multipliers = sharpe_multipliers(&self.inputs.favorability);
    let mut bounds = sharpe_bounds(&multipliers, self.engine.config.sharpe_lower_bound);
    bounds.repair();
    let problem = NegativeSharpe {
      mu: macro_adjusted_returns(&self.inputs.mu, &multipliers),
      cov: self.inputs.cov.clone(),
      risk_free: self.engine.config.risk_free,
    };
    (problem, bounds, proportional_start(&multipliers))
  }

  fn sharpe_macro(&mut self) -> OptimizationResult {
    if let Some(cached) = &self.sharpe {
      return cached.clone();
    }
    let (problem, bounds, x0) = self.sharpe_problem();
    let outcome = solve_with_retry(
      Strategy::SharpeMacro,
      &problem,
      &x0,
      &bounds,
      &self.solver,
      &mut self.rng,
    );
    let result = self.finish(Strategy::SharpeMacro, outcome, bounds, None);
    self.sharpe = Some(result.clone());
    result
  }

  fn max_return(&mut self) -> OptimizationResult {
    let n = self.inputs.universe.len();
    let mut bounds = Bounds::uniform(n, 0.0, self.engine.config.max_return_cap);
    bounds.repair();
    let problem = NegativeReturn {
      mu: self.inputs.mu.clone(),
    };
    let outcome = solve_with_retry(
      Strategy::MaxReturn,
      &problem,
      &proportional_start(&self.inputs.mu),
      &bounds,
      &self.solver,
      &mut self.rng,
    );
    self.finish(Strategy::MaxReturn, outcome, bounds, None)
  }

  fn hrp_weights(&mut self) -> Vec<f64> {
    if let Some(cached) = &self.hrp {
      return cached.clone();
    }
    let mut weights = hrp_weights(&self.inputs.cov, &self.inputs.corr);
    if self.engine.config.hrp_favorability_tilt && self.inputs.has_favorability {
      weights = apply_favorability_tilt(&weights, &self.inputs.favorability);
    }
    self.hrp = Some(weights.clone());
    weights
  }

  fn hrp(&mut self) -> OptimizationResult {
    let weights = self.hrp_weights();
    let bounds = Bounds::uniform(self.inputs.universe.len(), 0.0, 1.0);
    let outcome = checked_outcome(Strategy::Hrp, weights, &bounds, "hierarchical risk parity");
    self.finish(Strategy::Hrp, outcome, bounds, None)
  }

  fn monte_carlo_frontier(&mut self) -> MonteCarloFrontier {
    if let Some(cached) = &self.monte_carlo {
      return cached.clone();
    }
    let config = &self.engine.config;
    let multipliers = monte_carlo_multipliers(&self.inputs.favorability);
    let frontier = monte_carlo_frontier(
      &macro_adjusted_returns(&self.inputs.mu, &multipliers),
      &self.inputs.cov,
      config.risk_free,
      &MonteCarloConfig {
        samples: config.monte_carlo_samples,
        sampler: config.sampler,
        seed: config.seed,
        keep_cloud: self.params.include_cloud,
      },
    );
    self.monte_carlo = Some(frontier.clone());
    frontier
  }

  fn monte_carlo(&mut self) -> OptimizationResult {
    let frontier = self.monte_carlo_frontier();
    let bounds = Bounds::uniform(self.inputs.universe.len(), 0.0, 1.0);
    let outcome = checked_outcome(
      Strategy::MonteCarlo,
      frontier.best,
      &bounds,
      format!("best of {} sampled portfolios", frontier.samples),
    );
    let cloud = self.params.include_cloud.then_some(frontier.cloud);
    self.finish(Strategy::MonteCarlo, outcome, bounds, cloud)
  }

  fn sharpe_from_seed(&mut self) -> OptimizationResult {
    let seed = self.monte_carlo_frontier().best;
    let (problem, bounds, _) = self.sharpe_problem();
    let refined = minimize(&problem, &seed, &bounds, &self.solver);
    if refined.converged {
      let outcome = SolveOutcome {
        weights: refined.weights,
        status: OptimizationStatus::Converged,
        message: format!(
          "converged in {} iterations from the Monte-Carlo seed",
          refined.iterations
        ),
        conditions: Vec::new(),
      };
      return self.finish(Strategy::SharpeFromMonteCarloSeed, outcome, bounds, None);
    }

    warn!(reason = %refined.reason, "seeded Sharpe solve failed, using Sharpe-macro result");
    let mut result = self.sharpe_macro();
    result.strategy = Strategy::SharpeFromMonteCarloSeed;
    result.message = format!("seeded solve failed ({}), {}", refined.reason, result.message);
    result.conditions.push(AllocationError::OptimizationFailure {
      strategy: Strategy::SharpeFromMonteCarloSeed,
      reason: refined.reason,
    });
    result
  }

  fn ensemble(&mut self) -> OptimizationResult {
    let alpha = self
      .params
      .alpha
      .unwrap_or(self.engine.config.ensemble_alpha);
    let hrp = self.hrp_weights();
    let mc = self.monte_carlo_frontier().best;
    let bounds = Bounds::uniform(self.inputs.universe.len(), 0.0, 1.0);
    let outcome = checked_outcome(
      Strategy::Ensemble,
      blend_weights(&hrp, &mc, alpha),
      &bounds,
      format!("HRP/Monte-Carlo blend with alpha {:.2}", alpha.clamp(0.0, 1.0)),
    );
    self.finish(Strategy::Ensemble, outcome, bounds, None)
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use rand_distr::Distribution;
  use rand_distr::Normal;
  use tracing_test::traced_test;

  use super::*;

  const TICKERS: [&str; 6] = [
    "ITUB4.SA", "VALE3.SA", "PETR4.SA", "WEGE3.SA", "ABEV3.SA", "EGIE3.SA",
  ];

  fn synthetic_returns(periods: usize) -> ReturnSeries {
    let mut rng = StdRng::seed_from_u64(2024);
    let market = Normal::new(0.0004, 0.01).unwrap();
    let factor: Vec<f64> = (0..periods).map(|_| market.sample(&mut rng)).collect();
    TICKERS
      .iter()
      .enumerate()
      .map(|(i, t)| {
        let idio = Normal::new(0.0002 * i as f64, 0.006 + 0.002 * i as f64).unwrap();
        let beta = 0.5 + 0.15 * i as f64;
        let series: Vec<f64> = factor
          .iter()
          .map(|f| beta * f + idio.sample(&mut rng))
          .collect();
        (*t, series)
      })
      .collect()
  }

  fn engine() -> AllocationEngine {
    AllocationEngine::new(EngineConfig {
      monte_carlo_samples: 5_000,
      ..Default::default()
    })
  }

  fn favorability() -> OptimizeParams {
    OptimizeParams::with_favorability([
      ("ITUB4.SA", 1.2),
      ("VALE3.SA", -0.4),
      ("PETR4.SA", 0.3),
      ("WEGE3.SA", 1.8),
      ("ABEV3.SA", -1.1),
      ("EGIE3.SA", 0.0),
    ])
  }

  #[test]
  fn every_strategy_sums_to_one_within_bounds() {
    let returns = synthetic_returns(250);
    let results = engine().optimize_all(&TICKERS, &returns, &favorability());
    assert_eq!(results.len(), Strategy::ALL.len());

    for result in &results {
      assert_eq!(result.weights.tickers(), TICKERS.to_vec());
      assert_abs_diff_eq!(result.weights.sum(), 1.0, epsilon = 1e-3);
      let bounds = result.bounds.as_ref().unwrap();
      assert!(
        bounds.contains(&result.weights.weights(), 1e-9),
        "{} violates its bounds",
        result.strategy
      );
      assert!(result.volatility > 0.0);
    }
  }

  #[test]
  fn sharpe_macro_caps_follow_favorability() {
    let returns = synthetic_returns(250);
    let result = engine().optimize(Strategy::SharpeMacro, &TICKERS, &returns, &favorability());
    let bounds = result.bounds.unwrap();
    assert_eq!(bounds.lower, vec![0.01; 6]);
    assert!(bounds.upper[3] > bounds.upper[4]);
    assert!(bounds.upper.iter().sum::<f64>() >= 1.0 - 1e-12);
  }

  #[test]
  fn short_history_is_excluded_and_zero_filled() {
    let mut returns = synthetic_returns(250);
    returns.insert("NEW11.SA", vec![0.01; 5]);
    let mut tickers = TICKERS.to_vec();
    tickers.push("NEW11.SA");

    let result = engine().optimize(Strategy::Hrp, &tickers, &returns, &OptimizeParams::default());
    assert_eq!(result.weights.len(), 7);
    assert_eq!(result.weights.get("NEW11.SA"), Some(0.0));
    assert_eq!(result.excluded, vec!["NEW11.SA".to_string()]);
    assert!(matches!(
      result.conditions[0],
      AllocationError::DataUnavailable { .. }
    ));
    assert_abs_diff_eq!(result.weights.sum(), 1.0, epsilon = 1e-9);
  }

  #[test]
  fn too_few_tickers_yield_zero_weights() {
    let returns = synthetic_returns(250);
    let engine = engine();

    let hrp = engine.optimize(
      Strategy::Hrp,
      &["ITUB4.SA", "VALE3.SA", "MISSING.SA"],
      &returns,
      &OptimizeParams::default(),
    );
    assert_eq!(hrp.status, OptimizationStatus::InsufficientData);
    assert_eq!(hrp.weights.weights(), vec![0.0; 3]);
    assert!(hrp
      .conditions
      .iter()
      .any(|c| matches!(c, AllocationError::InsufficientData { available: 2, .. })));

    let sharpe = engine.optimize(
      Strategy::SharpeMacro,
      &["ITUB4.SA", "VALE3.SA"],
      &returns,
      &OptimizeParams::default(),
    );
    assert!(sharpe.success);

    for strategy in Strategy::ALL {
      let single = engine.optimize(strategy, &["ITUB4.SA"], &returns, &OptimizeParams::default());
      assert_eq!(single.weights.weights(), vec![0.0]);
      assert!(!single.success);
    }
    let none = engine.optimize::<&str>(Strategy::MonteCarlo, &[], &returns, &OptimizeParams::default());
    assert!(none.weights.is_empty());
  }

  #[test]
  fn ensemble_endpoints_match_components() {
    let returns = synthetic_returns(250);
    let engine = engine();
    let params = favorability();

    let hrp = engine.optimize(Strategy::Hrp, &TICKERS, &returns, &params);
    let mc = engine.optimize(Strategy::MonteCarlo, &TICKERS, &returns, &params);
    let all_hrp = engine.optimize(
      Strategy::Ensemble,
      &TICKERS,
      &returns,
      &OptimizeParams {
        alpha: Some(1.0),
        ..params.clone()
      },
    );
    let all_mc = engine.optimize(
      Strategy::Ensemble,
      &TICKERS,
      &returns,
      &OptimizeParams {
        alpha: Some(0.0),
        ..params.clone()
      },
    );

    for ((h, m), (eh, em)) in hrp
      .weights
      .weights()
      .iter()
      .zip(mc.weights.weights())
      .zip(all_hrp.weights.weights().iter().zip(all_mc.weights.weights()))
    {
      assert_abs_diff_eq!(*h, *eh, epsilon = 1e-12);
      assert_abs_diff_eq!(m, em, epsilon = 1e-12);
    }
  }

  #[traced_test]
  #[test]
  fn expired_deadline_falls_back_to_uniform() {
    let returns = synthetic_returns(250);
    let params = OptimizeParams {
      deadline: Some(Instant::now()),
      ..Default::default()
    };
    let result = engine().optimize(Strategy::MaxReturn, &TICKERS, &returns, &params);
    assert!(result.is_fallback());
    assert!(!result.success);
    for (_, w) in result.weights.iter() {
      assert_abs_diff_eq!(w, 1.0 / 6.0, epsilon = 1e-9);
    }
    assert!(matches!(
      result.conditions.last(),
      Some(AllocationError::OptimizationFailure {
        strategy: Strategy::MaxReturn,
        ..
      })
    ));
    assert!(logs_contain("deadline exceeded"));
  }

  #[test]
  fn monte_carlo_cloud_is_opt_in() {
    let returns = synthetic_returns(120);
    let engine = engine();
    let without = engine.optimize(Strategy::MonteCarlo, &TICKERS, &returns, &OptimizeParams::default());
    assert!(without.cloud.is_none());

    let with = engine.optimize(
      Strategy::MonteCarlo,
      &TICKERS,
      &returns,
      &OptimizeParams {
        include_cloud: true,
        ..Default::default()
      },
    );
    assert_eq!(with.cloud.map(|c| c.len()), Some(5_000));
  }

  #[test]
  fn frontier_weights_cover_the_request() {
    let returns = synthetic_returns(250);
    let engine = AllocationEngine::new(EngineConfig {
      frontier_points: 10,
      ..Default::default()
    });
    let mut tickers = TICKERS.to_vec();
    tickers.push("MISSING.SA");
    let points = engine.efficient_frontier(&tickers, &returns, &OptimizeParams::default());
    assert!(!points.is_empty());
    for p in &points {
      assert_eq!(p.weights.len(), 7);
      assert_eq!(p.weights.get("MISSING.SA"), Some(0.0));
    }
  }

  #[test]
  fn complete_weights_keeps_request_order() {
    let partial = WeightVector::from_parts(&["B", "C"], &[0.4, 0.6]);
    let full = complete_weights(&["A", "B", "C", "D"], &partial);
    assert_eq!(full.tickers(), vec!["A", "B", "C", "D"]);
    assert_eq!(full.weights(), vec![0.0, 0.4, 0.6, 0.0]);
  }

  #[traced_test]
  #[test]
  fn empty_monte_carlo_cloud_falls_back_to_uniform() {
    let returns = synthetic_returns(250);
    let engine = AllocationEngine::new(EngineConfig {
      monte_carlo_samples: 0,
      ..Default::default()
    });
    let params = favorability();

    for strategy in [Strategy::MonteCarlo, Strategy::Ensemble] {
      let result = engine.optimize(strategy, &TICKERS, &returns, &params);
      assert_eq!(result.status, OptimizationStatus::Fallback, "{strategy}");
      assert!(!result.success);
      assert_abs_diff_eq!(result.weights.sum(), 1.0, epsilon = 1e-9);
      for (_, w) in result.weights.iter() {
        assert_abs_diff_eq!(w, 1.0 / TICKERS.len() as f64, epsilon = 1e-9);
      }
      assert!(result
        .conditions
        .iter()
        .any(|c| matches!(c, AllocationError::OptimizationFailure { .. })));
    }
    assert!(logs_contain("falling back to uniform weights"));

    let hrp = engine.optimize(Strategy::Hrp, &TICKERS, &returns, &params);
    assert_eq!(hrp.status, OptimizationStatus::Converged);
  }
}
