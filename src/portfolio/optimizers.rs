//! # Allocation Strategies
//!
//! $$
//! \max_{\mathbf{w}}\ \frac{\mathbf{w}^\top(\mathbf{m}\odot\mu)-r_f}{\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}},
//! \qquad w^{\text{HRP}}_{L} = 1-\frac{V_L}{V_L+V_R}
//! $$
//!
//! Objectives, macro multipliers, Hierarchical Risk Parity, the Monte-Carlo cloud,
//! the HRP/Monte-Carlo blend and the efficient frontier sweep.

use std::collections::BTreeSet;
use std::ops::Range;

use argmin::core::CostFunction;
use argmin::core::Gradient;
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::Exp1;
use rayon::prelude::*;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::solver::minimize;
use super::solver::project_capped_simplex;
use super::solver::SolverConfig;
use super::types::dot;
use super::types::mat_vec_mul;
use super::types::Bounds;
use super::types::CloudPoint;
use super::types::FrontierPoint;
use super::types::OptimizationStatus;
use super::types::PortfolioStats;
use super::types::Strategy;
use super::types::WeightVector;
use crate::error::AllocationError;

/// Base per-asset cap of the Sharpe-macro strategy.
pub const SHARPE_BASE_CAP: f64 = 0.20;
/// Cap change per unit of multiplier above 1.
pub const SHARPE_CAP_BONUS: f64 = 0.10;
const MONTE_CARLO_CHUNK: usize = 4096;
const FRONTIER_PENALTY: f64 = 100.0;

/// Negative Sharpe ratio of `w`.
pub struct NegativeSharpe {
  pub mu: Vec<f64>,
  pub cov: Vec<Vec<f64>>,
  pub risk_free: f64,
}

impl NegativeSharpe {
  fn volatility(&self, w: &[f64]) -> Result<(f64, Vec<f64>), argmin::core::Error> {
    let sigma_w = mat_vec_mul(&self.cov, w);
    let sigma = dot(w, &sigma_w).max(0.0).sqrt();
    if sigma <= 1e-12 {
      return Err(argmin::core::Error::msg("portfolio volatility is zero"));
    }
    Ok((sigma, sigma_w))
  }
}

impl CostFunction for NegativeSharpe {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    let (sigma, _) = self.volatility(x)?;
    Ok(-(dot(x, &self.mu) - self.risk_free) / sigma)
  }
}

impl Gradient for NegativeSharpe {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
    let (sigma, sigma_w) = self.volatility(x)?;
    let excess = dot(x, &self.mu) - self.risk_free;
    let sigma3 = sigma * sigma * sigma;
    Ok(
      self
        .mu
        .iter()
        .zip(&sigma_w)
        .map(|(m, sw)| -(m / sigma - excess * sw / sigma3))
        .collect(),
    )
  }
}

/// Negative expected return of `w`.
pub struct NegativeReturn {
  pub mu: Vec<f64>,
}

impl CostFunction for NegativeReturn {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    Ok(-dot(x, &self.mu))
  }
}

impl Gradient for NegativeReturn {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, _x: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
    Ok(self.mu.iter().map(|m| -m).collect())
  }
}

/// Variance with a quadratic penalty on missing the target return.
pub struct TargetVariance {
  pub mu: Vec<f64>,
  pub cov: Vec<Vec<f64>>,
  pub target_return: f64,
  pub penalty: f64,
}

impl CostFunction for TargetVariance {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    let sigma_w = mat_vec_mul(&self.cov, x);
    let gap = dot(x, &self.mu) - self.target_return;
    Ok(dot(x, &sigma_w) + self.penalty * gap * gap)
  }
}

impl Gradient for TargetVariance {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
    let sigma_w = mat_vec_mul(&self.cov, x);
    let gap = dot(x, &self.mu) - self.target_return;
    Ok(
      sigma_w
        .iter()
        .zip(&self.mu)
        .map(|(sw, m)| 2.0 * sw + 2.0 * self.penalty * gap * m)
        .collect(),
    )
  }
}

fn min_max(xs: &[f64]) -> (f64, f64) {
  xs.iter()
    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
      (lo.min(x), hi.max(x))
    })
}

/// Favorability rescaled linearly to `[0.7, 1.3]`; 1 for every ticker when all are equal.
pub fn sharpe_multipliers(favorability: &[f64]) -> Vec<f64> {
  let (lo, hi) = min_max(favorability);
  if favorability.is_empty() || hi - lo <= f64::EPSILON {
    return vec![1.0; favorability.len()];
  }
  favorability
    .iter()
    .map(|f| 0.7 + 0.6 * (f - lo) / (hi - lo))
    .collect()
}

/// Scores rescaled to `0.5 + (s - min) / (max - min + 1e-9)`; 1 for every ticker when all are equal.
pub fn monte_carlo_multipliers(scores: &[f64]) -> Vec<f64> {
  let (lo, hi) = min_max(scores);
  if scores.is_empty() || hi - lo <= f64::EPSILON {
    return vec![1.0; scores.len()];
  }
  scores
    .iter()
    .map(|s| 0.5 + (s - lo) / (hi - lo + 1e-9))
    .collect()
}

/// Per-asset `[lower, min(1, 0.20 + 0.10 (m - 1))]`.
pub fn sharpe_bounds(multipliers: &[f64], lower: f64) -> Bounds {
  Bounds {
    lower: vec![lower; multipliers.len()],
    upper: multipliers
      .iter()
      .map(|m| (SHARPE_BASE_CAP + SHARPE_CAP_BONUS * (m - 1.0)).min(1.0))
      .collect(),
  }
}

pub fn macro_adjusted_returns(mu: &[f64], multipliers: &[f64]) -> Vec<f64> {
  mu.iter().zip(multipliers).map(|(m, k)| m * k).collect()
}

/// Start point proportional to `seed`, uniform when `seed` has no positive mass.
pub fn proportional_start(seed: &[f64]) -> Vec<f64> {
  let n = seed.len();
  let clipped: Vec<f64> = seed.iter().map(|s| s.max(0.0)).collect();
  let total: f64 = clipped.iter().sum();
  if total > 1e-15 && total.is_finite() {
    clipped.iter().map(|s| s / total).collect()
  } else {
    vec![1.0 / n.max(1) as f64; n]
  }
}

/// Uniform weights pushed into `bounds`.
pub fn uniform_within(bounds: &Bounds) -> Vec<f64> {
  let n = bounds.len();
  project_capped_simplex(&vec![1.0 / n.max(1) as f64; n], bounds)
}

fn random_feasible_start(bounds: &Bounds, rng: &mut StdRng) -> Vec<f64> {
  let raw: Vec<f64> = (0..bounds.len()).map(|_| rng.gen::<f64>()).collect();
  project_capped_simplex(&proportional_start(&raw), bounds)
}

/// Weights of one solved strategy before they are mapped back onto tickers.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveOutcome {
  pub weights: Vec<f64>,
  pub status: OptimizationStatus,
  pub message: String,
  pub conditions: Vec<AllocationError>,
}

/// Solve from `x0`; on failure retry once from a random feasible point, then fall
/// back to uniform weights inside `bounds`.
pub fn solve_with_retry<P>(
  strategy: Strategy,
  problem: &P,
  x0: &[f64],
  bounds: &Bounds,
  config: &SolverConfig,
  rng: &mut StdRng,
) -> SolveOutcome
where
  P: CostFunction<Param = Vec<f64>, Output = f64> + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
{
  let first = minimize(problem, x0, bounds, config);
  if first.converged {
    debug!(%strategy, iterations = first.iterations, "optimization converged");
    return SolveOutcome {
      weights: first.weights,
      status: OptimizationStatus::Converged,
      message: format!("converged in {} iterations", first.iterations),
      conditions: Vec::new(),
    };
  }

  warn!(%strategy, reason = %first.reason, "optimization failed, retrying from a random start");
  let start = random_feasible_start(bounds, rng);
  let second = minimize(problem, &start, bounds, config);
  if second.converged {
    return SolveOutcome {
      weights: second.weights,
      status: OptimizationStatus::Retried,
      message: format!(
        "converged in {} iterations after retry ({})",
        second.iterations, first.reason
      ),
      conditions: Vec::new(),
    };
  }

  warn!(%strategy, reason = %second.reason, "retry failed, falling back to uniform weights");
  let reason = format!("{}; retry: {}", first.reason, second.reason);
  SolveOutcome {
    weights: uniform_within(bounds),
    status: OptimizationStatus::Fallback,
    message: format!("uniform fallback: {reason}"),
    conditions: vec![AllocationError::OptimizationFailure { strategy, reason }],
  }
}

/// Accept closed-form weights that are finite, non-negative and cover `bounds`; otherwise
/// fall back to uniform weights inside `bounds`.
pub fn checked_outcome(
  strategy: Strategy,
  weights: Vec<f64>,
  bounds: &Bounds,
  message: impl Into<String>,
) -> SolveOutcome {
  let total: f64 = weights.iter().sum();
  let usable = weights.len() == bounds.len()
    && weights.iter().all(|w| w.is_finite() && *w >= 0.0)
    && (total - 1.0).abs() <= 1e-6;
  if usable {
    return SolveOutcome {
      weights,
      status: OptimizationStatus::Converged,
      message: message.into(),
      conditions: Vec::new(),
    };
  }

  let reason = if weights.len() != bounds.len() {
    format!("expected {} weights, got {}", bounds.len(), weights.len())
  } else {
    format!("unusable weights summing to {total}")
  };
  warn!(%strategy, %reason, "falling back to uniform weights");
  SolveOutcome {
    weights: uniform_within(bounds),
    status: OptimizationStatus::Fallback,
    message: format!("uniform fallback: {reason}"),
    conditions: vec![AllocationError::OptimizationFailure { strategy, reason }],
  }
}

/// Correlation distance `sqrt((1 - ρ) / 2)`.
pub fn correlation_distance(corr: &[Vec<f64>]) -> Vec<Vec<f64>> {
  let n = corr.len();
  let mut dist = vec![vec![0.0; n]; n];
  for i in 0..n {
    for j in 0..n {
      let c_ij = corr
        .get(i)
        .and_then(|row| row.get(j))
        .copied()
        .unwrap_or(if i == j { 1.0 } else { 0.0 });
      dist[i][j] = ((1.0 - c_ij).max(0.0) / 2.0).sqrt();
    }
  }
  dist
}

/// Quasi-diagonal leaf order of a single-linkage dendrogram over `dist`.
pub fn hrp_seriation(dist: &[Vec<f64>]) -> Vec<usize> {
  let n = dist.len();
  if n <= 1 {
    return (0..n).collect();
  }

  let mut left_child: Vec<usize> = Vec::with_capacity(n - 1);
  let mut right_child: Vec<usize> = Vec::with_capacity(n - 1);
  let mut active = vec![true; n];
  let mut d = dist.to_vec();
  let mut node_id: Vec<usize> = (0..n).collect();

  for step in 0..(n - 1) {
    let mut min_d = f64::INFINITY;
    let mut mi = 0;
    let mut mj = 0;

    for i in 0..n {
      if !active[i] {
        continue;
      }
      for j in (i + 1)..n {
        if active[j] && d[i][j] < min_d {
          min_d = d[i][j];
          mi = i;
          mj = j;
        }
      }
    }
    if !min_d.is_finite() {
      // NaN distances: merge the first two active clusters.
      let mut live = (0..n).filter(|&k| active[k]);
      mi = live.next().unwrap_or(0);
      mj = live.next().unwrap_or(mi);
    }

    left_child.push(node_id[mi]);
    right_child.push(node_id[mj]);
    node_id[mi] = n + step;
    active[mj] = false;

    for k in 0..n {
      if !active[k] || k == mi {
        continue;
      }
      d[mi][k] = d[mi][k].min(d[mj][k]);
      d[k][mi] = d[mi][k];
    }
  }

  let mut order = Vec::with_capacity(n);
  let mut stack = vec![2 * n - 2];
  while let Some(node) = stack.pop() {
    if node < n {
      order.push(node);
    } else {
      let idx = node - n;
      stack.push(right_child[idx]);
      stack.push(left_child[idx]);
    }
  }
  order
}

fn diagonal(cov: &[Vec<f64>], i: usize) -> f64 {
  cov.get(i).and_then(|row| row.get(i)).copied().unwrap_or(0.0)
}

/// Variance of the inverse-variance portfolio over `order[range]`.
///
/// A cluster without any positive variance counts as unit variance.
fn cluster_variance(order: &[usize], range: Range<usize>, cov: &[Vec<f64>]) -> f64 {
  let members = &order[range];
  if let [only] = members {
    return diagonal(cov, *only);
  }

  let precision: Vec<(usize, f64)> = members
    .iter()
    .map(|&i| (i, diagonal(cov, i)))
    .filter(|&(_, v)| v > 1e-15)
    .map(|(i, v)| (i, v.recip()))
    .collect();
  let total: f64 = precision.iter().map(|(_, p)| p).sum();
  if precision.is_empty() || total < 1e-15 {
    return 1.0;
  }

  precision
    .iter()
    .flat_map(|&(i, pi)| {
      precision.iter().map(move |&(j, pj)| {
        let cij = cov.get(i).and_then(|row| row.get(j)).copied().unwrap_or(0.0);
        pi * pj * cij
      })
    })
    .sum::<f64>()
    / (total * total)
}

/// Inverse-variance bisection over `order`, processed as a worklist of index ranges.
pub fn hrp_bisect(order: &[usize], cov: &[Vec<f64>]) -> Vec<f64> {
  let n = order.len();
  let mut weights = vec![1.0; cov.len().max(n)];
  let mut pending: Vec<Range<usize>> = vec![0..n];

  while let Some(range) = pending.pop() {
    if range.len() <= 1 {
      continue;
    }
    let mid = range.start + range.len() / 2;
    let left = &order[range.start..mid];
    let right = &order[mid..range.end];

    let var_left = cluster_variance(order, range.start..mid, cov);
    let var_right = cluster_variance(order, mid..range.end, cov);
    let denom = var_left + var_right;
    let alpha = if denom > 1e-30 {
      1.0 - var_left / denom
    } else {
      0.5
    };

    for &i in left {
      weights[i] *= alpha;
    }
    for &i in right {
      weights[i] *= 1.0 - alpha;
    }

    pending.push(range.start..mid);
    pending.push(mid..range.end);
  }

  weights.truncate(cov.len());
  let total: f64 = weights.iter().sum();
  if total > 1e-15 {
    weights.iter_mut().for_each(|w| *w /= total);
  }
  weights
}

/// Hierarchical Risk Parity weights from covariance and correlation.
pub fn hrp_weights(cov: &[Vec<f64>], corr: &[Vec<f64>]) -> Vec<f64> {
  let n = cov.len();
  match n {
    0 => Vec::new(),
    1 => vec![1.0],
    _ => {
      let order = hrp_seriation(&correlation_distance(corr));
      debug!(?order, "hrp leaf order");
      hrp_bisect(&order, cov)
    }
  }
}

/// Multiply each weight by `1 + max(0, favorability)` and renormalize.
pub fn apply_favorability_tilt(weights: &[f64], favorability: &[f64]) -> Vec<f64> {
  let tilted: Vec<f64> = weights
    .iter()
    .enumerate()
    .map(|(i, w)| w * (1.0 + favorability.get(i).copied().unwrap_or(0.0).max(0.0)))
    .collect();
  let total: f64 = tilted.iter().sum();
  if total > 1e-15 {
    tilted.iter().map(|w| w / total).collect()
  } else {
    weights.to_vec()
  }
}

/// How Monte-Carlo candidates are drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerKind {
  /// Independent uniforms renormalized to sum to 1. Biased toward the centroid.
  #[default]
  UniformNormalized,
  /// Flat Dirichlet, i.e. uniform over the simplex.
  Dirichlet,
}

impl SamplerKind {
  pub fn sample<R: Rng + ?Sized>(self, rng: &mut R, out: &mut [f64]) {
    match self {
      SamplerKind::UniformNormalized => out.iter_mut().for_each(|x| *x = rng.gen::<f64>()),
      SamplerKind::Dirichlet => out.iter_mut().for_each(|x| *x = Exp1.sample(rng)),
    }
    let total: f64 = out.iter().sum();
    if total > 0.0 {
      out.iter_mut().for_each(|x| *x /= total);
    } else {
      let n = out.len() as f64;
      out.iter_mut().for_each(|x| *x = 1.0 / n);
    }
  }
}

/// Monte-Carlo sampling controls.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MonteCarloConfig {
  pub samples: usize,
  pub sampler: SamplerKind,
  pub seed: u64,
  pub keep_cloud: bool,
}

impl Default for MonteCarloConfig {
  fn default() -> Self {
    Self {
      samples: 50_000,
      sampler: SamplerKind::default(),
      seed: 42,
      keep_cloud: false,
    }
  }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MonteCarloFrontier {
  /// Argmax-Sharpe candidate.
  pub best: Vec<f64>,
  pub best_stats: PortfolioStats,
  pub cloud: Vec<CloudPoint>,
  pub samples: usize,
}

struct ChunkBest {
  sharpe: f64,
  weights: Vec<f64>,
  cloud: Vec<CloudPoint>,
}

/// Sample random portfolios and keep the best by Sharpe ratio.
///
/// Chunk `k` draws from `StdRng` seeded with `seed` and `k`, so results do not
/// depend on the thread count.
pub fn monte_carlo_frontier(
  mu: &[f64],
  cov: &[Vec<f64>],
  risk_free: f64,
  config: &MonteCarloConfig,
) -> MonteCarloFrontier {
  let n = mu.len();
  if n == 0 || config.samples == 0 {
    return MonteCarloFrontier::default();
  }

  let chunks = config.samples.div_ceil(MONTE_CARLO_CHUNK);
  let results: Vec<ChunkBest> = (0..chunks)
    .into_par_iter()
    .map(|chunk| {
      let mut rng = StdRng::seed_from_u64(
        config
          .seed
          .wrapping_add(0x9E37_79B9_7F4A_7C15_u64.wrapping_mul(chunk as u64 + 1)),
      );
      let count = MONTE_CARLO_CHUNK.min(config.samples - chunk * MONTE_CARLO_CHUNK);
      let mut w = vec![0.0; n];
      let mut best = ChunkBest {
        sharpe: f64::NEG_INFINITY,
        weights: vec![1.0 / n as f64; n],
        cloud: Vec::with_capacity(if config.keep_cloud { count } else { 0 }),
      };

      for _ in 0..count {
        config.sampler.sample(&mut rng, &mut w);
        let stats = PortfolioStats::compute(&w, mu, cov, risk_free);
        if config.keep_cloud {
          best.cloud.push(CloudPoint {
            expected_return: stats.expected_return,
            volatility: stats.volatility,
            sharpe: stats.sharpe,
          });
        }
        if stats.sharpe > best.sharpe {
          best.sharpe = stats.sharpe;
          best.weights.copy_from_slice(&w);
        }
      }
      best
    })
    .collect();

  let mut cloud = Vec::new();
  let mut best: Option<(OrderedFloat<f64>, Vec<f64>)> = None;
  for chunk in results {
    cloud.extend(chunk.cloud);
    let key = OrderedFloat(chunk.sharpe);
    match &best {
      Some((current, _)) if *current >= key => {}
      _ => best = Some((key, chunk.weights)),
    }
  }

  let best = best.map_or_else(|| vec![1.0 / n as f64; n], |(_, w)| w);
  let best_stats = PortfolioStats::compute(&best, mu, cov, risk_free);
  info!(
    samples = config.samples,
    sharpe = best_stats.sharpe,
    "monte-carlo frontier sampled"
  );
  MonteCarloFrontier {
    best,
    best_stats,
    cloud,
    samples: config.samples,
  }
}

/// `α·hrp + (1 - α)·mc` renormalized, with `α` clamped to `[0, 1]`.
pub fn blend_weights(hrp: &[f64], mc: &[f64], alpha: f64) -> Vec<f64> {
  let alpha = if alpha.is_finite() { alpha.clamp(0.0, 1.0) } else { 0.5 };
  let mixed: Vec<f64> = hrp
    .iter()
    .zip(mc)
    .map(|(h, m)| alpha * h + (1.0 - alpha) * m)
    .collect();
  let total: f64 = mixed.iter().sum();
  if total > 1e-15 {
    mixed.iter().map(|w| w / total).collect()
  } else {
    vec![1.0 / mixed.len().max(1) as f64; mixed.len()]
  }
}

/// Evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
  match n {
    0 => Vec::new(),
    1 => vec![start],
    _ => {
      let step = (end - start) / (n - 1) as f64;
      (0..n).map(|i| start + step * i as f64).collect()
    }
  }
}

/// Minimum-variance portfolios for target returns spread over
/// `[0.8·min μ, 1.2·max μ]`, long-only under `cap`, de-duplicated and sorted by risk.
pub fn efficient_frontier<S: AsRef<str>>(
  tickers: &[S],
  mu: &[f64],
  cov: &[Vec<f64>],
  risk_free: f64,
  n_points: usize,
  cap: f64,
  config: &SolverConfig,
) -> Vec<FrontierPoint> {
  let n = mu.len();
  if n == 0 || n_points == 0 {
    return Vec::new();
  }

  let mut bounds = Bounds::uniform(n, 0.0, cap.clamp(0.0, 1.0));
  bounds.repair();

  let (lo, hi) = min_max(mu);
  let start = uniform_within(&bounds);
  let mut seen = BTreeSet::new();
  let mut points = Vec::new();

  for target in linspace(lo * 0.8, hi * 1.2, n_points) {
    let problem = TargetVariance {
      mu: mu.to_vec(),
      cov: cov.to_vec(),
      target_return: target,
      penalty: FRONTIER_PENALTY,
    };
    let outcome = minimize(&problem, &start, &bounds, config);
    if !outcome.converged {
      debug!(target, reason = %outcome.reason, "frontier point skipped");
      continue;
    }

    let stats = PortfolioStats::compute(&outcome.weights, mu, cov, risk_free);
    let key = (
      OrderedFloat((stats.expected_return * 1e8).round()),
      OrderedFloat((stats.volatility * 1e8).round()),
    );
    if !seen.insert(key) {
      continue;
    }
    points.push(FrontierPoint {
      target_return: target,
      expected_return: stats.expected_return,
      volatility: stats.volatility,
      sharpe: stats.sharpe,
      weights: WeightVector::from_parts(tickers, &outcome.weights),
    });
  }

  points.sort_by_key(|p| OrderedFloat(p.volatility));
  if points.is_empty() {
    warn!("no frontier point converged");
  } else {
    info!(points = points.len(), "efficient frontier built");
  }
  points
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use tracing_test::traced_test;

  use super::*;

  fn block_cov() -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let vol = [0.2, 0.3, 0.25, 0.35];
    let corr = vec![
      vec![1.0, 0.1, 0.9, 0.1],
      vec![0.1, 1.0, 0.1, 0.85],
      vec![0.9, 0.1, 1.0, 0.1],
      vec![0.1, 0.85, 0.1, 1.0],
    ];
    let cov = (0..4)
      .map(|i| (0..4).map(|j| corr[i][j] * vol[i] * vol[j]).collect())
      .collect();
    (cov, corr)
  }

  #[test]
  fn sharpe_multipliers_span_the_band() {
    let m = sharpe_multipliers(&[-1.0, 0.0, 1.0]);
    assert_abs_diff_eq!(m[0], 0.7, epsilon = 1e-12);
    assert_abs_diff_eq!(m[1], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(m[2], 1.3, epsilon = 1e-12);
    assert_eq!(sharpe_multipliers(&[0.4, 0.4]), vec![1.0, 1.0]);
  }

  #[test]
  fn monte_carlo_multipliers_span_half_to_one_and_a_half() {
    let m = monte_carlo_multipliers(&[2.0, 4.0]);
    assert_abs_diff_eq!(m[0], 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(m[1], 1.5, epsilon = 1e-6);
    assert_eq!(monte_carlo_multipliers(&[3.0, 3.0, 3.0]), vec![1.0; 3]);
  }

  #[test]
  fn sharpe_bounds_follow_multiplier() {
    let b = sharpe_bounds(&[0.7, 1.0, 1.3], 0.01);
    assert_abs_diff_eq!(b.upper[0], 0.17, epsilon = 1e-12);
    assert_abs_diff_eq!(b.upper[1], 0.20, epsilon = 1e-12);
    assert_abs_diff_eq!(b.upper[2], 0.23, epsilon = 1e-12);
    assert_eq!(b.lower, vec![0.01; 3]);
  }

  #[test]
  fn sharpe_gradient_matches_finite_difference() {
    let (cov, _) = block_cov();
    let problem = NegativeSharpe {
      mu: vec![0.1, 0.15, 0.08, 0.2],
      cov,
      risk_free: 0.02,
    };
    let x = vec![0.3, 0.2, 0.4, 0.1];
    let g = problem.gradient(&x).unwrap();
    let h = 1e-6;
    for i in 0..4 {
      let mut up = x.clone();
      let mut down = x.clone();
      up[i] += h;
      down[i] -= h;
      let fd = (problem.cost(&up).unwrap() - problem.cost(&down).unwrap()) / (2.0 * h);
      assert_abs_diff_eq!(g[i], fd, epsilon = 1e-5);
    }
  }

  #[test]
  fn sharpe_is_maximized_for_symmetric_assets() {
    let problem = NegativeSharpe {
      mu: vec![0.1, 0.1],
      cov: vec![vec![0.04, 0.0], vec![0.0, 0.04]],
      risk_free: 0.0,
    };
    let mut rng = StdRng::seed_from_u64(1);
    let out = solve_with_retry(
      Strategy::SharpeMacro,
      &problem,
      &[0.9, 0.1],
      &Bounds::uniform(2, 0.0, 1.0),
      &SolverConfig::default(),
      &mut rng,
    );
    assert_eq!(out.status, OptimizationStatus::Converged);
    assert_abs_diff_eq!(out.weights[0], 0.5, epsilon = 1e-3);
    assert_abs_diff_eq!(out.weights[1], 0.5, epsilon = 1e-3);
  }

  #[test]
  fn max_return_fills_best_assets_to_the_cap() {
    let problem = NegativeReturn {
      mu: vec![0.05, 0.3, 0.1, 0.2, 0.25, 0.15, 0.01],
    };
    let bounds = Bounds::uniform(7, 0.0, 0.2);
    let mut rng = StdRng::seed_from_u64(1);
    let out = solve_with_retry(
      Strategy::MaxReturn,
      &problem,
      &uniform_within(&bounds),
      &bounds,
      &SolverConfig::default(),
      &mut rng,
    );
    assert_abs_diff_eq!(out.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    for i in [1, 2, 3, 4, 5] {
      assert_abs_diff_eq!(out.weights[i], 0.2, epsilon = 1e-6);
    }
    assert_abs_diff_eq!(out.weights[0], 0.0, epsilon = 1e-6);
  }

  #[traced_test]
  #[test]
  fn zero_volatility_falls_back_to_uniform() {
    let problem = NegativeSharpe {
      mu: vec![0.1, 0.2, 0.3],
      cov: vec![vec![0.0; 3]; 3],
      risk_free: 0.0,
    };
    let mut rng = StdRng::seed_from_u64(9);
    let out = solve_with_retry(
      Strategy::SharpeMacro,
      &problem,
      &[0.2, 0.3, 0.5],
      &Bounds::uniform(3, 0.0, 1.0),
      &SolverConfig::default(),
      &mut rng,
    );
    assert_eq!(out.status, OptimizationStatus::Fallback);
    for w in &out.weights {
      assert_abs_diff_eq!(*w, 1.0 / 3.0, epsilon = 1e-9);
    }
    assert!(matches!(
      out.conditions[0],
      AllocationError::OptimizationFailure {
        strategy: Strategy::SharpeMacro,
        ..
      }
    ));
    assert!(logs_contain("falling back to uniform weights"));
  }

  #[test]
  fn seriation_keeps_correlated_assets_adjacent() {
    let (_, corr) = block_cov();
    let order = hrp_seriation(&correlation_distance(&corr));
    assert_eq!(order, vec![0, 2, 1, 3]);
  }

  #[test]
  fn hrp_favors_low_variance_assets() {
    let cov = vec![
      vec![0.01, 0.0, 0.0],
      vec![0.0, 0.04, 0.0],
      vec![0.0, 0.0, 0.09],
    ];
    let corr = vec![
      vec![1.0, 0.0, 0.0],
      vec![0.0, 1.0, 0.0],
      vec![0.0, 0.0, 1.0],
    ];
    let w = hrp_weights(&cov, &corr);
    assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    assert!(w[0] > w[1] && w[1] > w[2]);
    assert_abs_diff_eq!(w[1] / w[2], 0.09 / 0.04, epsilon = 1e-9);
  }

  #[test]
  fn hrp_covers_every_asset() {
    let (cov, corr) = block_cov();
    let w = hrp_weights(&cov, &corr);
    assert_eq!(w.len(), 4);
    assert!(w.iter().all(|&x| x > 0.0));
    assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
  }

  #[test]
  fn tilt_only_rewards_positive_favorability() {
    let w = apply_favorability_tilt(&[0.5, 0.5], &[1.0, -1.0]);
    assert_abs_diff_eq!(w[0], 2.0 / 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(w[1], 1.0 / 3.0, epsilon = 1e-12);
  }

  #[test]
  fn samplers_stay_on_the_simplex() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut w = vec![0.0; 5];
    for kind in [SamplerKind::UniformNormalized, SamplerKind::Dirichlet] {
      kind.sample(&mut rng, &mut w);
      assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
      assert!(w.iter().all(|&x| x >= 0.0));
    }
  }

  #[test]
  fn monte_carlo_is_deterministic_and_keeps_the_best() {
    let (cov, _) = block_cov();
    let mu = vec![0.1, 0.15, 0.08, 0.2];
    let config = MonteCarloConfig {
      samples: 10_000,
      keep_cloud: true,
      ..Default::default()
    };
    let a = monte_carlo_frontier(&mu, &cov, 0.0, &config);
    let b = monte_carlo_frontier(&mu, &cov, 0.0, &config);
    assert_eq!(a.best, b.best);
    assert_eq!(a.cloud.len(), 10_000);
    let max_sharpe = a
      .cloud
      .iter()
      .map(|p| p.sharpe)
      .fold(f64::NEG_INFINITY, f64::max);
    assert_abs_diff_eq!(a.best_stats.sharpe, max_sharpe, epsilon = 1e-12);
    assert_abs_diff_eq!(a.best.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
  }

  #[test]
  fn blend_endpoints_reproduce_inputs() {
    let hrp = vec![0.5, 0.3, 0.2];
    let mc = vec![0.1, 0.1, 0.8];
    assert_eq!(blend_weights(&hrp, &mc, 1.0), hrp);
    assert_eq!(blend_weights(&hrp, &mc, 0.0), mc);
    let mid = blend_weights(&hrp, &mc, 0.5);
    assert_abs_diff_eq!(mid[2], 0.5, epsilon = 1e-12);
    assert_eq!(blend_weights(&hrp, &mc, 7.0), hrp);
  }

  #[test]
  fn frontier_is_sorted_by_risk_and_capped() {
    let (cov, _) = block_cov();
    let mu = vec![0.1, 0.15, 0.08, 0.2];
    let points = efficient_frontier(
      &["A", "B", "C", "D"],
      &mu,
      &cov,
      0.0,
      12,
      0.6,
      &SolverConfig::default(),
    );
    assert!(!points.is_empty());
    assert!(points.windows(2).all(|p| p[0].volatility <= p[1].volatility));
    for p in &points {
      assert_abs_diff_eq!(p.weights.sum(), 1.0, epsilon = 1e-6);
      assert!(p.weights.iter().all(|(_, w)| w <= 0.6 + 1e-9 && w >= -1e-12));
    }
  }

  #[test]
  fn linspace_includes_both_ends() {
    assert_eq!(linspace(0.0, 1.0, 3), vec![0.0, 0.5, 1.0]);
    assert_eq!(linspace(2.0, 5.0, 1), vec![2.0]);
    assert!(linspace(0.0, 1.0, 0).is_empty());
  }

  #[test]
  fn checked_outcome_accepts_normalized_weights() {
    let bounds = Bounds::uniform(3, 0.0, 1.0);
    let out = checked_outcome(Strategy::Hrp, vec![0.5, 0.3, 0.2], &bounds, "ok");
    assert_eq!(out.status, OptimizationStatus::Converged);
    assert_eq!(out.weights, vec![0.5, 0.3, 0.2]);
    assert!(out.conditions.is_empty());
  }

  #[traced_test]
  #[test]
  fn checked_outcome_rejects_nan_and_wrong_length() {
    let bounds = Bounds::uniform(4, 0.0, 1.0);
    let out = checked_outcome(
      Strategy::Ensemble,
      vec![0.5, f64::NAN, 0.25, 0.25],
      &bounds,
      "blend",
    );
    assert_eq!(out.status, OptimizationStatus::Fallback);
    for w in &out.weights {
      assert_abs_diff_eq!(*w, 0.25, epsilon = 1e-9);
    }
    assert_eq!(out.conditions.len(), 1);

    let short = checked_outcome(Strategy::MonteCarlo, Vec::new(), &bounds, "cloud");
    assert_eq!(short.status, OptimizationStatus::Fallback);
    assert_eq!(short.weights.len(), 4);
    assert!(logs_contain("expected 4 weights, got 0"));
  }

  #[test]
  fn cluster_variance_of_uncorrelated_pair() {
    let cov = vec![vec![0.04, 0.0], vec![0.0, 0.01]];
    // inverse-variance weights 0.2 / 0.8
    assert_abs_diff_eq!(cluster_variance(&[0, 1], 0..2, &cov), 0.008, epsilon = 1e-12);
    assert_abs_diff_eq!(cluster_variance(&[1, 0], 1..2, &cov), 0.04, epsilon = 1e-15);
    let flat = vec![vec![0.0, 0.0], vec![0.0, 0.0]];
    assert_eq!(cluster_variance(&[0, 1], 0..2, &flat), 1.0);
  }
}
