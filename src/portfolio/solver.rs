//! # Bounded Simplex Solver
//!
//! $$
//! \mathbf{w}_{k+1} = \Pi_{\mathcal C}\left(\mathbf{w}_k - \eta_k \nabla f(\mathbf{w}_k)\right),
//! \qquad \mathcal C = \{\mathbf{w} : \textstyle\sum_i w_i = 1,\ l \le \mathbf{w} \le u\}
//! $$
//!
//! Sequential quadratic steps with a scaled-identity Hessian model. Each step is the
//! Euclidean projection onto the capped simplex, the step length `η` is found by
//! backtracking on the quadratic upper model and grown again after each accepted step.
//! Objectives implement the `argmin` [`CostFunction`] and [`Gradient`] traits.

use std::time::Instant;

use argmin::core::CostFunction;
use argmin::core::Gradient;
use tracing::debug;

use super::types::Bounds;

/// Termination controls.
#[derive(Clone, Copy, Debug)]
pub struct SolverConfig {
  pub max_iters: u64,
  /// Relative objective change that counts as converged.
  pub ftol: f64,
  /// Step norm that counts as converged.
  pub xtol: f64,
  /// Wall-clock cut-off checked once per iteration.
  pub deadline: Option<Instant>,
}

impl Default for SolverConfig {
  fn default() -> Self {
    Self {
      max_iters: 1000,
      ftol: 1e-9,
      xtol: 1e-10,
      deadline: None,
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SolverOutcome {
  pub weights: Vec<f64>,
  pub cost: f64,
  pub iterations: u64,
  pub converged: bool,
  pub reason: String,
}

/// Euclidean projection of `w` onto `{Σw = 1, lower ≤ w ≤ upper}` by bisection on the
/// shift `τ` in `clip(w - τ, lower, upper)`.
///
/// `bounds` must be feasible, see [`Bounds::repair`].
pub fn project_capped_simplex(w: &[f64], bounds: &Bounds) -> Vec<f64> {
  let n = w.len();
  if n == 0 {
    return Vec::new();
  }

  let shifted = |tau: f64| -> f64 {
    w.iter()
      .zip(bounds.lower.iter().zip(&bounds.upper))
      .map(|(&x, (&l, &u))| (x - tau).clamp(l, u))
      .sum()
  };

  let mut lo = w
    .iter()
    .zip(&bounds.upper)
    .map(|(x, u)| x - u)
    .fold(f64::INFINITY, f64::min);
  let mut hi = w
    .iter()
    .zip(&bounds.lower)
    .map(|(x, l)| x - l)
    .fold(f64::NEG_INFINITY, f64::max);

  for _ in 0..200 {
    let mid = 0.5 * (lo + hi);
    if shifted(mid) > 1.0 {
      lo = mid;
    } else {
      hi = mid;
    }
    if hi - lo <= 1e-16 * (1.0 + lo.abs().max(hi.abs())) {
      break;
    }
  }

  let tau = 0.5 * (lo + hi);
  w.iter()
    .zip(bounds.lower.iter().zip(&bounds.upper))
    .map(|(&x, (&l, &u))| (x - tau).clamp(l, u))
    .collect()
}

fn failed(weights: Vec<f64>, iterations: u64, reason: impl Into<String>) -> SolverOutcome {
  SolverOutcome {
    weights,
    cost: f64::NAN,
    iterations,
    converged: false,
    reason: reason.into(),
  }
}

/// Backtracking found no acceptable move. Counts as converged only when the opening
/// trial already changed the objective by less than `ftol`.
fn stalled(
  x: Vec<f64>,
  fx: f64,
  iter: u64,
  opening_df: f64,
  config: &SolverConfig,
) -> SolverOutcome {
  if opening_df <= config.ftol * fx.abs().max(1.0) {
    debug!(iterations = iter, cost = fx, "solver converged at a numerically flat point");
    return SolverOutcome {
      weights: x,
      cost: fx,
      iterations: iter,
      converged: true,
      reason: "converged".to_string(),
    };
  }
  debug!(iterations = iter, "line search stalled");
  SolverOutcome {
    cost: fx,
    ..failed(x, iter, "line search stalled")
  }
}

/// Minimize `problem` over the capped simplex described by `bounds`, starting from `x0`.
pub fn minimize<P>(problem: &P, x0: &[f64], bounds: &Bounds, config: &SolverConfig) -> SolverOutcome
where
  P: CostFunction<Param = Vec<f64>, Output = f64> + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
{
  let mut x = project_capped_simplex(x0, bounds);
  let mut fx = match problem.cost(&x) {
    Ok(v) if v.is_finite() => v,
    Ok(v) => return failed(x, 0, format!("non-finite objective {v} at start")),
    Err(e) => return failed(x, 0, e.to_string()),
  };
  let mut step = 1.0;

  for iter in 1..=config.max_iters {
    if config.deadline.is_some_and(|d| Instant::now() >= d) {
      return SolverOutcome {
        cost: fx,
        ..failed(x, iter, "deadline exceeded")
      };
    }

    let g = match problem.gradient(&x) {
      Ok(g) if g.iter().all(|v| v.is_finite()) => g,
      Ok(_) => return failed(x, iter, "non-finite gradient"),
      Err(e) => return failed(x, iter, e.to_string()),
    };

    let mut backtracked = false;
    let mut opening_df = f64::NAN;
    let (candidate, f_candidate) = loop {
      let trial: Vec<f64> = x.iter().zip(&g).map(|(xi, gi)| xi - step * gi).collect();
      let candidate = project_capped_simplex(&trial, bounds);

      let (mut linear, mut quad) = (0.0, 0.0);
      for ((c, xi), gi) in candidate.iter().zip(&x).zip(&g) {
        let d = c - xi;
        linear += gi * d;
        quad += d * d;
      }

      let f_candidate = problem.cost(&candidate).unwrap_or(f64::NAN);
      if f_candidate.is_finite() && f_candidate <= fx + linear + quad / (2.0 * step) {
        // a zero move is stationary only at the iteration's opening step
        if backtracked && quad == 0.0 {
          return stalled(x, fx, iter, opening_df, config);
        }
        break (candidate, f_candidate);
      }
      if !backtracked {
        opening_df = (f_candidate - fx).abs();
      }
      step *= 0.5;
      backtracked = true;
      if step < 1e-20 {
        return stalled(x, fx, iter, opening_df, config);
      }
    };

    let dx = candidate
      .iter()
      .zip(&x)
      .map(|(a, b)| (a - b) * (a - b))
      .sum::<f64>()
      .sqrt();
    let df = (fx - f_candidate).abs();
    x = candidate;
    fx = f_candidate;

    if dx <= config.xtol || df <= config.ftol * fx.abs().max(1.0) {
      debug!(iterations = iter, cost = fx, "solver converged");
      return SolverOutcome {
        weights: x,
        cost: fx,
        iterations: iter,
        converged: true,
        reason: "converged".to_string(),
      };
    }
    step = (step * 2.0).min(1e12);
  }

  SolverOutcome {
    cost: fx,
    ..failed(x, config.max_iters, "iteration limit reached")
  }
}
