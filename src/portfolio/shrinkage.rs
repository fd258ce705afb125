//! # Ledoit-Wolf Shrinkage
//!
//! $$
//! \hat\Sigma = (1-\delta)\,S + \delta\,\mu I, \qquad \mu = \frac{\operatorname{tr} S}{p}
//! $$
//!
//! Shrinkage covariance toward a scaled identity with the Ledoit-Wolf optimal intensity.
//! `S` is the biased (`1/n`) sample covariance of the centred observations.

use ndarray::Array2;
use ndarray::Axis;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::data::sample_covariance;

/// Covariance estimator used by the allocation strategies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceMethod {
  #[default]
  LedoitWolf,
  Sample,
}

/// Shrunk covariance together with the applied intensity.
#[derive(Clone, Debug, PartialEq)]
pub struct ShrunkCovariance {
  pub covariance: Vec<Vec<f64>>,
  pub shrinkage: f64,
}

fn to_observations(aligned_returns: &[Vec<f64>]) -> Array2<f64> {
  let p = aligned_returns.len();
  let n = aligned_returns.first().map_or(0, Vec::len);
  Array2::from_shape_fn((n, p), |(t, j)| aligned_returns[j][t])
}

/// Ledoit-Wolf estimate from aligned series (one row per asset).
pub fn ledoit_wolf(aligned_returns: &[Vec<f64>]) -> ShrunkCovariance {
  let p = aligned_returns.len();
  let n = aligned_returns.first().map_or(0, Vec::len);
  if p == 0 || n == 0 {
    return ShrunkCovariance {
      covariance: vec![vec![0.0; p]; p],
      shrinkage: 0.0,
    };
  }

  let mut x = to_observations(aligned_returns);
  if let Some(mean) = x.mean_axis(Axis(0)) {
    x -= &mean;
  }

  let nf = n as f64;
  let pf = p as f64;
  let emp_cov = x.t().dot(&x) / nf;

  if p == 1 {
    return ShrunkCovariance {
      covariance: vec![vec![emp_cov[[0, 0]]]],
      shrinkage: 0.0,
    };
  }

  let x2 = x.mapv(|v| v * v);
  let emp_cov_trace: f64 = emp_cov.diag().sum();
  let mu = emp_cov_trace / pf;

  let beta_sum = x2.t().dot(&x2).sum();
  let delta_sum = emp_cov.mapv(|v| v * v).sum();

  let beta = (beta_sum / nf - delta_sum) / (pf * nf);
  let delta = (delta_sum - 2.0 * mu * emp_cov_trace + pf * mu * mu) / pf;
  let beta = beta.min(delta);
  let shrinkage = if beta <= 0.0 || delta <= 0.0 {
    0.0
  } else {
    (beta / delta).clamp(0.0, 1.0)
  };

  let covariance = (0..p)
    .map(|i| {
      (0..p)
        .map(|j| {
          let target = if i == j { mu } else { 0.0 };
          (1.0 - shrinkage) * emp_cov[[i, j]] + shrinkage * target
        })
        .collect()
    })
    .collect();

  debug!(assets = p, observations = n, shrinkage, "ledoit-wolf covariance");
  ShrunkCovariance {
    covariance,
    shrinkage,
  }
}

/// Periodic covariance with the configured estimator.
pub fn estimate_covariance(aligned_returns: &[Vec<f64>], method: CovarianceMethod) -> Vec<Vec<f64>> {
  match method {
    CovarianceMethod::LedoitWolf => ledoit_wolf(aligned_returns).covariance,
    CovarianceMethod::Sample => sample_covariance(aligned_returns),
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;

  fn noisy(p: usize, n: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 0.01).unwrap();
    (0..p)
      .map(|_| (0..n).map(|_| normal.sample(&mut rng)).collect())
      .collect()
  }

  #[test]
  fn shrinkage_intensity_is_a_fraction() {
    let returns = noisy(5, 30, 11);
    let lw = ledoit_wolf(&returns);
    assert!((0.0..=1.0).contains(&lw.shrinkage));
    assert!(lw.shrinkage > 0.0);
  }

  #[test]
  fn shrunk_matrix_is_symmetric_and_keeps_trace() {
    let returns = noisy(4, 50, 3);
    let lw = ledoit_wolf(&returns);
    let n = returns[0].len() as f64;
    let sample = sample_covariance(&returns);

    let mut trace_lw = 0.0;
    let mut trace_biased = 0.0;
    for i in 0..4 {
      trace_lw += lw.covariance[i][i];
      trace_biased += sample[i][i] * (n - 1.0) / n;
      for j in 0..4 {
        assert_abs_diff_eq!(lw.covariance[i][j], lw.covariance[j][i], epsilon = 1e-15);
      }
    }
    assert_abs_diff_eq!(trace_lw, trace_biased, epsilon = 1e-12);
  }

  #[test]
  fn off_diagonals_shrink_toward_zero() {
    let base = noisy(1, 60, 5).remove(0);
    let returns = vec![
      base.clone(),
      base.iter().map(|v| v * 0.9 + 0.0001).collect(),
      noisy(1, 60, 6).remove(0),
    ];
    let lw = ledoit_wolf(&returns);
    let n = 60.0;
    let biased_01 = sample_covariance(&returns)[0][1] * (n - 1.0) / n;
    assert!(lw.covariance[0][1].abs() <= biased_01.abs() + 1e-18);
  }

  #[test]
  fn degenerate_inputs() {
    assert!(ledoit_wolf(&[]).covariance.is_empty());
    let single = ledoit_wolf(&[vec![0.01, 0.03]]);
    assert_abs_diff_eq!(single.covariance[0][0], 0.0001, epsilon = 1e-15);
    assert_eq!(single.shrinkage, 0.0);
  }
}
