//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Return preprocessing, covariance estimation, allocation strategies and validation.

pub mod data;
pub mod engine;
pub mod optimizers;
pub mod shrinkage;
pub mod solver;
pub mod types;
pub mod validator;

pub use data::PreparedUniverse;
pub use data::ReturnSeries;
pub use data::align_return_series;
pub use data::annualized_mean_returns;
pub use data::correlation_matrix;
pub use data::log_returns_series;
pub use data::prepare_universe;
pub use engine::AllocationEngine;
pub use engine::EngineConfig;
pub use engine::OptimizeParams;
pub use engine::complete_weights;
pub use optimizers::MonteCarloConfig;
pub use optimizers::MonteCarloFrontier;
pub use optimizers::SamplerKind;
pub use optimizers::apply_favorability_tilt;
pub use optimizers::blend_weights;
pub use optimizers::hrp_weights;
pub use optimizers::monte_carlo_frontier;
pub use shrinkage::CovarianceMethod;
pub use shrinkage::ledoit_wolf;
pub use types::Bounds;
pub use types::CloudPoint;
pub use types::FrontierPoint;
pub use types::OptimizationResult;
pub use types::OptimizationStatus;
pub use types::PortfolioStats;
pub use types::Strategy;
pub use types::WeightVector;
pub use validator::ValidationReport;
pub use validator::ValidationWarning;
pub use validator::ValidatorConfig;
pub use validator::validate;
