//! # Macro Portfolio
//!
//! $$
//! \mathbf w^\star = \arg\max_{\mathbf w \in \Delta}\ \frac{\mathbf w^\top \tilde{\boldsymbol\mu} - r_f}{\sqrt{\mathbf w^\top \Sigma \mathbf w}}
//! $$
//!
//! Macro-scenario scoring, sector favorability, asset ranking and multi-strategy
//! portfolio allocation for equity universes.
//!
//! | Module | Contents |
//! |---|---|
//! | [`macro_model`] | indicator scoring, scenario classification, sector favorability, trends |
//! | [`asset`] | ticker registry, asset scoring and ranking |
//! | [`portfolio`] | return preprocessing, covariance, allocation strategies, validation |
//! | [`pipeline`] | end-to-end analysis run |

pub mod asset;
pub mod config;
pub mod error;
pub mod macro_model;
pub mod pipeline;
pub mod portfolio;

pub use config::AnalysisConfig;
pub use error::AllocationError;
pub use pipeline::AnalysisReport;
pub use pipeline::AnalysisRequest;
pub use pipeline::analyze;
