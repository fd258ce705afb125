//! # Asset
//!
//! $$
//! (p, t, f, \text{sector}) \mapsto \text{score} \in [-10, 10] \cup \{-\infty\}
//! $$
//!
//! Ticker registry, per-asset attractiveness scoring and ranking.

pub mod ranking;
pub mod registry;
pub mod scorer;

pub use ranking::AssetQuote;
pub use ranking::AssetRecord;
pub use ranking::RankingOutcome;
pub use ranking::SectorCount;
pub use ranking::rank_assets;
pub use ranking::sector_distribution;
pub use registry::RegistryOverrides;
pub use registry::TickerRegistry;
pub use scorer::AssetScore;
pub use scorer::AssetScorer;
pub use scorer::ExporterContext;
pub use scorer::ScoreBreakdown;
pub use scorer::favorability_by_ticker;
