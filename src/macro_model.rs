//! # Macro Model
//!
//! $$
//! \text{indicators} \rightarrow s \in [0,10]^7 \rightarrow (\text{scenario}, f_{\text{sector}})
//! $$
//!
//! Indicator scoring, scenario classification and sector favorability.

pub mod indicators;
pub mod params;
pub mod scenario;
pub mod scorer;
pub mod sector;
pub mod trend;

pub use indicators::Indicator;
pub use indicators::IndicatorScoreSet;
pub use indicators::MacroIndicatorSet;
pub use indicators::RawIndicator;
pub use indicators::ScoringWeights;
pub use params::Commodity;
pub use params::CommodityHistory;
pub use params::CommodityIdeals;
pub use params::InflationBandOrdering;
pub use params::MacroParams;
pub use scenario::MacroRegime;
pub use scenario::RegimeAdjustment;
pub use scenario::ScenarioAssessment;
pub use scenario::ScenarioClassifier;
pub use scenario::ScenarioConfig;
pub use scenario::ScenarioLabel;
pub use scenario::ThresholdSet;
pub use scenario::classify_scenario;
pub use scenario::identify_regime;
pub use scorer::IndicatorScorer;
pub use scorer::score_indicators;
pub use sector::Sector;
pub use sector::favorability;
pub use sector::favored_sectors;
pub use sector::resolve_favorability;
pub use trend::IndicatorTrend;
pub use trend::TrendDirection;
pub use trend::predict_trends;
pub use trend::score_with_history;
pub use trend::volatility_adjustment;
