//! # Analysis Pipeline
//!
//! $$
//! \text{macro} \rightarrow s \rightarrow \text{scenario} \rightarrow \text{ranking}
//! \rightarrow \{\mathbf w_s\}_{s} \rightarrow \text{validation}
//! $$
//!
//! End-to-end run over already resolved market data. The pipeline performs no I/O.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::asset::ranking::rank_assets;
use crate::asset::ranking::sector_distribution;
use crate::asset::ranking::AssetQuote;
use crate::asset::ranking::RankingOutcome;
use crate::asset::ranking::SectorCount;
use crate::asset::registry::TickerRegistry;
use crate::asset::scorer::favorability_by_ticker;
use crate::asset::scorer::AssetScorer;
use crate::asset::scorer::ExporterContext;
use crate::config::AnalysisConfig;
use crate::error::AllocationError;
use crate::macro_model::indicators::IndicatorScoreSet;
use crate::macro_model::indicators::MacroIndicatorSet;
use crate::macro_model::params::CommodityHistory;
use crate::macro_model::params::MacroParams;
use crate::macro_model::scenario::ScenarioAssessment;
use crate::macro_model::scenario::ScenarioClassifier;
use crate::macro_model::scorer::IndicatorScorer;
use crate::macro_model::sector::favored_sectors;
use crate::macro_model::sector::Sector;
use crate::macro_model::trend::predict_trends;
use crate::macro_model::trend::score_with_history;
use crate::macro_model::trend::IndicatorTrend;
use crate::portfolio::data::ReturnSeries;
use crate::portfolio::engine::AllocationEngine;
use crate::portfolio::engine::OptimizeParams;
use crate::portfolio::types::FrontierPoint;
use crate::portfolio::types::OptimizationResult;
use crate::portfolio::types::Strategy;
use crate::portfolio::validator::validate;
use crate::portfolio::validator::ValidationReport;

/// Resolved inputs of one analysis run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisRequest {
  #[serde(rename = "macro")]
  pub macro_indicators: MacroIndicatorSet,
  /// Past indicator snapshots, oldest first.
  pub macro_history: Vec<MacroIndicatorSet>,
  pub commodity_history: CommodityHistory,
  pub quotes: Vec<AssetQuote>,
  /// Periodic returns per ticker, oldest first.
  pub returns: ReturnSeries,
  /// Tickers to allocate. Defaults to the ranked tickers.
  pub tickers: Option<Vec<String>>,
  pub ensemble_alpha: Option<f64>,
  pub include_cloud: bool,
  pub include_frontier: bool,
}

/// One strategy result and the validation of its weights.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StrategyReport {
  #[serde(flatten)]
  pub result: OptimizationResult,
  pub validation: ValidationReport,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalysisReport {
  /// Parameter snapshot the run was scored with.
  pub params: MacroParams,
  pub indicator_scores: IndicatorScoreSet,
  /// Aggregate damped by the stability of the macro history.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub history_adjusted_aggregate: Option<f64>,
  pub trends: Vec<IndicatorTrend>,
  pub scenario: ScenarioAssessment,
  pub favored_sectors: Vec<Sector>,
  pub ranking: RankingOutcome,
  /// Tickers handed to the allocation engine.
  pub tickers: Vec<String>,
  pub sector_distribution: Vec<SectorCount>,
  /// Tickers without a sector among `tickers`.
  pub unresolved: Vec<AllocationError>,
  pub allocations: Vec<StrategyReport>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub frontier: Vec<FrontierPoint>,
}

impl AnalysisReport {
  pub fn allocation(&self, strategy: Strategy) -> Option<&StrategyReport> {
    self.allocations.iter().find(|a| a.result.strategy == strategy)
  }
}

fn allocation_tickers(
  request: &AnalysisRequest,
  ranking: &RankingOutcome,
  favored: &[Sector],
  favored_only: bool,
) -> Vec<String> {
  if let Some(tickers) = &request.tickers {
    return tickers.clone();
  }
  ranking
    .ranked
    .iter()
    .filter(|r| !favored_only || r.sector.is_some_and(|s| favored.contains(&s)))
    .map(|r| r.ticker.clone())
    .collect()
}

/// Score, classify, rank, allocate and validate.
pub fn analyze(request: &AnalysisRequest, config: &AnalysisConfig) -> AnalysisReport {
  let params = config.params.refresh(&request.commodity_history);
  let scorer = IndicatorScorer::new(params.clone(), config.weights);
  let indicator_scores = scorer.score_indicators(&request.macro_indicators);

  let (trends, history_adjusted_aggregate) = if request.macro_history.is_empty() {
    (Vec::new(), None)
  } else {
    let trends = predict_trends(
      &request.macro_history,
      config.assets.trend_flat_tolerance,
    );
    let adjusted = score_with_history(&scorer, &request.macro_indicators, &request.macro_history);
    (trends, Some(adjusted.aggregate))
  };

  let scenario = ScenarioClassifier::new(config.scenario).assess(&indicator_scores);
  let favored = favored_sectors(scenario.label).to_vec();
  info!(
    label = %scenario.label,
    regime = %scenario.regime,
    total = scenario.total_score,
    "macro scenario"
  );

  let registry = TickerRegistry::with_overrides(&config.registry);
  let asset_scorer = AssetScorer::new(
    ExporterContext::from_macro(&request.macro_indicators, &params),
    config.assets.use_macro_weights,
  );
  let ranking = rank_assets(
    &request.quotes,
    &indicator_scores,
    &registry,
    &asset_scorer,
    config.assets.min_score,
  );

  let tickers = allocation_tickers(
    request,
    &ranking,
    &favored,
    config.assets.favored_sectors_only,
  );
  if tickers.is_empty() {
    warn!("no tickers to allocate");
  }

  let (favorability, unresolved) = favorability_by_ticker(&registry, &tickers, &indicator_scores);
  let optimize_params = OptimizeParams {
    favorability: Some(favorability.into_iter().collect::<BTreeMap<_, _>>()),
    alpha: request.ensemble_alpha,
    deadline: None,
    include_cloud: request.include_cloud,
  };

  let engine = AllocationEngine::new(config.engine.clone());
  let allocations: Vec<StrategyReport> = engine
    .optimize_all(&tickers, &request.returns, &optimize_params)
    .into_iter()
    .map(|result| StrategyReport {
      validation: validate(&result.weights, &config.validator),
      result,
    })
    .collect();

  let frontier = if request.include_frontier {
    engine.efficient_frontier(&tickers, &request.returns, &optimize_params)
  } else {
    Vec::new()
  };

  info!(
    ranked = ranking.ranked.len(),
    allocated = tickers.len(),
    strategies = allocations.len(),
    "analysis finished"
  );

  AnalysisReport {
    params,
    indicator_scores,
    history_adjusted_aggregate,
    trends,
    scenario,
    favored_sectors: favored,
    sector_distribution: sector_distribution(&tickers, &registry),
    ranking,
    tickers,
    unresolved,
    allocations,
    frontier,
  }
}
