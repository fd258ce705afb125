//! # Asset Ranking
//!
//! $$
//! \text{rank} = \operatorname{argsort}_{\downarrow}\ \text{score}_i, \qquad \text{score}_i \ge \text{min\_score}
//! $$
//!
//! Scores a list of quotes, excludes unusable ones explicitly and orders the rest.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::AllocationError;
use crate::macro_model::indicators::IndicatorScoreSet;
use crate::macro_model::sector::resolve_favorability;
use crate::macro_model::sector::Sector;

use super::registry::TickerRegistry;
use super::scorer::AssetScorer;

/// Price inputs for one ticker as resolved by the data layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetQuote {
  pub ticker: String,
  #[serde(default)]
  pub current_price: Option<f64>,
  #[serde(default)]
  pub target_price: Option<f64>,
}

impl AssetQuote {
  pub fn new(ticker: impl Into<String>, current_price: f64, target_price: f64) -> Self {
    Self {
      ticker: ticker.into(),
      current_price: Some(current_price),
      target_price: Some(target_price),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssetRecord {
  pub ticker: String,
  pub sector: Option<Sector>,
  pub current_price: f64,
  pub target_price: f64,
  pub upside: f64,
  /// Saturating in `(-2, 2)`.
  pub favorability: f64,
  /// Clipped to `[-10, 10]`.
  pub score: f64,
  pub detail: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RankingOutcome {
  /// Sorted by score, best first.
  pub ranked: Vec<AssetRecord>,
  /// Quotes that could not be scored.
  pub excluded: Vec<AllocationError>,
  /// Scored quotes with a flagged condition, e.g. an unresolved sector.
  pub conditions: Vec<AllocationError>,
  /// Scored quotes dropped by the `min_score` filter.
  pub below_min_score: Vec<String>,
}

impl RankingOutcome {
  pub fn tickers(&self) -> Vec<String> {
    self.ranked.iter().map(|r| r.ticker.clone()).collect()
  }
}

/// Score and rank `quotes` against the current indicator scores.
pub fn rank_assets(
  quotes: &[AssetQuote],
  scores: &IndicatorScoreSet,
  registry: &TickerRegistry,
  scorer: &AssetScorer,
  min_score: Option<f64>,
) -> RankingOutcome {
  let mut outcome = RankingOutcome::default();

  for quote in quotes {
    let ticker = quote.ticker.as_str();
    let (current_price, target_price) = match (quote.current_price, quote.target_price) {
      (Some(p), Some(t)) => (p, t),
      (None, _) => {
        warn!(ticker, "missing current price, asset excluded");
        outcome
          .excluded
          .push(AllocationError::data_unavailable(ticker, "missing current price"));
        continue;
      }
      (_, None) => {
        warn!(ticker, "missing target price, asset excluded");
        outcome
          .excluded
          .push(AllocationError::data_unavailable(ticker, "missing target price"));
        continue;
      }
    };

    let sector = registry.sector(ticker);
    let (favorability, unresolved) = resolve_favorability(ticker, sector, scores);
    let scored = scorer.score_asset(
      ticker,
      current_price,
      target_price,
      favorability,
      sector,
      scores,
      registry.is_exporter(ticker),
    );

    if let Some(error) = scored.invalid {
      warn!(ticker, %error, "asset cannot be ranked");
      outcome.excluded.push(error);
      continue;
    }
    outcome.conditions.extend(unresolved);

    if let Some(min) = min_score {
      if scored.score < min {
        debug!(ticker, score = scored.score, min, "below minimum score");
        outcome.below_min_score.push(ticker.to_string());
        continue;
      }
    }

    outcome.ranked.push(AssetRecord {
      ticker: ticker.to_string(),
      sector,
      current_price,
      target_price,
      upside: scored.breakdown.map_or(0.0, |b| b.upside),
      favorability,
      score: scored.score,
      detail: scored.detail,
    });
  }

  outcome.ranked.sort_by(|a, b| {
    b.score
      .partial_cmp(&a.score)
      .unwrap_or(Ordering::Equal)
      .then_with(|| a.ticker.cmp(&b.ticker))
  });

  info!(
    ranked = outcome.ranked.len(),
    excluded = outcome.excluded.len(),
    filtered = outcome.below_min_score.len(),
    "asset ranking built"
  );
  outcome
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SectorCount {
  /// `None` collects unresolved tickers.
  pub sector: Option<Sector>,
  pub count: usize,
}

/// Ticker count per sector, largest first.
pub fn sector_distribution<S: AsRef<str>>(
  tickers: &[S],
  registry: &TickerRegistry,
) -> Vec<SectorCount> {
  let mut counts: BTreeMap<Option<Sector>, usize> = BTreeMap::new();
  for ticker in tickers {
    *counts.entry(registry.sector(ticker.as_ref())).or_default() += 1;
  }

  let mut distribution: Vec<SectorCount> = counts
    .into_iter()
    .map(|(sector, count)| SectorCount { sector, count })
    .collect();
  distribution.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.sector.cmp(&b.sector)));
  distribution
}
