//! # Macro Parameters
//!
//! $$
//! \text{ideal}_c = \frac{1}{L}\sum_{t=T-L+1}^{T} p_{c,t}
//! $$
//!
//! Immutable scoring parameters. Commodity reference prices are trailing means over a
//! lookback window and are only changed by building a new snapshot with [`MacroParams::refresh`].

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;

/// Ordering of the inflation band checks.
///
/// `Literal` checks "at most one point above the band" before the deflation case, which
/// makes the deflation score unreachable. `DeflationAware` checks the below-band case first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InflationBandOrdering {
  #[default]
  Literal,
  DeflationAware,
}

/// Commodity whose reference price is refreshed from market history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Commodity {
  Soy,
  Corn,
  IronOre,
  Oil,
}

impl Commodity {
  pub const ALL: [Commodity; 4] = [
    Commodity::Soy,
    Commodity::Corn,
    Commodity::IronOre,
    Commodity::Oil,
  ];

  /// Score lost per unit of absolute deviation from the reference price.
  pub fn slope(self) -> f64 {
    match self {
      Commodity::Soy => 1.5,
      Commodity::Corn => 2.0,
      Commodity::IronOre => 0.1,
      Commodity::Oil => 0.2,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Commodity::Soy => "soy",
      Commodity::Corn => "corn",
      Commodity::IronOre => "iron_ore",
      Commodity::Oil => "oil",
    }
  }
}

/// Reference ("ideal") commodity prices. `None` means no reference is available.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommodityIdeals {
  pub soy: Option<f64>,
  pub corn: Option<f64>,
  pub iron_ore: Option<f64>,
  pub oil: Option<f64>,
}

impl Default for CommodityIdeals {
  /// Static seeds used until the first refresh.
  fn default() -> Self {
    Self {
      soy: Some(13.0),
      corn: Some(5.5),
      iron_ore: Some(100.0),
      oil: Some(80.0),
    }
  }
}

impl CommodityIdeals {
  pub fn unavailable() -> Self {
    Self {
      soy: None,
      corn: None,
      iron_ore: None,
      oil: None,
    }
  }

  pub fn get(&self, commodity: Commodity) -> Option<f64> {
    match commodity {
      Commodity::Soy => self.soy,
      Commodity::Corn => self.corn,
      Commodity::IronOre => self.iron_ore,
      Commodity::Oil => self.oil,
    }
  }

  fn set(&mut self, commodity: Commodity, value: Option<f64>) {
    match commodity {
      Commodity::Soy => self.soy = value,
      Commodity::Corn => self.corn = value,
      Commodity::IronOre => self.iron_ore = value,
      Commodity::Oil => self.oil = value,
    }
  }
}

/// Historical commodity prices, oldest first, as resolved by the data layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommodityHistory {
  pub soy: Vec<f64>,
  pub corn: Vec<f64>,
  pub iron_ore: Vec<f64>,
  pub oil: Vec<f64>,
}

impl CommodityHistory {
  pub fn prices(&self, commodity: Commodity) -> &[f64] {
    match commodity {
      Commodity::Soy => &self.soy,
      Commodity::Corn => &self.corn,
      Commodity::IronOre => &self.iron_ore,
      Commodity::Oil => &self.oil,
    }
  }

  /// Mean of the last `lookback` finite prices, `None` if there are none.
  pub fn trailing_mean(&self, commodity: Commodity, lookback: usize) -> Option<f64> {
    let finite: Vec<f64> = self
      .prices(commodity)
      .iter()
      .copied()
      .filter(|p| p.is_finite())
      .collect();
    let window = &finite[finite.len().saturating_sub(lookback.max(1))..];
    if window.is_empty() {
      None
    } else {
      Some(window.iter().sum::<f64>() / window.len() as f64)
    }
  }
}

/// Scoring parameter snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroParams {
  /// Neutral policy rate.
  pub selic_neutral: f64,
  /// Inflation target.
  pub ipca_target: f64,
  /// Half-width of the inflation tolerance band.
  pub ipca_tolerance: f64,
  pub dolar_ideal: f64,
  pub pib_ideal: f64,
  pub commodity_ideals: CommodityIdeals,
  /// Number of trailing observations averaged into a commodity reference.
  pub lookback: usize,
  pub inflation_ordering: InflationBandOrdering,
}

impl Default for MacroParams {
  fn default() -> Self {
    Self {
      selic_neutral: 7.0,
      ipca_target: 3.0,
      ipca_tolerance: 1.5,
      dolar_ideal: 5.30,
      pib_ideal: 2.0,
      commodity_ideals: CommodityIdeals::default(),
      lookback: 12,
      inflation_ordering: InflationBandOrdering::Literal,
    }
  }
}

impl MacroParams {
  /// Build the startup snapshot from defaults and the supplied history.
  pub fn initialize(history: &CommodityHistory) -> Self {
    Self::default().refresh(history)
  }

  /// New snapshot whose commodity references are the trailing means of `history`.
  ///
  /// A commodity without usable history keeps its current reference.
  pub fn refresh(&self, history: &CommodityHistory) -> Self {
    let mut next = self.clone();
    for commodity in Commodity::ALL {
      match history.trailing_mean(commodity, self.lookback) {
        Some(mean) => {
          debug!(
            commodity = commodity.name(),
            reference = mean,
            "refreshed commodity reference"
          );
          next.commodity_ideals.set(commodity, Some(mean));
        }
        None => {
          debug!(
            commodity = commodity.name(),
            "no history, keeping previous reference"
          );
        }
      }
    }
    info!(lookback = self.lookback, "macro parameters refreshed");
    next
  }
}
