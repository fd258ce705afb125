//! # Ticker Registry
//!
//! $$
//! \text{ticker} \mapsto \text{Sector} \cup \{\bot\}
//! $$
//!
//! Closed ticker to sector mapping and the commodity-exporter set for the B3 universe.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::macro_model::sector::Sector;

/// Default sector assignment.
const DEFAULT_SECTORS: &[(&str, Sector)] = &[
  ("ITUB4.SA", Sector::Banks),
  ("BBDC4.SA", Sector::Banks),
  ("SANB11.SA", Sector::Banks),
  ("BBAS3.SA", Sector::Banks),
  ("ABCB4.SA", Sector::Banks),
  ("BRSR6.SA", Sector::Banks),
  ("BMGB4.SA", Sector::Banks),
  ("BPAC11.SA", Sector::Banks),
  ("ITSA4.SA", Sector::Banks),
  ("BRAV3.SA", Sector::Banks),
  ("MULT3.SA", Sector::Banks),
  ("STBP3.SA", Sector::Banks),
  ("BBDC3.SA", Sector::Banks),
  ("BHIA3.SA", Sector::Banks),
  ("BBSE3.SA", Sector::Insurance),
  ("PSSA3.SA", Sector::Insurance),
  ("SULA11.SA", Sector::Insurance),
  ("CXSE3.SA", Sector::Insurance),
  ("B3SA3.SA", Sector::ExchangesFinancialServices),
  ("XPBR31.SA", Sector::ExchangesFinancialServices),
  ("EGIE3.SA", Sector::ElectricPower),
  ("CPLE6.SA", Sector::ElectricPower),
  ("TAEE11.SA", Sector::ElectricPower),
  ("CMIG4.SA", Sector::ElectricPower),
  ("AURE3.SA", Sector::ElectricPower),
  ("CPFE3.SA", Sector::ElectricPower),
  ("AESB3.SA", Sector::ElectricPower),
  ("CSAN3.SA", Sector::ElectricPower),
  ("ELET3.SA", Sector::ElectricPower),
  ("EQTL3.SA", Sector::ElectricPower),
  ("ENEV3.SA", Sector::ElectricPower),
  ("CPLE3.SA", Sector::ElectricPower),
  ("ENGI11.SA", Sector::ElectricPower),
  ("PETR4.SA", Sector::OilGasBiofuels),
  ("PRIO3.SA", Sector::OilGasBiofuels),
  ("RECV3.SA", Sector::OilGasBiofuels),
  ("RRRP3.SA", Sector::OilGasBiofuels),
  ("UGPA3.SA", Sector::OilGasBiofuels),
  ("VBBR3.SA", Sector::OilGasBiofuels),
  ("PETR3.SA", Sector::OilGasBiofuels),
  ("VALE3.SA", Sector::MiningSteel),
  ("CSNA3.SA", Sector::MiningSteel),
  ("GGBR4.SA", Sector::MiningSteel),
  ("CMIN3.SA", Sector::MiningSteel),
  ("GOAU4.SA", Sector::MiningSteel),
  ("BRAP4.SA", Sector::MiningSteel),
  ("USIM5.SA", Sector::MiningSteel),
  ("WEGE3.SA", Sector::IndustrialsCapitalGoods),
  ("RANI3.SA", Sector::IndustrialsCapitalGoods),
  ("KLBN11.SA", Sector::IndustrialsCapitalGoods),
  ("SUZB3.SA", Sector::IndustrialsCapitalGoods),
  ("UNIP6.SA", Sector::IndustrialsCapitalGoods),
  ("KEPL3.SA", Sector::IndustrialsCapitalGoods),
  ("TUPY3.SA", Sector::IndustrialsCapitalGoods),
  ("POMO4.SA", Sector::IndustrialsCapitalGoods),
  ("RAIL3.SA", Sector::IndustrialsCapitalGoods),
  ("SRNA3.SA", Sector::IndustrialsCapitalGoods),
  ("EMBR3.SA", Sector::IndustrialsCapitalGoods),
  ("CYRE3.SA", Sector::IndustrialsCapitalGoods),
  ("GMAT3.SA", Sector::IndustrialsCapitalGoods),
  ("CEAB3.SA", Sector::IndustrialsCapitalGoods),
  ("JHSF3.SA", Sector::IndustrialsCapitalGoods),
  ("INTB3.SA", Sector::IndustrialsCapitalGoods),
  ("BRKM5.SA", Sector::IndustrialsCapitalGoods),
  ("MMXM3.SA", Sector::IndustrialsCapitalGoods),
  ("AGRO3.SA", Sector::Agribusiness),
  ("SLCE3.SA", Sector::Agribusiness),
  ("SMTO3.SA", Sector::Agribusiness),
  ("CAML3.SA", Sector::Agribusiness),
  ("RAIZ4.SA", Sector::Agribusiness),
  ("HAPV3.SA", Sector::Healthcare),
  ("FLRY3.SA", Sector::Healthcare),
  ("RDOR3.SA", Sector::Healthcare),
  ("QUAL3.SA", Sector::Healthcare),
  ("RADL3.SA", Sector::Healthcare),
  ("ANIM3.SA", Sector::Healthcare),
  ("AZEV4.SA", Sector::Healthcare),
  ("PETZ3.SA", Sector::Healthcare),
  ("SIMH3.SA", Sector::Healthcare),
  ("ALOS3.SA", Sector::Healthcare),
  ("VIVA3.SA", Sector::Healthcare),
  ("HYPE3.SA", Sector::Healthcare),
  ("PMAM3.SA", Sector::Healthcare),
  ("TOTS3.SA", Sector::Technology),
  ("POSI3.SA", Sector::Technology),
  ("LINX3.SA", Sector::Technology),
  ("LWSA3.SA", Sector::Technology),
  ("COGN3.SA", Sector::Technology),
  ("AMOB3.SA", Sector::Technology),
  ("IFCM3.SA", Sector::Technology),
  ("SMFT3.SA", Sector::Technology),
  ("IGTI11.SA", Sector::Technology),
  ("YDUQ3.SA", Sector::Technology),
  ("ECOR3.SA", Sector::Technology),
  ("DXCO3.SA", Sector::Technology),
  ("LJQQ3.SA", Sector::Technology),
  ("RCSL4.SA", Sector::Technology),
  ("IRBR3.SA", Sector::Technology),
  ("MGLU3.SA", Sector::ConsumerDiscretionary),
  ("LREN3.SA", Sector::ConsumerDiscretionary),
  ("RENT3.SA", Sector::ConsumerDiscretionary),
  ("ARZZ3.SA", Sector::ConsumerDiscretionary),
  ("ALPA4.SA", Sector::ConsumerDiscretionary),
  ("CRFB3.SA", Sector::ConsumerDiscretionary),
  ("BEEF3.SA", Sector::ConsumerDiscretionary),
  ("AZUL4.SA", Sector::ConsumerDiscretionary),
  ("CVCB3.SA", Sector::ConsumerDiscretionary),
  ("VAMO3.SA", Sector::ConsumerDiscretionary),
  ("MRVE3.SA", Sector::ConsumerDiscretionary),
  ("RAPT4.SA", Sector::ConsumerDiscretionary),
  ("MOVI3.SA", Sector::ConsumerDiscretionary),
  ("GFSA3.SA", Sector::ConsumerDiscretionary),
  ("AMER3.SA", Sector::ConsumerDiscretionary),
  ("EZTC3.SA", Sector::ConsumerDiscretionary),
  ("GOLL4.SA", Sector::ConsumerDiscretionary),
  ("ABEV3.SA", Sector::ConsumerStaples),
  ("NTCO3.SA", Sector::ConsumerStaples),
  ("PCAR3.SA", Sector::ConsumerStaples),
  ("MDIA3.SA", Sector::ConsumerStaples),
  ("MRFG3.SA", Sector::ConsumerStaples),
  ("JBSS3.SA", Sector::ConsumerStaples),
  ("BRFS3.SA", Sector::ConsumerStaples),
  ("CBAV3.SA", Sector::ConsumerStaples),
  ("VIVT3.SA", Sector::Communication),
  ("TIMS3.SA", Sector::Communication),
  ("OIBR3.SA", Sector::Communication),
  ("SBSP3.SA", Sector::PublicUtilities),
  ("SAPR11.SA", Sector::PublicUtilities),
  ("SAPR3.SA", Sector::PublicUtilities),
  ("SAPR4.SA", Sector::PublicUtilities),
  ("CSMG3.SA", Sector::PublicUtilities),
  ("ALUP11.SA", Sector::PublicUtilities),
  ("CCRO3.SA", Sector::PublicUtilities),
];

/// Tickers whose revenue is dominated by commodity exports.
const DEFAULT_EXPORTERS: &[&str] = &[
  "VALE3.SA",
  "SUZB3.SA",
  "KLBN11.SA",
  "AGRO3.SA",
  "PRIO3.SA",
  "SLCE3.SA",
  "SMTO3.SA",
  "CSNA3.SA",
  "GGBR4.SA",
  "CMIN3.SA",
  "TUPY3.SA",
];

/// Additions layered on top of the default registry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryOverrides {
  pub sectors: BTreeMap<String, Sector>,
  pub exporters: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct TickerRegistry {
  sectors: HashMap<String, Sector>,
  exporters: HashSet<String>,
}

impl Default for TickerRegistry {
  fn default() -> Self {
    Self {
      sectors: DEFAULT_SECTORS
        .iter()
        .map(|&(ticker, sector)| (ticker.to_string(), sector))
        .collect(),
      exporters: DEFAULT_EXPORTERS.iter().map(|t| t.to_string()).collect(),
    }
  }
}

impl TickerRegistry {
  /// Registry without any entries.
  pub fn empty() -> Self {
    Self {
      sectors: HashMap::new(),
      exporters: HashSet::new(),
    }
  }

  /// Default registry with `overrides` applied.
  pub fn with_overrides(overrides: &RegistryOverrides) -> Self {
    let mut registry = Self::default();
    for (ticker, &sector) in &overrides.sectors {
      registry.insert(ticker.clone(), sector);
    }
    for ticker in &overrides.exporters {
      registry.mark_exporter(ticker.clone());
    }
    debug!(
      sectors = overrides.sectors.len(),
      exporters = overrides.exporters.len(),
      "applied registry overrides"
    );
    registry
  }

  pub fn insert(&mut self, ticker: impl Into<String>, sector: Sector) {
    self.sectors.insert(ticker.into(), sector);
  }

  pub fn mark_exporter(&mut self, ticker: impl Into<String>) {
    self.exporters.insert(ticker.into());
  }

  /// Sector of `ticker`, `None` when unresolved.
  pub fn sector(&self, ticker: &str) -> Option<Sector> {
    self.sectors.get(ticker).copied()
  }

  pub fn is_exporter(&self, ticker: &str) -> bool {
    self.exporters.contains(ticker)
  }

  pub fn len(&self) -> usize {
    self.sectors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sectors.is_empty()
  }

  /// Registered tickers of `sector`, sorted.
  pub fn tickers_in(&self, sector: Sector) -> Vec<&str> {
    let mut tickers: Vec<&str> = self
      .sectors
      .iter()
      .filter(|&(_, &s)| s == sector)
      .map(|(t, _)| t.as_str())
      .collect();
    tickers.sort_unstable();
    tickers
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_table_resolves_known_tickers() {
    let registry = TickerRegistry::default();
    assert_eq!(registry.sector("ITUB4.SA"), Some(Sector::Banks));
    assert_eq!(registry.sector("VALE3.SA"), Some(Sector::MiningSteel));
    assert_eq!(registry.sector("PETR4.SA"), Some(Sector::OilGasBiofuels));
    assert_eq!(registry.sector("WEGE3.SA"), Some(Sector::IndustrialsCapitalGoods));
    assert_eq!(registry.sector("UNKNOWN.SA"), None);
    assert_eq!(registry.len(), DEFAULT_SECTORS.len());
  }

  #[test]
  fn exporters_are_flagged() {
    let registry = TickerRegistry::default();
    assert!(registry.is_exporter("VALE3.SA"));
    assert!(registry.is_exporter("PRIO3.SA"));
    assert!(!registry.is_exporter("ITUB4.SA"));
  }

  #[test]
  fn every_sector_has_tickers() {
    let registry = TickerRegistry::default();
    for sector in Sector::ALL {
      assert!(!registry.tickers_in(sector).is_empty(), "{sector}");
    }
  }

  #[test]
  fn overrides_extend_and_replace() {
    let mut overrides = RegistryOverrides::default();
    overrides
      .sectors
      .insert("NEWC3.SA".to_string(), Sector::Technology);
    overrides
      .sectors
      .insert("ITUB4.SA".to_string(), Sector::Insurance);
    overrides.exporters.push("NEWC3.SA".to_string());

    let registry = TickerRegistry::with_overrides(&overrides);
    assert_eq!(registry.sector("NEWC3.SA"), Some(Sector::Technology));
    assert_eq!(registry.sector("ITUB4.SA"), Some(Sector::Insurance));
    assert!(registry.is_exporter("NEWC3.SA"));
    assert!(TickerRegistry::empty().is_empty());
  }
}
