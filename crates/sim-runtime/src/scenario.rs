//! YAML scenario files: configuration, listed instruments and event schedule.

use crate::catalog::{CatalogEntry, EventCatalog};
use crate::session::GameSession;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sim_core::{GameConfig, InMemoryMarket, Instrument};
use std::path::Path;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: GameConfig,
    pub instruments: Vec<Instrument>,
    /// Event schedule; the standard catalog when omitted.
    #[serde(default)]
    pub events: Option<Vec<CatalogEntry>>,
}

impl Scenario {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).context("parse scenario yaml")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read scenario {}", path.display()))?;
        let scenario =
            Self::from_yaml_str(&text).with_context(|| format!("load {}", path.display()))?;
        info!(path = %path.display(), instruments = scenario.instruments.len(), "scenario loaded");
        Ok(scenario)
    }

    pub fn catalog(&self) -> Result<EventCatalog> {
        match &self.events {
            Some(entries) => {
                EventCatalog::from_entries(entries.clone()).context("invalid event schedule")
            }
            None => Ok(EventCatalog::standard()),
        }
    }

    /// Build a ready-to-start session over an in-memory market.
    pub fn build_session(&self) -> Result<GameSession<InMemoryMarket>> {
        let market =
            InMemoryMarket::new(self.instruments.clone()).context("invalid instrument list")?;
        let session = GameSession::with_market(self.config.clone(), self.catalog()?, market)
            .context("invalid game config")?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameState;
    use rust_decimal::Decimal;
    use sim_core::{EffectScope, InstrumentId, InstrumentRepository, SectorId};

    const YAML: &str = r#"
config:
  max_turns: 3
  turn_duration_secs: 5
  rng_seed: 7
instruments:
  - id: SEM-01
    name: Nova Semiconductor
    sector: SEM
    price: 82000
  - id: BIO-01
    name: Helix Bio
    sector: BIO
    price: "45000.5"
events:
  - turn: 2
    key: chip_rally
    effects:
      - scope: global
        base_rate: 0.0
        variation: { min: -1.0, max: 1.0, per_instrument: true }
      - scope: !sector SEM
        base_rate: 20.0
"#;

    #[test]
    fn parses_full_scenario() {
        let s = Scenario::from_yaml_str(YAML).unwrap();
        assert_eq!(s.config.max_turns, 3);
        assert_eq!(s.config.fee_rate, GameConfig::default().fee_rate);
        assert_eq!(s.instruments[1].price, Decimal::new(450_005, 1));
        let catalog = s.catalog().unwrap();
        let ev = catalog.event_for(2).unwrap();
        assert_eq!(ev.effects[0].scope, EffectScope::Global);
        assert_eq!(ev.effects[1].scope, EffectScope::Sector(SectorId::new("SEM")));
        assert!(ev.effects[1].variation.is_none());
    }

    #[test]
    fn builds_ready_session() {
        let s = Scenario::from_yaml_str(YAML).unwrap();
        let session = s.build_session().unwrap();
        assert_eq!(session.state(), GameState::Ready);
        let m = session.market().unwrap();
        assert!(m.get(&InstrumentId::new("SEM-01")).is_some());
        assert_eq!(session.catalog().len(), 1);
    }

    #[test]
    fn bundled_scenario_plays_through() {
        let s = Scenario::from_yaml_str(include_str!("../../../assets/scenario.yaml")).unwrap();
        assert_eq!(s.instruments.len(), 12);
        let mut h = crate::GameHarness::new(s.build_session().unwrap());
        h.advance_turn().unwrap();
        h.buy(&InstrumentId::new("BIO-02"), 100).unwrap();
        let r = h.run_to_end().unwrap();
        assert_eq!(r.turns_completed, 10);
        assert_eq!(r.total_trades, 2);
    }

    #[test]
    fn omitted_events_use_standard_catalog() {
        let s = Scenario::from_yaml_str(
            "instruments:\n  - { id: A, name: A, sector: TECH, price: 10 }\n",
        )
        .unwrap();
        assert_eq!(s.catalog().unwrap(), EventCatalog::standard());
        assert_eq!(s.config, GameConfig::default());
    }

    #[test]
    fn rejects_bad_setup() {
        let dup = "instruments:\n  - { id: A, name: A, sector: T, price: 10 }\n  - { id: A, name: B, sector: T, price: 10 }\n";
        let s = Scenario::from_yaml_str(dup).unwrap();
        assert!(s.build_session().is_err());

        let zero_turns = "config: { max_turns: 0 }\ninstruments: []\n";
        let s = Scenario::from_yaml_str(zero_turns).unwrap();
        assert!(s.build_session().is_err());

        assert!(Scenario::from_yaml_str("instruments: 3").is_err());
        assert!(Scenario::load("/nonexistent/scenario.yaml").is_err());
    }
}
