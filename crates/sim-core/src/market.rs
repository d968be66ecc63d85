//! Instrument repository capability and an in-memory implementation.
//!
//! The game core never owns prices or positions directly; it reads and
//! mutates them through [`InstrumentRepository`]. [`InMemoryMarket`] is the
//! reference implementation used by the CLI, benches and tests.

use crate::{validate_instrument, Holding, Instrument, InstrumentId, SectorId, ValidationError};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

/// Failures reported by a repository mutation.
#[derive(Debug, Error, PartialEq)]
pub enum MarketError {
    #[error("unknown instrument: {0}")]
    UnknownInstrument(InstrumentId),
    #[error("cannot remove {requested} of {instrument}, only {held} held")]
    InsufficientQuantity {
        instrument: InstrumentId,
        requested: u64,
        held: u64,
    },
    #[error("market rejected mutation: {0}")]
    Rejected(String),
}

/// Read/write access to instrument prices, sector membership and holdings.
pub trait InstrumentRepository {
    fn get(&self, id: &InstrumentId) -> Option<Instrument>;

    fn list_by_sector(&self, sector: &SectorId) -> Vec<Instrument>;

    fn list_all(&self) -> Vec<Instrument>;

    /// Move the price by `percent` (e.g. 2.5 for +2.5%) and return the new price.
    fn adjust_price(&mut self, id: &InstrumentId, percent: Decimal) -> Result<Decimal, MarketError>;

    /// Nonzero holdings keyed by instrument.
    fn holdings(&self) -> BTreeMap<InstrumentId, Holding>;

    fn holding(&self, id: &InstrumentId) -> Option<Holding> {
        self.holdings().remove(id)
    }

    fn increase_holding(
        &mut self,
        id: &InstrumentId,
        quantity: u64,
        price: Decimal,
    ) -> Result<(), MarketError>;

    fn decrease_holding(&mut self, id: &InstrumentId, quantity: u64) -> Result<(), MarketError>;

    /// Restore opening prices and drop every holding.
    fn restore_opening_state(&mut self);
}

/// Market value of all holdings at current prices.
pub fn stock_value<R: InstrumentRepository + ?Sized>(repo: &R) -> Decimal {
    repo.holdings()
        .values()
        .filter_map(|h| repo.get(&h.instrument).map(|i| i.price * Decimal::from(h.quantity)))
        .sum()
}

/// Distinct sectors with a nonzero holding.
pub fn held_sectors<R: InstrumentRepository + ?Sized>(repo: &R) -> BTreeSet<SectorId> {
    repo.holdings()
        .values()
        .filter(|h| h.quantity > 0)
        .filter_map(|h| repo.get(&h.instrument).map(|i| i.sector))
        .collect()
}

/// Lowest price an instrument can fall to.
pub const MIN_PRICE: Decimal = Decimal::ONE;

/// Decimal places kept on prices after an adjustment.
const PRICE_DP: u32 = 4;

/// Instrument table and player holdings kept in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryMarket {
    instruments: BTreeMap<InstrumentId, Instrument>,
    opening: Vec<Instrument>,
    holdings: BTreeMap<InstrumentId, Holding>,
}

impl InMemoryMarket {
    /// Build a market, validating every instrument and rejecting duplicate ids.
    pub fn new(instruments: Vec<Instrument>) -> Result<Self, ValidationError> {
        let mut table = BTreeMap::new();
        for i in &instruments {
            validate_instrument(i)?;
            if table.insert(i.id.clone(), i.clone()).is_some() {
                return Err(ValidationError::DuplicateInstrument(i.id.0.clone()));
            }
        }
        Ok(Self {
            instruments: table,
            opening: instruments,
            holdings: BTreeMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

impl InstrumentRepository for InMemoryMarket {
    fn get(&self, id: &InstrumentId) -> Option<Instrument> {
        self.instruments.get(id).cloned()
    }

    fn list_by_sector(&self, sector: &SectorId) -> Vec<Instrument> {
        self.instruments
            .values()
            .filter(|i| &i.sector == sector)
            .cloned()
            .collect()
    }

    fn list_all(&self) -> Vec<Instrument> {
        self.instruments.values().cloned().collect()
    }

    fn adjust_price(&mut self, id: &InstrumentId, percent: Decimal) -> Result<Decimal, MarketError> {
        let inst = self
            .instruments
            .get_mut(id)
            .ok_or_else(|| MarketError::UnknownInstrument(id.clone()))?;
        let factor = Decimal::ONE + percent / Decimal::ONE_HUNDRED;
        let next = (inst.price * factor).round_dp(PRICE_DP).max(MIN_PRICE);
        debug!(instrument = %id, from = %inst.price, to = %next, "price adjusted");
        inst.price = next;
        Ok(next)
    }

    fn holdings(&self) -> BTreeMap<InstrumentId, Holding> {
        self.holdings.clone()
    }

    fn holding(&self, id: &InstrumentId) -> Option<Holding> {
        self.holdings.get(id).cloned()
    }

    fn increase_holding(
        &mut self,
        id: &InstrumentId,
        quantity: u64,
        price: Decimal,
    ) -> Result<(), MarketError> {
        if !self.instruments.contains_key(id) {
            return Err(MarketError::UnknownInstrument(id.clone()));
        }
        let h = self.holdings.entry(id.clone()).or_insert_with(|| Holding {
            instrument: id.clone(),
            quantity: 0,
            avg_price: Decimal::ZERO,
        });
        let total_qty = h.quantity.checked_add(quantity).ok_or_else(|| {
            MarketError::Rejected(format!("quantity overflow for {id}"))
        })?;
        let cost = h.cost_basis() + price * Decimal::from(quantity);
        h.avg_price = (cost / Decimal::from(total_qty)).round_dp(PRICE_DP);
        h.quantity = total_qty;
        Ok(())
    }

    fn decrease_holding(&mut self, id: &InstrumentId, quantity: u64) -> Result<(), MarketError> {
        let held = self.holdings.get(id).map(|h| h.quantity).unwrap_or(0);
        if held < quantity {
            return Err(MarketError::InsufficientQuantity {
                instrument: id.clone(),
                requested: quantity,
                held,
            });
        }
        if held == quantity {
            self.holdings.remove(id);
        } else if let Some(h) = self.holdings.get_mut(id) {
            h.quantity = held - quantity;
        }
        Ok(())
    }

    fn restore_opening_state(&mut self) {
        self.instruments = self
            .opening
            .iter()
            .map(|i| (i.id.clone(), i.clone()))
            .collect();
        self.holdings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn market() -> InMemoryMarket {
        InMemoryMarket::new(vec![
            Instrument {
                id: InstrumentId::new("SEM-01"),
                name: "Nova Semi".to_string(),
                sector: SectorId::new("SEM"),
                price: Decimal::new(10_000, 0),
            },
            Instrument {
                id: InstrumentId::new("BIO-01"),
                name: "Helix Bio".to_string(),
                sector: SectorId::new("BIO"),
                price: Decimal::new(50_000, 0),
            },
        ])
        .unwrap()
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut items = market().list_all();
        items.push(items[0].clone());
        assert!(matches!(
            InMemoryMarket::new(items),
            Err(ValidationError::DuplicateInstrument(_))
        ));
    }

    #[test]
    fn weighted_average_price() {
        let mut m = market();
        let id = InstrumentId::new("SEM-01");
        m.increase_holding(&id, 10, Decimal::new(10_000, 0)).unwrap();
        m.increase_holding(&id, 30, Decimal::new(12_000, 0)).unwrap();
        let h = m.holding(&id).unwrap();
        assert_eq!(h.quantity, 40);
        assert_eq!(h.avg_price, Decimal::new(11_500, 0));
    }

    #[test]
    fn decrease_removes_empty_position() {
        let mut m = market();
        let id = InstrumentId::new("BIO-01");
        m.increase_holding(&id, 5, Decimal::new(50_000, 0)).unwrap();
        assert!(matches!(
            m.decrease_holding(&id, 6),
            Err(MarketError::InsufficientQuantity { held: 5, .. })
        ));
        m.decrease_holding(&id, 5).unwrap();
        assert!(m.holdings().is_empty());
    }

    #[test]
    fn value_and_sectors() {
        let mut m = market();
        m.increase_holding(&InstrumentId::new("SEM-01"), 2, Decimal::new(9_000, 0))
            .unwrap();
        m.increase_holding(&InstrumentId::new("BIO-01"), 1, Decimal::new(50_000, 0))
            .unwrap();
        assert_eq!(stock_value(&m), Decimal::new(70_000, 0));
        assert_eq!(held_sectors(&m).len(), 2);
    }

    #[test]
    fn restore_resets_prices_and_holdings() {
        let mut m = market();
        let id = InstrumentId::new("SEM-01");
        m.adjust_price(&id, Decimal::new(10, 0)).unwrap();
        m.increase_holding(&id, 1, Decimal::new(11_000, 0)).unwrap();
        m.restore_opening_state();
        assert_eq!(m.get(&id).unwrap().price, Decimal::new(10_000, 0));
        assert!(m.holdings().is_empty());
    }

    proptest! {
        #[test]
        fn price_never_below_floor(pct in -100i64..=100) {
            let mut m = market();
            let id = InstrumentId::new("SEM-01");
            for _ in 0..5 {
                m.adjust_price(&id, Decimal::new(pct, 0)).unwrap();
            }
            prop_assert!(m.get(&id).unwrap().price >= MIN_PRICE);
        }
    }
}
