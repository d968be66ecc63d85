//! Fee-inclusive trading against cash and repository holdings.

use crate::fee_for;
use rust_decimal::Decimal;
use sim_core::{
    GameError, Instrument, InstrumentId, InstrumentRepository, Side, TransactionRecord,
};
use tracing::{info, warn};

/// Owns the player's cash and executes trades against a repository.
///
/// Buys debit cash first and restore it if the holding update fails; sells
/// update the holding first and only then credit cash, so they never need a
/// compensating step.
#[derive(Clone, Debug)]
pub struct TradingDesk {
    cash: Decimal,
    fee_rate: Decimal,
    next_seq: u64,
}

impl TradingDesk {
    pub fn new(initial_cash: Decimal, fee_rate: Decimal) -> Self {
        Self {
            cash: initial_cash,
            fee_rate,
            next_seq: 1,
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    fn record(
        &mut self,
        turn: u32,
        side: Side,
        inst: Instrument,
        quantity: u64,
        fee: Decimal,
    ) -> TransactionRecord {
        let seq = self.next_seq;
        self.next_seq += 1;
        TransactionRecord {
            seq,
            turn,
            side,
            instrument: inst.id,
            sector: inst.sector,
            quantity,
            price: inst.price,
            fee,
        }
    }

    pub fn buy<R: InstrumentRepository + ?Sized>(
        &mut self,
        repo: &mut R,
        turn: u32,
        id: &InstrumentId,
        quantity: u64,
    ) -> Result<TransactionRecord, GameError> {
        if quantity == 0 {
            return Err(GameError::InvalidQuantity);
        }
        let inst = repo
            .get(id)
            .ok_or_else(|| GameError::InvalidInstrument(id.clone()))?;
        let cost = inst.price * Decimal::from(quantity);
        let fee = fee_for(cost, self.fee_rate);
        let total = cost + fee;
        if self.cash < total {
            return Err(GameError::InsufficientFunds {
                needed: total,
                available: self.cash,
            });
        }

        let before = self.cash;
        self.cash -= total;
        if let Err(e) = repo.increase_holding(id, quantity, inst.price) {
            self.cash = before;
            warn!(instrument = %id, error = %e, "buy rolled back");
            return Err(GameError::TradeRejected(e.to_string()));
        }
        info!(turn, instrument = %id, quantity, price = %inst.price, %fee, "buy");
        Ok(self.record(turn, Side::Buy, inst, quantity, fee))
    }

    pub fn sell<R: InstrumentRepository + ?Sized>(
        &mut self,
        repo: &mut R,
        turn: u32,
        id: &InstrumentId,
        quantity: u64,
    ) -> Result<TransactionRecord, GameError> {
        if quantity == 0 {
            return Err(GameError::InvalidQuantity);
        }
        let inst = repo
            .get(id)
            .ok_or_else(|| GameError::InvalidInstrument(id.clone()))?;
        let held = repo.holding(id).map(|h| h.quantity).unwrap_or(0);
        if held < quantity {
            return Err(GameError::InsufficientHoldings {
                instrument: id.clone(),
                requested: quantity,
                held,
            });
        }
        repo.decrease_holding(id, quantity)
            .map_err(|e| GameError::TradeRejected(e.to_string()))?;

        let fee = fee_for(inst.price * Decimal::from(quantity), self.fee_rate);
        info!(turn, instrument = %id, quantity, price = %inst.price, %fee, "sell");
        let tx = self.record(turn, Side::Sell, inst, quantity, fee);
        self.cash += tx.cash_delta();
        Ok(tx)
    }

    /// Sell every nonzero holding at its current price.
    ///
    /// Positions that fail to sell are logged and left in place.
    pub fn liquidate_all<R: InstrumentRepository + ?Sized>(
        &mut self,
        repo: &mut R,
        turn: u32,
    ) -> Vec<TransactionRecord> {
        let positions = repo.holdings();
        let mut sold = Vec::with_capacity(positions.len());
        for h in positions.values().filter(|h| h.quantity > 0) {
            match self.sell(repo, turn, &h.instrument, h.quantity) {
                Ok(tx) => sold.push(tx),
                Err(e) => warn!(instrument = %h.instrument, error = %e, "liquidation failed"),
            }
        }
        info!(positions = sold.len(), cash = %self.cash, "holdings liquidated");
        sold
    }
}
