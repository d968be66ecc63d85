//! Append-only history of transactions, events and per-turn snapshots.
//!
//! Snapshots lag by one turn: the snapshot of turn `n` stays pending until
//! turn `n + 1` opens (or the game ends), and only then joins the history.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{EventRecord, Holding, SectorId, TransactionRecord, TurnSnapshot};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HistoryLedger {
    snapshots: Vec<TurnSnapshot>,
    transactions: Vec<TransactionRecord>,
    events: Vec<EventRecord>,
    pending: Option<TurnSnapshot>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit the previous turn's snapshot, if any, and start collecting `turn`.
    pub fn open_turn(&mut self, turn: u32) -> bool {
        let committed = self.commit_pending();
        self.pending = Some(TurnSnapshot::empty(turn));
        committed
    }

    /// Push the pending snapshot into history. Returns false when none was pending.
    pub fn commit_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(snap) => {
                debug!(turn = snap.turn, total = %snap.total_assets, "snapshot committed");
                self.snapshots.push(snap);
                true
            }
            None => false,
        }
    }

    /// Store the end-of-turn account values on the pending snapshot.
    pub fn finalize_turn(&mut self, cash: Decimal, stock_value: Decimal, holdings: Vec<Holding>) {
        if let Some(snap) = self.pending.as_mut() {
            snap.cash = cash;
            snap.stock_value = stock_value;
            snap.total_assets = cash + stock_value;
            snap.holdings = holdings;
        }
    }

    pub fn record_transaction(&mut self, tx: TransactionRecord) {
        if let Some(snap) = self.pending.as_mut() {
            snap.transactions.push(tx.clone());
        }
        self.transactions.push(tx);
    }

    pub fn record_event(&mut self, ev: EventRecord) {
        if let Some(snap) = self.pending.as_mut() {
            snap.events.push(ev.clone());
        }
        self.events.push(ev);
    }

    pub fn snapshots(&self) -> &[TurnSnapshot] {
        &self.snapshots
    }

    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn pending(&self) -> Option<&TurnSnapshot> {
        self.pending.as_ref()
    }

    pub fn turns_completed(&self) -> u32 {
        self.snapshots.len() as u32
    }

    pub fn transactions_in_turn(&self, turn: u32) -> impl Iterator<Item = &TransactionRecord> {
        self.transactions.iter().filter(move |t| t.turn == turn)
    }

    /// Sectors touched by at least one trade.
    pub fn sectors_traded(&self) -> BTreeSet<SectorId> {
        self.transactions.iter().map(|t| t.sector.clone()).collect()
    }
}
