#![deny(warnings)]

//! Core domain models and invariants for the investment game.
//!
//! This crate defines the serializable types shared by the trading engine,
//! the turn runtime and the analytics layer, together with validation
//! helpers and the error taxonomy surfaced to players.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

pub mod config;
pub mod market;

pub use config::{validate_config, GameConfig, LifestyleThresholds};
pub use market::{held_sectors, stock_value, InMemoryMarket, InstrumentRepository, MarketError};

/// Unique identifier for a tradable instrument, e.g. "SEM-01".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstrumentId(pub String);

impl InstrumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for a market sector, e.g. "SEM" or "BIO".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SectorId(pub String);

impl SectorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A listed instrument with its live price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// Instrument identifier.
    pub id: InstrumentId,
    /// Display name.
    pub name: String,
    /// Sector membership.
    pub sector: SectorId,
    /// Current price per unit (> 0).
    pub price: Decimal,
}

/// A position held by the player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub instrument: InstrumentId,
    pub quantity: u64,
    /// Weighted-average purchase price.
    pub avg_price: Decimal,
}

impl Holding {
    /// Amount paid for the position at its average price.
    pub fn cost_basis(&self) -> Decimal {
        self.avg_price * Decimal::from(self.quantity)
    }
}

/// Random spread added on top of an effect's base rate, in percent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    pub min: f64,
    pub max: f64,
    /// Draw once per instrument when true, once for the whole effect otherwise.
    #[serde(default)]
    pub per_instrument: bool,
}

/// Which instruments an effect touches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectScope {
    /// Every instrument in the market.
    Global,
    /// Only instruments of one sector.
    Sector(SectorId),
}

/// One price adjustment inside a scheduled event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectDescriptor {
    pub scope: EffectScope,
    /// Base percent change, e.g. 25.0 for +25%.
    pub base_rate: f64,
    #[serde(default)]
    pub variation: Option<Variation>,
}

impl EffectDescriptor {
    pub fn global(base_rate: f64) -> Self {
        Self {
            scope: EffectScope::Global,
            base_rate,
            variation: None,
        }
    }

    pub fn sector(sector: impl Into<String>, base_rate: f64) -> Self {
        Self {
            scope: EffectScope::Sector(SectorId::new(sector)),
            base_rate,
            variation: None,
        }
    }

    pub fn with_variation(mut self, min: f64, max: f64, per_instrument: bool) -> Self {
        self.variation = Some(Variation {
            min,
            max,
            per_instrument,
        });
        self
    }

    /// Sector targeted by this effect, `None` for whole-market effects.
    pub fn sector_id(&self) -> Option<&SectorId> {
        match &self.scope {
            EffectScope::Global => None,
            EffectScope::Sector(s) => Some(s),
        }
    }
}

/// A scripted market event. Effects are applied in declaration order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub key: String,
    pub effects: Vec<EffectDescriptor>,
}

/// Direction of a trade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// An executed trade. Append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Monotonic sequence number; orders transactions within a session.
    pub seq: u64,
    pub turn: u32,
    pub side: Side,
    pub instrument: InstrumentId,
    pub sector: SectorId,
    pub quantity: u64,
    /// Price per unit at execution.
    pub price: Decimal,
    pub fee: Decimal,
}

impl TransactionRecord {
    /// Gross amount before fees.
    pub fn amount(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// Signed effect on cash: negative for buys, positive for sells.
    pub fn cash_delta(&self) -> Decimal {
        match self.side {
            Side::Buy => -(self.amount() + self.fee),
            Side::Sell => self.amount() - self.fee,
        }
    }
}

/// Record of one effect of a fired event. Append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub turn: u32,
    pub key: String,
    /// `None` means the whole market.
    pub sector: Option<SectorId>,
    /// Mean percent actually applied to the targeted instruments.
    pub avg_impact_pct: f64,
}

/// End-of-turn view of the player's account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnSnapshot {
    pub turn: u32,
    pub cash: Decimal,
    pub stock_value: Decimal,
    pub total_assets: Decimal,
    /// Copy of the nonzero holdings at snapshot time.
    pub holdings: Vec<Holding>,
    pub transactions: Vec<TransactionRecord>,
    pub events: Vec<EventRecord>,
}

impl TurnSnapshot {
    pub fn empty(turn: u32) -> Self {
        Self {
            turn,
            cash: Decimal::ZERO,
            stock_value: Decimal::ZERO,
            total_assets: Decimal::ZERO,
            holdings: Vec::new(),
            transactions: Vec::new(),
            events: Vec::new(),
        }
    }
}

/// Four-tier lifestyle classification of the final asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LifestyleGrade {
    Lower,
    Middle,
    MiddleUpper,
    Upper,
}

/// Five-tier skill grade derived from the profit rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InvestmentGrade {
    Novice,
    Apprentice,
    Skilled,
    Expert,
    Genius,
}

/// Investor archetypes produced by the style classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvestorStyle {
    CautiousDiversifier,
    FocusedConcentrator,
    ActiveTrader,
    GrowthSeeker,
    BalancedInvestor,
    CuriousExplorer,
}

/// Badges awarded at game end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Achievement {
    /// Profit rate of at least 100%.
    ProfitDoubler,
    /// Win rate of at least 80%.
    SharpShooter,
    /// Traded in at least four distinct sectors.
    SectorExplorer,
    /// At least 50 trades.
    ActiveTrader,
    /// Between 1 and 20 trades.
    PatientInvestor,
    /// Held five sectors at once.
    FullyDiversified,
    /// Finished with a positive profit.
    InTheBlack,
}

/// Best or worst performing instrument of a game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvestmentHighlight {
    pub instrument: InstrumentId,
    pub name: String,
    pub profit_pct: f64,
    /// True when the position was fully divested during the game.
    pub realized: bool,
}

/// Final outcome of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub initial_cash: Decimal,
    /// Total assets after liquidation and diversification bonus.
    pub final_asset: Decimal,
    pub total_profit: Decimal,
    /// Percent, e.g. 12.5 for +12.5%.
    pub profit_rate: f64,
    pub lifestyle_grade: LifestyleGrade,
    pub investment_grade: InvestmentGrade,
    /// Bonus percent actually applied, from the diversification watermark.
    pub diversification_bonus_pct: i32,
    pub max_sectors_diversified: usize,
    pub turns_completed: u32,
    pub total_trades: usize,
    /// Percent of trades that were profitable sells.
    pub win_rate: f64,
    pub best_investment: Option<InvestmentHighlight>,
    pub worst_investment: Option<InvestmentHighlight>,
    pub achievements: BTreeSet<Achievement>,
    pub investor_style: InvestorStyle,
}

/// Errors surfaced by player actions.
#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },
    #[error("insufficient holdings of {instrument}: requested {requested}, held {held}")]
    InsufficientHoldings {
        instrument: InstrumentId,
        requested: u64,
        held: u64,
    },
    #[error("unknown instrument: {0}")]
    InvalidInstrument(InstrumentId),
    #[error("action not allowed while {0}")]
    InvalidTurnState(String),
    /// The market refused a mutation after cash was already reserved.
    #[error("trade rejected: {0}")]
    TradeRejected(String),
    #[error("quantity must be > 0")]
    InvalidQuantity,
}

/// Validation errors for configuration and scenario data.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("max_turns must be >= 1")]
    NoTurns,
    #[error("duration field `{0}` must be > 0")]
    ZeroDuration(&'static str),
    #[error("fee rate must be within [0,1)")]
    InvalidFeeRate,
    #[error("negative or zero monetary value is invalid")]
    NonPositiveMoney,
    #[error("non-finite or inverted percent range")]
    InvalidRange,
    #[error("lifestyle thresholds must be strictly descending")]
    ThresholdOrder,
    #[error("name must not be empty")]
    EmptyName,
    #[error("duplicate instrument: {0}")]
    DuplicateInstrument(String),
    #[error("invalid price for instrument {0}")]
    InvalidPrice(String),
    #[error("event scheduled for invalid turn {0}")]
    InvalidTurn(u32),
}

/// Validate a percent range `(min, max)`.
pub fn validate_range(min: f64, max: f64) -> Result<(), ValidationError> {
    if !(min.is_finite() && max.is_finite()) || min > max {
        return Err(ValidationError::InvalidRange);
    }
    Ok(())
}

/// Validate a listed instrument.
pub fn validate_instrument(i: &Instrument) -> Result<(), ValidationError> {
    if i.id.0.trim().is_empty() || i.name.trim().is_empty() || i.sector.0.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if i.price <= Decimal::ZERO {
        return Err(ValidationError::InvalidPrice(i.id.0.clone()));
    }
    Ok(())
}

/// Validate a scheduled event's effects.
pub fn validate_event(e: &ScheduledEvent) -> Result<(), ValidationError> {
    if e.key.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    for eff in &e.effects {
        if !eff.base_rate.is_finite() {
            return Err(ValidationError::InvalidRange);
        }
        if let Some(v) = &eff.variation {
            validate_range(v.min, v.max)?;
        }
    }
    Ok(())
}
