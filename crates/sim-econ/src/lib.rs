#![deny(warnings)]

//! Economic rules of the game: fees, price effects, trading and bonuses.
//!
//! This crate provides:
//! - Fee-inclusive pricing of buys and sells
//! - Sequential, compounding application of event effects and random drift
//! - The trading desk with compensating rollback on failed buys
//! - Diversification watermark, bonus table and lifestyle grading

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sim_core::{LifestyleGrade, LifestyleThresholds};

pub mod diversification;
pub mod effects;
pub mod trading;

pub use diversification::{apply_bonus, bonus_pct, DiversificationTracker};
pub use effects::{EffectImpact, EffectResolver, EventOutcome};
pub use trading::TradingDesk;

/// Decimal places kept on drawn percents.
const PCT_DP: u32 = 4;

/// Fee on a trade amount, rounded half away from zero to whole units.
///
/// Example:
/// let fee = fee_for(Decimal::new(100_000, 0), Decimal::new(25, 4));
/// assert_eq!(fee, Decimal::new(250, 0));
pub fn fee_for(amount: Decimal, fee_rate: Decimal) -> Decimal {
    (amount * fee_rate).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Cash debited by a buy: amount plus fee.
pub fn buy_total(price: Decimal, quantity: u64, fee_rate: Decimal) -> Decimal {
    let amount = price * Decimal::from(quantity);
    amount + fee_for(amount, fee_rate)
}

/// Cash credited by a sell: amount minus fee.
pub fn sell_net(price: Decimal, quantity: u64, fee_rate: Decimal) -> Decimal {
    let amount = price * Decimal::from(quantity);
    amount - fee_for(amount, fee_rate)
}

/// Convert a drawn percent to a decimal with fixed precision.
pub fn pct_to_decimal(pct: f64) -> Decimal {
    Decimal::from_f64(pct)
        .map(|d| d.round_dp(PCT_DP))
        .unwrap_or(Decimal::ZERO)
}

/// Classify a final asset against the configured thresholds.
pub fn lifestyle_grade(amount: Decimal, t: &LifestyleThresholds) -> LifestyleGrade {
    if amount >= t.upper {
        LifestyleGrade::Upper
    } else if amount >= t.middle_upper {
        LifestyleGrade::MiddleUpper
    } else if amount >= t.middle {
        LifestyleGrade::Middle
    } else {
        LifestyleGrade::Lower
    }
}
