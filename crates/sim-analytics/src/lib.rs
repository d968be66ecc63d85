#![deny(warnings)]

//! Game history and end-of-game analytics.
//!
//! [`HistoryLedger`] observes every trade and event during play; once the
//! game ends [`compute_result`] derives the final [`GameResult`] from the
//! ledger and the closing account values.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sim_core::{GameResult, Holding, Instrument, InstrumentId, LifestyleThresholds};
use sim_econ::{apply_bonus, bonus_pct, lifestyle_grade};
use std::collections::BTreeMap;
use tracing::info;

pub mod ledger;
pub mod metrics;
pub mod style;

pub use ledger::HistoryLedger;
pub use metrics::{achievements, investment_grade, investment_highlights, win_rate, AchievementInputs};
pub use style::{classify, StyleInputs};

/// Closing values of a session.
#[derive(Clone, Copy, Debug)]
pub struct ResultInputs<'a> {
    pub initial_cash: Decimal,
    pub cash: Decimal,
    /// Value of anything left unsold after liquidation.
    pub stock_value: Decimal,
    pub watermark: usize,
    pub lifestyle: &'a LifestyleThresholds,
    pub ledger: &'a HistoryLedger,
    pub instruments: &'a [Instrument],
    pub holdings: &'a BTreeMap<InstrumentId, Holding>,
}

/// Derive the final result of a game.
pub fn compute_result(i: &ResultInputs<'_>) -> GameResult {
    let bonus = bonus_pct(i.watermark);
    let final_asset = apply_bonus(i.cash + i.stock_value, bonus);
    let total_profit = final_asset - i.initial_cash;
    let profit_rate = if i.initial_cash > Decimal::ZERO {
        (total_profit / i.initial_cash * Decimal::ONE_HUNDRED)
            .to_f64()
            .unwrap_or(0.0)
    } else {
        0.0
    };

    let txs = i.ledger.transactions();
    let total_trades = txs.len();
    let win = win_rate(txs);
    let (best, worst) = investment_highlights(txs, i.instruments, i.holdings);
    let turns = i.ledger.turns_completed();
    let badges = achievements(&AchievementInputs {
        profit: total_profit,
        profit_rate,
        win_rate: win,
        sectors_traded: i.ledger.sectors_traded().len(),
        total_trades,
        max_sectors: i.watermark,
    });
    let style = classify(&StyleInputs {
        total_trades,
        total_turns: turns,
        max_sectors: i.watermark,
        profit_rate,
        diversification_bonus: bonus,
    });

    info!(%final_asset, profit_rate, bonus, ?style, "game result computed");
    GameResult {
        initial_cash: i.initial_cash,
        final_asset,
        total_profit,
        profit_rate,
        lifestyle_grade: lifestyle_grade(final_asset, i.lifestyle),
        investment_grade: investment_grade(profit_rate),
        diversification_bonus_pct: bonus,
        max_sectors_diversified: i.watermark,
        turns_completed: turns,
        total_trades,
        win_rate: win,
        best_investment: best,
        worst_investment: worst,
        achievements: badges,
        investor_style: style,
    }
}
