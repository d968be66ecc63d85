//! Diversification watermark and end-of-game bonus.

use rust_decimal::Decimal;
use tracing::info;

/// Bonus percent for a number of simultaneously held sectors.
pub fn bonus_pct(sectors: usize) -> i32 {
    match sectors {
        0 | 1 => -10,
        2 => 5,
        3 => 10,
        4 => 15,
        _ => 20,
    }
}

/// `total × (1 + pct/100)`.
pub fn apply_bonus(total: Decimal, pct: i32) -> Decimal {
    total * (Decimal::ONE_HUNDRED + Decimal::from(pct)) / Decimal::ONE_HUNDRED
}

/// Running maximum of distinct sectors held at the same time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiversificationTracker {
    watermark: usize,
}

impl DiversificationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current sector count. Returns true if the watermark rose.
    pub fn observe(&mut self, distinct_sectors: usize) -> bool {
        if distinct_sectors > self.watermark {
            info!(from = self.watermark, to = distinct_sectors, "diversification watermark raised");
            self.watermark = distinct_sectors;
            return true;
        }
        false
    }

    pub fn watermark(&self) -> usize {
        self.watermark
    }

    /// Bonus earned by the watermark, independent of the current sector count.
    pub fn bonus_pct(&self) -> i32 {
        bonus_pct(self.watermark)
    }
}
