//! Investor-style classifier.
//!
//! Rules are checked in a fixed order: the primary archetype rules first,
//! then relaxed fallbacks, then an unconditional default. The classifier
//! therefore always returns exactly one archetype.

use sim_core::InvestorStyle;

/// Statistics the classifier looks at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StyleInputs {
    pub total_trades: usize,
    pub total_turns: u32,
    pub max_sectors: usize,
    pub profit_rate: f64,
    pub diversification_bonus: i32,
}

impl StyleInputs {
    fn trades_per_turn(&self) -> f64 {
        self.total_trades as f64 / f64::from(self.total_turns.max(1))
    }
}

type Rule = (InvestorStyle, fn(&StyleInputs) -> bool);

const PRIMARY: [Rule; 5] = [
    (InvestorStyle::CautiousDiversifier, |s: &StyleInputs| {
        s.max_sectors >= 4
            && s.trades_per_turn() <= 2.0
            && s.profit_rate >= 0.0
            && s.diversification_bonus >= 15
    }),
    (InvestorStyle::FocusedConcentrator, |s: &StyleInputs| {
        s.max_sectors <= 2 && s.profit_rate >= 10.0
    }),
    (InvestorStyle::ActiveTrader, |s: &StyleInputs| {
        s.trades_per_turn() >= 5.0 && s.total_trades >= 30
    }),
    (InvestorStyle::GrowthSeeker, |s: &StyleInputs| {
        s.profit_rate >= 30.0 && s.max_sectors <= 3
    }),
    (InvestorStyle::BalancedInvestor, |s: &StyleInputs| {
        s.max_sectors >= 3
            && (-10.0..=30.0).contains(&s.profit_rate)
            && s.diversification_bonus >= 10
    }),
];

const FALLBACK: [Rule; 5] = [
    (InvestorStyle::CautiousDiversifier, |s: &StyleInputs| s.max_sectors >= 4),
    (InvestorStyle::FocusedConcentrator, |s: &StyleInputs| {
        s.max_sectors <= 2 && s.trades_per_turn() <= 3.0 && s.profit_rate >= -20.0
    }),
    (InvestorStyle::ActiveTrader, |s: &StyleInputs| s.trades_per_turn() >= 3.0),
    (InvestorStyle::GrowthSeeker, |s: &StyleInputs| s.profit_rate >= 15.0),
    (InvestorStyle::BalancedInvestor, |s: &StyleInputs| s.max_sectors >= 3),
];

/// Archetype returned when no rule matches.
pub const DEFAULT_STYLE: InvestorStyle = InvestorStyle::CuriousExplorer;

/// Classify a player's style. Pure function of the inputs.
pub fn classify(s: &StyleInputs) -> InvestorStyle {
    PRIMARY
        .iter()
        .chain(FALLBACK.iter())
        .find(|(_, rule)| rule(s))
        .map(|(style, _)| *style)
        .unwrap_or(DEFAULT_STYLE)
}
