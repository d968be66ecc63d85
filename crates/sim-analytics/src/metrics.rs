//! Trade statistics: win rate, best/worst investment, grades and badges.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sim_core::{
    Achievement, Holding, Instrument, InstrumentId, InvestmentGrade, InvestmentHighlight, Side,
    TransactionRecord,
};
use std::collections::{BTreeMap, BTreeSet};

/// Quantity and amount accumulated over a set of trades.
#[derive(Clone, Copy, Debug, Default)]
struct Tally {
    qty: u64,
    amount: Decimal,
}

impl Tally {
    fn add(&mut self, tx: &TransactionRecord) {
        self.qty += tx.quantity;
        self.amount += tx.amount();
    }

    fn avg(&self) -> Option<Decimal> {
        (self.qty > 0).then(|| self.amount / Decimal::from(self.qty))
    }
}

fn pct_change(from: Decimal, to: Decimal) -> f64 {
    if from <= Decimal::ZERO {
        return 0.0;
    }
    ((to - from) / from * Decimal::ONE_HUNDRED)
        .to_f64()
        .unwrap_or(0.0)
}

/// Percent of all trades that were sells above the average buy price.
///
/// The reference price of a sell is the quantity-weighted average of every
/// buy of that instrument executed before it, not a matched lot.
pub fn win_rate(txs: &[TransactionRecord]) -> f64 {
    if txs.is_empty() {
        return 0.0;
    }
    let mut ordered: Vec<&TransactionRecord> = txs.iter().collect();
    ordered.sort_by_key(|t| t.seq);

    let mut bought: BTreeMap<&InstrumentId, Tally> = BTreeMap::new();
    let mut wins = 0usize;
    for tx in ordered {
        match tx.side {
            Side::Buy => bought.entry(&tx.instrument).or_default().add(tx),
            Side::Sell => {
                let avg = bought.get(&tx.instrument).and_then(Tally::avg);
                if matches!(avg, Some(a) if tx.price > a) {
                    wins += 1;
                }
            }
        }
    }
    wins as f64 * 100.0 / txs.len() as f64
}

/// Best and worst instrument by profit percent.
///
/// Candidates are current holdings (unrealized, priced at the market) and
/// instruments fully divested during the game (average sell vs average buy).
pub fn investment_highlights(
    txs: &[TransactionRecord],
    instruments: &[Instrument],
    holdings: &BTreeMap<InstrumentId, Holding>,
) -> (Option<InvestmentHighlight>, Option<InvestmentHighlight>) {
    let by_id: BTreeMap<&InstrumentId, &Instrument> =
        instruments.iter().map(|i| (&i.id, i)).collect();
    let name_of = |id: &InstrumentId| {
        by_id
            .get(id)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| id.0.clone())
    };

    let mut candidates = Vec::new();
    for h in holdings.values().filter(|h| h.quantity > 0) {
        if let Some(inst) = by_id.get(&h.instrument) {
            candidates.push(InvestmentHighlight {
                instrument: h.instrument.clone(),
                name: inst.name.clone(),
                profit_pct: pct_change(h.avg_price, inst.price),
                realized: false,
            });
        }
    }

    let mut tallies: BTreeMap<&InstrumentId, (Tally, Tally)> = BTreeMap::new();
    for tx in txs {
        let entry = tallies.entry(&tx.instrument).or_default();
        match tx.side {
            Side::Buy => entry.0.add(tx),
            Side::Sell => entry.1.add(tx),
        }
    }
    for (id, (buys, sells)) in tallies {
        if holdings.get(id).is_some_and(|h| h.quantity > 0) {
            continue;
        }
        if let (Some(avg_buy), Some(avg_sell)) = (buys.avg(), sells.avg()) {
            candidates.push(InvestmentHighlight {
                instrument: id.clone(),
                name: name_of(id),
                profit_pct: pct_change(avg_buy, avg_sell),
                realized: true,
            });
        }
    }

    let best = candidates
        .iter()
        .max_by(|a, b| a.profit_pct.total_cmp(&b.profit_pct))
        .cloned();
    let worst = candidates
        .iter()
        .min_by(|a, b| a.profit_pct.total_cmp(&b.profit_pct))
        .cloned();
    (best, worst)
}

/// Five-tier grade from the profit rate.
pub fn investment_grade(profit_rate: f64) -> InvestmentGrade {
    match profit_rate {
        r if r >= 100.0 => InvestmentGrade::Genius,
        r if r >= 50.0 => InvestmentGrade::Expert,
        r if r >= 20.0 => InvestmentGrade::Skilled,
        r if r >= 0.0 => InvestmentGrade::Apprentice,
        _ => InvestmentGrade::Novice,
    }
}

/// Inputs to the badge rules.
#[derive(Clone, Copy, Debug)]
pub struct AchievementInputs {
    pub profit: Decimal,
    pub profit_rate: f64,
    pub win_rate: f64,
    pub sectors_traded: usize,
    pub total_trades: usize,
    pub max_sectors: usize,
}

pub fn achievements(i: &AchievementInputs) -> BTreeSet<Achievement> {
    let rules = [
        (Achievement::ProfitDoubler, i.profit_rate >= 100.0),
        (Achievement::SharpShooter, i.win_rate >= 80.0),
        (Achievement::SectorExplorer, i.sectors_traded >= 4),
        (Achievement::ActiveTrader, i.total_trades >= 50),
        (Achievement::PatientInvestor, (1..=20).contains(&i.total_trades)),
        (Achievement::FullyDiversified, i.max_sectors >= 5),
        (Achievement::InTheBlack, i.profit > Decimal::ZERO),
    ];
    rules
        .into_iter()
        .filter_map(|(badge, earned)| earned.then_some(badge))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::SectorId;

    fn tx(seq: u64, side: Side, id: &str, qty: u64, price: i64) -> TransactionRecord {
        TransactionRecord {
            seq,
            turn: 1,
            side,
            instrument: InstrumentId::new(id),
            sector: SectorId::new(id.split('-').next().unwrap_or(id)),
            quantity: qty,
            price: Decimal::new(price, 0),
            fee: Decimal::ZERO,
        }
    }

    fn inst(id: &str, price: i64) -> Instrument {
        Instrument {
            id: InstrumentId::new(id),
            name: format!("{id} Inc"),
            sector: SectorId::new(id.split('-').next().unwrap_or(id)),
            price: Decimal::new(price, 0),
        }
    }

    #[test]
    fn win_rate_uses_average_of_prior_buys() {
        let txs = vec![
            tx(1, Side::Buy, "SEM-01", 10, 100),
            tx(2, Side::Buy, "SEM-01", 10, 200),
            // avg 150: 160 wins, 140 loses
            tx(3, Side::Sell, "SEM-01", 5, 160),
            tx(4, Side::Sell, "SEM-01", 5, 140),
            // later buy does not affect the earlier sells
            tx(5, Side::Buy, "SEM-01", 10, 10),
        ];
        assert_eq!(win_rate(&txs), 20.0);
    }

    #[test]
    fn win_rate_ignores_input_order() {
        let mut txs = vec![
            tx(2, Side::Sell, "BIO-01", 1, 120),
            tx(1, Side::Buy, "BIO-01", 1, 100),
        ];
        assert_eq!(win_rate(&txs), 50.0);
        txs.reverse();
        assert_eq!(win_rate(&txs), 50.0);
    }

    #[test]
    fn empty_ledger_is_neutral() {
        assert_eq!(win_rate(&[]), 0.0);
        let (best, worst) = investment_highlights(&[], &[], &BTreeMap::new());
        assert!(best.is_none() && worst.is_none());
    }

    #[test]
    fn highlights_mix_held_and_divested() {
        let txs = vec![
            tx(1, Side::Buy, "SEM-01", 10, 100),
            tx(2, Side::Sell, "SEM-01", 10, 150),
            tx(3, Side::Buy, "BIO-01", 10, 100),
            tx(4, Side::Sell, "BIO-01", 10, 80),
            tx(5, Side::Buy, "FIN-01", 4, 100),
        ];
        let instruments = vec![inst("SEM-01", 90), inst("BIO-01", 300), inst("FIN-01", 110)];
        let mut holdings = BTreeMap::new();
        holdings.insert(
            InstrumentId::new("FIN-01"),
            Holding {
                instrument: InstrumentId::new("FIN-01"),
                quantity: 4,
                avg_price: Decimal::new(100, 0),
            },
        );
        let (best, worst) = investment_highlights(&txs, &instruments, &holdings);
        let best = best.unwrap();
        let worst = worst.unwrap();
        assert_eq!(best.instrument, InstrumentId::new("SEM-01"));
        assert_eq!(best.profit_pct, 50.0);
        assert!(best.realized);
        assert_eq!(worst.instrument, InstrumentId::new("BIO-01"));
        assert_eq!(worst.profit_pct, -20.0);
        assert_eq!(worst.name, "BIO-01 Inc");
    }

    #[test]
    fn grades() {
        assert_eq!(investment_grade(150.0), InvestmentGrade::Genius);
        assert_eq!(investment_grade(50.0), InvestmentGrade::Expert);
        assert_eq!(investment_grade(20.0), InvestmentGrade::Skilled);
        assert_eq!(investment_grade(0.0), InvestmentGrade::Apprentice);
        assert_eq!(investment_grade(-0.1), InvestmentGrade::Novice);
    }

    #[test]
    fn badges() {
        let got = achievements(&AchievementInputs {
            profit: Decimal::new(12_000_000, 0),
            profit_rate: 120.0,
            win_rate: 85.0,
            sectors_traded: 4,
            total_trades: 12,
            max_sectors: 3,
        });
        assert!(got.contains(&Achievement::ProfitDoubler));
        assert!(got.contains(&Achievement::SharpShooter));
        assert!(got.contains(&Achievement::SectorExplorer));
        assert!(got.contains(&Achievement::PatientInvestor));
        assert!(got.contains(&Achievement::InTheBlack));
        assert!(!got.contains(&Achievement::ActiveTrader));
        assert!(!got.contains(&Achievement::FullyDiversified));

        let idle = achievements(&AchievementInputs {
            profit: Decimal::ZERO,
            profit_rate: 0.0,
            win_rate: 0.0,
            sectors_traded: 0,
            total_trades: 0,
            max_sectors: 0,
        });
        assert!(idle.is_empty());
    }
}
