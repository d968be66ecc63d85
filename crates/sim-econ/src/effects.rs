//! Effect resolution: applies scheduled events and random drift to prices.
//!
//! Effects of one event are applied strictly in declaration order and each
//! one mutates the live price, so an instrument targeted by a global and a
//! sector effect of the same event receives both, compounded.

use crate::pct_to_decimal;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sim_core::{
    EffectDescriptor, EffectScope, EventRecord, InstrumentId, InstrumentRepository,
    ScheduledEvent, SectorId,
};
use tracing::{debug, info, warn};

/// Percents applied by a single effect descriptor.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectImpact {
    /// `None` for whole-market effects.
    pub sector: Option<SectorId>,
    pub applied: Vec<(InstrumentId, f64)>,
}

impl EffectImpact {
    /// Mean applied percent; zero when nothing was targeted.
    pub fn avg_pct(&self) -> f64 {
        if self.applied.is_empty() {
            return 0.0;
        }
        self.applied.iter().map(|(_, p)| p).sum::<f64>() / self.applied.len() as f64
    }
}

/// Result of resolving one scheduled event.
#[derive(Clone, Debug, PartialEq)]
pub struct EventOutcome {
    pub key: String,
    pub impacts: Vec<EffectImpact>,
}

impl EventOutcome {
    /// One ledger record per effect, in application order.
    pub fn records(&self, turn: u32) -> Vec<EventRecord> {
        self.impacts
            .iter()
            .map(|imp| EventRecord {
                turn,
                key: self.key.clone(),
                sector: imp.sector.clone(),
                avg_impact_pct: imp.avg_pct(),
            })
            .collect()
    }
}

/// Seeded source of effect and drift draws.
pub struct EffectResolver {
    rng: ChaCha8Rng,
}

impl EffectResolver {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn uniform(&mut self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..=max)
    }

    /// Apply every effect of `event` in order.
    pub fn resolve<R: InstrumentRepository + ?Sized>(
        &mut self,
        repo: &mut R,
        event: &ScheduledEvent,
    ) -> EventOutcome {
        let impacts = event
            .effects
            .iter()
            .map(|eff| self.apply_effect(repo, eff))
            .collect::<Vec<_>>();
        info!(event = %event.key, effects = impacts.len(), "event resolved");
        EventOutcome {
            key: event.key.clone(),
            impacts,
        }
    }

    /// Apply one effect to its targets, reading each target's current price.
    pub fn apply_effect<R: InstrumentRepository + ?Sized>(
        &mut self,
        repo: &mut R,
        effect: &EffectDescriptor,
    ) -> EffectImpact {
        let targets = match &effect.scope {
            EffectScope::Global => repo.list_all(),
            EffectScope::Sector(s) => repo.list_by_sector(s),
        };
        let shared = match &effect.variation {
            Some(v) if !v.per_instrument => Some(effect.base_rate + self.uniform(v.min, v.max)),
            _ => None,
        };
        let mut applied = Vec::with_capacity(targets.len());
        for inst in targets {
            let pct = match (&effect.variation, shared) {
                (_, Some(p)) => p,
                (Some(v), None) => effect.base_rate + self.uniform(v.min, v.max),
                (None, None) => effect.base_rate,
            };
            match repo.adjust_price(&inst.id, pct_to_decimal(pct)) {
                Ok(_) => applied.push((inst.id, pct)),
                Err(e) => warn!(instrument = %inst.id, error = %e, "effect skipped"),
            }
        }
        EffectImpact {
            sector: effect.sector_id().cloned(),
            applied,
        }
    }

    /// Move every instrument by an independent draw from `range`.
    /// Returns the number of instruments adjusted.
    pub fn apply_drift<R: InstrumentRepository + ?Sized>(
        &mut self,
        repo: &mut R,
        range: (f64, f64),
    ) -> usize {
        let mut moved = 0;
        for inst in repo.list_all() {
            let pct = self.uniform(range.0, range.1);
            match repo.adjust_price(&inst.id, pct_to_decimal(pct)) {
                Ok(_) => moved += 1,
                Err(e) => warn!(instrument = %inst.id, error = %e, "drift skipped"),
            }
        }
        debug!(moved, "market drift applied");
        moved
    }
}
