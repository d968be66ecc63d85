//! Turn-indexed schedule of market events.

use serde::{Deserialize, Serialize};
use sim_core::{validate_event, EffectDescriptor, ScheduledEvent, ValidationError};
use std::collections::BTreeMap;

/// One row of a catalog file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub turn: u32,
    pub key: String,
    pub effects: Vec<EffectDescriptor>,
}

/// Fixed mapping from turn number to the event scheduled on it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventCatalog {
    events: BTreeMap<u32, ScheduledEvent>,
}

impl EventCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in ten-turn schedule. Global effects are listed first.
    pub fn standard() -> Self {
        let mut events = BTreeMap::new();
        events.insert(
            2,
            ScheduledEvent {
                key: "rate_cut".to_string(),
                effects: vec![
                    EffectDescriptor::global(1.0).with_variation(-1.0, 1.0, false),
                    EffectDescriptor::sector("FIN", -4.0).with_variation(-2.0, 2.0, true),
                    EffectDescriptor::sector("TECH", 6.0).with_variation(-2.0, 2.0, true),
                ],
            },
        );
        events.insert(
            3,
            ScheduledEvent {
                key: "ai_chip_boom".to_string(),
                effects: vec![
                    EffectDescriptor::global(0.0).with_variation(-2.0, 2.0, true),
                    EffectDescriptor::sector("SEM", 25.0).with_variation(-3.0, 3.0, true),
                    EffectDescriptor::sector("TECH", 15.0).with_variation(-3.0, 3.0, true),
                ],
            },
        );
        events.insert(
            5,
            ScheduledEvent {
                key: "pandemic_shock".to_string(),
                effects: vec![
                    EffectDescriptor::global(-8.0).with_variation(-2.0, 2.0, true),
                    EffectDescriptor::sector("BIO", 30.0).with_variation(-5.0, 5.0, true),
                    EffectDescriptor::sector("CONSUMER", -10.0).with_variation(-3.0, 3.0, true),
                ],
            },
        );
        events.insert(
            7,
            ScheduledEvent {
                key: "oil_crisis".to_string(),
                effects: vec![
                    EffectDescriptor::global(-3.0).with_variation(-1.0, 1.0, false),
                    EffectDescriptor::sector("ENERGY", 20.0).with_variation(-4.0, 4.0, true),
                    EffectDescriptor::sector("CONSUMER", -6.0).with_variation(-2.0, 2.0, true),
                ],
            },
        );
        events.insert(
            9,
            ScheduledEvent {
                key: "chip_glut".to_string(),
                effects: vec![
                    EffectDescriptor::global(0.0).with_variation(-2.0, 2.0, true),
                    EffectDescriptor::sector("SEM", -18.0).with_variation(-3.0, 3.0, true),
                    EffectDescriptor::sector("TECH", -8.0).with_variation(-2.0, 2.0, true),
                ],
            },
        );
        Self { events }
    }

    /// Build a catalog from file rows, validating each event.
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, ValidationError> {
        let mut catalog = Self::new();
        for e in entries {
            catalog.insert(
                e.turn,
                ScheduledEvent {
                    key: e.key,
                    effects: e.effects,
                },
            )?;
        }
        Ok(catalog)
    }

    /// Schedule an event, replacing any previous one on that turn.
    pub fn insert(
        &mut self,
        turn: u32,
        event: ScheduledEvent,
    ) -> Result<Option<ScheduledEvent>, ValidationError> {
        if turn == 0 {
            return Err(ValidationError::InvalidTurn(turn));
        }
        validate_event(&event)?;
        Ok(self.events.insert(turn, event))
    }

    pub fn event_for(&self, turn: u32) -> Option<&ScheduledEvent> {
        self.events.get(&turn)
    }

    pub fn has_event(&self, turn: u32) -> bool {
        self.events.contains_key(&turn)
    }

    pub fn turns(&self) -> impl Iterator<Item = u32> + '_ {
        self.events.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.events
            .iter()
            .map(|(turn, e)| CatalogEntry {
                turn: *turn,
                key: e.key.clone(),
                effects: e.effects.clone(),
            })
            .collect()
    }
}
