//! Session configuration with defaults matching the standard ten-turn game.

use crate::{validate_range, ValidationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cash thresholds for the lifestyle grade, highest first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LifestyleThresholds {
    pub upper: Decimal,
    pub middle_upper: Decimal,
    pub middle: Decimal,
}

impl Default for LifestyleThresholds {
    fn default() -> Self {
        Self {
            upper: Decimal::new(20_000_000, 0),
            middle_upper: Decimal::new(13_000_000, 0),
            middle: Decimal::new(10_000_000, 0),
        }
    }
}

/// Game configuration parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Starting cash.
    pub initial_cash: Decimal,
    /// Number of turns in a game (>= 1).
    pub max_turns: u32,
    /// Countdown length of a turn in seconds.
    pub turn_duration_secs: u32,
    /// Real-time slice consumed per countdown step.
    pub countdown_slice_ms: u64,
    pub turn_start_delay_ms: u64,
    pub event_display_delay_ms: u64,
    pub settle_delay_ms: u64,
    /// Fee charged on every trade amount (e.g. 0.0025 = 0.25%).
    pub fee_rate: Decimal,
    /// Percent range of the end-of-turn random drift.
    pub drift_range: (f64, f64),
    pub lifestyle: LifestyleThresholds,
    /// Seed for deterministic RNG.
    pub rng_seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            initial_cash: Decimal::new(10_000_000, 0),
            max_turns: 10,
            turn_duration_secs: 60,
            countdown_slice_ms: 1_000,
            turn_start_delay_ms: 1_000,
            event_display_delay_ms: 3_000,
            settle_delay_ms: 1_000,
            fee_rate: Decimal::new(25, 4),
            drift_range: (-3.0, 3.0),
            lifestyle: LifestyleThresholds::default(),
            rng_seed: 42,
        }
    }
}

impl GameConfig {
    pub fn turn_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.turn_duration_secs))
    }

    pub fn countdown_slice(&self) -> Duration {
        Duration::from_millis(self.countdown_slice_ms)
    }

    pub fn turn_start_delay(&self) -> Duration {
        Duration::from_millis(self.turn_start_delay_ms)
    }

    pub fn event_display_delay(&self) -> Duration {
        Duration::from_millis(self.event_display_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Validate a configuration before a session is built from it.
pub fn validate_config(cfg: &GameConfig) -> Result<(), ValidationError> {
    if cfg.max_turns == 0 {
        return Err(ValidationError::NoTurns);
    }
    if cfg.turn_duration_secs == 0 {
        return Err(ValidationError::ZeroDuration("turn_duration_secs"));
    }
    if cfg.countdown_slice_ms == 0 {
        return Err(ValidationError::ZeroDuration("countdown_slice_ms"));
    }
    if cfg.fee_rate < Decimal::ZERO || cfg.fee_rate >= Decimal::ONE {
        return Err(ValidationError::InvalidFeeRate);
    }
    if cfg.initial_cash <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveMoney);
    }
    validate_range(cfg.drift_range.0, cfg.drift_range.1)?;
    let l = &cfg.lifestyle;
    if !(l.upper > l.middle_upper && l.middle_upper > l.middle) {
        return Err(ValidationError::ThresholdOrder);
    }
    if l.middle <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveMoney);
    }
    Ok(())
}
