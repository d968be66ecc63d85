//! Clock drivers feeding elapsed time into a session.

use crate::session::GameSession;
use crate::GameState;
use sim_core::InstrumentRepository;
use std::time::Duration;

/// Source of ticks: elapsed real time and whether the game is paused.
pub trait ClockDriver {
    /// Next tick, or `None` when the clock has stopped.
    fn next_tick(&mut self) -> Option<(Duration, bool)>;
}

/// Deterministic clock emitting a fixed step, optionally bounded.
#[derive(Clone, Debug)]
pub struct FixedStepClock {
    step: Duration,
    remaining: Option<u64>,
    paused: bool,
}

impl FixedStepClock {
    pub fn new(step: Duration) -> Self {
        Self {
            step,
            remaining: None,
            paused: false,
        }
    }

    /// Stop after `ticks` steps.
    pub fn limited(step: Duration, ticks: u64) -> Self {
        Self {
            remaining: Some(ticks),
            ..Self::new(step)
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }
}

impl ClockDriver for FixedStepClock {
    fn next_tick(&mut self) -> Option<(Duration, bool)> {
        match self.remaining.as_mut() {
            Some(0) => return None,
            Some(n) => *n -= 1,
            None => {}
        }
        Some((self.step, self.paused))
    }
}

impl<M: InstrumentRepository> GameSession<M> {
    /// Feed ticks from `clock` until the session leaves `Playing` or the
    /// clock stops. Returns the number of ticks delivered.
    pub fn run_with<C: ClockDriver + ?Sized>(&mut self, clock: &mut C) -> u64 {
        let mut ticks = 0;
        while self.state() == GameState::Playing {
            let Some((dt, paused)) = clock.next_tick() else {
                break;
            };
            self.tick(dt, paused);
            ticks += 1;
        }
        ticks
    }
}
