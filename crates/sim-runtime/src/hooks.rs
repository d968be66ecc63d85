//! Session hooks: observers notified at lifecycle points.
//!
//! Hooks observe and report; they never mutate the session. Subscribers are
//! stored in a hash map, so the order in which hooks are called for the same
//! signal is unspecified.

use crate::GameState;
use sim_core::{GameResult, ScheduledEvent};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// Observer of session signals. Every method defaults to a no-op.
pub trait SessionHook {
    fn name(&self) -> &str {
        "hook"
    }

    fn on_state_changed(&mut self, _state: GameState) {}

    fn on_turn_changed(&mut self, _turn: u32) {}

    fn on_event_triggered(&mut self, _turn: u32, _event: &ScheduledEvent) {}

    fn on_timer_tick(&mut self, _remaining: Duration) {}

    fn on_game_completed(&mut self, _result: &GameResult) {}
}

/// Handle returned by [`HookRegistry::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

/// Multicast registry of session hooks.
#[derive(Default)]
pub struct HookRegistry {
    next_id: u64,
    hooks: HashMap<HookId, Box<dyn SessionHook>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.hooks.values().map(|h| h.name()).collect();
        f.debug_struct("HookRegistry").field("hooks", &names).finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, hook: Box<dyn SessionHook>) -> HookId {
        self.next_id += 1;
        let id = HookId(self.next_id);
        self.hooks.insert(id, hook);
        id
    }

    /// Remove a hook. Returns false if the id was unknown.
    pub fn unsubscribe(&mut self, id: HookId) -> bool {
        self.hooks.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub(crate) fn state_changed(&mut self, state: GameState) {
        self.hooks.values_mut().for_each(|h| h.on_state_changed(state));
    }

    pub(crate) fn turn_changed(&mut self, turn: u32) {
        self.hooks.values_mut().for_each(|h| h.on_turn_changed(turn));
    }

    pub(crate) fn event_triggered(&mut self, turn: u32, event: &ScheduledEvent) {
        self.hooks
            .values_mut()
            .for_each(|h| h.on_event_triggered(turn, event));
    }

    pub(crate) fn timer_tick(&mut self, remaining: Duration) {
        self.hooks.values_mut().for_each(|h| h.on_timer_tick(remaining));
    }

    pub(crate) fn game_completed(&mut self, result: &GameResult) {
        self.hooks
            .values_mut()
            .for_each(|h| h.on_game_completed(result));
    }
}

/// Owned copy of a signal, as captured by [`SignalRecorder`].
#[derive(Clone, Debug, PartialEq)]
pub enum Signal {
    StateChanged(GameState),
    TurnChanged(u32),
    EventTriggered { turn: u32, key: String },
    TimerTick(Duration),
    GameCompleted(Box<GameResult>),
}

/// Hook that appends every signal to a shared log.
#[derive(Clone, Debug, Default)]
pub struct SignalRecorder {
    log: Rc<RefCell<Vec<Signal>>>,
}

impl SignalRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the log; stays valid after the recorder is boxed.
    pub fn log(&self) -> Rc<RefCell<Vec<Signal>>> {
        Rc::clone(&self.log)
    }
}

impl SessionHook for SignalRecorder {
    fn name(&self) -> &str {
        "signal-recorder"
    }

    fn on_state_changed(&mut self, state: GameState) {
        self.log.borrow_mut().push(Signal::StateChanged(state));
    }

    fn on_turn_changed(&mut self, turn: u32) {
        self.log.borrow_mut().push(Signal::TurnChanged(turn));
    }

    fn on_event_triggered(&mut self, turn: u32, event: &ScheduledEvent) {
        self.log.borrow_mut().push(Signal::EventTriggered {
            turn,
            key: event.key.clone(),
        });
    }

    fn on_timer_tick(&mut self, remaining: Duration) {
        self.log.borrow_mut().push(Signal::TimerTick(remaining));
    }

    fn on_game_completed(&mut self, result: &GameResult) {
        self.log
            .borrow_mut()
            .push(Signal::GameCompleted(Box::new(result.clone())));
    }
}
