#![deny(warnings)]

//! Turn runtime for the investment game.
//!
//! [`GameSession`] is the state machine that walks a game through its turns.
//! It owns the account, the history ledger and the bound market, resolves the
//! scheduled events from an [`EventCatalog`] and notifies subscribed
//! [`SessionHook`]s. [`GameHarness`] drives a session step by step for tests
//! and the CLI; [`Scenario`] loads a full setup from YAML.

use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod clock;
pub mod harness;
pub mod hooks;
pub mod scenario;
pub mod session;

pub use catalog::{CatalogEntry, EventCatalog};
pub use clock::{ClockDriver, FixedStepClock};
pub use harness::{CommandParseError, GameHarness, HarnessCommand, SessionView};
pub use hooks::{HookId, HookRegistry, SessionHook, Signal, SignalRecorder};
pub use scenario::Scenario;
pub use session::{GameSession, TurnPhase};

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    #[default]
    WaitingToStart,
    Ready,
    Playing,
    Finished,
}
