//! Step-by-step driver for a session, used by tests and the CLI.

use crate::session::{GameSession, TurnPhase};
use crate::GameState;
use sim_core::{GameError, GameResult, InstrumentId, InstrumentRepository, TransactionRecord, TurnSnapshot};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Upper bound on ticks spent advancing a single turn.
const MAX_TICKS_PER_TURN: usize = 100_000;

/// One line of a harness script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HarnessCommand {
    Advance,
    Buy(InstrumentId, u64),
    Sell(InstrumentId, u64),
    Pause,
    Resume,
    Skip,
    Reset,
    Snapshot,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{0}` needs an instrument and a quantity")]
    MissingArgument(&'static str),
    #[error("invalid quantity `{0}`")]
    BadQuantity(String),
}

impl FromStr for HarnessCommand {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let cmd = words.next().ok_or(CommandParseError::Empty)?;
        let trade = |name: &'static str, words: &mut std::str::SplitWhitespace<'_>| {
            let id = words.next().ok_or(CommandParseError::MissingArgument(name))?;
            let qty = words.next().ok_or(CommandParseError::MissingArgument(name))?;
            let qty = qty
                .parse::<u64>()
                .map_err(|_| CommandParseError::BadQuantity(qty.to_string()))?;
            Ok::<_, CommandParseError>((InstrumentId::new(id), qty))
        };
        match cmd.to_ascii_lowercase().as_str() {
            "advance" | "next" => Ok(Self::Advance),
            "buy" => trade("buy", &mut words).map(|(id, q)| Self::Buy(id, q)),
            "sell" => trade("sell", &mut words).map(|(id, q)| Self::Sell(id, q)),
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "skip" => Ok(Self::Skip),
            "reset" => Ok(Self::Reset),
            "snapshot" | "status" => Ok(Self::Snapshot),
            other => Err(CommandParseError::Unknown(other.to_string())),
        }
    }
}

/// What the harness reports after a step.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionView {
    NotStarted,
    Turn(TurnSnapshot),
    Completed(Box<GameResult>),
}

pub struct GameHarness<M: InstrumentRepository> {
    session: GameSession<M>,
    paused: bool,
}

impl<M: InstrumentRepository> GameHarness<M> {
    pub fn new(session: GameSession<M>) -> Self {
        Self {
            session,
            paused: false,
        }
    }

    pub fn session(&self) -> &GameSession<M> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut GameSession<M> {
        &mut self.session
    }

    /// Start the game if it is ready, otherwise run the current turn to its
    /// end and into the next one (or to the end of the game). Either way the
    /// new turn is left with its event resolved and trading open.
    pub fn advance_turn(&mut self) -> Result<SessionView, GameError> {
        match self.session.state() {
            GameState::Ready => {
                self.session.start()?;
                self.open_trading();
                return Ok(self.snapshot());
            }
            GameState::Playing => {}
            other => return Err(GameError::InvalidTurnState(format!("{other:?}"))),
        }
        let turn = self.session.turn();
        self.session.force_skip_turn()?;
        let step = self.session.config().countdown_slice();
        let mut ticks = 0;
        while self.session.state() == GameState::Playing && self.session.turn() == turn {
            if ticks >= MAX_TICKS_PER_TURN {
                return Err(GameError::InvalidTurnState(format!("turn {turn} did not settle")));
            }
            self.session.tick(step, self.paused);
            ticks += 1;
        }
        self.open_trading();
        debug!(turn, ticks, "turn advanced");
        Ok(self.snapshot())
    }

    /// Sit out the turn-start and event-display delays exactly, so the
    /// countdown is untouched when control returns.
    fn open_trading(&mut self) {
        while self.session.state() == GameState::Playing {
            match self.session.phase() {
                TurnPhase::TurnStart { remaining } | TurnPhase::EventDisplay { remaining } => {
                    self.session.tick(remaining, self.paused)
                }
                _ => break,
            }
        }
    }

    pub fn buy(&mut self, id: &InstrumentId, quantity: u64) -> Result<TransactionRecord, GameError> {
        self.session.buy(id, quantity)
    }

    pub fn sell(&mut self, id: &InstrumentId, quantity: u64) -> Result<TransactionRecord, GameError> {
        self.session.sell(id, quantity)
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn force_skip_turn(&mut self) -> Result<(), GameError> {
        self.session.force_skip_turn()
    }

    pub fn reset(&mut self) {
        self.paused = false;
        self.session.reset();
    }

    pub fn snapshot(&self) -> SessionView {
        if let Some(result) = self.session.result() {
            return SessionView::Completed(Box::new(result.clone()));
        }
        match self.session.current_snapshot() {
            Some(s) => SessionView::Turn(s),
            None => SessionView::NotStarted,
        }
    }

    pub fn execute(&mut self, cmd: &HarnessCommand) -> Result<SessionView, GameError> {
        match cmd {
            HarnessCommand::Advance => return self.advance_turn(),
            HarnessCommand::Buy(id, qty) => {
                self.buy(id, *qty)?;
            }
            HarnessCommand::Sell(id, qty) => {
                self.sell(id, *qty)?;
            }
            HarnessCommand::Pause => self.pause(),
            HarnessCommand::Resume => self.resume(),
            HarnessCommand::Skip => self.force_skip_turn()?,
            HarnessCommand::Reset => self.reset(),
            HarnessCommand::Snapshot => {}
        }
        Ok(self.snapshot())
    }

    /// Advance until the game finishes.
    pub fn run_to_end(&mut self) -> Result<&GameResult, GameError> {
        while self.session.state() != GameState::Finished {
            self.advance_turn()?;
        }
        self.session
            .result()
            .ok_or_else(|| GameError::InvalidTurnState("finished without a result".to_string()))
    }
}
