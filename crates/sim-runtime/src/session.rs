//! Turn state machine.
//!
//! A [`GameSession`] is driven by an external clock calling [`GameSession::tick`]
//! with the elapsed real time and the pause flag. Every suspension point of a
//! turn (start delay, event display, countdown slices, settle delay) is an
//! explicit [`TurnPhase`]; engine work between two suspension points runs to
//! completion inside a single tick.

use crate::catalog::EventCatalog;
use crate::hooks::{HookId, HookRegistry, SessionHook};
use crate::GameState;
use rust_decimal::Decimal;
use sim_analytics::{compute_result, HistoryLedger, ResultInputs};
use sim_core::{
    held_sectors, stock_value, validate_config, GameConfig, GameError, GameResult, InstrumentId,
    InstrumentRepository, TransactionRecord, TurnSnapshot, ValidationError,
};
use sim_econ::{DiversificationTracker, EffectResolver, TradingDesk};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the current turn is suspended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    /// No turn running.
    Idle,
    TurnStart { remaining: Duration },
    EventDisplay { remaining: Duration },
    Countdown,
    /// Turn closed and snapshot finalized; trading is shut.
    Settle { remaining: Duration },
}

/// One play session: state machine, account, market and history.
pub struct GameSession<M: InstrumentRepository> {
    config: GameConfig,
    catalog: EventCatalog,
    market: Option<M>,
    hooks: HookRegistry,
    state: GameState,
    phase: TurnPhase,
    turn: u32,
    countdown: Duration,
    event_applied: bool,
    end_requested: bool,
    /// Real time received but not yet consumed by a suspension point.
    carry: Duration,
    wall_clock: Duration,
    desk: TradingDesk,
    resolver: EffectResolver,
    tracker: DiversificationTracker,
    ledger: HistoryLedger,
    result: Option<GameResult>,
}

impl<M: InstrumentRepository> GameSession<M> {
    pub fn new(config: GameConfig, catalog: EventCatalog) -> Result<Self, ValidationError> {
        validate_config(&config)?;
        Ok(Self {
            desk: TradingDesk::new(config.initial_cash, config.fee_rate),
            resolver: EffectResolver::new(config.rng_seed),
            config,
            catalog,
            market: None,
            hooks: HookRegistry::new(),
            state: GameState::WaitingToStart,
            phase: TurnPhase::Idle,
            turn: 0,
            countdown: Duration::ZERO,
            event_applied: false,
            end_requested: false,
            carry: Duration::ZERO,
            wall_clock: Duration::ZERO,
            tracker: DiversificationTracker::new(),
            ledger: HistoryLedger::new(),
            result: None,
        })
    }

    /// Convenience constructor that binds the market and prepares the session.
    pub fn with_market(
        config: GameConfig,
        catalog: EventCatalog,
        market: M,
    ) -> Result<Self, ValidationError> {
        let mut s = Self::new(config, catalog)?;
        s.bind_market(market);
        s.set_state(GameState::Ready);
        Ok(s)
    }

    pub fn bind_market(&mut self, market: M) {
        self.market = Some(market);
    }

    pub fn market(&self) -> Option<&M> {
        self.market.as_ref()
    }

    pub fn subscribe(&mut self, hook: Box<dyn SessionHook>) -> HookId {
        self.hooks.subscribe(hook)
    }

    pub fn unsubscribe(&mut self, id: HookId) -> bool {
        self.hooks.unsubscribe(id)
    }

    fn set_state(&mut self, state: GameState) {
        if self.state != state {
            info!(from = ?self.state, to = ?state, "game state changed");
            self.state = state;
            self.hooks.state_changed(state);
        }
    }

    fn require(&self, expected: GameState) -> Result<(), GameError> {
        if self.state != expected {
            return Err(GameError::InvalidTurnState(format!("{:?}", self.state)));
        }
        Ok(())
    }

    /// WaitingToStart -> Ready.
    pub fn prepare(&mut self) -> Result<(), GameError> {
        self.require(GameState::WaitingToStart)?;
        if self.market.is_none() {
            warn!("session prepared without a market; turns will not move prices");
        }
        self.set_state(GameState::Ready);
        Ok(())
    }

    /// Ready -> Playing, opening turn 1.
    pub fn start(&mut self) -> Result<(), GameError> {
        self.require(GameState::Ready)?;
        self.set_state(GameState::Playing);
        self.begin_turn(1);
        Ok(())
    }

    /// Rebuild every piece of game state and return to Ready.
    pub fn reset(&mut self) {
        if let Some(m) = self.market.as_mut() {
            m.restore_opening_state();
        }
        self.desk = TradingDesk::new(self.config.initial_cash, self.config.fee_rate);
        self.resolver = EffectResolver::new(self.config.rng_seed);
        self.tracker = DiversificationTracker::new();
        self.ledger = HistoryLedger::new();
        self.result = None;
        self.phase = TurnPhase::Idle;
        self.turn = 0;
        self.countdown = Duration::ZERO;
        self.event_applied = false;
        self.end_requested = false;
        self.carry = Duration::ZERO;
        info!("session reset");
        self.set_state(GameState::Ready);
    }

    /// Advance by `dt` of real time. `paused` freezes the countdown only.
    pub fn tick(&mut self, dt: Duration, paused: bool) {
        self.wall_clock = self.wall_clock.saturating_add(dt);
        if self.state != GameState::Playing {
            return;
        }
        self.carry = self.carry.saturating_add(dt);
        while self.state == GameState::Playing {
            match self.phase {
                TurnPhase::Idle => break,
                TurnPhase::TurnStart { remaining } => match self.wait(remaining) {
                    Some(left) => {
                        self.phase = TurnPhase::TurnStart { remaining: left };
                        break;
                    }
                    None => {
                        self.phase = if self.fire_event() {
                            TurnPhase::EventDisplay {
                                remaining: self.config.event_display_delay(),
                            }
                        } else {
                            TurnPhase::Countdown
                        };
                    }
                },
                TurnPhase::EventDisplay { remaining } => match self.wait(remaining) {
                    Some(left) => {
                        self.phase = TurnPhase::EventDisplay { remaining: left };
                        break;
                    }
                    None => self.phase = TurnPhase::Countdown,
                },
                TurnPhase::Countdown => {
                    if self.countdown.is_zero() {
                        self.end_turn();
                        continue;
                    }
                    let slice = self.config.countdown_slice();
                    if self.carry < slice {
                        break;
                    }
                    if paused {
                        // Frozen countdown: burn every whole slice at once.
                        let slice_ns = slice.as_nanos();
                        let rest = self.carry.as_nanos() % slice_ns;
                        self.carry = Duration::from_nanos(rest as u64);
                        break;
                    }
                    self.carry -= slice;
                    self.countdown = self.countdown.saturating_sub(slice);
                    self.hooks.timer_tick(self.countdown);
                }
                TurnPhase::Settle { remaining } => match self.wait(remaining) {
                    Some(left) => {
                        self.phase = TurnPhase::Settle { remaining: left };
                        break;
                    }
                    None => {
                        if self.turn >= self.config.max_turns || self.end_requested {
                            self.finish();
                        } else {
                            self.begin_turn(self.turn + 1);
                        }
                    }
                },
            }
        }
    }

    /// Consume carried time toward a delay. Returns what is left of it, or
    /// `None` once the delay has fully elapsed.
    fn wait(&mut self, remaining: Duration) -> Option<Duration> {
        if self.carry >= remaining {
            self.carry -= remaining;
            None
        } else {
            let left = remaining - self.carry;
            self.carry = Duration::ZERO;
            Some(left)
        }
    }

    fn begin_turn(&mut self, turn: u32) {
        self.event_applied = false;
        self.turn = turn;
        self.countdown = self.config.turn_duration();
        if self.ledger.open_turn(turn) {
            debug!(turn = turn - 1, "previous snapshot committed");
        }
        info!(turn, max = self.config.max_turns, "turn started");
        self.hooks.turn_changed(turn);
        self.phase = TurnPhase::TurnStart {
            remaining: self.config.turn_start_delay(),
        };
    }

    /// Resolve this turn's scheduled event at most once.
    fn fire_event(&mut self) -> bool {
        if self.event_applied {
            return false;
        }
        let Some(event) = self.catalog.event_for(self.turn).cloned() else {
            return false;
        };
        match self.market.as_mut() {
            Some(m) => {
                let outcome = self.resolver.resolve(m, &event);
                for rec in outcome.records(self.turn) {
                    self.ledger.record_event(rec);
                }
            }
            None => warn!(turn = self.turn, event = %event.key, "no market bound; event has no effect"),
        }
        self.event_applied = true;
        self.hooks.event_triggered(self.turn, &event);
        true
    }

    fn end_turn(&mut self) {
        let next = self.turn + 1;
        match self.market.as_mut() {
            Some(_) if self.catalog.has_event(next) => {
                debug!(turn = self.turn, next, "drift skipped before scheduled event");
            }
            Some(m) => {
                self.resolver.apply_drift(m, self.config.drift_range);
            }
            None => warn!(turn = self.turn, "no market bound; drift skipped"),
        }
        self.observe_sectors();
        let (value, holdings) = match self.market.as_ref() {
            Some(m) => (stock_value(m), m.holdings().into_values().collect()),
            None => (Decimal::ZERO, Vec::new()),
        };
        self.ledger.finalize_turn(self.desk.cash(), value, holdings);
        info!(turn = self.turn, cash = %self.desk.cash(), stock = %value, "turn ended");
        self.phase = TurnPhase::Settle {
            remaining: self.config.settle_delay(),
        };
    }

    fn observe_sectors(&mut self) {
        if let Some(m) = self.market.as_ref() {
            self.tracker.observe(held_sectors(m).len());
        }
    }

    fn finish(&mut self) {
        self.ledger.commit_pending();
        if let Some(m) = self.market.as_mut() {
            for tx in self.desk.liquidate_all(m, self.turn) {
                self.ledger.record_transaction(tx);
            }
        }
        let (instruments, holdings, leftover) = match self.market.as_ref() {
            Some(m) => (m.list_all(), m.holdings(), stock_value(m)),
            None => (Vec::new(), BTreeMap::new(), Decimal::ZERO),
        };
        let result = compute_result(&ResultInputs {
            initial_cash: self.config.initial_cash,
            cash: self.desk.cash(),
            stock_value: leftover,
            watermark: self.tracker.watermark(),
            lifestyle: &self.config.lifestyle,
            ledger: &self.ledger,
            instruments: &instruments,
            holdings: &holdings,
        });
        self.phase = TurnPhase::Idle;
        self.set_state(GameState::Finished);
        self.hooks.game_completed(&result);
        self.result = Some(result);
    }

    fn trading_open(&self) -> Result<(), GameError> {
        self.require(GameState::Playing)?;
        match self.phase {
            TurnPhase::EventDisplay { .. } | TurnPhase::Countdown => Ok(()),
            TurnPhase::TurnStart { .. } => Err(GameError::InvalidTurnState(
                "turn is opening".to_string(),
            )),
            TurnPhase::Settle { .. } | TurnPhase::Idle => Err(GameError::InvalidTurnState(
                "turn is settling".to_string(),
            )),
        }
    }

    pub fn buy(&mut self, id: &InstrumentId, quantity: u64) -> Result<TransactionRecord, GameError> {
        self.trading_open()?;
        let market = self
            .market
            .as_mut()
            .ok_or_else(|| GameError::InvalidInstrument(id.clone()))?;
        let tx = self.desk.buy(market, self.turn, id, quantity)?;
        self.ledger.record_transaction(tx.clone());
        self.observe_sectors();
        Ok(tx)
    }

    pub fn sell(&mut self, id: &InstrumentId, quantity: u64) -> Result<TransactionRecord, GameError> {
        self.trading_open()?;
        let market = self
            .market
            .as_mut()
            .ok_or_else(|| GameError::InvalidInstrument(id.clone()))?;
        let tx = self.desk.sell(market, self.turn, id, quantity)?;
        self.ledger.record_transaction(tx.clone());
        self.observe_sectors();
        Ok(tx)
    }

    /// Zero the countdown; the turn ends at the next tick.
    pub fn force_skip_turn(&mut self) -> Result<(), GameError> {
        self.require(GameState::Playing)?;
        self.countdown = Duration::ZERO;
        debug!(turn = self.turn, "turn skip requested");
        Ok(())
    }

    /// End the game after the current turn settles.
    pub fn request_end(&mut self) -> Result<(), GameError> {
        self.require(GameState::Playing)?;
        self.end_requested = true;
        self.countdown = Duration::ZERO;
        info!(turn = self.turn, "game end requested");
        Ok(())
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn catalog(&self) -> &EventCatalog {
        &self.catalog
    }

    pub fn countdown_remaining(&self) -> Duration {
        self.countdown
    }

    /// Total real time received, paused or not.
    pub fn wall_clock(&self) -> Duration {
        self.wall_clock
    }

    pub fn cash(&self) -> Decimal {
        self.desk.cash()
    }

    pub fn watermark(&self) -> usize {
        self.tracker.watermark()
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn history(&self) -> &[TurnSnapshot] {
        self.ledger.snapshots()
    }

    pub fn result(&self) -> Option<&GameResult> {
        self.result.as_ref()
    }

    /// Live view of the turn in progress, `None` outside a turn.
    pub fn current_snapshot(&self) -> Option<TurnSnapshot> {
        let pending = self.ledger.pending()?;
        let (value, holdings) = match self.market.as_ref() {
            Some(m) => (stock_value(m), m.holdings().into_values().collect()),
            None => (Decimal::ZERO, Vec::new()),
        };
        Some(TurnSnapshot {
            turn: pending.turn,
            cash: self.desk.cash(),
            stock_value: value,
            total_assets: self.desk.cash() + value,
            holdings,
            transactions: pending.transactions.clone(),
            events: pending.events.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{Signal, SignalRecorder};
    use proptest::prelude::*;
    use sim_core::{
        EffectDescriptor, Holding, InMemoryMarket, Instrument, MarketError, ScheduledEvent,
        SectorId, Side,
    };
    use sim_econ::sell_net;

    const SECTORS: [&str; 5] = ["SEM", "TECH", "BIO", "FIN", "ENERGY"];

    fn market() -> InMemoryMarket {
        let instruments = SECTORS
            .iter()
            .enumerate()
            .map(|(n, s)| Instrument {
                id: InstrumentId::new(format!("{s}-01")),
                name: format!("{s} Holdings"),
                sector: SectorId::new(*s),
                price: Decimal::new(10_000 * (n as i64 + 1), 0),
            })
            .collect();
        InMemoryMarket::new(instruments).unwrap()
    }

    fn fast_config(turns: u32) -> GameConfig {
        GameConfig {
            max_turns: turns,
            turn_duration_secs: 3,
            countdown_slice_ms: 1_000,
            turn_start_delay_ms: 500,
            event_display_delay_ms: 2_000,
            settle_delay_ms: 500,
            ..GameConfig::default()
        }
    }

    fn id(s: &str) -> InstrumentId {
        InstrumentId::new(format!("{s}-01"))
    }

    fn started(cfg: GameConfig, catalog: EventCatalog) -> GameSession<InMemoryMarket> {
        let mut s = GameSession::with_market(cfg, catalog, market()).unwrap();
        s.start().unwrap();
        s
    }

    /// Tick through the turn-start and event-display delays.
    fn open_trading<M: InstrumentRepository>(s: &mut GameSession<M>) {
        while let TurnPhase::TurnStart { remaining } | TurnPhase::EventDisplay { remaining } =
            s.phase()
        {
            s.tick(remaining, false);
        }
    }

    /// Tick one second at a time until the next turn opens for trading or
    /// the game ends.
    fn finish_turn<M: InstrumentRepository>(s: &mut GameSession<M>) {
        let turn = s.turn();
        for _ in 0..1_000 {
            if s.state() != GameState::Playing {
                return;
            }
            if s.turn() != turn {
                open_trading(s);
                return;
            }
            s.tick(Duration::from_secs(1), false);
        }
        panic!("turn {turn} never ended");
    }

    #[test]
    fn lifecycle_states() {
        let mut s: GameSession<InMemoryMarket> =
            GameSession::new(fast_config(2), EventCatalog::new()).unwrap();
        assert_eq!(s.state(), GameState::WaitingToStart);
        assert!(matches!(s.start(), Err(GameError::InvalidTurnState(_))));
        s.bind_market(market());
        s.prepare().unwrap();
        assert_eq!(s.state(), GameState::Ready);
        s.start().unwrap();
        assert_eq!(s.state(), GameState::Playing);
        assert_eq!(s.turn(), 1);
        while s.state() == GameState::Playing {
            finish_turn(&mut s);
        }
        assert_eq!(s.state(), GameState::Finished);
        assert_eq!(s.history().len(), 2);
        assert!(s.result().is_some());
    }

    #[test]
    fn one_snapshot_per_turn() {
        let mut s = started(fast_config(10), EventCatalog::standard());
        while s.state() == GameState::Playing {
            let completed = s.history().len() as u32;
            assert_eq!(completed, s.turn() - 1);
            finish_turn(&mut s);
        }
        let turns: Vec<u32> = s.history().iter().map(|h| h.turn).collect();
        assert_eq!(turns, (1..=10).collect::<Vec<_>>());
        assert_eq!(s.result().unwrap().turns_completed, 10);
    }

    #[test]
    fn countdown_runs_in_slices_and_pause_freezes_it() {
        let mut s = started(fast_config(1), EventCatalog::new());
        s.tick(Duration::from_millis(500), false);
        assert_eq!(s.phase(), TurnPhase::Countdown);
        assert_eq!(s.countdown_remaining(), Duration::from_secs(3));
        s.tick(Duration::from_secs(1), false);
        assert_eq!(s.countdown_remaining(), Duration::from_secs(2));
        s.tick(Duration::from_secs(5), true);
        assert_eq!(s.countdown_remaining(), Duration::from_secs(2));
        assert_eq!(s.wall_clock(), Duration::from_millis(6_500));
        s.tick(Duration::from_millis(999), false);
        assert_eq!(s.countdown_remaining(), Duration::from_secs(2));
        s.tick(Duration::from_millis(1), false);
        assert_eq!(s.countdown_remaining(), Duration::from_secs(1));
    }

    #[test]
    fn forced_skip_takes_effect_on_next_tick() {
        let mut s = started(fast_config(3), EventCatalog::new());
        s.tick(Duration::from_millis(500), false);
        s.force_skip_turn().unwrap();
        assert_eq!(s.phase(), TurnPhase::Countdown);
        s.tick(Duration::ZERO, false);
        assert!(matches!(s.phase(), TurnPhase::Settle { .. }));
        assert!(matches!(
            s.buy(&id("SEM"), 1),
            Err(GameError::InvalidTurnState(_))
        ));
        s.tick(Duration::from_millis(500), true);
        assert_eq!(s.turn(), 2);
    }

    #[test]
    fn event_fires_once_and_is_logged() {
        let mut catalog = EventCatalog::new();
        catalog
            .insert(
                1,
                ScheduledEvent {
                    key: "sem_rally".to_string(),
                    effects: vec![
                        EffectDescriptor::global(-2.0),
                        EffectDescriptor::sector("SEM", 25.0),
                    ],
                },
            )
            .unwrap();
        let mut s = started(fast_config(1), catalog);
        let rec = SignalRecorder::new();
        let log = rec.log();
        s.subscribe(Box::new(rec));
        s.tick(Duration::from_millis(500), false);
        assert!(matches!(s.phase(), TurnPhase::EventDisplay { .. }));
        // 10_000 * 0.98 * 1.25
        let sem = s.market().unwrap().get(&id("SEM")).unwrap();
        assert_eq!(sem.price, Decimal::new(12_250, 0));
        s.tick(Duration::from_secs(1), false);
        let snap = s.current_snapshot().unwrap();
        assert_eq!(snap.events.len(), 2);
        assert_eq!(snap.events[0].sector, None);
        let fired = log
            .borrow()
            .iter()
            .filter(|sig| matches!(sig, Signal::EventTriggered { .. }))
            .count();
        assert_eq!(fired, 1);
    }

    #[test]
    fn hooks_see_lifecycle() {
        let mut s = GameSession::with_market(fast_config(2), EventCatalog::new(), market()).unwrap();
        let rec = SignalRecorder::new();
        let log = rec.log();
        let id = s.subscribe(Box::new(rec));
        s.start().unwrap();
        while s.state() == GameState::Playing {
            finish_turn(&mut s);
        }
        let log = log.borrow();
        assert_eq!(log[0], Signal::StateChanged(GameState::Playing));
        assert_eq!(log[1], Signal::TurnChanged(1));
        let ticks = log
            .iter()
            .filter(|sig| matches!(sig, Signal::TimerTick(_)))
            .count();
        assert_eq!(ticks, 6);
        assert!(log.contains(&Signal::TurnChanged(2)));
        assert_eq!(
            log[log.len() - 2],
            Signal::StateChanged(GameState::Finished)
        );
        assert!(matches!(log.last(), Some(Signal::GameCompleted(_))));
        assert!(s.unsubscribe(id));
    }

    #[test]
    fn trading_opens_after_the_turn_event() {
        let mut catalog = EventCatalog::new();
        catalog
            .insert(
                1,
                ScheduledEvent {
                    key: "sem_rally".to_string(),
                    effects: vec![EffectDescriptor::sector("SEM", 25.0)],
                },
            )
            .unwrap();
        let mut s = started(fast_config(1), catalog);
        assert!(matches!(s.phase(), TurnPhase::TurnStart { .. }));
        assert!(matches!(
            s.buy(&id("SEM"), 1),
            Err(GameError::InvalidTurnState(_))
        ));
        assert!(s.ledger().transactions().is_empty());
        s.tick(Duration::from_millis(500), false);
        assert!(matches!(s.phase(), TurnPhase::EventDisplay { .. }));
        let tx = s.buy(&id("SEM"), 1).unwrap();
        assert_eq!(tx.price, Decimal::new(12_500, 0));
    }

    #[test]
    fn paused_ticks_of_any_length_return_at_once() {
        let mut s = started(fast_config(1), EventCatalog::new());
        open_trading(&mut s);
        s.tick(Duration::from_secs(60 * 60 * 24 * 365 * 1_000), true);
        assert_eq!(s.countdown_remaining(), Duration::from_secs(3));
        assert_eq!(s.phase(), TurnPhase::Countdown);
        s.tick(Duration::MAX, true);
        assert_eq!(s.wall_clock(), Duration::MAX);
        assert_eq!(s.countdown_remaining(), Duration::from_secs(3));
        // The fractional slice left over still counts once play resumes.
        s.tick(Duration::from_secs(1), false);
        assert!(s.countdown_remaining() < Duration::from_secs(3));
    }

    #[test]
    fn drift_skipped_before_scheduled_event() {
        let mut catalog = EventCatalog::new();
        catalog
            .insert(
                2,
                ScheduledEvent {
                    key: "noop".to_string(),
                    effects: vec![],
                },
            )
            .unwrap();
        let mut s = started(fast_config(3), catalog);
        let opening = s.market().unwrap().list_all();
        finish_turn(&mut s);
        assert_eq!(s.market().unwrap().list_all(), opening);
        finish_turn(&mut s);
        assert_ne!(s.market().unwrap().list_all(), opening);
    }

    #[test]
    fn watermark_beats_final_sector_count() {
        let mut s = started(fast_config(10), EventCatalog::new());
        for turn in 1..=10 {
            match turn {
                2 => {
                    for sec in &SECTORS[..4] {
                        s.buy(&id(sec), 1).unwrap();
                    }
                }
                6 => {
                    for sec in &SECTORS[1..4] {
                        s.sell(&id(sec), 1).unwrap();
                    }
                }
                _ => {}
            }
            finish_turn(&mut s);
        }
        let r = s.result().unwrap();
        assert_eq!(r.max_sectors_diversified, 4);
        assert_eq!(r.diversification_bonus_pct, 15);
        let last = s.history().last().unwrap();
        assert_eq!(last.holdings.len(), 1);
    }

    #[test]
    fn game_end_liquidates_everything() {
        let mut s = started(fast_config(2), EventCatalog::new());
        open_trading(&mut s);
        for sec in ["SEM", "BIO", "FIN"] {
            s.buy(&id(sec), 3).unwrap();
        }
        finish_turn(&mut s);
        // Run turn 2 up to its settle phase so prices are final.
        s.force_skip_turn().unwrap();
        for _ in 0..10 {
            if matches!(s.phase(), TurnPhase::Settle { .. }) {
                break;
            }
            s.tick(Duration::from_millis(500), false);
        }
        let m = s.market().unwrap();
        let rate = s.config().fee_rate;
        let expected = s.cash()
            + m.holdings()
                .values()
                .map(|h: &Holding| sell_net(m.get(&h.instrument).unwrap().price, h.quantity, rate))
                .sum::<Decimal>();
        s.tick(Duration::from_secs(1), false);
        assert_eq!(s.state(), GameState::Finished);
        assert!(s.market().unwrap().holdings().is_empty());
        assert_eq!(s.cash(), expected);
        let sells = s
            .ledger()
            .transactions()
            .iter()
            .filter(|t| t.side == Side::Sell)
            .count();
        assert_eq!(sells, 3);
    }

    #[test]
    fn request_end_stops_after_current_turn() {
        let mut s = started(fast_config(10), EventCatalog::new());
        finish_turn(&mut s);
        s.request_end().unwrap();
        finish_turn(&mut s);
        assert_eq!(s.state(), GameState::Finished);
        assert_eq!(s.history().len(), 2);
        assert!(matches!(s.request_end(), Err(GameError::InvalidTurnState(_))));
    }

    #[test]
    fn reset_rebuilds_state() {
        let mut s = started(fast_config(3), EventCatalog::standard());
        open_trading(&mut s);
        s.buy(&id("SEM"), 2).unwrap();
        finish_turn(&mut s);
        s.reset();
        assert_eq!(s.state(), GameState::Ready);
        assert_eq!(s.cash(), s.config().initial_cash);
        assert!(s.history().is_empty());
        assert!(s.market().unwrap().holdings().is_empty());
        assert_eq!(s.watermark(), 0);
        s.start().unwrap();
        assert_eq!(s.turn(), 1);
    }

    #[test]
    fn missing_market_degrades_to_noops() {
        let mut s: GameSession<InMemoryMarket> =
            GameSession::new(fast_config(2), EventCatalog::standard()).unwrap();
        s.prepare().unwrap();
        s.start().unwrap();
        open_trading(&mut s);
        assert_eq!(
            s.buy(&id("SEM"), 1),
            Err(GameError::InvalidInstrument(id("SEM")))
        );
        while s.state() == GameState::Playing {
            finish_turn(&mut s);
        }
        let r = s.result().unwrap();
        assert_eq!(r.total_trades, 0);
        assert_eq!(s.history().len(), 2);
    }

    proptest! {
        #[test]
        fn arbitrary_ticks_keep_history_consistent(
            steps in prop::collection::vec((0u64..4_000, any::<bool>()), 1..200)
        ) {
            let mut s = started(fast_config(4), EventCatalog::standard());
            for (ms, paused) in steps {
                s.tick(Duration::from_millis(ms), paused);
                prop_assert!(s.countdown_remaining() <= s.config().turn_duration());
                if s.state() == GameState::Playing {
                    prop_assert_eq!(s.history().len() as u32, s.turn() - 1);
                } else {
                    prop_assert_eq!(s.history().len(), 4);
                }
            }
        }
    }

    /// Market that accepts reads but refuses to add holdings.
    struct FrozenLedger(InMemoryMarket);

    impl InstrumentRepository for FrozenLedger {
        fn get(&self, id: &InstrumentId) -> Option<Instrument> {
            self.0.get(id)
        }
        fn list_by_sector(&self, sector: &SectorId) -> Vec<Instrument> {
            self.0.list_by_sector(sector)
        }
        fn list_all(&self) -> Vec<Instrument> {
            self.0.list_all()
        }
        fn adjust_price(&mut self, id: &InstrumentId, pct: Decimal) -> Result<Decimal, MarketError> {
            self.0.adjust_price(id, pct)
        }
        fn holdings(&self) -> BTreeMap<InstrumentId, Holding> {
            self.0.holdings()
        }
        fn increase_holding(&mut self, _: &InstrumentId, _: u64, _: Decimal) -> Result<(), MarketError> {
            Err(MarketError::Rejected("frozen".to_string()))
        }
        fn decrease_holding(&mut self, id: &InstrumentId, qty: u64) -> Result<(), MarketError> {
            self.0.decrease_holding(id, qty)
        }
        fn restore_opening_state(&mut self) {
            self.0.restore_opening_state()
        }
    }

    #[test]
    fn rejected_buy_restores_cash_and_logs_nothing() {
        let mut s = GameSession::with_market(fast_config(1), EventCatalog::new(), FrozenLedger(market()))
            .unwrap();
        s.start().unwrap();
        open_trading(&mut s);
        let before = s.cash();
        assert!(matches!(s.buy(&id("SEM"), 5), Err(GameError::TradeRejected(_))));
        assert_eq!(s.cash(), before);
        assert!(s.ledger().transactions().is_empty());
    }
}
