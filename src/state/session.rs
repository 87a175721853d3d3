//! Session orchestrator: owns every component and routes commands and timers to them.
//!
//! A single task drives [`Session::handle`], so the components never need locks. Every
//! inbound command is gated on the current phase; out-of-phase commands are dropped with a
//! debug log and change nothing.

use std::{sync::Arc, time::SystemTime};

use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, info, warn};

use crate::{
    config::SessionConfig,
    dto::{
        format_system_time,
        session::SessionSnapshot,
        ws::{InboundMessage, JoinRejectReason, OutboundMessage},
    },
    state::{
        admission::{Admission, AdmissionQueue},
        fall_rate::FallRateController,
        game::{ConnectionId, PlayerId},
        ports::{Outbox, SessionPorts},
        scoreboard::ScoreAggregator,
        state_machine::{EndReason, InvalidTransition, PhaseMachine, SessionEvent, SessionPhase},
        timers::{Scheduler, SessionTimer, TimerId, cancel_slot},
        trade::{PairingMode, TradeMatcher},
        voting::VotingCoordinator,
        watchdog::{InactivityWatchdog, WatchdogCheck},
    },
};

/// Everything the session loop reacts to.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// A websocket was accepted.
    Connected(ConnectionId),
    /// A websocket closed or errored.
    Disconnected(ConnectionId),
    /// A validated frame from a connection.
    Inbound {
        /// Sender.
        connection: ConnectionId,
        /// Parsed and validated command.
        message: InboundMessage,
    },
    /// A scheduled delivery came due.
    Timer(SessionTimer),
}

/// The whole game session: phase machine plus the components it drives.
pub struct Session<S: Scheduler> {
    config: SessionConfig,
    phase: PhaseMachine,
    phase_since: SystemTime,
    queue: AdmissionQueue,
    scores: ScoreAggregator,
    fall_rate: FallRateController,
    voting: VotingCoordinator,
    watchdog: Option<InactivityWatchdog>,
    watchdog_generation: u64,
    trades: TradeMatcher,
    random_trades: TradeMatcher,
    grace_timer: Option<TimerId>,
    ports: SessionPorts,
    scheduler: S,
    rng: StdRng,
}

impl<S: Scheduler> Session<S> {
    /// Build an idle session in the waiting room.
    pub fn new(config: SessionConfig, outbox: Arc<dyn Outbox>, scheduler: S) -> Self {
        let rng = config
            .rng_seed
            .map(StdRng::seed_from_u64)
            .unwrap_or_else(StdRng::from_os_rng);
        Self {
            phase: PhaseMachine::new(),
            phase_since: SystemTime::now(),
            queue: AdmissionQueue::new(config.quorum),
            scores: ScoreAggregator::new(config.quorum, config.scoring.scaling),
            fall_rate: FallRateController::new(config.fall_rate),
            voting: VotingCoordinator::new(config.voting),
            watchdog: None,
            watchdog_generation: 0,
            trades: TradeMatcher::new(PairingMode::Regular),
            random_trades: TradeMatcher::new(PairingMode::Random {
                pair_count: config.random_trade_pair_count,
            }),
            grace_timer: None,
            ports: SessionPorts::new(outbox),
            scheduler,
            rng,
            config,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase.phase()
    }

    /// Timer source, for shutdown.
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Process one command to completion.
    pub fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connected(connection) => self.on_connected(connection),
            SessionCommand::Disconnected(connection) => self.on_disconnected(connection),
            SessionCommand::Inbound {
                connection,
                message,
            } => self.on_inbound(connection, message),
            SessionCommand::Timer(timer) => self.on_timer(timer),
        }
    }

    /// Read-only view published to HTTP readers.
    pub fn snapshot(&self) -> SessionSnapshot {
        let snapshot = self.phase.snapshot();
        SessionSnapshot {
            phase: snapshot.phase,
            version: snapshot.version,
            phase_since: format_system_time(self.phase_since),
            quorum: self.queue.quorum(),
            players: self.queue.len(),
            remaining_players: self.queue.remaining(),
            level: self.fall_rate.level(),
            scores: self.scores.snapshot(),
            vote_stage: self.voting.stage(),
            countdown: self.voting.countdown_value(),
            trade_active: self.trades.trade_active(),
            random_trade_active: self.random_trades.trade_active(),
            random_trade_pair_count: self.random_trades.pair_count().unwrap_or(0),
        }
    }

    fn on_connected(&mut self, connection: ConnectionId) {
        debug!(%connection, phase = ?self.phase(), "connection opened");
        self.reply_scene(connection);
    }

    fn on_disconnected(&mut self, connection: ConnectionId) {
        let withdrew = self.trades.withdraw(connection) | self.random_trades.withdraw(connection);
        if withdrew {
            debug!(%connection, "pending trade offer withdrawn");
        }

        let Some(player) = self.queue.remove(connection) else {
            debug!(%connection, "spectator disconnected");
            return;
        };
        info!(%connection, %player, "player left");
        if self.phase() == SessionPhase::WaitingRoom {
            self.ports.remaining_players(self.queue.remaining());
        }
    }

    fn on_inbound(&mut self, connection: ConnectionId, message: InboundMessage) {
        use InboundMessage as In;
        use SessionPhase::{Arena, WaitingRoom};

        match (self.phase(), message) {
            (WaitingRoom | Arena, In::Join) => self.join(connection),
            (_, In::RequestScene) => self.reply_scene(connection),
            (_, In::RequestScoreboardData) => self.ports.reply(
                connection,
                OutboundMessage::UpdateScoreboard {
                    scores: self.scores.snapshot(),
                },
            ),
            (Arena, In::PlayerMove(payload)) => {
                self.feed_watchdog();
                self.ports.relay_move(connection, payload);
            }
            (Arena, In::PlayerPlace(payload)) => {
                self.feed_watchdog();
                self.ports.relay_place(connection, payload);
            }
            (Arena, In::EndGame) => self.end_game(EndReason::Requested),
            (Arena, In::GainPoints(payload)) => match self.seat(payload.player_id) {
                Some(player) => self.scores.increment(
                    player,
                    payload.score,
                    self.fall_rate.level(),
                    &self.ports,
                ),
                None => debug!(player_id = payload.player_id, "gainPoints for unknown seat"),
            },
            (Arena, In::LosePoints(payload)) => match self.seat(payload.player_id) {
                Some(player) => self.scores.decrement(
                    player,
                    self.config.scoring.penalty,
                    self.fall_rate.level(),
                    &self.ports,
                ),
                None => debug!(player_id = payload.player_id, "losePoints for unknown seat"),
            },
            (Arena, In::Vote { option }) => {
                if !self.voting.get_result(option) {
                    debug!(?option, stage = self.voting.is_vote_running(), "vote dropped");
                }
            }
            (Arena, In::RequestVotingSequence) => {
                if let Some(sequence) = self.voting.current_sequence() {
                    self.ports.reply(connection, sequence);
                }
            }
            (Arena, In::AddTrade { tetromino }) => {
                self.trades.add_trade(connection, tetromino, &self.ports);
            }
            (Arena, In::AddRandomTrade { tetromino }) => {
                self.random_trades
                    .add_trade(connection, tetromino, &self.ports);
            }
            (phase, message) => debug!(
                %connection,
                ?phase,
                command = message.kind(),
                "ignoring out-of-phase command"
            ),
        }
    }

    fn on_timer(&mut self, timer: SessionTimer) {
        match timer {
            SessionTimer::VotingCycle { .. }
            | SessionTimer::VotingTick { .. }
            | SessionTimer::VotingWindow { .. } => {
                if self.phase() != SessionPhase::Arena {
                    debug!(?timer, "voting timer outside the arena");
                    return;
                }
                self.voting.on_timer(
                    timer,
                    &mut self.fall_rate,
                    &mut self.scheduler,
                    &self.ports,
                    &mut self.rng,
                );
            }
            SessionTimer::Watchdog { generation } => {
                let Some(watchdog) = self.watchdog.as_mut() else {
                    debug!(generation, "watchdog timer without a watchdog");
                    return;
                };
                if watchdog.check(generation, &mut self.scheduler) == WatchdogCheck::Expired {
                    warn!(
                        timeout = ?self.config.watchdog_timeout,
                        "no player activity; ending match"
                    );
                    self.end_game(EndReason::Inactivity);
                }
            }
            SessionTimer::ReturnToWaitingRoom { phase_version } => {
                self.return_to_waiting_room(phase_version)
            }
        }
    }

    fn join(&mut self, connection: ConnectionId) {
        match self.queue.admit(connection) {
            Admission::Admitted(player) => {
                info!(%connection, %player, phase = ?self.phase(), "player admitted");
                self.ports.init_player(connection, player);
                if self.phase() == SessionPhase::WaitingRoom {
                    self.ports.remaining_players(self.queue.remaining());
                    if self.queue.is_full() {
                        self.enter_arena();
                    }
                }
            }
            Admission::AlreadyAdmitted(player) => self.ports.init_player(connection, player),
            Admission::Full => {
                debug!(%connection, "join rejected; all seats taken");
                self.ports.join_rejected(connection, JoinRejectReason::Full);
            }
        }
    }

    fn enter_arena(&mut self) {
        if let Err(err) = self.transition(SessionEvent::QuorumReached) {
            warn!(%err, "cannot enter the arena");
            return;
        }
        self.scores.reset(&self.ports);
        self.fall_rate.reset(&self.ports);
        self.clear_trades();
        self.voting.start_voting_loop(&mut self.scheduler);
        self.watchdog_generation += 1;
        self.watchdog = Some(InactivityWatchdog::start(
            self.watchdog_generation,
            self.config.watchdog_timeout,
            &mut self.scheduler,
        ));
        self.ports.to_scene_game_arena();
    }

    fn end_game(&mut self, reason: EndReason) {
        if let Err(err) = self.transition(SessionEvent::EndGame(reason)) {
            debug!(%err, "match already over");
            return;
        }
        self.voting.stop_voting_loop(&mut self.scheduler, &self.ports);
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.discard(&mut self.scheduler);
        }
        self.clear_trades();

        let standings = self.scores.finalize();
        info!(?reason, ?standings, "match over");
        self.ports.to_scene_game_over(standings.clone());

        let best = standings.first().map(|entry| entry.score).unwrap_or(0);
        if let Some(milestone) = self.config.scoreboard_milestone {
            if best >= milestone && self.transition(SessionEvent::ScoreMilestone).is_ok() {
                self.ports.to_scene_fullscreen_scoreboard(standings);
            }
        }

        cancel_slot(&mut self.scheduler, &mut self.grace_timer);
        self.grace_timer = Some(self.scheduler.schedule_once(
            self.config.game_over_grace,
            SessionTimer::ReturnToWaitingRoom {
                phase_version: self.phase.version(),
            },
        ));
    }

    fn return_to_waiting_room(&mut self, phase_version: u64) {
        if phase_version != self.phase.version() {
            debug!(
                phase_version,
                current = self.phase.version(),
                "ignoring stale return to waiting room"
            );
            return;
        }
        self.grace_timer = None;
        if let Err(err) = self.transition(SessionEvent::GraceElapsed) {
            warn!(%err, "cannot return to the waiting room");
            return;
        }
        self.queue.reset();
        self.scores.reset(&self.ports);
        self.fall_rate.reset(&self.ports);
        self.ports.to_scene_waiting_room();
        self.ports.remaining_players(self.queue.remaining());
    }

    fn transition(&mut self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let phase = self.phase.apply(event)?;
        self.phase_since = SystemTime::now();
        info!(?event, ?phase, version = self.phase.version(), "phase changed");
        Ok(phase)
    }

    /// Seat for a raw player id, if the match has that many seats.
    fn seat(&self, raw: u8) -> Option<PlayerId> {
        PlayerId::new(raw).filter(|player| usize::from(player.get()) < self.queue.quorum())
    }

    fn feed_watchdog(&mut self) {
        let now = self.scheduler.now();
        if let Some(watchdog) = self.watchdog.as_mut() {
            watchdog.feed(now);
        }
    }

    fn clear_trades(&mut self) {
        self.trades.clear_trade();
        self.random_trades.clear_trade();
    }

    /// Tell one connection which scene is up, with the data that scene shows.
    fn reply_scene(&self, connection: ConnectionId) {
        match self.phase() {
            SessionPhase::WaitingRoom => {
                self.ports.reply(connection, OutboundMessage::ToSceneWaitingRoom);
                self.ports.reply(
                    connection,
                    OutboundMessage::UpdateRemainingPlayers {
                        count: self.queue.remaining(),
                    },
                );
            }
            SessionPhase::Arena => {
                self.ports.reply(connection, OutboundMessage::ToSceneGameArena);
                self.ports.reply(
                    connection,
                    OutboundMessage::UpdateFallRate {
                        level: self.fall_rate.level(),
                    },
                );
                self.ports.reply(
                    connection,
                    OutboundMessage::UpdateScoreboard {
                        scores: self.scores.snapshot(),
                    },
                );
            }
            SessionPhase::GameOver => self.ports.reply(
                connection,
                OutboundMessage::ToSceneGameOver {
                    scores: self.scores.finalize(),
                },
            ),
            SessionPhase::FullscreenScoreboard => self.ports.reply(
                connection,
                OutboundMessage::ToSceneFullscreenScoreboard {
                    scores: self.scores.finalize(),
                },
            ),
        }
    }
}
