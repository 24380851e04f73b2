//! One actor per room.
//!
//! The runtime owns the [`Room`], every per-room manager, and every timer.
//! It processes one message at a time from its inbox: client events routed
//! by the hub, timer firings, disconnect and rejoin notifications, and the
//! posted-back quiz fetch result. Everything it emits goes out through the
//! hub, unicast to a socket or broadcast to the room's group.
//!
//! A panic while handling one message is caught and logged with room
//! context; the runtime continues with the next message.

use crate::config::Config;
use crate::game_loop::{select_hunters, BlitzAssignment, GameTimers, Timer};
use crate::hub::Hub;
use crate::managers::{
    CoinMgr, CombatMgr, OccupiedSet, PositionMgr, SinkholeMgr, TagCandidate, TagOutcome, TrapMgr,
};
use crate::map::MapConfig;
use crate::metrics::ServerMetrics;
use crate::protocol::{
    ClientEvent, ErrorCode, GridPos, PlayerId, PlayerPhase, PlayerState, PositionPayload, Question,
    RejoinedPayload, RoomPhase, RoomStatus, ServerEvent, SocketId,
};
use crate::quiz::{self, QuizService};
use crate::room::Room;
use rand::RngExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Inbox capacity per room. Position updates at 30 Hz for a full room fit
/// comfortably; beyond that, socket readers apply backpressure.
const INBOX_CAPACITY: usize = 256;

/// Messages processed by a room runtime, one at a time.
#[derive(Debug)]
pub enum RoomMsg {
    /// A socket wants to join (first join of a fresh room creates the
    /// host).
    Join {
        socket_id: SocketId,
        player_name: Option<String>,
    },
    /// A socket reconnects within the grace window.
    Rejoin {
        socket_id: SocketId,
        player_id: PlayerId,
    },
    /// A client event from a socket already in the room.
    Client {
        socket_id: SocketId,
        event: ClientEvent,
    },
    /// The socket's connection dropped.
    Disconnected { socket_id: SocketId },
    /// A game timer fired.
    Timer(Timer),
    /// The external question fetch finished.
    QuizFetched(Result<Vec<Question>, String>),
}

/// Shared dependencies handed to every runtime.
#[derive(Clone)]
pub struct RuntimeDeps {
    pub config: Arc<Config>,
    pub map: Arc<MapConfig>,
    pub hub: Arc<Hub>,
    pub store: Arc<super::store::RoomStore>,
    pub quiz: QuizService,
    pub metrics: Arc<ServerMetrics>,
}

pub struct RoomRuntime {
    room: Room,
    positions: PositionMgr,
    combat: CombatMgr,
    coins: CoinMgr,
    sinkholes: SinkholeMgr,
    traps: TrapMgr,
    timers: GameTimers,
    /// Current entry quiz per player.
    blitz: HashMap<PlayerId, BlitzAssignment>,
    /// Current unfreeze question per frozen player.
    unfreeze: HashMap<PlayerId, Question>,
    deps: RuntimeDeps,
    tx: mpsc::Sender<RoomMsg>,
    quiz_fetch_started: bool,
    closing: bool,
}

impl RoomRuntime {
    /// Spawn a runtime task for a fresh room. Returns the inbox sender.
    pub fn spawn(room: Room, deps: RuntimeDeps) -> mpsc::Sender<RoomMsg> {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let timers = GameTimers::new(tx.clone());
        let mut runtime = Self {
            room,
            positions: PositionMgr::new(),
            combat: CombatMgr::new(),
            coins: CoinMgr::new(),
            sinkholes: SinkholeMgr::new(),
            traps: TrapMgr::new(),
            timers,
            blitz: HashMap::new(),
            unfreeze: HashMap::new(),
            deps,
            tx: tx.clone(),
            quiz_fetch_started: false,
            closing: false,
        };
        // Belt-and-braces against rooms that are created but never joined.
        runtime.timers.arm(
            Timer::Sweep,
            Duration::from_secs(runtime.deps.config.server.empty_room_timeout_secs),
        );
        tokio::spawn(runtime.run(rx));
        tx
    }

    async fn run(mut self, mut rx: mpsc::Receiver<RoomMsg>) {
        let code = self.room.code.clone();
        tracing::info!(room_code = %code, "Room runtime started");
        while let Some(msg) = rx.recv().await {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(msg)));
            if result.is_err() {
                tracing::error!(
                    room_code = %code,
                    "Message handler panicked; room continues with next message"
                );
            }
            if self.closing {
                break;
            }
        }
        self.timers.cancel_all();
        tracing::info!(room_code = %code, "Room runtime stopped");
    }

    fn dispatch(&mut self, msg: RoomMsg) {
        self.deps.metrics.increment_events_routed();
        match msg {
            RoomMsg::Join {
                socket_id,
                player_name,
            } => self.handle_join(socket_id, player_name),
            RoomMsg::Rejoin {
                socket_id,
                player_id,
            } => self.handle_rejoin(socket_id, player_id),
            RoomMsg::Client { socket_id, event } => self.handle_client(socket_id, event),
            RoomMsg::Disconnected { socket_id } => self.handle_disconnected(socket_id),
            RoomMsg::Timer(timer) => self.handle_timer(timer),
            RoomMsg::QuizFetched(result) => self.handle_quiz_fetched(result),
        }
    }

    // =========================================================================
    // Membership
    // =========================================================================

    fn handle_join(&mut self, socket_id: SocketId, player_name: Option<String>) {
        if self.room.status != RoomStatus::Waiting {
            self.unicast(
                &socket_id,
                ServerEvent::JoinError {
                    reason: ErrorCode::GameAlreadyStarted.description().to_string(),
                    error_code: ErrorCode::GameAlreadyStarted,
                },
            );
            return;
        }
        if self.room.is_full() {
            self.unicast(
                &socket_id,
                ServerEvent::JoinError {
                    reason: ErrorCode::RoomFull.description().to_string(),
                    error_code: ErrorCode::RoomFull,
                },
            );
            return;
        }

        let name = self.sanitize_name(player_name);
        let is_creator = self.room.players.is_empty();
        let player_id = Uuid::new_v4();
        let Some(player) = self.room.add_player(
            player_id,
            socket_id,
            name,
            self.deps.config.game.starting_health,
        ) else {
            self.unicast(
                &socket_id,
                ServerEvent::JoinError {
                    reason: ErrorCode::RoomFull.description().to_string(),
                    error_code: ErrorCode::RoomFull,
                },
            );
            return;
        };
        let player_view = player.view();

        self.deps.hub.bind(socket_id, &self.room.code, player_id);
        self.deps.metrics.increment_players_joined();

        let snapshot = self.room.snapshot();
        if is_creator {
            self.unicast(
                &socket_id,
                ServerEvent::RoomCreated {
                    room_code: self.room.code.clone(),
                    player_id,
                    room: snapshot.clone(),
                },
            );
            self.start_quiz_fetch_if_needed();
        } else {
            self.unicast(
                &socket_id,
                ServerEvent::RoomJoined {
                    room_code: self.room.code.clone(),
                    player_id,
                    room: snapshot.clone(),
                },
            );
            self.broadcast_except(
                &socket_id,
                ServerEvent::PlayerJoined {
                    player: player_view,
                },
            );
        }
        self.broadcast(ServerEvent::RoomUpdate { room: snapshot });

        tracing::info!(
            room_code = %self.room.code,
            %player_id,
            %socket_id,
            is_creator,
            "Player joined room"
        );
    }

    fn handle_rejoin(&mut self, socket_id: SocketId, player_id: PlayerId) {
        let Some(player) = self.room.player(&player_id) else {
            // Unknown id: either never a member or the grace already
            // expired and removed them.
            self.unicast(
                &socket_id,
                ServerEvent::RejoinError {
                    reason: ErrorCode::RejoinExpired.description().to_string(),
                    error_code: ErrorCode::RejoinExpired,
                },
            );
            return;
        };
        if player.connected() {
            self.unicast(
                &socket_id,
                ServerEvent::RejoinError {
                    reason: ErrorCode::PlayerAlreadyConnected.description().to_string(),
                    error_code: ErrorCode::PlayerAlreadyConnected,
                },
            );
            return;
        }

        // Cancel the grace timer, then rebind the ephemeral socket id.
        self.timers.cancel(&Timer::Grace(player_id));
        let phase = {
            // Re-borrow mutably; the immutable borrow above has ended.
            let Some(player) = self.room.player_mut(&player_id) else {
                return;
            };
            player.socket_id = socket_id;
            player.disconnected_at = None;
            player.phase
        };
        self.deps.hub.bind(socket_id, &self.room.code, player_id);
        self.deps.metrics.increment_reconnect_completions();

        let payload = RejoinedPayload {
            room: self.room.snapshot(),
            player_id,
            phase,
            position: self
                .positions
                .payload_of(&player_id)
                .unwrap_or(PositionPayload {
                    x: 0.0,
                    y: 0.0,
                    row: 0,
                    col: 0,
                }),
            coins: self.coins.live_views(),
            sinkholes: self.sinkholes.views(),
            traps: self.traps.collectible_views(),
            deployed_traps: self.traps.deployed_views(),
            carried_traps: self
                .room
                .player(&player_id)
                .map_or(0, |p| p.carried_traps),
        };
        self.unicast(&socket_id, ServerEvent::Rejoined(Box::new(payload)));
        self.broadcast_except(&socket_id, ServerEvent::PlayerReconnected { player_id });

        tracing::info!(
            room_code = %self.room.code,
            %player_id,
            new_socket = %socket_id,
            "Player reconnected within grace"
        );
    }

    fn handle_disconnected(&mut self, socket_id: SocketId) {
        let Some(player) = self.room.players.iter().find(|p| p.socket_id == socket_id) else {
            return;
        };
        let player_id = player.id;

        if self.room.status == RoomStatus::Playing {
            // Grace window: mark, announce, and arm the expiry timer.
            if let Some(player) = self.room.player_mut(&player_id) {
                player.disconnected_at = Some(chrono::Utc::now());
            }
            self.deps.hub.unbind(&socket_id);
            self.broadcast(ServerEvent::PlayerDisconnected { player_id });
            self.timers.arm(
                Timer::Grace(player_id),
                self.deps.config.game.reconnect_grace(),
            );
            tracing::info!(
                room_code = %self.room.code,
                %player_id,
                grace_ms = self.deps.config.game.reconnect_grace_ms,
                "Player disconnected, grace timer armed"
            );
        } else {
            self.deps.hub.unbind(&socket_id);
            self.remove_permanently(player_id, RemovalCause::Disconnect);
        }
    }

    // =========================================================================
    // Client events
    // =========================================================================

    fn handle_client(&mut self, socket_id: SocketId, event: ClientEvent) {
        let Some(player_id) = self.room.player_by_socket(&socket_id).map(|p| p.id) else {
            // Stale socket (already removed); hot-path events drop silently.
            return;
        };

        match event {
            ClientEvent::LeaveRoom {} => {
                self.deps.hub.unbind(&socket_id);
                self.remove_permanently(player_id, RemovalCause::Leave);
            }
            ClientEvent::StartGame {} => self.handle_start_game(&socket_id, player_id),
            ClientEvent::EndGame {} => {
                if self.room.host_id == player_id && self.room.status == RoomStatus::Playing {
                    self.end_game("host_ended");
                }
            }
            ClientEvent::UpdatePosition { x, y, row, col } => {
                self.handle_position(player_id, PositionPayload { x, y, row, col });
            }
            ClientEvent::BlitzAnswer {
                question_index,
                answer_index,
            } => self.handle_blitz_answer(player_id, question_index, answer_index),
            ClientEvent::SubmitUnfreezeQuizAnswer {
                question_index: _,
                answer_index,
            } => self.handle_unfreeze_answer(player_id, answer_index),
            ClientEvent::CollectCoin { coin_id } => self.handle_collect_coin(player_id, &coin_id),
            ClientEvent::EnterSinkhole { sinkhole_id } => {
                self.handle_enter_sinkhole(player_id, &sinkhole_id);
            }
            ClientEvent::CollectSinkTrap { trap_id } => {
                self.handle_collect_trap(player_id, &trap_id);
            }
            ClientEvent::DeploySinkTrap { row, col } => {
                self.handle_deploy_trap(player_id, GridPos::new(row, col));
            }
            ClientEvent::Ping {} => {
                self.unicast(&socket_id, ServerEvent::Pong {});
            }
            // Routed at the hub level; out of context here.
            ClientEvent::CreateRoom { .. }
            | ClientEvent::JoinRoom { .. }
            | ClientEvent::RejoinRoom { .. } => {}
        }
    }

    fn handle_start_game(&mut self, socket_id: &SocketId, player_id: PlayerId) {
        if self.room.host_id != player_id {
            self.unicast(
                socket_id,
                ServerEvent::StartError {
                    reason: ErrorCode::NotHost.description().to_string(),
                    error_code: ErrorCode::NotHost,
                },
            );
            return;
        }
        if self.room.status != RoomStatus::Waiting {
            self.unicast(
                socket_id,
                ServerEvent::StartError {
                    reason: ErrorCode::GameAlreadyStarted.description().to_string(),
                    error_code: ErrorCode::GameAlreadyStarted,
                },
            );
            return;
        }

        self.start_game();
    }

    // =========================================================================
    // Game start & phases
    // =========================================================================

    fn start_game(&mut self) {
        let now = Instant::now();
        let cfg = self.deps.config.game.clone();
        self.room.status = RoomStatus::Playing;
        self.room.phase = RoomPhase::BlitzQuiz;

        self.broadcast(ServerEvent::GameStarted {});
        self.broadcast(ServerEvent::PhaseChange {
            phase: RoomPhase::BlitzQuiz,
        });

        // Spawn positions for everyone.
        let player_ids: Vec<PlayerId> = self.room.players.iter().map(|p| p.id).collect();
        let assigned = self
            .positions
            .assign_spawn_positions(&self.deps.map, &player_ids, now);
        for (player_id, _) in &assigned {
            if let Some(position) = self.positions.payload_of(player_id) {
                self.broadcast(ServerEvent::PlayerRespawn {
                    player_id: *player_id,
                    position,
                });
            }
        }

        // Grid spawnables: coins, then sinkholes, then trap collectibles,
        // each spawning against the occupancy accumulated so far.
        let mut occupied = OccupiedSet::new();
        let coin_views = self.coins.spawn_initial(&self.deps.map, &cfg, &occupied);
        occupied.extend(self.coins.live_cells());
        for coin in coin_views {
            self.broadcast(ServerEvent::CoinSpawned { coin });
        }
        let hole_views = self
            .sinkholes
            .spawn_initial(&self.deps.map, &cfg, &mut occupied);
        for sinkhole in hole_views {
            self.broadcast(ServerEvent::SinkholeSpawned { sinkhole });
        }
        let trap_views = self.traps.spawn_initial(&self.deps.map, &cfg, &mut occupied);
        for trap in trap_views {
            self.broadcast(ServerEvent::SinkTrapSpawned { trap });
        }

        // Room-scoped timers.
        self.timers.arm(Timer::Global, cfg.game_total_duration());
        self.timers.arm(Timer::Blitz, cfg.blitz_duration());
        self.arm_sinkhole_spawn();
        self.timers
            .arm(Timer::CooldownGc, Duration::from_millis(cfg.collision_gc_after_ms));

        // Everyone answers their entry quiz.
        for player_id in player_ids {
            self.begin_blitz_for(player_id);
        }

        tracing::info!(
            room_code = %self.room.code,
            players = self.room.players.len(),
            "Game started"
        );
    }

    fn begin_blitz_for(&mut self, player_id: PlayerId) {
        let cfg = &self.deps.config.game;
        let pool = self.room.questions.clone().unwrap_or_default();
        let attempted = self
            .room
            .player(&player_id)
            .map(|p| p.attempted_question_ids.clone())
            .unwrap_or_default();
        let questions = quiz::select_for_player(&pool, &attempted, cfg.blitz_question_count);

        let views = questions.iter().map(Into::into).collect();
        self.blitz
            .insert(player_id, BlitzAssignment::new(questions));
        if let Some(player) = self.room.player_mut(&player_id) {
            player.phase = PlayerPhase::Blitz;
        }
        if let Some(socket_id) = self.socket_of(&player_id) {
            self.unicast(
                &socket_id,
                ServerEvent::BlitzStart {
                    questions: views,
                    duration_ms: cfg.blitz_duration_ms,
                },
            );
        }
    }

    fn handle_blitz_answer(
        &mut self,
        player_id: PlayerId,
        question_index: usize,
        answer_index: usize,
    ) {
        if self.room.status != RoomStatus::Playing {
            return;
        }
        let Some(assignment) = self.blitz.get_mut(&player_id) else {
            return;
        };
        // Answers arrive strictly in order; anything else is a stale or
        // duplicate report and is dropped.
        if question_index != assignment.answered || assignment.finished() {
            return;
        }
        let Some(question) = assignment.questions.get(question_index) else {
            return;
        };

        let correct = question.correct_index == answer_index;
        let correct_index = question.correct_index;
        let question_id = question.id.clone();
        assignment.answered += 1;
        if correct {
            assignment.correct += 1;
        }
        let finished = assignment.finished();

        if let Some(player) = self.room.player_mut(&player_id) {
            player.questions_attempted += 1;
            if correct {
                player.questions_correct += 1;
            }
            player.attempted_question_ids.insert(question_id);
        }

        if let Some(socket_id) = self.socket_of(&player_id) {
            self.unicast(
                &socket_id,
                ServerEvent::BlitzAnswerResult {
                    question_index,
                    correct,
                    correct_index,
                },
            );
        }

        if !finished {
            return;
        }

        if self.room.phase == RoomPhase::BlitzQuiz {
            // Synchronized round: close it once every connected player has
            // finished.
            let all_done = self
                .room
                .connected_players()
                .all(|p| self.blitz.get(&p.id).is_none_or(BlitzAssignment::finished));
            if all_done {
                self.end_blitz("all_answered");
            }
        } else {
            // Personal re-entry mid-round.
            self.finish_personal_blitz(player_id);
        }
    }

    /// Close the synchronized blitz round: award bonuses, rotate roles,
    /// and show results for the round-end window.
    fn end_blitz(&mut self, reason: &str) {
        let cfg = &self.deps.config.game;
        self.timers.cancel(&Timer::Blitz);

        // Blitz winners: players whose whole entry quiz was correct.
        let bonus = cfg.blitz_winner_bonus;
        let winners: Vec<PlayerId> = self
            .blitz
            .iter()
            .filter(|(_, a)| a.all_correct())
            .map(|(id, _)| *id)
            .collect();
        for player_id in winners {
            if let Some(player) = self.room.player_mut(&player_id) {
                player.coins += bonus;
            }
        }

        // Role rotation over connected players, in room order.
        let order: Vec<PlayerId> = self.room.connected_players().map(|p| p.id).collect();
        let chosen = select_hunters(&order, &mut self.room.hunter_rotation, cfg);
        self.room.unicorn_ids = chosen.iter().copied().collect();
        for player in &mut self.room.players {
            player.is_unicorn = self.room.unicorn_ids.contains(&player.id);
        }

        self.room.phase = RoomPhase::RoundEnd;
        self.broadcast(ServerEvent::PhaseChange {
            phase: RoomPhase::RoundEnd,
        });
        self.broadcast(ServerEvent::BlitzResult {
            unicorn_ids: self.room.unicorn_ids_ordered(),
            leaderboard: self.room.leaderboard(),
        });
        self.timers.arm(Timer::RoundEnd, cfg.round_end_duration());

        tracing::info!(
            room_code = %self.room.code,
            %reason,
            hunters = self.room.unicorn_ids.len(),
            "Blitz round ended"
        );
    }

    fn begin_hunt(&mut self) {
        let cfg = &self.deps.config.game;
        self.room.phase = RoomPhase::Hunt;
        self.broadcast(ServerEvent::PhaseChange {
            phase: RoomPhase::Hunt,
        });
        self.broadcast(ServerEvent::HuntStart {
            unicorn_ids: self.room.unicorn_ids_ordered(),
            duration_ms: cfg.hunt_duration_ms,
        });

        // Players whose entry quiz is done run the maze; stragglers finish
        // their questions and enter through the personal path.
        let hunt_duration = cfg.hunt_duration();
        let entering: Vec<PlayerId> = self
            .room
            .connected_players()
            .filter(|p| self.blitz.get(&p.id).is_none_or(BlitzAssignment::finished))
            .map(|p| p.id)
            .collect();
        for player_id in entering {
            if let Some(player) = self.room.player_mut(&player_id) {
                player.phase = PlayerPhase::Hunt;
            }
            self.timers
                .arm(Timer::PlayerHunt(player_id), hunt_duration);
        }
    }

    /// A player finished their personal entry quiz mid-round: roll the
    /// hunter chance and send them into the maze.
    fn finish_personal_blitz(&mut self, player_id: PlayerId) {
        let cfg = &self.deps.config.game;
        let mut rng = rand::rng();

        let connected = self.room.connected_count();
        let hunter_cap = std::cmp::max(1, connected.saturating_sub(1));
        let was_unicorn = self.room.unicorn_ids.contains(&player_id);
        let becomes_unicorn = rng.random_range(0.0..1.0) < cfg.enforcer_chance
            && (was_unicorn || self.room.unicorn_ids.len() < hunter_cap);

        let roles_changed = was_unicorn != becomes_unicorn;
        if becomes_unicorn {
            self.room.unicorn_ids.insert(player_id);
            self.room.hunter_rotation.insert(player_id);
        } else {
            self.room.unicorn_ids.remove(&player_id);
        }
        if let Some(player) = self.room.player_mut(&player_id) {
            player.is_unicorn = becomes_unicorn;
            player.phase = PlayerPhase::Hunt;
        }
        if roles_changed {
            self.broadcast(ServerEvent::UnicornTransferred {
                unicorn_ids: self.room.unicorn_ids_ordered(),
            });
        }

        if let Some(socket_id) = self.socket_of(&player_id) {
            self.unicast(
                &socket_id,
                ServerEvent::HuntStart {
                    unicorn_ids: self.room.unicorn_ids_ordered(),
                    duration_ms: cfg.hunt_duration_ms,
                },
            );
        }
        self.timers
            .arm(Timer::PlayerHunt(player_id), cfg.hunt_duration());
    }

    /// Room-wide return to the blitz quiz (hunters all gone).
    fn next_blitz(&mut self, reason: &str) {
        self.broadcast(ServerEvent::HuntEnd {
            reason: reason.to_string(),
        });

        // Per-player hunt timers are superseded by the synchronized round.
        let player_ids: Vec<PlayerId> = self.room.players.iter().map(|p| p.id).collect();
        for player_id in &player_ids {
            self.timers.cancel(&Timer::PlayerHunt(*player_id));
        }

        self.room.phase = RoomPhase::BlitzQuiz;
        self.broadcast(ServerEvent::PhaseChange {
            phase: RoomPhase::BlitzQuiz,
        });
        let connected: Vec<PlayerId> = self.room.connected_players().map(|p| p.id).collect();
        for player_id in connected {
            self.begin_blitz_for(player_id);
        }
        self.timers
            .arm(Timer::Blitz, self.deps.config.game.blitz_duration());
    }

    fn end_game(&mut self, reason: &str) {
        self.room.status = RoomStatus::Finished;
        self.room.phase = RoomPhase::GameEnd;
        self.broadcast(ServerEvent::PhaseChange {
            phase: RoomPhase::GameEnd,
        });
        self.broadcast(ServerEvent::GameEnd {
            leaderboard: self.room.leaderboard(),
            reason: reason.to_string(),
        });
        tracing::info!(room_code = %self.room.code, %reason, "Game ended");
        self.destroy_room();
    }

    // =========================================================================
    // Position & combat pipeline
    // =========================================================================

    fn handle_position(&mut self, player_id: PlayerId, proposed: PositionPayload) {
        if self.room.status != RoomStatus::Playing {
            return;
        }
        let now = Instant::now();
        let cfg = &self.deps.config.game;

        let Some(player) = self.room.player(&player_id) else {
            return;
        };
        // Frozen players cannot move; knocked-back players are under
        // server displacement; blitz players are not in the maze.
        if player.state == PlayerState::Frozen
            || player.phase == PlayerPhase::Blitz
            || self.combat.in_knockback(&player_id, now)
        {
            return;
        }
        if self.positions.is_throttled(cfg, &player_id, now) {
            return;
        }
        let Some(record) = self
            .positions
            .update_position(&self.deps.map, &player_id, proposed, now)
        else {
            return;
        };

        if let Some(socket_id) = self.socket_of(&player_id) {
            self.broadcast_except(
                &socket_id,
                ServerEvent::PlayerPositionUpdate {
                    player_id,
                    position: PositionPayload {
                        x: record.pixel.x,
                        y: record.pixel.y,
                        row: record.new_grid.row,
                        col: record.new_grid.col,
                    },
                },
            );
        }

        if self.room.phase != RoomPhase::Hunt {
            return;
        }
        let path = PositionMgr::path_for(&record);
        let is_hunter = self.room.unicorn_ids.contains(&player_id);

        if is_hunter {
            // Deployed traps fire before any tag resolution.
            if let Some(fired) = self.traps.trigger_on_path(&path) {
                self.freeze_player(player_id);
                self.deps.metrics.increment_traps_triggered();
                self.broadcast(ServerEvent::SinkTrapTriggered {
                    trap_id: fired.id,
                    hunter_id: player_id,
                });
                return;
            }

            let candidates = self.survivor_candidates();
            let outcomes = self.combat.adjudicate(
                cfg,
                &self.deps.map,
                player_id,
                &path,
                &candidates,
                now,
            );
            self.apply_tag_outcomes(outcomes, now);
        } else {
            // A survivor walking over a hunter's cell is tagged too.
            let Some(mover) = self.tag_candidate_of(&player_id) else {
                return;
            };
            let hunters: Vec<(PlayerId, GridPos)> = self
                .room
                .connected_players()
                .filter(|p| {
                    self.room.unicorn_ids.contains(&p.id)
                        && p.phase == PlayerPhase::Hunt
                        && p.state != PlayerState::Frozen
                })
                .filter_map(|p| self.positions.grid_of(&p.id).map(|cell| (p.id, cell)))
                .collect();
            let outcomes =
                self.combat
                    .adjudicate_mover(cfg, &self.deps.map, &mover, &path, &hunters, now);
            self.apply_tag_outcomes(outcomes, now);
        }
    }

    /// Survivors that can currently be tagged, in deterministic room
    /// player order.
    fn survivor_candidates(&self) -> Vec<TagCandidate> {
        self.room
            .connected_players()
            .filter(|p| !self.room.unicorn_ids.contains(&p.id) && p.phase == PlayerPhase::Hunt)
            .filter_map(|p| self.tag_candidate_of(&p.id))
            .collect()
    }

    fn tag_candidate_of(&self, player_id: &PlayerId) -> Option<TagCandidate> {
        let player = self.room.player(player_id)?;
        let cell = self.positions.grid_of(player_id)?;
        Some(TagCandidate {
            id: player.id,
            cell,
            state: player.state,
            coins: player.coins,
            health: player.health,
        })
    }

    fn apply_tag_outcomes(&mut self, outcomes: Vec<TagOutcome>, now: Instant) {
        let cfg = self.deps.config.game.clone();
        for outcome in outcomes {
            // Transfer coins and damage.
            if let Some(victim) = self.room.player_mut(&outcome.victim) {
                victim.health = outcome.victim_health;
                victim.coins = victim.coins.saturating_sub(outcome.coins_stolen);
            }
            if let Some(attacker) = self.room.player_mut(&outcome.attacker) {
                attacker.coins += outcome.coins_stolen;
            }
            self.deps.metrics.increment_tags_applied();

            self.broadcast(ServerEvent::PlayerTagged {
                attacker_id: outcome.attacker,
                victim_id: outcome.victim,
                damage: outcome.damage,
                coins_stolen: outcome.coins_stolen,
            });
            self.broadcast(ServerEvent::HealthUpdate {
                player_id: outcome.victim,
                health: outcome.victim_health,
            });

            if outcome.froze {
                // Zero health: freeze and hand over to the unfreeze quiz.
                self.freeze_player(outcome.victim);
                continue;
            }

            // Knockback displacement, authoritative on the server.
            if let Some(to) = outcome.knockback_to {
                self.positions
                    .set_player_position(&self.deps.map, outcome.victim, to, now, false);
                if let Some(position) = self.positions.payload_of(&outcome.victim) {
                    if let Some(socket_id) = self.socket_of(&outcome.victim) {
                        self.unicast(
                            &socket_id,
                            ServerEvent::PlayerHit {
                                attacker_id: outcome.attacker,
                                position,
                            },
                        );
                    }
                    self.broadcast(ServerEvent::PlayerPositionUpdate {
                        player_id: outcome.victim,
                        position,
                    });
                }
            }

            // I-frames; re-arming replaces any outstanding timer.
            if let Some(victim) = self.room.player_mut(&outcome.victim) {
                victim.state = PlayerState::InIFrames;
            }
            self.broadcast(ServerEvent::PlayerStateChange {
                player_id: outcome.victim,
                state: PlayerState::InIFrames,
            });
            self.timers
                .arm(Timer::IFrames(outcome.victim), cfg.iframe_duration());
        }
    }

    fn freeze_player(&mut self, player_id: PlayerId) {
        if let Some(player) = self.room.player_mut(&player_id) {
            player.state = PlayerState::Frozen;
        }
        self.combat.clear_knockback(&player_id);
        // Frozen overrides any outstanding invincibility window.
        self.timers.cancel(&Timer::IFrames(player_id));
        self.broadcast(ServerEvent::PlayerStateChange {
            player_id,
            state: PlayerState::Frozen,
        });
        self.begin_unfreeze_quiz(player_id);
    }

    // =========================================================================
    // Unfreeze quiz
    // =========================================================================

    fn begin_unfreeze_quiz(&mut self, player_id: PlayerId) {
        let pool = self.room.questions.clone().unwrap_or_default();
        let attempted = self
            .room
            .player(&player_id)
            .map(|p| p.attempted_question_ids.clone())
            .unwrap_or_default();
        let Some(question) = quiz::select_for_player(&pool, &attempted, 1).pop() else {
            return;
        };
        let view = (&question).into();
        self.unfreeze.insert(player_id, question);
        if let Some(socket_id) = self.socket_of(&player_id) {
            self.unicast(&socket_id, ServerEvent::UnfreezeQuizStart { question: view });
        }
    }

    fn handle_unfreeze_answer(&mut self, player_id: PlayerId, answer_index: usize) {
        if self.room.status != RoomStatus::Playing {
            return;
        }
        if self.room.player(&player_id).map(|p| p.state) != Some(PlayerState::Frozen) {
            return;
        }
        let Some(question) = self.unfreeze.get(&player_id) else {
            return;
        };
        let correct = question.correct_index == answer_index;
        let correct_index = question.correct_index;
        let question_id = question.id.clone();

        if let Some(player) = self.room.player_mut(&player_id) {
            player.questions_attempted += 1;
            if correct {
                player.questions_correct += 1;
            }
            player.attempted_question_ids.insert(question_id);
        }
        if let Some(socket_id) = self.socket_of(&player_id) {
            self.unicast(
                &socket_id,
                ServerEvent::UnfreezeQuizResult {
                    correct,
                    correct_index,
                },
            );
        }

        if correct {
            self.unfreeze.remove(&player_id);
            self.thaw_and_respawn(player_id);
        } else {
            // A new question until they pass.
            self.begin_unfreeze_quiz(player_id);
        }
    }

    fn thaw_and_respawn(&mut self, player_id: PlayerId) {
        let now = Instant::now();
        let health = self.deps.config.game.starting_health;

        let taken: Vec<GridPos> = self
            .room
            .players
            .iter()
            .filter(|p| p.id != player_id)
            .filter_map(|p| self.positions.grid_of(&p.id))
            .collect();
        let cell = self
            .deps
            .map
            .spawn_slots
            .iter()
            .find(|c| !taken.contains(c))
            .copied()
            .unwrap_or(GridPos::new(0, 0));
        self.positions
            .set_player_position(&self.deps.map, player_id, cell, now, false);

        if let Some(player) = self.room.player_mut(&player_id) {
            player.state = PlayerState::Active;
            player.health = health;
        }
        self.broadcast(ServerEvent::PlayerStateChange {
            player_id,
            state: PlayerState::Active,
        });
        self.broadcast(ServerEvent::HealthUpdate { player_id, health });
        if let Some(position) = self.positions.payload_of(&player_id) {
            self.broadcast(ServerEvent::PlayerRespawn {
                player_id,
                position,
            });
        }
    }

    // =========================================================================
    // Spawnables
    // =========================================================================

    fn handle_collect_coin(&mut self, player_id: PlayerId, coin_id: &str) {
        if !self.can_interact(&player_id) {
            return;
        }
        // Single-flight: acquire the per-coin lock, re-check, mutate,
        // release, broadcast. Losers observe nothing.
        if self.coins.begin_collect(coin_id).is_err() {
            return;
        }
        let value = self.deps.config.game.coin_value;
        let player_coins = match self.room.player_mut(&player_id) {
            Some(player) => {
                player.coins += value;
                player.coins
            }
            None => {
                self.coins.finish_collect(coin_id);
                return;
            }
        };
        self.coins.finish_collect(coin_id);
        self.timers.arm(
            Timer::CoinRespawn(coin_id.to_string()),
            self.deps.config.game.coin_respawn(),
        );
        self.deps.metrics.increment_coins_collected();
        self.broadcast(ServerEvent::CoinCollected {
            coin_id: coin_id.to_string(),
            player_id,
            player_coins,
        });
    }

    fn handle_enter_sinkhole(&mut self, player_id: PlayerId, sinkhole_id: &str) {
        if !self.can_interact(&player_id) {
            return;
        }
        let now = Instant::now();
        let Some(cell) = self.positions.grid_of(&player_id) else {
            return;
        };
        let from = self.positions.payload_of(&player_id);
        let Ok(teleport) = self.sinkholes.try_teleport(
            &self.deps.config.game,
            player_id,
            sinkhole_id,
            cell,
            now,
        ) else {
            return;
        };

        // The teleport flag makes the next reported move skip path
        // collision between the two portals.
        self.positions
            .set_player_position(&self.deps.map, player_id, teleport.to, now, true);
        self.deps.metrics.increment_teleports();

        let to = self.positions.payload_of(&player_id);
        if let (Some(from), Some(to)) = (from, to) {
            self.broadcast(ServerEvent::PlayerTeleported {
                player_id,
                from,
                to,
            });
        }
    }

    fn handle_collect_trap(&mut self, player_id: PlayerId, trap_id: &str) {
        if !self.can_interact(&player_id) {
            return;
        }
        // Traps are survivor equipment.
        let Some(player) = self.room.player(&player_id) else {
            return;
        };
        if self.room.unicorn_ids.contains(&player_id)
            || player.carried_traps >= self.deps.config.game.max_carried_traps
        {
            return;
        }
        if self.traps.begin_collect(trap_id).is_err() {
            return;
        }
        let carried = match self.room.player_mut(&player_id) {
            Some(player) => {
                player.carried_traps += 1;
                player.carried_traps
            }
            None => {
                self.traps.finish_collect(trap_id);
                return;
            }
        };
        self.traps.finish_collect(trap_id);
        self.timers.arm(
            Timer::TrapRespawn(trap_id.to_string()),
            self.deps.config.game.trap_respawn(),
        );
        self.broadcast(ServerEvent::SinkTrapCollected {
            trap_id: trap_id.to_string(),
            player_id,
            carried_traps: carried,
        });
    }

    fn handle_deploy_trap(&mut self, player_id: PlayerId, cell: GridPos) {
        if !self.can_interact(&player_id) {
            return;
        }
        let Some(player) = self.room.player(&player_id) else {
            return;
        };
        if self.room.unicorn_ids.contains(&player_id) || player.carried_traps == 0 {
            return;
        }
        let occupied = self.occupied_cells();
        let Ok(view) = self
            .traps
            .deploy(&self.deps.map, player_id, cell, &occupied)
        else {
            return;
        };
        if let Some(player) = self.room.player_mut(&player_id) {
            player.carried_traps -= 1;
        }
        self.broadcast(ServerEvent::SinkTrapDeployed {
            trap: view,
            owner_id: player_id,
        });
    }

    /// Common gate for item interactions: live game, hunting phase, and an
    /// Active (not frozen, not i-framed-frozen) player.
    fn can_interact(&self, player_id: &PlayerId) -> bool {
        if self.room.status != RoomStatus::Playing || self.room.phase != RoomPhase::Hunt {
            return false;
        }
        self.room.player(player_id).is_some_and(|p| {
            p.connected() && p.phase == PlayerPhase::Hunt && p.state != PlayerState::Frozen
        })
    }

    fn occupied_cells(&self) -> OccupiedSet {
        let mut set: OccupiedSet = self.coins.live_cells().collect();
        set.extend(self.sinkholes.cells());
        set.extend(self.traps.collectible_cells());
        set.extend(self.traps.deployed_cells());
        set
    }

    // =========================================================================
    // Timers
    // =========================================================================

    fn handle_timer(&mut self, timer: Timer) {
        match timer {
            Timer::Blitz => {
                // Stale if the round already closed via all-answered.
                if self.room.phase == RoomPhase::BlitzQuiz {
                    self.end_blitz("timeout");
                }
            }
            Timer::RoundEnd => {
                if self.room.phase == RoomPhase::RoundEnd {
                    self.begin_hunt();
                }
            }
            Timer::Global => {
                if self.room.status == RoomStatus::Playing {
                    self.end_game("time_up");
                }
            }
            Timer::SinkholeSpawn => {
                if self.room.status == RoomStatus::Playing {
                    if self.room.phase == RoomPhase::Hunt {
                        let mut occupied = self.occupied_cells();
                        if let Some(sinkhole) = self.sinkholes.spawn_one(
                            &self.deps.map,
                            &self.deps.config.game,
                            &mut occupied,
                        ) {
                            self.broadcast(ServerEvent::SinkholeSpawned { sinkhole });
                        }
                    }
                    self.arm_sinkhole_spawn();
                }
            }
            Timer::CooldownGc => {
                let cfg = &self.deps.config.game;
                self.combat.gc_cooldowns(cfg, Instant::now());
                self.timers.arm(
                    Timer::CooldownGc,
                    Duration::from_millis(cfg.collision_gc_after_ms),
                );
            }
            Timer::Sweep => {
                if self.room.players.is_empty() {
                    tracing::info!(room_code = %self.room.code, "Sweeping empty room");
                    self.destroy_room();
                } else {
                    self.timers.arm(
                        Timer::Sweep,
                        Duration::from_secs(self.deps.config.server.empty_room_timeout_secs),
                    );
                }
            }
            Timer::PlayerHunt(player_id) => {
                // Personal hunt window over: back to the blitz quiz,
                // invisible to the rest of the room.
                let eligible = self.room.player(&player_id).is_some_and(|p| {
                    p.connected()
                        && p.phase == PlayerPhase::Hunt
                        && p.state != PlayerState::Frozen
                });
                if self.room.phase == RoomPhase::Hunt && eligible {
                    self.begin_blitz_for(player_id);
                }
            }
            Timer::IFrames(player_id) => {
                if self.room.player(&player_id).map(|p| p.state) == Some(PlayerState::InIFrames) {
                    if let Some(player) = self.room.player_mut(&player_id) {
                        player.state = PlayerState::Active;
                    }
                    self.broadcast(ServerEvent::PlayerStateChange {
                        player_id,
                        state: PlayerState::Active,
                    });
                }
            }
            Timer::Grace(player_id) => {
                // Stale when the player rejoined in time.
                let still_gone = self
                    .room
                    .player(&player_id)
                    .is_some_and(|p| p.disconnected_at.is_some());
                if still_gone {
                    self.deps.metrics.increment_reconnect_expiries();
                    self.remove_permanently(player_id, RemovalCause::GraceExpired);
                }
            }
            Timer::CoinRespawn(coin_id) => {
                let occupied = self.occupied_cells();
                if let Some(coin) = self.coins.respawn(
                    &coin_id,
                    &self.deps.map,
                    &self.deps.config.game,
                    &occupied,
                ) {
                    self.broadcast(ServerEvent::CoinSpawned { coin });
                }
            }
            Timer::TrapRespawn(trap_id) => {
                let occupied = self.occupied_cells();
                if let Some(trap) = self.traps.respawn(&trap_id, &self.deps.map, &occupied) {
                    self.broadcast(ServerEvent::SinkTrapSpawned { trap });
                }
            }
        }
    }

    fn arm_sinkhole_spawn(&mut self) {
        let cfg = &self.deps.config.game;
        let interval =
            fastrand::u64(cfg.sinkhole_min_interval_ms..=cfg.sinkhole_max_interval_ms);
        self.timers
            .arm(Timer::SinkholeSpawn, Duration::from_millis(interval));
    }

    // =========================================================================
    // Removal & teardown
    // =========================================================================

    fn remove_permanently(&mut self, player_id: PlayerId, cause: RemovalCause) {
        let Some(removed) = self.room.remove_player(&player_id) else {
            return;
        };
        let was_host = removed.is_host;
        let was_unicorn = removed.is_unicorn;

        self.positions.remove_player(&player_id);
        self.combat.remove_player(&player_id);
        self.sinkholes.remove_player(&player_id);
        self.traps.remove_player(&player_id);
        self.blitz.remove(&player_id);
        self.unfreeze.remove(&player_id);
        self.timers.cancel_player(&player_id);
        self.deps.metrics.increment_players_left();

        self.broadcast(ServerEvent::PlayerLeft { player_id });
        tracing::info!(
            room_code = %self.room.code,
            %player_id,
            ?cause,
            "Player permanently removed"
        );

        if self.room.players.is_empty() {
            self.destroy_room();
            return;
        }

        // A host whose grace expired takes the room down with them.
        if was_host && cause == RemovalCause::GraceExpired {
            if self.room.status == RoomStatus::Playing {
                self.end_game("host_disconnected");
            } else {
                self.destroy_room();
            }
            return;
        }

        if was_host {
            if let Some(new_host) = self.room.promote_next_host() {
                if let Some(socket_id) = self.socket_of(&new_host) {
                    self.unicast(&socket_id, ServerEvent::HostTransferred { host_id: new_host });
                }
            }
        }

        if was_unicorn {
            self.broadcast(ServerEvent::UnicornTransferred {
                unicorn_ids: self.room.unicorn_ids_ordered(),
            });
            if self.room.unicorn_ids.is_empty()
                && self.room.status == RoomStatus::Playing
                && self.room.phase == RoomPhase::Hunt
            {
                self.next_blitz("unicorn_disconnected");
            }
        }

        self.broadcast(ServerEvent::RoomUpdate {
            room: self.room.snapshot(),
        });
    }

    fn destroy_room(&mut self) {
        self.timers.cancel_all();
        self.deps.hub.close_room(&self.room.code);
        self.deps.store.forget(&self.room.code);
        self.deps.metrics.increment_rooms_destroyed();
        self.closing = true;
        tracing::info!(room_code = %self.room.code, "Room destroyed");
    }

    // =========================================================================
    // Quiz fetch
    // =========================================================================

    fn start_quiz_fetch_if_needed(&mut self) {
        if self.quiz_fetch_started {
            return;
        }
        let Some(quiz_id) = self.room.quiz_id.clone() else {
            return;
        };
        self.quiz_fetch_started = true;

        // Off the critical path: the result is posted back as a message so
        // cache assignment stays serialized.
        let service = self.deps.quiz.clone();
        let tx = self.tx.clone();
        let room_code = self.room.code.clone();
        tokio::spawn(async move {
            let result = service
                .fetch_questions(&quiz_id)
                .await
                .map_err(|e| e.to_string());
            if let Err(err) = &result {
                tracing::warn!(
                    %room_code,
                    %quiz_id,
                    error = %err,
                    "Quiz fetch failed, room will use the local pool"
                );
            }
            let _ = tx.send(RoomMsg::QuizFetched(result)).await;
        });
    }

    fn handle_quiz_fetched(&mut self, result: Result<Vec<Question>, String>) {
        match result {
            Ok(questions) => {
                tracing::info!(
                    room_code = %self.room.code,
                    count = questions.len(),
                    "Question pool cached on room"
                );
                self.room.questions = Some(questions);
            }
            Err(_) => {
                // Already logged at fetch time; the local fallback pool
                // serves every selection while `questions` is `None`.
            }
        }
    }

    // =========================================================================
    // Small helpers
    // =========================================================================

    fn sanitize_name(&self, name: Option<String>) -> String {
        let max_len = self.deps.config.server.max_player_name_length;
        let trimmed = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Player {}", self.room.players.len() + 1));
        trimmed.chars().take(max_len).collect()
    }

    fn socket_of(&self, player_id: &PlayerId) -> Option<SocketId> {
        self.room
            .player(player_id)
            .filter(|p| p.connected())
            .map(|p| p.socket_id)
    }

    fn unicast(&self, socket_id: &SocketId, event: ServerEvent) {
        self.deps.hub.send_to_socket(socket_id, event);
    }

    fn broadcast(&self, event: ServerEvent) {
        self.deps.hub.broadcast_to_room(&self.room.code, event);
    }

    fn broadcast_except(&self, socket_id: &SocketId, event: ServerEvent) {
        self.deps
            .hub
            .broadcast_to_room_except(&self.room.code, socket_id, event);
    }
}

/// Why a player left for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemovalCause {
    Leave,
    Disconnect,
    GraceExpired,
}
