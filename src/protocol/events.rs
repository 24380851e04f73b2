use serde::{Deserialize, Serialize};

use super::error_codes::ErrorCode;
use super::types::{
    CoinView, PlayerId, PlayerPhase, PlayerState, PlayerView, QuestionView, RoomCode, RoomPhase,
    SinkholeView, TrapView,
};

/// Events sent from client to server. Each websocket text frame is one JSON
/// object `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Create a room and join as host.
    CreateRoom {
        #[serde(default)]
        name: Option<String>,
        #[serde(rename = "maxPlayers", default)]
        max_players: Option<u8>,
        /// Optional external quiz document id; triggers a lazy fetch.
        #[serde(rename = "quizId", default)]
        quiz_id: Option<String>,
    },
    /// Join an existing room by code.
    JoinRoom {
        #[serde(rename = "roomCode")]
        room_code: RoomCode,
        #[serde(rename = "playerName", default)]
        player_name: Option<String>,
    },
    /// Reconnect within the grace period after a disconnect.
    RejoinRoom {
        #[serde(rename = "roomCode")]
        room_code: RoomCode,
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    /// Permanently leave the current room.
    LeaveRoom {},
    /// Host-only; begins the first blitz quiz.
    StartGame {},
    /// Throttled position report.
    UpdatePosition {
        x: f64,
        y: f64,
        row: i32,
        col: i32,
    },
    /// Answer to an entry-quiz or round-blitz question.
    BlitzAnswer {
        #[serde(rename = "questionIndex")]
        question_index: usize,
        #[serde(rename = "answerIndex")]
        answer_index: usize,
    },
    /// Answer to the unfreeze quiz while Frozen.
    SubmitUnfreezeQuizAnswer {
        #[serde(rename = "questionIndex")]
        question_index: usize,
        #[serde(rename = "answerIndex")]
        answer_index: usize,
    },
    /// Request a coin pickup (server authoritative).
    CollectCoin {
        #[serde(rename = "coinId")]
        coin_id: String,
    },
    /// Request a teleport through a sinkhole.
    EnterSinkhole {
        #[serde(rename = "sinkholeId")]
        sinkhole_id: String,
    },
    /// Pick up a trap collectible.
    CollectSinkTrap {
        #[serde(rename = "trapId")]
        trap_id: String,
    },
    /// Place a carried trap at a cell.
    DeploySinkTrap { row: i32, col: i32 },
    /// Host ends the game early.
    EndGame {},
    /// Heartbeat.
    Ping {},
}

/// Snapshot of a room as sent to clients on membership changes and rejoin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_code: RoomCode,
    pub host_id: PlayerId,
    pub max_players: u8,
    pub status: super::types::RoomStatus,
    pub phase: RoomPhase,
    pub players: Vec<PlayerView>,
    pub unicorn_ids: Vec<PlayerId>,
}

/// Full game state unicast to a player on successful rejoin.
/// Boxed in [`ServerEvent`] to reduce enum size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejoinedPayload {
    pub room: RoomSnapshot,
    pub player_id: PlayerId,
    pub phase: PlayerPhase,
    pub position: PositionPayload,
    pub coins: Vec<CoinView>,
    pub sinkholes: Vec<SinkholeView>,
    pub traps: Vec<TrapView>,
    pub deployed_traps: Vec<TrapView>,
    pub carried_traps: u32,
}

/// Position as carried on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PositionPayload {
    pub x: f64,
    pub y: f64,
    pub row: i32,
    pub col: i32,
}

/// Events sent from server to one client or broadcast to a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    RoomCreated {
        #[serde(rename = "roomCode")]
        room_code: RoomCode,
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        room: RoomSnapshot,
    },
    RoomJoined {
        #[serde(rename = "roomCode")]
        room_code: RoomCode,
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        room: RoomSnapshot,
    },
    RoomUpdate {
        room: RoomSnapshot,
    },
    PlayerJoined {
        player: PlayerView,
    },
    PlayerLeft {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    PlayerDisconnected {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    PlayerReconnected {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    HostTransferred {
        #[serde(rename = "hostId")]
        host_id: PlayerId,
    },
    UnicornTransferred {
        #[serde(rename = "unicornIds")]
        unicorn_ids: Vec<PlayerId>,
    },
    GameStarted {},
    PhaseChange {
        phase: RoomPhase,
    },
    BlitzStart {
        questions: Vec<QuestionView>,
        #[serde(rename = "durationMs")]
        duration_ms: u64,
    },
    BlitzAnswerResult {
        #[serde(rename = "questionIndex")]
        question_index: usize,
        correct: bool,
        #[serde(rename = "correctIndex")]
        correct_index: usize,
    },
    BlitzResult {
        #[serde(rename = "unicornIds")]
        unicorn_ids: Vec<PlayerId>,
        leaderboard: Vec<PlayerView>,
    },
    HuntStart {
        #[serde(rename = "unicornIds")]
        unicorn_ids: Vec<PlayerId>,
        #[serde(rename = "durationMs")]
        duration_ms: u64,
    },
    HuntEnd {
        reason: String,
    },
    PlayerPositionUpdate {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        position: PositionPayload,
    },
    PlayerTagged {
        #[serde(rename = "attackerId")]
        attacker_id: PlayerId,
        #[serde(rename = "victimId")]
        victim_id: PlayerId,
        damage: u32,
        #[serde(rename = "coinsStolen")]
        coins_stolen: u32,
    },
    /// Unicast to the victim with the authoritative post-hit position.
    PlayerHit {
        #[serde(rename = "attackerId")]
        attacker_id: PlayerId,
        position: PositionPayload,
    },
    PlayerStateChange {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        state: PlayerState,
    },
    PlayerRespawn {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        position: PositionPayload,
    },
    HealthUpdate {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        health: u32,
    },
    CoinSpawned {
        coin: CoinView,
    },
    CoinCollected {
        #[serde(rename = "coinId")]
        coin_id: String,
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        #[serde(rename = "playerCoins")]
        player_coins: u32,
    },
    SinkholeSpawned {
        sinkhole: SinkholeView,
    },
    PlayerTeleported {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        from: PositionPayload,
        to: PositionPayload,
    },
    SinkTrapSpawned {
        trap: TrapView,
    },
    SinkTrapCollected {
        #[serde(rename = "trapId")]
        trap_id: String,
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        #[serde(rename = "carriedTraps")]
        carried_traps: u32,
    },
    SinkTrapDeployed {
        trap: TrapView,
        #[serde(rename = "ownerId")]
        owner_id: PlayerId,
    },
    SinkTrapTriggered {
        #[serde(rename = "trapId")]
        trap_id: String,
        #[serde(rename = "hunterId")]
        hunter_id: PlayerId,
    },
    GameEnd {
        leaderboard: Vec<PlayerView>,
        reason: String,
    },
    UnfreezeQuizStart {
        question: QuestionView,
    },
    UnfreezeQuizResult {
        correct: bool,
        #[serde(rename = "correctIndex")]
        correct_index: usize,
    },
    Rejoined(Box<RejoinedPayload>),
    Pong {},
    JoinError {
        reason: String,
        #[serde(rename = "errorCode")]
        error_code: ErrorCode,
    },
    LeaveError {
        reason: String,
        #[serde(rename = "errorCode")]
        error_code: ErrorCode,
    },
    StartError {
        reason: String,
        #[serde(rename = "errorCode")]
        error_code: ErrorCode,
    },
    RejoinError {
        reason: String,
        #[serde(rename = "errorCode")]
        error_code: ErrorCode,
    },
    Error {
        message: String,
        #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
        error_code: Option<ErrorCode>,
    },
}
