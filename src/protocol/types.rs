use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed prefix for generated room codes.
pub const ROOM_CODE_PREFIX: &str = "MAZ";
/// Number of random letters appended to the prefix.
pub const ROOM_CODE_RANDOM_LEN: usize = 4;

/// Persistent player identifier, stable across reconnects.
/// Every cross-component reference uses this id.
pub type PlayerId = Uuid;
/// Ephemeral transport identifier for the current connection.
/// Only the Hub and the socket-facing edges see this.
pub type SocketId = Uuid;
/// Room code string (`MAZ` + four letters A-Z).
pub type RoomCode = String;

/// Discrete maze cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub row: i32,
    pub col: i32,
}

impl GridPos {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Chebyshev (king-move) distance between two cells.
    pub fn chebyshev(&self, other: &GridPos) -> i32 {
        (self.row - other.row).abs().max((self.col - other.col).abs())
    }
}

/// Continuous pixel position, kept consistent with the grid cell up to
/// cell size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPos {
    pub x: f64,
    pub y: f64,
}

impl PixelPos {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Lifecycle of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

/// Room-level phase, broadcast to clients on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    Waiting,
    BlitzQuiz,
    Hunt,
    RoundEnd,
    GameEnd,
}

/// Per-player phase within a playing room. A player in Blitz is answering
/// their entry quiz and is invisible to others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerPhase {
    Blitz,
    Hunt,
}

/// Combat-relevant state of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Active,
    Frozen,
    InIFrames,
}

/// Player snapshot as shared with clients in room updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub player_id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub is_unicorn: bool,
    pub coins: u32,
    pub health: u32,
    pub state: PlayerState,
    pub character_id: u8,
    pub connected: bool,
}

/// A quiz question as normalized from the external provider or the local
/// fallback pool. `correct_index` never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Client-facing projection of a [`Question`] with the answer stripped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            text: q.text.clone(),
            options: q.options.clone(),
            images: q.images.clone(),
        }
    }
}

/// A coin on the maze floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinView {
    pub coin_id: String,
    pub row: i32,
    pub col: i32,
}

/// A sinkhole portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkholeView {
    pub sinkhole_id: String,
    pub row: i32,
    pub col: i32,
    pub color: String,
}

/// A collectible trap on the ground.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrapView {
    pub trap_id: String,
    pub row: i32,
    pub col: i32,
}
