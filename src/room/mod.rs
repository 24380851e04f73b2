//! Room and player state.
//!
//! A [`Room`] is mutated only by its owning runtime; nothing here is
//! shared. Both identities of a player live side by side: the persistent
//! [`PlayerId`] that every cross-component reference uses, and the
//! ephemeral [`SocketId`] of the current connection.

pub mod runtime;
pub mod store;

use crate::protocol::{
    PlayerId, PlayerPhase, PlayerState, PlayerView, Question, RoomCode, RoomPhase, RoomSnapshot,
    RoomStatus, SocketId,
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Character palette size; ids are unique within a room, so this bounds
/// the largest configurable room.
pub const CHARACTER_PALETTE_SIZE: u8 = 30;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub socket_id: SocketId,
    pub name: String,
    pub is_host: bool,
    pub is_unicorn: bool,
    pub coins: u32,
    pub health: u32,
    pub state: PlayerState,
    pub phase: PlayerPhase,
    pub character_id: u8,
    pub questions_attempted: u32,
    pub questions_correct: u32,
    /// Question ids this player has already seen; prevents repeat quizzes.
    pub attempted_question_ids: HashSet<String>,
    pub carried_traps: u32,
    /// Set while the player is inside the reconnect grace window.
    pub disconnected_at: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
}

impl Player {
    pub fn connected(&self) -> bool {
        self.disconnected_at.is_none()
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            player_id: self.id,
            name: self.name.clone(),
            is_host: self.is_host,
            is_unicorn: self.is_unicorn,
            coins: self.coins,
            health: self.health,
            state: self.state,
            character_id: self.character_id,
            connected: self.connected(),
        }
    }
}

#[derive(Debug)]
pub struct Room {
    pub code: RoomCode,
    pub host_id: PlayerId,
    pub max_players: u8,
    pub status: RoomStatus,
    pub phase: RoomPhase,
    /// Ordered player list; order is the deterministic tie-break for
    /// combat and host succession.
    pub players: Vec<Player>,
    pub unicorn_ids: HashSet<PlayerId>,
    /// External quiz document id, when the creator supplied one.
    pub quiz_id: Option<String>,
    /// Fetched question pool; `None` until the fetch lands (the local
    /// fallback pool covers the gap).
    pub questions: Option<Vec<Question>>,
    /// Players who have been hunters in the current rotation cycle.
    pub hunter_rotation: HashSet<PlayerId>,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(code: RoomCode, max_players: u8, quiz_id: Option<String>) -> Self {
        Self {
            code,
            host_id: PlayerId::nil(),
            max_players,
            status: RoomStatus::Waiting,
            phase: RoomPhase::Waiting,
            players: Vec::new(),
            unicorn_ids: HashSet::new(),
            quiz_id,
            questions: None,
            hunter_rotation: HashSet::new(),
            created_at: Utc::now(),
        }
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == *id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == *id)
    }

    pub fn player_by_socket(&self, socket_id: &SocketId) -> Option<&Player> {
        self.players
            .iter()
            .find(|p| p.socket_id == *socket_id && p.connected())
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= usize::from(self.max_players)
    }

    /// Add a new player, assigning the lowest free character id. The first
    /// player becomes host. Returns `None` when the room is full.
    pub fn add_player(
        &mut self,
        id: PlayerId,
        socket_id: SocketId,
        name: String,
        starting_health: u32,
    ) -> Option<&Player> {
        if self.is_full() {
            return None;
        }
        let character_id = self.free_character_id()?;
        let is_host = self.players.is_empty();
        if is_host {
            self.host_id = id;
        }
        self.players.push(Player {
            id,
            socket_id,
            name,
            is_host,
            is_unicorn: false,
            coins: 0,
            health: starting_health,
            state: PlayerState::Active,
            phase: PlayerPhase::Blitz,
            character_id,
            questions_attempted: 0,
            questions_correct: 0,
            attempted_question_ids: HashSet::new(),
            carried_traps: 0,
            disconnected_at: None,
            joined_at: Utc::now(),
        });
        self.players.last()
    }

    /// Remove a player, pruning the unicorn set atomically with the
    /// membership change.
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        let idx = self.players.iter().position(|p| p.id == *id)?;
        let player = self.players.remove(idx);
        self.unicorn_ids.remove(id);
        self.hunter_rotation.remove(id);
        Some(player)
    }

    /// Next host after the current one left: the first remaining player in
    /// order.
    pub fn promote_next_host(&mut self) -> Option<PlayerId> {
        let next = self.players.first_mut()?;
        next.is_host = true;
        self.host_id = next.id;
        Some(next.id)
    }

    pub fn connected_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.connected())
    }

    pub fn connected_count(&self) -> usize {
        self.connected_players().count()
    }

    /// Ordered unicorn ids, following player order for determinism.
    pub fn unicorn_ids_ordered(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| self.unicorn_ids.contains(&p.id))
            .map(|p| p.id)
            .collect()
    }

    /// Leaderboard: players sorted by coins descending, ties by join order.
    pub fn leaderboard(&self) -> Vec<PlayerView> {
        let mut views: Vec<PlayerView> = self.players.iter().map(Player::view).collect();
        views.sort_by(|a, b| b.coins.cmp(&a.coins));
        views
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_code: self.code.clone(),
            host_id: self.host_id,
            max_players: self.max_players,
            status: self.status,
            phase: self.phase,
            players: self.players.iter().map(Player::view).collect(),
            unicorn_ids: self.unicorn_ids_ordered(),
        }
    }

    fn free_character_id(&self) -> Option<u8> {
        (0..CHARACTER_PALETTE_SIZE).find(|c| !self.players.iter().any(|p| p.character_id == *c))
    }
}
