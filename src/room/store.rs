//! In-memory room store: code -> runtime inbox.
//!
//! The store owns only the mapping; each room's state lives inside its
//! runtime task. Codes are generated here and checked for uniqueness
//! against the live map.

use crate::protocol::{room_codes, RoomCode};
use crate::room::runtime::{RoomMsg, RoomRuntime, RuntimeDeps};
use crate::room::Room;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum RoomCreateError {
    #[error("could not allocate a unique room code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: u32 },
}

#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: DashMap<RoomCode, mpsc::Sender<RoomMsg>>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room with a fresh unique code and spawn its runtime.
    /// Returns the code and the runtime's inbox.
    pub fn create_room(
        &self,
        max_players: u8,
        quiz_id: Option<String>,
        deps: RuntimeDeps,
    ) -> Result<(RoomCode, mpsc::Sender<RoomMsg>), RoomCreateError> {
        let attempts = deps.config.server.room_code_attempts;
        let mut code = None;
        for _ in 0..attempts {
            let candidate = room_codes::generate_room_code();
            if !self.rooms.contains_key(&candidate) {
                code = Some(candidate);
                break;
            }
            deps.metrics.increment_room_code_collisions();
        }
        let code = code.ok_or(RoomCreateError::CodeSpaceExhausted { attempts })?;

        let metrics = deps.metrics.clone();
        let room = Room::new(code.clone(), max_players, quiz_id);
        let tx = RoomRuntime::spawn(room, deps);
        self.rooms.insert(code.clone(), tx.clone());
        metrics.increment_rooms_created();
        tracing::info!(room_code = %code, "Room created");
        Ok((code, tx))
    }

    pub fn get(&self, code: &str) -> Option<mpsc::Sender<RoomMsg>> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    /// Drop the mapping for a destroyed room. Called by the runtime itself
    /// on teardown.
    pub fn forget(&self, code: &RoomCode) {
        self.rooms.remove(code);
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
