//! Per-room gameplay managers.
//!
//! Each live room owns one instance of every manager; all mutation happens
//! from the owning runtime's serialized message loop. Managers never reach
//! sideways into each other: cross-manager constraints (disjoint spawnable
//! cells) flow through the read-only [`occupancy::OccupiedSet`] view the
//! runtime assembles.

pub mod combat;
pub mod coins;
pub mod occupancy;
pub mod position;
pub mod sinkholes;
pub mod traps;

pub use combat::{CombatMgr, TagCandidate, TagOutcome};
pub use coins::{CoinMgr, CollectReject};
pub use occupancy::OccupiedSet;
pub use position::{MoveRecord, PositionMgr};
pub use sinkholes::{SinkholeMgr, Teleport, TeleportReject};
pub use traps::{DeployReject, TrapCollectReject, TrapMgr};
