#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Maze Hunt Server
//!
//! Authoritative in-memory WebSocket server for a realtime multiplayer
//! maze game: phased quiz/hunt rounds, grid combat, and grid-bound
//! collectibles, with one serialized runtime per room.
//!
//! No database, no cloud services. Run the binary and connect.

/// Server configuration and environment variables
pub mod config;

/// Phase timers, role rotation, and blitz bookkeeping
pub mod game_loop;

/// Grid <-> pixel geometry and path cells
pub mod grid;

/// Socket multiplexer and room broadcast groups
pub mod hub;

/// Structured logging configuration
pub mod logging;

/// Per-room gameplay managers (position, combat, spawnables)
pub mod managers;

/// Static maze map configuration
pub mod map;

/// Metrics collection and reporting
pub mod metrics;

/// Wire event names and payload shapes
pub mod protocol;

/// Question sourcing and normalization
pub mod quiz;

/// Room state, store, and the per-room runtime actor
pub mod room;

/// WebSocket connection handling and HTTP routes
pub mod websocket;
