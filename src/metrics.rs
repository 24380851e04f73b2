use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter block for the in-memory game server.
///
/// All counters are monotonically increasing except `active_connections`
/// and `active_rooms`, which track current gauges.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub disconnections: AtomicU64,

    // Room lifecycle
    pub rooms_created: AtomicU64,
    pub rooms_destroyed: AtomicU64,
    pub active_rooms: AtomicU64,
    pub room_code_collisions: AtomicU64,

    // Player activity
    pub players_joined: AtomicU64,
    pub players_left: AtomicU64,
    pub events_routed: AtomicU64,
    pub events_dropped: AtomicU64,
    pub broadcasts_sent: AtomicU64,

    // Gameplay
    pub tags_applied: AtomicU64,
    pub coins_collected: AtomicU64,
    pub teleports: AtomicU64,
    pub traps_triggered: AtomicU64,

    // Reconnection
    pub reconnect_completions: AtomicU64,
    pub reconnect_expiries: AtomicU64,
}

/// Snapshot of the counter block for the `/metrics` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_connections: u64,
    pub active_connections: u64,
    pub disconnections: u64,
    pub rooms_created: u64,
    pub rooms_destroyed: u64,
    pub active_rooms: u64,
    pub room_code_collisions: u64,
    pub players_joined: u64,
    pub players_left: u64,
    pub events_routed: u64,
    pub events_dropped: u64,
    pub broadcasts_sent: u64,
    pub tags_applied: u64,
    pub coins_collected: u64,
    pub teleports: u64,
    pub traps_triggered: u64,
    pub reconnect_completions: u64,
    pub reconnect_expiries: u64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_total_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        self.disconnections.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }

    pub fn increment_rooms_created(&self) {
        self.rooms_created.fetch_add(1, Ordering::Relaxed);
        self.active_rooms.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_destroyed(&self) {
        self.rooms_destroyed.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .active_rooms
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }

    pub fn increment_room_code_collisions(&self) {
        self.room_code_collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_players_joined(&self) {
        self.players_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_players_left(&self) {
        self.players_left.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_events_routed(&self) {
        self.events_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_events_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_broadcasts_sent(&self) {
        self.broadcasts_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tags_applied(&self) {
        self.tags_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_coins_collected(&self) {
        self.coins_collected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_teleports(&self) {
        self.teleports.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_traps_triggered(&self) {
        self.traps_triggered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconnect_completions(&self) {
        self.reconnect_completions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconnect_expiries(&self) {
        self.reconnect_expiries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            disconnections: self.disconnections.load(Ordering::Relaxed),
            rooms_created: self.rooms_created.load(Ordering::Relaxed),
            rooms_destroyed: self.rooms_destroyed.load(Ordering::Relaxed),
            active_rooms: self.active_rooms.load(Ordering::Relaxed),
            room_code_collisions: self.room_code_collisions.load(Ordering::Relaxed),
            players_joined: self.players_joined.load(Ordering::Relaxed),
            players_left: self.players_left.load(Ordering::Relaxed),
            events_routed: self.events_routed.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            broadcasts_sent: self.broadcasts_sent.load(Ordering::Relaxed),
            tags_applied: self.tags_applied.load(Ordering::Relaxed),
            coins_collected: self.coins_collected.load(Ordering::Relaxed),
            teleports: self.teleports.load(Ordering::Relaxed),
            traps_triggered: self.traps_triggered.load(Ordering::Relaxed),
            reconnect_completions: self.reconnect_completions.load(Ordering::Relaxed),
            reconnect_expiries: self.reconnect_expiries.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauges_track_up_and_down() {
        let m = ServerMetrics::new();
        m.increment_total_connections();
        m.increment_total_connections();
        m.decrement_active_connections();
        let snap = m.snapshot();
        assert_eq!(snap.total_connections, 2);
        assert_eq!(snap.active_connections, 1);
        assert_eq!(snap.disconnections, 1);
    }

    #[test]
    fn active_connections_never_underflow() {
        let m = ServerMetrics::new();
        m.decrement_active_connections();
        assert_eq!(m.snapshot().active_connections, 0);
    }

    #[test]
    fn room_gauge_follows_lifecycle() {
        let m = ServerMetrics::new();
        m.increment_rooms_created();
        m.increment_rooms_created();
        m.increment_rooms_destroyed();
        let snap = m.snapshot();
        assert_eq!(snap.rooms_created, 2);
        assert_eq!(snap.active_rooms, 1);
    }
}
