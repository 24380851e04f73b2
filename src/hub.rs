//! Socket multiplexer: live sockets, room broadcast groups, and the
//! socket -> (room, player) routing table.
//!
//! This is the only state shared across room runtimes. It is mutated only
//! on connect, join, reconnect, and disconnect; runtimes otherwise use it
//! to deliver outbound events. Delivery uses `try_send` into each socket's
//! bounded writer queue; a slow consumer drops events rather than stalling
//! a room.

use crate::metrics::ServerMetrics;
use crate::protocol::{PlayerId, RoomCode, ServerEvent, SocketId};
use dashmap::DashMap;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug)]
struct ConnectedSocket {
    tx: mpsc::Sender<Arc<ServerEvent>>,
    #[allow(dead_code)]
    addr: SocketAddr,
    route: Option<(RoomCode, PlayerId)>,
}

#[derive(Debug)]
pub struct Hub {
    sockets: DashMap<SocketId, ConnectedSocket>,
    groups: DashMap<RoomCode, HashSet<SocketId>>,
    metrics: Arc<ServerMetrics>,
}

impl Hub {
    pub fn new(metrics: Arc<ServerMetrics>) -> Self {
        Self {
            sockets: DashMap::new(),
            groups: DashMap::new(),
            metrics,
        }
    }

    /// Register a freshly accepted socket and its writer queue.
    pub fn register_socket(
        &self,
        socket_id: SocketId,
        tx: mpsc::Sender<Arc<ServerEvent>>,
        addr: SocketAddr,
    ) {
        self.sockets.insert(
            socket_id,
            ConnectedSocket {
                tx,
                addr,
                route: None,
            },
        );
        self.metrics.increment_total_connections();
        tracing::info!(%socket_id, client_addr = %addr, "WebSocket connection established");
    }

    /// Remove a socket entirely. Returns its routing entry so the caller
    /// can notify the owning room.
    pub fn unregister_socket(&self, socket_id: &SocketId) -> Option<(RoomCode, PlayerId)> {
        let (_, socket) = self.sockets.remove(socket_id)?;
        if let Some((code, _)) = &socket.route {
            if let Some(mut group) = self.groups.get_mut(code) {
                group.remove(socket_id);
            }
        }
        self.metrics.decrement_active_connections();
        socket.route
    }

    /// Bind a socket into a room: set the routing entry and join the
    /// broadcast group. Called on create, join, and rejoin.
    pub fn bind(&self, socket_id: SocketId, code: &RoomCode, player_id: PlayerId) {
        if let Some(mut socket) = self.sockets.get_mut(&socket_id) {
            socket.route = Some((code.clone(), player_id));
        }
        self.groups
            .entry(code.clone())
            .or_default()
            .insert(socket_id);
    }

    /// Detach a socket from its room while keeping the connection alive.
    /// Called on leave and on disconnects entering the grace window.
    pub fn unbind(&self, socket_id: &SocketId) {
        let route = self
            .sockets
            .get_mut(socket_id)
            .and_then(|mut s| s.route.take());
        if let Some((code, _)) = route {
            if let Some(mut group) = self.groups.get_mut(&code) {
                group.remove(socket_id);
            }
        }
    }

    pub fn route_of(&self, socket_id: &SocketId) -> Option<(RoomCode, PlayerId)> {
        self.sockets.get(socket_id).and_then(|s| s.route.clone())
    }

    /// Tear down a room's broadcast group and every member's routing entry.
    pub fn close_room(&self, code: &RoomCode) {
        let Some((_, members)) = self.groups.remove(code) else {
            return;
        };
        for socket_id in members {
            if let Some(mut socket) = self.sockets.get_mut(&socket_id) {
                socket.route = None;
            }
        }
    }

    pub fn send_to_socket(&self, socket_id: &SocketId, event: ServerEvent) {
        self.send_shared(socket_id, &Arc::new(event));
    }

    fn send_shared(&self, socket_id: &SocketId, event: &Arc<ServerEvent>) {
        let Some(socket) = self.sockets.get(socket_id) else {
            tracing::debug!(%socket_id, "Dropping event for unknown socket");
            return;
        };
        if socket.tx.try_send(Arc::clone(event)).is_err() {
            self.metrics.increment_events_dropped();
            tracing::warn!(%socket_id, "Socket writer queue full, event dropped");
        }
    }

    pub fn broadcast_to_room(&self, code: &RoomCode, event: ServerEvent) {
        let event = Arc::new(event);
        self.metrics.increment_broadcasts_sent();
        let Some(group) = self.groups.get(code) else {
            return;
        };
        for socket_id in group.iter() {
            self.send_shared(socket_id, &event);
        }
    }

    pub fn broadcast_to_room_except(
        &self,
        code: &RoomCode,
        except: &SocketId,
        event: ServerEvent,
    ) {
        let event = Arc::new(event);
        self.metrics.increment_broadcasts_sent();
        let Some(group) = self.groups.get(code) else {
            return;
        };
        for socket_id in group.iter() {
            if socket_id != except {
                self.send_shared(socket_id, &event);
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.sockets.len()
    }
}
