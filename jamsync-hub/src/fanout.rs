use std::sync::Arc;

use crate::{
    connections::{ConnectionId, ConnectionRegistry},
    db::{RoomId, UserId},
    protocol::ServerEvent,
};

/// Fans room state deltas out to every live connection in a room.
///
/// Mutating components call this directly. All broadcasts produced while a
/// room's lock is held are emitted in mutation order, so one command's
/// outputs are never reordered.
#[derive(Debug, Clone)]
pub struct BroadcastDispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Sends an event to every connection bound to `room_id`, except the
    /// one bound to `exclude`, if given.
    pub fn broadcast_to_room(
        &self,
        room_id: &RoomId,
        event: ServerEvent,
        exclude: Option<&UserId>,
    ) {
        self.registry.send_to_room(room_id, event, exclude)
    }

    /// Sends an event to a single connection.
    pub fn send(&self, connection_id: ConnectionId, event: ServerEvent) {
        self.registry.send(connection_id, event)
    }
}
