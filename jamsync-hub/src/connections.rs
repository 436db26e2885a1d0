use dashmap::DashMap;
use log::debug;
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    db::{RoomId, UserId},
    protocol::ServerEvent,
    util::Id,
};

pub type ConnectionId = Id<Connection>;
pub type EventSender = UnboundedSender<ServerEvent>;

/// A live gateway connection. Created on transport open, bound to a user
/// and room on join, destroyed on transport close.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub user_id: Option<UserId>,
    pub room_id: Option<RoomId>,
    sender: EventSender,
}

/// Tracks live connections and maps each to at most one (user, room) pair.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a new connection with its outbound event channel.
    pub fn register(&self, sender: EventSender) -> ConnectionId {
        let id = ConnectionId::new();

        self.connections.insert(
            id,
            Connection {
                id,
                user_id: None,
                room_id: None,
                sender,
            },
        );

        id
    }

    pub fn unregister(&self, id: ConnectionId) {
        self.connections.remove(&id);
    }

    /// Binds a connection to a user and room. A connection that already
    /// has a different binding is rebound, last bind wins.
    pub fn bind(&self, id: ConnectionId, user_id: UserId, room_id: RoomId) {
        if let Some(mut connection) = self.connections.get_mut(&id) {
            connection.user_id = Some(user_id);
            connection.room_id = Some(room_id);
        }
    }

    pub fn unbind(&self, id: ConnectionId) {
        if let Some(mut connection) = self.connections.get_mut(&id) {
            connection.user_id = None;
            connection.room_id = None;
        }
    }

    /// Returns the (user, room) pair a connection is bound to, if any.
    pub fn binding(&self, id: ConnectionId) -> Option<(UserId, RoomId)> {
        self.connections.get(&id).and_then(|connection| {
            connection
                .user_id
                .clone()
                .zip(connection.room_id.clone())
        })
    }

    pub fn connections_in_room(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|c| c.room_id.as_ref() == Some(room_id))
            .map(|c| c.id)
            .collect()
    }

    /// Sends an event to one connection. Fails silently if the transport
    /// is already gone.
    pub fn send(&self, id: ConnectionId, event: ServerEvent) {
        let Some(connection) = self.connections.get(&id) else {
            debug!("Dropped event for unknown connection {}", id);
            return;
        };

        if connection.sender.send(event).is_err() {
            debug!("Dropped event for closed connection {}", id);
        }
    }

    /// Sends an event to every connection bound to a room, except the one
    /// bound to `exclude`, if given.
    pub fn send_to_room(&self, room_id: &RoomId, event: ServerEvent, exclude: Option<&UserId>) {
        for connection in self.connections.iter() {
            if connection.room_id.as_ref() != Some(room_id) {
                continue;
            }

            if exclude.is_some() && connection.user_id.as_ref() == exclude {
                continue;
            }

            if connection.sender.send(event.clone()).is_err() {
                debug!("Dropped broadcast for closed connection {}", connection.id);
            }
        }
    }
}
