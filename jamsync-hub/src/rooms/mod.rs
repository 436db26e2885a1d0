use std::sync::Arc;

use thiserror::Error;

mod playback;
mod queue;
mod room;
mod votes;

pub use playback::*;
pub use queue::*;
pub use room::*;
pub use votes::*;

use crate::{
    db::{NewRoom, RoomId, StorageError},
    HubContext,
};

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room {0} not found")]
    RoomNotFound(RoomId),
    #[error("Incorrect password")]
    IncorrectPassword,
}

/// Holds every room the hub knows about.
pub struct RoomManager {
    context: HubContext,
}

impl RoomManager {
    pub fn new(context: &HubContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Restores the rooms from storage on init.
    pub async fn restore(&self) -> Result<(), StorageError> {
        let rooms: Vec<_> = self
            .context
            .storage
            .list_rooms()
            .await?
            .into_iter()
            .map(|data| (data.id.clone(), Room::new(&self.context, data)))
            .collect();

        for (id, room) in rooms {
            self.context.rooms.insert(id, Arc::new(room));
        }

        Ok(())
    }

    /// Creates a new room.
    pub async fn create_room(&self, new_room: NewRoom) -> Result<Arc<Room>, StorageError> {
        let data = self.context.storage.create_room(new_room).await?;
        let room = Arc::new(Room::new(&self.context, data));

        self.context.rooms.insert(room.id(), room.clone());

        Ok(room)
    }

    /// Get all rooms in memory.
    pub fn list_all(&self) -> Vec<Arc<Room>> {
        self.context.rooms.iter().map(|r| r.clone()).collect()
    }

    pub fn room_by_id(&self, room_id: &RoomId) -> Result<Arc<Room>, RoomError> {
        self.context
            .rooms
            .get(room_id)
            .map(|r| r.clone())
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))
    }
}
