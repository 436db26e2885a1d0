use async_trait::async_trait;
use thiserror::Error;

mod data;
pub use data::*;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// An unknown or internal error happened with the store
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the store doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
}

/// Represents a type that can persist jamsync data.
///
/// The hub treats every write triggered by a real-time mutation as a
/// best-effort mirror of its in-memory state. A failing call leaves the
/// in-memory state untouched and is only logged.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn user_by_id(&self, user_id: &UserId) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;

    async fn room_by_id(&self, room_id: &RoomId) -> Result<RoomData>;
    async fn list_rooms(&self) -> Result<Vec<RoomData>>;
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData>;
    async fn update_room(&self, update: RoomUpdate) -> Result<RoomData>;

    async fn queue_by_room(&self, room_id: &RoomId) -> Result<Vec<QueueItem>>;
    async fn add_to_queue(&self, item: QueueItem) -> Result<()>;
    async fn remove_from_queue(&self, item_id: &SongId) -> Result<()>;

    async fn room_users(&self, room_id: &RoomId) -> Result<Vec<RoomUser>>;
    async fn add_user_to_room(&self, member: RoomUser) -> Result<()>;
    async fn remove_user_from_room(&self, room_id: &RoomId, user_id: &UserId) -> Result<()>;
    async fn update_user_typing(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        is_typing: bool,
    ) -> Result<()>;

    async fn chat_messages(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>>;
    async fn add_chat_message(&self, message: ChatMessage) -> Result<()>;

    async fn skip_votes(&self, room_id: &RoomId, song_id: &SongId) -> Result<Vec<SkipVote>>;
    async fn add_skip_vote(&self, vote: SkipVote) -> Result<()>;
    async fn clear_skip_votes(&self, room_id: &RoomId, song_id: &SongId) -> Result<()>;
}

#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub password: String,
}

#[derive(Debug)]
pub struct NewRoom {
    pub name: String,
    pub password: Option<String>,
    /// The creator of the new room
    pub created_by: UserId,
}

/// A partial update of a room's playback state.
/// Fields left as [None] are not touched.
#[derive(Debug, Default)]
pub struct RoomUpdate {
    pub id: RoomId,
    pub current_track: Option<Option<Track>>,
    pub is_playing: Option<bool>,
    pub current_time: Option<f64>,
}
