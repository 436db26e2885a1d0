use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use jamsync_hub::{
    db::{
        ChatMessage, NewRoom, NewUser, PrimaryKey, QueueItem, Result, RoomData, RoomId, RoomUpdate,
        RoomUser, SkipVote, SongId, Storage, StorageError, UserData, UserId,
    },
    random_string,
};

/// An in-memory [Storage] implementation backed by per-entity maps.
///
/// This is the store the hub mirrors its authoritative state into. It
/// keeps everything for the lifetime of the process and forgets it on
/// shutdown.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<PrimaryKey, UserData>,
    rooms: DashMap<PrimaryKey, RoomData>,
    queue_items: DashMap<PrimaryKey, QueueItem>,
    room_users: DashMap<PrimaryKey, RoomUser>,
    chat_messages: DashMap<PrimaryKey, ChatMessage>,
    skip_votes: DashMap<PrimaryKey, SkipVote>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn user_by_id(&self, user_id: &UserId) -> Result<UserData> {
        self.users
            .get(user_id)
            .map(|u| u.clone())
            .ok_or_else(|| StorageError::NotFound {
                resource: "user",
                identifier: user_id.clone(),
            })
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        let exists = self
            .users
            .iter()
            .any(|u| u.username == new_user.username);

        if exists {
            return Err(StorageError::Conflict {
                resource: "user",
                field: "username",
                value: new_user.username,
            });
        }

        let user = UserData {
            id: random_string(16),
            username: new_user.username,
            password: new_user.password,
        };

        self.users.insert(user.id.clone(), user.clone());

        Ok(user)
    }

    async fn room_by_id(&self, room_id: &RoomId) -> Result<RoomData> {
        self.rooms
            .get(room_id)
            .map(|r| r.clone())
            .ok_or_else(|| StorageError::NotFound {
                resource: "room",
                identifier: room_id.clone(),
            })
    }

    async fn list_rooms(&self) -> Result<Vec<RoomData>> {
        Ok(self.rooms.iter().map(|r| r.clone()).collect())
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        let room = RoomData {
            id: random_string(16),
            name: new_room.name,
            password: new_room.password,
            created_by: new_room.created_by,
            created_at: Utc::now(),
            current_track: None,
            is_playing: false,
            current_time: 0.0,
        };

        self.rooms.insert(room.id.clone(), room.clone());

        Ok(room)
    }

    async fn update_room(&self, update: RoomUpdate) -> Result<RoomData> {
        let mut room = self
            .rooms
            .get_mut(&update.id)
            .ok_or_else(|| StorageError::NotFound {
                resource: "room",
                identifier: update.id.clone(),
            })?;

        if let Some(current_track) = update.current_track {
            room.current_track = current_track;
        }

        if let Some(is_playing) = update.is_playing {
            room.is_playing = is_playing;
        }

        if let Some(current_time) = update.current_time {
            room.current_time = current_time;
        }

        Ok(room.clone())
    }

    async fn queue_by_room(&self, room_id: &RoomId) -> Result<Vec<QueueItem>> {
        let mut items: Vec<_> = self
            .queue_items
            .iter()
            .filter(|i| &i.room_id == room_id)
            .map(|i| i.clone())
            .collect();

        items.sort_by_key(|i| i.position);

        Ok(items)
    }

    async fn add_to_queue(&self, item: QueueItem) -> Result<()> {
        self.queue_items.insert(item.track.id.clone(), item);
        Ok(())
    }

    async fn remove_from_queue(&self, item_id: &SongId) -> Result<()> {
        self.queue_items.remove(item_id);
        Ok(())
    }

    async fn room_users(&self, room_id: &RoomId) -> Result<Vec<RoomUser>> {
        Ok(self
            .room_users
            .iter()
            .filter(|m| &m.room_id == room_id)
            .map(|m| m.clone())
            .collect())
    }

    async fn add_user_to_room(&self, member: RoomUser) -> Result<()> {
        // At most one membership row per (room, user)
        self.room_users
            .retain(|_, m| !(m.room_id == member.room_id && m.user_id == member.user_id));
        self.room_users.insert(member.id.clone(), member);

        Ok(())
    }

    async fn remove_user_from_room(&self, room_id: &RoomId, user_id: &UserId) -> Result<()> {
        self.room_users
            .retain(|_, m| !(&m.room_id == room_id && &m.user_id == user_id));

        Ok(())
    }

    async fn update_user_typing(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        is_typing: bool,
    ) -> Result<()> {
        let mut member = self
            .room_users
            .iter_mut()
            .find(|m| &m.room_id == room_id && &m.user_id == user_id)
            .ok_or_else(|| StorageError::NotFound {
                resource: "room member",
                identifier: user_id.clone(),
            })?;

        member.is_typing = is_typing;
        member.last_activity = Utc::now();

        Ok(())
    }

    async fn chat_messages(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>> {
        let mut messages: Vec<_> = self
            .chat_messages
            .iter()
            .filter(|m| &m.room_id == room_id)
            .map(|m| m.clone())
            .collect();

        messages.sort_by_key(|m| m.sent_at);

        Ok(messages)
    }

    async fn add_chat_message(&self, message: ChatMessage) -> Result<()> {
        self.chat_messages.insert(message.id.clone(), message);
        Ok(())
    }

    async fn skip_votes(&self, room_id: &RoomId, song_id: &SongId) -> Result<Vec<SkipVote>> {
        Ok(self
            .skip_votes
            .iter()
            .filter(|v| &v.room_id == room_id && &v.song_id == song_id)
            .map(|v| v.clone())
            .collect())
    }

    async fn add_skip_vote(&self, vote: SkipVote) -> Result<()> {
        self.skip_votes.insert(vote.id.clone(), vote);
        Ok(())
    }

    async fn clear_skip_votes(&self, room_id: &RoomId, song_id: &SongId) -> Result<()> {
        self.skip_votes
            .retain(|_, v| !(&v.room_id == room_id && &v.song_id == song_id));

        Ok(())
    }
}
