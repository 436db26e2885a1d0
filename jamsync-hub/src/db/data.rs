use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The type used for primary keys throughout the system.
/// Rooms and users are identified by opaque strings so that clients can
/// carry their ids across reconnects.
pub type PrimaryKey = String;

pub type RoomId = PrimaryKey;
pub type UserId = PrimaryKey;
/// The id of a track instance. Skip votes are scoped to this.
pub type SongId = PrimaryKey;

/// A jamsync account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    #[serde(default)]
    pub password: String,
}

/// A playable track, embedded in a room's current slot and in queue items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: SongId,
    /// The id of the track at its source, such as a video id
    pub video_id: String,
    pub title: String,
    /// Duration in seconds
    pub duration: f64,
    pub added_by: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub channel: Option<String>,
}

/// A jamsync room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomData {
    pub id: RoomId,
    pub name: String,
    /// A plaintext-compared secret gating room entry
    #[serde(skip_serializing)]
    #[serde(default)]
    pub password: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub current_track: Option<Track>,
    pub is_playing: bool,
    /// The logical playback position, in seconds. Only meaningful while
    /// `current_track` is set.
    pub current_time: f64,
}

/// An entry in a room's ordered queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    #[serde(flatten)]
    pub track: Track,
    pub room_id: RoomId,
    /// Ascending play order within the room. Renumbered to a gapless
    /// 0..n-1 sequence whenever the ordered queue is read.
    pub position: u32,
    pub added_at: DateTime<Utc>,
}

/// A user's membership of a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUser {
    pub id: PrimaryKey,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
    pub is_typing: bool,
    pub last_activity: DateTime<Utc>,
}

/// A chat message sent to a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: PrimaryKey,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// A single user's vote to skip a specific track instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipVote {
    pub id: PrimaryKey,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub song_id: SongId,
    pub voted_at: DateTime<Utc>,
}
