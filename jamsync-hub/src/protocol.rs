use serde::{Deserialize, Serialize};

use crate::{
    db::{ChatMessage, QueueItem, RoomData, RoomId, RoomUser, SongId, Track, UserData, UserId},
    search::SearchResult,
};

/// A command sent by a client over the gateway.
///
/// Frames are JSON objects tagged by `type`. The `join` frame carries its
/// fields at the top level, every other payload lives under `data`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Join {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "userId")]
        user_id: UserId,
    },
    Leave,
    Search {
        data: SearchQuery,
    },
    AddToQueue {
        data: NewTrack,
    },
    VoteSkip,
    PlayPause,
    Seek {
        data: SeekTo,
    },
    ChatMessage {
        data: ChatBody,
    },
    Typing {
        data: TypingBody,
    },
    TrackEnded {
        data: TrackEndedBody,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchQuery {
    pub query: String,
}

/// A track a client wants appended to the queue
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTrack {
    pub video_id: String,
    pub title: String,
    pub duration: f64,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeekTo {
    /// Target position in seconds. Values beyond the track duration are
    /// accepted as-is, the reporting client decides when the track ends.
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatBody {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingBody {
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEndedBody {
    pub song_id: SongId,
}

/// An event fanned out to clients over the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The full room snapshot, sent to a connection once at join time
    RoomState(RoomSnapshot),
    #[serde(rename_all = "camelCase")]
    UserJoined { user_id: UserId },
    #[serde(rename_all = "camelCase")]
    UserLeft { user_id: UserId },
    RoomUsersUpdated(Vec<RoomUserView>),
    QueueUpdated(Vec<QueueItem>),
    #[serde(rename_all = "camelCase")]
    SongChanged {
        current_song: Option<Track>,
        queue: Vec<QueueItem>,
    },
    /// The queue ran dry and nothing is playing anymore
    SongEnded,
    #[serde(rename_all = "camelCase")]
    PlaybackStateChanged { is_playing: bool, current_time: f64 },
    #[serde(rename_all = "camelCase")]
    SeekUpdated { current_time: f64 },
    SkipVotesUpdated { votes: usize, required: usize },
    ChatMessage(ChatMessageView),
    #[serde(rename_all = "camelCase")]
    UserTyping {
        user_id: UserId,
        is_typing: bool,
        username: Option<String>,
    },
    SearchResults(Vec<SearchResult>),
    SearchLoading(bool),
    SearchError(String),
    Error(String),
}

/// The complete state of a room as seen at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room: RoomData,
    pub queue: Vec<QueueItem>,
    pub room_users: Vec<RoomUserView>,
    pub chat_messages: Vec<ChatMessageView>,
}

/// A room membership row together with the resolved user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomUserView {
    #[serde(flatten)]
    pub member: RoomUser,
    pub user: Option<UserData>,
}

/// A chat message together with the resolved sender
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessageView {
    #[serde(flatten)]
    pub message: ChatMessage,
    pub user: Option<UserData>,
}
