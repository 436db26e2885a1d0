use std::{collections::VecDeque, future::Future, pin::Pin};

use chrono::{DateTime, Utc};
use log::warn;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{
    connections::ConnectionId,
    db::{
        ChatMessage, QueueItem, RoomData, RoomId, RoomUpdate, RoomUser, SkipVote, SongId, Track,
        UserData, UserId,
    },
    protocol::{ChatMessageView, RoomSnapshot, RoomUserView, ServerEvent},
    util::random_string,
    HubContext,
};

use super::{
    playback::PlaybackState,
    queue::TrackQueue,
    votes::{quorum, SkipVotes},
    RoomError,
};

/// How many chat messages a room keeps in memory for the join snapshot.
/// The storage mirror keeps the full history.
const CHAT_TAIL_LENGTH: usize = 100;

type MirrorWrite = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A jamsync room: one authoritative playback state, a shared queue, a
/// member set, skip votes, and a chat tail.
///
/// All mutable state sits behind a single mutex, which is the per-room
/// serialization boundary. Every command locks once for its whole
/// read-modify-broadcast sequence, so concurrent commands on the same
/// room never interleave, while different rooms proceed in parallel.
/// Storage writes are fire-and-forget mirrors of the in-memory state.
pub struct Room {
    context: HubContext,
    id: RoomId,
    state: Mutex<RoomState>,
    mirror_tx: mpsc::UnboundedSender<MirrorWrite>,
}

struct RoomState {
    info: RoomInfo,
    playback: PlaybackState,
    queue: TrackQueue,
    members: Vec<RoomUserView>,
    votes: SkipVotes,
    chat: VecDeque<ChatMessageView>,
}

/// The fields of a room that real-time commands never mutate
struct RoomInfo {
    name: String,
    password: Option<String>,
    created_by: UserId,
    created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(context: &HubContext, data: RoomData) -> Self {
        let mut playback = PlaybackState::new();

        if let Some(track) = data.current_track {
            playback.start(track);
            playback.is_playing = data.is_playing;
            playback.current_time = data.current_time;
        }

        // The room's mirror writes go through one channel and are applied
        // in submission order, so a later write can never land before an
        // earlier one. The task exits when the room is dropped.
        let (mirror_tx, mut mirror_rx) = mpsc::unbounded_channel::<MirrorWrite>();

        tokio::spawn(async move {
            while let Some(write) = mirror_rx.recv().await {
                write.await;
            }
        });

        Self {
            context: context.clone(),
            id: data.id,
            state: Mutex::new(RoomState {
                info: RoomInfo {
                    name: data.name,
                    password: data.password,
                    created_by: data.created_by,
                    created_at: data.created_at,
                },
                playback,
                queue: TrackQueue::new(),
                members: Vec::new(),
                votes: SkipVotes::new(),
                chat: VecDeque::new(),
            }),
            mirror_tx,
        }
    }

    /// Schedules a storage write mirroring an in-memory mutation. The
    /// in-memory state stays authoritative for what gets broadcast, so a
    /// failing mirror is only logged.
    fn mirror<T, F>(&self, what: &'static str, future: F)
    where
        F: Future<Output = crate::db::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let write: MirrorWrite = Box::pin(async move {
            if let Err(err) = future.await {
                warn!("Failed to mirror {what} to storage: {err}");
            }
        });

        let _ = self.mirror_tx.send(write);
    }

    pub fn id(&self) -> RoomId {
        self.id.clone()
    }

    /// The room as a serializable row, composed from the current state.
    pub fn data(&self) -> RoomData {
        self.state.lock().room_data(&self.id)
    }

    pub fn member_count(&self) -> usize {
        self.state.lock().members.len()
    }

    pub fn has_password(&self) -> bool {
        self.state.lock().info.password.is_some()
    }

    /// Compares the supplied password against the room's secret.
    /// Rooms without a password accept anything.
    pub fn authorize(&self, supplied: Option<&str>) -> Result<(), RoomError> {
        let matches = match &self.state.lock().info.password {
            Some(password) => supplied == Some(password.as_str()),
            None => true,
        };

        if matches {
            Ok(())
        } else {
            Err(RoomError::IncorrectPassword)
        }
    }

    /// Adds a member and binds their connection, sending the full room
    /// snapshot to the joining connection only, then notifying the rest
    /// of the room. Joining twice replaces the previous membership row.
    pub fn join(&self, connection_id: ConnectionId, user_id: UserId, user: Option<UserData>) {
        let mut state = self.state.lock();

        // Bind under the room lock so no broadcast can reach the new
        // connection before its snapshot.
        self.context
            .connections
            .bind(connection_id, user_id.clone(), self.id.clone());

        let now = Utc::now();
        let row = RoomUser {
            id: random_string(12),
            room_id: self.id.clone(),
            user_id: user_id.clone(),
            joined_at: now,
            is_typing: false,
            last_activity: now,
        };

        state.members.retain(|m| m.member.user_id != user_id);
        state.members.push(RoomUserView {
            member: row.clone(),
            user,
        });

        let snapshot = state.snapshot(&self.id);

        self.context
            .dispatcher
            .send(connection_id, ServerEvent::RoomState(snapshot));
        self.context.dispatcher.broadcast_to_room(
            &self.id,
            ServerEvent::UserJoined {
                user_id: user_id.clone(),
            },
            Some(&user_id),
        );
        self.context.dispatcher.broadcast_to_room(
            &self.id,
            ServerEvent::RoomUsersUpdated(state.members.clone()),
            None,
        );

        drop(state);

        let storage = self.context.storage.clone();
        self.mirror("room membership", async move { storage.add_user_to_room(row).await });
    }

    /// Removes a member and notifies the remaining room. Idempotent:
    /// leaving twice, or leaving without having joined, is a no-op and
    /// produces no broadcasts.
    pub fn leave(&self, user_id: &UserId) -> bool {
        let mut state = self.state.lock();

        let before = state.members.len();
        state.members.retain(|m| &m.member.user_id != user_id);

        if state.members.len() == before {
            return false;
        }

        self.context.dispatcher.broadcast_to_room(
            &self.id,
            ServerEvent::UserLeft {
                user_id: user_id.clone(),
            },
            Some(user_id),
        );
        self.context.dispatcher.broadcast_to_room(
            &self.id,
            ServerEvent::RoomUsersUpdated(state.members.clone()),
            None,
        );

        drop(state);

        let storage = self.context.storage.clone();
        let room_id = self.id.clone();
        let user_id = user_id.clone();
        self.mirror("room membership removal", async move {
            storage.remove_user_from_room(&room_id, &user_id).await
        });

        true
    }

    /// Appends a track to the queue and broadcasts the new ordered list.
    /// If nothing is playing, the track starts immediately.
    pub fn enqueue(&self, track: Track) {
        let mut state = self.state.lock();

        let item = state.queue.push(QueueItem {
            track,
            room_id: self.id.clone(),
            position: 0,
            added_at: Utc::now(),
        });

        self.context.dispatcher.broadcast_to_room(
            &self.id,
            ServerEvent::QueueUpdated(state.queue.items()),
            None,
        );

        let storage = self.context.storage.clone();
        self.mirror("queue item", async move { storage.add_to_queue(item).await });

        if state.playback.is_idle() {
            self.advance(&mut state);
        }
    }

    /// Records a skip vote against the current track and advances when
    /// quorum is reached. A vote while nothing plays is a no-op.
    pub fn vote_skip(&self, user_id: &UserId) {
        let mut state = self.state.lock();

        let Some(current) = state.playback.current.clone() else {
            return;
        };

        let votes = state.votes.cast(&current.id, user_id);
        let required = quorum(state.members.len());

        self.context.dispatcher.broadcast_to_room(
            &self.id,
            ServerEvent::SkipVotesUpdated { votes, required },
            None,
        );

        let storage = self.context.storage.clone();
        let vote = SkipVote {
            id: random_string(12),
            room_id: self.id.clone(),
            user_id: user_id.clone(),
            song_id: current.id.clone(),
            voted_at: Utc::now(),
        };
        self.mirror("skip vote", async move { storage.add_skip_vote(vote).await });

        if state.votes.reached(&current.id, state.members.len()) {
            self.advance(&mut state);
        }
    }

    /// Flips between playing and paused. No-op while idle, keeping the
    /// invariant that an empty slot is never marked as playing.
    pub fn play_pause(&self) {
        let mut state = self.state.lock();

        let Some(is_playing) = state.playback.toggle() else {
            return;
        };

        self.context.dispatcher.broadcast_to_room(
            &self.id,
            ServerEvent::PlaybackStateChanged {
                is_playing,
                current_time: state.playback.current_time,
            },
            None,
        );

        let storage = self.context.storage.clone();
        let update = RoomUpdate {
            id: self.id.clone(),
            is_playing: Some(is_playing),
            ..Default::default()
        };
        self.mirror("playback state", async move { storage.update_room(update).await });
    }

    /// Applies a seek without clamping to the track duration. The client
    /// reaching end-of-track reports completion separately.
    pub fn seek(&self, time: f64) {
        let mut state = self.state.lock();

        if !state.playback.seek(time) {
            return;
        }

        let current_time = state.playback.current_time;

        self.context.dispatcher.broadcast_to_room(
            &self.id,
            ServerEvent::SeekUpdated { current_time },
            None,
        );

        let storage = self.context.storage.clone();
        let update = RoomUpdate {
            id: self.id.clone(),
            current_time: Some(current_time),
            ..Default::default()
        };
        self.mirror("seek position", async move { storage.update_room(update).await });
    }

    /// Appends a chat message to the room's tail and fans it out.
    pub fn chat(&self, user_id: &UserId, text: String) {
        let mut state = self.state.lock();

        let user = state
            .members
            .iter()
            .find(|m| &m.member.user_id == user_id)
            .and_then(|m| m.user.clone());

        let row = ChatMessage {
            id: random_string(12),
            room_id: self.id.clone(),
            user_id: user_id.clone(),
            message: text,
            sent_at: Utc::now(),
        };

        let view = ChatMessageView {
            message: row.clone(),
            user,
        };

        state.chat.push_back(view.clone());
        if state.chat.len() > CHAT_TAIL_LENGTH {
            state.chat.pop_front();
        }

        self.context
            .dispatcher
            .broadcast_to_room(&self.id, ServerEvent::ChatMessage(view), None);

        drop(state);

        let storage = self.context.storage.clone();
        self.mirror("chat message", async move { storage.add_chat_message(row).await });
    }

    /// Updates a member's typing flag and notifies everyone else.
    pub fn typing(&self, user_id: &UserId, is_typing: bool) {
        let mut state = self.state.lock();

        let Some(member) = state
            .members
            .iter_mut()
            .find(|m| &m.member.user_id == user_id)
        else {
            return;
        };

        member.member.is_typing = is_typing;
        member.member.last_activity = Utc::now();
        let username = member.user.as_ref().map(|u| u.username.clone());

        self.context.dispatcher.broadcast_to_room(
            &self.id,
            ServerEvent::UserTyping {
                user_id: user_id.clone(),
                is_typing,
                username,
            },
            Some(user_id),
        );

        drop(state);

        let storage = self.context.storage.clone();
        let room_id = self.id.clone();
        let user_id = user_id.clone();
        self.mirror("typing flag", async move {
            storage.update_user_typing(&room_id, &user_id, is_typing).await
        });
    }

    /// Handles a client's end-of-track report. Ignored when the reported
    /// song is no longer current, so a stale report after a skip cannot
    /// advance the queue twice.
    pub fn track_ended(&self, song_id: &SongId) {
        let mut state = self.state.lock();

        let is_current = state
            .playback
            .current
            .as_ref()
            .map(|t| &t.id == song_id)
            .unwrap_or(false);

        if is_current {
            self.advance(&mut state);
        }
    }

    /// Moves the "now playing" slot to the next queued track, or to idle
    /// when the queue is empty. Clears the skip votes of both the
    /// previous and the new track, so the vote set of a track is always
    /// empty the moment it stops (or starts) being current.
    fn advance(&self, state: &mut RoomState) {
        if let Some(previous) = state.playback.current.clone() {
            state.votes.clear(&previous.id);

            let storage = self.context.storage.clone();
            let room_id = self.id.clone();
            self.mirror("skip vote clear", async move {
                storage.clear_skip_votes(&room_id, &previous.id).await
            });
        }

        match state.queue.pop_front() {
            Some(next) => {
                state.votes.clear(&next.track.id);
                state.playback.start(next.track.clone());

                self.context.dispatcher.broadcast_to_room(
                    &self.id,
                    ServerEvent::SongChanged {
                        current_song: Some(next.track.clone()),
                        queue: state.queue.items(),
                    },
                    None,
                );

                let storage = self.context.storage.clone();
                let item_id = next.track.id.clone();
                self.mirror("queue item removal", async move {
                    storage.remove_from_queue(&item_id).await
                });

                let storage = self.context.storage.clone();
                let update = RoomUpdate {
                    id: self.id.clone(),
                    current_track: Some(Some(next.track)),
                    is_playing: Some(true),
                    current_time: Some(0.0),
                };
                self.mirror("current track", async move { storage.update_room(update).await });
            }
            None => {
                state.playback.stop();

                self.context
                    .dispatcher
                    .broadcast_to_room(&self.id, ServerEvent::SongEnded, None);

                let storage = self.context.storage.clone();
                let update = RoomUpdate {
                    id: self.id.clone(),
                    current_track: Some(None),
                    is_playing: Some(false),
                    current_time: Some(0.0),
                };
                self.mirror("current track", async move { storage.update_room(update).await });
            }
        }
    }
}

impl RoomState {
    fn room_data(&self, id: &RoomId) -> RoomData {
        RoomData {
            id: id.clone(),
            name: self.info.name.clone(),
            password: self.info.password.clone(),
            created_by: self.info.created_by.clone(),
            created_at: self.info.created_at,
            current_track: self.playback.current.clone(),
            is_playing: self.playback.is_playing,
            current_time: self.playback.current_time,
        }
    }

    fn snapshot(&self, id: &RoomId) -> RoomSnapshot {
        RoomSnapshot {
            room: self.room_data(id),
            queue: self.queue.items(),
            room_users: self.members.clone(),
            chat_messages: self.chat.iter().cloned().collect(),
        }
    }
}
