use std::sync::Arc;

use log::{info, warn};

use crate::{
    connections::ConnectionId,
    db::{RoomId, Track, UserId},
    protocol::{ClientCommand, NewTrack, ServerEvent},
    rooms::Room,
    util::random_string,
    Hub,
};

impl Hub {
    /// Routes a decoded client command to the owning room.
    ///
    /// Commands that need a binding are silently ignored when the
    /// connection never joined a room. Errors are surfaced to the
    /// requesting connection only, never broadcast.
    pub async fn execute(&self, connection_id: ConnectionId, command: ClientCommand) {
        match command {
            ClientCommand::Join { room_id, user_id } => {
                self.join(connection_id, room_id, user_id).await
            }
            ClientCommand::Leave => self.leave(connection_id),
            ClientCommand::Search { data } => self.search(connection_id, data.query),
            ClientCommand::AddToQueue { data } => self.add_to_queue(connection_id, data),
            ClientCommand::VoteSkip => {
                if let Some((room, user_id)) = self.bound_room(connection_id) {
                    room.vote_skip(&user_id);
                }
            }
            ClientCommand::PlayPause => {
                if let Some((room, _)) = self.bound_room(connection_id) {
                    room.play_pause();
                }
            }
            ClientCommand::Seek { data } => {
                if let Some((room, _)) = self.bound_room(connection_id) {
                    room.seek(data.time);
                }
            }
            ClientCommand::ChatMessage { data } => {
                if let Some((room, user_id)) = self.bound_room(connection_id) {
                    room.chat(&user_id, data.message);
                }
            }
            ClientCommand::Typing { data } => {
                if let Some((room, user_id)) = self.bound_room(connection_id) {
                    room.typing(&user_id, data.is_typing);
                }
            }
            ClientCommand::TrackEnded { data } => {
                if let Some((room, _)) = self.bound_room(connection_id) {
                    room.track_ended(&data.song_id);
                }
            }
        }
    }

    /// Handles a closed transport. Safe to run concurrently with an
    /// in-flight command from the same connection, since leaving is
    /// idempotent.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        self.leave(connection_id);
        self.context().connections.unregister(connection_id);
    }

    /// Sends an event to a single connection.
    pub fn send(&self, connection_id: ConnectionId, event: ServerEvent) {
        self.context().dispatcher.send(connection_id, event)
    }

    async fn join(&self, connection_id: ConnectionId, room_id: RoomId, user_id: UserId) {
        let Ok(room) = self.rooms.room_by_id(&room_id) else {
            self.send(connection_id, ServerEvent::Error("Room not found".to_string()));
            return;
        };

        // A rebinding connection implicitly leaves its previous room
        if let Some((previous_user, previous_room)) = self.context().connections.binding(connection_id) {
            if previous_room != room_id {
                if let Ok(previous) = self.rooms.room_by_id(&previous_room) {
                    previous.leave(&previous_user);
                }
            }
        }

        // Resolve the member's profile before taking the room lock
        let user = match self.context().storage.user_by_id(&user_id).await {
            Ok(user) => Some(user),
            Err(err) => {
                warn!("Could not resolve user {user_id}: {err}");
                None
            }
        };

        info!("User {user_id} joined room {room_id}");
        room.join(connection_id, user_id, user);
    }

    fn leave(&self, connection_id: ConnectionId) {
        let Some((user_id, room_id)) = self.context().connections.binding(connection_id) else {
            return;
        };

        if let Ok(room) = self.rooms.room_by_id(&room_id) {
            if room.leave(&user_id) {
                info!("User {user_id} left room {room_id}");
            }
        }

        self.context().connections.unbind(connection_id);
    }

    fn add_to_queue(&self, connection_id: ConnectionId, data: NewTrack) {
        let Some((room, user_id)) = self.bound_room(connection_id) else {
            return;
        };

        room.enqueue(Track {
            id: random_string(12),
            video_id: data.video_id,
            title: data.title,
            duration: data.duration,
            added_by: user_id,
            thumbnail: data.thumbnail,
            channel: data.channel,
        });
    }

    /// Runs a catalog search outside any room lock. The result is simply
    /// dropped if the requester disconnects before it arrives.
    fn search(&self, connection_id: ConnectionId, query: String) {
        let context = self.context().clone();

        context
            .dispatcher
            .send(connection_id, ServerEvent::SearchLoading(true));

        tokio::spawn(async move {
            match context.search.search(&query).await {
                Ok(results) => context
                    .dispatcher
                    .send(connection_id, ServerEvent::SearchResults(results)),
                Err(err) => {
                    warn!("Search for {query:?} failed: {err}");
                    context
                        .dispatcher
                        .send(connection_id, ServerEvent::SearchError("Search failed".to_string()));
                }
            }

            context
                .dispatcher
                .send(connection_id, ServerEvent::SearchLoading(false));
        });
    }

    fn bound_room(&self, connection_id: ConnectionId) -> Option<(Arc<Room>, UserId)> {
        let (user_id, room_id) = self.context().connections.binding(connection_id)?;
        let room = self.rooms.room_by_id(&room_id).ok()?;

        Some((room, user_id))
    }
}
