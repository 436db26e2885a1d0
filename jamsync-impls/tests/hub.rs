use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::{sleep, timeout};

use jamsync_hub::{
    db::{
        self, ChatMessage, NewRoom, NewUser, QueueItem, RoomData, RoomId, RoomUpdate, RoomUser,
        SkipVote, SongId, Storage, UserData, UserId,
    },
    protocol::{ChatBody, ClientCommand, NewTrack, SeekTo, ServerEvent, TrackEndedBody, TypingBody},
    search::{SearchError, SearchProvider, SearchResult},
    ConnectionId, Hub, RoomError,
};
use jamsync_impls::MemoryStore;

struct StubSearch;

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        if query == "explode" {
            return Err(SearchError::Provider("boom".to_string()));
        }

        Ok(vec![SearchResult {
            id: "abc123".to_string(),
            video_id: "abc123".to_string(),
            title: format!("Result for {query}"),
            duration: 180.0,
            thumbnail: None,
            channel: None,
        }])
    }
}

/// Delegates to [MemoryStore] while recording the order in which write
/// methods land.
struct RecordingStore {
    inner: MemoryStore,
    writes: Mutex<Vec<&'static str>>,
}

impl RecordingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            writes: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, write: &'static str) {
        self.writes.lock().unwrap().push(write);
    }

    fn writes(&self) -> Vec<&'static str> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for RecordingStore {
    async fn user_by_id(&self, user_id: &UserId) -> db::Result<UserData> {
        self.inner.user_by_id(user_id).await
    }

    async fn create_user(&self, new_user: NewUser) -> db::Result<UserData> {
        self.record("create_user");
        self.inner.create_user(new_user).await
    }

    async fn room_by_id(&self, room_id: &RoomId) -> db::Result<RoomData> {
        self.inner.room_by_id(room_id).await
    }

    async fn list_rooms(&self) -> db::Result<Vec<RoomData>> {
        self.inner.list_rooms().await
    }

    async fn create_room(&self, new_room: NewRoom) -> db::Result<RoomData> {
        self.record("create_room");
        self.inner.create_room(new_room).await
    }

    async fn update_room(&self, update: RoomUpdate) -> db::Result<RoomData> {
        self.record("update_room");
        self.inner.update_room(update).await
    }

    async fn queue_by_room(&self, room_id: &RoomId) -> db::Result<Vec<QueueItem>> {
        self.inner.queue_by_room(room_id).await
    }

    async fn add_to_queue(&self, item: QueueItem) -> db::Result<()> {
        self.record("add_to_queue");
        self.inner.add_to_queue(item).await
    }

    async fn remove_from_queue(&self, item_id: &SongId) -> db::Result<()> {
        self.record("remove_from_queue");
        self.inner.remove_from_queue(item_id).await
    }

    async fn room_users(&self, room_id: &RoomId) -> db::Result<Vec<RoomUser>> {
        self.inner.room_users(room_id).await
    }

    async fn add_user_to_room(&self, member: RoomUser) -> db::Result<()> {
        self.record("add_user_to_room");
        self.inner.add_user_to_room(member).await
    }

    async fn remove_user_from_room(&self, room_id: &RoomId, user_id: &UserId) -> db::Result<()> {
        self.record("remove_user_from_room");
        self.inner.remove_user_from_room(room_id, user_id).await
    }

    async fn update_user_typing(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        is_typing: bool,
    ) -> db::Result<()> {
        self.record("update_user_typing");
        self.inner.update_user_typing(room_id, user_id, is_typing).await
    }

    async fn chat_messages(&self, room_id: &RoomId) -> db::Result<Vec<ChatMessage>> {
        self.inner.chat_messages(room_id).await
    }

    async fn add_chat_message(&self, message: ChatMessage) -> db::Result<()> {
        self.record("add_chat_message");
        self.inner.add_chat_message(message).await
    }

    async fn skip_votes(&self, room_id: &RoomId, song_id: &SongId) -> db::Result<Vec<SkipVote>> {
        self.inner.skip_votes(room_id, song_id).await
    }

    async fn add_skip_vote(&self, vote: SkipVote) -> db::Result<()> {
        self.record("add_skip_vote");
        self.inner.add_skip_vote(vote).await
    }

    async fn clear_skip_votes(&self, room_id: &RoomId, song_id: &SongId) -> db::Result<()> {
        self.record("clear_skip_votes");
        self.inner.clear_skip_votes(room_id, song_id).await
    }
}

struct Member {
    connection_id: ConnectionId,
    events: UnboundedReceiver<ServerEvent>,
}

impl Member {
    /// Collects everything delivered so far.
    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    async fn next(&mut self) -> ServerEvent {
        timeout(Duration::from_secs(1), self.events.recv())
            .await
            .expect("event arrives in time")
            .expect("channel is open")
    }
}

async fn hub_with_room() -> (Arc<Hub>, String) {
    let hub = Arc::new(Hub::new(
        Arc::new(MemoryStore::new()),
        Arc::new(StubSearch),
    ));

    let room = hub
        .rooms
        .create_room(NewRoom {
            name: "listening party".to_string(),
            password: None,
            created_by: "creator".to_string(),
        })
        .await
        .unwrap();

    (hub, room.id())
}

async fn join(hub: &Hub, room_id: &str, user_id: &str) -> Member {
    let (sender, events) = unbounded_channel();
    let connection_id = hub.register_connection(sender);

    hub.execute(
        connection_id,
        ClientCommand::Join {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
        },
    )
    .await;

    Member {
        connection_id,
        events,
    }
}

fn new_track(title: &str) -> NewTrack {
    NewTrack {
        video_id: format!("video-{title}"),
        title: title.to_string(),
        duration: 180.0,
        thumbnail: None,
        channel: None,
    }
}

async fn add_track(hub: &Hub, member: &Member, title: &str) {
    hub.execute(
        member.connection_id,
        ClientCommand::AddToQueue {
            data: new_track(title),
        },
    )
    .await;
}

#[tokio::test]
async fn joining_receives_exactly_one_snapshot() {
    let (hub, room_id) = hub_with_room().await;

    let mut alex = join(&hub, &room_id, "alex").await;
    let mut blake = join(&hub, &room_id, "blake").await;

    let alex_events = alex.drain();
    assert!(matches!(alex_events[0], ServerEvent::RoomState(_)));
    assert_eq!(
        alex_events
            .iter()
            .filter(|e| matches!(e, ServerEvent::RoomState(_)))
            .count(),
        1
    );
    assert!(alex_events
        .iter()
        .any(|e| matches!(e, ServerEvent::UserJoined { user_id } if user_id == "blake")));

    let blake_events = blake.drain();
    let snapshots = blake_events
        .iter()
        .filter(|e| matches!(e, ServerEvent::RoomState(_)))
        .count();
    assert_eq!(snapshots, 1);

    // The second joiner's snapshot reflects the state at the moment of
    // join: both members, nothing playing, empty queue.
    let ServerEvent::RoomState(snapshot) = &blake_events[0] else {
        panic!("first event is the snapshot");
    };
    assert_eq!(snapshot.room_users.len(), 2);
    assert!(snapshot.room.current_track.is_none());
    assert!(snapshot.queue.is_empty());

    // The joiner never sees their own user_joined
    assert!(!blake_events
        .iter()
        .any(|e| matches!(e, ServerEvent::UserJoined { user_id } if user_id == "blake")));
}

#[tokio::test]
async fn joining_an_unknown_room_errors_the_requester_only() {
    let (hub, room_id) = hub_with_room().await;

    let mut alex = join(&hub, &room_id, "alex").await;
    alex.drain();

    let (sender, mut events) = unbounded_channel();
    let connection_id = hub.register_connection(sender);
    hub.execute(
        connection_id,
        ClientCommand::Join {
            room_id: "nowhere".to_string(),
            user_id: "blake".to_string(),
        },
    )
    .await;

    assert!(matches!(
        events.try_recv().unwrap(),
        ServerEvent::Error(message) if message == "Room not found"
    ));
    assert!(alex.drain().is_empty());
}

#[tokio::test]
async fn first_enqueue_starts_playback() {
    let (hub, room_id) = hub_with_room().await;

    let mut alex = join(&hub, &room_id, "alex").await;
    alex.drain();

    add_track(&hub, &alex, "T1").await;

    let events = alex.drain();
    assert_eq!(events.len(), 2);

    let ServerEvent::QueueUpdated(queue) = &events[0] else {
        panic!("queue update comes first");
    };
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].position, 0);
    assert_eq!(queue[0].track.title, "T1");

    let ServerEvent::SongChanged {
        current_song,
        queue,
    } = &events[1]
    else {
        panic!("song change follows immediately");
    };
    assert_eq!(current_song.as_ref().unwrap().title, "T1");
    assert!(queue.is_empty());

    let room = hub.rooms.room_by_id(&room_id).unwrap();
    let data = room.data();
    assert!(data.is_playing);
    assert_eq!(data.current_time, 0.0);
}

#[tokio::test]
async fn skip_quorum_advances_the_track() {
    let (hub, room_id) = hub_with_room().await;

    let mut members = Vec::new();
    for name in ["a", "b", "c", "d"] {
        members.push(join(&hub, &room_id, name).await);
    }

    add_track(&hub, &members[0], "T1").await;
    add_track(&hub, &members[0], "T2").await;
    for member in members.iter_mut() {
        member.drain();
    }

    // First vote: 1 of 2 required, no transition
    hub.execute(members[0].connection_id, ClientCommand::VoteSkip)
        .await;
    let events = members[1].drain();
    assert!(matches!(
        events[0],
        ServerEvent::SkipVotesUpdated { votes: 1, required: 2 }
    ));
    assert_eq!(events.len(), 1);

    // A repeat vote from the same member never counts twice
    hub.execute(members[0].connection_id, ClientCommand::VoteSkip)
        .await;
    assert!(matches!(
        members[1].drain()[0],
        ServerEvent::SkipVotesUpdated { votes: 1, required: 2 }
    ));

    // Second distinct vote reaches quorum and the skip follows
    hub.execute(members[1].connection_id, ClientCommand::VoteSkip)
        .await;
    let events = members[2].drain();
    assert!(matches!(
        events[0],
        ServerEvent::SkipVotesUpdated { votes: 2, required: 2 }
    ));
    assert!(matches!(
        &events[1],
        ServerEvent::SongChanged { current_song: Some(track), .. } if track.title == "T2"
    ));
}

#[tokio::test]
async fn votes_are_cleared_on_every_track_change() {
    let (hub, room_id) = hub_with_room().await;

    let mut members = Vec::new();
    for name in ["a", "b", "c"] {
        members.push(join(&hub, &room_id, name).await);
    }

    add_track(&hub, &members[0], "T1").await;
    add_track(&hub, &members[0], "T2").await;
    for member in members.iter_mut() {
        member.drain();
    }

    hub.execute(members[0].connection_id, ClientCommand::VoteSkip)
        .await;

    // Natural end of T1
    let song_id = hub
        .rooms
        .room_by_id(&room_id)
        .unwrap()
        .data()
        .current_track
        .unwrap()
        .id;
    hub.execute(
        members[0].connection_id,
        ClientCommand::TrackEnded {
            data: TrackEndedBody { song_id },
        },
    )
    .await;

    for member in members.iter_mut() {
        member.drain();
    }

    // The vote count for the new track starts from zero
    hub.execute(members[1].connection_id, ClientCommand::VoteSkip)
        .await;
    assert!(matches!(
        members[0].drain()[0],
        ServerEvent::SkipVotesUpdated { votes: 1, required: 2 }
    ));
}

#[tokio::test]
async fn seeks_are_broadcast_unclamped() {
    let (hub, room_id) = hub_with_room().await;

    let mut alex = join(&hub, &room_id, "alex").await;
    add_track(&hub, &alex, "T1").await;
    alex.drain();

    hub.execute(
        alex.connection_id,
        ClientCommand::Seek {
            data: SeekTo { time: 9999.0 },
        },
    )
    .await;

    let events = alex.drain();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        ServerEvent::SeekUpdated { current_time } if current_time == 9999.0
    ));

    // No transition: the same track stays current
    let data = hub.rooms.room_by_id(&room_id).unwrap().data();
    assert_eq!(data.current_track.unwrap().title, "T1");
    assert_eq!(data.current_time, 9999.0);
}

#[tokio::test]
async fn play_pause_flips_without_advancing_time() {
    let (hub, room_id) = hub_with_room().await;

    let mut alex = join(&hub, &room_id, "alex").await;

    // Idle room: toggling is a no-op
    hub.execute(alex.connection_id, ClientCommand::PlayPause).await;
    alex.drain();

    add_track(&hub, &alex, "T1").await;
    alex.drain();

    hub.execute(alex.connection_id, ClientCommand::PlayPause).await;
    let events = alex.drain();
    assert!(matches!(
        events[0],
        ServerEvent::PlaybackStateChanged { is_playing: false, current_time } if current_time == 0.0
    ));

    assert!(!hub.rooms.room_by_id(&room_id).unwrap().data().is_playing);
}

#[tokio::test]
async fn stale_track_ended_reports_are_ignored() {
    let (hub, room_id) = hub_with_room().await;

    let mut alex = join(&hub, &room_id, "alex").await;
    add_track(&hub, &alex, "T1").await;
    add_track(&hub, &alex, "T2").await;
    alex.drain();

    hub.execute(
        alex.connection_id,
        ClientCommand::TrackEnded {
            data: TrackEndedBody {
                song_id: "not-the-current-one".to_string(),
            },
        },
    )
    .await;

    assert!(alex.drain().is_empty());
    assert_eq!(
        hub.rooms
            .room_by_id(&room_id)
            .unwrap()
            .data()
            .current_track
            .unwrap()
            .title,
        "T1"
    );
}

#[tokio::test]
async fn queue_runs_dry_into_idle() {
    let (hub, room_id) = hub_with_room().await;

    let mut alex = join(&hub, &room_id, "alex").await;
    add_track(&hub, &alex, "T1").await;
    alex.drain();

    let song_id = hub
        .rooms
        .room_by_id(&room_id)
        .unwrap()
        .data()
        .current_track
        .unwrap()
        .id;
    hub.execute(
        alex.connection_id,
        ClientCommand::TrackEnded {
            data: TrackEndedBody { song_id },
        },
    )
    .await;

    let events = alex.drain();
    assert!(matches!(events[0], ServerEvent::SongEnded));

    let data = hub.rooms.room_by_id(&room_id).unwrap().data();
    assert!(data.current_track.is_none());
    assert!(!data.is_playing);
    assert_eq!(data.current_time, 0.0);
}

#[tokio::test]
async fn leaving_is_idempotent() {
    let (hub, room_id) = hub_with_room().await;

    let alex = join(&hub, &room_id, "alex").await;
    let mut blake = join(&hub, &room_id, "blake").await;
    blake.drain();

    hub.execute(alex.connection_id, ClientCommand::Leave).await;

    let events = blake.drain();
    assert!(matches!(
        events[0],
        ServerEvent::UserLeft { ref user_id } if user_id == "alex"
    ));
    assert!(matches!(events[1], ServerEvent::RoomUsersUpdated(ref m) if m.len() == 1));

    // Leaving again produces nothing
    hub.execute(alex.connection_id, ClientCommand::Leave).await;
    assert!(blake.drain().is_empty());

    // Disconnecting a connection that never joined is a no-op too
    let (sender, _events) = unbounded_channel();
    let stray = hub.register_connection(sender);
    hub.disconnect(stray);
    assert!(blake.drain().is_empty());
}

#[tokio::test]
async fn disconnect_cleans_up_like_leave() {
    let (hub, room_id) = hub_with_room().await;

    let alex = join(&hub, &room_id, "alex").await;
    let mut blake = join(&hub, &room_id, "blake").await;
    blake.drain();

    hub.disconnect(alex.connection_id);

    let events = blake.drain();
    assert!(matches!(
        events[0],
        ServerEvent::UserLeft { ref user_id } if user_id == "alex"
    ));

    // Disconnecting twice is harmless
    hub.disconnect(alex.connection_id);
    assert!(blake.drain().is_empty());
}

#[tokio::test]
async fn chat_is_attributed_and_delivered_to_everyone() {
    let (hub, room_id) = hub_with_room().await;

    let sam = hub
        .storage()
        .create_user(NewUser {
            username: "sam".to_string(),
            password: "hunter2".to_string(),
        })
        .await
        .unwrap();

    let mut sender = join(&hub, &room_id, &sam.id).await;
    let mut other = join(&hub, &room_id, "anon").await;
    sender.drain();
    other.drain();

    hub.execute(
        sender.connection_id,
        ClientCommand::ChatMessage {
            data: ChatBody {
                message: "tune!".to_string(),
            },
        },
    )
    .await;

    for member in [&mut sender, &mut other] {
        let events = member.drain();
        let ServerEvent::ChatMessage(view) = &events[0] else {
            panic!("chat message is delivered");
        };
        assert_eq!(view.message.message, "tune!");
        assert_eq!(view.user.as_ref().unwrap().username, "sam");
    }
}

#[tokio::test]
async fn typing_excludes_the_typist() {
    let (hub, room_id) = hub_with_room().await;

    let mut typist = join(&hub, &room_id, "alex").await;
    let mut other = join(&hub, &room_id, "blake").await;
    typist.drain();
    other.drain();

    hub.execute(
        typist.connection_id,
        ClientCommand::Typing {
            data: TypingBody { is_typing: true },
        },
    )
    .await;

    assert!(typist.drain().is_empty());
    assert!(matches!(
        other.drain()[0],
        ServerEvent::UserTyping { ref user_id, is_typing: true, .. } if user_id == "alex"
    ));
}

#[tokio::test]
async fn search_is_wrapped_in_a_loading_envelope() {
    let (hub, room_id) = hub_with_room().await;

    let mut alex = join(&hub, &room_id, "alex").await;
    alex.drain();

    hub.execute(
        alex.connection_id,
        ClientCommand::Search {
            data: jamsync_hub::protocol::SearchQuery {
                query: "synthwave".to_string(),
            },
        },
    )
    .await;

    assert!(matches!(alex.next().await, ServerEvent::SearchLoading(true)));
    assert!(matches!(
        alex.next().await,
        ServerEvent::SearchResults(results) if results.len() == 1
    ));
    assert!(matches!(alex.next().await, ServerEvent::SearchLoading(false)));
}

#[tokio::test]
async fn a_failed_search_still_clears_the_loading_flag() {
    let (hub, room_id) = hub_with_room().await;

    let mut alex = join(&hub, &room_id, "alex").await;
    alex.drain();

    hub.execute(
        alex.connection_id,
        ClientCommand::Search {
            data: jamsync_hub::protocol::SearchQuery {
                query: "explode".to_string(),
            },
        },
    )
    .await;

    assert!(matches!(alex.next().await, ServerEvent::SearchLoading(true)));
    assert!(matches!(alex.next().await, ServerEvent::SearchError(_)));
    assert!(matches!(alex.next().await, ServerEvent::SearchLoading(false)));
}

#[tokio::test]
async fn rooms_are_independent() {
    let (hub, room_a) = hub_with_room().await;
    let room_b = hub
        .rooms
        .create_room(NewRoom {
            name: "other".to_string(),
            password: None,
            created_by: "creator".to_string(),
        })
        .await
        .unwrap()
        .id();

    let mut in_a = join(&hub, &room_a, "alex").await;
    let mut in_b = join(&hub, &room_b, "blake").await;
    in_a.drain();
    in_b.drain();

    add_track(&hub, &in_a, "T1").await;

    assert!(!in_a.drain().is_empty());
    assert!(in_b.drain().is_empty());
}

#[tokio::test]
async fn storage_mirrors_land_in_command_order() {
    let store = Arc::new(RecordingStore::new());
    let hub = Arc::new(Hub::new(store.clone(), Arc::new(StubSearch)));

    let room_id = hub
        .rooms
        .create_room(NewRoom {
            name: "listening party".to_string(),
            password: None,
            created_by: "creator".to_string(),
        })
        .await
        .unwrap()
        .id();

    let alex = join(&hub, &room_id, "alex").await;

    // Auto-start consumes the freshly added item right away, so the
    // enqueue write and the dequeue write race unless they are ordered.
    add_track(&hub, &alex, "T1").await;

    for _ in 0..100 {
        if store.writes().contains(&"remove_from_queue") {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }

    let writes = store.writes();
    let added = writes.iter().position(|w| *w == "add_to_queue");
    let removed = writes.iter().position(|w| *w == "remove_from_queue");
    assert!(added.expect("queue item added") < removed.expect("queue item removed"));

    // No phantom row survives the consumption
    assert!(store.queue_by_room(&room_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn join_snapshot_keeps_only_the_chat_tail() {
    let (hub, room_id) = hub_with_room().await;

    let alex = join(&hub, &room_id, "alex").await;

    for n in 0..105 {
        hub.execute(
            alex.connection_id,
            ClientCommand::ChatMessage {
                data: ChatBody {
                    message: format!("msg {n}"),
                },
            },
        )
        .await;
    }

    let mut blake = join(&hub, &room_id, "blake").await;

    let events = blake.drain();
    let ServerEvent::RoomState(snapshot) = &events[0] else {
        panic!("first event is the snapshot");
    };

    assert_eq!(snapshot.chat_messages.len(), 100);
    assert_eq!(snapshot.chat_messages[0].message.message, "msg 5");
    assert_eq!(snapshot.chat_messages[99].message.message, "msg 104");
}

#[tokio::test]
async fn rebinding_to_another_room_leaves_the_first() {
    let (hub, room_a) = hub_with_room().await;
    let room_b = hub
        .rooms
        .create_room(NewRoom {
            name: "other".to_string(),
            password: None,
            created_by: "creator".to_string(),
        })
        .await
        .unwrap()
        .id();

    let mut mover = join(&hub, &room_a, "alex").await;
    let mut stayer = join(&hub, &room_a, "blake").await;
    mover.drain();
    stayer.drain();

    // The same connection joins the other room
    hub.execute(
        mover.connection_id,
        ClientCommand::Join {
            room_id: room_b.clone(),
            user_id: "alex".to_string(),
        },
    )
    .await;

    let events = stayer.drain();
    assert!(matches!(
        events[0],
        ServerEvent::UserLeft { ref user_id } if user_id == "alex"
    ));
    assert!(matches!(events[1], ServerEvent::RoomUsersUpdated(ref m) if m.len() == 1));

    // The mover gets exactly one snapshot, and it is the new room's
    let events = mover.drain();
    let snapshots: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::RoomState(snapshot) => Some(snapshot),
            _ => None,
        })
        .collect();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].room.id, room_b);

    assert_eq!(hub.rooms.room_by_id(&room_a).unwrap().member_count(), 1);
    assert_eq!(hub.rooms.room_by_id(&room_b).unwrap().member_count(), 1);
}

#[tokio::test]
async fn the_password_gate_rejects_wrong_secrets() {
    let (hub, open_id) = hub_with_room().await;

    let locked = hub
        .rooms
        .create_room(NewRoom {
            name: "private party".to_string(),
            password: Some("sesame".to_string()),
            created_by: "creator".to_string(),
        })
        .await
        .unwrap();

    assert!(locked.authorize(Some("sesame")).is_ok());
    assert!(matches!(
        locked.authorize(Some("wrong")),
        Err(RoomError::IncorrectPassword)
    ));
    assert!(matches!(
        locked.authorize(None),
        Err(RoomError::IncorrectPassword)
    ));

    // Rooms without a password accept anything
    let open = hub.rooms.room_by_id(&open_id).unwrap();
    assert!(open.authorize(None).is_ok());
    assert!(open.authorize(Some("whatever")).is_ok());
}
