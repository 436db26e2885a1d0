mod connections;
mod fanout;
mod rooms;
mod session;
mod util;

pub mod db;
pub mod protocol;
pub mod search;

use std::sync::Arc;

use dashmap::DashMap;

pub use connections::*;
pub use fanout::*;
pub use rooms::*;
pub use util::{random_string, Id};

use db::{RoomId, Storage};
use search::SearchProvider;

/// The jamsync hub, holding the authoritative state of every room and
/// fanning state deltas out to the live connections in it.
pub struct Hub {
    context: HubContext,
    pub rooms: RoomManager,
}

/// A type passed to the components of the hub, to access state, reach
/// collaborators, and fan out events.
#[derive(Clone)]
pub struct HubContext {
    pub storage: Arc<dyn Storage>,
    pub search: Arc<dyn SearchProvider>,
    pub connections: Arc<ConnectionRegistry>,
    pub dispatcher: BroadcastDispatcher,

    pub rooms: Arc<DashMap<RoomId, Arc<Room>>>,
}

impl Hub {
    pub fn new(storage: Arc<dyn Storage>, search: Arc<dyn SearchProvider>) -> Self {
        let connections = Arc::new(ConnectionRegistry::new());
        let dispatcher = BroadcastDispatcher::new(connections.clone());

        let context = HubContext {
            storage,
            search,
            connections,
            dispatcher,

            rooms: Default::default(),
        };

        let rooms = RoomManager::new(&context);

        Self { context, rooms }
    }

    pub fn context(&self) -> &HubContext {
        &self.context
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        self.context.storage.clone()
    }

    /// Registers a new gateway connection with its outbound channel.
    pub fn register_connection(&self, sender: EventSender) -> ConnectionId {
        self.context.connections.register(sender)
    }
}
