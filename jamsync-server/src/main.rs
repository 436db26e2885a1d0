use std::sync::Arc;

use log::{error, info};

use jamsync_hub::Hub;
use jamsync_impls::{MemoryStore, YtDlpSearch};
use jamsync_server::{logging, run_server};

#[tokio::main]
async fn main() {
    logging::init_logger();

    let storage = Arc::new(MemoryStore::new());
    let search = Arc::new(YtDlpSearch::default());

    let hub = Arc::new(Hub::new(storage, search));

    if let Err(err) = hub.rooms.restore().await {
        error!("Could not restore rooms: {err}");
        return;
    }

    info!("Initialized successfully.");
    run_server(hub).await
}
