mod context;
mod errors;
mod gateway;
mod rooms;
mod schemas;
mod users;

pub mod logging;

use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::{routing::get, Router};
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use context::ServerContext;
use jamsync_hub::Hub;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

/// Starts the jamsync server
pub async fn run_server(hub: Arc<Hub>) {
    let port = env::var("JAMSYNC_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_router = Router::new()
        .nest("/rooms", rooms::router())
        .nest("/users", users::router());

    let root_router = Router::new()
        .nest("/api", api_router)
        .route("/ws", get(gateway::ws_handler))
        .layer(cors)
        .with_state(ServerContext { hub });

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {port}");

    axum::serve(listener, root_router.into_make_service())
        .await
        .expect("server runs");
}
