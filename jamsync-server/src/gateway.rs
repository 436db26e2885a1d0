use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use log::debug;
use tokio::sync::mpsc::unbounded_channel;

use jamsync_hub::protocol::{ClientCommand, ServerEvent};

use crate::context::ServerContext;

pub async fn ws_handler(
    State(context): State<ServerContext>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, context))
}

/// Owns one gateway connection: forwards the hub's outbound events to
/// the socket, and decodes inbound frames into commands. A frame that
/// doesn't decode gets an error event, the connection stays open.
async fn handle_socket(socket: WebSocket, context: ServerContext) {
    let (mut outgoing, mut incoming) = socket.split();
    let (sender, mut receiver) = unbounded_channel::<ServerEvent>();

    let connection_id = context.hub.register_connection(sender);
    debug!("Connection {connection_id} opened");

    let forward = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(err) => {
                    debug!("Could not serialize event: {err}");
                    continue;
                }
            };

            if outgoing.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = incoming.next().await {
        let Ok(message) = message else {
            break;
        };

        match message {
            Message::Text(frame) => match serde_json::from_str::<ClientCommand>(&frame) {
                Ok(command) => context.hub.execute(connection_id, command).await,
                Err(err) => {
                    debug!("Rejected frame on connection {connection_id}: {err}");
                    context.hub.send(
                        connection_id,
                        ServerEvent::Error("Invalid message format".to_string()),
                    );
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    context.hub.disconnect(connection_id);
    forward.abort();
    debug!("Connection {connection_id} closed");
}
