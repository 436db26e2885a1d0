use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};

use jamsync_hub::db::{NewRoom, RoomData, RoomId};

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{JoinRoomSchema, NewRoomSchema},
};

/// A room row as listed by the REST surface
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomOverview {
    #[serde(flatten)]
    room: RoomData,
    user_count: usize,
    has_password: bool,
}

async fn list_rooms(State(context): State<ServerContext>) -> Json<Vec<RoomOverview>> {
    let rooms: Vec<_> = context
        .hub
        .rooms
        .list_all()
        .into_iter()
        .map(|room| RoomOverview {
            user_count: room.member_count(),
            has_password: room.has_password(),
            room: room.data(),
        })
        .collect();

    Json(rooms)
}

async fn create_room(
    State(context): State<ServerContext>,
    Json(body): Json<NewRoomSchema>,
) -> ServerResult<Json<RoomData>> {
    let room = context
        .hub
        .rooms
        .create_room(NewRoom {
            name: body.name,
            password: body.password,
            created_by: body.user_id,
        })
        .await?;

    Ok(Json(room.data()))
}

/// The password gate only. The real-time session is established
/// separately over the gateway.
async fn join_room(
    State(context): State<ServerContext>,
    Path(room_id): Path<RoomId>,
    Json(body): Json<JoinRoomSchema>,
) -> ServerResult<Json<Value>> {
    let room = context.hub.rooms.room_by_id(&room_id)?;
    room.authorize(body.password.as_deref())?;

    Ok(Json(json!({ "success": true })))
}

pub fn router() -> Router<ServerContext> {
    Router::new()
        .route("/", get(list_rooms).post(create_room))
        .route("/:id/join", post(join_room))
}
