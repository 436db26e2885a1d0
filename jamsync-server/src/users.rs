use axum::{extract::State, routing::post, Json, Router};

use jamsync_hub::db::{NewUser, UserData};

use crate::{context::ServerContext, errors::ServerResult, schemas::NewUserSchema};

async fn create_user(
    State(context): State<ServerContext>,
    Json(body): Json<NewUserSchema>,
) -> ServerResult<Json<UserData>> {
    let user = context
        .hub
        .storage()
        .create_user(NewUser {
            username: body.username,
            password: body.password,
        })
        .await?;

    Ok(Json(user))
}

pub fn router() -> Router<ServerContext> {
    Router::new().route("/", post(create_user))
}
