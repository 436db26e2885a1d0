use serde::Deserialize;

use jamsync_hub::db::UserId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoomSchema {
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomSchema {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewUserSchema {
    pub username: String,
    pub password: String,
}
