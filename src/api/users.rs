use axum::{
    debug_handler,
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::{
    db::Database,
    users::{NewUser, User, UserDirectory},
    AppError, AppResult, AppState,
};

use super::non_blank;

#[derive(Deserialize)]
pub(crate) struct RegisterRequest {
    username: Option<String>,
    language: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn register(
    State(db): State<Database>,
    Json(RegisterRequest { username, language }): Json<RegisterRequest>,
) -> AppResult<Json<Value>> {
    let (Some(username), Some(language)) = (non_blank(username), non_blank(language)) else {
        return Err(AppError::bad_request("Username and language are required"));
    };

    let user = db.register(NewUser::new(username, language)).await?;
    info!(username = %user.username, language = %user.language, "user registered");

    Ok(Json(json!({
        "message": "User registered successfully",
        "user": {
            "id": user.id,
            "username": user.username,
            "language": user.language,
        },
    })))
}

#[derive(Deserialize)]
pub(crate) struct UsersQuery {
    current_user: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list(
    State(db): State<Database>,
    Query(UsersQuery { current_user }): Query<UsersQuery>,
) -> AppResult<Json<Value>> {
    let users = db.list(current_user.as_deref()).await?;
    Ok(Json(json!({ "users": users })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn user(
    State(db): State<Database>,
    Path(username): Path<String>,
) -> AppResult<Json<User>> {
    db.lookup(&username)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("User not found"))
}
