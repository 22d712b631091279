use axum::{
    debug_handler,
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{db::Database, messages::MessageStore, AppError, AppResult, AppState};

use super::non_blank;

#[derive(Deserialize)]
pub(crate) struct HistoryQuery {
    user1: Option<String>,
    user2: Option<String>,
}

/// Messages between two users, oldest first.
#[debug_handler(state = AppState)]
pub(crate) async fn history(
    State(db): State<Database>,
    Query(HistoryQuery { user1, user2 }): Query<HistoryQuery>,
) -> AppResult<Json<Value>> {
    let (Some(user1), Some(user2)) = (non_blank(user1), non_blank(user2)) else {
        return Err(AppError::bad_request("user1 and user2 are required"));
    };

    let messages = db.query_between(&user1, &user2).await?;
    Ok(Json(json!({ "messages": messages })))
}
