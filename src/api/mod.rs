//! JSON endpoints around the relay: registration, user lookup, history and
//! phone verification.

mod history;
mod users;
mod verification;

use axum::{
    debug_handler,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::{translate, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/test", get(test))
        .route("/languages", get(languages))

        .route("/register", post(users::register))
        .route("/users", get(users::list))
        .route("/user/{username}", get(users::user))
        .route("/messages", get(history::history))

        .route("/check-phone", post(verification::check_phone))
        .route("/request-otp", post(verification::request_otp))
        .route("/verify-otp", post(verification::verify_otp))
}

#[debug_handler]
async fn test() -> Json<Value> {
    Json(json!({ "message": "SoulTalk API is running!" }))
}

#[debug_handler]
async fn languages() -> Json<Value> {
    Json(json!({ "languages": translate::languages() }))
}

/// `Some` only for a value with non-whitespace content, trimmed.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
