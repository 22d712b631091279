use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    auth::TokenIssuer,
    db::Database,
    mail::Mailer,
    otp::OtpStore,
    users::{NewUser, UserDirectory},
    AppError, AppResult, AppState,
};

use super::non_blank;

#[derive(Deserialize)]
pub(crate) struct PhoneRequest {
    phone: Option<String>,
    email: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn check_phone(
    State(db): State<Database>,
    Json(PhoneRequest { phone, .. }): Json<PhoneRequest>,
) -> AppResult<Json<Value>> {
    let Some(phone) = non_blank(phone) else {
        return Err(AppError::bad_request("Phone number required"));
    };

    Ok(Json(match db.find_by_phone(&phone).await? {
        Some(user) => json!({
            "registered": true,
            "email": user.email,
            "username": user.username,
        }),
        None => json!({ "registered": false }),
    }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn request_otp(
    State(db): State<Database>,
    State(otp): State<OtpStore>,
    State(mailer): State<Option<Mailer>>,
    Json(PhoneRequest { phone, email }): Json<PhoneRequest>,
) -> AppResult<Json<Value>> {
    let Some(phone) = non_blank(phone) else {
        return Err(AppError::bad_request("Phone number required"));
    };

    let email = match non_blank(email) {
        Some(email) => Some(email),
        None => db.find_by_phone(&phone).await?.and_then(|user| user.email),
    };

    let code = otp.generate(&phone);

    let Some(email) = email else {
        info!(%phone, %code, "one-time password issued, no email known");
        return Ok(Json(json!({ "message": "OTP printed to console (no email provided)" })));
    };

    match &mailer {
        Some(mailer) => match mailer.send_otp(&email, &code, otp.ttl()).await {
            Ok(()) => info!(%phone, %email, "one-time password emailed"),
            Err(e) => warn!(%phone, %email, %code, error = %e, "failed to email one-time password"),
        },
        None => info!(%phone, %email, %code, "email not configured, one-time password logged"),
    }

    Ok(Json(json!({ "message": format!("OTP sent to {email} successfully") })))
}

#[derive(Deserialize)]
pub(crate) struct VerifyRequest {
    phone: Option<String>,
    otp: Option<String>,
    username: Option<String>,
    language: Option<String>,
    email: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn verify_otp(
    State(db): State<Database>,
    State(otp): State<OtpStore>,
    State(tokens): State<TokenIssuer>,
    Json(request): Json<VerifyRequest>,
) -> AppResult<Json<Value>> {
    let (Some(phone), Some(code)) = (non_blank(request.phone), non_blank(request.otp)) else {
        return Err(AppError::bad_request("Invalid or expired OTP"));
    };
    if !otp.verify(&phone, &code) {
        return Err(AppError::bad_request("Invalid or expired OTP"));
    }

    let user = match db.find_by_phone(&phone).await? {
        Some(user) => user,
        None => {
            let (Some(username), Some(language), Some(email)) =
                (non_blank(request.username), non_blank(request.language), non_blank(request.email))
            else {
                return Err(AppError::bad_request("Username, language, and email are required for new users"));
            };

            let user = db.register(NewUser {
                username,
                language,
                phone: Some(phone),
                email: Some(email),
            }).await?;
            info!(username = %user.username, "user registered by phone");
            user
        }
    };

    let token = tokens.issue(&user)?;

    Ok(Json(json!({
        "message": "Phone verified successfully",
        "token": token,
        "user": {
            "username": user.username,
            "language": user.language,
        },
    })))
}
