pub mod api;
pub mod appresult;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mail;
pub mod messages;
pub mod otp;
pub mod presence;
pub mod relay;
pub mod translate;
pub mod users;

use std::sync::Arc;

use axum::{extract::FromRef, http::HeaderValue, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub use appresult::{AppError, AppResult};
pub use config::Config;
pub use error::RelayError;

use crate::{
    auth::TokenIssuer,
    db::Database,
    mail::Mailer,
    otp::OtpStore,
    presence::PresenceRegistry,
    relay::Relay,
    translate::{HttpTranslator, Phrasebook, Translator},
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db: Database,
    pub relay: Relay,
    pub otp: OtpStore,
    pub mailer: Option<Mailer>,
    pub tokens: TokenIssuer,
}

impl AppState {
    /// Wires the relay and the HTTP services over one database. Starts the
    /// presence registry task, so it must run inside a tokio runtime.
    pub fn new(config: &Config, db: Database) -> Self {
        let translator: Arc<dyn Translator> = match &config.translate_url {
            Some(url) => {
                info!(%url, "using HTTP translation service");
                Arc::new(HttpTranslator::new(url.clone(), config.translate_api_key.clone()))
            }
            None => {
                info!("using built-in phrasebook translation");
                Arc::new(Phrasebook)
            }
        };
        Self::with_translator(config, db, translator)
    }

    pub fn with_translator(config: &Config, db: Database, translator: Arc<dyn Translator>) -> Self {
        let directory = Arc::new(db.clone());
        let registry = PresenceRegistry::with_directory(directory.clone());
        let relay = Relay::new(
            directory.clone(),
            directory,
            translator,
            registry,
            config.relay_settings(),
        );

        let mailer = config.email.as_ref().and_then(|settings| match Mailer::new(settings) {
            Ok(mailer) => {
                info!(host = %settings.host, port = settings.port, "emailing one-time passwords");
                Some(mailer)
            }
            Err(e) => {
                warn!(error = %e, "email disabled");
                None
            }
        });

        Self {
            db,
            relay,
            otp: OtpStore::new(config.otp_expiry),
            mailer,
            tokens: TokenIssuer::new(config.secret_key.as_bytes()),
        }
    }
}

/// The full application: `/ws` for the relay and `/api` for the JSON endpoints.
pub fn app(state: AppState, config: &Config) -> anyhow::Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.parse::<HeaderValue>()?)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(
        Router::new()
            .merge(relay::router())
            .nest("/api", api::router())
            .with_state(state)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    )
}
