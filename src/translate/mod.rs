//! Translation providers.
//!
//! The relay only depends on [`Translator`]; which implementation backs it is
//! decided at startup from configuration.

mod http;
mod phrasebook;

use async_trait::async_trait;
use serde::Serialize;

pub use http::HttpTranslator;
pub use phrasebook::Phrasebook;

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("no translation of {text:?} from {from} to {to}")]
    Unavailable { text: String, from: String, to: String },

    #[error("translation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("translation service returned {0}")]
    Status(reqwest::StatusCode),
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String, TranslateError>;
}

/// Text delivered in place of a translation the provider could not produce.
pub fn fallback(text: &str) -> String {
    format!("[{text}] (translation not available)")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
    pub flag: &'static str,
}

const LANGUAGES: &[Language] = &[
    Language { code: "en", name: "English", flag: "🇺🇸" },
    Language { code: "sw", name: "Swahili", flag: "🇹🇿" },
    Language { code: "am", name: "Amharic", flag: "🇪🇹" },
    Language { code: "fr", name: "French", flag: "🇫🇷" },
    Language { code: "ar", name: "Arabic", flag: "🇸🇦" },
    Language { code: "es", name: "Spanish", flag: "🇪🇸" },
    Language { code: "pt", name: "Portuguese", flag: "🇵🇹" },
    Language { code: "yo", name: "Yoruba", flag: "🇳🇬" },
    Language { code: "ha", name: "Hausa", flag: "🇳🇬" },
    Language { code: "zu", name: "Zulu", flag: "🇿🇦" },
];

/// Languages a user may declare.
pub fn languages() -> &'static [Language] {
    LANGUAGES
}
