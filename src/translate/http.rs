use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{TranslateError, Translator};

/// Client for a LibreTranslate-compatible `POST /translate` endpoint.
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

impl HttpTranslator {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String, TranslateError> {
        let response = self.client
            .post(&self.url)
            .json(&TranslateRequest {
                q: text,
                source: from,
                target: to,
                format: "text",
                api_key: self.api_key.as_deref(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TranslateError::Status(response.status()));
        }

        let TranslateResponse { translated_text } = response.json().await?;
        Ok(translated_text)
    }
}
