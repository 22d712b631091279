use tracing::{debug, info, warn};

use crate::{
    messages::{Message, NewMessage},
    translate, RelayError,
};

use super::{Relay, ServerEvent};

/// Resolves both users, translates, stores, then delivers to the receiver's
/// channel and echoes to the sender's. Nothing is delivered unless the message
/// was stored.
pub(crate) async fn send_msg(relay: &Relay, from: &str, to: &str, text: &str) -> Result<Message, RelayError> {
    if to.trim().is_empty() {
        return Err(RelayError::validation("receiver is required"));
    }
    if text.trim().is_empty() {
        return Err(RelayError::validation("message is required"));
    }

    let sender = relay.users
        .lookup(from)
        .await?
        .ok_or_else(|| RelayError::UserNotFound(from.to_owned()))?;
    let receiver = relay.users
        .lookup(to)
        .await?
        .ok_or_else(|| RelayError::UserNotFound(to.to_owned()))?;

    let translated_text = translate_or_fallback(relay, text, &sender.language, &receiver.language).await;

    let message = persist(relay, NewMessage {
        from: sender.username,
        to: receiver.username,
        original_text: text.to_owned(),
        translated_text,
        from_language: sender.language,
        to_language: receiver.language,
    }).await?;

    info!(id = message.id, from = %message.from, to = %message.to, "message relayed");

    relay.registry.deliver(&message.to, ServerEvent::received(&message));
    relay.registry.deliver(&message.from, ServerEvent::sent(&message));

    Ok(message)
}

/// Identity for matching languages; the provider's answer, or the fallback
/// text when it fails or takes too long.
async fn translate_or_fallback(relay: &Relay, text: &str, from: &str, to: &str) -> String {
    if from == to {
        return text.to_owned();
    }

    let limit = relay.settings.translate_timeout;
    let err = match tokio::time::timeout(limit, relay.translator.translate(text, from, to)).await {
        Ok(Ok(translated)) => return translated,
        Ok(Err(e)) => RelayError::TranslationUnavailable(e.to_string()),
        Err(_) => RelayError::TranslationUnavailable(format!("no answer within {limit:?}")),
    };

    debug!(from, to, error = %err, "using fallback translation");
    translate::fallback(text)
}

async fn persist(relay: &Relay, message: NewMessage) -> Result<Message, RelayError> {
    let attempts = relay.settings.store_attempts.max(1);
    let mut attempt = 1;
    loop {
        match relay.messages.append(&message).await {
            Ok(stored) => return Ok(stored),
            Err(e) if attempt < attempts => {
                warn!(attempt, attempts, error = %e, "storing message failed, retrying");
                tokio::time::sleep(relay.settings.store_backoff * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(RelayError::Persistence(e)),
        }
    }
}
