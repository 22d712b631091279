//! Append-only message log, queryable by participant pair.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::db::{Database, StoreError};

/// A delivered message. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub from: String,
    pub to: String,
    pub original_text: String,
    pub translated_text: String,
    pub from_language: String,
    pub to_language: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// A message before the store has assigned its id and timestamp.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub from: String,
    pub to: String,
    pub original_text: String,
    pub translated_text: String,
    pub from_language: String,
    pub to_language: String,
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Assigns a monotonic id and a timestamp that never goes backwards.
    async fn append(&self, message: &NewMessage) -> Result<Message, StoreError>;

    /// Messages exchanged between `a` and `b` in either direction, oldest first.
    async fn query_between(&self, a: &str, b: &str) -> Result<Vec<Message>, StoreError>;
}

type MessageRow = (i64, String, String, String, String, String, String, i64);

#[async_trait]
impl MessageStore for Database {
    async fn append(&self, message: &NewMessage) -> Result<Message, StoreError> {
        let now = unix_millis(OffsetDateTime::now_utc());

        // clamp to the newest stored timestamp so the log stays ordered if the clock steps back
        let (id, timestamp): (i64, i64) = sqlx::query_as(
            "INSERT INTO messages (from_user,to_user,original_text,translated_text,from_language,to_language,timestamp) \
             VALUES (?,?,?,?,?,?,MAX(?,COALESCE((SELECT MAX(timestamp) FROM messages),0))) \
             RETURNING id,timestamp",
        )
            .bind(&message.from)
            .bind(&message.to)
            .bind(&message.original_text)
            .bind(&message.translated_text)
            .bind(&message.from_language)
            .bind(&message.to_language)
            .bind(now)
            .fetch_one(self.pool())
            .await?;

        Ok(Message {
            id,
            from: message.from.clone(),
            to: message.to.clone(),
            original_text: message.original_text.clone(),
            translated_text: message.translated_text.clone(),
            from_language: message.from_language.clone(),
            to_language: message.to_language.clone(),
            timestamp: from_unix_millis(timestamp)?,
        })
    }

    async fn query_between(&self, a: &str, b: &str) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id,from_user,to_user,original_text,translated_text,from_language,to_language,timestamp \
             FROM messages \
             WHERE (from_user=? AND to_user=?) OR (from_user=? AND to_user=?) \
             ORDER BY timestamp ASC, id ASC",
        )
            .bind(a)
            .bind(b)
            .bind(b)
            .bind(a)
            .fetch_all(self.pool())
            .await?;

        rows.into_iter()
            .map(|(id, from, to, original_text, translated_text, from_language, to_language, timestamp)| {
                Ok(Message {
                    id,
                    from,
                    to,
                    original_text,
                    translated_text,
                    from_language,
                    to_language,
                    timestamp: from_unix_millis(timestamp)?,
                })
            })
            .collect()
    }
}

fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_unix_millis(millis: i64) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|e| StoreError::Query(format!("bad timestamp {millis}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello(from: &str, to: &str, text: &str) -> NewMessage {
        NewMessage {
            from: from.into(),
            to: to.into(),
            original_text: text.into(),
            translated_text: format!("<{text}>"),
            from_language: "en".into(),
            to_language: "sw".into(),
        }
    }

    #[tokio::test]
    async fn append_assigns_increasing_ids() {
        let db = Database::open_in_memory().await.unwrap();

        let first = db.append(&hello("a", "b", "one")).await.unwrap();
        let second = db.append(&hello("b", "a", "two")).await.unwrap();

        assert!(second.id > first.id);
        assert!(second.timestamp >= first.timestamp);
        assert_eq!(second.original_text, "two");
        assert_eq!(second.translated_text, "<two>");
    }

    #[tokio::test]
    async fn query_between_covers_both_directions_in_order() {
        let db = Database::open_in_memory().await.unwrap();

        db.append(&hello("a", "b", "one")).await.unwrap();
        db.append(&hello("c", "a", "noise")).await.unwrap();
        db.append(&hello("b", "a", "two")).await.unwrap();
        db.append(&hello("a", "b", "three")).await.unwrap();

        let history = db.query_between("a", "b").await.unwrap();
        let texts: Vec<_> = history.iter().map(|m| m.original_text.as_str()).collect();
        assert_eq!(texts, ["one", "two", "three"]);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        // argument order does not matter
        assert_eq!(db.query_between("b", "a").await.unwrap(), history);
    }

    #[tokio::test]
    async fn timestamps_never_go_backwards() {
        let db = Database::open_in_memory().await.unwrap();

        // a row from the future, as if the clock had stepped back since
        let future = unix_millis(OffsetDateTime::now_utc()) + 60_000;
        sqlx::query(
            "INSERT INTO messages (from_user,to_user,original_text,translated_text,from_language,to_language,timestamp) \
             VALUES ('a','b','x','x','en','en',?)",
        )
            .bind(future)
            .execute(db.pool())
            .await
            .unwrap();

        let appended = db.append(&hello("a", "b", "after")).await.unwrap();
        assert_eq!(unix_millis(appended.timestamp), future);
    }

    #[test]
    fn message_serializes_with_camel_case_fields() {
        let message = Message {
            id: 1,
            from: "a".into(),
            to: "b".into(),
            original_text: "Hello".into(),
            translated_text: "Hujambo".into(),
            from_language: "en".into(),
            to_language: "sw".into(),
            timestamp: from_unix_millis(0).unwrap(),
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["originalText"], "Hello");
        assert_eq!(json["translatedText"], "Hujambo");
        assert_eq!(json["fromLanguage"], "en");
        assert_eq!(json["timestamp"], "1970-01-01T00:00:00Z");
    }
}
