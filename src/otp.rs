//! One-time passwords for phone verification.
//!
//! Codes are kept in process memory only; a restart forgets them.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use rand::Rng;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
struct OtpRecord {
    code: String,
    expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct OtpStore {
    codes: Arc<Mutex<HashMap<String, OtpRecord>>>,
    ttl: Duration,
}

impl OtpStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            codes: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// How long an issued code stays valid.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a fresh 6-digit code for `phone`, replacing any earlier one.
    pub fn generate(&self, phone: &str) -> String {
        self.generate_at(phone, OffsetDateTime::now_utc())
    }

    fn generate_at(&self, phone: &str, now: OffsetDateTime) -> String {
        let code = rand::rng().random_range(100_000..=999_999u32).to_string();
        let record = OtpRecord { code: code.clone(), expires_at: now + self.ttl };
        self.lock().insert(phone.to_owned(), record);
        code
    }

    /// True when `code` matches and has not expired. A matching or expired
    /// code is consumed.
    pub fn verify(&self, phone: &str, code: &str) -> bool {
        self.verify_at(phone, code, OffsetDateTime::now_utc())
    }

    fn verify_at(&self, phone: &str, code: &str, now: OffsetDateTime) -> bool {
        let mut codes = self.lock();
        let Some(record) = codes.get(phone) else {
            return false;
        };

        if now > record.expires_at {
            codes.remove(phone);
            return false;
        }
        if record.code != code {
            return false;
        }

        codes.remove(phone);
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, OtpRecord>> {
        // a poisoned map still holds valid codes
        self.codes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
