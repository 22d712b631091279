//! Session tokens handed out after phone verification.

use jsonwebtoken::{EncodingKey, Header};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::users::User;

const TOKEN_TTL: time::Duration = time::Duration::hours(24);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
}

impl TokenIssuer {
    pub fn new(secret: &[u8]) -> Self {
        Self { encoding: EncodingKey::from_secret(secret) }
    }

    /// HS256 token for `user`, valid for 24 hours.
    pub fn issue(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            user_id: user.id,
            username: user.username.clone(),
            exp: (OffsetDateTime::now_utc() + TOKEN_TTL).unix_timestamp(),
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{DecodingKey, Validation};

    use super::*;

    fn decode(token: &str, secret: &[u8]) -> Result<Claims, jsonwebtoken::errors::Error> {
        Ok(jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(secret), &Validation::default())?.claims)
    }

    fn user() -> User {
        User {
            id: 7,
            username: "amina".into(),
            language: "sw".into(),
            online: false,
            phone: Some("+255700000001".into()),
            email: None,
            profile_picture_url: None,
        }
    }

    #[test]
    fn issued_token_verifies() {
        let issuer = TokenIssuer::new(b"test-secret");
        let token = issuer.issue(&user()).unwrap();

        let claims = decode(&token, b"test-secret").unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.username, "amina");
        assert!(claims.exp > OffsetDateTime::now_utc().unix_timestamp());
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let token = TokenIssuer::new(b"one").issue(&user()).unwrap();
        assert!(decode(&token, b"two").is_err());
    }
}
