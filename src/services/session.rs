//! Session tokens: HS256 JWTs whose `sub` is the user id.

use crate::error::{AppError, AppResult};
use crate::services::user_directory::UserDirectory;
use actix_middleware::{IdentityResolver, ResolveError};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

const SESSION_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues session tokens at login and resolves them back to user ids.
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    users: Arc<dyn UserDirectory>,
}

impl SessionIssuer {
    pub fn new(secret: &[u8], ttl_seconds: i64, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl: Duration::seconds(ttl_seconds),
            users,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, user_id: Uuid) -> AppResult<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(SESSION_ALGORITHM), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "failed to sign session token");
            AppError::Internal
        })
    }

    fn verify(&self, token: &str) -> Result<Uuid, ResolveError> {
        let mut validation = Validation::new(SESSION_ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| ResolveError::Invalid(e.to_string()))?;

        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ResolveError::Invalid("subject is not a user id".into()))
    }
}

#[async_trait]
impl IdentityResolver for SessionIssuer {
    async fn resolve(&self, token: &str) -> Result<Uuid, ResolveError> {
        let user_id = self.verify(token)?;

        // A well-signed token for a user the directory no longer knows is not a session
        match self.users.exists(user_id).await {
            Ok(true) => Ok(user_id),
            Ok(false) => Err(ResolveError::Invalid("unknown user".into())),
            Err(e) => Err(ResolveError::Unavailable(e.to_string())),
        }
    }
}
