//! JWT tokens for the operator endpoints
//!
//! Only index rebuilds need a token; search and health stay public.

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Scope carried by tokens allowed to rebuild the index
pub const SCOPE_INDEX_BUILD: &str = "index:build";

const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Operator name
    pub sub: String,
    pub scope: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn allows(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}

pub struct JwtAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_hours: i64,
}

impl JwtAuth {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_hours: DEFAULT_TTL_HOURS,
        }
    }

    pub fn with_ttl_hours(mut self, hours: i64) -> Self {
        self.ttl_hours = hours.max(1);
        self
    }

    pub fn ttl_hours(&self) -> i64 {
        self.ttl_hours
    }

    /// Issue a token for an operator
    pub fn issue(&self, subject: &str, scope: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            scope: scope.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.ttl_hours)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to issue token: {}", e))
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| anyhow!("Invalid token: {}", e))
    }

    /// Token part of an `Authorization: Bearer <token>` header
    pub fn bearer_token(header: &str) -> Result<&str> {
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| anyhow!("Invalid authorization header format"))?
            .trim();
        if token.is_empty() {
            return Err(anyhow!("Empty token"));
        }
        Ok(token)
    }
}
