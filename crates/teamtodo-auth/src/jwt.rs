//! Session JWT handling

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Value of the `token_type` claim on browser/API sessions
pub const SESSION_TOKEN_TYPE: &str = "session";

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    /// Subject: user UUID
    pub sub: String,
    /// Login email at issue time
    pub email: String,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// Token type, always "session" for tokens issued by this service
    pub token_type: String,
}

impl SessionClaims {
    pub fn new(user_id: Uuid, email: String, issuer: String, validity: Duration) -> Self {
        let now = Utc::now();
        let exp = now + validity;

        Self {
            sub: user_id.to_string(),
            email,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: issuer,
            token_type: SESSION_TOKEN_TYPE.to_string(),
        }
    }

    pub fn with_token_type(mut self, token_type: String) -> Self {
        self.token_type = token_type;
        self
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }

    /// Parse the subject as a user id
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidSubject(self.sub.clone()))
    }
}

/// JWT errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT encoding error: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token type '{0}', expected 'session'")]
    WrongTokenType(String),

    #[error("Token subject is not a user id: {0}")]
    InvalidSubject(String),
}

/// HS256 session token validator
pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    /// Validates signature, expiration and token type.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.validate_nbf = false;
        validation.leeway = 0;

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    pub fn validate(&self, token: &str) -> Result<SessionClaims, JwtError> {
        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)?;
        let claims = token_data.claims;

        if claims.is_expired() {
            return Err(JwtError::TokenExpired);
        }

        if claims.token_type != SESSION_TOKEN_TYPE {
            return Err(JwtError::WrongTokenType(claims.token_type));
        }

        Ok(claims)
    }

    /// Encode a session token with HMAC-SHA256
    pub fn encode(secret: &[u8], claims: &SessionClaims) -> Result<String, JwtError> {
        let header = Header::new(Algorithm::HS256);
        let encoding_key = EncodingKey::from_secret(secret);

        Ok(encode(&header, claims, &encoding_key)?)
    }
}
