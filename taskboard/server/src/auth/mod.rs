use axum::extract::MatchedPath;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tower_http::trace::MakeSpan;
use tracing::Span;
use uuid::Uuid;

use crate::config::Config;

pub mod api;

/// Represents the currently authenticated user.
///
/// Inserted as a request extension by the auth middleware once a bearer token
/// has been verified. Handlers take the owner of every task from here, never
/// from the request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
}

impl CurrentUser {
    /// Creates a new CurrentUser instance.
    pub fn new(id: Uuid, username: String) -> Self {
        Self { id, username }
    }
}

/// Authentication state containing the JWT secret and token lifetime.
#[derive(Clone)]
pub struct AuthState {
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

impl AuthState {
    /// Creates a new AuthState from the application config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            token_ttl: chrono::Duration::hours(config.token_ttl_hours),
        }
    }

    /// Issues a signed bearer token for the given user.
    pub fn issue_token(&self, user: &CurrentUser) -> Result<String, AuthError> {
        encode_jwt(user, &self.jwt_secret, self.token_ttl)
    }

    /// Verifies a bearer token and returns the user it was issued to.
    pub fn verify_token(&self, token: &str) -> Result<CurrentUser, AuthError> {
        let claims = decode_jwt(token, &self.jwt_secret)?;
        Ok(CurrentUser::new(claims.sub, claims.username))
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    pub sub: Uuid,        // ID of the authenticated user
    pub username: String, // Username of the authenticated user
    pub exp: usize,       // Expiry time of the token
    pub iat: usize,       // Issued at time of the token
}

/// Custom error type for authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Represents an error during JWT encoding or decoding.
    /// The specific `jsonwebtoken::errors::Error` is captured as the source of this error.
    #[error("JWT operation failed")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

pub fn encode_jwt(
    user: &CurrentUser,
    jwt_secret: &str,
    ttl: chrono::Duration,
) -> Result<String, AuthError> {
    let now = chrono::Utc::now();
    let exp = (now + ttl).timestamp() as usize;
    let iat = now.timestamp() as usize;
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        exp,
        iat,
    };
    let jwt = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?;
    Ok(jwt)
}

pub fn decode_jwt(token: &str, jwt_secret: &str) -> Result<Claims, AuthError> {
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Custom span maker that keeps credentials out of request logs.
/// Headers are never recorded, so bearer tokens do not reach the log output,
/// and account routes are flagged because their bodies carry passwords.
#[derive(Clone, Debug)]
pub struct FilteredMakeSpan;

impl<B> MakeSpan<B> for FilteredMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let uri = request.uri();
        let method = request.method();
        let matched_path = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str);

        if uri.path().starts_with("/api/users") {
            tracing::info_span!(
                "request",
                method = %method,
                uri = %uri,
                matched_path,
                sensitive_route = true,
            )
        } else {
            tracing::info_span!(
                "request",
                method = %method,
                uri = %uri,
                matched_path,
            )
        }
    }
}
