//! Sessions and credentials.
//!
//! Passwords are stored as argon2-encoded hashes with a per-user random
//! salt. A session is a signed claims blob carried in an HTTP-only cookie;
//! handlers that need an authenticated caller take the [`SessionUser`]
//! extractor, which rejects with 401 when the cookie is missing, expired or
//! tampered with.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use rand::{thread_rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;
use crate::models::{User, UserRole};
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sid";
const SESSION_HOURS: i64 = 24;

// ============================================================================
// Passwords
// ============================================================================

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let mut salt = vec![0u8; 16];
    thread_rng().fill_bytes(&mut salt);
    argon2::hash_encoded(password.as_bytes(), &salt, &argon2::Config::default())
        .map_err(|e| AppError::Upstream(e.into()))
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    argon2::verify_encoded(hash, password.as_bytes()).unwrap_or(false)
}

// ============================================================================
// Session tokens
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    fullname: Option<String>,
    email: String,
    role: UserRole,
    exp: usize,
}

pub fn issue_token(user: &User, secret: &str) -> Result<String, AppError> {
    let exp = (Utc::now() + Duration::hours(SESSION_HOURS)).timestamp() as usize;
    issue_token_with_exp(user, secret, exp)
}

fn issue_token_with_exp(user: &User, secret: &str, exp: usize) -> Result<String, AppError> {
    let claims = SessionClaims {
        sub: user.id.to_hex(),
        fullname: user.fullname.clone(),
        email: user.email.clone(),
        role: user.role,
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Upstream(e.into()))
}

fn decode_token(token: &str, secret: &str) -> Option<SessionClaims> {
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .build()
}

/// A cookie matching the session cookie's name and path, for removal.
pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

// ============================================================================
// Extractor
// ============================================================================

/// The authenticated caller, decoded from the session cookie.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub fullname: Option<String>,
    pub email: String,
    pub role: UserRole,
}

impl FromRequestParts<Arc<AppState>> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(SESSION_COOKIE).ok_or(AppError::Unauthorized)?.value().to_string();
        let claims =
            decode_token(&token, &state.config.session_secret).ok_or(AppError::Unauthorized)?;
        let id = ObjectId::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;
        Ok(SessionUser {
            id,
            fullname: claims.fullname,
            email: claims.email,
            role: claims.role,
        })
    }
}

// ============================================================================
// Google OAuth delegation
// ============================================================================

/// Profile fields we read back from Google after the code exchange.
#[derive(Debug, Deserialize)]
pub struct GoogleProfile {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

pub fn google_authorize_url(config: &Config) -> String {
    let url = reqwest::Url::parse_with_params(
        "https://accounts.google.com/o/oauth2/v2/auth",
        &[
            ("client_id", config.google_client_id.as_str()),
            ("redirect_uri", config.google_redirect_url.as_str()),
            ("response_type", "code"),
            ("scope", "profile email"),
        ],
    )
    .expect("static authorize URL is valid");
    url.to_string()
}

/// Swap an authorization code for the user's Google profile.
pub async fn exchange_google_code(
    http: &reqwest::Client,
    config: &Config,
    code: &str,
) -> anyhow::Result<GoogleProfile> {
    #[derive(Deserialize)]
    struct TokenResponse {
        access_token: String,
    }

    let token: TokenResponse = http
        .post("https://oauth2.googleapis.com/token")
        .form(&[
            ("code", code),
            ("client_id", config.google_client_id.as_str()),
            ("client_secret", config.google_client_secret.as_str()),
            ("redirect_uri", config.google_redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let profile: GoogleProfile = http
        .get("https://www.googleapis.com/oauth2/v2/userinfo")
        .bearer_auth(&token.access_token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: ObjectId::new(),
            fullname: Some("Asha Rao".into()),
            email: "asha@example.com".into(),
            password: None,
            google_id: None,
            role: UserRole::Customer,
        }
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("hunter2!").unwrap();
        assert!(verify_password(&hash, "hunter2!"));
        assert!(!verify_password(&hash, "hunter3!"));
        assert!(!verify_password("not-a-hash", "hunter2!"));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn token_round_trips_the_session_user() {
        let user = sample_user();
        let token = issue_token(&user, "secret").unwrap();
        let claims = decode_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, user.id.to_hex());
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, UserRole::Customer);
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let token = issue_token(&sample_user(), "secret-a").unwrap();
        assert!(decode_token(&token, "secret-b").is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let user = sample_user();
        let exp = (Utc::now() - Duration::hours(1)).timestamp() as usize;
        let token = issue_token_with_exp(&user, "secret", exp).unwrap();
        assert!(decode_token(&token, "secret").is_none());
    }

    #[test]
    fn authorize_url_carries_the_client_and_redirect() {
        let mut config = Config::from_env();
        config.google_client_id = "client-123".into();
        config.google_redirect_url = "http://localhost:8000/user/auth/google/callback".into();
        let url = google_authorize_url(&config);
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("response_type=code"));
    }
}
