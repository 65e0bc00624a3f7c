//! User and session routes.
//!
//! POST /user/signup                    - Create an account
//! POST /user/login                     - Verify credentials, set the session cookie
//! GET  /user/me                        - The session user (401 without one)
//! GET  /user/logout                    - Clear the session cookie
//! GET  /user/bookings/{user_id}        - The user's bookings per category
//! GET  /user/auth/google               - Redirect into Google's consent flow
//! GET  /user/auth/google/callback      - Code exchange, upsert, session, redirect

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use tracing::info;

use crate::auth::{self, SessionUser};
use crate::db;
use crate::error::AppError;
use crate::models::{
    BookingWithItem, CatalogCategory, CatalogItem, LoginRequest, SignupRequest, User,
    UserBookings, UserPublic, UserRole,
};
use crate::state::AppState;

/// Build the user router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user/signup", post(signup))
        .route("/user/login", post(login))
        .route("/user/me", get(me))
        .route("/user/logout", get(logout))
        .route("/user/bookings/{user_id}", get(user_bookings))
        .route("/user/auth/google", get(google_redirect))
        .route("/user/auth/google/callback", get(google_callback))
}

async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let (Some(fullname), Some(email), Some(password)) = (req.fullname, req.email, req.password)
    else {
        return Err(AppError::validation("All required fields are required"));
    };

    let role = match req.role.as_deref() {
        None | Some("customer") => UserRole::Customer,
        Some("vendor") => UserRole::Vendor,
        Some(_) => return Err(AppError::validation("Invalid role")),
    };

    let users = db::users(&state.db);
    if users.find_one(doc! { "email": &email }).await?.is_some() {
        return Err(AppError::validation("User already exists"));
    }

    let user = User {
        id: ObjectId::new(),
        fullname: Some(fullname),
        email,
        password: Some(auth::hash_password(&password)?),
        google_id: None,
        role,
    };
    // The unique email index backstops the existence check above.
    users.insert_one(&user).await.map_err(|err| {
        if db::is_duplicate_key(&err) {
            AppError::validation("User already exists")
        } else {
            err.into()
        }
    })?;

    info!("User {} signed up as {:?}", user.email, user.role);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "User created successfully",
            "user": UserPublic::from(&user),
        })),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err(AppError::validation("Email and password are required"));
    };

    // One error for every failure mode so the response does not reveal
    // whether the account exists.
    let invalid = || AppError::validation("Invalid credentials");

    let user = db::users(&state.db)
        .find_one(doc! { "email": &email })
        .await?
        .ok_or_else(invalid)?;
    let hash = user.password.as_deref().ok_or_else(invalid)?;
    if !auth::verify_password(hash, &password) {
        return Err(invalid());
    }

    let token = auth::issue_token(&user, &state.config.session_secret)?;
    info!("User {} logged in", user.email);

    Ok((
        jar.add(auth::session_cookie(token)),
        Json(serde_json::json!({
            "message": "Login successful",
            "user": UserPublic::from(&user),
        })),
    ))
}

async fn me(session: SessionUser) -> Json<SessionUser> {
    Json(session)
}

async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    (
        jar.remove(auth::clear_session_cookie()),
        Json(serde_json::json!({ "message": "Logged out successfully" })),
    )
}

/// The user's bookings across all three categories, each joined with the
/// booked item's name and price.
async fn user_bookings(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<UserBookings>, AppError> {
    let user_id =
        ObjectId::parse_str(&user_id).map_err(|_| AppError::validation("Invalid userId"))?;

    let mut grouped = UserBookings {
        venues: vec![],
        caterers: vec![],
        decorators: vec![],
    };

    for category in CatalogCategory::ALL {
        let items: Vec<CatalogItem> = db::items(&state.db, category)
            .find(doc! { "bookings.userId": user_id })
            .await?
            .try_collect()
            .await?;

        let bucket = match category {
            CatalogCategory::Venue => &mut grouped.venues,
            CatalogCategory::Caterer => &mut grouped.caterers,
            CatalogCategory::Decorator => &mut grouped.decorators,
        };
        for item in items {
            for booking in item.bookings.iter().filter(|b| b.user_id == user_id) {
                bucket.push(BookingWithItem {
                    name: item.name.clone(),
                    price: item.price,
                    booking: booking.clone(),
                });
            }
        }
    }

    Ok(Json(grouped))
}

// ============================================================================
// Federated login
// ============================================================================

async fn google_redirect(State(state): State<Arc<AppState>>) -> Redirect {
    Redirect::temporary(&auth::google_authorize_url(&state.config))
}

#[derive(Debug, Deserialize)]
struct OAuthCallback {
    code: Option<String>,
}

/// Land the user back from Google: exchange the code, upsert the account
/// (linking the federated identity to an existing email when present), set
/// the session cookie and bounce to the frontend with the profile attached.
async fn google_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(callback): Query<OAuthCallback>,
) -> Result<(CookieJar, Redirect), AppError> {
    let code = callback
        .code
        .ok_or_else(|| AppError::validation("Missing authorization code"))?;

    let profile = auth::exchange_google_code(&state.http, &state.config, &code).await?;

    let users = db::users(&state.db);
    let user = match users.find_one(doc! { "googleId": &profile.id }).await? {
        Some(existing) => existing,
        None => match users.find_one(doc! { "email": &profile.email }).await? {
            Some(existing) => {
                users
                    .update_one(
                        doc! { "_id": existing.id },
                        doc! { "$set": { "googleId": &profile.id } },
                    )
                    .await?;
                User {
                    google_id: Some(profile.id.clone()),
                    ..existing
                }
            }
            None => {
                let fresh = User {
                    id: ObjectId::new(),
                    fullname: profile.name.clone(),
                    email: profile.email.clone(),
                    password: None,
                    google_id: Some(profile.id.clone()),
                    role: UserRole::Customer,
                };
                users.insert_one(&fresh).await?;
                info!("Federated account created for {}", fresh.email);
                fresh
            }
        },
    };

    let token = auth::issue_token(&user, &state.config.session_secret)?;

    let payload = serde_json::json!({
        "_id": user.id,
        "fullname": user.fullname,
        "email": user.email,
        "picture": profile.picture,
    });
    let target = reqwest::Url::parse_with_params(
        &state.config.frontend_url,
        &[("user", payload.to_string())],
    )
    .map_err(|e| AppError::Upstream(e.into()))?;

    Ok((
        jar.add(auth::session_cookie(token)),
        Redirect::temporary(target.as_str()),
    ))
}
