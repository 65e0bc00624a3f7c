//! Catalog routes.
//!
//! GET  /{category}          - List every item in a category
//! GET  /{category}/{id}     - Retrieve one item
//! POST /{category}/book     - Create a pending booking and a payment order
//!
//! `{category}` is one of `venues`, `caterers`, `decorators`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, to_bson, DateTime};
use tracing::info;

use crate::db;
use crate::error::AppError;
use crate::models::{
    BookItemRequest, Booking, BookingCreated, BookingStatus, CatalogCategory, CatalogItem,
};
use crate::notifier::{BookingUpdate, Notifier, ServerEvent};
use crate::payments::PaymentGateway;
use crate::state::AppState;

/// Build the catalog router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{category}", get(list_items))
        .route("/{category}/book", post(book_item))
        .route("/{category}/{id}", get(get_item))
}

fn parse_category(segment: &str) -> Result<CatalogCategory, AppError> {
    CatalogCategory::from_path(segment).ok_or(AppError::NotFound("Category"))
}

async fn list_items(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> Result<Json<Vec<CatalogItem>>, AppError> {
    let category = parse_category(&category)?;
    let items: Vec<CatalogItem> = db::items(&state.db, category)
        .find(doc! {})
        .await?
        .try_collect()
        .await?;
    Ok(Json(items))
}

async fn get_item(
    State(state): State<Arc<AppState>>,
    Path((category, id)): Path<(String, String)>,
) -> Result<Json<CatalogItem>, AppError> {
    let category = parse_category(&category)?;
    // An unparseable id cannot reference anything.
    let id = ObjectId::parse_str(&id).map_err(|_| AppError::NotFound(category.label()))?;

    let item = db::items(&state.db, category)
        .find_one(doc! { "_id": id })
        .await?
        .ok_or(AppError::NotFound(category.label()))?;
    Ok(Json(item))
}

/// Create a pending booking for a catalog item.
///
/// 1. Resolve the customer against the user store
/// 2. Load the item (404 when absent; no gateway call happens in that case)
/// 3. Create an external payment order for `price * 100` minor units
/// 4. Atomically append the booking and record the order → booking mapping
/// 5. Publish a pending booking update to the customer's room
async fn book_item(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Json(req): Json<BookItemRequest>,
) -> Result<Json<BookingCreated>, AppError> {
    let category = parse_category(&category)?;
    let (Some(raw_user_id), Some(raw_item_id), Some(raw_date)) =
        (req.user_id, req.item_id, req.date)
    else {
        return Err(AppError::validation("Missing required fields"));
    };

    let user_id =
        ObjectId::parse_str(&raw_user_id).map_err(|_| AppError::validation("Invalid userId"))?;
    let item_id =
        ObjectId::parse_str(&raw_item_id).map_err(|_| AppError::validation("Invalid itemId"))?;
    let date = parse_booking_date(&raw_date)?;

    // A booking must be traceable to a known customer.
    let customer = db::users(&state.db)
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or_else(|| AppError::validation("Unknown customer"))?;

    let items = db::items(&state.db, category);
    let item = items
        .find_one(doc! { "_id": item_id })
        .await?
        .ok_or(AppError::NotFound(category.label()))?;

    let receipt = PaymentGateway::new_receipt();
    let notes = serde_json::json!({ "userId": raw_user_id, "itemId": raw_item_id });
    let order = state
        .payments
        .create_order(item.price * 100, &receipt, notes)
        .await?;

    let now = DateTime::now();
    let booking = Booking {
        id: ObjectId::new(),
        user_id,
        date,
        status: BookingStatus::Pending,
        payment_order_id: Some(order.id.clone()),
        created_at: now,
    };

    // Atomic append; concurrent bookings on the same item cannot shadow
    // each other.
    let booking_doc = to_bson(&booking).map_err(|e| AppError::Upstream(e.into()))?;
    let result = items
        .update_one(doc! { "_id": item_id }, doc! { "$push": { "bookings": booking_doc } })
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::NotFound(category.label()));
    }

    db::payment_orders(&state.db)
        .insert_one(crate::models::PaymentOrderRef {
            order_id: order.id.clone(),
            category,
            item_id,
            booking_id: booking.id,
            user_id,
            created_at: now,
        })
        .await?;

    info!(
        "Booking {} created by {} for {} {} (order {})",
        booking.id,
        customer.email,
        category.label(),
        item.name,
        order.id
    );

    state.notifier.publish(
        &Notifier::user_room(&user_id),
        ServerEvent::BookingUpdate(BookingUpdate {
            booking_id: Some(booking.id),
            status: BookingStatus::Pending,
            message: format!("Your {} booking for {} is pending", category.label().to_lowercase(), item.name),
        }),
    );

    Ok(Json(BookingCreated {
        message: "Booking created, proceed to payment".to_string(),
        booking,
        order,
    }))
}

/// Accept an RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
fn parse_booking_date(raw: &str) -> Result<DateTime, AppError> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(DateTime::from_millis(dt.timestamp_millis()));
    }
    if let Ok(day) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = day.and_hms_opt(0, 0, 0).expect("midnight exists").and_utc();
        return Ok(DateTime::from_millis(midnight.timestamp_millis()));
    }
    Err(AppError::validation("Invalid date"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_dates_parse_both_accepted_formats() {
        let day = parse_booking_date("2026-11-21").unwrap();
        let precise = parse_booking_date("2026-11-21T00:00:00Z").unwrap();
        assert_eq!(day, precise);

        assert!(parse_booking_date("21/11/2026").is_err());
        assert!(parse_booking_date("").is_err());
    }

    #[test]
    fn unknown_category_segments_are_not_found() {
        assert!(parse_category("venues").is_ok());
        assert!(matches!(parse_category("bands"), Err(AppError::NotFound(_))));
    }
}
