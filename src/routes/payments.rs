//! Payment verification route.
//!
//! POST /verify-payment - Verify a signed payment callback and confirm the
//! booking the paid order belongs to.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use tracing::{info, warn};

use crate::db;
use crate::error::AppError;
use crate::models::{BookingStatus, CatalogCategory, VerifyPaymentRequest};
use crate::notifier::{BookingUpdate, Notifier, ServerEvent};
use crate::payments::verify_signature;
use crate::state::AppState;

/// Build the payment-verification router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/verify-payment", post(verify_payment))
}

/// Confirm the booking paid for by `orderId`.
///
/// The signature is checked before anything is read: an invalid signature
/// never touches booking state, whether or not the order exists. The flip to
/// `confirmed` is atomic and only fires once — replaying a verified payload
/// returns success without re-publishing the notification.
async fn verify_payment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyPaymentRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (Some(payment_id), Some(order_id), Some(signature)) =
        (req.payment_id, req.order_id, req.signature)
    else {
        return Err(AppError::validation("Missing required fields"));
    };

    if !verify_signature(&state.config.razorpay_key_secret, &order_id, &payment_id, &signature) {
        warn!("Invalid payment signature for order {order_id}");
        return Err(AppError::SignatureMismatch);
    }

    let outcome = confirm_booking(&state, &order_id).await?;

    if outcome.newly_confirmed {
        info!("Booking {} confirmed (order {order_id})", outcome.booking_id);
        state.notifier.publish(
            &Notifier::user_room(&outcome.user_id),
            ServerEvent::BookingUpdate(BookingUpdate {
                booking_id: Some(outcome.booking_id),
                status: BookingStatus::Confirmed,
                message: "Your booking is confirmed!".to_string(),
            }),
        );
    }

    Ok(Json(serde_json::json!({ "message": "Payment verified successfully" })))
}

struct Confirmation {
    booking_id: ObjectId,
    user_id: ObjectId,
    newly_confirmed: bool,
}

/// Locate the booking carrying `order_id` and set it to `confirmed`.
///
/// The `payment_orders` index resolves the booking in one read; bookings
/// with no index entry fall back to scanning the categories in priority
/// order (venue, caterer, decorator), first match wins.
async fn confirm_booking(state: &AppState, order_id: &str) -> Result<Confirmation, AppError> {
    if let Some(entry) = db::payment_orders(&state.db)
        .find_one(doc! { "_id": order_id })
        .await?
    {
        let newly_confirmed = flip_to_confirmed(state, entry.category, entry.item_id, order_id)
            .await?
            .ok_or(AppError::NotFound("Booking"))?;
        return Ok(Confirmation {
            booking_id: entry.booking_id,
            user_id: entry.user_id,
            newly_confirmed,
        });
    }

    for category in CatalogCategory::ALL {
        let Some(item) = db::items(&state.db, category)
            .find_one(doc! { "bookings.paymentOrderId": order_id })
            .await?
        else {
            continue;
        };
        let Some(booking) = item
            .bookings
            .iter()
            .find(|b| b.payment_order_id.as_deref() == Some(order_id))
        else {
            continue;
        };
        let newly_confirmed = flip_to_confirmed(state, category, item.id, order_id)
            .await?
            .unwrap_or(false);
        return Ok(Confirmation {
            booking_id: booking.id,
            user_id: booking.user_id,
            newly_confirmed,
        });
    }

    Err(AppError::NotFound("Booking"))
}

/// Atomically set the matching booking to `confirmed`.
///
/// Returns `Some(true)` when this call did the flip, `Some(false)` when the
/// booking was already confirmed, and `None` when no booking in the item
/// carries the order id.
async fn flip_to_confirmed(
    state: &AppState,
    category: CatalogCategory,
    item_id: ObjectId,
    order_id: &str,
) -> Result<Option<bool>, AppError> {
    let items = db::items(&state.db, category);
    let result = items
        .update_one(
            doc! {
                "_id": item_id,
                "bookings": {
                    "$elemMatch": { "paymentOrderId": order_id, "status": { "$ne": "confirmed" } }
                }
            },
            doc! { "$set": { "bookings.$.status": "confirmed" } },
        )
        .await?;

    if result.modified_count == 1 {
        return Ok(Some(true));
    }

    // Nothing changed: either a replay of an already-confirmed payment or a
    // stale index entry. Tell the two apart.
    let exists = items
        .find_one(doc! { "_id": item_id, "bookings.paymentOrderId": order_id })
        .await?
        .is_some();
    Ok(if exists { Some(false) } else { None })
}
