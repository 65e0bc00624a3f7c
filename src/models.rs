//! Domain models for the marketplace backend.
//!
//! Persisted documents and the request/response bodies of the HTTP surface.
//! Everything serializes in camelCase so the wire format matches what the
//! frontend already speaks; the same serde definitions drive BSON storage.

use mongodb::bson::oid::ObjectId;
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// Catalog categories
// ============================================================================

/// The three vendor categories. Their order here is the fixed priority order
/// used when a booking has to be located by scanning categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogCategory {
    Venue,
    Caterer,
    Decorator,
}

impl CatalogCategory {
    pub const ALL: [CatalogCategory; 3] = [
        CatalogCategory::Venue,
        CatalogCategory::Caterer,
        CatalogCategory::Decorator,
    ];

    /// Resolve a URL path segment (`/venues`, `/caterers`, `/decorators`).
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            "venues" => Some(CatalogCategory::Venue),
            "caterers" => Some(CatalogCategory::Caterer),
            "decorators" => Some(CatalogCategory::Decorator),
            _ => None,
        }
    }

    /// MongoDB collection backing this category.
    pub fn collection_name(&self) -> &'static str {
        match self {
            CatalogCategory::Venue => "venues",
            CatalogCategory::Caterer => "caterers",
            CatalogCategory::Decorator => "decorators",
        }
    }

    /// Human-readable tag, also the `itemType` value accepted by the chat API.
    pub fn label(&self) -> &'static str {
        match self {
            CatalogCategory::Venue => "Venue",
            CatalogCategory::Caterer => "Caterer",
            CatalogCategory::Decorator => "Decorator",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Venue" => Some(CatalogCategory::Venue),
            "Caterer" => Some(CatalogCategory::Caterer),
            "Decorator" => Some(CatalogCategory::Decorator),
            _ => None,
        }
    }
}

// ============================================================================
// Catalog documents
// ============================================================================

/// GeoJSON point, `coordinates` ordered `[longitude, latitude]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type", default = "geo_point_type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

fn geo_point_type() -> String {
    "Point".to_string()
}

/// A bookable vendor offering. One collection per category, all sharing this
/// shape; `category` is the vendor's own descriptive tag, not the collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub title: String,
    pub category: String,
    pub image: String,
    /// Whole-currency units; the gateway is charged `price * 100` minor units.
    pub price: i64,
    #[serde(default)]
    pub sub_images: Vec<String>,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location: Option<GeoPoint>,
    /// The user account managing this item. Items without one cannot be
    /// chatted to.
    pub vendor_id: Option<ObjectId>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
}

impl CatalogItem {
    /// Re-derive the scalar `latitude`/`longitude` fields from `location`.
    /// The coordinate pair is the source of truth; callers apply this before
    /// persisting any item they have constructed or mutated.
    pub fn sync_coordinates(&mut self) {
        if let Some(location) = &self.location {
            self.longitude = Some(location.coordinates[0]);
            self.latitude = Some(location.coordinates[1]);
        }
    }
}

// ============================================================================
// Bookings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    /// Reserved; no operation currently transitions into it.
    Cancelled,
}

/// A customer's reservation of a catalog item, embedded in the item document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Resolved against the user store when the booking is created.
    pub user_id: ObjectId,
    pub date: DateTime,
    pub status: BookingStatus,
    /// External payment-order identity, set once the gateway order exists.
    pub payment_order_id: Option<String>,
    pub created_at: DateTime,
}

/// Index entry mapping an external payment-order id to the booking it pays
/// for. Written together with the booking so payment verification resolves
/// the booking without scanning every category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrderRef {
    /// The external order id.
    #[serde(rename = "_id")]
    pub order_id: String,
    pub category: CatalogCategory,
    pub item_id: ObjectId,
    pub booking_id: ObjectId,
    pub user_id: ObjectId,
    pub created_at: DateTime,
}

// ============================================================================
// Chat
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub sender_id: ObjectId,
    pub content: String,
    pub timestamp: DateTime,
}

/// A conversation between a customer and the vendor owning one catalog item.
/// Uniquely identified by (customer, vendor, item, itemType); created lazily
/// on first contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub customer_id: ObjectId,
    pub vendor_id: ObjectId,
    pub item_id: ObjectId,
    pub item_type: CatalogCategory,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Customer,
    Vendor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Absent only for federated accounts created without a profile name.
    pub fullname: Option<String>,
    pub email: String,
    /// Argon2-encoded hash; absent for federated-login-only accounts.
    pub password: Option<String>,
    pub google_id: Option<String>,
    #[serde(default)]
    pub role: UserRole,
}

/// User shape returned by the API; never carries the credential hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub fullname: Option<String>,
    pub email: String,
    pub role: UserRole,
}

impl From<&User> for UserPublic {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            fullname: user.fullname.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

// ============================================================================
// Request models
// ============================================================================

// Request fields are `Option`s so absent fields surface as the API's own
// "Missing required fields" 400 instead of a deserializer rejection.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookItemRequest {
    pub user_id: Option<String>,
    pub item_id: Option<String>,
    /// RFC 3339 timestamp or a plain `YYYY-MM-DD` date.
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub payment_id: Option<String>,
    pub order_id: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChatRequest {
    pub customer_id: Option<String>,
    pub item_id: Option<String>,
    pub item_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub chat_id: Option<String>,
    pub sender_id: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

// ============================================================================
// Response models
// ============================================================================

#[derive(Debug, Serialize)]
pub struct BookingCreated {
    pub message: String,
    pub booking: Booking,
    pub order: crate::payments::PaymentOrder,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStarted {
    pub chat_id: ObjectId,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct MessageSent {
    pub message: String,
    pub data: ChatMessage,
}

/// A booking joined with the name and price of the item it reserves.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingWithItem {
    pub name: String,
    pub price: i64,
    #[serde(flatten)]
    pub booking: Booking,
}

/// `GET /user/bookings/{userId}` — the caller's bookings per category.
#[derive(Debug, Serialize)]
pub struct UserBookings {
    pub venues: Vec<BookingWithItem>,
    pub caterers: Vec<BookingWithItem>,
    pub decorators: Vec<BookingWithItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item(location: Option<GeoPoint>) -> CatalogItem {
        CatalogItem {
            id: ObjectId::new(),
            name: "Rosewood Hall".into(),
            title: "Lakeside banquet hall".into(),
            category: "Banquet".into(),
            image: "rosewood.jpg".into(),
            price: 5000,
            sub_images: vec![],
            address: "12 Lake Rd".into(),
            latitude: None,
            longitude: None,
            location,
            vendor_id: None,
            bookings: vec![],
        }
    }

    #[test]
    fn coordinate_scalars_follow_the_geo_point() {
        let mut item = sample_item(Some(GeoPoint {
            kind: "Point".into(),
            coordinates: [77.5946, 12.9716],
        }));

        item.sync_coordinates();

        assert_eq!(item.longitude, Some(77.5946));
        assert_eq!(item.latitude, Some(12.9716));
    }

    #[test]
    fn sync_without_location_leaves_scalars_alone() {
        let mut item = sample_item(None);
        item.sync_coordinates();
        assert_eq!(item.latitude, None);
        assert_eq!(item.longitude, None);
    }

    #[test]
    fn category_path_and_label_resolution() {
        assert_eq!(CatalogCategory::from_path("venues"), Some(CatalogCategory::Venue));
        assert_eq!(CatalogCategory::from_path("caterers"), Some(CatalogCategory::Caterer));
        assert_eq!(CatalogCategory::from_path("decorators"), Some(CatalogCategory::Decorator));
        assert_eq!(CatalogCategory::from_path("florists"), None);

        assert_eq!(CatalogCategory::from_label("Venue"), Some(CatalogCategory::Venue));
        assert_eq!(CatalogCategory::from_label("venue"), None);
        assert_eq!(CatalogCategory::Caterer.collection_name(), "caterers");
    }

    #[test]
    fn booking_status_uses_lowercase_wire_values() {
        assert_eq!(serde_json::to_value(BookingStatus::Pending).unwrap(), "pending");
        assert_eq!(serde_json::to_value(BookingStatus::Confirmed).unwrap(), "confirmed");
        assert_eq!(
            serde_json::from_value::<BookingStatus>(serde_json::json!("cancelled")).unwrap(),
            BookingStatus::Cancelled
        );
    }

    #[test]
    fn booking_serializes_in_camel_case() {
        let booking = Booking {
            id: ObjectId::new(),
            user_id: ObjectId::new(),
            date: DateTime::now(),
            status: BookingStatus::Pending,
            payment_order_id: Some("order_123".into()),
            created_at: DateTime::now(),
        };
        let value = serde_json::to_value(&booking).unwrap();
        assert!(value.get("userId").is_some());
        assert!(value.get("paymentOrderId").is_some());
        assert!(value.get("createdAt").is_some());
        assert!(value.get("user_id").is_none());
    }

    #[test]
    fn user_public_drops_the_credential_hash() {
        let user = User {
            id: ObjectId::new(),
            fullname: Some("Asha Rao".into()),
            email: "asha@example.com".into(),
            password: Some("$argon2i$...".into()),
            google_id: None,
            role: UserRole::Vendor,
        };
        let value = serde_json::to_value(UserPublic::from(&user)).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value["role"], "vendor");
    }
}
