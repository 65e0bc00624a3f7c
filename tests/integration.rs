//! # Integration Tests
//!
//! These tests exercise the HTTP surface of a running server, seeding
//! catalog fixtures straight into MongoDB through the crate's own db
//! helpers. They require the stack to be up:
//!
//! ```bash
//! # 1. Start MongoDB (docker or local)
//! docker run -d -p 27017:27017 mongo:7
//!
//! # 2. Start the server (in another terminal)
//! cargo run
//!
//! # 3. Run tests
//! cargo test -- --ignored
//! ```
//!
//! They are `#[ignore]`d so a plain `cargo test` stays green without the
//! stack. Payment-order creation against the real gateway is not exercised;
//! confirmation is driven by seeding a pending booking and signing the
//! callback with the shared test secret.

#[cfg(test)]
mod tests {
    use hmac::{Hmac, Mac};
    use mongodb::bson::oid::ObjectId;
    use mongodb::bson::{doc, DateTime};
    use serde_json::json;
    use sha2::Sha256;

    use vivaha_api::config::Config;
    use vivaha_api::db;
    use vivaha_api::models::{
        Booking, BookingStatus, CatalogCategory, CatalogItem, GeoPoint, PaymentOrderRef,
    };

    fn base_url() -> String {
        std::env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
    }

    fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{order_id}|{payment_id}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    async fn seed_venue(db: &mongodb::Database, vendor_id: Option<ObjectId>) -> CatalogItem {
        let mut item = CatalogItem {
            id: ObjectId::new(),
            name: format!("Test Hall {}", uuid::Uuid::new_v4().simple()),
            title: "Integration fixture".into(),
            category: "Banquet".into(),
            image: "hall.jpg".into(),
            price: 5000,
            sub_images: vec![],
            address: "1 Fixture Lane".into(),
            latitude: None,
            longitude: None,
            location: Some(GeoPoint {
                kind: "Point".into(),
                coordinates: [77.5946, 12.9716],
            }),
            vendor_id,
            bookings: vec![],
        };
        item.sync_coordinates();
        db::items(db, CatalogCategory::Venue)
            .insert_one(&item)
            .await
            .expect("Failed to seed venue");
        item
    }

    async fn signup_and_login(client: &reqwest::Client) -> String {
        let email = format!("it-{}@example.com", uuid::Uuid::new_v4().simple());
        let res = client
            .post(format!("{}/user/signup", base_url()))
            .json(&json!({
                "fullname": "Integration Tester",
                "email": email,
                "password": "correct horse battery",
            }))
            .send()
            .await
            .expect("Failed to send signup");
        assert_eq!(res.status(), 201, "Expected 201 Created");

        let res = client
            .post(format!("{}/user/login", base_url()))
            .json(&json!({ "email": email, "password": "correct horse battery" }))
            .send()
            .await
            .expect("Failed to send login");
        assert_eq!(res.status(), 200, "Expected 200 OK");

        let body: serde_json::Value = res.json().await.expect("Failed to parse login response");
        body["user"]["_id"]["$oid"]
            .as_str()
            .expect("Login response should carry the user id")
            .to_string()
    }

    #[tokio::test]
    #[ignore = "requires MongoDB and a running server"]
    async fn test_signup_login_me_logout() {
        let client = reqwest::Client::builder().cookie_store(true).build().unwrap();
        signup_and_login(&client).await;

        let res = client
            .get(format!("{}/user/me", base_url()))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(res.status(), 200, "Session cookie should authenticate /user/me");

        let res = client
            .get(format!("{}/user/logout", base_url()))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(res.status(), 200);

        let res = client
            .get(format!("{}/user/me", base_url()))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(res.status(), 401, "Cleared session should be unauthorized");
    }

    #[tokio::test]
    #[ignore = "requires MongoDB and a running server"]
    async fn test_list_venues() {
        let config = Config::from_env();
        let db = db::connect(&config).await.expect("Failed to connect");
        seed_venue(&db, None).await;

        let res = reqwest::get(format!("{}/venues", base_url()))
            .await
            .expect("Failed to send request");
        assert_eq!(res.status(), 200);

        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        assert!(body.as_array().is_some_and(|items| !items.is_empty()));
    }

    #[tokio::test]
    #[ignore = "requires MongoDB and a running server"]
    async fn test_booking_unknown_item_is_not_found() {
        let client = reqwest::Client::new();
        let user_id = signup_and_login(&reqwest::Client::builder().cookie_store(true).build().unwrap()).await;

        let res = client
            .post(format!("{}/venues/book", base_url()))
            .json(&json!({
                "userId": user_id,
                "itemId": ObjectId::new().to_hex(),
                "date": "2026-11-21",
            }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(res.status(), 404, "Expected 404 Not Found");
    }

    #[tokio::test]
    #[ignore = "requires MongoDB and a running server"]
    async fn test_verify_payment_confirms_the_booking_once() {
        let config = Config::from_env();
        let db = db::connect(&config).await.expect("Failed to connect");

        let item = seed_venue(&db, None).await;
        let order_id = format!("order_it_{}", uuid::Uuid::new_v4().simple());
        let booking = Booking {
            id: ObjectId::new(),
            user_id: ObjectId::new(),
            date: DateTime::now(),
            status: BookingStatus::Pending,
            payment_order_id: Some(order_id.clone()),
            created_at: DateTime::now(),
        };
        db::items(&db, CatalogCategory::Venue)
            .update_one(
                doc! { "_id": item.id },
                doc! { "$push": { "bookings": mongodb::bson::to_bson(&booking).unwrap() } },
            )
            .await
            .expect("Failed to seed booking");
        db::payment_orders(&db)
            .insert_one(PaymentOrderRef {
                order_id: order_id.clone(),
                category: CatalogCategory::Venue,
                item_id: item.id,
                booking_id: booking.id,
                user_id: booking.user_id,
                created_at: DateTime::now(),
            })
            .await
            .expect("Failed to seed payment order ref");

        let client = reqwest::Client::new();
        let signature = sign(&config.razorpay_key_secret, &order_id, "pay_it_1");

        // Wrong signature first: booking state must not move.
        let res = client
            .post(format!("{}/verify-payment", base_url()))
            .json(&json!({
                "paymentId": "pay_it_1",
                "orderId": order_id,
                "signature": "deadbeef",
            }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(res.status(), 400, "Bad signature should be rejected");

        // Correct signature flips exactly this booking to confirmed.
        let res = client
            .post(format!("{}/verify-payment", base_url()))
            .json(&json!({
                "paymentId": "pay_it_1",
                "orderId": order_id,
                "signature": signature,
            }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(res.status(), 200, "Valid signature should verify");

        let stored = db::items(&db, CatalogCategory::Venue)
            .find_one(doc! { "_id": item.id })
            .await
            .expect("Failed to re-read item")
            .expect("Seeded item should exist");
        let stored_booking = stored
            .bookings
            .iter()
            .find(|b| b.id == booking.id)
            .expect("Seeded booking should exist");
        assert_eq!(stored_booking.status, BookingStatus::Confirmed);

        // Replaying the same verified payload stays a no-op success.
        let res = client
            .post(format!("{}/verify-payment", base_url()))
            .json(&json!({
                "paymentId": "pay_it_1",
                "orderId": order_id,
                "signature": sign(&config.razorpay_key_secret, &order_id, "pay_it_1"),
            }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(res.status(), 200, "Replay should still report success");
    }

    #[tokio::test]
    #[ignore = "requires MongoDB and a running server"]
    async fn test_verify_payment_unknown_order_is_not_found() {
        let config = Config::from_env();
        let client = reqwest::Client::new();
        let order_id = format!("order_missing_{}", uuid::Uuid::new_v4().simple());
        let res = client
            .post(format!("{}/verify-payment", base_url()))
            .json(&json!({
                "paymentId": "pay_none",
                "orderId": order_id,
                "signature": sign(&config.razorpay_key_secret, &order_id, "pay_none"),
            }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(res.status(), 404, "Expected 404 Not Found");
    }

    #[tokio::test]
    #[ignore = "requires MongoDB and a running server"]
    async fn test_chat_start_is_idempotent() {
        let config = Config::from_env();
        let db = db::connect(&config).await.expect("Failed to connect");
        let item = seed_venue(&db, Some(ObjectId::new())).await;

        let client = reqwest::Client::builder().cookie_store(true).build().unwrap();
        let user_id = signup_and_login(&client).await;

        let start = || {
            client
                .post(format!("{}/chat/start", base_url()))
                .json(&json!({
                    "customerId": user_id,
                    "itemId": item.id.to_hex(),
                    "itemType": "Venue",
                }))
                .send()
        };

        let first: serde_json::Value = start()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse response");
        let second: serde_json::Value = start()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse response");

        assert_eq!(first["chatId"], second["chatId"], "Same tuple must reuse the chat");
    }

    #[tokio::test]
    #[ignore = "requires MongoDB and a running server"]
    async fn test_chat_requires_a_session() {
        let res = reqwest::Client::new()
            .post(format!("{}/chat/start", base_url()))
            .json(&json!({
                "customerId": ObjectId::new().to_hex(),
                "itemId": ObjectId::new().to_hex(),
                "itemType": "Venue",
            }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(res.status(), 401, "Expected 401 Unauthorized");
    }
}
