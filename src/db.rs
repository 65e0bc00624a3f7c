//! Database helpers.
//!
//! Connection setup, typed collection accessors, and the indexes the
//! workflows rely on. Collections are cheap handles; routes fetch them
//! through these accessors rather than holding their own.

use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::info;

use crate::config::Config;
use crate::models::{CatalogCategory, CatalogItem, Chat, PaymentOrderRef, User};

/// True when a write failed on a unique-index violation.
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    matches!(&*err.kind, ErrorKind::Write(WriteFailure::WriteError(write_err)) if write_err.code == 11000)
}

pub async fn connect(config: &Config) -> mongodb::error::Result<Database> {
    let client = Client::with_uri_str(&config.mongo_uri).await?;
    let db = client.database(&config.mongo_db);
    info!("Connected to MongoDB database {}", config.mongo_db);
    Ok(db)
}

pub fn items(db: &Database, category: CatalogCategory) -> Collection<CatalogItem> {
    db.collection(category.collection_name())
}

pub fn users(db: &Database) -> Collection<User> {
    db.collection("users")
}

pub fn chats(db: &Database) -> Collection<Chat> {
    db.collection("chats")
}

pub fn payment_orders(db: &Database) -> Collection<PaymentOrderRef> {
    db.collection("payment_orders")
}

/// Create the indexes the workflows depend on. Idempotent; run at startup.
///
/// - unique user emails;
/// - unique (customer, vendor, item, itemType) chat tuples, which is what
///   makes lazy chat creation safe under concurrent first contact;
/// - `bookings.paymentOrderId` per category for the fallback booking scan;
/// - 2dsphere on `location` for map queries.
pub async fn ensure_indexes(db: &Database) -> mongodb::error::Result<()> {
    users(db)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;

    chats(db)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "customerId": 1, "vendorId": 1, "itemId": 1, "itemType": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;

    for category in CatalogCategory::ALL {
        let collection = items(db, category);
        collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "bookings.paymentOrderId": 1 })
                    .options(IndexOptions::builder().sparse(true).build())
                    .build(),
            )
            .await?;
        collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "location": "2dsphere" })
                    .options(IndexOptions::builder().sparse(true).build())
                    .build(),
            )
            .await?;
    }

    info!("Database indexes ensured");
    Ok(())
}
