//! Shared application state.

use std::sync::Arc;

use mongodb::Database;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::notifier::Notifier;
use crate::payments::PaymentGateway;

/// Everything a request handler can reach, shared behind an `Arc`.
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub notifier: Notifier,
    pub payments: PaymentGateway,
    /// Outbound client for the identity provider.
    pub http: reqwest::Client,
}

impl AppState {
    pub async fn init(config: Config) -> anyhow::Result<Arc<Self>> {
        let db = db::connect(&config).await?;
        db::ensure_indexes(&db).await?;
        let payments = PaymentGateway::new(&config);

        info!("Application state initialized");
        Ok(Arc::new(Self {
            db,
            payments,
            notifier: Notifier::new(),
            http: reqwest::Client::new(),
            config,
        }))
    }
}
