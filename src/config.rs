//! Environment-backed configuration.
//!
//! Every knob has a development default so `cargo run` works against a local
//! stack; production deployments override via the environment (or a `.env`
//! file loaded by the binary).

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use tracing::info;

/// Runtime configuration for the marketplace backend.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub mongo_uri: String,
    pub mongo_db: String,

    /// Payment gateway credentials. The key secret doubles as the HMAC key
    /// for payment-callback signatures.
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_base_url: String,
    pub currency: String,

    /// Secret used to sign session tokens.
    pub session_secret: String,

    /// Origin allowed to call this API with credentials.
    pub cors_origin: String,
    /// Where the OAuth callback redirects after establishing a session.
    pub frontend_url: String,

    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: try_load("PORT", "8000"),
            mongo_uri: load("MONGO_URI", "mongodb://localhost:27017"),
            mongo_db: load("MONGO_DB", "vivaha"),
            razorpay_key_id: load("RAZORPAY_KEY_ID", "rzp_test_key"),
            razorpay_key_secret: load("RAZORPAY_KEY_SECRET", "rzp_test_secret"),
            razorpay_base_url: load("RAZORPAY_BASE_URL", "https://api.razorpay.com/v1"),
            currency: load("CURRENCY", "INR"),
            session_secret: load("SESSION_SECRET", "dev-session-secret"),
            cors_origin: load("CORS_ORIGIN", "http://localhost:5173"),
            frontend_url: load("FRONTEND_URL", "http://localhost:5173"),
            google_client_id: load("GOOGLE_CLIENT_ID", ""),
            google_client_secret: load("GOOGLE_CLIENT_SECRET", ""),
            google_redirect_url: load(
                "GOOGLE_REDIRECT_URL",
                "http://localhost:8000/user/auth/google/callback",
            ),
        }
    }
}

fn load(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default");
        default.to_string()
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    load(key, default)
        .parse()
        .map_err(|e| format!("invalid {key}: {e}"))
        .expect("environment misconfigured")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let port: u16 = try_load("VIVAHA_TEST_UNSET_PORT", "8000");
        assert_eq!(port, 8000);
        assert_eq!(load("VIVAHA_TEST_UNSET_URI", "mongodb://localhost:27017"), "mongodb://localhost:27017");
    }
}
