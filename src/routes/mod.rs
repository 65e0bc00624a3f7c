//! HTTP route modules.
//!
//! - `catalog`: browse venues/caterers/decorators and create bookings
//! - `payments`: payment-callback verification and booking confirmation
//! - `chat`: customer ↔ vendor conversations
//! - `users`: signup, login, sessions and the federated-login path

pub mod catalog;
pub mod chat;
pub mod payments;
pub mod users;
