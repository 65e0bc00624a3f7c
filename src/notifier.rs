//! Real-time notification fan-out.
//!
//! A room is a named broadcast channel. Connections subscribe to rooms after
//! announcing an identity (`join`) or opening a conversation (`joinChat`);
//! the booking and chat workflows publish into rooms by name. Delivery is
//! best-effort and at-most-once: nothing is queued for rooms nobody is in,
//! and persisted state stays the source of truth.

use std::collections::HashMap;
use std::sync::RwLock;

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::{BookingStatus, Chat, ChatMessage};

/// Buffered events per room before slow receivers start lagging.
const ROOM_CAPACITY: usize = 64;

// ============================================================================
// Wire frames
// ============================================================================

/// Booking-status payload for `bookingUpdate` frames.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<ObjectId>,
    pub status: BookingStatus,
    pub message: String,
}

/// Server → client event frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    BookingUpdate(BookingUpdate),
    NewMessage(ChatMessage),
    ChatStarted(Chat),
}

/// Client → server frames. A connection is anonymous until it sends one.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    Join(String),
    JoinChat(String),
}

// ============================================================================
// Room registry
// ============================================================================

pub struct Notifier {
    rooms: RwLock<HashMap<String, broadcast::Sender<ServerEvent>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Room receiving a user's booking updates.
    pub fn user_room(user_id: &ObjectId) -> String {
        user_id.to_hex()
    }

    /// Room receiving a conversation's messages.
    pub fn chat_room(chat_id: &ObjectId) -> String {
        format!("chat_{}", chat_id.to_hex())
    }

    /// Join a room, creating it on first subscription. The subscription ends
    /// when the returned receiver is dropped.
    pub fn subscribe(&self, room: &str) -> broadcast::Receiver<ServerEvent> {
        let mut rooms = self.rooms.write().expect("room registry lock poisoned");
        rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to a room. Returns how many connections it reached;
    /// zero means the event is gone — a client joining afterwards will not
    /// see it. Rooms everyone has left are pruned here.
    pub fn publish(&self, room: &str, event: ServerEvent) -> usize {
        let delivered = {
            let rooms = self.rooms.read().expect("room registry lock poisoned");
            match rooms.get(room) {
                Some(sender) => sender.send(event).unwrap_or(0),
                None => {
                    debug!("no subscribers in room {room}, event dropped");
                    return 0;
                }
            }
        };

        if delivered == 0 {
            let mut rooms = self.rooms.write().expect("room registry lock poisoned");
            if rooms.get(room).is_some_and(|s| s.receiver_count() == 0) {
                rooms.remove(room);
            }
        }

        delivered
    }

    #[cfg(test)]
    fn room_count(&self) -> usize {
        self.rooms.read().expect("room registry lock poisoned").len()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
