//! Chat routes.
//!
//! POST /chat/start              - Find or lazily create a conversation
//! POST /chat/message            - Append a message to a conversation
//! GET  /chat/history/{user_id}  - Every conversation the user is part of
//!
//! All three require an authenticated session.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, to_bson, DateTime};
use tracing::info;

use crate::auth::SessionUser;
use crate::db;
use crate::error::AppError;
use crate::models::{
    CatalogCategory, Chat, ChatMessage, ChatStarted, MessageSent, SendMessageRequest,
    StartChatRequest,
};
use crate::notifier::{Notifier, ServerEvent};
use crate::state::AppState;

/// Build the chat router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat/start", post(start_chat))
        .route("/chat/message", post(send_message))
        .route("/chat/history/{user_id}", get(chat_history))
}

/// Open the conversation between a customer and the vendor owning an item.
///
/// A chat is keyed by (customer, vendor, item, itemType) and created on
/// first contact; calling this again returns the same chat. Concurrent first
/// contact is arbitrated by the unique index on that tuple.
async fn start_chat(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Json(req): Json<StartChatRequest>,
) -> Result<Json<ChatStarted>, AppError> {
    let (Some(raw_customer_id), Some(raw_item_id), Some(raw_item_type)) =
        (req.customer_id, req.item_id, req.item_type)
    else {
        return Err(AppError::validation("Missing required fields"));
    };

    let item_type = CatalogCategory::from_label(&raw_item_type)
        .ok_or_else(|| AppError::validation("Invalid item type"))?;
    let customer_id = ObjectId::parse_str(&raw_customer_id)
        .map_err(|_| AppError::validation("Invalid customerId"))?;
    let item_id =
        ObjectId::parse_str(&raw_item_id).map_err(|_| AppError::validation("Invalid itemId"))?;

    let item = db::items(&state.db, item_type)
        .find_one(doc! { "_id": item_id })
        .await?
        .ok_or(AppError::NotFound(item_type.label()))?;
    let vendor_id = item
        .vendor_id
        .ok_or_else(|| AppError::validation("No vendor assigned to this item"))?;

    let chats = db::chats(&state.db);
    let key = doc! {
        "customerId": customer_id,
        "vendorId": vendor_id,
        "itemId": item_id,
        "itemType": item_type.label(),
    };

    let chat = match chats.find_one(key.clone()).await? {
        Some(existing) => existing,
        None => {
            let fresh = Chat {
                id: ObjectId::new(),
                customer_id,
                vendor_id,
                item_id,
                item_type,
                messages: vec![],
            };
            match chats.insert_one(&fresh).await {
                Ok(_) => {
                    info!("Chat {} started between {} and vendor {}", fresh.id, customer_id, vendor_id);
                    fresh
                }
                // Lost the creation race; the unique index kept one winner.
                Err(err) if db::is_duplicate_key(&err) => chats
                    .find_one(key)
                    .await?
                    .ok_or(AppError::NotFound("Chat"))?,
                Err(err) => return Err(err.into()),
            }
        }
    };

    state
        .notifier
        .publish(&Notifier::chat_room(&chat.id), ServerEvent::ChatStarted(chat.clone()));

    Ok(Json(ChatStarted {
        chat_id: chat.id,
        messages: chat.messages,
    }))
}

/// Append a message to a conversation and fan it out to the room.
async fn send_message(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<MessageSent>, AppError> {
    let (Some(raw_chat_id), Some(raw_sender_id), Some(content)) =
        (req.chat_id, req.sender_id, req.content)
    else {
        return Err(AppError::validation("Missing required fields"));
    };

    let chat_id =
        ObjectId::parse_str(&raw_chat_id).map_err(|_| AppError::validation("Invalid chatId"))?;
    let sender_id = ObjectId::parse_str(&raw_sender_id)
        .map_err(|_| AppError::validation("Invalid senderId"))?;

    let message = ChatMessage {
        id: ObjectId::new(),
        sender_id,
        content,
        timestamp: DateTime::now(),
    };

    let message_doc = to_bson(&message).map_err(|e| AppError::Upstream(e.into()))?;
    let result = db::chats(&state.db)
        .update_one(doc! { "_id": chat_id }, doc! { "$push": { "messages": message_doc } })
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::NotFound("Chat"));
    }

    state
        .notifier
        .publish(&Notifier::chat_room(&chat_id), ServerEvent::NewMessage(message.clone()));

    Ok(Json(MessageSent {
        message: "Message sent".to_string(),
        data: message,
    }))
}

/// Every conversation where the user is the customer or the vendor.
async fn chat_history(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Chat>>, AppError> {
    let user_id =
        ObjectId::parse_str(&user_id).map_err(|_| AppError::validation("Invalid userId"))?;

    let chats: Vec<Chat> = db::chats(&state.db)
        .find(doc! { "$or": [ { "customerId": user_id }, { "vendorId": user_id } ] })
        .await?
        .try_collect()
        .await?;

    Ok(Json(chats))
}
