//! Chat models and data structures

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::models::UserRole;

/// Chat message model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub body: String,
    pub machinery_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for sending a message
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    #[validate(length(min = 1, message = "Message body is required"))]
    pub body: String,
    pub machinery_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
}

/// Request DTO for bootstrapping a conversation
#[derive(Debug, Deserialize)]
pub struct InitiateChatRequest {
    pub receiver_id: Uuid,
    pub machinery_id: Option<Uuid>,
}

/// Response for conversation bootstrap; idempotent per counterpart
#[derive(Debug, Serialize)]
pub struct InitiateChatResponse {
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub existing: bool,
}

/// Query parameters for fetching a conversation
#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub user_id: Uuid,
}

/// Message with both participants' names attached
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MessageWithUsers {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub body: String,
    pub machinery_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,

    pub sender_name: String,
    pub receiver_name: String,
}

/// Latest message per counterpart (conversation list entry)
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub body: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub machinery_id: Option<Uuid>,

    pub counterpart_id: Uuid,
    pub counterpart_name: String,
    pub counterpart_role: UserRole,
}

/// Chat event types for real-time delivery
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type")]
pub enum ChatEvent {
    MessageSent {
        message_id: Uuid,
        sender_id: Uuid,
        receiver_id: Uuid,
        machinery_id: Option<Uuid>,
    },
}
