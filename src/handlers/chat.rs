//! Chat-related API handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use super::AuthenticatedUser;
use crate::chat::{
    ChatEvent, ChatMessage, ConversationQuery, ConversationSummary, InitiateChatRequest,
    InitiateChatResponse, MessageWithUsers, SendMessageRequest,
};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/chat/initiate - Bootstrap a conversation (idempotent)
pub async fn initiate_chat(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<InitiateChatRequest>,
) -> Result<Json<InitiateChatResponse>, ApiError> {
    let response = state.chat_service.initiate(user.user_id, req).await?;

    Ok(Json(response))
}

/// POST /api/chat/messages - Send a message
pub async fn send_message(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    req.validate()?;

    let message = state.chat_service.send_message(user.user_id, req).await?;

    state
        .ws_state
        .broadcast_event(ChatEvent::MessageSent {
            message_id: message.id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            machinery_id: message.machinery_id,
        })
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/chat/messages?user_id= - Conversation with another user;
/// fetching marks their messages as read
pub async fn get_messages(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<Vec<MessageWithUsers>>, ApiError> {
    let messages = state
        .chat_service
        .conversation_with(user.user_id, query.user_id)
        .await?;

    Ok(Json(messages))
}

/// GET /api/chat/conversations - Latest message per counterpart
pub async fn list_conversations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let conversations = state.chat_service.conversations(user.user_id).await?;

    Ok(Json(conversations))
}
