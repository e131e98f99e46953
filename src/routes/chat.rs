//! Chat route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::chat;
use crate::state::AppState;

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/api/chat/initiate", post(chat::initiate_chat))
        .route("/api/chat/messages", post(chat::send_message))
        .route("/api/chat/messages", get(chat::get_messages))
        .route("/api/chat/conversations", get(chat::list_conversations))
}
