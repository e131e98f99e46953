//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::auth::AuthService;
use crate::booking::BookingService;
use crate::chat::ChatService;
use crate::machinery::MachineryService;
use crate::retry::RetryPolicy;
use crate::review::ReviewService;
use crate::websocket::WsState;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub retry_policy: RetryPolicy,
    pub auth_service: Arc<AuthService>,
    pub machinery_service: Arc<MachineryService>,
    pub booking_service: Arc<BookingService>,
    pub review_service: Arc<ReviewService>,
    pub chat_service: Arc<ChatService>,
    pub ws_state: WsState,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db_pool: PgPool,
        retry_policy: RetryPolicy,
        auth_service: Arc<AuthService>,
        machinery_service: Arc<MachineryService>,
        booking_service: Arc<BookingService>,
        review_service: Arc<ReviewService>,
        chat_service: Arc<ChatService>,
        ws_state: WsState,
    ) -> Self {
        Self {
            db_pool,
            retry_policy,
            auth_service,
            machinery_service,
            booking_service,
            review_service,
            chat_service,
            ws_state,
        }
    }
}

impl FromRef<AppState> for WsState {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ws_state.clone()
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for Arc<MachineryService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.machinery_service.clone()
    }
}

impl FromRef<AppState> for Arc<BookingService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.booking_service.clone()
    }
}

impl FromRef<AppState> for Arc<ReviewService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.review_service.clone()
    }
}

impl FromRef<AppState> for Arc<ChatService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.chat_service.clone()
    }
}
