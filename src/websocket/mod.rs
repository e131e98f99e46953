//! WebSocket server for real-time booking and chat updates
//!
//! Clients may pass `?token=<access token>` to receive their chat events;
//! booking events are filtered by explicit subscription.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use futures_util::{SinkExt, StreamExt};

use crate::auth::verify_token;
use crate::booking::BookingEvent;
use crate::chat::ChatEvent;
use crate::state::AppState;

/// Everything the hub can broadcast
#[derive(Debug, Serialize, Clone)]
#[serde(untagged)]
pub enum MarketEvent {
    Booking(BookingEvent),
    Chat(ChatEvent),
}

impl From<BookingEvent> for MarketEvent {
    fn from(event: BookingEvent) -> Self {
        MarketEvent::Booking(event)
    }
}

impl From<ChatEvent> for MarketEvent {
    fn from(event: ChatEvent) -> Self {
        MarketEvent::Chat(event)
    }
}

/// WebSocket server state
#[derive(Clone)]
pub struct WsState {
    /// Broadcast channel for marketplace events
    pub tx: broadcast::Sender<MarketEvent>,
    /// Connected clients registry
    clients: Arc<RwLock<HashMap<String, ClientInfo>>>,
}

/// Client connection information
#[derive(Debug, Clone)]
struct ClientInfo {
    /// Authenticated user, when a valid token was presented
    user_id: Option<Uuid>,
    subscribed_bookings: Vec<Uuid>,
}

/// Client message types
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    Subscribe { booking_ids: Vec<Uuid> },
    Unsubscribe { booking_ids: Vec<Uuid> },
    Ping,
}

/// Server message types
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ServerMessage {
    Event { event: MarketEvent },
    Subscribed { booking_ids: Vec<Uuid> },
    Unsubscribed { booking_ids: Vec<Uuid> },
    Pong,
}

impl Default for WsState {
    fn default() -> Self {
        Self::new()
    }
}

impl WsState {
    /// Create new WebSocket state
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self {
            tx,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Broadcast a marketplace event to all connected clients
    pub async fn broadcast_event(&self, event: impl Into<MarketEvent>) {
        // An error only means nobody is connected right now
        let _ = self.tx.send(event.into());
    }

    async fn register_client(&self, client_id: String, user_id: Option<Uuid>) {
        let mut clients = self.clients.write().await;
        clients.insert(
            client_id,
            ClientInfo {
                user_id,
                subscribed_bookings: vec![],
            },
        );
    }

    async fn unregister_client(&self, client_id: &str) {
        let mut clients = self.clients.write().await;
        clients.remove(client_id);
        tracing::info!("Client {} disconnected", client_id);
    }

    async fn set_subscriptions(&self, client_id: &str, booking_ids: Vec<Uuid>) {
        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get_mut(client_id) {
            client.subscribed_bookings = booking_ids;
        }
    }

    async fn remove_subscriptions(&self, client_id: &str, booking_ids: &[Uuid]) {
        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get_mut(client_id) {
            client
                .subscribed_bookings
                .retain(|id| !booking_ids.contains(id));
        }
    }
}

/// Should this event reach this client?
fn event_visible(info: &ClientInfo, event: &MarketEvent) -> bool {
    match event {
        MarketEvent::Booking(booking_event) => {
            info.subscribed_bookings.is_empty()
                || info.subscribed_bookings.contains(&booking_event.booking_id())
        }
        // Chat is private: only the two participants see it
        MarketEvent::Chat(ChatEvent::MessageSent {
            sender_id,
            receiver_id,
            ..
        }) => info.user_id == Some(*sender_id) || info.user_id == Some(*receiver_id),
    }
}

/// Query parameters accepted on the upgrade request
#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// WebSocket handler - upgrades HTTP connection to WebSocket
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    // A bad token degrades to an anonymous connection rather than failing
    // the upgrade; chat events simply won't be delivered.
    let user_id = params
        .token
        .as_deref()
        .and_then(|token| verify_token(token, state.auth_service.jwt_secret()).ok())
        .filter(|claims| claims.token_type == "access")
        .and_then(|claims| Uuid::parse_str(&claims.sub).ok());

    ws.on_upgrade(move |socket| handle_socket(socket, state.ws_state.clone(), user_id))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: WsState, user_id: Option<Uuid>) {
    let client_id = Uuid::new_v4().to_string();
    state.register_client(client_id.clone(), user_id).await;

    let (mut sender, mut receiver) = socket.split();

    // Internal channel for sending messages from recv_task to sender
    let (internal_tx, mut internal_rx) = mpsc::channel::<ServerMessage>(32);

    let mut rx = state.tx.subscribe();
    let client_id_send = client_id.clone();
    let state_send = state.clone();

    // Forward broadcast events and internal confirmations to this client
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Ok(event) = rx.recv() => {
                    let clients = state_send.clients.read().await;
                    let visible = clients
                        .get(&client_id_send)
                        .map(|info| event_visible(info, &event))
                        .unwrap_or(false);
                    drop(clients);

                    if visible {
                        let msg = ServerMessage::Event { event };
                        if let Ok(text) = serde_json::to_string(&msg) {
                            if sender.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Some(msg) = internal_rx.recv() => {
                    if let Ok(text) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                }
                else => break,
            }
        }
    });

    // Handle incoming messages from the client
    let state_recv = state.clone();
    let client_id_recv = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) {
                    match client_msg {
                        ClientMessage::Subscribe { booking_ids } => {
                            state_recv
                                .set_subscriptions(&client_id_recv, booking_ids.clone())
                                .await;
                            let _ = internal_tx
                                .send(ServerMessage::Subscribed { booking_ids })
                                .await;
                            tracing::info!("Client {} subscribed", client_id_recv);
                        }
                        ClientMessage::Unsubscribe { booking_ids } => {
                            state_recv
                                .remove_subscriptions(&client_id_recv, &booking_ids)
                                .await;
                            let _ = internal_tx
                                .send(ServerMessage::Unsubscribed { booking_ids })
                                .await;
                        }
                        ClientMessage::Ping => {
                            let _ = internal_tx.send(ServerMessage::Pong).await;
                        }
                    }
                }
            } else if let Message::Close(_) = msg {
                break;
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.unregister_client(&client_id).await;
}
