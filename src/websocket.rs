use crate::auth;
use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::models::Event;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::RwLock;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// WebSocket message types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "subscribe")]
    Subscribe {
        channel: String, // "event:{id}", "user:{id}"
        /// Bearer token; required for `user:` channels
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    #[serde(rename = "unsubscribe")]
    Unsubscribe {
        channel: String,
    },
    /// Seat counter moved on an event
    #[serde(rename = "seats_updated")]
    SeatsUpdated {
        event_id: String,
        enrolled_count: i32,
        capacity: i32,
        seats_remaining: i32,
    },
    /// A participant's enrollment reached `paid`
    #[serde(rename = "enrollment_confirmed")]
    EnrollmentConfirmed {
        enrollment_id: String,
        event_id: String,
        participant_id: String,
    },
    #[serde(rename = "enrollment_refunded")]
    EnrollmentRefunded {
        enrollment_id: String,
        event_id: String,
        participant_id: String,
    },
    #[serde(rename = "error")]
    Error {
        message: String,
    },
}

impl WsMessage {
    /// Channels a message is delivered on
    pub fn channels(&self) -> Vec<String> {
        match self {
            WsMessage::SeatsUpdated { event_id, .. } => vec![format!("event:{}", event_id)],
            // Enrollment changes are private to the participant
            WsMessage::EnrollmentConfirmed { participant_id, .. }
            | WsMessage::EnrollmentRefunded { participant_id, .. } => {
                vec![format!("user:{}", participant_id)]
            }
            _ => Vec::new(),
        }
    }
}

/// WebSocket server for live seat availability
pub struct WebSocketServer {
    /// Broadcast sender for sending messages to all clients
    tx: broadcast::Sender<WsMessage>,
    /// Active subscriptions: channel -> set of client IDs
    subscriptions: Arc<RwLock<HashMap<String, Vec<Uuid>>>>,
    /// Client subscriptions: client_id -> set of channels
    client_channels: Arc<RwLock<HashMap<Uuid, Vec<String>>>>,
    /// Token settings for `user:` subscriptions; without them those channels are refused
    auth: Option<AuthConfig>,
}

impl WebSocketServer {
    /// Create a new WebSocket server
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1000); // Buffer up to 1000 messages

        Self {
            tx,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            client_channels: Arc::new(RwLock::new(HashMap::new())),
            auth: None,
        }
    }

    /// Verify bearer tokens on `user:` subscriptions
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Check that a client may listen on `channel`.
    ///
    /// `event:` channels are public. A `user:<id>` channel needs a valid
    /// token whose user id is `<id>`.
    pub fn authorize_subscription(&self, channel: &str, token: Option<&str>) -> AppResult<()> {
        let Some(owner) = channel.strip_prefix("user:") else {
            return Ok(());
        };

        let auth = self
            .auth
            .as_ref()
            .ok_or_else(|| AppError::Forbidden("User channels are not available".to_string()))?;
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;
        let claims = auth::verify_token(&auth.token_secret, token, auth.token_ttl_secs)?;

        match Uuid::parse_str(owner) {
            Ok(owner) if owner == claims.user_id => Ok(()),
            _ => Err(AppError::Forbidden("Cannot subscribe to another user's channel".to_string())),
        }
    }

    /// Apply one text frame from a client and build the reply, if any
    pub async fn handle_client_text(&self, client_id: Uuid, text: &str) -> Option<serde_json::Value> {
        match serde_json::from_str::<WsMessage>(text) {
            Ok(WsMessage::Subscribe { channel, token }) => {
                if let Err(e) = self.authorize_subscription(&channel, token.as_deref()) {
                    warn!("Client {} refused {}: {}", client_id, channel, e);
                    return Some(serde_json::json!({
                        "type": "error",
                        "channel": channel,
                        "message": e.to_string(),
                    }));
                }
                self.subscribe(client_id, channel.clone()).await;
                Some(serde_json::json!({ "type": "subscribed", "channel": channel }))
            }
            Ok(WsMessage::Unsubscribe { channel }) => {
                self.unsubscribe(client_id, &channel).await;
                Some(serde_json::json!({ "type": "unsubscribed", "channel": channel }))
            }
            Ok(_) => {
                warn!("Unexpected message type from client {}", client_id);
                None
            }
            Err(_) => {
                warn!("Failed to parse message from client {}: {}", client_id, text);
                Some(serde_json::json!({ "type": "error", "message": "Invalid message format" }))
            }
        }
    }

    /// Get broadcast sender
    pub fn sender(&self) -> broadcast::Sender<WsMessage> {
        self.tx.clone()
    }

    /// Publish a message if anyone listens on one of its channels
    pub async fn publish(&self, message: WsMessage) {
        let subscriptions = self.subscriptions.read().await;
        let listeners: usize = message
            .channels()
            .iter()
            .filter_map(|c| subscriptions.get(c))
            .map(Vec::len)
            .sum();

        if listeners == 0 {
            return;
        }

        debug!("Broadcasting to {} subscribers", listeners);
        if let Err(e) = self.tx.send(message) {
            warn!("Failed to broadcast message: {}", e);
        }
    }

    /// Subscribe a client to a channel
    pub async fn subscribe(&self, client_id: Uuid, channel: String) {
        let mut subscriptions = self.subscriptions.write().await;
        let mut client_channels = self.client_channels.write().await;

        let subscribers = subscriptions.entry(channel.clone()).or_default();
        if !subscribers.contains(&client_id) {
            subscribers.push(client_id);
        }

        let channels = client_channels.entry(client_id).or_default();
        if !channels.contains(&channel) {
            channels.push(channel.clone());
        }

        info!("Client {} subscribed to {}", client_id, channel);
    }

    /// Unsubscribe a client from a channel
    pub async fn unsubscribe(&self, client_id: Uuid, channel: &str) {
        let mut subscriptions = self.subscriptions.write().await;
        let mut client_channels = self.client_channels.write().await;

        if let Some(subscribers) = subscriptions.get_mut(channel) {
            subscribers.retain(|&id| id != client_id);
            if subscribers.is_empty() {
                subscriptions.remove(channel);
            }
        }

        if let Some(channels) = client_channels.get_mut(&client_id) {
            channels.retain(|c| c != channel);
        }

        info!("Client {} unsubscribed from {}", client_id, channel);
    }

    /// Get all channels a client is subscribed to
    pub async fn get_client_channels(&self, client_id: Uuid) -> Vec<String> {
        let client_channels = self.client_channels.read().await;
        client_channels.get(&client_id).cloned().unwrap_or_default()
    }

    async fn is_client_subscribed_any(&self, client_id: Uuid, channels: &[String]) -> bool {
        let subscriptions = self.subscriptions.read().await;
        channels.iter().any(|channel| {
            subscriptions
                .get(channel)
                .map_or(false, |subscribers| subscribers.contains(&client_id))
        })
    }

    async fn disconnect(&self, client_id: Uuid) {
        for channel in self.get_client_channels(client_id).await {
            self.unsubscribe(client_id, &channel).await;
        }
        self.client_channels.write().await.remove(&client_id);
    }

    /// Handle a new WebSocket connection
    pub async fn handle_connection(&self, stream: tokio::net::TcpStream) -> AppResult<()> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| AppError::Message(format!("WebSocket handshake failed: {}", e)))?;

        let (ws_sender, mut ws_receiver) = ws_stream.split();
        let mut rx = self.tx.subscribe();
        let client_id = Uuid::new_v4();

        info!("New WebSocket connection: {}", client_id);

        let ws_sender = Arc::new(tokio::sync::Mutex::new(ws_sender));

        let welcome = serde_json::json!({
            "type": "connected",
            "client_id": client_id.to_string(),
        });
        if let Err(e) = ws_sender.lock().await.send(Message::Text(welcome.to_string())).await {
            warn!("Failed to send welcome message: {}", e);
        }

        // Incoming subscription requests
        let ws_server_for_receiver = self.clone();
        let ws_sender_for_receiver = ws_sender.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let Some(reply) = ws_server_for_receiver.handle_client_text(client_id, &text).await
                        else {
                            continue;
                        };

                        let mut sender = ws_sender_for_receiver.lock().await;
                        if let Err(e) = sender.send(Message::Text(reply.to_string())).await {
                            warn!("Failed to send reply: {}", e);
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("WebSocket connection closed: {}", client_id);
                        break;
                    }
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            ws_server_for_receiver.disconnect(client_id).await;
        });

        // Outgoing broadcasts, filtered by this client's subscriptions
        let ws_server_clone = self.clone();
        tokio::spawn(async move {
            loop {
                let msg = match rx.recv().await {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Client {} lagged, skipped {} messages", client_id, skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if !ws_server_clone
                    .is_client_subscribed_any(client_id, &msg.channels())
                    .await
                {
                    continue;
                }

                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };

                let mut sender = ws_sender.lock().await;
                if let Err(e) = sender.send(Message::Text(json)).await {
                    debug!("Client {} gone: {}", client_id, e);
                    break;
                }
            }
        });

        Ok(())
    }

    /// Broadcast the current seat counter of an event
    pub async fn broadcast_seats(&self, event: &Event) {
        self.publish(WsMessage::SeatsUpdated {
            event_id: event.id.to_string(),
            enrolled_count: event.enrolled_count,
            capacity: event.capacity,
            seats_remaining: event.seats_remaining(),
        })
        .await;
    }

    pub async fn broadcast_enrollment_confirmed(
        &self,
        enrollment_id: Uuid,
        event_id: Uuid,
        participant_id: Uuid,
    ) {
        self.publish(WsMessage::EnrollmentConfirmed {
            enrollment_id: enrollment_id.to_string(),
            event_id: event_id.to_string(),
            participant_id: participant_id.to_string(),
        })
        .await;
    }

    pub async fn broadcast_enrollment_refunded(
        &self,
        enrollment_id: Uuid,
        event_id: Uuid,
        participant_id: Uuid,
    ) {
        self.publish(WsMessage::EnrollmentRefunded {
            enrollment_id: enrollment_id.to_string(),
            event_id: event_id.to_string(),
            participant_id: participant_id.to_string(),
        })
        .await;
    }
}

impl Clone for WebSocketServer {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            subscriptions: Arc::clone(&self.subscriptions),
            client_channels: Arc::clone(&self.client_channels),
            auth: self.auth.clone(),
        }
    }
}

impl Default for WebSocketServer {
    fn default() -> Self {
        Self::new()
    }
}
