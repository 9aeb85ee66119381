//! WebSocket connection to the location stream server

use futures_util::{SinkExt, StreamExt};
use metrics::counter;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header::AUTHORIZATION};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use super::types::{StreamError, StreamEvent, StreamStatus};
use crate::config::{IdentityConfig, ReconnectConfig, StreamConfig};
use crate::geo::Coordinate;
use crate::protocol::{ClientMessage, LocationPayload, ServerMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Factory for authenticated stream connections
pub struct LocationStreamClient {
    config: StreamConfig,
}

impl LocationStreamClient {
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }

    /// Open the stream for `identity`
    ///
    /// Fails with `MissingToken` before touching the network when the
    /// identity carries no token. Inbound updates and status changes are
    /// delivered on `events`.
    pub async fn connect(
        &self,
        identity: &IdentityConfig,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<StreamHandle, StreamError> {
        let token = identity
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(StreamError::MissingToken)?;

        let ws = open(&self.config.url, token).await?;
        info!("Location stream connected: {}", self.config.url);
        let _ = events
            .send(StreamEvent::Status(StreamStatus::Connected))
            .await;

        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_buffer);
        let connection = Connection {
            url: self.config.url.clone(),
            token: token.to_string(),
            reconnect: self.config.reconnect.clone(),
            outbound: outbound_rx,
            events,
        };
        let task = tokio::spawn(connection.run(ws));

        Ok(StreamHandle {
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            outbound: outbound_tx,
            task,
        })
    }
}

/// Owned handle to a live stream connection
///
/// Dropping the handle also closes the connection; `disconnect` additionally
/// waits for the close handshake.
pub struct StreamHandle {
    user_id: String,
    username: String,
    outbound: mpsc::Sender<ClientMessage>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Queue the local position for sending. Never waits.
    pub fn publish(&self, coordinate: Coordinate) -> Result<(), StreamError> {
        let msg = ClientMessage::LocationUpdate(LocationPayload {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            coords: coordinate,
        });

        self.outbound.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => StreamError::QueueFull,
            TrySendError::Closed(_) => StreamError::Closed,
        })
    }

    /// Whether the connection task is still running
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Close the connection and release the connection task
    pub async fn disconnect(self) {
        let StreamHandle {
            outbound, mut task, ..
        } = self;
        drop(outbound);

        if tokio::time::timeout(DISCONNECT_TIMEOUT, &mut task)
            .await
            .is_err()
        {
            warn!("Location stream did not close in time, aborting");
            task.abort();
        }
        info!("Location stream disconnected");
    }
}

/// Open an authenticated WebSocket
async fn open(url: &str, token: &str) -> Result<WsStream, StreamError> {
    let mut request = url.into_client_request()?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| StreamError::InvalidRequest(e.to_string()))?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    let (ws, response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(request))
        .await
        .map_err(|_| StreamError::Timeout)??;
    debug!("Stream handshake completed: {}", response.status());
    Ok(ws)
}

enum PumpExit {
    /// The handle was released or the state owner went away
    Shutdown,
    /// The connection failed underneath us
    Dropped,
}

/// State of the background connection task
struct Connection {
    url: String,
    token: String,
    reconnect: ReconnectConfig,
    outbound: mpsc::Receiver<ClientMessage>,
    events: mpsc::Sender<StreamEvent>,
}

impl Connection {
    async fn run(mut self, mut ws: WsStream) {
        loop {
            match self.pump(&mut ws).await {
                PumpExit::Shutdown => {
                    if let Err(e) = ws.close(None).await {
                        debug!("Close handshake failed: {}", e);
                    }
                    self.report_closed();
                    return;
                }
                PumpExit::Dropped => {
                    warn!("Location stream dropped");
                    match self.reconnect().await {
                        Some(fresh) => ws = fresh,
                        None => {
                            self.report_closed();
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn pump(&mut self, ws: &mut WsStream) -> PumpExit {
        loop {
            tokio::select! {
                outgoing = self.outbound.recv() => {
                    let Some(msg) = outgoing else {
                        return PumpExit::Shutdown;
                    };
                    match serde_json::to_string(&msg) {
                        Ok(json) => {
                            if let Err(e) = ws.send(Message::Text(json.into())).await {
                                warn!("Failed to send on location stream: {}", e);
                                return PumpExit::Dropped;
                            }
                            counter!("convoy_stream_messages_total", "direction" => "outbound", "type" => msg.message_type()).increment(1);
                        }
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                        }
                    }
                }
                incoming = ws.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if !self.handle_text(&text).await {
                                return PumpExit::Shutdown;
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            info!("Server closed the location stream");
                            return PumpExit::Dropped;
                        }
                        Some(Ok(_)) => {
                            // Ping/pong are answered by tungstenite; binary is not part of the protocol
                        }
                        Some(Err(e)) => {
                            warn!("Location stream error: {}", e);
                            return PumpExit::Dropped;
                        }
                        None => return PumpExit::Dropped,
                    }
                }
            }
        }
    }

    /// Forward one text frame. Returns false once the state owner is gone.
    async fn handle_text(&self, text: &str) -> bool {
        let msg = match serde_json::from_str::<ServerMessage>(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Failed to parse stream message: {}", e);
                return true;
            }
        };
        counter!("convoy_stream_messages_total", "direction" => "inbound", "type" => msg.message_type()).increment(1);

        let event = match msg {
            ServerMessage::NewLocation(payload) => StreamEvent::Location(payload),
            ServerMessage::UserLeft(payload) => StreamEvent::Departed(payload),
            ServerMessage::Unknown => {
                debug!("Ignoring unknown stream event");
                return true;
            }
        };
        self.events.send(event).await.is_ok()
    }

    /// Retry with exponential backoff; `None` when out of attempts or released
    async fn reconnect(&mut self) -> Option<WsStream> {
        for attempt in 1..=self.reconnect.max_attempts {
            self.report(StreamStatus::Reconnecting { attempt }).await;
            counter!("convoy_stream_reconnects_total").increment(1);

            let backoff = tokio::time::sleep(self.reconnect.backoff_for(attempt));
            tokio::pin!(backoff);
            loop {
                tokio::select! {
                    _ = &mut backoff => break,
                    outgoing = self.outbound.recv() => match outgoing {
                        None => return None,
                        Some(msg) => debug!("Dropping {} while reconnecting", msg.message_type()),
                    }
                }
            }

            match open(&self.url, &self.token).await {
                Ok(ws) => {
                    info!("Location stream reconnected after {} attempt(s)", attempt);
                    self.report(StreamStatus::Connected).await;
                    return Some(ws);
                }
                Err(e) => warn!("Reconnect attempt {} failed: {}", attempt, e),
            }
        }
        None
    }

    async fn report(&self, status: StreamStatus) {
        let _ = self.events.send(StreamEvent::Status(status)).await;
    }

    /// Final status; must not hold up `disconnect` behind a full queue
    fn report_closed(&self) {
        if let Err(e) = self
            .events
            .try_send(StreamEvent::Status(StreamStatus::Disconnected))
        {
            debug!("Dropped final stream status: {}", e);
        }
    }
}
