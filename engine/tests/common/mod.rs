//! Common Test Utilities for Integration Tests
//!
//! Mock collaborators served by real `axum` servers on ephemeral ports:
//! the location stream (WebSocket), OpenRouteService directions and the
//! tracked-user roster.

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, broadcast, mpsc};

pub const TEST_TOKEN: &str = "test-token";
pub const TEST_API_KEY: &str = "test-key";
pub const WAIT: Duration = Duration::from_secs(5);

/// Serve `app` on an ephemeral local port
pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn is_authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TEST_TOKEN))
}

// ============================================================================
// Mock Location Stream Server
// ============================================================================

#[derive(Clone)]
struct StreamServerState {
    to_clients: broadcast::Sender<String>,
    from_clients: mpsc::Sender<String>,
    kick: broadcast::Sender<()>,
    connections: Arc<AtomicUsize>,
    handshakes: Arc<AtomicUsize>,
}

/// WebSocket server speaking the location stream protocol
pub struct MockStreamServer {
    pub addr: SocketAddr,
    state: StreamServerState,
    received: Mutex<mpsc::Receiver<String>>,
}

impl MockStreamServer {
    pub async fn start() -> Self {
        let (to_clients, _) = broadcast::channel(64);
        let (from_clients, received) = mpsc::channel(64);
        let (kick, _) = broadcast::channel(4);
        let state = StreamServerState {
            to_clients,
            from_clients,
            kick,
            connections: Arc::new(AtomicUsize::new(0)),
            handshakes: Arc::new(AtomicUsize::new(0)),
        };

        let app = Router::new()
            .route("/ws", get(stream_handler))
            .with_state(state.clone());
        let addr = serve(app).await;

        Self {
            addr,
            state,
            received: Mutex::new(received),
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Broadcast a raw text frame to every connected client
    pub fn send_raw(&self, text: impl Into<String>) {
        let _ = self.state.to_clients.send(text.into());
    }

    pub fn send_location(&self, user_id: &str, latitude: f64, longitude: f64) {
        self.send_raw(
            json!({
                "event": "newLocation",
                "data": {
                    "userId": user_id,
                    "username": format!("user-{}", user_id),
                    "coords": {"latitude": latitude, "longitude": longitude}
                }
            })
            .to_string(),
        );
    }

    pub fn send_departure(&self, user_id: &str) {
        self.send_raw(json!({"event": "userLeft", "data": {"userId": user_id}}).to_string());
    }

    /// Drop every connection without a close handshake
    pub fn kick_all(&self) {
        let _ = self.state.kick.send(());
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn handshakes(&self) -> usize {
        self.state.handshakes.load(Ordering::SeqCst)
    }

    /// Wait until exactly `n` clients are connected
    pub async fn wait_for_connections(&self, n: usize) {
        tokio::time::timeout(WAIT, async {
            while self.connections() != n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for stream connections");
    }

    /// Next frame received from a client, parsed as JSON
    pub async fn next_message(&self) -> Value {
        let text = tokio::time::timeout(WAIT, async { self.received.lock().await.recv().await })
            .await
            .expect("timed out waiting for client frame")
            .expect("stream server stopped");
        serde_json::from_str(&text).unwrap()
    }
}

async fn stream_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<StreamServerState>,
) -> Response {
    if !is_authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.handshakes.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(move |socket| stream_socket(socket, state))
}

async fn stream_socket(mut socket: WebSocket, state: StreamServerState) {
    let mut to_clients = state.to_clients.subscribe();
    let mut kick = state.kick.subscribe();
    state.connections.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            frame = to_clients.recv() => match frame {
                Ok(text) => {
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            _ = kick.recv() => break,
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = state.from_clients.send(text).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.connections.fetch_sub(1, Ordering::SeqCst);
}

// ============================================================================
// Mock OpenRouteService
// ============================================================================

#[derive(Debug, Deserialize)]
struct DirectionsQuery {
    api_key: String,
    start: String,
    end: String,
}

fn parse_lng_lat(value: &str) -> Option<(f64, f64)> {
    let (lng, lat) = value.split_once(',')?;
    Some((lng.parse().ok()?, lat.parse().ok()?))
}

/// Directions endpoint answering `[start, midpoint, end]`
async fn directions(Query(query): Query<DirectionsQuery>) -> Response {
    if query.api_key != TEST_API_KEY {
        return StatusCode::FORBIDDEN.into_response();
    }
    let (Some(start), Some(end)) = (parse_lng_lat(&query.start), parse_lng_lat(&query.end)) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let mid = ((start.0 + end.0) / 2.0, (start.1 + end.1) / 2.0);

    Json(json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": [[start.0, start.1], [mid.0, mid.1], [end.0, end.1]]
            }
        }]
    }))
    .into_response()
}

pub async fn spawn_directions_server() -> SocketAddr {
    serve(Router::new().route("/v2/directions/:profile", get(directions))).await
}

/// Directions endpoint that always answers with `status`
pub async fn spawn_failing_directions_server(status: StatusCode) -> SocketAddr {
    serve(Router::new().route(
        "/v2/directions/:profile",
        get(move || async move { status }),
    ))
    .await
}

/// Directions endpoint answering a fixed JSON body
pub async fn spawn_fixed_directions_server(body: Value) -> SocketAddr {
    serve(Router::new().route(
        "/v2/directions/:profile",
        get(move || async move { Json(body) }),
    ))
    .await
}

// ============================================================================
// Mock Roster API
// ============================================================================

/// Roster endpoint returning `users` to authorized callers
pub async fn spawn_roster_server(users: Value) -> SocketAddr {
    let handler = move |headers: HeaderMap| async move {
        if !is_authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        Json(users).into_response()
    };
    serve(Router::new().route("/users/tracked-users", get(handler))).await
}
