use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use maze_chase_server::constants::TICK_MS;
use maze_chase_server::engine::{GameEngine, GameEngineOptions};
use maze_chase_server::score_store::HighScoreStore;
use maze_chase_server::server_protocol::{parse_client_message, ParsedClientMessage};
use maze_chase_server::server_utils::{
    normalize_start_level, parse_highscore_limit, sanitize_name,
};
use maze_chase_server::types::GameStatus;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Ticks to linger on the level-complete screen before loading the next
/// level.
const LEVEL_INTERMISSION_TICKS: u32 = 60;

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
    name: Option<String>,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ServerState {
    clients: HashMap<String, ClientContext>,
    /// The client steering the player; first to say hello wins, everyone
    /// else spectates.
    pilot_id: Option<String>,
    game: Option<GameEngine>,
    intermission_ticks: u32,
    highscore_store: HighScoreStore,
}

impl ServerState {
    fn new(highscore_store: HighScoreStore) -> Self {
        Self {
            clients: HashMap::new(),
            pilot_id: None,
            game: None,
            intermission_ticks: 0,
            highscore_store,
        }
    }

    fn pilot_name(&self) -> String {
        self.pilot_id
            .as_ref()
            .and_then(|id| self.clients.get(id))
            .and_then(|client| client.name.clone())
            .unwrap_or_else(|| "Player".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct HighScoreQuery {
    limit: Option<String>,
}

#[tokio::main]
async fn main() {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let highscore_path = std::env::var("HIGHSCORE_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".data/highscores.json"));

    let state = Arc::new(Mutex::new(ServerState::new(HighScoreStore::new(
        highscore_path,
    ))));
    start_tick_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/highscores", get(highscores_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        println!(
            "[server] static file root: {}",
            static_dir.to_string_lossy()
        );
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        eprintln!("[server] static file root not found. running API-only.");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    println!("[server] listening on :{port}");
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

fn resolve_static_dir() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("STATIC_DIR") {
        let path = PathBuf::from(raw);
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }
    let candidates = [PathBuf::from("dist/client"), PathBuf::from("../client/dist")];
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn highscores_handler(
    State(state): State<SharedState>,
    Query(query): Query<HighScoreQuery>,
) -> impl IntoResponse {
    let guard = state.lock().await;
    Json(
        guard
            .highscore_store
            .build_response(parse_highscore_limit(query.limit.as_deref())),
    )
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    {
        let mut guard = state.lock().await;
        guard
            .clients
            .insert(client_id.clone(), ClientContext { tx, name: None });
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };
        match message {
            Message::Text(raw) => {
                handle_client_message(state.clone(), &client_id, raw.to_string()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = String::from_utf8(raw.to_vec()) {
                    handle_client_message(state.clone(), &client_id, text).await;
                } else {
                    send_error_to_client(&state, &client_id, "invalid utf8 message").await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    {
        let mut guard = state.lock().await;
        disconnect_client(&mut guard, &client_id);
    }
    writer.abort();
}

async fn handle_client_message(state: SharedState, client_id: &str, raw: String) {
    let Some(parsed) = parse_client_message(&raw) else {
        send_error_to_client(&state, client_id, "unrecognized message").await;
        return;
    };

    let mut guard = state.lock().await;
    match parsed {
        ParsedClientMessage::Hello { name } => {
            let name = sanitize_name(&name);
            if let Some(client) = guard.clients.get_mut(client_id) {
                client.name = Some(name.clone());
            }
            let is_pilot = match &guard.pilot_id {
                Some(existing) => existing == client_id,
                None => {
                    guard.pilot_id = Some(client_id.to_string());
                    true
                }
            };
            let highscores = guard.highscore_store.build_response(None);
            send_to_client(
                &mut guard,
                client_id,
                &json!({
                    "type": "hello_ack",
                    "name": name,
                    "pilot": is_pilot,
                    "highscores": highscores,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
        ParsedClientMessage::Start { level, seed } => {
            if !is_pilot(&guard, client_id) {
                send_error_to_client_sync(&mut guard, client_id, "only the pilot can start");
                return;
            }
            let seed = seed.unwrap_or_else(rand::random::<u32>);
            let options = GameEngineOptions {
                starting_level: normalize_start_level(level),
                ..GameEngineOptions::default()
            };
            guard.game = Some(GameEngine::new(seed, options));
            guard.intermission_ticks = 0;
            println!("[server] game started (seed {seed})");
            broadcast(
                &mut guard,
                &json!({ "type": "game_started", "seed": seed }),
                QueuePolicy::DisconnectOnFull,
            );
        }
        ParsedClientMessage::Input { dir } => {
            if is_pilot(&guard, client_id) {
                if let Some(game) = guard.game.as_mut() {
                    game.set_direction_intent(dir);
                }
            }
        }
        ParsedClientMessage::Pause => {
            if is_pilot(&guard, client_id) {
                if let Some(game) = guard.game.as_mut() {
                    game.pause();
                }
            }
        }
        ParsedClientMessage::Resume => {
            if is_pilot(&guard, client_id) {
                if let Some(game) = guard.game.as_mut() {
                    game.resume();
                }
            }
        }
        ParsedClientMessage::Ping { t } => {
            send_to_client(
                &mut guard,
                client_id,
                &json!({ "type": "pong", "t": t }),
                QueuePolicy::DropOnFull,
            );
        }
    }
}

fn is_pilot(state: &ServerState, client_id: &str) -> bool {
    state.pilot_id.as_deref() == Some(client_id)
}

fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            tick_game(&mut guard);
        }
    });
}

fn tick_game(state: &mut ServerState) {
    let snapshot = {
        let Some(game) = state.game.as_mut() else {
            return;
        };
        game.step(TICK_MS);
        game.build_snapshot(true)
    };
    let (status, final_score, final_level) = (snapshot.status, snapshot.score, snapshot.level);

    broadcast(
        state,
        &json!({
            "type": "state",
            "snapshot": snapshot,
        }),
        QueuePolicy::DropOnFull,
    );

    match status {
        GameStatus::LevelComplete => {
            state.intermission_ticks += 1;
            if state.intermission_ticks >= LEVEL_INTERMISSION_TICKS {
                state.intermission_ticks = 0;
                if let Some(game) = state.game.as_mut() {
                    game.advance_level();
                }
            }
        }
        GameStatus::GameOver => {
            let name = state.pilot_name();
            let new_best = state.highscore_store.record_score(&name, final_score);
            let high_score = state.highscore_store.best_overall();
            println!("[server] game over: {name} scored {final_score} (level {final_level})");
            broadcast(
                state,
                &json!({
                    "type": "game_over",
                    "finalScore": final_score,
                    "level": final_level,
                    "highScore": high_score,
                    "newBest": new_best,
                }),
                QueuePolicy::DisconnectOnFull,
            );
            state.game = None;
        }
        _ => {}
    }
}

fn disconnect_client(state: &mut ServerState, client_id: &str) {
    let _ = state.clients.remove(client_id);
    if state.pilot_id.as_deref() == Some(client_id) {
        // Hand control to any remaining named client.
        state.pilot_id = state
            .clients
            .iter()
            .find(|(_, client)| client.name.is_some())
            .map(|(id, _)| id.clone());
        if let Some(game) = state.game.as_mut() {
            game.pause();
        }
    }
}

fn send_to_client(state: &mut ServerState, client_id: &str, message: &Value, policy: QueuePolicy) {
    let send_failed = if let Some(client) = state.clients.get(client_id) {
        client
            .tx
            .try_send(OutboundMessage::Text(message.to_string()))
            .is_err()
    } else {
        false
    };
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        force_disconnect(state, client_id);
    }
}

fn broadcast(state: &mut ServerState, message: &Value, policy: QueuePolicy) {
    let client_ids: Vec<String> = state.clients.keys().cloned().collect();
    for client_id in client_ids {
        send_to_client(state, &client_id, message, policy);
    }
}

fn force_disconnect(state: &mut ServerState, client_id: &str) {
    if let Some(client) = state.clients.get(client_id) {
        let _ = client.tx.try_send(OutboundMessage::Close {
            code: 1008,
            reason: "send queue overflow".to_string(),
        });
    }
    disconnect_client(state, client_id);
}

async fn send_error_to_client(state: &SharedState, client_id: &str, message: &str) {
    let mut guard = state.lock().await;
    send_error_to_client_sync(&mut guard, client_id, message);
}

fn send_error_to_client_sync(state: &mut ServerState, client_id: &str, message: &str) {
    send_to_client(
        state,
        client_id,
        &json!({ "type": "error", "message": message }),
        QueuePolicy::DropOnFull,
    );
}

fn make_id(prefix: &str) -> String {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{id}")
}
