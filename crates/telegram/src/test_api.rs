//! In-process stand-in for the Bot API, for connector tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    axum::{Json, Router, extract::State, http::StatusCode, http::Uri, routing::post},
    serde_json::{Value, json},
    teloxide::{Bot, types::Message},
    tokio::sync::oneshot,
};

use crate::{
    error::Result,
    handler::{UpdateHandler, message_text},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMode {
    Healthy,
    /// Every call fails with 401.
    Unauthorized,
    /// `getUpdates` fails with the "other instance" conflict.
    Conflict,
}

#[derive(Clone)]
struct ApiState {
    mode: ApiMode,
    updates: Arc<Mutex<VecDeque<Value>>>,
    calls: Arc<Mutex<HashMap<String, usize>>>,
}

pub struct MockBotApi {
    addr: SocketAddr,
    state: ApiState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockBotApi {
    pub async fn start(mode: ApiMode) -> Self {
        let state = ApiState {
            mode,
            updates: Arc::default(),
            calls: Arc::default(),
        };
        let app = Router::new()
            .route("/{*path}", post(api_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("serve mock bot api");
        });

        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn push_text_update(&self, update_id: i32, text: &str) {
        self.state.updates.lock().unwrap().push_back(json!({
            "update_id": update_id,
            "message": {
                "message_id": update_id,
                "date": 1,
                "chat": { "id": 42, "type": "private", "first_name": "Alice" },
                "from": { "id": 1001, "is_bot": false, "first_name": "Alice" },
                "text": text
            }
        }));
    }

    /// Number of calls to `method` (case-insensitive).
    pub fn calls(&self, method: &str) -> usize {
        self.state
            .calls
            .lock()
            .unwrap()
            .get(&method.to_ascii_lowercase())
            .copied()
            .unwrap_or(0)
    }
}

impl Drop for MockBotApi {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn ok(result: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "ok": true, "result": result })))
}

fn failure(status: StatusCode, description: &str) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "ok": false,
            "error_code": status.as_u16(),
            "description": description
        })),
    )
}

async fn api_handler(State(state): State<ApiState>, uri: Uri) -> (StatusCode, Json<Value>) {
    let method = uri
        .path()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    *state.calls.lock().unwrap().entry(method.clone()).or_default() += 1;

    match (state.mode, method.as_str()) {
        (ApiMode::Unauthorized, _) => failure(StatusCode::UNAUTHORIZED, "Unauthorized"),
        (_, "getme") => ok(json!({
            "id": 4242,
            "is_bot": true,
            "first_name": "Mock",
            "username": "mock_bot",
            "can_join_groups": true,
            "can_read_all_group_messages": false,
            "supports_inline_queries": false,
            "can_connect_to_business": false,
            "has_main_web_app": false
        })),
        (ApiMode::Conflict, "getupdates") => failure(
            StatusCode::CONFLICT,
            "Conflict: terminated by other getUpdates request; make sure that only one bot instance is running",
        ),
        (_, "getupdates") => {
            let batch: Vec<Value> = state.updates.lock().unwrap().drain(..).collect();
            if batch.is_empty() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            ok(Value::Array(batch))
        },
        _ => ok(json!(true)),
    }
}

/// Records the text of every message it receives.
#[derive(Default)]
pub struct RecordingHandler {
    texts: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpdateHandler for RecordingHandler {
    async fn handle_message(&self, _bot: &Bot, message: Message) -> Result<()> {
        if let Some(text) = message_text(&message) {
            self.texts.lock().unwrap().push(text.to_string());
        }
        Ok(())
    }
}
