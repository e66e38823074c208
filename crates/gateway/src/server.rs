use std::net::SocketAddr;

use {
    axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::StatusCode,
        response::IntoResponse,
        routing::{delete, get, post},
    },
    serde::Deserialize,
    tokio_util::sync::CancellationToken,
    tracing::{error, info},
};

use {
    fedlink_common::{FederatedMessage, now_secs},
    fedlink_relay::{LoggedMessage, OutboundOutcome, RelayEvent, RelayEventSink},
};

use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: u32 = 100;
const MAX_HISTORY_LIMIT: u32 = 500;

/// Build the gateway router.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/relay", post(relay_handler))
        .route("/api/cross-platform/relay", post(cross_platform_relay_handler))
        .route("/api/messages/{room_id}", get(messages_handler))
        .route("/api/retry-operations", get(retry_operations_handler))
        .route(
            "/api/retry-operations/failed",
            delete(clear_failed_retries_handler),
        )
        .with_state(state)
}

/// Bind and run until the token fires.
pub async fn serve(app: Router, addr: SocketAddr, cancel: CancellationToken) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayRequest {
    room_id: String,
    message: FederatedMessage,
}

#[derive(Debug, Deserialize)]
struct MessagesQuery {
    since: Option<i64>,
    limit: Option<u32>,
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Direct relay into the bound chat, no loop check. Used by the registry
/// once it has already filtered by originating platform.
async fn relay_handler(
    State(state): State<AppState>,
    Json(req): Json<RelayRequest>,
) -> impl IntoResponse {
    deliver(&state, &req, false).await
}

/// Relay with loop prevention: messages carrying this adapter's own
/// platform tag are skipped and not re-recorded.
async fn cross_platform_relay_handler(
    State(state): State<AppState>,
    Json(req): Json<RelayRequest>,
) -> impl IntoResponse {
    deliver(&state, &req, true).await
}

async fn deliver(state: &AppState, req: &RelayRequest, check_loop: bool) -> axum::response::Response {
    if check_loop && state.relay.identity().is_own(&req.message.from.platform) {
        return Json(serde_json::json!({ "status": "loopSkipped" })).into_response();
    }

    // History is recorded before the delivery attempt, so a chat that is
    // temporarily unreachable can still backfill later.
    if let Err(e) = state
        .log
        .append(LoggedMessage::from_message(&req.message))
        .await
    {
        error!(room_id = %req.room_id, error = %e, "failed to record relayed message");
        return internal_error(&e);
    }

    match state.relay.deliver_to_chat(&req.room_id, &req.message).await {
        Ok(outcome) => {
            state
                .events
                .emit(RelayEvent::NewMessage {
                    room_id: req.room_id.clone(),
                    message: req.message.clone(),
                    timestamp: now_secs(),
                })
                .await;
            let body = match outcome {
                OutboundOutcome::Delivered { chat_id } => {
                    serde_json::json!({ "status": "delivered", "chatId": chat_id })
                },
                OutboundOutcome::LoopSkipped => serde_json::json!({ "status": "loopSkipped" }),
                OutboundOutcome::NotBound => serde_json::json!({ "status": "notBound" }),
            };
            Json(body).into_response()
        },
        Err(e) => {
            error!(room_id = %req.room_id, error = %e, "relay delivery failed");
            internal_error(&e)
        },
    }
}

async fn messages_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    match state.log.list_since(&room_id, query.since, limit).await {
        Ok(entries) => {
            let messages: Vec<FederatedMessage> =
                entries.iter().map(LoggedMessage::to_message).collect();
            Json(messages).into_response()
        },
        Err(e) => {
            error!(room_id, error = %e, "failed to read message history");
            internal_error(&e)
        },
    }
}

async fn retry_operations_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.retry.status())
}

async fn clear_failed_retries_handler(State(state): State<AppState>) -> impl IntoResponse {
    let cleared = state.retry.clear_failed();
    info!(cleared, "cleared failed retry operations");
    Json(serde_json::json!({ "cleared": cleared }))
}

fn internal_error(e: &anyhow::Error) -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
        .into_response()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use {
        async_trait::async_trait,
        fedlink_bindings::{BindingStore, SqliteBindingRecords},
        fedlink_common::FederatedSender,
        fedlink_relay::{ChatSender, FederationPort, MessageRelay, RelayIdentity},
        fedlink_retry::{BackoffPolicy, RetryOrchestrator, RetryPolicy},
        sqlx::SqlitePool,
    };

    use {super::*, crate::{events::BroadcastEventSink, message_log_store::SqliteMessageLog}};

    struct NullFederation;

    #[async_trait]
    impl FederationPort for NullFederation {
        async fn relay_message(
            &self,
            _room_id: &str,
            _message: &FederatedMessage,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ChatSender for RecordingSender {
        async fn send_text(&self, chat_id: &str, text: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    struct TestServer {
        base: String,
        bindings: Arc<BindingStore>,
        sender: Arc<RecordingSender>,
        retry: Arc<RetryOrchestrator>,
        events: Arc<BroadcastEventSink>,
    }

    async fn spawn_server() -> TestServer {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteBindingRecords::init(&pool).await.unwrap();
        SqliteMessageLog::init(&pool).await.unwrap();

        let bindings = Arc::new(BindingStore::new(Arc::new(SqliteBindingRecords::new(
            pool.clone(),
        ))));
        let sender = Arc::new(RecordingSender::default());
        let log: Arc<dyn fedlink_relay::MessageLog> = Arc::new(SqliteMessageLog::new(pool));
        let retry = Arc::new(RetryOrchestrator::new(RetryPolicy {
            max_attempts: 2,
            backoff: BackoffPolicy {
                base_delay_ms: 1,
                max_delay_ms: 1,
            },
        }));
        let events = Arc::new(BroadcastEventSink::new(8));

        let relay = Arc::new(MessageRelay::new(
            RelayIdentity::telegram(),
            Arc::clone(&bindings),
            Arc::new(NullFederation),
            Arc::clone(&sender) as Arc<dyn ChatSender>,
            Arc::clone(&log),
        ));

        let state = AppState {
            relay,
            log,
            retry: Arc::clone(&retry),
            events: Arc::clone(&events),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_app(state)).await.unwrap();
        });

        TestServer {
            base: format!("http://{addr}"),
            bindings,
            sender,
            retry,
            events,
        }
    }

    fn message(platform: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
            "roomId": "room-1",
            "message": {
                "id": "m1",
                "text": text,
                "from": {
                    "userId": "u1",
                    "displayName": "Alice",
                    "platform": platform,
                },
                "sentAt": 1_700_000_000,
                "roomId": "room-1",
            },
        })
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let server = spawn_server().await;
        let resp = reqwest::get(format!("{}/api/health", server.base))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn relay_delivers_logs_and_broadcasts() {
        let server = spawn_server().await;
        server.bindings.create("123", "room-1").await.unwrap();
        let mut rx = server.events.subscribe();

        let resp = reqwest::Client::new()
            .post(format!("{}/api/relay", server.base))
            .json(&message("web", "hello-from-other"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "delivered");
        assert_eq!(body["chatId"], "123");

        let sent = server.sender.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![("123".into(), "💻 Alice: hello-from-other".into())]);

        let RelayEvent::NewMessage { room_id, .. } = rx.try_recv().unwrap();
        assert_eq!(room_id, "room-1");

        // Recorded into history.
        let history: Vec<FederatedMessage> =
            reqwest::get(format!("{}/api/messages/room-1", server.base))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "hello-from-other");
    }

    #[tokio::test]
    async fn cross_platform_relay_skips_own_messages() {
        let server = spawn_server().await;
        server.bindings.create("123", "room-1").await.unwrap();

        let resp = reqwest::Client::new()
            .post(format!("{}/api/cross-platform/relay", server.base))
            .json(&message("telegram", "echo"))
            .send()
            .await
            .unwrap();
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "loopSkipped");
        assert!(server.sender.sent.lock().unwrap().is_empty());

        // Skipped messages leave no trace in history.
        let history: Vec<FederatedMessage> =
            reqwest::get(format!("{}/api/messages/room-1", server.base))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn relay_to_unbound_room_is_not_bound() {
        let server = spawn_server().await;
        let resp = reqwest::Client::new()
            .post(format!("{}/api/relay", server.base))
            .json(&message("web", "hi"))
            .send()
            .await
            .unwrap();
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "notBound");
    }

    #[tokio::test]
    async fn messages_endpoint_honors_since() {
        let server = spawn_server().await;
        server.bindings.create("123", "room-1").await.unwrap();

        let client = reqwest::Client::new();
        for (text, sent_at) in [("old", 100), ("new", 200)] {
            let mut payload = message("web", text);
            payload["message"]["sentAt"] = serde_json::json!(sent_at);
            payload["message"]["id"] = serde_json::json!(format!("m-{sent_at}"));
            client
                .post(format!("{}/api/relay", server.base))
                .json(&payload)
                .send()
                .await
                .unwrap();
        }

        let history: Vec<FederatedMessage> =
            reqwest::get(format!("{}/api/messages/room-1?since=100", server.base))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "new");
    }

    #[tokio::test]
    async fn retry_admin_surface_reports_and_clears() {
        let server = spawn_server().await;
        let _: Result<(), &str> = server
            .retry
            .execute("doomed", serde_json::Value::Null, || async { Err("down") })
            .await;

        let status: serde_json::Value =
            reqwest::get(format!("{}/api/retry-operations", server.base))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
        assert_eq!(status["failed"], 1);

        let cleared: serde_json::Value = reqwest::Client::new()
            .delete(format!("{}/api/retry-operations/failed", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(cleared["cleared"], 1);
    }
}
