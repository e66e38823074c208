use std::{sync::Arc, time::Duration};

use {
    reqwest::StatusCode,
    serde_json::json,
    tracing::{debug, info},
};

use {fedlink_common::FederatedMessage, fedlink_retry::RetryOrchestrator};

use crate::{
    error::{Error, Result},
    types::{
        AnnounceRoomRequest, PeerInfo, RegisterPlatformRequest, RelayMessageRequest, RoomSummary,
    },
};

/// How this adapter introduces itself to the registry.
#[derive(Debug, Clone)]
pub struct FederationConfig {
    /// Registry base URL, no trailing slash (e.g. `http://registry:5000`).
    pub registry_url: String,
    /// Platform tag announced to the registry and stamped on relayed
    /// messages.
    pub platform: String,
    /// Address where peers can reach this adapter's inbound surface.
    pub public_url: String,
}

/// HTTP client for the federation registry. All calls run through the retry
/// orchestrator; errors surface only after retries are exhausted.
pub struct FederationClient {
    http: reqwest::Client,
    config: FederationConfig,
    retry: Arc<RetryOrchestrator>,
}

impl FederationClient {
    pub fn new(config: FederationConfig, retry: Arc<RetryOrchestrator>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            config,
            retry,
        })
    }

    pub fn platform(&self) -> &str {
        &self.config.platform
    }

    /// Announce this adapter to the registry. Idempotent on the registry
    /// side; repeated registrations are accepted as no-ops.
    pub async fn register_platform(&self) -> Result<()> {
        let url = format!("{}/federation/peers", self.config.registry_url);
        self.retry
            .execute(
                "register-platform",
                json!({"platform": self.config.platform}),
                || {
                    let req = self.http.post(&url).json(&RegisterPlatformRequest {
                        name: &self.config.platform,
                        url: &self.config.public_url,
                    });
                    async move {
                        check_status(req.send().await?).await?;
                        Ok::<_, Error>(())
                    }
                },
            )
            .await?;
        info!(platform = %self.config.platform, "registered with federation registry");
        Ok(())
    }

    /// Register a room as reachable through this platform. A conflict
    /// response means the room is already announced, which is success.
    pub async fn announce_room(&self, room_id: &str, name: &str) -> Result<()> {
        let url = format!("{}/federation/rooms", self.config.registry_url);
        self.retry
            .execute(
                &format!("announce-room:{room_id}"),
                json!({"roomId": room_id, "name": name}),
                || {
                    let req = self.http.post(&url).json(&AnnounceRoomRequest {
                        room_id,
                        name,
                        peer_url: &self.config.public_url,
                    });
                    async move {
                        let resp = req.send().await?;
                        if resp.status() == StatusCode::CONFLICT {
                            debug!("room already announced");
                            return Ok(());
                        }
                        check_status(resp).await?;
                        Ok::<_, Error>(())
                    }
                },
            )
            .await?;
        info!(room_id, name, "room announced to federation registry");
        Ok(())
    }

    /// Rooms known to the registry, with peer counts.
    pub async fn list_rooms(&self) -> Result<Vec<RoomSummary>> {
        let url = format!("{}/federation/rooms", self.config.registry_url);
        self.retry
            .execute("list-rooms", serde_json::Value::Null, || {
                let req = self.http.get(&url);
                async move {
                    let resp = check_status(req.send().await?).await?;
                    Ok::<_, Error>(resp.json::<Vec<RoomSummary>>().await?)
                }
            })
            .await
    }

    /// Peers reachable for a room.
    pub async fn room_peers(&self, room_id: &str) -> Result<Vec<PeerInfo>> {
        let url = format!(
            "{}/federation/rooms/{room_id}/peers",
            self.config.registry_url
        );
        self.retry
            .execute(
                &format!("room-peers:{room_id}"),
                json!({"roomId": room_id}),
                || {
                    let req = self.http.get(&url);
                    async move {
                        let resp = check_status(req.send().await?).await?;
                        Ok::<_, Error>(resp.json::<Vec<PeerInfo>>().await?)
                    }
                },
            )
            .await
    }

    /// Backfill: fetch a peer's history for a room, optionally since a
    /// unix-seconds timestamp.
    pub async fn peer_messages(
        &self,
        peer_url: &str,
        room_id: &str,
        since: Option<i64>,
    ) -> Result<Vec<FederatedMessage>> {
        let url = format!("{peer_url}/api/messages/{room_id}");
        self.retry
            .execute(
                &format!("peer-messages:{room_id}"),
                json!({"peer": peer_url, "roomId": room_id}),
                || {
                    let mut req = self.http.get(&url);
                    if let Some(since) = since {
                        req = req.query(&[("since", since)]);
                    }
                    async move {
                        let resp = check_status(req.send().await?).await?;
                        Ok::<_, Error>(resp.json::<Vec<FederatedMessage>>().await?)
                    }
                },
            )
            .await
    }

    /// Forward a message to the registry for fan-out to other platforms.
    pub async fn relay_message(&self, room_id: &str, message: &FederatedMessage) -> Result<()> {
        let url = format!("{}/federation/relay-message", self.config.registry_url);
        self.retry
            .execute(
                &format!("relay-message:{room_id}"),
                json!({"roomId": room_id, "messageId": message.id}),
                || {
                    let req = self.http.post(&url).json(&RelayMessageRequest {
                        room_id,
                        message,
                        originating_platform: &self.config.platform,
                    });
                    async move {
                        check_status(req.send().await?).await?;
                        Ok::<_, Error>(())
                    }
                },
            )
            .await?;
        debug!(room_id, message_id = %message.id, "message relayed to registry");
        Ok(())
    }

    // Administrative passthrough to the retry ledger.
    pub fn retry(&self) -> &RetryOrchestrator {
        &self.retry
    }
}

/// Non-2xx responses become [`Error::Status`] with the body attached.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Status { status, body })
}
