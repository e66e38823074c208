use {
    fedlink_common::FederatedMessage,
    serde::{Deserialize, Serialize},
};

/// `POST /federation/peers` body.
#[derive(Debug, Serialize)]
pub struct RegisterPlatformRequest<'a> {
    pub name: &'a str,
    pub url: &'a str,
}

/// `POST /federation/rooms` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnounceRoomRequest<'a> {
    pub room_id: &'a str,
    pub name: &'a str,
    pub peer_url: &'a str,
}

/// `POST /federation/relay-message` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayMessageRequest<'a> {
    pub room_id: &'a str,
    pub message: &'a FederatedMessage,
    pub originating_platform: &'a str,
}

/// One room as listed by `GET /federation/rooms`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub peer_count: u32,
}

/// A peer serving a room, from `GET /federation/rooms/{roomId}/peers`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub name: String,
    pub url: String,
}
