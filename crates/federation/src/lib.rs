//! Outbound client for the federation registry: platform registration, room
//! announcement, peer discovery, backfill, and message relay. Every call is
//! wrapped by the retry orchestrator.

pub mod client;
pub mod error;
pub mod types;

pub use {
    client::{FederationClient, FederationConfig},
    error::{Error, Result},
    types::{PeerInfo, RoomSummary},
};
