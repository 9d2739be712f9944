//! Per-peer trust state
//!
//! Pairing status gates the sync pipeline: records and chunks move only
//! to and from peers in the `Connected` state. The registry persists as
//! a JSON map next to the config file.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Pairing/connection state of one peer device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustState {
    /// Seen but never paired
    Unverified,
    /// Pairing handshake in progress
    Connecting,
    /// Paired and reachable; sync permitted
    Connected,
    /// Paired but currently unreachable
    Disconnected,
    /// Pairing attempted and rejected
    Unmatched,
}

/// Everything we remember about one peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerTrust {
    pub peer_id: Uuid,
    pub name: String,
    pub state: TrustState,
    /// Unix timestamp of first discovery
    pub first_seen: i64,
    /// Unix timestamp of successful pairing, if any
    pub verified_at: Option<i64>,
}

/// JSON-persisted registry of peer trust states
pub struct TrustRegistry {
    path: PathBuf,
    peers: RwLock<HashMap<Uuid, PeerTrust>>,
}

impl TrustRegistry {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            peers: RwLock::new(HashMap::new()),
        }
    }

    /// Load persisted trust states; a missing file is a fresh start
    pub async fn load(&self) -> Result<()> {
        if !self.path.exists() {
            debug!("Trust registry not found, starting fresh");
            return Ok(());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        let peers: HashMap<Uuid, PeerTrust> = serde_json::from_str(&content)?;
        info!("Loaded trust state for {} peers", peers.len());
        *self.peers.write().await = peers;
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let peers = self.peers.read().await;
        let content = serde_json::to_string_pretty(&*peers)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    /// Current state of a peer; unknown peers are `Unverified`
    pub async fn state_of(&self, peer_id: Uuid) -> TrustState {
        self.peers
            .read()
            .await
            .get(&peer_id)
            .map(|p| p.state)
            .unwrap_or(TrustState::Unverified)
    }

    /// Whether the pipeline may push to / pull from this peer
    pub async fn can_sync(&self, peer_id: Uuid) -> bool {
        self.state_of(peer_id).await == TrustState::Connected
    }

    /// Record a state transition for a peer, creating it when new.
    /// Returns the state the peer was in before.
    pub async fn set_state(
        &self,
        peer_id: Uuid,
        name: &str,
        state: TrustState,
    ) -> Result<TrustState> {
        let now = chrono::Utc::now().timestamp();
        let previous = {
            let mut peers = self.peers.write().await;
            let entry = peers.entry(peer_id).or_insert_with(|| PeerTrust {
                peer_id,
                name: name.to_string(),
                state: TrustState::Unverified,
                first_seen: now,
                verified_at: None,
            });
            let previous = entry.state;
            entry.name = name.to_string();
            entry.state = state;
            if state == TrustState::Connected && entry.verified_at.is_none() {
                entry.verified_at = Some(now);
            }
            previous
        };
        self.save().await?;
        debug!("Peer {} ({}) {:?} -> {:?}", name, peer_id, previous, state);
        Ok(previous)
    }

    /// Peers currently eligible for sync
    pub async fn connected_peers(&self) -> Vec<PeerTrust> {
        self.peers
            .read()
            .await
            .values()
            .filter(|p| p.state == TrustState::Connected)
            .cloned()
            .collect()
    }
}
