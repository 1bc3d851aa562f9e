// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};

/// A local listener handle returned by `Subscribe`.
pub struct Cursor {
    channel: String,
    rx: broadcast::Receiver<u64>,
}

/// Outcome of `Wait`.
pub enum Wake {
    /// A publish happened on this channel; carries the published sequence id
    /// for diagnostics only — the Delivery Engine always re-reads the Event
    /// Log rather than trusting this value as authoritative.
    Published(u64),
    /// The bus lost this wake (receiver lagged past the broadcast buffer).
    /// Treated identically to `Published` by callers: re-check the log.
    Lagged,
    Timeout,
}

/// Pure wake mechanism fanning out to blocked listeners.
///
/// Message loss is tolerated by contract — grounded on the teacher's
/// `tokio::sync::broadcast`-based aggregator hubs
/// (`crates/mux/src/state.rs::Aggregator`, `crates/cli/src/broker/mux.rs::Multiplexer`),
/// which fan events out to dashboard subscribers without any durability
/// guarantee of their own.
pub struct TransientBus {
    channels: RwLock<HashMap<String, broadcast::Sender<u64>>>,
}

const CHANNEL_CAPACITY: usize = 1024;

impl Default for TransientBus {
    fn default() -> Self {
        Self::new()
    }
}

impl TransientBus {
    pub fn new() -> Self {
        Self { channels: RwLock::new(HashMap::new()) }
    }

    async fn sender(&self, channel: &str) -> broadcast::Sender<u64> {
        if let Some(tx) = self.channels.read().await.get(channel) {
            return tx.clone();
        }
        let mut channels = self.channels.write().await;
        channels.entry(channel.to_owned()).or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0).clone()
    }

    /// Subscribe(channel) -> Cursor.
    pub async fn subscribe(&self, channel: &str) -> Cursor {
        let tx = self.sender(channel).await;
        Cursor { channel: channel.to_owned(), rx: tx.subscribe() }
    }

    /// Publish(channel, sequence_id). Fire-and-forget: no listeners is not
    /// an error.
    pub async fn publish(&self, channel: &str, sequence_id: u64) {
        let tx = self.sender(channel).await;
        let _ = tx.send(sequence_id);
    }

    /// Wait(Cursor, deadline) -> Wake or Timeout.
    pub async fn wait(&self, cursor: &mut Cursor, budget: Duration) -> Wake {
        match tokio::time::timeout(budget, cursor.rx.recv()).await {
            Ok(Ok(seq)) => Wake::Published(seq),
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => Wake::Lagged,
            Ok(Err(broadcast::error::RecvError::Closed)) => Wake::Timeout,
            Err(_) => Wake::Timeout,
        }
    }

    pub fn close(&self, _cursor: Cursor) {
        // Dropping the Receiver releases it; kept as an explicit method to
        // mirror the spec's `Close(Cursor)` operation and give callers a
        // clear release point instead of relying on scope-end drop.
    }
}

impl Cursor {
    pub fn channel(&self) -> &str {
        &self.channel
    }
}
