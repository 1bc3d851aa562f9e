// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::error::CoreResult;

/// Hard cap on `ReadForward` batch size.
pub const MAX_READ_FORWARD: usize = 1000;
/// Default `ReadForward` batch size.
pub const DEFAULT_READ_FORWARD: usize = 1000;

/// Immutable append-only row.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub sequence_id: u64,
    pub channel: String,
    pub owner: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

struct ChannelLog {
    next_seq: AtomicU64,
    records: RwLock<Vec<EventRecord>>,
}

impl ChannelLog {
    fn new() -> Self {
        Self { next_seq: AtomicU64::new(1), records: RwLock::new(Vec::new()) }
    }
}

/// Append-only per-channel event log with TTL-based expiry.
///
/// Grounded on the teacher's JSONL append log
/// (`crates/cli/src/event_log.rs::EventLog`), generalized from one flat file
/// per event type to one ordered, channel-partitioned, in-memory log with a
/// monotonic `AtomicU64` sequence per channel — the "atomic counter ... read
/// max+1 at startup" option the Design Notes call out as acceptable.
pub struct EventLog {
    channels: RwLock<HashMap<String, Arc<ChannelLog>>>,
    ttl: Duration,
}

impl EventLog {
    pub fn new(ttl: Duration) -> Self {
        Self { channels: RwLock::new(HashMap::new()), ttl }
    }

    pub fn shared(ttl: Duration) -> Arc<Self> {
        Arc::new(Self::new(ttl))
    }

    async fn channel(&self, name: &str) -> Arc<ChannelLog> {
        if let Some(log) = self.channels.read().await.get(name) {
            return Arc::clone(log);
        }
        let mut channels = self.channels.write().await;
        Arc::clone(channels.entry(name.to_owned()).or_insert_with(|| Arc::new(ChannelLog::new())))
    }

    /// Append(channel, owner, payload) -> EventRecord.
    ///
    /// Sequence assignment is atomic against concurrent appenders on the
    /// same channel: the fetch_add happens while holding the channel's
    /// `Arc`, and the resulting id is unique and strictly increasing
    /// regardless of interleaving.
    pub async fn append(&self, channel: &str, owner: &str, payload: serde_json::Value) -> CoreResult<EventRecord> {
        let log = self.channel(channel).await;
        let sequence_id = log.next_seq.fetch_add(1, Ordering::SeqCst);
        let record = EventRecord {
            sequence_id,
            channel: channel.to_owned(),
            owner: owner.to_owned(),
            timestamp: Utc::now(),
            payload,
        };
        log.records.write().await.push(record.clone());
        self.purge_channel(&log).await;
        Ok(record)
    }

    /// ReadForward(channel, after_sequence_id, max_count) -> ordered records.
    pub async fn read_forward(&self, channel: &str, after_sequence_id: u64, max_count: usize) -> Vec<EventRecord> {
        let max_count = max_count.min(MAX_READ_FORWARD);
        let log = self.channel(channel).await;
        self.purge_channel(&log).await;
        let records = log.records.read().await;
        records.iter().filter(|r| r.sequence_id > after_sequence_id).take(max_count).cloned().collect()
    }

    /// Current max `sequence_id` for a channel, or 0 if empty — used to
    /// initialize a brand-new durable subscriber's cursor so it sees no
    /// backfill.
    pub async fn max_sequence_id(&self, channel: &str) -> u64 {
        let log = self.channel(channel).await;
        log.records.read().await.last().map(|r| r.sequence_id).unwrap_or(0)
    }

    /// Purge records older than the TTL. Invoked opportunistically on every
    /// append/read so no background sweeper is needed; invariant held
    /// regardless of whether any subscriber has read the purged record.
    async fn purge_channel(&self, log: &ChannelLog) {
        let cutoff = Utc::now() - self.ttl;
        let mut records = log.records.write().await;
        if records.first().is_some_and(|r| r.timestamp < cutoff) {
            records.retain(|r| r.timestamp >= cutoff);
        }
    }
}
