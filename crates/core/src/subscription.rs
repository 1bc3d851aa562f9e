// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::event_log::EventLog;
use crate::principal::Principal;

/// Mutable subscription record.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub subscription_id: u64,
    pub channel: String,
    pub principal: String,
    pub groups: Vec<String>,
    pub promiscuous: bool,
    pub subscriber_id: Option<String>,
    /// Highest sequence_id already acknowledged on this channel.
    pub last_event_id: u64,
    /// Highest sequence_id sent to the client, not yet acknowledged.
    pub last_delivered_id: u64,
    pub last_poll: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct PersistedPosition {
    last_event_id: u64,
    last_poll: DateTime<Utc>,
}

/// Tracks live subscriptions and, for durable subscribers, a persistent
/// `(subscriber_id, channel) -> last_event_id` position.
///
/// Grounded on the teacher's `PodRegistry` (`crates/cli/src/broker/registry.rs`):
/// a `RwLock<HashMap<..>>` of live entries plus an `AtomicU64`-style counter,
/// generalized here to two maps (live + durable position) so a durable
/// subscriber's position outlives its in-memory subscription record.
pub struct SubscriptionRegistry {
    next_id: AtomicU64,
    live: RwLock<HashMap<u64, Subscription>>,
    durable_positions: RwLock<HashMap<(String, String), PersistedPosition>>,
    event_log: Arc<EventLog>,
}

impl SubscriptionRegistry {
    pub fn new(event_log: Arc<EventLog>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            live: RwLock::new(HashMap::new()),
            durable_positions: RwLock::new(HashMap::new()),
            event_log,
        }
    }

    pub fn shared(event_log: Arc<EventLog>) -> Arc<Self> {
        Arc::new(Self::new(event_log))
    }

    /// Subscribe(channel, principal, promiscuous, subscriber_id?) -> subscription_id.
    pub async fn subscribe(
        &self,
        channel: &str,
        principal: &Principal,
        promiscuous: bool,
        subscriber_id: Option<String>,
    ) -> CoreResult<u64> {
        let subscription_id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let last_event_id = match &subscriber_id {
            Some(sid) => {
                let existing = {
                    let positions = self.durable_positions.read().await;
                    positions.get(&(sid.clone(), channel.to_owned())).map(|pos| pos.last_event_id)
                };
                match existing {
                    Some(pos) => pos,
                    None => {
                        // First time this (subscriber_id, channel) pair is
                        // seen: pin the fallback cursor now. Otherwise a
                        // subscriber that disconnects before its first
                        // implicit ack would have no persisted position at
                        // all, and a later resubscribe would re-derive the
                        // fallback against a channel max that has since
                        // moved past events it was never delivered (silent
                        // loss instead of at-least-once redelivery).
                        let fallback = self.event_log.max_sequence_id(channel).await;
                        self.persist(sid, channel, fallback).await;
                        fallback
                    }
                }
            }
            None => self.event_log.max_sequence_id(channel).await,
        };

        let subscription = Subscription {
            subscription_id,
            channel: channel.to_owned(),
            principal: principal.name.clone(),
            groups: principal.groups.iter().cloned().collect(),
            promiscuous,
            subscriber_id,
            last_event_id,
            last_delivered_id: last_event_id,
            last_poll: Utc::now(),
        };
        self.live.write().await.insert(subscription_id, subscription);
        Ok(subscription_id)
    }

    /// Unsubscribe(subscription_id). Durable position is retained; only the
    /// in-memory record is removed.
    pub async fn unsubscribe(&self, subscription_id: u64) -> CoreResult<()> {
        self.live
            .write()
            .await
            .remove(&subscription_id)
            .map(|_| ())
            .ok_or_else(|| CoreError::NotFound(format!("subscription {subscription_id} not found")))
    }

    pub async fn get(&self, subscription_id: u64) -> CoreResult<Subscription> {
        self.live
            .read()
            .await
            .get(&subscription_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("subscription {subscription_id} not found")))
    }

    /// Persist(subscriber_id, channel, last_event_id). Idempotent.
    pub async fn persist(&self, subscriber_id: &str, channel: &str, last_event_id: u64) {
        let mut positions = self.durable_positions.write().await;
        let entry = positions.entry((subscriber_id.to_owned(), channel.to_owned())).or_default();
        entry.last_event_id = last_event_id;
        entry.last_poll = Utc::now();
    }

    /// Touch(subscription_id): updates `last_poll`.
    pub async fn touch(&self, subscription_id: u64) -> CoreResult<()> {
        let mut live = self.live.write().await;
        let sub = live
            .get_mut(&subscription_id)
            .ok_or_else(|| CoreError::NotFound(format!("subscription {subscription_id} not found")))?;
        sub.last_poll = Utc::now();
        Ok(())
    }

    /// Advance the in-memory `last_event_id`/`last_delivered_id` and, for
    /// durable subscribers, persist the position.
    pub async fn set_last_event_id(&self, subscription_id: u64, last_event_id: u64) -> CoreResult<()> {
        let (channel, subscriber_id) = {
            let mut live = self.live.write().await;
            let sub = live
                .get_mut(&subscription_id)
                .ok_or_else(|| CoreError::NotFound(format!("subscription {subscription_id} not found")))?;
            sub.last_event_id = last_event_id;
            (sub.channel.clone(), sub.subscriber_id.clone())
        };
        if let Some(sid) = subscriber_id {
            self.persist(&sid, &channel, last_event_id).await;
        }
        Ok(())
    }

    pub async fn set_last_delivered_id(&self, subscription_id: u64, last_delivered_id: u64) -> CoreResult<()> {
        let mut live = self.live.write().await;
        let sub = live
            .get_mut(&subscription_id)
            .ok_or_else(|| CoreError::NotFound(format!("subscription {subscription_id} not found")))?;
        sub.last_delivered_id = last_delivered_id;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn alice() -> Principal {
        Principal::new("alice", [])
    }

    fn log() -> Arc<EventLog> {
        EventLog::shared(Duration::days(7))
    }

    #[tokio::test]
    async fn fresh_durable_subscriber_starts_at_channel_max_no_backfill() {
        let event_log = log();
        event_log.append("node", "w", serde_json::json!({})).await.unwrap();
        event_log.append("node", "w", serde_json::json!({})).await.unwrap();

        let registry = SubscriptionRegistry::new(Arc::clone(&event_log));
        let id = registry.subscribe("node", &alice(), false, Some("sched1".to_owned())).await.unwrap();
        let sub = registry.get(id).await.unwrap();
        assert_eq!(sub.last_event_id, 2);
    }

    #[tokio::test]
    async fn durable_subscriber_resumes_persisted_position() {
        let event_log = log();
        let registry = SubscriptionRegistry::new(Arc::clone(&event_log));
        registry.persist("sched1", "node", 5).await;

        let id = registry.subscribe("node", &alice(), false, Some("sched1".to_owned())).await.unwrap();
        let sub = registry.get(id).await.unwrap();
        assert_eq!(sub.last_event_id, 5);
    }

    #[tokio::test]
    async fn unsubscribe_keeps_durable_position() {
        let event_log = log();
        let registry = SubscriptionRegistry::new(Arc::clone(&event_log));
        let id = registry.subscribe("node", &alice(), false, Some("sched1".to_owned())).await.unwrap();
        registry.set_last_event_id(id, 3).await.unwrap();
        registry.unsubscribe(id).await.unwrap();

        let id2 = registry.subscribe("node", &alice(), false, Some("sched1".to_owned())).await.unwrap();
        let sub = registry.get(id2).await.unwrap();
        assert_eq!(sub.last_event_id, 3);
    }

    #[tokio::test]
    async fn ephemeral_subscriber_gets_fresh_id_each_time() {
        let event_log = log();
        let registry = SubscriptionRegistry::new(Arc::clone(&event_log));
        let a = registry.subscribe("node", &alice(), false, None).await.unwrap();
        let b = registry.subscribe("node", &alice(), false, None).await.unwrap();
        assert_ne!(a, b);
    }
}
