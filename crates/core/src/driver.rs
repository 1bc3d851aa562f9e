// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::event_log::EventLog;
use crate::result::NodeResult;
use crate::state::NodeState;
use crate::store::NodeStore;

/// Channel all node-mutation events are published on.
pub const NODE_CHANNEL: &str = "node";
/// System principal attributed to driver-originated events.
pub const DRIVER_OWNER: &str = "state-machine-driver";

/// Periodic sweeper advancing nodes through their lifecycle.
///
/// Grounded on the teacher's periodic reconciliation loops —
/// `crates/cli/src/broker/registry.rs::run_health_checks` and
/// `crates/mux/src/broker/mux.rs::Multiplexer::run` — both `tokio::select!`
/// loops ticking on an interval with a `CancellationToken` for shutdown.
pub struct StateMachineDriver {
    store: Arc<NodeStore>,
    event_log: Arc<EventLog>,
    tick_interval: Duration,
}

impl StateMachineDriver {
    pub fn new(store: Arc<NodeStore>, event_log: Arc<EventLog>, tick_interval: Duration) -> Self {
        Self { store, event_log, tick_interval }
    }

    /// Run the tick loop until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("state machine driver shutting down");
                    return;
                }
            }
        }
    }

    /// One pass over all nodes needing attention.
    ///
    /// Per-node processing is independent: a fault handling one node is
    /// logged and that node deferred to the next tick rather than aborting
    /// the whole pass.
    pub async fn tick(&self) {
        let now = Utc::now();

        // Step 1: timeout dominance, with cascade to non-Done descendants.
        for node in self.store.nodes_eligible_for_timeout(now).await {
            if let Err(e) = self.apply_timeout(node.id, node.state).await {
                tracing::error!(node_id = %node.id, error = %e, "driver: timeout step failed, deferring to next tick");
            }
        }

        // Steps 2-3: Available/Closing natural progression.
        for node in self.store.nodes_in_states(&[NodeState::Available, NodeState::Closing]).await {
            if let Err(e) = self.advance_progression(node.id, node.state, node.holdoff, now).await {
                tracing::error!(node_id = %node.id, error = %e, "driver: progression step failed, deferring to next tick");
            }
        }
    }

    async fn apply_timeout(&self, node_id: Uuid, state: NodeState) -> Result<(), String> {
        // Re-fetch: another tick step (or a racing worker Update) may have
        // already moved this node since the scan. Each node's transition is
        // its own atomic step, not transactional across the whole pass.
        let node = match self.store.get(node_id).await {
            Ok(n) => n,
            Err(_) => return Ok(()), // deleted/gone; nothing to do
        };
        if node.timeout > Utc::now() || node.state == NodeState::Done {
            return Ok(());
        }

        let result = match state {
            NodeState::Available => None, // preserve existing result
            _ => Some(NodeResult::Incomplete),
        };
        self.transition(node_id, NodeState::Done, result).await?;

        for descendant in self.store.descendants_of(node_id).await {
            if descendant.state == NodeState::Done {
                continue;
            }
            let desc_result = match descendant.state {
                NodeState::Available => None,
                _ => Some(NodeResult::Incomplete),
            };
            self.transition(descendant.id, NodeState::Done, desc_result).await?;
        }
        Ok(())
    }

    async fn advance_progression(
        &self,
        node_id: Uuid,
        state: NodeState,
        holdoff: Option<chrono::DateTime<Utc>>,
        now: chrono::DateTime<Utc>,
    ) -> Result<(), String> {
        // Re-fetch for the same reason as apply_timeout.
        let node = match self.store.get(node_id).await {
            Ok(n) => n,
            Err(_) => return Ok(()),
        };
        if node.state != state || node.timeout <= now {
            // Already moved on, or step 1 claimed it this tick.
            return Ok(());
        }

        match state {
            NodeState::Available => {
                let Some(holdoff) = holdoff else { return Ok(()) };
                if holdoff > now {
                    return Ok(());
                }
                let children = self.store.children_of(node_id).await;
                if children.is_empty() || children.iter().all(|c| c.state == NodeState::Done) {
                    self.transition(node_id, NodeState::Done, None).await?;
                } else {
                    self.transition(node_id, NodeState::Closing, None).await?;
                }
            }
            NodeState::Closing => {
                let children = self.store.children_of(node_id).await;
                if children.iter().all(|c| c.state == NodeState::Done) {
                    self.transition(node_id, NodeState::Done, None).await?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn transition(&self, node_id: Uuid, next: NodeState, result: Option<NodeResult>) -> Result<(), String> {
        let Some((prev, next)) = self.store.apply_driver_transition(node_id, next, result).await else {
            return Ok(());
        };
        tracing::info!(node_id = %node_id, from = prev.as_str(), to = next.as_str(), "driver: node transitioned");
        self.event_log
            .append(
                NODE_CHANNEL,
                DRIVER_OWNER,
                serde_json::json!({"op": "updated", "id": node_id, "state": next.as_str()}),
            )
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeDraft;
    use crate::node::NodePatch;
    use crate::principal::Principal;
    use chrono::Duration as ChronoDuration;

    fn alice() -> Principal {
        Principal::new("alice", [])
    }

    fn harness() -> (Arc<NodeStore>, Arc<EventLog>, StateMachineDriver) {
        let store = NodeStore::shared();
        let log = EventLog::shared(ChronoDuration::days(7));
        let driver = StateMachineDriver::new(Arc::clone(&store), Arc::clone(&log), Duration::from_secs(60));
        (store, log, driver)
    }

    fn draft(name: &str, parent: Option<Uuid>) -> NodeDraft {
        NodeDraft {
            kind: "checkout".to_owned(),
            name: name.to_owned(),
            parent,
            group: None,
            data: serde_json::json!({}),
            artifacts: Default::default(),
            user_groups: vec![],
            timeout: None,
        }
    }

    #[tokio::test]
    async fn available_with_no_children_goes_done_after_holdoff() {
        let (store, _log, driver) = harness();
        let n1 = store.create(draft("checkout1", None), &alice()).await.unwrap();
        store
            .update(
                n1.id,
                NodePatch { state: Some(NodeState::Available), holdoff: Some(Utc::now() - ChronoDuration::seconds(1)), ..Default::default() },
                &alice(),
            )
            .await
            .unwrap();

        driver.tick().await;

        let updated = store.get(n1.id).await.unwrap();
        assert_eq!(updated.state, NodeState::Done);
    }

    #[tokio::test]
    async fn closing_completes_once_all_children_are_done() {
        let (store, _log, driver) = harness();
        let n1 = store.create(draft("checkout1", None), &alice()).await.unwrap();
        store
            .update(
                n1.id,
                NodePatch { state: Some(NodeState::Available), holdoff: Some(Utc::now() - ChronoDuration::seconds(1)), ..Default::default() },
                &alice(),
            )
            .await
            .unwrap();
        let c1 = store.create(draft("gcc", Some(n1.id)), &alice()).await.unwrap();

        driver.tick().await;
        let n1_after = store.get(n1.id).await.unwrap();
        assert_eq!(n1_after.state, NodeState::Closing);

        store
            .update(c1.id, NodePatch { state: Some(NodeState::Done), result: Some(NodeResult::Pass), ..Default::default() }, &alice())
            .await
            .unwrap();

        driver.tick().await;
        let n1_final = store.get(n1.id).await.unwrap();
        assert_eq!(n1_final.state, NodeState::Done);
    }

    #[tokio::test]
    async fn timeout_cascades_to_descendants() {
        let (store, _log, driver) = harness();
        let past_timeout = Utc::now() - ChronoDuration::seconds(1);
        let mut n1_draft = draft("checkout1", None);
        n1_draft.timeout = Some(past_timeout);
        let n1 = store.create(n1_draft, &alice()).await.unwrap();
        let c1 = store.create(draft("gcc", Some(n1.id)), &alice()).await.unwrap();

        driver.tick().await;

        let n1_after = store.get(n1.id).await.unwrap();
        let c1_after = store.get(c1.id).await.unwrap();
        assert_eq!(n1_after.state, NodeState::Done);
        assert_eq!(n1_after.result, NodeResult::Incomplete);
        assert_eq!(c1_after.state, NodeState::Done);
        assert_eq!(c1_after.result, NodeResult::Incomplete);
    }

    #[tokio::test]
    async fn timeout_wins_over_available_progression() {
        let (store, _log, driver) = harness();
        let n1 = store.create(draft("checkout1", None), &alice()).await.unwrap();
        store
            .update(
                n1.id,
                NodePatch {
                    state: Some(NodeState::Available),
                    holdoff: Some(Utc::now() - ChronoDuration::seconds(5)),
                    timeout: Some(Utc::now() - ChronoDuration::seconds(1)),
                    ..Default::default()
                },
                &alice(),
            )
            .await
            .unwrap();

        driver.tick().await;

        let after = store.get(n1.id).await.unwrap();
        assert_eq!(after.state, NodeState::Done);
        // result preserved (Available carries absent unless set) rather than incomplete
        assert_eq!(after.result, NodeResult::Absent);
    }

    #[tokio::test]
    async fn each_transition_emits_an_event() {
        let (store, log, driver) = harness();
        let n1 = store.create(draft("checkout1", None), &alice()).await.unwrap();
        store
            .update(
                n1.id,
                NodePatch { state: Some(NodeState::Available), holdoff: Some(Utc::now() - ChronoDuration::seconds(1)), ..Default::default() },
                &alice(),
            )
            .await
            .unwrap();

        driver.tick().await;

        let events = log.read_forward(NODE_CHANNEL, 0, 100).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["op"], "updated");
    }

    #[tokio::test]
    async fn zero_children_available_passes_directly_to_done() {
        let (store, _log, driver) = harness();
        let n1 = store.create(draft("checkout1", None), &alice()).await.unwrap();
        store
            .update(
                n1.id,
                NodePatch { state: Some(NodeState::Available), holdoff: Some(Utc::now() - ChronoDuration::seconds(1)), ..Default::default() },
                &alice(),
            )
            .await
            .unwrap();
        driver.tick().await;
        assert_eq!(store.get(n1.id).await.unwrap().state, NodeState::Done);
    }
}
