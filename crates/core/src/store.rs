// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::node::{Node, NodeDraft, NodeKind, NodePatch};
use crate::principal::Principal;
use crate::query::Filter;
use crate::result::NodeResult;
use crate::state::NodeState;

/// Default node lifetime before its terminal deadline.
const DEFAULT_TIMEOUT: Duration = Duration::hours(6);

/// Hard cap on `Query`/`ReadForward`-style result sizes.
pub const MAX_QUERY_LIMIT: usize = 1000;
/// Default page size when the caller does not specify one.
pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// A page of query results plus the total matching count.
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<Node>,
    pub total: usize,
}

/// In-memory Node Store.
///
/// The source spec targets a document database; this rewrite keeps the
/// teacher's in-process `RwLock<HashMap<..>>` idiom (see
/// `crates/cli/src/broker/registry.rs::PodRegistry`) rather than fabricate a
/// database driver dependency the pack never shows. `STORE_URL` is accepted
/// by configuration and threaded through for forward compatibility but is
/// not consulted by this backend.
pub struct NodeStore {
    nodes: RwLock<HashMap<Uuid, Node>>,
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore {
    pub fn new() -> Self {
        Self { nodes: RwLock::new(HashMap::new()) }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Create.
    pub async fn create(&self, draft: NodeDraft, principal: &Principal) -> CoreResult<Node> {
        let now = Utc::now();
        let mut nodes = self.nodes.write().await;

        let (path, retry_counter) = match draft.parent {
            Some(parent_id) => {
                let parent = nodes
                    .get(&parent_id)
                    .ok_or_else(|| CoreError::InvalidParent(format!("parent {parent_id} not found")))?;
                if matches!(parent.state, NodeState::Closing | NodeState::Done) {
                    return Err(CoreError::InvalidParent(format!(
                        "parent {parent_id} is {} and accepts no new children",
                        parent.state.as_str()
                    )));
                }
                if !parent.user_groups.is_empty() && !principal.may_mutate(&parent.owner, &parent.user_groups) {
                    return Err(CoreError::PermissionDenied(format!(
                        "principal {} may not create children under node {parent_id}",
                        principal.name
                    )));
                }
                let mut path = parent.path.clone();
                path.push(draft.name.clone());

                // Re-creation at the same (parent, name) is allowed, bumping
                // retry_counter past any prior instance's.
                let max_prior = nodes
                    .values()
                    .filter(|n| n.parent == Some(parent_id) && n.name == draft.name)
                    .map(|n| n.retry_counter)
                    .max();
                (path, max_prior.map(|m| m + 1).unwrap_or(0))
            }
            None => (vec![draft.name.clone()], 0),
        };

        let node = Node {
            id: Uuid::new_v4(),
            kind: NodeKind::from(draft.kind.as_str()),
            name: draft.name,
            path,
            parent: draft.parent,
            group: draft.group,
            state: NodeState::Running,
            result: NodeResult::Absent,
            data: draft.data,
            artifacts: draft.artifacts,
            owner: principal.name.clone(),
            user_groups: draft.user_groups,
            created: now,
            updated: now,
            holdoff: None,
            timeout: draft.timeout.unwrap_or(now + DEFAULT_TIMEOUT),
            retry_counter,
        };

        nodes.insert(node.id, node.clone());
        Ok(node)
    }

    /// Update. Forbidden fields are structurally absent from `NodePatch`;
    /// state changes are checked against the transition graph.
    pub async fn update(&self, id: Uuid, patch: NodePatch, principal: &Principal) -> CoreResult<Node> {
        let mut nodes = self.nodes.write().await;
        let node = nodes.get_mut(&id).ok_or_else(|| CoreError::NotFound(format!("node {id} not found")))?;

        if !principal.may_mutate(&node.owner, &node.user_groups) {
            return Err(CoreError::PermissionDenied(format!("principal {} may not update node {id}", principal.name)));
        }

        if let Some(expected) = patch.if_updated {
            if expected != node.updated {
                return Err(CoreError::Conflict(format!(
                    "node {id} was updated concurrently (expected updated={expected}, found {})",
                    node.updated
                )));
            }
        }

        if let Some(next_state) = patch.state {
            if next_state != node.state && !node.state.can_transition_to(next_state) {
                return Err(CoreError::InvalidTransition(format!(
                    "node {id}: {} -> {} is not a legal transition",
                    node.state.as_str(),
                    next_state.as_str()
                )));
            }
            if next_state == NodeState::Done && node.state == NodeState::Done && patch.result.is_some() {
                // Terminal immutability: a Done node's result is frozen.
                return Err(CoreError::InvalidTransition(format!("node {id} result is frozen once Done")));
            }
            node.state = next_state;
        }

        if let Some(result) = patch.result {
            if node.state == NodeState::Done && node.result != NodeResult::Absent && node.result != result {
                return Err(CoreError::InvalidTransition(format!("node {id} result is frozen once Done")));
            }
            node.result = result;
        }

        if let Some(name) = patch.name {
            node.name = name;
        }
        if let Some(group) = patch.group {
            node.group = Some(group);
        }
        if let Some(data) = patch.data {
            node.data = data;
        }
        if let Some(artifacts) = patch.artifacts {
            node.artifacts = artifacts;
        }
        if let Some(user_groups) = patch.user_groups {
            node.user_groups = user_groups;
        }
        if let Some(holdoff) = patch.holdoff {
            node.holdoff = Some(holdoff);
        }
        if let Some(timeout) = patch.timeout {
            node.timeout = timeout;
        }

        node.updated = Utc::now();
        Ok(node.clone())
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Node> {
        self.nodes.read().await.get(&id).cloned().ok_or_else(|| CoreError::NotFound(format!("node {id} not found")))
    }

    /// Query. `limit` is clamped to `MAX_QUERY_LIMIT`; a request above the
    /// hard cap is rejected with `TooLarge` rather than silently truncated.
    pub async fn query(&self, filter: &Filter, limit: usize, offset: usize) -> CoreResult<Page> {
        if limit > MAX_QUERY_LIMIT {
            return Err(CoreError::TooLarge(format!("limit {limit} exceeds the hard cap of {MAX_QUERY_LIMIT}")));
        }
        let nodes = self.nodes.read().await;
        let mut matched: Vec<&Node> = nodes.values().filter(|n| filter.matches(&node_as_value(n))).collect();
        matched.sort_by_key(|n| n.created);
        let total = matched.len();
        let items = matched.into_iter().skip(offset).take(limit).cloned().collect();
        Ok(Page { items, total })
    }

    pub async fn count(&self, filter: &Filter) -> CoreResult<usize> {
        let nodes = self.nodes.read().await;
        Ok(nodes.values().filter(|n| filter.matches(&node_as_value(n))).count())
    }

    /// Direct children of `parent_id`, for the driver and tests.
    pub async fn children_of(&self, parent_id: Uuid) -> Vec<Node> {
        self.nodes.read().await.values().filter(|n| n.parent == Some(parent_id)).cloned().collect()
    }

    /// Descendants (transitive) of `parent_id`, for timeout cascade.
    pub async fn descendants_of(&self, parent_id: Uuid) -> Vec<Node> {
        let nodes = self.nodes.read().await;
        let mut result = Vec::new();
        let mut frontier = vec![parent_id];
        while let Some(id) = frontier.pop() {
            for n in nodes.values().filter(|n| n.parent == Some(id)) {
                frontier.push(n.id);
                result.push(n.clone());
            }
        }
        result
    }

    /// All nodes whose state is in `states`, for the driver's tick scan.
    pub async fn nodes_in_states(&self, states: &[NodeState]) -> Vec<Node> {
        self.nodes.read().await.values().filter(|n| states.contains(&n.state)).cloned().collect()
    }

    /// Apply a driver-originated state (and optionally result) change
    /// without the transition-graph or permission checks that gate
    /// worker-originated `Update` calls — the driver is trusted to only
    /// request legal transitions.
    pub async fn apply_driver_transition(
        &self,
        id: Uuid,
        next_state: NodeState,
        result: Option<NodeResult>,
    ) -> Option<(NodeState, NodeState)> {
        let mut nodes = self.nodes.write().await;
        let node = nodes.get_mut(&id)?;
        if node.state == next_state {
            return None;
        }
        let prev = node.state;
        node.state = next_state;
        if let Some(result) = result {
            node.result = result;
        }
        node.updated = Utc::now();
        Some((prev, next_state))
    }

    pub async fn nodes_eligible_for_timeout(&self, now: DateTime<Utc>) -> Vec<Node> {
        self.nodes_in_states(&[NodeState::Running, NodeState::Available, NodeState::Closing])
            .await
            .into_iter()
            .filter(|n| n.timeout <= now)
            .collect()
    }
}

fn node_as_value(node: &Node) -> serde_json::Value {
    serde_json::to_value(node).unwrap_or(serde_json::Value::Null)
}
