// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::result::NodeResult;
use crate::state::NodeState;

/// Discriminator for a node. Unknown kinds round-trip as opaque strings
/// instead of failing to deserialize, for forward compatibility with kinds
/// this build doesn't know about yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Checkout,
    Kbuild,
    Job,
    Test,
    Other(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Checkout => "checkout",
            Self::Kbuild => "kbuild",
            Self::Job => "job",
            Self::Test => "test",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        match s {
            "checkout" => Self::Checkout,
            "kbuild" => Self::Kbuild,
            "job" => Self::Job,
            "test" => Self::Test,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl Serialize for NodeKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(NodeKind::from(s.as_str()))
    }
}

/// A pipeline artifact node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub kind: NodeKind,
    pub name: String,
    pub path: Vec<String>,
    pub parent: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub state: NodeState,
    pub result: NodeResult,
    /// Opaque structured payload (`kernel_revision`, `runtime`, `job_id`, `platform`, ...).
    #[serde(default)]
    pub data: serde_json::Value,
    /// Label -> URL. Keys are unique by construction of the map type.
    #[serde(default)]
    pub artifacts: BTreeMap<String, String>,
    pub owner: String,
    #[serde(default)]
    pub user_groups: Vec<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holdoff: Option<DateTime<Utc>>,
    pub timeout: DateTime<Utc>,
    #[serde(default)]
    pub retry_counter: u32,
}

/// Caller-supplied fields for `Create`.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeDraft {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<Uuid>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub artifacts: BTreeMap<String, String>,
    #[serde(default)]
    pub user_groups: Vec<String>,
    /// Optional override of the default 6h timeout.
    #[serde(default)]
    pub timeout: Option<DateTime<Utc>>,
}

/// Partial document for `Update`. Forbidden fields (`id`, `created`, `kind`,
/// `path`, `parent`) are intentionally absent from this type so they cannot
/// be set through a patch.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NodePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub state: Option<NodeState>,
    #[serde(default)]
    pub result: Option<NodeResult>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub artifacts: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub user_groups: Option<Vec<String>>,
    #[serde(default)]
    pub holdoff: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timeout: Option<DateTime<Utc>>,
    /// Optimistic concurrency token: the `updated` timestamp the caller last
    /// observed. Mismatch against the stored value is a `Conflict` (Design
    /// Notes: "Retry semantics for updates").
    #[serde(default)]
    pub if_updated: Option<DateTime<Utc>>,
}
