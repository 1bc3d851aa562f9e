// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Node outcome. Orthogonal to `NodeState`: only meaningful once
/// `state == Done`, but the type itself carries no such restriction — the
/// store enforces terminal immutability instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeResult {
    Pass,
    Fail,
    Skip,
    Incomplete,
    #[default]
    Absent,
}

impl NodeResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::Incomplete => "incomplete",
            Self::Absent => "absent",
        }
    }
}
