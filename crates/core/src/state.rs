// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Node lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Running,
    Available,
    Closing,
    Done,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Available => "available",
            Self::Closing => "closing",
            Self::Done => "done",
        }
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// `Running -> Available`, `Running -> Done`, `Available -> Closing`,
    /// `Available -> Done`, `Closing -> Done` are legal; everything else
    /// (including same-state no-ops and any edge out of `Done`) is not.
    pub fn can_transition_to(self, next: NodeState) -> bool {
        matches!(
            (self, next),
            (NodeState::Running, NodeState::Available)
                | (NodeState::Running, NodeState::Done)
                | (NodeState::Available, NodeState::Closing)
                | (NodeState::Available, NodeState::Done)
                | (NodeState::Closing, NodeState::Done)
        )
    }
}
