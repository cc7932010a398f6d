//! Node records for the diagnostic graph.
//!
//! A node is a small record: a stable id, a human-readable description (the
//! semantic key the oracle matches against), and a kind-specific payload
//! holding its outgoing edges and back-pointers. Nodes reference each other
//! by id only; the [`Graph`](super::Graph) arena owns every record.
//!
//! Session-local observations (visited flags, expected states) never live
//! here — they belong to the per-session side table so that many concurrent
//! sessions can share one immutable graph.

use serde::{Deserialize, Serialize};

use crate::types::{LinkMode, NodeId, NodeKind};

/// A `Feature -> Problem` edge together with its link mode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemLink {
    pub problem: NodeId,
    pub mode: LinkMode,
}

/// Kind-specific payload of a node: outgoing edges plus back-pointers.
///
/// Back-pointers (`parent`, `parent_feature`, `parent_problem`) are set by
/// [`Graph::connect`](super::Graph::connect), which is the single writer and
/// keeps them consistent with the child lists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodePayload {
    Origin {
        child_features: Vec<NodeId>,
    },
    Feature {
        /// Containing Origin, Feature or Problem.
        parent: Option<NodeId>,
        child_problems: Vec<ProblemLink>,
        child_features: Vec<NodeId>,
    },
    Problem {
        parent_feature: Option<NodeId>,
        /// Mirrors the link mode of the most recent feature edge.
        mode: LinkMode,
        solutions: Vec<NodeId>,
        child_features: Vec<NodeId>,
    },
    Solution {
        parent_problem: Option<NodeId>,
        /// Always the graph's singleton success terminal.
        success: NodeId,
    },
    Success,
    Failure,
}

/// A single node of the diagnostic graph.
///
/// `description` and the node's kind are immutable once created; child lists
/// only ever grow, and only through [`Graph::connect`](super::Graph::connect).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub description: String,
    pub payload: NodePayload,
}

impl Node {
    /// Creates an origin node with no children yet.
    #[must_use]
    pub fn origin(id: NodeId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            payload: NodePayload::Origin {
                child_features: Vec::new(),
            },
        }
    }

    /// Creates an unattached feature node; `connect` sets its parent.
    #[must_use]
    pub fn feature(id: NodeId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            payload: NodePayload::Feature {
                parent: None,
                child_problems: Vec::new(),
                child_features: Vec::new(),
            },
        }
    }

    /// Creates an unattached problem node; `connect` sets its parent feature
    /// and link mode.
    #[must_use]
    pub fn problem(id: NodeId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            payload: NodePayload::Problem {
                parent_feature: None,
                mode: LinkMode::default(),
                solutions: Vec::new(),
                child_features: Vec::new(),
            },
        }
    }

    /// Creates a solution node already pointing at the success terminal.
    #[must_use]
    pub fn solution(id: NodeId, description: impl Into<String>, success: NodeId) -> Self {
        Self {
            id,
            description: description.into(),
            payload: NodePayload::Solution {
                parent_problem: None,
                success,
            },
        }
    }

    /// Creates the success terminal.
    #[must_use]
    pub fn success(id: NodeId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            payload: NodePayload::Success,
        }
    }

    /// Creates the failure terminal.
    #[must_use]
    pub fn failure(id: NodeId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            payload: NodePayload::Failure,
        }
    }

    /// The node's kind, derived from its payload.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self.payload {
            NodePayload::Origin { .. } => NodeKind::Origin,
            NodePayload::Feature { .. } => NodeKind::Feature,
            NodePayload::Problem { .. } => NodeKind::Problem,
            NodePayload::Solution { .. } => NodeKind::Solution,
            NodePayload::Success => NodeKind::Success,
            NodePayload::Failure => NodeKind::Failure,
        }
    }

    /// Child features, for the kinds that carry them.
    #[must_use]
    pub fn child_features(&self) -> &[NodeId] {
        match &self.payload {
            NodePayload::Origin { child_features }
            | NodePayload::Feature { child_features, .. }
            | NodePayload::Problem { child_features, .. } => child_features,
            _ => &[],
        }
    }

    /// Child problems with their link modes (features only).
    #[must_use]
    pub fn child_problems(&self) -> &[ProblemLink] {
        match &self.payload {
            NodePayload::Feature { child_problems, .. } => child_problems,
            _ => &[],
        }
    }

    /// Attached solutions (problems only).
    #[must_use]
    pub fn solutions(&self) -> &[NodeId] {
        match &self.payload {
            NodePayload::Problem { solutions, .. } => solutions,
            _ => &[],
        }
    }

    /// The containing node this one hands control back to, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&NodeId> {
        match &self.payload {
            NodePayload::Feature { parent, .. } => parent.as_ref(),
            NodePayload::Problem { parent_feature, .. } => parent_feature.as_ref(),
            NodePayload::Solution { parent_problem, .. } => parent_problem.as_ref(),
            _ => None,
        }
    }

    /// The problem's stored mode (problems only).
    #[must_use]
    pub fn problem_mode(&self) -> Option<LinkMode> {
        match &self.payload {
            NodePayload::Problem { mode, .. } => Some(*mode),
            _ => None,
        }
    }

    /// The solution's success target (solutions only).
    #[must_use]
    pub fn success_target(&self) -> Option<&NodeId> {
        match &self.payload {
            NodePayload::Solution { success, .. } => Some(success),
            _ => None,
        }
    }

    /// Candidate label handed to the oracle: `"id:description"`.
    #[must_use]
    pub fn candidate_label(&self) -> String {
        format!("{}:{}", self.id, self.description)
    }
}
