//! Core identity types for the diagnostic graph.
//!
//! This module defines the vocabulary every other module speaks: stable node
//! identifiers, the closed set of node kinds, and the link mode carried by
//! `Feature -> Problem` edges.
//!
//! # Key Types
//!
//! - [`NodeId`]: stable, opaque identifier for a graph node
//! - [`NodeKind`]: the six node kinds of the diagnostic protocol
//! - [`LinkMode`]: `hard`/`soft` attribute of a feature-to-problem edge
//!
//! # Examples
//!
//! ```rust
//! use faultgraph::types::{LinkMode, NodeKind};
//!
//! let kind = NodeKind::Problem;
//! assert_eq!(kind.encode(), "Problem");
//! assert_eq!(NodeKind::decode("Problem"), Some(NodeKind::Problem));
//!
//! assert_eq!(LinkMode::Hard.to_string(), "hard");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable, globally unique identifier for a node in the diagnostic graph.
///
/// Ids are short opaque strings. Nodes created during training use a
/// one-letter kind prefix plus eight hex characters (`F_1a2b3c4d`); the three
/// singletons use the fixed ids [`NodeId::ORIGIN`], [`NodeId::SUCCESS`] and
/// [`NodeId::FAILURE`]. Ids are part of the persisted document and never
/// change across save/load.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Fixed id of the singleton origin node.
    pub const ORIGIN: &'static str = "ORIGIN";
    /// Fixed id of the singleton success terminal.
    pub const SUCCESS: &'static str = "SUCCESS";
    /// Fixed id of the singleton failure terminal.
    pub const FAILURE: &'static str = "FAILURE";

    /// Wraps an existing id string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh id for the given kind: the kind's prefix letter plus the
    /// first eight hex characters of a v4 UUID.
    #[must_use]
    pub fn fresh(kind: NodeKind) -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}_{}", kind.id_prefix(), &hex[..8]))
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The closed set of node kinds in the diagnostic graph.
///
/// The kind decides which edges a node may carry and how a session behaves
/// when it enters the node:
///
/// - [`Origin`](Self::Origin): the unique root every session starts from
/// - [`Feature`](Self::Feature): an observable predicate, answered yes/no/unsure
/// - [`Problem`](Self::Problem): a latent condition with solutions and/or sub-features
/// - [`Solution`](Self::Solution): a concrete user action pointing at the success terminal
/// - [`Success`](Self::Success) / [`Failure`](Self::Failure): the two terminals
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Origin,
    Feature,
    Problem,
    Solution,
    Success,
    Failure,
}

impl NodeKind {
    /// Encode a kind into its persisted string form.
    #[must_use]
    pub fn encode(&self) -> &'static str {
        match self {
            NodeKind::Origin => "Origin",
            NodeKind::Feature => "Feature",
            NodeKind::Problem => "Problem",
            NodeKind::Solution => "Solution",
            NodeKind::Success => "Success",
            NodeKind::Failure => "Failure",
        }
    }

    /// Decode a persisted string form back into a kind.
    ///
    /// Returns `None` for unknown strings; the codec treats that as a corrupt
    /// document rather than guessing.
    #[must_use]
    pub fn decode(s: &str) -> Option<Self> {
        match s {
            "Origin" => Some(NodeKind::Origin),
            "Feature" => Some(NodeKind::Feature),
            "Problem" => Some(NodeKind::Problem),
            "Solution" => Some(NodeKind::Solution),
            "Success" => Some(NodeKind::Success),
            "Failure" => Some(NodeKind::Failure),
            _ => None,
        }
    }

    /// Returns `true` for the two terminal kinds.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeKind::Success | NodeKind::Failure)
    }

    pub(crate) fn id_prefix(&self) -> &'static str {
        match self {
            NodeKind::Origin => "O",
            NodeKind::Feature => "F",
            NodeKind::Problem => "P",
            NodeKind::Solution => "S",
            NodeKind::Success => "OK",
            NodeKind::Failure => "KO",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Mode of a `Feature -> Problem` edge.
///
/// A `hard` problem ends the session in failure when it runs out of solutions
/// and sub-features; a `soft` problem hands control back to its parent feature
/// so a sibling branch can still succeed. The first problem linked under a
/// feature is always `hard`, every later one `soft`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    Hard,
    #[default]
    Soft,
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkMode::Hard => write!(f, "hard"),
            LinkMode::Soft => write!(f, "soft"),
        }
    }
}
