//! Session-local state.
//!
//! Graph nodes are shared and immutable during production; everything a
//! single diagnostic session observes about them lives here, in a side
//! table keyed by node id. A fresh session starts with a fresh table, so
//! any number of concurrent sessions can traverse one `Arc<Graph>`.

use rustc_hash::FxHashMap;

use crate::message::Message;
use crate::types::{LinkMode, NodeId};

/// Three-valued memo of a feature's observed state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExpectedState {
    /// Not yet judged, or the last judgment was inconclusive.
    #[default]
    Unknown,
    /// The feature was observed to hold.
    Holds,
    /// The feature was observed (or concluded) not to hold.
    Absent,
}

/// Per-node observations accumulated during one session.
#[derive(Clone, Copy, Debug, Default)]
pub struct NodeObservations {
    pub visited: bool,
    pub visit_count: u32,
    /// Features: memoized yes/no judgment; re-entries reuse it.
    pub expected_state: ExpectedState,
    /// Features: the yes branch was taken at least once.
    pub confirmed_positive: bool,
    /// Problems: the triggering feature disappeared after a fix attempt.
    pub resolved: bool,
    /// Problems: the link mode carried in by the feature that routed here,
    /// which can differ from the stored mode when a problem is shared.
    pub active_mode: Option<LinkMode>,
}

/// All state owned by one diagnostic session: the per-node side table and
/// the append-only dialog log.
#[derive(Debug, Default)]
pub struct SessionState {
    observations: FxHashMap<NodeId, NodeObservations>,
    dialog: Vec<Message>,
}

impl SessionState {
    /// Starts a session seeded with the user's opening issue statement.
    #[must_use]
    pub fn new(opening_statement: &str) -> Self {
        Self {
            observations: FxHashMap::default(),
            dialog: vec![Message::user(opening_statement)],
        }
    }

    /// Mutable observations for a node, created on first touch.
    pub fn entry(&mut self, id: &NodeId) -> &mut NodeObservations {
        self.observations.entry(id.clone()).or_default()
    }

    /// Copy of a node's observations; defaults when never touched.
    #[must_use]
    pub fn observed(&self, id: &NodeId) -> NodeObservations {
        self.observations.get(id).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn visited(&self, id: &NodeId) -> bool {
        self.observed(id).visited
    }

    /// Marks a node entered, bumping its visit counter.
    pub fn mark_entered(&mut self, id: &NodeId) {
        let obs = self.entry(id);
        obs.visited = true;
        obs.visit_count += 1;
    }

    pub fn push_user(&mut self, content: &str) {
        self.dialog.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: &str) {
        self.dialog.push(Message::assistant(content));
    }

    /// The dialog log, oldest turn first.
    #[must_use]
    pub fn dialog(&self) -> &[Message] {
        &self.dialog
    }
}
