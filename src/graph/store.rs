//! The graph arena and its single mutation point, `connect`.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::errors::GraphError;
use super::node::{Node, NodePayload, ProblemLink};
use crate::types::{LinkMode, NodeId, NodeKind};

/// Outcome of a `connect` call.
///
/// Duplicate connections are deliberately not errors: re-training over the
/// same corpus replays the same edges, and the append must be idempotent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connected {
    /// The edge was added and back-pointers were set.
    Added,
    /// The edge already existed; nothing changed. Logged and audited.
    AlreadyPresent,
}

/// Options for `connect`.
///
/// `link_mode` is consulted for `Feature -> Problem` edges only. The graph's
/// link-mode policy (first problem `hard`, later ones `soft`) always wins;
/// a requested mode that disagrees is logged and overridden, because the
/// policy is what lets a session terminate on an unsolved top-line problem.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConnectOptions {
    pub link_mode: Option<LinkMode>,
}

impl ConnectOptions {
    #[must_use]
    pub fn soft() -> Self {
        Self {
            link_mode: Some(LinkMode::Soft),
        }
    }
}

/// JSON-line record appended to the duplicate-edge audit sink.
#[derive(Serialize)]
struct DupRecord<'a> {
    when: DateTime<Utc>,
    reason: &'static str,
    parent_id: &'a NodeId,
    parent_kind: NodeKind,
    parent_desc: &'a str,
    child_id: &'a NodeId,
    child_kind: NodeKind,
    child_desc: &'a str,
}

/// The diagnostic graph: a typed directed multigraph stored as an arena of
/// [`Node`] records keyed by id.
///
/// Exactly one origin, one success terminal and one failure terminal exist;
/// their ids are fixed at construction. All structural mutation goes through
/// [`insert`](Self::insert) and [`connect`](Self::connect); `connect` is the
/// single place the edge rules of the diagnostic protocol are enforced:
///
/// | parent   | allowed children        |
/// |----------|-------------------------|
/// | Origin   | Feature                 |
/// | Feature  | Feature, Problem        |
/// | Problem  | Feature, Solution       |
/// | Solution | Success (the singleton) |
///
/// Success and Failure have no outgoing edges, and the failure terminal is
/// never stored as an edge target: sessions reach it only through run-time
/// decisions.
#[derive(Clone, Debug)]
pub struct Graph {
    nodes: FxHashMap<NodeId, Node>,
    root: NodeId,
    success: NodeId,
    failure: NodeId,
    dup_audit: Option<PathBuf>,
}

impl Graph {
    /// Creates the minimal valid graph: origin, success and failure
    /// singletons with their fixed ids, and nothing else.
    #[must_use]
    pub fn empty() -> Self {
        let root = Node::origin(NodeId::new(NodeId::ORIGIN), "troubleshooting entry");
        let success = Node::success(NodeId::new(NodeId::SUCCESS), "issue resolved");
        let failure = Node::failure(NodeId::new(NodeId::FAILURE), "no resolution found");

        let mut nodes = FxHashMap::default();
        let (root_id, success_id, failure_id) =
            (root.id.clone(), success.id.clone(), failure.id.clone());
        nodes.insert(root_id.clone(), root);
        nodes.insert(success_id.clone(), success);
        nodes.insert(failure_id.clone(), failure);

        Self {
            nodes,
            root: root_id,
            success: success_id,
            failure: failure_id,
            dup_audit: None,
        }
    }

    /// Assembles a graph from already-wired parts. The codec validates the
    /// result before handing it out; nothing else should call this.
    pub(crate) fn from_parts(
        nodes: FxHashMap<NodeId, Node>,
        root: NodeId,
        success: NodeId,
        failure: NodeId,
    ) -> Self {
        Self {
            nodes,
            root,
            success,
            failure,
            dup_audit: None,
        }
    }

    /// Appends skipped duplicate connections as JSON lines to `path`.
    #[must_use]
    pub fn with_dup_audit(mut self, path: impl Into<PathBuf>) -> Self {
        self.dup_audit = Some(path.into());
        self
    }

    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    pub fn success_id(&self) -> &NodeId {
        &self.success
    }

    pub fn failure_id(&self) -> &NodeId {
        &self.failure
    }

    /// Looks a node up by id.
    #[must_use]
    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes, terminals included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates all node records in unspecified order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All nodes of one kind, ordered by id so that callers (the training
    /// builder in particular) see a stable candidate order across runs.
    #[must_use]
    pub fn all_of_kind(&self, kind: NodeKind) -> Vec<&Node> {
        let mut found: Vec<&Node> = self.nodes.values().filter(|n| n.kind() == kind).collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    /// Registers a new node. The node is unreachable until `connect` links it.
    pub fn insert(&mut self, node: Node) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode { id: node.id });
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Connects `child` under `parent`, enforcing the edge rules and setting
    /// the child's back-pointer.
    ///
    /// Illegal kind pairs fail with [`GraphError::EdgeRuleViolation`]; an
    /// edge that already exists is skipped, logged and audited, and reported
    /// as [`Connected::AlreadyPresent`].
    pub fn connect(
        &mut self,
        parent: &NodeId,
        child: &NodeId,
        options: ConnectOptions,
    ) -> Result<Connected, GraphError> {
        let parent_kind = self
            .get(parent)
            .ok_or_else(|| GraphError::UnknownNode { id: parent.clone() })?
            .kind();
        let child_kind = self
            .get(child)
            .ok_or_else(|| GraphError::UnknownNode { id: child.clone() })?
            .kind();

        match (parent_kind, child_kind) {
            (NodeKind::Origin, NodeKind::Feature)
            | (NodeKind::Feature, NodeKind::Feature)
            | (NodeKind::Problem, NodeKind::Feature) => {
                if self.feature_child_exists(parent, child) {
                    self.audit_duplicate(parent, child);
                    return Ok(Connected::AlreadyPresent);
                }
                self.push_feature_child(parent, child);
                self.set_feature_parent(child, parent);
                Ok(Connected::Added)
            }
            (NodeKind::Feature, NodeKind::Problem) => {
                if self.problem_child_exists(parent, child) {
                    self.audit_duplicate(parent, child);
                    return Ok(Connected::AlreadyPresent);
                }
                let mode = self.effective_link_mode(parent, options.link_mode);
                self.push_problem_child(parent, child, mode);
                self.set_problem_parent(child, parent, mode);
                Ok(Connected::Added)
            }
            (NodeKind::Problem, NodeKind::Solution) => {
                if self.solution_child_exists(parent, child) {
                    self.audit_duplicate(parent, child);
                    return Ok(Connected::AlreadyPresent);
                }
                self.push_solution_child(parent, child);
                self.set_solution_parent(child, parent);
                // A solution must always resolve to the singleton success.
                if self.repair_solution_success(child)? {
                    warn!(solution = %child, "re-pointed solution at the singleton success node");
                }
                Ok(Connected::Added)
            }
            (NodeKind::Solution, NodeKind::Success) => {
                if child != &self.success {
                    return Err(GraphError::ForeignSuccess {
                        solution: parent.clone(),
                    });
                }
                if self
                    .get(parent)
                    .and_then(Node::success_target)
                    .is_some_and(|s| s == child)
                {
                    self.audit_duplicate(parent, child);
                    return Ok(Connected::AlreadyPresent);
                }
                let repaired = self.repair_solution_success(parent)?;
                Ok(if repaired {
                    Connected::Added
                } else {
                    Connected::AlreadyPresent
                })
            }
            (parent, child) => Err(GraphError::EdgeRuleViolation { parent, child }),
        }
    }

    /// Points `solution` at the graph's singleton success terminal, returning
    /// whether anything changed. Reused when loading legacy documents whose
    /// solutions lost their success binding.
    pub fn repair_solution_success(&mut self, solution: &NodeId) -> Result<bool, GraphError> {
        let success = self.success.clone();
        let node = self
            .nodes
            .get_mut(solution)
            .ok_or_else(|| GraphError::UnknownNode {
                id: solution.clone(),
            })?;
        match &mut node.payload {
            NodePayload::Solution { success: s, .. } if *s != success => {
                *s = success;
                Ok(true)
            }
            NodePayload::Solution { .. } => Ok(false),
            _ => Err(GraphError::EdgeRuleViolation {
                parent: node.kind(),
                child: NodeKind::Success,
            }),
        }
    }

    // ------------------------------------------------------------------
    // connect internals
    // ------------------------------------------------------------------

    fn effective_link_mode(&self, feature: &NodeId, requested: Option<LinkMode>) -> LinkMode {
        let first = self
            .get(feature)
            .is_some_and(|f| f.child_problems().is_empty());
        let mode = if first { LinkMode::Hard } else { LinkMode::Soft };
        if let Some(asked) = requested {
            if asked != mode {
                debug!(feature = %feature, %asked, applied = %mode, "link-mode policy overrode requested mode");
            }
        }
        mode
    }

    fn feature_child_exists(&self, parent: &NodeId, child: &NodeId) -> bool {
        self.get(parent)
            .is_some_and(|p| p.child_features().contains(child))
    }

    fn problem_child_exists(&self, parent: &NodeId, child: &NodeId) -> bool {
        self.get(parent)
            .is_some_and(|p| p.child_problems().iter().any(|l| &l.problem == child))
    }

    fn solution_child_exists(&self, parent: &NodeId, child: &NodeId) -> bool {
        self.get(parent)
            .is_some_and(|p| p.solutions().contains(child))
    }

    fn push_feature_child(&mut self, parent: &NodeId, child: &NodeId) {
        if let Some(node) = self.nodes.get_mut(parent) {
            match &mut node.payload {
                NodePayload::Origin { child_features }
                | NodePayload::Feature { child_features, .. }
                | NodePayload::Problem { child_features, .. } => {
                    child_features.push(child.clone());
                }
                _ => {}
            }
        }
    }

    fn push_problem_child(&mut self, parent: &NodeId, child: &NodeId, mode: LinkMode) {
        if let Some(node) = self.nodes.get_mut(parent) {
            if let NodePayload::Feature { child_problems, .. } = &mut node.payload {
                child_problems.push(ProblemLink {
                    problem: child.clone(),
                    mode,
                });
            }
        }
    }

    fn push_solution_child(&mut self, parent: &NodeId, child: &NodeId) {
        if let Some(node) = self.nodes.get_mut(parent) {
            if let NodePayload::Problem { solutions, .. } = &mut node.payload {
                solutions.push(child.clone());
            }
        }
    }

    fn set_feature_parent(&mut self, child: &NodeId, parent: &NodeId) {
        if let Some(node) = self.nodes.get_mut(child) {
            if let NodePayload::Feature { parent: p, .. } = &mut node.payload {
                *p = Some(parent.clone());
            }
        }
    }

    fn set_problem_parent(&mut self, child: &NodeId, parent: &NodeId, mode: LinkMode) {
        if let Some(node) = self.nodes.get_mut(child) {
            if let NodePayload::Problem {
                parent_feature,
                mode: m,
                ..
            } = &mut node.payload
            {
                *parent_feature = Some(parent.clone());
                *m = mode;
            }
        }
    }

    fn set_solution_parent(&mut self, child: &NodeId, parent: &NodeId) {
        if let Some(node) = self.nodes.get_mut(child) {
            if let NodePayload::Solution { parent_problem, .. } = &mut node.payload {
                *parent_problem = Some(parent.clone());
            }
        }
    }

    fn audit_duplicate(&self, parent: &NodeId, child: &NodeId) {
        let (Some(p), Some(c)) = (self.get(parent), self.get(child)) else {
            return;
        };
        warn!(parent = %parent, child = %child, "duplicate connection skipped");

        let Some(path) = &self.dup_audit else {
            return;
        };
        let record = DupRecord {
            when: Utc::now(),
            reason: "duplicate-connection",
            parent_id: &p.id,
            parent_kind: p.kind(),
            parent_desc: &p.description,
            child_id: &c.id,
            child_kind: c.kind(),
            child_desc: &c.description,
        };
        if let Err(error) = append_json_line(path, &record) {
            warn!(%error, path = %path.display(), "failed to append duplicate-edge audit record");
        }
    }
}

fn append_json_line(path: &Path, record: &DupRecord<'_>) -> std::io::Result<()> {
    let line = serde_json::to_string(record).map_err(std::io::Error::other)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{line}")
}
