//! Document-oriented persistence for the diagnostic graph.
//!
//! The whole graph is one structured JSON document:
//!
//! ```json
//! {
//!   "root_id": "ORIGIN",
//!   "success_id": "SUCCESS",
//!   "failure_id": "FAILURE",
//!   "nodes": {
//!     "F_1a2b3c4d": {
//!       "type": "Feature",
//!       "description": "robot won't boot",
//!       "parent_node": "ORIGIN",
//!       "child_problems": [["P_99aa00bb", "hard"]]
//!     }
//!   }
//! }
//! ```
//!
//! Documents are written pretty-printed with sorted node ids so that graph
//! revisions diff cleanly, and saved through a temp-file rename so a crashed
//! training run never leaves a torn file behind. Loading is two-pass: every
//! record is instantiated first, then the wiring is verified — any dangling
//! reference, duplicate child, unknown kind string or broken singleton is a
//! [`CodecError::CorruptGraph`]. Unknown keys in a record are tolerated and
//! dropped (older documents carried session state such as `expected_state`;
//! that state is session-local here and never persisted).

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::graph::{Graph, Node, NodePayload, ProblemLink};
use crate::types::{LinkMode, NodeId, NodeKind};

/// Errors from graph persistence.
#[derive(Debug, Error, Diagnostic)]
pub enum CodecError {
    /// Reading or writing the document file failed.
    #[error("graph document io error at {path}")]
    #[diagnostic(
        code(faultgraph::codec::io),
        help("check that the path exists and is writable: {path}")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for the document schema.
    #[error(transparent)]
    #[diagnostic(code(faultgraph::codec::serde))]
    Serde(#[from] serde_json::Error),

    /// The document parsed but does not describe a valid graph.
    #[error("corrupt graph document: {detail}")]
    #[diagnostic(
        code(faultgraph::codec::corrupt),
        help("the document references nodes that do not exist or breaks the edge rules; \
              it cannot be loaded safely")
    )]
    CorruptGraph { detail: String },
}

fn corrupt(detail: impl Into<String>) -> CodecError {
    CodecError::CorruptGraph {
        detail: detail.into(),
    }
}

/// One persisted node record. Kind-specific fields are optional and empty
/// collections are omitted on save.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_features: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_problems: Vec<(NodeId, LinkMode)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub solutions: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_node: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_feature: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_problem: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_node: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<LinkMode>,
}

/// The complete persisted form of a graph.
///
/// `nodes` is a sorted map so the pretty-printed output is stable and
/// human-diffable across saves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub root_id: NodeId,
    pub success_id: NodeId,
    pub failure_id: NodeId,
    pub nodes: BTreeMap<NodeId, NodeRecord>,
}

impl GraphDocument {
    /// Snapshots a graph into its document form.
    #[must_use]
    pub fn from_graph(graph: &Graph) -> Self {
        let mut nodes = BTreeMap::new();
        for node in graph.nodes() {
            nodes.insert(node.id.clone(), record_from_node(node));
        }
        Self {
            root_id: graph.root_id().clone(),
            success_id: graph.success_id().clone(),
            failure_id: graph.failure_id().clone(),
            nodes,
        }
    }

    /// Rebuilds the graph, verifying every structural invariant.
    pub fn into_graph(self) -> Result<Graph, CodecError> {
        // Pass 1: instantiate every record.
        let mut nodes: FxHashMap<NodeId, Node> = FxHashMap::default();
        for (id, record) in &self.nodes {
            let node = node_from_record(id, record, &self.success_id)?;
            nodes.insert(id.clone(), node);
        }

        // Pass 2: verify singletons, wiring and back-pointers.
        let graph = Graph::from_parts(
            nodes,
            self.root_id.clone(),
            self.success_id.clone(),
            self.failure_id.clone(),
        );
        validate(&graph)?;
        Ok(graph)
    }
}

/// Saves and loads graph documents.
pub struct GraphCodec;

impl GraphCodec {
    /// Writes the graph as pretty JSON via an atomic temp-file rename.
    pub fn save(graph: &Graph, path: &Path) -> Result<(), CodecError> {
        let document = GraphDocument::from_graph(graph);
        let json = serde_json::to_string_pretty(&document)?;

        let tmp = path.with_extension("tmp");
        let io = |source| CodecError::Io {
            path: path.display().to_string(),
            source,
        };
        std::fs::write(&tmp, json).map_err(io)?;
        std::fs::rename(&tmp, path).map_err(io)?;
        debug!(path = %path.display(), nodes = graph.len(), "graph document saved");
        Ok(())
    }

    /// Loads and validates a graph document.
    pub fn load(path: &Path) -> Result<Graph, CodecError> {
        let text = std::fs::read_to_string(path).map_err(|source| CodecError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let document: GraphDocument = serde_json::from_str(&text)?;
        let graph = document.into_graph()?;
        info!(path = %path.display(), nodes = graph.len(), "graph document loaded");
        Ok(graph)
    }
}

fn record_from_node(node: &Node) -> NodeRecord {
    let mut record = NodeRecord {
        kind: node.kind().encode().to_string(),
        description: node.description.clone(),
        ..NodeRecord::default()
    };
    match &node.payload {
        NodePayload::Origin { child_features } => {
            record.child_features = child_features.clone();
        }
        NodePayload::Feature {
            parent,
            child_problems,
            child_features,
        } => {
            record.parent_node = parent.clone();
            record.child_features = child_features.clone();
            record.child_problems = child_problems
                .iter()
                .map(|link| (link.problem.clone(), link.mode))
                .collect();
        }
        NodePayload::Problem {
            parent_feature,
            mode,
            solutions,
            child_features,
        } => {
            record.parent_feature = parent_feature.clone();
            record.mode = Some(*mode);
            record.solutions = solutions.clone();
            record.child_features = child_features.clone();
        }
        NodePayload::Solution {
            parent_problem,
            success,
        } => {
            record.parent_problem = parent_problem.clone();
            record.success_node = Some(success.clone());
        }
        NodePayload::Success | NodePayload::Failure => {}
    }
    record
}

fn node_from_record(
    id: &NodeId,
    record: &NodeRecord,
    success_id: &NodeId,
) -> Result<Node, CodecError> {
    let kind = NodeKind::decode(&record.kind)
        .ok_or_else(|| corrupt(format!("node {id} has unknown kind `{}`", record.kind)))?;

    let payload = match kind {
        NodeKind::Origin => NodePayload::Origin {
            child_features: record.child_features.clone(),
        },
        NodeKind::Feature => NodePayload::Feature {
            parent: record.parent_node.clone(),
            child_problems: record
                .child_problems
                .iter()
                .map(|(problem, mode)| ProblemLink {
                    problem: problem.clone(),
                    mode: *mode,
                })
                .collect(),
            child_features: record.child_features.clone(),
        },
        NodeKind::Problem => NodePayload::Problem {
            parent_feature: record.parent_feature.clone(),
            mode: record.mode.unwrap_or_default(),
            solutions: record.solutions.clone(),
            child_features: record.child_features.clone(),
        },
        // Older documents sometimes dropped the success binding; repair it to
        // the document's singleton rather than rejecting the file.
        NodeKind::Solution => NodePayload::Solution {
            parent_problem: record.parent_problem.clone(),
            success: record
                .success_node
                .clone()
                .unwrap_or_else(|| success_id.clone()),
        },
        NodeKind::Success => NodePayload::Success,
        NodeKind::Failure => NodePayload::Failure,
    };

    Ok(Node {
        id: id.clone(),
        description: record.description.clone(),
        payload,
    })
}

fn validate(graph: &Graph) -> Result<(), CodecError> {
    expect_kind(graph, graph.root_id(), NodeKind::Origin, "root_id")?;
    expect_kind(graph, graph.success_id(), NodeKind::Success, "success_id")?;
    expect_kind(graph, graph.failure_id(), NodeKind::Failure, "failure_id")?;

    for kind in [NodeKind::Origin, NodeKind::Success, NodeKind::Failure] {
        let count = graph.all_of_kind(kind).len();
        if count != 1 {
            return Err(corrupt(format!("expected exactly one {kind}, found {count}")));
        }
    }

    for node in graph.nodes() {
        validate_children(graph, node)?;
        validate_back_pointer(graph, node)?;
    }
    Ok(())
}

fn expect_kind(
    graph: &Graph,
    id: &NodeId,
    kind: NodeKind,
    what: &str,
) -> Result<(), CodecError> {
    match graph.get(id) {
        Some(node) if node.kind() == kind => Ok(()),
        Some(node) => Err(corrupt(format!(
            "{what} {id} resolves to a {} node, expected {kind}",
            node.kind()
        ))),
        None => Err(corrupt(format!("{what} {id} is not in the node table"))),
    }
}

fn validate_children(graph: &Graph, node: &Node) -> Result<(), CodecError> {
    let id = &node.id;

    let children = node
        .child_features()
        .iter()
        .map(|c| (c, NodeKind::Feature))
        .chain(
            node.child_problems()
                .iter()
                .map(|l| (&l.problem, NodeKind::Problem)),
        )
        .chain(node.solutions().iter().map(|c| (c, NodeKind::Solution)));

    let mut seen: Vec<&NodeId> = Vec::new();
    for (child, expected) in children {
        if seen.contains(&child) {
            return Err(corrupt(format!("{id} lists child {child} twice")));
        }
        let target = graph
            .get(child)
            .ok_or_else(|| corrupt(format!("{id} references missing node {child}")))?;
        if target.kind() != expected {
            return Err(corrupt(format!(
                "illegal edge {} -> {}: {id} -> {child}",
                node.kind(),
                target.kind()
            )));
        }
        seen.push(child);
    }

    if let Some(success) = node.success_target() {
        if success != graph.success_id() {
            return Err(corrupt(format!(
                "solution {id} resolves to {success}, expected the singleton {}",
                graph.success_id()
            )));
        }
    }
    Ok(())
}

/// A node's parent must exist and actually list the node among its children.
/// A node reused under several parents keeps the most recent one as its
/// back-pointer, so the check runs from child to parent, not the reverse.
fn validate_back_pointer(graph: &Graph, node: &Node) -> Result<(), CodecError> {
    let Some(parent_id) = node.parent() else {
        return Ok(());
    };
    let parent = graph
        .get(parent_id)
        .ok_or_else(|| corrupt(format!("{} points at missing parent {parent_id}", node.id)))?;

    let listed = match node.kind() {
        NodeKind::Feature => parent.child_features().contains(&node.id),
        NodeKind::Problem => parent.child_problems().iter().any(|l| l.problem == node.id),
        NodeKind::Solution => parent.solutions().contains(&node.id),
        _ => true,
    };
    if !listed {
        return Err(corrupt(format!(
            "{} names parent {parent_id}, which does not list it as a child",
            node.id
        )));
    }
    Ok(())
}
