//! Error types for graph construction and mutation.

use miette::Diagnostic;
use thiserror::Error;

use crate::types::{NodeId, NodeKind};

/// Errors raised while building or mutating the diagnostic graph.
///
/// Only [`GraphError::EdgeRuleViolation`] and [`GraphError::UnknownNode`] are
/// expected in practice; duplicate connections are not errors (see
/// [`Connected::AlreadyPresent`](super::Connected::AlreadyPresent)).
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// A `connect` call paired two kinds the protocol forbids.
    #[error("illegal edge: {parent} -> {child}")]
    #[diagnostic(
        code(faultgraph::graph::edge_rule),
        help(
            "allowed edges are Origin->Feature, Feature->Feature, Feature->Problem, \
             Problem->Feature, Problem->Solution and Solution->Success"
        )
    )]
    EdgeRuleViolation { parent: NodeKind, child: NodeKind },

    /// A referenced node id is not in the node table.
    #[error("unknown node: {id}")]
    #[diagnostic(
        code(faultgraph::graph::unknown_node),
        help("insert the node before connecting it")
    )]
    UnknownNode { id: NodeId },

    /// `insert` was called twice with the same id.
    #[error("node id already registered: {id}")]
    #[diagnostic(code(faultgraph::graph::duplicate_node))]
    DuplicateNode { id: NodeId },

    /// A solution was pointed at something other than the singleton success
    /// terminal.
    #[error("solution {solution} must resolve to the singleton success node")]
    #[diagnostic(
        code(faultgraph::graph::foreign_success),
        help("every solution's success edge targets the graph's single Success node")
    )]
    ForeignSuccess { solution: NodeId },
}
