//! The traversal engine: one diagnostic session over a shared graph.

use std::sync::Arc;
use tracing::{info, warn};

use super::behavior::{self, BehaviorContext, NextStep};
use super::session::SessionState;
use crate::graph::Graph;
use crate::interact::Interaction;
use crate::message::Message;
use crate::oracle::LLMOracle;
use crate::types::{NodeId, NodeKind};

/// How a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminal {
    /// The user confirmed a solution worked.
    Success,
    /// Every viable branch was exhausted or a hard problem went unsolved.
    Failure,
    /// `step` was called on a session that already ended.
    NoCurrentNode,
}

/// Result of one `step` call.
#[derive(Clone, Debug)]
pub struct StepOutcome {
    /// The session reached a terminal (or had none to begin with).
    pub done: bool,
    /// Set exactly when `done` is true.
    pub terminal: Option<Terminal>,
    /// The node the session sits on after this step.
    pub node: Option<NodeId>,
    /// The current node needs more dialog before it can decide; feed the
    /// user's next utterance into the following `step` call.
    pub awaiting_input: bool,
}

impl StepOutcome {
    fn done(terminal: Terminal) -> Self {
        Self {
            done: true,
            terminal: Some(terminal),
            node: None,
            awaiting_input: false,
        }
    }

    fn at(node: NodeId, awaiting_input: bool) -> Self {
        Self {
            done: false,
            terminal: None,
            node: Some(node),
            awaiting_input,
        }
    }
}

/// State machine driving one diagnostic session.
///
/// The engine owns the session's cursor and dialog log, and borrows the
/// graph read-only behind an `Arc` — run as many concurrent sessions as you
/// like over one loaded graph, each with its own engine. All suspension
/// happens inside oracle calls and user interaction; the engine itself is a
/// plain sequential loop.
///
/// A session starts at the origin with the dialog seeded by the user's
/// issue statement, and always ends in [`Terminal::Success`] or
/// [`Terminal::Failure`]: behaviors that cannot name a destination converge
/// on the failure terminal rather than erroring out.
pub struct TraversalEngine {
    graph: Arc<Graph>,
    oracle: Arc<dyn LLMOracle>,
    interaction: Arc<dyn Interaction>,
    session: SessionState,
    current: Option<NodeId>,
}

impl TraversalEngine {
    /// Starts a fresh session on `graph`, seeded with the user's opening
    /// issue statement.
    #[must_use]
    pub fn new(
        graph: Arc<Graph>,
        oracle: Arc<dyn LLMOracle>,
        interaction: Arc<dyn Interaction>,
        opening_statement: &str,
    ) -> Self {
        let current = Some(graph.root_id().clone());
        Self {
            graph,
            oracle,
            interaction,
            session: SessionState::new(opening_statement),
            current,
        }
    }

    /// The node the session currently sits on.
    #[must_use]
    pub fn current(&self) -> Option<&NodeId> {
        self.current.as_ref()
    }

    /// The session's dialog log, oldest turn first.
    #[must_use]
    pub fn dialog(&self) -> &[Message] {
        self.session.dialog()
    }

    /// Appends a user utterance without stepping; `step(Some(..))` is the
    /// usual shortcut.
    pub fn add_user_input(&mut self, input: &str) {
        self.session.push_user(input);
    }

    /// Advances the session by one node decision.
    ///
    /// `new_input`, when given, is appended to the dialog as a user turn
    /// before the current node decides. The outcome either reports a
    /// terminal, the node now current, or — via `awaiting_input` — that the
    /// current node held its position pending more dialog.
    pub async fn step(&mut self, new_input: Option<&str>) -> StepOutcome {
        if let Some(input) = new_input {
            self.session.push_user(input);
        }

        let Some(current) = self.current.clone() else {
            return StepOutcome::done(Terminal::NoCurrentNode);
        };

        let graph = Arc::clone(&self.graph);
        let Some(node) = graph.get(&current) else {
            // A cursor that resolves to nothing has no destination either;
            // converge on failure instead of wedging.
            warn!(node = %current, "current node vanished from the graph");
            let failure = graph.failure_id().clone();
            self.current = Some(failure.clone());
            return StepOutcome::at(failure, false);
        };

        match node.kind() {
            NodeKind::Success => {
                info!(node = %node.id, "{}", node.description);
                self.current = None;
                return StepOutcome::done(Terminal::Success);
            }
            NodeKind::Failure => {
                info!(node = %node.id, "{}", node.description);
                self.current = None;
                return StepOutcome::done(Terminal::Failure);
            }
            _ => {}
        }

        let mut cx = BehaviorContext {
            graph: graph.as_ref(),
            session: &mut self.session,
            oracle: self.oracle.as_ref(),
            interaction: self.interaction.as_ref(),
        };
        match behavior::process(node, &mut cx).await {
            NextStep::Stay => StepOutcome::at(current, true),
            NextStep::Fail => {
                let failure = graph.failure_id().clone();
                self.current = Some(failure.clone());
                StepOutcome::at(failure, false)
            }
            NextStep::Goto(target) => {
                let next = if graph.contains(&target) {
                    target
                } else {
                    warn!(node = %target, "behavior returned an unknown destination");
                    graph.failure_id().clone()
                };
                self.current = Some(next.clone());
                StepOutcome::at(next, false)
            }
        }
    }
}
