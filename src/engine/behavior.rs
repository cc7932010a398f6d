//! Per-kind traversal behaviors.
//!
//! Each behavior answers one question: the session just entered this node —
//! where does it go next? The answer is a [`NextStep`]: a concrete node, a
//! request to stay put until the user says more, or the failure sentinel.
//!
//! Oracle failures never escape a behavior. The transport already retried
//! once; past that, each behavior falls back to a deterministic rule —
//! first-unvisited for routing, "no" for judgments — so a dead oracle can
//! prune a branch but can never wedge a session.

use tracing::{debug, warn};

use super::session::{ExpectedState, SessionState};
use crate::graph::{Graph, Node};
use crate::interact::Interaction;
use crate::oracle::{LLMOracle, YesNo, normalize_yes_no};
use crate::types::{LinkMode, NodeId, NodeKind};

/// Where a behavior sends the session next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NextStep {
    /// Advance to this node.
    Goto(NodeId),
    /// Stay on the current node; more dialog is needed before a verdict.
    Stay,
    /// Converge on the singleton failure terminal.
    Fail,
}

/// Everything a behavior may touch while deciding.
pub(crate) struct BehaviorContext<'a> {
    pub graph: &'a Graph,
    pub session: &'a mut SessionState,
    pub oracle: &'a dyn LLMOracle,
    pub interaction: &'a dyn Interaction,
}

/// Dispatches to the node kind's behavior. Terminal kinds are handled by
/// the engine before this is called.
pub(crate) async fn process(node: &Node, cx: &mut BehaviorContext<'_>) -> NextStep {
    match node.kind() {
        NodeKind::Origin => process_origin(node, cx).await,
        NodeKind::Feature => process_feature(node, cx).await,
        NodeKind::Problem => process_problem(node, cx).await,
        NodeKind::Solution => process_solution(node, cx).await,
        NodeKind::Success | NodeKind::Failure => NextStep::Stay,
    }
}

/// Origin: route into the first plausible unvisited top-level feature.
async fn process_origin(node: &Node, cx: &mut BehaviorContext<'_>) -> NextStep {
    cx.session.mark_entered(&node.id);

    let unvisited = unvisited_ids(cx.session, node.child_features());
    match pick_among(node, &unvisited, cx).await {
        Some(target) => NextStep::Goto(target),
        None => {
            debug!(origin = %node.id, "all top-level features exhausted");
            NextStep::Fail
        }
    }
}

/// Feature: judge the predicate against the dialog, then descend on yes,
/// return on no, hold on unsure.
async fn process_feature(node: &Node, cx: &mut BehaviorContext<'_>) -> NextStep {
    cx.session.mark_entered(&node.id);

    let mut state = cx.session.observed(&node.id).expected_state;
    if state == ExpectedState::Unknown {
        state = match cx.oracle.yes_no(&node.description, cx.session.dialog()).await {
            Ok(YesNo::Yes) => ExpectedState::Holds,
            Ok(YesNo::No) => ExpectedState::Absent,
            Ok(YesNo::Unsure) => return NextStep::Stay,
            Err(error) => {
                warn!(%error, feature = %node.id, "oracle unavailable, treating feature as absent");
                ExpectedState::Absent
            }
        };
        cx.session.entry(&node.id).expected_state = state;
    }

    match state {
        ExpectedState::Holds => {
            cx.session.entry(&node.id).confirmed_positive = true;
            descend(node, cx).await
        }
        ExpectedState::Absent => goto_parent(node),
        ExpectedState::Unknown => NextStep::Stay,
    }
}

/// The yes branch of a feature: sibling features first, then problems in
/// insertion order, then the exhaustion rule.
async fn descend(node: &Node, cx: &mut BehaviorContext<'_>) -> NextStep {
    let unvisited = unvisited_ids(cx.session, node.child_features());
    if let Some(target) = pick_among(node, &unvisited, cx).await {
        return NextStep::Goto(target);
    }

    for link in node.child_problems() {
        if !cx.session.visited(&link.problem) {
            cx.session.entry(&link.problem).active_mode = Some(link.mode);
            return NextStep::Goto(link.problem.clone());
        }
    }

    // Exhausted. A top-level feature that holds but leads nowhere ends the
    // session; a nested one ends it only while the observation still holds.
    let Some(parent_id) = node.parent() else {
        return NextStep::Fail;
    };
    if cx.graph.get(parent_id).map(Node::kind) == Some(NodeKind::Origin) {
        return NextStep::Fail;
    }
    if cx.session.observed(&node.id).expected_state == ExpectedState::Holds {
        return NextStep::Fail;
    }
    cx.session.entry(&node.id).expected_state = ExpectedState::Absent;
    goto_parent(node)
}

/// Problem: hand out unvisited solutions, then unvisited sub-features; when
/// nothing is left, `hard` ends the session and `soft` yields the branch.
async fn process_problem(node: &Node, cx: &mut BehaviorContext<'_>) -> NextStep {
    if cx.session.visited(&node.id) {
        // Coming back after a fix attempt: has the triggering feature gone?
        // Only an explicit yes counts; unsure and oracle failure both mean
        // "still present" and the problem keeps working its options.
        if let Some(feature) = node.parent().and_then(|id| cx.graph.get(id)) {
            let question = format!(
                "Has the condition \"{}\" disappeared?",
                feature.description
            );
            let verdict = cx
                .oracle
                .yes_no(&question, cx.session.dialog())
                .await
                .unwrap_or(YesNo::Unsure);
            if verdict == YesNo::Yes {
                cx.session.entry(&node.id).resolved = true;
                debug!(problem = %node.id, "triggering feature disappeared, problem resolved");
                return NextStep::Goto(feature.id.clone());
            }
        }
    }
    cx.session.mark_entered(&node.id);

    for solution in node.solutions() {
        if !cx.session.visited(solution) {
            return NextStep::Goto(solution.clone());
        }
    }
    for feature in node.child_features() {
        if !cx.session.visited(feature) {
            return NextStep::Goto(feature.clone());
        }
    }

    let mode = cx
        .session
        .observed(&node.id)
        .active_mode
        .or(node.problem_mode())
        .unwrap_or_default();
    match (mode, node.parent()) {
        (LinkMode::Soft, Some(parent)) => NextStep::Goto(parent.clone()),
        (LinkMode::Soft, None) => NextStep::Fail,
        (LinkMode::Hard, _) => {
            debug!(problem = %node.id, "hard problem exhausted");
            NextStep::Fail
        }
    }
}

/// Solution: propose the action, read the user's verdict, and either close
/// the session or hand the problem its next option.
async fn process_solution(node: &Node, cx: &mut BehaviorContext<'_>) -> NextStep {
    cx.session.mark_entered(&node.id);

    let prompt = format!(
        "Try this: {}. After trying it, is the condition resolved?",
        node.description
    );
    let mut verdict = match cx.interaction.ask(&prompt).await {
        Ok(reply) => {
            cx.session.push_assistant(&prompt);
            cx.session.push_user(&reply);
            normalize_yes_no(&reply)
        }
        Err(error) => {
            warn!(%error, solution = %node.id, "interaction failed, treating as not resolved");
            YesNo::No
        }
    };
    if verdict == YesNo::Unsure {
        let question = format!("Did applying \"{}\" resolve the condition?", node.description);
        verdict = cx
            .oracle
            .yes_no(&question, cx.session.dialog())
            .await
            .unwrap_or(YesNo::Unsure);
    }

    if verdict == YesNo::Yes {
        let success = node
            .success_target()
            .cloned()
            .unwrap_or_else(|| cx.graph.success_id().clone());
        return NextStep::Goto(success);
    }
    // Unsure counts as no for solutions: the problem moves to its next option.
    goto_parent(node)
}

fn goto_parent(node: &Node) -> NextStep {
    match node.parent() {
        Some(parent) => NextStep::Goto(parent.clone()),
        None => NextStep::Fail,
    }
}

fn unvisited_ids(session: &SessionState, ids: &[NodeId]) -> Vec<NodeId> {
    ids.iter()
        .filter(|id| !session.visited(id))
        .cloned()
        .collect()
}

/// Routes among unvisited sibling features: trivial cases short-circuit,
/// otherwise the oracle picks and anything inconclusive falls back to the
/// first candidate.
async fn pick_among(
    node: &Node,
    unvisited: &[NodeId],
    cx: &mut BehaviorContext<'_>,
) -> Option<NodeId> {
    match unvisited {
        [] => None,
        [only] => Some(only.clone()),
        several => {
            let candidates: Vec<String> = several
                .iter()
                .filter_map(|id| cx.graph.get(id))
                .map(Node::candidate_label)
                .collect();
            let choice = cx
                .oracle
                .pick_child(&node.description, &candidates, cx.session.dialog())
                .await;
            let index = match choice {
                Ok(Some(i)) if i < several.len() => i,
                Ok(_) => 0,
                Err(error) => {
                    warn!(%error, at = %node.id, "oracle unavailable, falling back to first unvisited");
                    0
                }
            };
            Some(several[index].clone())
        }
    }
}
