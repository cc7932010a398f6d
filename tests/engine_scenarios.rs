mod common;

use common::*;
use std::sync::Arc;

use faultgraph::engine::{Terminal, TraversalEngine};
use faultgraph::graph::Graph;
use faultgraph::interact::Interaction;
use faultgraph::oracle::{LLMOracle, YesNo};
use faultgraph::types::NodeId;

fn engine_over(
    graph: Graph,
    oracle: ScriptedOracle,
    interaction: Arc<ScriptedInteraction>,
    opening: &str,
) -> TraversalEngine {
    TraversalEngine::new(
        Arc::new(graph),
        Arc::new(oracle) as Arc<dyn LLMOracle>,
        interaction as Arc<dyn Interaction>,
        opening,
    )
}

#[tokio::test]
async fn happy_path_reaches_success() {
    let oracle = ScriptedOracle::new().yes_rule("robot won't boot", "", YesNo::Yes);
    let interaction = Arc::new(ScriptedInteraction::new(["yes, it boots now"]));
    let mut engine = engine_over(
        demo_graph(),
        oracle,
        Arc::clone(&interaction),
        "the robot won't boot",
    );

    assert_eq!(engine.step(None).await.node, Some(NodeId::new(F1)));
    assert_eq!(engine.step(None).await.node, Some(NodeId::new(P1)));
    assert_eq!(engine.step(None).await.node, Some(NodeId::new(S1)));
    assert_eq!(
        engine.step(None).await.node,
        Some(NodeId::new(NodeId::SUCCESS))
    );

    let last = engine.step(None).await;
    assert!(last.done);
    assert_eq!(last.terminal, Some(Terminal::Success));
    assert!(engine.current().is_none());

    // The solution was proposed to the user exactly once.
    assert_eq!(interaction.prompts().len(), 1);
    assert!(interaction.prompts()[0].contains("manually charge"));
}

#[tokio::test]
async fn unsolved_hard_problem_ends_in_failure() {
    // The symptom never goes away: the revisit check answers no first, the
    // feature judgment yes.
    let oracle = ScriptedOracle::new()
        .yes_rule("disappeared", "", YesNo::No)
        .yes_rule("robot won't boot", "", YesNo::Yes);
    let interaction = Arc::new(ScriptedInteraction::new(["no, charging did not help"]));
    let mut engine = engine_over(
        demo_graph(),
        oracle,
        Arc::clone(&interaction),
        "won't boot, RCS shows low battery",
    );

    assert_eq!(engine.step(None).await.node, Some(NodeId::new(F1)));
    assert_eq!(engine.step(None).await.node, Some(NodeId::new(P1)));
    assert_eq!(engine.step(None).await.node, Some(NodeId::new(S1)));
    // The failed fix hands control back to the hard problem.
    assert_eq!(engine.step(None).await.node, Some(NodeId::new(P1)));
    // The hard problem is out of options: the session ends even though a
    // sibling soft branch exists.
    assert_eq!(
        engine.step(None).await.node,
        Some(NodeId::new(NodeId::FAILURE))
    );

    let last = engine.step(None).await;
    assert!(last.done);
    assert_eq!(last.terminal, Some(Terminal::Failure));
}

#[tokio::test]
async fn soft_problem_falls_back_to_the_sibling_branch() {
    let oracle = ScriptedOracle::new()
        .yes_rule("disappeared", "", YesNo::No)
        .yes_rule("robot won't boot", "", YesNo::Yes);
    let interaction = Arc::new(ScriptedInteraction::new([
        "no, charging did not help",
        "yes, it is online again",
    ]));
    let mut engine = engine_over(
        demo_graph_all_soft(),
        oracle,
        Arc::clone(&interaction),
        "won't boot, RCS shows low battery",
    );

    let mut trajectory = Vec::new();
    loop {
        let outcome = engine.step(None).await;
        if outcome.done {
            assert_eq!(outcome.terminal, Some(Terminal::Success));
            break;
        }
        trajectory.push(outcome.node.expect("mid-session step has a node"));
    }

    let names: Vec<&str> = trajectory.iter().map(NodeId::as_str).collect();
    assert_eq!(
        names,
        vec![F1, P1, S1, P1, F1, P2, S2, NodeId::SUCCESS],
        "soft exhaustion must yield the branch instead of failing"
    );
}

#[tokio::test]
async fn negated_feature_returns_to_origin_then_fails() {
    let oracle = ScriptedOracle::new().yes_rule("robot won't boot", "", YesNo::No);
    let interaction = Arc::new(ScriptedInteraction::always("no"));
    let mut engine = engine_over(
        demo_graph(),
        oracle,
        Arc::clone(&interaction),
        "I'm asking about something else",
    );

    assert_eq!(engine.step(None).await.node, Some(NodeId::new(F1)));
    assert_eq!(
        engine.step(None).await.node,
        Some(NodeId::new(NodeId::ORIGIN))
    );
    assert_eq!(
        engine.step(None).await.node,
        Some(NodeId::new(NodeId::FAILURE))
    );
    assert_eq!(engine.step(None).await.terminal, Some(Terminal::Failure));
    // The user was never prompted: the judgment came from the dialog.
    assert!(interaction.prompts().is_empty());
}

#[tokio::test]
async fn unsure_feature_holds_until_more_dialog_arrives() {
    let oracle =
        ScriptedOracle::new().yes_rule("robot won't boot", "really will not boot", YesNo::Yes);
    let interaction = Arc::new(ScriptedInteraction::always("no"));
    let mut engine = engine_over(demo_graph(), oracle, interaction, "not sure");

    assert_eq!(engine.step(None).await.node, Some(NodeId::new(F1)));

    // Two consecutive steps with no new evidence: the engine stays put and
    // asks the outer layer to gather more input.
    let held = engine.step(None).await;
    assert_eq!(held.node, Some(NodeId::new(F1)));
    assert!(held.awaiting_input);
    let held_again = engine.step(None).await;
    assert_eq!(held_again.node, Some(NodeId::new(F1)));
    assert!(held_again.awaiting_input);

    // New dialog unblocks the judgment and the descent resumes.
    let moved = engine.step(Some("it really will not boot")).await;
    assert_eq!(moved.node, Some(NodeId::new(P1)));
}

#[tokio::test]
async fn revisited_problem_resolves_when_the_symptom_disappears() {
    // The fix attempt "fails" as far as the solution prompt goes, but the
    // user's reply shows the original symptom is gone: the revisited problem
    // marks itself resolved and hands control back to the parent feature.
    let oracle = ScriptedOracle::new()
        .yes_rule("disappeared", "boots fine now", YesNo::Yes)
        .yes_rule("disappeared", "", YesNo::No)
        .yes_rule("robot won't boot", "", YesNo::Yes);
    let interaction = Arc::new(ScriptedInteraction::new([
        "hm, it boots fine now actually",
    ]));
    let mut engine = engine_over(
        demo_graph(),
        oracle,
        Arc::clone(&interaction),
        "the robot won't boot",
    );

    assert_eq!(engine.step(None).await.node, Some(NodeId::new(F1)));
    assert_eq!(engine.step(None).await.node, Some(NodeId::new(P1)));
    assert_eq!(engine.step(None).await.node, Some(NodeId::new(S1)));
    // The reply is inconclusive for the solution itself, so the problem is
    // revisited first.
    assert_eq!(engine.step(None).await.node, Some(NodeId::new(P1)));
    // On revisit the dialog shows the symptom disappeared: back to the
    // feature instead of failing the hard problem.
    assert_eq!(engine.step(None).await.node, Some(NodeId::new(F1)));
    // The feature still holds by memo, so it descends into the next branch.
    assert_eq!(engine.step(None).await.node, Some(NodeId::new(P2)));
}

#[tokio::test]
async fn revisited_problem_keeps_working_while_the_symptom_persists() {
    // Same shape, but the symptom never goes away: the revisited hard
    // problem has no options left and the session fails.
    let oracle = ScriptedOracle::new()
        .yes_rule("disappeared", "", YesNo::No)
        .yes_rule("robot won't boot", "", YesNo::Yes);
    let interaction = Arc::new(ScriptedInteraction::new(["no, still dead"]));
    let mut engine = engine_over(
        demo_graph(),
        oracle,
        Arc::clone(&interaction),
        "the robot won't boot",
    );

    assert_eq!(engine.step(None).await.node, Some(NodeId::new(F1)));
    assert_eq!(engine.step(None).await.node, Some(NodeId::new(P1)));
    assert_eq!(engine.step(None).await.node, Some(NodeId::new(S1)));
    assert_eq!(engine.step(None).await.node, Some(NodeId::new(P1)));
    assert_eq!(
        engine.step(None).await.node,
        Some(NodeId::new(NodeId::FAILURE))
    );
}

#[tokio::test]
async fn stepping_a_finished_session_reports_no_current_node() {
    let oracle = ScriptedOracle::new().yes_rule("robot won't boot", "", YesNo::No);
    let interaction = Arc::new(ScriptedInteraction::always("no"));
    let mut engine = engine_over(demo_graph(), oracle, interaction, "something else");

    loop {
        if engine.step(None).await.done {
            break;
        }
    }
    let after = engine.step(None).await;
    assert!(after.done);
    assert_eq!(after.terminal, Some(Terminal::NoCurrentNode));
}

#[tokio::test]
async fn sessions_terminate_within_a_bounded_number_of_steps() {
    for graph in [demo_graph(), demo_graph_all_soft()] {
        // Everything is judged present and no fix ever works: the worst case
        // for loop length.
        let oracle = ScriptedOracle::new().yes_rule("", "", YesNo::Yes);
        let interaction = Arc::new(ScriptedInteraction::always("no"));
        let bound = graph.len() * 4;
        let mut engine = engine_over(graph, oracle, interaction, "robot won't boot");

        let mut steps = 0;
        loop {
            steps += 1;
            assert!(steps <= bound, "session exceeded {bound} steps");
            let outcome = engine.step(None).await;
            if outcome.done {
                assert_eq!(outcome.terminal, Some(Terminal::Failure));
                break;
            }
        }
    }
}

#[tokio::test]
async fn dead_oracle_converges_on_failure_instead_of_wedging() {
    let interaction = Arc::new(ScriptedInteraction::always("no"));
    let mut engine = TraversalEngine::new(
        Arc::new(demo_graph()),
        Arc::new(UnavailableOracle) as Arc<dyn LLMOracle>,
        interaction as Arc<dyn Interaction>,
        "the robot won't boot",
    );

    let mut steps = 0;
    loop {
        steps += 1;
        assert!(steps <= 16, "dead-oracle session should end quickly");
        let outcome = engine.step(None).await;
        if outcome.done {
            assert_eq!(outcome.terminal, Some(Terminal::Failure));
            break;
        }
    }
}
