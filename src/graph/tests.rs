use super::*;
use crate::types::{LinkMode, NodeId, NodeKind};

fn feature(graph: &mut Graph, id: &str, desc: &str) -> NodeId {
    let id = NodeId::new(id);
    graph
        .insert(Node::feature(id.clone(), desc))
        .expect("insert feature");
    id
}

fn problem(graph: &mut Graph, id: &str, desc: &str) -> NodeId {
    let id = NodeId::new(id);
    graph
        .insert(Node::problem(id.clone(), desc))
        .expect("insert problem");
    id
}

fn solution(graph: &mut Graph, id: &str, desc: &str) -> NodeId {
    let id = NodeId::new(id);
    let success = graph.success_id().clone();
    graph
        .insert(Node::solution(id.clone(), desc, success))
        .expect("insert solution");
    id
}

#[test]
fn empty_graph_has_three_singletons() {
    let graph = Graph::empty();
    assert_eq!(graph.len(), 3);
    assert_eq!(graph.root_id().as_str(), NodeId::ORIGIN);
    assert_eq!(graph.success_id().as_str(), NodeId::SUCCESS);
    assert_eq!(graph.failure_id().as_str(), NodeId::FAILURE);
    assert_eq!(
        graph.get(graph.root_id()).map(Node::kind),
        Some(NodeKind::Origin)
    );
}

#[test]
fn connect_sets_back_pointers() {
    let mut graph = Graph::empty();
    let root = graph.root_id().clone();
    let f1 = feature(&mut graph, "F_1", "robot won't boot");

    let outcome = graph
        .connect(&root, &f1, ConnectOptions::default())
        .expect("legal edge");
    assert_eq!(outcome, Connected::Added);
    assert_eq!(graph.get(&root).unwrap().child_features(), &[f1.clone()]);
    assert_eq!(graph.get(&f1).unwrap().parent(), Some(&root));
}

#[test]
fn duplicate_connect_is_idempotent() {
    let mut graph = Graph::empty();
    let root = graph.root_id().clone();
    let f1 = feature(&mut graph, "F_1", "robot won't boot");

    graph.connect(&root, &f1, ConnectOptions::default()).unwrap();
    let second = graph.connect(&root, &f1, ConnectOptions::default()).unwrap();
    assert_eq!(second, Connected::AlreadyPresent);
    assert_eq!(graph.get(&root).unwrap().child_features().len(), 1);
}

#[test]
fn first_problem_is_hard_later_ones_soft() {
    let mut graph = Graph::empty();
    let root = graph.root_id().clone();
    let f1 = feature(&mut graph, "F_1", "robot won't boot");
    let p1 = problem(&mut graph, "P_1", "battery depleted");
    let p2 = problem(&mut graph, "P_2", "access point offline");

    graph.connect(&root, &f1, ConnectOptions::default()).unwrap();
    // The builder always asks for soft; the policy still makes the first hard.
    graph.connect(&f1, &p1, ConnectOptions::soft()).unwrap();
    graph.connect(&f1, &p2, ConnectOptions::soft()).unwrap();

    let links = graph.get(&f1).unwrap().child_problems().to_vec();
    assert_eq!(links[0].mode, LinkMode::Hard);
    assert_eq!(links[1].mode, LinkMode::Soft);
    assert_eq!(graph.get(&p1).unwrap().problem_mode(), Some(LinkMode::Hard));
    assert_eq!(graph.get(&p2).unwrap().problem_mode(), Some(LinkMode::Soft));
}

#[test]
fn illegal_edges_are_rejected() {
    let mut graph = Graph::empty();
    let root = graph.root_id().clone();
    let failure = graph.failure_id().clone();
    let f1 = feature(&mut graph, "F_1", "robot won't boot");
    let p1 = problem(&mut graph, "P_1", "battery depleted");
    let p2 = problem(&mut graph, "P_2", "access point offline");
    let s1 = solution(&mut graph, "S_1", "charge manually");

    graph.connect(&root, &f1, ConnectOptions::default()).unwrap();
    graph.connect(&f1, &p1, ConnectOptions::default()).unwrap();
    graph.connect(&p1, &s1, ConnectOptions::default()).unwrap();

    // Origin may only parent features.
    assert!(matches!(
        graph.connect(&root, &p1, ConnectOptions::default()),
        Err(GraphError::EdgeRuleViolation { .. })
    ));
    // Problems never point at problems.
    assert!(matches!(
        graph.connect(&p1, &p2, ConnectOptions::default()),
        Err(GraphError::EdgeRuleViolation { .. })
    ));
    // Features never reach solutions directly.
    assert!(matches!(
        graph.connect(&f1, &s1, ConnectOptions::default()),
        Err(GraphError::EdgeRuleViolation { .. })
    ));
    // The failure terminal is reached at run time, never stored as an edge.
    assert!(matches!(
        graph.connect(&p1, &failure, ConnectOptions::default()),
        Err(GraphError::EdgeRuleViolation { .. })
    ));
    // Terminals have no outgoing edges.
    let success = graph.success_id().clone();
    assert!(matches!(
        graph.connect(&success, &f1, ConnectOptions::default()),
        Err(GraphError::EdgeRuleViolation { .. })
    ));
}

#[test]
fn connect_unknown_node_fails() {
    let mut graph = Graph::empty();
    let root = graph.root_id().clone();
    let ghost = NodeId::new("F_missing");
    assert!(matches!(
        graph.connect(&root, &ghost, ConnectOptions::default()),
        Err(GraphError::UnknownNode { .. })
    ));
}

#[test]
fn insert_rejects_duplicate_ids() {
    let mut graph = Graph::empty();
    feature(&mut graph, "F_1", "first");
    let again = graph.insert(Node::feature(NodeId::new("F_1"), "second"));
    assert!(matches!(again, Err(GraphError::DuplicateNode { .. })));
}

#[test]
fn solutions_always_resolve_to_the_singleton_success() {
    let mut graph = Graph::empty();
    let root = graph.root_id().clone();
    let f1 = feature(&mut graph, "F_1", "robot won't boot");
    let p1 = problem(&mut graph, "P_1", "battery depleted");
    graph.connect(&root, &f1, ConnectOptions::default()).unwrap();
    graph.connect(&f1, &p1, ConnectOptions::default()).unwrap();

    // A solution created against a stale success id gets re-pointed on link.
    let stale = NodeId::new("OK_stale");
    let sid = NodeId::new("S_1");
    graph
        .insert(Node::solution(sid.clone(), "charge manually", stale))
        .unwrap();
    graph.connect(&p1, &sid, ConnectOptions::default()).unwrap();
    assert_eq!(
        graph.get(&sid).unwrap().success_target(),
        Some(graph.success_id())
    );

    // Solution -> Success is legal only toward the singleton.
    let success = graph.success_id().clone();
    assert!(graph.connect(&sid, &success, ConnectOptions::default()).is_ok());

    // Pointing a solution's success edge anywhere else is rejected.
    let f2 = feature(&mut graph, "F_2", "other");
    assert!(matches!(
        graph.connect(&sid, &f2, ConnectOptions::default()),
        Err(GraphError::EdgeRuleViolation { .. })
    ));
}

#[test]
fn all_of_kind_is_sorted_by_id() {
    let mut graph = Graph::empty();
    feature(&mut graph, "F_b", "two");
    feature(&mut graph, "F_a", "one");
    feature(&mut graph, "F_c", "three");

    let ids: Vec<&str> = graph
        .all_of_kind(NodeKind::Feature)
        .iter()
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(ids, vec!["F_a", "F_b", "F_c"]);
}
