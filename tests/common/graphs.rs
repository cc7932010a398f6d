#![allow(dead_code)]

//! Shared graph fixtures.

use faultgraph::codec::GraphDocument;
use faultgraph::graph::{ConnectOptions, Graph, Node};
use faultgraph::types::{LinkMode, NodeId};

pub const F1: &str = "F_boot";
pub const P1: &str = "P_battery";
pub const P2: &str = "P_ap";
pub const S1: &str = "S_charge";
pub const S2: &str = "S_antenna";

/// The demo troubleshooting graph:
///
/// ```text
/// Origin -> F1 "robot won't boot"
///   F1 -> P1 "low battery" (hard) -> S1 "manually charge"
///   F1 -> P2 "AP offline"  (soft) -> S2 "reseat antennas"
/// ```
pub fn demo_graph() -> Graph {
    let mut graph = Graph::empty();
    let root = graph.root_id().clone();
    let success = graph.success_id().clone();

    let f1 = NodeId::new(F1);
    let p1 = NodeId::new(P1);
    let p2 = NodeId::new(P2);
    let s1 = NodeId::new(S1);
    let s2 = NodeId::new(S2);

    graph
        .insert(Node::feature(f1.clone(), "robot won't boot"))
        .unwrap();
    graph
        .insert(Node::problem(p1.clone(), "low battery"))
        .unwrap();
    graph
        .insert(Node::problem(p2.clone(), "AP offline"))
        .unwrap();
    graph
        .insert(Node::solution(s1.clone(), "manually charge", success.clone()))
        .unwrap();
    graph
        .insert(Node::solution(s2.clone(), "reseat antennas", success))
        .unwrap();

    graph.connect(&root, &f1, ConnectOptions::default()).unwrap();
    // First problem under F1 becomes hard by policy, the second soft.
    graph.connect(&f1, &p1, ConnectOptions::default()).unwrap();
    graph.connect(&f1, &p2, ConnectOptions::default()).unwrap();
    graph.connect(&p1, &s1, ConnectOptions::default()).unwrap();
    graph.connect(&p2, &s2, ConnectOptions::default()).unwrap();
    graph
}

/// The demo graph with every problem link softened, built through the
/// document form (the live `connect` policy always hardens a feature's
/// first problem; stored documents keep whatever modes they carry).
pub fn demo_graph_all_soft() -> Graph {
    let mut document = GraphDocument::from_graph(&demo_graph());
    for record in document.nodes.values_mut() {
        for (_, mode) in &mut record.child_problems {
            *mode = LinkMode::Soft;
        }
        if record.mode == Some(LinkMode::Hard) {
            record.mode = Some(LinkMode::Soft);
        }
    }
    document.into_graph().expect("softened demo graph is valid")
}
