//! # Faultgraph: Graph-driven Interactive Troubleshooting
//!
//! Faultgraph walks a user through a pre-built diagnostic graph of
//! observable features, latent problems and candidate solutions, using an
//! LLM oracle both to classify free-text input and to route between nodes.
//!
//! ## Core Concepts
//!
//! - **Nodes**: six typed kinds — Origin, Feature, Problem, Solution,
//!   Success, Failure — whose edge rules encode the diagnostic protocol
//! - **Dialog log**: the append-only conversation every judgment grounds on
//! - **Oracle**: typed LLM judgments (classification, equivalence, yes/no,
//!   routing), pure from the engine's perspective
//! - **Training**: incremental ingestion of fault-to-fix chains that reuses
//!   equivalent nodes and grows the graph monotonically
//! - **Traversal**: one session = one state machine over a shared graph
//!
//! ## Two Lifetimes
//!
//! ```text
//! training:    chains -> TrainingBuilder -> Graph -> GraphCodec::save
//! production:  GraphCodec::load -> Graph -> TraversalEngine -> terminal
//! ```
//!
//! A trained graph is a single human-diffable JSON document. A production
//! session loads it once, seeds the dialog with the user's issue statement,
//! and steps until the session ends in Success or Failure — never in an
//! error.
//!
//! ## Quick Start
//!
//! ```rust
//! use faultgraph::graph::{ConnectOptions, Graph, Node};
//! use faultgraph::types::NodeId;
//!
//! let mut graph = Graph::empty();
//! let root = graph.root_id().clone();
//!
//! let boot = NodeId::new("F_boot");
//! graph.insert(Node::feature(boot.clone(), "robot won't boot")).unwrap();
//! graph.connect(&root, &boot, ConnectOptions::default()).unwrap();
//!
//! assert_eq!(graph.get(&boot).unwrap().parent(), Some(&root));
//! ```
//!
//! ## Module Guide
//!
//! - [`types`] - node ids, kinds and link modes
//! - [`message`] - dialog turns and rendering
//! - [`graph`] - the typed graph arena and its edge rules
//! - [`codec`] - document-oriented save/load
//! - [`oracle`] - the LLM capability and its OpenAI-compatible client
//! - [`interact`] - asking the actual user
//! - [`engine`] - the production traversal state machine
//! - [`training`] - the corpus format and the incremental builder
//! - [`telemetry`] - tracing bootstrap

pub mod codec;
pub mod engine;
pub mod graph;
pub mod interact;
pub mod message;
pub mod oracle;
pub mod telemetry;
pub mod training;
pub mod types;
