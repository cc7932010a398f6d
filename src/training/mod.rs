//! The training phase: growing the graph from fault-diagnosis chains.
//!
//! - [`corpus`]: segment splitting for the plain-text corpus format
//! - [`builder`]: the incremental [`TrainingBuilder`] and its run report
//!
//! Training is the graph's only writer. It runs with the deny-all
//! interaction bound, so no behavior can block on a user and every branch
//! of every segment gets enumerated into the graph.

pub mod builder;
pub mod corpus;

pub use builder::{TrainError, TrainingBuilder, TrainingReport};
pub use corpus::split_segments;
