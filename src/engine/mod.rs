//! Production traversal: the per-session state machine.
//!
//! # Structure
//!
//! - [`session`]: the per-session side table and dialog log
//! - [`behavior`]: what each node kind does when a session enters it
//! - [`traversal`]: the [`TraversalEngine`] driving `step` after `step`
//!
//! One engine is one session. Sessions share the graph read-only and
//! terminate in a bounded number of steps: visited flags only ever get set,
//! so every loop through a branch consumes an unvisited node somewhere.

pub mod behavior;
pub mod session;
pub mod traversal;

pub use behavior::NextStep;
pub use session::{ExpectedState, NodeObservations, SessionState};
pub use traversal::{StepOutcome, Terminal, TraversalEngine};
