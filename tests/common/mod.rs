pub mod graphs;
pub mod interactions;
pub mod oracles;

pub use graphs::*;
pub use interactions::*;
pub use oracles::*;
