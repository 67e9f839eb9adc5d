//! Workspace root crate.
//!
//! This crate re-exports the controller, its interlocks and the simulated
//! collaborators so integration tests can depend on a single crate.

pub use controller::*;
pub use safety::*;
pub use sim::*;
