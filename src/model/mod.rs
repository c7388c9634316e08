//! Problem model: decision variables, derived constraints and bound overlays

pub mod bounds;
pub mod problem;

pub use bounds::*;
pub use problem::*;
