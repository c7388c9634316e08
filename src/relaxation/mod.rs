//! LP relaxation of reconciliation subproblems

pub mod simplex;
pub mod solver;

pub use simplex::{LinearProgram, LpError, LpSolution, LpStatus, SimplexOptions};
pub use solver::*;
