//! Exact solvers module.

mod branch_bound;

pub use branch_bound::*;
