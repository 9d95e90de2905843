//! Heuristics module.
//!
//! Only the van-only nearest-neighbour baseline lives here; it is reported next
//! to the exact search result for comparison.

pub mod construction;

pub use construction::*;
