//! Bottom-up join enumeration over relation subsets.
//!
//! Subproblems are filled in increasing relation count. Every subproblem combines the candidate
//! lists of two smaller, disjoint subproblems under each join strategy the cost model offers, and
//! hands the generated paths to the [`crate::envelope::EnvelopeExplorer`], which decides what is
//! kept. Subproblems of the same size only read smaller ones, so they can be filled by parallel
//! workers.

mod optimizer;
pub use optimizer::*;
mod subproblem;
pub use subproblem::*;
