//! Parametric query optimization: candidate plan sets reused across parameter bindings.
//!
//! A query template is compiled once per representative binding and the whole final candidate
//! list is stored, keyed by the template and the binding's selectivity bucket. A later binding
//! falling into the same bucket only needs the final objective to be re-applied over the stored
//! candidates, re-priced under its own estimates.
//!
//! Every entry carries the configuration version it was produced under. Changing any setting
//! that affects the search invalidates all entries at once; stale entries are never served.

mod bucket;
pub use bucket::*;
mod cache;
pub use cache::*;
mod manager;
pub use manager::*;
