//! ## Background
//!
//! A cost based optimizer picks the join order with the lowest *estimated* cost. Estimates of
//! intermediate result sizes are routinely off by orders of magnitude, and the error compounds
//! with every join, so the plan that looks cheapest is often the one that degrades worst when the
//! estimates are wrong. Robust query optimization [3] keeps the classical bottom-up search of [1]
//! but scores candidates by how they behave across a distribution of estimation errors instead of
//! at a single point estimate.
//!
//! ## Design
//!
//! ### Error profiles
//!
//! Historical estimation errors of every relation set are turned into a kernel density estimate
//! and sampled a fixed number of times. Sample `s` of every relation set forms error scenario `s`.
//! All candidates competing for a subproblem are priced under the same scenarios, see
//! [`sampler`].
//!
//! ### Objective hooks
//!
//! Three independently configured [`objective`]s steer the search: the local objective bounds the
//! candidate list of each subproblem, the diversify strategy picks which candidates are
//! propagated, and the final objective picks the executed plan. Diversification keeps
//! structurally different plans alive, hedging against any single estimate being wrong.
//!
//! ### Join search
//!
//! The [`dp`] optimizer enumerates relation subsets in increasing size. Each subproblem's
//! generated paths go through the two pass [`envelope`] explorer: a cheap lower envelope on raw
//! cost first, then full robustness scoring of the survivors only.
//!
//! ### Parametric optimization
//!
//! [`pqo`] caches the final candidate sets of query templates per selectivity bucket, so a new
//! binding only re-applies the final objective instead of running the whole search.
//!
//! ## Reference
//!
//! 1. Selinger, P. Griffiths, et al. "Access path selection in a relational database management
//! system." Readings in Artificial Intelligence and Databases. Morgan Kaufmann, 1989. 511-522.
//! 2. Ioannidis, Y.E., et al. "Parametric query optimization." The VLDB Journal 6.2 (1997):
//! 132-151.
//! 3. Wolf, F., et al. "Robustness metrics for relational query execution plans." Proceedings of
//! the VLDB Endowment 11.11 (2018): 1360-1372.

#[macro_use]
extern crate prettytable;
#[macro_use]
extern crate lazy_static;

pub mod config;
pub mod cost;
pub mod dp;
pub mod envelope;
pub mod error;
pub mod explain;
pub mod objective;
pub mod operator;
pub mod optimizer;
pub mod plan;
pub mod pqo;
pub mod query;
pub mod relset;
pub mod report;
pub mod sampler;
pub mod stat;
