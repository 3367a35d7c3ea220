#![doc = include_str!("../README.md")]

//! SMT terms and solver integration for planning-as-satisfiability.
//!
//! The planning encoder and behaviour space speak only in [`terms::SmtTerm`]
//! and the [`solver::SmtSolver`] trait; backends translate to a concrete
//! engine. Assumption-based checking replaces push/pop so previously found
//! solutions can be blocked without mutating the formula.

pub mod backends;
pub mod solver;
pub mod sorts;
pub mod terms;

pub use solver::{Model, ModelValue, QueryLimits, SatResult, SmtSolver};
pub use sorts::SmtSort;
pub use terms::SmtTerm;
