#![doc = include_str!("../README.md")]

//! Grounded planning task model.
//!
//! Everything in this crate is the *output* of an external grounding
//! service: fully instantiated actions and fluents with no parameters left.
//! The encoder and behaviour space consume these types read-only.

pub mod plan;
pub mod task;

pub use plan::{PlanParseError, SequentialPlan};
pub use task::{
    Effect, EffectKind, Expr, FluentKind, GroundedAction, GroundedFluent, GroundedTask, Value,
};
