use std::collections::HashMap;

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown(String),
}

/// Per-call solver budgets. `None` means unlimited; every call may re-specify
/// tighter or looser bounds, there is no session-wide setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryLimits {
    pub timeout_ms: Option<u32>,
    pub memory_mb: Option<u32>,
}

impl QueryLimits {
    pub const UNLIMITED: QueryLimits = QueryLimits {
        timeout_ms: None,
        memory_mb: None,
    };

    pub fn new(timeout_ms: Option<u32>, memory_mb: Option<u32>) -> Self {
        Self {
            timeout_ms,
            memory_mb,
        }
    }
}

/// A model (variable assignments) extracted from a SAT result.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub values: HashMap<String, ModelValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValue {
    Int(i64),
    Bool(bool),
}

impl Model {
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ModelValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ModelValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }
}

/// Abstract incremental SMT solver interface.
///
/// The formula only ever grows (`assert`); temporary constraints travel as
/// assumption terms on each check instead of push/pop scopes, so learned
/// state survives across queries and previously found solutions can be
/// blocked without mutating the assertion set.
pub trait SmtSolver {
    type Error: std::error::Error;

    /// Declare a new variable.
    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Self::Error>;

    /// Assert a constraint. Permanent for the lifetime of the instance.
    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    /// Check satisfiability of the asserted formula under `limits`.
    fn check(&mut self, limits: &QueryLimits) -> Result<SatResult, Self::Error>;

    /// Check satisfiability under additional boolean assumption terms.
    fn check_assuming(
        &mut self,
        assumptions: &[SmtTerm],
        limits: &QueryLimits,
    ) -> Result<SatResult, Self::Error>;

    /// Extract values for `vars` from the model of the most recent
    /// satisfiable check. `None` when no model is available.
    fn model(&mut self, vars: &[(&str, &SmtSort)]) -> Result<Option<Model>, Self::Error>;

    /// Drop all declarations, assertions, and learned state.
    fn reset(&mut self) -> Result<(), Self::Error>;
}
