//! Plans annotated with their position in the behaviour space.

use std::fmt;

use loris_ir::SequentialPlan;
use loris_smt::SmtTerm;

use crate::dims::DimensionValue;

/// The structural behaviour of a plan: one discretized value per dimension,
/// in dimension registration order. Two plans behave the same exactly when
/// their signatures compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BehaviourSignature(pub Vec<(String, DimensionValue)>);

impl fmt::Display for BehaviourSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (dimension, value)) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{dimension}={value}")?;
        }
        Ok(())
    }
}

/// A plan extracted from the behaviour space, together with everything the
/// search loop needs to block it or its behaviour in later queries.
#[derive(Debug, Clone)]
pub struct AnnotatedPlan {
    /// 1-based extraction order within one behaviour space.
    pub id: usize,
    /// Action sequence in the caller's original vocabulary.
    pub plan: SequentialPlan,
    /// Action sequence in the grounded vocabulary.
    pub grounded_actions: Vec<String>,
    pub signature: BehaviourSignature,
    /// "Same behaviour as this plan", conjoined over all dimensions.
    pub behaviour_expr: SmtTerm,
    /// Occurrence variables that realize this plan, for exact-plan blocking.
    pub true_vars: Vec<String>,
    /// Canonical identity of the grounded action sequence.
    pub fingerprint: String,
    pub valid: bool,
    /// Validator verdict, when validation ran.
    pub reason: Option<String>,
}

impl AnnotatedPlan {
    /// Term forbidding this exact assignment of occurrence variables.
    pub fn blocking_term(&self) -> SmtTerm {
        SmtTerm::and(
            self.true_vars
                .iter()
                .map(|var| SmtTerm::var(var.clone()))
                .collect(),
        )
        .not()
    }
}
