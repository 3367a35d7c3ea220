//! Behaviour dimensions: solver-visible projections of plans.
//!
//! Every dimension contributes fresh variables and constraints on top of the
//! base encoding, reads its value off a witnessing model, and can phrase
//! "same behaviour as this model" as a term the search loop blocks with.

use std::fmt;
use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};
use loris_ir::{GroundedAction, SequentialPlan};
use loris_smt::{Model, SmtSort, SmtTerm};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::encoder::{EncodeError, Encoder};
use crate::resources::{parse_resource_file, ResourceError, ResourceSpec};

pub const COST_BOUND: &str = "cost-bound";
pub const MAKESPAN_OPTIMAL_COST_BOUND: &str = "makespan-optimal-cost-bound";
pub const RESOURCE_COUNT: &str = "resource-count";
pub const GOAL_PREDICATE_ORDERING: &str = "goal-predicate-ordering";

/// A raw or discretized dimension value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DimensionValue {
    Int(i64),
    Ints(Vec<i64>),
}

impl fmt::Display for DimensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionValue::Int(n) => write!(f, "{n}"),
            DimensionValue::Ints(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// What a dimension is asked to evaluate.
#[derive(Debug, Clone, Copy)]
pub enum DimensionInput<'a> {
    /// A witnessing model from the behaviour space's own solver.
    Model(&'a Model),
    /// A standalone plan that never went through the solver.
    Plan(&'a SequentialPlan),
}

#[derive(Debug, Error)]
pub enum DimensionError {
    #[error("dimension `{0}` cannot evaluate a standalone plan")]
    UnsupportedInput(&'static str),
    #[error("model has no value for `{0}`")]
    MissingModelValue(String),
    #[error("plan action `{0}` is not part of the task")]
    UnknownPlanAction(String),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// One axis of the behaviour space.
pub trait Dimension {
    fn name(&self) -> &'static str;

    /// Constraints added on top of the base encoding.
    fn encodings(&self) -> &[SmtTerm];

    /// Fresh solver variables backing this dimension.
    fn declarations(&self) -> &[(String, SmtSort)];

    /// Project the input onto this dimension's raw value, recording the
    /// discretized value in the observed domain.
    fn value(&mut self, input: DimensionInput<'_>) -> Result<DimensionValue, DimensionError>;

    /// Map a raw value onto the discrete behaviour domain.
    fn discretize(&self, value: &DimensionValue) -> DimensionValue;

    /// A term equivalent to "the plan shows the same behaviour as this
    /// model along this dimension".
    fn behaviour_expression(&self, model: &Model) -> Result<SmtTerm, DimensionError>;

    /// Number of distinct discretized values observed so far.
    fn domain_size(&self) -> usize;
}

/// Shared cost machinery: total-cost variable tied to a weighted sum of
/// occurrences over all steps, bounded to `(0, horizon]`, plus the
/// front-loading constraint that keeps occupied steps contiguous.
fn cost_encoding(
    encoder: &Encoder,
    cost_var: &str,
    cost_of: impl Fn(&GroundedAction) -> i64,
) -> Vec<SmtTerm> {
    let total = SmtTerm::var(cost_var);
    let mut per_occurrence = Vec::new();
    for step in 0..encoder.step_count() {
        for action in &encoder.task().actions {
            if let Some(occurrence) = encoder.occurrence(step, &action.name) {
                per_occurrence.push(occurrence.ite(SmtTerm::int(cost_of(action)), SmtTerm::int(0)));
            }
        }
    }
    let mut encodings = vec![
        total.clone().eq(SmtTerm::sum(per_occurrence)),
        total.clone().gt(SmtTerm::int(0)),
        total.le(SmtTerm::int(encoder.horizon() as i64)),
    ];
    // An occupied step implies the previous one is occupied too, so plans
    // never leave gaps of no-op steps in the middle.
    for step in 1..encoder.step_count() {
        encodings.push(
            SmtTerm::or(encoder.action_occurrences(step))
                .implies(SmtTerm::pb_eq(encoder.action_occurrences(step - 1), 1)),
        );
    }
    encodings
}

/// Total action cost of the plan.
pub struct CostBound {
    cost_var: String,
    declarations: Vec<(String, SmtSort)>,
    encodings: Vec<SmtTerm>,
    /// Cost lookup keyed by both grounded and original action names, so
    /// standalone plans in either vocabulary can be evaluated.
    action_costs: IndexMap<String, i64>,
    observed: IndexSet<DimensionValue>,
}

impl CostBound {
    pub fn new(encoder: &Encoder) -> Self {
        let cost_var = "total_cost".to_string();
        let mut action_costs = IndexMap::new();
        for action in &encoder.task().actions {
            action_costs.insert(action.name.clone(), action.cost);
            action_costs.insert(encoder.task().map_back(&action.name), action.cost);
        }
        Self {
            declarations: vec![(cost_var.clone(), SmtSort::Int)],
            encodings: cost_encoding(encoder, &cost_var, |action| action.cost),
            cost_var,
            action_costs,
            observed: IndexSet::new(),
        }
    }

    fn model_value(&self, model: &Model) -> Result<DimensionValue, DimensionError> {
        model
            .get_int(&self.cost_var)
            .map(DimensionValue::Int)
            .ok_or_else(|| DimensionError::MissingModelValue(self.cost_var.clone()))
    }
}

impl Dimension for CostBound {
    fn name(&self) -> &'static str {
        COST_BOUND
    }

    fn encodings(&self) -> &[SmtTerm] {
        &self.encodings
    }

    fn declarations(&self) -> &[(String, SmtSort)] {
        &self.declarations
    }

    fn value(&mut self, input: DimensionInput<'_>) -> Result<DimensionValue, DimensionError> {
        let value = match input {
            DimensionInput::Model(model) => self.model_value(model)?,
            DimensionInput::Plan(plan) => {
                let mut total = 0;
                for action in &plan.actions {
                    total += self
                        .action_costs
                        .get(action)
                        .copied()
                        .ok_or_else(|| DimensionError::UnknownPlanAction(action.clone()))?;
                }
                DimensionValue::Int(total)
            }
        };
        let discrete = self.discretize(&value);
        self.observed.insert(discrete);
        Ok(value)
    }

    fn discretize(&self, value: &DimensionValue) -> DimensionValue {
        value.clone()
    }

    fn behaviour_expression(&self, model: &Model) -> Result<SmtTerm, DimensionError> {
        match self.model_value(model)? {
            DimensionValue::Int(cost) => {
                Ok(SmtTerm::var(self.cost_var.clone()).eq(SmtTerm::int(cost)))
            }
            DimensionValue::Ints(_) => unreachable!("cost is scalar"),
        }
    }

    fn domain_size(&self) -> usize {
        self.observed.len()
    }
}

/// Plan length under unit costs, coupled to goal achievement: the goal holds
/// in state `t + 1` exactly when no action occurs after step `t`. The cost
/// read off a model is therefore the index of the first goal state.
pub struct MakespanOptimalCostBound {
    cost_var: String,
    declarations: Vec<(String, SmtSort)>,
    encodings: Vec<SmtTerm>,
    observed: IndexSet<DimensionValue>,
}

impl MakespanOptimalCostBound {
    pub fn new(encoder: &Encoder, disable_action_check: bool) -> Self {
        let cost_var = "makespan_cost".to_string();
        let mut encodings = cost_encoding(encoder, &cost_var, |_| 1);
        if !disable_action_check {
            for (step, goal) in encoder.goal_states().iter().enumerate() {
                let mut trailing = Vec::new();
                for later in (step + 1)..encoder.step_count() {
                    for occurrence in encoder.action_occurrences(later) {
                        trailing.push(occurrence.ite(SmtTerm::int(1), SmtTerm::int(0)));
                    }
                }
                encodings.push(
                    goal.clone()
                        .eq(SmtTerm::sum(trailing).eq(SmtTerm::int(0))),
                );
            }
        }
        Self {
            declarations: vec![(cost_var.clone(), SmtSort::Int)],
            encodings,
            cost_var,
            observed: IndexSet::new(),
        }
    }

    fn model_value(&self, model: &Model) -> Result<DimensionValue, DimensionError> {
        model
            .get_int(&self.cost_var)
            .map(DimensionValue::Int)
            .ok_or_else(|| DimensionError::MissingModelValue(self.cost_var.clone()))
    }
}

impl Dimension for MakespanOptimalCostBound {
    fn name(&self) -> &'static str {
        MAKESPAN_OPTIMAL_COST_BOUND
    }

    fn encodings(&self) -> &[SmtTerm] {
        &self.encodings
    }

    fn declarations(&self) -> &[(String, SmtSort)] {
        &self.declarations
    }

    fn value(&mut self, input: DimensionInput<'_>) -> Result<DimensionValue, DimensionError> {
        match input {
            DimensionInput::Model(model) => {
                let value = self.model_value(model)?;
                let discrete = self.discretize(&value);
                self.observed.insert(discrete);
                Ok(value)
            }
            DimensionInput::Plan(_) => Err(DimensionError::UnsupportedInput(self.name())),
        }
    }

    fn discretize(&self, value: &DimensionValue) -> DimensionValue {
        value.clone()
    }

    fn behaviour_expression(&self, model: &Model) -> Result<SmtTerm, DimensionError> {
        match self.model_value(model)? {
            DimensionValue::Int(cost) => {
                Ok(SmtTerm::var(self.cost_var.clone()).eq(SmtTerm::int(cost)))
            }
            DimensionValue::Ints(_) => unreachable!("cost is scalar"),
        }
    }

    fn domain_size(&self) -> usize {
        self.observed.len()
    }
}

/// Occurrence counts of actions that touch declared resources. A resource
/// matches every action whose grounded name contains the resource name.
pub struct ResourceCount {
    /// (resource name, counter variable) for resources with matching actions.
    counters: Vec<(String, String)>,
    declarations: Vec<(String, SmtSort)>,
    encodings: Vec<SmtTerm>,
    observed: IndexSet<DimensionValue>,
}

impl ResourceCount {
    pub fn new(encoder: &Encoder, specs: &IndexMap<String, ResourceSpec>) -> Self {
        let mut counters = Vec::new();
        let mut declarations = Vec::new();
        let mut encodings = Vec::new();
        for name in specs.keys() {
            let occurrences = encoder.matching_occurrences(name);
            if occurrences.is_empty() {
                debug!(resource = %name, "no action touches this resource");
                continue;
            }
            let var = format!("res_{name}");
            declarations.push((var.clone(), SmtSort::Int));
            let uses = occurrences
                .into_iter()
                .map(|occurrence| occurrence.ite(SmtTerm::int(1), SmtTerm::int(0)))
                .collect();
            encodings.push(SmtTerm::var(var.clone()).eq(SmtTerm::sum(uses)));
            counters.push((name.clone(), var));
        }
        Self {
            counters,
            declarations,
            encodings,
            observed: IndexSet::new(),
        }
    }

    fn model_value(&self, model: &Model) -> Result<DimensionValue, DimensionError> {
        let mut counts = Vec::new();
        for (_, var) in &self.counters {
            counts.push(
                model
                    .get_int(var)
                    .ok_or_else(|| DimensionError::MissingModelValue(var.clone()))?,
            );
        }
        Ok(DimensionValue::Ints(counts))
    }
}

impl Dimension for ResourceCount {
    fn name(&self) -> &'static str {
        RESOURCE_COUNT
    }

    fn encodings(&self) -> &[SmtTerm] {
        &self.encodings
    }

    fn declarations(&self) -> &[(String, SmtSort)] {
        &self.declarations
    }

    fn value(&mut self, input: DimensionInput<'_>) -> Result<DimensionValue, DimensionError> {
        match input {
            DimensionInput::Model(model) => {
                let value = self.model_value(model)?;
                let discrete = self.discretize(&value);
                self.observed.insert(discrete);
                Ok(value)
            }
            DimensionInput::Plan(_) => Err(DimensionError::UnsupportedInput(self.name())),
        }
    }

    fn discretize(&self, value: &DimensionValue) -> DimensionValue {
        value.clone()
    }

    fn behaviour_expression(&self, model: &Model) -> Result<SmtTerm, DimensionError> {
        let mut conjuncts = Vec::new();
        for (_, var) in &self.counters {
            let count = model
                .get_int(var)
                .ok_or_else(|| DimensionError::MissingModelValue(var.clone()))?;
            conjuncts.push(SmtTerm::var(var.clone()).eq(SmtTerm::int(count)));
        }
        Ok(SmtTerm::and(conjuncts))
    }

    fn domain_size(&self) -> usize {
        self.observed.len()
    }
}

/// Relative order in which the goal conjuncts first become true.
///
/// For every goal conjunct `i` a fresh integer `sgo_i` names the first state
/// where the conjunct holds; the discrete behaviour is the bit pattern of
/// `sgo_i <= sgo_j` over all pairs `i < j`, so two plans differ exactly when
/// they achieve some pair of goals in a different relative order.
pub struct GoalPredicateOrdering {
    first_vars: Vec<String>,
    declarations: Vec<(String, SmtSort)>,
    encodings: Vec<SmtTerm>,
    observed: IndexSet<DimensionValue>,
}

impl GoalPredicateOrdering {
    pub fn new(encoder: &Encoder) -> Result<Self, DimensionError> {
        let states = encoder.step_count();
        let mut first_vars = Vec::new();
        let mut declarations = Vec::new();
        let mut encodings = Vec::new();
        for (index, goal) in encoder.task().goals.iter().enumerate() {
            let var = format!("sgo_{index}");
            declarations.push((var.clone(), SmtSort::Int));
            let first = SmtTerm::var(var.clone());
            encodings.push(first.clone().ge(SmtTerm::int(0)));
            encodings.push(first.clone().le(SmtTerm::int(states as i64 - 1)));
            // (sgo = t) iff the conjunct holds at t and at no earlier state.
            let mut earlier: Vec<SmtTerm> = Vec::new();
            for state in 0..states {
                let here = encoder.condition_at(goal, state)?;
                let mut first_here = vec![here.clone()];
                first_here.extend(earlier.iter().map(|held| held.clone().not()));
                encodings.push(
                    first
                        .clone()
                        .eq(SmtTerm::int(state as i64))
                        .eq(SmtTerm::and(first_here)),
                );
                earlier.push(here);
            }
            first_vars.push(var);
        }
        Ok(Self {
            first_vars,
            declarations,
            encodings,
            observed: IndexSet::new(),
        })
    }

    fn model_value(&self, model: &Model) -> Result<DimensionValue, DimensionError> {
        let mut times = Vec::new();
        for var in &self.first_vars {
            times.push(
                model
                    .get_int(var)
                    .ok_or_else(|| DimensionError::MissingModelValue(var.clone()))?,
            );
        }
        Ok(DimensionValue::Ints(times))
    }
}

impl Dimension for GoalPredicateOrdering {
    fn name(&self) -> &'static str {
        GOAL_PREDICATE_ORDERING
    }

    fn encodings(&self) -> &[SmtTerm] {
        &self.encodings
    }

    fn declarations(&self) -> &[(String, SmtSort)] {
        &self.declarations
    }

    fn value(&mut self, input: DimensionInput<'_>) -> Result<DimensionValue, DimensionError> {
        match input {
            DimensionInput::Model(model) => {
                let value = self.model_value(model)?;
                let discrete = self.discretize(&value);
                self.observed.insert(discrete);
                Ok(value)
            }
            DimensionInput::Plan(_) => Err(DimensionError::UnsupportedInput(self.name())),
        }
    }

    fn discretize(&self, value: &DimensionValue) -> DimensionValue {
        match value {
            DimensionValue::Ints(times) => {
                let mut bits = Vec::new();
                for i in 0..times.len() {
                    for j in (i + 1)..times.len() {
                        bits.push(i64::from(times[i] <= times[j]));
                    }
                }
                DimensionValue::Ints(bits)
            }
            other => other.clone(),
        }
    }

    fn behaviour_expression(&self, model: &Model) -> Result<SmtTerm, DimensionError> {
        let times = match self.model_value(model)? {
            DimensionValue::Ints(times) => times,
            DimensionValue::Int(_) => unreachable!("ordering is a vector"),
        };
        let mut conjuncts = Vec::new();
        for i in 0..times.len() {
            for j in (i + 1)..times.len() {
                let ordered = SmtTerm::var(self.first_vars[i].clone())
                    .le(SmtTerm::var(self.first_vars[j].clone()));
                conjuncts.push(ordered.eq(SmtTerm::bool(times[i] <= times[j])));
            }
        }
        Ok(SmtTerm::and(conjuncts))
    }

    fn domain_size(&self) -> usize {
        self.observed.len()
    }
}

/// Declarative dimension selection, as it appears in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum DimensionConfig {
    CostBound,
    MakespanOptimalCostBound {
        #[serde(rename = "disable-action-check", default)]
        disable_action_check: bool,
    },
    ResourceCount {
        #[serde(rename = "resource-file", default)]
        resource_file: Option<PathBuf>,
    },
    GoalPredicateOrdering,
}

impl DimensionConfig {
    pub fn is_makespan(&self) -> bool {
        matches!(self, DimensionConfig::MakespanOptimalCostBound { .. })
    }
}

/// Instantiate the configured dimensions against an encoded task.
pub fn build_dimensions(
    configs: &[DimensionConfig],
    encoder: &Encoder,
) -> Result<IndexMap<String, Box<dyn Dimension>>, DimensionError> {
    let mut dims: IndexMap<String, Box<dyn Dimension>> = IndexMap::new();
    for config in configs {
        let dim: Box<dyn Dimension> = match config {
            DimensionConfig::CostBound => Box::new(CostBound::new(encoder)),
            DimensionConfig::MakespanOptimalCostBound {
                disable_action_check,
            } => Box::new(MakespanOptimalCostBound::new(encoder, *disable_action_check)),
            DimensionConfig::ResourceCount { resource_file } => {
                let specs = match resource_file {
                    Some(path) => parse_resource_file(path)?,
                    None => IndexMap::new(),
                };
                Box::new(ResourceCount::new(encoder, &specs))
            }
            DimensionConfig::GoalPredicateOrdering => {
                Box::new(GoalPredicateOrdering::new(encoder)?)
            }
        };
        dims.insert(dim.name().to_string(), dim);
    }
    Ok(dims)
}
