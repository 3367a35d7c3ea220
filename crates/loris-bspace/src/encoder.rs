//! Step-indexed encoding of a grounded task into SMT.
//!
//! The transition formula between states 0 and 1 is built exactly once as a
//! template; every later step is obtained by renaming the step-0 and step-1
//! variables, never by re-deriving the formula. The final encoding over a
//! horizon `U` has action layers `0..=U` and fluent layers `0..=U`, with the
//! last action layer pinned to zero occurrences so shorter plans embed as
//! no-op-padded assignments.

use std::collections::HashMap;

use indexmap::IndexMap;
use loris_ir::{Effect, EffectKind, Expr, FluentKind, GroundedTask, SequentialPlan, Value};
use loris_smt::{Model, SmtSort, SmtTerm};
use thiserror::Error;
use tracing::debug;

/// Variable naming conventions:
/// - `a_{t}_{action}`: occurrence of `action` at step t
/// - `f_{t}_{fluent}`: value of `fluent` in state t
pub(crate) fn action_var(step: usize, action: &str) -> String {
    format!("a_{step}_{action}")
}

pub(crate) fn fluent_var(step: usize, fluent: &str) -> String {
    format!("f_{step}_{fluent}")
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("horizon must be at least 1, got {0}")]
    InvalidHorizon(usize),
    #[error("task is already encoded")]
    AlreadyEncoded,
    #[error("unknown fluent `{0}`")]
    UnknownFluent(String),
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("plan of length {length} does not fit the horizon {horizon}")]
    PlanTooLong { length: usize, horizon: usize },
}

/// The named parts of one step's formula.
#[derive(Debug, Clone)]
pub struct FormulaParts {
    /// State 0 equals the initial values. Only meaningful at step 0.
    pub initial: SmtTerm,
    /// The goal holds in the post-state of this step.
    pub goal: SmtTerm,
    /// Preconditions and effects of every action at this step.
    pub actions: SmtTerm,
    /// Explanatory frame axioms for the transition of this step.
    pub frame: SmtTerm,
    /// At most one action occurs at this step.
    pub sem: SmtTerm,
}

/// A plan read back out of a satisfying model.
#[derive(Debug, Clone)]
pub struct ExtractedPlan {
    /// Action sequence in the caller's original vocabulary.
    pub plan: SequentialPlan,
    /// Action sequence in the grounded vocabulary, in step order.
    pub grounded_actions: Vec<String>,
    /// Occurrence variables that are true in the model.
    pub true_vars: Vec<String>,
    /// Canonical identity of the grounded action sequence.
    pub fingerprint: String,
}

/// Step-indexed encoder for one grounded task.
pub struct Encoder {
    task: GroundedTask,
    /// Per step: grounded action name -> occurrence variable.
    action_vars: Vec<IndexMap<String, String>>,
    /// Per state: fluent name -> value variable.
    fluent_vars: Vec<IndexMap<String, String>>,
    /// Fluent -> actions that can make it true.
    frame_add: IndexMap<String, Vec<String>>,
    /// Fluent -> actions that can make it false.
    frame_del: IndexMap<String, Vec<String>>,
    /// Numeric fluent -> actions that can change it.
    frame_num: IndexMap<String, Vec<String>>,
    template: Option<FormulaParts>,
    declarations: Vec<(String, SmtSort)>,
    assertions: Vec<SmtTerm>,
    goal_states: Vec<SmtTerm>,
    horizon: usize,
}

impl Encoder {
    pub fn new(task: GroundedTask) -> Self {
        let mut encoder = Self {
            task,
            action_vars: Vec::new(),
            fluent_vars: Vec::new(),
            frame_add: IndexMap::new(),
            frame_del: IndexMap::new(),
            frame_num: IndexMap::new(),
            template: None,
            declarations: Vec::new(),
            assertions: Vec::new(),
            goal_states: Vec::new(),
            horizon: 0,
        };
        encoder.build_modifier_index();
        encoder
    }

    pub fn task(&self) -> &GroundedTask {
        &self.task
    }

    /// Upper bound on plan length chosen at [`Encoder::encode`] time.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Number of action layers, `horizon + 1` after encoding.
    pub fn step_count(&self) -> usize {
        self.action_vars.len()
    }

    pub fn declarations(&self) -> &[(String, SmtSort)] {
        &self.declarations
    }

    pub fn assertions(&self) -> &[SmtTerm] {
        &self.assertions
    }

    /// One goal term per step `t`, asserting the goal in state `t + 1`.
    pub fn goal_states(&self) -> &[SmtTerm] {
        &self.goal_states
    }

    /// Occurrence terms of every action at `step`, in declaration order.
    pub fn action_occurrences(&self, step: usize) -> Vec<SmtTerm> {
        match self.action_vars.get(step) {
            Some(layer) => layer.values().map(|v| SmtTerm::var(v.clone())).collect(),
            None => Vec::new(),
        }
    }

    /// Occurrence term of one action at `step`, if both exist.
    pub fn occurrence(&self, step: usize, action: &str) -> Option<SmtTerm> {
        self.action_vars
            .get(step)
            .and_then(|layer| layer.get(action))
            .map(|v| SmtTerm::var(v.clone()))
    }

    /// Occurrence terms across all steps of every action whose grounded name
    /// contains `pattern`.
    pub fn matching_occurrences(&self, pattern: &str) -> Vec<SmtTerm> {
        let mut out = Vec::new();
        for layer in &self.action_vars {
            for (action, var) in layer {
                if action.contains(pattern) {
                    out.push(SmtTerm::var(var.clone()));
                }
            }
        }
        out
    }

    /// Encode `condition` against the state variables of `state`.
    pub fn condition_at(&self, condition: &Expr, state: usize) -> Result<SmtTerm, EncodeError> {
        self.expr_term(condition, state)
    }

    /// Build the full formula for plan lengths up to `horizon`. Single shot.
    pub fn encode(&mut self, horizon: usize) -> Result<(), EncodeError> {
        if horizon == 0 {
            return Err(EncodeError::InvalidHorizon(horizon));
        }
        if self.horizon != 0 {
            return Err(EncodeError::AlreadyEncoded);
        }
        self.horizon = horizon;

        for step in 0..horizon {
            let parts = self.encode_step(step)?;
            if step == 0 {
                self.assertions.push(parts.initial);
            }
            self.assertions.push(parts.actions);
            self.assertions.push(parts.frame);
            self.assertions.push(parts.sem);
            self.goal_states.push(parts.goal);
        }

        // Trailing padding: the last layer executes nothing, and the goal
        // must hold in at least one reachable state.
        self.assertions
            .push(SmtTerm::pb_eq(self.action_occurrences(horizon), 0));
        self.assertions
            .push(SmtTerm::pb_ge(self.goal_states.clone(), 1));

        debug!(
            task = %self.task.name,
            horizon,
            variables = self.declarations.len(),
            assertions = self.assertions.len(),
            "encoded task"
        );
        Ok(())
    }

    /// Formula parts for `step`. Step 0 derives the template; later steps are
    /// pure renamings of it.
    fn encode_step(&mut self, step: usize) -> Result<FormulaParts, EncodeError> {
        let template = self.base_template()?;
        if step == 0 {
            return Ok(template);
        }
        self.ensure_layers(step + 1);
        let renames = self.step_renames(step);
        Ok(FormulaParts {
            initial: template.initial.substitute(&renames),
            goal: template.goal.substitute(&renames),
            actions: template.actions.substitute(&renames),
            frame: template.frame.substitute(&renames),
            sem: template.sem.substitute(&renames),
        })
    }

    /// The step-0 formula, memoized.
    fn base_template(&mut self) -> Result<FormulaParts, EncodeError> {
        if let Some(template) = &self.template {
            return Ok(template.clone());
        }
        self.ensure_layers(1);
        let template = FormulaParts {
            initial: self.encode_initial()?,
            goal: self.encode_goal_at(0)?,
            actions: self.encode_actions_at(0)?,
            frame: self.encode_frame_at(0)?,
            sem: SmtTerm::pb_le(self.action_occurrences(0), 1),
        };
        self.template = Some(template.clone());
        Ok(template)
    }

    fn step_renames(&self, step: usize) -> HashMap<String, String> {
        let mut renames = HashMap::new();
        for action in &self.task.actions {
            renames.insert(action_var(0, &action.name), action_var(step, &action.name));
        }
        for fluent in &self.task.fluents {
            renames.insert(fluent_var(0, &fluent.name), fluent_var(step, &fluent.name));
            renames.insert(
                fluent_var(1, &fluent.name),
                fluent_var(step + 1, &fluent.name),
            );
        }
        renames
    }

    fn ensure_layers(&mut self, upto: usize) {
        while self.action_vars.len() <= upto {
            self.create_layer();
        }
    }

    fn create_layer(&mut self) {
        let step = self.action_vars.len();
        let mut actions = IndexMap::new();
        for action in &self.task.actions {
            let var = action_var(step, &action.name);
            self.declarations.push((var.clone(), SmtSort::Bool));
            actions.insert(action.name.clone(), var);
        }
        self.action_vars.push(actions);

        let mut fluents = IndexMap::new();
        for fluent in &self.task.fluents {
            let var = fluent_var(step, &fluent.name);
            let sort = match fluent.kind {
                FluentKind::Bool => SmtSort::Bool,
                FluentKind::Int => SmtSort::Int,
            };
            self.declarations.push((var.clone(), sort));
            fluents.insert(fluent.name.clone(), var);
        }
        self.fluent_vars.push(fluents);
    }

    fn build_modifier_index(&mut self) {
        // Split borrows: the index maps are filled from an owned snapshot of
        // the effect structure to keep the loop simple.
        let effects: Vec<(String, String, bool, bool)> = self
            .task
            .actions
            .iter()
            .flat_map(|action| {
                action.effects.iter().map(|effect| {
                    (
                        action.name.clone(),
                        effect.fluent.clone(),
                        effect.is_add(),
                        effect.is_delete(),
                    )
                })
            })
            .collect();
        for (action, fluent, is_add, is_delete) in effects {
            match self.task.fluent_kind(&fluent) {
                Some(FluentKind::Bool) => {
                    if is_add {
                        push_modifier(&mut self.frame_add, &fluent, &action);
                    } else if is_delete {
                        push_modifier(&mut self.frame_del, &fluent, &action);
                    } else {
                        // Non-constant boolean assignment can go either way.
                        push_modifier(&mut self.frame_add, &fluent, &action);
                        push_modifier(&mut self.frame_del, &fluent, &action);
                    }
                }
                Some(FluentKind::Int) | None => {
                    push_modifier(&mut self.frame_num, &fluent, &action);
                }
            }
        }
    }

    fn encode_initial(&self) -> Result<SmtTerm, EncodeError> {
        let mut assigns = Vec::new();
        for (fluent, value) in &self.task.initial_values {
            let var = self.fluent_term(fluent, 0)?;
            let value = match value {
                Value::Bool(b) => SmtTerm::bool(*b),
                Value::Int(n) => SmtTerm::int(*n),
            };
            assigns.push(var.eq(value));
        }
        Ok(SmtTerm::and(assigns))
    }

    /// The goal in the post-state of `step`.
    fn encode_goal_at(&self, step: usize) -> Result<SmtTerm, EncodeError> {
        let conjuncts = self
            .task
            .goals
            .iter()
            .map(|goal| self.expr_term(goal, step + 1))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SmtTerm::and(conjuncts))
    }

    fn encode_actions_at(&self, step: usize) -> Result<SmtTerm, EncodeError> {
        let mut clauses = Vec::new();
        for action in &self.task.actions {
            let occurrence = self.occurrence_term(step, &action.name)?;
            let preconditions = action
                .preconditions
                .iter()
                .map(|pre| self.expr_term(pre, step))
                .collect::<Result<Vec<_>, _>>()?;
            clauses.push(occurrence.clone().implies(SmtTerm::and(preconditions)));
            let effects = action
                .effects
                .iter()
                .map(|effect| self.effect_term(effect, step))
                .collect::<Result<Vec<_>, _>>()?;
            clauses.push(occurrence.implies(SmtTerm::and(effects)));
        }
        Ok(SmtTerm::and(clauses))
    }

    fn encode_frame_at(&self, step: usize) -> Result<SmtTerm, EncodeError> {
        let mut axioms = Vec::new();
        for fluent in &self.task.fluents {
            let pre = self.fluent_term(&fluent.name, step)?;
            let post = self.fluent_term(&fluent.name, step + 1)?;
            match fluent.kind {
                FluentKind::Bool => {
                    let adds = self.modifier_occurrences(step, self.frame_add.get(&fluent.name))?;
                    let dels = self.modifier_occurrences(step, self.frame_del.get(&fluent.name))?;
                    axioms.push(
                        SmtTerm::and(vec![pre.clone().not(), post.clone()])
                            .implies(SmtTerm::or(adds)),
                    );
                    axioms.push(SmtTerm::and(vec![pre, post.not()]).implies(SmtTerm::or(dels)));
                }
                FluentKind::Int => {
                    let mods = self.modifier_occurrences(step, self.frame_num.get(&fluent.name))?;
                    axioms.push(pre.eq(post).not().implies(SmtTerm::or(mods)));
                }
            }
        }
        Ok(SmtTerm::and(axioms))
    }

    fn modifier_occurrences(
        &self,
        step: usize,
        actions: Option<&Vec<String>>,
    ) -> Result<Vec<SmtTerm>, EncodeError> {
        match actions {
            None => Ok(Vec::new()),
            Some(actions) => actions
                .iter()
                .map(|action| self.occurrence_term(step, action))
                .collect(),
        }
    }

    fn effect_term(&self, effect: &Effect, step: usize) -> Result<SmtTerm, EncodeError> {
        let post = self.fluent_term(&effect.fluent, step + 1)?;
        let value = self.expr_term(&effect.value, step)?;
        let update = match effect.kind {
            EffectKind::Assign => post.eq(value),
            EffectKind::Increase => post.eq(self.fluent_term(&effect.fluent, step)?.add(value)),
            EffectKind::Decrease => post.eq(self.fluent_term(&effect.fluent, step)?.sub(value)),
        };
        Ok(match &effect.condition {
            Some(condition) => self.expr_term(condition, step)?.implies(update),
            None => update,
        })
    }

    fn expr_term(&self, expr: &Expr, state: usize) -> Result<SmtTerm, EncodeError> {
        Ok(match expr {
            Expr::Const(Value::Bool(b)) => SmtTerm::bool(*b),
            Expr::Const(Value::Int(n)) => SmtTerm::int(*n),
            Expr::Fluent(name) => self.fluent_term(name, state)?,
            Expr::Not(inner) => self.expr_term(inner, state)?.not(),
            Expr::And(items) => SmtTerm::and(
                items
                    .iter()
                    .map(|item| self.expr_term(item, state))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Expr::Or(items) => SmtTerm::or(
                items
                    .iter()
                    .map(|item| self.expr_term(item, state))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Expr::Add(lhs, rhs) => self
                .expr_term(lhs, state)?
                .add(self.expr_term(rhs, state)?),
            Expr::Sub(lhs, rhs) => self
                .expr_term(lhs, state)?
                .sub(self.expr_term(rhs, state)?),
            Expr::Mul(lhs, rhs) => self
                .expr_term(lhs, state)?
                .mul(self.expr_term(rhs, state)?),
            Expr::Lt(lhs, rhs) => self.expr_term(lhs, state)?.lt(self.expr_term(rhs, state)?),
            Expr::Le(lhs, rhs) => self.expr_term(lhs, state)?.le(self.expr_term(rhs, state)?),
            Expr::Gt(lhs, rhs) => self.expr_term(lhs, state)?.gt(self.expr_term(rhs, state)?),
            Expr::Ge(lhs, rhs) => self.expr_term(lhs, state)?.ge(self.expr_term(rhs, state)?),
            Expr::Eq(lhs, rhs) => self.expr_term(lhs, state)?.eq(self.expr_term(rhs, state)?),
        })
    }

    fn fluent_term(&self, fluent: &str, state: usize) -> Result<SmtTerm, EncodeError> {
        self.fluent_vars
            .get(state)
            .and_then(|layer| layer.get(fluent))
            .map(|var| SmtTerm::var(var.clone()))
            .ok_or_else(|| EncodeError::UnknownFluent(fluent.to_string()))
    }

    fn occurrence_term(&self, step: usize, action: &str) -> Result<SmtTerm, EncodeError> {
        self.action_vars
            .get(step)
            .and_then(|layer| layer.get(action))
            .map(|var| SmtTerm::var(var.clone()))
            .ok_or_else(|| EncodeError::UnknownAction(action.to_string()))
    }

    /// Read the plan of `length` actions back out of a model.
    pub fn extract_plan(&self, model: &Model, length: usize) -> ExtractedPlan {
        let mut grounded_actions = Vec::new();
        let mut true_vars = Vec::new();
        for layer in self.action_vars.iter().take(length) {
            for (action, var) in layer {
                if model.get_bool(var) == Some(true) {
                    grounded_actions.push(action.clone());
                    true_vars.push(var.clone());
                    break;
                }
            }
        }
        let actions = grounded_actions
            .iter()
            .map(|name| self.task.map_back(name))
            .collect();
        let fingerprint = grounded_actions.join(";");
        ExtractedPlan {
            plan: SequentialPlan { actions },
            grounded_actions,
            true_vars,
            fingerprint,
        }
    }

    /// Turn an externally produced plan into assumption terms: its actions at
    /// steps `0..len` and no occurrences at any later step.
    pub fn convert(&self, plan: &SequentialPlan) -> Result<Vec<SmtTerm>, EncodeError> {
        if plan.actions.len() > self.horizon {
            return Err(EncodeError::PlanTooLong {
                length: plan.actions.len(),
                horizon: self.horizon,
            });
        }
        let mut assumptions = Vec::new();
        for (step, action) in plan.actions.iter().enumerate() {
            let grounded = if self.task.find_action(action).is_some() {
                action.clone()
            } else {
                self.task.map_forward(action)
            };
            assumptions.push(self.occurrence_term(step, &grounded)?);
        }
        for step in plan.actions.len()..self.action_vars.len() {
            for occurrence in self.action_occurrences(step) {
                assumptions.push(occurrence.not());
            }
        }
        Ok(assumptions)
    }
}

fn push_modifier(index: &mut IndexMap<String, Vec<String>>, fluent: &str, action: &str) {
    let actions = index.entry(fluent.to_string()).or_default();
    if !actions.iter().any(|a| a == action) {
        actions.push(action.to_string());
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use loris_ir::GroundedAction;
    use proptest::prelude::*;

    /// Small random boolean tasks: every action adds one fluent, may delete
    /// another and may require a third.
    fn arb_task() -> impl Strategy<Value = GroundedTask> {
        let fluent_count = 2..5usize;
        fluent_count.prop_flat_map(|n| {
            let action = (0..n, proptest::option::of(0..n), proptest::option::of(0..n));
            proptest::collection::vec(action, 1..4).prop_map(move |actions| {
                let mut task = GroundedTask::new("random");
                for i in 0..n {
                    task = task.fluent(format!("p{i}"), Value::Bool(i == 0));
                }
                for (index, (add, del, pre)) in actions.into_iter().enumerate() {
                    let mut action = GroundedAction::new(format!("act{index}"))
                        .effect(Effect::assign(format!("p{add}"), Expr::bool(true)));
                    if let Some(del) = del {
                        action = action.effect(Effect::assign(format!("p{del}"), Expr::bool(false)));
                    }
                    if let Some(pre) = pre {
                        action = action.pre(Expr::fluent(format!("p{pre}")));
                    }
                    task = task.action(action);
                }
                task.goal(Expr::fluent(format!("p{}", n - 1)))
            })
        })
    }

    proptest! {
        /// Substituted step formulas always match direct derivation.
        #[test]
        fn substitution_matches_direct_encoding(task in arb_task(), horizon in 1..5usize) {
            let mut encoder = Encoder::new(task);
            encoder.encode(horizon).unwrap();
            for step in 0..horizon {
                let base = 1 + 3 * step;
                prop_assert_eq!(
                    &encoder.assertions()[base],
                    &encoder.encode_actions_at(step).unwrap()
                );
                prop_assert_eq!(
                    &encoder.assertions()[base + 1],
                    &encoder.encode_frame_at(step).unwrap()
                );
                prop_assert_eq!(
                    &encoder.goal_states()[step],
                    &encoder.encode_goal_at(step).unwrap()
                );
            }
        }

        /// Every declared variable belongs to exactly one layer and the layer
        /// count is always horizon + 1.
        #[test]
        fn layer_bookkeeping_is_consistent(task in arb_task(), horizon in 1..5usize) {
            let fluents = task.fluents.len();
            let actions = task.actions.len();
            let mut encoder = Encoder::new(task);
            encoder.encode(horizon).unwrap();
            prop_assert_eq!(encoder.step_count(), horizon + 1);
            prop_assert_eq!(
                encoder.declarations().len(),
                (horizon + 1) * (fluents + actions)
            );
        }
    }
}
