//! The behaviour space: an encoded task, its dimensions and one incremental
//! solver, queried under assumptions.

use indexmap::IndexMap;
use loris_ir::{GroundedTask, SequentialPlan};
use loris_smt::backends::smtlib_printer::script_to_smtlib;
use loris_smt::{QueryLimits, SatResult, SmtSolver, SmtSort, SmtTerm};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::dims::{
    build_dimensions, Dimension, DimensionConfig, DimensionError, DimensionInput, DimensionValue,
    MAKESPAN_OPTIMAL_COST_BOUND,
};
use crate::encoder::{EncodeError, Encoder};
use crate::plan::{AnnotatedPlan, BehaviourSignature};

fn default_upper_bound() -> usize {
    100
}

fn default_quality_bound_factor() -> f64 {
    1.0
}

/// Behaviour space configuration, the `bspace-cfg` section of configuration
/// files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceConfig {
    /// Horizon of the encoding; longer plans cannot be represented.
    #[serde(rename = "upper-bound", default = "default_upper_bound")]
    pub upper_bound: usize,
    #[serde(rename = "run-plan-validation", default)]
    pub run_plan_validation: bool,
    /// Seed plan length multiplier the diverse search derives its horizon
    /// from.
    #[serde(
        rename = "quality-bound-factor",
        default = "default_quality_bound_factor"
    )]
    pub quality_bound_factor: f64,
    #[serde(default)]
    pub dims: Vec<DimensionConfig>,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            upper_bound: default_upper_bound(),
            run_plan_validation: false,
            quality_bound_factor: default_quality_bound_factor(),
            dims: Vec::new(),
        }
    }
}

/// Independent judgement of a plan against the task semantics, typically an
/// external validator binary.
pub trait PlanValidator {
    fn validate(&self, task: &GroundedTask, plan: &SequentialPlan) -> Validation;
}

#[derive(Debug, Clone)]
pub struct Validation {
    pub valid: bool,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum SpaceError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Dimension(#[from] DimensionError),
    #[error("solver rejected the formula: {0}")]
    Solver(String),
}

/// An encoded task plus its behaviour dimensions, loaded into one solver.
///
/// The solver factory exists because [`BehaviourSpace::reset`] rebuilds the
/// solver from scratch; the formula itself never shrinks, temporary
/// constraints only ever travel as assumptions.
pub struct BehaviourSpace<S, F> {
    encoder: Encoder,
    dims: IndexMap<String, Box<dyn Dimension>>,
    declarations: Vec<(String, SmtSort)>,
    assertions: Vec<SmtTerm>,
    solver: S,
    make_solver: F,
    run_plan_validation: bool,
    validator: Option<Box<dyn PlanValidator>>,
    plans: Vec<AnnotatedPlan>,
    behaviour_frequency: IndexMap<BehaviourSignature, usize>,
    log: Vec<String>,
}

impl<S, F> BehaviourSpace<S, F>
where
    S: SmtSolver,
    F: FnMut() -> S,
{
    pub fn new(
        task: GroundedTask,
        config: &SpaceConfig,
        mut make_solver: F,
    ) -> Result<Self, SpaceError> {
        let mut encoder = Encoder::new(task);
        encoder.encode(config.upper_bound)?;

        // The makespan dimension is always present: plan extraction reads
        // the realized plan length off it.
        let mut dim_configs = config.dims.clone();
        if !dim_configs.iter().any(DimensionConfig::is_makespan) {
            dim_configs.push(DimensionConfig::MakespanOptimalCostBound {
                disable_action_check: false,
            });
        }
        let dims = build_dimensions(&dim_configs, &encoder)?;

        let mut declarations = encoder.declarations().to_vec();
        let mut assertions = encoder.assertions().to_vec();
        for dim in dims.values() {
            declarations.extend(dim.declarations().iter().cloned());
            assertions.extend(dim.encodings().iter().cloned());
        }

        let mut solver = make_solver();
        Self::load(&mut solver, &declarations, &assertions)?;
        info!(
            task = %encoder.task().name,
            horizon = encoder.horizon(),
            dimensions = dims.len(),
            variables = declarations.len(),
            "behaviour space ready"
        );

        Ok(Self {
            encoder,
            dims,
            declarations,
            assertions,
            solver,
            make_solver,
            run_plan_validation: config.run_plan_validation,
            validator: None,
            plans: Vec::new(),
            behaviour_frequency: IndexMap::new(),
            log: Vec::new(),
        })
    }

    pub fn with_validator(mut self, validator: Box<dyn PlanValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    fn load(
        solver: &mut S,
        declarations: &[(String, SmtSort)],
        assertions: &[SmtTerm],
    ) -> Result<(), SpaceError> {
        for (name, sort) in declarations {
            solver
                .declare_var(name, sort)
                .map_err(|error| SpaceError::Solver(error.to_string()))?;
        }
        for assertion in assertions {
            solver
                .assert(assertion)
                .map_err(|error| SpaceError::Solver(error.to_string()))?;
        }
        Ok(())
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn task(&self) -> &GroundedTask {
        self.encoder.task()
    }

    pub fn horizon(&self) -> usize {
        self.encoder.horizon()
    }

    pub fn plans(&self) -> &[AnnotatedPlan] {
        &self.plans
    }

    /// Number of distinct behaviours seen so far.
    pub fn behaviour_count(&self) -> usize {
        self.behaviour_frequency.len()
    }

    /// How many extracted plans showed each behaviour.
    pub fn behaviour_frequency(&self) -> &IndexMap<BehaviourSignature, usize> {
        &self.behaviour_frequency
    }

    /// Observed domain size per dimension, in registration order.
    pub fn dimension_sizes(&self) -> Vec<(String, usize)> {
        self.dims
            .iter()
            .map(|(name, dim)| (name.clone(), dim.domain_size()))
            .collect()
    }

    pub fn logs(&self) -> &[String] {
        &self.log
    }

    /// The full formula as an SMT-LIB2 script, for dumps and debugging.
    pub fn to_smtlib(&self) -> String {
        script_to_smtlib(&self.declarations, &self.assertions)
    }

    fn log(&mut self, message: String) {
        self.log.push(message);
    }

    /// Check the formula under `assumptions`. Solver failures and resource
    /// exhaustion are logged and reported as unsatisfiable; the search loop
    /// treats both the same way.
    pub fn is_satisfiable(&mut self, assumptions: &[SmtTerm], limits: &QueryLimits) -> bool {
        match self.solver.check_assuming(assumptions, limits) {
            Ok(SatResult::Sat) => true,
            Ok(SatResult::Unsat) => false,
            Ok(SatResult::Unknown(reason)) => {
                warn!(%reason, "satisfiability check gave up");
                self.log(format!("satisfiability check gave up: {reason}"));
                false
            }
            Err(error) => {
                warn!(%error, "solver error during satisfiability check");
                self.log(format!("error while checking satisfiability: {error}"));
                false
            }
        }
    }

    /// Read the plan of the current model and annotate it with its behaviour
    /// signature. The plan and its behaviour are recorded internally even
    /// when validation rejects it; only valid plans are returned.
    pub fn extract_plan(&mut self) -> Option<AnnotatedPlan> {
        let vars: Vec<(&str, &SmtSort)> = self
            .declarations
            .iter()
            .map(|(name, sort)| (name.as_str(), sort))
            .collect();
        let model = match self.solver.model(&vars) {
            Ok(Some(model)) => model,
            Ok(None) => {
                self.log("no model is available for extraction".to_string());
                return None;
            }
            Err(error) => {
                self.log(format!("error while extracting a model: {error}"));
                return None;
            }
        };

        // The makespan dimension tells us how many steps carry actions.
        let length = match self
            .dims
            .get_mut(MAKESPAN_OPTIMAL_COST_BOUND)
            .map(|dim| dim.value(DimensionInput::Model(&model)))
        {
            Some(Ok(DimensionValue::Int(length))) if length >= 1 => length as usize,
            Some(Ok(other)) => {
                self.log(format!("unusable makespan value {other}"));
                return None;
            }
            Some(Err(error)) => {
                self.log(format!("makespan evaluation failed: {error}"));
                return None;
            }
            None => {
                self.log("the makespan dimension is missing".to_string());
                return None;
            }
        };

        let mut signature_parts = Vec::new();
        let mut behaviour_terms = Vec::new();
        let mut failure = None;
        for (name, dim) in self.dims.iter_mut() {
            let projected = dim.value(DimensionInput::Model(&model)).and_then(|raw| {
                let discrete = dim.discretize(&raw);
                dim.behaviour_expression(&model)
                    .map(|term| (discrete, term))
            });
            match projected {
                Ok((discrete, term)) => {
                    signature_parts.push((name.clone(), discrete));
                    behaviour_terms.push(term);
                }
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }
        if let Some(error) = failure {
            self.log(format!("dimension evaluation failed: {error}"));
            return None;
        }

        let extracted = self.encoder.extract_plan(&model, length);
        let signature = BehaviourSignature(signature_parts);
        let id = self.plans.len() + 1;

        let (valid, reason) = if self.run_plan_validation {
            match &self.validator {
                Some(validator) => {
                    let verdict = validator.validate(self.encoder.task(), &extracted.plan);
                    (verdict.valid, Some(verdict.reason))
                }
                None => (
                    true,
                    Some("validation requested but no validator attached".to_string()),
                ),
            }
        } else {
            (true, None)
        };

        *self
            .behaviour_frequency
            .entry(signature.clone())
            .or_insert(0) += 1;
        let plan = AnnotatedPlan {
            id,
            plan: extracted.plan,
            grounded_actions: extracted.grounded_actions,
            signature,
            behaviour_expr: SmtTerm::and(behaviour_terms),
            true_vars: extracted.true_vars,
            fingerprint: extracted.fingerprint,
            valid,
            reason,
        };
        self.plans.push(plan.clone());

        if !plan.valid {
            let reason = plan.reason.as_deref().unwrap_or("unknown");
            self.log(format!("plan {id} is invalid: {reason}"));
            return None;
        }
        info!(plan = id, signature = %plan.signature, "extracted plan");
        Some(plan)
    }

    /// Inject an externally produced plan: force its actions as assumptions,
    /// then extract it back with its behaviour annotation. `index` only
    /// labels log lines.
    pub fn plan_behaviour(&mut self, plan: &SequentialPlan, index: usize) -> Option<AnnotatedPlan> {
        let assumptions = match self.encoder.convert(plan) {
            Ok(assumptions) => assumptions,
            Err(error) => {
                self.log(format!("plan {index} cannot be interpreted: {error}"));
                return None;
            }
        };
        if !self.is_satisfiable(&assumptions, &QueryLimits::UNLIMITED) {
            self.log(format!(
                "the behaviour space is not satisfiable after appending plan {index}"
            ));
            return None;
        }
        self.log(format!("plan {index} added to the behaviour space"));
        self.extract_plan()
    }

    /// Replace the solver with a fresh one holding the same formula.
    pub fn reset(&mut self) -> Result<(), SpaceError> {
        let mut solver = (self.make_solver)();
        Self::load(&mut solver, &self.declarations, &self.assertions)?;
        self.solver = solver;
        self.log("solver has been reset".to_string());
        Ok(())
    }
}
