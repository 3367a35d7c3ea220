//! The diverse search loop: seed, enumerate behaviours, fill up with plans.

use std::collections::HashSet;

use loris_bspace::{AnnotatedPlan, BehaviourSpace, PlanValidator, SpaceError};
use loris_ir::{GroundedTask, SequentialPlan};
use loris_smt::{SmtSolver, SmtTerm};
use thiserror::Error;
use tracing::info;

use crate::config::{BasePlannerConfig, PlannerConfig};
use crate::report::{SearchLogs, SpaceStatistics};

/// A classical planner invoked once to produce the seed plan.
pub trait ClassicalPlanner {
    /// `Ok(None)` means the planner finished without finding a plan.
    fn solve(
        &mut self,
        task: &GroundedTask,
        config: &BasePlannerConfig,
    ) -> Result<Option<SequentialPlan>, PlannerFailure>;
}

/// An opaque failure reported by a classical planner.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PlannerFailure(pub String);

/// What each search iteration blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbidMode {
    /// Every iteration must show a behaviour not seen before.
    Behaviour,
    /// Iterations stay inside the known behaviours but may not repeat a
    /// known plan.
    Plan,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(
        "quality bound factor {factor} with a seed of length {seed_len} gives an empty horizon"
    )]
    EmptyHorizon { factor: f64, seed_len: usize },
    #[error("base planner failed: {0}")]
    BasePlanner(#[from] PlannerFailure),
    #[error(transparent)]
    Space(#[from] SpaceError),
}

/// The diverse planner. Construction runs the seed phase; [`DiversePlanner::plan`]
/// runs the enumeration phases.
pub struct DiversePlanner<S, F> {
    config: PlannerConfig,
    space: Option<BehaviourSpace<S, F>>,
    diverse_plans: Vec<AnnotatedPlan>,
    seen_fingerprints: HashSet<String>,
    log: Vec<String>,
}

impl<S, F> DiversePlanner<S, F>
where
    S: SmtSolver,
    F: FnMut() -> S,
{
    /// Ask the classical planner for a seed plan and size the behaviour
    /// space from it. A planner that finds no seed leaves the space
    /// unconstructed; the search then returns no plans instead of failing.
    pub fn new(
        task: GroundedTask,
        config: PlannerConfig,
        seed_planner: &mut dyn ClassicalPlanner,
        make_solver: F,
        validator: Option<Box<dyn PlanValidator>>,
    ) -> Result<Self, SearchError> {
        let mut planner = Self {
            config,
            space: None,
            diverse_plans: Vec::new(),
            seen_fingerprints: HashSet::new(),
            log: Vec::new(),
        };

        let seed = seed_planner.solve(&task, &planner.config.base_planner)?;
        let Some(seed) = seed else {
            planner
                .log
                .push("no seed plan could be generated".to_string());
            return Ok(planner);
        };

        let factor = planner.config.bspace.quality_bound_factor;
        let horizon = (seed.actions.len() as f64 * factor).floor() as i64;
        if horizon < 1 {
            return Err(SearchError::EmptyHorizon {
                factor,
                seed_len: seed.actions.len(),
            });
        }
        let mut space_config = planner.config.bspace.clone();
        space_config.upper_bound = horizon as usize;

        let mut space = BehaviourSpace::new(task, &space_config, make_solver)?;
        if let Some(validator) = validator {
            space = space.with_validator(validator);
        }
        info!(
            seed_len = seed.actions.len(),
            horizon, "seeded the diverse search"
        );
        match space.plan_behaviour(&seed, 0) {
            Some(plan) => {
                planner.seen_fingerprints.insert(plan.fingerprint.clone());
                planner.diverse_plans.push(plan);
            }
            None => planner
                .log
                .push("the seed plan was rejected by the behaviour space".to_string()),
        }
        planner.space = Some(space);
        Ok(planner)
    }

    /// Diverse plans found so far, seed included.
    pub fn plans(&self) -> &[AnnotatedPlan] {
        &self.diverse_plans
    }

    /// Run the search. With `required = None` it enumerates one plan per
    /// behaviour until the space is exhausted; with a count it additionally
    /// fills up to that many plans by revisiting known behaviours.
    pub fn plan(&mut self, required: Option<usize>) -> &[AnnotatedPlan] {
        self.run_phase(ForbidMode::Behaviour, required);
        if let Some(required) = required {
            if self.diverse_plans.len() < required {
                self.log.push(format!(
                    "{} behaviours exist, filling up to {required} plans",
                    self.diverse_plans.len()
                ));
                self.run_phase(ForbidMode::Plan, Some(required));
            }
        }
        &self.diverse_plans
    }

    fn run_phase(&mut self, mode: ForbidMode, required: Option<usize>) {
        if self.space.is_none() {
            self.log
                .push("the behaviour space could not be constructed".to_string());
            return;
        }
        let limits = self.config.base_planner.query_limits();

        // Assumption state: every extraction is blocked as an exact plan,
        // and in behaviour mode also by its behaviour. Duplicate plans
        // still contribute their blocks, they are only dropped from the
        // result set.
        let mut behaviours: Vec<SmtTerm> = self
            .diverse_plans
            .iter()
            .map(|plan| plan.behaviour_expr.clone())
            .collect();
        let mut blocked: Vec<SmtTerm> = self
            .diverse_plans
            .iter()
            .map(AnnotatedPlan::blocking_term)
            .collect();

        loop {
            if let Some(required) = required {
                if self.diverse_plans.len() >= required {
                    break;
                }
            }
            let mut assumptions = vec![match mode {
                ForbidMode::Behaviour => SmtTerm::or(behaviours.clone()).not(),
                ForbidMode::Plan => SmtTerm::or(behaviours.clone()),
            }];
            assumptions.extend(blocked.iter().cloned());

            let Some(space) = self.space.as_mut() else {
                return;
            };
            if !space.is_satisfiable(&assumptions, &limits) {
                break;
            }
            let Some(plan) = space.extract_plan() else {
                self.log
                    .push("plan extraction failed, stopping this phase".to_string());
                break;
            };

            if mode == ForbidMode::Behaviour {
                behaviours.push(plan.behaviour_expr.clone());
            }
            blocked.push(plan.blocking_term());

            if self.seen_fingerprints.insert(plan.fingerprint.clone()) {
                info!(plan = plan.id, signature = %plan.signature, "new diverse plan");
                self.diverse_plans.push(plan);
            } else {
                self.log
                    .push(format!("repeated plan `{}` dropped", plan.fingerprint));
            }
        }
    }

    /// Logs from both layers plus behaviour statistics.
    pub fn report(&self) -> SearchLogs {
        let (space, statistics) = match &self.space {
            Some(space) => (space.logs().to_vec(), SpaceStatistics::collect(space)),
            None => (
                vec!["the behaviour space was never constructed".to_string()],
                SpaceStatistics::default(),
            ),
        };
        SearchLogs {
            search: self.log.clone(),
            space,
            statistics,
        }
    }
}
