//! Counting the distinct behaviours of an externally supplied plan set.

use loris_ir::{GroundedTask, SequentialPlan};
use loris_smt::SmtSolver;

use crate::space::{BehaviourSpace, SpaceConfig, SpaceError};

/// A behaviour space sized to a fixed plan set: the horizon is the length of
/// the longest plan, and every plan is injected at construction time. Plans
/// the space rejects are skipped; the rejection is on the space's log.
pub struct BehaviourCounter<S, F> {
    space: BehaviourSpace<S, F>,
}

impl<S, F> BehaviourCounter<S, F>
where
    S: SmtSolver,
    F: FnMut() -> S,
{
    pub fn new(
        task: GroundedTask,
        config: &SpaceConfig,
        plans: &[SequentialPlan],
        make_solver: F,
    ) -> Result<Self, SpaceError> {
        let mut config = config.clone();
        config.upper_bound = plans
            .iter()
            .map(|plan| plan.actions.len())
            .max()
            .unwrap_or(1)
            .max(1);
        let mut space = BehaviourSpace::new(task, &config, make_solver)?;
        for (index, plan) in plans.iter().enumerate() {
            let _ = space.plan_behaviour(plan, index);
        }
        Ok(Self { space })
    }

    /// Number of distinct behaviours across the injected plans.
    pub fn count(&self) -> usize {
        self.space.behaviour_count()
    }

    pub fn space(&self) -> &BehaviourSpace<S, F> {
        &self.space
    }
}
