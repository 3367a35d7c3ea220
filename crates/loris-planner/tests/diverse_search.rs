//! End-to-end diverse search runs against Z3, with a stubbed seed planner.

use loris_bspace::{DimensionConfig, SpaceConfig};
use loris_ir::{Effect, Expr, GroundedAction, GroundedTask, SequentialPlan, Value};
use loris_planner::{
    BasePlannerConfig, ClassicalPlanner, DiversePlanner, PlannerConfig, PlannerFailure,
    SearchError,
};
use loris_smt::backends::z3_backend::Z3Solver;

/// Seed planner returning a canned plan.
struct FixedPlanner(Option<SequentialPlan>);

impl ClassicalPlanner for FixedPlanner {
    fn solve(
        &mut self,
        _task: &GroundedTask,
        _config: &BasePlannerConfig,
    ) -> Result<Option<SequentialPlan>, PlannerFailure> {
        Ok(self.0.clone())
    }
}

struct FailingPlanner;

impl ClassicalPlanner for FailingPlanner {
    fn solve(
        &mut self,
        _task: &GroundedTask,
        _config: &BasePlannerConfig,
    ) -> Result<Option<SequentialPlan>, PlannerFailure> {
        Err(PlannerFailure("engine crashed".to_string()))
    }
}

fn either_switch_task() -> GroundedTask {
    GroundedTask::new("either-switch")
        .fluent("on_a", Value::Bool(false))
        .fluent("on_b", Value::Bool(false))
        .action(
            GroundedAction::new("flip_a")
                .pre(Expr::fluent("on_a").not())
                .effect(Effect::assign("on_a", Expr::bool(true))),
        )
        .action(
            GroundedAction::new("flip_b")
                .pre(Expr::fluent("on_b").not())
                .effect(Effect::assign("on_b", Expr::bool(true))),
        )
        .goal(Expr::or(vec![Expr::fluent("on_a"), Expr::fluent("on_b")]))
}

fn two_goal_task() -> GroundedTask {
    GroundedTask::new("two-goals")
        .fluent("g1", Value::Bool(false))
        .fluent("g2", Value::Bool(false))
        .action(GroundedAction::new("set_g1").effect(Effect::assign("g1", Expr::bool(true))))
        .action(GroundedAction::new("set_g2").effect(Effect::assign("g2", Expr::bool(true))))
        .goal(Expr::fluent("g1"))
        .goal(Expr::fluent("g2"))
}

/// Three switches, the goal needs any one of them.
fn three_switch_task() -> GroundedTask {
    GroundedTask::new("three-switch")
        .fluent("on_a", Value::Bool(false))
        .fluent("on_b", Value::Bool(false))
        .fluent("on_c", Value::Bool(false))
        .action(GroundedAction::new("flip_a").effect(Effect::assign("on_a", Expr::bool(true))))
        .action(GroundedAction::new("flip_b").effect(Effect::assign("on_b", Expr::bool(true))))
        .action(GroundedAction::new("flip_c").effect(Effect::assign("on_c", Expr::bool(true))))
        .goal(Expr::or(vec![
            Expr::fluent("on_a"),
            Expr::fluent("on_b"),
            Expr::fluent("on_c"),
        ]))
}

/// Reach `c` from `a`: either jump straight there or walk via `b`.
fn travel_task() -> GroundedTask {
    GroundedTask::new("travel")
        .fluent("at_a", Value::Bool(true))
        .fluent("at_b", Value::Bool(false))
        .fluent("at_c", Value::Bool(false))
        .action(
            GroundedAction::new("jump_a_c")
                .pre(Expr::fluent("at_a"))
                .effect(Effect::assign("at_a", Expr::bool(false)))
                .effect(Effect::assign("at_c", Expr::bool(true))),
        )
        .action(
            GroundedAction::new("walk_a_b")
                .pre(Expr::fluent("at_a"))
                .effect(Effect::assign("at_a", Expr::bool(false)))
                .effect(Effect::assign("at_b", Expr::bool(true))),
        )
        .action(
            GroundedAction::new("walk_b_c")
                .pre(Expr::fluent("at_b"))
                .effect(Effect::assign("at_b", Expr::bool(false)))
                .effect(Effect::assign("at_c", Expr::bool(true))),
        )
        .goal(Expr::fluent("at_c"))
}

fn single_flip_seed() -> FixedPlanner {
    FixedPlanner(Some(SequentialPlan {
        actions: vec!["flip_a".into()],
    }))
}

fn diverse_planner(
    task: GroundedTask,
    config: PlannerConfig,
    seed: &mut dyn ClassicalPlanner,
) -> Result<DiversePlanner<Z3Solver, fn() -> Z3Solver>, SearchError> {
    let factory: fn() -> Z3Solver = Z3Solver::new;
    DiversePlanner::new(task, config, seed, factory, None)
}

#[test]
fn behaviour_phase_alone_keeps_one_plan_per_behaviour() {
    let mut planner = diverse_planner(
        either_switch_task(),
        PlannerConfig::default(),
        &mut single_flip_seed(),
    )
    .expect("planner");
    // The only behaviour is makespan 1, held by the seed already.
    assert_eq!(planner.plan(None).len(), 1);
    // Re-running may not resurrect blocked plans or duplicate the seed.
    assert_eq!(planner.plan(None).len(), 1);
}

#[test]
fn plan_phase_fills_up_with_repeated_behaviours() {
    let mut planner = diverse_planner(
        either_switch_task(),
        PlannerConfig::default(),
        &mut single_flip_seed(),
    )
    .expect("planner");
    // Only two plans exist inside the horizon, so asking for three stops
    // at two.
    let plans = planner.plan(Some(3)).to_vec();
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0].signature, plans[1].signature);
    assert_ne!(plans[0].fingerprint, plans[1].fingerprint);

    let report = planner.report();
    assert_eq!(report.statistics.total_plans, 2);
    assert_eq!(report.statistics.valid_plans, 2);
    assert_eq!(report.statistics.distinct_behaviours, 1);
    let rendered = serde_json::to_string(&report).expect("report serializes");
    assert!(rendered.contains("distinct_behaviours"));
}

#[test]
fn plan_phase_stops_at_the_requested_count() {
    let mut planner = diverse_planner(
        three_switch_task(),
        PlannerConfig::default(),
        &mut single_flip_seed(),
    )
    .expect("planner");
    // One behaviour, three plans inside the horizon. The fill-up loop must
    // stop as soon as the count is reached, not when the space runs dry.
    let plans = planner.plan(Some(2)).to_vec();
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0].signature, plans[1].signature);

    // The third plan is still there; a larger request picks it up.
    let plans = planner.plan(Some(3)).to_vec();
    assert_eq!(plans.len(), 3);
    let fingerprints: Vec<_> = plans.iter().map(|plan| plan.fingerprint.as_str()).collect();
    assert!(fingerprints.contains(&"flip_a"));
    assert!(fingerprints.contains(&"flip_b"));
    assert!(fingerprints.contains(&"flip_c"));
}

#[test]
fn behaviour_phase_finds_distinct_goal_orderings() {
    let config = PlannerConfig {
        bspace: SpaceConfig {
            dims: vec![DimensionConfig::GoalPredicateOrdering],
            ..SpaceConfig::default()
        },
        ..PlannerConfig::default()
    };
    let mut seed = FixedPlanner(Some(SequentialPlan {
        actions: vec!["set_g1".into(), "set_g2".into()],
    }));
    let mut planner = diverse_planner(two_goal_task(), config, &mut seed).expect("planner");
    let plans = planner.plan(Some(2)).to_vec();
    assert_eq!(plans.len(), 2);
    assert_ne!(plans[0].signature, plans[1].signature);
    // The fill-up phase never ran.
    assert!(planner
        .report()
        .search
        .iter()
        .all(|line| !line.contains("filling up")));
}

#[test]
fn missing_seed_plan_yields_an_empty_result() {
    let mut planner = diverse_planner(
        either_switch_task(),
        PlannerConfig::default(),
        &mut FixedPlanner(None),
    )
    .expect("planner");
    assert!(planner.plan(Some(2)).is_empty());
    let report = planner.report();
    assert!(report
        .search
        .iter()
        .any(|line| line.contains("no seed plan")));
    assert!(report
        .space
        .iter()
        .any(|line| line.contains("never constructed")));
}

#[test]
fn non_positive_horizon_is_a_configuration_error() {
    let config = PlannerConfig {
        bspace: SpaceConfig {
            quality_bound_factor: 0.0,
            ..SpaceConfig::default()
        },
        ..PlannerConfig::default()
    };
    let result = diverse_planner(either_switch_task(), config, &mut single_flip_seed());
    assert!(matches!(
        result,
        Err(SearchError::EmptyHorizon { seed_len: 1, .. })
    ));
}

#[test]
fn base_planner_failure_is_fatal() {
    let result = diverse_planner(
        either_switch_task(),
        PlannerConfig::default(),
        &mut FailingPlanner,
    );
    assert!(matches!(result, Err(SearchError::BasePlanner(_))));
}

#[test]
fn quality_bound_factor_stretches_the_horizon() {
    let config = PlannerConfig {
        bspace: SpaceConfig {
            quality_bound_factor: 2.0,
            ..SpaceConfig::default()
        },
        ..PlannerConfig::default()
    };
    let mut seed = FixedPlanner(Some(SequentialPlan {
        actions: vec!["jump_a_c".into()],
    }));
    let mut planner = diverse_planner(travel_task(), config, &mut seed).expect("planner");
    // Horizon 2 admits a second behaviour: walking via b takes two steps.
    let plans = planner.plan(None).to_vec();
    assert_eq!(plans.len(), 2);
    assert_ne!(plans[0].signature, plans[1].signature);
    assert!(plans
        .iter()
        .any(|plan| plan.grounded_actions == vec!["walk_a_b", "walk_b_c"]));
}
