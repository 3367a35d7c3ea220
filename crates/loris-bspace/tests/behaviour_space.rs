//! End-to-end checks of the encoding and the behaviour space against Z3.

use std::io::Write;

use loris_bspace::dims::{DimensionConfig, GOAL_PREDICATE_ORDERING, RESOURCE_COUNT};
use loris_bspace::{BehaviourCounter, BehaviourSpace, Encoder, SpaceConfig};
use loris_ir::{Effect, Expr, GroundedAction, GroundedTask, SequentialPlan, Value};
use loris_smt::backends::z3_backend::Z3Solver;
use loris_smt::{QueryLimits, SmtSolver, SmtTerm};

/// Two switches, the goal needs either one.
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

/// Two independent goals reachable in either order.
fn two_goal_task() -> GroundedTask {
    GroundedTask::new("two-goals")
        .fluent("g1", Value::Bool(false))
        .fluent("g2", Value::Bool(false))
        .action(GroundedAction::new("set_g1").effect(Effect::assign("g1", Expr::bool(true))))
        .action(GroundedAction::new("set_g2").effect(Effect::assign("g2", Expr::bool(true))))
        .goal(Expr::fluent("g1"))
        .goal(Expr::fluent("g2"))
}

fn space_with(
    task: GroundedTask,
    config: &SpaceConfig,
) -> BehaviourSpace<Z3Solver, impl FnMut() -> Z3Solver> {
    BehaviourSpace::new(task, config, Z3Solver::new).expect("space construction")
}

#[test]
fn extraction_returns_a_goal_reaching_plan() {
    let mut space = space_with(
        either_switch_task(),
        &SpaceConfig {
            upper_bound: 3,
            ..SpaceConfig::default()
        },
    );
    assert!(space.is_satisfiable(&[], &QueryLimits::UNLIMITED));
    let plan = space.extract_plan().expect("a plan");
    // The makespan coupling admits only direct length-1 plans here.
    assert_eq!(plan.grounded_actions.len(), 1);
    assert!(plan.grounded_actions[0] == "flip_a" || plan.grounded_actions[0] == "flip_b");
    assert_eq!(space.behaviour_count(), 1);
}

#[test]
fn blocking_the_only_behaviour_makes_the_space_unsatisfiable() {
    let mut space = space_with(
        either_switch_task(),
        &SpaceConfig {
            upper_bound: 3,
            ..SpaceConfig::default()
        },
    );
    assert!(space.is_satisfiable(&[], &QueryLimits::UNLIMITED));
    let plan = space.extract_plan().expect("a plan");
    let forbid = plan.behaviour_expr.clone().not();
    assert!(!space.is_satisfiable(&[forbid], &QueryLimits::UNLIMITED));
}

#[test]
fn exact_plan_blocking_leaves_the_sibling_plan() {
    let mut space = space_with(
        either_switch_task(),
        &SpaceConfig {
            upper_bound: 2,
            ..SpaceConfig::default()
        },
    );
    assert!(space.is_satisfiable(&[], &QueryLimits::UNLIMITED));
    let first = space.extract_plan().expect("first plan");
    // Same behaviour, different plan: exactly one such plan exists.
    let assumptions = vec![first.behaviour_expr.clone(), first.blocking_term()];
    assert!(space.is_satisfiable(&assumptions, &QueryLimits::UNLIMITED));
    let second = space.extract_plan().expect("second plan");
    assert_ne!(first.fingerprint, second.fingerprint);
    assert_eq!(first.signature, second.signature);

    let assumptions = vec![
        first.behaviour_expr.clone(),
        first.blocking_term(),
        second.blocking_term(),
    ];
    assert!(!space.is_satisfiable(&assumptions, &QueryLimits::UNLIMITED));
}

#[test]
fn injected_plans_reproduce_their_signature() {
    let config = SpaceConfig {
        upper_bound: 2,
        ..SpaceConfig::default()
    };
    let mut space = space_with(either_switch_task(), &config);
    assert!(space.is_satisfiable(&[], &QueryLimits::UNLIMITED));
    let extracted = space.extract_plan().expect("a plan");

    let mut fresh = space_with(either_switch_task(), &config);
    let injected = fresh
        .plan_behaviour(&extracted.plan, 0)
        .expect("injected plan");
    assert_eq!(injected.signature, extracted.signature);
    assert_eq!(injected.fingerprint, extracted.fingerprint);
}

#[test]
fn histogram_counts_same_behaviour_plans_once() {
    let mut space = space_with(
        either_switch_task(),
        &SpaceConfig {
            upper_bound: 1,
            ..SpaceConfig::default()
        },
    );
    let a = SequentialPlan {
        actions: vec!["flip_a".into()],
    };
    let b = SequentialPlan {
        actions: vec!["flip_b".into()],
    };
    assert!(space.plan_behaviour(&a, 0).is_some());
    assert!(space.plan_behaviour(&b, 1).is_some());
    assert_eq!(space.plans().len(), 2);
    assert_eq!(space.behaviour_count(), 1);

    let counter = BehaviourCounter::new(
        either_switch_task(),
        &SpaceConfig::default(),
        &[a, b],
        Z3Solver::new,
    )
    .expect("counter");
    assert_eq!(counter.count(), 1);
    assert_eq!(counter.space().horizon(), 1);
}

#[test]
fn goal_ordering_separates_achievement_orders() {
    let config = SpaceConfig {
        upper_bound: 2,
        dims: vec![DimensionConfig::GoalPredicateOrdering],
        ..SpaceConfig::default()
    };
    let mut space = space_with(two_goal_task(), &config);
    let forward = SequentialPlan {
        actions: vec!["set_g1".into(), "set_g2".into()],
    };
    let backward = SequentialPlan {
        actions: vec!["set_g2".into(), "set_g1".into()],
    };
    let first = space.plan_behaviour(&forward, 0).expect("forward plan");
    let second = space.plan_behaviour(&backward, 1).expect("backward plan");
    assert_ne!(first.signature, second.signature);
    assert_eq!(space.behaviour_count(), 2);
    let sizes = space.dimension_sizes();
    assert!(sizes.contains(&(GOAL_PREDICATE_ORDERING.to_string(), 2)));
}

#[test]
fn resource_counters_follow_matching_occurrences() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("switches.res");
    let mut file = std::fs::File::create(&path).expect("resource file");
    writeln!(file, "(:resource g1 5 0 1)").expect("write");
    drop(file);

    let config = SpaceConfig {
        upper_bound: 2,
        dims: vec![DimensionConfig::ResourceCount {
            resource_file: Some(path),
        }],
        ..SpaceConfig::default()
    };
    let mut space = space_with(two_goal_task(), &config);
    let plan = SequentialPlan {
        actions: vec!["set_g1".into(), "set_g2".into()],
    };
    let annotated = space.plan_behaviour(&plan, 0).expect("plan");
    let resource = annotated
        .signature
        .0
        .iter()
        .find(|(name, _)| name == RESOURCE_COUNT)
        .expect("resource dimension in signature");
    assert_eq!(
        resource.1,
        loris_bspace::DimensionValue::Ints(vec![1])
    );
}

#[test]
fn model_respects_frame_and_execution_semantics() {
    let task = either_switch_task();
    let mut encoder = Encoder::new(task);
    encoder.encode(3).expect("encode");

    let mut solver = Z3Solver::new();
    for (name, sort) in encoder.declarations() {
        solver.declare_var(name, sort).expect("declare");
    }
    for assertion in encoder.assertions() {
        solver.assert(assertion).expect("assert");
    }
    assert_eq!(
        solver.check(&QueryLimits::UNLIMITED).expect("check"),
        loris_smt::SatResult::Sat
    );
    let vars: Vec<(&str, &loris_smt::SmtSort)> = encoder
        .declarations()
        .iter()
        .map(|(name, sort)| (name.as_str(), sort))
        .collect();
    let model = solver.model(&vars).expect("model").expect("some model");

    let occurrences = |step: usize| {
        ["flip_a", "flip_b"]
            .iter()
            .filter(|action| model.get_bool(&format!("a_{step}_{action}")) == Some(true))
            .count()
    };
    for step in 0..3 {
        assert!(occurrences(step) <= 1, "two actions at step {step}");
    }
    assert_eq!(occurrences(3), 0, "final layer must be empty");

    // A fluent only changes when an action that touches it fires.
    for step in 0..3 {
        for (fluent, action) in [("on_a", "flip_a"), ("on_b", "flip_b")] {
            let before = model.get_bool(&format!("f_{step}_{fluent}")).unwrap();
            let after = model
                .get_bool(&format!("f_{}_{fluent}", step + 1))
                .unwrap();
            if before != after {
                assert_eq!(
                    model.get_bool(&format!("a_{step}_{action}")),
                    Some(true),
                    "{fluent} changed at step {step} without {action}"
                );
            }
        }
    }

    // The goal holds in at least one state.
    let reached = (1..=3).any(|state| {
        model.get_bool(&format!("f_{state}_on_a")) == Some(true)
            || model.get_bool(&format!("f_{state}_on_b")) == Some(true)
    });
    assert!(reached, "no goal state in the model");
}

#[test]
fn unlimited_and_limited_queries_agree_on_small_tasks() {
    let mut space = space_with(
        either_switch_task(),
        &SpaceConfig {
            upper_bound: 2,
            ..SpaceConfig::default()
        },
    );
    let generous = QueryLimits::new(Some(60_000), Some(1024));
    assert!(space.is_satisfiable(&[], &generous));
    assert!(space.is_satisfiable(&[], &QueryLimits::UNLIMITED));
    let impossible = SmtTerm::bool(false);
    assert!(!space.is_satisfiable(&[impossible], &generous));
}
