//! Search reports: logs from both layers plus behaviour statistics.

use indexmap::IndexMap;
use loris_bspace::{BehaviourSpace, DimensionValue};
use loris_smt::SmtSolver;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DimensionStat {
    /// Distinct discretized values this dimension observed.
    pub distinct: usize,
    /// Value range, for scalar dimensions only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SpaceStatistics {
    pub total_plans: usize,
    pub valid_plans: usize,
    pub distinct_behaviours: usize,
    pub dimensions: IndexMap<String, DimensionStat>,
}

impl SpaceStatistics {
    pub fn collect<S, F>(space: &BehaviourSpace<S, F>) -> Self
    where
        S: SmtSolver,
        F: FnMut() -> S,
    {
        let mut dimensions: IndexMap<String, DimensionStat> = IndexMap::new();
        for (name, distinct) in space.dimension_sizes() {
            dimensions.insert(
                name,
                DimensionStat {
                    distinct,
                    min: None,
                    max: None,
                },
            );
        }
        for plan in space.plans() {
            for (name, value) in &plan.signature.0 {
                if let (Some(stat), DimensionValue::Int(value)) =
                    (dimensions.get_mut(name), value)
                {
                    stat.min = Some(stat.min.map_or(*value, |m| m.min(*value)));
                    stat.max = Some(stat.max.map_or(*value, |m| m.max(*value)));
                }
            }
        }
        Self {
            total_plans: space.plans().len(),
            valid_plans: space.plans().iter().filter(|plan| plan.valid).count(),
            distinct_behaviours: space.behaviour_count(),
            dimensions,
        }
    }
}

/// Everything the search accumulated, for callers and for diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchLogs {
    pub search: Vec<String>,
    pub space: Vec<String>,
    pub statistics: SpaceStatistics,
}
