//! Planner configuration, deserialized from JSON with kebab-case keys.

use loris_bspace::SpaceConfig;
use loris_smt::QueryLimits;
use serde::{Deserialize, Serialize};

fn default_engine() -> String {
    "symk-opt".to_string()
}

fn default_search_time_limit_secs() -> u64 {
    900
}

fn default_solver_timeout_ms() -> u32 {
    600_000
}

fn default_solver_memorylimit_mb() -> u32 {
    16_000
}

/// Settings for the classical planner that produces the seed plan, plus the
/// per-query budgets for the behaviour space's solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasePlannerConfig {
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(
        rename = "search-time-limit-secs",
        default = "default_search_time_limit_secs"
    )]
    pub search_time_limit_secs: u64,
    #[serde(rename = "solver-timeout-ms", default = "default_solver_timeout_ms")]
    pub solver_timeout_ms: u32,
    #[serde(
        rename = "solver-memorylimit-mb",
        default = "default_solver_memorylimit_mb"
    )]
    pub solver_memorylimit_mb: u32,
}

impl Default for BasePlannerConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            search_time_limit_secs: default_search_time_limit_secs(),
            solver_timeout_ms: default_solver_timeout_ms(),
            solver_memorylimit_mb: default_solver_memorylimit_mb(),
        }
    }
}

impl BasePlannerConfig {
    /// Budgets applied to every satisfiability query of the search loop.
    pub fn query_limits(&self) -> QueryLimits {
        QueryLimits::new(Some(self.solver_timeout_ms), Some(self.solver_memorylimit_mb))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(rename = "base-planner-cfg", default)]
    pub base_planner: BasePlannerConfig,
    #[serde(rename = "bspace-cfg", default)]
    pub bspace: SpaceConfig,
}

impl PlannerConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
