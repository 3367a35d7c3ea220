#![doc = include_str!("../README.md")]

pub mod config;
pub mod report;
pub mod search;

pub use config::{BasePlannerConfig, PlannerConfig};
pub use report::{DimensionStat, SearchLogs, SpaceStatistics};
pub use search::{ClassicalPlanner, DiversePlanner, ForbidMode, PlannerFailure, SearchError};
