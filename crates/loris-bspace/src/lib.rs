#![doc = include_str!("../README.md")]

pub mod count;
pub mod dims;
pub mod encoder;
pub mod plan;
pub mod resources;
pub mod space;

pub use count::BehaviourCounter;
pub use dims::{
    build_dimensions, Dimension, DimensionConfig, DimensionError, DimensionInput, DimensionValue,
};
pub use encoder::{EncodeError, Encoder, ExtractedPlan, FormulaParts};
pub use plan::{AnnotatedPlan, BehaviourSignature};
pub use resources::{parse_resource_file, parse_resources, ResourceError, ResourceSpec};
pub use space::{BehaviourSpace, PlanValidator, SpaceConfig, SpaceError, Validation};
