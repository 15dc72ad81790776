pub mod feasibility;
pub mod jaccard;
pub mod partition;
pub mod planner;
pub mod sampler;
pub mod service;
pub mod universe;

pub use feasibility::{check_feasibility, FeasibilityVerdict};
pub use sampler::{generate, generate_with_cancel, CancelToken, GenerateError, GeneratedSet};
pub use universe::{InMemoryUniverse, Universe, UniverseError};
