pub mod archetypes;
pub mod config;
pub mod debt_schedule;
pub mod engine;
pub mod error;
pub mod registry;
pub mod schema;
pub mod time_series;
pub mod time_value;
pub mod types;

#[cfg(feature = "scenarios")]
pub mod scenarios;

pub use config::{IrrSolverConfig, ProjectionOptions};
pub use engine::{list_archetypes, project, Engine};
pub use error::{FieldError, ProFormaError, ValidationErrors};
pub use registry::{ArchetypeDescriptor, Registry};
pub use types::*;

/// Standard result type for all pro forma operations
pub type ProFormaResult<T> = Result<T, ProFormaError>;
