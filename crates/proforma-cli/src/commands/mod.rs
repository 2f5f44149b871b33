pub mod analysis;
pub mod archetypes;
pub mod metrics;
pub mod project;
