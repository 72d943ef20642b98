// Common library for the platform core: versions, scheduling, modules and datatypes

pub mod config;
pub mod datatype;
pub mod errors;
pub mod filter_mapping;
pub mod models;
pub mod module;
pub mod schedule;
pub mod scheduler;
pub mod telemetry;
pub mod version;
