//! Build-time helpers run from the command line, outside the pipeline.

pub mod env_config;
pub mod possible_types;

pub use env_config::{build_configuration, collect_configuration, render_configuration};
pub use possible_types::{extract_possible_types, fetch_possible_types, write_possible_types};
