//! Library exports for ecoverse-client, shared between the binary and tests.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod startup;
pub mod state;
pub mod store;
pub mod surface;
pub mod tasks;
pub mod utils;
