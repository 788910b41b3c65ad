//! Shared utilities for the stock-report workspace
//!
//! This crate provides the pieces every binary and library in the workspace
//! needs but none of them owns: tracing subscriber setup and typed lookups of
//! configuration values from the process environment.

pub mod env;
pub mod logging;

pub use env::{EnvError, env_duration_secs, env_parse, env_string};
pub use logging::{init_json_tracing, init_tracing};
