//! Warden library
//!
//! Exposes the service components for the binary and integration tests.

pub mod app;
pub mod authorizer;
pub mod config;
pub mod errors;
pub mod metrics;

pub use app::{Overrides, Warden};
pub use authorizer::{AccessRequest, AuthorizeError, Authorizer, Decision, MatchingEvaluator, PolicyEvaluator};
pub use config::WardenConfig;
pub use errors::{AppError, ConfigError};
