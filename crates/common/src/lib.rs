//! Reviewflow Common Library
//!
//! Shared code for the Reviewflow services including:
//! - The paper lifecycle state machine and workflow services
//! - Database models and repository patterns
//! - Error types and handling
//! - Configuration management
//! - Identity verification
//! - Artifact storage and notification delivery
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod notify;
pub mod storage;
pub mod telemetry;
pub mod workflow;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use workflow::{Workflow, WorkflowStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix of every human-readable paper code
pub const PAPER_CODE_PREFIX: &str = "RPMS";
