//! RLS Gate Core
//!
//! Organization-scoped row level security for a multi-tenant application:
//! feature flags that decide whether filtering is on, resolution of the
//! caller's organization and role, the per-query policy gate, and the HTTP
//! route guard that ties them together.

pub mod api;
pub mod audit;
pub mod cli;
pub mod client;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod flags;
pub mod middleware;
pub mod permissions;
pub mod policy;
pub mod server;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
