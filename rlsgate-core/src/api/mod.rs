//! REST handlers

pub mod flags;
pub mod health;
pub mod metrics;
pub mod whoami;
