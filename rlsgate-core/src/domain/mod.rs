//! Domain models for the RLS gate

pub mod common;
pub mod session;
pub mod token;
pub mod user;

pub use common::*;
pub use session::*;
pub use user::*;
