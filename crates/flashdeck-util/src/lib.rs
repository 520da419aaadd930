//! Shared utilities for flashdeck
//!
//! This crate provides:
//! - ID types (UserId, CardId, TagId, ClientId)
//! - Clock abstraction and interval formatting
//! - Error types
//! - Rate limiting helpers
//! - Default paths for socket, data, and config files

mod error;
mod ids;
mod paths;
mod rate_limit;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
