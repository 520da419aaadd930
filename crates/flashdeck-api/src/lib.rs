//! Protocol types for flashdeck
//!
//! This crate defines the data model shared by every layer and the stable
//! API between flashdeckd and its clients:
//! - Cards, tags and per-card schedule state
//! - Commands (requests from clients) and responses
//! - Events (service -> subscribed clients)
//! - Versioning

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
