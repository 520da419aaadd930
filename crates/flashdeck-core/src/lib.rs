//! Spaced-repetition scheduling engine for flashdeckd
//!
//! This crate is the heart of flashdeckd, containing:
//! - Review grading and the SM-2 style schedule update
//! - Due-card selection (most overdue first)
//! - Study-session selection (hardest, random, tag), which never mutates
//! - The scheduling service tying these to the store with per-card
//!   optimistic concurrency

mod due;
mod events;
mod review;
mod service;
mod study;

pub use due::*;
pub use events::*;
pub use review::*;
pub use service::*;
pub use study::*;
