//! Audit event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use flashdeck_util::{CardId, UserId};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Daemon started
    ServiceStarted,

    /// Daemon stopped
    ServiceStopped,

    CardCreated { card_id: CardId, user_id: UserId },

    CardDeleted { card_id: CardId, user_id: UserId },

    /// A review was committed
    CardReviewed {
        card_id: CardId,
        user_id: UserId,
        rating: String,
        interval_before: u32,
        interval_after: u32,
    },

    /// Client connected
    ClientConnected { client_id: String, uid: Option<u32> },

    /// Client disconnected
    ClientDisconnected { client_id: String },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self::at(flashdeck_util::now(), event)
    }

    /// Event stamped with an explicit time, e.g. from an injected clock
    pub fn at(timestamp: DateTime<Utc>, event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp,
            event,
        }
    }
}
