//! Event types for flashdeckd -> client streaming

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use flashdeck_util::{CardId, UserId};

use crate::API_VERSION;

/// Event envelope. Delivered only to clients subscribed as `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Utc>,
    pub user_id: UserId,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(user_id: UserId, payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: flashdeck_util::now(),
            user_id,
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A review was committed
    CardReviewed {
        card_id: CardId,
        rating: String,
        interval: u32,
        ease_factor: f64,
        next_review: DateTime<Utc>,
    },

    CardCreated { card_id: CardId },

    CardDeleted { card_id: CardId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_carries_owner_and_tag() {
        let user = UserId::new();
        let event = Event::new(
            user,
            EventPayload::CardDeleted {
                card_id: CardId::new(),
            },
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["type"], "card_deleted");
        assert_eq!(json["user_id"], user.to_string());
    }
}
