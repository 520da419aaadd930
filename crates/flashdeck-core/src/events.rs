//! Core events emitted by the scheduling service

use flashdeck_api::ScheduleState;
use flashdeck_util::{CardId, UserId};

use crate::Rating;

/// Events emitted by the scheduling service after a committed change
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// A review committed a new schedule
    CardReviewed {
        user_id: UserId,
        card_id: CardId,
        rating: Rating,
        interval_before: u32,
        schedule: ScheduleState,
    },

    CardCreated {
        user_id: UserId,
        card_id: CardId,
    },

    CardDeleted {
        user_id: UserId,
        card_id: CardId,
    },
}

impl CoreEvent {
    /// User whose data changed
    pub fn user_id(&self) -> UserId {
        match self {
            CoreEvent::CardReviewed { user_id, .. }
            | CoreEvent::CardCreated { user_id, .. }
            | CoreEvent::CardDeleted { user_id, .. } => *user_id,
        }
    }
}
