//! Store trait definitions

use flashdeck_api::{Card, ScheduleState, Tag};
use flashdeck_util::{CardId, TagId, UserId};

use crate::{AuditEvent, StoreResult};

/// Main store trait.
///
/// Every card and tag lookup is scoped to its owner: a record that exists but
/// belongs to another user is reported exactly like a missing one.
pub trait Store: Send + Sync {
    // Cards

    /// Insert a new card together with its tag links
    fn insert_card(&self, card: &Card) -> StoreResult<()>;

    /// Get a card owned by `user_id`
    fn get_card(&self, user_id: UserId, card_id: CardId) -> StoreResult<Option<Card>>;

    /// All cards owned by `user_id`
    fn list_cards(&self, user_id: UserId) -> StoreResult<Vec<Card>>;

    /// Replace a card's schedule if its version still equals `expected_version`.
    ///
    /// On success the stored version is incremented and `true` is returned.
    /// `false` means the card changed underneath the caller (or vanished).
    fn compare_and_swap_schedule(
        &self,
        user_id: UserId,
        card_id: CardId,
        expected_version: u64,
        schedule: &ScheduleState,
    ) -> StoreResult<bool>;

    /// Delete a card, its schedule and its tag links. Returns whether it existed.
    fn delete_card(&self, user_id: UserId, card_id: CardId) -> StoreResult<bool>;

    // Tags

    fn insert_tag(&self, tag: &Tag) -> StoreResult<()>;

    fn get_tag_by_name(&self, user_id: UserId, name: &str) -> StoreResult<Option<Tag>>;

    /// Tags owned by `user_id` among `tag_ids`; unknown or foreign ids are skipped
    fn get_tags_by_ids(&self, user_id: UserId, tag_ids: &[TagId]) -> StoreResult<Vec<Tag>>;

    /// All tags owned by `user_id`, sorted by name
    fn list_tags(&self, user_id: UserId) -> StoreResult<Vec<Tag>>;

    /// Delete a tag and detach it from every card. Returns whether it existed.
    fn delete_tag(&self, user_id: UserId, tag_id: TagId) -> StoreResult<bool>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
