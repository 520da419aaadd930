//! Scheduling service: the façade the daemon drives

use chrono::{DateTime, SubsecRound, Utc};
use flashdeck_api::{Card, CardContent, HealthStatus, MAX_TAG_NAME_LEN, Tag};
use flashdeck_config::{ReviewPolicy, SelectionDefaults, Settings};
use flashdeck_store::{AuditEvent, AuditEventType, Store};
use flashdeck_util::{CardId, Clock, FlashdeckError, Result, TagId, UserId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    clamp_limit, CoreEvent, DueSelector, Rating, ReviewUpdater, StudySessionSelector,
    StudyStrategy,
};

/// Parameters of a study request as received from a client
#[derive(Debug, Clone, Default)]
pub struct StudyQuery {
    pub strategy: String,
    pub limit: Option<u32>,
    pub tag_ids: Vec<TagId>,
    /// Fixes the `random` order; drawn from OS entropy when absent
    pub seed: Option<u64>,
}

/// Owns every path that reads or changes scheduling state.
///
/// Stateless between calls apart from what the store persists. Reviews are
/// the only writers of `ScheduleState`.
pub struct SchedulingService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    updater: ReviewUpdater,
    selection: SelectionDefaults,
    review_policy: ReviewPolicy,
}

impl SchedulingService {
    pub fn new(settings: &Settings, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        info!(
            initial_ease = settings.scheduler.initial_ease,
            minimum_ease = settings.scheduler.minimum_ease,
            max_attempts = settings.review.max_attempts,
            "Scheduling service initialized"
        );

        Self {
            store,
            clock,
            updater: ReviewUpdater::new(settings.scheduler),
            selection: settings.selection,
            review_policy: settings.review,
        }
    }

    /// Grade a recall attempt and persist the rescheduled card.
    ///
    /// The read-compute-write cycle is guarded by the card's version. A lost
    /// race re-reads and recomputes; after `max_attempts` losses the caller
    /// gets `Conflict`.
    pub fn review(&self, user_id: UserId, card_id: CardId, rating: &str) -> Result<(Card, CoreEvent)> {
        let rating: Rating = rating.parse()?;
        let attempts = self.review_policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            let mut card = self.load_card(user_id, card_id)?;
            let now = self.now();
            let next = self.updater.update(&card.schedule, rating, now);

            if !self
                .store
                .compare_and_swap_schedule(user_id, card_id, card.version, &next)?
            {
                warn!(card_id = %card_id, attempt, "Card changed during review, retrying");
                continue;
            }

            let interval_before = card.schedule.interval;
            card.schedule = next;
            card.version += 1;

            self.audit(AuditEventType::CardReviewed {
                card_id,
                user_id,
                rating: rating.to_string(),
                interval_before,
                interval_after: card.schedule.interval,
            });

            info!(
                card_id = %card_id,
                rating = %rating,
                interval = card.schedule.interval,
                ease_factor = card.schedule.ease_factor,
                "Card reviewed"
            );

            let event = CoreEvent::CardReviewed {
                user_id,
                card_id,
                rating,
                interval_before,
                schedule: card.schedule.clone(),
            };
            return Ok((card, event));
        }

        Err(FlashdeckError::conflict(format!(
            "card {card_id} kept changing during review; try again"
        )))
    }

    /// Cards due now, most overdue first
    pub fn due(&self, user_id: UserId, limit: Option<u32>) -> Result<Vec<Card>> {
        let limit = clamp_limit(limit.unwrap_or(self.selection.due_default_limit));
        let cards = self.store.list_cards(user_id)?;
        let now = self.now();

        let due: Vec<Card> = DueSelector::due(&cards, user_id, now, limit)
            .cloned()
            .collect();
        debug!(user_id = %user_id, count = due.len(), limit, "Due cards selected");
        Ok(due)
    }

    /// Practice selection. Never changes a schedule.
    pub fn study(&self, user_id: UserId, query: &StudyQuery) -> Result<Vec<Card>> {
        let strategy = StudyStrategy::parse(&query.strategy, &query.tag_ids)?;

        if let StudyStrategy::Tag(filter) = &strategy {
            let owned = self.store.get_tags_by_ids(user_id, filter.ids())?;
            if owned.len() != filter.ids().len() {
                return Err(FlashdeckError::not_found("one or more tags not found"));
            }
        }

        let limit = query.limit.unwrap_or(self.selection.study_default_limit);
        let cards = self.store.list_cards(user_id)?;
        let mut rng = match query.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let picked = StudySessionSelector::select(&cards, user_id, &strategy, limit, &mut rng);
        debug!(
            user_id = %user_id,
            strategy = strategy.as_str(),
            count = picked.len(),
            "Study cards selected"
        );
        Ok(picked)
    }

    pub fn get_card(&self, user_id: UserId, card_id: CardId) -> Result<Card> {
        self.load_card(user_id, card_id)
    }

    /// Create a card for `user_id`, attaching tags by name (created when missing)
    pub fn create_card(
        &self,
        user_id: UserId,
        content: CardContent,
        tag_names: &[String],
    ) -> Result<(Card, CoreEvent)> {
        let problems = content.problems();
        if !problems.is_empty() {
            return Err(FlashdeckError::validation(problems.join("; ")));
        }

        // Every name is checked before anything is written
        let names = tag_names
            .iter()
            .map(|name| normalize_tag_name(name))
            .collect::<Result<Vec<_>>>()?;

        let mut tag_ids = Vec::with_capacity(names.len());
        let mut created = Vec::new();
        for name in names {
            match self.find_or_insert_tag(user_id, name) {
                Ok((tag, fresh)) => {
                    if fresh {
                        created.push(tag.id);
                    }
                    tag_ids.push(tag.id);
                }
                Err(e) => {
                    self.discard_tags(user_id, &created);
                    return Err(e);
                }
            }
        }
        tag_ids.sort();
        tag_ids.dedup();

        let now = self.now();
        let mut card = Card::new(user_id, content, now, self.updater.params().initial_ease);
        card.tag_ids = tag_ids;
        if let Err(e) = self.store.insert_card(&card) {
            self.discard_tags(user_id, &created);
            return Err(e.into());
        }

        self.audit(AuditEventType::CardCreated {
            card_id: card.id,
            user_id,
        });
        info!(card_id = %card.id, tags = card.tag_ids.len(), "Card created");

        let event = CoreEvent::CardCreated {
            user_id,
            card_id: card.id,
        };
        Ok((card, event))
    }

    /// Delete a card along with its schedule and tag links
    pub fn delete_card(&self, user_id: UserId, card_id: CardId) -> Result<CoreEvent> {
        if !self.store.delete_card(user_id, card_id)? {
            return Err(card_not_found(card_id));
        }

        self.audit(AuditEventType::CardDeleted { card_id, user_id });
        info!(card_id = %card_id, "Card deleted");

        Ok(CoreEvent::CardDeleted { user_id, card_id })
    }

    pub fn list_tags(&self, user_id: UserId) -> Result<Vec<Tag>> {
        Ok(self.store.list_tags(user_id)?)
    }

    /// Create a tag, or return the existing one with the same name
    pub fn create_tag(&self, user_id: UserId, name: &str) -> Result<Tag> {
        self.get_or_create_tag(user_id, name)
    }

    /// Delete a tag; cards that carried it keep existing
    pub fn delete_tag(&self, user_id: UserId, tag_id: TagId) -> Result<()> {
        if !self.store.delete_tag(user_id, tag_id)? {
            return Err(FlashdeckError::not_found(format!("tag {tag_id}")));
        }
        info!(tag_id = %tag_id, "Tag deleted");
        Ok(())
    }

    pub fn health(&self) -> HealthStatus {
        let store_ok = self.store.is_healthy();
        if !store_ok {
            warn!("Store health check failed");
        }
        HealthStatus {
            live: true,
            ready: store_ok,
            store_ok,
        }
    }

    fn load_card(&self, user_id: UserId, card_id: CardId) -> Result<Card> {
        self.store
            .get_card(user_id, card_id)?
            .ok_or_else(|| card_not_found(card_id))
    }

    /// Storage keeps microseconds; handing out finer times would make a
    /// returned card differ from its stored copy.
    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }

    fn get_or_create_tag(&self, user_id: UserId, name: &str) -> Result<Tag> {
        let name = normalize_tag_name(name)?;
        Ok(self.find_or_insert_tag(user_id, name)?.0)
    }

    /// Returns the tag and whether this call created it. `name` must be normalized.
    fn find_or_insert_tag(&self, user_id: UserId, name: String) -> Result<(Tag, bool)> {
        if let Some(tag) = self.store.get_tag_by_name(user_id, &name)? {
            return Ok((tag, false));
        }

        let tag = Tag::new(user_id, name, self.now());
        match self.store.insert_tag(&tag) {
            Ok(()) => {
                debug!(tag_id = %tag.id, name = %tag.name, "Tag created");
                Ok((tag, true))
            }
            // Another request created the same name first
            Err(e) => self
                .store
                .get_tag_by_name(user_id, &tag.name)?
                .map(|tag| (tag, false))
                .ok_or_else(|| e.into()),
        }
    }

    /// Undo tags created for a card that was never stored
    fn discard_tags(&self, user_id: UserId, tag_ids: &[TagId]) {
        for &tag_id in tag_ids {
            if let Err(e) = self.store.delete_tag(user_id, tag_id) {
                warn!(tag_id = %tag_id, error = %e, "Failed to remove tag of rejected card");
            }
        }
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self
            .store
            .append_audit(AuditEvent::at(self.now(), event))
        {
            warn!(error = %e, "Failed to append audit event");
        }
    }
}

fn card_not_found(card_id: CardId) -> FlashdeckError {
    FlashdeckError::not_found(format!("card {card_id}"))
}

fn normalize_tag_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FlashdeckError::validation("tag name cannot be empty"));
    }
    let len = name.chars().count();
    if len > MAX_TAG_NAME_LEN {
        return Err(FlashdeckError::validation(format!(
            "tag name is {len} characters (max {MAX_TAG_NAME_LEN})"
        )));
    }
    Ok(name.to_string())
}
