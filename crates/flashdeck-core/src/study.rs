//! Non-graded practice selection
//!
//! Selection only reads cards. Nothing here can change a schedule, which is
//! what separates a study pass from a review.

use flashdeck_api::Card;
use flashdeck_config::{MAX_QUERY_LIMIT, MIN_QUERY_LIMIT};
use flashdeck_util::{FlashdeckError, Result, TagId, UserId};
use rand::Rng;
use rand::seq::SliceRandom;

/// Clamp a requested list size into `[MIN_QUERY_LIMIT, MAX_QUERY_LIMIT]`
pub fn clamp_limit(limit: u32) -> usize {
    limit.clamp(MIN_QUERY_LIMIT, MAX_QUERY_LIMIT) as usize
}

/// A non-empty set of tags, matched with OR semantics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter(Vec<TagId>);

impl TagFilter {
    /// Returns `None` for an empty set
    pub fn new(tag_ids: impl IntoIterator<Item = TagId>) -> Option<Self> {
        let mut ids: Vec<TagId> = tag_ids.into_iter().collect();
        ids.sort();
        ids.dedup();
        (!ids.is_empty()).then_some(Self(ids))
    }

    pub fn ids(&self) -> &[TagId] {
        &self.0
    }

    pub fn matches(&self, card: &Card) -> bool {
        card.has_any_tag(&self.0)
    }
}

/// How a study session picks its cards
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudyStrategy {
    /// Lowest ease first, due or not
    Hardest,
    /// Uniform sample without replacement
    Random,
    /// Cards carrying any of the tags, soonest review first
    Tag(TagFilter),
}

impl StudyStrategy {
    /// Parse a strategy token. `tag_ids` is only consulted for `tag`.
    pub fn parse(token: &str, tag_ids: &[TagId]) -> Result<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "hardest" => Ok(StudyStrategy::Hardest),
            "random" => Ok(StudyStrategy::Random),
            "tag" => TagFilter::new(tag_ids.iter().copied())
                .map(StudyStrategy::Tag)
                .ok_or_else(|| {
                    FlashdeckError::validation("tag strategy requires at least one tag id")
                }),
            other => Err(FlashdeckError::validation(format!(
                "unknown study strategy '{other}' (expected hardest, random or tag)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StudyStrategy::Hardest => "hardest",
            StudyStrategy::Random => "random",
            StudyStrategy::Tag(_) => "tag",
        }
    }
}

pub struct StudySessionSelector;

impl StudySessionSelector {
    /// Pick up to `limit` of `user_id`'s cards (after clamping) in the strategy's order
    pub fn select<R: Rng + ?Sized>(
        cards: &[Card],
        user_id: UserId,
        strategy: &StudyStrategy,
        limit: u32,
        rng: &mut R,
    ) -> Vec<Card> {
        let limit = clamp_limit(limit);
        let mut owned: Vec<&Card> = cards.iter().filter(|c| c.user_id == user_id).collect();

        let picked: Vec<&Card> = match strategy {
            StudyStrategy::Hardest => {
                owned.sort_by(|a, b| {
                    a.schedule
                        .ease_factor
                        .total_cmp(&b.schedule.ease_factor)
                        .then(a.schedule.interval.cmp(&b.schedule.interval))
                        .then(a.id.cmp(&b.id))
                });
                owned.into_iter().take(limit).collect()
            }
            StudyStrategy::Random => {
                let amount = limit.min(owned.len());
                let (sample, _) = owned.partial_shuffle(rng, amount);
                sample.to_vec()
            }
            StudyStrategy::Tag(filter) => {
                owned.retain(|c| filter.matches(c));
                owned.sort_by_key(|c| (c.schedule.next_review, c.id));
                owned.into_iter().take(limit).collect()
            }
        };

        picked.into_iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use flashdeck_api::{CardContent, CardType};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn card(user: UserId, ease: f64, interval: u32) -> Card {
        let content = CardContent {
            card_type: CardType::Sentence,
            target_text: "kick the bucket".into(),
            target_meaning: "die".into(),
            context_sentence: String::new(),
            context_translation: String::new(),
            cloze_sentence: String::new(),
        };
        let mut card = Card::new(user, content, t0(), 2.5);
        card.schedule.ease_factor = ease;
        card.schedule.interval = interval;
        card.schedule.next_review = t0() + Duration::days(i64::from(interval));
        card
    }

    #[test]
    fn limit_clamped() {
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(150), 100);
        assert_eq!(clamp_limit(42), 42);
    }

    #[test]
    fn strategy_tokens() {
        assert_eq!(StudyStrategy::parse("hardest", &[]).unwrap(), StudyStrategy::Hardest);
        assert_eq!(StudyStrategy::parse("random", &[TagId::new()]).unwrap(), StudyStrategy::Random);
        assert!(matches!(
            StudyStrategy::parse("tag", &[]),
            Err(FlashdeckError::ValidationError(_))
        ));
        assert!(matches!(
            StudyStrategy::parse("newest", &[]),
            Err(FlashdeckError::ValidationError(_))
        ));

        let tag = TagId::new();
        let parsed = StudyStrategy::parse("tag", &[tag, tag]).unwrap();
        assert_eq!(parsed, StudyStrategy::Tag(TagFilter::new([tag]).unwrap()));
    }

    #[test]
    fn hardest_orders_by_ease_then_interval() {
        let user = UserId::new();
        let cards = vec![
            card(user, 2.5, 1),
            card(user, 1.3, 10),
            card(user, 1.3, 2),
            card(user, 2.0, 40),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let picked = StudySessionSelector::select(&cards, user, &StudyStrategy::Hardest, 3, &mut rng);
        let ids: Vec<_> = picked.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![cards[2].id, cards[1].id, cards[3].id]);
    }

    #[test]
    fn random_sample_is_distinct_and_seed_reproducible() {
        let user = UserId::new();
        let cards: Vec<_> = (0..20).map(|i| card(user, 2.5, i)).collect();

        let pick = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            StudySessionSelector::select(&cards, user, &StudyStrategy::Random, 5, &mut rng)
                .into_iter()
                .map(|c| c.id)
                .collect::<Vec<_>>()
        };

        let first = pick(7);
        assert_eq!(first.len(), 5);
        assert_eq!(first.iter().collect::<HashSet<_>>().len(), 5);
        assert_eq!(first, pick(7));

        // Fewer cards than requested: everything, once
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let all = StudySessionSelector::select(&cards[..4], user, &StudyStrategy::Random, 50, &mut rng);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn tag_matches_any_and_orders_by_next_review() {
        let user = UserId::new();
        let (a, b, c) = (TagId::new(), TagId::new(), TagId::new());

        let mut late = card(user, 2.5, 9);
        late.tag_ids = vec![a];
        let mut soon = card(user, 2.5, 1);
        soon.tag_ids = vec![b, c];
        let mut other_tag_only = card(user, 2.5, 0);
        other_tag_only.tag_ids = vec![c];
        let cards = vec![late.clone(), soon.clone(), other_tag_only];

        let filter = TagFilter::new([a, b]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let picked =
            StudySessionSelector::select(&cards, user, &StudyStrategy::Tag(filter), 10, &mut rng);

        let ids: Vec<_> = picked.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![soon.id, late.id]);
    }

    #[test]
    fn selection_leaves_cards_untouched() {
        let user = UserId::new();
        let cards: Vec<_> = (0..10).map(|i| card(user, 1.3 + f64::from(i) / 10.0, i)).collect();
        let before = cards.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        for strategy in [StudyStrategy::Hardest, StudyStrategy::Random] {
            let picked = StudySessionSelector::select(&cards, user, &strategy, 100, &mut rng);
            for p in &picked {
                let original = before.iter().find(|c| c.id == p.id).unwrap();
                assert_eq!(p, original);
            }
        }
        assert_eq!(cards, before);
    }
}
