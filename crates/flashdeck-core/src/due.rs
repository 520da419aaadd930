//! Due-card selection

use chrono::{DateTime, Utc};
use flashdeck_api::Card;
use flashdeck_util::UserId;

/// Picks the cards a user should review now
pub struct DueSelector;

impl DueSelector {
    /// Cards owned by `user_id` with `next_review <= now`, most overdue first.
    ///
    /// Ties on `next_review` are broken by card id, so the order is total and
    /// repeated calls over the same cards yield the same sequence.
    pub fn due<'a>(
        cards: &'a [Card],
        user_id: UserId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> impl Iterator<Item = &'a Card> + 'a {
        let mut due: Vec<&Card> = cards
            .iter()
            .filter(|c| c.user_id == user_id && c.schedule.is_due(now))
            .collect();
        due.sort_by_key(|c| (c.schedule.next_review, c.id));
        due.into_iter().take(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use flashdeck_api::{CardContent, CardType};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn card(user: UserId, next_review: DateTime<Utc>) -> Card {
        let content = CardContent {
            card_type: CardType::Phrase,
            target_text: "a piece of cake".into(),
            target_meaning: "easy".into(),
            context_sentence: String::new(),
            context_translation: String::new(),
            cloze_sentence: String::new(),
        };
        let mut card = Card::new(user, content, t0() - Duration::days(30), 2.5);
        card.schedule.next_review = next_review;
        card
    }

    #[test]
    fn most_overdue_first_and_future_excluded() {
        let user = UserId::new();
        let cards = vec![
            card(user, t0() - Duration::days(1)),
            card(user, t0() + Duration::hours(1)),
            card(user, t0() - Duration::days(5)),
            card(user, t0()),
        ];

        let due: Vec<_> = DueSelector::due(&cards, user, t0(), 10).collect();
        assert_eq!(due.len(), 3);
        assert_eq!(due[0].id, cards[2].id);
        assert_eq!(due[1].id, cards[0].id);
        assert_eq!(due[2].id, cards[3].id);
        assert!(due.iter().all(|c| c.schedule.next_review <= t0()));
    }

    #[test]
    fn ties_broken_by_id_and_limit_applied() {
        let user = UserId::new();
        let cards: Vec<_> = (0..5).map(|_| card(user, t0())).collect();
        let mut ids: Vec<_> = cards.iter().map(|c| c.id).collect();
        ids.sort();

        let first: Vec<_> = DueSelector::due(&cards, user, t0(), 3).map(|c| c.id).collect();
        assert_eq!(first, ids[..3]);

        // Restartable: no hidden cursor
        let again: Vec<_> = DueSelector::due(&cards, user, t0(), 3).map(|c| c.id).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn other_users_cards_ignored() {
        let user = UserId::new();
        let cards = vec![card(UserId::new(), t0() - Duration::days(1))];
        assert_eq!(DueSelector::due(&cards, user, t0(), 10).count(), 0);
    }
}
