//! Shared data model for flashdeck

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use flashdeck_util::{format_interval, CardId, TagId, UserId};

/// Maximum length of the short content fields (target text and meaning)
pub const MAX_TARGET_LEN: usize = 500;

/// Maximum length of the sentence-sized content fields
pub const MAX_SENTENCE_LEN: usize = 1000;

/// Maximum length of a tag name
pub const MAX_TAG_NAME_LEN: usize = 100;

/// Kind of card content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Phrase,
    Sentence,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Phrase => "phrase",
            CardType::Sentence => "sentence",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "phrase" => Some(CardType::Phrase),
            "sentence" => Some(CardType::Sentence),
            _ => None,
        }
    }
}

/// Learner-facing content of a card. Never read by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardContent {
    pub card_type: CardType,
    pub target_text: String,
    pub target_meaning: String,
    #[serde(default)]
    pub context_sentence: String,
    #[serde(default)]
    pub context_translation: String,
    #[serde(default)]
    pub cloze_sentence: String,
}

impl CardContent {
    /// Check content limits, returning a description of every violation
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.target_text.trim().is_empty() {
            problems.push("target_text cannot be empty".to_string());
        }

        let limits = [
            ("target_text", &self.target_text, MAX_TARGET_LEN),
            ("target_meaning", &self.target_meaning, MAX_TARGET_LEN),
            ("context_sentence", &self.context_sentence, MAX_SENTENCE_LEN),
            ("context_translation", &self.context_translation, MAX_SENTENCE_LEN),
            ("cloze_sentence", &self.cloze_sentence, MAX_SENTENCE_LEN),
        ];
        for (field, value, max) in limits {
            let len = value.chars().count();
            if len > max {
                problems.push(format!("{field} is {len} characters (max {max})"));
            }
        }

        problems
    }
}

/// Per-card scheduling record.
///
/// Invariants: `interval == 0` only for never-reviewed or just-failed cards,
/// and `ease_factor` never drops below the configured floor. Only the review
/// path produces new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleState {
    /// Days until the next scheduled review
    pub interval: u32,
    /// Difficulty multiplier; lower means historically harder
    pub ease_factor: f64,
    pub next_review: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleState {
    /// State of a brand-new card: immediately due
    pub fn new(now: DateTime<Utc>, initial_ease: f64) -> Self {
        Self {
            interval: 0,
            ease_factor: initial_ease,
            next_review: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review <= now
    }
}

/// A flashcard owned by a single user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub user_id: UserId,
    pub content: CardContent,
    /// Attached tags, sorted
    pub tag_ids: Vec<TagId>,
    pub schedule: ScheduleState,
    /// Incremented on every committed review; guards compare-and-swap
    pub version: u64,
}

impl Card {
    pub fn new(user_id: UserId, content: CardContent, now: DateTime<Utc>, initial_ease: f64) -> Self {
        Self {
            id: CardId::new(),
            user_id,
            content,
            tag_ids: Vec::new(),
            schedule: ScheduleState::new(now, initial_ease),
            version: 0,
        }
    }

    pub fn has_any_tag(&self, tags: &[TagId]) -> bool {
        self.tag_ids.iter().any(|t| tags.contains(t))
    }
}

/// User-scoped label used as a study filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub user_id: UserId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    pub fn new(user_id: UserId, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: TagId::new(),
            user_id,
            name: name.into(),
            created_at: now,
        }
    }
}

/// Card as presented to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardView {
    pub card_id: CardId,
    pub card_type: CardType,
    pub target_text: String,
    pub target_meaning: String,
    pub context_sentence: String,
    pub context_translation: String,
    pub cloze_sentence: String,
    pub tag_ids: Vec<TagId>,
    pub interval: u32,
    /// e.g. "3d"
    pub interval_display: String,
    pub ease_factor: f64,
    pub next_review: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Card> for CardView {
    fn from(card: &Card) -> Self {
        Self {
            card_id: card.id,
            card_type: card.content.card_type,
            target_text: card.content.target_text.clone(),
            target_meaning: card.content.target_meaning.clone(),
            context_sentence: card.content.context_sentence.clone(),
            context_translation: card.content.context_translation.clone(),
            cloze_sentence: card.content.cloze_sentence.clone(),
            tag_ids: card.tag_ids.clone(),
            interval: card.schedule.interval,
            interval_display: format_interval(card.schedule.interval),
            ease_factor: card.schedule.ease_factor,
            next_review: card.schedule.next_review,
            created_at: card.schedule.created_at,
            updated_at: card.schedule.updated_at,
        }
    }
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn content(text: &str) -> CardContent {
        CardContent {
            card_type: CardType::Phrase,
            target_text: text.into(),
            target_meaning: "meaning".into(),
            context_sentence: String::new(),
            context_translation: String::new(),
            cloze_sentence: String::new(),
        }
    }

    #[test]
    fn new_card_is_immediately_due() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let card = Card::new(UserId::new(), content("spill the beans"), now, 2.5);

        assert_eq!(card.schedule.interval, 0);
        assert_eq!(card.schedule.ease_factor, 2.5);
        assert!(card.schedule.is_due(now));
        assert_eq!(card.version, 0);
    }

    #[test]
    fn content_problems_reported() {
        assert!(content("bite the bullet").problems().is_empty());

        let blank = content("   ");
        assert_eq!(blank.problems(), vec!["target_text cannot be empty".to_string()]);

        let long = content(&"x".repeat(MAX_TARGET_LEN + 1));
        assert_eq!(long.problems().len(), 1);
        assert!(long.problems()[0].contains("max 500"));
    }

    #[test]
    fn card_type_tokens() {
        assert_eq!(CardType::parse("sentence"), Some(CardType::Sentence));
        assert_eq!(CardType::parse("word"), None);
        assert_eq!(CardType::Phrase.as_str(), "phrase");
        assert_eq!(serde_json::to_string(&CardType::Phrase).unwrap(), "\"phrase\"");
    }

    #[test]
    fn view_shows_interval_in_days() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let mut card = Card::new(UserId::new(), content("on the same page"), now, 2.5);
        card.schedule.interval = 3;

        let view = CardView::from(&card);
        assert_eq!(view.interval_display, "3d");
        assert_eq!(view.card_id, card.id);
    }

    #[test]
    fn content_defaults_optional_sentences() {
        let json = r#"{"card_type":"phrase","target_text":"once in a blue moon","target_meaning":"rarely"}"#;
        let parsed: CardContent = serde_json::from_str(json).unwrap();
        assert!(parsed.cloze_sentence.is_empty());
    }
}
