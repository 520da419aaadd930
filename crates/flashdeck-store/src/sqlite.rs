//! SQLite-based store implementation

use chrono::{DateTime, SecondsFormat, Utc};
use flashdeck_api::{Card, CardContent, CardType, ScheduleState, Tag};
use flashdeck_util::{CardId, TagId, UserId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{AuditEvent, Store, StoreError, StoreResult};

const CARD_COLUMNS: &str = "id, user_id, card_type, target_text, target_meaning, \
     context_sentence, context_translation, cloze_sentence, \
     interval_days, ease_factor, next_review, created_at, updated_at, version";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!(path = %path.display(), "Store opened");
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS cards (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                card_type TEXT NOT NULL,
                target_text TEXT NOT NULL,
                target_meaning TEXT NOT NULL,
                context_sentence TEXT NOT NULL DEFAULT '',
                context_translation TEXT NOT NULL DEFAULT '',
                cloze_sentence TEXT NOT NULL DEFAULT '',
                interval_days INTEGER NOT NULL DEFAULT 0,
                ease_factor REAL NOT NULL,
                next_review TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS tags (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (user_id, name)
            );

            CREATE TABLE IF NOT EXISTS card_tags (
                card_id TEXT NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
                tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (card_id, tag_id)
            );

            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_cards_user_next_review ON cards(user_id, next_review);
            CREATE INDEX IF NOT EXISTS idx_card_tags_tag ON card_tags(tag_id);
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

/// Fixed-width UTC text so lexical order equals time order
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("bad timestamp '{s}': {e}")))
}

fn parse_id<T>(s: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    s.parse()
        .map_err(|e| StoreError::Serialization(format!("bad id '{s}': {e}")))
}

/// Raw column values of a `cards` row
struct CardRow {
    id: String,
    user_id: String,
    card_type: String,
    target_text: String,
    target_meaning: String,
    context_sentence: String,
    context_translation: String,
    cloze_sentence: String,
    interval_days: i64,
    ease_factor: f64,
    next_review: String,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl CardRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            card_type: row.get(2)?,
            target_text: row.get(3)?,
            target_meaning: row.get(4)?,
            context_sentence: row.get(5)?,
            context_translation: row.get(6)?,
            cloze_sentence: row.get(7)?,
            interval_days: row.get(8)?,
            ease_factor: row.get(9)?,
            next_review: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
            version: row.get(13)?,
        })
    }

    fn into_card(self, mut tag_ids: Vec<TagId>) -> StoreResult<Card> {
        let card_type = CardType::parse(&self.card_type).ok_or_else(|| {
            StoreError::Serialization(format!("unknown card type '{}'", self.card_type))
        })?;
        let interval = u32::try_from(self.interval_days).map_err(|_| {
            StoreError::Serialization(format!("interval out of range: {}", self.interval_days))
        })?;
        tag_ids.sort();

        Ok(Card {
            id: parse_id(&self.id)?,
            user_id: parse_id(&self.user_id)?,
            content: CardContent {
                card_type,
                target_text: self.target_text,
                target_meaning: self.target_meaning,
                context_sentence: self.context_sentence,
                context_translation: self.context_translation,
                cloze_sentence: self.cloze_sentence,
            },
            tag_ids,
            schedule: ScheduleState {
                interval,
                ease_factor: self.ease_factor,
                next_review: parse_ts(&self.next_review)?,
                created_at: parse_ts(&self.created_at)?,
                updated_at: parse_ts(&self.updated_at)?,
            },
            version: self.version.max(0) as u64,
        })
    }
}

struct TagRow {
    id: String,
    user_id: String,
    name: String,
    created_at: String,
}

impl TagRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn into_tag(self) -> StoreResult<Tag> {
        Ok(Tag {
            id: parse_id(&self.id)?,
            user_id: parse_id(&self.user_id)?,
            name: self.name,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

impl Store for SqliteStore {
    fn insert_card(&self, card: &Card) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let s = &card.schedule;
        let c = &card.content;

        tx.execute(
            &format!(
                "INSERT INTO cards ({CARD_COLUMNS}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                card.id.to_string(),
                card.user_id.to_string(),
                c.card_type.as_str(),
                c.target_text,
                c.target_meaning,
                c.context_sentence,
                c.context_translation,
                c.cloze_sentence,
                i64::from(s.interval),
                s.ease_factor,
                format_ts(&s.next_review),
                format_ts(&s.created_at),
                format_ts(&s.updated_at),
                card.version as i64,
            ],
        )?;

        // Only link tags the card's owner actually has
        for tag_id in &card.tag_ids {
            tx.execute(
                "INSERT OR IGNORE INTO card_tags (card_id, tag_id) \
                 SELECT ?1, id FROM tags WHERE id = ?2 AND user_id = ?3",
                params![card.id.to_string(), tag_id.to_string(), card.user_id.to_string()],
            )?;
        }

        tx.commit()?;
        debug!(card_id = %card.id, tags = card.tag_ids.len(), "Card inserted");
        Ok(())
    }

    fn get_card(&self, user_id: UserId, card_id: CardId) -> StoreResult<Option<Card>> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                &format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ? AND user_id = ?"),
                params![card_id.to_string(), user_id.to_string()],
                CardRow::from_row,
            )
            .optional()?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut stmt = conn.prepare("SELECT tag_id FROM card_tags WHERE card_id = ?")?;
        let tag_ids = stmt
            .query_map([card_id.to_string()], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?
            .iter()
            .map(|s| parse_id(s))
            .collect::<StoreResult<Vec<TagId>>>()?;

        row.into_card(tag_ids).map(Some)
    }

    fn list_cards(&self, user_id: UserId) -> StoreResult<Vec<Card>> {
        let conn = self.lock()?;
        let user = user_id.to_string();

        let mut links: HashMap<String, Vec<TagId>> = HashMap::new();
        let mut stmt = conn.prepare(
            "SELECT ct.card_id, ct.tag_id FROM card_tags ct \
             JOIN cards c ON c.id = ct.card_id WHERE c.user_id = ?",
        )?;
        let rows = stmt.query_map([&user], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (card_id, tag_id) = row?;
            links.entry(card_id).or_default().push(parse_id(&tag_id)?);
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE user_id = ? ORDER BY created_at, id"
        ))?;
        let rows = stmt
            .query_map([&user], CardRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let cards = rows
            .into_iter()
            .map(|row| {
                let tag_ids = links.remove(&row.id).unwrap_or_default();
                row.into_card(tag_ids)
            })
            .collect::<StoreResult<Vec<_>>>()?;

        debug!(user_id = %user_id, count = cards.len(), "Cards listed");
        Ok(cards)
    }

    fn compare_and_swap_schedule(
        &self,
        user_id: UserId,
        card_id: CardId,
        expected_version: u64,
        schedule: &ScheduleState,
    ) -> StoreResult<bool> {
        let conn = self.lock()?;

        let changed = conn.execute(
            r#"
            UPDATE cards
            SET interval_days = ?, ease_factor = ?, next_review = ?, updated_at = ?,
                version = version + 1
            WHERE id = ? AND user_id = ? AND version = ?
            "#,
            params![
                i64::from(schedule.interval),
                schedule.ease_factor,
                format_ts(&schedule.next_review),
                format_ts(&schedule.updated_at),
                card_id.to_string(),
                user_id.to_string(),
                expected_version as i64,
            ],
        )?;

        let swapped = changed == 1;
        debug!(card_id = %card_id, expected_version, swapped, "Schedule compare-and-swap");
        Ok(swapped)
    }

    fn delete_card(&self, user_id: UserId, card_id: CardId) -> StoreResult<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM cards WHERE id = ? AND user_id = ?",
            params![card_id.to_string(), user_id.to_string()],
        )?;
        debug!(card_id = %card_id, deleted, "Card delete");
        Ok(deleted > 0)
    }

    fn insert_tag(&self, tag: &Tag) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tags (id, user_id, name, created_at) VALUES (?, ?, ?, ?)",
            params![
                tag.id.to_string(),
                tag.user_id.to_string(),
                tag.name,
                format_ts(&tag.created_at),
            ],
        )?;
        debug!(tag_id = %tag.id, name = %tag.name, "Tag inserted");
        Ok(())
    }

    fn get_tag_by_name(&self, user_id: UserId, name: &str) -> StoreResult<Option<Tag>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, user_id, name, created_at FROM tags WHERE user_id = ? AND name = ?",
            params![user_id.to_string(), name],
            TagRow::from_row,
        )
        .optional()?
        .map(TagRow::into_tag)
        .transpose()
    }

    fn get_tags_by_ids(&self, user_id: UserId, tag_ids: &[TagId]) -> StoreResult<Vec<Tag>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, user_id, name, created_at FROM tags WHERE id = ? AND user_id = ?")?;

        let mut tags = Vec::with_capacity(tag_ids.len());
        for tag_id in tag_ids {
            let row = stmt
                .query_row(
                    params![tag_id.to_string(), user_id.to_string()],
                    TagRow::from_row,
                )
                .optional()?;
            if let Some(row) = row {
                tags.push(row.into_tag()?);
            }
        }
        Ok(tags)
    }

    fn list_tags(&self, user_id: UserId) -> StoreResult<Vec<Tag>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, created_at FROM tags WHERE user_id = ? ORDER BY name, id",
        )?;
        let rows = stmt
            .query_map([user_id.to_string()], TagRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(TagRow::into_tag).collect()
    }

    fn delete_tag(&self, user_id: UserId, tag_id: TagId) -> StoreResult<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM tags WHERE id = ? AND user_id = ?",
            params![tag_id.to_string(), user_id.to_string()],
        )?;
        debug!(tag_id = %tag_id, deleted, "Tag delete");
        Ok(deleted > 0)
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.lock()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![format_ts(&event.timestamp), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            events.push(AuditEvent {
                id,
                timestamp: parse_ts(&timestamp_str)?,
                event: serde_json::from_str(&event_json)?,
            });
        }

        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuditEventType;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn phrase(text: &str) -> CardContent {
        CardContent {
            card_type: CardType::Phrase,
            target_text: text.into(),
            target_meaning: "meaning".into(),
            context_sentence: "context".into(),
            context_translation: String::new(),
            cloze_sentence: String::new(),
        }
    }

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
    }

    #[test]
    fn card_roundtrip_is_owner_scoped() {
        let store = SqliteStore::in_memory().unwrap();
        let owner = UserId::new();
        let card = Card::new(owner, phrase("break the ice"), t0(), 2.5);
        store.insert_card(&card).unwrap();

        let loaded = store.get_card(owner, card.id).unwrap().unwrap();
        assert_eq!(loaded, card);

        assert!(store.get_card(UserId::new(), card.id).unwrap().is_none());
        assert!(store.list_cards(UserId::new()).unwrap().is_empty());
        assert_eq!(store.list_cards(owner).unwrap().len(), 1);
    }

    #[test]
    fn compare_and_swap_checks_version() {
        let store = SqliteStore::in_memory().unwrap();
        let owner = UserId::new();
        let card = Card::new(owner, phrase("hit the sack"), t0(), 2.5);
        store.insert_card(&card).unwrap();

        let mut next = card.schedule.clone();
        next.interval = 1;
        next.ease_factor = 2.55;
        next.next_review = t0() + Duration::days(1);

        assert!(store.compare_and_swap_schedule(owner, card.id, 0, &next).unwrap());
        // Same expected version again loses
        assert!(!store.compare_and_swap_schedule(owner, card.id, 0, &next).unwrap());
        // Foreign user never matches
        assert!(!store.compare_and_swap_schedule(UserId::new(), card.id, 1, &next).unwrap());

        let loaded = store.get_card(owner, card.id).unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.schedule, next);
    }

    #[test]
    fn tags_linked_sorted_and_detached() {
        let store = SqliteStore::in_memory().unwrap();
        let owner = UserId::new();
        let verbs = Tag::new(owner, "verbs", t0());
        let idioms = Tag::new(owner, "idioms", t0());
        let foreign = Tag::new(UserId::new(), "theirs", t0());
        for tag in [&verbs, &idioms, &foreign] {
            store.insert_tag(tag).unwrap();
        }

        let mut card = Card::new(owner, phrase("call it a day"), t0(), 2.5);
        card.tag_ids = vec![verbs.id, idioms.id, foreign.id];
        store.insert_card(&card).unwrap();

        let loaded = store.get_card(owner, card.id).unwrap().unwrap();
        let mut expected = vec![verbs.id, idioms.id];
        expected.sort();
        assert_eq!(loaded.tag_ids, expected);

        let names: Vec<_> = store
            .list_tags(owner)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["idioms", "verbs"]);

        assert_eq!(
            store.get_tags_by_ids(owner, &[verbs.id, foreign.id]).unwrap(),
            vec![verbs.clone()]
        );
        assert_eq!(store.get_tag_by_name(owner, "verbs").unwrap(), Some(verbs.clone()));

        assert!(store.delete_tag(owner, verbs.id).unwrap());
        assert!(!store.delete_tag(owner, foreign.id).unwrap());
        let loaded = store.get_card(owner, card.id).unwrap().unwrap();
        assert_eq!(loaded.tag_ids, vec![idioms.id]);
    }

    #[test]
    fn duplicate_tag_name_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        let owner = UserId::new();
        store.insert_tag(&Tag::new(owner, "verbs", t0())).unwrap();
        assert!(matches!(
            store.insert_tag(&Tag::new(owner, "verbs", t0())),
            Err(StoreError::Database(_))
        ));
        // Names are per user
        store.insert_tag(&Tag::new(UserId::new(), "verbs", t0())).unwrap();
    }

    #[test]
    fn delete_card_cascades_links() {
        let store = SqliteStore::in_memory().unwrap();
        let owner = UserId::new();
        let tag = Tag::new(owner, "travel", t0());
        store.insert_tag(&tag).unwrap();
        let mut card = Card::new(owner, phrase("hit the road"), t0(), 2.5);
        card.tag_ids = vec![tag.id];
        store.insert_card(&card).unwrap();

        assert!(!store.delete_card(UserId::new(), card.id).unwrap());
        assert!(store.delete_card(owner, card.id).unwrap());
        assert!(store.get_card(owner, card.id).unwrap().is_none());

        // Tag outlives the card
        assert_eq!(store.list_tags(owner).unwrap().len(), 1);
        let conn = store.lock().unwrap();
        let links: i64 = conn
            .query_row("SELECT COUNT(*) FROM card_tags", [], |r| r.get(0))
            .unwrap();
        assert_eq!(links, 0);
    }

    #[test]
    fn test_audit_log() {
        let store = SqliteStore::in_memory().unwrap();

        store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))
            .unwrap();
        store
            .append_audit(AuditEvent::at(
                t0(),
                AuditEventType::CardReviewed {
                    card_id: CardId::new(),
                    user_id: UserId::new(),
                    rating: "easy".into(),
                    interval_before: 1,
                    interval_after: 3,
                },
            ))
            .unwrap();

        let events = store.get_recent_audits(10).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0].event,
            AuditEventType::CardReviewed { interval_after: 3, .. }
        ));
        assert_eq!(events[0].timestamp, t0());
        assert!(matches!(events[1].event, AuditEventType::ServiceStarted));
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("flashdeck.db");
        let owner = UserId::new();
        let card = Card::new(owner, phrase("under the weather"), t0(), 2.5);

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_card(&card).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_card(owner, card.id).unwrap(), Some(card));
    }
}
