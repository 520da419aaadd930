//! Command types for the flashdeck protocol

use serde::{Deserialize, Serialize};
use flashdeck_util::{CardId, ClientId, TagId, UserId};

use crate::{API_VERSION, CardContent, CardView, HealthStatus, Tag};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Calling user, as established by the authentication layer
    pub user_id: UserId,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, user_id: UserId, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            user_id,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed or version-mismatched request
    InvalidRequest,
    /// Unknown rating/strategy token, empty tag filter, bad card content
    ValidationFailed,
    /// Card or tag absent or owned by someone else
    NotFound,
    /// Lost a concurrent-update race after internal retries
    Conflict,
    /// Persistence unavailable
    StorageUnavailable,
    RateLimited,
    InternalError,
}

impl ErrorCode {
    /// Transient failures the client may retry unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::Conflict | ErrorCode::StorageUnavailable | ErrorCode::RateLimited
        )
    }
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Grade a recall attempt and reschedule the card
    Review {
        card_id: CardId,
        /// One of "forgot", "hard", "easy" ("remembered" is accepted for "easy")
        rating: String,
    },

    /// Cards whose next review is at or before now, most overdue first
    Due {
        #[serde(default)]
        limit: Option<u32>,
    },

    /// Non-graded practice selection; never changes schedules
    Study {
        /// One of "hardest", "random", "tag"
        #[serde(default = "default_study_strategy")]
        strategy: String,
        #[serde(default)]
        limit: Option<u32>,
        /// Required (non-empty) for the "tag" strategy
        #[serde(default)]
        tag_ids: Vec<TagId>,
        /// Fixes the "random" strategy order, for reproducible sessions
        #[serde(default)]
        seed: Option<u64>,
    },

    GetCard { card_id: CardId },

    /// Create a card, attaching tags by name (created when missing)
    CreateCard {
        content: CardContent,
        #[serde(default)]
        tags: Vec<String>,
    },

    DeleteCard { card_id: CardId },

    ListTags,

    CreateTag { name: String },

    DeleteTag { tag_id: TagId },

    /// Subscribe to the caller's events (returns immediately, events stream separately)
    SubscribeEvents,

    UnsubscribeEvents,

    GetHealth,

    /// Ping for keepalive
    Ping,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    Card(CardView),
    Cards(Vec<CardView>),
    Tag(Tag),
    Tags(Vec<Tag>),
    Deleted,
    Subscribed { client_id: ClientId },
    Unsubscribed,
    Health(HealthStatus),
    Pong,
}

fn default_study_strategy() -> String {
    "hardest".into()
}

/// Client connection info (set by IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    /// Unix UID of the peer process, if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new() -> Self {
        Self {
            client_id: ClientId::new(),
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self::new()
    }
}
