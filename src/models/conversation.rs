use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

/// Stored chat history for one phone number. Expires after the configured
/// TTL; the per-turn `ConversationState` snapshot is never stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub phone: String,
    pub messages: Vec<ConversationMessage>,
    pub last_activity: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CollectingInfo,
    AwaitingConfirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Date,
    Time,
    PartySize,
    RiceDecision,
}

/// Whether the customer has settled the rice question. `Declined` covers an
/// explicit "sin arroz"; absence of any decision is `None` at the snapshot
/// level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiceDecision {
    Declined,
    Chosen(String),
}

/// Snapshot of what the conversation has established so far. Derived fresh
/// from the history on every turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    pub date: Option<String>,
    pub time: Option<String>,
    pub party_size: Option<u32>,
    pub rice: Option<RiceDecision>,
    pub rice_servings: Option<u32>,
    pub missing: Vec<Field>,
    pub stage: Stage,
}

impl ConversationState {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}
