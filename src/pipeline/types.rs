//! Inbound message shape and the processing report handed back to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::ContactCard;
use crate::store::model::Endorsement;

/// A message received from a group chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMessage {
    /// Platform message id, unique within the group.
    pub id: String,
    pub group_id: String,
    /// Sender identity as the platform reports it.
    pub sender: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Id of the message this one replies to, when the platform exposes it.
    #[serde(default)]
    pub quoted_message_id: Option<String>,
    /// Shared contact card, when the message carries one.
    #[serde(default)]
    pub contact: Option<ContactCard>,
}

/// Outcome of processing a single message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub success: bool,
    pub endorsements_created: Vec<Endorsement>,
    /// Human-readable trail of what the pipeline did and skipped.
    pub notes: Vec<String>,
    pub duration_seconds: f64,
}

impl ProcessingReport {
    pub fn empty_with_note(note: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            success: true,
            endorsements_created: Vec::new(),
            notes: vec![note.into()],
            duration_seconds,
        }
    }
}
