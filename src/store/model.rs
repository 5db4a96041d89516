//! Persistent domain entities: providers, endorsements, request records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::MessageType;

/// A tag value: a single string or a list of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    One(String),
    Many(Vec<String>),
}

impl TagValue {
    /// Iterate the contained strings.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        match self {
            Self::One(v) => std::slice::from_ref(v).iter().map(String::as_str),
            Self::Many(vs) => vs.as_slice().iter().map(String::as_str),
        }
    }

    /// Number of contained strings.
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(vs) => vs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A known service provider. Owned by the store; the matcher only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    /// Canonical "+27…" form when known.
    pub phone: Option<String>,
    pub category: Option<String>,
    /// category → string-or-list tags, e.g. "area" → ["cape town"].
    #[serde(default)]
    pub tags: BTreeMap<String, TagValue>,
    pub endorsement_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Provider {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            phone: None,
            category: None,
            tags: BTreeMap::new(),
            endorsement_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_tag(mut self, category: &str, value: TagValue) -> Self {
        self.tags.insert(category.to_string(), value);
        self
    }
}

/// Endorsement lifecycle. The pipeline only ever creates `Active` records;
/// revocation is an external operation on the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndorsementStatus {
    Active,
    Revoked,
}

impl EndorsementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "revoked" => Self::Revoked,
            _ => Self::Active,
        }
    }
}

/// One endorsement of a provider, derived from one message. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endorsement {
    pub id: Uuid,
    pub provider_id: String,
    pub group_id: String,
    /// Sender of the endorsing message.
    pub endorser: String,
    /// Message context the endorsement was derived from.
    pub message_text: String,
    /// Blended match/classification confidence, in [0, 1].
    pub confidence: f64,
    /// Label of the match strategy that resolved the provider.
    pub match_type: String,
    /// Request this endorsement answers, when attribution found one.
    pub request_message_id: Option<String>,
    pub attribution_confidence: f64,
    pub status: EndorsementStatus,
    pub created_at: DateTime<Utc>,
}

impl Endorsement {
    pub fn new(
        provider_id: &str,
        group_id: &str,
        endorser: &str,
        message_text: &str,
        confidence: f64,
        match_type: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_id: provider_id.to_string(),
            group_id: group_id.to_string(),
            endorser: endorser.to_string(),
            message_text: message_text.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            match_type: match_type.to_string(),
            request_message_id: None,
            attribution_confidence: 0.0,
            status: EndorsementStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn with_attribution(mut self, request_message_id: Option<String>, confidence: f64) -> Self {
        self.request_message_id = request_message_id;
        self.attribution_confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

/// A request message remembered for later attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub message_id: String,
    pub group_id: String,
    pub sender: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub message_type: MessageType,
}
