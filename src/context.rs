//! Context attribution — linking a recommendation to an earlier request.
//!
//! Attribution is advisory: it scores how likely a message answers a prior
//! request in the same group, and it must never abort the pipeline. Any
//! internal failure degrades to a zero-confidence fallback result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classify::MessageType;
use crate::config::AttributionConfig;
use crate::pipeline::types::GroupMessage;
use crate::store::model::RequestRecord;

/// How the attribution was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionType {
    DirectQuote,
    TemporalProximity,
    PotentialResponse,
    Standalone,
    ErrorFallback,
}

impl AttributionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectQuote => "direct_quote",
            Self::TemporalProximity => "temporal_proximity",
            Self::PotentialResponse => "potential_response",
            Self::Standalone => "standalone",
            Self::ErrorFallback => "error_fallback",
        }
    }
}

/// Bucketed response delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalPattern {
    Immediate,
    NearTerm,
    Distant,
    None,
}

/// Correlation between a message and a prior request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionResult {
    /// In [0, 1].
    pub confidence: f64,
    pub request_message_id: Option<String>,
    pub response_delay_seconds: Option<u64>,
    pub attribution_type: AttributionType,
    pub temporal_pattern: TemporalPattern,
}

impl AttributionResult {
    /// No prior request found. Always carries no request id.
    pub fn standalone() -> Self {
        Self {
            confidence: 0.0,
            request_message_id: None,
            response_delay_seconds: None,
            attribution_type: AttributionType::Standalone,
            temporal_pattern: TemporalPattern::None,
        }
    }

    /// Degraded result after an internal attribution failure.
    pub fn error_fallback() -> Self {
        Self {
            attribution_type: AttributionType::ErrorFallback,
            ..Self::standalone()
        }
    }
}

/// Confidence assigned to an explicit quote of an earlier message.
const DIRECT_QUOTE_CONFIDENCE: f64 = 0.95;

/// Base scores by delay bucket.
const IMMEDIATE_BASE: f64 = 0.6;
const NEAR_TERM_BASE: f64 = 0.4;
const DISTANT_BASE: f64 = 0.05;

/// Temporal/contextual request-response correlator.
pub struct ContextAttributor {
    config: AttributionConfig,
}

impl ContextAttributor {
    pub fn new(config: &AttributionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Score the correlation between `message` and the supplied window of
    /// recent requests. Infallible: internal failures degrade to a
    /// zero-confidence fallback.
    pub fn analyze(&self, message: &GroupMessage, recent_requests: &[RequestRecord]) -> AttributionResult {
        match self.try_analyze(message, recent_requests) {
            Ok(result) => result,
            Err(reason) => {
                warn!(id = %message.id, reason, "Attribution failed, using fallback");
                AttributionResult::error_fallback()
            }
        }
    }

    fn try_analyze(
        &self,
        message: &GroupMessage,
        recent_requests: &[RequestRecord],
    ) -> Result<AttributionResult, &'static str> {
        // Direct quote: the strongest signal there is.
        if let Some(quoted) = message.quoted_message_id.as_deref() {
            debug!(id = %message.id, quoted, "Direct quote attribution");
            return Ok(AttributionResult {
                confidence: DIRECT_QUOTE_CONFIDENCE,
                request_message_id: Some(quoted.to_string()),
                response_delay_seconds: None,
                attribution_type: AttributionType::DirectQuote,
                temporal_pattern: TemporalPattern::Immediate,
            });
        }

        let Some((candidate, delta)) = self.closest_candidate(message.timestamp, recent_requests)
        else {
            return Ok(AttributionResult::standalone());
        };

        let base = if delta <= self.config.immediate_secs {
            IMMEDIATE_BASE
        } else if delta <= self.config.near_term_secs {
            NEAR_TERM_BASE
        } else {
            DISTANT_BASE
        };

        let decay = if delta <= self.config.near_term_secs {
            1.0
        } else if delta <= self.config.max_window_secs {
            0.5
        } else {
            0.1
        };

        let mut bonus = self.config.content_bonus;
        if candidate.message_type == MessageType::Request {
            bonus += self.config.relevance_bonus;
        }
        if candidate.sender != message.sender {
            bonus += self.config.cross_sender_bonus;
        }

        let confidence = (base + bonus * decay).clamp(0.0, 1.0);
        let attribution_type = if delta <= self.config.near_term_secs {
            AttributionType::TemporalProximity
        } else {
            AttributionType::PotentialResponse
        };

        Ok(AttributionResult {
            confidence,
            request_message_id: Some(candidate.message_id.clone()),
            response_delay_seconds: Some(delta),
            attribution_type,
            temporal_pattern: self.pattern_for(delta),
        })
    }

    /// Candidate with the smallest non-negative delta within the ceiling.
    fn closest_candidate<'a>(
        &self,
        at: DateTime<Utc>,
        recent_requests: &'a [RequestRecord],
    ) -> Option<(&'a RequestRecord, u64)> {
        recent_requests
            .iter()
            .filter_map(|r| {
                let delta = at.signed_duration_since(r.timestamp).num_seconds();
                if delta < 0 {
                    return None;
                }
                let delta = delta as u64;
                (delta <= self.config.max_window_secs).then_some((r, delta))
            })
            .min_by_key(|(_, delta)| *delta)
    }

    fn pattern_for(&self, delta: u64) -> TemporalPattern {
        if delta <= self.config.immediate_secs {
            TemporalPattern::Immediate
        } else if delta <= self.config.near_term_secs {
            TemporalPattern::NearTerm
        } else if delta <= self.config.max_window_secs {
            TemporalPattern::Distant
        } else {
            TemporalPattern::None
        }
    }
}
