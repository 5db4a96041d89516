//! Message classification — REQUEST / RECOMMENDATION / UNKNOWN.
//!
//! The classifier fans a message out to every enabled rule engine, merges
//! their evidence, and infers intent from which keywords fired. A failing
//! engine is logged and skipped; an empty message is an explicit error —
//! downstream stages must receive a valid classification or a failure,
//! never a silent default.

pub mod engine;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ClassifierConfig;
use crate::error::{ClassificationError, ConfigError};
use engine::{EngineOutput, KeywordRuleEngine, PatternRuleEngine, RuleEngine};

/// Message-level label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Request,
    Recommendation,
    Unknown,
}

impl MessageType {
    /// Short label for logging and persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Recommendation => "recommendation",
            Self::Unknown => "unknown",
        }
    }
}

/// Merged classification for one message. Immutable downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub message_type: MessageType,
    /// In [0, 1]; the max across engines.
    pub confidence: f64,
    /// Union of fired keywords, order-preserving, deduped.
    pub keywords: Vec<String>,
    /// Union of fired rule ids.
    pub rule_matches: Vec<String>,
}

/// Words marking request intent. Matched against the individual words of a
/// fired keyword, so phrase keywords ("anyone know") participate too.
const REQUEST_INTENT_TERMS: &[&str] = &[
    "need", "needs", "looking", "searching", "anyone", "someone", "wanted", "urgently", "help",
    "quote", "quotes", "who",
];

/// Words marking recommendation intent.
const RECOMMENDATION_INTENT_TERMS: &[&str] = &[
    "recommend",
    "recommended",
    "vouch",
    "excellent",
    "reliable",
    "used",
    "great",
    "brilliant",
    "try",
    "contact",
    "call",
    "speak",
];

/// Orchestrates 1..N rule engines into one classification.
pub struct MessageClassifier {
    engines: Vec<Box<dyn RuleEngine>>,
    request_threshold: f64,
    recommendation_threshold: f64,
}

impl MessageClassifier {
    /// Build the classifier. Fails if any rule table is malformed.
    pub fn new(config: &ClassifierConfig) -> Result<Self, ConfigError> {
        let mut engines: Vec<Box<dyn RuleEngine>> = vec![Box::new(KeywordRuleEngine::new(
            &config.request_keywords,
            &config.recommendation_keywords,
        )?)];
        if config.enable_pattern_engine {
            engines.push(Box::new(PatternRuleEngine::new(&[
                &config.request_patterns,
                &config.recommendation_patterns,
            ])?));
        }
        Ok(Self {
            engines,
            request_threshold: config.request_threshold,
            recommendation_threshold: config.recommendation_threshold,
        })
    }

    /// Classify a message. Errors on empty input; never errors otherwise.
    pub fn classify(&self, text: &str) -> Result<ClassificationResult, ClassificationError> {
        if text.trim().is_empty() {
            return Err(ClassificationError::EmptyMessage);
        }
        if self.engines.is_empty() {
            return Err(ClassificationError::NoEngines);
        }

        let mut outputs = Vec::with_capacity(self.engines.len());
        for engine in &self.engines {
            match engine.classify(text) {
                Ok(out) => outputs.push(out),
                // Fire-and-continue: one bad engine must not sink the rest.
                Err(e) => warn!(engine = engine.name(), error = %e, "Rule engine failed"),
            }
        }

        let mut keywords = Vec::new();
        let mut rule_matches = Vec::new();
        let mut confidence: f64 = 0.0;
        for out in &outputs {
            for k in &out.keywords {
                if !keywords.contains(k) {
                    keywords.push(k.clone());
                }
            }
            for r in &out.rule_matches {
                if !rule_matches.contains(r) {
                    rule_matches.push(r.clone());
                }
            }
            confidence = confidence.max(out.confidence);
        }
        let confidence = confidence.clamp(0.0, 1.0);

        let message_type = self.infer_intent(&outputs, confidence);
        debug!(
            message_type = message_type.as_str(),
            confidence,
            keywords = keywords.len(),
            "Message classified"
        );

        Ok(ClassificationResult {
            message_type,
            confidence,
            keywords,
            rule_matches,
        })
    }

    /// Infer intent from the fired keywords.
    ///
    /// Each engine output that contains a request-intent (recommendation-
    /// intent) keyword raises that intent's best confidence to the engine's
    /// confidence. An intent wins iff it clears its threshold AND strictly
    /// exceeds the other; an exact tie falls through to the fallback
    /// (request when the overall confidence clears the request threshold,
    /// else unknown) — see DESIGN.md.
    fn infer_intent(&self, outputs: &[EngineOutput], overall: f64) -> MessageType {
        let mut request_confidence: f64 = 0.0;
        let mut recommendation_confidence: f64 = 0.0;

        for out in outputs {
            let has_request = out
                .keywords
                .iter()
                .any(|k| keyword_in_set(k, REQUEST_INTENT_TERMS));
            let has_recommendation = out
                .keywords
                .iter()
                .any(|k| keyword_in_set(k, RECOMMENDATION_INTENT_TERMS));
            if has_request {
                request_confidence = request_confidence.max(out.confidence);
            }
            if has_recommendation {
                recommendation_confidence = recommendation_confidence.max(out.confidence);
            }
        }

        if recommendation_confidence >= self.recommendation_threshold
            && recommendation_confidence > request_confidence
        {
            MessageType::Recommendation
        } else if request_confidence >= self.request_threshold
            && request_confidence > recommendation_confidence
        {
            MessageType::Request
        } else if overall >= self.request_threshold {
            MessageType::Request
        } else {
            MessageType::Unknown
        }
    }
}

/// A fired keyword belongs to an intent set when any of its words does.
fn keyword_in_set(keyword: &str, set: &[&str]) -> bool {
    keyword
        .split_whitespace()
        .any(|word| set.contains(&word.to_lowercase().as_str()))
}
