//! Rule-table configuration.
//!
//! Every table the pipeline scores against lives here as a strongly-typed,
//! serde-loadable mapping. Tables are loaded once, validated up front, and
//! compiled (regexes) at component construction — a malformed table is a
//! `ConfigError` when the component is built, never a runtime `None`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration: one section per pipeline component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub classifier: ClassifierConfig,
    pub extractor: ExtractorConfig,
    pub matcher: MatcherConfig,
    pub attribution: AttributionConfig,
    pub processor: ProcessorConfig,
}

impl RulesConfig {
    /// Load configuration from a JSON file. Missing sections fall back to
    /// the built-in defaults; a present-but-malformed section is an error.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation: non-empty tables, weights in range.
    /// Regex compilation is checked separately when components are built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_weights("classifier.request_keywords", &self.classifier.request_keywords)?;
        validate_weights(
            "classifier.recommendation_keywords",
            &self.classifier.recommendation_keywords,
        )?;
        if self.classifier.request_keywords.is_empty() {
            return Err(ConfigError::EmptyTable("classifier.request_keywords".into()));
        }
        if self.classifier.recommendation_keywords.is_empty() {
            return Err(ConfigError::EmptyTable(
                "classifier.recommendation_keywords".into(),
            ));
        }

        if self.extractor.name_patterns.is_empty() {
            return Err(ConfigError::EmptyTable("extractor.name_patterns".into()));
        }
        for rule in &self.extractor.name_patterns {
            check_weight("extractor.name_patterns", &rule.pattern, rule.weight)?;
        }
        if self.extractor.service_keywords.is_empty() {
            return Err(ConfigError::EmptyTable("extractor.service_keywords".into()));
        }
        for (category, keywords) in &self.extractor.service_keywords {
            validate_weights(&format!("extractor.service_keywords.{category}"), keywords)?;
        }
        if self.extractor.location_patterns.is_empty() {
            return Err(ConfigError::EmptyTable("extractor.location_patterns".into()));
        }
        Ok(())
    }
}

fn validate_weights(table: &str, weights: &BTreeMap<String, f64>) -> Result<(), ConfigError> {
    for (key, weight) in weights {
        check_weight(table, key, *weight)?;
    }
    Ok(())
}

fn check_weight(table: &str, key: &str, weight: f64) -> Result<(), ConfigError> {
    // Keyword weights above 1.0 are allowed (they pre-squash), capped at 1.5.
    if !(0.0..=1.5).contains(&weight) || !weight.is_finite() {
        return Err(ConfigError::InvalidWeight {
            table: table.to_string(),
            key: key.to_string(),
            weight,
        });
    }
    Ok(())
}

// ── Classifier ──────────────────────────────────────────────────────

/// A regex rule with an id and a weight, used by the pattern engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRule {
    pub id: String,
    pub pattern: String,
    pub weight: f64,
}

/// Keyword and pattern tables for the request/recommendation classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Request vocabulary: whole-word keyword → weight.
    pub request_keywords: BTreeMap<String, f64>,
    /// Recommendation vocabulary: whole-word keyword → weight.
    pub recommendation_keywords: BTreeMap<String, f64>,
    /// Regex rules suggesting a request.
    pub request_patterns: Vec<PatternRule>,
    /// Regex rules suggesting a recommendation.
    pub recommendation_patterns: Vec<PatternRule>,
    /// Minimum confidence for the REQUEST label.
    pub request_threshold: f64,
    /// Minimum confidence for the RECOMMENDATION label.
    pub recommendation_threshold: f64,
    /// Toggle the pattern engine (keyword engine is always on).
    pub enable_pattern_engine: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let request_keywords = weights(&[
            ("looking for", 0.8),
            ("anyone know", 0.9),
            ("need", 0.6),
            ("needs", 0.5),
            ("urgently", 0.5),
            ("can someone", 0.7),
            ("help with", 0.5),
            ("searching for", 0.7),
            ("wanted", 0.4),
            ("quote", 0.4),
            ("quotes", 0.4),
        ]);
        let recommendation_keywords = weights(&[
            ("recommend", 1.0),
            ("highly recommend", 0.9),
            ("recommended", 0.8),
            ("vouch", 0.9),
            ("great service", 0.8),
            ("excellent", 0.6),
            ("reliable", 0.6),
            ("used", 0.4),
            ("try", 0.4),
            ("brilliant", 0.5),
            ("contact", 0.3),
            ("call", 0.3),
        ]);
        let request_patterns = vec![
            rule("req_who_can", r"(?i)\bwho\s+can\s+(?:fix|install|repair|help)", 0.9),
            rule("req_any_good", r"(?i)\bany\s+good\b", 0.7),
            rule(
                "req_trade_question",
                r"(?i)\b(?:plumber|electrician|builder|painter|handyman|mechanic)\b[^?]*\?",
                0.6,
            ),
        ];
        let recommendation_patterns = vec![
            rule(
                "rec_did_great_job",
                r"(?i)\bdid\s+(?:a\s+)?(?:great|good|excellent|amazing|fantastic)\s+(?:job|work)\b",
                0.9,
            ),
            rule(
                "rec_number_handoff",
                r"(?i)\b(?:his|her|their)\s+number\s+is\b",
                0.8,
            ),
            rule("rec_we_used", r"(?i)\bwe\s+used?\b", 0.5),
            rule("rec_speak_to", r"(?i)\bspeak\s+to\b", 0.5),
        ];
        Self {
            request_keywords,
            recommendation_keywords,
            request_patterns,
            recommendation_patterns,
            request_threshold: 0.35,
            recommendation_threshold: 0.5,
            enable_pattern_engine: true,
        }
    }
}

// ── Extractor ───────────────────────────────────────────────────────

/// A regex with a per-pattern confidence weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedPattern {
    pub pattern: String,
    pub weight: f64,
}

/// Tables for the four mention-extraction strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Business-name regexes with per-pattern confidence.
    pub name_patterns: Vec<WeightedPattern>,
    /// Scale applied on top of the hard-coded phone pattern confidences.
    pub phone_weight: f64,
    /// category → keyword → weight, matched whole-word.
    pub service_keywords: BTreeMap<String, BTreeMap<String, f64>>,
    /// city → regex list.
    pub location_patterns: BTreeMap<String, Vec<String>>,
    /// Scale applied to location matches.
    pub location_weight: f64,
    /// Terms never reported as mentions (compared case-insensitively).
    pub blacklist: Vec<String>,
    /// Mentions below this confidence are dropped.
    pub min_confidence: f64,
    /// Mention text length bounds.
    pub min_length: usize,
    pub max_length: usize,
    /// Normalized-similarity threshold above which two mentions are the same.
    pub dedup_similarity: f64,
    /// Cap on mentions reported per message.
    pub max_mentions: usize,
    /// Strategy toggles.
    pub enable_names: bool,
    pub enable_phones: bool,
    pub enable_services: bool,
    pub enable_locations: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        let name_patterns = vec![
            WeightedPattern {
                pattern: r"\b[A-Z][A-Za-z'&-]+(?:\s+[A-Z][A-Za-z'&-]+){0,3}\s+(?:Plumbing|Plumbers|Electrical|Electricians|Builders|Building|Construction|Contractors|Roofing|Cleaning|Painting|Paving|Landscaping|Security|Services|Solutions|Repairs|Maintenance|Projects)(?:\s+(?:Services|Solutions|SA|Pty|CC))?\b".into(),
                weight: 0.85,
            },
            WeightedPattern {
                pattern: r"\b[A-Z][a-z]+\s+the\s+(?:plumber|electrician|builder|painter|handyman|gardener|mechanic|locksmith|tiler)\b".into(),
                weight: 0.75,
            },
            WeightedPattern {
                pattern: r"\b[A-Z][a-z]+\s+(?:from|at)\s+[A-Z][A-Za-z'&-]+(?:\s+[A-Z][A-Za-z'&-]+)?\b".into(),
                weight: 0.6,
            },
        ];
        let mut service_keywords = BTreeMap::new();
        service_keywords.insert(
            "plumbing".to_string(),
            weights(&[
                ("plumber", 0.9),
                ("plumbing", 0.85),
                ("geyser", 0.7),
                ("drain", 0.6),
                ("burst pipe", 0.7),
            ]),
        );
        service_keywords.insert(
            "electrical".to_string(),
            weights(&[("electrician", 0.9), ("electrical", 0.8), ("wiring", 0.6)]),
        );
        service_keywords.insert(
            "building".to_string(),
            weights(&[
                ("builder", 0.85),
                ("renovation", 0.7),
                ("construction", 0.65),
                ("tiling", 0.6),
            ]),
        );
        service_keywords.insert(
            "garden".to_string(),
            weights(&[("gardener", 0.8), ("tree felling", 0.7), ("landscaping", 0.7)]),
        );
        service_keywords.insert(
            "cleaning".to_string(),
            weights(&[("cleaner", 0.75), ("deep clean", 0.6)]),
        );
        service_keywords.insert(
            "auto".to_string(),
            weights(&[("mechanic", 0.85), ("panelbeater", 0.8)]),
        );
        service_keywords.insert(
            "security".to_string(),
            weights(&[("locksmith", 0.85), ("alarm system", 0.7)]),
        );

        let mut location_patterns = BTreeMap::new();
        location_patterns.insert("cape town".to_string(), vec![r"(?i)\bcape\s+town\b".into()]);
        location_patterns.insert(
            "johannesburg".to_string(),
            vec![
                r"(?i)\bjohannesburg\b".into(),
                r"(?i)\bjoburg\b".into(),
                r"(?i)\bjozi\b".into(),
            ],
        );
        location_patterns.insert("durban".to_string(), vec![r"(?i)\bdurban\b".into()]);
        location_patterns.insert("pretoria".to_string(), vec![r"(?i)\bpretoria\b".into()]);
        location_patterns.insert(
            "stellenbosch".to_string(),
            vec![r"(?i)\bstellenbosch\b".into()],
        );
        location_patterns.insert(
            "somerset west".to_string(),
            vec![r"(?i)\bsomerset\s+west\b".into()],
        );

        Self {
            name_patterns,
            phone_weight: 1.0,
            service_keywords,
            location_patterns,
            location_weight: 0.6,
            blacklist: vec![
                "whatsapp".into(),
                "google".into(),
                "admin".into(),
                "thanks".into(),
                "please".into(),
                "hello".into(),
                "morning".into(),
                "the group".into(),
            ],
            min_confidence: 0.3,
            min_length: 2,
            max_length: 64,
            dedup_similarity: 0.85,
            max_mentions: 10,
            enable_names: true,
            enable_phones: true,
            enable_services: true,
            enable_locations: true,
        }
    }
}

// ── Matcher ─────────────────────────────────────────────────────────

/// Matcher tuning. Strategy weights and acceptance floors are fixed (they
/// encode the precision ordering of the cascade); only the final discard
/// threshold is configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Winning matches below this confidence are discarded as no-match.
    pub min_match_confidence: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_match_confidence: 0.4,
        }
    }
}

// ── Attribution ─────────────────────────────────────────────────────

/// Temporal-correlation tuning for request/response attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
    /// Delta considered an immediate response (seconds).
    pub immediate_secs: u64,
    /// Delta considered near-term (seconds).
    pub near_term_secs: u64,
    /// Attribution ceiling: candidates older than this are ignored (seconds).
    pub max_window_secs: u64,
    /// Bonus when the candidate was classified as a request.
    pub relevance_bonus: f64,
    /// Bonus when the response comes from a different sender.
    pub cross_sender_bonus: f64,
    /// Fixed content bonus applied to any temporal match.
    pub content_bonus: f64,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            immediate_secs: 30,
            near_term_secs: 900,
            max_window_secs: 3600,
            relevance_bonus: 0.2,
            cross_sender_bonus: 0.1,
            content_bonus: 0.05,
        }
    }
}

// ── Orchestrator ────────────────────────────────────────────────────

/// Orchestrator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Minimum extraction confidence for an unmatched name-bearing mention
    /// to create a new provider.
    pub create_provider_threshold: f64,
    /// How far back the request log is consulted for attribution (seconds).
    pub request_window_secs: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            create_provider_threshold: 0.6,
            request_window_secs: 3600,
        }
    }
}

// ── helpers ─────────────────────────────────────────────────────────

fn weights(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|(k, w)| (k.to_string(), *w))
        .collect()
}

fn rule(id: &str, pattern: &str, weight: f64) -> PatternRule {
    PatternRule {
        id: id.to_string(),
        pattern: pattern.to_string(),
        weight,
    }
}
