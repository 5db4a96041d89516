//! Rule engines — pure text → evidence scorers.
//!
//! Each engine maps message text to a confidence plus the keywords and rule
//! ids that fired. Engines never fail on message content (empty text scores
//! zero); they only fail on their own misconfiguration, which is surfaced
//! when the engine is built.

use std::collections::BTreeMap;

use regex::Regex;

use crate::config::PatternRule;
use crate::error::{ClassificationError, ConfigError};

/// Evidence produced by one engine for one message.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    /// Squashed confidence in [0, 1].
    pub confidence: f64,
    /// Keywords that fired, in match order.
    pub keywords: Vec<String>,
    /// Rule ids that fired, in match order.
    pub rule_matches: Vec<String>,
}

/// A rule engine: one strategy for scoring message text.
pub trait RuleEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &str;

    /// Score the text. Must not fail on message content.
    fn classify(&self, text: &str) -> Result<EngineOutput, ClassificationError>;
}

/// Squash a raw weight sum into [0, 1].
fn squash(total: f64) -> f64 {
    (total / 2.0).min(1.0)
}

// ── Keyword engine ──────────────────────────────────────────────────

struct CompiledKeyword {
    keyword: String,
    regex: Regex,
    weight: f64,
    table: &'static str,
}

/// Sums per-keyword weights for whole-word matches against the request and
/// recommendation vocabularies.
pub struct KeywordRuleEngine {
    keywords: Vec<CompiledKeyword>,
}

impl KeywordRuleEngine {
    pub fn new(
        request: &BTreeMap<String, f64>,
        recommendation: &BTreeMap<String, f64>,
    ) -> Result<Self, ConfigError> {
        let mut keywords = Vec::with_capacity(request.len() + recommendation.len());
        for (table, entries) in [("request", request), ("recommendation", recommendation)] {
            for (keyword, weight) in entries {
                keywords.push(CompiledKeyword {
                    keyword: keyword.clone(),
                    regex: compile_whole_word(keyword, table)?,
                    weight: *weight,
                    table,
                });
            }
        }
        Ok(Self { keywords })
    }
}

/// Whole-word (not substring) matcher for a keyword or phrase.
fn compile_whole_word(keyword: &str, table: &str) -> Result<Regex, ConfigError> {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(keyword));
    Regex::new(&pattern).map_err(|e| ConfigError::InvalidPattern {
        table: table.to_string(),
        pattern: keyword.to_string(),
        message: e.to_string(),
    })
}

impl RuleEngine for KeywordRuleEngine {
    fn name(&self) -> &str {
        "keyword"
    }

    fn classify(&self, text: &str) -> Result<EngineOutput, ClassificationError> {
        if text.trim().is_empty() {
            return Ok(EngineOutput::default());
        }

        let mut total = 0.0;
        let mut keywords = Vec::new();
        let mut rule_matches = Vec::new();
        for entry in &self.keywords {
            if entry.regex.is_match(text) {
                total += entry.weight;
                keywords.push(entry.keyword.clone());
                rule_matches.push(format!("kw:{}:{}", entry.table, entry.keyword));
            }
        }

        Ok(EngineOutput {
            confidence: squash(total),
            keywords,
            rule_matches,
        })
    }
}

// ── Pattern engine ──────────────────────────────────────────────────

struct CompiledRule {
    id: String,
    regex: Regex,
    weight: f64,
}

/// Scores against a table of weighted regex rules. The matched text (lower-
/// cased) is reported as the keyword so intent inference sees it.
pub struct PatternRuleEngine {
    rules: Vec<CompiledRule>,
}

impl PatternRuleEngine {
    pub fn new(tables: &[&[PatternRule]]) -> Result<Self, ConfigError> {
        let mut rules = Vec::new();
        for table in tables {
            for rule in *table {
                let regex = Regex::new(&rule.pattern).map_err(|e| ConfigError::InvalidPattern {
                    table: "classifier.patterns".to_string(),
                    pattern: rule.pattern.clone(),
                    message: e.to_string(),
                })?;
                rules.push(CompiledRule {
                    id: rule.id.clone(),
                    regex,
                    weight: rule.weight,
                });
            }
        }
        Ok(Self { rules })
    }
}

impl RuleEngine for PatternRuleEngine {
    fn name(&self) -> &str {
        "pattern"
    }

    fn classify(&self, text: &str) -> Result<EngineOutput, ClassificationError> {
        if text.trim().is_empty() {
            return Ok(EngineOutput::default());
        }

        let mut total = 0.0;
        let mut keywords = Vec::new();
        let mut rule_matches = Vec::new();
        for rule in &self.rules {
            if let Some(m) = rule.regex.find(text) {
                total += rule.weight;
                keywords.push(m.as_str().to_lowercase());
                rule_matches.push(rule.id.clone());
            }
        }

        Ok(EngineOutput {
            confidence: squash(total),
            keywords,
            rule_matches,
        })
    }
}
