//! Provider matching — one mention against a pool of known providers.
//!
//! Per candidate, a fixed-order strategy cascade runs and the first strategy
//! to produce a score wins for that candidate; across candidates the highest
//! confidence wins overall. The order encodes precision: exact name, fuzzy
//! name, phone, tag, semantic tag. Acceptance floors inside each strategy
//! keep weak name guesses from shadowing a strong phone match.

pub mod phone;
pub mod similarity;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::MatcherConfig;
use crate::error::MatchError;
use crate::store::model::Provider;

/// Which strategy resolved a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactName,
    PartialName,
    FuzzyName,
    WordSimilarity,
    PhoneExact,
    PhoneFuzzy,
    TagBased,
    SemanticTag,
    NoMatch,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactName => "exact_name",
            Self::PartialName => "partial_name",
            Self::FuzzyName => "fuzzy_name",
            Self::WordSimilarity => "word_similarity",
            Self::PhoneExact => "phone_exact",
            Self::PhoneFuzzy => "phone_fuzzy",
            Self::TagBased => "tag_based",
            Self::SemanticTag => "semantic_tag",
            Self::NoMatch => "no_match",
        }
    }
}

/// Outcome of matching one mention against one candidate pool. Ephemeral —
/// produced and consumed within a single matching call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub is_match: bool,
    /// In [0, 1].
    pub confidence: f64,
    pub matched_provider: Option<Provider>,
    pub match_type: MatchType,
    pub similarity_score: f64,
}

impl MatchResult {
    /// The deterministic no-match result. `is_match == false` always carries
    /// no provider and `no_match`.
    pub fn no_match() -> Self {
        Self {
            is_match: false,
            confidence: 0.0,
            matched_provider: None,
            match_type: MatchType::NoMatch,
            similarity_score: 0.0,
        }
    }
}

/// Score from one strategy for one candidate.
#[derive(Debug, Clone, Copy)]
struct ScoredMatch {
    confidence: f64,
    match_type: MatchType,
    similarity: f64,
}

type Strategy = fn(&str, &Provider) -> Result<Option<ScoredMatch>, MatchError>;

/// The cascade, in precision order. First hit wins per candidate.
const CASCADE: &[(&str, Strategy)] = &[
    ("exact_name", exact_name),
    ("fuzzy_name", fuzzy_name),
    ("phone", phone_match),
    ("tag", tag_match),
    ("semantic_tag", semantic_tag_match),
];

/// Resolves mentions to known providers.
pub struct ProviderMatcher {
    min_match_confidence: f64,
}

impl ProviderMatcher {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            min_match_confidence: config.min_match_confidence,
        }
    }

    /// Find the best match for a mention. Errors only on empty mention
    /// text; an empty pool or all-strategies-miss is a no-match result.
    pub fn find_best_match(
        &self,
        mention_text: &str,
        candidates: &[Provider],
    ) -> Result<MatchResult, MatchError> {
        if mention_text.trim().is_empty() {
            return Err(MatchError::EmptyMention);
        }
        if candidates.is_empty() {
            return Ok(MatchResult::no_match());
        }

        let mut best: Option<(&Provider, ScoredMatch)> = None;
        for candidate in candidates {
            if let Some(scored) = evaluate_candidate(mention_text, candidate) {
                let replace = best
                    .as_ref()
                    .is_none_or(|(_, current)| scored.confidence > current.confidence);
                if replace {
                    best = Some((candidate, scored));
                }
            }
        }

        match best {
            Some((provider, scored)) if scored.confidence >= self.min_match_confidence => {
                debug!(
                    mention = mention_text,
                    provider = %provider.name,
                    match_type = scored.match_type.as_str(),
                    confidence = scored.confidence,
                    "Provider matched"
                );
                Ok(MatchResult {
                    is_match: true,
                    confidence: scored.confidence.clamp(0.0, 1.0),
                    matched_provider: Some(provider.clone()),
                    match_type: scored.match_type,
                    similarity_score: scored.similarity.clamp(0.0, 1.0),
                })
            }
            Some((_, scored)) => {
                // Kept for rule-table tuning: mentions that nearly matched.
                debug!(
                    mention = mention_text,
                    confidence = scored.confidence,
                    "Unhandled mention pattern (best match below threshold)"
                );
                Ok(MatchResult::no_match())
            }
            None => Ok(MatchResult::no_match()),
        }
    }
}

/// Run the cascade for one candidate; first hit wins. A failing strategy is
/// logged and treated as a miss, never aborting the cascade.
fn evaluate_candidate(mention: &str, candidate: &Provider) -> Option<ScoredMatch> {
    for (name, strategy) in CASCADE {
        match strategy(mention, candidate) {
            Ok(Some(scored)) => return Some(scored),
            Ok(None) => {}
            Err(e) => {
                warn!(strategy = name, error = %e, "Match strategy failed, continuing cascade");
            }
        }
    }
    None
}

// ── Strategies ──────────────────────────────────────────────────────

/// Case-insensitive exact name match. The only way to score 1.0.
fn exact_name(mention: &str, candidate: &Provider) -> Result<Option<ScoredMatch>, MatchError> {
    if similarity::normalize(mention) == similarity::normalize(&candidate.name) {
        return Ok(Some(ScoredMatch {
            confidence: 1.0,
            match_type: MatchType::ExactName,
            similarity: 1.0,
        }));
    }
    Ok(None)
}

const FUZZY_NAME_FLOOR: f64 = 0.7;
const WORD_OVERLAP_FLOOR: f64 = 0.6;

/// Fuzzy name match: containment, then edit similarity, then word overlap.
fn fuzzy_name(mention: &str, candidate: &Provider) -> Result<Option<ScoredMatch>, MatchError> {
    let sim = similarity::edit_similarity(mention, &candidate.name);
    if similarity::contains_either(mention, &candidate.name) {
        return Ok(Some(ScoredMatch {
            confidence: sim * 0.9,
            match_type: MatchType::PartialName,
            similarity: sim,
        }));
    }
    if sim >= FUZZY_NAME_FLOOR {
        return Ok(Some(ScoredMatch {
            confidence: sim * 0.85,
            match_type: MatchType::FuzzyName,
            similarity: sim,
        }));
    }
    let overlap = similarity::word_overlap(mention, &candidate.name);
    if overlap >= WORD_OVERLAP_FLOOR {
        return Ok(Some(ScoredMatch {
            confidence: overlap * 0.8,
            match_type: MatchType::WordSimilarity,
            similarity: overlap,
        }));
    }
    Ok(None)
}

/// Phone match over phone-shaped substrings of the mention.
fn phone_match(mention: &str, candidate: &Provider) -> Result<Option<ScoredMatch>, MatchError> {
    let Some(candidate_phone) = candidate.phone.as_deref() else {
        return Ok(None);
    };
    let runs = phone::extract_digit_runs(mention);
    for run in &runs {
        if phone::digits_equal(run, candidate_phone) {
            return Ok(Some(ScoredMatch {
                confidence: 0.95,
                match_type: MatchType::PhoneExact,
                similarity: 1.0,
            }));
        }
    }
    for run in &runs {
        if phone::fuzzy_equal(run, candidate_phone) {
            return Ok(Some(ScoredMatch {
                confidence: 0.9,
                match_type: MatchType::PhoneFuzzy,
                similarity: 0.9,
            }));
        }
    }
    Ok(None)
}

const TAG_ACCEPT_FLOOR: f64 = 0.4;

/// Literal substring hits over the candidate's tag categories and values.
fn tag_match(mention: &str, candidate: &Provider) -> Result<Option<ScoredMatch>, MatchError> {
    let mut total = 0usize;
    let mut hits = 0usize;
    for (category, value) in &candidate.tags {
        total += 1 + value.len();
        if similarity::contains_either(mention, category) {
            hits += 1;
        }
        for v in value.values() {
            if similarity::contains_either(mention, v) {
                hits += 1;
            }
        }
    }
    if total == 0 || hits == 0 {
        return Ok(None);
    }
    let ratio = hits as f64 / total as f64;
    let confidence = ratio * 0.7;
    if confidence >= TAG_ACCEPT_FLOOR {
        Ok(Some(ScoredMatch {
            confidence,
            match_type: MatchType::TagBased,
            similarity: ratio,
        }))
    } else {
        Ok(None)
    }
}

const SEMANTIC_ACCEPT_FLOOR: f64 = 0.6;
const SEMANTIC_OVERLAP_FLOOR: f64 = 0.3;
const SEMANTIC_EDIT_FLOOR: f64 = 0.7;
/// Edit similarity only means much on short strings.
const SEMANTIC_SHORT_LEN: usize = 24;

/// Fuzzy scoring over the same tag space: containment, word overlap, then
/// short-string edit similarity, keeping the best tag score.
fn semantic_tag_match(
    mention: &str,
    candidate: &Provider,
) -> Result<Option<ScoredMatch>, MatchError> {
    let mut best: f64 = 0.0;
    for (category, value) in &candidate.tags {
        for tag in std::iter::once(category.as_str()).chain(value.values()) {
            best = best.max(semantic_tag_score(mention, tag));
        }
    }
    if best >= SEMANTIC_ACCEPT_FLOOR {
        Ok(Some(ScoredMatch {
            confidence: best * 0.7,
            match_type: MatchType::SemanticTag,
            similarity: best,
        }))
    } else {
        Ok(None)
    }
}

fn semantic_tag_score(mention: &str, tag: &str) -> f64 {
    if similarity::contains_either(mention, tag) {
        return 0.9;
    }
    let overlap = similarity::word_overlap(mention, tag);
    if overlap >= SEMANTIC_OVERLAP_FLOOR {
        return overlap * 0.8;
    }
    if mention.len() <= SEMANTIC_SHORT_LEN && tag.len() <= SEMANTIC_SHORT_LEN {
        let sim = similarity::edit_similarity(mention, tag);
        if sim >= SEMANTIC_EDIT_FLOOR {
            return sim * 0.7;
        }
    }
    0.0
}
