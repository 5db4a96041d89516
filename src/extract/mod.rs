//! Mention extraction — message text → confidence-ranked provider mentions.
//!
//! Four independent strategies (name, phone, service keyword, location) are
//! unioned, then filtered (confidence floor, length bounds, blacklist),
//! deduplicated by normalized similarity, sorted by confidence, and capped.
//! A structured contact card shared alongside the message maps straight to
//! high-confidence mentions without touching the text strategies.

pub mod strategies;

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ExtractorConfig;
use crate::error::{ConfigError, ExtractionError};
use crate::matcher::similarity;
use strategies::{LocationStrategy, NameStrategy, PhoneStrategy, ServiceKeywordStrategy};

/// Which strategy produced a mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionType {
    NamePattern,
    PhonePattern,
    ServiceKeyword,
    LocationPattern,
    ContactDisplayName,
    ContactPhoneNumber,
    ContactOrganization,
}

impl ExtractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NamePattern => "name_pattern",
            Self::PhonePattern => "phone_pattern",
            Self::ServiceKeyword => "service_keyword",
            Self::LocationPattern => "location_pattern",
            Self::ContactDisplayName => "contact_display_name",
            Self::ContactPhoneNumber => "contact_phone_number",
            Self::ContactOrganization => "contact_organization",
        }
    }

    /// Mention types that can seed a brand-new provider record.
    pub fn is_name_bearing(&self) -> bool {
        matches!(
            self,
            Self::NamePattern | Self::ContactDisplayName | Self::ContactOrganization
        )
    }
}

/// A text span possibly referring to a service provider. Immutable once
/// created; identity is (text, start, end, extraction_type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    pub text: String,
    /// In [0, 1].
    pub confidence: f64,
    pub extraction_type: ExtractionType,
    pub start: usize,
    pub end: usize,
    /// Service category or city, when the producing strategy knows it.
    pub category: Option<String>,
}

impl Mention {
    /// Create a mention; confidence is clamped, end must exceed start.
    pub fn new(
        text: &str,
        confidence: f64,
        extraction_type: ExtractionType,
        start: usize,
        end: usize,
    ) -> Self {
        debug_assert!(end > start, "mention span must be non-empty");
        Self {
            text: text.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            extraction_type,
            start,
            end,
            category: None,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }
}

impl PartialEq for Mention {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
            && self.start == other.start
            && self.end == other.end
            && self.extraction_type == other.extraction_type
    }
}

impl Eq for Mention {}

impl Hash for Mention {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
        self.start.hash(state);
        self.end.hash(state);
        self.extraction_type.hash(state);
    }
}

/// A contact card forwarded with a message (supplemental payload).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactCard {
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    pub organization: Option<String>,
}

/// Fixed confidences for contact-card fields: a forwarded card is near-
/// authoritative, a free-text span is not.
const CONTACT_NAME_CONFIDENCE: f64 = 0.95;
const CONTACT_PHONE_CONFIDENCE: f64 = 0.98;
const CONTACT_ORG_CONFIDENCE: f64 = 0.85;

/// Stateless (given its compiled configuration) mention extractor.
pub struct MentionExtractor {
    names: Option<NameStrategy>,
    phones: Option<PhoneStrategy>,
    services: Option<ServiceKeywordStrategy>,
    locations: Option<LocationStrategy>,
    blacklist: HashSet<String>,
    min_confidence: f64,
    min_length: usize,
    max_length: usize,
    dedup_similarity: f64,
    max_mentions: usize,
}

impl MentionExtractor {
    /// Build the extractor, compiling every configured pattern. A malformed
    /// table fails here, not at call time.
    pub fn new(config: &ExtractorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            names: config
                .enable_names
                .then(|| NameStrategy::new(&config.name_patterns))
                .transpose()?,
            phones: config
                .enable_phones
                .then(|| PhoneStrategy::new(config.phone_weight)),
            services: config
                .enable_services
                .then(|| ServiceKeywordStrategy::new(config))
                .transpose()?,
            locations: config
                .enable_locations
                .then(|| LocationStrategy::new(config))
                .transpose()?,
            blacklist: config
                .blacklist
                .iter()
                .map(|t| similarity::normalize(t))
                .collect(),
            min_confidence: config.min_confidence,
            min_length: config.min_length,
            max_length: config.max_length,
            dedup_similarity: config.dedup_similarity,
            max_mentions: config.max_mentions,
        })
    }

    /// Extract mentions from message text. Fails fast on empty input.
    pub fn extract(&self, text: &str) -> Result<Vec<Mention>, ExtractionError> {
        self.extract_with_contact(text, None)
    }

    /// Extract mentions from text plus an optional forwarded contact card.
    pub fn extract_with_contact(
        &self,
        text: &str,
        contact: Option<&ContactCard>,
    ) -> Result<Vec<Mention>, ExtractionError> {
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyMessage);
        }

        let mut candidates = Vec::new();
        if let Some(s) = &self.names {
            candidates.extend(s.extract(text));
        }
        if let Some(s) = &self.phones {
            candidates.extend(s.extract(text));
        }
        if let Some(s) = &self.services {
            candidates.extend(s.extract(text));
        }
        if let Some(s) = &self.locations {
            candidates.extend(s.extract(text));
        }
        if let Some(card) = contact {
            candidates.extend(contact_mentions(card));
        }

        let raw = candidates.len();
        let filtered: Vec<Mention> = candidates
            .into_iter()
            .filter(|m| self.passes_filter(m))
            .collect();
        let mentions = self.post_process(filtered);
        debug!(
            raw,
            kept = mentions.len(),
            "Mention extraction complete"
        );
        Ok(mentions)
    }

    fn passes_filter(&self, mention: &Mention) -> bool {
        if mention.confidence < self.min_confidence {
            return false;
        }
        let len = mention.text.chars().count();
        if len < self.min_length || len > self.max_length {
            return false;
        }
        !self.blacklist.contains(&similarity::normalize(&mention.text))
    }

    /// Deduplicate by normalized similarity (higher confidence wins), sort
    /// descending by confidence (ties by position), cap the count.
    /// Idempotent: running it on already-deduplicated output is a no-op.
    fn post_process(&self, mut mentions: Vec<Mention>) -> Vec<Mention> {
        mentions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.start.cmp(&b.start))
        });

        let mut kept: Vec<Mention> = Vec::new();
        for mention in mentions {
            let dupe = kept.iter().any(|k| {
                similarity::edit_similarity(&k.text, &mention.text) >= self.dedup_similarity
            });
            if !dupe {
                kept.push(mention);
            }
        }
        kept.truncate(self.max_mentions);
        kept
    }
}

/// Map a contact card's fields to mentions at fixed confidences.
fn contact_mentions(card: &ContactCard) -> Vec<Mention> {
    let mut mentions = Vec::new();
    if let Some(name) = card.display_name.as_deref().filter(|s| !s.trim().is_empty()) {
        mentions.push(Mention::new(
            name,
            CONTACT_NAME_CONFIDENCE,
            ExtractionType::ContactDisplayName,
            0,
            name.len(),
        ));
    }
    if let Some(phone) = card.phone_number.as_deref().filter(|s| !s.trim().is_empty()) {
        mentions.push(Mention::new(
            phone,
            CONTACT_PHONE_CONFIDENCE,
            ExtractionType::ContactPhoneNumber,
            0,
            phone.len(),
        ));
    }
    if let Some(org) = card.organization.as_deref().filter(|s| !s.trim().is_empty()) {
        mentions.push(Mention::new(
            org,
            CONTACT_ORG_CONFIDENCE,
            ExtractionType::ContactOrganization,
            0,
            org.len(),
        ));
    }
    mentions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> MentionExtractor {
        MentionExtractor::new(&ExtractorConfig::default()).unwrap()
    }

    #[test]
    fn empty_input_fails_fast() {
        let e = extractor();
        assert!(matches!(e.extract(""), Err(ExtractionError::EmptyMessage)));
        assert!(matches!(
            e.extract(" \t\n"),
            Err(ExtractionError::EmptyMessage)
        ));
    }

    #[test]
    fn recommendation_scenario_yields_name_and_phone() {
        let e = extractor();
        let mentions = e
            .extract("I highly recommend John the plumber 082-123-4567")
            .unwrap();
        assert!(
            mentions
                .iter()
                .any(|m| m.extraction_type == ExtractionType::NamePattern)
        );
        assert!(
            mentions
                .iter()
                .any(|m| m.extraction_type == ExtractionType::PhonePattern)
        );
    }

    #[test]
    fn mentions_sorted_descending_by_confidence() {
        let e = extractor();
        let mentions = e
            .extract("we need a plumber in Durban, call 082 123 4567")
            .unwrap();
        for pair in mentions.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn same_span_reported_once_after_dedup() {
        // "082-123-4567" fires both the local and the generic grouped phone
        // pattern before deduplication; only the higher-confidence mention
        // survives.
        let e = extractor();
        let mentions = e.extract("call 082-123-4567 please").unwrap();
        let phones: Vec<_> = mentions
            .iter()
            .filter(|m| m.extraction_type == ExtractionType::PhonePattern)
            .collect();
        assert_eq!(phones.len(), 1);
        assert!((phones[0].confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn dedup_is_idempotent() {
        let e = extractor();
        let once = e
            .extract("John the plumber fixed our geyser, call John the plumber on 0821234567")
            .unwrap();
        let twice = e.post_process(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn blacklisted_terms_are_dropped() {
        let mut config = ExtractorConfig::default();
        config.blacklist.push("plumber".into());
        let e = MentionExtractor::new(&config).unwrap();
        let mentions = e.extract("we need a plumber urgently").unwrap();
        assert!(mentions.iter().all(|m| m.text != "plumber"));
    }

    #[test]
    fn confidence_floor_drops_weak_mentions() {
        let mut config = ExtractorConfig::default();
        config.min_confidence = 0.99;
        let e = MentionExtractor::new(&config).unwrap();
        let mentions = e
            .extract("we need a plumber in Durban, 082 123 4567")
            .unwrap();
        assert!(mentions.is_empty());
    }

    #[test]
    fn max_mentions_cap_applies() {
        let mut config = ExtractorConfig::default();
        config.max_mentions = 1;
        let e = MentionExtractor::new(&config).unwrap();
        let mentions = e
            .extract("plumber electrician builder in Durban 082 123 4567")
            .unwrap();
        assert_eq!(mentions.len(), 1);
    }

    #[test]
    fn disabled_strategy_produces_nothing() {
        let mut config = ExtractorConfig::default();
        config.enable_phones = false;
        let e = MentionExtractor::new(&config).unwrap();
        let mentions = e.extract("call 082 123 4567").unwrap();
        assert!(
            mentions
                .iter()
                .all(|m| m.extraction_type != ExtractionType::PhonePattern)
        );
    }

    #[test]
    fn contact_card_maps_to_contact_mentions() {
        let e = extractor();
        let card = ContactCard {
            display_name: Some("Jabu Electrical".into()),
            phone_number: Some("+27831234567".into()),
            organization: None,
        };
        let mentions = e
            .extract_with_contact("forwarding the contact we spoke about", Some(&card))
            .unwrap();
        assert!(
            mentions
                .iter()
                .any(|m| m.extraction_type == ExtractionType::ContactPhoneNumber)
        );
        assert!(
            mentions
                .iter()
                .any(|m| m.extraction_type == ExtractionType::ContactDisplayName)
        );
        // Phone beats name: fixed contact confidences rank it first
        assert_eq!(
            mentions[0].extraction_type,
            ExtractionType::ContactPhoneNumber
        );
    }

    #[test]
    fn mention_equality_ignores_confidence() {
        let a = Mention::new("x y", 0.5, ExtractionType::NamePattern, 0, 3);
        let b = Mention::new("x y", 0.9, ExtractionType::NamePattern, 0, 3);
        assert_eq!(a, b);
        let c = Mention::new("x y", 0.5, ExtractionType::ServiceKeyword, 0, 3);
        assert_ne!(a, c);
    }
}
