//! Extraction strategies — independent regex/keyword scanners.
//!
//! Each strategy reports candidate spans with its own confidence scale; the
//! extractor unions them, so the same span showing up under two strategies
//! is expected and resolved later by deduplication.

use regex::Regex;

use crate::config::{ExtractorConfig, WeightedPattern};
use crate::error::ConfigError;

use super::{ExtractionType, Mention};

/// Fixed phone patterns at decreasing confidence: international, local
/// leading-zero, generic grouped digits.
const PHONE_PATTERNS: &[(&str, f64)] = &[
    (r"\+\d{1,3}[\s\-]?\d{2}[\s\-]?\d{3}[\s\-]?\d{4}", 0.95),
    (r"\b0\d{2}[\s\-]?\d{3}[\s\-]?\d{4}\b", 0.9),
    (r"\b\d{2,3}[\s\-]\d{3,4}[\s\-]\d{4}\b", 0.6),
];

/// Business-name patterns with per-pattern confidence.
pub struct NameStrategy {
    patterns: Vec<(Regex, f64)>,
}

impl NameStrategy {
    pub fn new(rules: &[WeightedPattern]) -> Result<Self, ConfigError> {
        let mut patterns = Vec::with_capacity(rules.len());
        for rule in rules {
            let regex = Regex::new(&rule.pattern).map_err(|e| ConfigError::InvalidPattern {
                table: "extractor.name_patterns".into(),
                pattern: rule.pattern.clone(),
                message: e.to_string(),
            })?;
            patterns.push((regex, rule.weight));
        }
        Ok(Self { patterns })
    }

    pub fn extract(&self, text: &str) -> Vec<Mention> {
        let mut mentions = Vec::new();
        for (regex, weight) in &self.patterns {
            for m in regex.find_iter(text) {
                mentions.push(Mention::new(
                    m.as_str(),
                    *weight,
                    ExtractionType::NamePattern,
                    m.start(),
                    m.end(),
                ));
            }
        }
        mentions
    }
}

/// The three hard-coded phone shapes, scaled by the configured weight.
pub struct PhoneStrategy {
    patterns: Vec<(Regex, f64)>,
    weight: f64,
}

impl PhoneStrategy {
    pub fn new(weight: f64) -> Self {
        let patterns = PHONE_PATTERNS
            .iter()
            .map(|(p, conf)| (Regex::new(p).unwrap(), *conf))
            .collect();
        Self { patterns, weight }
    }

    pub fn extract(&self, text: &str) -> Vec<Mention> {
        let mut mentions = Vec::new();
        for (regex, confidence) in &self.patterns {
            for m in regex.find_iter(text) {
                mentions.push(Mention::new(
                    m.as_str(),
                    confidence * self.weight,
                    ExtractionType::PhonePattern,
                    m.start(),
                    m.end(),
                ));
            }
        }
        mentions
    }
}

struct ServiceKeyword {
    category: String,
    regex: Regex,
    weight: f64,
}

/// Whole-word lookup against the category → keyword → weight table.
pub struct ServiceKeywordStrategy {
    keywords: Vec<ServiceKeyword>,
}

impl ServiceKeywordStrategy {
    pub fn new(config: &ExtractorConfig) -> Result<Self, ConfigError> {
        let mut keywords = Vec::new();
        for (category, table) in &config.service_keywords {
            for (keyword, weight) in table {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(keyword));
                let regex = Regex::new(&pattern).map_err(|e| ConfigError::InvalidPattern {
                    table: format!("extractor.service_keywords.{category}"),
                    pattern: keyword.clone(),
                    message: e.to_string(),
                })?;
                keywords.push(ServiceKeyword {
                    category: category.clone(),
                    regex,
                    weight: *weight,
                });
            }
        }
        Ok(Self { keywords })
    }

    pub fn extract(&self, text: &str) -> Vec<Mention> {
        let mut mentions = Vec::new();
        for entry in &self.keywords {
            for m in entry.regex.find_iter(text) {
                mentions.push(
                    Mention::new(
                        m.as_str(),
                        entry.weight,
                        ExtractionType::ServiceKeyword,
                        m.start(),
                        m.end(),
                    )
                    .with_category(&entry.category),
                );
            }
        }
        mentions
    }
}

/// Per-city regex lists scaled by one configured weight.
pub struct LocationStrategy {
    cities: Vec<(String, Vec<Regex>)>,
    weight: f64,
}

impl LocationStrategy {
    pub fn new(config: &ExtractorConfig) -> Result<Self, ConfigError> {
        let mut cities = Vec::new();
        for (city, patterns) in &config.location_patterns {
            let mut compiled = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                    table: format!("extractor.location_patterns.{city}"),
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                compiled.push(regex);
            }
            cities.push((city.clone(), compiled));
        }
        Ok(Self {
            cities,
            weight: config.location_weight,
        })
    }

    pub fn extract(&self, text: &str) -> Vec<Mention> {
        let mut mentions = Vec::new();
        for (city, patterns) in &self.cities {
            for regex in patterns {
                for m in regex.find_iter(text) {
                    mentions.push(
                        Mention::new(
                            m.as_str(),
                            self.weight,
                            ExtractionType::LocationPattern,
                            m.start(),
                            m.end(),
                        )
                        .with_category(city),
                    );
                }
            }
        }
        mentions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;

    #[test]
    fn name_strategy_matches_business_suffix() {
        let config = ExtractorConfig::default();
        let strategy = NameStrategy::new(&config.name_patterns).unwrap();
        let mentions = strategy.extract("We used John Smith Plumbing Services, they were quick");
        assert!(
            mentions
                .iter()
                .any(|m| m.text == "John Smith Plumbing Services")
        );
    }

    #[test]
    fn name_strategy_matches_trade_alias() {
        let config = ExtractorConfig::default();
        let strategy = NameStrategy::new(&config.name_patterns).unwrap();
        let mentions = strategy.extract("I highly recommend John the plumber 082-123-4567");
        assert!(mentions.iter().any(|m| m.text == "John the plumber"));
    }

    #[test]
    fn phone_strategy_confidence_ordering() {
        let strategy = PhoneStrategy::new(1.0);
        let international = strategy.extract("+27821234567");
        let local = strategy.extract("0821234567");
        assert!(!international.is_empty());
        assert!(!local.is_empty());
        assert!(international[0].confidence > local[0].confidence);
    }

    #[test]
    fn phone_strategy_matches_grouped_formats() {
        let strategy = PhoneStrategy::new(1.0);
        for text in ["082-123-4567", "082 123 4567", "+27 82 123 4567"] {
            assert!(!strategy.extract(text).is_empty(), "no match for {text}");
        }
    }

    #[test]
    fn phone_weight_scales_confidence() {
        let half = PhoneStrategy::new(0.5);
        let mentions = half.extract("0821234567");
        assert!((mentions[0].confidence - 0.45).abs() < 1e-9);
    }

    #[test]
    fn service_keywords_carry_category() {
        let config = ExtractorConfig::default();
        let strategy = ServiceKeywordStrategy::new(&config).unwrap();
        let mentions = strategy.extract("our geyser burst, we need a plumber");
        let plumber = mentions.iter().find(|m| m.text == "plumber").unwrap();
        assert_eq!(plumber.category.as_deref(), Some("plumbing"));
    }

    #[test]
    fn location_strategy_matches_aliases() {
        let config = ExtractorConfig::default();
        let strategy = LocationStrategy::new(&config).unwrap();
        let mentions = strategy.extract("anyone in Joburg?");
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].category.as_deref(), Some("johannesburg"));
    }
}
