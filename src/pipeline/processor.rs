//! Pipeline orchestrator.
//!
//! Runs the stages in a strict order per message: classify, extract,
//! match per mention, attribute, persist. Only recommendation messages
//! reach extraction; requests are recorded for later attribution and
//! everything else ends as a successful empty report with a note.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::classify::{ClassificationResult, MessageClassifier, MessageType};
use crate::config::{ProcessorConfig, RulesConfig};
use crate::context::ContextAttributor;
use crate::error::{ConfigError, PipelineError, StoreError};
use crate::extract::{ExtractionType, Mention, MentionExtractor};
use crate::matcher::{phone, ProviderMatcher};
use crate::notify::Notifier;
use crate::pipeline::types::{GroupMessage, ProcessingReport};
use crate::store::model::{Endorsement, Provider, RequestRecord};
use crate::store::traits::{EndorsementStore, ProviderStore, RequestLog};

/// Weight of the match score in the blended endorsement confidence.
const MATCH_WEIGHT: f64 = 0.7;
/// Weight of the classification score in the blended endorsement confidence.
const CLASSIFICATION_WEIGHT: f64 = 0.3;

pub struct MessageProcessor {
    classifier: MessageClassifier,
    extractor: MentionExtractor,
    matcher: ProviderMatcher,
    attributor: ContextAttributor,
    providers: Arc<dyn ProviderStore>,
    endorsements: Arc<dyn EndorsementStore>,
    requests: Arc<dyn RequestLog>,
    notifier: Option<Arc<dyn Notifier>>,
    config: ProcessorConfig,
}

impl MessageProcessor {
    pub fn new(
        rules: &RulesConfig,
        providers: Arc<dyn ProviderStore>,
        endorsements: Arc<dyn EndorsementStore>,
        requests: Arc<dyn RequestLog>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            classifier: MessageClassifier::new(&rules.classifier)?,
            extractor: MentionExtractor::new(&rules.extractor)?,
            matcher: ProviderMatcher::new(&rules.matcher),
            attributor: ContextAttributor::new(&rules.attribution),
            providers,
            endorsements,
            requests,
            notifier: None,
            config: rules.processor.clone(),
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Process one group message end to end.
    ///
    /// A caller that already classified the message passes the result in
    /// to skip re-classification; otherwise the processor classifies.
    pub async fn process(
        &self,
        message: &GroupMessage,
        classification: Option<ClassificationResult>,
    ) -> Result<ProcessingReport, PipelineError> {
        let started = Instant::now();

        let classification = match classification {
            Some(c) => c,
            None => self.classifier.classify(&message.text)?,
        };
        debug!(
            id = %message.id,
            message_type = classification.message_type.as_str(),
            confidence = classification.confidence,
            "Message classified"
        );

        match classification.message_type {
            MessageType::Request => {
                self.record_request(message, &classification).await?;
                return Ok(ProcessingReport::empty_with_note(
                    "request recorded for attribution",
                    started.elapsed().as_secs_f64(),
                ));
            }
            MessageType::Unknown => {
                return Ok(ProcessingReport::empty_with_note(
                    "message not actionable",
                    started.elapsed().as_secs_f64(),
                ));
            }
            MessageType::Recommendation => {}
        }

        let mentions = self
            .extractor
            .extract_with_contact(&message.text, message.contact.as_ref())?;
        if mentions.is_empty() {
            return Ok(ProcessingReport::empty_with_note(
                "no provider mentions found",
                started.elapsed().as_secs_f64(),
            ));
        }

        // Advisory only. A failed attribution degrades inside analyze().
        let attribution = {
            let cutoff = message.timestamp
                - Duration::seconds(self.config.request_window_secs as i64);
            let recent = self
                .requests
                .recent(&message.group_id, cutoff)
                .await
                .unwrap_or_else(|e| {
                    warn!(id = %message.id, error = %e, "Request log unavailable");
                    Vec::new()
                });
            self.attributor.analyze(message, &recent)
        };

        let mut report = ProcessingReport {
            success: true,
            endorsements_created: Vec::new(),
            notes: Vec::new(),
            duration_seconds: 0.0,
        };
        // One endorsement per provider per message, whichever mention wins.
        let mut endorsed: HashSet<String> = HashSet::new();

        for mention in &mentions {
            let candidates = self.candidate_pool(mention).await?;
            let outcome = match self.matcher.find_best_match(&mention.text, &candidates) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(mention = %mention.text, error = %e, "Match skipped");
                    continue;
                }
            };

            if let Some(provider) = outcome.matched_provider.clone() {
                if !endorsed.insert(provider.id.clone()) {
                    continue;
                }
                let endorsement = self
                    .endorse(
                        message,
                        &classification,
                        outcome.confidence,
                        outcome.match_type.as_str(),
                        provider,
                        &attribution,
                    )
                    .await?;
                report.endorsements_created.push(endorsement);
            } else if self.should_create_provider(mention) {
                let provider = self.new_provider_from(mention, &mentions);
                self.providers
                    .save(&provider)
                    .await
                    .map_err(persistence("provider"))?;
                info!(provider = %provider.name, "Created provider from mention");
                report.notes.push(format!("created provider {}", provider.name));

                if endorsed.insert(provider.id.clone()) {
                    let endorsement = self
                        .endorse(
                            message,
                            &classification,
                            mention.confidence,
                            "new_provider",
                            provider,
                            &attribution,
                        )
                        .await?;
                    report.endorsements_created.push(endorsement);
                }
            }
        }

        if report.endorsements_created.is_empty() && report.notes.is_empty() {
            report.notes.push("no provider match".into());
        }
        report.duration_seconds = started.elapsed().as_secs_f64();
        info!(
            id = %message.id,
            endorsements = report.endorsements_created.len(),
            duration = report.duration_seconds,
            "Message processed"
        );
        Ok(report)
    }

    async fn record_request(
        &self,
        message: &GroupMessage,
        classification: &ClassificationResult,
    ) -> Result<(), PipelineError> {
        let record = RequestRecord {
            message_id: message.id.clone(),
            group_id: message.group_id.clone(),
            sender: message.sender.clone(),
            text: message.text.clone(),
            timestamp: message.timestamp,
            message_type: classification.message_type,
        };
        self.requests
            .record(&record)
            .await
            .map_err(persistence("request"))
    }

    /// Union of phone and name lookups, deduped by provider id.
    async fn candidate_pool(&self, mention: &Mention) -> Result<Vec<Provider>, PipelineError> {
        let mut pool: Vec<Provider> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        if mention.extraction_type == ExtractionType::PhonePattern
            || mention.extraction_type == ExtractionType::ContactPhoneNumber
        {
            let by_phone = self
                .providers
                .find_by_phone(&mention.text)
                .await
                .map_err(persistence("provider"))?;
            for provider in by_phone {
                if seen.insert(provider.id.clone()) {
                    pool.push(provider);
                }
            }
        }

        let by_name = self
            .providers
            .find_by_name_pattern(&mention.text)
            .await
            .map_err(persistence("provider"))?;
        for provider in by_name {
            if seen.insert(provider.id.clone()) {
                pool.push(provider);
            }
        }
        Ok(pool)
    }

    async fn endorse(
        &self,
        message: &GroupMessage,
        classification: &ClassificationResult,
        match_confidence: f64,
        match_type: &str,
        mut provider: Provider,
        attribution: &crate::context::AttributionResult,
    ) -> Result<Endorsement, PipelineError> {
        // Read-then-write without a transaction. A concurrent endorsement
        // of the same provider can lose an increment; accepted.
        provider.endorsement_count += 1;
        provider.updated_at = chrono::Utc::now();
        self.providers
            .save(&provider)
            .await
            .map_err(persistence("provider"))?;

        let confidence =
            MATCH_WEIGHT * match_confidence + CLASSIFICATION_WEIGHT * classification.confidence;
        let endorsement = Endorsement::new(
            &provider.id,
            &message.group_id,
            &message.sender,
            &message.text,
            confidence,
            match_type,
        )
        .with_attribution(
            attribution.request_message_id.clone(),
            attribution.confidence,
        );
        self.endorsements
            .save(&endorsement)
            .await
            .map_err(persistence("endorsement"))?;
        info!(
            provider = %provider.name,
            confidence = endorsement.confidence,
            match_type = %endorsement.match_type,
            "Endorsement created"
        );

        if let Some(notifier) = &self.notifier {
            // Fire and forget. Delivery failure is the notifier's problem.
            let notifier = Arc::clone(notifier);
            let event = endorsement.clone();
            tokio::spawn(async move {
                if let Err(e) = notifier.endorsement_created(&event).await {
                    warn!(error = %e, "Endorsement notification failed");
                }
            });
        }
        Ok(endorsement)
    }

    fn should_create_provider(&self, mention: &Mention) -> bool {
        mention.extraction_type.is_name_bearing()
            && mention.confidence >= self.config.create_provider_threshold
    }

    /// Build a provider record from an unmatched name mention, picking up
    /// a phone and a category from sibling mentions in the same message.
    fn new_provider_from(&self, mention: &Mention, all: &[Mention]) -> Provider {
        let mut provider = Provider::new(&mention.text);
        let phone = all
            .iter()
            .filter(|m| {
                m.extraction_type == ExtractionType::PhonePattern
                    || m.extraction_type == ExtractionType::ContactPhoneNumber
            })
            .find_map(|m| phone::canonicalize(&m.text));
        if let Some(phone) = phone {
            provider = provider.with_phone(&phone);
        }
        let category = mention.category.clone().or_else(|| {
            all.iter()
                .filter(|m| m.extraction_type == ExtractionType::ServiceKeyword)
                .find_map(|m| m.category.clone())
        });
        if let Some(category) = category {
            provider = provider.with_category(&category);
        }
        provider
    }
}

fn persistence(entity: &'static str) -> impl Fn(StoreError) -> PipelineError {
    move |source| PipelineError::Persistence { entity, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryEndorsementStore, MemoryProviderStore, MemoryRequestLog};
    use chrono::Utc;

    fn processor(providers: Arc<MemoryProviderStore>) -> MessageProcessor {
        MessageProcessor::new(
            &RulesConfig::default(),
            providers,
            Arc::new(MemoryEndorsementStore::new()),
            Arc::new(MemoryRequestLog::new()),
        )
        .unwrap()
    }

    fn message(text: &str) -> GroupMessage {
        GroupMessage {
            id: "m-1".into(),
            group_id: "g-1".into(),
            sender: "alice".into(),
            text: text.into(),
            timestamp: Utc::now(),
            quoted_message_id: None,
            contact: None,
        }
    }

    #[tokio::test]
    async fn request_is_recorded_not_endorsed() {
        let providers = Arc::new(MemoryProviderStore::new());
        let p = processor(Arc::clone(&providers));
        let report = p
            .process(&message("Anyone know a good plumber in Cape Town?"), None)
            .await
            .unwrap();
        assert!(report.success);
        assert!(report.endorsements_created.is_empty());
        assert_eq!(report.notes, vec!["request recorded for attribution"]);
    }

    #[tokio::test]
    async fn unknown_message_is_a_successful_noop() {
        let providers = Arc::new(MemoryProviderStore::new());
        let p = processor(Arc::clone(&providers));
        let report = p
            .process(&message("see you at the braai on saturday"), None)
            .await
            .unwrap();
        assert!(report.success);
        assert!(report.endorsements_created.is_empty());
    }

    #[tokio::test]
    async fn recommendation_endorses_existing_provider() {
        let providers = Arc::new(MemoryProviderStore::new());
        let existing = Provider::new("John Smith Plumbing").with_phone("+27821234567");
        providers.save(&existing).await.unwrap();

        let p = processor(Arc::clone(&providers));
        let report = p
            .process(
                &message("I highly recommend John Smith Plumbing, call 082 123 4567"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(report.endorsements_created.len(), 1);
        let updated = providers.get(&existing.id).await.unwrap().unwrap();
        assert_eq!(updated.endorsement_count, 1);
    }

    #[tokio::test]
    async fn confident_unmatched_name_creates_provider() {
        let providers = Arc::new(MemoryProviderStore::new());
        let p = processor(Arc::clone(&providers));
        let report = p
            .process(
                &message("We used Brightwater Plumbing Services, highly recommend them, 082 123 4567"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(report.endorsements_created.len(), 1);
        let created_id = &report.endorsements_created[0].provider_id;
        let created = providers.get(created_id).await.unwrap().unwrap();
        assert!(created.name.contains("Brightwater"));
        assert_eq!(created.phone.as_deref(), Some("+27821234567"));
    }

    #[tokio::test]
    async fn at_most_one_endorsement_per_provider() {
        let providers = Arc::new(MemoryProviderStore::new());
        let existing = Provider::new("John Smith Plumbing").with_phone("+27821234567");
        providers.save(&existing).await.unwrap();

        let p = processor(Arc::clone(&providers));
        // Name and phone both resolve to the same provider.
        let report = p
            .process(
                &message("Highly recommend John Smith Plumbing, 0821234567, really reliable"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(report.endorsements_created.len(), 1);
    }

    #[tokio::test]
    async fn caller_supplied_classification_is_honored() {
        let providers = Arc::new(MemoryProviderStore::new());
        let p = processor(Arc::clone(&providers));
        let classification = ClassificationResult {
            message_type: MessageType::Unknown,
            confidence: 0.0,
            keywords: Vec::new(),
            rule_matches: Vec::new(),
        };
        // Text reads like a recommendation but the caller already decided.
        let report = p
            .process(
                &message("I highly recommend John Smith Plumbing"),
                Some(classification),
            )
            .await
            .unwrap();
        assert!(report.endorsements_created.is_empty());
    }
}
