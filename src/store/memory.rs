//! In-memory store implementations backed by `tokio::sync::RwLock`.
//!
//! Used by tests and by deployments that do not need durability.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::matcher::phone;
use crate::store::model::{Endorsement, EndorsementStatus, Provider, RequestRecord};
use crate::store::traits::{EndorsementStore, ProviderStore, RequestLog};

#[derive(Default)]
pub struct MemoryProviderStore {
    providers: RwLock<HashMap<String, Provider>>,
}

impl MemoryProviderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProviderStore for MemoryProviderStore {
    async fn save(&self, provider: &Provider) -> Result<(), StoreError> {
        let mut providers = self.providers.write().await;
        providers.insert(provider.id.clone(), provider.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Provider>, StoreError> {
        let providers = self.providers.read().await;
        Ok(providers.get(id).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Vec<Provider>, StoreError> {
        let providers = self.providers.read().await;
        Ok(providers
            .values()
            .filter(|p| {
                p.phone
                    .as_deref()
                    .is_some_and(|stored| phone::fuzzy_equal(stored, phone))
            })
            .cloned()
            .collect())
    }

    async fn find_by_name_pattern(&self, pattern: &str) -> Result<Vec<Provider>, StoreError> {
        let needle: Vec<String> = pattern
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let providers = self.providers.read().await;
        Ok(providers
            .values()
            .filter(|p| {
                let name = p.name.to_lowercase();
                needle.iter().any(|word| {
                    name.split_whitespace().any(|n| n == word)
                })
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryEndorsementStore {
    endorsements: RwLock<HashMap<String, Endorsement>>,
}

impl MemoryEndorsementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EndorsementStore for MemoryEndorsementStore {
    async fn save(&self, endorsement: &Endorsement) -> Result<(), StoreError> {
        let mut endorsements = self.endorsements.write().await;
        endorsements.insert(endorsement.id.to_string(), endorsement.clone());
        Ok(())
    }

    async fn set_status(&self, id: &str, status: EndorsementStatus) -> Result<(), StoreError> {
        let mut endorsements = self.endorsements.write().await;
        match endorsements.get_mut(id) {
            Some(endorsement) => {
                endorsement.status = status;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "endorsement".into(),
                id: id.to_string(),
            }),
        }
    }

    async fn for_provider(&self, provider_id: &str) -> Result<Vec<Endorsement>, StoreError> {
        let endorsements = self.endorsements.read().await;
        let mut found: Vec<Endorsement> = endorsements
            .values()
            .filter(|e| e.provider_id == provider_id)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.created_at);
        Ok(found)
    }
}

/// How long a request stays useful for attribution. Matches the
/// attribution ceiling; older records can never be attributed to.
const DEFAULT_RETENTION_SECS: u64 = 3600;

pub struct MemoryRequestLog {
    requests: RwLock<Vec<RequestRecord>>,
    retention: chrono::Duration,
}

impl Default for MemoryRequestLog {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION_SECS)
    }
}

impl MemoryRequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention_secs: u64) -> Self {
        Self {
            requests: RwLock::new(Vec::new()),
            retention: chrono::Duration::seconds(retention_secs as i64),
        }
    }
}

#[async_trait]
impl RequestLog for MemoryRequestLog {
    async fn record(&self, request: &RequestRecord) -> Result<(), StoreError> {
        let mut requests = self.requests.write().await;
        // Evict on write so the log stays bounded by group traffic.
        let horizon = Utc::now() - self.retention;
        requests.retain(|r| r.timestamp >= horizon);
        requests.push(request.clone());
        Ok(())
    }

    async fn recent(
        &self,
        group_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<RequestRecord>, StoreError> {
        let requests = self.requests.read().await;
        let mut found: Vec<RequestRecord> = requests
            .iter()
            .filter(|r| r.group_id == group_id && r.timestamp >= cutoff)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.timestamp);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::MessageType;
    use chrono::Duration;

    #[tokio::test]
    async fn save_and_get_roundtrip() {
        let store = MemoryProviderStore::new();
        let provider = Provider::new("Joe's Plumbing").with_phone("+27821234567");
        store.save(&provider).await.unwrap();
        let fetched = store.get(&provider.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Joe's Plumbing");
    }

    #[tokio::test]
    async fn phone_lookup_tolerates_local_format() {
        let store = MemoryProviderStore::new();
        let provider = Provider::new("Joe's Plumbing").with_phone("+27821234567");
        store.save(&provider).await.unwrap();
        let found = store.find_by_phone("0821234567").await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn name_pattern_matches_shared_word() {
        let store = MemoryProviderStore::new();
        store.save(&Provider::new("Smith Plumbing")).await.unwrap();
        store.save(&Provider::new("Jones Electrical")).await.unwrap();
        let found = store.find_by_name_pattern("john smith").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Smith Plumbing");
    }

    #[tokio::test]
    async fn set_status_revokes() {
        let store = MemoryEndorsementStore::new();
        let endorsement = Endorsement::new("prov-1", "g-1", "alice", "great work", 0.8, "exact_name");
        store.save(&endorsement).await.unwrap();
        store
            .set_status(&endorsement.id.to_string(), EndorsementStatus::Revoked)
            .await
            .unwrap();
        let found = store.for_provider("prov-1").await.unwrap();
        assert_eq!(found[0].status, EndorsementStatus::Revoked);
    }

    #[tokio::test]
    async fn set_status_missing_is_not_found() {
        let store = MemoryEndorsementStore::new();
        let err = store
            .set_status("nope", EndorsementStatus::Revoked)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn recent_requests_respect_cutoff_and_group() {
        let log = MemoryRequestLog::new();
        let now = Utc::now();
        let mk = |id: &str, group: &str, age: i64| RequestRecord {
            message_id: id.into(),
            group_id: group.into(),
            sender: "bob".into(),
            text: "anyone know a plumber?".into(),
            timestamp: now - Duration::seconds(age),
            message_type: MessageType::Request,
        };
        log.record(&mk("old", "g-1", 7200)).await.unwrap();
        log.record(&mk("fresh", "g-1", 60)).await.unwrap();
        log.record(&mk("other", "g-2", 60)).await.unwrap();
        let found = log.recent("g-1", now - Duration::seconds(3600)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message_id, "fresh");
    }

    #[tokio::test]
    async fn stale_requests_are_evicted_on_record() {
        let log = MemoryRequestLog::new();
        let now = Utc::now();
        let mk = |id: &str, age: i64| RequestRecord {
            message_id: id.into(),
            group_id: "g-1".into(),
            sender: "bob".into(),
            text: "anyone know a plumber?".into(),
            timestamp: now - Duration::seconds(age),
            message_type: MessageType::Request,
        };
        for i in 0..100 {
            log.record(&mk(&format!("stale-{i}"), 172_800)).await.unwrap();
        }
        log.record(&mk("fresh", 60)).await.unwrap();
        // Even an unbounded query sees only what retention kept.
        let all = log.recent("g-1", DateTime::<Utc>::MIN_UTC).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].message_id, "fresh");
    }
}
