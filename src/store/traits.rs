//! Storage abstractions for providers, endorsements and the request log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::store::model::{Endorsement, EndorsementStatus, Provider, RequestRecord};

/// Persistence for service providers.
///
/// Phone numbers handed back by implementations are canonical "+27…" forms
/// so they compare cleanly after digit stripping.
#[async_trait]
pub trait ProviderStore: Send + Sync {
    /// Insert or update a provider by id.
    async fn save(&self, provider: &Provider) -> Result<(), StoreError>;

    /// Fetch a provider by id.
    async fn get(&self, id: &str) -> Result<Option<Provider>, StoreError>;

    /// Providers whose phone matches `phone` after canonicalization.
    async fn find_by_phone(&self, phone: &str) -> Result<Vec<Provider>, StoreError>;

    /// Providers whose name shares at least one word with `pattern`,
    /// case-insensitively. Used to build the candidate pool for matching.
    async fn find_by_name_pattern(&self, pattern: &str) -> Result<Vec<Provider>, StoreError>;
}

/// Persistence for endorsements.
#[async_trait]
pub trait EndorsementStore: Send + Sync {
    async fn save(&self, endorsement: &Endorsement) -> Result<(), StoreError>;

    /// Flip an endorsement between active and revoked.
    async fn set_status(&self, id: &str, status: EndorsementStatus) -> Result<(), StoreError>;

    async fn for_provider(&self, provider_id: &str) -> Result<Vec<Endorsement>, StoreError>;
}

/// Rolling log of recent request messages, used by attribution.
#[async_trait]
pub trait RequestLog: Send + Sync {
    async fn record(&self, request: &RequestRecord) -> Result<(), StoreError>;

    /// Requests in `group_id` no older than `cutoff`, oldest first.
    async fn recent(
        &self,
        group_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<RequestRecord>, StoreError>;
}
