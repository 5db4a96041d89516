//! libSQL backend for providers and endorsements.
//!
//! Supports local file and in-memory databases. Phone lookups fetch the
//! phone-bearing rows and compare in Rust, since the digit-level fuzzy
//! equivalence does not map onto SQL.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{params, Connection, Database as LibSqlDatabase};
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use crate::matcher::phone;
use crate::store::migrations;
use crate::store::model::{Endorsement, EndorsementStatus, Provider, TagValue};
use crate::store::traits::{EndorsementStore, ProviderStore};

/// libSQL store backend.
///
/// Holds a single connection reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
/// Anything else is a corrupt row and surfaces as a store error.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(ndt.and_utc());
    }
    Err(StoreError::Serialization(format!(
        "Unparseable stored timestamp: {s:?}"
    )))
}

/// Column order: 0:id, 1:name, 2:phone, 3:category, 4:tags,
/// 5:endorsement_count, 6:created_at, 7:updated_at
fn row_to_provider(row: &libsql::Row) -> Result<Provider, StoreError> {
    let get_err = |e: libsql::Error| StoreError::Query(format!("Failed to read provider row: {e}"));
    let tags_json: String = row.get(4).map_err(get_err)?;
    let tags: std::collections::BTreeMap<String, TagValue> = serde_json::from_str(&tags_json)
        .map_err(|e| StoreError::Serialization(format!("Bad provider tags JSON: {e}")))?;
    let created: String = row.get(6).map_err(get_err)?;
    let updated: String = row.get(7).map_err(get_err)?;
    Ok(Provider {
        id: row.get(0).map_err(get_err)?,
        name: row.get(1).map_err(get_err)?,
        phone: row.get(2).map_err(get_err)?,
        category: row.get(3).map_err(get_err)?,
        tags,
        endorsement_count: row.get::<i64>(5).map_err(get_err)?.max(0) as u64,
        created_at: parse_datetime(&created)?,
        updated_at: parse_datetime(&updated)?,
    })
}

/// Column order: 0:id, 1:provider_id, 2:group_id, 3:endorser,
/// 4:message_text, 5:confidence, 6:match_type, 7:request_message_id,
/// 8:attribution_confidence, 9:status, 10:created_at
fn row_to_endorsement(row: &libsql::Row) -> Result<Endorsement, StoreError> {
    let get_err =
        |e: libsql::Error| StoreError::Query(format!("Failed to read endorsement row: {e}"));
    let id_str: String = row.get(0).map_err(get_err)?;
    let status_str: String = row.get(9).map_err(get_err)?;
    let created: String = row.get(10).map_err(get_err)?;
    Ok(Endorsement {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        provider_id: row.get(1).map_err(get_err)?,
        group_id: row.get(2).map_err(get_err)?,
        endorser: row.get(3).map_err(get_err)?,
        message_text: row.get(4).map_err(get_err)?,
        confidence: row.get(5).map_err(get_err)?,
        match_type: row.get(6).map_err(get_err)?,
        request_message_id: row.get(7).map_err(get_err)?,
        attribution_confidence: row.get(8).map_err(get_err)?,
        status: EndorsementStatus::parse(&status_str),
        created_at: parse_datetime(&created)?,
    })
}

const PROVIDER_COLUMNS: &str =
    "id, name, phone, category, tags, endorsement_count, created_at, updated_at";

const ENDORSEMENT_COLUMNS: &str = "id, provider_id, group_id, endorser, message_text, confidence, \
     match_type, request_message_id, attribution_confidence, status, created_at";

#[async_trait]
impl ProviderStore for LibSqlStore {
    async fn save(&self, provider: &Provider) -> Result<(), StoreError> {
        let tags = serde_json::to_string(&provider.tags)
            .map_err(|e| StoreError::Serialization(format!("Bad provider tags: {e}")))?;
        self.conn
            .execute(
                "INSERT INTO providers (id, name, phone, category, tags, endorsement_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     phone = excluded.phone,
                     category = excluded.category,
                     tags = excluded.tags,
                     endorsement_count = excluded.endorsement_count,
                     updated_at = excluded.updated_at",
                params![
                    provider.id.clone(),
                    provider.name.clone(),
                    provider.phone.clone(),
                    provider.category.clone(),
                    tags,
                    provider.endorsement_count as i64,
                    provider.created_at.to_rfc3339(),
                    provider.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to save provider: {e}")))?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Provider>, StoreError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PROVIDER_COLUMNS} FROM providers WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to fetch provider: {e}")))?;
        match rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read provider: {e}")))?
        {
            Some(row) => Ok(Some(row_to_provider(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_phone(&self, phone_text: &str) -> Result<Vec<Provider>, StoreError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PROVIDER_COLUMNS} FROM providers WHERE phone IS NOT NULL"),
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to query providers by phone: {e}")))?;

        let mut found = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read provider: {e}")))?
        {
            let provider = row_to_provider(&row)?;
            if provider
                .phone
                .as_deref()
                .is_some_and(|stored| phone::fuzzy_equal(stored, phone_text))
            {
                found.push(provider);
            }
        }
        Ok(found)
    }

    async fn find_by_name_pattern(&self, pattern: &str) -> Result<Vec<Provider>, StoreError> {
        let mut found = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for word in pattern.to_lowercase().split_whitespace() {
            let like = format!("%{word}%");
            let mut rows = self
                .conn
                .query(
                    &format!("SELECT {PROVIDER_COLUMNS} FROM providers WHERE LOWER(name) LIKE ?1"),
                    params![like],
                )
                .await
                .map_err(|e| {
                    StoreError::Query(format!("Failed to query providers by name: {e}"))
                })?;
            while let Some(row) = rows
                .next()
                .await
                .map_err(|e| StoreError::Query(format!("Failed to read provider: {e}")))?
            {
                let provider = row_to_provider(&row)?;
                // LIKE is substring; keep whole-word hits only.
                let hit = provider
                    .name
                    .to_lowercase()
                    .split_whitespace()
                    .any(|n| n == word);
                if hit && seen.insert(provider.id.clone()) {
                    found.push(provider);
                }
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl EndorsementStore for LibSqlStore {
    async fn save(&self, endorsement: &Endorsement) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO endorsements (id, provider_id, group_id, endorser, message_text, confidence,
                     match_type, request_message_id, attribution_confidence, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(id) DO UPDATE SET status = excluded.status",
                params![
                    endorsement.id.to_string(),
                    endorsement.provider_id.clone(),
                    endorsement.group_id.clone(),
                    endorsement.endorser.clone(),
                    endorsement.message_text.clone(),
                    endorsement.confidence,
                    endorsement.match_type.clone(),
                    endorsement.request_message_id.clone(),
                    endorsement.attribution_confidence,
                    endorsement.status.as_str(),
                    endorsement.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to save endorsement: {e}")))?;
        Ok(())
    }

    async fn set_status(&self, id: &str, status: EndorsementStatus) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute(
                "UPDATE endorsements SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to update endorsement: {e}")))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "endorsement".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn for_provider(&self, provider_id: &str) -> Result<Vec<Endorsement>, StoreError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {ENDORSEMENT_COLUMNS} FROM endorsements
                     WHERE provider_id = ?1 ORDER BY created_at"
                ),
                params![provider_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to query endorsements: {e}")))?;

        let mut found = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read endorsement: {e}")))?
        {
            found.push(row_to_endorsement(&row)?);
        }
        Ok(found)
    }
}
