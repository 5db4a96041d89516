//! Error types for vouch.
//!
//! Taxonomy (see DESIGN.md):
//! 1. input-validation failures — raised immediately to the caller
//! 2. configuration failures — raised at construction, fatal
//! 3. per-engine / per-strategy failures — caught and logged, degraded
//! 4. store failures — wrapped into `PipelineError::Persistence`, re-raised
//! 5. attribution failures — degraded to a fallback result, never raised

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Classification error: {0}")]
    Classification(#[from] ClassificationError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Match error: {0}")]
    Match(#[from] MatchError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors. Always raised at construction time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required rule table: {0}")]
    MissingTable(String),

    #[error("Empty rule table: {0}")]
    EmptyTable(String),

    #[error("Invalid pattern in table {table}: '{pattern}': {message}")]
    InvalidPattern {
        table: String,
        pattern: String,
        message: String,
    },

    #[error("Invalid weight in table {table}: {key} = {weight} (must be in 0.0..=1.5)")]
    InvalidWeight {
        table: String,
        key: String,
        weight: f64,
    },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Message classification errors.
#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("Cannot classify an empty message")]
    EmptyMessage,

    #[error("Rule engine {engine} failed: {reason}")]
    EngineFailed { engine: String, reason: String },

    #[error("No rule engines enabled")]
    NoEngines,
}

/// Mention extraction errors.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Cannot extract mentions from an empty message")]
    EmptyMessage,

    #[error("Extraction strategy {strategy} failed: {reason}")]
    StrategyFailed { strategy: String, reason: String },
}

/// Provider matching errors.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Cannot match an empty mention")]
    EmptyMention,

    #[error("Match strategy {strategy} failed: {reason}")]
    StrategyFailed { strategy: String, reason: String },
}

/// Persistence-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Outbound notification errors. Delivery is fire-and-forget; these are
/// logged by the caller, never propagated through the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to deliver to {url}: {reason}")]
    SendFailed { url: String, reason: String },

    #[error("Endpoint {url} rejected the event: HTTP {status}")]
    Rejected { url: String, status: u16 },
}

/// Orchestrator-level errors. Only unrecoverable conditions surface here;
/// "no mentions" and "no match" are successful empty results, not errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Classification failed: {0}")]
    Classification(#[from] ClassificationError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Failed to persist {entity}: {source}")]
    Persistence {
        entity: &'static str,
        #[source]
        source: StoreError,
    },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
