//! Persistence: domain records, store traits and the two backends.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod model;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::{MemoryEndorsementStore, MemoryProviderStore, MemoryRequestLog};
pub use model::{Endorsement, EndorsementStatus, Provider, RequestRecord, TagValue};
pub use traits::{EndorsementStore, ProviderStore, RequestLog};
