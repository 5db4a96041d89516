//! Message processing pipeline: orchestration and its wire types.

pub mod processor;
pub mod types;

pub use processor::MessageProcessor;
pub use types::{GroupMessage, ProcessingReport};
