//! Vouch — group-chat recommendation understanding and provider resolution.

pub mod classify;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod notify;
pub mod pipeline;
pub mod store;
pub mod webhook;
