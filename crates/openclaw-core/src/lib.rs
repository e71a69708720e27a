//! Core utilities and types shared across all openclaw crates.
//!
//! This crate is deliberately small: it holds the error taxonomy (`error`)
//! and a handful of datetime/string utilities (`types`, `utils`) used
//! everywhere else. The durable state machine itself lives in
//! `openclaw-workflow`, built directly on `sea-orm` rather than on a generic
//! in-process executor.

pub mod error;
pub mod types;
pub mod utils;

pub use error::*;
pub use types::*;
pub use utils::*;

// Re-export external dependencies that other crates build on top of, so
// downstream crates pin a single version via this crate instead of each
// declaring their own.
pub use anyhow;
pub use async_trait;
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tokio;
pub use tracing;
pub use uuid;
