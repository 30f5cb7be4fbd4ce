//! Memquota - In-Memory Quota Engine
//!
//! This crate implements a volatile, single-node quota engine. Quotas are
//! either hard caps on units in use or rate limits over a rolling time
//! window, and retried operations are made idempotent through a
//! deduplication id cache. State is not persisted and not shared between
//! processes.

pub mod config;
pub mod error;
pub mod quota;

pub use config::MemQuotaConfig;
pub use error::{QuotaError, Result};
pub use quota::{
    LabelType, LabelValue, Labels, MemQuota, QuotaBackend, QuotaDefinition, QuotaRequest,
    TickSource,
};
