//! Quota backend trait consumed by the host framework.

use super::definition::QuotaRequest;
use crate::error::Result;

/// Trait for quota backend implementations.
///
/// Every call returns the number of units granted or released. Running out
/// of capacity is reported as a zero or partial amount, never as an error.
pub trait QuotaBackend: Send + Sync {
    /// Allocate exactly the requested amount, or nothing.
    fn alloc(&self, request: &QuotaRequest) -> Result<i64>;

    /// Allocate as much of the requested amount as is available.
    fn alloc_best_effort(&self, request: &QuotaRequest) -> Result<i64>;

    /// Release up to the requested amount.
    fn release_best_effort(&self, request: &QuotaRequest) -> Result<i64>;

    /// Stop background work. Requests must not be issued afterwards.
    fn close(&self);
}
