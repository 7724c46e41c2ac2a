//! Cooperative cancellation.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag checked between units of work (one page, one object, one
/// image). Clones observe the same flag.
///
/// ```
/// use pdf_splice::cancel::CancellationFlag;
///
/// let flag = CancellationFlag::new();
/// let handle = flag.clone();
/// assert!(flag.check().is_ok());
/// handle.cancel();
/// assert!(flag.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// A flag that has not been raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Error::Cancelled)` once the flag is raised.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Check an optional flag.
pub(crate) fn check(flag: Option<&CancellationFlag>) -> Result<()> {
    flag.map_or(Ok(()), CancellationFlag::check)
}
