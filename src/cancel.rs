//! Caller-supplied cancellation for long index scans.
//!
//! A [`CancelSignal`] combines a shared flag with an optional deadline. Scans
//! call [`CancelSignal::check`] between node visits and stop with
//! [`GisError::Cancelled`] or [`GisError::DeadlineExceeded`].

use crate::error::{GisError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::default(),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Request cancellation. Visible to every clone of this signal.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(GisError::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(GisError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// Check an optional signal.
#[inline]
pub(crate) fn checkpoint(signal: Option<&CancelSignal>) -> Result<()> {
    match signal {
        Some(signal) => signal.check(),
        None => Ok(()),
    }
}
