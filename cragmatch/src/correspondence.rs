//! The seam between the matcher and whatever produces raw point correspondences.
//!
//! A correspondence oracle is an external, stateful collaborator (typically a learned
//! dense matcher holding a device context). It may only serve one request at a time,
//! so every caller goes through [`SharedOracle`], which serializes access behind a lock.

use crate::config::OracleConfig;
use crate::error::{MatchError, MatchResult};
use crate::image_frame::ImageFrame;
use crate::point_pair::PointPair;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Produces raw correspondences between two working-resolution frames.
///
/// Output coordinates are in the working space of the respective frame. The list may
/// be empty and may contain outliers.
pub trait CorrespondenceOracle: Send {
    fn correspond(&mut self, a: &ImageFrame, b: &ImageFrame) -> MatchResult<Vec<PointPair>>;
}

impl<O: CorrespondenceOracle + ?Sized> CorrespondenceOracle for Box<O> {
    fn correspond(&mut self, a: &ImageFrame, b: &ImageFrame) -> MatchResult<Vec<PointPair>> {
        (**self).correspond(a, b)
    }
}

/// A process-wide oracle handle. Clones share the same oracle and the same lock.
pub struct SharedOracle<O> {
    inner: Arc<Mutex<O>>,
    timeout: Option<Duration>,
}

impl<O> Clone for SharedOracle<O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            timeout: self.timeout,
        }
    }
}

impl<O: CorrespondenceOracle> SharedOracle<O> {
    /// Wraps `oracle`; callers wait indefinitely for their turn.
    pub fn new(oracle: O) -> Self {
        Self {
            inner: Arc::new(Mutex::new(oracle)),
            timeout: None,
        }
    }

    pub fn from_config(oracle: O, config: &OracleConfig) -> Self {
        Self::new(oracle).with_timeout(config.lock_timeout_ms.map(Duration::from_millis))
    }

    /// Gives up with [`MatchError::Busy`] if the oracle is not free within `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs one correspondence request while holding the oracle exclusively.
    pub fn correspond(&self, a: &ImageFrame, b: &ImageFrame) -> MatchResult<Vec<PointPair>> {
        let waited = Instant::now();
        let mut oracle = match self.timeout {
            None => self.inner.lock(),
            Some(timeout) => self.inner.try_lock_for(timeout).ok_or(MatchError::Busy)?,
        };
        let started = Instant::now();
        let pairs = oracle.correspond(a, b)?;
        log::trace!(
            "oracle returned {} pairs in {:?} (waited {:?})",
            pairs.len(),
            started.elapsed(),
            started.duration_since(waited)
        );
        Ok(pairs)
    }

    /// Direct access to the wrapped oracle, under the same lock.
    pub fn with_oracle<R>(&self, f: impl FnOnce(&mut O) -> R) -> R {
        f(&mut self.inner.lock())
    }
}
