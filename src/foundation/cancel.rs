use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::foundation::error::{ButterflowError, ButterflowResult};

/// Shared flag observed by the render loop and the interpolation workers.
///
/// Clones share the same flag; once cancelled a token stays cancelled.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Return [`ButterflowError::Cancelled`] once the token has been tripped.
    pub fn check(&self) -> ButterflowResult<()> {
        if self.is_cancelled() {
            return Err(ButterflowError::Cancelled);
        }
        Ok(())
    }
}
