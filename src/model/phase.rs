//! Per-project configuration phase.
//!
//! Lazy values created for a project's models register with the project's
//! phase. Readers blocked in [`LazyModelValue::wait`](super::LazyModelValue::wait)
//! are woken when the phase completes so that values nobody produced fail
//! instead of blocking forever.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Something that can be woken when the phase completes.
pub(crate) trait PhaseWaiter: Send + Sync {
    fn wake(&self);
}

struct PhaseInner {
    project: String,
    complete: AtomicBool,
    waiters: Mutex<Vec<Weak<dyn PhaseWaiter>>>,
}

/// Completion gate for one project's configuration phase.
#[derive(Clone)]
pub struct ConfigurationPhase {
    inner: Arc<PhaseInner>,
}

impl ConfigurationPhase {
    pub fn new(project: impl Into<String>) -> Self {
        ConfigurationPhase {
            inner: Arc::new(PhaseInner {
                project: project.into(),
                complete: AtomicBool::new(false),
                waiters: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn project(&self) -> &str {
        &self.inner.project
    }

    pub fn is_complete(&self) -> bool {
        self.inner.complete.load(Ordering::SeqCst)
    }

    /// Mark the phase complete and wake every blocked reader.
    ///
    /// Returns `false` if the phase had already completed.
    pub fn complete(&self) -> bool {
        if self.inner.complete.swap(true, Ordering::SeqCst) {
            return false;
        }

        let waiters = std::mem::take(
            &mut *self
                .inner
                .waiters
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        tracing::debug!(
            "configuration phase for {} complete, waking {} values",
            self.inner.project,
            waiters.len()
        );

        for waiter in waiters.iter().filter_map(Weak::upgrade) {
            waiter.wake();
        }
        true
    }

    pub(crate) fn register(&self, waiter: Weak<dyn PhaseWaiter>) {
        let mut waiters = self
            .inner
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Dropped values would otherwise accumulate for the whole phase
        waiters.retain(|w| w.strong_count() > 0);
        waiters.push(waiter);
    }
}

impl fmt::Debug for ConfigurationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationPhase")
            .field("project", &self.inner.project)
            .field("complete", &self.is_complete())
            .finish()
    }
}
