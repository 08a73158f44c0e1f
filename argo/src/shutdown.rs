//! Cooperative cancellation.
//!
//! Analyses poll a [`ShutdownNotifier`] between iterations. Notifiers form a tree: a child
//! observes every request made on its ancestors, while a request on the child leaves the parent
//! running. Portfolio members each get a child of a shared notifier, so cancelling the shared one
//! stops all of them.

use crate::CpaError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    reason: Mutex<Option<String>>,
    deadline: Option<Instant>,
    parent: Option<ShutdownNotifier>,
}

#[derive(Debug, Clone, Default)]
pub struct ShutdownNotifier {
    inner: Arc<Inner>,
}

impl ShutdownNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that also fires once `limit` has elapsed.
    pub fn with_time_limit(limit: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                deadline: Some(Instant::now() + limit),
                ..Inner::default()
            }),
        }
    }

    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                parent: Some(self.clone()),
                ..Inner::default()
            }),
        }
    }

    pub fn request_shutdown<S: Into<String>>(&self, reason: S) {
        if let Ok(mut r) = self.inner.reason.lock() {
            r.get_or_insert_with(|| reason.into());
        }
        self.inner.requested.store(true, Ordering::SeqCst);
    }

    pub fn should_shutdown(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
            || self.inner.deadline.is_some_and(|d| Instant::now() >= d)
            || self
                .inner
                .parent
                .as_ref()
                .is_some_and(|p| p.should_shutdown())
    }

    pub fn reason(&self) -> Option<String> {
        if self.inner.requested.load(Ordering::SeqCst) {
            return self.inner.reason.lock().ok().and_then(|r| r.clone());
        }
        if self.inner.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some("time limit reached".to_string());
        }
        self.inner.parent.as_ref().and_then(|p| p.reason())
    }

    /// `Err(CpaError::Interrupted)` once shutdown was requested.
    pub fn check(&self) -> Result<(), CpaError> {
        if self.should_shutdown() {
            Err(CpaError::Interrupted)
        } else {
            Ok(())
        }
    }
}
