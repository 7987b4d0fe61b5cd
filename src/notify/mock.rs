//! Recording notifier for tests

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Notifier, NotifyError};
use crate::events::DispatchEvent;

/// Records every dispatched event; optionally fails every call
#[derive(Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<DispatchEvent>>>,
    failure: Arc<Mutex<Option<u16>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every dispatch with a rejection carrying `status`
    pub fn fail_with_status(&self, status: u16) {
        *lock(&self.failure) = Some(status);
    }

    pub fn succeed(&self) {
        *lock(&self.failure) = None;
    }

    /// Events that were accepted, in order
    pub fn sent(&self) -> Vec<DispatchEvent> {
        lock(&self.sent).clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.sent().into_iter().map(|e| e.event_type).collect()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn dispatch(&self, event: &DispatchEvent) -> Result<(), NotifyError> {
        let failure = *lock(&self.failure);
        if let Some(status) = failure {
            return Err(NotifyError::Rejected {
                status,
                body: "mock failure".to_string(),
            });
        }
        lock(&self.sent).push(event.clone());
        Ok(())
    }
}
