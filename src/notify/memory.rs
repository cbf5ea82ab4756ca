//! Transport that records messages instead of sending them.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{ChatTarget, ChatTransport};
use crate::errors::TransportError;

#[derive(Default)]
struct Inner {
    sent: Vec<(ChatTarget, String)>,
    failing: Vec<ChatTarget>,
}

/// Records every delivered message; selected targets can be made to fail.
#[derive(Default)]
pub struct RecordingTransport {
    inner: Mutex<Inner>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn fail_target(&self, target: ChatTarget) {
        self.lock().failing.push(target);
    }

    /// Delivered messages in send order.
    pub fn sent(&self) -> Vec<(ChatTarget, String)> {
        self.lock().sent.clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send(&self, target: &ChatTarget, text: &str) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if inner.failing.contains(target) {
            return Err(TransportError::Api {
                target: target.to_string(),
                error: "user_not_found".to_string(),
            });
        }
        inner.sent.push((target.clone(), text.to_string()));
        Ok(())
    }
}
