// Outbound chat messages

use log::info;
use std::sync::{Mutex, PoisonError};

/// Destination for user-visible messages (interlock warnings, save/load notices)
pub trait MessageSink: Send + Sync {
    fn send_message(&self, text: &str);
}

/// Sink that writes messages to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl MessageSink for LogSink {
    fn send_message(&self, text: &str) {
        info!("chat: {}", text);
    }
}

/// Sink that keeps messages until they are taken
#[derive(Debug, Default)]
pub struct BufferedSink {
    messages: Mutex<Vec<String>>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every queued message
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageSink for BufferedSink {
    fn send_message(&self, text: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
    }
}
