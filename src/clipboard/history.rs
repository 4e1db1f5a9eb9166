use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

pub const DEFAULT_CAPACITY: usize = 50;

/// Most-recent-first list of distinct clipboard values.
#[derive(Debug)]
pub struct ClipboardHistory {
    entries: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl Default for ClipboardHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ClipboardHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Clipboard history lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Record `text` unless it is empty or already the newest entry.
    /// Returns whether it was added.
    pub fn add(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let mut entries = self.lock();
        if entries.front().is_some_and(|head| head == text) {
            return false;
        }
        entries.push_front(text.to_string());
        entries.truncate(self.capacity);
        true
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<String> {
        self.lock().front().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
