use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

/// Single-slot mailbox: a new value replaces whatever was not yet consumed.
pub struct Latest1Queue<T> {
    slot: Mutex<Option<T>>,
    notify_any: Arc<Notify>,
}

impl<T> Latest1Queue<T> {
    pub fn new(notify_any: Arc<Notify>) -> Self {
        Self {
            slot: Mutex::new(None),
            notify_any,
        }
    }

    /// Store `value`. Returns true if an unread value was overwritten.
    pub fn set(&self, value: T) -> bool {
        let replaced = self
            .slot
            .lock()
            .expect("Latest1Queue poisoned")
            .replace(value)
            .is_some();
        self.notify_any.notify_one();
        replaced
    }

    pub fn try_recv(&self) -> Option<T> {
        self.slot.lock().expect("Latest1Queue poisoned").take()
    }
}
