use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use tokio::sync::Notify;

/// FIFO that refuses new values while full, so the first commands queued win.
pub struct BoundedDropNewestQueue<T> {
    inner: Arc<BoundedInner<T>>,
}

struct BoundedInner<T> {
    buf: Mutex<VecDeque<T>>,
    capacity: usize,
    notify_any: Arc<Notify>,
}

pub struct BoundedDropNewestReceiver<T> {
    inner: Arc<BoundedInner<T>>,
}

impl<T> BoundedDropNewestQueue<T> {
    pub fn new(capacity: usize, notify_any: Arc<Notify>) -> Self {
        assert!(capacity > 0);

        Self {
            inner: Arc::new(BoundedInner {
                buf: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                notify_any,
            }),
        }
    }

    /// Queue `value`, handing it back if the queue is full.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let mut buf = self.inner.buf.lock().expect("BoundedDropNewestQueue poisoned");
        if buf.len() >= self.inner.capacity {
            return Err(value);
        }
        buf.push_back(value);
        drop(buf);
        self.inner.notify_any.notify_one();
        Ok(())
    }

    pub fn receiver(&self) -> BoundedDropNewestReceiver<T> {
        BoundedDropNewestReceiver {
            inner: self.inner.clone(),
        }
    }
}

impl<T> BoundedDropNewestReceiver<T> {
    pub fn try_recv(&self) -> Option<T> {
        self.inner
            .buf
            .lock()
            .expect("BoundedDropNewestQueue poisoned")
            .pop_front()
    }
}
