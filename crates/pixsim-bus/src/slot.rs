//! # Receiver-Owned Storage
//!
//! Slots are owned by the receiving module. The messenger only holds the
//! delegate, which in turn holds a second handle to the slot; it never owns
//! the module itself.

use parking_lot::Mutex;
use pixsim_types::Payload;
use std::sync::Arc;

use crate::message::Message;

/// Storage for at most one message per unit of work.
pub struct SingleSlot<T> {
    inner: Arc<Mutex<Option<Arc<Message<T>>>>>,
}

impl<T: Payload> SingleSlot<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// The stored message, if any. The slot stays filled.
    #[must_use]
    pub fn get(&self) -> Option<Arc<Message<T>>> {
        self.inner.lock().clone()
    }

    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Empty the slot for the next unit of work.
    pub fn reset(&self) {
        *self.inner.lock() = None;
    }

    /// Store `message`, refusing if the slot is filled and `overwrite` is not
    /// allowed. Returns `false` on refusal.
    pub(crate) fn store(&self, message: Arc<Message<T>>, overwrite: bool) -> bool {
        let mut guard = self.inner.lock();
        if guard.is_some() && !overwrite {
            return false;
        }
        *guard = Some(message);
        true
    }

    /// Address of the shared storage, used to detect duplicate bindings.
    pub(crate) fn storage_id(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl<T: Payload> Default for SingleSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SingleSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Ordered storage for every message received in a unit of work.
pub struct MultiSlot<T> {
    inner: Arc<Mutex<Vec<Arc<Message<T>>>>>,
}

impl<T: Payload> MultiSlot<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Copy of the received messages, in dispatch order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Message<T>>> {
        self.inner.lock().clone()
    }

    /// Remove and return every received message, in dispatch order.
    pub fn drain(&self) -> Vec<Arc<Message<T>>> {
        std::mem::take(&mut *self.inner.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn reset(&self) {
        self.inner.lock().clear();
    }

    pub(crate) fn push(&self, message: Arc<Message<T>>) {
        self.inner.lock().push(message);
    }

    pub(crate) fn storage_id(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl<T: Payload> Default for MultiSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MultiSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
