//! # Messages
//!
//! A [`Message`] wraps a batch of payload records plus an optional reference
//! to the detector it originates from. Once handed to the messenger it is
//! shared immutably between every receiver.

use pixsim_types::{Detector, Payload, PayloadType};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased view of a message, as seen by routing and by any-type filters.
pub trait BaseMessage: fmt::Debug + Send + Sync + 'static {
    /// Tag of the payload type; the routing key.
    fn payload_type(&self) -> PayloadType;

    /// Detector the message originates from, if any.
    fn detector(&self) -> Option<&Arc<Detector>>;

    /// Number of payload records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the payload records as JSON.
    fn to_json(&self) -> serde_json::Result<serde_json::Value>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A batch of `T` records.
pub struct Message<T> {
    data: Vec<T>,
    detector: Option<Arc<Detector>>,
}

impl<T: Payload> Message<T> {
    /// Message bound to a detector.
    #[must_use]
    pub fn new(data: Vec<T>, detector: Arc<Detector>) -> Self {
        Self {
            data,
            detector: Some(detector),
        }
    }

    /// Message without an origin detector (e.g. event-wide truth).
    #[must_use]
    pub fn global(data: Vec<T>) -> Self {
        Self {
            data,
            detector: None,
        }
    }

    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[must_use]
    pub fn detector(&self) -> Option<&Arc<Detector>> {
        self.detector.as_ref()
    }

    /// Recover the typed message from a type-erased one.
    ///
    /// Returns `None` if the payload type differs.
    pub fn downcast(message: Arc<dyn BaseMessage>) -> Option<Arc<Self>> {
        message.into_any().downcast::<Self>().ok()
    }
}

impl<T: Payload> BaseMessage for Message<T> {
    fn payload_type(&self) -> PayloadType {
        PayloadType::of::<T>()
    }

    fn detector(&self) -> Option<&Arc<Detector>> {
        self.detector.as_ref()
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(&self.data)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl<T: Payload> fmt::Debug for Message<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("payload", &T::NAME)
            .field("records", &self.data.len())
            .field("detector", &self.detector.as_ref().map(|d| d.name()))
            .finish()
    }
}
