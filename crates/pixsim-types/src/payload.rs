//! # Payload Marker
//!
//! Only types implementing [`Payload`] can be carried by a message. Binding a
//! receiver to anything else is a compile error at the registration call.

use serde::Serialize;
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A record type that may travel over the messenger in batches.
pub trait Payload: fmt::Debug + Serialize + Send + Sync + 'static {
    /// Stable, human-readable name used in logs and error messages.
    const NAME: &'static str;
}

/// Runtime tag for a payload type.
///
/// Equality and hashing only consider the `TypeId`; the name is carried along
/// for diagnostics.
#[derive(Clone, Copy)]
pub struct PayloadType {
    id: TypeId,
    name: &'static str,
}

impl PayloadType {
    /// Tag for the payload type `T`.
    #[must_use]
    pub fn of<T: Payload>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: T::NAME,
        }
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for PayloadType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PayloadType {}

impl Hash for PayloadType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
