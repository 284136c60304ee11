//! # Delegates
//!
//! A delegate is the type-erased subscription record the messenger stores.
//! Each variant is generic over the payload type it was registered for, so
//! the typed slot or callback is captured once at registration; dispatch
//! only ever hands it the matching `Message<T>` behind a `dyn BaseMessage`.

use pixsim_types::{ModuleIdentity, Payload, PayloadType};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::MessengerError;
use crate::flags::{DelegateKind, MsgFlags};
use crate::message::{BaseMessage, Message};
use crate::slot::{MultiSlot, SingleSlot};

/// Registration-ordered identifier of a delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DelegateId(pub(crate) u64);

impl fmt::Display for DelegateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Typed filter callback.
pub type FilterFn<T> = dyn Fn(&Arc<Message<T>>) -> bool + Send + Sync;

/// Callback receiving every message of every type plus the name it was
/// dispatched under.
pub type AnyFilterFn = dyn Fn(&Arc<dyn BaseMessage>, &str) -> bool + Send + Sync;

/// Capabilities shared by all delegate variants.
pub trait Delegate: Send + Sync {
    fn id(&self) -> DelegateId;

    fn kind(&self) -> DelegateKind;

    fn flags(&self) -> MsgFlags;

    /// Module the delegate delivers to.
    fn receiver(&self) -> &ModuleIdentity;

    /// Payload type the delegate listens to; `None` for any-type filters.
    fn payload(&self) -> Option<PayloadType>;

    /// Identity string used in diagnostics.
    fn unique_name(&self) -> &str;

    /// Receiver storage this delegate writes to, if it has any.
    fn storage_id(&self) -> Option<usize> {
        None
    }

    /// Deliver one message. Returns whether the receiver accepted it.
    fn process(&self, message: &Arc<dyn BaseMessage>, name: &str) -> Result<bool, MessengerError>;

    /// Whether the delegate has received (and accepted) data in the current
    /// unit of work.
    fn is_satisfied(&self) -> bool;

    /// Return to the empty state for the next unit of work.
    fn reset(&self);
}

impl fmt::Debug for dyn Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("id", &self.id())
            .field("name", &self.unique_name())
            .field("flags", &self.flags())
            .finish()
    }
}

/// Fields every variant carries.
struct DelegateCore {
    id: DelegateId,
    receiver: ModuleIdentity,
    flags: MsgFlags,
    unique_name: String,
}

impl DelegateCore {
    fn new(id: DelegateId, receiver: ModuleIdentity, flags: MsgFlags, kind: DelegateKind, payload: &str) -> Self {
        let unique_name = format!("{}/{}<{}>{}", receiver, kind, payload, id);
        Self {
            id,
            receiver,
            flags,
            unique_name,
        }
    }

    fn downcast<T: Payload>(&self, message: &Arc<dyn BaseMessage>) -> Result<Arc<Message<T>>, MessengerError> {
        Message::<T>::downcast(Arc::clone(message)).ok_or_else(|| {
            MessengerError::Consistency(format!(
                "{} was routed a {} message",
                self.unique_name,
                message.payload_type()
            ))
        })
    }
}

// =============================================================================
// SINGLE-SLOT
// =============================================================================

pub(crate) struct SingleDelegate<T> {
    core: DelegateCore,
    slot: SingleSlot<T>,
}

impl<T: Payload> SingleDelegate<T> {
    pub(crate) fn new(id: DelegateId, receiver: ModuleIdentity, slot: SingleSlot<T>, flags: MsgFlags) -> Self {
        Self {
            core: DelegateCore::new(id, receiver, flags, DelegateKind::Single, T::NAME),
            slot,
        }
    }
}

impl<T: Payload> Delegate for SingleDelegate<T> {
    fn id(&self) -> DelegateId {
        self.core.id
    }

    fn kind(&self) -> DelegateKind {
        DelegateKind::Single
    }

    fn flags(&self) -> MsgFlags {
        self.core.flags
    }

    fn receiver(&self) -> &ModuleIdentity {
        &self.core.receiver
    }

    fn payload(&self) -> Option<PayloadType> {
        Some(PayloadType::of::<T>())
    }

    fn unique_name(&self) -> &str {
        &self.core.unique_name
    }

    fn storage_id(&self) -> Option<usize> {
        Some(self.slot.storage_id())
    }

    fn process(&self, message: &Arc<dyn BaseMessage>, name: &str) -> Result<bool, MessengerError> {
        let typed = self.core.downcast::<T>(message)?;
        let overwrite = self.core.flags.contains(MsgFlags::ALLOW_OVERWRITE);
        if !self.slot.store(typed, overwrite) {
            return Err(MessengerError::InvalidBinding {
                delegate: self.core.unique_name.clone(),
                payload: T::NAME,
                name: name.to_owned(),
                reason: "single-slot binding already received a message in this unit of work".to_string(),
            });
        }
        Ok(true)
    }

    fn is_satisfied(&self) -> bool {
        self.slot.is_filled()
    }

    fn reset(&self) {
        self.slot.reset();
    }
}

// =============================================================================
// MULTI-SLOT
// =============================================================================

pub(crate) struct MultiDelegate<T> {
    core: DelegateCore,
    slot: MultiSlot<T>,
}

impl<T: Payload> MultiDelegate<T> {
    pub(crate) fn new(id: DelegateId, receiver: ModuleIdentity, slot: MultiSlot<T>, flags: MsgFlags) -> Self {
        Self {
            core: DelegateCore::new(id, receiver, flags, DelegateKind::Multi, T::NAME),
            slot,
        }
    }
}

impl<T: Payload> Delegate for MultiDelegate<T> {
    fn id(&self) -> DelegateId {
        self.core.id
    }

    fn kind(&self) -> DelegateKind {
        DelegateKind::Multi
    }

    fn flags(&self) -> MsgFlags {
        self.core.flags
    }

    fn receiver(&self) -> &ModuleIdentity {
        &self.core.receiver
    }

    fn payload(&self) -> Option<PayloadType> {
        Some(PayloadType::of::<T>())
    }

    fn unique_name(&self) -> &str {
        &self.core.unique_name
    }

    fn storage_id(&self) -> Option<usize> {
        Some(self.slot.storage_id())
    }

    fn process(&self, message: &Arc<dyn BaseMessage>, _name: &str) -> Result<bool, MessengerError> {
        let typed = self.core.downcast::<T>(message)?;
        self.slot.push(typed);
        Ok(true)
    }

    fn is_satisfied(&self) -> bool {
        !self.slot.is_empty()
    }

    fn reset(&self) {
        self.slot.reset();
    }
}

// =============================================================================
// FILTERS
// =============================================================================

pub(crate) struct FilterDelegate<T> {
    core: DelegateCore,
    filter: Box<FilterFn<T>>,
    delivered: AtomicBool,
}

impl<T: Payload> FilterDelegate<T> {
    pub(crate) fn new(id: DelegateId, receiver: ModuleIdentity, filter: Box<FilterFn<T>>, flags: MsgFlags) -> Self {
        Self {
            core: DelegateCore::new(id, receiver, flags, DelegateKind::Filter, T::NAME),
            filter,
            delivered: AtomicBool::new(false),
        }
    }
}

impl<T: Payload> Delegate for FilterDelegate<T> {
    fn id(&self) -> DelegateId {
        self.core.id
    }

    fn kind(&self) -> DelegateKind {
        DelegateKind::Filter
    }

    fn flags(&self) -> MsgFlags {
        self.core.flags
    }

    fn receiver(&self) -> &ModuleIdentity {
        &self.core.receiver
    }

    fn payload(&self) -> Option<PayloadType> {
        Some(PayloadType::of::<T>())
    }

    fn unique_name(&self) -> &str {
        &self.core.unique_name
    }

    fn process(&self, message: &Arc<dyn BaseMessage>, _name: &str) -> Result<bool, MessengerError> {
        let typed = self.core.downcast::<T>(message)?;
        let accepted = (self.filter)(&typed);
        if accepted {
            self.delivered.store(true, Ordering::Release);
        }
        Ok(accepted)
    }

    fn is_satisfied(&self) -> bool {
        self.delivered.load(Ordering::Acquire)
    }

    fn reset(&self) {
        self.delivered.store(false, Ordering::Release);
    }
}

pub(crate) struct AnyFilterDelegate {
    core: DelegateCore,
    filter: Box<AnyFilterFn>,
    delivered: AtomicBool,
}

impl AnyFilterDelegate {
    pub(crate) fn new(id: DelegateId, receiver: ModuleIdentity, filter: Box<AnyFilterFn>, flags: MsgFlags) -> Self {
        Self {
            core: DelegateCore::new(id, receiver, flags, DelegateKind::AnyFilter, "*"),
            filter,
            delivered: AtomicBool::new(false),
        }
    }
}

impl Delegate for AnyFilterDelegate {
    fn id(&self) -> DelegateId {
        self.core.id
    }

    fn kind(&self) -> DelegateKind {
        DelegateKind::AnyFilter
    }

    fn flags(&self) -> MsgFlags {
        self.core.flags
    }

    fn receiver(&self) -> &ModuleIdentity {
        &self.core.receiver
    }

    fn payload(&self) -> Option<PayloadType> {
        None
    }

    fn unique_name(&self) -> &str {
        &self.core.unique_name
    }

    fn process(&self, message: &Arc<dyn BaseMessage>, name: &str) -> Result<bool, MessengerError> {
        let accepted = (self.filter)(message, name);
        if accepted {
            self.delivered.store(true, Ordering::Release);
        }
        Ok(accepted)
    }

    fn is_satisfied(&self) -> bool {
        self.delivered.load(Ordering::Acquire)
    }

    fn reset(&self) {
        self.delivered.store(false, Ordering::Release);
    }
}
