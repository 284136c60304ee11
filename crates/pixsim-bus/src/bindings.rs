//! # Bindings
//!
//! Per-module registration surface. A module creates one [`Bindings`] in its
//! constructor, binds the storage it wants filled, and reads that storage in
//! `run`. The driver uses the same object between units of work to check
//! required bindings and to reset storage, and at teardown to release every
//! delegate.

use pixsim_types::{ModuleIdentity, Payload};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::MessengerError;
use crate::flags::MsgFlags;
use crate::message::{BaseMessage, Message};
use crate::messenger::{DelegateHandle, DispatchReport, Messenger};
use crate::slot::{MultiSlot, SingleSlot};

/// Delegates registered on behalf of one module.
pub struct Bindings {
    messenger: Arc<Messenger>,
    identity: ModuleIdentity,
    handles: Vec<DelegateHandle>,
}

impl Bindings {
    pub fn new(messenger: Arc<Messenger>, identity: ModuleIdentity) -> Self {
        Self {
            messenger,
            identity,
            handles: Vec::new(),
        }
    }

    pub fn identity(&self) -> &ModuleIdentity {
        &self.identity
    }

    pub fn messenger(&self) -> &Arc<Messenger> {
        &self.messenger
    }

    /// Handles of the delegates this module registered, in registration order.
    pub fn handles(&self) -> &[DelegateHandle] {
        &self.handles
    }

    // -------------------------------------------------------------------------
    // Receiving
    // -------------------------------------------------------------------------

    /// Create a single-message slot and bind it.
    pub fn bind_single<T: Payload>(&mut self, flags: MsgFlags) -> Result<SingleSlot<T>, MessengerError> {
        let slot = SingleSlot::new();
        let handle = self.messenger.bind_single(&self.identity, &slot, flags)?;
        self.handles.push(handle);
        Ok(slot)
    }

    /// Create an accumulating slot and bind it.
    pub fn bind_multi<T: Payload>(&mut self, flags: MsgFlags) -> Result<MultiSlot<T>, MessengerError> {
        let slot = MultiSlot::new();
        let handle = self.messenger.bind_multi(&self.identity, &slot, flags)?;
        self.handles.push(handle);
        Ok(slot)
    }

    pub fn register_filter<T, F>(&mut self, filter: F, flags: MsgFlags) -> Result<DelegateHandle, MessengerError>
    where
        T: Payload,
        F: Fn(&Arc<Message<T>>) -> bool + Send + Sync + 'static,
    {
        let handle = self.messenger.register_filter(&self.identity, filter, flags)?;
        self.handles.push(handle.clone());
        Ok(handle)
    }

    /// Register a filter for every payload type, regardless of name.
    pub fn register_any_filter<F>(&mut self, filter: F) -> Result<DelegateHandle, MessengerError>
    where
        F: Fn(&Arc<dyn BaseMessage>, &str) -> bool + Send + Sync + 'static,
    {
        self.register_any_filter_with(filter, MsgFlags::IGNORE_NAME)
    }

    pub fn register_any_filter_with<F>(&mut self, filter: F, flags: MsgFlags) -> Result<DelegateHandle, MessengerError>
    where
        F: Fn(&Arc<dyn BaseMessage>, &str) -> bool + Send + Sync + 'static,
    {
        let handle = self.messenger.register_any_filter(&self.identity, filter, flags)?;
        self.handles.push(handle.clone());
        Ok(handle)
    }

    // -------------------------------------------------------------------------
    // Producing
    // -------------------------------------------------------------------------

    /// Dispatch under this module's output name.
    pub fn dispatch<T: Payload>(&self, message: Message<T>) -> Result<DispatchReport, MessengerError> {
        self.messenger.dispatch(&self.identity, Arc::new(message))
    }

    pub fn dispatch_named<T: Payload>(&self, message: Message<T>, name: &str) -> Result<DispatchReport, MessengerError> {
        self.messenger.dispatch_named(&self.identity, Arc::new(message), name)
    }

    /// Whether a message like `message` would reach anyone.
    pub fn has_receiver<T: Payload>(&self, message: &Message<T>) -> bool {
        self.messenger.has_receiver(&self.identity, message)
    }

    // -------------------------------------------------------------------------
    // Unit-of-work lifecycle
    // -------------------------------------------------------------------------

    /// Empty every slot and filter delivery flag.
    pub fn reset(&self) {
        for handle in &self.handles {
            handle.reset();
        }
    }

    /// One error per `REQUIRED` binding that received nothing.
    pub fn unmet_requirements(&self) -> Vec<MessengerError> {
        self.handles
            .iter()
            .filter_map(DelegateHandle::unmet_requirement)
            .collect()
    }

    /// Remove every delegate from the messenger.
    ///
    /// All removals are attempted; the first failure is returned.
    pub fn release(&mut self) -> Result<(), MessengerError> {
        let mut first_error = None;
        for handle in self.handles.drain(..) {
            if let Err(err) = self.messenger.remove_delegate(&handle) {
                first_error.get_or_insert(err);
            }
        }
        debug!(module = %self.identity, "Bindings released");
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for Bindings {
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        warn!(
            module = %self.identity,
            delegates = self.handles.len(),
            "Bindings dropped without release"
        );
        if let Err(err) = self.release() {
            warn!(module = %self.identity, error = %err, "Failed to release bindings on drop");
        }
    }
}

impl std::fmt::Debug for Bindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bindings")
            .field("module", &self.identity.unique_name())
            .field("delegates", &self.handles.len())
            .finish()
    }
}
