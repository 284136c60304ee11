//! # Messenger
//!
//! The delegate registry. Maps payload type -> listen name -> delegates in
//! registration order, with a reverse index from delegate id to its bucket.
//!
//! ## Routing
//!
//! For a message of payload `T` dispatched under name `n` by a producer in
//! lane `L`, the candidates are, in this order:
//!
//! 1. delegates registered for `T` under name `n` or under the wildcard name,
//!    merged in registration order;
//! 2. any-type filters under name `n` or the wildcard name, merged in
//!    registration order.
//!
//! A candidate is skipped if its receiver runs in a lane other than `L`, or if
//! both the receiver and the message belong to a detector and the detectors
//! differ. Producers are not excluded from receiving their own messages.
//!
//! ## Locking
//!
//! One mutex guards the forward map, the reverse index and the dispatch log.
//! Dispatch holds it while invoking delegates, so a delegate removed by a
//! concurrent teardown is never invoked afterwards. Delegate callbacks must
//! therefore never call back into the messenger.

use parking_lot::Mutex;
use pixsim_types::{LaneId, ModuleIdentity, Payload, PayloadType};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

use crate::delegate::{
    AnyFilterDelegate, Delegate, DelegateId, FilterDelegate, MultiDelegate, SingleDelegate,
};
use crate::error::MessengerError;
use crate::flags::{incompatibility, DelegateKind, MsgFlags};
use crate::message::{BaseMessage, Message};
use crate::metrics::{MessengerMetrics, MessengerStats};
use crate::slot::{MultiSlot, SingleSlot};

/// First-level key: a concrete payload type or the any-type wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Any,
    Payload(PayloadType),
}

/// Second-level key: an exact message name or the wildcard.
///
/// The wildcard is distinct from every string, including the empty one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameKey {
    Any,
    Exact(String),
}

impl NameKey {
    /// Bucket a receiver's delegate is stored under.
    fn for_receiver(receiver: &ModuleIdentity, flags: MsgFlags) -> Self {
        if flags.contains(MsgFlags::IGNORE_NAME) {
            Self::Any
        } else if flags.contains(MsgFlags::UNNAMED_ONLY) {
            Self::Exact(String::new())
        } else {
            Self::Exact(receiver.input().to_owned())
        }
    }
}

impl fmt::Display for NameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Exact(name) => f.write_str(name),
        }
    }
}

type Bucket = BTreeMap<DelegateId, Arc<dyn Delegate>>;

#[derive(Default)]
struct RegistryState {
    delegates: HashMap<TypeKey, HashMap<NameKey, Bucket>>,
    index: HashMap<DelegateId, (TypeKey, NameKey)>,
    sent: HashMap<LaneId, Vec<Arc<dyn BaseMessage>>>,
}

/// Handle to a registered delegate, returned by every registration call.
///
/// Needed to remove the delegate again. Cloning the handle does not
/// duplicate the registration.
#[derive(Clone)]
#[must_use = "a delegate that is never removed leaks its registration"]
pub struct DelegateHandle {
    delegate: Arc<dyn Delegate>,
}

impl DelegateHandle {
    pub fn id(&self) -> DelegateId {
        self.delegate.id()
    }

    pub fn unique_name(&self) -> &str {
        self.delegate.unique_name()
    }

    pub fn kind(&self) -> DelegateKind {
        self.delegate.kind()
    }

    pub fn flags(&self) -> MsgFlags {
        self.delegate.flags()
    }

    pub fn receiver(&self) -> &ModuleIdentity {
        self.delegate.receiver()
    }

    /// `None` for any-type filters.
    pub fn payload(&self) -> Option<PayloadType> {
        self.delegate.payload()
    }

    pub fn is_required(&self) -> bool {
        self.delegate.flags().contains(MsgFlags::REQUIRED)
    }

    /// Whether the binding received data in the current unit of work.
    pub fn is_satisfied(&self) -> bool {
        self.delegate.is_satisfied()
    }

    /// Empty the receiver storage (or the filter's delivery flag).
    pub fn reset(&self) {
        self.delegate.reset();
    }

    /// The error to raise if this binding is required but unsatisfied.
    pub fn unmet_requirement(&self) -> Option<MessengerError> {
        if !self.is_required() || self.is_satisfied() {
            return None;
        }
        let receiver = self.delegate.receiver();
        Some(MessengerError::UnmetRequirement {
            module: receiver.unique_name(),
            payload: self.delegate.payload().map_or("*", |p| p.name()),
            name: NameKey::for_receiver(receiver, self.delegate.flags()).to_string(),
        })
    }
}

impl fmt::Debug for DelegateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DelegateHandle")
            .field(&self.delegate.unique_name())
            .finish()
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// Delegates that were handed the message.
    pub invoked: usize,
    /// Delegates that stored it or whose filter accepted it.
    pub accepted: usize,
}

impl DispatchReport {
    pub fn was_received(&self) -> bool {
        self.accepted > 0
    }
}

/// Registry routing messages from producers to bound receivers.
///
/// One instance exists per simulation run and is shared by reference
/// (`Arc<Messenger>`) with every module. It is deliberately not `Clone`.
pub struct Messenger {
    state: Mutex<RegistryState>,
    next_id: AtomicU64,
    metrics: MessengerMetrics,
}

impl Messenger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            next_id: AtomicU64::new(0),
            metrics: MessengerMetrics::new(),
        }
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Bind a slot that holds one `T` message per unit of work.
    ///
    /// A second delivery in the same unit of work fails with
    /// [`MessengerError::InvalidBinding`] unless `ALLOW_OVERWRITE` is set.
    pub fn bind_single<T: Payload>(
        &self,
        receiver: &ModuleIdentity,
        slot: &SingleSlot<T>,
        flags: MsgFlags,
    ) -> Result<DelegateHandle, MessengerError> {
        let slot = slot.clone();
        self.add_delegate(
            DelegateKind::Single,
            Some(PayloadType::of::<T>()),
            receiver,
            flags,
            Some(slot.storage_id()),
            |id| Arc::new(SingleDelegate::new(id, receiver.clone(), slot, flags)),
        )
    }

    /// Bind a collection that accumulates every `T` message.
    pub fn bind_multi<T: Payload>(
        &self,
        receiver: &ModuleIdentity,
        slot: &MultiSlot<T>,
        flags: MsgFlags,
    ) -> Result<DelegateHandle, MessengerError> {
        let slot = slot.clone();
        self.add_delegate(
            DelegateKind::Multi,
            Some(PayloadType::of::<T>()),
            receiver,
            flags,
            Some(slot.storage_id()),
            |id| Arc::new(MultiDelegate::new(id, receiver.clone(), slot, flags)),
        )
    }

    /// Register a callback for every `T` message. The return value tells
    /// whether the message was accepted.
    pub fn register_filter<T, F>(
        &self,
        receiver: &ModuleIdentity,
        filter: F,
        flags: MsgFlags,
    ) -> Result<DelegateHandle, MessengerError>
    where
        T: Payload,
        F: Fn(&Arc<Message<T>>) -> bool + Send + Sync + 'static,
    {
        self.add_delegate(
            DelegateKind::Filter,
            Some(PayloadType::of::<T>()),
            receiver,
            flags,
            None,
            |id| Arc::new(FilterDelegate::new(id, receiver.clone(), Box::new(filter), flags)),
        )
    }

    /// Register a callback for every message of every payload type.
    ///
    /// Callers normally pass `IGNORE_NAME`; without it the callback only sees
    /// messages dispatched under the receiver's input name.
    pub fn register_any_filter<F>(
        &self,
        receiver: &ModuleIdentity,
        filter: F,
        flags: MsgFlags,
    ) -> Result<DelegateHandle, MessengerError>
    where
        F: Fn(&Arc<dyn BaseMessage>, &str) -> bool + Send + Sync + 'static,
    {
        self.add_delegate(
            DelegateKind::AnyFilter,
            None,
            receiver,
            flags,
            None,
            |id| Arc::new(AnyFilterDelegate::new(id, receiver.clone(), Box::new(filter), flags)),
        )
    }

    fn add_delegate<F>(
        &self,
        kind: DelegateKind,
        payload: Option<PayloadType>,
        receiver: &ModuleIdentity,
        flags: MsgFlags,
        storage_id: Option<usize>,
        build: F,
    ) -> Result<DelegateHandle, MessengerError>
    where
        F: FnOnce(DelegateId) -> Arc<dyn Delegate>,
    {
        let payload_name = payload.map_or("*", |p| p.name());
        let name_key = NameKey::for_receiver(receiver, flags);
        let invalid = |reason: &str| MessengerError::InvalidBinding {
            delegate: format!("{}/{}<{}>", receiver, kind, payload_name),
            payload: payload_name,
            name: name_key.to_string(),
            reason: reason.to_string(),
        };

        if let Some(reason) = incompatibility(kind, flags) {
            warn!(receiver = %receiver, kind = %kind, flags = ?flags, reason, "Rejected binding");
            return Err(invalid(reason));
        }

        let type_key = payload.map_or(TypeKey::Any, TypeKey::Payload);
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(storage) = storage_id {
            let duplicate = state
                .delegates
                .get(&type_key)
                .into_iter()
                .flat_map(HashMap::values)
                .flat_map(BTreeMap::values)
                .any(|d| d.storage_id() == Some(storage));
            if duplicate {
                warn!(receiver = %receiver, payload = payload_name, "Rejected duplicate binding");
                return Err(invalid("the same receiver storage is already bound"));
            }
        }

        let id = DelegateId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let delegate = build(id);
        state
            .delegates
            .entry(type_key.clone())
            .or_default()
            .entry(name_key.clone())
            .or_default()
            .insert(id, Arc::clone(&delegate));
        state.index.insert(id, (type_key, name_key));
        drop(guard);

        self.metrics.record_registered();
        debug!(
            delegate = %delegate.unique_name(),
            flags = ?flags,
            "Delegate registered"
        );

        Ok(DelegateHandle { delegate })
    }

    // =========================================================================
    // REMOVAL
    // =========================================================================

    /// Remove a delegate. Removing a delegate twice, or one registered with
    /// another messenger, is a [`MessengerError::Consistency`] error.
    pub fn remove_delegate(&self, handle: &DelegateHandle) -> Result<(), MessengerError> {
        let id = handle.id();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some((type_key, name_key)) = state.index.remove(&id) else {
            error!(delegate = %handle.unique_name(), "Removal of unknown delegate");
            return Err(MessengerError::Consistency(format!(
                "delegate {} is not registered",
                handle.unique_name()
            )));
        };

        let Some(by_name) = state.delegates.get_mut(&type_key) else {
            return Err(MessengerError::Consistency(format!(
                "reverse index of {} points at a missing type bucket",
                handle.unique_name()
            )));
        };
        let removed = by_name.get_mut(&name_key).and_then(|bucket| bucket.remove(&id));
        if by_name.get(&name_key).is_some_and(BTreeMap::is_empty) {
            by_name.remove(&name_key);
        }
        if by_name.is_empty() {
            state.delegates.remove(&type_key);
        }
        drop(guard);

        if removed.is_none() {
            return Err(MessengerError::Consistency(format!(
                "reverse index of {} points at a missing delegate",
                handle.unique_name()
            )));
        }

        self.metrics.record_removed();
        debug!(delegate = %handle.unique_name(), "Delegate removed");
        Ok(())
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Dispatch under the producer's output name.
    pub fn dispatch<T: Payload>(
        &self,
        source: &ModuleIdentity,
        message: Arc<Message<T>>,
    ) -> Result<DispatchReport, MessengerError> {
        self.dispatch_dyn(source, message, source.output())
    }

    /// Dispatch under an explicit name.
    pub fn dispatch_named<T: Payload>(
        &self,
        source: &ModuleIdentity,
        message: Arc<Message<T>>,
        name: &str,
    ) -> Result<DispatchReport, MessengerError> {
        self.dispatch_dyn(source, message, name)
    }

    /// Dispatch an already type-erased message.
    ///
    /// Fail-fast: the first delegate error aborts delivery to the remaining
    /// candidates and is returned; earlier candidates keep what they stored.
    /// Only completed dispatches are recorded in the lane's dispatch log.
    pub fn dispatch_dyn(
        &self,
        source: &ModuleIdentity,
        message: Arc<dyn BaseMessage>,
        name: &str,
    ) -> Result<DispatchReport, MessengerError> {
        let payload = message.payload_type();
        let mut state = self.state.lock();
        let candidates = Self::candidates(&state, source, &*message, name);

        let mut report = DispatchReport::default();
        for delegate in &candidates {
            report.invoked += 1;
            match delegate.process(&message, name) {
                Ok(true) => {
                    report.accepted += 1;
                    trace!(
                        source = %source,
                        delegate = %delegate.unique_name(),
                        payload = %payload,
                        name,
                        "Message delivered"
                    );
                }
                Ok(false) => {
                    trace!(delegate = %delegate.unique_name(), payload = %payload, "Message filtered out");
                }
                Err(err) => {
                    drop(state);
                    self.metrics.record_failure();
                    warn!(
                        source = %source,
                        delegate = %delegate.unique_name(),
                        payload = %payload,
                        name,
                        error = %err,
                        "Dispatch aborted"
                    );
                    return Err(err);
                }
            }
        }

        state.sent.entry(source.lane()).or_default().push(message);
        drop(state);

        self.metrics.record_dispatch(report.accepted);
        if report.accepted == 0 {
            warn!(source = %source, payload = %payload, name, "Message dispatched without receivers");
        } else {
            debug!(
                source = %source,
                payload = %payload,
                name,
                receivers = report.accepted,
                "Message dispatched"
            );
        }
        Ok(report)
    }

    /// Whether dispatching `message` under the producer's output name would
    /// reach at least one delegate.
    pub fn has_receiver(&self, source: &ModuleIdentity, message: &dyn BaseMessage) -> bool {
        self.has_receiver_named(source, message, source.output())
    }

    /// Whether dispatching `message` under `name` would reach at least one
    /// delegate. Uses the same selection as dispatch without invoking anyone.
    pub fn has_receiver_named(&self, source: &ModuleIdentity, message: &dyn BaseMessage, name: &str) -> bool {
        let state = self.state.lock();
        !Self::candidates(&state, source, message, name).is_empty()
    }

    fn candidates(
        state: &RegistryState,
        source: &ModuleIdentity,
        message: &dyn BaseMessage,
        name: &str,
    ) -> Vec<Arc<dyn Delegate>> {
        let exact = NameKey::Exact(name.to_owned());
        let mut selected = Vec::new();

        for type_key in [TypeKey::Payload(message.payload_type()), TypeKey::Any] {
            let Some(by_name) = state.delegates.get(&type_key) else {
                continue;
            };
            let mut group: Vec<&Arc<dyn Delegate>> = [by_name.get(&exact), by_name.get(&NameKey::Any)]
                .into_iter()
                .flatten()
                .flat_map(BTreeMap::values)
                .filter(|d| Self::in_scope(d, source, message))
                .collect();
            group.sort_by_key(|d| d.id());
            selected.extend(group.into_iter().cloned());
        }
        selected
    }

    fn in_scope(delegate: &Arc<dyn Delegate>, source: &ModuleIdentity, message: &dyn BaseMessage) -> bool {
        let receiver = delegate.receiver();
        if receiver.lane() != source.lane() {
            return false;
        }
        match (receiver.detector(), message.detector()) {
            (Some(mine), Some(origin)) => mine.name() == origin.name(),
            _ => true,
        }
    }

    // =========================================================================
    // UNIT-OF-WORK BOOKKEEPING
    // =========================================================================

    /// Messages dispatched in `lane` since the log was last cleared.
    pub fn sent_messages(&self, lane: LaneId) -> Vec<Arc<dyn BaseMessage>> {
        self.state.lock().sent.get(&lane).cloned().unwrap_or_default()
    }

    /// Forget the messages dispatched in `lane`. Returns how many there were.
    pub fn clear_sent_messages(&self, lane: LaneId) -> usize {
        self.state.lock().sent.remove(&lane).map_or(0, |sent| sent.len())
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// Number of registered delegates.
    pub fn delegate_count(&self) -> usize {
        self.state.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delegate_count() == 0
    }

    /// Handles of every delegate delivering to `receiver`, in registration
    /// order.
    pub fn delegates_of(&self, receiver: &ModuleIdentity) -> Vec<DelegateHandle> {
        let state = self.state.lock();
        let mut found: Vec<DelegateHandle> = state
            .delegates
            .values()
            .flat_map(HashMap::values)
            .flat_map(BTreeMap::values)
            .filter(|d| d.receiver() == receiver)
            .map(|d| DelegateHandle {
                delegate: Arc::clone(d),
            })
            .collect();
        found.sort_by_key(DelegateHandle::id);
        found
    }

    pub fn metrics(&self) -> &MessengerMetrics {
        &self.metrics
    }

    pub fn stats(&self) -> MessengerStats {
        self.metrics.snapshot()
    }

    /// Check that the forward map and the reverse index describe the same set
    /// of delegates and that no empty bucket is retained.
    pub fn verify_consistency(&self) -> Result<(), MessengerError> {
        let state = self.state.lock();
        let mut forward = 0usize;

        for (type_key, by_name) in &state.delegates {
            if by_name.is_empty() {
                return Err(MessengerError::Consistency(format!(
                    "empty name map retained for {:?}",
                    type_key
                )));
            }
            for (name_key, bucket) in by_name {
                if bucket.is_empty() {
                    return Err(MessengerError::Consistency(format!(
                        "empty bucket retained for {:?}/{}",
                        type_key, name_key
                    )));
                }
                for (id, delegate) in bucket {
                    forward += 1;
                    match state.index.get(id) {
                        Some((t, n)) if t == type_key && n == name_key => {}
                        _ => {
                            return Err(MessengerError::Consistency(format!(
                                "{} is not indexed at {:?}/{}",
                                delegate.unique_name(),
                                type_key,
                                name_key
                            )))
                        }
                    }
                }
            }
        }

        if forward != state.index.len() {
            return Err(MessengerError::Consistency(format!(
                "forward map holds {} delegates, reverse index {}",
                forward,
                state.index.len()
            )));
        }
        Ok(())
    }
}

impl Default for Messenger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Messenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messenger")
            .field("delegates", &self.delegate_count())
            .finish()
    }
}

impl Drop for Messenger {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.index.is_empty() {
            return;
        }
        let leaked: Vec<String> = state
            .delegates
            .values()
            .flat_map(HashMap::values)
            .flat_map(BTreeMap::values)
            .map(|d| d.unique_name().to_owned())
            .collect();
        error!(count = leaked.len(), delegates = ?leaked, "Messenger dropped with registered delegates");

        if cfg!(debug_assertions) && !std::thread::panicking() {
            panic!(
                "messenger dropped with {} registered delegates: {:?}",
                leaked.len(),
                leaked
            );
        }
    }
}
