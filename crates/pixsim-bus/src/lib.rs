//! # PixSim Bus - Typed Message Routing Between Simulation Modules
//!
//! Modules never call each other. A producer hands a [`Message`] to the
//! [`Messenger`]; the messenger delivers it to every delegate registered for
//! that payload type and name.
//!
//! ```text
//! ┌──────────────┐  dispatch()   ┌──────────────┐  process()   ┌──────────────┐
//! │  Producer    │ ────────────> │  Messenger   │ ───────────> │  Delegate    │
//! │  (Bindings)  │               │  type → name │              │  slot/filter │
//! └──────────────┘               │  → delegates │              └──────┬───────┘
//!                                └──────────────┘                     │ stores
//!                                                              ┌──────▼───────┐
//!                                                              │  Receiver    │
//!                                                              │  (Bindings)  │
//!                                                              └──────────────┘
//! ```
//!
//! ## Delegate variants
//!
//! - **Single**: one message per unit of work, optional overwrite
//! - **Multi**: every message, in dispatch order
//! - **Filter**: typed callback deciding acceptance
//! - **Any filter**: callback for every payload type
//!
//! Storage is owned by the receiver and reset by the driver between units of
//! work. See [`messenger`] for the routing rules.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bindings;
pub mod delegate;
pub mod error;
pub mod flags;
pub mod message;
pub mod messenger;
pub mod metrics;
pub mod slot;

pub use bindings::Bindings;
pub use delegate::{AnyFilterFn, Delegate, DelegateId, FilterFn};
pub use error::MessengerError;
pub use flags::{DelegateKind, MsgFlags};
pub use message::{BaseMessage, Message};
pub use messenger::{DelegateHandle, DispatchReport, Messenger, NameKey, TypeKey};
pub use metrics::{MessengerMetrics, MessengerStats};
pub use slot::{MultiSlot, SingleSlot};
