//! # PixSim Types Crate
//!
//! This crate contains every domain record that may travel over the
//! messenger, the detector descriptions messages refer back to, and the
//! identity of the processing modules that produce and consume them.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All payload types are defined here.
//! - **Closed Payload Set at Compile Time**: Only types implementing
//!   [`Payload`] can be wrapped in a message.
//! - **No Cross-Message References**: Records point at each other by index
//!   inside the message of the same detector, never by pointer.

pub mod detector;
pub mod entities;
pub mod errors;
pub mod module;
pub mod payload;

pub use detector::Detector;
pub use entities::*;
pub use errors::*;
pub use module::{LaneId, ModuleIdentity};
pub use payload::{Payload, PayloadType};
