//! # PixSim Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Test payloads and identities shared with the benches
//! └── integration/      # Cross-crate scenarios
//!     ├── scenarios.rs  # Routing contracts end to end
//!     ├── properties.rs # proptest: registry bijection, has_receiver agreement
//!     └── lanes.rs      # Concurrent lanes on one messenger
//!
//! tests/benches/
//! └── dispatch_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p pixsim-tests
//!
//! # By category
//! cargo test -p pixsim-tests integration::properties::
//!
//! # Benchmarks
//! cargo bench -p pixsim-tests
//! ```

#![allow(unused_variables)]
#![allow(dead_code)]

pub mod fixtures;
pub mod integration;
