// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldtap Integration Tests
//!
//! Cross-crate tests for the fieldtap gateway, plus the fixtures and helpers
//! they share.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Address spaces, configuration documents and timestamps
//!   - `sinks`: A recording ingest sink
//!   - `harness`: A session controller wired to an in-memory server
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p fieldtap-tests
//! cargo test -p fieldtap-tests --test integration_resolution
//! cargo test -p fieldtap-tests --test integration_config
//! cargo test -p fieldtap-tests --test integration_plugin
//! ```
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use fieldtap_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let harness = SessionHarness::new(SpaceFixtures::plant(), settings(), &["Line1"]).await;
//!     harness.publish(&SpaceFixtures::line1_speed(), Variant::Double(1.0));
//!     assert_eq!(harness.sink.len(), 1);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::sinks::*;
    pub use crate::common::init_test_logging;
}
