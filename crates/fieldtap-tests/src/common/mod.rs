// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Common Test Utilities
//!
//! - `fixtures`: Pre-built address spaces and configuration documents
//! - `sinks`: Recording ingest sink
//! - `harness`: Session controller over an in-memory server

pub mod fixtures;
pub mod harness;
pub mod sinks;

pub use fixtures::*;
pub use harness::*;
pub use sinks::*;

use std::sync::Once;

use tracing_subscriber::EnvFilter;

const TEST_LOG_FILTER: &str = "warn,fieldtap_opcua=debug,fieldtap_config=debug,fieldtap_bin=debug";

static LOGGING: Once = Once::new();

/// Routes engine logs through the test writer, once per test binary.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(TEST_LOG_FILTER));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}

/// Creates a scratch directory for configuration files, removed on drop.
pub fn temp_test_dir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("temp dir")
}
