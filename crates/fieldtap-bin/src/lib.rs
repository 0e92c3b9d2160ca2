// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldtap-bin
//!
//! The `fieldtap` executable: a south plugin that subscribes to variables on
//! an OPC UA server and writes each data change to stdout as one JSON line.
//!
//! ```text
//!   fieldtap.yaml ──▶ PluginConfig ──▶ SouthPlugin::start
//!                                           │
//!                                  SessionController (fieldtap-opcua)
//!                                           │ Reading per data change
//!                                           ▼
//!                     mpsc ──▶ output::write_records ──▶ stdout (JSON lines)
//!                                           ▲
//!   SIGTERM / writer exit ──▶ ShutdownCoordinator ──▶ SouthPlugin::shutdown
//! ```
//!
//! With `run --simulate` the session talks to [`Simulation`], an in-memory
//! address space whose values change on a timer, instead of a real server.
//!
//! ## Usage
//!
//! ```bash
//! # Start the gateway (default command)
//! fieldtap -c /etc/fieldtap/plant.yaml
//!
//! # Run against the built-in simulation
//! fieldtap run --simulate --tick-ms 500
//!
//! # Validate configuration
//! fieldtap validate --strict
//!
//! # Print the plugin information
//! fieldtap info
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
pub mod plugin;
pub mod runtime;
pub mod shutdown;
pub mod simulate;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::{init_for_cli, init_logging};
pub use plugin::SouthPlugin;
pub use runtime::{PluginRuntime, RuntimeBuilder};
pub use shutdown::{ShutdownCoordinator, ShutdownGuard, ShutdownListener, ShutdownReason};
pub use simulate::Simulation;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
