// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client transports.
//!
//! The engine never talks to a protocol stack directly; it drives an
//! [`OpcUaTransport`], which exposes exactly the directory and subscription
//! primitives resolution needs:
//!
//! - **Directory**: describe a node, find its parent, list variable and
//!   non-variable children
//! - **Subscription**: create a subscription bound to a [`DataChangeHandler`],
//!   add data-change monitored items, delete the subscription
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    SessionController                            │
//! │         (connect → subscribe → resolve → stream)                │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     OpcUaTransport                              │
//! │            (directory + subscription primitives)                │
//! └─────────────────────────────────────────────────────────────────┘
//!               │                                   │
//!               ▼                                   ▼
//! ┌───────────────────────────┐     ┌───────────────────────────────┐
//! │     MemoryTransport       │     │     RealOpcUaTransport        │
//! │  (in-process address      │     │  (opcua crate, feature        │
//! │   space, fault injection) │     │   `real-transport`)           │
//! └───────────────────────────┘     └───────────────────────────────┘
//! ```

mod memory;
mod transport;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use memory::{AddressSpace, MemoryTransport};
pub use transport::{DataChangeHandler, DataChangeNotification, OpcUaTransport, TransportState};

#[cfg(feature = "real-transport")]
pub use real_transport::{RealOpcUaTransport, RealTransportConfig};
