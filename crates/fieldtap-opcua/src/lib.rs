// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA subscription engine for the fieldtap south plugin.
//!
//! This crate turns a list of subscription filters into data-change monitored
//! items on an OPC UA server and converts every resulting notification into an
//! ingest record: an asset name, a single named reading, and a UTC timestamp.
//!
//! # Pipeline
//!
//! ```text
//!   filters ──► ResolutionEngine ──► monitored items ──► server
//!                    │                                     │
//!                    ▼                                     ▼
//!           SubscriptionRegistry ◄──── ChangeEventPipeline ◄── notifications
//!             (key + asset path)        │
//!                                       ├─ VariantDecoder   (value)
//!                                       ├─ to_utc           (timestamp)
//!                                       ▼
//!                                   IngestSink
//! ```
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Endpoint and session establishment
//! ├── Browse        - Address-space traversal failures
//! ├── Subscription  - Subscription and monitored item errors
//! ├── Configuration - Invalid filters, node ids and settings
//! └── Session       - Controller lifecycle misuse
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fieldtap_opcua::{AddressSpace, ChannelSink, MemoryTransport, SessionController, SessionSettings};
//!
//! let (sink, mut records) = ChannelSink::new();
//! let controller = SessionController::new(
//!     MemoryTransport::new(AddressSpace::new()),
//!     SessionSettings::new("opc.tcp://localhost:4840"),
//!     Arc::new(sink),
//! );
//! controller.add_subscription("5:Simulation").await;
//! controller.start().await?;
//!
//! while let Some(record) = records.recv().await {
//!     println!("{} {:?}", record.asset, record.readings);
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod decode;
pub mod error;
pub mod naming;
pub mod pipeline;
pub mod resolve;
pub mod session;
pub mod timestamp;
pub mod types;

pub use error::{
    BrowseError, ConfigurationError, ConnectionError, ErrorCode, ErrorSeverity, OpcUaError,
    OpcUaResult, SessionError, SubscriptionError,
};

pub use types::{NodeClass, NodeId, NodeIdentifier, NodeRef, QualifiedName, SubscriptionSettings};

pub use client::{
    AddressSpace, DataChangeHandler, DataChangeNotification, MemoryTransport, OpcUaTransport,
    TransportState,
};

#[cfg(feature = "real-transport")]
pub use client::{RealOpcUaTransport, RealTransportConfig};

pub use decode::{
    Decoded, DecoderOptions, DropReason, IntegerOverflow, NormalizedValue, Variant, VariantArray,
    VariantDecoder, VariantType,
};
pub use naming::{AssetNameType, AssetNamer, PathDelimiter};
pub use pipeline::{
    ChangeEventPipeline, ChannelSink, IngestRecord, IngestSink, PipelineStats, Reading,
};
pub use resolve::{
    ResolutionEngine, ResolutionReport, ResolveOptions, SubscriptionFilter, SubscriptionKey,
    SubscriptionRegistry,
};
pub use session::{SessionController, SessionSettings, SessionState, ZeroSubscriptionPolicy};
pub use timestamp::{UtcTimestamp, from_utc, to_utc};
