// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA subscription engine error types.
//!
//! Errors are grouped by the stage that produced them. Whether a failure
//! aborts `start` or is only logged per item is decided by the caller; the
//! grouping only tells it where the failure came from.
//!
//! ```text
//! OpcUaError
//! ├── Connection    endpoint and transport            fatal during start
//! ├── Browse        address-space lookups             fatal for Root/Objects
//! ├── Subscription  subscription and monitored items  fatal for the subscription
//! ├── Configuration filters, identities, settings     per item
//! └── Session       controller lifecycle misuse
//! ```
//!
//! Every family maps its variants onto a [`Class`]: a code (`UA-XXYY`), a
//! severity, a retry hint and operator-facing recovery hints.
//!
//! # Examples
//!
//! ```
//! use fieldtap_opcua::error::{ConnectionError, ErrorSeverity, OpcUaError};
//!
//! let error = OpcUaError::from(ConnectionError::refused("opc.tcp://localhost:4840", "timed out"));
//!
//! assert!(error.is_retryable());
//! assert_eq!(error.severity(), ErrorSeverity::Error);
//! assert_eq!(error.error_code().to_string(), "UA-0101");
//! ```

use std::fmt;

use thiserror::Error;

/// A Result type with OpcUaError.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// OpcUaError
// =============================================================================

/// The main error type for the subscription engine.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// Endpoint and transport failures.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Address-space lookup failures.
    #[error("{0}")]
    Browse(#[from] BrowseError),

    /// Subscription and monitored item failures.
    #[error("{0}")]
    Subscription(#[from] SubscriptionError),

    /// Malformed filters, identities and settings.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// Controller lifecycle misuse.
    #[error("{0}")]
    Session(#[from] SessionError),
}

impl OpcUaError {
    /// The transport has no open session.
    pub fn not_connected() -> Self {
        ConnectionError::NotConnected.into()
    }

    /// The node does not exist on the server.
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        BrowseError::node_not_found(node_id).into()
    }

    fn class(&self) -> Class {
        match self {
            Self::Connection(e) => e.class(),
            Self::Browse(e) => e.class(),
            Self::Subscription(e) => e.class(),
            Self::Configuration(e) => e.class(),
            Self::Session(e) => e.class(),
        }
    }

    /// Returns `true` if the failed operation may succeed on a later attempt.
    ///
    /// The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        self.class().retryable
    }

    /// Returns the severity.
    pub fn severity(&self) -> ErrorSeverity {
        self.class().severity
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        self.class().code
    }

    /// Returns what an operator can do about it.
    pub fn recovery_hints(&self) -> &'static [&'static str] {
        self.class().hints
    }

    /// Returns the family name used in log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Browse(_) => "browse",
            Self::Subscription(_) => "subscription",
            Self::Configuration(_) => "configuration",
            Self::Session(_) => "session",
        }
    }

    /// Logs the error at the level its severity calls for.
    pub fn log(&self, context: &str) {
        let code = self.error_code();
        let category = self.category();
        match self.severity() {
            ErrorSeverity::Warning => {
                tracing::warn!(error_code = %code, category, context, "{self}")
            }
            ErrorSeverity::Error | ErrorSeverity::Critical => {
                tracing::error!(error_code = %code, category, context, "{self}")
            }
        }
    }
}

// =============================================================================
// Classification
// =============================================================================

/// How a variant is reported.
#[derive(Debug, Clone, Copy)]
struct Class {
    code: ErrorCode,
    severity: ErrorSeverity,
    retryable: bool,
    hints: &'static [&'static str],
}

impl Class {
    const fn error(category: u8, code: u8, hints: &'static [&'static str]) -> Self {
        Self {
            code: ErrorCode::new(category, code),
            severity: ErrorSeverity::Error,
            retryable: false,
            hints,
        }
    }

    const fn warning(mut self) -> Self {
        self.severity = ErrorSeverity::Warning;
        self
    }

    const fn critical(mut self) -> Self {
        self.severity = ErrorSeverity::Critical;
        self
    }

    const fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

const CAT_CONNECTION: u8 = 0x01;
const CAT_SESSION: u8 = 0x02;
const CAT_BROWSE: u8 = 0x04;
const CAT_SUBSCRIPTION: u8 = 0x06;
const CAT_CONFIGURATION: u8 = 0x09;

// =============================================================================
// ConnectionError
// =============================================================================

/// Endpoint and transport failures.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The server could not be reached or refused the session.
    #[error("Connection refused to '{endpoint}': {message}")]
    Refused {
        /// Target endpoint.
        endpoint: String,
        /// Detail reported by the transport.
        message: String,
    },

    /// Discovery returned no endpoint for the URL.
    #[error("Endpoint not found: '{endpoint}'")]
    EndpointNotFound {
        /// The endpoint URL.
        endpoint: String,
    },

    /// The URL is not an `opc.tcp://` endpoint.
    #[error("Invalid endpoint URL: '{url}' - {reason}")]
    InvalidEndpoint {
        /// The invalid URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// No endpoint offers the security mode the client requires.
    #[error("No suitable endpoint found with security mode '{security_mode}'")]
    NoSuitableEndpoint {
        /// Required security mode.
        security_mode: String,
    },

    /// An operation needed an open session.
    #[error("Not connected to OPC UA server")]
    NotConnected,
}

impl ConnectionError {
    /// The server refused the connection.
    pub fn refused(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Discovery found nothing at `endpoint`.
    pub fn endpoint_not_found(endpoint: impl Into<String>) -> Self {
        Self::EndpointNotFound {
            endpoint: endpoint.into(),
        }
    }

    /// `url` is not a usable endpoint.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// No endpoint with `security_mode`.
    pub fn no_suitable_endpoint(security_mode: impl Into<String>) -> Self {
        Self::NoSuitableEndpoint {
            security_mode: security_mode.into(),
        }
    }

    fn class(&self) -> Class {
        match self {
            Self::Refused { .. } => Class::error(
                CAT_CONNECTION,
                1,
                &[
                    "Check if the OPC UA server is running",
                    "Verify the endpoint URL is correct",
                    "Check firewall rules allow the connection",
                ],
            )
            .retryable(),
            Self::EndpointNotFound { .. } => {
                Class::error(CAT_CONNECTION, 3, &["Verify the server URL and that the server is running"])
            }
            Self::InvalidEndpoint { .. } => {
                Class::error(CAT_CONNECTION, 4, &["Use format: opc.tcp://hostname:port/path"])
            }
            Self::NoSuitableEndpoint { .. } => Class::error(
                CAT_CONNECTION,
                5,
                &["Enable an endpoint with security mode None on the server"],
            ),
            Self::NotConnected => Class::error(CAT_CONNECTION, 8, &["Call start() before using the session"])
                .warning()
                .retryable(),
        }
    }
}

// =============================================================================
// BrowseError
// =============================================================================

/// Address-space lookup failures.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// The node does not exist on the server.
    #[error("Node not found: '{node_id}'")]
    NodeNotFound {
        /// The node that was requested.
        node_id: String,
    },

    /// Listing a node's references failed.
    #[error("Browse failed for '{node_id}': {message}")]
    BrowseFailed {
        /// The node being browsed.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Reading a node attribute failed.
    #[error("Failed to read {attribute} of '{node_id}': {message}")]
    AttributeReadFailed {
        /// The node being read.
        node_id: String,
        /// Attribute name.
        attribute: &'static str,
        /// Error message.
        message: String,
    },

    /// The upward path walk hit its depth bound.
    #[error("Path of '{node_id}' exceeds maximum depth {max_depth}")]
    PathTooDeep {
        /// The node whose path was being built.
        node_id: String,
        /// The configured bound.
        max_depth: usize,
    },
}

impl BrowseError {
    /// The node does not exist.
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }

    /// Listing references of `node_id` failed.
    pub fn browse_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrowseFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Reading `attribute` of `node_id` failed.
    pub fn attribute_read_failed(
        node_id: impl Into<String>,
        attribute: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::AttributeReadFailed {
            node_id: node_id.into(),
            attribute,
            message: message.into(),
        }
    }

    /// The ancestor chain of `node_id` is deeper than `max_depth`.
    pub fn path_too_deep(node_id: impl Into<String>, max_depth: usize) -> Self {
        Self::PathTooDeep {
            node_id: node_id.into(),
            max_depth,
        }
    }

    fn class(&self) -> Class {
        const SESSION_HINTS: &[&str] = &["Check the session is still active", "Restart the session"];
        match self {
            Self::NodeNotFound { .. } => Class::error(
                CAT_BROWSE,
                1,
                &[
                    "Verify the node identity exists in the server's address space",
                    "Check the namespace index of the configured subscription",
                ],
            )
            .warning(),
            Self::BrowseFailed { .. } => Class::error(CAT_BROWSE, 2, SESSION_HINTS).retryable(),
            Self::AttributeReadFailed { .. } => Class::error(CAT_BROWSE, 3, SESSION_HINTS).retryable(),
            Self::PathTooDeep { .. } => {
                Class::error(CAT_BROWSE, 4, &["Use a naming policy that does not build full paths"]).warning()
            }
        }
    }
}

// =============================================================================
// SubscriptionError
// =============================================================================

/// Subscription and monitored item failures.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The server did not create the subscription.
    #[error("Failed to create subscription: {message}")]
    CreationFailed {
        /// Error message.
        message: String,
    },

    /// The subscription id is unknown to the transport.
    #[error("Subscription not found: {subscription_id}")]
    NotFound {
        /// The subscription id.
        subscription_id: u32,
    },

    /// The server rejected a monitored item.
    #[error("Failed to monitor '{node_id}': {message}")]
    MonitoredItemFailed {
        /// The node that could not be monitored.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Deleting the subscription failed.
    #[error("Failed to delete subscription {subscription_id}: {message}")]
    DeletionFailed {
        /// The subscription id.
        subscription_id: u32,
        /// Error message.
        message: String,
    },
}

impl SubscriptionError {
    /// The subscription could not be created.
    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::CreationFailed {
            message: message.into(),
        }
    }

    /// No subscription with this id.
    pub fn not_found(subscription_id: u32) -> Self {
        Self::NotFound { subscription_id }
    }

    /// `node_id` could not be monitored.
    pub fn monitored_item_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MonitoredItemFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// The subscription could not be deleted.
    pub fn deletion_failed(subscription_id: u32, message: impl Into<String>) -> Self {
        Self::DeletionFailed {
            subscription_id,
            message: message.into(),
        }
    }

    fn class(&self) -> Class {
        match self {
            Self::CreationFailed { .. } => Class::error(
                CAT_SUBSCRIPTION,
                1,
                &["Check the server's subscription limits", "Increase the reporting interval"],
            )
            .retryable(),
            Self::NotFound { .. } => {
                Class::error(CAT_SUBSCRIPTION, 2, &["Restart the session to recreate the subscription"])
            }
            Self::MonitoredItemFailed { .. } => Class::error(
                CAT_SUBSCRIPTION,
                3,
                &[
                    "Check the node is a readable variable",
                    "Check the server's monitored item limits",
                ],
            )
            .warning()
            .retryable(),
            Self::DeletionFailed { .. } => Class::error(
                CAT_SUBSCRIPTION,
                4,
                &["The subscription is released when the session closes"],
            ),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Malformed filters, identities and settings.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Malformed node identity string.
    #[error("Invalid node id '{node_id}': {reason}")]
    InvalidNodeId {
        /// The offending string.
        node_id: String,
        /// Reason.
        reason: String,
    },

    /// Malformed subscription filter.
    #[error("Invalid subscription filter '{filter}': {reason}")]
    InvalidFilter {
        /// The offending filter.
        filter: String,
        /// Reason.
        reason: String,
    },

    /// Unknown value for an enumerated setting.
    #[error("Invalid value '{value}' for '{field}'")]
    InvalidValue {
        /// Setting name.
        field: &'static str,
        /// The offending value.
        value: String,
    },
}

impl ConfigurationError {
    /// `node_id` is not `ns=<n>;s=<s>` or `ns=<n>;i=<k>`.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// `filter` is not a bare or namespace-qualified browse name.
    pub fn invalid_filter(filter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            filter: filter.into(),
            reason: reason.into(),
        }
    }

    /// `value` is not one of the allowed values of `field`.
    pub fn invalid_value(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            value: value.into(),
        }
    }

    fn class(&self) -> Class {
        match self {
            Self::InvalidNodeId { .. } => Class::error(
                CAT_CONFIGURATION,
                1,
                &["Use ns=<namespace>;s=<string> or ns=<namespace>;i=<number>"],
            ),
            Self::InvalidFilter { .. } => Class::error(
                CAT_CONFIGURATION,
                2,
                &["Use a bare browse name or <namespace>:<browse name>"],
            ),
            Self::InvalidValue { .. } => {
                Class::error(CAT_CONFIGURATION, 3, &["Check the allowed values for this setting"])
            }
        }
        .critical()
    }
}

// =============================================================================
// SessionError
// =============================================================================

/// Session controller lifecycle errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `start` was called while a session is already running.
    #[error("Session already started (state: {state})")]
    AlreadyStarted {
        /// The state the controller was in.
        state: String,
    },

    /// The resolution pass registered nothing and the policy requires at least one.
    #[error("No eligible variables in OPC UA server to which to subscribe")]
    NoSubscriptions,

    /// Polling is not supported by an asynchronous plugin.
    #[error("OPC UA is an async plugin, poll should not be called")]
    PollUnsupported,
}

impl SessionError {
    /// `start` was called in `state`.
    pub fn already_started(state: impl fmt::Display) -> Self {
        Self::AlreadyStarted {
            state: state.to_string(),
        }
    }

    fn class(&self) -> Class {
        match self {
            Self::AlreadyStarted { .. } => {
                Class::error(CAT_SESSION, 1, &["Call stop() or restart() instead"]).warning()
            }
            Self::NoSubscriptions => Class::error(
                CAT_SESSION,
                2,
                &[
                    "Check the subscription filters match browse names on the server",
                    "Set the zero-subscription policy to warn to run idle",
                ],
            ),
            Self::PollUnsupported => {
                Class::error(CAT_SESSION, 3, &["Register an ingest sink and wait for change events"]).warning()
            }
        }
    }
}

// =============================================================================
// ErrorSeverity / ErrorCode
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Worth a look; processing continues.
    Warning,
    /// The operation failed.
    Error,
    /// The configuration must change before anything works.
    Critical,
}

impl ErrorSeverity {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error code, displayed as `UA-XXYY` (category, then variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Error family.
    pub category: u8,
    /// Variant within the family.
    pub code: u8,
}

impl ErrorCode {
    /// Creates an error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Tests
// =============================================================================
