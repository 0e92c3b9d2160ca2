// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport over the `opcua` crate.
//!
//! Anonymous sessions on endpoints with security mode `None`. Directory calls
//! browse `HierarchicalReferences`; notifications are translated into
//! [`DataChangeNotification`]s carrying the source timestamp as raw ticks.
//!
//! # Example
//!
//! ```rust,ignore
//! use fieldtap_opcua::client::{OpcUaTransport, RealOpcUaTransport, RealTransportConfig};
//!
//! let mut transport = RealOpcUaTransport::new(RealTransportConfig::default());
//! transport.connect("opc.tcp://localhost:4840").await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace};

use opcua::client::prelude::*;
use opcua::sync::RwLock as OpcUaRwLock;

use super::transport::{DataChangeHandler, DataChangeNotification, OpcUaTransport, TransportState};
use crate::decode::{Variant, VariantArray, VariantType};
use crate::error::{BrowseError, ConnectionError, OpcUaError, OpcUaResult, SubscriptionError};
use crate::types::{ExpandedNodeId, NodeClass, NodeId, NodeIdentifier, NodeRef, QualifiedName, SubscriptionSettings};

// =============================================================================
// RealTransportConfig
// =============================================================================

/// Client application settings.
#[derive(Debug, Clone)]
pub struct RealTransportConfig {
    /// Application name announced to the server.
    pub application_name: String,
    /// Application URI.
    pub application_uri: String,
    /// Session timeout.
    pub session_timeout: Duration,
    /// Connect retries performed by the client library itself.
    pub session_retry_limit: i32,
    /// PKI directory for the client certificate store.
    pub pki_dir: Option<PathBuf>,
    /// Trust server certificates without validation.
    pub trust_server_certs: bool,
}

impl Default for RealTransportConfig {
    fn default() -> Self {
        Self {
            application_name: "fieldtap".to_string(),
            application_uri: "urn:fieldtap:client".to_string(),
            session_timeout: Duration::from_secs(60),
            session_retry_limit: 0,
            pki_dir: None,
            trust_server_certs: true,
        }
    }
}

// =============================================================================
// RealOpcUaTransport
// =============================================================================

/// Transport speaking OPC UA binary through the `opcua` client.
pub struct RealOpcUaTransport {
    config: RealTransportConfig,
    state: RwLock<TransportState>,
    endpoint: RwLock<Option<String>>,
    session: RwLock<Option<Arc<OpcUaRwLock<Session>>>>,
    session_loop: Mutex<Option<tokio::sync::oneshot::Sender<SessionCommand>>>,
    sampling_interval: RwLock<f64>,
    queue_size: RwLock<u32>,
}

impl RealOpcUaTransport {
    /// Creates a disconnected transport.
    pub fn new(config: RealTransportConfig) -> Self {
        Self {
            config,
            state: RwLock::new(TransportState::Disconnected),
            endpoint: RwLock::new(None),
            session: RwLock::new(None),
            session_loop: Mutex::new(None),
            sampling_interval: RwLock::new(100.0),
            queue_size: RwLock::new(10),
        }
    }

    fn build_client(&self, endpoint: &str) -> OpcUaResult<Client> {
        let mut builder = ClientBuilder::new()
            .application_name(&self.config.application_name)
            .application_uri(&self.config.application_uri)
            .session_retry_limit(self.config.session_retry_limit)
            .session_timeout(self.config.session_timeout.as_millis() as u32)
            .trust_server_certs(self.config.trust_server_certs);

        if let Some(ref pki_dir) = self.config.pki_dir {
            builder = builder.pki_dir(pki_dir);
        }

        builder
            .client()
            .ok_or_else(|| ConnectionError::invalid_endpoint(endpoint, "Failed to build OPC UA client").into())
    }

    fn session(&self) -> OpcUaResult<Arc<OpcUaRwLock<Session>>> {
        self.session.read().clone().ok_or_else(OpcUaError::not_connected)
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    fn to_opcua_node_id(node_id: &NodeId) -> opcua::types::NodeId {
        match &node_id.identifier {
            NodeIdentifier::Numeric(v) => opcua::types::NodeId::new(node_id.namespace_index, *v),
            NodeIdentifier::String(v) => opcua::types::NodeId::new(node_id.namespace_index, v.clone()),
            NodeIdentifier::Guid(v) => {
                opcua::types::NodeId::new(node_id.namespace_index, opcua::types::Guid::from(*v))
            }
            NodeIdentifier::Opaque(v) => {
                opcua::types::NodeId::new(node_id.namespace_index, opcua::types::ByteString::from(v.as_slice()))
            }
        }
    }

    fn from_opcua_node_id(node_id: &opcua::types::NodeId) -> NodeId {
        let namespace_index = node_id.namespace;
        match &node_id.identifier {
            opcua::types::Identifier::Numeric(v) => NodeId::numeric(namespace_index, *v),
            opcua::types::Identifier::String(v) => NodeId::string(namespace_index, v.as_ref()),
            opcua::types::Identifier::Guid(v) => {
                NodeId::guid(namespace_index, uuid::Uuid::from_bytes(*v.as_bytes()))
            }
            opcua::types::Identifier::ByteString(v) => {
                NodeId::opaque(namespace_index, v.value.clone().unwrap_or_default())
            }
        }
    }

    fn from_opcua_type(type_id: &opcua::types::VariantTypeId) -> VariantType {
        use opcua::types::VariantTypeId as Id;

        match type_id {
            Id::Empty => VariantType::Empty,
            Id::Boolean => VariantType::Boolean,
            Id::SByte => VariantType::SByte,
            Id::Byte => VariantType::Byte,
            Id::Int16 => VariantType::Int16,
            Id::UInt16 => VariantType::UInt16,
            Id::Int32 => VariantType::Int32,
            Id::UInt32 => VariantType::UInt32,
            Id::Int64 => VariantType::Int64,
            Id::UInt64 => VariantType::UInt64,
            Id::Float => VariantType::Float,
            Id::Double => VariantType::Double,
            Id::String => VariantType::String,
            Id::DateTime => VariantType::DateTime,
            Id::Guid => VariantType::Guid,
            Id::ByteString => VariantType::ByteString,
            Id::LocalizedText => VariantType::LocalizedText,
            Id::QualifiedName => VariantType::QualifiedName,
            Id::NodeId => VariantType::NodeId,
            Id::StatusCode => VariantType::StatusCode,
            _ => VariantType::Variant,
        }
    }

    fn from_opcua_variant(variant: &opcua::types::Variant) -> Variant {
        use opcua::types::Variant as Ua;

        match variant {
            Ua::Empty => Variant::Empty,
            Ua::Boolean(v) => Variant::Boolean(*v),
            Ua::SByte(v) => Variant::SByte(*v),
            Ua::Byte(v) => Variant::Byte(*v),
            Ua::Int16(v) => Variant::Int16(*v),
            Ua::UInt16(v) => Variant::UInt16(*v),
            Ua::Int32(v) => Variant::Int32(*v),
            Ua::UInt32(v) => Variant::UInt32(*v),
            Ua::Int64(v) => Variant::Int64(*v),
            Ua::UInt64(v) => Variant::UInt64(*v),
            Ua::Float(v) => Variant::Float(*v),
            Ua::Double(v) => Variant::Double(*v),
            Ua::String(v) => Variant::String(v.as_ref().to_string()),
            Ua::DateTime(v) => Variant::DateTime(v.ticks()),
            Ua::Guid(v) => Variant::Guid(uuid::Uuid::from_bytes(*v.as_bytes())),
            Ua::ByteString(v) => Variant::ByteString(v.value.clone().unwrap_or_default()),
            Ua::LocalizedText(v) => Variant::LocalizedText(v.text.as_ref().to_string()),
            Ua::QualifiedName(v) => Variant::QualifiedName(QualifiedName::new(v.namespace_index, v.name.as_ref())),
            Ua::NodeId(v) => Variant::NodeId(Self::from_opcua_node_id(v)),
            Ua::StatusCode(v) => Variant::StatusCode(v.bits()),
            Ua::Array(arr) => Variant::Array(VariantArray::new(
                Self::from_opcua_type(&arr.value_type),
                arr.values.iter().map(Self::from_opcua_variant).collect(),
            )),
            other => Variant::String(format!("{:?}", other)),
        }
    }

    fn from_opcua_expanded_node_id(node_id: &opcua::types::ExpandedNodeId) -> ExpandedNodeId {
        ExpandedNodeId {
            node_id: Self::from_opcua_node_id(&node_id.node_id),
            namespace_uri: node_id.namespace_uri.value().clone().filter(|uri| !uri.is_empty()),
            server_index: node_id.server_index,
        }
    }

    /// References into other servers cannot be browsed through this session
    /// and yield `None`.
    fn to_node_ref(reference: &ReferenceDescription) -> Option<NodeRef> {
        let target = Self::from_opcua_expanded_node_id(&reference.node_id);
        if !target.is_local() {
            debug!(target = %target, "Skipping reference to another server");
            return None;
        }
        Some(NodeRef::new(
            target.into(),
            QualifiedName::new(reference.browse_name.namespace_index, reference.browse_name.name.as_ref()),
            NodeClass::from_value(reference.node_class as u32).unwrap_or(NodeClass::Object),
        ))
    }

    // =========================================================================
    // Browse
    // =========================================================================

    fn browse(&self, node_id: &NodeId, direction: BrowseDirection, node_class_mask: u32) -> OpcUaResult<Vec<NodeRef>> {
        let session = self.session()?;

        trace!(node_id = %node_id, direction = ?direction, "Browsing node");

        let description = BrowseDescription {
            node_id: Self::to_opcua_node_id(node_id),
            browse_direction: direction,
            reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
            include_subtypes: true,
            node_class_mask,
            result_mask: BrowseDescriptionResultMask::all().bits(),
        };

        let session_locked = session.read();
        let results = session_locked
            .browse(&[description])
            .map_err(|e| BrowseError::browse_failed(node_id.to_string(), format!("Browse failed: {}", e)))?
            .ok_or_else(|| BrowseError::browse_failed(node_id.to_string(), "No browse results returned"))?;

        Ok(results
            .first()
            .and_then(|r| r.references.as_ref())
            .map(|refs| refs.iter().filter_map(Self::to_node_ref).collect())
            .unwrap_or_default())
    }

    fn read_attribute(&self, node_id: &NodeId, attribute: AttributeId) -> OpcUaResult<Option<opcua::types::Variant>> {
        let session = self.session()?;
        let read_value_id = ReadValueId {
            node_id: Self::to_opcua_node_id(node_id),
            attribute_id: attribute as u32,
            index_range: opcua::types::UAString::null(),
            data_encoding: opcua::types::QualifiedName::null(),
        };

        let session_locked = session.read();
        let results = session_locked
            .read(&[read_value_id], TimestampsToReturn::Neither, 0.0)
            .map_err(|e| {
                BrowseError::attribute_read_failed(node_id.to_string(), attribute_name(attribute), format!("{}", e))
            })?;

        Ok(results.into_iter().next().and_then(|dv| {
            let good = dv.status.map(|s| s.is_good()).unwrap_or(true);
            if good { dv.value } else { None }
        }))
    }
}

fn attribute_name(attribute: AttributeId) -> &'static str {
    match attribute {
        AttributeId::BrowseName => "BrowseName",
        AttributeId::NodeClass => "NodeClass",
        _ => "Value",
    }
}

#[async_trait]
impl OpcUaTransport for RealOpcUaTransport {
    async fn connect(&mut self, endpoint: &str) -> OpcUaResult<()> {
        *self.state.write() = TransportState::Connecting;
        info!(endpoint = %endpoint, "Connecting to OPC UA server");

        let mut client = match self.build_client(endpoint) {
            Ok(c) => c,
            Err(e) => {
                *self.state.write() = TransportState::Failed;
                return Err(e);
            }
        };

        let result = (|| -> OpcUaResult<Arc<OpcUaRwLock<Session>>> {
            let endpoints = client.get_server_endpoints_from_url(endpoint).map_err(|e| {
                ConnectionError::endpoint_not_found(format!("{}: {}", endpoint, e))
            })?;

            let selected = endpoints
                .iter()
                .find(|e| {
                    e.security_policy_uri.as_ref() == SecurityPolicy::None.to_uri()
                        && e.security_mode == MessageSecurityMode::None
                })
                .cloned()
                .ok_or_else(|| ConnectionError::no_suitable_endpoint("None/None"))?;

            debug!(endpoint_url = %selected.endpoint_url, "Found matching endpoint");

            client
                .connect_to_endpoint(selected, IdentityToken::Anonymous)
                .map_err(|e| ConnectionError::refused(endpoint, format!("{}", e)).into())
        })();

        match result {
            Ok(session) => {
                *self.session_loop.lock() = Some(Session::run_async(session.clone()));
                *self.session.write() = Some(session);
                *self.endpoint.write() = Some(endpoint.to_string());
                *self.state.write() = TransportState::Connected;
                info!(endpoint = %endpoint, "Connected to OPC UA server");
                Ok(())
            }
            Err(e) => {
                *self.state.write() = TransportState::Failed;
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) -> OpcUaResult<()> {
        if let Some(stop) = self.session_loop.lock().take() {
            let _ = stop.send(SessionCommand::Stop);
        }
        let session = self.session.write().take();
        if let Some(session) = session {
            session.read().disconnect();
        }
        *self.endpoint.write() = None;
        *self.state.write() = TransportState::Disconnected;
        info!("Disconnected from OPC UA server");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.read().is_connected()
    }

    fn state(&self) -> TransportState {
        *self.state.read()
    }

    async fn describe(&self, node_id: &NodeId) -> OpcUaResult<NodeRef> {
        let browse_name = match self.read_attribute(node_id, AttributeId::BrowseName)? {
            Some(opcua::types::Variant::QualifiedName(q)) => QualifiedName::new(q.namespace_index, q.name.as_ref()),
            _ => return Err(OpcUaError::node_not_found(node_id.to_string())),
        };
        let node_class = match self.read_attribute(node_id, AttributeId::NodeClass)? {
            Some(opcua::types::Variant::Int32(v)) => NodeClass::from_value(v as u32).unwrap_or(NodeClass::Object),
            _ => NodeClass::Object,
        };
        Ok(NodeRef::new(node_id.clone(), browse_name, node_class))
    }

    async fn parent(&self, node_id: &NodeId) -> OpcUaResult<Option<NodeRef>> {
        Ok(self.browse(node_id, BrowseDirection::Inverse, 0)?.into_iter().next())
    }

    async fn variables(&self, node_id: &NodeId) -> OpcUaResult<Vec<NodeRef>> {
        self.browse(node_id, BrowseDirection::Forward, NodeClass::Variable.value())
    }

    async fn children(&self, node_id: &NodeId) -> OpcUaResult<Vec<NodeRef>> {
        self.browse(
            node_id,
            BrowseDirection::Forward,
            NodeClass::Object.value() | NodeClass::View.value(),
        )
    }

    async fn create_subscription(
        &mut self,
        settings: &SubscriptionSettings,
        handler: Arc<dyn DataChangeHandler>,
    ) -> OpcUaResult<u32> {
        let session = self.session()?;
        let interval_ms = settings.publishing_interval.as_millis() as f64;

        trace!(interval_ms, "Creating subscription");

        let callback = DataChangeCallback::new(move |items: &[&MonitoredItem]| {
            for item in items {
                let node_id = Self::from_opcua_node_id(&item.item_to_monitor().node_id);
                let data_value = item.last_value();
                let value = data_value
                    .value
                    .as_ref()
                    .map(Self::from_opcua_variant)
                    .unwrap_or(Variant::Empty);

                let mut notification = DataChangeNotification::new(node_id, value);
                notification.source_timestamp = data_value.source_timestamp.as_ref().map(|t| t.ticks());
                notification.server_timestamp = data_value.server_timestamp.as_ref().map(|t| t.ticks());
                handler.on_data_change(notification);
            }
        });

        let session_locked = session.read();
        let subscription_id = session_locked
            .create_subscription(
                interval_ms,
                settings.lifetime_count,
                settings.keepalive_count,
                settings.max_notifications_per_publish,
                settings.priority,
                true,
                callback,
            )
            .map_err(|e| SubscriptionError::creation_failed(format!("Failed to create subscription: {}", e)))?;

        *self.sampling_interval.write() = interval_ms;
        *self.queue_size.write() = settings.queue_size;
        info!(subscription_id, "Created subscription");
        Ok(subscription_id)
    }

    async fn subscribe_data_change(&self, subscription_id: u32, node_id: &NodeId) -> OpcUaResult<u32> {
        let session = self.session()?;

        let request = MonitoredItemCreateRequest {
            item_to_monitor: ReadValueId {
                node_id: Self::to_opcua_node_id(node_id),
                attribute_id: AttributeId::Value as u32,
                index_range: opcua::types::UAString::null(),
                data_encoding: opcua::types::QualifiedName::null(),
            },
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: MonitoringParameters {
                sampling_interval: *self.sampling_interval.read(),
                filter: ExtensionObject::null(),
                queue_size: *self.queue_size.read(),
                discard_oldest: true,
                client_handle: 0,
            },
        };

        let session_locked = session.read();
        let results = session_locked
            .create_monitored_items(subscription_id, TimestampsToReturn::Both, &[request])
            .map_err(|e| SubscriptionError::monitored_item_failed(node_id.to_string(), format!("{}", e)))?;

        match results.first() {
            Some(result) if result.status_code.is_good() => Ok(result.monitored_item_id),
            Some(result) => Err(SubscriptionError::monitored_item_failed(
                node_id.to_string(),
                format!("{}", result.status_code),
            )
            .into()),
            None => Err(SubscriptionError::monitored_item_failed(node_id.to_string(), "empty response").into()),
        }
    }

    async fn delete_subscription(&mut self, subscription_id: u32) -> OpcUaResult<()> {
        let session = self.session()?;
        let session_locked = session.read();
        session_locked
            .delete_subscription(subscription_id)
            .map_err(|e| SubscriptionError::deletion_failed(subscription_id, format!("{}", e)))?;
        info!(subscription_id, "Deleted subscription");
        Ok(())
    }

    fn display_name(&self) -> String {
        match self.endpoint.read().as_deref() {
            Some(endpoint) => format!("RealOpcUaTransport({})", endpoint),
            None => "RealOpcUaTransport".to_string(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
