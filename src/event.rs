//! Lifecycle event protocol.
//!
//! The provisioning engine delivers a JSON envelope per resource
//! transition: a request type, the desired resource properties, the prior
//! properties on Update, and the previously returned physical id on
//! Update/Delete. Handlers answer with a physical id and optional named
//! output attributes.
//!
//! Property payloads are validated into typed request structs at the
//! handler boundary; a missing or malformed field is a validation error,
//! never a panic.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// The lifecycle transition being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

/// The event envelope delivered to a handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleEvent {
    pub request_type: RequestType,
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_resource_properties: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_id: Option<String>,
}

impl LifecycleEvent {
    /// The physical id returned by a prior Create. Required for Update
    /// and Delete.
    pub fn prior_physical_id(&self) -> Result<&str> {
        self.physical_resource_id
            .as_deref()
            .ok_or_else(|| Error::Validation("event carries no physical resource id".to_string()))
    }

    /// The deployment region, taken from the stack id (colon-separated
    /// resource name, field 4).
    pub fn region(&self) -> Result<String> {
        self.stack_id
            .as_deref()
            .and_then(|stack_id| stack_id.split(':').nth(3))
            .filter(|region| !region.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Validation("event stack id carries no region field".to_string())
            })
    }
}

/// The response envelope a handler returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HandlerResponse {
    pub physical_resource_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl HandlerResponse {
    pub fn new(physical_resource_id: impl Into<String>) -> HandlerResponse {
        HandlerResponse {
            physical_resource_id: physical_resource_id.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> HandlerResponse {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Deserialize a property payload into a typed request, surfacing schema
/// mismatches as validation errors.
pub fn typed_properties<T: DeserializeOwned>(properties: &Value) -> Result<T> {
    serde_json::from_value(properties.clone())
        .map_err(|e| Error::Validation(format!("invalid resource properties: {e}")))
}
