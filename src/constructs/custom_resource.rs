//! Custom resource declaration.
//!
//! A `CustomResource` is a declared node whose lifecycle the provisioning
//! engine drives through a handler function. Declarations register with
//! the enclosing stack so `Stack::template()` can synthesize them; the
//! physical id comes back later through the resource's late-bound ref
//! token.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::core::scope::{Node, Stack, TokenRef};
use crate::core::singleton::acquire;
use crate::core::ResourceKey;
use crate::error::{Error, Result};

/// What happens to the underlying resource when the declaration is
/// removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    /// Leave the external resource in place (default for shared
    /// resources).
    Retain,
    /// Tear the external resource down.
    Destroy,
}

impl RemovalPolicy {
    fn wire_name(self) -> &'static str {
        match self {
            RemovalPolicy::Retain => "Retain",
            RemovalPolicy::Destroy => "Delete",
        }
    }
}

/// Properties for declaring a custom resource.
#[derive(Debug, Clone)]
pub struct CustomResourceProps {
    pub resource_type: String,
    pub service_token: String,
    /// Handler request properties; must be a JSON object.
    pub properties: Value,
}

/// A declared custom resource.
pub struct CustomResource {
    node: Node,
    stack: Stack,
    logical_id: String,
    resource_type: String,
    service_token: String,
    properties: Value,
    ref_token: TokenRef,
    removal_policy: Cell<RemovalPolicy>,
}

/// Template logical id: the node's path segments below the stack,
/// concatenated. Two same-id nodes under different scopes yield distinct
/// logical ids, so neither declaration shadows the other.
fn logical_id(node: &Node, stack: &Stack) -> String {
    let mut segments = Vec::new();
    let mut current = Some(node.clone());
    while let Some(step) = current {
        if step.same_node(stack.node()) {
            break;
        }
        segments.push(step.id().to_string());
        current = step.parent();
    }
    segments.reverse();
    segments.concat()
}

impl CustomResource {
    pub fn new(scope: &Node, id: &str, props: CustomResourceProps) -> Result<CustomResource> {
        if !props.properties.is_object() {
            return Err(Error::Validation(
                "custom resource properties must be a JSON object".to_string(),
            ));
        }
        let node = scope.child("CustomResource", id)?;
        let stack = node
            .enclosing_stack()
            .ok_or_else(|| Error::Scope(node.path()))?;
        let ref_token = stack.allocate_token();
        let logical_id = logical_id(&node, &stack);

        let resource = CustomResource {
            node,
            stack,
            logical_id,
            resource_type: props.resource_type,
            service_token: props.service_token,
            properties: props.properties,
            ref_token,
            removal_policy: Cell::new(RemovalPolicy::Retain),
        };
        resource.declare();
        Ok(resource)
    }

    fn declare(&self) {
        let mut properties = serde_json::Map::new();
        properties.insert(
            "ServiceToken".to_string(),
            Value::String(self.service_token.clone()),
        );
        if let Value::Object(map) = &self.properties {
            for (key, value) in map {
                properties.insert(key.clone(), value.clone());
            }
        }
        self.stack.declare_resource(
            &self.logical_id,
            json!({
                "Type": self.resource_type,
                "Properties": Value::Object(properties),
                "DeletionPolicy": self.removal_policy.get().wire_name(),
            }),
        );
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// The late-bound physical id of the resource.
    pub fn ref_(&self) -> String {
        self.stack.resolve_token(self.ref_token)
    }

    /// The token behind `ref_`, for use as a deferred dedup key.
    pub fn ref_token(&self) -> TokenRef {
        self.ref_token
    }

    /// A late-bound named output attribute.
    pub fn get_att(&self, name: &str) -> String {
        format!("${{{}.{}}}", self.logical_id, name)
    }

    pub fn apply_removal_policy(&self, policy: RemovalPolicy) {
        self.removal_policy.set(policy);
        self.declare();
    }
}

/// Properties for the backing handler function declaration.
#[derive(Debug, Clone)]
pub struct HandlerFunctionProps {
    /// Handler entry point name.
    pub handler: String,
    pub timeout: Duration,
    /// Provider actions the function's role needs.
    pub actions: Vec<String>,
}

/// The handler function backing one or more custom resources,
/// deduplicated stack-wide by a fixed uuid-style key.
pub struct HandlerFunction {
    node: Node,
    handler: String,
}

impl HandlerFunction {
    /// Find or declare the shared function for `uuid` on the enclosing
    /// stack.
    pub fn shared(scope: &Node, uuid: &str, props: HandlerFunctionProps) -> Result<Rc<HandlerFunction>> {
        acquire(scope, &ResourceKey::literal(uuid), |stack_node, id| {
            let node = stack_node.child("HandlerFunction", id)?;
            let stack = node
                .enclosing_stack()
                .ok_or_else(|| Error::Scope(node.path()))?;
            stack.declare_resource(
                node.id(),
                json!({
                    "Type": "Provision::HandlerFunction",
                    "Properties": {
                        "Handler": props.handler,
                        "TimeoutSeconds": props.timeout.as_secs(),
                        "Actions": props.actions,
                    },
                }),
            );
            Ok(HandlerFunction {
                node,
                handler: props.handler.clone(),
            })
        })
    }

    /// The token custom resources use to address this function.
    pub fn service_token(&self) -> String {
        format!("function:{}:{}", self.node.id(), self.handler)
    }
}
