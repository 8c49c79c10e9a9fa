//! Hosted zone lookup construct.

use std::rc::Rc;
use std::time::Duration;

use serde_json::json;

use crate::constructs::custom_resource::{
    CustomResource, CustomResourceProps, HandlerFunction, HandlerFunctionProps,
};
use crate::core::scope::Node;
use crate::core::singleton::acquire;
use crate::core::ResourceKey;
use crate::error::Result;
use crate::handlers::hosted_zone;

const FUNCTION_UUID: &str = "stacklet-lookup-hosted-zone-function";

#[derive(Debug, Clone)]
pub struct HostedZoneLookupProps {
    pub domain_name: String,
}

/// Resolves the hosted zone that owns `domain_name` at deploy time, so
/// templates never need the zone id baked in.
pub struct HostedZoneLookup {
    node: Node,
    lookup: Rc<CustomResource>,
}

impl HostedZoneLookup {
    pub fn new(scope: &Node, id: &str, props: HostedZoneLookupProps) -> Result<HostedZoneLookup> {
        let node = scope.child("HostedZoneLookup", id)?;
        let domain = props.domain_name;

        let key = ResourceKey::literal(format!("HostedZone_{domain}"));
        let lookup = acquire(&node, &key, |stack_node, resource_id| {
            let function = HandlerFunction::shared(
                &node,
                FUNCTION_UUID,
                HandlerFunctionProps {
                    handler: "lookup-hosted-zone".to_string(),
                    timeout: Duration::from_secs(60),
                    actions: vec!["zones:List".to_string()],
                },
            )?;
            CustomResource::new(
                stack_node,
                resource_id,
                CustomResourceProps {
                    resource_type: hosted_zone::RESOURCE_TYPE.to_string(),
                    service_token: function.service_token(),
                    properties: json!({ "DomainName": domain }),
                },
            )
        })?;

        Ok(HostedZoneLookup { node, lookup })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Zone id, late-bound to the handler's physical id.
    pub fn hosted_zone_id(&self) -> String {
        self.lookup.ref_()
    }

    pub fn zone_name(&self) -> String {
        self.lookup.get_att("ZoneName")
    }

    pub fn name_servers(&self) -> String {
        self.lookup.get_att("NameServers")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scope::Stack;

    #[test]
    fn lookups_for_one_domain_collapse() {
        let root = Node::root();
        let stack = Stack::new(&root, "Main").unwrap();

        let a = HostedZoneLookup::new(
            stack.node(),
            "ZoneA",
            HostedZoneLookupProps {
                domain_name: "example.com".to_string(),
            },
        )
        .unwrap();
        let b = HostedZoneLookup::new(
            stack.node(),
            "ZoneB",
            HostedZoneLookupProps {
                domain_name: "example.com".to_string(),
            },
        )
        .unwrap();

        assert_eq!(a.hosted_zone_id(), b.hosted_zone_id());
        assert_eq!(a.zone_name(), b.zone_name());
    }

    #[test]
    fn attributes_reference_the_declaration() {
        let root = Node::root();
        let stack = Stack::new(&root, "Main").unwrap();

        let lookup = HostedZoneLookup::new(
            stack.node(),
            "Zone",
            HostedZoneLookupProps {
                domain_name: "example.com".to_string(),
            },
        )
        .unwrap();

        assert!(lookup.zone_name().ends_with(".ZoneName}"));
        assert!(lookup.name_servers().ends_with(".NameServers}"));
    }
}
