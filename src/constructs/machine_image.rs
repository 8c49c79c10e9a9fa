//! Machine image lookup construct.

use std::collections::BTreeMap;
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
use crate::handlers::machine_image;

const FUNCTION_UUID: &str = "stacklet-machine-image-lookup-function";

#[derive(Debug, Clone)]
pub struct MachineImageLookupProps {
    /// Name pattern the image must match.
    pub name: String,
    /// Account identifiers allowed to own the image.
    pub owners: Vec<String>,
    /// Additional provider-side filters, name to accepted values.
    pub filters: BTreeMap<String, Vec<String>>,
}

/// Resolves the newest machine image matching a query at deploy time.
/// Identical queries anywhere in the stack collapse to one lookup.
pub struct MachineImageLookup {
    node: Node,
    lookup: Rc<CustomResource>,
}

impl MachineImageLookup {
    pub fn new(scope: &Node, id: &str, props: MachineImageLookupProps) -> Result<MachineImageLookup> {
        let node = scope.child("MachineImageLookup", id)?;
        let MachineImageLookupProps {
            name,
            owners,
            filters,
        } = props;

        let mut parts: Vec<(String, ResourceKey)> = vec![
            ("name".to_string(), ResourceKey::literal(name.clone())),
            (
                "owners".to_string(),
                ResourceKey::literal(owners.join(",")),
            ),
        ];
        for (filter, values) in &filters {
            parts.push((
                format!("filter:{filter}"),
                ResourceKey::literal(values.join(",")),
            ));
        }
        let key = ResourceKey::composite(parts);

        let lookup = acquire(&node, &key, |stack_node, resource_id| {
            let function = HandlerFunction::shared(
                &node,
                FUNCTION_UUID,
                HandlerFunctionProps {
                    handler: "lookup-machine-image".to_string(),
                    timeout: Duration::from_secs(600),
                    actions: vec!["images:Describe".to_string()],
                },
            )?;
            CustomResource::new(
                stack_node,
                resource_id,
                CustomResourceProps {
                    resource_type: machine_image::RESOURCE_TYPE.to_string(),
                    service_token: function.service_token(),
                    properties: json!({
                        "LookupMachineImage": {
                            "name": name,
                            "owners": owners,
                            "filters": filters,
                        }
                    }),
                },
            )
        })?;

        Ok(MachineImageLookup { node, lookup })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Image id, late-bound to the handler's physical id.
    pub fn image_id(&self) -> String {
        self.lookup.ref_()
    }
}
