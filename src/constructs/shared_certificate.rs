//! Shared certificate construct.
//!
//! Declares at most one certificate custom resource per domain on the
//! enclosing stack, so every app that asks for the same domain observes
//! the same underlying certificate.

use std::rc::Rc;
use std::time::Duration;

use serde_json::json;

use crate::constructs::custom_resource::{
    CustomResource, CustomResourceProps, HandlerFunction, HandlerFunctionProps, RemovalPolicy,
};
use crate::core::scope::Node;
use crate::core::singleton::acquire;
use crate::core::ResourceKey;
use crate::error::Result;
use crate::handlers::certificate;

const FUNCTION_UUID: &str = "stacklet-get-or-create-cert-function";

#[derive(Debug, Clone)]
pub struct SharedCertificateProps {
    pub certificate_domain: String,
}

/// Certificate construct meant for sharing across apps: it first checks
/// the stack for an existing declaration before creating one.
pub struct SharedCertificate {
    node: Node,
    certificate: Rc<CustomResource>,
}

impl SharedCertificate {
    pub fn new(scope: &Node, id: &str, props: SharedCertificateProps) -> Result<SharedCertificate> {
        let node = scope.child("SharedCertificate", id)?;
        let domain = props.certificate_domain;

        let key = ResourceKey::literal(format!("Certificate_{domain}"));
        let certificate = acquire(&node, &key, |stack_node, resource_id| {
            let function = HandlerFunction::shared(
                &node,
                FUNCTION_UUID,
                HandlerFunctionProps {
                    handler: "get-or-create-cert".to_string(),
                    timeout: Duration::from_secs(600),
                    actions: vec![
                        "certificates:List".to_string(),
                        "certificates:Describe".to_string(),
                        "certificates:Request".to_string(),
                        "zones:List".to_string(),
                        "zones:UpsertRecord".to_string(),
                    ],
                },
            )?;
            CustomResource::new(
                stack_node,
                resource_id,
                CustomResourceProps {
                    resource_type: certificate::RESOURCE_TYPE.to_string(),
                    service_token: function.service_token(),
                    properties: json!({ "CertificateDomain": domain }),
                },
            )
        })?;

        Ok(SharedCertificate { node, certificate })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// The certificate's identifier, late-bound to the handler's
    /// physical id.
    pub fn certificate_arn(&self) -> String {
        self.certificate.ref_()
    }

    pub fn apply_removal_policy(&self, policy: RemovalPolicy) {
        self.certificate.apply_removal_policy(policy);
    }
}
