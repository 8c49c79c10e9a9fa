//! Email domain verification construct.

use std::rc::Rc;
use std::time::Duration;

use serde_json::json;

use crate::constructs::custom_resource::{
    CustomResource, CustomResourceProps, HandlerFunction, HandlerFunctionProps,
};
use crate::core::scope::Node;
use crate::error::Result;
use crate::handlers::verify_domain;

const FUNCTION_UUID: &str = "stacklet-verify-email-domain-function";

#[derive(Debug, Clone)]
pub struct DomainVerificationProps {
    pub email_domain: String,
}

/// Verifies an email sending domain by publishing its verification
/// token as a TXT record and waiting for the provider to confirm it.
///
/// Unlike the lookup constructs this is declared once per construct,
/// not deduplicated per domain: verification is idempotent on the
/// provider side, and each app owns its own declaration's lifecycle.
pub struct DomainVerification {
    node: Node,
    verification: Rc<CustomResource>,
}

impl DomainVerification {
    pub fn new(scope: &Node, id: &str, props: DomainVerificationProps) -> Result<DomainVerification> {
        let node = scope.child("DomainVerification", id)?;

        let function = HandlerFunction::shared(
            &node,
            FUNCTION_UUID,
            HandlerFunctionProps {
                handler: "verify-email-domain".to_string(),
                timeout: Duration::from_secs(900),
                actions: vec![
                    "email:VerificationStatus".to_string(),
                    "email:RequestVerification".to_string(),
                    "zones:List".to_string(),
                    "zones:UpsertRecord".to_string(),
                ],
            },
        )?;

        let verification = Rc::new(CustomResource::new(
            &node,
            "Resource",
            CustomResourceProps {
                resource_type: verify_domain::RESOURCE_TYPE.to_string(),
                service_token: function.service_token(),
                properties: json!({ "EmailDomain": props.email_domain }),
            },
        )?);

        Ok(DomainVerification { node, verification })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// The verified domain, late-bound to the handler's physical id.
    pub fn domain(&self) -> String {
        self.verification.ref_()
    }
}
