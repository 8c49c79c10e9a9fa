//! SMTP user construct.

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
use crate::handlers::smtp_user;

const FUNCTION_UUID: &str = "stacklet-setup-smtp-user-function";

#[derive(Debug, Clone)]
pub struct SmtpUserProps {
    pub user_name: String,
}

/// Provisions an access key for a sending user, derives the SMTP
/// password from it, and stores that password in the secret store.
/// Deduplicated per user name, so two apps sending as the same user
/// share one credential.
pub struct SmtpUser {
    node: Node,
    user: Rc<CustomResource>,
}

impl SmtpUser {
    pub fn new(scope: &Node, id: &str, props: SmtpUserProps) -> Result<SmtpUser> {
        let node = scope.child("SmtpUser", id)?;
        let user_name = props.user_name;

        let key = ResourceKey::literal(format!("SmtpUser_{user_name}"));
        let user = acquire(&node, &key, |stack_node, resource_id| {
            // The principal itself is declared alongside the credential
            // resource that issues its access key.
            let principal = stack_node.child("User", &format!("{resource_id}User"))?;
            stack_node
                .enclosing_stack()
                .ok_or_else(|| crate::error::Error::Scope(stack_node.path()))?
                .declare_resource(
                    principal.id(),
                    json!({
                        "Type": "Provision::User",
                        "Properties": { "UserName": user_name.clone() }
                    }),
                );
            let function = HandlerFunction::shared(
                &node,
                FUNCTION_UUID,
                HandlerFunctionProps {
                    handler: "setup-smtp-user".to_string(),
                    timeout: Duration::from_secs(60),
                    actions: vec![
                        "iam:CreateAccessKey".to_string(),
                        "iam:DeleteAccessKey".to_string(),
                        "secrets:Create".to_string(),
                        "secrets:Delete".to_string(),
                    ],
                },
            )?;
            CustomResource::new(
                stack_node,
                resource_id,
                CustomResourceProps {
                    resource_type: smtp_user::RESOURCE_TYPE.to_string(),
                    service_token: function.service_token(),
                    properties: json!({ "UserName": user_name }),
                },
            )
        })?;

        Ok(SmtpUser { node, user })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn smtp_user_name(&self) -> String {
        self.user.get_att("SmtpUserName")
    }

    /// Secret store entry holding the derived SMTP password.
    pub fn password_secret_arn(&self) -> String {
        self.user.get_att("SmtpUserPasswordSecretArn")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scope::Stack;

    #[test]
    fn same_user_shares_one_declaration() {
        let root = Node::root();
        let stack = Stack::new(&root, "Main").unwrap();

        let a = SmtpUser::new(
            stack.node(),
            "Sender",
            SmtpUserProps {
                user_name: "mailer".to_string(),
            },
        )
        .unwrap();
        let b = SmtpUser::new(
            stack.node(),
            "OtherSender",
            SmtpUserProps {
                user_name: "mailer".to_string(),
            },
        )
        .unwrap();

        assert_eq!(a.smtp_user_name(), b.smtp_user_name());
        assert_eq!(a.password_secret_arn(), b.password_secret_arn());

        let template = stack.template();
        let resources = template["Resources"].as_object().unwrap();
        let credentials = resources
            .values()
            .filter(|decl| decl["Type"] == smtp_user::RESOURCE_TYPE)
            .count();
        let principals: Vec<_> = resources
            .values()
            .filter(|decl| decl["Type"] == "Provision::User")
            .collect();
        assert_eq!(credentials, 1);
        assert_eq!(principals.len(), 1);
        assert_eq!(principals[0]["Properties"]["UserName"], "mailer");
    }
}
