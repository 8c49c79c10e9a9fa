//! SMTP credential provisioning.
//!
//! Create issues a long-lived access key for the named principal, derives
//! the SMTP password from the key's secret material, and persists it in
//! the secret store. The physical id encodes both the principal and the
//! key id so Delete can tear both down; renaming the principal on Update
//! is refused rather than silently recreated.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{info, warn};

use crate::clients::iam::AccessKeyApi;
use crate::clients::secrets::SecretStoreApi;
use crate::error::{Error, Result};
use crate::event::{typed_properties, HandlerResponse, LifecycleEvent, RequestType};
use crate::handlers::LifecycleHandler;

pub const RESOURCE_TYPE: &str = "Custom::SetupSmtpUser";

// Fixed derivation inputs; see the provider's SMTP credential scheme.
const DERIVATION_DATE: &str = "11111111";
const DERIVATION_SERVICE: &str = "ses";
const DERIVATION_TERMINAL: &str = "aws4_request";
const DERIVATION_MESSAGE: &str = "SendRawEmail";
const PASSWORD_VERSION: u8 = 0x04;

type HmacSha256 = Hmac<Sha256>;

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC-SHA256 accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the SMTP password from an access key secret: a four-stage
/// HMAC-SHA256 chain keyed by date, region, service, and terminal, then
/// HMAC'd over the message string, version-tagged, and base64-encoded.
pub fn derive_smtp_password(region: &str, secret_access_key: &str) -> String {
    let k_date = hmac_sha256(
        format!("AWS4{secret_access_key}").as_bytes(),
        DERIVATION_DATE.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, DERIVATION_SERVICE.as_bytes());
    let k_terminal = hmac_sha256(&k_service, DERIVATION_TERMINAL.as_bytes());
    let k_message = hmac_sha256(&k_terminal, DERIVATION_MESSAGE.as_bytes());

    let mut tagged = Vec::with_capacity(k_message.len() + 1);
    tagged.push(PASSWORD_VERSION);
    tagged.extend_from_slice(&k_message);
    BASE64.encode(tagged)
}

fn smtp_secret_name(user_name: &str) -> String {
    format!("{user_name}-smtp")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SmtpUserRequest {
    user_name: String,
}

impl SmtpUserRequest {
    fn validated(properties: &serde_json::Value) -> Result<SmtpUserRequest> {
        let request: SmtpUserRequest = typed_properties(properties)?;
        if request.user_name.is_empty() {
            return Err(Error::Validation(
                "must supply UserName for the principal to generate credentials for".to_string(),
            ));
        }
        Ok(request)
    }
}

/// Provisions SMTP credentials for a named principal.
pub struct SmtpCredentialProvisioner {
    iam: Arc<dyn AccessKeyApi>,
    secrets: Arc<dyn SecretStoreApi>,
}

impl SmtpCredentialProvisioner {
    pub fn new(
        iam: Arc<dyn AccessKeyApi>,
        secrets: Arc<dyn SecretStoreApi>,
    ) -> SmtpCredentialProvisioner {
        SmtpCredentialProvisioner { iam, secrets }
    }

    async fn create(&self, event: &LifecycleEvent) -> Result<HandlerResponse> {
        let request = SmtpUserRequest::validated(&event.resource_properties)?;
        let region = event.region()?;

        let access_key = self.iam.create_access_key(&request.user_name).await?;
        let password = derive_smtp_password(&region, &access_key.secret_access_key);
        let secret_arn = self
            .secrets
            .create_secret(&smtp_secret_name(&request.user_name), &password)
            .await?;

        info!(
            user = %request.user_name,
            access_key_id = %access_key.access_key_id,
            "smtp credentials provisioned"
        );
        Ok(
            HandlerResponse::new(format!(
                "{}:{}",
                request.user_name, access_key.access_key_id
            ))
            .with_data("SmtpUserName", access_key.access_key_id)
            .with_data("SmtpUserPasswordSecretArn", secret_arn),
        )
    }

    async fn update(&self, event: &LifecycleEvent) -> Result<HandlerResponse> {
        let new = SmtpUserRequest::validated(&event.resource_properties)?;
        let old_properties = event.old_resource_properties.as_ref().ok_or_else(|| {
            Error::Validation("update event carries no prior properties".to_string())
        })?;
        let old = SmtpUserRequest::validated(old_properties)?;

        if old.user_name != new.user_name {
            return Err(Error::Validation(
                "update of UserName requires resource replacement".to_string(),
            ));
        }
        Ok(HandlerResponse::new(event.prior_physical_id()?))
    }

    async fn delete(&self, event: &LifecycleEvent) -> Result<HandlerResponse> {
        let physical_id = event.prior_physical_id()?;
        let (user_name, access_key_id) = physical_id.split_once(':').ok_or_else(|| {
            Error::Validation(format!(
                "physical id '{physical_id}' is not of the form <user>:<access-key-id>"
            ))
        })?;

        // A retried Delete may find either resource already gone.
        match self.iam.delete_access_key(user_name, access_key_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(user = user_name, access_key_id, "access key already deleted");
            }
            Err(e) => return Err(e),
        }
        match self.secrets.delete_secret(&smtp_secret_name(user_name)).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(user = user_name, "smtp password secret already deleted");
            }
            Err(e) => return Err(e),
        }

        Ok(HandlerResponse::new(physical_id))
    }
}

#[async_trait::async_trait]
impl LifecycleHandler for SmtpCredentialProvisioner {
    fn resource_type(&self) -> &'static str {
        RESOURCE_TYPE
    }

    async fn handle(&self, event: &LifecycleEvent) -> Result<HandlerResponse> {
        match event.request_type {
            RequestType::Create => self.create(event).await,
            RequestType::Update => self.update(event).await,
            RequestType::Delete => self.delete(event).await,
        }
    }
}
