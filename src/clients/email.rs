//! Email sending-identity API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clients::retry::with_retries;
use crate::clients::{read_envelope, ClientConfig};
use crate::error::{Error, Result};

/// Verification state of a sending identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum VerificationStatus {
    Success,
    Pending,
    #[serde(other)]
    NotStarted,
}

#[derive(Debug, Deserialize)]
struct VerificationAttributes {
    #[serde(default)]
    status: Option<VerificationStatus>,
}

#[derive(Debug, Deserialize)]
struct VerificationRequestResult {
    verification_token: Option<String>,
}

/// Identity verification state and verification requests.
#[async_trait]
pub trait EmailApi: Send + Sync {
    /// Current verification status of the identity; `NotStarted` when the
    /// provider has never seen it.
    async fn verification_status(&self, identity: &str) -> Result<VerificationStatus>;

    /// Start domain verification; returns the token to publish in DNS.
    async fn request_verification(&self, domain: &str) -> Result<String>;
}

/// HTTP-backed email identity client.
pub struct HttpEmailClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpEmailClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            http: config.http_client()?,
            config,
        })
    }
}

#[async_trait]
impl EmailApi for HttpEmailClient {
    async fn verification_status(&self, identity: &str) -> Result<VerificationStatus> {
        let url = format!(
            "{}/v1/identities/{}/verification",
            self.config.base_url, identity
        );
        debug!(identity, "fetching verification status");

        let envelope = with_retries(&self.config, "verification_status", || async {
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.config.api_token)
                .send()
                .await;
            match response {
                Ok(response) => {
                    read_envelope::<VerificationAttributes>(response, "verification_status").await
                }
                Err(e) => Err(e.into()),
            }
        })
        .await;

        match envelope {
            // An unknown identity has simply never started verification.
            Err(Error::NotFound(_)) => Ok(VerificationStatus::NotStarted),
            Err(e) => Err(e),
            Ok(envelope) => Ok(envelope
                .into_result("verification_status")?
                .status
                .unwrap_or(VerificationStatus::NotStarted)),
        }
    }

    async fn request_verification(&self, domain: &str) -> Result<String> {
        let url = format!(
            "{}/v1/identities/{}/verification",
            self.config.base_url, domain
        );
        info!(domain, "requesting identity verification");

        let envelope = with_retries(&self.config, "request_verification", || async {
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.config.api_token)
                .send()
                .await?;
            read_envelope::<VerificationRequestResult>(response, "request_verification").await
        })
        .await?;

        envelope
            .into_result("request_verification")?
            .verification_token
            .ok_or_else(|| {
                Error::ExternalState("verification request returned no token".to_string())
            })
    }
}
