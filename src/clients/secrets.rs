//! Secret store API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clients::retry::with_retries;
use crate::clients::{read_envelope, ClientConfig};
use crate::error::Result;

#[derive(Debug, Serialize)]
struct CreateSecretBody<'a> {
    name: &'a str,
    value: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedSecret {
    arn: String,
}

/// Named secret entries.
#[async_trait]
pub trait SecretStoreApi: Send + Sync {
    /// Create a secret entry; returns its identifier.
    async fn create_secret(&self, name: &str, value: &str) -> Result<String>;

    /// Delete a secret entry without recovery. Returns `Error::NotFound`
    /// when it is already gone.
    async fn delete_secret(&self, name: &str) -> Result<()>;
}

/// HTTP-backed secret store client.
pub struct HttpSecretStoreClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpSecretStoreClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            http: config.http_client()?,
            config,
        })
    }
}

#[async_trait]
impl SecretStoreApi for HttpSecretStoreClient {
    async fn create_secret(&self, name: &str, value: &str) -> Result<String> {
        let url = format!("{}/v1/secrets", self.config.base_url);
        let body = CreateSecretBody { name, value };
        info!(secret = name, "storing secret");

        let envelope = with_retries(&self.config, "create_secret", || async {
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.config.api_token)
                .json(&body)
                .send()
                .await?;
            read_envelope::<CreatedSecret>(response, "create_secret").await
        })
        .await?;

        Ok(envelope.into_result("create_secret")?.arn)
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        let url = format!("{}/v1/secrets/{}?force=true", self.config.base_url, name);
        info!(secret = name, "deleting secret");

        let envelope = with_retries(&self.config, "delete_secret", || async {
            let response = self
                .http
                .delete(&url)
                .bearer_auth(&self.config.api_token)
                .send()
                .await?;
            read_envelope::<serde_json::Value>(response, "delete_secret").await
        })
        .await?;

        envelope.ack("delete_secret")
    }
}
