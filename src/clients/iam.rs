//! Long-lived access credential API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clients::retry::with_retries;
use crate::clients::{read_envelope, ClientConfig};
use crate::error::Result;

/// A created access credential. The secret material is only ever returned
/// at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessKey {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Access credential lifecycle for a named principal.
#[async_trait]
pub trait AccessKeyApi: Send + Sync {
    async fn create_access_key(&self, user_name: &str) -> Result<AccessKey>;

    /// Delete a credential. Returns `Error::NotFound` when it is already
    /// gone; retried Deletes treat that as success.
    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> Result<()>;
}

/// HTTP-backed access credential client.
pub struct HttpAccessKeyClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpAccessKeyClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            http: config.http_client()?,
            config,
        })
    }
}

#[async_trait]
impl AccessKeyApi for HttpAccessKeyClient {
    async fn create_access_key(&self, user_name: &str) -> Result<AccessKey> {
        let url = format!(
            "{}/v1/users/{}/access-keys",
            self.config.base_url, user_name
        );
        info!(user = user_name, "creating access key");

        let envelope = with_retries(&self.config, "create_access_key", || async {
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.config.api_token)
                .send()
                .await?;
            read_envelope::<AccessKey>(response, "create_access_key").await
        })
        .await?;

        envelope.into_result("create_access_key")
    }

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> Result<()> {
        let url = format!(
            "{}/v1/users/{}/access-keys/{}",
            self.config.base_url, user_name, access_key_id
        );
        info!(user = user_name, access_key_id, "deleting access key");

        let envelope = with_retries(&self.config, "delete_access_key", || async {
            let response = self
                .http
                .delete(&url)
                .bearer_auth(&self.config.api_token)
                .send()
                .await?;
            read_envelope::<serde_json::Value>(response, "delete_access_key").await
        })
        .await?;

        envelope.ack("delete_access_key")
    }
}
