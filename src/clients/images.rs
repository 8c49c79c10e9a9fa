//! Machine image catalog API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clients::retry::with_retries;
use crate::clients::{read_envelope, ClientConfig};
use crate::error::Result;

/// One name/value-list filter pair for the image search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFilter {
    pub name: String,
    pub values: Vec<String>,
}

/// An image search query: owner list plus filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageQuery {
    pub owners: Vec<String>,
    pub filters: Vec<ImageFilter>,
}

/// A catalog entry. Entries without an id are discarded by the locator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub creation_date: Option<String>,
}

/// Image catalog search.
#[async_trait]
pub trait ImageApi: Send + Sync {
    async fn describe_images(&self, query: &ImageQuery) -> Result<Vec<Image>>;
}

/// HTTP-backed image catalog client.
pub struct HttpImageClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpImageClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            http: config.http_client()?,
            config,
        })
    }
}

#[async_trait]
impl ImageApi for HttpImageClient {
    async fn describe_images(&self, query: &ImageQuery) -> Result<Vec<Image>> {
        let url = format!("{}/v1/images:search", self.config.base_url);
        debug!(owners = ?query.owners, filters = query.filters.len(), "searching images");

        let envelope = with_retries(&self.config, "describe_images", || async {
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.config.api_token)
                .json(query)
                .send()
                .await?;
            read_envelope::<Vec<Image>>(response, "describe_images").await
        })
        .await?;

        envelope.into_result("describe_images")
    }
}
