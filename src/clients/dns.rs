//! Hosted zone and record-set API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clients::{read_envelope, ClientConfig};
use crate::clients::retry::with_retries;
use crate::error::Result;

/// DNS record types the handlers publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    #[allow(clippy::upper_case_acronyms)]
    CNAME,
    #[allow(clippy::upper_case_acronyms)]
    TXT,
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordType::CNAME => write!(f, "CNAME"),
            RecordType::TXT => write!(f, "TXT"),
        }
    }
}

/// A hosted zone owning a domain and its subdomains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedZone {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub name_servers: Vec<String>,
}

/// A record set to publish into a zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSet {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub values: Vec<String>,
    pub ttl: u32,
}

/// Zone listing and record publication.
#[async_trait]
pub trait DnsApi: Send + Sync {
    /// List zones whose name matches `dns_name`.
    async fn list_zones_by_name(&self, dns_name: &str) -> Result<Vec<HostedZone>>;

    /// Create or replace a record set in a zone.
    async fn upsert_record(&self, zone_id: &str, record: &RecordSet) -> Result<()>;
}

/// HTTP-backed zone client.
pub struct HttpDnsClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpDnsClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            http: config.http_client()?,
            config,
        })
    }
}

#[async_trait]
impl DnsApi for HttpDnsClient {
    async fn list_zones_by_name(&self, dns_name: &str) -> Result<Vec<HostedZone>> {
        let url = format!("{}/v1/zones?name={}", self.config.base_url, dns_name);
        debug!(dns_name, "listing hosted zones");

        let envelope = with_retries(&self.config, "list_zones_by_name", || async {
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.config.api_token)
                .send()
                .await?;
            read_envelope::<Vec<HostedZone>>(response, "list_zones_by_name").await
        })
        .await?;

        envelope.into_result("list_zones_by_name")
    }

    async fn upsert_record(&self, zone_id: &str, record: &RecordSet) -> Result<()> {
        let url = format!(
            "{}/v1/zones/{}/records:upsert",
            self.config.base_url, zone_id
        );
        info!(
            zone_id,
            name = %record.name,
            record_type = %record.record_type,
            "upserting record set"
        );

        let envelope = with_retries(&self.config, "upsert_record", || async {
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.config.api_token)
                .json(record)
                .send()
                .await?;
            read_envelope::<serde_json::Value>(response, "upsert_record").await
        })
        .await?;

        envelope.ack("upsert_record")
    }
}
