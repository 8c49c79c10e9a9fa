//! TLS certificate API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clients::dns::RecordType;
use crate::clients::retry::with_retries;
use crate::clients::{read_envelope, ClientConfig};
use crate::error::{Error, Result};

/// Issuance state of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateStatus {
    PendingValidation,
    Issued,
    #[serde(other)]
    Other,
}

/// Listing entry. Certificates without an identifier are skipped by the
/// search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateSummary {
    pub arn: Option<String>,
    pub domain_name: String,
}

/// One page of the certificate listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificatePage {
    #[serde(default)]
    pub certificates: Vec<CertificateSummary>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// The record a domain-validated request must publish before issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub value: String,
}

/// Full certificate state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateDetail {
    pub arn: String,
    pub domain_name: String,
    pub status: CertificateStatus,
    #[serde(default)]
    pub not_after: Option<DateTime<Utc>>,
    /// Populated asynchronously by the provider after a request.
    #[serde(default)]
    pub validation_records: Vec<ValidationRecord>,
}

/// Certificate listing, inspection, and issuance requests.
#[async_trait]
pub trait CertificateApi: Send + Sync {
    async fn list_certificates(&self, next_token: Option<&str>) -> Result<CertificatePage>;

    async fn describe_certificate(&self, arn: &str) -> Result<CertificateDetail>;

    /// Request a DNS-validated certificate; returns the new ARN. The
    /// idempotency token makes a retried request converge on the same
    /// in-flight certificate.
    async fn request_certificate(&self, domain: &str, idempotency_token: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct CertificateRequestBody<'a> {
    domain_name: &'a str,
    validation_method: &'a str,
    idempotency_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct CertificateRequestResult {
    arn: Option<String>,
}

/// HTTP-backed certificate client.
pub struct HttpCertificateClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpCertificateClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            http: config.http_client()?,
            config,
        })
    }
}

#[async_trait]
impl CertificateApi for HttpCertificateClient {
    async fn list_certificates(&self, next_token: Option<&str>) -> Result<CertificatePage> {
        let url = match next_token {
            Some(token) => format!(
                "{}/v1/certificates?next_token={}",
                self.config.base_url, token
            ),
            None => format!("{}/v1/certificates", self.config.base_url),
        };
        debug!(next_token = ?next_token, "listing certificates");

        let envelope = with_retries(&self.config, "list_certificates", || async {
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.config.api_token)
                .send()
                .await?;
            read_envelope::<CertificatePage>(response, "list_certificates").await
        })
        .await?;

        envelope.into_result("list_certificates")
    }

    async fn describe_certificate(&self, arn: &str) -> Result<CertificateDetail> {
        let url = format!("{}/v1/certificates/{}", self.config.base_url, arn);

        let envelope = with_retries(&self.config, "describe_certificate", || async {
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.config.api_token)
                .send()
                .await?;
            read_envelope::<CertificateDetail>(response, "describe_certificate").await
        })
        .await?;

        envelope.into_result("describe_certificate")
    }

    async fn request_certificate(&self, domain: &str, idempotency_token: &str) -> Result<String> {
        let url = format!("{}/v1/certificates", self.config.base_url);
        let body = CertificateRequestBody {
            domain_name: domain,
            validation_method: "DNS",
            idempotency_token,
        };
        info!(domain, "requesting certificate");

        let envelope = with_retries(&self.config, "request_certificate", || async {
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.config.api_token)
                .json(&body)
                .send()
                .await?;
            read_envelope::<CertificateRequestResult>(response, "request_certificate").await
        })
        .await?;

        envelope
            .into_result("request_certificate")?
            .arn
            .ok_or_else(|| {
                Error::ExternalState("certificate request returned no identifier".to_string())
            })
    }
}
