//! Certificate issuance and reuse.
//!
//! Create/Update converge on exactly one issued certificate per domain:
//! the account's existing certificates are searched first, and only when
//! no issued match exists is a new DNS-validated request made. The
//! request path publishes the provider's validation record into the
//! owning zone and polls until issuance. Delete never deprovisions: the
//! certificate may be shared by other stacks.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, info};

use crate::clients::certs::{CertificateApi, CertificateDetail, CertificateStatus};
use crate::clients::dns::{DnsApi, RecordSet};
use crate::core::key::sha256_hex;
use crate::error::{Error, Result};
use crate::event::{typed_properties, HandlerResponse, LifecycleEvent, RequestType};
use crate::handlers::hosted_zone::find_owning_zone;
use crate::handlers::poll::{poll_until, PollPolicy, Sleeper, TokioSleeper};
use crate::handlers::LifecycleHandler;

pub const RESOURCE_TYPE: &str = "Custom::GetOrCreateCertificate";

/// TTL of the published validation record.
const VALIDATION_RECORD_TTL: u32 = 300;

/// Length of the hex idempotency token sent with a request.
const IDEMPOTENCY_TOKEN_LEN: usize = 32;

/// Interval while waiting for the validation record to materialize.
const VALIDATION_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Interval while waiting for issuance; issuance is the slow step.
const ISSUANCE_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CertificateRequest {
    certificate_domain: String,
}

/// Finds or issues the certificate for a domain.
pub struct CertificateIssuer {
    certs: Arc<dyn CertificateApi>,
    dns: Arc<dyn DnsApi>,
    sleeper: Arc<dyn Sleeper>,
    validation_poll: PollPolicy,
    issuance_poll: PollPolicy,
}

impl CertificateIssuer {
    pub fn new(certs: Arc<dyn CertificateApi>, dns: Arc<dyn DnsApi>) -> CertificateIssuer {
        CertificateIssuer {
            certs,
            dns,
            sleeper: Arc::new(TokioSleeper),
            validation_poll: PollPolicy::fixed(VALIDATION_POLL_INTERVAL),
            issuance_poll: PollPolicy::fixed(ISSUANCE_POLL_INTERVAL),
        }
    }

    /// Override the poll policies and sleeper, for tests and cautious
    /// callers.
    pub fn with_polling(
        mut self,
        validation_poll: PollPolicy,
        issuance_poll: PollPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> CertificateIssuer {
        self.validation_poll = validation_poll;
        self.issuance_poll = issuance_poll;
        self.sleeper = sleeper;
        self
    }

    /// Search the account for an issued certificate matching the domain
    /// exactly; the latest expiry wins.
    async fn find_issued(&self, domain: &str) -> Result<Option<String>> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let page = self.certs.list_certificates(next_token.as_deref()).await?;
            arns.extend(
                page.certificates
                    .into_iter()
                    .filter(|summary| summary.domain_name == domain)
                    .filter_map(|summary| summary.arn),
            );
            next_token = page.next_token;
            if next_token.is_none() {
                break;
            }
        }

        let described = join_all(
            arns.iter()
                .map(|arn| self.certs.describe_certificate(arn)),
        )
        .await;

        let mut issued: Vec<CertificateDetail> = Vec::new();
        for detail in described {
            let detail = detail?;
            if detail.status == CertificateStatus::Issued {
                issued.push(detail);
            }
        }
        debug!(domain, matches = issued.len(), "issued certificate search");

        issued.sort_by(|a, b| b.not_after.cmp(&a.not_after));
        Ok(issued.into_iter().next().map(|detail| detail.arn))
    }

    async fn create(&self, domain: &str) -> Result<HandlerResponse> {
        let zone = find_owning_zone(self.dns.as_ref(), domain).await?;

        if let Some(arn) = self.find_issued(domain).await? {
            info!(domain, arn = %arn, "reusing issued certificate");
            return Ok(HandlerResponse::new(arn));
        }

        info!(domain, "no issued certificate found, requesting one");
        let token = sha256_hex(domain);
        let arn = self
            .certs
            .request_certificate(domain, &token[..IDEMPOTENCY_TOKEN_LEN])
            .await?;

        // The validation record is populated asynchronously after the
        // request.
        let detail = poll_until(
            &self.validation_poll,
            self.sleeper.as_ref(),
            "await validation record",
            || async {
                let detail = self.certs.describe_certificate(&arn).await?;
                Ok((!detail.validation_records.is_empty()).then_some(detail))
            },
        )
        .await?;

        // Only the first validation option is processed; subject
        // alternative names are not supported.
        let validation = &detail.validation_records[0];
        self.dns
            .upsert_record(
                &zone.id,
                &RecordSet {
                    name: validation.name.clone(),
                    record_type: validation.record_type,
                    values: vec![validation.value.clone()],
                    ttl: VALIDATION_RECORD_TTL,
                },
            )
            .await?;

        poll_until(
            &self.issuance_poll,
            self.sleeper.as_ref(),
            "await issuance",
            || async {
                let detail = self.certs.describe_certificate(&arn).await?;
                Ok((detail.status == CertificateStatus::Issued).then_some(()))
            },
        )
        .await?;

        info!(domain, arn = %arn, "certificate issued");
        Ok(HandlerResponse::new(arn))
    }
}

#[async_trait::async_trait]
impl LifecycleHandler for CertificateIssuer {
    fn resource_type(&self) -> &'static str {
        RESOURCE_TYPE
    }

    async fn handle(&self, event: &LifecycleEvent) -> Result<HandlerResponse> {
        match event.request_type {
            RequestType::Create | RequestType::Update => {
                let request: CertificateRequest = typed_properties(&event.resource_properties)?;
                if request.certificate_domain.is_empty() {
                    return Err(Error::Validation(
                        "CertificateDomain must not be empty".to_string(),
                    ));
                }
                self.create(&request.certificate_domain).await
            }
            // The certificate may be shared across stacks; never
            // deprovision it.
            RequestType::Delete => Ok(HandlerResponse::new(event.prior_physical_id()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::certs::{CertificatePage, CertificateSummary, ValidationRecord};
    use crate::clients::dns::RecordType;
    use crate::handlers::testing::{FakeCerts, FakeDns, InstantSleeper};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn summary(arn: &str, domain: &str) -> CertificateSummary {
        CertificateSummary {
            arn: Some(arn.to_string()),
            domain_name: domain.to_string(),
        }
    }

    fn issued(arn: &str, domain: &str, year: i32) -> CertificateDetail {
        CertificateDetail {
            arn: arn.to_string(),
            domain_name: domain.to_string(),
            status: CertificateStatus::Issued,
            not_after: Some(Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()),
            validation_records: vec![],
        }
    }

    fn pending(arn: &str, domain: &str, records: Vec<ValidationRecord>) -> CertificateDetail {
        CertificateDetail {
            arn: arn.to_string(),
            domain_name: domain.to_string(),
            status: CertificateStatus::PendingValidation,
            not_after: None,
            validation_records: records,
        }
    }

    fn create_event(domain: &str) -> LifecycleEvent {
        LifecycleEvent {
            request_type: RequestType::Create,
            resource_type: RESOURCE_TYPE.to_string(),
            physical_resource_id: None,
            resource_properties: json!({ "CertificateDomain": domain }),
            old_resource_properties: None,
            stack_id: None,
        }
    }

    fn issuer(certs: Arc<FakeCerts>, dns: Arc<FakeDns>) -> CertificateIssuer {
        CertificateIssuer::new(certs, dns).with_polling(
            PollPolicy::bounded(VALIDATION_POLL_INTERVAL, 10),
            PollPolicy::bounded(ISSUANCE_POLL_INTERVAL, 10),
            Arc::new(InstantSleeper::new()),
        )
    }

    #[tokio::test]
    async fn latest_expiring_issued_certificate_is_reused_without_mutation() {
        let certs = FakeCerts::new(vec![CertificatePage {
            certificates: vec![
                summary("arn:cert/old", "example.com"),
                summary("arn:cert/new", "example.com"),
                summary("arn:cert/other", "other.org"),
            ],
            next_token: None,
        }]);
        certs.script_describe("arn:cert/old", vec![issued("arn:cert/old", "example.com", 2024)]);
        certs.script_describe("arn:cert/new", vec![issued("arn:cert/new", "example.com", 2025)]);
        let certs = Arc::new(certs);
        let dns = Arc::new(FakeDns::new(vec![FakeDns::zone("Z1", "example.com")]));

        let response = issuer(certs.clone(), dns.clone())
            .handle(&create_event("example.com"))
            .await
            .unwrap();

        assert_eq!(response.physical_resource_id, "arn:cert/new");
        assert!(certs.requests.lock().unwrap().is_empty());
        assert!(dns.upserts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pagination_is_followed_to_exhaustion() {
        let certs = FakeCerts::new(vec![
            CertificatePage {
                certificates: vec![summary("arn:cert/a", "other.org")],
                next_token: Some("1".to_string()),
            },
            CertificatePage {
                certificates: vec![summary("arn:cert/b", "example.com")],
                next_token: None,
            },
        ]);
        certs.script_describe("arn:cert/b", vec![issued("arn:cert/b", "example.com", 2030)]);
        let certs = Arc::new(certs);
        let dns = Arc::new(FakeDns::new(vec![FakeDns::zone("Z1", "example.com")]));

        let response = issuer(certs, dns)
            .handle(&create_event("example.com"))
            .await
            .unwrap();
        assert_eq!(response.physical_resource_id, "arn:cert/b");
    }

    #[tokio::test]
    async fn request_path_publishes_one_record_and_polls_to_issuance() {
        let mut certs = FakeCerts::new(vec![CertificatePage {
            certificates: vec![],
            next_token: None,
        }]);
        certs.request_result = Some("arn:cert/fresh".to_string());
        let record = ValidationRecord {
            name: "_validate.example.com".to_string(),
            record_type: RecordType::CNAME,
            value: "target.validations.test".to_string(),
        };
        certs.script_describe(
            "arn:cert/fresh",
            vec![
                // Validation record not yet populated.
                pending("arn:cert/fresh", "example.com", vec![]),
                pending("arn:cert/fresh", "example.com", vec![record.clone()]),
                // Still pending after the record is published.
                pending("arn:cert/fresh", "example.com", vec![record.clone()]),
                issued("arn:cert/fresh", "example.com", 2030),
            ],
        );
        let certs = Arc::new(certs);
        let dns = Arc::new(FakeDns::new(vec![FakeDns::zone("Z1", "example.com")]));

        let response = issuer(certs.clone(), dns.clone())
            .handle(&create_event("example.com"))
            .await
            .unwrap();

        assert_eq!(response.physical_resource_id, "arn:cert/fresh");

        let requests = certs.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (domain, token) = &requests[0];
        assert_eq!(domain, "example.com");
        assert_eq!(token.len(), 32);
        assert_eq!(*token, sha256_hex("example.com")[..32]);

        let upserts = dns.upserts.lock().unwrap();
        assert_eq!(upserts.len(), 1);
        let (zone_id, published) = &upserts[0];
        assert_eq!(zone_id, "Z1");
        assert_eq!(published.name, "_validate.example.com");
        assert_eq!(published.record_type, RecordType::CNAME);
        assert_eq!(published.values, vec!["target.validations.test"]);
        assert_eq!(published.ttl, 300);
    }

    #[tokio::test]
    async fn pending_only_matches_are_not_reused() {
        let mut certs = FakeCerts::new(vec![CertificatePage {
            certificates: vec![summary("arn:cert/pending", "example.com")],
            next_token: None,
        }]);
        certs.request_result = Some("arn:cert/fresh".to_string());
        let record = ValidationRecord {
            name: "_validate.example.com".to_string(),
            record_type: RecordType::CNAME,
            value: "target.validations.test".to_string(),
        };
        certs.script_describe(
            "arn:cert/pending",
            vec![pending("arn:cert/pending", "example.com", vec![])],
        );
        certs.script_describe(
            "arn:cert/fresh",
            vec![
                pending("arn:cert/fresh", "example.com", vec![record]),
                issued("arn:cert/fresh", "example.com", 2030),
            ],
        );
        let certs = Arc::new(certs);
        let dns = Arc::new(FakeDns::new(vec![FakeDns::zone("Z1", "example.com")]));

        let response = issuer(certs.clone(), dns)
            .handle(&create_event("example.com"))
            .await
            .unwrap();

        assert_eq!(response.physical_resource_id, "arn:cert/fresh");
        assert_eq!(certs.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_never_touches_the_certificate() {
        let certs = Arc::new(FakeCerts::new(vec![]));
        let dns = Arc::new(FakeDns::new(vec![]));

        let event = LifecycleEvent {
            request_type: RequestType::Delete,
            resource_type: RESOURCE_TYPE.to_string(),
            physical_resource_id: Some("arn:cert/kept".to_string()),
            resource_properties: serde_json::Value::Null,
            old_resource_properties: None,
            stack_id: None,
        };

        let response = issuer(certs.clone(), dns)
            .handle(&event)
            .await
            .unwrap();
        assert_eq!(response.physical_resource_id, "arn:cert/kept");
        assert!(certs.describes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_domain_property_is_a_validation_error() {
        let certs = Arc::new(FakeCerts::new(vec![]));
        let dns = Arc::new(FakeDns::new(vec![]));

        let mut event = create_event("example.com");
        event.resource_properties = json!({});

        let err = issuer(certs, dns).handle(&event).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
