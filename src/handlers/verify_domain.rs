//! Email sending-domain verification.
//!
//! Create/Update converge on a verified identity: an already-verified
//! domain short-circuits with no mutation; otherwise the verification
//! token is published as a TXT record in the owning zone and the handler
//! polls until the provider reports success.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::clients::dns::{DnsApi, RecordSet, RecordType};
use crate::clients::email::{EmailApi, VerificationStatus};
use crate::error::Result;
use crate::event::{typed_properties, HandlerResponse, LifecycleEvent, RequestType};
use crate::handlers::hosted_zone::find_owning_zone;
use crate::handlers::poll::{poll_until, PollPolicy, Sleeper, TokioSleeper};
use crate::handlers::LifecycleHandler;

pub const RESOURCE_TYPE: &str = "Custom::VerifyEmailDomain";

/// TTL of the published verification TXT record.
const VERIFICATION_RECORD_TTL: u32 = 600;

const VERIFICATION_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VerifyRequest {
    email_domain: String,
}

/// Verifies a sending domain with the email provider.
pub struct DomainVerifier {
    email: Arc<dyn EmailApi>,
    dns: Arc<dyn DnsApi>,
    sleeper: Arc<dyn Sleeper>,
    poll: PollPolicy,
}

impl DomainVerifier {
    pub fn new(email: Arc<dyn EmailApi>, dns: Arc<dyn DnsApi>) -> DomainVerifier {
        DomainVerifier {
            email,
            dns,
            sleeper: Arc::new(TokioSleeper),
            poll: PollPolicy::fixed(VERIFICATION_POLL_INTERVAL),
        }
    }

    pub fn with_polling(mut self, poll: PollPolicy, sleeper: Arc<dyn Sleeper>) -> DomainVerifier {
        self.poll = poll;
        self.sleeper = sleeper;
        self
    }

    async fn verify(&self, domain: &str) -> Result<()> {
        if self.email.verification_status(domain).await? == VerificationStatus::Success {
            info!(domain, "identity already verified");
            return Ok(());
        }

        let zone = find_owning_zone(self.dns.as_ref(), domain).await?;
        let token = self.email.request_verification(domain).await?;

        self.dns
            .upsert_record(
                &zone.id,
                &RecordSet {
                    name: domain.to_string(),
                    record_type: RecordType::TXT,
                    values: vec![format!("\"{token}\"")],
                    ttl: VERIFICATION_RECORD_TTL,
                },
            )
            .await?;

        poll_until(
            &self.poll,
            self.sleeper.as_ref(),
            "await identity verification",
            || async {
                let status = self.email.verification_status(domain).await?;
                Ok((status == VerificationStatus::Success).then_some(()))
            },
        )
        .await?;

        info!(domain, "identity verified");
        Ok(())
    }
}

#[async_trait::async_trait]
impl LifecycleHandler for DomainVerifier {
    fn resource_type(&self) -> &'static str {
        RESOURCE_TYPE
    }

    async fn handle(&self, event: &LifecycleEvent) -> Result<HandlerResponse> {
        match event.request_type {
            RequestType::Create | RequestType::Update => {
                let request: VerifyRequest = typed_properties(&event.resource_properties)?;
                self.verify(&request.email_domain).await?;
                Ok(HandlerResponse::new(request.email_domain))
            }
            // TODO: tear down the email identity on delete once the
            // shared-ownership semantics are settled with the product
            // owners; for now the identity stays registered.
            RequestType::Delete => Ok(HandlerResponse::new(event.prior_physical_id()?)),
        }
    }
}
