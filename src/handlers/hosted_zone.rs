//! Hosted zone location.
//!
//! Finds the most specific zone owning a fully qualified domain name by
//! trying the full name and progressively stripping the leftmost label.
//! Used standalone as a lookup resource and as the first step of
//! certificate issuance and domain verification.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::clients::dns::{DnsApi, HostedZone};
use crate::error::{Error, Result};
use crate::event::{typed_properties, HandlerResponse, LifecycleEvent, RequestType};
use crate::handlers::LifecycleHandler;

pub const RESOURCE_TYPE: &str = "Custom::LookupHostedZone";

/// Find the zone owning `domain_name`, most specific first. The zone
/// listing is name-ordered, not filtered, so each candidate only matches
/// when a returned zone's name equals it exactly.
pub async fn find_owning_zone(dns: &dyn DnsApi, domain_name: &str) -> Result<HostedZone> {
    let trimmed = domain_name.trim_end_matches('.');
    let labels: Vec<&str> = trimmed.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(Error::Validation(format!(
            "hosted zone domain must consist of at least two labels (example.com), got '{domain_name}'"
        )));
    }

    for start in 0..=labels.len() - 2 {
        let candidate = labels[start..].join(".");
        let zones = dns.list_zones_by_name(&candidate).await?;
        if let Some(zone) = zones
            .into_iter()
            .find(|zone| zone.name.trim_end_matches('.') == candidate)
        {
            debug!(domain = domain_name, zone = %zone.name, "owning zone located");
            return Ok(zone);
        }
    }

    Err(Error::NotFound(format!(
        "no hosted zone owns domain '{domain_name}'"
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LookupRequest {
    domain_name: String,
}

/// Standalone zone lookup handler.
pub struct HostedZoneLocator {
    dns: Arc<dyn DnsApi>,
}

impl HostedZoneLocator {
    pub fn new(dns: Arc<dyn DnsApi>) -> HostedZoneLocator {
        HostedZoneLocator { dns }
    }
}

#[async_trait::async_trait]
impl LifecycleHandler for HostedZoneLocator {
    fn resource_type(&self) -> &'static str {
        RESOURCE_TYPE
    }

    async fn handle(&self, event: &LifecycleEvent) -> Result<HandlerResponse> {
        match event.request_type {
            RequestType::Create => {
                let request: LookupRequest = typed_properties(&event.resource_properties)?;
                let zone = find_owning_zone(self.dns.as_ref(), &request.domain_name).await?;
                info!(domain = %request.domain_name, zone_id = %zone.id, "hosted zone resolved");
                Ok(HandlerResponse::new(&zone.id)
                    .with_data("ZoneName", &zone.name)
                    .with_data("NameServers", zone.name_servers.join(",")))
            }
            // The zone is an external lookup, nothing to mutate or tear
            // down.
            RequestType::Update | RequestType::Delete => {
                Ok(HandlerResponse::new(event.prior_physical_id()?))
            }
        }
    }
}
