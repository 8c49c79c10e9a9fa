//! In-memory provider fakes and a non-waiting sleeper for handler tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::clients::certs::{CertificateApi, CertificateDetail, CertificatePage};
use crate::clients::dns::{DnsApi, HostedZone, RecordSet};
use crate::clients::email::{EmailApi, VerificationStatus};
use crate::clients::iam::{AccessKey, AccessKeyApi};
use crate::clients::images::{Image, ImageApi, ImageQuery};
use crate::clients::secrets::SecretStoreApi;
use crate::error::{Error, Result};
use crate::handlers::poll::Sleeper;

/// Records requested sleeps without waiting.
pub(crate) struct InstantSleeper {
    pub slept: Mutex<Vec<Duration>>,
}

impl InstantSleeper {
    pub(crate) fn new() -> InstantSleeper {
        InstantSleeper {
            slept: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

/// Zone provider returning its full zone list for every query, the way a
/// name-ordered listing API does; exact-match filtering is the caller's
/// job.
pub(crate) struct FakeDns {
    pub zones: Vec<HostedZone>,
    pub queries: Mutex<Vec<String>>,
    pub upserts: Mutex<Vec<(String, RecordSet)>>,
}

impl FakeDns {
    pub(crate) fn new(zones: Vec<HostedZone>) -> FakeDns {
        FakeDns {
            zones,
            queries: Mutex::new(Vec::new()),
            upserts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn zone(id: &str, name: &str) -> HostedZone {
        HostedZone {
            id: id.to_string(),
            name: name.to_string(),
            name_servers: vec!["ns-1.test".to_string(), "ns-2.test".to_string()],
        }
    }
}

#[async_trait]
impl DnsApi for FakeDns {
    async fn list_zones_by_name(&self, dns_name: &str) -> Result<Vec<HostedZone>> {
        self.queries.lock().unwrap().push(dns_name.to_string());
        Ok(self.zones.clone())
    }

    async fn upsert_record(&self, zone_id: &str, record: &RecordSet) -> Result<()> {
        self.upserts
            .lock()
            .unwrap()
            .push((zone_id.to_string(), record.clone()));
        Ok(())
    }
}

/// Certificate provider with scripted describe responses: each describe
/// of an arn pops the next scripted state, and the final state repeats.
pub(crate) struct FakeCerts {
    pub pages: Vec<CertificatePage>,
    pub details: Mutex<HashMap<String, VecDeque<CertificateDetail>>>,
    pub request_result: Option<String>,
    pub requests: Mutex<Vec<(String, String)>>,
    pub describes: Mutex<Vec<String>>,
}

impl FakeCerts {
    pub(crate) fn new(pages: Vec<CertificatePage>) -> FakeCerts {
        FakeCerts {
            pages,
            details: Mutex::new(HashMap::new()),
            request_result: None,
            requests: Mutex::new(Vec::new()),
            describes: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn script_describe(&self, arn: &str, states: Vec<CertificateDetail>) {
        self.details
            .lock()
            .unwrap()
            .insert(arn.to_string(), states.into());
    }
}

#[async_trait]
impl CertificateApi for FakeCerts {
    async fn list_certificates(&self, next_token: Option<&str>) -> Result<CertificatePage> {
        let index = match next_token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| Error::ExternalState("bad page token".to_string()))?,
        };
        self.pages
            .get(index)
            .cloned()
            .ok_or_else(|| Error::ExternalState("page out of range".to_string()))
    }

    async fn describe_certificate(&self, arn: &str) -> Result<CertificateDetail> {
        self.describes.lock().unwrap().push(arn.to_string());
        let mut details = self.details.lock().unwrap();
        let script = details
            .get_mut(arn)
            .ok_or_else(|| Error::NotFound(format!("certificate {arn}")))?;
        if script.len() > 1 {
            Ok(script.pop_front().unwrap())
        } else {
            script
                .front()
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("certificate {arn}")))
        }
    }

    async fn request_certificate(&self, domain: &str, idempotency_token: &str) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((domain.to_string(), idempotency_token.to_string()));
        self.request_result
            .clone()
            .ok_or_else(|| Error::ExternalState("no scripted request result".to_string()))
    }
}

pub(crate) struct FakeImages {
    pub images: Vec<Image>,
    pub queries: Mutex<Vec<ImageQuery>>,
}

impl FakeImages {
    pub(crate) fn new(images: Vec<Image>) -> FakeImages {
        FakeImages {
            images,
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ImageApi for FakeImages {
    async fn describe_images(&self, query: &ImageQuery) -> Result<Vec<Image>> {
        self.queries.lock().unwrap().push(query.clone());
        Ok(self.images.clone())
    }
}

/// Email identity provider with a scripted status sequence; the final
/// status repeats.
pub(crate) struct FakeEmail {
    pub statuses: Mutex<VecDeque<VerificationStatus>>,
    pub token: String,
    pub verify_requests: Mutex<Vec<String>>,
}

impl FakeEmail {
    pub(crate) fn new(statuses: Vec<VerificationStatus>, token: &str) -> FakeEmail {
        FakeEmail {
            statuses: Mutex::new(statuses.into()),
            token: token.to_string(),
            verify_requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EmailApi for FakeEmail {
    async fn verification_status(&self, _identity: &str) -> Result<VerificationStatus> {
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            Ok(statuses.pop_front().unwrap())
        } else {
            Ok(statuses
                .front()
                .copied()
                .unwrap_or(VerificationStatus::NotStarted))
        }
    }

    async fn request_verification(&self, domain: &str) -> Result<String> {
        self.verify_requests.lock().unwrap().push(domain.to_string());
        Ok(self.token.clone())
    }
}

pub(crate) struct FakeIam {
    pub key: AccessKey,
    pub created_for: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<(String, String)>>,
    pub delete_missing: bool,
}

impl FakeIam {
    pub(crate) fn new(key_id: &str, secret: &str) -> FakeIam {
        FakeIam {
            key: AccessKey {
                access_key_id: key_id.to_string(),
                secret_access_key: secret.to_string(),
            },
            created_for: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            delete_missing: false,
        }
    }
}

#[async_trait]
impl AccessKeyApi for FakeIam {
    async fn create_access_key(&self, user_name: &str) -> Result<AccessKey> {
        self.created_for.lock().unwrap().push(user_name.to_string());
        Ok(self.key.clone())
    }

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> Result<()> {
        self.deleted
            .lock()
            .unwrap()
            .push((user_name.to_string(), access_key_id.to_string()));
        if self.delete_missing {
            return Err(Error::NotFound(format!("access key {access_key_id}")));
        }
        Ok(())
    }
}

pub(crate) struct FakeSecrets {
    pub created: Mutex<Vec<(String, String)>>,
    pub deleted: Mutex<Vec<String>>,
    pub delete_missing: bool,
}

impl FakeSecrets {
    pub(crate) fn new() -> FakeSecrets {
        FakeSecrets {
            created: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            delete_missing: false,
        }
    }
}

#[async_trait]
impl SecretStoreApi for FakeSecrets {
    async fn create_secret(&self, name: &str, value: &str) -> Result<String> {
        self.created
            .lock()
            .unwrap()
            .push((name.to_string(), value.to_string()));
        Ok(format!("arn:secret/{name}"))
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(name.to_string());
        if self.delete_missing {
            return Err(Error::NotFound(format!("secret {name}")));
        }
        Ok(())
    }
}
