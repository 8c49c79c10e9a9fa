//! Machine image location.
//!
//! Resolves a name pattern, owner list, and filter map to the most
//! recently created image in the catalog.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::clients::images::{Image, ImageApi, ImageFilter, ImageQuery};
use crate::error::{Error, Result};
use crate::event::{typed_properties, HandlerResponse, LifecycleEvent, RequestType};
use crate::handlers::LifecycleHandler;

pub const RESOURCE_TYPE: &str = "Custom::LookupMachineImage";

#[derive(Debug, Deserialize)]
struct MachineImageProps {
    name: String,
    #[serde(default)]
    owners: Vec<String>,
    #[serde(default)]
    filters: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MachineImageRequest {
    lookup_machine_image: MachineImageProps,
}

/// Timestamps that fail to parse sort as the epoch; only the relative
/// order matters for picking the newest image.
fn creation_timestamp(image: &Image) -> DateTime<Utc> {
    image
        .creation_date
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Finds the newest catalog image matching a search.
pub struct MachineImageLocator {
    images: Arc<dyn ImageApi>,
}

impl MachineImageLocator {
    pub fn new(images: Arc<dyn ImageApi>) -> MachineImageLocator {
        MachineImageLocator { images }
    }

    async fn lookup(&self, props: &MachineImageProps) -> Result<String> {
        let mut filters = vec![ImageFilter {
            name: "name".to_string(),
            values: vec![props.name.clone()],
        }];
        for (name, values) in &props.filters {
            filters.push(ImageFilter {
                name: name.clone(),
                values: values.clone(),
            });
        }

        let query = ImageQuery {
            owners: props.owners.clone(),
            filters,
        };
        let mut images: Vec<Image> = self
            .images
            .describe_images(&query)
            .await?
            .into_iter()
            .filter(|image| image.image_id.is_some())
            .collect();

        if images.is_empty() {
            return Err(Error::NotFound(format!(
                "no machine image matched the search criteria for '{}'",
                props.name
            )));
        }

        images.sort_by_key(|image| std::cmp::Reverse(creation_timestamp(image)));
        let newest = images
            .into_iter()
            .next()
            .and_then(|image| image.image_id)
            .ok_or_else(|| Error::ExternalState("image lost its identifier".to_string()))?;
        info!(name = %props.name, image_id = %newest, "machine image resolved");
        Ok(newest)
    }
}

#[async_trait::async_trait]
impl LifecycleHandler for MachineImageLocator {
    fn resource_type(&self) -> &'static str {
        RESOURCE_TYPE
    }

    async fn handle(&self, event: &LifecycleEvent) -> Result<HandlerResponse> {
        match event.request_type {
            RequestType::Create | RequestType::Update => {
                let request: MachineImageRequest = typed_properties(&event.resource_properties)?;
                let image_id = self.lookup(&request.lookup_machine_image).await?;
                Ok(HandlerResponse::new(image_id))
            }
            RequestType::Delete => Ok(HandlerResponse::new(event.prior_physical_id()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::FakeImages;
    use serde_json::json;

    fn image(id: &str, created: &str) -> Image {
        Image {
            image_id: Some(id.to_string()),
            creation_date: Some(created.to_string()),
        }
    }

    fn lookup_event(properties: serde_json::Value) -> LifecycleEvent {
        LifecycleEvent {
            request_type: RequestType::Create,
            resource_type: RESOURCE_TYPE.to_string(),
            physical_resource_id: None,
            resource_properties: properties,
            old_resource_properties: None,
            stack_id: None,
        }
    }

    #[tokio::test]
    async fn newest_creation_date_wins() {
        let images = Arc::new(FakeImages::new(vec![
            image("ami-2020", "2020-01-01T00:00:00Z"),
            image("ami-2022", "2022-06-01T00:00:00Z"),
            image("ami-2021", "2021-03-01T00:00:00Z"),
        ]));
        let locator = MachineImageLocator::new(images);

        let response = locator
            .handle(&lookup_event(json!({
                "LookupMachineImage": { "name": "base-*", "owners": ["self"] }
            })))
            .await
            .unwrap();

        assert_eq!(response.physical_resource_id, "ami-2022");
    }

    #[tokio::test]
    async fn id_less_and_unparseable_entries_lose() {
        let images = Arc::new(FakeImages::new(vec![
            Image {
                image_id: None,
                creation_date: Some("2030-01-01T00:00:00Z".to_string()),
            },
            image("ami-undated", "not a timestamp"),
            image("ami-dated", "2021-03-01T00:00:00Z"),
        ]));
        let locator = MachineImageLocator::new(images);

        let response = locator
            .handle(&lookup_event(json!({
                "LookupMachineImage": { "name": "base-*" }
            })))
            .await
            .unwrap();

        assert_eq!(response.physical_resource_id, "ami-dated");
    }

    #[tokio::test]
    async fn filter_map_is_forwarded_with_the_name_pattern() {
        let images = Arc::new(FakeImages::new(vec![image(
            "ami-1",
            "2022-01-01T00:00:00Z",
        )]));
        let locator = MachineImageLocator::new(images.clone());

        locator
            .handle(&lookup_event(json!({
                "LookupMachineImage": {
                    "name": "base-*",
                    "owners": ["123456789012"],
                    "filters": { "architecture": ["x86_64", "arm64"] }
                }
            })))
            .await
            .unwrap();

        let queries = images.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].owners, vec!["123456789012"]);
        assert_eq!(queries[0].filters[0].name, "name");
        assert_eq!(queries[0].filters[0].values, vec!["base-*"]);
        assert_eq!(queries[0].filters[1].name, "architecture");
        assert_eq!(queries[0].filters[1].values, vec!["x86_64", "arm64"]);
    }

    #[tokio::test]
    async fn zero_matches_is_not_found() {
        let images = Arc::new(FakeImages::new(vec![]));
        let locator = MachineImageLocator::new(images);

        let err = locator
            .handle(&lookup_event(json!({
                "LookupMachineImage": { "name": "missing-*" }
            })))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
    }
}
