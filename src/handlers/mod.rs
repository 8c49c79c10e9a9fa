//! Lifecycle handlers.
//!
//! One handler per capability, each driven by the provisioning engine's
//! Create/Update/Delete events. Create and Update are convergent: a
//! handler re-entered after a partial run finds already-achieved external
//! state instead of recreating it.

pub mod certificate;
pub mod hosted_zone;
pub mod machine_image;
pub mod poll;
pub mod smtp_user;
pub mod verify_domain;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::{HandlerResponse, LifecycleEvent};

/// A custom resource lifecycle handler.
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    /// The resource type this handler serves.
    fn resource_type(&self) -> &'static str;

    async fn handle(&self, event: &LifecycleEvent) -> Result<HandlerResponse>;
}
