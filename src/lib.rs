//! Infrastructure building blocks for provider-backed resources that the
//! native template language cannot express directly: certificate issuance
//! with DNS validation, hosted zone discovery, machine image resolution,
//! email domain verification, and SMTP credential provisioning.
//!
//! The crate has two halves. [`constructs`] declares resources into a
//! stack's template at synthesis time, collapsing duplicate declarations
//! onto one underlying resource. [`handlers`] serves the lifecycle events
//! those declarations generate at deploy time, talking to the provider
//! through the trait clients in [`clients`].

pub mod clients;
pub mod constructs;
pub mod core;
pub mod error;
pub mod event;
pub mod handlers;

pub use error::{Error, Result};
