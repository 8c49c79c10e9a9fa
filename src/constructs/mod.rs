//! Declarative constructs layered over the scope tree.
//!
//! Each construct declares a custom resource (and, where applicable, a
//! stack-shared handler function) whose lifecycle is served by the
//! matching module under [`crate::handlers`].

pub mod custom_resource;
pub mod domain_verification;
pub mod hosted_zone_lookup;
pub mod machine_image;
pub mod shared_certificate;
pub mod smtp_user;

pub use custom_resource::{
    CustomResource, CustomResourceProps, HandlerFunction, HandlerFunctionProps, RemovalPolicy,
};
pub use domain_verification::{DomainVerification, DomainVerificationProps};
pub use hosted_zone_lookup::{HostedZoneLookup, HostedZoneLookupProps};
pub use machine_image::{MachineImageLookup, MachineImageLookupProps};
pub use shared_certificate::{SharedCertificate, SharedCertificateProps};
pub use smtp_user::{SmtpUser, SmtpUserProps};
