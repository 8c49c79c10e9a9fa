//! Core provisioning-tree machinery: scopes, deduplication keys, and
//! stack-scoped singleton acquisition.

pub mod key;
pub mod scope;
pub mod singleton;

pub use key::{resource_id, sha256_hex, ResourceKey};
pub use scope::{Node, Stack, TokenRef};
pub use singleton::acquire;
