//! Deduplication key resolution.
//!
//! A resource key may contain values that are not known until the stack's
//! own late-binding resolution runs (cross-resource references). Keys are
//! always resolved to a canonical text form first and hashed afterwards;
//! the digest is truncated to 8 hex characters and namespaced with the
//! caller's scope kind so distinct scope types cannot collide on the same
//! raw key.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::core::scope::{Stack, TokenRef};

/// Prefix applied to every derived resource id.
const SINGLETON_NAMESPACE: &str = "Singleton";

/// Truncation length of the hex digest used in resource ids.
const RESOURCE_ID_DIGEST_LEN: usize = 8;

/// A key identifying "which underlying resource this is".
#[derive(Debug, Clone)]
pub enum ResourceKey {
    /// A plain, fully known string.
    Literal(String),
    /// A late-bound reference resolved through the stack's token table.
    Deferred(TokenRef),
    /// A composite of named parts; canonicalization is order-independent.
    Composite(BTreeMap<String, ResourceKey>),
}

impl ResourceKey {
    pub fn literal(value: impl Into<String>) -> ResourceKey {
        ResourceKey::Literal(value.into())
    }

    pub fn deferred(token: TokenRef) -> ResourceKey {
        ResourceKey::Deferred(token)
    }

    pub fn composite<I, K>(parts: I) -> ResourceKey
    where
        I: IntoIterator<Item = (K, ResourceKey)>,
        K: Into<String>,
    {
        ResourceKey::Composite(parts.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Resolve to the canonical text representation. Composite entries are
    /// emitted in sorted key order with unit separators so nesting cannot
    /// collide with crafted literals.
    pub fn canonical(&self, stack: &Stack) -> String {
        match self {
            ResourceKey::Literal(value) => value.clone(),
            ResourceKey::Deferred(token) => stack.resolve_token(*token),
            ResourceKey::Composite(parts) => {
                let mut out = String::new();
                for (name, part) in parts {
                    out.push_str(name);
                    out.push('\u{1f}');
                    out.push_str(&part.canonical(stack));
                    out.push('\u{1e}');
                }
                out
            }
        }
    }
}

/// Hex-encoded SHA-256 of the input.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Derive the deterministic resource id for a key under a scope kind.
pub fn resource_id(scope_kind: &str, key: &ResourceKey, stack: &Stack) -> String {
    let canonical = key.canonical(stack);
    let digest = sha256_hex(&canonical);
    format!(
        "{}_{}_{}",
        SINGLETON_NAMESPACE,
        scope_kind,
        &digest[..RESOURCE_ID_DIGEST_LEN]
    )
}
