//! Stack-scoped singleton acquisition.
//!
//! `acquire` creates a resource only if one was not already recorded on
//! the enclosing stack for the same resolved key. The stack keeps an
//! explicit map from derived resource id to the created handle, so every
//! caller within a synthesis run observes the same instance and the
//! factory runs at most once per (stack, key) pair.

use std::any::Any;
use std::rc::Rc;

use crate::core::key::{resource_id, ResourceKey};
use crate::core::scope::Node;
use crate::error::{Error, Result};

/// Find or create the singleton for `key` under the stack enclosing
/// `scope`. The factory receives the stack node and the derived resource
/// id and must create exactly one child with that id.
pub fn acquire<T, F>(scope: &Node, key: &ResourceKey, factory: F) -> Result<Rc<T>>
where
    T: 'static,
    F: FnOnce(&Node, &str) -> Result<T>,
{
    let stack = scope
        .enclosing_stack()
        .ok_or_else(|| Error::Scope(scope.path()))?;
    let id = resource_id(scope.kind(), key, &stack);

    if let Some(existing) = stack.singleton_get(&id) {
        return Rc::downcast::<T>(existing).map_err(|_| {
            Error::Validation(format!(
                "singleton '{}' was already registered with a different type",
                id
            ))
        });
    }

    let created = Rc::new(factory(stack.node(), &id)?);
    stack.singleton_put(&id, created.clone() as Rc<dyn Any>);
    Ok(created)
}
