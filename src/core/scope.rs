//! The provisioning tree.
//!
//! Constructs are nodes in a hierarchical namespace rooted at an `App`
//! node. Stacks are nodes that additionally own synthesis state: the
//! late-bound token table, the singleton registry map, and the set of
//! declared custom resources. Synthesis is single-threaded, so the tree
//! uses `Rc`/`RefCell` interior mutability rather than locks.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::error::{Error, Result};

/// A late-bound value reference, resolved through the owning stack's
/// token table at synthesis time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenRef {
    id: u64,
}

impl TokenRef {
    /// The stable textual encoding used when no value has been bound.
    pub fn encode(&self) -> String {
        format!("${{Token[{}]}}", self.id)
    }
}

struct StackState {
    tokens: RefCell<HashMap<u64, String>>,
    next_token: Cell<u64>,
    singletons: RefCell<HashMap<String, Rc<dyn Any>>>,
    resources: RefCell<BTreeMap<String, Value>>,
}

struct NodeInner {
    id: String,
    kind: &'static str,
    parent: Weak<NodeInner>,
    children: RefCell<BTreeMap<String, Node>>,
    stack: Option<StackState>,
}

/// A node in the provisioning tree.
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

impl Node {
    /// Create a root node. Every tree has exactly one, with an empty id.
    pub fn root() -> Node {
        Node {
            inner: Rc::new(NodeInner {
                id: String::new(),
                kind: "App",
                parent: Weak::new(),
                children: RefCell::new(BTreeMap::new()),
                stack: None,
            }),
        }
    }

    fn attach(&self, kind: &'static str, id: &str, stack: Option<StackState>) -> Result<Node> {
        if id.is_empty() {
            return Err(Error::Validation(
                "construct id must not be empty".to_string(),
            ));
        }
        let mut children = self.inner.children.borrow_mut();
        if children.contains_key(id) {
            return Err(Error::Validation(format!(
                "construct '{}' already has a child named '{}'",
                self.path(),
                id
            )));
        }
        let child = Node {
            inner: Rc::new(NodeInner {
                id: id.to_string(),
                kind,
                parent: Rc::downgrade(&self.inner),
                children: RefCell::new(BTreeMap::new()),
                stack,
            }),
        };
        children.insert(id.to_string(), child.clone());
        Ok(child)
    }

    /// Attach a plain child construct node. Child ids are unique within a
    /// parent; a duplicate id is a validation error.
    pub fn child(&self, kind: &'static str, id: &str) -> Result<Node> {
        self.attach(kind, id, None)
    }

    /// The node's own id (empty for the root).
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The scope type name, used to namespace singleton ids.
    pub fn kind(&self) -> &'static str {
        self.inner.kind
    }

    /// Slash-joined path from the root.
    pub fn path(&self) -> String {
        let mut ids = Vec::new();
        let mut current = Some(self.inner.clone());
        while let Some(node) = current {
            if !node.id.is_empty() {
                ids.push(node.id.clone());
            }
            current = node.parent.upgrade();
        }
        ids.reverse();
        format!("/{}", ids.join("/"))
    }

    /// Walk upward (starting at this node) to the nearest enclosing stack.
    pub fn enclosing_stack(&self) -> Option<Stack> {
        let mut current = Some(self.inner.clone());
        while let Some(node) = current {
            if node.stack.is_some() {
                return Some(Stack {
                    node: Node { inner: node },
                });
            }
            current = node.parent.upgrade();
        }
        None
    }

    pub(crate) fn parent(&self) -> Option<Node> {
        self.inner.parent.upgrade().map(|inner| Node { inner })
    }

    pub(crate) fn same_node(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A stack: the synthesis unit that owns tokens, singletons, and declared
/// resources.
#[derive(Clone)]
pub struct Stack {
    node: Node,
}

impl Stack {
    pub fn new(scope: &Node, id: &str) -> Result<Stack> {
        let node = scope.attach(
            "Stack",
            id,
            Some(StackState {
                tokens: RefCell::new(HashMap::new()),
                next_token: Cell::new(0),
                singletons: RefCell::new(HashMap::new()),
                resources: RefCell::new(BTreeMap::new()),
            }),
        )?;
        Ok(Stack { node })
    }

    /// The stack's own tree node. Singleton factories create their child
    /// under this node so repeated lookups land on the same parent.
    pub fn node(&self) -> &Node {
        &self.node
    }

    fn state(&self) -> &StackState {
        // Stack nodes always carry state; enforced by the constructor.
        self.node
            .inner
            .stack
            .as_ref()
            .expect("stack node without stack state")
    }

    /// Allocate a fresh late-bound token.
    pub fn allocate_token(&self) -> TokenRef {
        let state = self.state();
        let id = state.next_token.get();
        state.next_token.set(id + 1);
        TokenRef { id }
    }

    /// Bind a concrete value to a token.
    pub fn bind_token(&self, token: TokenRef, value: impl Into<String>) {
        self.state().tokens.borrow_mut().insert(token.id, value.into());
    }

    /// Resolve a token to its bound value, falling back to the stable
    /// encoding when the value is not yet known.
    pub fn resolve_token(&self, token: TokenRef) -> String {
        self.state()
            .tokens
            .borrow()
            .get(&token.id)
            .cloned()
            .unwrap_or_else(|| token.encode())
    }

    pub(crate) fn singleton_get(&self, resource_id: &str) -> Option<Rc<dyn Any>> {
        self.state().singletons.borrow().get(resource_id).cloned()
    }

    pub(crate) fn singleton_put(&self, resource_id: &str, handle: Rc<dyn Any>) {
        self.state()
            .singletons
            .borrow_mut()
            .insert(resource_id.to_string(), handle);
    }

    /// Record a declared resource for template synthesis.
    pub fn declare_resource(&self, logical_id: &str, declaration: Value) {
        self.state()
            .resources
            .borrow_mut()
            .insert(logical_id.to_string(), declaration);
    }

    /// Synthesize the declared resources into a template document.
    pub fn template(&self) -> Value {
        let resources = self.state().resources.borrow();
        let mut map = serde_json::Map::new();
        for (id, decl) in resources.iter() {
            map.insert(id.clone(), decl.clone());
        }
        serde_json::json!({ "Resources": Value::Object(map) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_ids_are_unique_within_a_parent() {
        let root = Node::root();
        let stack = Stack::new(&root, "Main").unwrap();
        stack.node().child("Widget", "A").unwrap();
        let dup = stack.node().child("Widget", "A");
        assert!(matches!(dup, Err(Error::Validation(_))));
    }

    #[test]
    fn enclosing_stack_walks_upward() {
        let root = Node::root();
        let stack = Stack::new(&root, "Main").unwrap();
        let mid = stack.node().child("Group", "Inner").unwrap();
        let leaf = mid.child("Widget", "Leaf").unwrap();

        let found = leaf.enclosing_stack().unwrap();
        assert!(found.node().same_node(stack.node()));
    }

    #[test]
    fn no_enclosing_stack_outside_a_stack() {
        let root = Node::root();
        let orphan = root.child("Widget", "Orphan").unwrap();
        assert!(orphan.enclosing_stack().is_none());
    }

    #[test]
    fn paths_join_from_the_root() {
        let root = Node::root();
        let stack = Stack::new(&root, "Main").unwrap();
        let leaf = stack.node().child("Widget", "Leaf").unwrap();
        assert_eq!(leaf.path(), "/Main/Leaf");
    }

    #[test]
    fn tokens_resolve_to_bound_values_or_stable_encodings() {
        let root = Node::root();
        let stack = Stack::new(&root, "Main").unwrap();
        let token = stack.allocate_token();
        assert_eq!(stack.resolve_token(token), "${Token[0]}");
        stack.bind_token(token, "arn:cert/123");
        assert_eq!(stack.resolve_token(token), "arn:cert/123");
    }
}
