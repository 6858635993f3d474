use alloc::rc::Rc;
use alloc::string::ToString;
use alloc::vec::Vec;

use slotmap::SlotMap;

use crate::cache::TypeCache;
use crate::context::{ContextError, ContextKey, NamespaceDeclaration, NamespaceTable};
use crate::context::{PropertyCollection, PropertyOrigin, SerializableObjectContext};
use crate::{Reflect, same_instance};

// -----------------------------------------------------------------------------
// GraphContextStack

/// The ancestors of the node currently being serialized.
///
/// Contexts live in a per-session arena and the stack holds their keys, root
/// at the bottom. The depth of the stack always equals the depth of the
/// traversal, whichever engine drives it.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use xps_reflect::context::{ContextError, GraphContextStack};
/// use xps_reflect::info::{TypeInfo, TypeInfoCell, Typed};
/// use xps_reflect::Reflect;
///
/// struct Node;
/// impl Typed for Node {
///     fn type_info() -> &'static TypeInfo {
///         static CELL: TypeInfoCell = TypeInfoCell::new();
///         CELL.get_or_init(|| TypeInfo::builder::<Node>().build())
///     }
/// }
/// xps_reflect::impl_reflect!(Node);
///
/// let node: Rc<dyn Reflect> = Rc::new(Node);
/// let mut stack = GraphContextStack::new();
///
/// let root = stack.create_context(node.clone(), None, None).unwrap();
/// stack.push(root).unwrap();
///
/// let again = stack.create_context(node, Some(root), None);
/// assert!(matches!(again, Err(ContextError::CycleDetected { .. })));
/// ```
#[derive(Default)]
pub struct GraphContextStack {
    arena: SlotMap<ContextKey, SerializableObjectContext>,
    stack: Vec<ContextKey>,
    root: Option<ContextKey>,
}

impl GraphContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context for `target`.
    ///
    /// Fails with [`ContextError::CycleDetected`] when a context on the stack
    /// already holds the same instance. The new context is not pushed.
    pub fn create_context(
        &mut self,
        target: Rc<dyn Reflect>,
        parent: Option<ContextKey>,
        origin: Option<PropertyOrigin>,
    ) -> Result<ContextKey, ContextError> {
        let cache_item = TypeCache::global().get_for(&*target);
        let type_info = cache_item.type_info();

        if self.contains_target(&target) {
            return Err(ContextError::CycleDetected {
                type_name: type_info.name(),
            });
        }

        let mut namespaces = match parent {
            Some(key) => self.get(key).ok_or(ContextError::UnknownContext)?.namespaces.clone(),
            None => Rc::default(),
        };

        let mut prefix = None;
        let mut declared = None;
        if let Some(uri) = type_info.xml_namespace() {
            let in_scope = namespaces.prefix_of(uri).map(|p| p.map(ToString::to_string));
            match in_scope {
                Some(Some(existing)) => prefix = Some(existing),
                Some(None) => {}
                None if namespaces.default_namespace().is_none() && parent.is_none() => {
                    namespaces = Rc::new(NamespaceTable::with_default(uri));
                    declared = Some(NamespaceDeclaration { prefix: None, uri });
                }
                None => {
                    let generated = Rc::make_mut(&mut namespaces).declare(uri);
                    prefix = Some(generated.clone());
                    declared = Some(NamespaceDeclaration {
                        prefix: Some(generated),
                        uri,
                    });
                }
            }
        }

        let (is_complex, is_read_only) = match &origin {
            Some(origin) => (origin.is_complex, origin.is_read_only),
            None => (true, false),
        };

        let properties = PropertyCollection::new(target.clone(), cache_item.clone());

        Ok(self.arena.insert(SerializableObjectContext {
            name: type_info.name(),
            prefix,
            declared,
            target,
            is_complex,
            is_read_only,
            namespaces,
            origin,
            parent,
            cache_item,
            properties,
        }))
    }

    /// Drops a context that is no longer on the stack.
    pub fn recycle(&mut self, key: ContextKey) -> Option<SerializableObjectContext> {
        if self.root == Some(key) {
            self.root = None;
        }
        self.arena.remove(key)
    }

    pub fn push(&mut self, key: ContextKey) -> Result<(), ContextError> {
        if !self.arena.contains_key(key) {
            return Err(ContextError::UnknownContext);
        }
        self.stack.push(key);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<ContextKey> {
        self.stack.pop()
    }

    /// The context on top of the stack.
    #[inline]
    pub fn top(&self) -> Option<ContextKey> {
        self.stack.last().copied()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[inline]
    pub fn get(&self, key: ContextKey) -> Option<&SerializableObjectContext> {
        self.arena.get(key)
    }

    #[inline]
    pub fn get_mut(&mut self, key: ContextKey) -> Option<&mut SerializableObjectContext> {
        self.arena.get_mut(key)
    }

    /// Like [`get`](Self::get), failing with [`ContextError::UnknownContext`].
    pub fn context(&self, key: ContextKey) -> Result<&SerializableObjectContext, ContextError> {
        self.arena.get(key).ok_or(ContextError::UnknownContext)
    }

    pub fn context_mut(&mut self, key: ContextKey) -> Result<&mut SerializableObjectContext, ContextError> {
        self.arena.get_mut(key).ok_or(ContextError::UnknownContext)
    }

    /// Returns `true` if an ancestor on the stack holds `target`.
    pub fn contains_target(&self, target: &Rc<dyn Reflect>) -> bool {
        self.stack
            .iter()
            .filter_map(|key| self.arena.get(*key))
            .any(|context| same_instance(&context.target, target))
    }

    /// Keys on the stack, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = ContextKey> + '_ {
        self.stack.iter().rev().copied()
    }

    /// The nearest context on the stack satisfying `predicate`.
    pub fn find_nearest(
        &self,
        mut predicate: impl FnMut(&SerializableObjectContext) -> bool,
    ) -> Option<ContextKey> {
        self.ancestors()
            .find(|key| self.arena.get(*key).is_some_and(&mut predicate))
    }

    /// The nearest context on the stack whose target is a `T`.
    pub fn find_nearest_of<T: Reflect>(&self) -> Option<ContextKey> {
        self.find_nearest(SerializableObjectContext::is::<T>)
    }

    /// Marks the root context of the session. Allowed once until cleared.
    pub fn set_root(&mut self, key: ContextKey) -> Result<(), ContextError> {
        if self.root.is_some() {
            return Err(ContextError::RootAlreadySet);
        }
        if !self.arena.contains_key(key) {
            return Err(ContextError::UnknownContext);
        }
        self.root = Some(key);
        Ok(())
    }

    #[inline]
    pub fn root(&self) -> Option<ContextKey> {
        self.root
    }

    /// Number of live contexts, on the stack or not.
    #[inline]
    pub fn live_contexts(&self) -> usize {
        self.arena.len()
    }

    /// Forgets everything, for the start of a new session.
    pub fn clear(&mut self) {
        self.stack.clear();
        self.arena.clear();
        self.root = None;
    }

    /// The names of the contexts on the stack, root first, e.g.
    /// `FixedDocumentSequence -> FixedDocument -> FixedPage`.
    #[cfg(feature = "debug")]
    pub fn path(&self) -> alloc::string::String {
        let names: Vec<_> = self
            .stack
            .iter()
            .filter_map(|key| self.arena.get(*key))
            .map(|context| context.name)
            .collect();
        names.join(" -> ")
    }
}

impl core::fmt::Debug for GraphContextStack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.stack.iter().filter_map(|key| self.arena.get(*key)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    use super::*;
    use crate::Value;
    use crate::info::{PropertyInfo, TypeInfo, TypeInfoCell, Typed};

    const NS: &str = "urn:test:outer";
    const OTHER_NS: &str = "urn:test:inner";

    struct Outer {
        child: RefCell<Option<Rc<dyn Reflect>>>,
        label: &'static str,
    }

    impl Typed for Outer {
        fn type_info() -> &'static TypeInfo {
            static CELL: TypeInfoCell = TypeInfoCell::new();
            CELL.get_or_init(|| {
                TypeInfo::builder::<Outer>()
                    .xml_namespace(NS)
                    .property(PropertyInfo::new::<Outer>("Child", |o| {
                        o.child.borrow().clone().map_or(Value::Null, Value::Object)
                    }))
                    .property(PropertyInfo::new::<Outer>("Label", |o| o.label.into()))
                    .build()
            })
        }
    }

    struct Inner;

    impl Typed for Inner {
        fn type_info() -> &'static TypeInfo {
            static CELL: TypeInfoCell = TypeInfoCell::new();
            CELL.get_or_init(|| TypeInfo::builder::<Inner>().xml_namespace(OTHER_NS).build())
        }
    }

    crate::impl_reflect!(Outer, Inner);

    fn outer(label: &'static str) -> Rc<Outer> {
        Rc::new(Outer {
            child: RefCell::new(None),
            label,
        })
    }

    #[test]
    fn root_flags_and_name() {
        let mut stack = GraphContextStack::new();
        let root = stack.create_context(outer("a"), None, None).unwrap();
        let context = stack.get(root).unwrap();
        assert_eq!(context.name(), "Outer");
        assert!(context.is_complex());
        assert!(!context.is_read_only());
        assert_eq!(context.declared_namespace().map(|d| d.uri), Some(NS));
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn cycle_is_detected_by_identity() {
        let a = outer("same");
        let b = outer("same");
        let mut stack = GraphContextStack::new();

        let ka = stack.create_context(a.clone(), None, None).unwrap();
        stack.push(ka).unwrap();

        // Equal contents, distinct instance.
        let kb = stack.create_context(b, Some(ka), None).unwrap();
        stack.push(kb).unwrap();

        let err = stack.create_context(a, Some(kb), None).unwrap_err();
        assert_eq!(err, ContextError::CycleDetected { type_name: "Outer" });
    }

    #[test]
    fn popped_targets_may_reappear() {
        let a = outer("a");
        let mut stack = GraphContextStack::new();
        let first = stack.create_context(a.clone(), None, None).unwrap();
        stack.push(first).unwrap();
        assert_eq!(stack.pop(), Some(first));
        stack.recycle(first);
        assert!(stack.create_context(a, None, None).is_ok());
        assert!(stack.get(first).is_none());
    }

    #[test]
    fn origin_decides_flags() {
        let mut stack = GraphContextStack::new();
        let origin = PropertyOrigin {
            name: "Child",
            is_complex: false,
            is_read_only: true,
        };
        let key = stack.create_context(Rc::new(Inner), None, Some(origin)).unwrap();
        let context = stack.get(key).unwrap();
        assert!(!context.is_complex());
        assert!(context.is_read_only());
        assert_eq!(context.origin().map(|o| o.name), Some("Child"));
    }

    #[test]
    fn namespace_tables_are_shared_until_declared() {
        let mut stack = GraphContextStack::new();
        let root = stack.create_context(outer("a"), None, None).unwrap();
        stack.push(root).unwrap();
        let same = stack.create_context(outer("b"), Some(root), None).unwrap();
        let other = stack.create_context(Rc::new(Inner), Some(root), None).unwrap();

        let root_table = stack.get(root).unwrap().namespaces().clone();
        assert!(Rc::ptr_eq(&root_table, stack.get(same).unwrap().namespaces()));
        assert!(!Rc::ptr_eq(&root_table, stack.get(other).unwrap().namespaces()));

        let inner = stack.get(other).unwrap();
        assert_eq!(inner.qualified_name(), "ns0:Inner");
        assert_eq!(inner.declared_namespace().unwrap().attribute_name(), "xmlns:ns0");
        assert_eq!(root_table.prefix_of(OTHER_NS), None);
    }

    #[test]
    fn property_cursor_resets() {
        let a = outer("label");
        *a.child.borrow_mut() = Some(Rc::new(Inner));
        let mut stack = GraphContextStack::new();
        let key = stack.create_context(a, None, None).unwrap();

        let properties = stack.get_mut(key).unwrap().properties_mut();
        let first: Vec<_> = properties.by_ref().map(|p| p.name()).collect();
        assert_eq!(first, ["Child", "Label"]);
        assert!(properties.next().is_none());

        properties.reset();
        let child = properties.next().unwrap();
        assert!(child.is_complex());
        assert!(child.should_serialize());
        let label = properties.next().unwrap();
        assert!(!label.is_complex());
        assert_eq!(label.value(), &Value::from("label"));
    }

    #[test]
    fn nearest_and_root() {
        let mut stack = GraphContextStack::new();
        let root = stack.create_context(outer("a"), None, None).unwrap();
        stack.push(root).unwrap();
        stack.set_root(root).unwrap();
        assert_eq!(stack.set_root(root), Err(ContextError::RootAlreadySet));

        let inner = stack.create_context(Rc::new(Inner), Some(root), None).unwrap();
        stack.push(inner).unwrap();
        assert_eq!(stack.find_nearest_of::<Outer>(), Some(root));
        assert_eq!(stack.find_nearest_of::<Inner>(), Some(inner));
        assert_eq!(stack.top(), Some(inner));

        #[cfg(feature = "debug")]
        assert_eq!(stack.path(), "Outer -> Inner");

        stack.clear();
        assert_eq!(stack.root(), None);
        assert_eq!(stack.live_contexts(), 0);
    }
}
