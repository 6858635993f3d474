use alloc::borrow::Cow;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;

use crate::Reflect;
use crate::cache::TypeCacheItem;
use crate::context::{ContextKey, NamespaceTable, PropertyCollection, PropertyOrigin};
use crate::info::TypeInfo;

// -----------------------------------------------------------------------------
// NamespaceDeclaration

/// A namespace first brought into scope by a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDeclaration {
    /// `None` for the default namespace.
    pub prefix: Option<String>,
    pub uri: &'static str,
}

impl NamespaceDeclaration {
    /// The attribute that declares it, `xmlns` or `xmlns:prefix`.
    pub fn attribute_name(&self) -> Cow<'static, str> {
        match &self.prefix {
            Some(prefix) => Cow::Owned(format!("xmlns:{prefix}")),
            None => Cow::Borrowed("xmlns"),
        }
    }
}

// -----------------------------------------------------------------------------
// SerializableObjectContext

/// One graph node under serialization.
///
/// Created by [`GraphContextStack::create_context`](crate::context::GraphContextStack::create_context),
/// which also decides the complex and read-only flags from the originating
/// property: a root object is complex and writable.
pub struct SerializableObjectContext {
    pub(crate) name: &'static str,
    pub(crate) prefix: Option<String>,
    pub(crate) declared: Option<NamespaceDeclaration>,
    pub(crate) target: Rc<dyn Reflect>,
    pub(crate) is_complex: bool,
    pub(crate) is_read_only: bool,
    pub(crate) namespaces: Rc<NamespaceTable>,
    pub(crate) origin: Option<PropertyOrigin>,
    pub(crate) parent: Option<ContextKey>,
    pub(crate) cache_item: Arc<TypeCacheItem>,
    pub(crate) properties: PropertyCollection,
}

impl SerializableObjectContext {
    /// The simple type name of the target.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The namespace prefix, if the element is not in the default namespace.
    #[inline]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// `prefix:Name` or `Name`.
    pub fn qualified_name(&self) -> Cow<'static, str> {
        match &self.prefix {
            Some(prefix) => Cow::Owned(format!("{prefix}:{}", self.name)),
            None => Cow::Borrowed(self.name),
        }
    }

    /// The namespace this context brought into scope, written on its element.
    #[inline]
    pub fn declared_namespace(&self) -> Option<&NamespaceDeclaration> {
        self.declared.as_ref()
    }

    #[inline]
    pub fn target(&self) -> &Rc<dyn Reflect> {
        &self.target
    }

    #[inline]
    pub fn is_complex(&self) -> bool {
        self.is_complex
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.is_read_only
    }

    #[inline]
    pub fn namespaces(&self) -> &Rc<NamespaceTable> {
        &self.namespaces
    }

    /// Mutable access, copying the table first if it is shared.
    #[inline]
    pub fn namespaces_mut(&mut self) -> &mut NamespaceTable {
        Rc::make_mut(&mut self.namespaces)
    }

    /// The property this node was reached through, `None` for the root.
    #[inline]
    pub fn origin(&self) -> Option<&PropertyOrigin> {
        self.origin.as_ref()
    }

    #[inline]
    pub fn parent(&self) -> Option<ContextKey> {
        self.parent
    }

    #[inline]
    pub fn type_info(&self) -> &'static TypeInfo {
        self.cache_item.type_info()
    }

    #[inline]
    pub fn cache_item(&self) -> &Arc<TypeCacheItem> {
        &self.cache_item
    }

    /// The lazily walked property cursor.
    #[inline]
    pub fn properties_mut(&mut self) -> &mut PropertyCollection {
        &mut self.properties
    }

    /// Returns `true` if the target is a `T`.
    #[inline]
    pub fn is<T: Reflect>(&self) -> bool {
        self.target.is::<T>()
    }
}

impl fmt::Debug for SerializableObjectContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializableObjectContext")
            .field("name", &self.qualified_name())
            .field("is_complex", &self.is_complex)
            .field("is_read_only", &self.is_read_only)
            .field("origin", &self.origin)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}
