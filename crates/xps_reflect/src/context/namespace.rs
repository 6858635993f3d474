use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

// -----------------------------------------------------------------------------
// NamespaceTable

/// XML namespaces in scope for a node.
///
/// Contexts share their parent's table through an `Rc` and only copy it when
/// they declare something new, so a deep tree of same-namespace elements
/// holds a single table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceTable {
    default: Option<&'static str>,
    prefixed: Vec<(String, &'static str)>,
    generated: usize,
}

impl NamespaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table whose default namespace is `uri`.
    pub fn with_default(uri: &'static str) -> Self {
        Self {
            default: Some(uri),
            ..Self::default()
        }
    }

    #[inline]
    pub fn default_namespace(&self) -> Option<&'static str> {
        self.default
    }

    /// Returns `Some(None)` for the default namespace, `Some(Some(prefix))` for
    /// a declared prefix, or `None` when `uri` is not in scope.
    pub fn prefix_of(&self, uri: &str) -> Option<Option<&str>> {
        if self.default == Some(uri) {
            return Some(None);
        }
        self.prefixed
            .iter()
            .rev()
            .find(|(_, u)| *u == uri)
            .map(|(prefix, _)| Some(prefix.as_str()))
    }

    /// Returns the namespace bound to `prefix`.
    pub fn lookup(&self, prefix: &str) -> Option<&'static str> {
        self.prefixed
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| *uri)
    }

    /// Binds `uri` to a generated prefix (`ns0`, `ns1`, ...) and returns it.
    pub fn declare(&mut self, uri: &'static str) -> String {
        let prefix = format!("ns{}", self.generated);
        self.generated += 1;
        self.prefixed.push((prefix.clone(), uri));
        prefix
    }

    /// Number of bindings in scope, the default namespace included.
    #[inline]
    pub fn len(&self) -> usize {
        self.prefixed.len() + usize::from(self.default.is_some())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.prefixed.is_empty()
    }
}
