//! Per-node state of a serialization session.
//!
//! - [`SerializableObjectContext`]: one node: target, name, namespace scope,
//!   complex/read-only flags and a restartable [`PropertyCollection`].
//! - [`SerializablePropertyContext`]: one property with a lazily read value.
//! - [`GraphContextStack`]: ancestors of the current node, used for cycle
//!   detection and nearest-ancestor lookups. Contexts are stored in a
//!   per-session arena keyed by [`ContextKey`].

// -----------------------------------------------------------------------------
// Modules

mod error;
mod namespace;
mod object;
mod property;
mod stack;

// -----------------------------------------------------------------------------
// Exports

pub use error::ContextError;
pub use namespace::NamespaceTable;
pub use object::{NamespaceDeclaration, SerializableObjectContext};
pub use property::{PropertyCollection, PropertyOrigin, SerializablePropertyContext};
pub use stack::GraphContextStack;

slotmap::new_key_type! {
    /// Handle to a context in a [`GraphContextStack`].
    pub struct ContextKey;
}
