use thiserror::Error;

/// Failures of the graph context stack.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContextError {
    /// The object is already being serialized by an ancestor.
    #[error("cycle detected: `{type_name}` is its own ancestor")]
    CycleDetected { type_name: &'static str },
    /// The key was recycled or belongs to another session.
    #[error("unknown or recycled context")]
    UnknownContext,
    #[error("root context is already set for this session")]
    RootAlreadySet,
}
