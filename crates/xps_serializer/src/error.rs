use alloc::boxed::Box;

use thiserror::Error;
use xps_reflect::context::ContextError;
use xps_reflect::convert::ConvertError;

use crate::packaging::PackagingError;

/// Errors raised by collaborators the serializer does not own: paginators,
/// lazy loaders, flatteners.
pub type BoxError = Box<dyn core::error::Error + Send + Sync>;

/// Everything that can end a serialization session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SerializationError {
    /// A required argument was null.
    #[error("argument `{0}` must not be null")]
    NullArgument(&'static str),
    /// A value of an unexpected type was passed.
    #[error("expected {expected}, found `{found}`")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    /// The object graph references one of its own ancestors.
    #[error("cycle detected: `{type_name}` is already being serialized by an ancestor")]
    CycleDetected { type_name: &'static str },
    /// A mandatory child has no serializer.
    #[error("no serializer is registered for `{type_name}`")]
    NoSerializer { type_name: &'static str },
    /// A node that must be complex to become a document or page is not.
    #[error("`{type_name}` must be a complex value to be serialized as {expected}")]
    WrongPropertyType {
        expected: &'static str,
        type_name: &'static str,
    },
    /// Nothing to write the node into.
    #[error("no XML writer is in scope for `{type_name}`")]
    NoWriter { type_name: &'static str },
    /// Another session is running on the same manager.
    #[error("a serialization session is already running")]
    Busy,
    #[error(transparent)]
    Context(ContextError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Packaging(#[from] PackagingError),
    /// A collaborator failed.
    #[error("{0}")]
    External(BoxError),
}

impl From<ContextError> for SerializationError {
    fn from(value: ContextError) -> Self {
        match value {
            ContextError::CycleDetected { type_name } => Self::CycleDetected { type_name },
            other => Self::Context(other),
        }
    }
}

impl SerializationError {
    /// Wraps a collaborator error.
    #[inline]
    pub fn external(error: impl Into<BoxError>) -> Self {
        Self::External(error.into())
    }
}

/// Result alias of this crate.
pub type Result<T, E = SerializationError> = core::result::Result<T, E>;
