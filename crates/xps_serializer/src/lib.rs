#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod error;
mod manager;
mod options;
mod resources;

pub mod engine;
pub mod events;
pub mod model;
pub mod packaging;
pub mod serializer;
pub mod visual_service;

#[cfg(test)]
mod testing;

// -----------------------------------------------------------------------------
// Exports

pub use error::{BoxError, Result, SerializationError};
pub use manager::{SerializationManager, SerializationManagerBuilder};
pub use options::SerializationOptions;
pub use resources::{DocumentResources, ImageResource, PageResources, PendingResource, ResourceTables};

pub use engine::{AsyncSerializationManager, BatchVisualWriter, EngineState};

/// The XPS fixed-format markup namespace.
pub const XPS_NAMESPACE: &str = "http://schemas.microsoft.com/xps/2005/06";

/// Namespace of `x:Key` inside resource dictionaries.
pub const RESOURCE_KEY_NAMESPACE: &str =
    "http://schemas.microsoft.com/xps/2005/06/resourcedictionary-key";

/// Attribute value written for a null simple property.
pub const NULL_STRING: &str = "*null";
