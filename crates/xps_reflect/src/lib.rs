#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

// -----------------------------------------------------------------------------
// Extern Self

// `impl_reflect!` expands to `::xps_reflect::...` paths, which must also
// resolve inside this crate's own tests.
extern crate self as xps_reflect;

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod value;

pub mod cache;
pub mod context;
pub mod convert;
pub mod info;

// -----------------------------------------------------------------------------
// Top-Level exports

pub use value::{Reflect, TypeName, Value, same_instance};
