#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod dispatcher;

// -----------------------------------------------------------------------------
// Exports

pub use async_task::Task;
pub use dispatcher::Dispatcher;

#[cfg(feature = "std")]
pub use futures_lite::future::block_on;

// -----------------------------------------------------------------------------
// Re-Exports

pub use futures_lite;
pub use futures_lite::future::poll_once;
