//! The boundary to visual tree flattening.
//!
//! The serializer walks a visual tree and reports every node to a
//! [`VisualTreeFlattener`], which reduces it to fixed-format markup. How the
//! drawing is expressed is entirely up to the flattener;
//! [`BasicVisualService`] is a reference implementation.

// -----------------------------------------------------------------------------
// Modules

mod basic;

// -----------------------------------------------------------------------------
// Exports

pub use basic::BasicVisualService;

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::RefCell;
use core::fmt;

use crate::Result;
use crate::ResourceTables;
use crate::model::{Size, Visual};
use crate::packaging::SharedXmlWriter;

/// What a flattener writes into.
#[derive(Clone)]
pub struct FlattenerContext {
    /// The resource dictionary of the current page.
    pub resource_writer: SharedXmlWriter,
    /// The element the visuals become children of.
    pub body_writer: SharedXmlWriter,
    pub page_size: Size,
    pub resources: Rc<RefCell<ResourceTables>>,
}

impl fmt::Debug for FlattenerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlattenerContext")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

/// Receives the nodes of a visual tree in depth-first order.
pub trait VisualTreeFlattener {
    /// Called when the walk enters `visual`.
    ///
    /// Returning `false` skips the node: its children are not visited and
    /// [`end_visual`](Self::end_visual) is not called for it.
    fn start_visual(&mut self, visual: &Visual) -> Result<bool>;

    /// Called when the walk leaves the node of the matching `start_visual`.
    fn end_visual(&mut self) -> Result<()>;
}

/// Hands out flatteners, one per page.
pub trait VisualSerializationService {
    fn acquire_visual_tree_flattener(&self, context: FlattenerContext) -> Box<dyn VisualTreeFlattener>;

    fn release_visual_tree_flattener(&self, flattener: Box<dyn VisualTreeFlattener>) {
        drop(flattener);
    }
}
