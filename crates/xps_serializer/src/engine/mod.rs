//! The two drivers of a serialization session.
//!
//! Serializers describe their work as [`Operation`]s. The synchronous engine
//! ([`SerializationManager::serialize_object`]) runs them eagerly; the
//! [`AsyncSerializationManager`] runs exactly one per dispatcher tick. Both
//! keep the pending operations on a LIFO stack and push the steps an
//! operation returns in reverse, so the traversal is depth-first and
//! left-to-right under either driver.

// -----------------------------------------------------------------------------
// Modules

mod async_engine;
mod simulator;

// -----------------------------------------------------------------------------
// Exports

pub use async_engine::{AsyncSerializationManager, EngineState};
pub use simulator::BatchVisualWriter;

pub(crate) use simulator::HierarchyState;

use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use xps_reflect::Reflect;
use xps_reflect::context::{ContextKey, PropertyOrigin};

use crate::model::Visual;
use crate::serializer::{self, ReachSerializer, VisualWalk};
use crate::{Result, SerializationManager};

// -----------------------------------------------------------------------------
// Operation

/// Which half of the property walk of a node is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyPass {
    /// Simple properties, written as attributes of the open element.
    Attributes,
    /// Complex properties, written as child elements.
    Elements,
}

/// One resumable step of a session.
///
/// Each variant carries what it needs to run once: the node's context, a
/// cursor position, the serializer to finish with.
pub enum Operation {
    /// Creates a context for `target`, pushes it and persists the node.
    SerializeObject {
        serializer: Rc<dyn ReachSerializer>,
        target: Rc<dyn Reflect>,
        parent: Option<ContextKey>,
        origin: Option<PropertyOrigin>,
    },
    /// Finishes a node once everything it scheduled has run, then pops and
    /// recycles its context.
    EndPersistObject {
        serializer: Rc<dyn ReachSerializer>,
        context: ContextKey,
    },
    SerializeNextProperty {
        context: ContextKey,
        pass: PropertyPass,
    },
    SerializeNextDocumentReference {
        context: ContextKey,
        index: usize,
    },
    SerializeNextPageContent {
        context: ContextKey,
        index: usize,
    },
    SerializeNextUIElement {
        context: ContextKey,
        index: usize,
    },
    /// Requests page `index` from a paginator.
    SerializeDocumentPage {
        context: ContextKey,
        index: usize,
    },
    /// Advances a visual tree walk by one node.
    VisitVisual {
        context: ContextKey,
        walk: VisualWalk,
    },
    /// Opens the sequence and document parts of a visuals-only session.
    SimulateBeginFixedDocumentSequence,
    /// Opens a page for one visual of a visuals-only session.
    SimulateBeginFixedPage {
        visual: Rc<Visual>,
    },
    SimulateEndFixedPage,
    SimulateEndFixedDocumentSequence,
    /// Finalizes the package.
    Commit,
}

impl Operation {
    /// A short label for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SerializeObject { .. } => "SerializeObject",
            Self::EndPersistObject { .. } => "EndPersistObject",
            Self::SerializeNextProperty { .. } => "SerializeNextProperty",
            Self::SerializeNextDocumentReference { .. } => "SerializeNextDocumentReference",
            Self::SerializeNextPageContent { .. } => "SerializeNextPageContent",
            Self::SerializeNextUIElement { .. } => "SerializeNextUIElement",
            Self::SerializeDocumentPage { .. } => "SerializeDocumentPage",
            Self::VisitVisual { .. } => "VisitVisual",
            Self::SimulateBeginFixedDocumentSequence => "SimulateBeginFixedDocumentSequence",
            Self::SimulateBeginFixedPage { .. } => "SimulateBeginFixedPage",
            Self::SimulateEndFixedPage => "SimulateEndFixedPage",
            Self::SimulateEndFixedDocumentSequence => "SimulateEndFixedDocumentSequence",
            Self::Commit => "Commit",
        }
    }

    /// Runs the step and returns the steps it scheduled, in execution order.
    pub(crate) fn execute(self, manager: &SerializationManager) -> Result<Vec<Operation>> {
        log::trace!("{}", self.name());
        match self {
            Self::SerializeObject {
                serializer,
                target,
                parent,
                origin,
            } => {
                let context = {
                    let mut graph = manager.graph_mut();
                    let context = graph.create_context(target, parent, origin)?;
                    graph.push(context)?;
                    if parent.is_none() && graph.root().is_none() {
                        graph.set_root(context)?;
                    }
                    context
                };
                let mut operations = serializer.persist_object_data(context, manager)?;
                operations.push(Self::EndPersistObject { serializer, context });
                Ok(operations)
            }
            Self::EndPersistObject { serializer, context } => {
                serializer.end_persist_object_data(context, manager)?;
                manager.unbind_writer(context)?;
                let mut graph = manager.graph_mut();
                graph.pop();
                graph.recycle(context);
                Ok(Vec::new())
            }
            Self::SerializeNextProperty { context, pass } => serializer::serialize_next_property(manager, context, pass),
            Self::SerializeNextDocumentReference { context, index } => {
                serializer::serialize_next_document_reference(manager, context, index)
            }
            Self::SerializeNextPageContent { context, index } => {
                serializer::serialize_next_page_content(manager, context, index)
            }
            Self::SerializeNextUIElement { context, index } => {
                serializer::serialize_next_ui_element(manager, context, index)
            }
            Self::SerializeDocumentPage { context, index } => serializer::serialize_document_page(manager, context, index),
            Self::VisitVisual { context, walk } => Ok(walk
                .step(manager)?
                .map(|walk| Self::VisitVisual { context, walk })
                .into_iter()
                .collect()),
            Self::SimulateBeginFixedDocumentSequence => {
                simulator::begin_sequence(manager)?;
                Ok(Vec::new())
            }
            Self::SimulateBeginFixedPage { visual } => simulator::begin_page(manager, visual),
            Self::SimulateEndFixedPage => {
                simulator::end_page(manager)?;
                Ok(Vec::new())
            }
            Self::SimulateEndFixedDocumentSequence => {
                simulator::end_sequence(manager)?;
                Ok(Vec::new())
            }
            Self::Commit => {
                manager.packaging().commit()?;
                Ok(vec![])
            }
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SerializeObject { serializer, target, .. } => f
                .debug_struct("SerializeObject")
                .field("serializer", &serializer.name())
                .field("target", &target.reflect_type_info().name())
                .finish_non_exhaustive(),
            Self::EndPersistObject { serializer, context } => f
                .debug_struct("EndPersistObject")
                .field("serializer", &serializer.name())
                .field("context", context)
                .finish(),
            Self::SerializeNextProperty { context, pass } => f
                .debug_struct("SerializeNextProperty")
                .field("context", context)
                .field("pass", pass)
                .finish(),
            Self::SerializeNextDocumentReference { context, index }
            | Self::SerializeNextPageContent { context, index }
            | Self::SerializeNextUIElement { context, index }
            | Self::SerializeDocumentPage { context, index } => f
                .debug_struct(self.name())
                .field("context", context)
                .field("index", index)
                .finish(),
            Self::VisitVisual { context, walk } => f
                .debug_struct("VisitVisual")
                .field("context", context)
                .field("walk", walk)
                .finish(),
            other => f.write_str(other.name()),
        }
    }
}

// -----------------------------------------------------------------------------
// OperationStack

/// Pending steps of a session, next step on top.
#[derive(Debug, Default)]
pub(crate) struct OperationStack {
    stack: Vec<Operation>,
}

impl OperationStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Schedules `operations` so that the first of them runs next.
    pub(crate) fn push_all(&mut self, operations: Vec<Operation>) {
        self.stack.extend(operations.into_iter().rev());
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Option<Operation> {
        self.stack.pop()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn clear(&mut self) {
        self.stack.clear();
    }
}

/// Runs `operations` and everything they schedule, eagerly.
pub(crate) fn run_to_completion(manager: &SerializationManager, operations: Vec<Operation>) -> Result<()> {
    let mut stack = OperationStack::new();
    stack.push_all(operations);
    while let Some(operation) = stack.pop() {
        let scheduled = operation.execute(manager)?;
        stack.push_all(scheduled);
    }
    Ok(())
}
