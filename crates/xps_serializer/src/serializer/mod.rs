//! One serializer per document-model concept.
//!
//! A [`ReachSerializer`] persists the node it is given and describes the rest
//! of the work as [`Operation`]s: child nodes to serialize, cursors to
//! advance. It never recurses itself, so the synchronous and the asynchronous
//! engines drive the very same steps.
//!
//! Types name their serializer through
//! [`TypeInfoBuilder::serializer`](xps_reflect::info::TypeInfoBuilder::serializer)
//! using the constants of [`names`]. A serializer registered for a concrete
//! type takes precedence.

// -----------------------------------------------------------------------------
// Modules

mod document;
mod object;
mod page;
mod print_ticket;
mod visual;

// -----------------------------------------------------------------------------
// Exports

pub use document::{DocumentPaginatorSerializer, DocumentReferenceCollectionSerializer};
pub use document::{DocumentReferenceSerializer, DocumentSequenceSerializer, FixedDocumentSerializer};
pub use object::ObjectSerializer;
pub use page::{DocumentPageSerializer, FixedPageSerializer, PageContentCollectionSerializer};
pub use page::{PageContentSerializer, UIElementCollectionSerializer};
pub use print_ticket::PrintTicketSerializer;
pub use visual::{VisualSerializer, VisualWalk};

pub(crate) use document::{serialize_document_page, serialize_next_document_reference};
pub(crate) use object::serialize_next_property;
pub(crate) use page::{close_page, open_page, serialize_next_page_content, serialize_next_ui_element};

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::any::TypeId;

use xps_reflect::Reflect;
use xps_reflect::context::{ContextKey, PropertyOrigin};
use xps_utils::TypeIdMap;
use xps_utils::hash::HashMap;

use crate::engine::{Operation, PropertyPass};
use crate::model::PrintTicket;
use crate::packaging::{SharedXmlWriter, XmlWriter};
use crate::{Result, SerializationManager};

/// Serializer names a type can declare.
pub mod names {
    /// Properties as attributes, complex properties as child elements.
    pub const OBJECT: &str = "Object";
    pub const FIXED_DOCUMENT_SEQUENCE: &str = "FixedDocumentSequence";
    pub const DOCUMENT_REFERENCE_COLLECTION: &str = "DocumentReferenceCollection";
    pub const DOCUMENT_REFERENCE: &str = "DocumentReference";
    pub const FIXED_DOCUMENT: &str = "FixedDocument";
    pub const PAGE_CONTENT_COLLECTION: &str = "PageContentCollection";
    pub const PAGE_CONTENT: &str = "PageContent";
    pub const FIXED_PAGE: &str = "FixedPage";
    pub const UI_ELEMENT_COLLECTION: &str = "UIElementCollection";
    pub const VISUAL: &str = "Visual";
    pub const PRINT_TICKET: &str = "PrintTicket";
    pub const DOCUMENT_PAGE: &str = "DocumentPage";
    pub const DOCUMENT_PAGINATOR: &str = "DocumentPaginator";
}

// -----------------------------------------------------------------------------
// ReachSerializer

/// Persists one kind of node.
pub trait ReachSerializer {
    /// The name types refer to, one of [`names`] for the built-in ones.
    fn name(&self) -> &'static str;

    /// Writes the opening part of the node behind `context` and returns the
    /// steps that serialize its content, in order.
    fn persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<Vec<Operation>>;

    /// Runs once every step returned by
    /// [`persist_object_data`](Self::persist_object_data) has completed.
    fn end_persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<()> {
        let _ = (context, manager);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// SerializerTable

/// The dispatch table of a manager.
pub(crate) struct SerializerTable {
    by_type: TypeIdMap<Rc<dyn ReachSerializer>>,
    by_name: HashMap<&'static str, Rc<dyn ReachSerializer>>,
}

impl SerializerTable {
    /// A table holding every built-in serializer.
    pub(crate) fn with_defaults() -> Self {
        let mut table = Self {
            by_type: TypeIdMap::new(),
            by_name: HashMap::default(),
        };
        table.register_named(Rc::new(ObjectSerializer));
        table.register_named(Rc::new(DocumentSequenceSerializer));
        table.register_named(Rc::new(DocumentReferenceCollectionSerializer));
        table.register_named(Rc::new(DocumentReferenceSerializer));
        table.register_named(Rc::new(FixedDocumentSerializer));
        table.register_named(Rc::new(DocumentPaginatorSerializer));
        table.register_named(Rc::new(PageContentCollectionSerializer));
        table.register_named(Rc::new(PageContentSerializer));
        table.register_named(Rc::new(FixedPageSerializer));
        table.register_named(Rc::new(DocumentPageSerializer));
        table.register_named(Rc::new(UIElementCollectionSerializer));
        table.register_named(Rc::new(VisualSerializer));
        table.register_named(Rc::new(PrintTicketSerializer));
        table
    }

    pub(crate) fn register_named(&mut self, serializer: Rc<dyn ReachSerializer>) {
        self.by_name.insert(serializer.name(), serializer);
    }

    pub(crate) fn register_type(&mut self, type_id: TypeId, serializer: Rc<dyn ReachSerializer>) {
        self.by_type.insert(type_id, serializer);
    }

    pub(crate) fn get(&self, target: &dyn Reflect) -> Option<Rc<dyn ReachSerializer>> {
        if let Some(serializer) = self.by_type.get(&target.ty_id()) {
            return Some(serializer.clone());
        }
        let name = target.reflect_type_info().serializer()?;
        self.by_name.get(name).cloned()
    }

    pub(crate) fn named(&self, name: &str) -> Option<Rc<dyn ReachSerializer>> {
        self.by_name.get(name).cloned()
    }
}

// -----------------------------------------------------------------------------
// Helpers

/// The origin of a node reached as an element of a collection or through a
/// fixed link of the document model.
pub(crate) fn element_origin(name: &'static str) -> PropertyOrigin {
    PropertyOrigin {
        name,
        is_complex: true,
        is_read_only: false,
    }
}

/// A step serializing `target` as a child of `parent`.
pub(crate) fn child_operation(
    manager: &SerializationManager,
    target: Rc<dyn Reflect>,
    parent: ContextKey,
    origin: &'static str,
) -> Result<Operation> {
    let serializer = manager.require_serializer(&*target)?;
    Ok(Operation::SerializeObject {
        serializer,
        target,
        parent: Some(parent),
        origin: Some(element_origin(origin)),
    })
}

/// The first step of the reflected property walk of `context`.
pub(crate) fn property_walk(context: ContextKey) -> Operation {
    Operation::SerializeNextProperty {
        context,
        pass: PropertyPass::Attributes,
    }
}

/// The step handing `ticket` to the packaging policy, if there is a ticket.
pub(crate) fn print_ticket_operation(
    manager: &SerializationManager,
    parent: ContextKey,
    ticket: Option<Rc<PrintTicket>>,
) -> Result<Option<Operation>> {
    ticket
        .map(|ticket| child_operation(manager, ticket, parent, "PrintTicket"))
        .transpose()
}

/// Starts the root element of a part and declares its namespace.
pub(crate) fn write_part_root(writer: &SharedXmlWriter, name: &str, namespace: &str) -> Result<()> {
    let mut writer = writer.borrow_mut();
    writer.write_start_element(name)?;
    writer.write_attribute("xmlns", namespace)?;
    Ok(())
}

/// Writes an empty element pointing at another part.
pub(crate) fn write_part_reference(writer: &SharedXmlWriter, element: &str, source: &str) -> Result<()> {
    let mut writer = writer.borrow_mut();
    writer.write_start_element(element)?;
    writer.write_attribute("Source", source)?;
    writer.write_end_element()?;
    Ok(())
}
