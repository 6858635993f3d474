//! The boundary to the package container.
//!
//! The serializer never touches the container itself. It asks a
//! [`PackagingPolicy`] for one [`XmlWriter`] per part kind and hands it print
//! tickets and binary resources. [`InMemoryPackage`] is a complete policy that
//! keeps every part in memory.

// -----------------------------------------------------------------------------
// Modules

mod memory;
mod xml;

// -----------------------------------------------------------------------------
// Exports

pub use memory::{InMemoryPackage, PrintTicketRecord, XmlEvent};
pub use xml::XmlTextWriter;

use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;

use thiserror::Error;

use crate::events::PrintTicketLevel;
use crate::model::PrintTicket;

// -----------------------------------------------------------------------------
// PartKind

/// The XML parts the serializer writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    DocumentSequence,
    FixedDocument,
    FixedPage,
    /// The resource dictionary of the current page.
    ResourceDictionary,
}

// -----------------------------------------------------------------------------
// PackagingError

/// Misuse of a writer or of the packaging policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PackagingError {
    #[error("attribute `{name}` written after element content")]
    AttributeAfterContent { name: String },
    #[error("end element without a matching start element")]
    UnbalancedEnd,
    #[error("{count} element(s) still open when the part was closed")]
    UnclosedElements { count: usize },
    #[error("no {0:?} part is open")]
    PartNotOpen(PartKind),
    #[error("part `{0}` already exists")]
    DuplicatePart(String),
}

// -----------------------------------------------------------------------------
// XmlWriter

/// A forward-only XML writer for one part.
pub trait XmlWriter {
    fn write_start_element(&mut self, name: &str) -> Result<(), PackagingError>;

    /// Writes an attribute of the element started last. Only valid before any
    /// child element.
    fn write_attribute(&mut self, name: &str, value: &str) -> Result<(), PackagingError>;

    fn write_end_element(&mut self) -> Result<(), PackagingError>;

    fn flush(&mut self) -> Result<(), PackagingError>;
}

/// A writer shared by every node writing into the same part.
pub type SharedXmlWriter = Rc<RefCell<dyn XmlWriter>>;

// -----------------------------------------------------------------------------
// PackagingPolicy

/// The package container as seen by the serializer.
///
/// Writers are reference counted per [`PartKind`]: acquiring a kind that is
/// already open returns the same writer, and the part is closed when every
/// acquisition was released.
pub trait PackagingPolicy {
    fn acquire_xml_writer(&self, kind: PartKind) -> Result<SharedXmlWriter, PackagingError>;

    /// Releases one acquisition; the last one flushes and closes the part.
    fn release_xml_writer(&self, kind: PartKind) -> Result<(), PackagingError>;

    fn acquire_xml_writer_for_page(&self) -> Result<SharedXmlWriter, PackagingError> {
        self.acquire_xml_writer(PartKind::FixedPage)
    }

    fn acquire_xml_writer_for_resource_dictionary(&self) -> Result<SharedXmlWriter, PackagingError> {
        self.acquire_xml_writer(PartKind::ResourceDictionary)
    }

    /// The URI of the open part of `kind`, used for `Source` references.
    fn current_part_uri(&self, kind: PartKind) -> Option<String>;

    fn persist_print_ticket(&self, ticket: &PrintTicket, level: PrintTicketLevel) -> Result<(), PackagingError>;

    /// Stores a binary resource part such as an image or a color profile.
    /// Each URI may be stored once per package.
    fn persist_resource(&self, uri: &str, bytes: &[u8]) -> Result<(), PackagingError>;

    /// Called once a page is complete, before its writer is released.
    fn pre_commit_current_page(&self) -> Result<(), PackagingError>;

    /// Finalizes the package.
    fn commit(&self) -> Result<(), PackagingError>;
}
