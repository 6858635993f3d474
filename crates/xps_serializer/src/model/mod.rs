//! The fixed-format document model the serializer walks.
//!
//! A package is a [`FixedDocumentSequence`] of [`FixedDocument`]s made of
//! [`FixedPage`]s whose children are [`Visual`] trees. A
//! [`PaginatedDocument`] stands in for a fixed document whose pages are
//! produced on demand.

// -----------------------------------------------------------------------------
// Modules

mod document;
mod geometry;
mod paginator;
mod visual;

// -----------------------------------------------------------------------------
// Exports

pub use document::{DocumentReference, DocumentReferenceCollection, FixedDocument};
pub use document::{FixedDocumentSequence, FixedPage, PageContent, PageContentCollection};
pub use document::{PrintTicket, UIElementCollection};
pub use geometry::{Rect, Size};
pub use paginator::{DocumentPage, DocumentPaginator, PaginatedDocument};
pub use visual::{Brush, Color, ColorProfile, ImageSource, Visual, VisualKind};

pub(crate) use visual::as_visual;
