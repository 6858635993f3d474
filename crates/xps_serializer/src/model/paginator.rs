use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::RefCell;
use core::fmt;

use xps_reflect::info::{TypeInfo, TypeInfoCell, Typed};

use crate::BoxError;
use crate::model::{PrintTicket, Size, Visual};
use crate::serializer::names;

/// A page produced by a [`DocumentPaginator`].
#[derive(Debug, Clone)]
pub struct DocumentPage {
    visual: Rc<Visual>,
    size: Size,
}

impl DocumentPage {
    pub fn new(visual: Rc<Visual>, size: Size) -> Self {
        Self { visual, size }
    }

    #[inline]
    pub fn visual(&self) -> &Rc<Visual> {
        &self.visual
    }

    #[inline]
    pub fn size(&self) -> Size {
        self.size
    }
}

/// Produces the pages of a flowing document on demand.
///
/// The page count may only become known while pages are produced: the
/// serializer keeps asking for the next index as long as
/// [`is_page_count_valid`](Self::is_page_count_valid) is `false` or the index
/// is below [`page_count`](Self::page_count).
pub trait DocumentPaginator {
    fn is_page_count_valid(&self) -> bool;

    fn page_count(&self) -> usize;

    /// The size suggested for pages that do not report their own.
    fn page_size(&self) -> Size;

    /// Returns page `index`, or `None` past the end of the content.
    fn get_page(&self, index: usize) -> Result<Option<DocumentPage>, BoxError>;
}

/// Serializable wrapper binding a [`DocumentPaginator`] to the object graph.
///
/// Its pages become the pages of one fixed document.
pub struct PaginatedDocument {
    paginator: Box<dyn DocumentPaginator>,
    print_ticket: RefCell<Option<Rc<PrintTicket>>>,
}

impl PaginatedDocument {
    pub fn new(paginator: impl DocumentPaginator + 'static) -> Self {
        Self {
            paginator: Box::new(paginator),
            print_ticket: RefCell::new(None),
        }
    }

    #[inline]
    pub fn paginator(&self) -> &dyn DocumentPaginator {
        &*self.paginator
    }

    pub fn print_ticket(&self) -> Option<Rc<PrintTicket>> {
        self.print_ticket.borrow().clone()
    }

    pub fn set_print_ticket(&self, ticket: Option<PrintTicket>) {
        *self.print_ticket.borrow_mut() = ticket.map(Rc::new);
    }
}

impl fmt::Debug for PaginatedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginatedDocument")
            .field("page_count_valid", &self.paginator.is_page_count_valid())
            .field("page_count", &self.paginator.page_count())
            .finish_non_exhaustive()
    }
}

impl Typed for PaginatedDocument {
    fn type_info() -> &'static TypeInfo {
        static CELL: TypeInfoCell = TypeInfoCell::new();
        CELL.get_or_init(|| {
            TypeInfo::builder::<PaginatedDocument>()
                .name("FixedDocument")
                .xml_namespace(crate::XPS_NAMESPACE)
                .serializer(names::DOCUMENT_PAGINATOR)
                .build()
        })
    }
}

impl Typed for DocumentPage {
    fn type_info() -> &'static TypeInfo {
        static CELL: TypeInfoCell = TypeInfoCell::new();
        CELL.get_or_init(|| {
            TypeInfo::builder::<DocumentPage>()
                .name("FixedPage")
                .xml_namespace(crate::XPS_NAMESPACE)
                .serializer(names::DOCUMENT_PAGE)
                .build()
        })
    }
}

xps_reflect::impl_reflect!(DocumentPage, PaginatedDocument);
