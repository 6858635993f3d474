use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use xps_reflect::info::{PropertyInfo, TypeInfo, TypeInfoCell, Typed};
use xps_reflect::{Reflect, Value};

use crate::model::Size;
use crate::serializer::names;
use crate::{BoxError, XPS_NAMESPACE};

// -----------------------------------------------------------------------------
// PrintTicket

/// An opaque print ticket document, persisted as-is by the packaging policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintTicket {
    xml: String,
}

impl PrintTicket {
    pub fn new(xml: impl Into<String>) -> Self {
        Self { xml: xml.into() }
    }

    #[inline]
    pub fn xml(&self) -> &str {
        &self.xml
    }
}

fn ticket_value(ticket: &RefCell<Option<Rc<PrintTicket>>>) -> Value {
    ticket.borrow().clone().map_or(Value::Null, Value::object)
}

// -----------------------------------------------------------------------------
// Lazy

type Loader<T> = Box<dyn FnOnce() -> Result<T, BoxError>>;

/// A value that is either present or produced by a loader on first use.
struct Lazy<T: Clone> {
    value: RefCell<Option<T>>,
    loader: RefCell<Option<Loader<T>>>,
    loads: Cell<usize>,
}

impl<T: Clone> Lazy<T> {
    fn ready(value: T) -> Self {
        Self {
            value: RefCell::new(Some(value)),
            loader: RefCell::new(None),
            loads: Cell::new(0),
        }
    }

    fn deferred(loader: Loader<T>) -> Self {
        Self {
            value: RefCell::new(None),
            loader: RefCell::new(Some(loader)),
            loads: Cell::new(0),
        }
    }

    fn get(&self) -> Result<Option<T>, BoxError> {
        if let Some(value) = self.value.borrow().clone() {
            return Ok(Some(value));
        }
        let Some(loader) = self.loader.borrow_mut().take() else {
            return Ok(None);
        };
        self.loads.set(self.loads.get() + 1);
        let value = loader()?;
        *self.value.borrow_mut() = Some(value.clone());
        Ok(Some(value))
    }

    fn is_loaded(&self) -> bool {
        self.value.borrow().is_some()
    }

    fn peek(&self) -> Option<T> {
        self.value.borrow().clone()
    }
}

// -----------------------------------------------------------------------------
// FixedDocumentSequence

/// The root of a package: an ordered list of documents.
pub struct FixedDocumentSequence {
    references: Rc<DocumentReferenceCollection>,
    print_ticket: RefCell<Option<Rc<PrintTicket>>>,
}

impl FixedDocumentSequence {
    pub fn new() -> Self {
        Self {
            references: Rc::new(DocumentReferenceCollection::default()),
            print_ticket: RefCell::new(None),
        }
    }

    #[inline]
    pub fn references(&self) -> &Rc<DocumentReferenceCollection> {
        &self.references
    }

    /// Appends a reference to an already built document.
    pub fn add_document(&self, document: Rc<dyn Reflect>) {
        self.references.push(DocumentReference::new(document));
    }

    pub fn add_reference(&self, reference: DocumentReference) {
        self.references.push(reference);
    }

    pub fn print_ticket(&self) -> Option<Rc<PrintTicket>> {
        self.print_ticket.borrow().clone()
    }

    pub fn set_print_ticket(&self, ticket: Option<PrintTicket>) {
        *self.print_ticket.borrow_mut() = ticket.map(Rc::new);
    }
}

impl Default for FixedDocumentSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// The documents of a [`FixedDocumentSequence`].
#[derive(Default)]
pub struct DocumentReferenceCollection {
    items: RefCell<Vec<Rc<DocumentReference>>>,
}

impl DocumentReferenceCollection {
    pub fn push(&self, reference: DocumentReference) {
        self.items.borrow_mut().push(Rc::new(reference));
    }

    pub fn get(&self, index: usize) -> Option<Rc<DocumentReference>> {
        self.items.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

/// Points at a document, loading it on first access if needed.
///
/// ```
/// use std::rc::Rc;
/// use xps_serializer::model::{DocumentReference, FixedDocument};
///
/// let reference = DocumentReference::lazy(|| Ok(Rc::new(FixedDocument::new())));
/// assert!(!reference.is_loaded());
///
/// assert!(reference.get_document().unwrap().is_some());
/// assert!(reference.get_document().unwrap().is_some());
/// assert_eq!(reference.load_count(), 1);
/// ```
pub struct DocumentReference {
    document: Lazy<Rc<dyn Reflect>>,
}

impl DocumentReference {
    pub fn new(document: Rc<dyn Reflect>) -> Self {
        Self {
            document: Lazy::ready(document),
        }
    }

    /// The loader runs at most once, the first time the document is needed.
    pub fn lazy<D: Reflect>(loader: impl FnOnce() -> Result<Rc<D>, BoxError> + 'static) -> Self {
        let loader = move || loader().map(|document| document as Rc<dyn Reflect>);
        Self {
            document: Lazy::deferred(Box::new(loader)),
        }
    }

    /// Returns the document, running the loader if it has not run yet.
    pub fn get_document(&self) -> Result<Option<Rc<dyn Reflect>>, BoxError> {
        self.document.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_loaded()
    }

    /// How many times the loader ran.
    pub fn load_count(&self) -> usize {
        self.document.loads.get()
    }
}

// -----------------------------------------------------------------------------
// FixedDocument

/// One document: an ordered list of pages.
pub struct FixedDocument {
    pages: Rc<PageContentCollection>,
    print_ticket: RefCell<Option<Rc<PrintTicket>>>,
}

impl FixedDocument {
    pub fn new() -> Self {
        Self {
            pages: Rc::new(PageContentCollection::default()),
            print_ticket: RefCell::new(None),
        }
    }

    #[inline]
    pub fn pages(&self) -> &Rc<PageContentCollection> {
        &self.pages
    }

    pub fn add_page(&self, page: Rc<FixedPage>) {
        self.pages.push(PageContent::new(page));
    }

    pub fn add_page_content(&self, content: PageContent) {
        self.pages.push(content);
    }

    pub fn print_ticket(&self) -> Option<Rc<PrintTicket>> {
        self.print_ticket.borrow().clone()
    }

    pub fn set_print_ticket(&self, ticket: Option<PrintTicket>) {
        *self.print_ticket.borrow_mut() = ticket.map(Rc::new);
    }
}

impl Default for FixedDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// The pages of a [`FixedDocument`].
#[derive(Default)]
pub struct PageContentCollection {
    items: RefCell<Vec<Rc<PageContent>>>,
}

impl PageContentCollection {
    pub fn push(&self, content: PageContent) {
        self.items.borrow_mut().push(Rc::new(content));
    }

    pub fn get(&self, index: usize) -> Option<Rc<PageContent>> {
        self.items.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

/// Points at a page, loading it on first access if needed.
pub struct PageContent {
    page: Lazy<Rc<FixedPage>>,
}

impl PageContent {
    pub fn new(page: Rc<FixedPage>) -> Self {
        Self {
            page: Lazy::ready(page),
        }
    }

    pub fn lazy(loader: impl FnOnce() -> Result<Rc<FixedPage>, BoxError> + 'static) -> Self {
        Self {
            page: Lazy::deferred(Box::new(loader)),
        }
    }

    pub fn get_page(&self) -> Result<Option<Rc<FixedPage>>, BoxError> {
        self.page.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.page.is_loaded()
    }

    pub fn load_count(&self) -> usize {
        self.page.loads.get()
    }
}

// -----------------------------------------------------------------------------
// FixedPage

/// A page with a fixed size and a list of visual children.
pub struct FixedPage {
    size: Cell<Size>,
    children: Rc<UIElementCollection>,
    print_ticket: RefCell<Option<Rc<PrintTicket>>>,
    layout_passes: Cell<usize>,
}

impl FixedPage {
    pub fn new(size: Size) -> Self {
        Self {
            size: Cell::new(size),
            children: Rc::new(UIElementCollection::default()),
            print_ticket: RefCell::new(None),
            layout_passes: Cell::new(0),
        }
    }

    #[inline]
    pub fn size(&self) -> Size {
        self.size.get()
    }

    pub fn set_size(&self, size: Size) {
        self.size.set(size);
    }

    #[inline]
    pub fn children(&self) -> &Rc<UIElementCollection> {
        &self.children
    }

    pub fn add_child(&self, child: Rc<dyn Reflect>) {
        self.children.push(child);
    }

    /// Brings the page's layout up to date before it is written.
    pub fn update_layout(&self) {
        self.layout_passes.set(self.layout_passes.get() + 1);
    }

    /// How many layout passes ran.
    pub fn layout_passes(&self) -> usize {
        self.layout_passes.get()
    }

    pub fn print_ticket(&self) -> Option<Rc<PrintTicket>> {
        self.print_ticket.borrow().clone()
    }

    pub fn set_print_ticket(&self, ticket: Option<PrintTicket>) {
        *self.print_ticket.borrow_mut() = ticket.map(Rc::new);
    }
}

impl Default for FixedPage {
    fn default() -> Self {
        Self::new(Size::LETTER)
    }
}

/// The visual children of a [`FixedPage`].
#[derive(Default)]
pub struct UIElementCollection {
    items: RefCell<Vec<Rc<dyn Reflect>>>,
}

impl UIElementCollection {
    pub fn push(&self, element: Rc<dyn Reflect>) {
        self.items.borrow_mut().push(element);
    }

    pub fn get(&self, index: usize) -> Option<Rc<dyn Reflect>> {
        self.items.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

// -----------------------------------------------------------------------------
// Reflection

impl Typed for PrintTicket {
    fn type_info() -> &'static TypeInfo {
        static CELL: TypeInfoCell = TypeInfoCell::new();
        CELL.get_or_init(|| TypeInfo::builder::<PrintTicket>().serializer(names::PRINT_TICKET).build())
    }
}

impl Typed for FixedDocumentSequence {
    fn type_info() -> &'static TypeInfo {
        static CELL: TypeInfoCell = TypeInfoCell::new();
        CELL.get_or_init(|| {
            TypeInfo::builder::<FixedDocumentSequence>()
                .xml_namespace(XPS_NAMESPACE)
                .serializer(names::FIXED_DOCUMENT_SEQUENCE)
                .property(
                    PropertyInfo::new::<FixedDocumentSequence>("References", |s| {
                        Value::object(s.references.clone())
                    })
                    .read_only()
                    .content(),
                )
                .property(
                    PropertyInfo::new::<FixedDocumentSequence>("PrintTicket", |s| ticket_value(&s.print_ticket))
                        .hidden(),
                )
                .build()
        })
    }
}

impl Typed for DocumentReferenceCollection {
    fn type_info() -> &'static TypeInfo {
        static CELL: TypeInfoCell = TypeInfoCell::new();
        CELL.get_or_init(|| {
            TypeInfo::builder::<DocumentReferenceCollection>()
                .serializer(names::DOCUMENT_REFERENCE_COLLECTION)
                .build()
        })
    }
}

impl Typed for DocumentReference {
    fn type_info() -> &'static TypeInfo {
        static CELL: TypeInfoCell = TypeInfoCell::new();
        CELL.get_or_init(|| {
            TypeInfo::builder::<DocumentReference>()
                .xml_namespace(XPS_NAMESPACE)
                .serializer(names::DOCUMENT_REFERENCE)
                .build()
        })
    }
}

impl Typed for FixedDocument {
    fn type_info() -> &'static TypeInfo {
        static CELL: TypeInfoCell = TypeInfoCell::new();
        CELL.get_or_init(|| {
            TypeInfo::builder::<FixedDocument>()
                .xml_namespace(XPS_NAMESPACE)
                .serializer(names::FIXED_DOCUMENT)
                .property(
                    PropertyInfo::new::<FixedDocument>("Pages", |d| Value::object(d.pages.clone()))
                        .read_only()
                        .content(),
                )
                .property(PropertyInfo::new::<FixedDocument>("PrintTicket", |d| ticket_value(&d.print_ticket)).hidden())
                .build()
        })
    }
}

impl Typed for PageContentCollection {
    fn type_info() -> &'static TypeInfo {
        static CELL: TypeInfoCell = TypeInfoCell::new();
        CELL.get_or_init(|| {
            TypeInfo::builder::<PageContentCollection>()
                .serializer(names::PAGE_CONTENT_COLLECTION)
                .build()
        })
    }
}

impl Typed for PageContent {
    fn type_info() -> &'static TypeInfo {
        static CELL: TypeInfoCell = TypeInfoCell::new();
        CELL.get_or_init(|| {
            TypeInfo::builder::<PageContent>()
                .xml_namespace(XPS_NAMESPACE)
                .serializer(names::PAGE_CONTENT)
                .property(
                    PropertyInfo::new::<PageContent>("Child", |c| c.page.peek().map_or(Value::Null, Value::object))
                        .content(),
                )
                .build()
        })
    }
}

impl Typed for FixedPage {
    fn type_info() -> &'static TypeInfo {
        static CELL: TypeInfoCell = TypeInfoCell::new();
        CELL.get_or_init(|| {
            TypeInfo::builder::<FixedPage>()
                .xml_namespace(XPS_NAMESPACE)
                .serializer(names::FIXED_PAGE)
                .property(PropertyInfo::new::<FixedPage>("Width", |p| p.size().width.into()))
                .property(PropertyInfo::new::<FixedPage>("Height", |p| p.size().height.into()))
                .property(
                    PropertyInfo::new::<FixedPage>("Children", |p| Value::object(p.children.clone()))
                        .read_only()
                        .content(),
                )
                .property(PropertyInfo::new::<FixedPage>("PrintTicket", |p| ticket_value(&p.print_ticket)).hidden())
                .build()
        })
    }
}

impl Typed for UIElementCollection {
    fn type_info() -> &'static TypeInfo {
        static CELL: TypeInfoCell = TypeInfoCell::new();
        CELL.get_or_init(|| {
            TypeInfo::builder::<UIElementCollection>()
                .serializer(names::UI_ELEMENT_COLLECTION)
                .build()
        })
    }
}

xps_reflect::impl_reflect!(
    PrintTicket,
    FixedDocumentSequence,
    DocumentReferenceCollection,
    DocumentReference,
    FixedDocument,
    PageContentCollection,
    PageContent,
    FixedPage,
    UIElementCollection,
);

impl fmt::Debug for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentReference")
            .field("loaded", &self.is_loaded())
            .field("loads", &self.load_count())
            .finish()
    }
}

impl fmt::Debug for FixedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedPage")
            .field("size", &self.size())
            .field("children", &self.children.len())
            .field("layout_passes", &self.layout_passes())
            .finish()
    }
}
