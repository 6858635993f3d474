use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::any::TypeId;
use core::cell::{Cell, Ref, RefCell, RefMut};
use core::fmt;

use slotmap::SecondaryMap;
use xps_reflect::context::{ContextKey, GraphContextStack, SerializableObjectContext};
use xps_reflect::info::TypeInfo;
use xps_reflect::{Reflect, Value};

use crate::engine::{self, HierarchyState, Operation};
use crate::events::{PrintTicketLevel, PrintTicketRequiredEventArgs, ProgressChangedEventArgs};
use crate::events::{ProgressLevel, SerializationHooks};
use crate::model::{PrintTicket, Visual, as_visual};
use crate::packaging::{PackagingPolicy, PartKind, SharedXmlWriter};
use crate::serializer::{ReachSerializer, SerializerTable};
use crate::visual_service::{BasicVisualService, VisualSerializationService, VisualTreeFlattener};
use crate::{ResourceTables, Result, SerializationError, SerializationOptions};

// -----------------------------------------------------------------------------
// Session state

/// The writer a context writes its element into.
struct BoundWriter {
    writer: SharedXmlWriter,
    /// Set when the context opened the part and must release it.
    part: Option<PartKind>,
}

/// The page currently being written.
pub(crate) struct PageState {
    pub(crate) writer: SharedXmlWriter,
    pub(crate) resource_writer: SharedXmlWriter,
    pub(crate) flattener: Option<Box<dyn VisualTreeFlattener>>,
    pub(crate) number: usize,
    pub(crate) dictionary: String,
    /// The context whose attribute pass is still writing the page element.
    pub(crate) header_owner: Option<ContextKey>,
}

// -----------------------------------------------------------------------------
// SerializationManager

/// Coordinates one serialization session at a time.
///
/// The manager owns the dispatch table, the graph context stack, the resource
/// tables and the caller's event handlers. [`serialize_object`] runs a whole
/// session synchronously; [`AsyncSerializationManager`] runs the same steps
/// one per dispatcher tick.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use xps_serializer::SerializationManager;
/// use xps_serializer::model::{Color, FixedDocument, FixedDocumentSequence, FixedPage, Size, Visual};
/// use xps_serializer::packaging::InMemoryPackage;
///
/// let page = Rc::new(FixedPage::new(Size::new(100.0, 50.0)));
/// page.add_child(Rc::new(Visual::solid_path("M 0,0 L 10,10", Color::BLACK)));
/// let document = Rc::new(FixedDocument::new());
/// document.add_page(page);
/// let sequence = Rc::new(FixedDocumentSequence::new());
/// sequence.add_document(document);
///
/// let package = InMemoryPackage::new();
/// let manager = SerializationManager::new(package.clone());
/// manager.serialize_object(sequence).unwrap();
///
/// assert!(package.is_committed());
/// assert!(package.part("/Documents/1/Pages/1.fpage").unwrap().contains("<Path"));
/// ```
///
/// [`serialize_object`]: Self::serialize_object
/// [`AsyncSerializationManager`]: crate::AsyncSerializationManager
pub struct SerializationManager {
    options: SerializationOptions,
    packaging: Rc<dyn PackagingPolicy>,
    visual_service: Rc<dyn VisualSerializationService>,
    hooks: SerializationHooks,
    serializers: RefCell<SerializerTable>,
    graph: RefCell<GraphContextStack>,
    writers: RefCell<SecondaryMap<ContextKey, BoundWriter>>,
    resources: Rc<RefCell<ResourceTables>>,
    pages: RefCell<Vec<PageState>>,
    hierarchy: RefCell<Option<HierarchyState>>,
    documents: Cell<usize>,
    page_count: Cell<usize>,
    busy: Cell<bool>,
}

impl SerializationManager {
    /// A manager with default options, no event handlers and the
    /// [`BasicVisualService`].
    pub fn new(packaging: impl PackagingPolicy + 'static) -> Self {
        Self::builder(packaging).build()
    }

    pub fn builder(packaging: impl PackagingPolicy + 'static) -> SerializationManagerBuilder {
        SerializationManagerBuilder {
            packaging: Rc::new(packaging),
            visual_service: None,
            options: SerializationOptions::default(),
            hooks: SerializationHooks::default(),
            serializers: Vec::new(),
        }
    }

    #[inline]
    pub fn options(&self) -> &SerializationOptions {
        &self.options
    }

    #[inline]
    pub fn packaging(&self) -> &dyn PackagingPolicy {
        &*self.packaging
    }

    #[inline]
    pub fn visual_service(&self) -> &dyn VisualSerializationService {
        &*self.visual_service
    }

    /// Returns `true` while a session runs.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    // -------------------------------------------------------------------------
    // Entry points

    /// Serializes `target` and everything reachable from it, then commits the
    /// package.
    ///
    /// A bare [`Visual`] is written as the only page of a synthesized
    /// sequence and document.
    pub fn serialize_object(&self, target: Rc<dyn Reflect>) -> Result<()> {
        self.begin_session()?;
        let result = self
            .root_operations(target)
            .and_then(|operations| engine::run_to_completion(self, operations));
        self.end_session(result.as_ref().err());
        result
    }

    /// Like [`serialize_object`](Self::serialize_object), for a value that
    /// may not hold an object.
    pub fn serialize_value(&self, value: &Value) -> Result<()> {
        match value {
            Value::Object(target) => self.serialize_object(target.clone()),
            Value::Null | Value::Unset => Err(SerializationError::NullArgument("value")),
            other => Err(SerializationError::WrongType {
                expected: "an object",
                found: other.kind_name(),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Dispatch

    /// The serializer for `target`: the one registered for its type, else
    /// the one its type names.
    pub fn get_serializer(&self, target: &dyn Reflect) -> Option<Rc<dyn ReachSerializer>> {
        self.serializers.borrow().get(target)
    }

    /// Uses `serializer` for every `T`.
    pub fn register_serializer<T: Reflect>(&self, serializer: impl ReachSerializer + 'static) {
        self.serializers
            .borrow_mut()
            .register_type(TypeId::of::<T>(), Rc::new(serializer));
    }

    /// The XML namespace elements of a type are written in.
    pub fn get_xml_namespace(&self, type_info: &TypeInfo) -> Option<&'static str> {
        type_info.xml_namespace()
    }

    /// Like [`get_serializer`](Self::get_serializer), failing for mandatory
    /// children.
    pub(crate) fn require_serializer(&self, target: &dyn Reflect) -> Result<Rc<dyn ReachSerializer>> {
        self.get_serializer(target).ok_or_else(|| SerializationError::NoSerializer {
            type_name: target.reflect_type_info().name(),
        })
    }

    pub(crate) fn serializer_named(&self, name: &'static str) -> Result<Rc<dyn ReachSerializer>> {
        self.serializers
            .borrow()
            .named(name)
            .ok_or(SerializationError::NoSerializer { type_name: name })
    }

    // -------------------------------------------------------------------------
    // Graph

    /// The graph context stack of the running session.
    pub fn graph(&self) -> Ref<'_, GraphContextStack> {
        self.graph.borrow()
    }

    pub(crate) fn graph_mut(&self) -> RefMut<'_, GraphContextStack> {
        self.graph.borrow_mut()
    }

    /// The context of the object the session started from.
    pub fn root_context(&self) -> Option<ContextKey> {
        self.graph.borrow().root()
    }

    /// Reads from the context behind `key`.
    pub(crate) fn context<R>(&self, key: ContextKey, f: impl FnOnce(&SerializableObjectContext) -> R) -> Result<R> {
        let graph = self.graph.borrow();
        Ok(f(graph.context(key)?))
    }

    /// The target of `key`, downcast to `T`.
    pub(crate) fn target_as<T: Reflect>(&self, key: ContextKey) -> Result<Rc<T>> {
        let target = self.context(key, |context| context.target().clone())?;
        <dyn Reflect>::downcast_rc::<T>(target).map_err(|other| SerializationError::WrongType {
            expected: core::any::type_name::<T>(),
            found: other.reflect_type_info().name(),
        })
    }

    // -------------------------------------------------------------------------
    // Writers

    /// Makes `writer` the writer of `key` and its descendants.
    pub(crate) fn bind_writer(&self, key: ContextKey, writer: SharedXmlWriter, part: Option<PartKind>) {
        self.writers.borrow_mut().insert(key, BoundWriter { writer, part });
    }

    /// Forgets the writer of `key`, releasing its part if it owns one.
    pub(crate) fn unbind_writer(&self, key: ContextKey) -> Result<()> {
        let bound = self.writers.borrow_mut().remove(key);
        if let Some(BoundWriter { part: Some(part), .. }) = bound {
            self.packaging.release_xml_writer(part)?;
        }
        Ok(())
    }

    /// The writer bound to `start` or to its nearest ancestor.
    pub(crate) fn find_writer(&self, start: Option<ContextKey>) -> Option<SharedXmlWriter> {
        let graph = self.graph.borrow();
        let writers = self.writers.borrow();
        let mut current = start;
        while let Some(key) = current {
            if let Some(bound) = writers.get(key) {
                return Some(bound.writer.clone());
            }
            current = graph.get(key)?.parent();
        }
        None
    }

    /// The writer of the parent of `key`.
    pub(crate) fn parent_writer(&self, key: ContextKey) -> Result<Option<SharedXmlWriter>> {
        let parent = self.context(key, SerializableObjectContext::parent)?;
        Ok(self.find_writer(parent))
    }

    /// The writer `key` writes into: its own or an ancestor's, else the page
    /// being written.
    pub(crate) fn nearest_writer(&self, key: ContextKey) -> Result<SharedXmlWriter> {
        if let Some(writer) = self.find_writer(Some(key)) {
            return Ok(writer);
        }
        if let Some(page) = self.pages.borrow().last() {
            return Ok(page.writer.clone());
        }
        Err(SerializationError::NoWriter {
            type_name: self.context(key, SerializableObjectContext::name)?,
        })
    }

    // -------------------------------------------------------------------------
    // Pages and resources

    #[inline]
    pub(crate) fn resources(&self) -> &Rc<RefCell<ResourceTables>> {
        &self.resources
    }

    pub(crate) fn push_page(&self, page: PageState) {
        self.pages.borrow_mut().push(page);
    }

    pub(crate) fn pop_page(&self) -> Option<PageState> {
        self.pages.borrow_mut().pop()
    }

    /// Takes the deferred header of the page being written if `owner` owns
    /// it. `None` takes it whoever the owner is.
    pub(crate) fn take_page_header(&self, owner: Option<ContextKey>) -> Option<(SharedXmlWriter, String)> {
        let mut pages = self.pages.borrow_mut();
        let page = pages.last_mut()?;
        let pending = page.header_owner?;
        if owner.is_some_and(|owner| owner != pending) {
            return None;
        }
        page.header_owner = None;
        Some((page.writer.clone(), page.dictionary.clone()))
    }

    /// Runs `f` on the flattener of the page being written.
    pub(crate) fn with_flattener<R>(&self, f: impl FnOnce(&mut dyn VisualTreeFlattener) -> Result<R>) -> Result<R> {
        let mut pages = self.pages.borrow_mut();
        let flattener = pages
            .last_mut()
            .and_then(|page| page.flattener.as_mut())
            .ok_or(SerializationError::NoWriter { type_name: "Visual" })?;
        f(&mut **flattener)
    }

    pub(crate) fn hierarchy(&self) -> RefMut<'_, Option<HierarchyState>> {
        self.hierarchy.borrow_mut()
    }

    /// Counts a new document and returns its 1-based number.
    pub(crate) fn next_document(&self) -> usize {
        let number = self.documents.get() + 1;
        self.documents.set(number);
        self.page_count.set(0);
        number
    }

    /// The number of the document being written.
    #[inline]
    pub(crate) fn document_number(&self) -> usize {
        self.documents.get()
    }

    /// Counts a new page of the current document.
    pub(crate) fn next_page(&self) -> usize {
        let number = self.page_count.get() + 1;
        self.page_count.set(number);
        number
    }

    // -------------------------------------------------------------------------
    // Events

    /// Lets the caller replace the ticket about to be persisted.
    pub(crate) fn resolve_print_ticket(
        &self,
        level: PrintTicketLevel,
        sequence: usize,
        print_ticket: Option<Rc<PrintTicket>>,
    ) -> Option<Rc<PrintTicket>> {
        let mut args = PrintTicketRequiredEventArgs {
            level,
            sequence,
            print_ticket,
        };
        self.hooks.print_ticket_required(&mut args);
        args.print_ticket
    }

    pub(crate) fn raise_progress(&self, level: ProgressLevel, number: usize) {
        log::debug!("{level:?} {number} written");
        self.hooks.progress_changed(&ProgressChangedEventArgs { level, number });
    }

    // -------------------------------------------------------------------------
    // Sessions

    pub(crate) fn begin_session(&self) -> Result<()> {
        if self.busy.replace(true) {
            return Err(SerializationError::Busy);
        }
        log::debug!("serialization session started");
        Ok(())
    }

    /// Resets every piece of session state.
    pub(crate) fn end_session(&self, error: Option<&SerializationError>) {
        match error {
            #[cfg(feature = "debug")]
            Some(error) => log::debug!("serialization failed at `{}`: {error}", self.graph.borrow().path()),
            #[cfg(not(feature = "debug"))]
            Some(error) => log::debug!("serialization failed: {error}"),
            None => log::debug!("serialization session finished"),
        }

        self.graph.borrow_mut().clear();
        self.writers.borrow_mut().clear();
        self.resources.borrow_mut().clear();
        let pages = core::mem::take(&mut *self.pages.borrow_mut());
        for page in pages {
            if let Some(flattener) = page.flattener {
                log::trace!("releasing the flattener of unfinished page {}", page.number);
                self.visual_service().release_visual_tree_flattener(flattener);
            }
        }
        self.hierarchy.borrow_mut().take();
        self.documents.set(0);
        self.page_count.set(0);
        self.busy.set(false);
    }

    /// The steps serializing `target` as the root of a session.
    pub(crate) fn root_operations(&self, target: Rc<dyn Reflect>) -> Result<Vec<Operation>> {
        if let Some(visual) = as_visual(&target) {
            let mut operations = vec![Operation::SimulateBeginFixedDocumentSequence];
            operations.extend(self.batch_write_operations(visual));
            operations.extend(self.batch_commit_operations());
            return Ok(operations);
        }

        let serializer = self.require_serializer(&*target)?;
        Ok(vec![
            Operation::SerializeObject {
                serializer,
                target,
                parent: None,
                origin: None,
            },
            Operation::Commit,
        ])
    }

    /// The steps writing one visual as a page of the synthesized hierarchy.
    pub(crate) fn batch_write_operations(&self, visual: Rc<Visual>) -> Vec<Operation> {
        vec![Operation::SimulateBeginFixedPage { visual }]
    }

    pub(crate) fn batch_commit_operations(&self) -> Vec<Operation> {
        vec![Operation::SimulateEndFixedDocumentSequence, Operation::Commit]
    }

    /// Returns `true` once the synthesized sequence and document are open.
    pub(crate) fn hierarchy_started(&self) -> bool {
        self.hierarchy.borrow().is_some()
    }
}

impl fmt::Debug for SerializationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializationManager")
            .field("options", &self.options)
            .field("busy", &self.busy.get())
            .field("depth", &self.graph.borrow().depth())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// SerializationManagerBuilder

/// Configures a [`SerializationManager`].
///
/// Event handlers are fixed at construction.
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use xps_serializer::SerializationManager;
/// use xps_serializer::events::ProgressLevel;
/// use xps_serializer::model::{FixedPage, PrintTicket};
/// use xps_serializer::packaging::InMemoryPackage;
///
/// let pages = Rc::new(Cell::new(0));
/// let counter = pages.clone();
///
/// let package = InMemoryPackage::new();
/// let manager = SerializationManager::builder(package.clone())
///     .on_print_ticket_required(|args| {
///         args.print_ticket = Some(Rc::new(PrintTicket::new("<PrintTicket/>")));
///     })
///     .on_progress_changed(move |args| {
///         if args.level == ProgressLevel::FixedPage {
///             counter.set(counter.get() + 1);
///         }
///     })
///     .build();
///
/// manager.serialize_object(Rc::new(FixedPage::default())).unwrap();
/// assert_eq!(pages.get(), 1);
/// assert_eq!(package.print_tickets().len(), 1);
/// ```
pub struct SerializationManagerBuilder {
    packaging: Rc<dyn PackagingPolicy>,
    visual_service: Option<Rc<dyn VisualSerializationService>>,
    options: SerializationOptions,
    hooks: SerializationHooks,
    serializers: Vec<(TypeId, Rc<dyn ReachSerializer>)>,
}

impl SerializationManagerBuilder {
    pub fn visual_service(mut self, service: impl VisualSerializationService + 'static) -> Self {
        self.visual_service = Some(Rc::new(service));
        self
    }

    pub fn options(mut self, options: SerializationOptions) -> Self {
        self.options = options;
        self
    }

    /// Called before each sequence, document and page is written.
    pub fn on_print_ticket_required(mut self, f: impl Fn(&mut PrintTicketRequiredEventArgs) + 'static) -> Self {
        self.hooks.print_ticket_required = Some(Box::new(f));
        self
    }

    /// Called after each sequence, document and page is written.
    pub fn on_progress_changed(mut self, f: impl Fn(&ProgressChangedEventArgs) + 'static) -> Self {
        self.hooks.progress_changed = Some(Box::new(f));
        self
    }

    /// Uses `serializer` for every `T`.
    pub fn serializer<T: Reflect>(mut self, serializer: impl ReachSerializer + 'static) -> Self {
        self.serializers.push((TypeId::of::<T>(), Rc::new(serializer)));
        self
    }

    pub fn build(self) -> SerializationManager {
        let mut table = SerializerTable::with_defaults();
        for (type_id, serializer) in self.serializers {
            table.register_type(type_id, serializer);
        }

        SerializationManager {
            options: self.options,
            packaging: self.packaging,
            visual_service: self
                .visual_service
                .unwrap_or_else(|| Rc::new(BasicVisualService::new())),
            hooks: self.hooks,
            serializers: RefCell::new(table),
            graph: RefCell::new(GraphContextStack::new()),
            writers: RefCell::new(SecondaryMap::new()),
            resources: Rc::new(RefCell::new(ResourceTables::new())),
            pages: RefCell::new(Vec::new()),
            hierarchy: RefCell::new(None),
            documents: Cell::new(0),
            page_count: Cell::new(0),
            busy: Cell::new(false),
        }
    }
}

impl fmt::Debug for SerializationManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializationManagerBuilder")
            .field("options", &self.options)
            .field("hooks", &self.hooks)
            .field("serializers", &self.serializers.len())
            .finish_non_exhaustive()
    }
}
