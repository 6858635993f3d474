use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use xps_reflect::Reflect;

use super::{Operation, run_to_completion};
use crate::events::{PrintTicketLevel, ProgressLevel};
use crate::model::Visual;
use crate::packaging::{PackagingError, PartKind, SharedXmlWriter, XmlWriter};
use crate::serializer::{close_page, open_page, write_part_reference, write_part_root};
use crate::{Result, SerializationManager, XPS_NAMESPACE};

// -----------------------------------------------------------------------------
// Hierarchy simulation

/// Parts opened on behalf of a session that only writes visuals.
pub(crate) struct HierarchyState {
    sequence: SharedXmlWriter,
    document: SharedXmlWriter,
    page: Option<SharedXmlWriter>,
}

/// Writes the sequence and document elements a package of bare visuals still
/// needs, as if a one-document sequence were being serialized.
pub(crate) fn begin_sequence(manager: &SerializationManager) -> Result<()> {
    if manager.hierarchy_started() {
        return Ok(());
    }
    let packaging = manager.packaging();

    let sequence = packaging.acquire_xml_writer(PartKind::DocumentSequence)?;
    write_part_root(&sequence, "FixedDocumentSequence", XPS_NAMESPACE)?;
    let ticket = manager.resolve_print_ticket(PrintTicketLevel::FixedDocumentSequence, 1, None);
    if let Some(ticket) = ticket {
        packaging.persist_print_ticket(&ticket, PrintTicketLevel::FixedDocumentSequence)?;
    }

    let number = manager.next_document();
    let ticket = manager.resolve_print_ticket(PrintTicketLevel::FixedDocument, number, None);
    manager.resources().borrow_mut().begin_document(number);
    let document = packaging.acquire_xml_writer(PartKind::FixedDocument)?;
    let uri = packaging
        .current_part_uri(PartKind::FixedDocument)
        .ok_or(PackagingError::PartNotOpen(PartKind::FixedDocument))?;
    write_part_reference(&sequence, "DocumentReference", &uri)?;
    write_part_root(&document, "FixedDocument", XPS_NAMESPACE)?;
    if let Some(ticket) = ticket {
        packaging.persist_print_ticket(&ticket, PrintTicketLevel::FixedDocument)?;
    }
    log::debug!("simulated document {number} started at `{uri}`");

    *manager.hierarchy() = Some(HierarchyState {
        sequence,
        document,
        page: None,
    });
    Ok(())
}

/// Opens a page of the simulated document and schedules `visual` onto it.
pub(crate) fn begin_page(manager: &SerializationManager, visual: Rc<Visual>) -> Result<Vec<Operation>> {
    begin_sequence(manager)?;
    let document = manager
        .hierarchy()
        .as_ref()
        .map(|state| state.document.clone())
        .ok_or(PackagingError::PartNotOpen(PartKind::FixedDocument))?;

    let size = manager.options().default_page_size;
    let (writer, ticket) = open_page(manager, size, None, Some(document), None)?;
    if let Some(ticket) = ticket {
        manager
            .packaging()
            .persist_print_ticket(&ticket, PrintTicketLevel::FixedPage)?;
    }
    if let Some(state) = manager.hierarchy().as_mut() {
        state.page = Some(writer);
    }

    let serializer = manager.require_serializer(&*visual)?;
    let target: Rc<dyn Reflect> = visual;
    Ok(vec![
        Operation::SerializeObject {
            serializer,
            target,
            parent: None,
            origin: None,
        },
        Operation::SimulateEndFixedPage,
    ])
}

pub(crate) fn end_page(manager: &SerializationManager) -> Result<()> {
    close_page(manager)?;
    let page = manager.hierarchy().as_mut().and_then(|state| state.page.take());
    if page.is_some() {
        manager.packaging().release_xml_writer(PartKind::FixedPage)?;
    }
    Ok(())
}

/// Closes the simulated document and sequence. A session that wrote no
/// visual still produces an empty, well-formed sequence.
pub(crate) fn end_sequence(manager: &SerializationManager) -> Result<()> {
    begin_sequence(manager)?;
    let Some(state) = manager.hierarchy().take() else {
        return Err(PackagingError::PartNotOpen(PartKind::DocumentSequence).into());
    };
    let packaging = manager.packaging();

    state.document.borrow_mut().write_end_element()?;
    packaging.release_xml_writer(PartKind::FixedDocument)?;
    manager.resources().borrow_mut().end_document();
    manager.raise_progress(ProgressLevel::FixedDocument, manager.document_number());

    state.sequence.borrow_mut().write_end_element()?;
    packaging.release_xml_writer(PartKind::DocumentSequence)?;
    manager.raise_progress(ProgressLevel::FixedDocumentSequence, 1);
    Ok(())
}

// -----------------------------------------------------------------------------
// BatchVisualWriter

/// Writes visuals one page at a time into a single document, synchronously.
///
/// The first [`write`](Self::write) starts a session on the manager; it stays
/// busy until [`commit`](Self::commit) or [`cancel`](Self::cancel).
///
/// ```
/// use std::rc::Rc;
/// use xps_serializer::{BatchVisualWriter, SerializationManager};
/// use xps_serializer::model::{Color, Visual};
/// use xps_serializer::packaging::InMemoryPackage;
///
/// let package = InMemoryPackage::new();
/// let manager = SerializationManager::new(package.clone());
///
/// let mut writer = BatchVisualWriter::new(&manager);
/// writer.write(Rc::new(Visual::solid_path("M 0,0 L 1,1", Color::BLACK))).unwrap();
/// writer.write(Rc::new(Visual::canvas())).unwrap();
/// writer.commit().unwrap();
///
/// assert_eq!(package.committed_pages().len(), 2);
/// assert!(package.is_committed());
/// ```
pub struct BatchVisualWriter<'a> {
    manager: &'a SerializationManager,
    started: bool,
    pages: usize,
}

impl<'a> BatchVisualWriter<'a> {
    pub fn new(manager: &'a SerializationManager) -> Self {
        Self {
            manager,
            started: false,
            pages: 0,
        }
    }

    /// Number of visuals written so far.
    #[inline]
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Writes `visual` as the next page.
    ///
    /// On failure the session is abandoned and the manager released.
    pub fn write(&mut self, visual: Rc<Visual>) -> Result<()> {
        if !self.started {
            self.manager.begin_session()?;
            self.started = true;
        }
        let operations = self.manager.batch_write_operations(visual);
        self.run(operations)?;
        self.pages += 1;
        Ok(())
    }

    /// Closes the document and sequence and commits the package.
    pub fn commit(mut self) -> Result<()> {
        if !self.started {
            self.manager.begin_session()?;
            self.started = true;
        }
        let operations = self.manager.batch_commit_operations();
        self.run(operations)?;
        self.started = false;
        self.manager.end_session(None);
        Ok(())
    }

    /// Abandons the batch without committing.
    pub fn cancel(mut self) {
        if self.started {
            self.started = false;
            self.manager.end_session(None);
        }
    }

    fn run(&mut self, operations: Vec<Operation>) -> Result<()> {
        let result = run_to_completion(self.manager, operations);
        if let Err(error) = &result {
            self.started = false;
            self.manager.end_session(Some(error));
        }
        result
    }
}

impl Drop for BatchVisualWriter<'_> {
    fn drop(&mut self) {
        if self.started {
            log::warn!("batch writer dropped before commit, {} page(s) discarded", self.pages);
            self.manager.end_session(None);
        }
    }
}

impl fmt::Debug for BatchVisualWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchVisualWriter")
            .field("started", &self.started)
            .field("pages", &self.pages)
            .finish()
    }
}
