use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;

use xps_reflect::Reflect;
use xps_reflect::context::ContextKey;

use crate::engine::Operation;
use crate::events::{PrintTicketLevel, ProgressLevel};
use crate::model::{DocumentReference, DocumentReferenceCollection, FixedDocument, FixedDocumentSequence};
use crate::model::{DocumentPaginator, PaginatedDocument, PrintTicket};
use crate::packaging::{PackagingError, PartKind, XmlWriter};
use crate::serializer::{ReachSerializer, child_operation, names, print_ticket_operation, property_walk};
use crate::serializer::{write_part_reference, write_part_root};
use crate::{Result, SerializationError, SerializationManager, XPS_NAMESPACE};

// -----------------------------------------------------------------------------
// Document scope

/// Opens the document part of `context` and references it from the
/// sequence, if there is one.
fn open_document(
    manager: &SerializationManager,
    context: ContextKey,
    print_ticket: Option<Rc<PrintTicket>>,
) -> Result<Option<Operation>> {
    let (is_complex, type_name) = manager.context(context, |c| (c.is_complex(), c.type_info().name()))?;
    if !is_complex {
        return Err(SerializationError::WrongPropertyType {
            expected: "FixedDocument",
            type_name,
        });
    }

    let number = manager.next_document();
    let print_ticket = manager.resolve_print_ticket(PrintTicketLevel::FixedDocument, number, print_ticket);
    manager.resources().borrow_mut().begin_document(number);

    let packaging = manager.packaging();
    let writer = packaging.acquire_xml_writer(PartKind::FixedDocument)?;
    manager.bind_writer(context, writer.clone(), Some(PartKind::FixedDocument));
    let uri = packaging
        .current_part_uri(PartKind::FixedDocument)
        .ok_or(PackagingError::PartNotOpen(PartKind::FixedDocument))?;

    if let Some(sequence) = manager.parent_writer(context)? {
        write_part_reference(&sequence, "DocumentReference", &uri)?;
    }
    write_part_root(&writer, "FixedDocument", XPS_NAMESPACE)?;
    log::debug!("document {number} started at `{uri}`");

    print_ticket_operation(manager, context, print_ticket)
}

fn close_document(manager: &SerializationManager, context: ContextKey) -> Result<()> {
    let writer = manager.nearest_writer(context)?;
    writer.borrow_mut().write_end_element()?;
    manager.resources().borrow_mut().end_document();
    manager.raise_progress(ProgressLevel::FixedDocument, manager.document_number());
    Ok(())
}

// -----------------------------------------------------------------------------
// DocumentSequenceSerializer

/// Writes the sequence part and every referenced document.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentSequenceSerializer;

impl ReachSerializer for DocumentSequenceSerializer {
    fn name(&self) -> &'static str {
        names::FIXED_DOCUMENT_SEQUENCE
    }

    fn persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<Vec<Operation>> {
        let sequence = manager.target_as::<FixedDocumentSequence>(context)?;
        let print_ticket =
            manager.resolve_print_ticket(PrintTicketLevel::FixedDocumentSequence, 1, sequence.print_ticket());

        let writer = manager.packaging().acquire_xml_writer(PartKind::DocumentSequence)?;
        manager.bind_writer(context, writer.clone(), Some(PartKind::DocumentSequence));
        write_part_root(&writer, "FixedDocumentSequence", XPS_NAMESPACE)?;

        let mut operations: Vec<_> = print_ticket_operation(manager, context, print_ticket)?.into_iter().collect();
        operations.push(property_walk(context));
        Ok(operations)
    }

    fn end_persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<()> {
        let writer = manager.nearest_writer(context)?;
        writer.borrow_mut().write_end_element()?;
        manager.raise_progress(ProgressLevel::FixedDocumentSequence, 1);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// DocumentReferenceCollectionSerializer

/// Walks the documents of a sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentReferenceCollectionSerializer;

impl ReachSerializer for DocumentReferenceCollectionSerializer {
    fn name(&self) -> &'static str {
        names::DOCUMENT_REFERENCE_COLLECTION
    }

    fn persist_object_data(&self, context: ContextKey, _: &SerializationManager) -> Result<Vec<Operation>> {
        Ok(vec![Operation::SerializeNextDocumentReference { context, index: 0 }])
    }
}

/// Serializes reference `index` of the collection behind `context`.
pub(crate) fn serialize_next_document_reference(
    manager: &SerializationManager,
    context: ContextKey,
    index: usize,
) -> Result<Vec<Operation>> {
    let collection = manager.target_as::<DocumentReferenceCollection>(context)?;
    let Some(reference) = collection.get(index) else {
        return Ok(Vec::new());
    };
    Ok(vec![
        child_operation(manager, reference, context, "DocumentReference")?,
        Operation::SerializeNextDocumentReference {
            context,
            index: index + 1,
        },
    ])
}

// -----------------------------------------------------------------------------
// DocumentReferenceSerializer

/// Loads the referenced document if needed and serializes it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentReferenceSerializer;

impl ReachSerializer for DocumentReferenceSerializer {
    fn name(&self) -> &'static str {
        names::DOCUMENT_REFERENCE
    }

    fn persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<Vec<Operation>> {
        let reference = manager.target_as::<DocumentReference>(context)?;
        let document = reference.get_document().map_err(SerializationError::External)?;
        match document {
            Some(document) => Ok(vec![child_operation(manager, document, context, "Document")?]),
            None => {
                log::warn!("document reference without a document, skipped");
                Ok(Vec::new())
            }
        }
    }
}

// -----------------------------------------------------------------------------
// FixedDocumentSerializer

/// Writes a document part and its pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedDocumentSerializer;

impl ReachSerializer for FixedDocumentSerializer {
    fn name(&self) -> &'static str {
        names::FIXED_DOCUMENT
    }

    fn persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<Vec<Operation>> {
        let document = manager.target_as::<FixedDocument>(context)?;
        let print_ticket = open_document(manager, context, document.print_ticket())?;

        let mut operations: Vec<_> = print_ticket.into_iter().collect();
        operations.push(property_walk(context));
        Ok(operations)
    }

    fn end_persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<()> {
        close_document(manager, context)
    }
}

// -----------------------------------------------------------------------------
// DocumentPaginatorSerializer

/// Writes a document part whose pages come from a [`DocumentPaginator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentPaginatorSerializer;

impl ReachSerializer for DocumentPaginatorSerializer {
    fn name(&self) -> &'static str {
        names::DOCUMENT_PAGINATOR
    }

    fn persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<Vec<Operation>> {
        let document = manager.target_as::<PaginatedDocument>(context)?;
        let print_ticket = open_document(manager, context, document.print_ticket())?;

        let mut operations: Vec<_> = print_ticket.into_iter().collect();
        operations.push(Operation::SerializeDocumentPage { context, index: 0 });
        Ok(operations)
    }

    fn end_persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<()> {
        close_document(manager, context)
    }
}

/// Serializes page `index` of the paginator behind `context`.
///
/// Pages are requested while the page count is unknown or `index` is below
/// it, so paginators that only learn their length while producing pages work
/// as well as ones that know it upfront.
pub(crate) fn serialize_document_page(
    manager: &SerializationManager,
    context: ContextKey,
    index: usize,
) -> Result<Vec<Operation>> {
    let document = manager.target_as::<PaginatedDocument>(context)?;
    let paginator = document.paginator();
    if paginator.is_page_count_valid() && index >= paginator.page_count() {
        return Ok(Vec::new());
    }

    let Some(page) = paginator.get_page(index).map_err(SerializationError::External)? else {
        log::warn!("paginator has no page {index}, stopping");
        return Ok(Vec::new());
    };
    let page: Rc<dyn Reflect> = Rc::new(page);
    Ok(vec![
        child_operation(manager, page, context, "Page")?,
        Operation::SerializeDocumentPage {
            context,
            index: index + 1,
        },
    ])
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    use crate::events::{PrintTicketLevel, ProgressLevel};
    use crate::model::{DocumentReference, FixedDocument, FixedDocumentSequence, PageContent, PaginatedDocument};
    use crate::model::PrintTicket;
    use crate::packaging::InMemoryPackage;
    use crate::testing::{RecordingPaginator, elements_in, page_with_path, sample_sequence};
    use crate::{SerializationError, SerializationManager};

    #[test]
    fn sequence_references_every_part() {
        let package = InMemoryPackage::new();
        let manager = SerializationManager::new(package.clone());
        manager.serialize_object(sample_sequence()).unwrap();

        assert_eq!(
            package.part("/FixedDocumentSequence.fdseq").unwrap(),
            "<FixedDocumentSequence xmlns=\"http://schemas.microsoft.com/xps/2005/06\">\
             <DocumentReference Source=\"/Documents/1/FixedDocument.fdoc\"/>\
             <DocumentReference Source=\"/Documents/2/FixedDocument.fdoc\"/>\
             </FixedDocumentSequence>"
        );
        assert_eq!(
            package.part("/Documents/1/FixedDocument.fdoc").unwrap(),
            "<FixedDocument xmlns=\"http://schemas.microsoft.com/xps/2005/06\">\
             <PageContent Source=\"/Documents/1/Pages/1.fpage\"/>\
             <PageContent Source=\"/Documents/1/Pages/2.fpage\"/>\
             </FixedDocument>"
        );
        assert_eq!(
            package.committed_pages(),
            [
                "/Documents/1/Pages/1.fpage",
                "/Documents/1/Pages/2.fpage",
                "/Documents/2/Pages/1.fpage"
            ]
        );
        assert_eq!(package.open_parts(), 0);
        assert!(package.is_committed());
    }

    #[test]
    fn progress_is_reported_bottom_up() {
        let progress = Rc::new(RefCell::new(Vec::new()));
        let log = progress.clone();
        let manager = SerializationManager::builder(InMemoryPackage::new())
            .on_progress_changed(move |args| log.borrow_mut().push((args.level, args.number)))
            .build();
        manager.serialize_object(sample_sequence()).unwrap();

        assert_eq!(
            *progress.borrow(),
            [
                (ProgressLevel::FixedPage, 1),
                (ProgressLevel::FixedPage, 2),
                (ProgressLevel::FixedDocument, 1),
                (ProgressLevel::FixedPage, 1),
                (ProgressLevel::FixedDocument, 2),
                (ProgressLevel::FixedDocumentSequence, 1),
            ]
        );
    }

    #[test]
    fn print_tickets_reach_the_packaging_policy() {
        let sequence = sample_sequence();
        sequence.set_print_ticket(Some(PrintTicket::new("<sequence/>")));

        let requested = Rc::new(RefCell::new(Vec::new()));
        let log = requested.clone();
        let package = InMemoryPackage::new();
        let manager = SerializationManager::builder(package.clone())
            .on_print_ticket_required(move |args| {
                log.borrow_mut().push((args.level, args.sequence));
                if args.level == PrintTicketLevel::FixedDocument && args.sequence == 2 {
                    args.print_ticket = Some(Rc::new(PrintTicket::new("<second/>")));
                }
            })
            .build();
        manager.serialize_object(sequence).unwrap();

        let tickets: Vec<_> = package
            .print_tickets()
            .into_iter()
            .map(|record| (record.level, record.xml))
            .collect();
        assert_eq!(
            tickets,
            [
                (PrintTicketLevel::FixedDocumentSequence, String::from("<sequence/>")),
                (PrintTicketLevel::FixedDocument, String::from("<second/>")),
            ]
        );
        assert_eq!(
            *requested.borrow(),
            [
                (PrintTicketLevel::FixedDocumentSequence, 1),
                (PrintTicketLevel::FixedDocument, 1),
                (PrintTicketLevel::FixedPage, 1),
                (PrintTicketLevel::FixedPage, 2),
                (PrintTicketLevel::FixedDocument, 2),
                (PrintTicketLevel::FixedPage, 1),
            ]
        );
    }

    #[test]
    fn lazy_parts_load_once_and_pages_get_a_layout_pass() {
        let page = page_with_path("M 0,0 L 5,5");
        let loaded = page.clone();
        let document = Rc::new(FixedDocument::new());
        document.add_page_content(PageContent::lazy(move || Ok(loaded)));

        let sequence = Rc::new(FixedDocumentSequence::new());
        let shared = document.clone();
        sequence.add_reference(DocumentReference::lazy(move || Ok(shared)));

        let manager = SerializationManager::new(InMemoryPackage::new());
        manager.serialize_object(sequence.clone()).unwrap();
        manager.serialize_object(sequence.clone()).unwrap();

        let reference = sequence.references().get(0).unwrap();
        assert_eq!(reference.load_count(), 1);
        assert_eq!(document.pages().get(0).unwrap().load_count(), 1);
        assert_eq!(page.layout_passes(), 2);
    }

    #[test]
    fn loader_failures_surface_as_external_errors() {
        let sequence = Rc::new(FixedDocumentSequence::new());
        sequence.add_reference(DocumentReference::lazy::<FixedDocument>(|| Err("disk gone".into())));

        let manager = SerializationManager::new(InMemoryPackage::new());
        let error = manager.serialize_object(sequence).unwrap_err();
        assert!(matches!(error, SerializationError::External(_)));
        assert_eq!(error.to_string(), "disk gone");
        assert!(!manager.is_busy());
    }

    fn paginate(known: bool) -> (Vec<usize>, InMemoryPackage) {
        let (paginator, requests) = RecordingPaginator::new(3, known);
        let sequence = Rc::new(FixedDocumentSequence::new());
        sequence.add_document(Rc::new(PaginatedDocument::new(paginator)));

        let package = InMemoryPackage::new();
        SerializationManager::new(package.clone())
            .serialize_object(sequence)
            .unwrap();
        let requested = requests.borrow().clone();
        (requested, package)
    }

    #[test]
    fn known_page_count_is_honored_exactly() {
        let (requested, package) = paginate(true);
        assert_eq!(requested, [0, 1, 2]);
        assert_eq!(package.committed_pages().len(), 3);
    }

    #[test]
    fn unknown_page_count_is_polled_until_valid() {
        let (requested, package) = paginate(false);
        assert_eq!(requested, [0, 1, 2]);
        assert_eq!(
            elements_in(&package, "/Documents/1/FixedDocument.fdoc"),
            ["FixedDocument", "PageContent", "PageContent", "PageContent"]
        );
        let page = package.part("/Documents/1/Pages/3.fpage").unwrap();
        assert!(
            page.starts_with("<FixedPage xmlns=\"http://schemas.microsoft.com/xps/2005/06\" Width=\"200\" Height=\"100\">"),
            "{page}"
        );
        assert!(page.contains("Data=\"M 0,0 L 2,2\""), "{page}");
    }

    #[test]
    fn empty_sequence_is_still_well_formed() {
        let package = InMemoryPackage::new();
        SerializationManager::new(package.clone())
            .serialize_object(Rc::new(FixedDocumentSequence::new()))
            .unwrap();
        assert_eq!(
            package.parts(),
            vec![(
                String::from("/FixedDocumentSequence.fdseq"),
                String::from("<FixedDocumentSequence xmlns=\"http://schemas.microsoft.com/xps/2005/06\"/>")
            )]
        );
    }
}
