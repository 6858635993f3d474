use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;

use xps_reflect::context::ContextKey;
use xps_reflect::convert::format_float;

use crate::engine::Operation;
use crate::events::{PrintTicketLevel, ProgressLevel};
use crate::manager::PageState;
use crate::model::{DocumentPage, FixedPage, PageContent, PageContentCollection, PrintTicket};
use crate::model::{Size, UIElementCollection};
use crate::packaging::{PackagingError, PartKind, SharedXmlWriter, XmlWriter};
use crate::serializer::{ReachSerializer, child_operation, names, print_ticket_operation, property_walk};
use crate::serializer::write_part_reference;
use crate::visual_service::FlattenerContext;
use crate::{RESOURCE_KEY_NAMESPACE, Result, SerializationError, SerializationManager, XPS_NAMESPACE};

// -----------------------------------------------------------------------------
// Page scope

/// Opens a page part, its resource dictionary and its flattener.
///
/// When `parent` is given, a `PageContent` pointing at the new part is
/// written into it. With an `owner`, the page element is left open for the
/// owner's attribute pass and its header follows in [`end_page_attributes`];
/// otherwise the size and the header are written here. Returns the page
/// writer and the print ticket the caller left for the page.
pub(crate) fn open_page(
    manager: &SerializationManager,
    size: Size,
    owner: Option<ContextKey>,
    parent: Option<SharedXmlWriter>,
    print_ticket: Option<Rc<PrintTicket>>,
) -> Result<(SharedXmlWriter, Option<Rc<PrintTicket>>)> {
    let number = manager.next_page();
    let print_ticket = manager.resolve_print_ticket(PrintTicketLevel::FixedPage, number, print_ticket);
    manager.resources().borrow_mut().begin_page();

    let packaging = manager.packaging();
    let writer = packaging.acquire_xml_writer_for_page()?;
    let uri = packaging
        .current_part_uri(PartKind::FixedPage)
        .ok_or(PackagingError::PartNotOpen(PartKind::FixedPage))?;
    if let Some(parent) = parent {
        write_part_reference(&parent, "PageContent", &uri)?;
    }

    {
        let mut page = writer.borrow_mut();
        page.write_start_element("FixedPage")?;
        page.write_attribute("xmlns", XPS_NAMESPACE)?;
        if owner.is_none() {
            page.write_attribute("Width", &format_float(size.width))?;
            page.write_attribute("Height", &format_float(size.height))?;
        }
    }

    let resource_writer = packaging.acquire_xml_writer_for_resource_dictionary()?;
    let dictionary = packaging
        .current_part_uri(PartKind::ResourceDictionary)
        .ok_or(PackagingError::PartNotOpen(PartKind::ResourceDictionary))?;
    {
        let mut resources = resource_writer.borrow_mut();
        resources.write_start_element("ResourceDictionary")?;
        resources.write_attribute("xmlns", XPS_NAMESPACE)?;
        resources.write_attribute("xmlns:x", RESOURCE_KEY_NAMESPACE)?;
    }
    if owner.is_none() {
        write_page_header(manager, &writer, &dictionary)?;
    }

    let flattener = manager.visual_service().acquire_visual_tree_flattener(FlattenerContext {
        resource_writer: resource_writer.clone(),
        body_writer: writer.clone(),
        page_size: size,
        resources: manager.resources().clone(),
    });
    manager.push_page(PageState {
        writer: writer.clone(),
        resource_writer,
        flattener: Some(flattener),
        number,
        dictionary,
        header_owner: owner,
    });
    log::debug!("page {number} started at `{uri}`");

    Ok((writer, print_ticket))
}

/// Closes the attributes of the page element owned by `context`, if the
/// page is still waiting for them.
pub(crate) fn end_page_attributes(manager: &SerializationManager, context: ContextKey) -> Result<()> {
    match manager.take_page_header(Some(context)) {
        Some((writer, dictionary)) => write_page_header(manager, &writer, &dictionary),
        None => Ok(()),
    }
}

/// The last attributes of a page and the reference to its dictionary.
fn write_page_header(manager: &SerializationManager, writer: &SharedXmlWriter, dictionary: &str) -> Result<()> {
    let mut page = writer.borrow_mut();
    if let Some(language) = &manager.options().xml_language {
        page.write_attribute("xml:lang", language)?;
    }
    page.write_start_element("FixedPage.Resources")?;
    page.write_start_element("ResourceDictionary")?;
    page.write_attribute("Source", dictionary)?;
    page.write_end_element()?;
    page.write_end_element()?;
    Ok(())
}

/// Finishes the page opened last: closes its dictionary, persists the
/// resources it introduced and pre-commits it. The page writer itself is
/// released by the caller.
pub(crate) fn close_page(manager: &SerializationManager) -> Result<()> {
    if let Some((writer, dictionary)) = manager.take_page_header(None) {
        write_page_header(manager, &writer, &dictionary)?;
    }
    let mut page = manager
        .pop_page()
        .ok_or(PackagingError::PartNotOpen(PartKind::FixedPage))?;
    if let Some(flattener) = page.flattener.take() {
        manager.visual_service().release_visual_tree_flattener(flattener);
    }

    let packaging = manager.packaging();
    page.resource_writer.borrow_mut().write_end_element()?;
    packaging.release_xml_writer(PartKind::ResourceDictionary)?;

    let pending = manager.resources().borrow_mut().end_page();
    for resource in pending {
        packaging.persist_resource(&resource.uri, &resource.bytes)?;
    }

    page.writer.borrow_mut().write_end_element()?;
    packaging.pre_commit_current_page()?;
    manager.raise_progress(ProgressLevel::FixedPage, page.number);
    Ok(())
}

fn ensure_complex(manager: &SerializationManager, context: ContextKey) -> Result<()> {
    let (is_complex, type_name) = manager.context(context, |c| (c.is_complex(), c.type_info().name()))?;
    if is_complex {
        Ok(())
    } else {
        Err(SerializationError::WrongPropertyType {
            expected: "FixedPage",
            type_name,
        })
    }
}

// -----------------------------------------------------------------------------
// PageContentCollectionSerializer

/// Walks the pages of a document.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageContentCollectionSerializer;

impl ReachSerializer for PageContentCollectionSerializer {
    fn name(&self) -> &'static str {
        names::PAGE_CONTENT_COLLECTION
    }

    fn persist_object_data(&self, context: ContextKey, _: &SerializationManager) -> Result<Vec<Operation>> {
        Ok(vec![Operation::SerializeNextPageContent { context, index: 0 }])
    }
}

pub(crate) fn serialize_next_page_content(
    manager: &SerializationManager,
    context: ContextKey,
    index: usize,
) -> Result<Vec<Operation>> {
    let collection = manager.target_as::<PageContentCollection>(context)?;
    let Some(content) = collection.get(index) else {
        return Ok(Vec::new());
    };
    Ok(vec![
        child_operation(manager, content, context, "PageContent")?,
        Operation::SerializeNextPageContent {
            context,
            index: index + 1,
        },
    ])
}

// -----------------------------------------------------------------------------
// PageContentSerializer

/// Loads the page if needed, brings its layout up to date and serializes it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageContentSerializer;

impl ReachSerializer for PageContentSerializer {
    fn name(&self) -> &'static str {
        names::PAGE_CONTENT
    }

    fn persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<Vec<Operation>> {
        let content = manager.target_as::<PageContent>(context)?;
        let Some(page) = content.get_page().map_err(SerializationError::External)? else {
            log::warn!("page content without a page, skipped");
            return Ok(Vec::new());
        };
        page.update_layout();
        Ok(vec![child_operation(manager, page, context, "Child")?])
    }
}

// -----------------------------------------------------------------------------
// FixedPageSerializer

/// Writes a page part and its visual children.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPageSerializer;

impl ReachSerializer for FixedPageSerializer {
    fn name(&self) -> &'static str {
        names::FIXED_PAGE
    }

    fn persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<Vec<Operation>> {
        ensure_complex(manager, context)?;
        let page = manager.target_as::<FixedPage>(context)?;

        let parent = manager.parent_writer(context)?;
        let (writer, print_ticket) = open_page(manager, page.size(), Some(context), parent, page.print_ticket())?;
        manager.bind_writer(context, writer, Some(PartKind::FixedPage));

        let mut operations: Vec<_> = print_ticket_operation(manager, context, print_ticket)?.into_iter().collect();
        operations.push(property_walk(context));
        Ok(operations)
    }

    fn end_persist_object_data(&self, _: ContextKey, manager: &SerializationManager) -> Result<()> {
        close_page(manager)
    }
}

// -----------------------------------------------------------------------------
// DocumentPageSerializer

/// Writes a page produced by a paginator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentPageSerializer;

impl ReachSerializer for DocumentPageSerializer {
    fn name(&self) -> &'static str {
        names::DOCUMENT_PAGE
    }

    fn persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<Vec<Operation>> {
        ensure_complex(manager, context)?;
        let page = manager.target_as::<DocumentPage>(context)?;

        let parent = manager.parent_writer(context)?;
        let (writer, print_ticket) = open_page(manager, page.size(), None, parent, None)?;
        manager.bind_writer(context, writer, Some(PartKind::FixedPage));

        let mut operations: Vec<_> = print_ticket_operation(manager, context, print_ticket)?.into_iter().collect();
        operations.push(child_operation(manager, page.visual().clone(), context, "Visual")?);
        Ok(operations)
    }

    fn end_persist_object_data(&self, _: ContextKey, manager: &SerializationManager) -> Result<()> {
        close_page(manager)
    }
}

// -----------------------------------------------------------------------------
// UIElementCollectionSerializer

/// Walks the visual children of a page.
#[derive(Debug, Clone, Copy, Default)]
pub struct UIElementCollectionSerializer;

impl ReachSerializer for UIElementCollectionSerializer {
    fn name(&self) -> &'static str {
        names::UI_ELEMENT_COLLECTION
    }

    fn persist_object_data(&self, context: ContextKey, _: &SerializationManager) -> Result<Vec<Operation>> {
        Ok(vec![Operation::SerializeNextUIElement { context, index: 0 }])
    }
}

pub(crate) fn serialize_next_ui_element(
    manager: &SerializationManager,
    context: ContextKey,
    index: usize,
) -> Result<Vec<Operation>> {
    let collection = manager.target_as::<UIElementCollection>(context)?;
    let Some(element) = collection.get(index) else {
        return Ok(Vec::new());
    };
    Ok(vec![
        child_operation(manager, element, context, "Children")?,
        Operation::SerializeNextUIElement {
            context,
            index: index + 1,
        },
    ])
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::RefCell;

    use xps_reflect::context::PropertyOrigin;
    use xps_reflect::info::{TypeInfo, TypeInfoCell, Typed};

    use super::*;
    use crate::SerializationOptions;
    use crate::engine::run_to_completion;
    use crate::model::{FixedDocument, FixedDocumentSequence, ImageSource, Rect, Visual};
    use crate::packaging::InMemoryPackage;

    struct Plain;

    impl Typed for Plain {
        fn type_info() -> &'static TypeInfo {
            static CELL: TypeInfoCell = TypeInfoCell::new();
            CELL.get_or_init(|| TypeInfo::builder::<Plain>().build())
        }
    }

    xps_reflect::impl_reflect!(Plain);

    #[test]
    fn simple_page_origin_is_rejected() {
        let manager = SerializationManager::new(InMemoryPackage::new());
        let operation = Operation::SerializeObject {
            serializer: Rc::new(FixedPageSerializer),
            target: Rc::new(FixedPage::default()),
            parent: None,
            origin: Some(PropertyOrigin {
                name: "Page",
                is_complex: false,
                is_read_only: false,
            }),
        };

        let error = run_to_completion(&manager, vec![operation]).unwrap_err();
        assert!(matches!(
            error,
            SerializationError::WrongPropertyType {
                expected: "FixedPage",
                type_name: "FixedPage"
            }
        ));
    }

    #[test]
    fn page_children_need_a_serializer() {
        let page = Rc::new(FixedPage::default());
        page.add_child(Rc::new(Plain));

        let manager = SerializationManager::new(InMemoryPackage::new());
        let error = manager.serialize_object(page).unwrap_err();
        assert!(matches!(error, SerializationError::NoSerializer { type_name: "Plain" }));
        assert!(!manager.is_busy());
    }

    #[test]
    fn page_writes_its_resource_dictionary() {
        let package = InMemoryPackage::new();
        let manager = SerializationManager::new(package.clone());
        manager.serialize_object(Rc::new(FixedPage::default())).unwrap();

        assert_eq!(
            package.part("/Documents/1/Pages/1.fpage").unwrap(),
            "<FixedPage xmlns=\"http://schemas.microsoft.com/xps/2005/06\" Width=\"816\" Height=\"1056\">\
             <FixedPage.Resources><ResourceDictionary Source=\"/Documents/1/Resources/Page1.dict\"/>\
             </FixedPage.Resources></FixedPage>"
        );
        assert_eq!(
            package.part("/Documents/1/Resources/Page1.dict").unwrap(),
            "<ResourceDictionary xmlns=\"http://schemas.microsoft.com/xps/2005/06\" \
             xmlns:x=\"http://schemas.microsoft.com/xps/2005/06/resourcedictionary-key\"/>"
        );
        assert_eq!(package.committed_pages(), ["/Documents/1/Pages/1.fpage"]);
    }

    struct OriginRecorder(Rc<RefCell<Vec<(&'static str, bool)>>>);

    impl ReachSerializer for OriginRecorder {
        fn name(&self) -> &'static str {
            "OriginRecorder"
        }

        fn persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<Vec<Operation>> {
            let origin = manager.context(context, |c| c.origin().map(|o| (o.name, o.is_read_only)))?;
            self.0.borrow_mut().extend(origin);
            Ok(Vec::new())
        }
    }

    #[test]
    fn page_element_is_written_from_its_declared_properties() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let package = InMemoryPackage::new();
        let manager = SerializationManager::builder(package.clone())
            .options(SerializationOptions {
                xml_language: Some("en-US".into()),
                ..SerializationOptions::default()
            })
            .serializer::<UIElementCollection>(OriginRecorder(seen.clone()))
            .build();
        manager
            .serialize_object(Rc::new(FixedPage::new(Size::new(100.5, 50.0))))
            .unwrap();

        // Reached through the read-only content property `Children`.
        assert_eq!(*seen.borrow(), [("Children", true)]);
        assert_eq!(
            package.part("/Documents/1/Pages/1.fpage").unwrap(),
            "<FixedPage xmlns=\"http://schemas.microsoft.com/xps/2005/06\" Width=\"100.5\" Height=\"50\" \
             xml:lang=\"en-US\"><FixedPage.Resources>\
             <ResourceDictionary Source=\"/Documents/1/Resources/Page1.dict\"/></FixedPage.Resources></FixedPage>"
        );
    }

    #[test]
    fn shared_images_are_persisted_once_per_document() {
        let document = Rc::new(FixedDocument::new());
        for _ in 0..2 {
            let source = Rc::new(ImageSource::new(vec![7u8, 7, 7, 7], 2, 2));
            let page = Rc::new(FixedPage::default());
            page.add_child(Rc::new(Visual::image(source, Rect::new(0.0, 0.0, 10.0, 10.0))));
            document.add_page(page);
        }
        let sequence = Rc::new(FixedDocumentSequence::new());
        sequence.add_document(document);

        let package = InMemoryPackage::new();
        SerializationManager::new(package.clone())
            .serialize_object(sequence)
            .unwrap();

        let resources = package.resources();
        assert_eq!(resources.len(), 1);
        assert!(resources[0].0.starts_with("/Documents/1/Resources/Images/"));
        assert_eq!(&*resources[0].1, &[7u8, 7, 7, 7]);

        for page in 1..=2 {
            let dictionary = package
                .part(&alloc::format!("/Documents/1/Resources/Page{page}.dict"))
                .unwrap();
            assert!(dictionary.contains("<ImageBrush x:Key=\"ib0\""), "{dictionary}");
            let markup = package.part(&alloc::format!("/Documents/1/Pages/{page}.fpage")).unwrap();
            assert!(markup.contains("Fill=\"{StaticResource ib0}\""), "{markup}");
        }
    }

    #[test]
    fn shared_images_are_persisted_once_in_each_document() {
        let source = Rc::new(ImageSource::new(vec![9u8, 9, 9, 9], 2, 2));
        let sequence = Rc::new(FixedDocumentSequence::new());
        for _ in 0..2 {
            let page = Rc::new(FixedPage::default());
            page.add_child(Rc::new(Visual::image(source.clone(), Rect::new(0.0, 0.0, 10.0, 10.0))));
            let document = Rc::new(FixedDocument::new());
            document.add_page(page);
            sequence.add_document(document);
        }

        let package = InMemoryPackage::new();
        SerializationManager::new(package.clone())
            .serialize_object(sequence)
            .unwrap();

        let uris: Vec<_> = package.resources().into_iter().map(|(uri, _)| uri).collect();
        assert_eq!(uris.len(), 2);
        assert!(uris[0].starts_with("/Documents/1/Resources/Images/"), "{uris:?}");
        assert!(uris[1].starts_with("/Documents/2/Resources/Images/"), "{uris:?}");
        assert_ne!(uris[0], uris[1]);
        for document in 1..=2 {
            let dictionary = package
                .part(&alloc::format!("/Documents/{document}/Resources/Page1.dict"))
                .unwrap();
            assert!(dictionary.contains(&uris[document - 1]), "{dictionary}");
        }
    }
}
