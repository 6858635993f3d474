use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;

use xps_utils::hash::HashMap;

use crate::events::PrintTicketLevel;
use crate::model::PrintTicket;
use crate::packaging::{PackagingError, PackagingPolicy, PartKind, SharedXmlWriter, XmlTextWriter, XmlWriter};

// -----------------------------------------------------------------------------
// XmlEvent

/// One call made on a part writer, in the order the calls happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    StartElement { part: String, name: String },
    Attribute { part: String, name: String, value: String },
    EndElement { part: String },
}

/// A print ticket handed to the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintTicketRecord {
    pub level: PrintTicketLevel,
    pub xml: String,
}

// -----------------------------------------------------------------------------
// PartWriter

struct PartWriter {
    uri: String,
    xml: XmlTextWriter,
    log: Rc<RefCell<Vec<XmlEvent>>>,
}

impl PartWriter {
    fn record(&self, event: XmlEvent) {
        self.log.borrow_mut().push(event);
    }
}

impl XmlWriter for PartWriter {
    fn write_start_element(&mut self, name: &str) -> Result<(), PackagingError> {
        self.xml.write_start_element(name)?;
        self.record(XmlEvent::StartElement {
            part: self.uri.clone(),
            name: name.to_string(),
        });
        Ok(())
    }

    fn write_attribute(&mut self, name: &str, value: &str) -> Result<(), PackagingError> {
        self.xml.write_attribute(name, value)?;
        self.record(XmlEvent::Attribute {
            part: self.uri.clone(),
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn write_end_element(&mut self) -> Result<(), PackagingError> {
        self.xml.write_end_element()?;
        self.record(XmlEvent::EndElement { part: self.uri.clone() });
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PackagingError> {
        self.xml.flush()
    }
}

// -----------------------------------------------------------------------------
// InMemoryPackage

struct OpenPart {
    uri: String,
    writer: Rc<RefCell<PartWriter>>,
    refs: usize,
}

#[derive(Default)]
struct Package {
    open: HashMap<PartKind, OpenPart>,
    parts: Vec<(String, String)>,
    log: Rc<RefCell<Vec<XmlEvent>>>,
    print_tickets: Vec<PrintTicketRecord>,
    resources: Vec<(String, Rc<[u8]>)>,
    committed_pages: Vec<String>,
    documents: usize,
    pages: usize,
    committed: bool,
}

impl Package {
    fn next_uri(&mut self, kind: PartKind) -> String {
        match kind {
            PartKind::DocumentSequence => "/FixedDocumentSequence.fdseq".into(),
            PartKind::FixedDocument => {
                self.documents += 1;
                self.pages = 0;
                format!("/Documents/{}/FixedDocument.fdoc", self.documents)
            }
            PartKind::FixedPage => {
                // A page written without a document lands in document 1.
                self.documents = self.documents.max(1);
                self.pages += 1;
                format!("/Documents/{}/Pages/{}.fpage", self.documents, self.pages)
            }
            PartKind::ResourceDictionary => format!(
                "/Documents/{}/Resources/Page{}.dict",
                self.documents.max(1),
                self.pages.max(1)
            ),
        }
    }
}

/// A [`PackagingPolicy`] keeping parts, print tickets and resources in
/// memory.
///
/// Besides the finished part text it records every writer call as an
/// [`XmlEvent`], which makes two runs over the same graph easy to compare.
///
/// ```
/// use xps_serializer::packaging::{InMemoryPackage, PackagingPolicy, PartKind, XmlWriter};
///
/// let package = InMemoryPackage::new();
/// let writer = package.acquire_xml_writer(PartKind::FixedPage).unwrap();
/// writer.borrow_mut().write_start_element("FixedPage").unwrap();
/// writer.borrow_mut().write_end_element().unwrap();
/// package.release_xml_writer(PartKind::FixedPage).unwrap();
///
/// assert_eq!(package.part("/Documents/1/Pages/1.fpage").as_deref(), Some("<FixedPage/>"));
/// ```
#[derive(Clone, Default)]
pub struct InMemoryPackage {
    inner: Rc<RefCell<Package>>,
}

impl InMemoryPackage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed parts as `(uri, xml)`, in closing order.
    pub fn parts(&self) -> Vec<(String, String)> {
        self.inner.borrow().parts.clone()
    }

    /// The text of a closed part.
    pub fn part(&self, uri: &str) -> Option<String> {
        self.inner
            .borrow()
            .parts
            .iter()
            .find(|(part, _)| part == uri)
            .map(|(_, xml)| xml.clone())
    }

    pub fn events(&self) -> Vec<XmlEvent> {
        self.inner.borrow().log.borrow().clone()
    }

    pub fn print_tickets(&self) -> Vec<PrintTicketRecord> {
        self.inner.borrow().print_tickets.clone()
    }

    /// Binary resources as `(uri, bytes)`, in the order they were persisted.
    pub fn resources(&self) -> Vec<(String, Rc<[u8]>)> {
        self.inner.borrow().resources.clone()
    }

    /// URIs of the pages that were pre-committed.
    pub fn committed_pages(&self) -> Vec<String> {
        self.inner.borrow().committed_pages.clone()
    }

    pub fn is_committed(&self) -> bool {
        self.inner.borrow().committed
    }

    /// Number of parts currently open.
    pub fn open_parts(&self) -> usize {
        self.inner.borrow().open.len()
    }
}

impl PackagingPolicy for InMemoryPackage {
    fn acquire_xml_writer(&self, kind: PartKind) -> Result<SharedXmlWriter, PackagingError> {
        let mut package = self.inner.borrow_mut();
        if let Some(open) = package.open.get_mut(&kind) {
            open.refs += 1;
            return Ok(open.writer.clone());
        }

        let uri = package.next_uri(kind);
        log::trace!("opening part `{uri}`");
        let writer = Rc::new(RefCell::new(PartWriter {
            uri: uri.clone(),
            xml: XmlTextWriter::new(),
            log: package.log.clone(),
        }));
        package.open.insert(
            kind,
            OpenPart {
                uri,
                writer: writer.clone(),
                refs: 1,
            },
        );
        Ok(writer)
    }

    fn release_xml_writer(&self, kind: PartKind) -> Result<(), PackagingError> {
        let mut package = self.inner.borrow_mut();
        let open = package.open.get_mut(&kind).ok_or(PackagingError::PartNotOpen(kind))?;
        open.refs -= 1;
        if open.refs > 0 {
            return Ok(());
        }

        let Some(open) = package.open.remove(&kind) else {
            return Err(PackagingError::PartNotOpen(kind));
        };
        let xml = {
            let mut writer = open.writer.borrow_mut();
            writer.flush()?;
            writer.xml.finish()?
        };
        log::trace!("closing part `{}`", open.uri);
        package.parts.push((open.uri, xml));
        Ok(())
    }

    fn current_part_uri(&self, kind: PartKind) -> Option<String> {
        self.inner.borrow().open.get(&kind).map(|open| open.uri.clone())
    }

    fn persist_print_ticket(&self, ticket: &PrintTicket, level: PrintTicketLevel) -> Result<(), PackagingError> {
        self.inner.borrow_mut().print_tickets.push(PrintTicketRecord {
            level,
            xml: ticket.xml().to_string(),
        });
        Ok(())
    }

    fn persist_resource(&self, uri: &str, bytes: &[u8]) -> Result<(), PackagingError> {
        let mut package = self.inner.borrow_mut();
        if package.resources.iter().any(|(part, _)| part == uri) {
            return Err(PackagingError::DuplicatePart(uri.to_string()));
        }
        package.resources.push((uri.to_string(), Rc::from(bytes)));
        Ok(())
    }

    fn pre_commit_current_page(&self) -> Result<(), PackagingError> {
        let mut package = self.inner.borrow_mut();
        let uri = package
            .open
            .get(&PartKind::FixedPage)
            .map(|open| open.uri.clone())
            .ok_or(PackagingError::PartNotOpen(PartKind::FixedPage))?;
        package.committed_pages.push(uri);
        Ok(())
    }

    fn commit(&self) -> Result<(), PackagingError> {
        self.inner.borrow_mut().committed = true;
        Ok(())
    }
}

impl core::fmt::Debug for InMemoryPackage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let package = self.inner.borrow();
        f.debug_struct("InMemoryPackage")
            .field("open", &package.open.len())
            .field("parts", &package.parts.len())
            .field("resources", &package.resources.len())
            .field("committed", &package.committed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writers_are_shared_per_kind() {
        let package = InMemoryPackage::new();
        let a = package.acquire_xml_writer(PartKind::FixedDocument).unwrap();
        let b = package.acquire_xml_writer(PartKind::FixedDocument).unwrap();
        assert!(Rc::ptr_eq(&a, &b));

        a.borrow_mut().write_start_element("FixedDocument").unwrap();
        a.borrow_mut().write_end_element().unwrap();

        package.release_xml_writer(PartKind::FixedDocument).unwrap();
        assert!(package.parts().is_empty());
        assert_eq!(
            package.current_part_uri(PartKind::FixedDocument).as_deref(),
            Some("/Documents/1/FixedDocument.fdoc")
        );

        package.release_xml_writer(PartKind::FixedDocument).unwrap();
        assert_eq!(package.open_parts(), 0);
        assert_eq!(
            package.parts(),
            [("/Documents/1/FixedDocument.fdoc".to_string(), "<FixedDocument/>".to_string())]
        );
    }

    #[test]
    fn page_numbers_restart_per_document() {
        let package = InMemoryPackage::new();
        let mut uris = Vec::new();
        for _ in 0..2 {
            package.acquire_xml_writer(PartKind::FixedDocument).unwrap();
            for _ in 0..2 {
                package.acquire_xml_writer_for_page().unwrap();
                uris.push(package.current_part_uri(PartKind::FixedPage).unwrap());
                package.release_xml_writer(PartKind::FixedPage).unwrap();
            }
            package.release_xml_writer(PartKind::FixedDocument).unwrap();
        }
        assert_eq!(
            uris,
            [
                "/Documents/1/Pages/1.fpage",
                "/Documents/1/Pages/2.fpage",
                "/Documents/2/Pages/1.fpage",
                "/Documents/2/Pages/2.fpage",
            ]
        );
    }

    #[test]
    fn release_errors() {
        let package = InMemoryPackage::new();
        assert_eq!(
            package.release_xml_writer(PartKind::FixedPage),
            Err(PackagingError::PartNotOpen(PartKind::FixedPage))
        );

        let writer = package.acquire_xml_writer(PartKind::FixedPage).unwrap();
        writer.borrow_mut().write_start_element("FixedPage").unwrap();
        assert_eq!(
            package.release_xml_writer(PartKind::FixedPage),
            Err(PackagingError::UnclosedElements { count: 1 })
        );
        assert_eq!(
            package.pre_commit_current_page(),
            Err(PackagingError::PartNotOpen(PartKind::FixedPage))
        );
    }

    #[test]
    fn resource_parts_are_unique() {
        let package = InMemoryPackage::new();
        package.persist_resource("/Documents/1/Resources/Images/a.png", &[1]).unwrap();
        assert_eq!(
            package.persist_resource("/Documents/1/Resources/Images/a.png", &[1]),
            Err(PackagingError::DuplicatePart("/Documents/1/Resources/Images/a.png".into()))
        );
        assert_eq!(package.resources().len(), 1);
    }

    #[test]
    fn events_carry_the_part() {
        let package = InMemoryPackage::new();
        let writer = package.acquire_xml_writer(PartKind::DocumentSequence).unwrap();
        writer.borrow_mut().write_start_element("FixedDocumentSequence").unwrap();
        writer.borrow_mut().write_attribute("xmlns", "urn:x").unwrap();
        writer.borrow_mut().write_end_element().unwrap();

        let part = "/FixedDocumentSequence.fdseq".to_string();
        assert_eq!(
            package.events(),
            [
                XmlEvent::StartElement {
                    part: part.clone(),
                    name: "FixedDocumentSequence".into()
                },
                XmlEvent::Attribute {
                    part: part.clone(),
                    name: "xmlns".into(),
                    value: "urn:x".into()
                },
                XmlEvent::EndElement { part },
            ]
        );
    }
}
