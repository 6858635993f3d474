//! Resource bookkeeping shared by the nodes of one document and one page.
//!
//! Images and color profiles are stored once per document as binary parts
//! under that document's `Resources` folder; each page refers to them through
//! keys of its own resource dictionary.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use xps_utils::hash::{HashMap, HashSet, content_hash};

use crate::model::{ColorProfile, ImageSource};

/// A binary part waiting to be handed to the packaging policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResource {
    pub uri: String,
    pub bytes: Rc<[u8]>,
}

/// Tables living as long as one fixed document.
#[derive(Debug)]
pub struct DocumentResources {
    /// Content hash of an image to its part URI.
    image_crc: HashMap<u64, String>,
    /// Source URI of an image to its content hash.
    image_uri_hash: HashMap<String, u64>,
    /// Content hash of a color profile to its part URI.
    color_contexts: HashMap<u64, String>,
    /// 1-based number of the document, part of every resource URI.
    number: usize,
    /// Opened on behalf of a page written outside any document.
    implicit: bool,
}

impl DocumentResources {
    fn new(number: usize, implicit: bool) -> Self {
        Self {
            image_crc: HashMap::default(),
            image_uri_hash: HashMap::default(),
            color_contexts: HashMap::default(),
            number: number.max(1),
            implicit,
        }
    }

    #[inline]
    pub fn number(&self) -> usize {
        self.number
    }

    /// Number of distinct images of the document.
    pub fn image_count(&self) -> usize {
        self.image_crc.len()
    }

    pub fn color_context_count(&self) -> usize {
        self.color_contexts.len()
    }
}

/// Tables living as long as one fixed page.
#[derive(Debug, Default)]
pub struct PageResources {
    /// Image part URI to its dictionary key.
    images: HashMap<String, String>,
    color_contexts: HashSet<String>,
}

impl PageResources {
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn color_context_count(&self) -> usize {
        self.color_contexts.len()
    }
}

/// An image as referenced from a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResource {
    /// Key in the page's resource dictionary.
    pub key: String,
    pub uri: String,
    /// The page did not reference this image before, so its dictionary entry
    /// still has to be written.
    pub first_on_page: bool,
}

/// The document and page tables of one session.
#[derive(Debug, Default)]
pub struct ResourceTables {
    document: Option<DocumentResources>,
    page: Option<PageResources>,
    pending: Vec<PendingResource>,
}

impl ResourceTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the tables of document `number`.
    pub fn begin_document(&mut self, number: usize) {
        self.document = Some(DocumentResources::new(number, false));
    }

    /// Drops the document tables.
    pub fn end_document(&mut self) -> Option<DocumentResources> {
        self.page = None;
        self.document.take()
    }

    /// Opens the page tables, and implicit tables of document 1 when no
    /// document is open.
    pub fn begin_page(&mut self) {
        if self.document.is_none() {
            self.document = Some(DocumentResources::new(1, true));
        }
        self.page = Some(PageResources::default());
    }

    /// Closes the page tables and returns the resources still to persist.
    pub fn end_page(&mut self) -> Vec<PendingResource> {
        self.page = None;
        if self.document.as_ref().is_some_and(|document| document.implicit) {
            self.document = None;
        }
        core::mem::take(&mut self.pending)
    }

    #[inline]
    pub fn document(&self) -> Option<&DocumentResources> {
        self.document.as_ref()
    }

    #[inline]
    pub fn page(&self) -> Option<&PageResources> {
        self.page.as_ref()
    }

    /// Resources registered since the page began.
    #[inline]
    pub fn pending(&self) -> &[PendingResource] {
        &self.pending
    }

    /// Registers `source` for the current page.
    ///
    /// Images are recognized by source URI first and by content otherwise.
    pub fn image(&mut self, source: &ImageSource) -> ImageResource {
        if self.page.is_none() {
            self.begin_page();
        }
        let document = self.document.get_or_insert_with(|| DocumentResources::new(1, true));

        let known = source.uri.as_ref().and_then(|uri| document.image_uri_hash.get(uri)).copied();
        let hash = known.unwrap_or_else(|| content_hash(&source.bytes));
        if let Some(uri) = &source.uri {
            document.image_uri_hash.insert(uri.clone(), hash);
        }

        let uri = match document.image_crc.get(&hash) {
            Some(uri) => uri.clone(),
            None => {
                let uri = format!("/Documents/{}/Resources/Images/{hash:016x}.png", document.number);
                document.image_crc.insert(hash, uri.clone());
                self.pending.push(PendingResource {
                    uri: uri.clone(),
                    bytes: source.bytes.clone(),
                });
                uri
            }
        };

        let page = self.page.get_or_insert_with(Default::default);
        match page.images.get(&uri) {
            Some(key) => ImageResource {
                key: key.clone(),
                uri,
                first_on_page: false,
            },
            None => {
                let key = format!("ib{}", page.images.len());
                page.images.insert(uri.clone(), key.clone());
                ImageResource {
                    key,
                    uri,
                    first_on_page: true,
                }
            }
        }
    }

    /// Registers `profile` for the current page and returns its part URI.
    pub fn color_context(&mut self, profile: &ColorProfile) -> String {
        if self.page.is_none() {
            self.begin_page();
        }
        let document = self.document.get_or_insert_with(|| DocumentResources::new(1, true));

        let hash = content_hash(&profile.bytes);
        let uri = match document.color_contexts.get(&hash) {
            Some(uri) => uri.clone(),
            None => {
                let uri = format!("/Documents/{}/Resources/ColorContexts/{hash:016x}.icc", document.number);
                document.color_contexts.insert(hash, uri.clone());
                self.pending.push(PendingResource {
                    uri: uri.clone(),
                    bytes: profile.bytes.clone(),
                });
                uri
            }
        };

        if let Some(page) = &mut self.page {
            page.color_contexts.insert(uri.clone());
        }
        uri
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.document = None;
        self.page = None;
        self.pending.clear();
    }
}
