//! Fixtures shared by the tests of this crate.

use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use xps_reflect::info::{DependencyObject, DependencyProperty, PropertyInfo, TypeInfo, TypeInfoCell, Typed};
use xps_reflect::{Reflect, TypeName, Value};

use crate::BoxError;
use crate::model::{Color, DocumentPage, DocumentPaginator, FixedDocument, FixedDocumentSequence, FixedPage};
use crate::model::{Size, Visual};
use crate::packaging::{InMemoryPackage, XmlEvent};
use crate::serializer::names;
use crate::visual_service::{FlattenerContext, VisualSerializationService, VisualTreeFlattener};

pub(crate) const WIDGET_NS: &str = "urn:test:widgets";

// -----------------------------------------------------------------------------
// Widget

/// A plain reflected node written by the object serializer.
pub(crate) struct Widget {
    pub(crate) label: &'static str,
    pub(crate) kind: TypeName,
    pub(crate) child: RefCell<Option<Rc<dyn Reflect>>>,
    pub(crate) deps: DependencyObject,
}

impl Widget {
    pub(crate) const TAG: &'static str = "Tag";
    pub(crate) const STAMP: &'static str = "Stamp";

    pub(crate) fn new(label: &'static str) -> Rc<Self> {
        Rc::new(Self {
            label,
            kind: TypeName::new("N.S.MyType"),
            child: RefCell::new(None),
            deps: DependencyObject::new(),
        })
    }

    pub(crate) fn set_child(&self, child: Rc<dyn Reflect>) {
        *self.child.borrow_mut() = Some(child);
    }

    fn deps(&self) -> &DependencyObject {
        &self.deps
    }
}

impl Typed for Widget {
    fn type_info() -> &'static TypeInfo {
        static CELL: TypeInfoCell = TypeInfoCell::new();
        CELL.get_or_init(|| {
            TypeInfo::builder::<Widget>()
                .xml_namespace(WIDGET_NS)
                .serializer(names::OBJECT)
                .property(PropertyInfo::new::<Widget>("Label", |w| w.label.into()))
                .property(PropertyInfo::new::<Widget>("Kind", |w| w.kind.into()))
                .property(PropertyInfo::new::<Widget>("Note", |_| Value::Null))
                .property(PropertyInfo::new::<Widget>("Child", |w| {
                    w.child.borrow().clone().map_or(Value::Null, Value::Object)
                }))
                .property(PropertyInfo::new::<Widget>("Hidden", |_| "secret".into()).hidden())
                .dependency_property(
                    DependencyProperty::new::<Widget>(Widget::TAG, Widget::deps).default_value(|| "none".into()),
                )
                .dependency_property(
                    DependencyProperty::new::<Widget>(Widget::STAMP, Widget::deps)
                        .read_only()
                        .content()
                        .default_value(|| Value::Int(0)),
                )
                .build()
        })
    }
}

xps_reflect::impl_reflect!(Widget);

// -----------------------------------------------------------------------------
// RecordingPaginator

/// Produces `total` pages and records every index it is asked for.
///
/// Unless `known` is set, the count only becomes valid once the last page was
/// produced.
pub(crate) struct RecordingPaginator {
    pub(crate) total: usize,
    pub(crate) known: bool,
    pub(crate) requests: Rc<RefCell<Vec<usize>>>,
}

impl RecordingPaginator {
    pub(crate) fn new(total: usize, known: bool) -> (Self, Rc<RefCell<Vec<usize>>>) {
        let requests = Rc::new(RefCell::new(Vec::new()));
        let paginator = Self {
            total,
            known,
            requests: requests.clone(),
        };
        (paginator, requests)
    }

    fn produced(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl DocumentPaginator for RecordingPaginator {
    fn is_page_count_valid(&self) -> bool {
        self.known || self.produced() >= self.total
    }

    fn page_count(&self) -> usize {
        if self.known { self.total } else { self.produced() }
    }

    fn page_size(&self) -> Size {
        Size::new(200.0, 100.0)
    }

    fn get_page(&self, index: usize) -> Result<Option<DocumentPage>, BoxError> {
        self.requests.borrow_mut().push(index);
        if index >= self.total {
            return Ok(None);
        }
        let visual = Visual::solid_path(format!("M 0,0 L {index},{index}"), Color::BLACK);
        Ok(Some(DocumentPage::new(Rc::new(visual), self.page_size())))
    }
}

// -----------------------------------------------------------------------------
// RecordingVisualService

/// Records the flattener calls; visuals named `skip` are rejected.
#[derive(Clone, Default)]
pub(crate) struct RecordingVisualService {
    pub(crate) log: Rc<RefCell<Vec<String>>>,
}

struct RecordingFlattener {
    log: Rc<RefCell<Vec<String>>>,
}

impl VisualSerializationService for RecordingVisualService {
    fn acquire_visual_tree_flattener(&self, _: FlattenerContext) -> Box<dyn VisualTreeFlattener> {
        self.log.borrow_mut().push("acquire".into());
        Box::new(RecordingFlattener { log: self.log.clone() })
    }

    fn release_visual_tree_flattener(&self, flattener: Box<dyn VisualTreeFlattener>) {
        self.log.borrow_mut().push("release".into());
        drop(flattener);
    }
}

impl VisualTreeFlattener for RecordingFlattener {
    fn start_visual(&mut self, visual: &Visual) -> crate::Result<bool> {
        let name = visual.name().unwrap_or_default();
        self.log.borrow_mut().push(format!("start {name}"));
        Ok(name != "skip")
    }

    fn end_visual(&mut self) -> crate::Result<()> {
        self.log.borrow_mut().push("end".into());
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Graphs

pub(crate) fn named(name: &str) -> Visual {
    let visual = Visual::canvas();
    visual.set_name(String::from(name));
    visual
}

pub(crate) fn page_with_path(data: &str) -> Rc<FixedPage> {
    let page = Rc::new(FixedPage::new(Size::new(100.0, 50.0)));
    page.add_child(Rc::new(Visual::solid_path(String::from(data), Color::BLACK)));
    page
}

/// Two documents holding two pages and one page.
pub(crate) fn sample_sequence() -> Rc<FixedDocumentSequence> {
    let first = Rc::new(FixedDocument::new());
    first.add_page(page_with_path("M 0,0 L 1,1"));
    first.add_page(page_with_path("M 0,0 L 2,2"));

    let second = Rc::new(FixedDocument::new());
    second.add_page(page_with_path("M 0,0 L 3,3"));

    let sequence = Rc::new(FixedDocumentSequence::new());
    sequence.add_document(first);
    sequence.add_document(second);
    sequence
}

/// The element names started in `part`, in order.
pub(crate) fn elements_in(package: &InMemoryPackage, part: &str) -> Vec<String> {
    package
        .events()
        .into_iter()
        .filter_map(|event| match event {
            XmlEvent::StartElement { part: p, name } if p == part => Some(name),
            _ => None,
        })
        .collect()
}
