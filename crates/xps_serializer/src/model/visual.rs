use alloc::borrow::Cow;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell};

use xps_reflect::convert::ConvertError;
use xps_reflect::info::{DependencyObject, DependencyProperty, TypeInfo};
use xps_reflect::info::{TypeInfoCell, Typed};
use xps_reflect::{Reflect, Value};

use crate::model::Rect;
use crate::serializer::names;

// -----------------------------------------------------------------------------
// Color

/// An ICC color profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorProfile {
    pub bytes: Rc<[u8]>,
}

impl ColorProfile {
    pub fn new(bytes: impl Into<Rc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

/// An sRGB color, optionally tied to a color profile.
///
/// Converts to `#AARRGGBB`, so a property holding a `Color` is written as an
/// attribute rather than an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Color {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub profile: Option<Rc<ColorProfile>>,
}

impl Color {
    pub const BLACK: Color = Color::from_rgb(0, 0, 0);

    #[inline]
    pub const fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self {
            a,
            r,
            g,
            b,
            profile: None,
        }
    }

    #[inline]
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self::from_argb(0xFF, r, g, b)
    }

    pub fn with_profile(mut self, profile: ColorProfile) -> Self {
        self.profile = Some(Rc::new(profile));
        self
    }

    /// ```
    /// use xps_serializer::model::Color;
    ///
    /// assert_eq!(Color::from_argb(0x80, 0x12, 0xAB, 0x00).to_hex(), "#8012AB00");
    /// ```
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
    }

    /// The `ContextColor` syntax referencing the profile part at `profile_uri`.
    pub fn to_context_color(&self, profile_uri: &str) -> String {
        let channel = |c: u8| xps_reflect::convert::format_float(f64::from(c) / 255.0);
        format!(
            "ContextColor {profile_uri} {},{},{},{}",
            channel(self.a),
            channel(self.r),
            channel(self.g),
            channel(self.b)
        )
    }
}

fn convert_color(value: &Value) -> Result<String, ConvertError> {
    value
        .as_object()
        .and_then(|object| object.downcast_ref::<Color>())
        .map(Color::to_hex)
        .ok_or(ConvertError::Unsupported {
            converter: "ColorConverter",
            kind: value.kind_name(),
        })
}

impl Typed for Color {
    fn type_info() -> &'static TypeInfo {
        static CELL: TypeInfoCell = TypeInfoCell::new();
        CELL.get_or_init(|| TypeInfo::builder::<Color>().converter(convert_color).build())
    }
}

// -----------------------------------------------------------------------------
// Images and brushes

/// Encoded image data plus its pixel size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    /// Where the image was loaded from; equal URIs are assumed to hold equal bytes.
    pub uri: Option<String>,
    pub bytes: Rc<[u8]>,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl ImageSource {
    pub fn new(bytes: impl Into<Rc<[u8]>>, pixel_width: u32, pixel_height: u32) -> Self {
        Self {
            uri: None,
            bytes: bytes.into(),
            pixel_width,
            pixel_height,
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Brush {
    Solid(Color),
    Image(Rc<ImageSource>),
}

// -----------------------------------------------------------------------------
// Visual

/// The drawing a [`Visual`] node contributes.
#[derive(Debug, Clone, PartialEq)]
pub enum VisualKind {
    /// A pure container.
    Canvas,
    Path {
        data: String,
        fill: Option<Brush>,
        stroke: Option<Brush>,
        stroke_thickness: f64,
    },
    Glyphs {
        unicode: String,
        font_uri: String,
        em_size: f64,
        origin_x: f64,
        origin_y: f64,
        fill: Brush,
    },
    /// A bitmap stretched over `rect`.
    Image { source: Rc<ImageSource>, rect: Rect },
}

/// A node of a visual tree.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use xps_serializer::model::{Color, Visual};
///
/// let root = Visual::canvas();
/// root.add_child(Rc::new(Visual::solid_path("M 0,0 L 1,1", Color::BLACK)));
/// root.set_opacity(0.5);
///
/// assert_eq!(root.child_count(), 1);
/// assert_eq!(root.opacity(), 0.5);
/// ```
#[derive(Debug)]
pub struct Visual {
    kind: VisualKind,
    children: RefCell<Vec<Rc<Visual>>>,
    deps: DependencyObject,
}

impl Visual {
    pub const OPACITY: &'static str = "Opacity";
    pub const NAME: &'static str = "Name";

    pub fn new(kind: VisualKind) -> Self {
        Self {
            kind,
            children: RefCell::new(Vec::new()),
            deps: DependencyObject::new(),
        }
    }

    pub fn canvas() -> Self {
        Self::new(VisualKind::Canvas)
    }

    pub fn solid_path(data: impl Into<String>, fill: Color) -> Self {
        Self::new(VisualKind::Path {
            data: data.into(),
            fill: Some(Brush::Solid(fill)),
            stroke: None,
            stroke_thickness: 1.0,
        })
    }

    pub fn image(source: Rc<ImageSource>, rect: Rect) -> Self {
        Self::new(VisualKind::Image { source, rect })
    }

    pub fn glyphs(unicode: impl Into<String>, font_uri: impl Into<String>, em_size: f64, fill: Color) -> Self {
        Self::new(VisualKind::Glyphs {
            unicode: unicode.into(),
            font_uri: font_uri.into(),
            em_size,
            origin_x: 0.0,
            origin_y: em_size,
            fill: Brush::Solid(fill),
        })
    }

    #[inline]
    pub fn kind(&self) -> &VisualKind {
        &self.kind
    }

    pub fn add_child(&self, child: Rc<Visual>) {
        self.children.borrow_mut().push(child);
    }

    /// Builder form of [`add_child`](Self::add_child).
    pub fn with_child(self, child: Visual) -> Self {
        self.add_child(Rc::new(child));
        self
    }

    pub fn children(&self) -> Ref<'_, Vec<Rc<Visual>>> {
        self.children.borrow()
    }

    pub fn child(&self, index: usize) -> Option<Rc<Visual>> {
        self.children.borrow().get(index).cloned()
    }

    pub fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    #[inline]
    pub fn deps(&self) -> &DependencyObject {
        &self.deps
    }

    pub fn set_opacity(&self, opacity: f64) {
        self.deps.set_value(Self::OPACITY, opacity);
    }

    /// The local opacity, `1.0` when unset.
    pub fn opacity(&self) -> f64 {
        match self.deps.get_value(Self::OPACITY) {
            Value::Float(opacity) => opacity,
            Value::Int(opacity) => opacity as f64,
            _ => 1.0,
        }
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.deps.set_value(Self::NAME, Value::String(Cow::Owned(name.into())));
    }

    pub fn name(&self) -> Option<String> {
        match self.deps.get_value(Self::NAME) {
            Value::String(name) => Some(name.into_owned()),
            _ => None,
        }
    }
}

impl Typed for Visual {
    fn type_info() -> &'static TypeInfo {
        static CELL: TypeInfoCell = TypeInfoCell::new();
        CELL.get_or_init(|| {
            TypeInfo::builder::<Visual>()
                .serializer(names::VISUAL)
                .dependency_property(
                    DependencyProperty::new::<Visual>(Visual::OPACITY, Visual::deps)
                        .default_value(|| Value::Float(1.0)),
                )
                .dependency_property(DependencyProperty::new::<Visual>(Visual::NAME, Visual::deps))
                .build()
        })
    }
}

xps_reflect::impl_reflect!(Color, Visual);

/// Reads the visual behind a graph node.
pub(crate) fn as_visual(target: &Rc<dyn Reflect>) -> Option<Rc<Visual>> {
    <dyn Reflect>::downcast_rc::<Visual>(target.clone()).ok()
}
