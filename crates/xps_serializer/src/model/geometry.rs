use alloc::format;
use alloc::string::String;

use serde::{Deserialize, Serialize};
use xps_reflect::convert::format_float;

/// Width and height in 1/96 inch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// US Letter at 96 DPI.
    pub const LETTER: Size = Size::new(816.0, 1056.0);

    #[inline]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Size {
    fn default() -> Self {
        Self::LETTER
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Abbreviated path geometry tracing the rectangle.
    ///
    /// ```
    /// use xps_serializer::model::Rect;
    ///
    /// assert_eq!(Rect::new(0.0, 0.0, 10.0, 5.5).to_path_data(), "M 0,0 L 10,0 10,5.5 0,5.5 Z");
    /// ```
    pub fn to_path_data(&self) -> String {
        let (l, t) = (format_float(self.x), format_float(self.y));
        let r = format_float(self.x + self.width);
        let b = format_float(self.y + self.height);
        format!("M {l},{t} L {r},{t} {r},{b} {l},{b} Z")
    }

    /// `x,y,width,height`, the form used by `Viewbox` attributes.
    pub fn to_box_string(&self) -> String {
        format!(
            "{},{},{},{}",
            format_float(self.x),
            format_float(self.y),
            format_float(self.width),
            format_float(self.height)
        )
    }
}
