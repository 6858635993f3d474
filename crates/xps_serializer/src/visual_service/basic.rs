use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;

use xps_reflect::convert::format_float;

use crate::Result;
use crate::model::{Brush, Rect, Visual, VisualKind};
use crate::packaging::XmlWriter;
use crate::visual_service::{FlattenerContext, VisualSerializationService, VisualTreeFlattener};

/// A flattener writing `Canvas`, `Path` and `Glyphs` elements.
///
/// Images become rectangles filled with an `ImageBrush` from the page's
/// resource dictionary. Fully transparent visuals are skipped together with
/// their subtree.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicVisualService;

impl BasicVisualService {
    pub fn new() -> Self {
        Self
    }
}

impl VisualSerializationService for BasicVisualService {
    fn acquire_visual_tree_flattener(&self, context: FlattenerContext) -> Box<dyn VisualTreeFlattener> {
        Box::new(BasicFlattener { context, depth: 0 })
    }
}

struct BasicFlattener {
    context: FlattenerContext,
    depth: usize,
}

impl BasicFlattener {
    fn write_common(&self, visual: &Visual) -> Result<()> {
        let mut body = self.context.body_writer.borrow_mut();
        let opacity = visual.opacity();
        if opacity != 1.0 {
            body.write_attribute("Opacity", &format_float(opacity))?;
        }
        if let Some(name) = visual.name() {
            body.write_attribute("Name", &name)?;
        }
        Ok(())
    }

    /// Starts the element of a drawing node, leaving it open.
    fn start_drawing(&self, visual: &Visual, with_common: bool) -> Result<()> {
        match visual.kind() {
            VisualKind::Canvas => {
                self.context.body_writer.borrow_mut().write_start_element("Canvas")?;
            }
            VisualKind::Path {
                data,
                fill,
                stroke,
                stroke_thickness,
            } => {
                let fill = fill.as_ref().map(|brush| self.brush(brush, None)).transpose()?;
                let stroke = stroke.as_ref().map(|brush| self.brush(brush, None)).transpose()?;
                let mut body = self.context.body_writer.borrow_mut();
                body.write_start_element("Path")?;
                body.write_attribute("Data", data)?;
                if let Some(fill) = fill {
                    body.write_attribute("Fill", &fill)?;
                }
                if let Some(stroke) = stroke {
                    body.write_attribute("Stroke", &stroke)?;
                    body.write_attribute("StrokeThickness", &format_float(*stroke_thickness))?;
                }
            }
            VisualKind::Glyphs {
                unicode,
                font_uri,
                em_size,
                origin_x,
                origin_y,
                fill,
            } => {
                let fill = self.brush(fill, None)?;
                let mut body = self.context.body_writer.borrow_mut();
                body.write_start_element("Glyphs")?;
                body.write_attribute("OriginX", &format_float(*origin_x))?;
                body.write_attribute("OriginY", &format_float(*origin_y))?;
                body.write_attribute("FontRenderingEmSize", &format_float(*em_size))?;
                body.write_attribute("FontUri", font_uri)?;
                body.write_attribute("UnicodeString", unicode)?;
                body.write_attribute("Fill", &fill)?;
            }
            VisualKind::Image { source, rect } => {
                let fill = self.brush(&Brush::Image(source.clone()), Some(*rect))?;
                let mut body = self.context.body_writer.borrow_mut();
                body.write_start_element("Path")?;
                body.write_attribute("Data", &rect.to_path_data())?;
                body.write_attribute("Fill", &fill)?;
            }
        }
        if with_common {
            self.write_common(visual)?;
        }
        Ok(())
    }

    /// The attribute value of `brush`, registering resources as needed.
    fn brush(&self, brush: &Brush, viewport: Option<Rect>) -> Result<Cow<'static, str>> {
        match brush {
            Brush::Solid(color) => match &color.profile {
                Some(profile) => {
                    let uri = self.context.resources.borrow_mut().color_context(profile);
                    Ok(Cow::Owned(color.to_context_color(&uri)))
                }
                None => Ok(Cow::Owned(color.to_hex())),
            },
            Brush::Image(source) => {
                let image = self.context.resources.borrow_mut().image(source);
                if image.first_on_page {
                    let pixels = Rect::new(0.0, 0.0, f64::from(source.pixel_width), f64::from(source.pixel_height));
                    let viewport = viewport.unwrap_or(pixels);
                    let mut resources = self.context.resource_writer.borrow_mut();
                    resources.write_start_element("ImageBrush")?;
                    resources.write_attribute("x:Key", &image.key)?;
                    resources.write_attribute("ImageSource", &image.uri)?;
                    resources.write_attribute("Viewbox", &pixels.to_box_string())?;
                    resources.write_attribute("ViewboxUnits", "Absolute")?;
                    resources.write_attribute("Viewport", &viewport.to_box_string())?;
                    resources.write_attribute("ViewportUnits", "Absolute")?;
                    resources.write_end_element()?;
                }
                Ok(Cow::Owned(static_resource(&image.key)))
            }
        }
    }
}

fn static_resource(key: &str) -> String {
    format!("{{StaticResource {key}}}")
}

impl VisualTreeFlattener for BasicFlattener {
    fn start_visual(&mut self, visual: &Visual) -> Result<bool> {
        if visual.opacity() <= 0.0 {
            log::trace!("skipping transparent visual");
            return Ok(false);
        }

        let is_container = matches!(visual.kind(), VisualKind::Canvas);
        if is_container || visual.child_count() == 0 {
            self.start_drawing(visual, true)?;
        } else {
            // Drawing nodes cannot hold children, so wrap them.
            self.context.body_writer.borrow_mut().write_start_element("Canvas")?;
            self.write_common(visual)?;
            self.start_drawing(visual, false)?;
            self.context.body_writer.borrow_mut().write_end_element()?;
        }
        self.depth += 1;
        Ok(true)
    }

    fn end_visual(&mut self) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.context.body_writer.borrow_mut().write_end_element()?;
        Ok(())
    }
}
