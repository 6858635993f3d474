use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::packaging::{PackagingError, XmlWriter};

/// An [`XmlWriter`] producing text.
///
/// Elements without content are self-closing. Attribute values are escaped.
///
/// ```
/// use xps_serializer::packaging::{XmlTextWriter, XmlWriter};
///
/// let mut w = XmlTextWriter::new();
/// w.write_start_element("Canvas").unwrap();
/// w.write_attribute("Name", "a<b").unwrap();
/// w.write_start_element("Path").unwrap();
/// w.write_end_element().unwrap();
/// w.write_end_element().unwrap();
///
/// assert_eq!(w.finish().unwrap(), r#"<Canvas Name="a&lt;b"><Path/></Canvas>"#);
/// ```
#[derive(Debug, Default)]
pub struct XmlTextWriter {
    out: String,
    open: Vec<String>,
    /// The start tag of the innermost element still accepts attributes.
    in_start_tag: bool,
}

impl XmlTextWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The text written so far.
    #[inline]
    pub fn text(&self) -> &str {
        &self.out
    }

    /// Number of elements not yet ended.
    #[inline]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Takes the text, failing if elements are still open.
    pub fn finish(&mut self) -> Result<String, PackagingError> {
        if !self.open.is_empty() {
            return Err(PackagingError::UnclosedElements {
                count: self.open.len(),
            });
        }
        Ok(core::mem::take(&mut self.out))
    }

    fn close_start_tag(&mut self) {
        if self.in_start_tag {
            self.out.push('>');
            self.in_start_tag = false;
        }
    }
}

impl XmlWriter for XmlTextWriter {
    fn write_start_element(&mut self, name: &str) -> Result<(), PackagingError> {
        self.close_start_tag();
        self.out.push('<');
        self.out.push_str(name);
        self.open.push(name.to_string());
        self.in_start_tag = true;
        Ok(())
    }

    fn write_attribute(&mut self, name: &str, value: &str) -> Result<(), PackagingError> {
        if !self.in_start_tag {
            return Err(PackagingError::AttributeAfterContent { name: name.to_string() });
        }
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        escape_into(&mut self.out, value);
        self.out.push('"');
        Ok(())
    }

    fn write_end_element(&mut self) -> Result<(), PackagingError> {
        let name = self.open.pop().ok_or(PackagingError::UnbalancedEnd)?;
        if self.in_start_tag {
            self.out.push_str("/>");
            self.in_start_tag = false;
        } else {
            self.out.push_str("</");
            self.out.push_str(&name);
            self.out.push('>');
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PackagingError> {
        Ok(())
    }
}

fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            '\t' => out.push_str("&#x9;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_and_escaped() {
        let mut w = XmlTextWriter::new();
        w.write_start_element("FixedPage").unwrap();
        w.write_attribute("Width", "816").unwrap();
        w.write_start_element("Glyphs").unwrap();
        w.write_attribute("UnicodeString", "\"Tom\" & 'Jerry'").unwrap();
        w.write_end_element().unwrap();
        w.write_start_element("Canvas").unwrap();
        w.write_start_element("Path").unwrap();
        w.write_end_element().unwrap();
        w.write_end_element().unwrap();
        w.write_end_element().unwrap();

        assert_eq!(
            w.finish().unwrap(),
            "<FixedPage Width=\"816\"><Glyphs UnicodeString=\"&quot;Tom&quot; &amp; &apos;Jerry&apos;\"/>\
             <Canvas><Path/></Canvas></FixedPage>"
        );
    }

    #[test]
    fn attribute_after_child_is_rejected() {
        let mut w = XmlTextWriter::new();
        w.write_start_element("Canvas").unwrap();
        w.write_start_element("Path").unwrap();
        w.write_end_element().unwrap();

        let err = w.write_attribute("Opacity", "0.5").unwrap_err();
        assert_eq!(
            err,
            PackagingError::AttributeAfterContent {
                name: "Opacity".into()
            }
        );
    }

    #[test]
    fn unbalanced_and_unclosed() {
        let mut w = XmlTextWriter::new();
        assert_eq!(w.write_end_element(), Err(PackagingError::UnbalancedEnd));

        w.write_start_element("A").unwrap();
        w.write_start_element("B").unwrap();
        assert_eq!(w.finish(), Err(PackagingError::UnclosedElements { count: 2 }));
        assert_eq!(w.depth(), 2);
    }
}
