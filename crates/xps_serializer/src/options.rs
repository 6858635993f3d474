use alloc::string::String;

use serde::{Deserialize, Serialize};

use crate::model::Size;

/// Runtime settings of a [`SerializationManager`](crate::SerializationManager).
///
/// Every field has a default, so partial documents deserialize:
///
/// ```
/// use xps_serializer::SerializationOptions;
///
/// let options = SerializationOptions::default();
/// assert_eq!(options.default_page_size.width, 816.0);
/// assert!(options.xml_language.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializationOptions {
    /// Size of pages synthesized around bare visuals, in 1/96 inch.
    pub default_page_size: Size,
    /// Written as `xml:lang` on every `FixedPage` when set.
    pub xml_language: Option<String>,
}

impl Default for SerializationOptions {
    fn default() -> Self {
        Self {
            default_page_size: Size::LETTER,
            xml_language: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ron_partial_options() {
        let options: SerializationOptions = ron::from_str(r#"(xml_language: Some("en-US"))"#).unwrap();
        assert_eq!(options.xml_language.as_deref(), Some("en-US"));
        assert_eq!(options.default_page_size, Size::LETTER);

        let options: SerializationOptions =
            ron::from_str("(default_page_size: (width: 100.0, height: 50.0))").unwrap();
        assert_eq!(options.default_page_size, Size::new(100.0, 50.0));
    }

    #[test]
    fn ron_round_trip() {
        let options = SerializationOptions {
            default_page_size: Size::new(200.0, 300.0),
            xml_language: Some("de-DE".into()),
        };
        let text = ron::to_string(&options).unwrap();
        assert_eq!(ron::from_str::<SerializationOptions>(&text).unwrap(), options);
    }
}
