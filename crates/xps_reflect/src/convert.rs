//! Conversion of simple values into culture-invariant strings.

use alloc::format;
use alloc::string::{String, ToString};

use thiserror::Error;

use crate::Value;

// -----------------------------------------------------------------------------
// ConvertError

/// A [`TypeConverter`] could not turn a value into a string.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConvertError {
    #[error("`{converter}` cannot convert a {kind} value")]
    Unsupported {
        converter: &'static str,
        kind: &'static str,
    },
    #[error("conversion failed: {0}")]
    Failed(String),
}

// -----------------------------------------------------------------------------
// TypeConverter

/// Turns a value into the string written as an XML attribute.
///
/// The output must not depend on the host locale: decimal point is always
/// `.`, no digit grouping.
pub trait TypeConverter: Send + Sync {
    /// Converts `value`.
    fn convert_to_invariant_string(&self, value: &Value) -> Result<String, ConvertError>;
}

impl<F> TypeConverter for F
where
    F: Fn(&Value) -> Result<String, ConvertError> + Send + Sync,
{
    #[inline]
    fn convert_to_invariant_string(&self, value: &Value) -> Result<String, ConvertError> {
        self(value)
    }
}

// -----------------------------------------------------------------------------
// InvariantConverter

/// The converter used for primitive values.
///
/// ```
/// use xps_reflect::{TypeName, Value};
/// use xps_reflect::convert::{InvariantConverter, TypeConverter};
///
/// let c = InvariantConverter;
/// assert_eq!(c.convert_to_invariant_string(&Value::Float(0.5)).unwrap(), "0.5");
/// assert_eq!(c.convert_to_invariant_string(&Value::Float(f64::NEG_INFINITY)).unwrap(), "-Infinity");
/// assert_eq!(c.convert_to_invariant_string(&Value::Bool(true)).unwrap(), "True");
/// assert_eq!(
///     c.convert_to_invariant_string(&Value::Type(TypeName::new("N.S.MyType"))).unwrap(),
///     "{TypeOf MyType}",
/// );
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct InvariantConverter;

impl TypeConverter for InvariantConverter {
    fn convert_to_invariant_string(&self, value: &Value) -> Result<String, ConvertError> {
        match value {
            Value::Bool(true) => Ok("True".into()),
            Value::Bool(false) => Ok("False".into()),
            Value::Int(v) => Ok(v.to_string()),
            Value::Float(v) => Ok(format_float(*v)),
            Value::String(v) => Ok(v.to_string()),
            Value::Type(v) => Ok(format!("{{TypeOf {}}}", v.short_name())),
            other => Err(ConvertError::Unsupported {
                converter: "InvariantConverter",
                kind: other.kind_name(),
            }),
        }
    }
}

/// Formats a float the way XAML expects it.
///
/// Finite values use the shortest representation that reads back exactly.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".into()
    } else if value == f64::INFINITY {
        "Infinity".into()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".into()
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_are_invariant() {
        assert_eq!(format_float(2.0), "2");
        assert_eq!(format_float(-0.25), "-0.25");
        assert_eq!(format_float(1e21), "1000000000000000000000");
        assert_eq!(format_float(f64::NAN), "NaN");
        assert_eq!(format_float(f64::INFINITY), "Infinity");
    }

    #[test]
    fn objects_are_unsupported() {
        let err = InvariantConverter.convert_to_invariant_string(&Value::Null).unwrap_err();
        assert!(matches!(err, ConvertError::Unsupported { kind: "null", .. }));
    }

    #[test]
    fn closures_are_converters() {
        let upper = |v: &Value| match v {
            Value::String(s) => Ok(s.to_uppercase()),
            _ => Err(ConvertError::Failed("not a string".into())),
        };
        assert_eq!(upper.convert_to_invariant_string(&"abc".into()).unwrap(), "ABC");
    }
}
