use alloc::sync::Arc;
use core::any::Any;
use core::fmt;

use crate::Reflect;
use crate::Value;
use crate::convert::TypeConverter;

// -----------------------------------------------------------------------------
// Visibility

/// How a property takes part in serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Serialized when readable and writable.
    #[default]
    Visible,
    /// Never serialized.
    Hidden,
    /// Serialized as content, even when read-only.
    Content,
}

// -----------------------------------------------------------------------------
// PropertyFlags

bitflags::bitflags! {
    /// Accessor shape of a plain property.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyFlags: u8 {
        const READABLE = 1 << 0;
        const WRITABLE = 1 << 1;
        /// The property takes index parameters and cannot be read on its own.
        const INDEXED  = 1 << 2;
    }
}

// -----------------------------------------------------------------------------
// DefaultValue

/// A declared default value.
///
/// Stored as a factory because [`Value`] may hold non-`Send` objects while the
/// metadata lives in a `static`.
#[derive(Clone)]
pub struct DefaultValue(Arc<dyn Fn() -> Value + Send + Sync>);

impl DefaultValue {
    /// Wraps a factory.
    pub fn new(f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Produces the default.
    #[inline]
    pub fn get(&self) -> Value {
        (self.0)()
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DefaultValue").field(&self.get()).finish()
    }
}

/// Type-erased property accessor.
pub type Getter = Arc<dyn Fn(&dyn Reflect) -> Value + Send + Sync>;

pub(crate) fn erase_getter<T: Any>(get: impl Fn(&T) -> Value + Send + Sync + 'static) -> Getter {
    Arc::new(move |target: &dyn Reflect| match (target as &dyn Any).downcast_ref::<T>() {
        Some(target) => get(target),
        None => Value::Unset,
    })
}

// -----------------------------------------------------------------------------
// PropertyInfo

/// A plain property of a reflected type.
///
/// # Examples
///
/// ```
/// use xps_reflect::Value;
/// use xps_reflect::info::{PropertyInfo, Visibility};
///
/// struct Page { width: f64 }
///
/// let width = PropertyInfo::new::<Page>("Width", |p| p.width.into())
///     .default_value(|| Value::Float(816.0));
///
/// assert!(width.is_readable() && width.is_writable());
/// assert_eq!(width.visibility(), Visibility::Visible);
/// assert_eq!(width.default().map(|d| d.get()), Some(Value::Float(816.0)));
/// ```
#[derive(Clone)]
pub struct PropertyInfo {
    name: &'static str,
    flags: PropertyFlags,
    visibility: Visibility,
    default: Option<DefaultValue>,
    converter: Option<Arc<dyn TypeConverter>>,
    getter: Getter,
}

impl PropertyInfo {
    /// A readable and writable property of `T`.
    ///
    /// Reading it from an object that is not a `T` yields [`Value::Unset`].
    pub fn new<T: Any>(name: &'static str, get: impl Fn(&T) -> Value + Send + Sync + 'static) -> Self {
        Self {
            name,
            flags: PropertyFlags::READABLE | PropertyFlags::WRITABLE,
            visibility: Visibility::Visible,
            default: None,
            converter: None,
            getter: erase_getter(get),
        }
    }

    /// An indexer: it takes parameters and is never serialized.
    pub fn indexer(name: &'static str) -> Self {
        Self {
            name,
            flags: PropertyFlags::READABLE | PropertyFlags::INDEXED,
            visibility: Visibility::Visible,
            default: None,
            converter: None,
            getter: Arc::new(|_: &dyn Reflect| Value::Unset),
        }
    }

    /// Removes the setter.
    pub fn read_only(mut self) -> Self {
        self.flags.remove(PropertyFlags::WRITABLE);
        self
    }

    /// Removes the getter.
    pub fn write_only(mut self) -> Self {
        self.flags.remove(PropertyFlags::READABLE);
        self
    }

    pub fn visibility_of(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Shorthand for [`Visibility::Content`].
    pub fn content(self) -> Self {
        self.visibility_of(Visibility::Content)
    }

    /// Shorthand for [`Visibility::Hidden`].
    pub fn hidden(self) -> Self {
        self.visibility_of(Visibility::Hidden)
    }

    /// Declares the default; equal values are not written.
    pub fn default_value(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(DefaultValue::new(f));
        self
    }

    /// Converts values of this property through `converter`, making it simple.
    pub fn converter(mut self, converter: impl TypeConverter + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    #[inline]
    pub fn is_readable(&self) -> bool {
        self.flags.contains(PropertyFlags::READABLE)
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.flags.contains(PropertyFlags::WRITABLE)
    }

    #[inline]
    pub fn is_indexed(&self) -> bool {
        self.flags.contains(PropertyFlags::INDEXED)
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    #[inline]
    pub fn converter_ref(&self) -> Option<&Arc<dyn TypeConverter>> {
        self.converter.as_ref()
    }

    /// Reads the property from `target`.
    #[inline]
    pub fn get(&self, target: &dyn Reflect) -> Value {
        (self.getter)(target)
    }
}

impl fmt::Debug for PropertyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyInfo")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("visibility", &self.visibility)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_flags() {
        let p = PropertyInfo::new::<u8>("P", |v| (*v).into());
        assert_eq!(p.flags(), PropertyFlags::READABLE | PropertyFlags::WRITABLE);
        let p = p.read_only().content();
        assert!(p.is_readable() && !p.is_writable());
        assert_eq!(p.visibility(), Visibility::Content);
        assert!(PropertyInfo::indexer("Item").is_indexed());
        assert!(!PropertyInfo::new::<u8>("W", |_| Value::Null).write_only().is_readable());
    }
}
