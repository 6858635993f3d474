use alloc::rc::Rc;
use alloc::sync::Arc;
use core::cell::OnceCell;
use core::fmt;

use crate::cache::{CachedProperty, TypeCacheItem};
use crate::convert::TypeConverter;
use crate::{Reflect, Value};

// -----------------------------------------------------------------------------
// PropertyOrigin

/// What a child context remembers about the property that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyOrigin {
    pub name: &'static str,
    pub is_complex: bool,
    pub is_read_only: bool,
}

// -----------------------------------------------------------------------------
// SerializablePropertyContext

/// One property of a node under serialization.
///
/// The value is read from the target on first access and then kept.
pub struct SerializablePropertyContext {
    property: CachedProperty,
    target: Rc<dyn Reflect>,
    value: OnceCell<Value>,
}

impl SerializablePropertyContext {
    pub fn new(property: CachedProperty, target: Rc<dyn Reflect>) -> Self {
        Self {
            property,
            target,
            value: OnceCell::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.property.name()
    }

    /// The object owning the property.
    #[inline]
    pub fn target(&self) -> &Rc<dyn Reflect> {
        &self.target
    }

    #[inline]
    pub fn property(&self) -> &CachedProperty {
        &self.property
    }

    /// The current value.
    pub fn value(&self) -> &Value {
        self.value.get_or_init(|| self.property.get(&*self.target))
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.property.is_read_only()
    }

    /// Returns `true` for members backed by a dependency property.
    #[inline]
    pub fn is_dependency(&self) -> bool {
        self.property.dependency().is_some()
    }

    /// See [`CachedProperty::should_serialize`].
    pub fn should_serialize(&self) -> bool {
        self.property.should_serialize(self.value())
    }

    /// The converter for this value: the property's own first, then the one
    /// of the value's type.
    pub fn converter(&self) -> Option<&Arc<dyn TypeConverter>> {
        if let Some(converter) = self.property.converter() {
            return Some(converter);
        }
        match self.value() {
            Value::Object(object) => object.reflect_type_info().converter_arc(),
            _ => None,
        }
    }

    /// A complex value is an object without a converter; it needs a serializer
    /// of its own instead of a string.
    pub fn is_complex(&self) -> bool {
        matches!(self.value(), Value::Object(_)) && self.converter().is_none()
    }

    /// The flags a child context created from this property inherits.
    pub fn origin(&self) -> PropertyOrigin {
        PropertyOrigin {
            name: self.name(),
            is_complex: self.is_complex(),
            is_read_only: self.is_read_only(),
        }
    }
}

impl fmt::Debug for SerializablePropertyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializablePropertyContext")
            .field("property", &self.property)
            .field("value", &self.value.get())
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// PropertyCollection

/// Restartable cursor over the serializable properties of one object.
pub struct PropertyCollection {
    target: Rc<dyn Reflect>,
    item: Arc<TypeCacheItem>,
    cursor: usize,
}

impl PropertyCollection {
    pub fn new(target: Rc<dyn Reflect>, item: Arc<TypeCacheItem>) -> Self {
        Self {
            target,
            item,
            cursor: 0,
        }
    }

    /// Moves the cursor back before the first property.
    #[inline]
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Index of the next property to yield.
    #[inline]
    pub fn position(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.item.properties().len()
    }
}

impl Iterator for PropertyCollection {
    type Item = SerializablePropertyContext;

    fn next(&mut self) -> Option<Self::Item> {
        let property = *self.item.properties().get(self.cursor)?;
        self.cursor += 1;
        Some(SerializablePropertyContext::new(property, self.target.clone()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.len().saturating_sub(self.cursor);
        (rest, Some(rest))
    }
}

impl fmt::Debug for PropertyCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyCollection")
            .field("type", &self.item.type_info().name())
            .field("cursor", &self.cursor)
            .field("len", &self.len())
            .finish()
    }
}
