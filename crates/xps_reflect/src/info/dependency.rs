use alloc::sync::Arc;
use core::any::Any;
use core::cell::RefCell;
use core::fmt;

use xps_utils::hash::HashMap;

use crate::Reflect;
use crate::Value;
use crate::convert::TypeConverter;
use crate::info::{DefaultValue, Getter, Visibility};

// -----------------------------------------------------------------------------
// DependencyObject

/// Local value store behind [`DependencyProperty`]s.
///
/// A property that was never assigned reads as [`Value::Unset`], which is
/// how the serializer tells "left at its default" from "set to null".
///
/// ```
/// use xps_reflect::Value;
/// use xps_reflect::info::DependencyObject;
///
/// let store = DependencyObject::new();
/// assert_eq!(store.get_value("Opacity"), Value::Unset);
///
/// store.set_value("Opacity", 0.5);
/// assert_eq!(store.get_value("Opacity"), Value::Float(0.5));
///
/// store.clear_value("Opacity");
/// assert!(!store.has_local_value("Opacity"));
/// ```
#[derive(Default)]
pub struct DependencyObject {
    values: RefCell<HashMap<&'static str, Value>>,
}

impl DependencyObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the local value of `name`, or [`Value::Unset`].
    pub fn get_value(&self, name: &str) -> Value {
        self.values.borrow().get(name).cloned().unwrap_or(Value::Unset)
    }

    /// Assigns a local value.
    pub fn set_value(&self, name: &'static str, value: impl Into<Value>) {
        self.values.borrow_mut().insert(name, value.into());
    }

    /// Removes the local value, making the property read as unset again.
    pub fn clear_value(&self, name: &str) {
        self.values.borrow_mut().remove(name);
    }

    pub fn has_local_value(&self, name: &str) -> bool {
        self.values.borrow().contains_key(name)
    }
}

impl fmt::Debug for DependencyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values.borrow().iter()).finish()
    }
}

// -----------------------------------------------------------------------------
// DependencyProperty

/// A framework-managed property with its own visibility and default rules.
///
/// When a type declares both a plain property and a dependency property with
/// the same name, the dependency property wins and decides visibility,
/// writability and default.
#[derive(Clone)]
pub struct DependencyProperty {
    name: &'static str,
    read_only: bool,
    visibility: Visibility,
    default: Option<DefaultValue>,
    converter: Option<Arc<dyn TypeConverter>>,
    getter: Getter,
}

impl DependencyProperty {
    /// Registers `name` on `T`, reading values from the store `store` returns.
    pub fn new<T: Any>(name: &'static str, store: fn(&T) -> &DependencyObject) -> Self {
        Self {
            name,
            read_only: false,
            visibility: Visibility::Visible,
            default: None,
            converter: None,
            getter: super::property::erase_getter(move |target: &T| store(target).get_value(name)),
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn visibility_of(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn content(self) -> Self {
        self.visibility_of(Visibility::Content)
    }

    pub fn hidden(self) -> Self {
        self.visibility_of(Visibility::Hidden)
    }

    pub fn default_value(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(DefaultValue::new(f));
        self
    }

    pub fn converter(mut self, converter: impl TypeConverter + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.read_only
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

    /// Reads the local value from `target`.
    #[inline]
    pub fn get(&self, target: &dyn Reflect) -> Value {
        (self.getter)(target)
    }
}

impl fmt::Debug for DependencyProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyProperty")
            .field("name", &self.name)
            .field("read_only", &self.read_only)
            .field("visibility", &self.visibility)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}
