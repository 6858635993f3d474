//! Declarative type metadata.
//!
//! ## Menu
//!
//! - [`TypeInfo`]: per-type metadata, built once through [`TypeInfo::builder`].
//!     - simple name and full path,
//!     - optional XML namespace and serializer hint,
//!     - optional [`TypeConverter`](crate::convert::TypeConverter), which makes
//!       values of the type serialize as a single string,
//!     - plain [`PropertyInfo`]s and [`DependencyProperty`]s in declaration order.
//!
//! - [`PropertyInfo`]: a plain property: getter, [`PropertyFlags`], [`Visibility`],
//!   optional default value and converter.
//!
//! - [`DependencyProperty`]: a property backed by a [`DependencyObject`] value
//!   store, answering [`Value::Unset`](crate::Value::Unset) when no local value exists.
//!
//! - [`Typed`]: static access to a type's [`TypeInfo`].
//!
//! - [`TypeInfoCell`]: storage for the `'static` [`TypeInfo`] inside [`Typed::type_info`].

// -----------------------------------------------------------------------------
// Modules

mod dependency;
mod property;
mod type_info;

// -----------------------------------------------------------------------------
// Exports

pub use dependency::{DependencyObject, DependencyProperty};
pub use property::{DefaultValue, Getter, PropertyFlags, PropertyInfo, Visibility};
pub use type_info::{TypeInfo, TypeInfoBuilder};

use std::sync::OnceLock;

// -----------------------------------------------------------------------------
// Typed

/// A static accessor to type metadata.
///
/// Implemented manually with a [`TypeInfoCell`]:
///
/// ```
/// use xps_reflect::info::{PropertyInfo, TypeInfo, TypeInfoCell, Typed};
///
/// struct Page { width: f64 }
///
/// impl Typed for Page {
///     fn type_info() -> &'static TypeInfo {
///         static CELL: TypeInfoCell = TypeInfoCell::new();
///         CELL.get_or_init(|| {
///             TypeInfo::builder::<Page>()
///                 .property(PropertyInfo::new::<Page>("Width", |p| p.width.into()))
///                 .build()
///         })
///     }
/// }
///
/// xps_reflect::impl_reflect!(Page);
///
/// let info = Page::type_info();
/// assert_eq!(info.name(), "Page");
/// assert_eq!(info.properties().len(), 1);
/// ```
pub trait Typed: 'static {
    /// Returns the compile-time metadata of `Self`.
    fn type_info() -> &'static TypeInfo;
}

// -----------------------------------------------------------------------------
// TypeInfoCell

/// Container for static storage of [`TypeInfo`].
///
/// Internally, there is an [`OnceLock`]; concurrent first calls block until
/// the winner finished building.
pub struct TypeInfoCell(OnceLock<TypeInfo>);

impl TypeInfoCell {
    /// Create an empty cell.
    #[inline]
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    /// Returns the stored metadata, building it with `f` on first access.
    #[inline]
    pub fn get_or_init(&self, f: impl FnOnce() -> TypeInfo) -> &TypeInfo {
        self.0.get_or_init(f)
    }
}
