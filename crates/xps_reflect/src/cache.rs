//! Process-wide memo of the serializable shape of each type.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use std::sync::{PoisonError, RwLock};

use xps_utils::TypeIdMap;

use crate::Reflect;
use crate::Value;
use crate::convert::TypeConverter;
use crate::info::{DefaultValue, DependencyProperty, PropertyInfo, TypeInfo, Visibility};

// -----------------------------------------------------------------------------
// CachedProperty

/// A property that passed the serializability filter.
#[derive(Clone, Copy)]
pub struct CachedProperty {
    info: Option<&'static PropertyInfo>,
    dependency: Option<&'static DependencyProperty>,
}

impl CachedProperty {
    #[inline]
    pub fn name(&self) -> &'static str {
        match (self.dependency, self.info) {
            (Some(dp), _) => dp.name(),
            (None, Some(info)) => info.name(),
            (None, None) => "",
        }
    }

    /// The plain property, if the type declares one.
    #[inline]
    pub fn info(&self) -> Option<&'static PropertyInfo> {
        self.info
    }

    /// The dependency property backing this member, if any.
    #[inline]
    pub fn dependency(&self) -> Option<&'static DependencyProperty> {
        self.dependency
    }

    pub fn visibility(&self) -> Visibility {
        match (self.dependency, self.info) {
            (Some(dp), _) => dp.visibility(),
            (None, Some(info)) => info.visibility(),
            (None, None) => Visibility::Hidden,
        }
    }

    pub fn is_read_only(&self) -> bool {
        match (self.dependency, self.info) {
            (Some(dp), _) => dp.is_read_only(),
            (None, Some(info)) => !info.is_writable(),
            (None, None) => true,
        }
    }

    pub fn default(&self) -> Option<&'static DefaultValue> {
        match (self.dependency, self.info) {
            (Some(dp), _) => dp.default(),
            (None, Some(info)) => info.default(),
            (None, None) => None,
        }
    }

    /// The property level converter.
    pub fn converter(&self) -> Option<&'static Arc<dyn TypeConverter>> {
        let dependency = self.dependency.and_then(DependencyProperty::converter_ref);
        dependency.or_else(|| self.info.and_then(PropertyInfo::converter_ref))
    }

    /// Reads the current value from `target`.
    pub fn get(&self, target: &dyn Reflect) -> Value {
        match (self.dependency, self.info) {
            (Some(dp), _) => dp.get(target),
            (None, Some(info)) => info.get(target),
            (None, None) => Value::Unset,
        }
    }

    /// Decides whether `value` is written at all.
    ///
    /// - [`Value::Unset`] is never written.
    /// - A null dependency property value is never written.
    /// - A read-only dependency property with [`Visibility::Content`] is always written.
    /// - Otherwise the value is written unless it equals the declared default.
    pub fn should_serialize(&self, value: &Value) -> bool {
        if value.is_unset() {
            return false;
        }
        if let Some(dp) = self.dependency {
            if value.is_null() {
                return false;
            }
            if dp.is_read_only() && dp.visibility() == Visibility::Content {
                return true;
            }
        }
        match self.default() {
            Some(default) => default.get() != *value,
            None => true,
        }
    }
}

impl fmt::Debug for CachedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedProperty")
            .field("name", &self.name())
            .field("dependency", &self.dependency.is_some())
            .field("visibility", &self.visibility())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// TypeCacheItem

/// The memoized shape of one type.
#[derive(Debug)]
pub struct TypeCacheItem {
    type_info: &'static TypeInfo,
    properties: Box<[CachedProperty]>,
}

impl TypeCacheItem {
    /// Applies the serializability filter to `type_info`.
    ///
    /// A plain property is kept iff it is readable, takes no index, is not
    /// [`Visibility::Hidden`], and is writable or [`Visibility::Content`].
    /// A dependency property with the same name replaces it and its own
    /// visibility and writability are checked instead. Dependency properties
    /// without a plain counterpart follow in declaration order.
    pub fn compute(type_info: &'static TypeInfo) -> Self {
        let mut properties = Vec::with_capacity(type_info.properties().len());

        for info in type_info.properties() {
            if !info.is_readable() || info.is_indexed() {
                continue;
            }
            let candidate = CachedProperty {
                info: Some(info),
                dependency: type_info.dependency_property(info.name()),
            };
            if is_serializable(&candidate) {
                properties.push(candidate);
            }
        }

        for dp in type_info.dependency_properties() {
            if type_info.property(dp.name()).is_some() {
                continue;
            }
            let candidate = CachedProperty {
                info: None,
                dependency: Some(dp),
            };
            if is_serializable(&candidate) {
                properties.push(candidate);
            }
        }

        Self {
            type_info,
            properties: properties.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn type_info(&self) -> &'static TypeInfo {
        self.type_info
    }

    /// Serializable properties in declaration order.
    #[inline]
    pub fn properties(&self) -> &[CachedProperty] {
        &self.properties
    }

    /// The serializer hint declared by the type.
    #[inline]
    pub fn serializer(&self) -> Option<&'static str> {
        self.type_info.serializer()
    }

    /// The type level converter.
    #[inline]
    pub fn converter(&self) -> Option<&'static Arc<dyn TypeConverter>> {
        self.type_info.converter_arc()
    }
}

fn is_serializable(property: &CachedProperty) -> bool {
    match property.visibility() {
        Visibility::Hidden => false,
        Visibility::Content => true,
        Visibility::Visible => !property.is_read_only(),
    }
}

// -----------------------------------------------------------------------------
// TypeCache

/// Maps a type to its [`TypeCacheItem`].
///
/// Reads take a shared lock. On a miss the item is computed outside the lock
/// and inserted afterwards; when two callers race, both compute equal items
/// and the last insert wins.
pub struct TypeCache {
    items: RwLock<TypeIdMap<Arc<TypeCacheItem>>>,
}

static GLOBAL_TYPE_CACHE: TypeCache = TypeCache::new();

impl TypeCache {
    pub const fn new() -> Self {
        Self {
            items: RwLock::new(TypeIdMap::new()),
        }
    }

    /// The cache shared by every serialization session of the process.
    #[inline]
    pub fn global() -> &'static TypeCache {
        &GLOBAL_TYPE_CACHE
    }

    /// Returns the item for `type_info`, computing it on first use.
    pub fn get(&self, type_info: &'static TypeInfo) -> Arc<TypeCacheItem> {
        let type_id = type_info.type_id();
        {
            let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(item) = items.get(&type_id) {
                return item.clone();
            }
        }

        let item = Arc::new(TypeCacheItem::compute(type_info));
        log::trace!("type cache miss for `{}`", type_info.type_path());

        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        items.insert(type_id, item.clone());
        item
    }

    /// Returns the item for the concrete type of `target`.
    #[inline]
    pub fn get_for(&self, target: &dyn Reflect) -> Arc<TypeCacheItem> {
        self.get(target.reflect_type_info())
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Forgets every item.
    pub fn clear(&self) {
        self.items.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Default for TypeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::info::{DependencyObject, TypeInfoCell, Typed};

    struct Sample {
        deps: DependencyObject,
        width: f64,
    }

    impl Typed for Sample {
        fn type_info() -> &'static TypeInfo {
            static CELL: TypeInfoCell = TypeInfoCell::new();
            CELL.get_or_init(|| {
                TypeInfo::builder::<Sample>()
                    .property(PropertyInfo::new::<Sample>("Width", |s| s.width.into()))
                    .property(PropertyInfo::new::<Sample>("Area", |s| s.width.into()).read_only())
                    .property(
                        PropertyInfo::new::<Sample>("Children", |_| Value::Null)
                            .read_only()
                            .content(),
                    )
                    .property(PropertyInfo::new::<Sample>("Secret", |_| Value::Null).hidden())
                    .property(PropertyInfo::indexer("Item"))
                    .property(PropertyInfo::new::<Sample>("Sink", |_| Value::Null).write_only())
                    // Shadowed: the dependency property below takes over.
                    .property(PropertyInfo::new::<Sample>("Opacity", |_| Value::Float(9.0)))
                    .dependency_property(
                        DependencyProperty::new::<Sample>("Opacity", |s| &s.deps)
                            .default_value(|| Value::Float(1.0)),
                    )
                    .dependency_property(
                        DependencyProperty::new::<Sample>("Snapshot", |s| &s.deps)
                            .read_only()
                            .content()
                            .default_value(|| Value::Int(0)),
                    )
                    .dependency_property(
                        DependencyProperty::new::<Sample>("Computed", |s| &s.deps).read_only(),
                    )
                    .build()
            })
        }
    }

    crate::impl_reflect!(Sample);

    fn find(item: &TypeCacheItem, name: &str) -> CachedProperty {
        *item.properties().iter().find(|p| p.name() == name).unwrap()
    }

    #[test]
    fn filter_rules() {
        let item = TypeCacheItem::compute(Sample::type_info());
        let names: Vec<_> = item.properties().iter().map(CachedProperty::name).collect();
        assert_eq!(names, ["Width", "Children", "Opacity", "Snapshot"]);
        assert!(find(&item, "Opacity").dependency().is_some());
        assert!(find(&item, "Width").dependency().is_none());
    }

    #[test]
    fn dependency_values_follow_default_rules() {
        let sample = Sample {
            deps: DependencyObject::new(),
            width: 10.0,
        };
        let item = TypeCacheItem::compute(Sample::type_info());
        let opacity = find(&item, "Opacity");
        let snapshot = find(&item, "Snapshot");

        // Never assigned.
        assert_eq!(opacity.get(&sample), Value::Unset);
        assert!(!opacity.should_serialize(&opacity.get(&sample)));
        assert!(!snapshot.should_serialize(&snapshot.get(&sample)));

        // Equal to the default.
        sample.deps.set_value("Opacity", 1.0);
        assert!(!opacity.should_serialize(&opacity.get(&sample)));
        sample.deps.set_value("Opacity", 0.5);
        assert!(opacity.should_serialize(&opacity.get(&sample)));

        // Read-only content is written even when equal to the default.
        sample.deps.set_value("Snapshot", 0);
        assert!(snapshot.should_serialize(&snapshot.get(&sample)));

        // Null dependency values are skipped.
        sample.deps.set_value("Opacity", Value::Null);
        assert!(!opacity.should_serialize(&opacity.get(&sample)));
    }

    #[test]
    fn plain_null_is_written() {
        let item = TypeCacheItem::compute(Sample::type_info());
        assert!(find(&item, "Children").should_serialize(&Value::Null));
    }

    #[test]
    fn cache_memoizes_by_type() {
        let cache = TypeCache::new();
        let a = cache.get(Sample::type_info());
        let b = cache.get(Sample::type_info());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
