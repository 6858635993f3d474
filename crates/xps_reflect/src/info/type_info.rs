use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::{Any, TypeId};
use core::fmt;

use crate::convert::TypeConverter;
use crate::info::{DependencyProperty, PropertyInfo};

// -----------------------------------------------------------------------------
// TypeInfo

/// Metadata of one reflected type.
///
/// Created with [`TypeInfo::builder`] and usually stored in a
/// [`TypeInfoCell`](crate::info::TypeInfoCell).
pub struct TypeInfo {
    type_id: TypeId,
    type_path: &'static str,
    name: &'static str,
    xml_namespace: Option<&'static str>,
    serializer: Option<&'static str>,
    converter: Option<Arc<dyn TypeConverter>>,
    properties: Box<[PropertyInfo]>,
    dependency_properties: Box<[DependencyProperty]>,
}

impl TypeInfo {
    /// Starts describing `T`.
    ///
    /// The simple name defaults to the last path segment of
    /// [`type_name`](core::any::type_name) with generics removed.
    pub fn builder<T: Any>() -> TypeInfoBuilder {
        let type_path = core::any::type_name::<T>();
        TypeInfoBuilder {
            info: TypeInfo {
                type_id: TypeId::of::<T>(),
                type_path,
                name: simple_name(type_path),
                xml_namespace: None,
                serializer: None,
                converter: None,
                properties: Box::new([]),
                dependency_properties: Box::new([]),
            },
            properties: Vec::new(),
            dependency_properties: Vec::new(),
        }
    }

    /// The [`TypeId`] of the described type.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The full Rust path, e.g. `xps_serializer::model::FixedPage`.
    #[inline]
    pub fn type_path(&self) -> &'static str {
        self.type_path
    }

    /// The simple name, used as element name, e.g. `FixedPage`.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The XML namespace the element lives in, if it differs from its parent's.
    #[inline]
    pub fn xml_namespace(&self) -> Option<&'static str> {
        self.xml_namespace
    }

    /// Name of the serializer registered for this type, if any.
    #[inline]
    pub fn serializer(&self) -> Option<&'static str> {
        self.serializer
    }

    /// The converter turning values of this type into strings.
    #[inline]
    pub fn converter(&self) -> Option<&dyn TypeConverter> {
        self.converter.as_deref()
    }

    pub(crate) fn converter_arc(&self) -> Option<&Arc<dyn TypeConverter>> {
        self.converter.as_ref()
    }

    /// Plain properties in declaration order.
    #[inline]
    pub fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    /// Dependency properties in declaration order.
    #[inline]
    pub fn dependency_properties(&self) -> &[DependencyProperty] {
        &self.dependency_properties
    }

    /// Returns the plain property named `name`.
    pub fn property(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Returns the dependency property named `name`.
    pub fn dependency_property(&self, name: &str) -> Option<&DependencyProperty> {
        self.dependency_properties.iter().find(|p| p.name() == name)
    }

    /// Returns `true` if the described type is `T`.
    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("type_path", &self.type_path)
            .field("name", &self.name)
            .field("xml_namespace", &self.xml_namespace)
            .field("serializer", &self.serializer)
            .field("has_converter", &self.converter.is_some())
            .field("properties", &self.properties)
            .field("dependency_properties", &self.dependency_properties)
            .finish()
    }
}

fn simple_name(path: &'static str) -> &'static str {
    let path = match path.find('<') {
        Some(index) => &path[..index],
        None => path,
    };
    match path.rfind("::") {
        Some(index) => &path[index + 2..],
        None => path,
    }
}

// -----------------------------------------------------------------------------
// TypeInfoBuilder

/// Builder returned by [`TypeInfo::builder`].
pub struct TypeInfoBuilder {
    info: TypeInfo,
    properties: Vec<PropertyInfo>,
    dependency_properties: Vec<DependencyProperty>,
}

impl TypeInfoBuilder {
    /// Overrides the simple name.
    pub fn name(mut self, name: &'static str) -> Self {
        self.info.name = name;
        self
    }

    /// Places the element in `uri`.
    pub fn xml_namespace(mut self, uri: &'static str) -> Self {
        self.info.xml_namespace = Some(uri);
        self
    }

    /// Names the serializer that persists values of this type.
    pub fn serializer(mut self, name: &'static str) -> Self {
        self.info.serializer = Some(name);
        self
    }

    /// Makes values of this type simple, converted through `converter`.
    pub fn converter(mut self, converter: impl TypeConverter + 'static) -> Self {
        self.info.converter = Some(Arc::new(converter));
        self
    }

    /// Appends a plain property.
    pub fn property(mut self, property: PropertyInfo) -> Self {
        self.properties.push(property);
        self
    }

    /// Appends a dependency property.
    pub fn dependency_property(mut self, property: DependencyProperty) -> Self {
        self.dependency_properties.push(property);
        self
    }

    /// Finishes the metadata.
    pub fn build(self) -> TypeInfo {
        TypeInfo {
            properties: self.properties.into_boxed_slice(),
            dependency_properties: self.dependency_properties.into_boxed_slice(),
            ..self.info
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::InvariantConverter;

    struct Generic<T>(T);

    #[test]
    fn simple_name_strips_path_and_generics() {
        assert_eq!(simple_name("a::b::FixedPage"), "FixedPage");
        assert_eq!(simple_name("a::Generic<b::C>"), "Generic");
        assert_eq!(simple_name("Plain"), "Plain");
        let info = TypeInfo::builder::<Generic<u8>>().build();
        assert_eq!(info.name(), "Generic");
        assert!(info.is::<Generic<u8>>());
        let _ = Generic(0u8).0;
    }

    #[test]
    fn builder_keeps_declaration_order() {
        let info = TypeInfo::builder::<u8>()
            .name("Byte")
            .xml_namespace("urn:test")
            .serializer("Byte")
            .converter(InvariantConverter)
            .property(PropertyInfo::new::<u8>("B", |_| crate::Value::Null))
            .property(PropertyInfo::new::<u8>("A", |_| crate::Value::Null))
            .build();
        let names: Vec<_> = info.properties().iter().map(PropertyInfo::name).collect();
        assert_eq!(names, ["B", "A"]);
        assert_eq!(info.name(), "Byte");
        assert_eq!(info.xml_namespace(), Some("urn:test"));
        assert_eq!(info.serializer(), Some("Byte"));
        assert!(info.converter().is_some());
        assert!(info.property("A").is_some());
        assert!(info.dependency_property("A").is_none());
    }
}
