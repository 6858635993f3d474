use alloc::borrow::Cow;
use alloc::rc::Rc;
use alloc::string::String;
use core::any::{Any, TypeId};
use core::fmt;

use crate::info::TypeInfo;

// -----------------------------------------------------------------------------
// Reflect

/// A node of the object graph that the serializer can inspect.
///
/// Implementations only need to hand out their static [`TypeInfo`]; the
/// properties, converter and serializer hint all live there. Use
/// [`impl_reflect!`](crate::impl_reflect) for types implementing
/// [`Typed`](crate::info::Typed).
///
/// Graph nodes are shared through `Rc<dyn Reflect>`. Two nodes are the same
/// instance when their data pointers are equal, see [`same_instance`].
pub trait Reflect: Any {
    /// Returns the metadata of the concrete type.
    fn reflect_type_info(&self) -> &'static TypeInfo;
}

impl dyn Reflect {
    /// Returns the [`TypeId`] of the concrete type behind the trait object.
    #[inline]
    pub fn ty_id(&self) -> TypeId {
        (self as &dyn Any).type_id()
    }

    /// Returns `true` if the concrete type is `T`.
    #[inline]
    pub fn is<T: Reflect>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }

    /// Downcasts to the concrete type.
    #[inline]
    pub fn downcast_ref<T: Reflect>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }

    /// Downcasts a shared node, handing the original back on mismatch.
    pub fn downcast_rc<T: Reflect>(this: Rc<Self>) -> Result<Rc<T>, Rc<Self>> {
        if this.is::<T>() {
            let any: Rc<dyn Any> = this;
            match any.downcast::<T>() {
                Ok(concrete) => Ok(concrete),
                // `is` just said yes.
                Err(_) => unreachable!(),
            }
        } else {
            Err(this)
        }
    }
}

impl fmt::Debug for dyn Reflect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:p}", self.reflect_type_info().name(), self)
    }
}

/// Reference identity of two graph nodes.
///
/// Only the data pointer is compared, so two `Rc<dyn Reflect>` created from
/// the same allocation through different vtables still count as one node.
#[inline]
pub fn same_instance(a: &Rc<dyn Reflect>, b: &Rc<dyn Reflect>) -> bool {
    core::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Implements [`Reflect`] for a type that implements [`Typed`](crate::info::Typed).
///
/// ```
/// use xps_reflect::impl_reflect;
/// use xps_reflect::info::{TypeInfo, TypeInfoCell, Typed};
///
/// struct Marker;
///
/// impl Typed for Marker {
///     fn type_info() -> &'static TypeInfo {
///         static CELL: TypeInfoCell = TypeInfoCell::new();
///         CELL.get_or_init(|| TypeInfo::builder::<Marker>().build())
///     }
/// }
///
/// impl_reflect!(Marker);
///
/// assert_eq!(Marker::type_info().name(), "Marker");
/// ```
#[macro_export]
macro_rules! impl_reflect {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ::xps_reflect::Reflect for $ty {
                #[inline]
                fn reflect_type_info(&self) -> &'static ::xps_reflect::info::TypeInfo {
                    <Self as ::xps_reflect::info::Typed>::type_info()
                }
            }
        )+
    };
}

// -----------------------------------------------------------------------------
// TypeName

/// A type handed around as a property value.
///
/// Serialized as `{TypeOf Name}`, where `Name` drops every namespace or
/// module qualifier of the stored path.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeName(&'static str);

impl TypeName {
    /// Wraps an already qualified path such as `N.S.MyType`.
    #[inline]
    pub const fn new(path: &'static str) -> Self {
        Self(path)
    }

    /// The Rust path of `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(core::any::type_name::<T>())
    }

    /// The full path.
    #[inline]
    pub const fn path(&self) -> &'static str {
        self.0
    }

    /// The path with its generic arguments and every `.` or `::` qualifier
    /// removed.
    ///
    /// ```
    /// use xps_reflect::TypeName;
    ///
    /// assert_eq!(TypeName::new("N.S.MyType").short_name(), "MyType");
    /// assert_eq!(TypeName::new("crate::page::FixedPage").short_name(), "FixedPage");
    /// assert_eq!(TypeName::new("Plain").short_name(), "Plain");
    /// ```
    pub fn short_name(&self) -> &'static str {
        let path = match self.0.find('<') {
            Some(index) => &self.0[..index],
            None => self.0,
        };
        match path.rfind(['.', ':']) {
            Some(index) => &path[index + 1..],
            None => path,
        }
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

// -----------------------------------------------------------------------------
// Value

/// The value of a property, as produced by its getter.
///
/// `Unset` is the sentinel a dependency property answers when no value was
/// ever assigned; such values are never written. `Null` is an explicit absence
/// and is written as a sentinel string for plain properties.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Unset,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Cow<'static, str>),
    Type(TypeName),
    Object(Rc<dyn Reflect>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` for [`Value::Unset`].
    #[inline]
    pub const fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    /// Returns the graph node, if this value holds one.
    #[inline]
    pub fn as_object(&self) -> Option<&Rc<dyn Reflect>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Wraps a shared node.
    #[inline]
    pub fn object<T: Reflect>(value: Rc<T>) -> Self {
        Value::Object(value)
    }

    /// A short description of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Unset => "unset",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Type(_) => "type",
            Value::Object(object) => object.reflect_type_info().name(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Unset, Value::Unset) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => same_instance(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Unset => f.write_str("Unset"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::String(v) => write!(f, "String({v:?})"),
            Value::Type(v) => write!(f, "Type({v:?})"),
            Value::Object(v) => write!(f, "Object({v:?})"),
        }
    }
}

macro_rules! impl_value_from {
    ($variant:ident: $($ty:ty => $conv:expr),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                #[inline]
                fn from(value: $ty) -> Self {
                    #[allow(clippy::redundant_closure_call)]
                    Value::$variant(($conv)(value))
                }
            }
        )+
    };
}

impl_value_from!(Bool: bool => |v| v);
impl_value_from!(Int: i32 => i64::from, i64 => |v| v, u32 => i64::from, u16 => i64::from, u8 => i64::from);
impl_value_from!(Float: f64 => |v| v, f32 => f64::from);
impl_value_from!(String: &'static str => Cow::Borrowed, String => Cow::Owned);
impl_value_from!(Type: TypeName => |v| v);

impl<T: Into<Value>> From<Option<T>> for Value {
    #[inline]
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;

    use super::*;
    use crate::info::{TypeInfo, TypeInfoCell, Typed};

    struct Node;

    impl Typed for Node {
        fn type_info() -> &'static TypeInfo {
            static CELL: TypeInfoCell = TypeInfoCell::new();
            CELL.get_or_init(|| TypeInfo::builder::<Node>().build())
        }
    }

    crate::impl_reflect!(Node);

    #[test]
    fn identity_not_equality() {
        let a: Rc<dyn Reflect> = Rc::new(Node);
        let b: Rc<dyn Reflect> = Rc::new(Node);
        assert!(same_instance(&a, &a.clone()));
        assert!(!same_instance(&a, &b));
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn downcast_rc_round_trips() {
        let node: Rc<dyn Reflect> = Rc::new(Node);
        assert!(node.is::<Node>());
        assert!(<dyn Reflect>::downcast_rc::<Node>(node).is_ok());
    }

    #[test]
    fn numeric_equality_across_kinds() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_ne!(Value::from(1), Value::from("1"));
        assert_ne!(Value::Null, Value::Unset);
        assert_eq!(Value::from(None::<i32>), Value::Null);
    }

    #[test]
    fn short_name_ignores_generic_arguments() {
        assert_eq!(TypeName::new("a::B<c::D>").short_name(), "B");
        assert_eq!(TypeName::new("N.S.List<N.S.Item>").short_name(), "List");
        assert_eq!(TypeName::of::<alloc::vec::Vec<u8>>().short_name(), "Vec");
        assert_eq!(TypeName::new("N.S.MyType").short_name(), "MyType");
    }
}
