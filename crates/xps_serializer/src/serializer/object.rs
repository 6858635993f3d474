use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use xps_reflect::Value;
use xps_reflect::context::{ContextKey, SerializablePropertyContext};
use xps_reflect::convert::{InvariantConverter, TypeConverter};
use xps_reflect::info::Visibility;

use crate::engine::{Operation, PropertyPass};
use crate::packaging::{PartKind, XmlWriter};
use crate::serializer::page::end_page_attributes;
use crate::serializer::{ReachSerializer, names, property_walk};
use crate::{NULL_STRING, Result, SerializationManager};

/// Writes a node as an element: simple properties become attributes, complex
/// ones child elements.
///
/// A node reached through a plain property is wrapped in a
/// `<Parent.Property>` element; content properties are not. A read-only node
/// is written without its properties.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSerializer;

impl ReachSerializer for ObjectSerializer {
    fn name(&self) -> &'static str {
        names::OBJECT
    }

    fn persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<Vec<Operation>> {
        let (element, declared, is_complex, is_read_only) = manager.context(context, |c| {
            (c.qualified_name(), c.declared_namespace().cloned(), c.is_complex(), c.is_read_only())
        })?;

        let writer = match manager.find_writer(Some(context)) {
            Some(writer) => writer,
            None => {
                let writer = manager.packaging().acquire_xml_writer_for_page()?;
                manager.bind_writer(context, writer.clone(), Some(PartKind::FixedPage));
                writer
            }
        };
        let wrapper = property_element(manager, context)?;

        {
            let mut writer = writer.borrow_mut();
            if let Some(wrapper) = &wrapper {
                writer.write_start_element(wrapper)?;
            }
            writer.write_start_element(&element)?;
            if let Some(declared) = declared {
                writer.write_attribute(&declared.attribute_name(), declared.uri)?;
            }
        }

        if is_complex && !is_read_only {
            Ok(vec![property_walk(context)])
        } else {
            log::trace!("`{element}` is read-only, its properties are not written");
            Ok(Vec::new())
        }
    }

    fn end_persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<()> {
        let writer = manager.nearest_writer(context)?;
        let mut writer = writer.borrow_mut();
        writer.write_end_element()?;
        if property_element(manager, context)?.is_some() {
            writer.write_end_element()?;
        }
        Ok(())
    }
}

/// The `Parent.Property` element wrapping `context`, if it needs one.
fn property_element(manager: &SerializationManager, context: ContextKey) -> Result<Option<String>> {
    let graph = manager.graph();
    let node = graph.context(context)?;
    let (Some(origin), Some(parent)) = (node.origin(), node.parent()) else {
        return Ok(None);
    };
    let parent = graph.context(parent)?;
    let wrapped = parent
        .cache_item()
        .properties()
        .iter()
        .find(|property| property.name() == origin.name)
        .is_some_and(|property| property.visibility() != Visibility::Content);
    Ok(wrapped.then(|| format!("{}.{}", parent.qualified_name(), origin.name)))
}

/// The attribute text of a simple property.
fn attribute_text(property: &SerializablePropertyContext) -> Result<String> {
    let value = property.value();
    let text = match value {
        Value::Null => NULL_STRING.into(),
        Value::Type(name) => format!("{{TypeOf {}}}", name.short_name()),
        _ => match property.converter() {
            Some(converter) => converter.convert_to_invariant_string(value)?,
            None => InvariantConverter.convert_to_invariant_string(value)?,
        },
    };
    Ok(text)
}

/// Handles the next property of `context` in the current pass.
///
/// The attribute pass writes every simple property, closes the attributes of
/// a page opened by `context`, then restarts the cursor for the element pass, which serializes every complex property that has a
/// serializer. Properties without one are skipped.
pub(crate) fn serialize_next_property(
    manager: &SerializationManager,
    context: ContextKey,
    pass: PropertyPass,
) -> Result<Vec<Operation>> {
    let next = manager.graph_mut().context_mut(context)?.properties_mut().next();
    let Some(property) = next else {
        return match pass {
            PropertyPass::Attributes => {
                end_page_attributes(manager, context)?;
                manager.graph_mut().context_mut(context)?.properties_mut().reset();
                Ok(vec![Operation::SerializeNextProperty {
                    context,
                    pass: PropertyPass::Elements,
                }])
            }
            PropertyPass::Elements => Ok(Vec::new()),
        };
    };

    let following = Operation::SerializeNextProperty { context, pass };
    if !property.should_serialize() {
        if pass == PropertyPass::Attributes {
            log::trace!("`{}` has nothing to write", property.name());
        }
        return Ok(vec![following]);
    }

    match (pass, property.is_complex()) {
        (PropertyPass::Attributes, false) => {
            let text = attribute_text(&property)?;
            let writer = manager.nearest_writer(context)?;
            writer.borrow_mut().write_attribute(property.name(), &text)?;
            Ok(vec![following])
        }
        (PropertyPass::Elements, true) => {
            let Some(target) = property.value().as_object().cloned() else {
                return Ok(vec![following]);
            };
            match manager.get_serializer(&*target) {
                Some(serializer) => Ok(vec![
                    Operation::SerializeObject {
                        serializer,
                        target,
                        parent: Some(context),
                        origin: Some(property.origin()),
                    },
                    following,
                ]),
                None => {
                    log::trace!(
                        "no serializer for `{}` of property `{}`, skipped",
                        target.reflect_type_info().name(),
                        property.name()
                    );
                    Ok(vec![following])
                }
            }
        }
        _ => Ok(vec![following]),
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    use xps_reflect::Value;
    use xps_reflect::context::ContextKey;

    use super::ObjectSerializer;
    use crate::engine::Operation;
    use crate::packaging::InMemoryPackage;
    use crate::serializer::ReachSerializer;
    use crate::testing::Widget;
    use crate::{Result, SerializationError, SerializationManager};

    const PAGE: &str = "/Documents/1/Pages/1.fpage";

    fn serialize(widget: Rc<Widget>) -> (InMemoryPackage, Result<()>) {
        let package = InMemoryPackage::new();
        let manager = SerializationManager::new(package.clone());
        let result = manager.serialize_object(widget);
        assert!(!manager.is_busy());
        (package, result)
    }

    #[test]
    fn simple_properties_become_attributes() {
        let root = Widget::new("a");
        root.set_child(Widget::new("b"));

        let (package, result) = serialize(root);
        result.unwrap();
        assert!(package.is_committed());
        assert_eq!(
            package.part(PAGE).unwrap(),
            "<Widget xmlns=\"urn:test:widgets\" Label=\"a\" Kind=\"{TypeOf MyType}\" Note=\"*null\">\
             <Widget.Child><Widget Label=\"b\" Kind=\"{TypeOf MyType}\" Note=\"*null\" Child=\"*null\"/>\
             </Widget.Child></Widget>"
        );
    }

    #[test]
    fn dependency_properties_follow_default_rules() {
        let root = Widget::new("a");
        root.deps.set_value(Widget::TAG, "none");
        root.deps.set_value(Widget::STAMP, Value::Int(0));
        let (package, result) = serialize(root.clone());
        result.unwrap();
        let xml = package.part(PAGE).unwrap();
        assert!(!xml.contains("Tag="), "{xml}");
        assert!(xml.contains("Stamp=\"0\""), "{xml}");
        assert!(!xml.contains("Hidden="), "{xml}");

        root.deps.set_value(Widget::TAG, "x");
        root.deps.clear_value(Widget::STAMP);
        let (package, result) = serialize(root);
        result.unwrap();
        let xml = package.part(PAGE).unwrap();
        assert!(xml.contains("Tag=\"x\""), "{xml}");
        assert!(!xml.contains("Stamp="), "{xml}");
    }

    #[test]
    fn cycle_fails_before_the_second_occurrence() {
        let root = Widget::new("loop");
        let middle = Widget::new("middle");
        middle.set_child(root.clone());
        root.set_child(middle);

        let (package, result) = serialize(root);
        assert!(matches!(
            result,
            Err(SerializationError::CycleDetected { type_name: "Widget" })
        ));
        assert!(!package.is_committed());
    }

    #[test]
    fn equal_but_distinct_nodes_are_not_a_cycle() {
        let root = Widget::new("same");
        let twin = Widget::new("same");
        root.set_child(twin);

        let (_, result) = serialize(root);
        assert!(result.is_ok());
    }

    /// Writes widgets like [`ObjectSerializer`] and records the stack depth
    /// each one sees.
    struct DepthRecorder(Rc<RefCell<Vec<usize>>>);

    impl ReachSerializer for DepthRecorder {
        fn name(&self) -> &'static str {
            "DepthRecorder"
        }

        fn persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<Vec<Operation>> {
            let depth = manager.graph().depth();
            self.0.borrow_mut().push(depth);
            ObjectSerializer.persist_object_data(context, manager)
        }

        fn end_persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<()> {
            ObjectSerializer.end_persist_object_data(context, manager)
        }
    }

    #[test]
    fn graph_stack_unwinds_after_success_and_failure() {
        let depths = Rc::new(RefCell::new(Vec::new()));
        let manager = SerializationManager::builder(InMemoryPackage::new())
            .serializer::<Widget>(DepthRecorder(depths.clone()))
            .build();

        let root = Widget::new("a");
        let middle = Widget::new("b");
        middle.set_child(Widget::new("c"));
        root.set_child(middle);
        manager.serialize_object(root).unwrap();
        assert_eq!(*depths.borrow(), [1, 2, 3]);
        assert_eq!(manager.graph().depth(), 0);
        assert_eq!(manager.graph().live_contexts(), 0);

        depths.borrow_mut().clear();
        let root = Widget::new("loop");
        let middle = Widget::new("middle");
        middle.set_child(root.clone());
        root.set_child(middle);
        let error = manager.serialize_object(root).unwrap_err();
        assert!(matches!(error, SerializationError::CycleDetected { .. }));
        assert_eq!(*depths.borrow(), [1, 2]);
        assert_eq!(manager.graph().depth(), 0);
        assert_eq!(manager.graph().live_contexts(), 0);
        assert!(!manager.is_busy());
    }
}
