use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use xps_reflect::context::ContextKey;

use crate::engine::Operation;
use crate::model::Visual;
use crate::serializer::{ReachSerializer, names};
use crate::{Result, SerializationError, SerializationManager};

// -----------------------------------------------------------------------------
// VisualSerializer

/// Hands a visual tree to the flattener of the current page.
///
/// The root is started right away; its descendants are visited one per step
/// by a [`VisualWalk`].
#[derive(Debug, Clone, Copy, Default)]
pub struct VisualSerializer;

impl ReachSerializer for VisualSerializer {
    fn name(&self) -> &'static str {
        names::VISUAL
    }

    fn persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<Vec<Operation>> {
        let visual = manager.target_as::<Visual>(context)?;
        if !manager.with_flattener(|flattener| flattener.start_visual(&visual))? {
            log::trace!("visual skipped by the flattener");
            return Ok(Vec::new());
        }
        Ok(vec![Operation::VisitVisual {
            context,
            walk: VisualWalk::new(visual),
        }])
    }
}

// -----------------------------------------------------------------------------
// VisualWalk

struct Frame {
    visual: Rc<Visual>,
    next: usize,
}

/// Depth-first cursor over a visual tree whose root was already started.
pub struct VisualWalk {
    frames: Vec<Frame>,
}

impl VisualWalk {
    fn new(root: Rc<Visual>) -> Self {
        Self {
            frames: vec![Frame { visual: root, next: 0 }],
        }
    }

    /// Returns `true` once every started node was ended.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.frames.is_empty()
    }

    /// Starts the next child of the innermost node, or ends that node once
    /// all its children were visited. Returns the walk if there is more to do.
    pub(crate) fn step(mut self, manager: &SerializationManager) -> Result<Option<Self>> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(None);
        };

        match frame.visual.child(frame.next) {
            Some(child) => {
                frame.next += 1;
                if self.frames.iter().any(|frame| Rc::ptr_eq(&frame.visual, &child)) {
                    return Err(SerializationError::CycleDetected { type_name: "Visual" });
                }
                if manager.with_flattener(|flattener| flattener.start_visual(&child))? {
                    self.frames.push(Frame { visual: child, next: 0 });
                }
            }
            None => {
                manager.with_flattener(|flattener| flattener.end_visual())?;
                self.frames.pop();
            }
        }

        Ok((!self.is_finished()).then_some(self))
    }
}

impl fmt::Debug for VisualWalk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisualWalk")
            .field("depth", &self.frames.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;

    use crate::packaging::InMemoryPackage;
    use crate::testing::{RecordingVisualService, named};
    use crate::{SerializationError, SerializationManager};

    fn manager(service: &RecordingVisualService) -> SerializationManager {
        SerializationManager::builder(InMemoryPackage::new())
            .visual_service(service.clone())
            .build()
    }

    #[test]
    fn walk_is_depth_first_and_honors_skips() {
        let hidden = named("hidden");
        let root = named("r")
            .with_child(named("a").with_child(named("a1")))
            .with_child(named("skip").with_child(hidden))
            .with_child(named("b"));

        let service = RecordingVisualService::default();
        manager(&service).serialize_object(Rc::new(root)).unwrap();

        assert_eq!(
            *service.log.borrow(),
            [
                "acquire", "start r", "start a", "start a1", "end", "end", "start skip", "start b", "end", "end",
                "release",
            ]
        );
    }

    #[test]
    fn skipped_root_ends_nothing() {
        let service = RecordingVisualService::default();
        let root = named("skip").with_child(named("child"));
        manager(&service).serialize_object(Rc::new(root)).unwrap();
        assert_eq!(*service.log.borrow(), ["acquire", "start skip", "release"]);
    }

    #[test]
    fn visual_cycles_are_detected() {
        let root = Rc::new(named("r"));
        let child = Rc::new(named("c"));
        child.add_child(root.clone());
        root.add_child(child);

        let service = RecordingVisualService::default();
        let manager = manager(&service);
        let error = manager.serialize_object(root).unwrap_err();
        assert!(matches!(error, SerializationError::CycleDetected { type_name: "Visual" }));
        assert!(!manager.is_busy());
    }
}
