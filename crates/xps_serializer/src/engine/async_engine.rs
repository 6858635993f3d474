use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::rc::Rc;
use core::cell::{Cell, RefCell};
use core::fmt;

use xps_reflect::Reflect;
use xps_task::Dispatcher;

use super::OperationStack;
use crate::events::SerializationCompletedEventArgs;
use crate::model::Visual;
use crate::{Result, SerializationError, SerializationManager};

// -----------------------------------------------------------------------------
// EngineState

/// Where an [`AsyncSerializationManager`] is in its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// No session was started yet.
    #[default]
    Idle,
    /// A session is running, one step per tick.
    Stepping,
    Completed,
    Faulted,
    Canceled,
}

impl EngineState {
    /// Returns `true` if a new session may start.
    #[inline]
    pub fn is_finished(self) -> bool {
        self != Self::Stepping
    }
}

// -----------------------------------------------------------------------------
// AsyncSerializationManager

enum BatchOperation {
    Write(Rc<Visual>),
    Commit,
}

type CompletedHandler = Box<dyn Fn(&SerializationCompletedEventArgs)>;

struct Inner {
    manager: SerializationManager,
    dispatcher: Dispatcher,
    stack: RefCell<OperationStack>,
    batch: RefCell<VecDeque<BatchOperation>>,
    batch_mode: Cell<bool>,
    batch_in_progress: Cell<bool>,
    committing: Cell<bool>,
    canceled: Cell<bool>,
    state: Cell<EngineState>,
    tick_posted: Cell<bool>,
    /// A failed step, reported by the tick after the one that ran it.
    fault: RefCell<Option<SerializationError>>,
    on_completed: RefCell<Option<CompletedHandler>>,
    last_completion: RefCell<Option<SerializationCompletedEventArgs>>,
}

/// Runs sessions of a [`SerializationManager`] on a [`Dispatcher`], one step
/// per tick.
///
/// Requests return immediately; the work happens as the dispatcher is ticked
/// and the outcome is reported to the [`on_completed`](Self::on_completed)
/// handler. Work posted to the same dispatcher by others runs in between
/// steps.
///
/// ```
/// use std::rc::Rc;
/// use xps_serializer::{AsyncSerializationManager, EngineState, SerializationManager};
/// use xps_serializer::model::FixedPage;
/// use xps_serializer::packaging::InMemoryPackage;
/// use xps_task::Dispatcher;
///
/// let package = InMemoryPackage::new();
/// let dispatcher = Dispatcher::new();
/// let engine = AsyncSerializationManager::new(SerializationManager::new(package.clone()), dispatcher.clone());
///
/// engine.save_as_xaml(Rc::new(FixedPage::default())).unwrap();
/// assert_eq!(engine.state(), EngineState::Stepping);
/// assert!(!package.is_committed());
///
/// assert!(engine.drain());
/// assert_eq!(engine.state(), EngineState::Completed);
/// assert!(package.is_committed());
/// ```
#[derive(Clone)]
pub struct AsyncSerializationManager {
    inner: Rc<Inner>,
}

impl AsyncSerializationManager {
    pub fn new(manager: SerializationManager, dispatcher: Dispatcher) -> Self {
        Self {
            inner: Rc::new(Inner {
                manager,
                dispatcher,
                stack: RefCell::new(OperationStack::new()),
                batch: RefCell::new(VecDeque::new()),
                batch_mode: Cell::new(false),
                batch_in_progress: Cell::new(false),
                committing: Cell::new(false),
                canceled: Cell::new(false),
                state: Cell::new(EngineState::Idle),
                tick_posted: Cell::new(false),
                fault: RefCell::new(None),
                on_completed: RefCell::new(None),
                last_completion: RefCell::new(None),
            }),
        }
    }

    #[inline]
    pub fn manager(&self) -> &SerializationManager {
        &self.inner.manager
    }

    #[inline]
    pub fn state(&self) -> EngineState {
        self.inner.state.get()
    }

    /// Returns `true` while a queued write or the commit is being stepped.
    #[inline]
    pub fn batch_in_progress(&self) -> bool {
        self.inner.batch_in_progress.get()
    }

    /// The outcome of the last finished session.
    pub fn last_completion(&self) -> Option<SerializationCompletedEventArgs> {
        self.inner.last_completion.borrow().clone()
    }

    /// Sets the handler told about the end of every session.
    pub fn on_completed(&self, f: impl Fn(&SerializationCompletedEventArgs) + 'static) {
        *self.inner.on_completed.borrow_mut() = Some(Box::new(f));
    }

    /// Starts serializing `target` and returns without running any step.
    ///
    /// Fails with [`SerializationError::Busy`] if a session is running.
    pub fn save_as_xaml(&self, target: Rc<dyn Reflect>) -> Result<()> {
        let inner = &self.inner;
        inner.manager.begin_session()?;
        let operations = match inner.manager.root_operations(target) {
            Ok(operations) => operations,
            Err(error) => {
                inner.manager.end_session(Some(&error));
                return Err(error);
            }
        };

        inner.start(false);
        inner.stack.borrow_mut().push_all(operations);
        Inner::schedule(inner);
        Ok(())
    }

    /// Queues `visual` as the next page of a batch, starting the batch if
    /// needed.
    pub fn write(&self, visual: Rc<Visual>) -> Result<()> {
        self.enqueue(BatchOperation::Write(visual))
    }

    /// Queues the end of the batch. The session completes once every queued
    /// page and the commit have run.
    pub fn commit(&self) -> Result<()> {
        self.enqueue(BatchOperation::Commit)
    }

    fn enqueue(&self, operation: BatchOperation) -> Result<()> {
        let inner = &self.inner;
        if inner.state.get() == EngineState::Stepping {
            if !inner.batch_mode.get() || inner.committing.get() {
                return Err(SerializationError::Busy);
            }
        } else {
            inner.manager.begin_session()?;
            inner.start(true);
        }

        if matches!(operation, BatchOperation::Commit) {
            inner.committing.set(true);
        }
        inner.batch.borrow_mut().push_back(operation);
        Inner::schedule(inner);
        Ok(())
    }

    /// Requests cancellation. It takes effect at the next tick; the step
    /// running now, if any, completes.
    pub fn cancel(&self) {
        let inner = &self.inner;
        if inner.state.get() != EngineState::Stepping {
            log::warn!("cancel requested while no session is running");
            return;
        }
        inner.canceled.set(true);
        Inner::schedule(inner);
    }

    /// Ticks the dispatcher until the operation stack and the batch queue are
    /// empty and no step is pending.
    ///
    /// Returns `false` if the dispatcher ran dry first. A batch waiting for
    /// more writes counts as drained.
    pub fn drain(&self) -> bool {
        let inner = &self.inner;
        inner.dispatcher.run_until(|| inner.is_drained())
    }
}

impl Inner {
    fn start(&self, batch: bool) {
        self.canceled.set(false);
        self.fault.borrow_mut().take();
        self.batch_mode.set(batch);
        self.batch_in_progress.set(false);
        self.committing.set(false);
        self.state.set(EngineState::Stepping);
    }

    fn is_drained(&self) -> bool {
        !self.tick_posted.get() && self.stack.borrow().is_empty() && self.batch.borrow().is_empty()
    }

    /// Posts one tick unless one is already queued.
    fn schedule(this: &Rc<Self>) {
        if this.tick_posted.replace(true) {
            return;
        }
        let weak = Rc::downgrade(this);
        this.dispatcher.post(move || {
            if let Some(inner) = weak.upgrade() {
                Inner::tick(&inner);
            }
        });
    }

    fn tick(this: &Rc<Self>) {
        this.tick_posted.set(false);
        if this.state.get() != EngineState::Stepping {
            return;
        }
        let fault = this.fault.borrow_mut().take();
        if let Some(error) = fault {
            this.complete(false, Some(error));
            return;
        }
        if this.canceled.get() {
            this.complete(true, None);
            return;
        }

        let idle = this.stack.borrow().is_empty();
        if idle && !this.advance() {
            return;
        }

        let operation = this.stack.borrow_mut().pop();
        if let Some(operation) = operation {
            match operation.execute(&this.manager) {
                Ok(scheduled) => this.stack.borrow_mut().push_all(scheduled),
                Err(error) => {
                    log::error!("asynchronous serialization failed: {error}");
                    this.stack.borrow_mut().clear();
                    this.batch.borrow_mut().clear();
                    *this.fault.borrow_mut() = Some(error);
                }
            }
        }
        Self::schedule(this);
    }

    /// Refills the empty stack. Returns `false` when there is nothing to step:
    /// the session completed or a batch waits for more writes.
    fn advance(&self) -> bool {
        self.batch_in_progress.set(false);
        if !self.batch_mode.get() {
            self.complete(false, None);
            return false;
        }

        let next = self.batch.borrow_mut().pop_front();
        let operations = match next {
            Some(BatchOperation::Write(visual)) => self.manager.batch_write_operations(visual),
            Some(BatchOperation::Commit) => self.manager.batch_commit_operations(),
            None if self.committing.get() => {
                self.complete(false, None);
                return false;
            }
            None => return false,
        };
        self.batch_in_progress.set(true);
        self.stack.borrow_mut().push_all(operations);
        true
    }

    fn complete(&self, canceled: bool, error: Option<SerializationError>) {
        self.stack.borrow_mut().clear();
        self.batch.borrow_mut().clear();
        self.batch_mode.set(false);
        self.batch_in_progress.set(false);
        self.committing.set(false);
        self.manager.end_session(error.as_ref());

        self.state.set(match (&error, canceled) {
            (Some(_), _) => EngineState::Faulted,
            (None, true) => EngineState::Canceled,
            (None, false) => EngineState::Completed,
        });
        let args = SerializationCompletedEventArgs {
            canceled,
            error: error.map(Rc::new),
        };
        *self.last_completion.borrow_mut() = Some(args.clone());

        // The handler may start the next session or replace itself.
        let handler = self.on_completed.borrow_mut().take();
        if let Some(handler) = handler {
            handler(&args);
            let mut slot = self.on_completed.borrow_mut();
            if slot.is_none() {
                *slot = Some(handler);
            }
        }
    }
}

impl fmt::Debug for AsyncSerializationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = &self.inner;
        f.debug_struct("AsyncSerializationManager")
            .field("state", &inner.state.get())
            .field("pending", &inner.stack.borrow().len())
            .field("batch", &inner.batch.borrow().len())
            .field("canceled", &inner.canceled.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FixedPage;
    use crate::packaging::InMemoryPackage;
    use crate::testing::{RecordingVisualService, named, sample_sequence};

    fn engine(package: &InMemoryPackage) -> (AsyncSerializationManager, Dispatcher) {
        let dispatcher = Dispatcher::new();
        let engine = AsyncSerializationManager::new(SerializationManager::new(package.clone()), dispatcher.clone());
        (engine, dispatcher)
    }

    fn count_completions(engine: &AsyncSerializationManager) -> Rc<Cell<usize>> {
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        engine.on_completed(move |_| seen.set(seen.get() + 1));
        count
    }

    #[test]
    fn stepping_matches_the_synchronous_output() {
        let expected = InMemoryPackage::new();
        SerializationManager::new(expected.clone())
            .serialize_object(sample_sequence())
            .unwrap();

        let package = InMemoryPackage::new();
        let (engine, dispatcher) = engine(&package);
        let completions = count_completions(&engine);
        engine.save_as_xaml(sample_sequence()).unwrap();
        assert!(package.events().is_empty());

        let noise = Rc::new(Cell::new(0));
        for _ in 0..50 {
            let noise = noise.clone();
            dispatcher.post(move || noise.set(noise.get() + 1));
        }

        assert!(dispatcher.try_tick());
        assert_eq!(engine.state(), EngineState::Stepping);
        assert!(!package.is_committed());

        assert!(engine.drain());
        assert_eq!(engine.state(), EngineState::Completed);
        assert_eq!(package.events(), expected.events());
        assert_eq!(package.parts(), expected.parts());
        assert!(package.is_committed());
        assert_eq!(completions.get(), 1);
        assert!(engine.last_completion().unwrap().is_success());
        assert!(!engine.manager().is_busy());

        dispatcher.run_until_idle();
        assert_eq!(noise.get(), 50);
    }

    #[test]
    fn requests_during_a_session_are_busy() {
        let package = InMemoryPackage::new();
        let (engine, _dispatcher) = engine(&package);
        engine.save_as_xaml(Rc::new(FixedPage::default())).unwrap();

        assert!(matches!(
            engine.save_as_xaml(Rc::new(FixedPage::default())),
            Err(SerializationError::Busy)
        ));
        assert!(matches!(
            engine.manager().serialize_object(Rc::new(FixedPage::default())),
            Err(SerializationError::Busy)
        ));
        assert!(matches!(engine.write(Rc::new(Visual::canvas())), Err(SerializationError::Busy)));

        assert!(engine.drain());
        assert_eq!(engine.state(), EngineState::Completed);
    }

    #[test]
    fn batch_writes_then_commits() {
        let service = RecordingVisualService::default();
        let package = InMemoryPackage::new();
        let dispatcher = Dispatcher::new();
        let manager = SerializationManager::builder(package.clone())
            .visual_service(service.clone())
            .build();
        let engine = AsyncSerializationManager::new(manager, dispatcher.clone());
        let completions = count_completions(&engine);

        for name in ["p0", "p1", "p2"] {
            engine.write(Rc::new(named(name))).unwrap();
        }
        assert!(!engine.batch_in_progress());
        engine.commit().unwrap();
        assert!(matches!(engine.write(Rc::new(named("late"))), Err(SerializationError::Busy)));

        assert!(dispatcher.try_tick());
        assert!(engine.batch_in_progress());

        assert!(engine.drain());
        assert_eq!(engine.state(), EngineState::Completed);
        assert!(!engine.batch_in_progress());
        assert_eq!(package.committed_pages().len(), 3);
        assert!(package.is_committed());
        assert_eq!(
            *service.log.borrow(),
            [
                "acquire", "start p0", "end", "release", "acquire", "start p1", "end", "release", "acquire",
                "start p2", "end", "release",
            ]
        );
        assert_eq!(completions.get(), 1);
    }

    #[test]
    fn batch_waits_for_the_commit() {
        let package = InMemoryPackage::new();
        let (engine, _dispatcher) = engine(&package);

        engine.write(Rc::new(Visual::canvas())).unwrap();
        assert!(engine.drain());
        assert_eq!(engine.state(), EngineState::Stepping);
        assert_eq!(package.committed_pages().len(), 1);
        assert!(!package.is_committed());

        engine.write(Rc::new(Visual::canvas())).unwrap();
        engine.commit().unwrap();
        assert!(engine.drain());
        assert_eq!(engine.state(), EngineState::Completed);
        assert_eq!(package.committed_pages().len(), 2);
        assert!(package.is_committed());
    }

    #[test]
    fn cancel_stops_at_the_next_tick() {
        let package = InMemoryPackage::new();
        let (engine, dispatcher) = engine(&package);
        let completions = count_completions(&engine);
        engine.save_as_xaml(sample_sequence()).unwrap();

        for _ in 0..3 {
            assert!(dispatcher.try_tick());
        }
        engine.cancel();
        assert_eq!(engine.state(), EngineState::Stepping);

        assert!(engine.drain());
        assert_eq!(engine.state(), EngineState::Canceled);
        let completion = engine.last_completion().unwrap();
        assert!(completion.canceled);
        assert!(completion.error.is_none());
        assert!(!package.is_committed());
        assert!(!engine.manager().is_busy());
        assert_eq!(completions.get(), 1);

        engine.cancel();
        assert_eq!(engine.state(), EngineState::Canceled);
        assert_eq!(completions.get(), 1);
    }

    #[test]
    fn failing_step_faults_the_session() {
        let looped = Rc::new(named("loop"));
        looped.add_child(looped.clone());
        let page = Rc::new(FixedPage::default());
        page.add_child(looped);

        let package = InMemoryPackage::new();
        let (engine, _dispatcher) = engine(&package);
        let completions = count_completions(&engine);
        engine.save_as_xaml(page).unwrap();

        assert!(engine.drain());
        assert_eq!(engine.state(), EngineState::Faulted);
        let completion = engine.last_completion().unwrap();
        assert!(!completion.canceled);
        assert!(matches!(
            completion.error.as_deref(),
            Some(SerializationError::CycleDetected { type_name: "Visual" })
        ));
        assert!(!package.is_committed());
        assert!(!engine.manager().is_busy());
        assert_eq!(completions.get(), 1);
    }

    #[test]
    fn fault_is_reported_on_a_later_tick() {
        let looped = Rc::new(named("loop"));
        looped.add_child(looped.clone());
        let page = Rc::new(FixedPage::default());
        page.add_child(looped);

        let package = InMemoryPackage::new();
        let (engine, dispatcher) = engine(&package);
        let completions = count_completions(&engine);
        engine.save_as_xaml(page).unwrap();

        let mut pending_ticks = 0;
        while completions.get() == 0 {
            assert!(dispatcher.try_tick());
            if engine.inner.fault.borrow().is_some() {
                pending_ticks += 1;
                assert_eq!(completions.get(), 0);
                assert_eq!(engine.state(), EngineState::Stepping);
                assert!(engine.manager().is_busy());
            }
        }
        assert_eq!(pending_ticks, 1);
        assert_eq!(engine.state(), EngineState::Faulted);
        assert!(!engine.manager().is_busy());
        assert!(dispatcher.is_idle());
    }
}
