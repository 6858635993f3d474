use alloc::collections::VecDeque;
use alloc::sync::{Arc, Weak};
use core::fmt;
use core::future::{Future, poll_fn};
use core::task::{Poll, Waker};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_task::{Runnable, Task};
use futures_lite::FutureExt;

// -----------------------------------------------------------------------------
// Dispatcher

/// A single-threaded, cooperative task queue.
///
/// Spawned futures and posted closures run strictly one at a time and in FIFO
/// order, only when the owner calls [`try_tick`](Self::try_tick),
/// [`run_until_idle`](Self::run_until_idle) or awaits [`run`](Self::run).
/// A task that wakes itself goes to the back of the queue, behind work that
/// was posted in the meantime.
///
/// The handle is cheap to clone. Tasks are `!Send` and must be driven on the
/// thread that spawned them.
#[derive(Clone, Default)]
pub struct Dispatcher {
    state: Arc<State>,
}

#[derive(Default)]
struct State {
    queue: Mutex<VecDeque<Runnable>>,
    waker: Mutex<Option<Waker>>,
}

impl State {
    fn queue(&self) -> MutexGuard<'_, VecDeque<Runnable>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule(&self, runnable: Runnable) {
        self.queue().push_back(runnable);
        let waker = self.waker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a future onto the dispatcher.
    ///
    /// Nothing is polled until the dispatcher is ticked. Dropping the returned
    /// [`Task`] cancels it; call [`Task::detach`] to let it run on its own.
    pub fn spawn<T: 'static>(&self, future: impl Future<Output = T> + 'static) -> Task<T> {
        let state: Weak<State> = Arc::downgrade(&self.state);

        // A dispatcher that is gone drops the runnable, which cancels the task.
        let schedule = move |runnable: Runnable| {
            if let Some(state) = state.upgrade() {
                state.schedule(runnable);
            }
        };

        let (runnable, task) = async_task::Builder::new()
            .propagate_panic(true)
            .spawn_local(|()| future, schedule);

        runnable.schedule();
        task
    }

    /// Queues a closure behind everything already pending.
    pub fn post(&self, f: impl FnOnce() + 'static) {
        self.spawn(async move { f() }).detach();
    }

    /// Runs one queued item, returning `false` if the queue was empty.
    pub fn try_tick(&self) -> bool {
        // The lock is released before running: the item may post more work.
        let runnable = self.state.queue().pop_front();
        match runnable {
            Some(runnable) => {
                runnable.run();
                true
            }
            None => false,
        }
    }

    /// Number of items waiting to run.
    pub fn pending(&self) -> usize {
        self.state.queue().len()
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Ticks until the queue is empty and returns how many items ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ticks = 0;
        while self.try_tick() {
            ticks += 1;
        }
        ticks
    }

    /// Ticks until `done` returns `true` or the queue runs dry.
    ///
    /// Returns the final answer of `done`.
    pub fn run_until(&self, mut done: impl FnMut() -> bool) -> bool {
        loop {
            if done() {
                return true;
            }
            if !self.try_tick() {
                return done();
            }
        }
    }

    /// Waits for an item and runs it.
    async fn tick(&self) {
        poll_fn(|ctx| {
            {
                let mut waker = self.state.waker.lock().unwrap_or_else(PoisonError::into_inner);
                match &mut *waker {
                    Some(waker) => waker.clone_from(ctx.waker()),
                    None => *waker = Some(ctx.waker().clone()),
                }
            }
            match self.state.queue().pop_front() {
                Some(runnable) => Poll::Ready(runnable),
                None => Poll::Pending,
            }
        })
        .await
        .run();
    }

    /// Keeps running items until `stop_signal` completes.
    ///
    /// The dispatcher's own items are polled first.
    pub async fn run<T>(&self, stop_signal: impl Future<Output = T>) -> T {
        async {
            loop {
                self.tick().await;
            }
        }
        .or(stop_signal)
        .await
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.pending())
            .finish()
    }
}
