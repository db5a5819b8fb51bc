//! Batched state-update scheduling.
//!
//! Two queues, owned together: pending state changes in call order, and the
//! distinct components needing a re-render in first-enqueued order. The
//! first change landing in an empty queue asks the platform for one
//! deferred flush; everything else enqueued in the same turn joins that
//! batch.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::component::{ComponentHandle, StateChange};
use crate::platform::FlushScheduler;

struct SchedulerInner {
    flusher: Arc<dyn FlushScheduler>,
    state_queue: RefCell<VecDeque<(StateChange, ComponentHandle)>>,
    render_queue: RefCell<VecDeque<ComponentHandle>>,
    flushing: Cell<bool>,
}

impl SchedulerInner {
    fn enqueue(&self, change: StateChange, component: ComponentHandle) {
        let was_empty = self.state_queue.borrow().is_empty();
        self.state_queue.borrow_mut().push_back((change, component.clone()));
        {
            let mut renders = self.render_queue.borrow_mut();
            if !renders.iter().any(|queued| queued.same_instance(&component)) {
                renders.push_back(component);
            }
        }
        // During a flush the running drain loop picks this up; asking the
        // platform again would schedule a redundant empty flush.
        if was_empty && !self.flushing.get() {
            self.flusher.schedule_flush();
        }
    }

    fn pop_state_change(&self) -> Option<(StateChange, ComponentHandle)> {
        self.state_queue.borrow_mut().pop_front()
    }

    fn pop_render(&self) -> Option<ComponentHandle> {
        self.render_queue.borrow_mut().pop_front()
    }

    fn has_pending(&self) -> bool {
        !self.state_queue.borrow().is_empty() || !self.render_queue.borrow().is_empty()
    }
}

/// Owns the update queues. One per reconciler; never process-global, so
/// independent engines can coexist (and be tested) in one process.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(flusher: Arc<dyn FlushScheduler>) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                flusher,
                state_queue: RefCell::new(VecDeque::new()),
                render_queue: RefCell::new(VecDeque::new()),
                flushing: Cell::new(false),
            }),
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle(Rc::downgrade(&self.inner))
    }

    pub fn has_pending(&self) -> bool {
        self.inner.has_pending()
    }

    pub(crate) fn pop_state_change(&self) -> Option<(StateChange, ComponentHandle)> {
        self.inner.pop_state_change()
    }

    pub(crate) fn pop_render(&self) -> Option<ComponentHandle> {
        self.inner.pop_render()
    }

    pub(crate) fn begin_flush(&self) {
        self.inner.flushing.set(true);
    }

    pub(crate) fn end_flush(&self) {
        self.inner.flushing.set(false);
    }
}

/// Weak handle held by component instances; enqueueing after the scheduler
/// is gone is a silent no-op.
#[derive(Clone)]
pub struct SchedulerHandle(Weak<SchedulerInner>);

impl SchedulerHandle {
    pub fn enqueue(&self, change: StateChange, component: ComponentHandle) {
        if let Some(inner) = self.0.upgrade() {
            inner.enqueue(change, component);
        }
    }

    pub fn has_pending(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.has_pending())
            .unwrap_or(false)
    }
}

/// No-op platform: the embedder polls and flushes on its own cadence.
#[derive(Default)]
pub struct DefaultScheduler;

impl FlushScheduler for DefaultScheduler {
    fn schedule_flush(&self) {}
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::component::{Component, ComponentScope, ComponentSpec};
    use crate::vnode::VNode;

    #[derive(Default)]
    struct CountingFlusher {
        requests: AtomicUsize,
    }

    impl FlushScheduler for CountingFlusher {
        fn schedule_flush(&self) {
            self.requests.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Plain;

    impl Component for Plain {
        fn render(&self, _scope: &ComponentScope) -> VNode {
            VNode::empty()
        }
    }

    fn component_for(scheduler: &Scheduler) -> ComponentHandle {
        ComponentHandle::new(ComponentSpec::of::<Plain>(), scheduler.handle())
    }

    #[test]
    fn first_enqueue_schedules_exactly_one_flush() {
        let flusher = Arc::new(CountingFlusher::default());
        let scheduler = Scheduler::new(flusher.clone());
        let component = component_for(&scheduler);

        component.set_state(StateChange::set("a", 1));
        component.set_state(StateChange::set("b", 2));
        assert_eq!(flusher.requests.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn render_queue_deduplicates_by_instance() {
        let scheduler = Scheduler::new(Arc::new(DefaultScheduler));
        let component = component_for(&scheduler);

        component.set_state(StateChange::set("a", 1));
        component.set_state(StateChange::set("a", 2));

        assert!(scheduler.pop_render().is_some());
        assert!(scheduler.pop_render().is_none());
        assert!(scheduler.pop_state_change().is_some());
        assert!(scheduler.pop_state_change().is_some());
        assert!(scheduler.pop_state_change().is_none());
    }

    #[test]
    fn state_changes_drain_in_call_order() {
        let scheduler = Scheduler::new(Arc::new(DefaultScheduler));
        let component = component_for(&scheduler);

        component.set_state(StateChange::set("step", 1));
        component.set_state(StateChange::set("step", 2));

        let (first, _) = scheduler.pop_state_change().expect("first change");
        let (second, _) = scheduler.pop_state_change().expect("second change");
        let value_of = |change: &StateChange| match change {
            StateChange::Apply(partial) => partial.get("step").cloned(),
            StateChange::With(_) => None,
        };
        assert_eq!(value_of(&first), Some(crate::vnode::PropValue::from(1)));
        assert_eq!(value_of(&second), Some(crate::vnode::PropValue::from(2)));
    }
}
