//! Component runtime: descriptors, instances and the state entry point.
//!
//! An instance moves Unmounted -> Mounted -> Unmounted. The reconciler
//! drives the transitions; application code only observes them through the
//! lifecycle hooks and mutates state through [`Updater::set_state`].

use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::host::HostNodeId;
use crate::scheduler::SchedulerHandle;
use crate::vnode::{PropValue, Props, VNode};

/// Current state of a mounted component, merged in place across updates.
pub type StateMap = IndexMap<String, PropValue>;

/// One pending state update.
#[derive(Clone)]
pub enum StateChange {
    /// Partial map merged over the current state.
    Apply(StateMap),
    /// Function of the batch-base state and current props, producing a
    /// partial map to merge.
    With(Rc<dyn Fn(&StateMap, &Props) -> StateMap>),
}

impl StateChange {
    /// Single-entry partial update.
    pub fn set(name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        let mut partial = StateMap::new();
        partial.insert(name.into(), value.into());
        StateChange::Apply(partial)
    }

    pub fn merge<N, V>(entries: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<PropValue>,
    {
        StateChange::Apply(
            entries
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }

    pub fn with(update: impl Fn(&StateMap, &Props) -> StateMap + 'static) -> Self {
        StateChange::With(Rc::new(update))
    }
}

impl fmt::Debug for StateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateChange::Apply(partial) => f.debug_tuple("Apply").field(partial).finish(),
            StateChange::With(_) => f.write_str("With(..)"),
        }
    }
}

/// A stateful piece of the tree.
///
/// `render` is required; the hooks default to no-ops so implementors pick
/// the ones they care about. Hooks run synchronously inside the diff pass
/// that triggers them.
pub trait Component: 'static {
    /// Seed for the instance's state map, read once at construction.
    fn initial_state(&self) -> StateMap {
        StateMap::new()
    }

    fn render(&self, scope: &ComponentScope) -> VNode;

    fn will_mount(&mut self, _scope: &ComponentScope) {}
    fn did_mount(&mut self, _scope: &ComponentScope) {}
    fn will_receive_props(&mut self, _scope: &ComponentScope, _next: &Props) {}
    fn will_update(&mut self, _scope: &ComponentScope) {}
    fn did_update(&mut self, _scope: &ComponentScope) {}
    fn will_unmount(&mut self, _scope: &ComponentScope) {}
}

/// Descriptor identifying a component and constructing its instances.
///
/// Two stateful descriptors match when they name the same component type;
/// two stateless descriptors match only when they are clones of the same
/// value. Reconciliation reuses an instance exactly when descriptors match.
#[derive(Clone)]
pub struct ComponentSpec {
    inner: Rc<SpecInner>,
}

enum SpecInner {
    Stateful {
        id: TypeId,
        name: &'static str,
        construct: Box<dyn Fn() -> Box<dyn Component>>,
    },
    Stateless {
        render: Rc<dyn Fn(&Props) -> VNode>,
    },
}

impl ComponentSpec {
    /// Descriptor for a stateful component type.
    pub fn of<C: Component + Default>() -> Self {
        Self {
            inner: Rc::new(SpecInner::Stateful {
                id: TypeId::of::<C>(),
                name: std::any::type_name::<C>(),
                construct: Box::new(|| Box::new(C::default())),
            }),
        }
    }

    /// Descriptor wrapping a render-only function.
    pub fn stateless(render: impl Fn(&Props) -> VNode + 'static) -> Self {
        Self {
            inner: Rc::new(SpecInner::Stateless {
                render: Rc::new(render),
            }),
        }
    }

    pub fn matches(&self, other: &ComponentSpec) -> bool {
        match (&*self.inner, &*other.inner) {
            (SpecInner::Stateful { id: a, .. }, SpecInner::Stateful { id: b, .. }) => a == b,
            (SpecInner::Stateless { render: a }, SpecInner::Stateless { render: b }) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }

    pub fn name(&self) -> &str {
        match &*self.inner {
            SpecInner::Stateful { name, .. } => name,
            SpecInner::Stateless { .. } => "(stateless)",
        }
    }

    fn construct(&self) -> Box<dyn Component> {
        match &*self.inner {
            SpecInner::Stateful { construct, .. } => construct(),
            SpecInner::Stateless { render } => Box::new(FunctionComponent {
                render: render.clone(),
            }),
        }
    }
}

impl fmt::Debug for ComponentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentSpec").field(&self.name()).finish()
    }
}

/// Synthetic instance backing a stateless descriptor: its render just
/// invokes the wrapped function with current props.
struct FunctionComponent {
    render: Rc<dyn Fn(&Props) -> VNode>,
}

impl Component for FunctionComponent {
    fn render(&self, scope: &ComponentScope) -> VNode {
        (self.render)(scope.props())
    }
}

pub(crate) struct InstanceInner {
    object: RefCell<Box<dyn Component>>,
    spec: ComponentSpec,
    props: RefCell<Props>,
    state: RefCell<StateMap>,
    prev_state: RefCell<Option<StateMap>>,
    base: Cell<Option<HostNodeId>>,
    scheduler: SchedulerHandle,
}

/// Shared handle to one live component instance.
#[derive(Clone)]
pub struct ComponentHandle {
    inner: Rc<InstanceInner>,
}

impl ComponentHandle {
    pub(crate) fn new(spec: ComponentSpec, scheduler: SchedulerHandle) -> Self {
        let object = spec.construct();
        let state = object.initial_state();
        Self {
            inner: Rc::new(InstanceInner {
                object: RefCell::new(object),
                spec,
                props: RefCell::new(Props::new()),
                state: RefCell::new(state),
                prev_state: RefCell::new(None),
                base: Cell::new(None),
                scheduler,
            }),
        }
    }

    pub fn spec(&self) -> &ComponentSpec {
        &self.inner.spec
    }

    /// Host node this instance currently anchors, if mounted.
    pub fn base(&self) -> Option<HostNodeId> {
        self.inner.base.get()
    }

    pub(crate) fn set_base(&self, base: Option<HostNodeId>) {
        self.inner.base.set(base);
    }

    pub fn props(&self) -> Props {
        self.inner.props.borrow().clone()
    }

    pub(crate) fn set_props(&self, props: Props) {
        *self.inner.props.borrow_mut() = props;
    }

    pub fn state(&self) -> StateMap {
        self.inner.state.borrow().clone()
    }

    pub fn updater(&self) -> Updater {
        Updater {
            instance: Rc::downgrade(&self.inner),
        }
    }

    pub fn same_instance(&self, other: &ComponentHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Entry point for state updates: partial maps merge into the state
    /// immediately (visible to reads within the same turn), and the change
    /// is queued for a deferred re-render. Functional changes apply only
    /// when the batch flushes, against the batch-base state.
    pub fn set_state(&self, change: StateChange) {
        if let StateChange::Apply(partial) = &change {
            self.inner
                .state
                .borrow_mut()
                .extend(partial.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self.inner.scheduler.enqueue(change, self.clone());
    }

    /// Flush-time application of one queued change, in call order.
    pub(crate) fn apply_state_change(&self, change: &StateChange) {
        if self.inner.prev_state.borrow().is_none() {
            let snapshot = self.inner.state.borrow().clone();
            *self.inner.prev_state.borrow_mut() = Some(snapshot);
        }
        let partial = match change {
            StateChange::Apply(partial) => partial.clone(),
            StateChange::With(update) => {
                let base = self
                    .inner
                    .prev_state
                    .borrow()
                    .clone()
                    .unwrap_or_default();
                let props = self.props();
                // No borrows held here: the updater may call set_state.
                update(&base, &props)
            }
        };
        self.inner.state.borrow_mut().extend(partial);
        let merged = self.inner.state.borrow().clone();
        *self.inner.prev_state.borrow_mut() = Some(merged);
    }

    /// Drops the batch-base snapshot once a flush has fully drained.
    pub(crate) fn clear_prev_state(&self) {
        *self.inner.prev_state.borrow_mut() = None;
    }

    pub(crate) fn scope(&self) -> ComponentScope {
        ComponentScope {
            props: self.props(),
            state: self.state(),
            updater: self.updater(),
        }
    }

    pub(crate) fn render_vnode(&self) -> VNode {
        let scope = self.scope();
        let object = self.inner.object.borrow();
        object.render(&scope)
    }

    pub(crate) fn will_mount(&self) {
        let scope = self.scope();
        self.inner.object.borrow_mut().will_mount(&scope);
    }

    pub(crate) fn did_mount(&self) {
        let scope = self.scope();
        self.inner.object.borrow_mut().did_mount(&scope);
    }

    pub(crate) fn will_receive_props(&self, next: &Props) {
        let scope = self.scope();
        self.inner.object.borrow_mut().will_receive_props(&scope, next);
    }

    pub(crate) fn will_update(&self) {
        let scope = self.scope();
        self.inner.object.borrow_mut().will_update(&scope);
    }

    pub(crate) fn did_update(&self) {
        let scope = self.scope();
        self.inner.object.borrow_mut().did_update(&scope);
    }

    pub(crate) fn will_unmount(&self) {
        let scope = self.scope();
        self.inner.object.borrow_mut().will_unmount(&scope);
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("spec", &self.inner.spec)
            .field("base", &self.inner.base.get())
            .finish()
    }
}

/// What a component sees while rendering or inside a hook: a snapshot of
/// props and state, plus the updater for enqueueing changes.
pub struct ComponentScope {
    props: Props,
    state: StateMap,
    updater: Updater,
}

impl ComponentScope {
    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn state(&self) -> &StateMap {
        &self.state
    }

    pub fn state_value(&self, name: &str) -> Option<&PropValue> {
        self.state.get(name)
    }

    pub fn updater(&self) -> Updater {
        self.updater.clone()
    }

    pub fn set_state(&self, change: StateChange) {
        self.updater.set_state(change);
    }
}

/// Weak handle for enqueueing state changes from handlers and hooks.
/// Calls after the instance is gone are silently dropped.
#[derive(Clone)]
pub struct Updater {
    instance: Weak<InstanceInner>,
}

impl Updater {
    pub fn set_state(&self, change: StateChange) {
        if let Some(inner) = self.instance.upgrade() {
            ComponentHandle { inner }.set_state(change);
        }
    }

    pub fn props(&self) -> Props {
        self.instance
            .upgrade()
            .map(|inner| inner.props.borrow().clone())
            .unwrap_or_default()
    }

    pub fn state(&self) -> StateMap {
        self.instance
            .upgrade()
            .map(|inner| inner.state.borrow().clone())
            .unwrap_or_default()
    }
}
