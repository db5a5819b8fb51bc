#![doc = r"Core runtime pieces for the graft reconciliation engine.

A [`Reconciler`] takes a lightweight description of desired UI state (a
[`VNode`] tree) and incrementally patches a persistent host tree, reached
through the [`HostTree`] adapter, to match it. Component instances re-render
through the batched update [`Scheduler`]; the deferred flush is delegated to
the platform via [`FlushScheduler`] (see the `graft-runtime-std` crate for
the `std`-backed implementation)."]

pub mod component;
pub mod host;
pub mod platform;
pub mod reconciler;
pub mod scheduler;
pub mod vnode;

pub use component::{
    Component, ComponentHandle, ComponentScope, ComponentSpec, StateChange, StateMap, Updater,
};
pub use host::{apply_attribute, HostNodeId, HostNodeKind, HostTree, MemoryHost};
pub use platform::FlushScheduler;
pub use reconciler::Reconciler;
pub use scheduler::{DefaultScheduler, Scheduler, SchedulerHandle};
pub use vnode::{
    EventHandler, Key, PropValue, Props, RefCallback, StyleEntry, StyleValue, VComponent,
    VElement, VNode,
};

/// Failures a diff pass can surface.
///
/// Detached-node states are not errors (structural host operations guard
/// them into no-ops); these cover malformed virtual nodes and stale host
/// references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    /// A host-node id no longer names a live node.
    NodeMissing { id: HostNodeId },
    /// An element virtual node carried an empty tag.
    EmptyTag,
}

impl std::fmt::Display for DiffError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffError::NodeMissing { id } => write!(f, "host node {id} missing"),
            DiffError::EmptyTag => write!(f, "element virtual node has an empty tag"),
        }
    }
}

impl std::error::Error for DiffError {}
