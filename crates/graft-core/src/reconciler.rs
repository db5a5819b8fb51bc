//! The three cooperating diff strategies.
//!
//! Tree diff decides whether one position keeps its host node; the element
//! diff matches child lists by key or by forward scan; the component diff
//! reuses or replaces instances by descriptor identity. Host-node identity
//! is preserved whenever node kind, tag and (for component anchors)
//! descriptor are unchanged; that is the property that makes a patch
//! minimal.

use std::sync::Arc;

use crate::component::ComponentHandle;
use crate::host::{apply_attribute, HostNodeId, HostNodeKind, HostTree};
use crate::platform::FlushScheduler;
use crate::scheduler::{DefaultScheduler, Scheduler, SchedulerHandle};
use crate::vnode::{Key, Props, VComponent, VElement, VNode};
use crate::DiffError;

type SideTable<V> = hashbrown::HashMap<HostNodeId, V, ahash::RandomState>;
type IdSet = hashbrown::HashSet<HostNodeId, ahash::RandomState>;
type KeyTable = hashbrown::HashMap<Key, HostNodeId, ahash::RandomState>;

/// Patches a host tree to match virtual-node trees, and owns the
/// associations the host tree itself does not carry: which host node
/// anchors which component instance, and which key a child was rendered
/// under. Both are non-owning side tables keyed by node identity.
pub struct Reconciler<H: HostTree> {
    host: H,
    scheduler: Scheduler,
    components: SideTable<ComponentHandle>,
    keys: SideTable<Key>,
}

impl<H: HostTree> Reconciler<H> {
    pub fn new(host: H) -> Self {
        Self::with_scheduler(host, Arc::new(DefaultScheduler))
    }

    pub fn with_scheduler(host: H, flusher: Arc<dyn FlushScheduler>) -> Self {
        Self {
            host,
            scheduler: Scheduler::new(flusher),
            components: SideTable::default(),
            keys: SideTable::default(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn scheduler_handle(&self) -> SchedulerHandle {
        self.scheduler.handle()
    }

    /// Whether any state change or re-render is queued.
    pub fn has_pending_updates(&self) -> bool {
        self.scheduler.has_pending()
    }

    /// Component instance anchored at a host node, if any.
    pub fn component_at(&self, id: HostNodeId) -> Option<ComponentHandle> {
        self.components.get(&id).cloned()
    }

    /// Top-level render entry.
    ///
    /// A container that already has children is diffed against directly
    /// (the update-in-place path); otherwise `existing` is diffed and the
    /// result appended to the container if it is not already there.
    pub fn render(
        &mut self,
        vnode: &VNode,
        container: HostNodeId,
        existing: Option<HostNodeId>,
    ) -> Result<HostNodeId, DiffError> {
        if self.host.kind(container).is_none() {
            return Err(DiffError::NodeMissing { id: container });
        }
        if !self.host.child_nodes(container).is_empty() {
            return self.diff_tree(Some(container), vnode);
        }
        let updated = self.diff_tree(existing, vnode)?;
        if self.host.parent(updated) != Some(container) {
            self.host.append_child(container, updated);
        }
        Ok(updated)
    }

    /// Drains the update queues to empty: state changes in call order, then
    /// one render per distinct queued component, repeating until hooks stop
    /// enqueueing. A component whose render fails does not starve the rest;
    /// the first error is reported once the drain completes.
    pub fn flush(&mut self) -> Result<(), DiffError> {
        self.scheduler.begin_flush();
        let mut affected: Vec<ComponentHandle> = Vec::new();
        let mut first_error = None;
        loop {
            while let Some((change, component)) = self.scheduler.pop_state_change() {
                component.apply_state_change(&change);
                affected.push(component);
            }
            match self.scheduler.pop_render() {
                Some(component) => {
                    if let Err(err) = self.render_component(&component) {
                        log::error!(
                            "render of {} failed: {err}",
                            component.spec().name()
                        );
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                    }
                }
                None => {
                    if !self.scheduler.has_pending() {
                        break;
                    }
                }
            }
        }
        for component in affected {
            component.clear_prev_state();
        }
        self.scheduler.end_flush();
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Diffs one position of the tree, returning the host node that now
    /// renders it. The returned node is the input node exactly when its
    /// kind, tag or anchored descriptor still matches.
    pub fn diff_tree(
        &mut self,
        host_node: Option<HostNodeId>,
        vnode: &VNode,
    ) -> Result<HostNodeId, DiffError> {
        if let Some(id) = host_node {
            if self.host.kind(id).is_none() {
                return Err(DiffError::NodeMissing { id });
            }
        }
        match vnode {
            VNode::Text(text) => Ok(self.diff_text(host_node, text)),
            VNode::Component(component) => self.diff_component(host_node, component),
            VNode::Element(element) => self.diff_element(host_node, element),
        }
    }

    fn diff_text(&mut self, host_node: Option<HostNodeId>, text: &str) -> HostNodeId {
        if let Some(id) = host_node {
            if self.host.kind(id) == Some(HostNodeKind::Text) {
                // Content-only update; identity and position are untouched.
                if self.host.text_content(id).as_deref() != Some(text) {
                    self.host.set_text_content(id, text);
                }
                return id;
            }
        }
        let created = self.host.create_text(text);
        if let Some(old) = host_node {
            if let Some(parent) = self.host.parent(old) {
                self.host.replace_child(parent, created, old);
            }
            self.release_subtree(old);
        }
        created
    }

    fn diff_element(
        &mut self,
        host_node: Option<HostNodeId>,
        element: &VElement,
    ) -> Result<HostNodeId, DiffError> {
        if element.tag.is_empty() {
            return Err(DiffError::EmptyTag);
        }
        let reusable = host_node.is_some_and(|id| {
            self.host
                .tag_name(id)
                .is_some_and(|tag| tag.eq_ignore_ascii_case(&element.tag))
        });

        if let (Some(id), true) = (host_node, reusable) {
            // A parent wrapping exactly one element child stands in for that
            // child: the update-in-place entry diffs a container against the
            // virtual root it holds. A lone text child is diffed through the
            // node itself.
            let child_nodes = self.host.child_nodes(id);
            let target = match child_nodes.as_slice() {
                [only] if self.host.kind(*only) == Some(HostNodeKind::Element) => *only,
                _ => id,
            };
            if !element.props.children().is_empty() {
                self.diff_children(target, element.props.children())?;
            }
            self.diff_props(target, &element.props);
            return Ok(id);
        }

        let created = self.host.create_element(&element.tag);
        if let Some(old) = host_node {
            for child in self.host.child_nodes(old) {
                self.host.append_child(created, child);
            }
            if let Some(parent) = self.host.parent(old) {
                self.host.replace_child(parent, created, old);
            }
            self.release_subtree(old);
        }
        if !element.props.children().is_empty() {
            self.diff_children(created, element.props.children())?;
        }
        self.diff_props(created, &element.props);
        Ok(created)
    }

    /// Patches a parent's child list to match `vchildren`.
    ///
    /// Existing children partition into keyed (matched by key) and unkeyed
    /// (matched by a forward scan from a monotonic cursor, amortized
    /// O(children) when order is mostly stable). Each matched or absent
    /// child recurses through tree diff, then position is fixed up against
    /// the live list. Children neither matched nor produced by the pass are
    /// removed at the end, destroying component instances anchored inside.
    pub fn diff_children(
        &mut self,
        parent: HostNodeId,
        vchildren: &[VNode],
    ) -> Result<(), DiffError> {
        let mut keyed = KeyTable::default();
        let mut unkeyed: Vec<Option<HostNodeId>> = Vec::new();
        for child in self.host.child_nodes(parent) {
            match self.keys.get(&child) {
                Some(key) => {
                    keyed.insert(key.clone(), child);
                }
                None => unkeyed.push(Some(child)),
            }
        }

        let mut min = 0usize;
        let mut live_len = unkeyed.len();
        let mut produced = IdSet::default();
        let mut displaced: Vec<HostNodeId> = Vec::new();

        for (index, vchild) in vchildren.iter().enumerate() {
            let matched = match vchild.key() {
                Some(key) => keyed.remove(key),
                None => {
                    let mut found = None;
                    for slot in min..live_len {
                        let Some(candidate) = unkeyed[slot] else {
                            continue;
                        };
                        if self.is_same_node_type(candidate, vchild) {
                            unkeyed[slot] = None;
                            if slot == live_len - 1 {
                                live_len -= 1;
                            }
                            if slot == min {
                                min += 1;
                            }
                            found = Some(candidate);
                            break;
                        }
                    }
                    found
                }
            };

            let result = self.diff_tree(matched, vchild)?;
            produced.insert(result);
            if let Some(key) = vchild.key() {
                self.keys.insert(result, key.to_owned());
            }

            if result == parent {
                continue;
            }
            let occupant = self.host.child_nodes(parent).get(index).copied();
            if occupant == Some(result) {
                continue;
            }
            match occupant {
                None => self.host.append_child(parent, result),
                Some(occupant) => {
                    if self.host.next_sibling(occupant) == Some(result) {
                        // The result already sits right behind; dropping the
                        // occupant shifts it into place. Detach only: the
                        // occupant may still be matched later in this pass.
                        self.host.remove_child(parent, occupant);
                        displaced.push(occupant);
                    } else {
                        self.host.insert_before(parent, result, occupant);
                    }
                }
            }
        }

        for child in self.host.child_nodes(parent) {
            if !produced.contains(&child) {
                self.remove_subtree(child);
            }
        }
        for orphan in displaced {
            if !produced.contains(&orphan) {
                self.release_subtree(orphan);
            }
        }
        Ok(())
    }

    fn diff_component(
        &mut self,
        host_node: Option<HostNodeId>,
        vnode: &VComponent,
    ) -> Result<HostNodeId, DiffError> {
        let existing = host_node.and_then(|id| self.components.get(&id).cloned());
        let mut old_node = host_node;

        if let Some(component) = &existing {
            if component.spec().matches(&vnode.spec) {
                return self.set_component_props(component, vnode.props.clone());
            }
        }
        if let Some(component) = existing {
            self.unmount_component(&component);
            old_node = None;
        }

        let component = ComponentHandle::new(vnode.spec.clone(), self.scheduler.handle());
        let base = self.set_component_props(&component, vnode.props.clone())?;
        if let Some(old) = old_node {
            if old != base {
                self.components.remove(&old);
                self.remove_subtree(old);
            }
        }
        Ok(base)
    }

    /// Prop-update entry of the component runtime: fires the pre-mount or
    /// incoming-props hook, assigns props, then renders synchronously.
    pub(crate) fn set_component_props(
        &mut self,
        component: &ComponentHandle,
        props: Props,
    ) -> Result<HostNodeId, DiffError> {
        if component.base().is_none() {
            component.will_mount();
        } else {
            component.will_receive_props(&props);
        }
        component.set_props(props);
        self.render_component(component)
    }

    /// Renders one component and reconciles its previous anchor against the
    /// produced tree. Post-mount vs post-update is decided by whether an
    /// anchor pre-existed.
    pub(crate) fn render_component(
        &mut self,
        component: &ComponentHandle,
    ) -> Result<HostNodeId, DiffError> {
        let vnode = component.render_vnode();
        let prev_base = component.base();
        if prev_base.is_some() {
            component.will_update();
        }
        let base = self.diff_tree(prev_base, &vnode)?;
        if let Some(old) = prev_base {
            if old != base {
                self.components.remove(&old);
            }
        }
        component.set_base(Some(base));
        self.components.insert(base, component.clone());
        if prev_base.is_some() {
            component.did_update();
        } else {
            component.did_mount();
        }
        Ok(base)
    }

    /// Removes host attributes absent from the props, then applies props
    /// whose value differs from the current attribute text. Equal values
    /// are left untouched.
    pub fn diff_props(&mut self, id: HostNodeId, props: &Props) {
        let current: Vec<(String, String)> = self
            .host
            .attribute_names(id)
            .into_iter()
            .filter_map(|name| self.host.attribute(id, &name).map(|value| (name, value)))
            .collect();

        for (name, _) in &current {
            if !props.contains(name) {
                apply_attribute(&mut self.host, id, name, None);
            }
        }
        for (name, value) in props.iter() {
            let unchanged = match value.attribute_text() {
                Some(text) => current
                    .iter()
                    .any(|(current_name, current_value)| {
                        current_name == name && *current_value == text
                    }),
                // No attribute rendering to compare against (handlers,
                // styles): always re-apply.
                None => false,
            };
            if !unchanged {
                apply_attribute(&mut self.host, id, name, Some(value));
            }
        }
    }

    fn is_same_node_type(&self, id: HostNodeId, vnode: &VNode) -> bool {
        match vnode {
            VNode::Text(_) => self.host.kind(id) == Some(HostNodeKind::Text),
            VNode::Element(element) => self
                .host
                .tag_name(id)
                .is_some_and(|tag| tag.eq_ignore_ascii_case(&element.tag)),
            VNode::Component(component) => self
                .components
                .get(&id)
                .is_some_and(|existing| existing.spec().matches(&component.spec)),
        }
    }

    fn unmount_component(&mut self, component: &ComponentHandle) {
        component.will_unmount();
        if let Some(base) = component.base() {
            self.components.remove(&base);
            self.remove_subtree(base);
        }
        component.set_base(None);
    }

    /// Detaches a node from its parent (guarded: detached input is a no-op)
    /// and releases everything anchored in the subtree.
    fn remove_subtree(&mut self, id: HostNodeId) {
        if let Some(parent) = self.host.parent(id) {
            self.host.remove_child(parent, id);
        }
        self.release_subtree(id);
    }

    /// Fires pre-unmount hooks outermost-first and drops the side-table
    /// links for a subtree that is leaving the live tree.
    fn release_subtree(&mut self, id: HostNodeId) {
        if let Some(component) = self.components.remove(&id) {
            component.will_unmount();
            component.set_base(None);
        }
        self.keys.remove(&id);
        for child in self.host.child_nodes(id) {
            self.release_subtree(child);
        }
    }
}
