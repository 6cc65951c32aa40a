//! Incrementally maintained key partition.
//!
//! A `GroupedView` buckets its source by a key selector. Each bucket is a
//! [`Group`]: a live observable list of the members in source-relative
//! order. The view itself is an observable list of groups, so group
//! arrival and departure are ordinary `Add`/`Remove` events and a group
//! can feed any other view.
//!
//! Groups come in two kinds. Implicit groups materialize when the first
//! item maps to their key and are destroyed when the last member leaves.
//! Explicit groups are pinned by the caller: they exist while empty and
//! survive resets. A container remembers its key and its position inside
//! its group, so membership changes never rescan the partition.
//!
//! All mutation happens while the view state is borrowed; notifications
//! are collected and delivered afterwards, so a handler observing either
//! level always reads settled state.

use crate::container::{apply_change, resolve_index, Applied, Container, ViewSettings};
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::hash::Hash;
use hashbrown::HashMap;
use vitre_core::{ListEvent, Result};
use vitre_reactive::{ObservableList, PropertyCallback, SubscriptionId, SubscriptionManager, ViewItem};

type GroupSubs<T, K> = Rc<RefCell<SubscriptionManager<ListEvent<Group<T, K>>>>>;
type KeyFn<T, K> = Rc<dyn Fn(&T) -> K>;
type EqFn<T> = Rc<dyn Fn(&T, &T) -> bool>;

struct GroupInner<T> {
    items: Vec<T>,
    explicit: bool,
}

/// One bucket of a [`GroupedView`]: a live list of the members sharing a
/// key, in source-relative order.
///
/// Handles are cheap to clone and compare by identity, so a group can be
/// carried as an item through further views.
pub struct Group<T, K> {
    key: Rc<K>,
    inner: Rc<RefCell<GroupInner<T>>>,
    subs: Rc<RefCell<SubscriptionManager<ListEvent<T>>>>,
}

impl<T, K> Group<T, K> {
    fn new(key: K, explicit: bool) -> Self {
        Self {
            key: Rc::new(key),
            inner: Rc::new(RefCell::new(GroupInner {
                items: Vec::new(),
                explicit,
            })),
            subs: Rc::new(RefCell::new(SubscriptionManager::new())),
        }
    }

    /// The key shared by every member of this group.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Whether the group was pinned by the caller.
    ///
    /// Explicit groups persist while empty and across resets; implicit
    /// groups live exactly as long as they have members.
    pub fn is_explicit(&self) -> bool {
        self.inner.borrow().explicit
    }

    fn set_explicit(&self, explicit: bool) {
        self.inner.borrow_mut().explicit = explicit;
    }

    fn insert_silent(&self, index: usize, item: T) {
        self.inner.borrow_mut().items.insert(index, item);
    }

    fn remove_silent(&self, index: usize) -> T {
        self.inner.borrow_mut().items.remove(index)
    }

    fn clear_silent(&self) {
        self.inner.borrow_mut().items.clear();
    }

    fn emit(&self, event: &ListEvent<T>) {
        self.subs.borrow().notify_all(event);
    }
}

impl<T, K> Clone for Group<T, K> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            inner: self.inner.clone(),
            subs: self.subs.clone(),
        }
    }
}

impl<T, K> PartialEq for Group<T, K> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static, K: 'static> ViewItem for Group<T, K> {}

impl<T: Clone + 'static, K: 'static> ObservableList<T> for Group<T, K> {
    fn len(&self) -> usize {
        self.inner.borrow().items.len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.inner.borrow().items.get(index).cloned()
    }

    fn snapshot(&self) -> Vec<T> {
        self.inner.borrow().items.clone()
    }

    fn observe(&self, callback: Box<dyn Fn(&ListEvent<T>)>) -> SubscriptionId {
        self.subs.borrow_mut().subscribe(callback)
    }

    fn unobserve(&self, id: SubscriptionId) -> bool {
        self.subs.borrow_mut().unsubscribe(id)
    }
}

/// A container's derived value: its key and, when grouped, its position
/// inside the group.
pub(crate) struct GroupSlot<K> {
    key: K,
    /// `None` while implicit grouping is off and no explicit group has
    /// this key.
    pos: Option<usize>,
}

/// A pending notification, collected during mutation and delivered after
/// the view state settles.
enum Emission<T, K> {
    Item(Group<T, K>, ListEvent<T>),
    Groups(ListEvent<Group<T, K>>),
}

struct GroupedState<T, K> {
    source: Box<dyn ObservableList<T>>,
    containers: Vec<Container<T, GroupSlot<K>>>,
    /// Groups in creation order; the view's enumeration.
    groups: Vec<Group<T, K>>,
    index_of: HashMap<K, usize>,
    key_of: KeyFn<T, K>,
    include_implicit: bool,
    triggers: Vec<String>,
    eq: EqFn<T>,
    weak_self: Weak<RefCell<GroupedState<T, K>>>,
    weak_subs: Weak<RefCell<SubscriptionManager<ListEvent<Group<T, K>>>>>,
}

impl<T, K> GroupedState<T, K>
where
    T: ViewItem,
    K: Eq + Hash + Clone + 'static,
{
    fn maker(&self) -> impl FnMut(&T, usize) -> Container<T, GroupSlot<K>> {
        let key_of = self.key_of.clone();
        let triggers = self.triggers.clone();
        let weak_self = self.weak_self.clone();
        let weak_subs = self.weak_subs.clone();
        move |item: &T, index: usize| {
            let slot = GroupSlot {
                key: key_of(item),
                pos: None,
            };
            let mut c = Container::new(item.clone(), index, slot);
            if !triggers.is_empty() {
                let weak_self = weak_self.clone();
                let weak_subs = weak_subs.clone();
                let probe = item.clone();
                let callback: PropertyCallback = Rc::new(move |_property| {
                    if let Some(state) = weak_self.upgrade() {
                        let out = state.borrow_mut().on_item_changed(&probe);
                        if let Some(subs) = weak_subs.upgrade() {
                            deliver(&out, &subs);
                        }
                    }
                });
                c.watch = item.watch(&triggers, callback);
            }
            c
        }
    }

    fn group_index(&self, key: &K) -> usize {
        *self
            .index_of
            .get(key)
            .unwrap_or_else(|| panic!("grouped view: key missing from group registry"))
    }

    fn rebuild_index(&mut self, from: usize) {
        for (i, g) in self.groups.iter().enumerate().skip(from) {
            self.index_of.insert(g.key().clone(), i);
        }
    }

    /// Group-local position for the container at `idx`: one past the
    /// nearest earlier member of the same group, since group order mirrors
    /// source order.
    fn local_position(&self, idx: usize, key: &K) -> usize {
        self.containers[..idx]
            .iter()
            .rev()
            .find_map(|c| {
                if c.value.key == *key {
                    c.value.pos.map(|p| p + 1)
                } else {
                    None
                }
            })
            .unwrap_or(0)
    }

    fn shift_members(&mut self, key: &K, threshold: usize, delta: isize) {
        for c in self.containers.iter_mut() {
            if c.value.key == *key {
                if let Some(p) = &mut c.value.pos {
                    if *p >= threshold {
                        *p = (*p as isize + delta) as usize;
                    }
                }
            }
        }
    }

    /// Places the container at `idx` into its group, materializing an
    /// implicit group if needed. `silent` suppresses per-item and
    /// group-arrival emissions (used during reset rebuilds).
    fn assign(&mut self, idx: usize, out: &mut Vec<Emission<T, K>>, silent: bool) {
        let key = self.containers[idx].value.key.clone();
        let gi = match self.index_of.get(&key) {
            Some(&gi) => gi,
            None => {
                if !self.include_implicit {
                    self.containers[idx].value.pos = None;
                    return;
                }
                let group = Group::new(key.clone(), false);
                self.groups.push(group.clone());
                let gi = self.groups.len() - 1;
                self.index_of.insert(key.clone(), gi);
                if !silent {
                    out.push(Emission::Groups(ListEvent::added_at(
                        alloc::vec![group],
                        gi,
                    )));
                }
                gi
            }
        };
        let position = self.local_position(idx, &key);
        self.shift_members(&key, position, 1);
        self.containers[idx].value.pos = Some(position);
        let item = self.containers[idx].item.clone();
        let group = self.groups[gi].clone();
        group.insert_silent(position, item.clone());
        if !silent {
            out.push(Emission::Item(
                group,
                ListEvent::added_at(alloc::vec![item], position),
            ));
        }
    }

    /// Takes the container at `idx` out of its group, destroying an
    /// emptied implicit group.
    fn unassign(&mut self, idx: usize, out: &mut Vec<Emission<T, K>>) {
        let Some(position) = self.containers[idx].value.pos else {
            return;
        };
        let key = self.containers[idx].value.key.clone();
        let gi = self.group_index(&key);
        self.containers[idx].value.pos = None;
        self.shift_members(&key, position + 1, -1);
        let group = self.groups[gi].clone();
        let item = group.remove_silent(position);
        out.push(Emission::Item(
            group.clone(),
            ListEvent::removed_at(alloc::vec![item], position),
        ));
        if !group.is_explicit() && group.inner.borrow().items.is_empty() {
            self.groups.remove(gi);
            self.index_of.remove(&key);
            self.rebuild_index(gi);
            out.push(Emission::Groups(ListEvent::removed_at(
                alloc::vec![group],
                gi,
            )));
        }
    }

    fn on_source_event(&mut self, event: &ListEvent<T>) -> Result<Vec<Emission<T, K>>> {
        let mut out = Vec::new();
        match event {
            ListEvent::Add { items, .. } => {
                if items.is_empty() {
                    return Ok(out);
                }
                let eq = self.eq.clone();
                let mut make = self.maker();
                let applied = apply_change(&mut self.containers, event, &[], &mut make, &*eq)?;
                let Applied::Added { index, count } = applied else {
                    return Ok(out);
                };
                for k in 0..count {
                    self.assign(index + k, &mut out, false);
                }
            }
            ListEvent::Remove { items, index } => {
                if items.is_empty() {
                    return Ok(out);
                }
                let at = resolve_index(&self.containers, &items[0], *index, &*self.eq)?;
                for k in 0..items.len() {
                    self.unassign(at + k, &mut out);
                }
                let eq = self.eq.clone();
                let mut make = self.maker();
                let applied = apply_change(&mut self.containers, event, &[], &mut make, &*eq)?;
                if let Applied::Removed { removed, .. } = applied {
                    for c in removed {
                        c.release();
                    }
                }
            }
            ListEvent::Replace { old, new, index } => {
                if old.is_empty() && new.is_empty() {
                    return Ok(out);
                }
                let at = resolve_index(&self.containers, &old[0], *index, &*self.eq)?;
                for k in 0..old.len() {
                    self.unassign(at + k, &mut out);
                }
                let eq = self.eq.clone();
                let mut make = self.maker();
                let applied = apply_change(&mut self.containers, event, &[], &mut make, &*eq)?;
                let Applied::Replaced { index: at, removed, count } = applied else {
                    return Ok(out);
                };
                for c in removed {
                    c.release();
                }
                for k in 0..count {
                    self.assign(at + k, &mut out, false);
                }
            }
            ListEvent::Move { items, from, to } => {
                if items.is_empty() || from == to {
                    return Ok(out);
                }
                if items.len() == 1 {
                    self.move_single(*from, event, &mut out)?;
                } else {
                    for k in 0..items.len() {
                        self.unassign(from + k, &mut out);
                    }
                    let eq = self.eq.clone();
                    let mut make = self.maker();
                    let applied =
                        apply_change(&mut self.containers, event, &[], &mut make, &*eq)?;
                    let Applied::Moved { to, count, .. } = applied else {
                        return Ok(out);
                    };
                    for k in 0..count {
                        self.assign(to + k, &mut out, false);
                    }
                }
            }
            ListEvent::Reset => {
                let rebuild = self.source.snapshot();
                let eq = self.eq.clone();
                let mut make = self.maker();
                let applied =
                    apply_change(&mut self.containers, event, &rebuild, &mut make, &*eq)?;
                if let Applied::Rebuilt { removed } = applied {
                    for c in removed {
                        c.release();
                    }
                }
                // Implicit groups do not survive a reset; explicit groups
                // persist and refill.
                self.groups.retain(|g| g.is_explicit());
                self.index_of.clear();
                self.rebuild_index(0);
                for g in &self.groups {
                    g.clear_silent();
                }
                for idx in 0..self.containers.len() {
                    self.assign(idx, &mut out, true);
                }
                out.push(Emission::Groups(ListEvent::Reset));
                for g in &self.groups {
                    if g.is_explicit() {
                        out.push(Emission::Item(g.clone(), ListEvent::Reset));
                    }
                }
            }
        }
        Ok(out)
    }

    /// A one-item source move stays inside its group, so it collapses to a
    /// group-local `Move` (or silence) instead of a remove/add pair.
    fn move_single(
        &mut self,
        from: usize,
        event: &ListEvent<T>,
        out: &mut Vec<Emission<T, K>>,
    ) -> Result<()> {
        let old_position = self.containers[from].value.pos;
        let eq = self.eq.clone();
        let mut make = self.maker();
        let applied = apply_change(&mut self.containers, event, &[], &mut make, &*eq)?;
        let Applied::Moved { to, .. } = applied else {
            return Ok(());
        };
        let Some(old_position) = old_position else {
            return Ok(());
        };
        let key = self.containers[to].value.key.clone();
        let gi = self.group_index(&key);
        self.containers[to].value.pos = None;
        self.shift_members(&key, old_position + 1, -1);
        let group = self.groups[gi].clone();
        let item = group.remove_silent(old_position);
        let position = self.local_position(to, &key);
        self.shift_members(&key, position, 1);
        self.containers[to].value.pos = Some(position);
        group.insert_silent(position, item.clone());
        if position != old_position {
            out.push(Emission::Item(
                group,
                ListEvent::moved(alloc::vec![item], old_position, position),
            ));
        }
        Ok(())
    }

    /// Re-buckets one item after a trigger notification changed its key.
    fn on_item_changed(&mut self, probe: &T) -> Vec<Emission<T, K>> {
        let mut out = Vec::new();
        let eq = &self.eq;
        let Some(idx) = self.containers.iter().position(|c| eq(&c.item, probe)) else {
            return out;
        };
        let key = (self.key_of)(&self.containers[idx].item);
        if key == self.containers[idx].value.key {
            return out;
        }
        self.unassign(idx, &mut out);
        self.containers[idx].value.key = key;
        self.assign(idx, &mut out, false);
        out
    }

    fn set_include_implicit(&mut self, include: bool) -> Vec<Emission<T, K>> {
        let mut out = Vec::new();
        if include == self.include_implicit {
            return out;
        }
        self.include_implicit = include;
        if include {
            for idx in 0..self.containers.len() {
                if self.containers[idx].value.pos.is_none() {
                    self.assign(idx, &mut out, false);
                }
            }
        } else {
            while let Some(gi) = self.groups.iter().position(|g| !g.is_explicit()) {
                let group = self.groups.remove(gi);
                self.index_of.remove(&*group.key());
                self.rebuild_index(gi);
                for c in self.containers.iter_mut() {
                    if c.value.key == *group.key() {
                        c.value.pos = None;
                    }
                }
                group.clear_silent();
                out.push(Emission::Groups(ListEvent::removed_at(
                    alloc::vec![group],
                    gi,
                )));
            }
        }
        out
    }

    fn add_explicit_group(&mut self, key: K) -> (Group<T, K>, Vec<Emission<T, K>>) {
        let mut out = Vec::new();
        if let Some(&gi) = self.index_of.get(&key) {
            let group = self.groups[gi].clone();
            group.set_explicit(true);
            return (group, out);
        }
        let group = Group::new(key.clone(), true);
        self.groups.push(group.clone());
        let gi = self.groups.len() - 1;
        self.index_of.insert(key.clone(), gi);
        out.push(Emission::Groups(ListEvent::added_at(
            alloc::vec![group.clone()],
            gi,
        )));
        // Pinning a key while implicit grouping is off adopts the matching
        // items.
        if !self.include_implicit {
            for idx in 0..self.containers.len() {
                if self.containers[idx].value.pos.is_none()
                    && self.containers[idx].value.key == key
                {
                    self.assign(idx, &mut out, false);
                }
            }
        }
        (group, out)
    }

    fn remove_explicit_group(&mut self, key: &K) -> Vec<Emission<T, K>> {
        let mut out = Vec::new();
        let Some(&gi) = self.index_of.get(key) else {
            return out;
        };
        let group = self.groups[gi].clone();
        if !group.is_explicit() {
            return out;
        }
        group.set_explicit(false);
        let empty = group.inner.borrow().items.is_empty();
        if empty || !self.include_implicit {
            for c in self.containers.iter_mut() {
                if c.value.key == *key {
                    c.value.pos = None;
                }
            }
            self.groups.remove(gi);
            self.index_of.remove(key);
            self.rebuild_index(gi);
            group.clear_silent();
            out.push(Emission::Groups(ListEvent::removed_at(
                alloc::vec![group],
                gi,
            )));
        }
        out
    }
}

fn deliver<T, K>(out: &[Emission<T, K>], subs: &GroupSubs<T, K>) {
    for emission in out {
        match emission {
            Emission::Item(group, event) => group.emit(event),
            Emission::Groups(event) => subs.borrow().notify_all(event),
        }
    }
}

/// A live partition of an observable source by a key selector.
///
/// The view enumerates [`Group`]s in creation order. Handles are cheap
/// to clone; the view detaches from its source when the last handle
/// drops.
pub struct GroupedView<T: ViewItem, K> {
    state: Rc<RefCell<GroupedState<T, K>>>,
    subs: GroupSubs<T, K>,
    source_sub: SubscriptionId,
}

impl<T, K> GroupedView<T, K>
where
    T: ViewItem,
    K: Eq + Hash + Clone + 'static,
{
    /// Creates a grouped view with implicit grouping enabled.
    pub fn new<S>(
        source: &S,
        key_of: impl Fn(&T) -> K + 'static,
        settings: ViewSettings<T>,
    ) -> Self
    where
        S: ObservableList<T> + Clone + 'static,
    {
        let subs: GroupSubs<T, K> = Rc::new(RefCell::new(SubscriptionManager::new()));
        let weak_subs = Rc::downgrade(&subs);
        let state = Rc::new_cyclic(|weak_self: &Weak<RefCell<GroupedState<T, K>>>| {
            RefCell::new(GroupedState {
                source: Box::new(source.clone()),
                containers: Vec::new(),
                groups: Vec::new(),
                index_of: HashMap::new(),
                key_of: Rc::new(key_of),
                include_implicit: true,
                triggers: settings.triggers.clone(),
                eq: settings.eq_fn(),
                weak_self: weak_self.clone(),
                weak_subs,
            })
        });

        // Initial load; nothing is observing yet, so emissions are dropped.
        state
            .borrow_mut()
            .on_source_event(&ListEvent::Reset)
            .expect("initial load cannot fail");

        let weak_state = Rc::downgrade(&state);
        let weak_subs = Rc::downgrade(&subs);
        let source_sub = source.observe(Box::new(move |event| {
            if let Some(state) = weak_state.upgrade() {
                let out = state
                    .borrow_mut()
                    .on_source_event(event)
                    .unwrap_or_else(|e| panic!("grouped view lost sync with source: {}", e));
                if let Some(subs) = weak_subs.upgrade() {
                    deliver(&out, &subs);
                }
            }
        }));

        Self {
            state,
            subs,
            source_sub,
        }
    }

    /// Returns the group for `key`, if it currently exists.
    pub fn group(&self, key: &K) -> Option<Group<T, K>> {
        let state = self.state.borrow();
        state.index_of.get(key).map(|&gi| state.groups[gi].clone())
    }

    /// Returns all groups in creation order.
    pub fn groups(&self) -> Vec<Group<T, K>> {
        self.state.borrow().groups.clone()
    }

    /// Whether implicit grouping is on.
    pub fn include_implicit(&self) -> bool {
        self.state.borrow().include_implicit
    }

    /// Turns implicit grouping on or off.
    ///
    /// Turning it off destroys every implicit group; their members stay in
    /// the source but belong to no group. Turning it on re-buckets every
    /// ungrouped item.
    pub fn set_include_implicit(&self, include: bool) {
        let out = self.state.borrow_mut().set_include_implicit(include);
        deliver(&out, &self.subs);
    }

    /// Pins a group for `key`, creating it empty if no item maps there.
    ///
    /// An existing implicit group is promoted in place.
    pub fn add_explicit_group(&self, key: K) -> Group<T, K> {
        let (group, out) = self.state.borrow_mut().add_explicit_group(key);
        deliver(&out, &self.subs);
        group
    }

    /// Unpins the group for `key`.
    ///
    /// The group reverts to implicit lifetime rules: it is destroyed
    /// immediately if it is empty or implicit grouping is off.
    pub fn remove_explicit_group(&self, key: &K) {
        let out = self.state.borrow_mut().remove_explicit_group(key);
        deliver(&out, &self.subs);
    }
}

impl<T: ViewItem, K> Clone for GroupedView<T, K> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            subs: self.subs.clone(),
            source_sub: self.source_sub,
        }
    }
}

impl<T: ViewItem, K> Drop for GroupedView<T, K> {
    fn drop(&mut self) {
        if Rc::strong_count(&self.state) == 1 {
            let mut state = self.state.borrow_mut();
            state.source.unobserve(self.source_sub);
            for c in core::mem::take(&mut state.containers) {
                c.release();
            }
        }
    }
}

impl<T, K> ObservableList<Group<T, K>> for GroupedView<T, K>
where
    T: ViewItem,
    K: 'static,
{
    fn len(&self) -> usize {
        self.state.borrow().groups.len()
    }

    fn get(&self, index: usize) -> Option<Group<T, K>> {
        self.state.borrow().groups.get(index).cloned()
    }

    fn snapshot(&self) -> Vec<Group<T, K>> {
        self.state.borrow().groups.clone()
    }

    fn observe(&self, callback: Box<dyn Fn(&ListEvent<Group<T, K>>)>) -> SubscriptionId {
        self.subs.borrow_mut().subscribe(callback)
    }

    fn unobserve(&self, id: SubscriptionId) -> bool {
        self.subs.borrow_mut().unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use vitre_reactive::{ObservableVec, Tracked};

    fn keys<T, K>(view: &GroupedView<T, K>) -> Vec<K>
    where
        T: ViewItem,
        K: Eq + Hash + Clone + 'static,
    {
        view.groups().iter().map(|g| g.key().clone()).collect()
    }

    fn parity(x: &i32) -> bool {
        x % 2 == 0
    }

    #[test]
    fn test_initial_partition() {
        let source = ObservableVec::from_items(vec![1, 2, 3, 4]);
        let grouped = GroupedView::new(&source, parity, ViewSettings::default());

        assert_eq!(grouped.len(), 2);
        assert_eq!(keys(&grouped), vec![false, true]); // creation order
        assert_eq!(grouped.group(&false).unwrap().snapshot(), vec![1, 3]);
        assert_eq!(grouped.group(&true).unwrap().snapshot(), vec![2, 4]);
    }

    #[test]
    fn test_first_item_materializes_group() {
        let source = ObservableVec::from_items(vec![1]);
        let grouped = GroupedView::new(&source, parity, ViewSettings::default());

        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        grouped.observe(Box::new(move |ev: &ListEvent<Group<i32, bool>>| {
            log_clone.borrow_mut().push(ev.kind());
        }));

        source.push(2);

        assert_eq!(grouped.len(), 2);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(grouped.group(&true).unwrap().snapshot(), vec![2]);
    }

    #[test]
    fn test_last_member_destroys_implicit_group() {
        let source = ObservableVec::from_items(vec![1, 2]);
        let grouped = GroupedView::new(&source, parity, ViewSettings::default());

        source.remove_at(1).unwrap();

        assert_eq!(grouped.len(), 1);
        assert!(grouped.group(&true).is_none());
    }

    #[test]
    fn test_group_order_mirrors_source_order() {
        let source = ObservableVec::from_items(vec![1, 2, 3]);
        let grouped = GroupedView::new(&source, parity, ViewSettings::default());

        // Insert an odd item between 1 and 3 in source order.
        source.insert(1, 5).unwrap(); // source [1, 5, 2, 3]

        assert_eq!(grouped.group(&false).unwrap().snapshot(), vec![1, 5, 3]);
    }

    #[test]
    fn test_group_emits_member_events() {
        let source = ObservableVec::from_items(vec![1, 3]);
        let grouped = GroupedView::new(&source, parity, ViewSettings::default());
        let odd = grouped.group(&false).unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        odd.observe(Box::new(move |ev: &ListEvent<i32>| {
            log_clone.borrow_mut().push(ev.clone());
        }));

        source.insert(1, 7).unwrap(); // between 1 and 3

        assert_eq!(&*log.borrow(), &[ListEvent::added_at(vec![7], 1)]);
        assert_eq!(odd.snapshot(), vec![1, 7, 3]);
    }

    #[test]
    fn test_key_change_rebuckets() {
        let source = ObservableVec::new();
        for v in [1, 2, 3] {
            source.push(Tracked::new(v));
        }
        let grouped = GroupedView::new(
            &source,
            |t: &Tracked<i32>| t.get() % 2 == 0,
            ViewSettings::default().with_trigger("value"),
        );

        // 3 becomes even: leaves the odd group, joins the even one after 2.
        source.get(2).unwrap().set("value", 6);

        let odd: Vec<i32> = grouped
            .group(&false)
            .unwrap()
            .snapshot()
            .iter()
            .map(|t| t.get())
            .collect();
        let even: Vec<i32> = grouped
            .group(&true)
            .unwrap()
            .snapshot()
            .iter()
            .map(|t| t.get())
            .collect();
        assert_eq!(odd, vec![1]);
        assert_eq!(even, vec![2, 6]);
    }

    #[test]
    fn test_key_change_destroys_emptied_group() {
        let source = ObservableVec::new();
        source.push(Tracked::new(1));
        source.push(Tracked::new(2));
        let grouped = GroupedView::new(
            &source,
            |t: &Tracked<i32>| t.get() % 2 == 0,
            ViewSettings::default().with_trigger("value"),
        );

        source.get(0).unwrap().set("value", 4); // odd group empties

        assert_eq!(grouped.len(), 1);
        assert!(grouped.group(&false).is_none());
        let even: Vec<i32> = grouped
            .group(&true)
            .unwrap()
            .snapshot()
            .iter()
            .map(|t| t.get())
            .collect();
        assert_eq!(even, vec![4, 2]);
    }

    #[test]
    fn test_explicit_group_survives_while_empty() {
        let source = ObservableVec::<i32>::new();
        let grouped = GroupedView::new(&source, parity, ViewSettings::default());

        let pinned = grouped.add_explicit_group(true);
        assert_eq!(grouped.len(), 1);
        assert!(pinned.is_empty());

        source.push(2);
        assert_eq!(pinned.snapshot(), vec![2]);

        source.remove_at(0).unwrap();
        assert_eq!(grouped.len(), 1);
        assert!(pinned.is_empty());
    }

    #[test]
    fn test_promote_existing_group() {
        let source = ObservableVec::from_items(vec![2]);
        let grouped = GroupedView::new(&source, parity, ViewSettings::default());

        let before = grouped.group(&true).unwrap();
        let promoted = grouped.add_explicit_group(true);
        assert!(promoted == before);
        assert!(promoted.is_explicit());

        source.remove_at(0).unwrap();
        assert_eq!(grouped.len(), 1); // survives empty
    }

    #[test]
    fn test_remove_explicit_group() {
        let source = ObservableVec::<i32>::new();
        let grouped = GroupedView::new(&source, parity, ViewSettings::default());

        grouped.add_explicit_group(true);
        grouped.remove_explicit_group(&true);

        assert_eq!(grouped.len(), 0);
    }

    #[test]
    fn test_disable_implicit_grouping() {
        let source = ObservableVec::from_items(vec![1, 2]);
        let grouped = GroupedView::new(&source, parity, ViewSettings::default());
        grouped.add_explicit_group(true);

        grouped.set_include_implicit(false);

        assert_eq!(keys(&grouped), vec![true]);
        source.push(3); // no group for odd items now
        assert_eq!(grouped.len(), 1);

        grouped.set_include_implicit(true);
        assert_eq!(grouped.group(&false).unwrap().snapshot(), vec![1, 3]);
    }

    #[test]
    fn test_reset_destroys_implicit_keeps_explicit() {
        let source = ObservableVec::from_items(vec![1, 2]);
        let grouped = GroupedView::new(&source, parity, ViewSettings::default());
        let pinned = grouped.add_explicit_group(true);

        source.replace_all(vec![3, 5]);

        assert_eq!(keys(&grouped), vec![true, false]);
        assert!(pinned.is_empty());
        assert_eq!(grouped.group(&false).unwrap().snapshot(), vec![3, 5]);
    }

    #[test]
    fn test_move_within_group() {
        let source = ObservableVec::from_items(vec![1, 2, 3]);
        let grouped = GroupedView::new(&source, parity, ViewSettings::default());
        let odd = grouped.group(&false).unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        odd.observe(Box::new(move |ev: &ListEvent<i32>| {
            log_clone.borrow_mut().push(ev.clone());
        }));

        source.move_item(0, 2).unwrap(); // source [2, 3, 1]

        assert_eq!(odd.snapshot(), vec![3, 1]);
        assert_eq!(&*log.borrow(), &[ListEvent::moved(vec![1], 0, 1)]);
    }

    #[test]
    fn test_move_across_other_groups_is_silent() {
        let source = ObservableVec::from_items(vec![1, 2, 4]);
        let grouped = GroupedView::new(&source, parity, ViewSettings::default());
        let odd = grouped.group(&false).unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        odd.observe(Box::new(move |ev: &ListEvent<i32>| {
            log_clone.borrow_mut().push(ev.clone());
        }));

        source.move_item(1, 2).unwrap(); // only evens reorder

        assert!(log.borrow().is_empty());
        assert_eq!(grouped.group(&true).unwrap().snapshot(), vec![4, 2]);
    }

    #[test]
    fn test_groups_feed_composite() {
        let source = ObservableVec::from_items(vec![1, 2, 3, 4]);
        let grouped = GroupedView::new(&source, parity, ViewSettings::default());

        let composite = crate::CompositeView::new();
        for g in grouped.groups() {
            composite.push_source(&g);
        }

        assert_eq!(composite.snapshot(), vec![1, 3, 2, 4]);

        source.push(5);
        assert_eq!(composite.snapshot(), vec![1, 3, 5, 2, 4]);
    }
}
