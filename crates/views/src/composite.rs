//! Concatenation of multiple observable sources.
//!
//! A `CompositeView` presents N sources as one contiguous sequence. Each
//! source owns a slot holding a mirror of its current contents; a slot's
//! offset is the total length of the slots before it. Inner events are
//! re-emitted with their indices shifted by that offset, so downstream
//! consumers never learn where one source ends and the next begins.
//!
//! The mirror also lets the composite resolve index-free inner events by
//! equality and localize an inner `Reset` to the slot's own range instead
//! of resetting the whole concatenation.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use vitre_core::{Error, ListEvent, Result};
use vitre_reactive::{ObservableList, SubscriptionId, SubscriptionManager, ViewItem};

type Subs<T> = Rc<RefCell<SubscriptionManager<ListEvent<T>>>>;

struct Slot<T> {
    id: u64,
    list: Box<dyn ObservableList<T>>,
    sub: SubscriptionId,
    /// Mirror of the source contents, kept in lockstep by its events.
    items: Vec<T>,
}

struct CompositeState<T> {
    slots: Vec<Slot<T>>,
    next_id: u64,
}

/// Locates the run named by an inner event inside a slot mirror.
fn resolve_in<T: PartialEq>(items: &[T], probe: &T, index: Option<usize>) -> Result<usize> {
    match index {
        Some(at) => {
            if at >= items.len() {
                return Err(Error::invalid_index(at, items.len()));
            }
            if items[at] != *probe {
                return Err(Error::item_mismatch(at));
            }
            Ok(at)
        }
        None => items.iter().position(|x| x == probe).ok_or(Error::NotFound),
    }
}

impl<T: ViewItem> CompositeState<T> {
    fn offset_of(&self, slot_index: usize) -> usize {
        self.slots[..slot_index].iter().map(|s| s.items.len()).sum()
    }

    fn total(&self) -> usize {
        self.slots.iter().map(|s| s.items.len()).sum()
    }

    fn on_slot_event(&mut self, id: u64, event: &ListEvent<T>) -> Result<Vec<ListEvent<T>>> {
        let Some(si) = self.slots.iter().position(|s| s.id == id) else {
            return Ok(Vec::new());
        };
        let offset = self.offset_of(si);
        let slot = &mut self.slots[si];
        let mut out = Vec::new();
        match event {
            ListEvent::Add { items, index } => {
                if items.is_empty() {
                    return Ok(out);
                }
                let at = match index {
                    Some(at) if *at > slot.items.len() => {
                        return Err(Error::invalid_index(*at, slot.items.len()));
                    }
                    Some(at) => *at,
                    None => slot.items.len(),
                };
                slot.items.splice(at..at, items.iter().cloned());
                out.push(ListEvent::added_at(items.clone(), at).offset_by(offset));
            }
            ListEvent::Remove { items, index } => {
                if items.is_empty() {
                    return Ok(out);
                }
                let at = resolve_in(&slot.items, &items[0], *index)?;
                if at + items.len() > slot.items.len() {
                    return Err(Error::invalid_index(at + items.len() - 1, slot.items.len()));
                }
                for (k, item) in items.iter().enumerate() {
                    if slot.items[at + k] != *item {
                        return Err(Error::item_mismatch(at + k));
                    }
                }
                slot.items.drain(at..at + items.len());
                out.push(ListEvent::removed_at(items.clone(), at).offset_by(offset));
            }
            ListEvent::Replace { old, new, index } => {
                if old.is_empty() && new.is_empty() {
                    return Ok(out);
                }
                let at = resolve_in(&slot.items, &old[0], *index)?;
                if at + old.len() > slot.items.len() {
                    return Err(Error::invalid_index(at + old.len() - 1, slot.items.len()));
                }
                for (k, item) in old.iter().enumerate() {
                    if slot.items[at + k] != *item {
                        return Err(Error::item_mismatch(at + k));
                    }
                }
                slot.items
                    .splice(at..at + old.len(), new.iter().cloned());
                out.push(ListEvent::replaced_at(old.clone(), new.clone(), at).offset_by(offset));
            }
            ListEvent::Move { items, from, to } => {
                if items.is_empty() || from == to {
                    return Ok(out);
                }
                let count = items.len();
                if from + count > slot.items.len() || to + count > slot.items.len() {
                    return Err(Error::invalid_index(
                        from.max(to) + count - 1,
                        slot.items.len(),
                    ));
                }
                let run: Vec<T> = slot.items.drain(*from..*from + count).collect();
                slot.items.splice(*to..*to, run.iter().cloned());
                out.push(ListEvent::moved(run, *from, *to).offset_by(offset));
            }
            ListEvent::Reset => {
                // Localize to this slot's range; the other sources did not
                // change.
                let fresh = slot.list.snapshot();
                let old = core::mem::replace(&mut slot.items, fresh.clone());
                if !old.is_empty() && !fresh.is_empty() {
                    out.push(ListEvent::replaced_at(old, fresh, offset));
                } else if !old.is_empty() {
                    out.push(ListEvent::removed_at(old, offset));
                } else if !fresh.is_empty() {
                    out.push(ListEvent::added_at(fresh, offset));
                }
            }
        }
        Ok(out)
    }
}

/// A live concatenation of observable sources.
///
/// Sources can be attached, detached and swapped at runtime; each change
/// is announced as a range event at the source's offset. Handles are
/// cheap to clone; the view detaches from every source when the last
/// handle drops.
pub struct CompositeView<T: ViewItem> {
    state: Rc<RefCell<CompositeState<T>>>,
    subs: Subs<T>,
}

impl<T: ViewItem> Default for CompositeView<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ViewItem> CompositeView<T> {
    /// Creates an empty composite.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(CompositeState {
                slots: Vec::new(),
                next_id: 1,
            })),
            subs: Rc::new(RefCell::new(SubscriptionManager::new())),
        }
    }

    /// Appends a source at the end.
    pub fn push_source<S>(&self, source: &S)
    where
        S: ObservableList<T> + Clone + 'static,
    {
        let count = self.state.borrow().slots.len();
        // In bounds by construction.
        let _ = self.insert_source(count, source);
    }

    /// Attaches a source at `index` among the existing sources.
    ///
    /// Its current contents are announced as one `Add` at the offset the
    /// source now owns.
    pub fn insert_source<S>(&self, index: usize, source: &S) -> Result<()>
    where
        S: ObservableList<T> + Clone + 'static,
    {
        let id = {
            let mut state = self.state.borrow_mut();
            if index > state.slots.len() {
                return Err(Error::invalid_index(index, state.slots.len()));
            }
            let id = state.next_id;
            state.next_id += 1;
            id
        };
        let sub = self.observe_source(source, id);
        let event = {
            let mut state = self.state.borrow_mut();
            let items = source.snapshot();
            let event = if items.is_empty() {
                None
            } else {
                Some(ListEvent::added_at(items.clone(), state.offset_of(index)))
            };
            state.slots.insert(
                index,
                Slot {
                    id,
                    list: Box::new(source.clone()),
                    sub,
                    items,
                },
            );
            event
        };
        if let Some(event) = event {
            self.subs.borrow().notify_all(&event);
        }
        Ok(())
    }

    /// Detaches the source at `index`.
    ///
    /// Its contents are announced as one `Remove` at its former offset.
    pub fn remove_source(&self, index: usize) -> Result<()> {
        let (slot, event) = {
            let mut state = self.state.borrow_mut();
            if index >= state.slots.len() {
                return Err(Error::invalid_index(index, state.slots.len()));
            }
            let offset = state.offset_of(index);
            let slot = state.slots.remove(index);
            let event = if slot.items.is_empty() {
                None
            } else {
                Some(ListEvent::removed_at(slot.items.clone(), offset))
            };
            (slot, event)
        };
        slot.list.unobserve(slot.sub);
        if let Some(event) = event {
            self.subs.borrow().notify_all(&event);
        }
        Ok(())
    }

    /// Swaps the source at `index` for another, announcing one `Replace`
    /// covering the old and new range.
    pub fn replace_source<S>(&self, index: usize, source: &S) -> Result<()>
    where
        S: ObservableList<T> + Clone + 'static,
    {
        let (old_slot, id) = {
            let mut state = self.state.borrow_mut();
            if index >= state.slots.len() {
                return Err(Error::invalid_index(index, state.slots.len()));
            }
            let id = state.next_id;
            state.next_id += 1;
            (state.slots.remove(index), id)
        };
        old_slot.list.unobserve(old_slot.sub);
        let sub = self.observe_source(source, id);
        let event = {
            let mut state = self.state.borrow_mut();
            let items = source.snapshot();
            let offset = state.offset_of(index);
            let old = old_slot.items;
            let event = match (old.is_empty(), items.is_empty()) {
                (false, false) => Some(ListEvent::replaced_at(old, items.clone(), offset)),
                (false, true) => Some(ListEvent::removed_at(old, offset)),
                (true, false) => Some(ListEvent::added_at(items.clone(), offset)),
                (true, true) => None,
            };
            state.slots.insert(
                index,
                Slot {
                    id,
                    list: Box::new(source.clone()),
                    sub,
                    items,
                },
            );
            event
        };
        if let Some(event) = event {
            self.subs.borrow().notify_all(&event);
        }
        Ok(())
    }

    /// Returns the number of attached sources.
    pub fn source_count(&self) -> usize {
        self.state.borrow().slots.len()
    }

    fn observe_source<S>(&self, source: &S, id: u64) -> SubscriptionId
    where
        S: ObservableList<T> + Clone + 'static,
    {
        let weak_state = Rc::downgrade(&self.state);
        let weak_subs = Rc::downgrade(&self.subs);
        source.observe(Box::new(move |event| {
            if let Some(state) = weak_state.upgrade() {
                let out = state
                    .borrow_mut()
                    .on_slot_event(id, event)
                    .unwrap_or_else(|e| panic!("composite view lost sync with source: {}", e));
                if let Some(subs) = weak_subs.upgrade() {
                    for ev in &out {
                        subs.borrow().notify_all(ev);
                    }
                }
            }
        }))
    }
}

impl<T: ViewItem> Clone for CompositeView<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            subs: self.subs.clone(),
        }
    }
}

impl<T: ViewItem> Drop for CompositeView<T> {
    fn drop(&mut self) {
        if Rc::strong_count(&self.state) == 1 {
            let state = self.state.borrow();
            for slot in &state.slots {
                slot.list.unobserve(slot.sub);
            }
        }
    }
}

impl<T: ViewItem> ObservableList<T> for CompositeView<T> {
    fn len(&self) -> usize {
        self.state.borrow().total()
    }

    fn get(&self, index: usize) -> Option<T> {
        let state = self.state.borrow();
        let mut rest = index;
        for slot in &state.slots {
            if rest < slot.items.len() {
                return Some(slot.items[rest].clone());
            }
            rest -= slot.items.len();
        }
        None
    }

    fn snapshot(&self) -> Vec<T> {
        let state = self.state.borrow();
        state
            .slots
            .iter()
            .flat_map(|s| s.items.iter().cloned())
            .collect()
    }

    fn observe(&self, callback: Box<dyn Fn(&ListEvent<T>)>) -> SubscriptionId {
        self.subs.borrow_mut().subscribe(callback)
    }

    fn unobserve(&self, id: SubscriptionId) -> bool {
        self.subs.borrow_mut().unsubscribe(id)
    }
}
