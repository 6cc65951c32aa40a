//! Incrementally maintained predicate inclusion.
//!
//! A `FilteredView` caches a boolean verdict per source item and keeps a
//! running visible count, so membership queries and `len` never re-run the
//! predicate. A source mutation touches only the verdicts of the items it
//! names; a trigger notification re-evaluates exactly one.
//!
//! Two flavors exist. The default tracks filtered positions: every
//! emitted event carries the exact downstream index, computed as the
//! number of passing items before the touched source slot. The
//! lightweight flavor skips that counting and emits index-free events,
//! leaving consumers to resolve positions by equality.

use crate::container::{apply_change, resolve_index, Applied, Container, ViewSettings};
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use vitre_core::{ListEvent, Result};
use vitre_reactive::{ObservableList, PropertyCallback, SubscriptionId, SubscriptionManager, ViewItem};

type Subs<T> = Rc<RefCell<SubscriptionManager<ListEvent<T>>>>;
type Predicate<T> = Rc<dyn Fn(&T) -> bool>;
type EqFn<T> = Rc<dyn Fn(&T, &T) -> bool>;

struct FilteredState<T> {
    source: Box<dyn ObservableList<T>>,
    containers: Vec<Container<T, bool>>,
    /// Count of containers whose verdict is true.
    visible: usize,
    predicate: Predicate<T>,
    triggers: Vec<String>,
    eq: EqFn<T>,
    track_positions: bool,
    weak_self: Weak<RefCell<FilteredState<T>>>,
    weak_subs: Weak<RefCell<SubscriptionManager<ListEvent<T>>>>,
}

impl<T: ViewItem> FilteredState<T> {
    fn maker(&self) -> impl FnMut(&T, usize) -> Container<T, bool> {
        let predicate = self.predicate.clone();
        let triggers = self.triggers.clone();
        let weak_self = self.weak_self.clone();
        let weak_subs = self.weak_subs.clone();
        move |item: &T, index: usize| {
            let mut c = Container::new(item.clone(), index, predicate(item));
            if !triggers.is_empty() {
                let weak_self = weak_self.clone();
                let weak_subs = weak_subs.clone();
                let probe = item.clone();
                let callback: PropertyCallback = Rc::new(move |_property| {
                    if let Some(state) = weak_self.upgrade() {
                        let out = state.borrow_mut().on_item_changed(&probe);
                        if let Some(subs) = weak_subs.upgrade() {
                            for ev in &out {
                                subs.borrow().notify_all(ev);
                            }
                        }
                    }
                });
                c.watch = item.watch(&triggers, callback);
            }
            c
        }
    }

    /// Number of passing items strictly before source position `index`.
    fn filtered_pos(&self, index: usize) -> usize {
        self.containers[..index].iter().filter(|c| c.value).count()
    }

    fn position_of(&self, index: usize) -> Option<usize> {
        if self.track_positions {
            Some(self.filtered_pos(index))
        } else {
            None
        }
    }

    fn passing(&self, range: core::ops::Range<usize>) -> Vec<T> {
        self.containers[range]
            .iter()
            .filter(|c| c.value)
            .map(|c| c.item.clone())
            .collect()
    }

    fn on_source_event(&mut self, event: &ListEvent<T>) -> Result<Vec<ListEvent<T>>> {
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
                let added = self.passing(index..index + count);
                if !added.is_empty() {
                    self.visible += added.len();
                    out.push(ListEvent::Add {
                        items: added,
                        index: self.position_of(index),
                    });
                }
            }
            ListEvent::Remove { items, index } => {
                if items.is_empty() {
                    return Ok(out);
                }
                let at = resolve_index(&self.containers, &items[0], *index, &*self.eq)?;
                let position = self.position_of(at);
                let eq = self.eq.clone();
                let mut make = self.maker();
                let applied = apply_change(&mut self.containers, event, &[], &mut make, &*eq)?;
                if let Applied::Removed { removed, .. } = applied {
                    let gone: Vec<T> = removed
                        .iter()
                        .filter(|c| c.value)
                        .map(|c| c.item.clone())
                        .collect();
                    for c in removed {
                        c.release();
                    }
                    if !gone.is_empty() {
                        self.visible -= gone.len();
                        out.push(ListEvent::Remove {
                            items: gone,
                            index: position,
                        });
                    }
                }
            }
            ListEvent::Replace { old, new, index } => {
                if old.is_empty() && new.is_empty() {
                    return Ok(out);
                }
                let at = resolve_index(&self.containers, &old[0], *index, &*self.eq)?;
                let position = self.position_of(at);
                let eq = self.eq.clone();
                let mut make = self.maker();
                let applied = apply_change(&mut self.containers, event, &[], &mut make, &*eq)?;
                let Applied::Replaced { index: at, removed, count } = applied else {
                    return Ok(out);
                };
                let gone: Vec<T> = removed
                    .iter()
                    .filter(|c| c.value)
                    .map(|c| c.item.clone())
                    .collect();
                for c in removed {
                    c.release();
                }
                let fresh = self.passing(at..at + count);
                self.visible = self.visible - gone.len() + fresh.len();
                match (gone.is_empty(), fresh.is_empty()) {
                    (false, false) => out.push(ListEvent::Replace {
                        old: gone,
                        new: fresh,
                        index: position,
                    }),
                    (false, true) => out.push(ListEvent::Remove {
                        items: gone,
                        index: position,
                    }),
                    (true, false) => out.push(ListEvent::Add {
                        items: fresh,
                        index: position,
                    }),
                    (true, true) => {}
                }
            }
            ListEvent::Move { items, from, to } => {
                if items.is_empty() || from == to {
                    return Ok(out);
                }
                let moved = self.passing(*from..*from + items.len());
                let from_position = self.filtered_pos(*from);
                let eq = self.eq.clone();
                let mut make = self.maker();
                let applied = apply_change(&mut self.containers, event, &[], &mut make, &*eq)?;
                let Applied::Moved { to, .. } = applied else {
                    return Ok(out);
                };
                if moved.is_empty() {
                    return Ok(out);
                }
                let to_position = self.filtered_pos(to);
                if self.track_positions {
                    if from_position != to_position {
                        out.push(ListEvent::moved(moved, from_position, to_position));
                    }
                } else {
                    // No positional protocol for index-free moves; restate as
                    // a remove and re-add pair.
                    out.push(ListEvent::Remove {
                        items: moved.clone(),
                        index: None,
                    });
                    out.push(ListEvent::Add {
                        items: moved,
                        index: None,
                    });
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
                self.visible = self.containers.iter().filter(|c| c.value).count();
                out.push(ListEvent::Reset);
            }
        }
        Ok(out)
    }

    /// Re-evaluates one item's verdict after a trigger notification.
    fn on_item_changed(&mut self, probe: &T) -> Vec<ListEvent<T>> {
        let eq = &self.eq;
        let Some(index) = self.containers.iter().position(|c| eq(&c.item, probe)) else {
            return Vec::new();
        };
        let verdict = (self.predicate)(&self.containers[index].item);
        if verdict == self.containers[index].value {
            return Vec::new();
        }
        self.containers[index].value = verdict;
        let item = self.containers[index].item.clone();
        // The flipped slot itself is excluded from the count either way, so
        // the position is the same for an appearance and a disappearance.
        let position = self.position_of(index);
        if verdict {
            self.visible += 1;
            alloc::vec![ListEvent::Add {
                items: alloc::vec![item],
                index: position,
            }]
        } else {
            self.visible -= 1;
            alloc::vec![ListEvent::Remove {
                items: alloc::vec![item],
                index: position,
            }]
        }
    }
}

/// A live subset of an observable source selected by a predicate.
///
/// The view's enumeration always equals the source filtered in order.
/// Handles are cheap to clone; the view detaches from its source when the
/// last handle drops.
pub struct FilteredView<T: ViewItem> {
    state: Rc<RefCell<FilteredState<T>>>,
    subs: Subs<T>,
    source_sub: SubscriptionId,
}

impl<T: ViewItem> FilteredView<T> {
    /// Creates a position-tracking filtered view.
    pub fn new<S>(
        source: &S,
        predicate: impl Fn(&T) -> bool + 'static,
        settings: ViewSettings<T>,
    ) -> Self
    where
        S: ObservableList<T> + Clone + 'static,
    {
        Self::build(source, predicate, settings, true)
    }

    /// Creates a filtered view that emits index-free events.
    ///
    /// Skipping position computation makes every update O(1) in the
    /// passing prefix; consumers resolve positions by equality instead.
    pub fn lightweight<S>(
        source: &S,
        predicate: impl Fn(&T) -> bool + 'static,
        settings: ViewSettings<T>,
    ) -> Self
    where
        S: ObservableList<T> + Clone + 'static,
    {
        Self::build(source, predicate, settings, false)
    }

    fn build<S>(
        source: &S,
        predicate: impl Fn(&T) -> bool + 'static,
        settings: ViewSettings<T>,
        track_positions: bool,
    ) -> Self
    where
        S: ObservableList<T> + Clone + 'static,
    {
        let subs: Subs<T> = Rc::new(RefCell::new(SubscriptionManager::new()));
        let weak_subs = Rc::downgrade(&subs);
        let state = Rc::new_cyclic(|weak_self: &Weak<RefCell<FilteredState<T>>>| {
            RefCell::new(FilteredState {
                source: Box::new(source.clone()),
                containers: Vec::new(),
                visible: 0,
                predicate: Rc::new(predicate),
                triggers: settings.triggers.clone(),
                eq: settings.eq_fn(),
                track_positions,
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
                    .unwrap_or_else(|e| panic!("filtered view lost sync with source: {}", e));
                if let Some(subs) = weak_subs.upgrade() {
                    for ev in &out {
                        subs.borrow().notify_all(ev);
                    }
                }
            }
        }));

        Self {
            state,
            subs,
            source_sub,
        }
    }

    /// Returns the number of items currently passing the predicate.
    ///
    /// Maintained incrementally; never re-runs the predicate.
    pub fn visible_count(&self) -> usize {
        self.state.borrow().visible
    }
}

impl<T: ViewItem> Clone for FilteredView<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            subs: self.subs.clone(),
            source_sub: self.source_sub,
        }
    }
}

impl<T: ViewItem> Drop for FilteredView<T> {
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

impl<T: ViewItem> ObservableList<T> for FilteredView<T> {
    fn len(&self) -> usize {
        self.state.borrow().visible
    }

    fn get(&self, index: usize) -> Option<T> {
        let state = self.state.borrow();
        state
            .containers
            .iter()
            .filter(|c| c.value)
            .nth(index)
            .map(|c| c.item.clone())
    }

    fn snapshot(&self) -> Vec<T> {
        let state = self.state.borrow();
        state
            .containers
            .iter()
            .filter(|c| c.value)
            .map(|c| c.item.clone())
            .collect()
    }

    fn observe(&self, callback: Box<dyn Fn(&ListEvent<T>)>) -> SubscriptionId {
        self.subs.borrow_mut().subscribe(callback)
    }

    fn unobserve(&self, id: SubscriptionId) -> bool {
        self.subs.borrow_mut().unsubscribe(id)
    }
}
