//! Incrementally maintained sort order.
//!
//! A `SortedView` keeps two coupled structures: the container column in
//! source order, and `order`, a vector of container positions sorted by
//! the composite key `(value, source_index)`. The source index tie-break
//! makes the order total (no two containers compare equal) and the sort
//! stable: equal keys appear in source-relative order regardless of
//! mutation history. Both structures are only ever updated together,
//! inside a single event application.
//!
//! Maintenance is binary-search based: every insertion searches for its
//! exact slot (and must not find an equal entry), every removal searches
//! by the container's cached old key and must find exactly one. A failed
//! search means a caller applied a stale index; that is a bug, and the
//! view fails fast rather than drifting.

use crate::container::{apply_change, resolve_index, Applied, Container, ViewSettings};
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::cmp::Ordering;
use vitre_core::{ListEvent, Result};
use vitre_reactive::{ObservableList, PropertyCallback, SubscriptionId, SubscriptionManager, ViewItem};

type Subs<T> = Rc<RefCell<SubscriptionManager<ListEvent<T>>>>;
type KeyFn<T, V> = Rc<dyn Fn(&T) -> V>;
type CmpFn<V> = Rc<dyn Fn(&V, &V) -> Ordering>;
type EqFn<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// Binary search over `order` for the composite key `(value, source_index)`.
///
/// Returns `Ok(position)` when the exact container is present and
/// `Err(insertion_point)` when it is not.
fn search<T, V>(
    containers: &[Container<T, V>],
    order: &[usize],
    cmp: &dyn Fn(&V, &V) -> Ordering,
    value: &V,
    source_index: usize,
) -> core::result::Result<usize, usize> {
    order.binary_search_by(|&ci| {
        let c = &containers[ci];
        match cmp(&c.value, value) {
            Ordering::Equal => c.source_index.cmp(&source_index),
            other => other,
        }
    })
}

struct SortedState<T, V> {
    source: Box<dyn ObservableList<T>>,
    containers: Vec<Container<T, V>>,
    /// Container positions sorted by `(value, source_index)`.
    order: Vec<usize>,
    key: KeyFn<T, V>,
    cmp: CmpFn<V>,
    triggers: Vec<String>,
    eq: EqFn<T>,
    weak_self: Weak<RefCell<SortedState<T, V>>>,
    weak_subs: Weak<RefCell<SubscriptionManager<ListEvent<T>>>>,
}

impl<T: ViewItem, V: 'static> SortedState<T, V> {
    fn maker(&self) -> impl FnMut(&T, usize) -> Container<T, V> {
        let key = self.key.clone();
        let triggers = self.triggers.clone();
        let weak_self = self.weak_self.clone();
        let weak_subs = self.weak_subs.clone();
        move |item: &T, index: usize| {
            let mut c = Container::new(item.clone(), index, key(item));
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

    fn sorted_position(&self, container_index: usize) -> usize {
        let c = &self.containers[container_index];
        search(&self.containers, &self.order, &*self.cmp, &c.value, c.source_index)
            .unwrap_or_else(|_| panic!("sorted view: container missing from sort order"))
    }

    fn insertion_point(&self, container_index: usize) -> usize {
        let c = &self.containers[container_index];
        match search(&self.containers, &self.order, &*self.cmp, &c.value, c.source_index) {
            Err(point) => point,
            Ok(_) => panic!("sorted view: duplicate composite sort key"),
        }
    }

    /// Remaps a container index across a source move of `count` items from
    /// `from` to `to`, for containers that were not part of the moved run.
    fn remap_after_move(index: usize, from: usize, to: usize, count: usize) -> usize {
        let shifted = if index >= from + count { index - count } else { index };
        if shifted >= to {
            shifted + count
        } else {
            shifted
        }
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
                let applied =
                    apply_change(&mut self.containers, event, &[], &mut make, &*eq)?;
                let Applied::Added { index, count } = applied else {
                    return Ok(out);
                };
                for p in self.order.iter_mut() {
                    if *p >= index {
                        *p += count;
                    }
                }
                for k in 0..count {
                    let ci = index + k;
                    let point = self.insertion_point(ci);
                    self.order.insert(point, ci);
                    out.push(ListEvent::added_at(
                        alloc::vec![self.containers[ci].item.clone()],
                        point,
                    ));
                }
            }
            ListEvent::Remove { items, index } => {
                if items.is_empty() {
                    return Ok(out);
                }
                let at = resolve_index(&self.containers, &items[0], *index, &*self.eq)?;
                let count = items.len();
                for k in 0..count {
                    let position = self.sorted_position(at + k);
                    self.order.remove(position);
                    out.push(ListEvent::removed_at(
                        alloc::vec![self.containers[at + k].item.clone()],
                        position,
                    ));
                }
                let eq = self.eq.clone();
                let mut make = self.maker();
                let applied =
                    apply_change(&mut self.containers, event, &[], &mut make, &*eq)?;
                if let Applied::Removed { removed, .. } = applied {
                    for c in removed {
                        c.release();
                    }
                }
                for p in self.order.iter_mut() {
                    if *p > at + count - 1 {
                        *p -= count;
                    }
                }
            }
            ListEvent::Replace { old, new, index } => {
                if old.is_empty() && new.is_empty() {
                    return Ok(out);
                }
                let at = resolve_index(&self.containers, &old[0], *index, &*self.eq)?;
                let single = old.len() == 1 && new.len() == 1;
                let mut old_positions = Vec::with_capacity(old.len());
                for k in 0..old.len() {
                    let position = self.sorted_position(at + k);
                    self.order.remove(position);
                    old_positions.push(position);
                    if !single {
                        out.push(ListEvent::removed_at(
                            alloc::vec![self.containers[at + k].item.clone()],
                            position,
                        ));
                    }
                }
                let eq = self.eq.clone();
                let mut make = self.maker();
                let applied =
                    apply_change(&mut self.containers, event, &[], &mut make, &*eq)?;
                let Applied::Replaced { index: _, removed, count } = applied else {
                    return Ok(out);
                };
                for c in removed {
                    c.release();
                }
                // Remaining order entries still hold pre-splice positions.
                if new.len() != old.len() {
                    let delta = new.len() as isize - old.len() as isize;
                    for p in self.order.iter_mut() {
                        if *p >= at + old.len() {
                            *p = (*p as isize + delta) as usize;
                        }
                    }
                }
                for k in 0..count {
                    let ci = at + k;
                    let point = self.insertion_point(ci);
                    self.order.insert(point, ci);
                    if single {
                        // Same slot: collapse into one Replace to minimize
                        // downstream churn.
                        if point == old_positions[0] {
                            out.push(ListEvent::replaced_at(
                                alloc::vec![old[0].clone()],
                                alloc::vec![self.containers[ci].item.clone()],
                                point,
                            ));
                        } else {
                            out.push(ListEvent::removed_at(
                                alloc::vec![old[0].clone()],
                                old_positions[0],
                            ));
                            out.push(ListEvent::added_at(
                                alloc::vec![self.containers[ci].item.clone()],
                                point,
                            ));
                        }
                    } else {
                        out.push(ListEvent::added_at(
                            alloc::vec![self.containers[ci].item.clone()],
                            point,
                        ));
                    }
                }
            }
            ListEvent::Move { items, from, to } => {
                if items.is_empty() || from == to {
                    return Ok(out);
                }
                let count = items.len();
                let single = count == 1;
                let mut old_positions = Vec::with_capacity(count);
                for k in 0..count {
                    let position = self.sorted_position(from + k);
                    self.order.remove(position);
                    old_positions.push(position);
                    if !single {
                        out.push(ListEvent::removed_at(
                            alloc::vec![self.containers[from + k].item.clone()],
                            position,
                        ));
                    }
                }
                let eq = self.eq.clone();
                let mut make = self.maker();
                let applied =
                    apply_change(&mut self.containers, event, &[], &mut make, &*eq)?;
                let Applied::Moved { from, to, count } = applied else {
                    return Ok(out);
                };
                for p in self.order.iter_mut() {
                    *p = Self::remap_after_move(*p, from, to, count);
                }
                for k in 0..count {
                    let ci = to + k;
                    let point = self.insertion_point(ci);
                    self.order.insert(point, ci);
                    if single {
                        // The source reorder only changed the tie-break; emit
                        // a Move only when the sorted slot actually changed.
                        if point != old_positions[0] {
                            out.push(ListEvent::moved(
                                alloc::vec![self.containers[ci].item.clone()],
                                old_positions[0],
                                point,
                            ));
                        }
                    } else {
                        out.push(ListEvent::added_at(
                            alloc::vec![self.containers[ci].item.clone()],
                            point,
                        ));
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
                self.rebuild_order();
                out.push(ListEvent::Reset);
            }
        }
        Ok(out)
    }

    fn rebuild_order(&mut self) {
        let mut order: Vec<usize> = (0..self.containers.len()).collect();
        let containers = &self.containers;
        let cmp = &self.cmp;
        order.sort_unstable_by(|&a, &b| {
            match cmp(&containers[a].value, &containers[b].value) {
                Ordering::Equal => containers[a].source_index.cmp(&containers[b].source_index),
                other => other,
            }
        });
        self.order = order;
    }

    /// Handles an in-place key change signaled by the item itself.
    fn on_item_changed(&mut self, probe: &T) -> Vec<ListEvent<T>> {
        let eq = &self.eq;
        let Some(ci) = self.containers.iter().position(|c| eq(&c.item, probe)) else {
            return Vec::new();
        };
        let new_value = (self.key)(&self.containers[ci].item);
        if (self.cmp)(&self.containers[ci].value, &new_value) == Ordering::Equal {
            // Same rank; the tie-break is unchanged, so the slot is too.
            self.containers[ci].value = new_value;
            return Vec::new();
        }
        let old_position = self.sorted_position(ci);
        self.order.remove(old_position);
        self.containers[ci].value = new_value;
        let point = self.insertion_point(ci);
        self.order.insert(point, ci);
        if point == old_position {
            Vec::new()
        } else {
            alloc::vec![ListEvent::moved(
                alloc::vec![self.containers[ci].item.clone()],
                old_position,
                point,
            )]
        }
    }
}

/// A continuously sorted presentation of an observable source.
///
/// The derived order always equals a stable sort of the source by the key
/// selector, with source position breaking ties. Handles are cheap to
/// clone; the view detaches from its source when the last handle drops.
pub struct SortedView<T: ViewItem, V: 'static> {
    state: Rc<RefCell<SortedState<T, V>>>,
    subs: Subs<T>,
    source_sub: SubscriptionId,
}

impl<T: ViewItem, V: 'static> SortedView<T, V> {
    /// Creates a sorted view with an explicit comparer over the key.
    pub fn new<S>(
        source: &S,
        key: impl Fn(&T) -> V + 'static,
        cmp: impl Fn(&V, &V) -> Ordering + 'static,
        settings: ViewSettings<T>,
    ) -> Self
    where
        S: ObservableList<T> + Clone + 'static,
    {
        let subs: Subs<T> = Rc::new(RefCell::new(SubscriptionManager::new()));
        let weak_subs = Rc::downgrade(&subs);
        let state = Rc::new_cyclic(|weak_self: &Weak<RefCell<SortedState<T, V>>>| {
            RefCell::new(SortedState {
                source: Box::new(source.clone()),
                containers: Vec::new(),
                order: Vec::new(),
                key: Rc::new(key),
                cmp: Rc::new(cmp),
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
                    .unwrap_or_else(|e| panic!("sorted view lost sync with source: {}", e));
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
}

impl<T: ViewItem, V: Ord + 'static> SortedView<T, V> {
    /// Creates a sorted view ordered by the key's natural `Ord`.
    pub fn by_key<S>(
        source: &S,
        key: impl Fn(&T) -> V + 'static,
        settings: ViewSettings<T>,
    ) -> Self
    where
        S: ObservableList<T> + Clone + 'static,
    {
        Self::new(source, key, |a: &V, b: &V| a.cmp(b), settings)
    }
}

impl<T: ViewItem, V: 'static> Clone for SortedView<T, V> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            subs: self.subs.clone(),
            source_sub: self.source_sub,
        }
    }
}

impl<T: ViewItem, V: 'static> Drop for SortedView<T, V> {
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

impl<T: ViewItem, V: 'static> ObservableList<T> for SortedView<T, V> {
    fn len(&self) -> usize {
        self.state.borrow().order.len()
    }

    fn get(&self, index: usize) -> Option<T> {
        let state = self.state.borrow();
        state
            .order
            .get(index)
            .map(|&ci| state.containers[ci].item.clone())
    }

    fn snapshot(&self) -> Vec<T> {
        let state = self.state.borrow();
        state
            .order
            .iter()
            .map(|&ci| state.containers[ci].item.clone())
            .collect()
    }

    fn observe(&self, callback: Box<dyn Fn(&ListEvent<T>)>) -> SubscriptionId {
        self.subs.borrow_mut().subscribe(callback)
    }

    fn unobserve(&self, id: SubscriptionId) -> bool {
        self.subs.borrow_mut().unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;
    use vitre_reactive::{ObservableVec, Tracked};

    fn record<T: Clone + 'static, V: 'static>(
        view: &SortedView<T, V>,
    ) -> Rc<RefCell<Vec<ListEvent<T>>>>
    where
        T: ViewItem,
    {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        view.observe(Box::new(move |ev| log_clone.borrow_mut().push(ev.clone())));
        log
    }

    #[test]
    fn test_initial_sort() {
        let source = ObservableVec::from_items(vec![3, 1, 2]);
        let sorted = SortedView::by_key(&source, |x: &i32| *x, ViewSettings::default());
        assert_eq!(sorted.snapshot(), vec![1, 2, 3]);
    }

    #[test]
    fn test_insert_emits_single_add_at_sorted_slot() {
        let source = ObservableVec::from_items(vec![3, 1, 2]);
        let sorted = SortedView::by_key(&source, |x: &i32| *x, ViewSettings::default());
        let log = record(&sorted);

        source.insert(1, 0).unwrap();

        assert_eq!(sorted.snapshot(), vec![0, 1, 2, 3]);
        assert_eq!(&*log.borrow(), &[ListEvent::added_at(vec![0], 0)]);
    }

    #[test]
    fn test_remove_emits_at_sorted_slot() {
        let source = ObservableVec::from_items(vec![3, 1, 2]);
        let sorted = SortedView::by_key(&source, |x: &i32| *x, ViewSettings::default());
        let log = record(&sorted);

        source.remove_at(0).unwrap(); // removes 3, sorted position 2

        assert_eq!(sorted.snapshot(), vec![1, 2]);
        assert_eq!(&*log.borrow(), &[ListEvent::removed_at(vec![3], 2)]);
    }

    #[test]
    fn test_stability_equal_keys_follow_source_order() {
        let source = ObservableVec::from_items(vec![("b", 1), ("a", 1), ("c", 0)]);
        let sorted = SortedView::by_key(&source, |x: &(&'static str, i32)| x.1, ViewSettings::default());

        assert_eq!(sorted.snapshot(), vec![("c", 0), ("b", 1), ("a", 1)]);

        // Insert another key-1 item between the existing ones.
        source.insert(1, ("d", 1)).unwrap();
        assert_eq!(
            sorted.snapshot(),
            vec![("c", 0), ("b", 1), ("d", 1), ("a", 1)]
        );
    }

    #[test]
    fn test_source_move_retiebreaks_equal_keys() {
        let source = ObservableVec::from_items(vec![("b", 1), ("a", 1)]);
        let sorted = SortedView::by_key(&source, |x: &(&'static str, i32)| x.1, ViewSettings::default());
        let log = record(&sorted);

        source.move_item(0, 1).unwrap(); // source: [a, b]

        assert_eq!(sorted.snapshot(), vec![("a", 1), ("b", 1)]);
        assert_eq!(&*log.borrow(), &[ListEvent::moved(vec![("b", 1)], 0, 1)]);
    }

    #[test]
    fn test_source_move_with_distinct_keys_is_silent() {
        let source = ObservableVec::from_items(vec![1, 2, 3]);
        let sorted = SortedView::by_key(&source, |x: &i32| *x, ViewSettings::default());
        let log = record(&sorted);

        source.move_item(0, 2).unwrap();

        assert_eq!(sorted.snapshot(), vec![1, 2, 3]);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_replace_same_slot_collapses() {
        let source = ObservableVec::from_items(vec![10, 20, 30]);
        let sorted = SortedView::by_key(&source, |x: &i32| *x, ViewSettings::default());
        let log = record(&sorted);

        source.set(1, 25).unwrap(); // still between 10 and 30

        assert_eq!(sorted.snapshot(), vec![10, 25, 30]);
        assert_eq!(
            &*log.borrow(),
            &[ListEvent::replaced_at(vec![20], vec![25], 1)]
        );
    }

    #[test]
    fn test_replace_different_slot_splits() {
        let source = ObservableVec::from_items(vec![10, 20, 30]);
        let sorted = SortedView::by_key(&source, |x: &i32| *x, ViewSettings::default());
        let log = record(&sorted);

        source.set(1, 99).unwrap();

        assert_eq!(sorted.snapshot(), vec![10, 30, 99]);
        assert_eq!(
            &*log.borrow(),
            &[
                ListEvent::removed_at(vec![20], 1),
                ListEvent::added_at(vec![99], 2),
            ]
        );
    }

    #[test]
    fn test_trigger_key_change_emits_move() {
        let source = ObservableVec::new();
        let a = Tracked::new(1);
        let b = Tracked::new(2);
        source.push(a.clone());
        source.push(b.clone());

        let sorted = SortedView::by_key(
            &source,
            |t: &Tracked<i32>| t.get(),
            ViewSettings::default().with_trigger("value"),
        );
        let log = record(&sorted);

        a.set("value", 5); // a moves past b

        assert_eq!(
            sorted.snapshot().iter().map(|t| t.get()).collect::<Vec<_>>(),
            vec![2, 5]
        );
        assert_eq!(log.borrow().len(), 1);
        assert!(matches!(
            log.borrow()[0],
            ListEvent::Move { from: 0, to: 1, .. }
        ));
    }

    #[test]
    fn test_trigger_key_change_same_slot_is_silent() {
        let source = ObservableVec::new();
        let a = Tracked::new(1);
        source.push(a.clone());
        source.push(Tracked::new(10));

        let sorted = SortedView::by_key(
            &source,
            |t: &Tracked<i32>| t.get(),
            ViewSettings::default().with_trigger("value"),
        );
        let log = record(&sorted);

        a.set("value", 3); // still first

        assert_eq!(sorted.get(0).unwrap().get(), 3);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_reset_rebuilds() {
        let source = ObservableVec::from_items(vec![2, 1]);
        let sorted = SortedView::by_key(&source, |x: &i32| *x, ViewSettings::default());
        let log = record(&sorted);

        source.replace_all(vec![9, 7, 8]);

        assert_eq!(sorted.snapshot(), vec![7, 8, 9]);
        assert_eq!(&*log.borrow(), &[ListEvent::Reset]);
    }

    #[test]
    fn test_custom_comparer_descending() {
        let source = ObservableVec::from_items(vec![1, 3, 2]);
        let sorted = SortedView::new(
            &source,
            |x: &i32| *x,
            |a: &i32, b: &i32| b.cmp(a),
            ViewSettings::default(),
        );
        assert_eq!(sorted.snapshot(), vec![3, 2, 1]);

        source.push(4);
        assert_eq!(sorted.snapshot(), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_sorts_strings() {
        let source = ObservableVec::from_items(vec![
            "pear".to_string(),
            "apple".to_string(),
            "plum".to_string(),
        ]);
        let sorted = SortedView::by_key(&source, |s: &String| s.clone(), ViewSettings::default());

        source.push("banana".to_string());
        assert_eq!(
            sorted.snapshot(),
            vec!["apple", "banana", "pear", "plum"]
        );
    }
}
