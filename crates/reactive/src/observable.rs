//! Observable source collections.
//!
//! `ObservableList<T>` is the interface every vitre stage consumes: a
//! countable, indexable, enumerable sequence plus a subscription point
//! yielding `ListEvent`s. Derived views implement it too, so a view's
//! output can feed another view.
//!
//! `ObservableVec<T>` is the reference source implementation: a vector
//! whose mutation API emits the corresponding events. Handles are cheap to
//! clone; state and the subscription table live in separate cells so an
//! event handler may read the list while the notification is in flight.

use crate::subscription::{SubscriptionId, SubscriptionManager};
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use vitre_core::{Error, ListEvent, Result};

/// A countable, enumerable sequence that emits [`ListEvent`]s.
///
/// This is the source-collection interface; any collaborator providing it
/// can drive a derived view, and every derived view provides it in turn.
pub trait ObservableList<T> {
    /// Returns the number of items.
    fn len(&self) -> usize;

    /// Returns the item at `index`, if in bounds.
    fn get(&self, index: usize) -> Option<T>;

    /// Returns the current contents as a vector.
    fn snapshot(&self) -> Vec<T>;

    /// Subscribes to change events.
    fn observe(&self, callback: Box<dyn Fn(&ListEvent<T>)>) -> SubscriptionId;

    /// Removes a subscription; returns true if it existed.
    fn unobserve(&self, id: SubscriptionId) -> bool;

    /// Returns true if the sequence is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct VecState<T> {
    items: Vec<T>,
    /// Open transaction depth; mutations inside a batch suppress emission.
    batch_depth: usize,
    /// Whether anything changed inside the current batch.
    dirty: bool,
}

/// An observable vector: the reference [`ObservableList`] source.
///
/// Mutations settle the vector first and emit afterwards, so handlers
/// always observe the post-mutation state. `begin_batch`/`end_batch`
/// provide the transactional variant: mutations inside a batch coalesce
/// into a single `Reset` at the end.
pub struct ObservableVec<T> {
    state: Rc<RefCell<VecState<T>>>,
    subs: Rc<RefCell<SubscriptionManager<ListEvent<T>>>>,
}

impl<T> Clone for ObservableVec<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            subs: self.subs.clone(),
        }
    }
}

impl<T> Default for ObservableVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ObservableVec<T> {
    /// Creates an empty observable vector.
    pub fn new() -> Self {
        Self::from_items(Vec::new())
    }

    /// Creates an observable vector with initial contents.
    ///
    /// No event is emitted for the initial contents; observers attach
    /// afterwards and start from a snapshot.
    pub fn from_items(items: Vec<T>) -> Self {
        Self {
            state: Rc::new(RefCell::new(VecState {
                items,
                batch_depth: 0,
                dirty: false,
            })),
            subs: Rc::new(RefCell::new(SubscriptionManager::new())),
        }
    }

    fn emit(&self, event: ListEvent<T>) {
        let deferred = {
            let mut state = self.state.borrow_mut();
            if state.batch_depth > 0 {
                state.dirty = true;
                true
            } else {
                false
            }
        };
        if !deferred {
            self.subs.borrow().notify_all(&event);
        }
    }

    /// Opens a transaction; may nest.
    pub fn begin_batch(&self) {
        self.state.borrow_mut().batch_depth += 1;
    }

    /// Closes a transaction.
    ///
    /// When the outermost batch closes and anything changed inside it, a
    /// single `Reset` is emitted in place of the suppressed events.
    pub fn end_batch(&self) -> Result<()> {
        let emit_reset = {
            let mut state = self.state.borrow_mut();
            if state.batch_depth == 0 {
                return Err(Error::invalid_operation("end_batch without begin_batch"));
            }
            state.batch_depth -= 1;
            if state.batch_depth == 0 && state.dirty {
                state.dirty = false;
                true
            } else {
                false
            }
        };
        if emit_reset {
            self.subs.borrow().notify_all(&ListEvent::Reset);
        }
        Ok(())
    }
}

impl<T: Clone> ObservableVec<T> {
    /// Appends an item, emitting `Add` at the end position.
    pub fn push(&self, item: T) {
        let event = {
            let mut state = self.state.borrow_mut();
            let index = state.items.len();
            state.items.push(item.clone());
            ListEvent::added_at(alloc::vec![item], index)
        };
        self.emit(event);
    }

    /// Inserts an item at `index`, emitting `Add`.
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.insert_all(index, alloc::vec![item])
    }

    /// Inserts a run of items at `index`, emitting one `Add`.
    pub fn insert_all(&self, index: usize, items: Vec<T>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let event = {
            let mut state = self.state.borrow_mut();
            let len = state.items.len();
            if index > len {
                return Err(Error::invalid_index(index, len));
            }
            state.items.splice(index..index, items.iter().cloned());
            ListEvent::added_at(items, index)
        };
        self.emit(event);
        Ok(())
    }

    /// Removes the item at `index`, emitting `Remove`.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        let (event, removed) = {
            let mut state = self.state.borrow_mut();
            let len = state.items.len();
            if index >= len {
                return Err(Error::invalid_index(index, len));
            }
            let removed = state.items.remove(index);
            (ListEvent::removed_at(alloc::vec![removed.clone()], index), removed)
        };
        self.emit(event);
        Ok(removed)
    }

    /// Replaces the item at `index`, emitting `Replace`. Returns the old item.
    pub fn set(&self, index: usize, item: T) -> Result<T> {
        let (event, old) = {
            let mut state = self.state.borrow_mut();
            let len = state.items.len();
            if index >= len {
                return Err(Error::invalid_index(index, len));
            }
            let old = core::mem::replace(&mut state.items[index], item.clone());
            (
                ListEvent::replaced_at(alloc::vec![old.clone()], alloc::vec![item], index),
                old,
            )
        };
        self.emit(event);
        Ok(old)
    }

    /// Relocates the item at `from` so it ends up at `to`, emitting `Move`.
    pub fn move_item(&self, from: usize, to: usize) -> Result<()> {
        self.move_range(from, 1, to)
    }

    /// Relocates a contiguous run of `count` items from `from` to `to`.
    ///
    /// `to` is the run's start position in the resulting vector.
    pub fn move_range(&self, from: usize, count: usize, to: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let event = {
            let mut state = self.state.borrow_mut();
            let len = state.items.len();
            if from + count > len {
                return Err(Error::invalid_index(from + count - 1, len));
            }
            if to + count > len {
                return Err(Error::invalid_index(to + count - 1, len));
            }
            if from == to {
                return Ok(());
            }
            let run: Vec<T> = state.items.drain(from..from + count).collect();
            state.items.splice(to..to, run.iter().cloned());
            ListEvent::moved(run, from, to)
        };
        self.emit(event);
        Ok(())
    }

    /// Removes everything, emitting `Reset`.
    pub fn clear(&self) {
        self.state.borrow_mut().items.clear();
        self.emit(ListEvent::Reset);
    }

    /// Replaces the entire contents, emitting `Reset`.
    pub fn replace_all(&self, items: Vec<T>) {
        self.state.borrow_mut().items = items;
        self.emit(ListEvent::Reset);
    }
}

impl<T: Clone + PartialEq> ObservableVec<T> {
    /// Removes the first item equal to `item`, emitting `Remove`.
    ///
    /// Returns the position it was removed from. With duplicate equal
    /// items the first match wins.
    pub fn remove_item(&self, item: &T) -> Result<usize> {
        let index = {
            let state = self.state.borrow();
            state
                .items
                .iter()
                .position(|x| x == item)
                .ok_or(Error::NotFound)?
        };
        self.remove_at(index)?;
        Ok(index)
    }
}

impl<T: Clone + 'static> ObservableList<T> for ObservableVec<T> {
    fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.state.borrow().items.get(index).cloned()
    }

    fn snapshot(&self) -> Vec<T> {
        self.state.borrow().items.clone()
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
    use alloc::vec;

    fn record<T: Clone + 'static>(
        list: &ObservableVec<T>,
    ) -> Rc<RefCell<Vec<ListEvent<T>>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        list.observe(Box::new(move |ev| log_clone.borrow_mut().push(ev.clone())));
        log
    }

    #[test]
    fn test_push_emits_add() {
        let list = ObservableVec::new();
        let log = record(&list);

        list.push(7);

        assert_eq!(list.snapshot(), vec![7]);
        assert_eq!(&*log.borrow(), &[ListEvent::added_at(vec![7], 0)]);
    }

    #[test]
    fn test_insert_bounds() {
        let list = ObservableVec::from_items(vec![1, 2]);
        assert_eq!(list.insert(5, 9), Err(Error::invalid_index(5, 2)));

        list.insert(1, 9).unwrap();
        assert_eq!(list.snapshot(), vec![1, 9, 2]);
    }

    #[test]
    fn test_remove_at_emits_remove() {
        let list = ObservableVec::from_items(vec![1, 2, 3]);
        let log = record(&list);

        let removed = list.remove_at(1).unwrap();

        assert_eq!(removed, 2);
        assert_eq!(&*log.borrow(), &[ListEvent::removed_at(vec![2], 1)]);
    }

    #[test]
    fn test_remove_item_resolves_by_equality() {
        let list = ObservableVec::from_items(vec![10, 20, 30]);
        assert_eq!(list.remove_item(&20), Ok(1));
        assert_eq!(list.remove_item(&99), Err(Error::NotFound));
        assert_eq!(list.snapshot(), vec![10, 30]);
    }

    #[test]
    fn test_set_emits_replace() {
        let list = ObservableVec::from_items(vec![1, 2]);
        let log = record(&list);

        assert_eq!(list.set(0, 5), Ok(1));
        assert_eq!(
            &*log.borrow(),
            &[ListEvent::replaced_at(vec![1], vec![5], 0)]
        );
    }

    #[test]
    fn test_move_range() {
        let list = ObservableVec::from_items(vec![1, 2, 3, 4, 5]);
        let log = record(&list);

        list.move_range(0, 2, 3).unwrap();

        assert_eq!(list.snapshot(), vec![3, 4, 5, 1, 2]);
        assert_eq!(&*log.borrow(), &[ListEvent::moved(vec![1, 2], 0, 3)]);
    }

    #[test]
    fn test_move_same_position_is_silent() {
        let list = ObservableVec::from_items(vec![1, 2, 3]);
        let log = record(&list);

        list.move_item(1, 1).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_clear_emits_reset() {
        let list = ObservableVec::from_items(vec![1, 2]);
        let log = record(&list);

        list.clear();

        assert!(list.is_empty());
        assert_eq!(&*log.borrow(), &[ListEvent::Reset]);
    }

    #[test]
    fn test_handler_reads_settled_state() {
        let list = ObservableVec::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let seen_clone = seen.clone();
        let reader = list.clone();
        list.observe(Box::new(move |_| {
            seen_clone.borrow_mut().push(reader.snapshot());
        }));

        list.push(1);
        list.push(2);

        assert_eq!(&*seen.borrow(), &[vec![1], vec![1, 2]]);
    }

    #[test]
    fn test_batch_coalesces_into_reset() {
        let list = ObservableVec::from_items(vec![1]);
        let log = record(&list);

        list.begin_batch();
        list.push(2);
        list.remove_at(0).unwrap();
        list.end_batch().unwrap();

        assert_eq!(list.snapshot(), vec![2]);
        assert_eq!(&*log.borrow(), &[ListEvent::Reset]);
    }

    #[test]
    fn test_empty_batch_emits_nothing() {
        let list = ObservableVec::<i32>::new();
        let log = record(&list);

        list.begin_batch();
        list.end_batch().unwrap();

        assert!(log.borrow().is_empty());
        assert!(list.end_batch().is_err());
    }

    #[test]
    fn test_nested_batch() {
        let list = ObservableVec::new();
        let log = record(&list);

        list.begin_batch();
        list.begin_batch();
        list.push(1);
        list.end_batch().unwrap();
        assert!(log.borrow().is_empty());
        list.end_batch().unwrap();

        assert_eq!(&*log.borrow(), &[ListEvent::Reset]);
    }

    #[test]
    fn test_unobserve() {
        let list = ObservableVec::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let id = list.observe(Box::new(move |ev: &ListEvent<i32>| {
            log_clone.borrow_mut().push(ev.clone())
        }));

        list.push(1);
        assert!(list.unobserve(id));
        list.push(2);

        assert_eq!(log.borrow().len(), 1);
    }
}
