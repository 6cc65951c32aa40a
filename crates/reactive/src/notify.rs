//! Per-item property-change notifications.
//!
//! A derived value (filter verdict, sort key, group key) can change even
//! though the source collection itself did not: the item's own state
//! mutated in place. This module provides that notification channel:
//!
//! - `PropertyHub`: publish/subscribe of named property changes, with
//!   per-watcher trigger filtering so only relevant changes fan out
//! - `ViewItem`: the trait views require of their items; watching is
//!   optional and defaults to a no-op for plain values
//! - `Tracked<T>`: a reference-semantics cell that fires its hub whenever
//!   it is updated, the item shape used wherever triggers matter

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::HashMap;

/// Unique identifier for a property watch.
pub type WatchId = u64;

/// Callback type for property-change notifications.
///
/// The argument is the name of the property that changed.
pub type PropertyCallback = Rc<dyn Fn(&str)>;

struct Watcher {
    /// Property names this watcher cares about; empty means all.
    triggers: Vec<String>,
    callback: PropertyCallback,
}

impl Watcher {
    fn matches(&self, property: &str) -> bool {
        self.triggers.is_empty() || self.triggers.iter().any(|t| t == property)
    }
}

/// Publish/subscribe hub for one item's named property changes.
///
/// Watchers register with the property names they care about; `raise`
/// fans a change out only to watchers whose trigger set contains it.
pub struct PropertyHub {
    watchers: HashMap<WatchId, Watcher>,
    next_id: WatchId,
}

impl Default for PropertyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self {
            watchers: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers a watcher for the named properties (empty = all).
    pub fn watch(&mut self, triggers: &[String], callback: PropertyCallback) -> WatchId {
        let id = self.next_id;
        self.next_id += 1;

        self.watchers.insert(
            id,
            Watcher {
                triggers: triggers.to_vec(),
                callback,
            },
        );

        id
    }

    /// Removes a watcher by ID.
    ///
    /// Returns true if the watcher was found and removed.
    pub fn unwatch(&mut self, id: WatchId) -> bool {
        self.watchers.remove(&id).is_some()
    }

    /// Collects the callbacks triggered by a change to `property`.
    ///
    /// Callbacks are returned rather than invoked so the caller can drop
    /// its borrow of the hub first; a callback is free to re-enter the
    /// hub's owner.
    pub fn collect(&self, property: &str) -> Vec<PropertyCallback> {
        self.watchers
            .values()
            .filter(|w| w.matches(property))
            .map(|w| w.callback.clone())
            .collect()
    }

    /// Returns the number of registered watchers.
    #[inline]
    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    /// Returns true if no watchers are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }
}

/// What a derived view requires of its items.
///
/// Items are cloned into events and compared for identity when an event
/// arrives without an index. Property watching is optional: the default
/// implementations make any plain value a valid (never-changing) item.
pub trait ViewItem: Clone + PartialEq + 'static {
    /// Subscribes to this item's property changes, restricted to the
    /// named triggers. Returns `None` if the item does not support
    /// change notification.
    fn watch(&self, _triggers: &[String], _callback: PropertyCallback) -> Option<WatchId> {
        None
    }

    /// Releases a watch previously returned by [`ViewItem::watch`].
    fn unwatch(&self, _id: WatchId) {}
}

macro_rules! impl_plain_view_item {
    ($($t:ty),* $(,)?) => {
        $(impl ViewItem for $t {})*
    };
}

impl_plain_view_item!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, bool, char, String,
    &'static str
);

impl<A: ViewItem, B: ViewItem> ViewItem for (A, B) {}

struct TrackedInner<T> {
    value: RefCell<T>,
    hub: RefCell<PropertyHub>,
}

/// A reference-semantics observable cell.
///
/// Cloning a `Tracked` yields another handle to the same cell; equality is
/// identity. `update` mutates the value and then raises the named
/// properties on the hub, which is how an item's sort key or filter
/// verdict changes underneath a view.
pub struct Tracked<T> {
    inner: Rc<TrackedInner<T>>,
}

impl<T> Tracked<T> {
    /// Creates a new cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(TrackedInner {
                value: RefCell::new(value),
                hub: RefCell::new(PropertyHub::new()),
            }),
        }
    }

    /// Reads the value through a closure.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Returns a clone of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Mutates the value, then raises the named properties.
    ///
    /// The value borrow is released before any watcher runs, so watchers
    /// may read the cell.
    pub fn update(&self, properties: &[&str], f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        for property in properties {
            self.raise(property);
        }
    }

    /// Replaces the value wholesale, raising a single property.
    pub fn set(&self, property: &str, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.raise(property);
    }

    fn raise(&self, property: &str) {
        let callbacks = self.inner.hub.borrow().collect(property);
        for callback in callbacks {
            callback(property);
        }
    }

    /// Returns the number of active watchers on this cell.
    pub fn watcher_count(&self) -> usize {
        self.inner.hub.borrow().len()
    }
}

impl<T> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> PartialEq for Tracked<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Tracked").field(&self.inner.value.borrow()).finish()
    }
}

impl<T: 'static> ViewItem for Tracked<T> {
    fn watch(&self, triggers: &[String], callback: PropertyCallback) -> Option<WatchId> {
        Some(self.inner.hub.borrow_mut().watch(triggers, callback))
    }

    fn unwatch(&self, id: WatchId) {
        self.inner.hub.borrow_mut().unwatch(id);
    }
}
