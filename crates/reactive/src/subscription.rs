//! Subscription management for event streams.
//!
//! This module provides subscription IDs and a manager for tracking
//! callbacks registered against an observable event stream. The manager is
//! generic over the event type, so the same machinery serves item-level
//! streams and group-level streams.

use alloc::boxed::Box;
use alloc::vec::Vec;
use hashbrown::HashMap;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// A subscription to an event stream.
pub struct Subscription<E> {
    /// Unique identifier
    id: SubscriptionId,
    /// Callback to invoke on events
    callback: Box<dyn Fn(&E)>,
    /// Whether this subscription is active
    active: bool,
}

impl<E> Subscription<E> {
    /// Creates a new subscription.
    pub fn new<F>(id: SubscriptionId, callback: F) -> Self
    where
        F: Fn(&E) + 'static,
    {
        Self {
            id,
            callback: Box::new(callback),
            active: true,
        }
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns whether this subscription is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Deactivates this subscription.
    #[inline]
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Notifies this subscription of an event.
    pub fn notify(&self, event: &E) {
        if self.active {
            (self.callback)(event);
        }
    }
}

/// Manages subscriptions for one event stream.
pub struct SubscriptionManager<E> {
    /// Active subscriptions
    subscriptions: HashMap<SubscriptionId, Subscription<E>>,
    /// Next subscription ID to assign
    next_id: SubscriptionId,
}

impl<E> Default for SubscriptionManager<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> SubscriptionManager<E> {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Subscribes to events with the given callback.
    ///
    /// Returns the subscription ID that can be used to unsubscribe.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;

        let subscription = Subscription::new(id, callback);
        self.subscriptions.insert(id, subscription);

        id
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    /// Notifies all active subscriptions of an event.
    pub fn notify_all(&self, event: &E) {
        for sub in self.subscriptions.values() {
            sub.notify(event);
        }
    }

    /// Returns the number of active subscriptions.
    #[inline]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if there are no subscriptions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Returns all subscription IDs.
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.keys().copied().collect()
    }

    /// Clears all subscriptions.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::RefCell;
    use vitre_core::ListEvent;

    #[test]
    fn test_subscription_new() {
        let sub: Subscription<ListEvent<i32>> = Subscription::new(1, |_| {});
        assert_eq!(sub.id(), 1);
        assert!(sub.is_active());
    }

    #[test]
    fn test_subscription_deactivate() {
        let mut sub: Subscription<ListEvent<i32>> = Subscription::new(1, |_| {});
        sub.deactivate();
        assert!(!sub.is_active());
    }

    #[test]
    fn test_subscription_notify() {
        let called = Rc::new(RefCell::new(false));
        let called_clone = called.clone();

        let sub = Subscription::new(1, move |_: &ListEvent<i32>| {
            *called_clone.borrow_mut() = true;
        });

        sub.notify(&ListEvent::added(vec![1]));
        assert!(*called.borrow());
    }

    #[test]
    fn test_subscription_notify_inactive() {
        let called = Rc::new(RefCell::new(false));
        let called_clone = called.clone();

        let mut sub = Subscription::new(1, move |_: &ListEvent<i32>| {
            *called_clone.borrow_mut() = true;
        });
        sub.deactivate();

        sub.notify(&ListEvent::added(vec![1]));
        assert!(!*called.borrow());
    }

    #[test]
    fn test_subscription_manager_subscribe() {
        let mut manager: SubscriptionManager<ListEvent<i32>> = SubscriptionManager::new();

        let id1 = manager.subscribe(|_| {});
        let id2 = manager.subscribe(|_| {});

        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_subscription_manager_unsubscribe() {
        let mut manager: SubscriptionManager<ListEvent<i32>> = SubscriptionManager::new();

        let id = manager.subscribe(|_| {});
        assert_eq!(manager.len(), 1);

        assert!(manager.unsubscribe(id));
        assert_eq!(manager.len(), 0);

        assert!(!manager.unsubscribe(id)); // Already removed
    }

    #[test]
    fn test_subscription_manager_notify_all() {
        let mut manager: SubscriptionManager<ListEvent<i32>> = SubscriptionManager::new();

        let count = Rc::new(RefCell::new(0));
        let count1 = count.clone();
        let count2 = count.clone();

        manager.subscribe(move |_| {
            *count1.borrow_mut() += 1;
        });
        manager.subscribe(move |_| {
            *count2.borrow_mut() += 1;
        });

        manager.notify_all(&ListEvent::added(vec![1]));
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_subscription_manager_clear() {
        let mut manager: SubscriptionManager<ListEvent<i32>> = SubscriptionManager::new();

        manager.subscribe(|_| {});
        manager.subscribe(|_| {});

        assert_eq!(manager.len(), 2);
        manager.clear();
        assert!(manager.is_empty());
    }
}
