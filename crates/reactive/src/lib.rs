//! Vitre Reactive - Subscriptions, notifications and observable sources.
//!
//! This crate provides the plumbing between a mutable source collection and
//! the derived views that observe it:
//!
//! - `SubscriptionManager<E>`: callback registry for any event stream
//! - `PropertyHub` / `Tracked<T>`: per-item "named property changed"
//!   notifications, so derived state can change without the collection changing
//! - `ViewItem`: what a view requires of its items (cheap clone, equality,
//!   optional property watching)
//! - `ObservableList<T>` / `ObservableVec<T>`: the source-collection
//!   interface and its reference implementation
//!
//! # Example
//!
//! ```ignore
//! use vitre_reactive::{ObservableVec, ObservableList};
//!
//! let list = ObservableVec::new();
//! list.observe(Box::new(|ev| {
//!     // every mutation arrives here as a ListEvent
//! }));
//!
//! list.push(1);
//! list.insert(0, 2).unwrap();
//! ```

#![no_std]

extern crate alloc;

pub mod notify;
pub mod observable;
pub mod subscription;

pub use notify::{PropertyCallback, PropertyHub, Tracked, ViewItem, WatchId};
pub use observable::{ObservableList, ObservableVec};
pub use subscription::{Subscription, SubscriptionId, SubscriptionManager};
