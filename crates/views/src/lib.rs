//! Vitre Views - Incremental view maintenance for observable collections.
//!
//! This crate keeps derived presentations of a change-notifying sequence
//! continuously consistent without rescanning the source: every mutation
//! event is translated into the minimal set of downstream events, and the
//! derived enumeration always equals what a full recomputation would yield.
//!
//! # Core Concepts
//!
//! - `Container<T, V>`: per-item wrapper holding the item, its source
//!   position, the derived value (filter verdict, sort key, group slot)
//!   and the item's property watch
//! - `apply_change`: the one shared routine that keeps a container column
//!   in lockstep with its source; every view is a policy layered on it
//! - `FilteredView`: predicate inclusion with a live visible count
//! - `SortedView`: binary-search-maintained order, source-stable ties
//! - `GroupedView`: dynamic key partition with explicit/implicit groups
//! - `CompositeView`: N sources concatenated behind running offsets
//!
//! Views implement `ObservableList` themselves, so they compose: a sorted
//! view can read a filtered view, a group can feed another view.
//!
//! # Example
//!
//! ```ignore
//! use vitre_reactive::{ObservableList, ObservableVec};
//! use vitre_views::{SortedView, ViewSettings};
//!
//! let source = ObservableVec::from_items(vec![3, 1, 2]);
//! let sorted = SortedView::by_key(&source, |x: &i32| *x, ViewSettings::default());
//!
//! assert_eq!(sorted.snapshot(), vec![1, 2, 3]);
//! source.insert(1, 0).unwrap();
//! assert_eq!(sorted.snapshot(), vec![0, 1, 2, 3]);
//! ```

#![no_std]

extern crate alloc;

pub mod composite;
pub mod container;
pub mod filtered;
pub mod grouped;
pub mod sorted;

pub use composite::CompositeView;
pub use container::{apply_change, resolve_index, Applied, Container, ViewSettings};
pub use filtered::FilteredView;
pub use grouped::{Group, GroupedView};
pub use sorted::SortedView;
