//! Change-event protocol for observable sequences.
//!
//! A `ListEvent` describes one mutation of an ordered collection. Events
//! carry the affected items as values, not just positions, because some
//! sources cannot report positions at all; such events have `index: None`
//! and must be resolved with an equality comparison downstream.

use alloc::vec::Vec;

/// The discriminant of a [`ListEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Add,
    Remove,
    Replace,
    Move,
    Reset,
}

/// A mutation notification for an ordered collection.
///
/// `index` is the source-relative start position of the affected run when
/// the source knows it, or `None` when it does not. A `Reset` carries no
/// items and means "discard all derived state and rebuild from the live
/// source enumeration".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListEvent<T> {
    /// Items were inserted, starting at `index` (appended if unknown).
    Add { items: Vec<T>, index: Option<usize> },
    /// Items were removed, starting at `index`.
    Remove { items: Vec<T>, index: Option<usize> },
    /// `old` items were replaced in place by `new` items at `index`.
    Replace {
        old: Vec<T>,
        new: Vec<T>,
        index: Option<usize>,
    },
    /// A contiguous run of items was relocated from `from` to `to`.
    Move {
        items: Vec<T>,
        from: usize,
        to: usize,
    },
    /// The collection changed wholesale; rebuild from scratch.
    Reset,
}

impl<T> ListEvent<T> {
    /// Creates an Add event with an unknown position (append semantics).
    #[inline]
    pub fn added(items: Vec<T>) -> Self {
        ListEvent::Add { items, index: None }
    }

    /// Creates an Add event at a known position.
    #[inline]
    pub fn added_at(items: Vec<T>, index: usize) -> Self {
        ListEvent::Add {
            items,
            index: Some(index),
        }
    }

    /// Creates a Remove event with an unknown position.
    #[inline]
    pub fn removed(items: Vec<T>) -> Self {
        ListEvent::Remove { items, index: None }
    }

    /// Creates a Remove event at a known position.
    #[inline]
    pub fn removed_at(items: Vec<T>, index: usize) -> Self {
        ListEvent::Remove {
            items,
            index: Some(index),
        }
    }

    /// Creates a Replace event at a known position.
    #[inline]
    pub fn replaced_at(old: Vec<T>, new: Vec<T>, index: usize) -> Self {
        ListEvent::Replace {
            old,
            new,
            index: Some(index),
        }
    }

    /// Creates a Move event for a contiguous run.
    #[inline]
    pub fn moved(items: Vec<T>, from: usize, to: usize) -> Self {
        ListEvent::Move { items, from, to }
    }

    /// Returns the event discriminant.
    pub fn kind(&self) -> EventKind {
        match self {
            ListEvent::Add { .. } => EventKind::Add,
            ListEvent::Remove { .. } => EventKind::Remove,
            ListEvent::Replace { .. } => EventKind::Replace,
            ListEvent::Move { .. } => EventKind::Move,
            ListEvent::Reset => EventKind::Reset,
        }
    }

    /// Returns the source-relative start index, if the source reported one.
    ///
    /// For `Move` this is the origin position; `Reset` has no index.
    pub fn index(&self) -> Option<usize> {
        match self {
            ListEvent::Add { index, .. }
            | ListEvent::Remove { index, .. }
            | ListEvent::Replace { index, .. } => *index,
            ListEvent::Move { from, .. } => Some(*from),
            ListEvent::Reset => None,
        }
    }

    /// Returns the number of items this event touches.
    ///
    /// `Reset` reports zero even though it invalidates everything.
    pub fn len(&self) -> usize {
        match self {
            ListEvent::Add { items, .. }
            | ListEvent::Remove { items, .. }
            | ListEvent::Move { items, .. } => items.len(),
            ListEvent::Replace { new, .. } => new.len(),
            ListEvent::Reset => 0,
        }
    }

    /// Returns true if the event touches no items and is not a Reset.
    pub fn is_empty(&self) -> bool {
        !matches!(self, ListEvent::Reset) && self.len() == 0
    }

    /// Translates the carried items to another type, preserving positions.
    pub fn map<U, F>(self, mut f: F) -> ListEvent<U>
    where
        F: FnMut(T) -> U,
    {
        match self {
            ListEvent::Add { items, index } => ListEvent::Add {
                items: items.into_iter().map(&mut f).collect(),
                index,
            },
            ListEvent::Remove { items, index } => ListEvent::Remove {
                items: items.into_iter().map(&mut f).collect(),
                index,
            },
            ListEvent::Replace { old, new, index } => ListEvent::Replace {
                old: old.into_iter().map(&mut f).collect(),
                new: new.into_iter().map(&mut f).collect(),
                index,
            },
            ListEvent::Move { items, from, to } => ListEvent::Move {
                items: items.into_iter().map(&mut f).collect(),
                from,
                to,
            },
            ListEvent::Reset => ListEvent::Reset,
        }
    }

    /// Shifts every known position by `offset`.
    ///
    /// Used by concatenating views to relocate an upstream event into the
    /// flattened index space. Index-less events pass through unchanged.
    pub fn offset_by(self, offset: usize) -> ListEvent<T> {
        match self {
            ListEvent::Add { items, index } => ListEvent::Add {
                items,
                index: index.map(|i| i + offset),
            },
            ListEvent::Remove { items, index } => ListEvent::Remove {
                items,
                index: index.map(|i| i + offset),
            },
            ListEvent::Replace { old, new, index } => ListEvent::Replace {
                old,
                new,
                index: index.map(|i| i + offset),
            },
            ListEvent::Move { items, from, to } => ListEvent::Move {
                items,
                from: from + offset,
                to: to + offset,
            },
            ListEvent::Reset => ListEvent::Reset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_event_kind() {
        assert_eq!(ListEvent::added(vec![1]).kind(), EventKind::Add);
        assert_eq!(ListEvent::removed(vec![1]).kind(), EventKind::Remove);
        assert_eq!(
            ListEvent::replaced_at(vec![1], vec![2], 0).kind(),
            EventKind::Replace
        );
        assert_eq!(ListEvent::moved(vec![1], 0, 2).kind(), EventKind::Move);
        assert_eq!(ListEvent::<i32>::Reset.kind(), EventKind::Reset);
    }

    #[test]
    fn test_event_index() {
        assert_eq!(ListEvent::added_at(vec![1], 5).index(), Some(5));
        assert_eq!(ListEvent::added(vec![1]).index(), None);
        assert_eq!(ListEvent::moved(vec![1], 2, 7).index(), Some(2));
        assert_eq!(ListEvent::<i32>::Reset.index(), None);
    }

    #[test]
    fn test_event_len() {
        assert_eq!(ListEvent::added(vec![1, 2, 3]).len(), 3);
        assert_eq!(ListEvent::replaced_at(vec![1], vec![2, 3], 0).len(), 2);
        assert_eq!(ListEvent::<i32>::Reset.len(), 0);
        assert!(!ListEvent::<i32>::Reset.is_empty());
        assert!(ListEvent::added(Vec::<i32>::new()).is_empty());
    }

    #[test]
    fn test_event_map() {
        let ev = ListEvent::added_at(vec![1, 2], 4).map(|x| x * 10);
        assert_eq!(ev, ListEvent::added_at(vec![10, 20], 4));

        let ev = ListEvent::replaced_at(vec![1], vec![2], 0).map(|x| x + 1);
        assert_eq!(ev, ListEvent::replaced_at(vec![2], vec![3], 0));
    }

    #[test]
    fn test_event_offset() {
        let ev = ListEvent::added_at(vec![1], 2).offset_by(10);
        assert_eq!(ev.index(), Some(12));

        let ev = ListEvent::moved(vec![1], 0, 3).offset_by(5);
        assert_eq!(ev, ListEvent::moved(vec![1], 5, 8));

        // Unknown positions stay unknown.
        let ev = ListEvent::removed(vec![1]).offset_by(10);
        assert_eq!(ev.index(), None);
    }
}
