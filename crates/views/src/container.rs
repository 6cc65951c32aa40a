//! Item containers and the shared change applier.
//!
//! Every view keeps one [`Container`] per live source item. The container
//! records the item's current source position, the derived value the view
//! computed from it, and the property watch that keeps that value fresh.
//!
//! [`apply_change`] is the single generic routine that keeps a container
//! column in lockstep with a source event: insertion, removal (by index or
//! by equality), in-place replacement, contiguous-run relocation and full
//! rebuild. It re-derives `source_index` for every shifted container
//! before returning, so positional invariants hold after every call, not
//! just eventually. Views layer their own policy on the returned
//! [`Applied`] summary.

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use vitre_core::{Error, ListEvent, Result};
use vitre_reactive::{ViewItem, WatchId};

/// Per-item state owned by a view.
///
/// A container is created when its item enters the source and destroyed
/// when the item leaves; `value` is the derived quantity (inclusion flag,
/// sort key, group slot) and is recomputed when the item's own watched
/// properties change.
pub struct Container<T, V> {
    pub item: T,
    /// Current position in the source.
    pub source_index: usize,
    /// The derived value computed from the item.
    pub value: V,
    /// Property watch on the item itself, if the view has triggers.
    pub watch: Option<WatchId>,
}

impl<T, V> Container<T, V> {
    /// Creates a container with no property watch.
    pub fn new(item: T, source_index: usize, value: V) -> Self {
        Self {
            item,
            source_index,
            value,
            watch: None,
        }
    }
}

impl<T: ViewItem, V> Container<T, V> {
    /// Releases the property watch, ending the container's lifecycle.
    pub fn release(self) {
        if let Some(id) = self.watch {
            self.item.unwatch(id);
        }
    }
}

/// What [`apply_change`] actually did, with resolved positions and the
/// extracted containers so the caller can release watches and translate
/// the change into its own output events.
pub enum Applied<T, V> {
    /// `count` containers were inserted starting at `index`.
    Added { index: usize, count: usize },
    /// Containers were extracted starting at `index`.
    Removed {
        index: usize,
        removed: Vec<Container<T, V>>,
    },
    /// Containers at `index` were swapped for `count` new ones.
    Replaced {
        index: usize,
        removed: Vec<Container<T, V>>,
        count: usize,
    },
    /// A run of `count` containers moved from `from` to `to`.
    Moved {
        from: usize,
        to: usize,
        count: usize,
    },
    /// Everything was extracted and the column rebuilt from scratch.
    Rebuilt { removed: Vec<Container<T, V>> },
    /// The event touched nothing.
    Noop,
}

/// Resolves the position of `probe` in the container column.
///
/// When the event carried an index it is bounds-checked and verified
/// against the item actually there; an index-less event falls back to an
/// equality scan. With duplicate equal items the scan picks the first
/// match — callers needing exact resolution should use items with
/// identity equality.
pub fn resolve_index<T, V>(
    containers: &[Container<T, V>],
    probe: &T,
    index: Option<usize>,
    eq: &dyn Fn(&T, &T) -> bool,
) -> Result<usize> {
    match index {
        Some(i) => {
            if i >= containers.len() {
                return Err(Error::invalid_index(i, containers.len()));
            }
            if !eq(&containers[i].item, probe) {
                return Err(Error::item_mismatch(i));
            }
            Ok(i)
        }
        None => containers
            .iter()
            .position(|c| eq(&c.item, probe))
            .ok_or(Error::NotFound),
    }
}

fn reindex<T, V>(containers: &mut [Container<T, V>], from: usize) {
    for (i, c) in containers.iter_mut().enumerate().skip(from) {
        c.source_index = i;
    }
}

/// Applies one source event to a container column.
///
/// `rebuild` supplies the live source enumeration and is only consulted
/// for `Reset`. `make` computes the derived value (and wires the property
/// watch) for each item entering the column. Extracted containers are
/// returned unreleased; the caller owns their teardown.
pub fn apply_change<T, V>(
    containers: &mut Vec<Container<T, V>>,
    event: &ListEvent<T>,
    rebuild: &[T],
    make: &mut dyn FnMut(&T, usize) -> Container<T, V>,
    eq: &dyn Fn(&T, &T) -> bool,
) -> Result<Applied<T, V>>
where
    T: Clone,
{
    match event {
        ListEvent::Add { items, index } => {
            if items.is_empty() {
                return Ok(Applied::Noop);
            }
            let at = index.unwrap_or(containers.len());
            if at > containers.len() {
                return Err(Error::invalid_index(at, containers.len()));
            }
            let made: Vec<_> = items
                .iter()
                .enumerate()
                .map(|(k, item)| make(item, at + k))
                .collect();
            containers.splice(at..at, made);
            reindex(containers, at + items.len());
            Ok(Applied::Added {
                index: at,
                count: items.len(),
            })
        }
        ListEvent::Remove { items, index } => {
            if items.is_empty() {
                return Ok(Applied::Noop);
            }
            let at = resolve_index(containers, &items[0], *index, eq)?;
            if at + items.len() > containers.len() {
                return Err(Error::invalid_index(at + items.len() - 1, containers.len()));
            }
            for (k, item) in items.iter().enumerate() {
                if !eq(&containers[at + k].item, item) {
                    return Err(Error::item_mismatch(at + k));
                }
            }
            let removed: Vec<_> = containers.drain(at..at + items.len()).collect();
            reindex(containers, at);
            Ok(Applied::Removed { index: at, removed })
        }
        ListEvent::Replace { old, new, index } => {
            if old.is_empty() && new.is_empty() {
                return Ok(Applied::Noop);
            }
            let at = resolve_index(containers, &old[0], *index, eq)?;
            if at + old.len() > containers.len() {
                return Err(Error::invalid_index(at + old.len() - 1, containers.len()));
            }
            for (k, item) in old.iter().enumerate() {
                if !eq(&containers[at + k].item, item) {
                    return Err(Error::item_mismatch(at + k));
                }
            }
            let removed: Vec<_> = containers.drain(at..at + old.len()).collect();
            let made: Vec<_> = new
                .iter()
                .enumerate()
                .map(|(k, item)| make(item, at + k))
                .collect();
            containers.splice(at..at, made);
            reindex(containers, at + new.len());
            Ok(Applied::Replaced {
                index: at,
                removed,
                count: new.len(),
            })
        }
        ListEvent::Move { items, from, to } => {
            if items.is_empty() || from == to {
                return Ok(Applied::Noop);
            }
            let count = items.len();
            if *from + count > containers.len() {
                return Err(Error::invalid_index(*from + count - 1, containers.len()));
            }
            if *to + count > containers.len() {
                return Err(Error::invalid_index(*to + count - 1, containers.len()));
            }
            for (k, item) in items.iter().enumerate() {
                if !eq(&containers[*from + k].item, item) {
                    return Err(Error::item_mismatch(*from + k));
                }
            }
            let run: Vec<_> = containers.drain(*from..*from + count).collect();
            containers.splice(*to..*to, run);
            reindex(containers, (*from).min(*to));
            Ok(Applied::Moved {
                from: *from,
                to: *to,
                count,
            })
        }
        ListEvent::Reset => {
            let removed = core::mem::take(containers);
            *containers = rebuild
                .iter()
                .enumerate()
                .map(|(i, item)| make(item, i))
                .collect();
            Ok(Applied::Rebuilt { removed })
        }
    }
}

/// Configuration shared by every view constructor.
///
/// `triggers` names the item properties whose change forces recomputation
/// of the derived value; an empty list means the value never changes in
/// place. `eq` overrides the equality used to resolve index-less events
/// (defaults to `PartialEq`).
pub struct ViewSettings<T> {
    pub triggers: Vec<String>,
    pub eq: Option<Rc<dyn Fn(&T, &T) -> bool>>,
}

impl<T> Default for ViewSettings<T> {
    fn default() -> Self {
        Self {
            triggers: Vec::new(),
            eq: None,
        }
    }
}

impl<T> Clone for ViewSettings<T> {
    fn clone(&self) -> Self {
        Self {
            triggers: self.triggers.clone(),
            eq: self.eq.clone(),
        }
    }
}

impl<T> ViewSettings<T> {
    /// Adds a trigger property name.
    pub fn with_trigger(mut self, property: &str) -> Self {
        self.triggers.push(property.to_string());
        self
    }

    /// Overrides the equality comparer used for index-less events.
    pub fn with_eq(mut self, eq: impl Fn(&T, &T) -> bool + 'static) -> Self {
        self.eq = Some(Rc::new(eq));
        self
    }
}

impl<T: PartialEq + 'static> ViewSettings<T> {
    pub(crate) fn eq_fn(&self) -> Rc<dyn Fn(&T, &T) -> bool> {
        self.eq
            .clone()
            .unwrap_or_else(|| Rc::new(|a: &T, b: &T| a == b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn plain(items: &[i32]) -> Vec<Container<i32, ()>> {
        items
            .iter()
            .enumerate()
            .map(|(i, &x)| Container::new(x, i, ()))
            .collect()
    }

    fn apply(
        containers: &mut Vec<Container<i32, ()>>,
        event: &ListEvent<i32>,
        rebuild: &[i32],
    ) -> Result<Applied<i32, ()>> {
        apply_change(
            containers,
            event,
            rebuild,
            &mut |item, i| Container::new(*item, i, ()),
            &|a, b| a == b,
        )
    }

    fn items(containers: &[Container<i32, ()>]) -> Vec<i32> {
        containers.iter().map(|c| c.item).collect()
    }

    fn indices_consistent(containers: &[Container<i32, ()>]) -> bool {
        containers.iter().enumerate().all(|(i, c)| c.source_index == i)
    }

    #[test]
    fn test_apply_add_at_index() {
        let mut cs = plain(&[1, 4]);
        let applied = apply(&mut cs, &ListEvent::added_at(vec![2, 3], 1), &[]).unwrap();

        assert!(matches!(applied, Applied::Added { index: 1, count: 2 }));
        assert_eq!(items(&cs), vec![1, 2, 3, 4]);
        assert!(indices_consistent(&cs));
    }

    #[test]
    fn test_apply_add_unknown_index_appends() {
        let mut cs = plain(&[1]);
        apply(&mut cs, &ListEvent::added(vec![2]), &[]).unwrap();
        assert_eq!(items(&cs), vec![1, 2]);
    }

    #[test]
    fn test_apply_remove_by_index_verifies_item() {
        let mut cs = plain(&[1, 2, 3]);
        let err = apply(&mut cs, &ListEvent::removed_at(vec![9], 1), &[]);
        assert_eq!(err.err(), Some(Error::item_mismatch(1)));

        let applied = apply(&mut cs, &ListEvent::removed_at(vec![2], 1), &[]).unwrap();
        match applied {
            Applied::Removed { index, removed } => {
                assert_eq!(index, 1);
                assert_eq!(removed.len(), 1);
            }
            _ => panic!("expected Removed"),
        }
        assert_eq!(items(&cs), vec![1, 3]);
        assert!(indices_consistent(&cs));
    }

    #[test]
    fn test_apply_remove_by_equality() {
        let mut cs = plain(&[5, 6, 7]);
        let applied = apply(&mut cs, &ListEvent::removed(vec![6]), &[]).unwrap();
        assert!(matches!(applied, Applied::Removed { index: 1, .. }));
        assert_eq!(items(&cs), vec![5, 7]);

        let err = apply(&mut cs, &ListEvent::removed(vec![42]), &[]);
        assert_eq!(err.err(), Some(Error::NotFound));
    }

    #[test]
    fn test_apply_replace() {
        let mut cs = plain(&[1, 2, 3]);
        let applied =
            apply(&mut cs, &ListEvent::replaced_at(vec![2], vec![8, 9], 1), &[]).unwrap();
        assert!(matches!(
            applied,
            Applied::Replaced { index: 1, count: 2, .. }
        ));
        assert_eq!(items(&cs), vec![1, 8, 9, 3]);
        assert!(indices_consistent(&cs));
    }

    #[test]
    fn test_apply_move_forward_and_back() {
        let mut cs = plain(&[1, 2, 3, 4]);
        apply(&mut cs, &ListEvent::moved(vec![1], 0, 2), &[]).unwrap();
        assert_eq!(items(&cs), vec![2, 3, 1, 4]);
        assert!(indices_consistent(&cs));

        apply(&mut cs, &ListEvent::moved(vec![1], 2, 0), &[]).unwrap();
        assert_eq!(items(&cs), vec![1, 2, 3, 4]);
        assert!(indices_consistent(&cs));
    }

    #[test]
    fn test_apply_reset_rebuilds() {
        let mut cs = plain(&[1, 2]);
        let applied = apply(&mut cs, &ListEvent::Reset, &[7, 8, 9]).unwrap();
        match applied {
            Applied::Rebuilt { removed } => assert_eq!(removed.len(), 2),
            _ => panic!("expected Rebuilt"),
        }
        assert_eq!(items(&cs), vec![7, 8, 9]);
        assert!(indices_consistent(&cs));
    }

    #[test]
    fn test_resolve_index_first_match_on_duplicates() {
        let cs = plain(&[1, 2, 2]);
        let pos = resolve_index(&cs, &2, None, &|a, b| a == b).unwrap();
        assert_eq!(pos, 1);
    }
}
