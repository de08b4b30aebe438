//! Nesting child rows into their roots.
//!
//! A query that LEFT JOINs a root to two child tables returns one row per
//! (child A, child B) pair, so every child appears many times. The helpers
//! here fold such rows back into one value per root, with each collection
//! deduplicated by id and sorted by `(order_index, id)`.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// A child row with an identity and a display position.
pub trait IndexedChild {
    /// Identity used for deduplication.
    type Id: Ord + Copy;

    fn child_id(&self) -> Self::Id;

    fn order_index(&self) -> i32;
}

/// Deduplicating, ordered collection of children.
#[derive(Debug, Clone)]
pub struct ChildSet<C: IndexedChild> {
    by_id: BTreeMap<C::Id, C>,
}

impl<C: IndexedChild> Default for ChildSet<C> {
    fn default() -> Self {
        Self {
            by_id: BTreeMap::new(),
        }
    }
}

impl<C: IndexedChild> ChildSet<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a child; a child whose id is already present is ignored.
    pub fn insert(&mut self, child: C) {
        self.by_id.entry(child.child_id()).or_insert(child);
    }

    /// Add the child of a LEFT JOIN row, if the join matched.
    pub fn insert_opt(&mut self, child: Option<C>) {
        if let Some(child) = child {
            self.insert(child);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Children sorted by `(order_index, id)`.
    #[must_use]
    pub fn into_sorted(self) -> Vec<C> {
        let mut children: Vec<C> = self.by_id.into_values().collect();
        children.sort_by_key(|c| (c.order_index(), c.child_id()));
        children
    }
}

impl<C: IndexedChild> FromIterator<C> for ChildSet<C> {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        let mut set = Self::new();
        for child in iter {
            set.insert(child);
        }
        set
    }
}

/// Fold joined rows into one accumulator per root.
///
/// `key` extracts the root id, `init` builds the accumulator from the first
/// row seen for a root, and `absorb` merges every row (including the first)
/// into it. Roots come out in the order they were first seen, so an
/// `ORDER BY` on the root columns survives the fold.
pub fn fold_fan_out<R, K, A>(
    rows: impl IntoIterator<Item = R>,
    key: impl Fn(&R) -> K,
    init: impl Fn(&R) -> A,
    absorb: impl Fn(&mut A, R),
) -> Vec<A>
where
    K: Eq + Hash,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut roots: Vec<A> = Vec::new();

    for row in rows {
        let position = *positions.entry(key(&row)).or_insert_with(|| {
            roots.push(init(&row));
            roots.len() - 1
        });
        if let Some(root) = roots.get_mut(position) {
            absorb(root, row);
        }
    }

    roots
}

/// Group already-ordered child rows by their parent id.
pub fn group_by_parent<K, C>(
    children: impl IntoIterator<Item = C>,
    parent: impl Fn(&C) -> K,
) -> HashMap<K, Vec<C>>
where
    K: Eq + Hash,
{
    let mut groups: HashMap<K, Vec<C>> = HashMap::new();
    for child in children {
        groups.entry(parent(&child)).or_default().push(child);
    }
    groups
}
