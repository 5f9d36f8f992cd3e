// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A cycling-axis kd-tree: a binary space partition where depth `d`
//! splits on axis `d mod dims`, with exact split points (every split
//! coincides with a stored entry rather than a synthetic midpoint).
//!
//! Window queries and kNN both descend the tree lazily through
//! [`iter::WindowIter`] and [`iter::KnnIter`].

mod node;

pub mod iter;

use crate::error::{check_dims, SpindexError, SpindexResult};
use crate::traits::{PointMap, PointMultimap, SpatialIndex};
use node::KdNode;

pub use iter::{KnnIter, WindowIter};

/// A kd-tree over `dims`-dimensional points, usable as either a
/// [`PointMap`] (at most one value per coordinate) or a
/// [`PointMultimap`] (several values at the same coordinate) depending
/// on which trait's methods are called.
pub struct KdTree<V> {
    dims: usize,
    root: Option<Box<KdNode<V>>>,
    size: usize,
}

impl<V> KdTree<V> {
    /// Creates an empty tree over `dims`-dimensional points.
    pub fn new(dims: usize) -> Self {
        KdTree { dims, root: None, size: 0 }
    }

    /// The value at exactly `point`, along with a bool meaning "more
    /// than one entry may share these coordinates" is not exposed here;
    /// see [`PointMap::query_exact`] for a single value or iterate a
    /// zero-radius window for every value at a point in a multimap.
    fn exact(&self, point: &[f64]) -> Option<&KdNode<V>> {
        node::find_exact(&self.root, point)
    }

    /// All entries inside the closed box `[min, max]`.
    pub fn window_query(&self, min: &[f64], max: &[f64]) -> SpindexResult<WindowIter<'_, V>> {
        check_dims(self.dims, min.len())?;
        check_dims(self.dims, max.len())?;
        Ok(WindowIter::new(self.root.as_deref(), min.to_vec(), max.to_vec()))
    }

    /// Every stored entry, in no particular order. Reuses the window
    /// traversal over an unbounded box, so it shares the same lazy,
    /// restartable stack-walk `window_query` does.
    pub fn iterator(&self) -> WindowIter<'_, V> {
        WindowIter::new(self.root.as_deref(), vec![f64::NEG_INFINITY; self.dims], vec![f64::INFINITY; self.dims])
    }

    /// The `k` nearest entries to `centre` under `dist`, ascending by
    /// distance. `k == 0` yields an iterator producing nothing; `k < 0`
    /// is a caller error.
    pub fn query_knn<D>(&self, centre: &[f64], k: i64, dist: D) -> SpindexResult<KnnIter<'_, V, D>>
    where
        D: Fn(&[f64], &[f64]) -> f64,
    {
        check_dims(self.dims, centre.len())?;
        if k < 0 {
            return Err(SpindexError::InvalidK { k });
        }
        Ok(KnnIter::new(self.root.as_deref(), centre.to_vec(), k as usize, dist))
    }

    /// The single nearest entry to `centre` under `dist`, if the tree is
    /// non-empty.
    pub fn query_1nn<D>(&self, centre: &[f64], dist: D) -> SpindexResult<Option<(&[f64], &V, f64)>>
    where
        D: Fn(&[f64], &[f64]) -> f64,
    {
        Ok(self.query_knn(centre, 1, dist)?.next())
    }
}

impl<V> SpatialIndex for KdTree<V> {
    fn dims(&self) -> usize {
        self.dims
    }

    fn size(&self) -> usize {
        self.size
    }

    fn clear(&mut self) {
        self.root = None;
        self.size = 0;
    }
}

impl<V> PointMap<V> for KdTree<V> {
    fn insert(&mut self, point: &[f64], value: V) -> SpindexResult<Option<V>> {
        check_dims(self.dims, point.len())?;
        if let Some(existing) = node::find_exact_mut(&mut self.root, point) {
            return Ok(Some(std::mem::replace(&mut existing.value, value)));
        }
        node::insert(&mut self.root, point.to_vec(), value, 0, self.dims);
        self.size += 1;
        Ok(None)
    }

    fn remove(&mut self, point: &[f64]) -> SpindexResult<Option<V>> {
        check_dims(self.dims, point.len())?;
        let (new_root, removed) = node::remove_where(self.root.take(), point, &mut |_| true);
        self.root = new_root;
        if removed.is_some() {
            self.size -= 1;
        }
        Ok(removed)
    }

    fn update(&mut self, old: &[f64], new: &[f64]) -> SpindexResult<Option<V>> {
        check_dims(self.dims, old.len())?;
        check_dims(self.dims, new.len())?;
        let (new_root, removed) = node::remove_where(self.root.take(), old, &mut |_| true);
        self.root = new_root;
        match removed {
            None => Ok(None),
            Some(value) => {
                self.size -= 1;
                let replaced = <Self as PointMap<V>>::insert(self, new, value)?;
                Ok(replaced)
            }
        }
    }

    fn query_exact(&self, point: &[f64]) -> SpindexResult<Option<&V>> {
        check_dims(self.dims, point.len())?;
        Ok(self.exact(point).map(|n| &n.value))
    }
}

impl<V> PointMultimap<V> for KdTree<V> {
    fn insert(&mut self, point: &[f64], value: V) -> SpindexResult<()> {
        check_dims(self.dims, point.len())?;
        node::insert(&mut self.root, point.to_vec(), value, 0, self.dims);
        self.size += 1;
        Ok(())
    }

    fn remove(&mut self, point: &[f64], value: &V) -> SpindexResult<bool>
    where
        V: PartialEq,
    {
        check_dims(self.dims, point.len())?;
        let (new_root, removed) = node::remove_where(self.root.take(), point, &mut |v| v == value);
        self.root = new_root;
        let found = removed.is_some();
        if found {
            self.size -= 1;
        }
        Ok(found)
    }

    fn remove_if<F: FnMut(&V) -> bool>(&mut self, point: &[f64], mut pred: F) -> SpindexResult<bool> {
        check_dims(self.dims, point.len())?;
        let (new_root, removed) = node::remove_where(self.root.take(), point, &mut pred);
        self.root = new_root;
        let found = removed.is_some();
        if found {
            self.size -= 1;
        }
        Ok(found)
    }

    fn update(&mut self, old: &[f64], new: &[f64], value: &V) -> SpindexResult<bool>
    where
        V: PartialEq,
    {
        check_dims(self.dims, old.len())?;
        check_dims(self.dims, new.len())?;
        let (new_root, removed) = node::remove_where(self.root.take(), old, &mut |v| v == value);
        self.root = new_root;
        match removed {
            None => Ok(false),
            Some(value) => {
                self.size -= 1;
                <Self as PointMultimap<V>>::insert(self, new, value)?;
                Ok(true)
            }
        }
    }

    fn contains(&self, point: &[f64], value: &V) -> SpindexResult<bool>
    where
        V: PartialEq,
    {
        check_dims(self.dims, point.len())?;
        Ok(self.exact(point).map_or(false, |n| &n.value == value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::l2;

    #[test]
    fn insert_and_query_exact() {
        let mut t = KdTree::new(2);
        PointMap::insert(&mut t, &[1.0, 2.0], "a").unwrap();
        PointMap::insert(&mut t, &[3.0, 4.0], "b").unwrap();
        assert_eq!(t.query_exact(&[1.0, 2.0]).unwrap(), Some(&"a"));
        assert_eq!(t.query_exact(&[9.0, 9.0]).unwrap(), None);
        assert_eq!(t.size(), 2);
    }

    #[test]
    fn insert_replaces_at_same_point_as_a_map() {
        let mut t = KdTree::new(2);
        assert_eq!(PointMap::insert(&mut t, &[1.0, 1.0], "a").unwrap(), None);
        assert_eq!(PointMap::insert(&mut t, &[1.0, 1.0], "b").unwrap(), Some("a"));
        assert_eq!(t.size(), 1);
        assert_eq!(t.query_exact(&[1.0, 1.0]).unwrap(), Some(&"b"));
    }

    #[test]
    fn dimension_mismatch_leaves_tree_unchanged() {
        let mut t = KdTree::new(2);
        PointMap::insert(&mut t, &[1.0, 1.0], "a").unwrap();
        let err = PointMap::insert(&mut t, &[1.0, 1.0, 1.0], "x").unwrap_err();
        assert_eq!(err, SpindexError::DimensionMismatch { expected: 2, got: 3 });
        assert_eq!(t.size(), 1);
    }

    #[test]
    fn dimension_mismatch_on_remove_and_query_exact_is_an_error() {
        let mut t = KdTree::new(2);
        PointMap::insert(&mut t, &[1.0, 1.0], "a").unwrap();
        assert!(PointMap::remove(&mut t, &[1.0]).is_err());
        assert!(t.query_exact(&[1.0]).is_err());
        assert!(PointMultimap::contains(&t, &[1.0], &"a").is_err());
        assert_eq!(t.size(), 1);
    }

    #[test]
    fn remove_restores_invariant_across_many_points() {
        let mut t = KdTree::new(2);
        let points = [
            [5.0, 4.0],
            [2.0, 6.0],
            [8.0, 1.0],
            [9.0, 7.0],
            [1.0, 3.0],
            [7.0, 2.0],
            [4.0, 9.0],
        ];
        for (i, p) in points.iter().enumerate() {
            PointMap::insert(&mut t, p, i).unwrap();
        }
        for p in &points {
            assert!(PointMap::remove(&mut t, p).unwrap().is_some());
        }
        assert_eq!(t.size(), 0);
        for p in &points {
            assert_eq!(t.query_exact(p).unwrap(), None);
        }
    }

    #[test]
    fn multimap_allows_duplicate_coordinates() {
        let mut t = KdTree::new(1);
        PointMultimap::insert(&mut t, &[1.0], "a").unwrap();
        PointMultimap::insert(&mut t, &[1.0], "b").unwrap();
        assert_eq!(t.size(), 2);
        assert!(PointMultimap::contains(&t, &[1.0], &"a").unwrap());
        assert!(PointMultimap::contains(&t, &[1.0], &"b").unwrap());
        assert!(PointMultimap::remove(&mut t, &[1.0], &"a").unwrap());
        assert_eq!(t.size(), 1);
        assert!(!PointMultimap::contains(&t, &[1.0], &"a").unwrap());
        assert!(PointMultimap::contains(&t, &[1.0], &"b").unwrap());
    }

    #[test]
    fn window_query_returns_only_points_inside() {
        let mut t = KdTree::new(2);
        let points = [[0.0, 0.0], [5.0, 5.0], [10.0, 10.0], [5.0, 0.0], [0.0, 10.0]];
        for (i, p) in points.iter().enumerate() {
            PointMap::insert(&mut t, p, i).unwrap();
        }
        let mut found: Vec<_> = t.window_query(&[1.0, 1.0], &[9.0, 9.0]).unwrap().map(|(_, v)| *v).collect();
        found.sort_unstable();
        assert_eq!(found, vec![1]);
    }

    #[test]
    fn window_query_empty_when_min_exceeds_max() {
        let mut t = KdTree::new(1);
        PointMap::insert(&mut t, &[1.0], "a").unwrap();
        let mut it = t.window_query(&[5.0], &[0.0]).unwrap();
        assert_eq!(it.next(), None);
    }

    #[test]
    fn iterator_visits_every_entry() {
        let mut t = KdTree::new(2);
        let points = [[0.0, 0.0], [5.0, 5.0], [-5.0, -5.0]];
        for (i, p) in points.iter().enumerate() {
            PointMap::insert(&mut t, p, i).unwrap();
        }
        assert_eq!(t.iterator().count(), t.size());
    }

    #[test]
    fn knn_returns_nearest_first() {
        let mut t = KdTree::new(2);
        let points = [[0.0, 0.0], [10.0, 10.0], [1.0, 1.0], [5.0, 5.0]];
        for (i, p) in points.iter().enumerate() {
            PointMap::insert(&mut t, p, i).unwrap();
        }
        let got: Vec<_> = t.query_knn(&[0.0, 0.0], 2, l2).unwrap().map(|(_, v, _)| *v).collect();
        assert_eq!(got, vec![0, 2]);
    }

    #[test]
    fn query_1nn_matches_first_knn_result() {
        let mut t = KdTree::new(2);
        let points = [[0.0, 0.0], [10.0, 10.0], [1.0, 1.0]];
        for (i, p) in points.iter().enumerate() {
            PointMap::insert(&mut t, p, i).unwrap();
        }
        let (_, v, _) = t.query_1nn(&[0.5, 0.5], l2).unwrap().unwrap();
        assert_eq!(*v, 0);
    }

    #[test]
    fn knn_k_zero_is_empty() {
        let mut t = KdTree::new(1);
        PointMap::insert(&mut t, &[1.0], "a").unwrap();
        let mut it = t.query_knn(&[0.0], 0, l2).unwrap();
        assert_eq!(it.next(), None);
    }

    #[test]
    fn knn_negative_k_is_an_error() {
        let t: KdTree<&str> = KdTree::new(1);
        assert!(t.query_knn(&[0.0], -1, l2).is_err());
    }

    #[test]
    fn knn_iter_reset_reuses_for_new_query() {
        let mut t = KdTree::new(1);
        PointMap::insert(&mut t, &[0.0], "a").unwrap();
        PointMap::insert(&mut t, &[100.0], "b").unwrap();
        let mut it = t.query_knn(&[0.0], 1, l2).unwrap();
        assert_eq!(it.next().map(|(_, v, _)| *v), Some("a"));
        it.reset(&[100.0], 1);
        assert_eq!(it.next().map(|(_, v, _)| *v), Some("b"));
    }

    #[test]
    fn knn_iter_is_lazy_until_polled() {
        // a dropped iterator that is never polled must not have touched
        // the tree at all; polling once must yield exactly the nearest
        // point without needing a second call to make progress.
        let mut t = KdTree::new(1);
        for i in 0..50 {
            PointMap::insert(&mut t, &[i as f64], i).unwrap();
        }
        let mut it = t.query_knn(&[0.0], 3, l2).unwrap();
        assert_eq!(it.next().map(|(_, v, _)| *v), Some(0));
        assert_eq!(it.next().map(|(_, v, _)| *v), Some(1));
        drop(it);
    }

    #[test]
    fn clear_empties_the_tree() {
        let mut t = KdTree::new(1);
        PointMap::insert(&mut t, &[1.0], "a").unwrap();
        t.clear();
        assert_eq!(t.size(), 0);
        assert_eq!(t.query_exact(&[1.0]).unwrap(), None);
    }
}
