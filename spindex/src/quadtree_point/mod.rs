// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! HC2: a hypercube-addressed point region quadtree. Every node covers
//! a `[center - radius, center + radius)` hypercube split into `2^dims`
//! equal quadrants. The root is absent until the first insert and grows
//! by power-of-two doublings ("root lift") whenever an inserted point
//! falls outside its current cell.

mod node;

pub mod iter;

use log::trace;

use crate::error::{check_dims, SpindexError, SpindexResult};
use crate::traits::{PointMap, PointMultimap, SpatialIndex};
use node::{QuadNode, QuadSlot};
use spindex_core::geometry::{ceil_power_of_two, fits_into_node, floor_power_of_two};

pub use iter::{KnnIter, WindowIter};

const INITIAL_RADIUS: f64 = 1.0;

/// Leaf buckets accumulate up to this many distinct coordinates before a
/// node subdivides.
pub const DEFAULT_CAPACITY: usize = 8;

/// A point quadtree over `dims`-dimensional points, usable as either a
/// [`PointMap`] or a [`PointMultimap`].
pub struct PointQuadTree<V> {
    dims: usize,
    capacity: usize,
    root: Option<QuadNode<V>>,
    size: usize,
}

impl<V> PointQuadTree<V> {
    pub fn new(dims: usize) -> Self {
        Self::with_capacity(dims, DEFAULT_CAPACITY)
    }

    /// As [`Self::new`], but subdivides a leaf bucket once it holds more
    /// than `capacity` distinct coordinates instead of the default.
    pub fn with_capacity(dims: usize, capacity: usize) -> Self {
        PointQuadTree {
            dims,
            capacity,
            root: None,
            size: 0,
        }
    }

    /// Ensures a root cell exists and contains `point`: on the very
    /// first insert this picks the root's centre from `point` itself
    /// (rounded to a power of two per axis, so later doublings stay
    /// exact), on every later insert it grows the existing cell as
    /// needed.
    fn ensure_root(&mut self, point: &[f64]) {
        if self.root.is_none() {
            let center: Vec<f64> = point.iter().map(|&x| floor_power_of_two(x.abs()).copysign(x)).collect();
            self.root = Some(QuadNode::new(center, INITIAL_RADIUS, self.dims));
        }
        self.lift_root(point);
    }

    /// Doubles the root cell, demoting the current root to a child of a
    /// new, larger root, until `point` fits inside it.
    fn lift_root(&mut self, point: &[f64]) {
        loop {
            let root = self.root.as_ref().expect("ensure_root installs a root before lift_root runs");
            if fits_into_node(point, &root.center, root.radius) {
                break;
            }
            let old_root = self.root.take().unwrap();
            let old_center = old_root.center.clone();
            let old_radius = old_root.radius;
            let new_radius = ceil_power_of_two(old_radius * 2.0);
            let mut new_center = old_center.clone();
            let mut idx = 0usize;
            for i in 0..self.dims {
                if point[i] < old_center[i] {
                    new_center[i] -= old_radius;
                    idx |= 1 << i;
                } else {
                    new_center[i] += old_radius;
                }
            }
            trace!("point quadtree root lift: radius {} -> {}", old_radius, new_radius);
            let mut new_root = QuadNode::new(new_center, new_radius, self.dims);
            new_root.slots[idx] = Some(QuadSlot::Node(Box::new(old_root)));
            new_root.count = 1;
            self.root = Some(new_root);
        }
    }

    pub fn window_query(&self, min: &[f64], max: &[f64]) -> SpindexResult<WindowIter<'_, V>> {
        check_dims(self.dims, min.len())?;
        check_dims(self.dims, max.len())?;
        Ok(WindowIter::new(self.root.as_ref(), min.to_vec(), max.to_vec()))
    }

    /// Every stored entry, in no particular order.
    pub fn iterator(&self) -> WindowIter<'_, V> {
        WindowIter::new(self.root.as_ref(), vec![f64::NEG_INFINITY; self.dims], vec![f64::INFINITY; self.dims])
    }

    pub fn query_knn<D>(&self, centre: &[f64], k: i64, dist: D) -> SpindexResult<KnnIter<'_, V, D>>
    where
        D: Fn(&[f64], &[f64]) -> f64,
    {
        check_dims(self.dims, centre.len())?;
        if k < 0 {
            return Err(SpindexError::InvalidK { k });
        }
        Ok(KnnIter::new(self.root.as_ref(), centre.to_vec(), k as usize, dist))
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

impl<V> SpatialIndex for PointQuadTree<V> {
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

impl<V> PointMap<V> for PointQuadTree<V> {
    fn insert(&mut self, point: &[f64], value: V) -> SpindexResult<Option<V>> {
        check_dims(self.dims, point.len())?;
        if let Some(root) = &mut self.root {
            if let Some(existing) = node::find_exact_mut(root, point) {
                return Ok(Some(std::mem::replace(existing, value)));
            }
        }
        self.ensure_root(point);
        node::insert(self.root.as_mut().unwrap(), point.to_vec(), value, self.dims, self.capacity);
        self.size += 1;
        Ok(None)
    }

    fn remove(&mut self, point: &[f64]) -> SpindexResult<Option<V>> {
        check_dims(self.dims, point.len())?;
        let removed = match &mut self.root {
            Some(root) => node::remove_where(root, point, &mut |_| true),
            None => None,
        };
        if removed.is_some() {
            self.size -= 1;
        }
        Ok(removed)
    }

    fn update(&mut self, old: &[f64], new: &[f64]) -> SpindexResult<Option<V>> {
        check_dims(self.dims, old.len())?;
        check_dims(self.dims, new.len())?;
        let removed = match &mut self.root {
            Some(root) => node::remove_where(root, old, &mut |_| true),
            None => None,
        };
        match removed {
            None => Ok(None),
            Some(value) => {
                self.size -= 1;
                <Self as PointMap<V>>::insert(self, new, value)
            }
        }
    }

    fn query_exact(&self, point: &[f64]) -> SpindexResult<Option<&V>> {
        check_dims(self.dims, point.len())?;
        Ok(self.root.as_ref().and_then(|root| node::find_exact(root, point)))
    }
}

impl<V> PointMultimap<V> for PointQuadTree<V> {
    fn insert(&mut self, point: &[f64], value: V) -> SpindexResult<()> {
        check_dims(self.dims, point.len())?;
        self.ensure_root(point);
        node::insert(self.root.as_mut().unwrap(), point.to_vec(), value, self.dims, self.capacity);
        self.size += 1;
        Ok(())
    }

    fn remove(&mut self, point: &[f64], value: &V) -> SpindexResult<bool>
    where
        V: PartialEq,
    {
        check_dims(self.dims, point.len())?;
        let removed = match &mut self.root {
            Some(root) => node::remove_where(root, point, &mut |v| v == value),
            None => None,
        };
        let found = removed.is_some();
        if found {
            self.size -= 1;
        }
        Ok(found)
    }

    fn remove_if<F: FnMut(&V) -> bool>(&mut self, point: &[f64], mut pred: F) -> SpindexResult<bool> {
        check_dims(self.dims, point.len())?;
        let removed = match &mut self.root {
            Some(root) => node::remove_where(root, point, &mut pred),
            None => None,
        };
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
        let removed = match &mut self.root {
            Some(root) => node::remove_where(root, old, &mut |v| v == value),
            None => None,
        };
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
        Ok(self.root.as_ref().and_then(|root| node::find_exact(root, point)).map_or(false, |v| v == value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::l2;

    #[test]
    fn insert_and_query_exact() {
        let mut t = PointQuadTree::new(2);
        PointMap::insert(&mut t, &[1.0, 2.0], "a").unwrap();
        assert_eq!(t.query_exact(&[1.0, 2.0]).unwrap(), Some(&"a"));
        assert_eq!(t.query_exact(&[9.0, 9.0]).unwrap(), None);
    }

    #[test]
    fn root_absent_until_first_insert() {
        let mut t: PointQuadTree<&str> = PointQuadTree::new(2);
        assert!(t.root.is_none());
        PointMap::insert(&mut t, &[3.0, 3.0], "a").unwrap();
        assert!(t.root.is_some());
    }

    #[test]
    fn root_lifts_to_contain_far_away_points() {
        let mut t = PointQuadTree::new(2);
        PointMap::insert(&mut t, &[0.0, 0.0], "origin").unwrap();
        PointMap::insert(&mut t, &[1000.0, -1000.0], "far").unwrap();
        assert_eq!(t.query_exact(&[0.0, 0.0]).unwrap(), Some(&"origin"));
        assert_eq!(t.query_exact(&[1000.0, -1000.0]).unwrap(), Some(&"far"));
        assert_eq!(t.size(), 2);
    }

    #[test]
    fn dimension_mismatch_is_an_error_not_a_panic() {
        let mut t = PointQuadTree::new(2);
        PointMap::insert(&mut t, &[1.0, 1.0], "a").unwrap();
        assert!(PointMap::remove(&mut t, &[1.0]).is_err());
        assert!(t.query_exact(&[1.0]).is_err());
        assert!(PointMultimap::contains(&t, &[1.0], &"a").is_err());
    }

    #[test]
    fn insert_replaces_as_a_map() {
        let mut t = PointQuadTree::new(1);
        assert_eq!(PointMap::insert(&mut t, &[1.0], "a").unwrap(), None);
        assert_eq!(PointMap::insert(&mut t, &[1.0], "b").unwrap(), Some("a"));
        assert_eq!(t.size(), 1);
    }

    #[test]
    fn multimap_allows_coincident_points() {
        let mut t = PointQuadTree::new(1);
        PointMultimap::insert(&mut t, &[1.0], "a").unwrap();
        PointMultimap::insert(&mut t, &[1.0], "b").unwrap();
        assert_eq!(t.size(), 2);
        assert!(PointMultimap::remove(&mut t, &[1.0], &"a").unwrap());
        assert_eq!(t.size(), 1);
        assert!(PointMultimap::contains(&t, &[1.0], &"b").unwrap());
    }

    #[test]
    fn remove_collapses_emptied_nodes() {
        let mut t = PointQuadTree::new(2);
        let points = [[1.0, 1.0], [-1.0, 1.0], [1.0, -1.0], [-1.0, -1.0]];
        for (i, p) in points.iter().enumerate() {
            PointMap::insert(&mut t, p, i).unwrap();
        }
        for p in &points {
            PointMap::remove(&mut t, p).unwrap();
        }
        assert_eq!(t.size(), 0);
        assert_eq!(t.root.as_ref().unwrap().count, 0);
    }

    #[test]
    fn window_query_filters_to_the_box() {
        let mut t = PointQuadTree::new(2);
        let points = [[0.0, 0.0], [5.0, 5.0], [-5.0, -5.0]];
        for (i, p) in points.iter().enumerate() {
            PointMap::insert(&mut t, p, i).unwrap();
        }
        let mut found: Vec<_> = t.window_query(&[-1.0, -1.0], &[1.0, 1.0]).unwrap().map(|(_, v)| *v).collect();
        found.sort_unstable();
        assert_eq!(found, vec![0]);
    }

    #[test]
    fn iterator_visits_every_entry() {
        let mut t = PointQuadTree::new(2);
        let points = [[0.0, 0.0], [5.0, 5.0], [-5.0, -5.0], [1000.0, 1000.0]];
        for (i, p) in points.iter().enumerate() {
            PointMap::insert(&mut t, p, i).unwrap();
        }
        assert_eq!(t.iterator().count(), t.size());
    }

    #[test]
    fn knn_orders_by_distance() {
        let mut t = PointQuadTree::new(2);
        let points = [[0.0, 0.0], [3.0, 0.0], [1.0, 0.0]];
        for (i, p) in points.iter().enumerate() {
            PointMap::insert(&mut t, p, i).unwrap();
        }
        let got: Vec<_> = t.query_knn(&[0.0, 0.0], 2, l2).unwrap().map(|(_, v, _)| *v).collect();
        assert_eq!(got, vec![0, 2]);
    }

    #[test]
    fn query_1nn_matches_nearest() {
        let mut t = PointQuadTree::new(2);
        let points = [[0.0, 0.0], [3.0, 0.0], [1.0, 0.0]];
        for (i, p) in points.iter().enumerate() {
            PointMap::insert(&mut t, p, i).unwrap();
        }
        let (_, v, _) = t.query_1nn(&[0.9, 0.0], l2).unwrap().unwrap();
        assert_eq!(*v, 2);
    }

    #[test]
    fn bucket_does_not_split_below_capacity() {
        let mut t = PointQuadTree::with_capacity(1, 4);
        for i in 0..4 {
            // small fractional offsets so every point stays inside the
            // root's initial cell and no root lift is triggered.
            PointMultimap::insert(&mut t, &[0.1 + i as f64 * 0.1], i).unwrap();
        }
        // all four distinct coordinates fit in the root's own bucket,
        // well within a single slot's capacity: no child nodes needed.
        let root = t.root.as_ref().unwrap();
        assert!(root.slots.iter().all(|s| !matches!(s, Some(QuadSlot::Node(_)))));
    }
}
