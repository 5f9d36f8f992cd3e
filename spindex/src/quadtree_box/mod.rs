// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! QR: a box quadtree built on the same hypercube layout as the point
//! variant, with a per-node straddle list for boxes that cross the
//! split plane. The root is absent until the first insert.

mod node;

pub mod iter;

use log::trace;

use crate::error::{check_box, check_dims, SpindexError, SpindexResult};
use crate::traits::{BoxMap, BoxMultimap, SpatialIndex};
use node::QuadBoxNode;
use spindex_core::geometry::{ceil_power_of_two, floor_power_of_two};

pub use iter::{KnnIter, WindowIter};

const INITIAL_RADIUS: f64 = 1.0;

/// Leaf buckets accumulate up to this many distinct boxes before a node
/// subdivides.
pub const DEFAULT_CAPACITY: usize = 8;

/// A box quadtree over `dims`-dimensional boxes, usable as either a
/// [`BoxMap`] or a [`BoxMultimap`].
pub struct BoxQuadTree<V> {
    dims: usize,
    capacity: usize,
    root: Option<QuadBoxNode<V>>,
    size: usize,
}

impl<V> BoxQuadTree<V> {
    pub fn new(dims: usize) -> Self {
        Self::with_capacity(dims, DEFAULT_CAPACITY)
    }

    /// As [`Self::new`], but subdivides a leaf bucket once it holds more
    /// than `capacity` distinct boxes instead of the default.
    pub fn with_capacity(dims: usize, capacity: usize) -> Self {
        BoxQuadTree {
            dims,
            capacity,
            root: None,
            size: 0,
        }
    }

    fn fits(center: &[f64], radius: f64, lower: &[f64], upper: &[f64]) -> bool {
        lower.iter().zip(upper).zip(center).all(|((&lo, &hi), &c)| lo >= c - radius && hi <= c + radius)
    }

    /// Ensures a root cell exists and contains `[lower, upper]`: on the
    /// very first insert the root's centre is picked from the box's own
    /// midpoint (rounded to a power of two per axis), on every later
    /// insert the existing cell is grown as needed.
    fn ensure_root(&mut self, lower: &[f64], upper: &[f64]) {
        if self.root.is_none() {
            let center: Vec<f64> = lower
                .iter()
                .zip(upper)
                .map(|(&lo, &hi)| {
                    let mid = (lo + hi) / 2.0;
                    floor_power_of_two(mid.abs()).copysign(mid)
                })
                .collect();
            self.root = Some(QuadBoxNode::new(center, INITIAL_RADIUS, self.dims));
        }
        self.lift_root(lower, upper);
    }

    fn lift_root(&mut self, lower: &[f64], upper: &[f64]) {
        loop {
            let root = self.root.as_ref().expect("ensure_root installs a root before lift_root runs");
            if Self::fits(&root.center, root.radius, lower, upper) {
                break;
            }
            let old_root = self.root.take().unwrap();
            let old_center = old_root.center.clone();
            let old_radius = old_root.radius;
            let new_radius = ceil_power_of_two(old_radius * 2.0);
            let mut new_center = old_center.clone();
            let mut idx = 0usize;
            for i in 0..self.dims {
                if lower[i] < old_center[i] - old_radius {
                    // box exceeds the cell on the low side: old root becomes
                    // the hi child so the new cell can extend downward.
                    new_center[i] -= old_radius;
                    idx |= 1 << i;
                } else {
                    new_center[i] += old_radius;
                }
            }
            trace!("box quadtree root lift: radius {} -> {}", old_radius, new_radius);
            let mut new_root = QuadBoxNode::new(new_center, new_radius, self.dims);
            new_root.slots[idx] = Some(node::BoxSlot::Node(Box::new(old_root)));
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
        D: Fn(&[f64], &[f64], &[f64]) -> f64,
    {
        check_dims(self.dims, centre.len())?;
        if k < 0 {
            return Err(SpindexError::InvalidK { k });
        }
        Ok(KnnIter::new(self.root.as_ref(), centre.to_vec(), k as usize, dist))
    }

    /// The single nearest box to `centre` under `dist`, if the tree is
    /// non-empty.
    pub fn query_1nn<D>(&self, centre: &[f64], dist: D) -> SpindexResult<Option<(&[f64], &[f64], &V, f64)>>
    where
        D: Fn(&[f64], &[f64], &[f64]) -> f64,
    {
        Ok(self.query_knn(centre, 1, dist)?.next())
    }
}

impl<V> SpatialIndex for BoxQuadTree<V> {
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

impl<V> BoxMap<V> for BoxQuadTree<V> {
    fn insert(&mut self, lower: &[f64], upper: &[f64], value: V) -> SpindexResult<Option<V>> {
        check_dims(self.dims, lower.len())?;
        check_dims(self.dims, upper.len())?;
        check_box(lower, upper)?;
        if let Some(root) = &mut self.root {
            if let Some(existing) = node::find_exact_mut(root, lower, upper) {
                return Ok(Some(std::mem::replace(existing, value)));
            }
        }
        self.ensure_root(lower, upper);
        node::insert(self.root.as_mut().unwrap(), lower.to_vec(), upper.to_vec(), value, self.dims, self.capacity);
        self.size += 1;
        Ok(None)
    }

    fn remove(&mut self, lower: &[f64], upper: &[f64]) -> SpindexResult<Option<V>> {
        check_dims(self.dims, lower.len())?;
        check_dims(self.dims, upper.len())?;
        let removed = match &mut self.root {
            Some(root) => node::remove_where(root, lower, upper, &mut |_| true),
            None => None,
        };
        if removed.is_some() {
            self.size -= 1;
        }
        Ok(removed)
    }

    fn update(&mut self, old_lower: &[f64], old_upper: &[f64], new_lower: &[f64], new_upper: &[f64]) -> SpindexResult<Option<V>> {
        check_dims(self.dims, old_lower.len())?;
        check_dims(self.dims, old_upper.len())?;
        check_dims(self.dims, new_lower.len())?;
        check_dims(self.dims, new_upper.len())?;
        check_box(new_lower, new_upper)?;
        let removed = match &mut self.root {
            Some(root) => node::remove_where(root, old_lower, old_upper, &mut |_| true),
            None => None,
        };
        match removed {
            None => Ok(None),
            Some(value) => {
                self.size -= 1;
                <Self as BoxMap<V>>::insert(self, new_lower, new_upper, value)
            }
        }
    }

    fn query_exact(&self, lower: &[f64], upper: &[f64]) -> SpindexResult<Option<&V>> {
        check_dims(self.dims, lower.len())?;
        check_dims(self.dims, upper.len())?;
        Ok(self.root.as_ref().and_then(|root| node::find_exact(root, lower, upper)))
    }
}

impl<V> BoxMultimap<V> for BoxQuadTree<V> {
    fn insert(&mut self, lower: &[f64], upper: &[f64], value: V) -> SpindexResult<()> {
        check_dims(self.dims, lower.len())?;
        check_dims(self.dims, upper.len())?;
        check_box(lower, upper)?;
        self.ensure_root(lower, upper);
        node::insert(self.root.as_mut().unwrap(), lower.to_vec(), upper.to_vec(), value, self.dims, self.capacity);
        self.size += 1;
        Ok(())
    }

    fn remove(&mut self, lower: &[f64], upper: &[f64], value: &V) -> SpindexResult<bool>
    where
        V: PartialEq,
    {
        check_dims(self.dims, lower.len())?;
        check_dims(self.dims, upper.len())?;
        let removed = match &mut self.root {
            Some(root) => node::remove_where(root, lower, upper, &mut |v| v == value),
            None => None,
        };
        let found = removed.is_some();
        if found {
            self.size -= 1;
        }
        Ok(found)
    }

    fn remove_if<F: FnMut(&V) -> bool>(&mut self, lower: &[f64], upper: &[f64], mut pred: F) -> SpindexResult<bool> {
        check_dims(self.dims, lower.len())?;
        check_dims(self.dims, upper.len())?;
        let removed = match &mut self.root {
            Some(root) => node::remove_where(root, lower, upper, &mut pred),
            None => None,
        };
        let found = removed.is_some();
        if found {
            self.size -= 1;
        }
        Ok(found)
    }

    fn update(
        &mut self,
        old_lower: &[f64],
        old_upper: &[f64],
        new_lower: &[f64],
        new_upper: &[f64],
        value: &V,
    ) -> SpindexResult<bool>
    where
        V: PartialEq,
    {
        check_dims(self.dims, old_lower.len())?;
        check_dims(self.dims, old_upper.len())?;
        check_dims(self.dims, new_lower.len())?;
        check_dims(self.dims, new_upper.len())?;
        check_box(new_lower, new_upper)?;
        let removed = match &mut self.root {
            Some(root) => node::remove_where(root, old_lower, old_upper, &mut |v| v == value),
            None => None,
        };
        match removed {
            None => Ok(false),
            Some(value) => {
                self.size -= 1;
                <Self as BoxMultimap<V>>::insert(self, new_lower, new_upper, value)?;
                Ok(true)
            }
        }
    }

    fn contains(&self, lower: &[f64], upper: &[f64], value: &V) -> SpindexResult<bool>
    where
        V: PartialEq,
    {
        check_dims(self.dims, lower.len())?;
        check_dims(self.dims, upper.len())?;
        Ok(self.root.as_ref().and_then(|root| node::find_exact(root, lower, upper)).map_or(false, |v| v == value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::edge_distance;

    #[test]
    fn insert_and_query_exact() {
        let mut t = BoxQuadTree::new(2);
        BoxMap::insert(&mut t, &[0.0, 0.0], &[1.0, 1.0], "a").unwrap();
        assert_eq!(t.query_exact(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), Some(&"a"));
        assert_eq!(t.query_exact(&[5.0, 5.0], &[6.0, 6.0]).unwrap(), None);
    }

    #[test]
    fn root_absent_until_first_insert() {
        let mut t: BoxQuadTree<&str> = BoxQuadTree::new(2);
        assert!(t.root.is_none());
        BoxMap::insert(&mut t, &[0.0, 0.0], &[1.0, 1.0], "a").unwrap();
        assert!(t.root.is_some());
    }

    #[test]
    fn invalid_box_is_rejected() {
        let mut t: BoxQuadTree<&str> = BoxQuadTree::new(2);
        let err = BoxMap::insert(&mut t, &[1.0, 0.0], &[0.0, 1.0], "a").unwrap_err();
        assert_eq!(err, SpindexError::InvalidBox { axis: 0 });
        assert_eq!(t.size(), 0);
    }

    #[test]
    fn dimension_mismatch_is_an_error_not_a_panic() {
        let mut t = BoxQuadTree::new(2);
        BoxMap::insert(&mut t, &[0.0, 0.0], &[1.0, 1.0], "a").unwrap();
        assert!(BoxMap::remove(&mut t, &[0.0]).is_err());
        assert!(t.query_exact(&[0.0], &[1.0, 1.0]).is_err());
        assert!(BoxMultimap::contains(&t, &[0.0, 0.0], &[1.0], &"a").is_err());
    }

    #[test]
    fn straddling_box_is_still_found() {
        // this box straddles the root's centre on both axes, so it lives
        // in the root's straddle list rather than any child quadrant.
        let mut t = BoxQuadTree::new(2);
        BoxMap::insert(&mut t, &[-1.0, -1.0], &[1.0, 1.0], "centre").unwrap();
        BoxMap::insert(&mut t, &[5.0, 5.0], &[6.0, 6.0], "corner").unwrap();
        assert_eq!(t.query_exact(&[-1.0, -1.0], &[1.0, 1.0]).unwrap(), Some(&"centre"));
        assert_eq!(t.size(), 2);
        assert!(BoxMap::remove(&mut t, &[-1.0, -1.0], &[1.0, 1.0]).unwrap().is_some());
        assert_eq!(t.size(), 1);
    }

    #[test]
    fn multimap_allows_identical_boxes() {
        let mut t = BoxQuadTree::new(1);
        BoxMultimap::insert(&mut t, &[0.0], &[1.0], "a").unwrap();
        BoxMultimap::insert(&mut t, &[0.0], &[1.0], "b").unwrap();
        assert_eq!(t.size(), 2);
        assert!(BoxMultimap::remove(&mut t, &[0.0], &[1.0], &"a").unwrap());
        assert_eq!(t.size(), 1);
        assert!(BoxMultimap::contains(&t, &[0.0], &[1.0], &"b").unwrap());
    }

    #[test]
    fn window_query_finds_overlapping_boxes_only() {
        let mut t = BoxQuadTree::new(2);
        BoxMap::insert(&mut t, &[0.0, 0.0], &[1.0, 1.0], "near").unwrap();
        BoxMap::insert(&mut t, &[10.0, 10.0], &[11.0, 11.0], "far").unwrap();
        let found: Vec<_> = t.window_query(&[-1.0, -1.0], &[2.0, 2.0]).unwrap().map(|(_, _, v)| *v).collect();
        assert_eq!(found, vec!["near"]);
    }

    #[test]
    fn iterator_visits_every_entry() {
        let mut t = BoxQuadTree::new(2);
        BoxMap::insert(&mut t, &[0.0, 0.0], &[1.0, 1.0], "near").unwrap();
        BoxMap::insert(&mut t, &[100.0, 100.0], &[101.0, 101.0], "far").unwrap();
        assert_eq!(t.iterator().count(), t.size());
    }

    #[test]
    fn knn_orders_by_edge_distance() {
        let mut t = BoxQuadTree::new(1);
        BoxMap::insert(&mut t, &[0.0], &[1.0], "close").unwrap();
        BoxMap::insert(&mut t, &[5.0], &[6.0], "far").unwrap();
        let got: Vec<_> = t.query_knn(&[0.0], 2, edge_distance).unwrap().map(|(_, _, v, _)| *v).collect();
        assert_eq!(got, vec!["close", "far"]);
    }

    #[test]
    fn query_1nn_matches_nearest() {
        let mut t = BoxQuadTree::new(1);
        BoxMap::insert(&mut t, &[0.0], &[1.0], "close").unwrap();
        BoxMap::insert(&mut t, &[5.0], &[6.0], "far").unwrap();
        let (_, _, v, _) = t.query_1nn(&[0.0], edge_distance).unwrap().unwrap();
        assert_eq!(*v, "close");
    }
}
