// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A levelled cover tree (Izbicki & Shelton, "Faster Cover Trees") over
//! a pluggable point-distance function. Unlike the other three engines
//! this one has no `remove`/`update`: the source this was distilled
//! from never supported rebuilding a subtree in place, so neither does
//! this one (callers who need to drop a point rebuild the tree).

mod node;

pub mod query_tools;

use std::marker::PhantomData;

use log::trace;

use crate::error::{check_dims, SpindexError, SpindexResult};
use node::CoverNode;

pub use query_tools::{FullIter, KnnIter};

/// The default covering-radius base. Admissible for any `BASE` in
/// `(1, 2]`; 1.3 is also common but assumes a seeded root level from a
/// bulk load, which this engine does not perform.
pub const DEFAULT_BASE: f64 = 2.0;

/// A cover tree over `dims`-dimensional points under distance function
/// `D`. Construct with [`CoverTreeBuilder`].
pub struct CoverTree<V, D> {
    dims: usize,
    base: f64,
    root: Option<Box<CoverNode<V>>>,
    size: usize,
    dist: D,
}

impl<V, D> CoverTree<V, D>
where
    D: Fn(&[f64], &[f64]) -> f64,
{
    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn clear(&mut self) {
        self.root = None;
        self.size = 0;
    }

    /// An unordered, lazy traversal over every point in the tree.
    pub fn iterator(&self) -> FullIter<'_, V> {
        FullIter::new(self.root.as_deref())
    }

    /// Inserts `point` with `value`, lifting the root first if `point`
    /// falls outside the current root's covering radius.
    pub fn insert(&mut self, point: &[f64], value: V) -> SpindexResult<()> {
        check_dims(self.dims, point.len())?;
        let point = point.to_vec();
        match self.root.take() {
            None => {
                self.root = Some(Box::new(CoverNode::leaf(point, value, 0)));
            }
            Some(root) => {
                let d = (self.dist)(&root.point, &point);
                let new_root = if d > node::covdist(self.base, root.level) {
                    trace!("cover tree root lift: distance {:.6} exceeds covering radius at level {}", d, root.level);
                    let lifted = node::lift_root(root, &point, self.base, &self.dist);
                    let level = lifted.level + 1;
                    let mut nr = Box::new(CoverNode::leaf(point, value, level));
                    nr.children.push(lifted);
                    nr
                } else {
                    let mut r = root;
                    node::insert2(&mut r, point, value, self.base, &self.dist);
                    r
                };
                self.root = Some(new_root);
            }
        }
        self.size += 1;
        Ok(())
    }

    /// The single nearest neighbour to `centre`, if the tree is non-empty.
    pub fn query_1nn(&self, centre: &[f64]) -> SpindexResult<Option<(&[f64], &V, f64)>> {
        Ok(self.query_knn(centre, 1)?.next())
    }

    /// The `k` nearest neighbours to `centre`, nearest first.
    pub fn query_knn(&self, centre: &[f64], k: i64) -> SpindexResult<KnnIter<'_, V, &D>> {
        check_dims(self.dims, centre.len())?;
        if k < 0 {
            return Err(SpindexError::InvalidK { k });
        }
        Ok(KnnIter::new(self.root.as_deref(), centre.to_vec(), k as usize, &self.dist))
    }
}

/// Builds a [`CoverTree`] from its construction parameters, mirroring
/// how engines with more than one tunable (here: `base`, `dims`, the
/// distance function) are assembled in this crate.
pub struct CoverTreeBuilder<V, D> {
    base: f64,
    dims: Option<usize>,
    dist: Option<D>,
    _value: PhantomData<fn() -> V>,
}

impl<V, D> Default for CoverTreeBuilder<V, D> {
    fn default() -> Self {
        CoverTreeBuilder {
            base: DEFAULT_BASE,
            dims: None,
            dist: None,
            _value: PhantomData,
        }
    }
}

impl<V, D> CoverTreeBuilder<V, D>
where
    D: Fn(&[f64], &[f64]) -> f64,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the covering-radius base. Must lie in `(1, 2]`; `build()`
    /// falls back to [`DEFAULT_BASE`] if it does not.
    pub fn base(mut self, base: f64) -> Self {
        self.base = base;
        self
    }

    pub fn dims(mut self, dims: usize) -> Self {
        self.dims = Some(dims);
        self
    }

    pub fn dist(mut self, dist: D) -> Self {
        self.dist = Some(dist);
        self
    }

    /// Builds the tree. Panics if `dims` or `dist` were never set: both
    /// are required, there is no sensible default for either.
    pub fn build(self) -> CoverTree<V, D> {
        let dims = self.dims.expect("CoverTreeBuilder::dims must be set before build()");
        let dist = self.dist.expect("CoverTreeBuilder::dist must be set before build()");
        let base = if self.base > 1.0 && self.base <= 2.0 { self.base } else { DEFAULT_BASE };
        CoverTree {
            dims,
            base,
            root: None,
            size: 0,
            dist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::l2;

    fn builder(dims: usize) -> CoverTreeBuilder<&'static str, fn(&[f64], &[f64]) -> f64> {
        CoverTreeBuilder::new().dims(dims).dist(l2)
    }

    #[test]
    fn insert_and_1nn_on_empty_tree() {
        let t: CoverTree<&str, fn(&[f64], &[f64]) -> f64> = builder(2).build();
        assert_eq!(t.query_1nn(&[0.0, 0.0]).unwrap(), None);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut t = builder(2).build();
        let err = t.insert(&[1.0], "a").unwrap_err();
        assert_eq!(err, SpindexError::DimensionMismatch { expected: 2, got: 1 });
        assert_eq!(t.size(), 0);
    }

    #[test]
    fn spec_scenario_five_cover_tree_knn() {
        // d = 2, BASE = 2. Insert (0,0), (3,0), (0,4), (6,0).
        let mut t = CoverTreeBuilder::new().dims(2).dist(l2 as fn(&[f64], &[f64]) -> f64).base(2.0).build();
        t.insert(&[0.0, 0.0], "a").unwrap();
        t.insert(&[3.0, 0.0], "b").unwrap();
        t.insert(&[0.0, 4.0], "c").unwrap();
        t.insert(&[6.0, 0.0], "d").unwrap();

        let (p, v, d) = t.query_1nn(&[1.0, 0.0]).unwrap().unwrap();
        assert_eq!(p, &[0.0, 0.0]);
        assert_eq!(*v, "a");
        assert_eq!(d, 1.0);

        let got: Vec<_> = t.query_knn(&[1.0, 0.0], 2).unwrap().map(|(_, v, d)| (*v, d)).collect();
        assert_eq!(got, vec![("a", 1.0), ("b", 2.0)]);
    }

    #[test]
    fn size_and_clear() {
        let mut t = builder(1).build();
        t.insert(&[0.0], "a").unwrap();
        t.insert(&[10.0], "b").unwrap();
        t.insert(&[-10.0], "c").unwrap();
        assert_eq!(t.size(), 3);
        t.clear();
        assert_eq!(t.size(), 0);
        assert_eq!(t.query_1nn(&[0.0]).unwrap(), None);
    }

    #[test]
    fn knn_k_zero_is_empty_not_an_error() {
        let mut t = builder(1).build();
        t.insert(&[0.0], "a").unwrap();
        assert_eq!(t.query_knn(&[0.0], 0).unwrap().count(), 0);
    }

    #[test]
    fn negative_k_is_an_error() {
        let t: CoverTree<&str, fn(&[f64], &[f64]) -> f64> = builder(1).build();
        let err = t.query_knn(&[0.0], -1).unwrap_err();
        assert_eq!(err, SpindexError::InvalidK { k: -1 });
    }

    #[test]
    fn iterator_visits_every_entry() {
        let mut t = builder(2).build();
        t.insert(&[0.0, 0.0], "a").unwrap();
        t.insert(&[3.0, 0.0], "b").unwrap();
        t.insert(&[0.0, 4.0], "c").unwrap();
        let mut got: Vec<_> = t.iterator().map(|(_, v)| *v).collect();
        got.sort();
        assert_eq!(got, vec!["a", "b", "c"]);
    }

    #[test]
    fn knn_iter_is_lazy_until_polled() {
        let mut t = builder(1).build();
        for i in 0..50 {
            t.insert(&[i as f64], i).unwrap();
        }
        let mut it = t.query_knn(&[0.0], 3).unwrap();
        assert_eq!(it.next(), Some((&[0.0][..], &0, 0.0)));
        assert_eq!(it.next(), Some((&[1.0][..], &1, 1.0)));
        assert_eq!(it.next(), Some((&[2.0][..], &2, 2.0)));
        assert_eq!(it.next(), None);
    }
}
