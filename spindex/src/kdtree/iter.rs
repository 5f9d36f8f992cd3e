// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The kd-tree's two lazy, restartable traversals: an axis-aligned
//! window scan and a best-first kNN search.

use spindex_core::geometry::point_in_box;
use spindex_core::heap::MinHeap;

use super::node::KdNode;

/// Yields every entry inside a closed axis-aligned box, in no particular
/// order. Reusable across queries via [`WindowIter::reset`], which
/// clears the traversal stack rather than reallocating it.
pub struct WindowIter<'a, V> {
    root: Option<&'a KdNode<V>>,
    stack: Vec<&'a KdNode<V>>,
    min: Vec<f64>,
    max: Vec<f64>,
}

impl<'a, V> WindowIter<'a, V> {
    pub(crate) fn new(root: Option<&'a KdNode<V>>, min: Vec<f64>, max: Vec<f64>) -> Self {
        let mut it = WindowIter {
            root,
            stack: Vec::new(),
            min,
            max,
        };
        it.reset_stack();
        it
    }

    /// Restarts the traversal over a new window, reusing the stack's
    /// allocation.
    pub fn reset(&mut self, min: &[f64], max: &[f64]) {
        self.min.clear();
        self.min.extend_from_slice(min);
        self.max.clear();
        self.max.extend_from_slice(max);
        self.reset_stack();
    }

    fn reset_stack(&mut self) {
        self.stack.clear();
        let empty = self.min.iter().zip(&self.max).any(|(a, b)| a > b);
        if !empty {
            if let Some(root) = self.root {
                self.stack.push(root);
            }
        }
    }
}

impl<'a, V> Iterator for WindowIter<'a, V> {
    type Item = (&'a [f64], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            let dim = node.dim;
            if self.min[dim] <= node.point[dim] {
                if let Some(lo) = &node.lo {
                    self.stack.push(lo);
                }
            }
            if self.max[dim] >= node.point[dim] {
                if let Some(hi) = &node.hi {
                    self.stack.push(hi);
                }
            }
            if point_in_box(&node.point, &self.min, &self.max) {
                return Some((node.point.as_slice(), &node.value));
            }
        }
        None
    }
}

/// One entry in the incremental-nearest-neighbour frontier: either an
/// unexpanded subtree, ordered by a lower bound on the distance from
/// `centre` to anything inside it, or a single point already known at
/// its true distance. Both compare by `key()`, so popping the frontier's
/// current minimum either yields a result directly or expands one more
/// subtree — there is no separate bounded candidate buffer to maintain.
enum HeapItem<'a, V> {
    Node { node: &'a KdNode<V>, closest: Vec<f64>, bound: f64 },
    Point { point: &'a [f64], value: &'a V, dist: f64 },
}

impl<'a, V> HeapItem<'a, V> {
    fn key(&self) -> f64 {
        match self {
            HeapItem::Node { bound, .. } => *bound,
            HeapItem::Point { dist, .. } => *dist,
        }
    }
}

fn heap_order<V>(a: &HeapItem<'_, V>, b: &HeapItem<'_, V>) -> bool {
    a.key() < b.key()
}

type KnnHeap<'a, V> = MinHeap<HeapItem<'a, V>, fn(&HeapItem<'a, V>, &HeapItem<'a, V>) -> bool>;

/// A best-first k-nearest-neighbour traversal. Each call to `next()` pops
/// exactly one entry off the incremental-search heap: a popped point is
/// provably the next-nearest unreturned result (Hjaltason & Samet), a
/// popped subtree is expanded by pushing its own point plus fresh bounds
/// for its children. Nothing beyond the `k`-th result is ever computed.
pub struct KnnIter<'a, V, D> {
    root: Option<&'a KdNode<V>>,
    centre: Vec<f64>,
    k: usize,
    yielded: usize,
    dist: D,
    heap: KnnHeap<'a, V>,
}

impl<'a, V, D> KnnIter<'a, V, D>
where
    D: Fn(&[f64], &[f64]) -> f64,
{
    pub(crate) fn new(root: Option<&'a KdNode<V>>, centre: Vec<f64>, k: usize, dist: D) -> Self {
        let mut it = KnnIter {
            root,
            centre,
            k,
            yielded: 0,
            dist,
            heap: MinHeap::new(heap_order),
        };
        it.seed();
        it
    }

    /// Restarts the search around a new centre and/or `k`, reusing the
    /// heap's allocation.
    pub fn reset(&mut self, centre: &[f64], k: usize) {
        self.centre.clear();
        self.centre.extend_from_slice(centre);
        self.k = k;
        self.yielded = 0;
        self.heap.clear();
        self.seed();
    }

    fn seed(&mut self) {
        if self.k == 0 {
            return;
        }
        if let Some(root) = self.root {
            self.heap.push(HeapItem::Node {
                node: root,
                closest: self.centre.clone(),
                bound: 0.0,
            });
        }
    }
}

impl<'a, V, D> Iterator for KnnIter<'a, V, D>
where
    D: Fn(&[f64], &[f64]) -> f64,
{
    /// `(point, value, distance)`.
    type Item = (&'a [f64], &'a V, f64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.yielded >= self.k {
            return None;
        }
        let centre = &self.centre;
        let dist = &self.dist;
        loop {
            match self.heap.pop_min()? {
                HeapItem::Point { point, value, dist } => {
                    self.yielded += 1;
                    return Some((point, value, dist));
                }
                HeapItem::Node { node, closest, .. } => {
                    let d_node = dist(centre, &node.point);
                    self.heap.push(HeapItem::Point {
                        point: node.point.as_slice(),
                        value: &node.value,
                        dist: d_node,
                    });

                    let k_dim = node.dim;
                    let centre_on_lo = centre[k_dim] < node.point[k_dim];

                    if let Some(lo) = &node.lo {
                        let (lo_closest, lo_bound) = if centre_on_lo {
                            (closest.clone(), dist(centre, &closest))
                        } else {
                            let mut c = closest.clone();
                            c[k_dim] = node.point[k_dim];
                            let d = dist(centre, &c);
                            (c, d)
                        };
                        self.heap.push(HeapItem::Node { node: lo, closest: lo_closest, bound: lo_bound });
                    }
                    if let Some(hi) = &node.hi {
                        let (hi_closest, hi_bound) = if centre_on_lo {
                            let mut c = closest.clone();
                            c[k_dim] = node.point[k_dim];
                            let d = dist(centre, &c);
                            (c, d)
                        } else {
                            (closest.clone(), dist(centre, &closest))
                        };
                        self.heap.push(HeapItem::Node { node: hi, closest: hi_closest, bound: hi_bound });
                    }
                }
            }
        }
    }
}
