// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Lazy, restartable traversals over the box quadtree.

use spindex_core::geometry::{box_overlap, node_edge_distance};
use spindex_core::heap::MinHeap;

use super::node::{BoxSlot, QuadBoxNode};

/// node bounds always use l2, regardless of the caller's `dist`: l2 never
/// exceeds l1 between the same two points, so it stays an admissible
/// (if sometimes loose) lower bound for any box-distance built on top of
/// either.
fn node_bound_l2(p: &[f64], centre: &[f64], r: f64) -> f64 {
    node_edge_distance(p, centre, r, |a, b| a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt())
}

/// The slot indices of `node` whose child hypercube could overlap
/// `[min, max]`, built axis by axis the same way the point quadtree's
/// `overlapping_slots` is: the cartesian product of the per-axis
/// possible half-spaces, instead of testing all `2^dims` slots.
fn overlapping_slots(center: &[f64], min: &[f64], max: &[f64]) -> Vec<usize> {
    let mut idxs = vec![0usize];
    for i in 0..center.len() {
        let lo_possible = min[i] <= center[i];
        let hi_possible = max[i] >= center[i];
        let mut next = Vec::with_capacity(idxs.len() * 2);
        for &base in &idxs {
            if lo_possible {
                next.push(base);
            }
            if hi_possible {
                next.push(base | (1 << i));
            }
        }
        idxs = next;
    }
    idxs
}

/// Yields every entry whose box overlaps a closed query window.
pub struct WindowIter<'a, V> {
    root: Option<&'a QuadBoxNode<V>>,
    stack: Vec<&'a QuadBoxNode<V>>,
    pending: Vec<(&'a [f64], &'a [f64], &'a V)>,
    min: Vec<f64>,
    max: Vec<f64>,
}

impl<'a, V> WindowIter<'a, V> {
    pub(crate) fn new(root: Option<&'a QuadBoxNode<V>>, min: Vec<f64>, max: Vec<f64>) -> Self {
        let mut it = WindowIter {
            root,
            stack: Vec::new(),
            pending: Vec::new(),
            min,
            max,
        };
        it.reset_stack();
        it
    }

    pub fn reset(&mut self, min: &[f64], max: &[f64]) {
        self.min.clear();
        self.min.extend_from_slice(min);
        self.max.clear();
        self.max.extend_from_slice(max);
        self.reset_stack();
    }

    fn reset_stack(&mut self) {
        self.stack.clear();
        self.pending.clear();
        let empty = self.min.iter().zip(&self.max).any(|(a, b)| a > b);
        if !empty {
            if let Some(root) = self.root {
                self.stack.push(root);
            }
        }
    }
}

impl<'a, V> Iterator for WindowIter<'a, V> {
    type Item = (&'a [f64], &'a [f64], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop() {
                return Some(item);
            }
            let node = self.stack.pop()?;
            for (l, u, v) in &node.straddle {
                if box_overlap(l, u, &self.min, &self.max) {
                    self.pending.push((l.as_slice(), u.as_slice(), v));
                }
            }
            for idx in overlapping_slots(&node.center, &self.min, &self.max) {
                match &node.slots[idx] {
                    None => {}
                    Some(BoxSlot::Entry(bucket)) => {
                        for (l, u, v) in bucket {
                            if box_overlap(l, u, &self.min, &self.max) {
                                self.pending.push((l.as_slice(), u.as_slice(), v));
                            }
                        }
                    }
                    Some(BoxSlot::Node(child)) => {
                        self.stack.push(child);
                    }
                }
            }
        }
    }
}

/// One entry in the incremental-nearest-neighbour frontier: either an
/// unexpanded subtree (bounded by the hardcoded l2 node bound) or a
/// single box entry at its true box-distance.
enum HeapItem<'a, V> {
    Node { node: &'a QuadBoxNode<V>, bound: f64 },
    Entry { lower: &'a [f64], upper: &'a [f64], value: &'a V, dist: f64 },
}

impl<'a, V> HeapItem<'a, V> {
    fn key(&self) -> f64 {
        match self {
            HeapItem::Node { bound, .. } => *bound,
            HeapItem::Entry { dist, .. } => *dist,
        }
    }
}

fn heap_order<V>(a: &HeapItem<'_, V>, b: &HeapItem<'_, V>) -> bool {
    a.key() < b.key()
}

type KnnHeap<'a, V> = MinHeap<HeapItem<'a, V>, fn(&HeapItem<'a, V>, &HeapItem<'a, V>) -> bool>;

/// A best-first kNN traversal over box entries, using a box-distance
/// function (point-to-box) such as [`crate::distance::edge_distance`].
/// Each `next()` pops one heap entry: a box entry is immediately the
/// next-nearest result, a subtree is expanded into its straddle list
/// (pushed as entries at their true distance), its bucket entries
/// (likewise), and its child nodes (pushed with a fresh bound).
pub struct KnnIter<'a, V, D> {
    root: Option<&'a QuadBoxNode<V>>,
    centre: Vec<f64>,
    k: usize,
    yielded: usize,
    dist: D,
    heap: KnnHeap<'a, V>,
}

impl<'a, V, D> KnnIter<'a, V, D>
where
    D: Fn(&[f64], &[f64], &[f64]) -> f64,
{
    pub(crate) fn new(root: Option<&'a QuadBoxNode<V>>, centre: Vec<f64>, k: usize, dist: D) -> Self {
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
            let bound = node_bound_l2(&self.centre, &root.center, root.radius);
            self.heap.push(HeapItem::Node { node: root, bound });
        }
    }
}

impl<'a, V, D> Iterator for KnnIter<'a, V, D>
where
    D: Fn(&[f64], &[f64], &[f64]) -> f64,
{
    /// `(lower, upper, value, distance)`.
    type Item = (&'a [f64], &'a [f64], &'a V, f64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.yielded >= self.k {
            return None;
        }
        let centre = &self.centre;
        let dist = &self.dist;
        loop {
            match self.heap.pop_min()? {
                HeapItem::Entry { lower, upper, value, dist } => {
                    self.yielded += 1;
                    return Some((lower, upper, value, dist));
                }
                HeapItem::Node { node, .. } => {
                    for (l, u, v) in &node.straddle {
                        let d = dist(centre, l, u);
                        self.heap.push(HeapItem::Entry { lower: l.as_slice(), upper: u.as_slice(), value: v, dist: d });
                    }
                    for slot in &node.slots {
                        match slot {
                            None => {}
                            Some(BoxSlot::Entry(bucket)) => {
                                for (l, u, v) in bucket {
                                    let d = dist(centre, l, u);
                                    self.heap.push(HeapItem::Entry { lower: l.as_slice(), upper: u.as_slice(), value: v, dist: d });
                                }
                            }
                            Some(BoxSlot::Node(child)) => {
                                let bound = node_bound_l2(centre, &child.center, child.radius);
                                self.heap.push(HeapItem::Node { node: child, bound });
                            }
                        }
                    }
                }
            }
        }
    }
}
