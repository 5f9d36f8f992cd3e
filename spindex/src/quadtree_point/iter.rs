// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Lazy, restartable traversals over the point quadtree.

use spindex_core::geometry::{node_edge_distance, point_in_box};
use spindex_core::heap::MinHeap;

use super::node::{QuadNode, QuadSlot};

/// The slot indices of `node` whose child hypercube could overlap
/// `[min, max]`, built axis by axis instead of testing all `2^dims`
/// slots: per axis, the low half-space (bit `0`) is only possible when
/// `min[i] <= center[i]`, the high half-space (bit `1`) only when
/// `max[i] >= center[i]`. The cartesian product of the per-axis
/// possibilities is exactly the set of slots worth descending into.
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

/// Yields every entry inside a closed axis-aligned box.
pub struct WindowIter<'a, V> {
    root: Option<&'a QuadNode<V>>,
    stack: Vec<&'a QuadNode<V>>,
    pending: Vec<(&'a [f64], &'a V)>,
    min: Vec<f64>,
    max: Vec<f64>,
}

impl<'a, V> WindowIter<'a, V> {
    pub(crate) fn new(root: Option<&'a QuadNode<V>>, min: Vec<f64>, max: Vec<f64>) -> Self {
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
    type Item = (&'a [f64], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop() {
                return Some(item);
            }
            let node = self.stack.pop()?;
            for idx in overlapping_slots(&node.center, &self.min, &self.max) {
                match &node.slots[idx] {
                    None => {}
                    Some(QuadSlot::Entry(bucket)) => {
                        for (p, v) in bucket {
                            if point_in_box(p, &self.min, &self.max) {
                                self.pending.push((p.as_slice(), v));
                            }
                        }
                    }
                    Some(QuadSlot::Node(child)) => {
                        self.stack.push(child);
                    }
                }
            }
        }
    }
}

/// One entry in the incremental-nearest-neighbour frontier: either an
/// unexpanded subtree, ordered by the distance from `centre` to its
/// nearest edge, or a single point at its true distance.
enum HeapItem<'a, V> {
    Node { node: &'a QuadNode<V>, bound: f64 },
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

/// A best-first kNN traversal. Each `next()` pops one entry off the
/// incremental-search heap: a point is immediately the next-nearest
/// result, a subtree is expanded into its bucket entries (pushed as
/// points at their true distance) plus its child nodes (pushed with a
/// fresh edge-distance bound).
pub struct KnnIter<'a, V, D> {
    root: Option<&'a QuadNode<V>>,
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
    pub(crate) fn new(root: Option<&'a QuadNode<V>>, centre: Vec<f64>, k: usize, dist: D) -> Self {
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
            let bound = node_edge_distance(&self.centre, &root.center, root.radius, &self.dist);
            self.heap.push(HeapItem::Node { node: root, bound });
        }
    }
}

impl<'a, V, D> Iterator for KnnIter<'a, V, D>
where
    D: Fn(&[f64], &[f64]) -> f64,
{
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
                HeapItem::Node { node, .. } => {
                    for slot in &node.slots {
                        match slot {
                            None => {}
                            Some(QuadSlot::Entry(bucket)) => {
                                for (p, v) in bucket {
                                    let d = dist(centre, p);
                                    self.heap.push(HeapItem::Point { point: p.as_slice(), value: v, dist: d });
                                }
                            }
                            Some(QuadSlot::Node(child)) => {
                                let bound = node_edge_distance(centre, &child.center, child.radius, dist);
                                self.heap.push(HeapItem::Node { node: child, bound });
                            }
                        }
                    }
                }
            }
        }
    }
}
