// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Lazy, restartable traversals over the cover tree: best-first
//! nearest-neighbour search pruned by each node's cached `maxdist`, and
//! a full-extent DFS.

use spindex_core::heap::MinHeap;

use super::node::CoverNode;

fn lower_bound<V, D>(centre: &[f64], node: &CoverNode<V>, dist: &D) -> f64
where
    D: Fn(&[f64], &[f64]) -> f64,
{
    let d = dist(centre, &node.point);
    (d - node.maxdist(dist)).max(0.0)
}

/// One entry in the incremental-nearest-neighbour frontier: either an
/// unexpanded subtree (bounded by its cached `maxdist`) or a single
/// node at its true distance.
enum HeapItem<'a, V> {
    Node { node: &'a CoverNode<V>, bound: f64 },
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

/// A best-first kNN traversal, one candidate per `next()` call straight
/// off the frontier heap. Popping a node expands it: its own point is
/// pushed at its true distance, each child is pushed with a fresh
/// `maxdist`-derived bound. Restartable via [`KnnIter::reset`].
pub struct KnnIter<'a, V, D> {
    root: Option<&'a CoverNode<V>>,
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
    pub(crate) fn new(root: Option<&'a CoverNode<V>>, centre: Vec<f64>, k: usize, dist: D) -> Self {
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
            let bound = lower_bound(&self.centre, root, &self.dist);
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
                    let d = dist(centre, &node.point);
                    self.heap.push(HeapItem::Point { point: node.point.as_slice(), value: &node.value, dist: d });
                    for child in &node.children {
                        let bound = lower_bound(centre, child, dist);
                        self.heap.push(HeapItem::Node { node: child, bound });
                    }
                }
            }
        }
    }
}

/// An unbounded, stack-based DFS over every entry in the tree.
pub struct FullIter<'a, V> {
    stack: Vec<&'a CoverNode<V>>,
}

impl<'a, V> FullIter<'a, V> {
    pub(crate) fn new(root: Option<&'a CoverNode<V>>) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = root {
            stack.push(root);
        }
        FullIter { stack }
    }
}

impl<'a, V> Iterator for FullIter<'a, V> {
    type Item = (&'a [f64], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for child in &node.children {
            self.stack.push(child);
        }
        Some((node.point.as_slice(), &node.value))
    }
}
