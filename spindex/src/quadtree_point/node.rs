// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Node layout for the hypercube-addressed point quadtree (HC2): every
//! node has `2^dims` slots, addressed by a bit per axis (`1` if the
//! point lies at or past the node's centre on that axis, `0`
//! otherwise). A slot holds either a bucket of up to `capacity` distinct
//! coordinates (coincident inserts always append past that) or a child
//! node.

pub(crate) enum QuadSlot<V> {
    Entry(Vec<(Vec<f64>, V)>),
    Node(Box<QuadNode<V>>),
}

pub(crate) struct QuadNode<V> {
    pub(crate) center: Vec<f64>,
    pub(crate) radius: f64,
    pub(crate) slots: Vec<Option<QuadSlot<V>>>,
    /// Number of occupied slots at this node (not entries in the whole
    /// subtree); used to decide when to collapse a node back into a
    /// single bucket or drop it entirely.
    pub(crate) count: usize,
}

impl<V> QuadNode<V> {
    pub(crate) fn new(center: Vec<f64>, radius: f64, dims: usize) -> Self {
        let mut slots = Vec::with_capacity(1 << dims);
        slots.resize_with(1 << dims, || None);
        QuadNode { center, radius, slots, count: 0 }
    }
}

/// `1` bit on axis `i` iff `point[i] >= center[i]`.
pub(crate) fn quadrant_index(point: &[f64], center: &[f64]) -> usize {
    let mut idx = 0usize;
    for (i, (&p, &c)) in point.iter().zip(center).enumerate() {
        if p >= c {
            idx |= 1 << i;
        }
    }
    idx
}

/// The centre of the child at `idx` under a node with `center`/`radius`.
pub(crate) fn child_center(center: &[f64], radius: f64, idx: usize, dims: usize) -> Vec<f64> {
    let half = radius / 2.0;
    (0..dims)
        .map(|i| if idx & (1 << i) != 0 { center[i] + half } else { center[i] - half })
        .collect()
}

/// Inserts `point`/`value` under `node`. A bucket holding a coordinate
/// equal to `point` always grows; otherwise it grows up to `capacity`
/// distinct coordinates before splitting into a real subnode.
pub(crate) fn insert<V>(node: &mut QuadNode<V>, point: Vec<f64>, value: V, dims: usize, capacity: usize) {
    let idx = quadrant_index(&point, &node.center);
    match &mut node.slots[idx] {
        None => {
            node.slots[idx] = Some(QuadSlot::Entry(vec![(point, value)]));
            node.count += 1;
        }
        Some(QuadSlot::Entry(bucket)) => {
            if bucket.iter().any(|(p, _)| *p == point) || bucket.len() < capacity {
                bucket.push((point, value));
            } else {
                let mut bucket = match node.slots[idx].take() {
                    Some(QuadSlot::Entry(b)) => b,
                    _ => unreachable!(),
                };
                let child_c = child_center(&node.center, node.radius, idx, dims);
                let mut child = QuadNode::new(child_c, node.radius / 2.0, dims);
                for (p, v) in bucket.drain(..) {
                    insert(&mut child, p, v, dims, capacity);
                }
                insert(&mut child, point, value, dims, capacity);
                node.slots[idx] = Some(QuadSlot::Node(Box::new(child)));
            }
        }
        Some(QuadSlot::Node(child)) => insert(child, point, value, dims, capacity),
    }
}

/// First entry whose coordinates equal `point`.
pub(crate) fn find_exact<'a, V>(node: &'a QuadNode<V>, point: &[f64]) -> Option<&'a V> {
    let idx = quadrant_index(point, &node.center);
    match node.slots[idx].as_ref()? {
        QuadSlot::Entry(bucket) => bucket.iter().find(|(p, _)| p.as_slice() == point).map(|(_, v)| v),
        QuadSlot::Node(child) => find_exact(child, point),
    }
}

pub(crate) fn find_exact_mut<'a, V>(node: &'a mut QuadNode<V>, point: &[f64]) -> Option<&'a mut V> {
    let idx = quadrant_index(point, &node.center);
    match node.slots[idx].as_mut()? {
        QuadSlot::Entry(bucket) => bucket.iter_mut().find(|(p, _)| p.as_slice() == point).map(|(_, v)| v),
        QuadSlot::Node(child) => find_exact_mut(child, point),
    }
}

/// Removes the first entry at `point` for which `accept` holds, collapsing
/// emptied slots and single-occupant subnodes on the way back up.
pub(crate) fn remove_where<V, F>(node: &mut QuadNode<V>, point: &[f64], accept: &mut F) -> Option<V>
where
    F: FnMut(&V) -> bool,
{
    let idx = quadrant_index(point, &node.center);
    let removed = match &mut node.slots[idx] {
        None => None,
        Some(QuadSlot::Entry(bucket)) => {
            let pos = bucket.iter().position(|(p, v)| p.as_slice() == point && accept(v))?;
            let (_, value) = bucket.remove(pos);
            if bucket.is_empty() {
                node.slots[idx] = None;
                node.count -= 1;
            }
            Some(value)
        }
        Some(QuadSlot::Node(child)) => {
            let value = remove_where(child, point, accept);
            if value.is_some() {
                if child.count == 0 {
                    node.slots[idx] = None;
                    node.count -= 1;
                } else if child.count == 1 {
                    if let Some(only) = child.slots.iter_mut().find(|s| s.is_some()) {
                        if matches!(only, Some(QuadSlot::Entry(_))) {
                            node.slots[idx] = only.take();
                        }
                    }
                }
            }
            value
        }
    };
    removed
}
