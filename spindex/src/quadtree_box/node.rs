// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Node layout for the box quadtree (QR): the same `2^dims`-slot
//! hypercube layout as the point variant, plus a "straddles the
//! centre" list for boxes that cross the node's split plane on at
//! least one axis and so cannot be pushed down into any single child.

type BoxEntry<V> = (Vec<f64>, Vec<f64>, V);

pub(crate) enum BoxSlot<V> {
    Entry(Vec<BoxEntry<V>>),
    Node(Box<QuadBoxNode<V>>),
}

pub(crate) struct QuadBoxNode<V> {
    pub(crate) center: Vec<f64>,
    pub(crate) radius: f64,
    pub(crate) slots: Vec<Option<BoxSlot<V>>>,
    pub(crate) straddle: Vec<BoxEntry<V>>,
    pub(crate) count: usize,
}

impl<V> QuadBoxNode<V> {
    pub(crate) fn new(center: Vec<f64>, radius: f64, dims: usize) -> Self {
        let mut slots = Vec::with_capacity(1 << dims);
        slots.resize_with(1 << dims, || None);
        QuadBoxNode {
            center,
            radius,
            slots,
            straddle: Vec::new(),
            count: 0,
        }
    }

    /// Total occupied slots plus a nonzero straddle list, used to
    /// decide whether this node is now empty and can be dropped.
    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0 && self.straddle.is_empty()
    }
}

/// True iff `[lower, upper]` crosses `center` on some axis and so
/// cannot be assigned to a single quadrant.
pub(crate) fn straddles(lower: &[f64], upper: &[f64], center: &[f64]) -> bool {
    lower.iter().zip(upper).zip(center).any(|((&lo, &hi), &c)| lo < c && hi > c)
}

/// `1` bit on axis `i` iff the (non-straddling) box lies on the `hi` side.
pub(crate) fn box_quadrant_index(lower: &[f64], center: &[f64]) -> usize {
    let mut idx = 0usize;
    for (i, (&lo, &c)) in lower.iter().zip(center).enumerate() {
        if lo >= c {
            idx |= 1 << i;
        }
    }
    idx
}

pub(crate) fn child_center(center: &[f64], radius: f64, idx: usize, dims: usize) -> Vec<f64> {
    let half = radius / 2.0;
    (0..dims)
        .map(|i| if idx & (1 << i) != 0 { center[i] + half } else { center[i] - half })
        .collect()
}

/// Inserts `[lower, upper]`/`value` under `node`. A bucket holding an
/// identical `(lower, upper)` pair always grows; otherwise it grows up
/// to `capacity` distinct box entries before splitting into a real
/// subnode.
pub(crate) fn insert<V>(node: &mut QuadBoxNode<V>, lower: Vec<f64>, upper: Vec<f64>, value: V, dims: usize, capacity: usize) {
    if straddles(&lower, &upper, &node.center) {
        node.straddle.push((lower, upper, value));
        return;
    }
    let idx = box_quadrant_index(&lower, &node.center);
    match &mut node.slots[idx] {
        None => {
            node.slots[idx] = Some(BoxSlot::Entry(vec![(lower, upper, value)]));
            node.count += 1;
        }
        Some(BoxSlot::Entry(bucket)) => {
            if bucket.iter().any(|(l, u, _)| *l == lower && *u == upper) || bucket.len() < capacity {
                bucket.push((lower, upper, value));
            } else {
                let mut bucket = match node.slots[idx].take() {
                    Some(BoxSlot::Entry(b)) => b,
                    _ => unreachable!(),
                };
                let child_c = child_center(&node.center, node.radius, idx, dims);
                let mut child = QuadBoxNode::new(child_c, node.radius / 2.0, dims);
                for (l, u, v) in bucket.drain(..) {
                    insert(&mut child, l, u, v, dims, capacity);
                }
                insert(&mut child, lower, upper, value, dims, capacity);
                node.slots[idx] = Some(BoxSlot::Node(Box::new(child)));
            }
        }
        Some(BoxSlot::Node(child)) => insert(child, lower, upper, value, dims, capacity),
    }
}

pub(crate) fn find_exact<'a, V>(node: &'a QuadBoxNode<V>, lower: &[f64], upper: &[f64]) -> Option<&'a V> {
    if straddles(lower, upper, &node.center) {
        return node.straddle.iter().find(|(l, u, _)| l.as_slice() == lower && u.as_slice() == upper).map(|(_, _, v)| v);
    }
    let idx = box_quadrant_index(lower, &node.center);
    match node.slots[idx].as_ref()? {
        BoxSlot::Entry(bucket) => bucket.iter().find(|(l, u, _)| l.as_slice() == lower && u.as_slice() == upper).map(|(_, _, v)| v),
        BoxSlot::Node(child) => find_exact(child, lower, upper),
    }
}

pub(crate) fn find_exact_mut<'a, V>(node: &'a mut QuadBoxNode<V>, lower: &[f64], upper: &[f64]) -> Option<&'a mut V> {
    if straddles(lower, upper, &node.center) {
        return node
            .straddle
            .iter_mut()
            .find(|(l, u, _)| l.as_slice() == lower && u.as_slice() == upper)
            .map(|(_, _, v)| v);
    }
    let idx = box_quadrant_index(lower, &node.center);
    match node.slots[idx].as_mut()? {
        BoxSlot::Entry(bucket) => bucket.iter_mut().find(|(l, u, _)| l.as_slice() == lower && u.as_slice() == upper).map(|(_, _, v)| v),
        BoxSlot::Node(child) => find_exact_mut(child, lower, upper),
    }
}

pub(crate) fn remove_where<V, F>(node: &mut QuadBoxNode<V>, lower: &[f64], upper: &[f64], accept: &mut F) -> Option<V>
where
    F: FnMut(&V) -> bool,
{
    if straddles(lower, upper, &node.center) {
        let pos = node
            .straddle
            .iter()
            .position(|(l, u, v)| l.as_slice() == lower && u.as_slice() == upper && accept(v))?;
        let (_, _, value) = node.straddle.remove(pos);
        return Some(value);
    }
    let idx = box_quadrant_index(lower, &node.center);
    match &mut node.slots[idx] {
        None => None,
        Some(BoxSlot::Entry(bucket)) => {
            let pos = bucket
                .iter()
                .position(|(l, u, v)| l.as_slice() == lower && u.as_slice() == upper && accept(v))?;
            let (_, _, value) = bucket.remove(pos);
            if bucket.is_empty() {
                node.slots[idx] = None;
                node.count -= 1;
            }
            Some(value)
        }
        Some(BoxSlot::Node(child)) => {
            let value = remove_where(child, lower, upper, accept);
            if value.is_some() && child.is_empty() {
                node.slots[idx] = None;
                node.count -= 1;
            }
            value
        }
    }
}
