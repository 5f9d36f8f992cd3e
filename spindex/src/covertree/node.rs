// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Cover tree node: a point, its level, and its children. For every
//! node `n` and child `c`, `distance(n.point, c.point) <= covdist(n)`
//! and `c.level == n.level - 1`.

use std::cell::Cell;

pub(crate) struct CoverNode<V> {
    pub(crate) point: Vec<f64>,
    pub(crate) value: V,
    pub(crate) level: i32,
    pub(crate) children: Vec<Box<CoverNode<V>>>,
    max_dist: Cell<Option<f64>>,
}

impl<V> CoverNode<V> {
    pub(crate) fn leaf(point: Vec<f64>, value: V, level: i32) -> Self {
        CoverNode {
            point,
            value,
            level,
            children: Vec::new(),
            max_dist: Cell::new(Some(0.0)),
        }
    }

    /// Forgets the cached bound after a descendant changes.
    pub(crate) fn invalidate(&self) {
        self.max_dist.set(None);
    }

    /// The largest distance from this node's point to any point in its
    /// subtree, computed on first use and cached until [`Self::invalidate`].
    pub(crate) fn maxdist<D>(&self, dist: &D) -> f64
    where
        D: Fn(&[f64], &[f64]) -> f64,
    {
        if let Some(cached) = self.max_dist.get() {
            return cached;
        }
        let computed = self
            .children
            .iter()
            .map(|c| dist(&self.point, &c.point) + c.maxdist(dist))
            .fold(0.0_f64, f64::max);
        self.max_dist.set(Some(computed));
        computed
    }

    pub(crate) fn len(&self) -> usize {
        1 + self.children.iter().map(|c| c.len()).sum::<usize>()
    }
}

/// `base^level`: the covering radius at `level` — every child of a node
/// at this level lies within this distance of it.
pub(crate) fn covdist(base: f64, level: i32) -> f64 {
    base.powi(level)
}

/// Finds a leaf (childless) descendant strictly below `node` and
/// removes it from its parent's child list, returning it. `None` if
/// `node` itself has no children left to search.
fn detach_leaf<V>(node: &mut CoverNode<V>) -> Option<Box<CoverNode<V>>> {
    if let Some(pos) = node.children.iter().position(|c| c.children.is_empty()) {
        node.invalidate();
        return Some(node.children.remove(pos));
    }
    for child in node.children.iter_mut() {
        if let Some(leaf) = detach_leaf(child) {
            node.invalidate();
            return Some(leaf);
        }
    }
    None
}

/// Raises `root` until its covering radius reaches `point`, by
/// repeatedly promoting an existing leaf descendant above it (so the
/// promoted leaf's own point becomes the new, higher-level root and
/// the old root becomes its only child). Stops early once a promotion
/// is within the corrected Algorithm-2 bound, or once no leaf is left
/// to promote (a single-node tree raises nothing; the caller's final
/// wrap around `point` covers that case instead).
pub(crate) fn lift_root<V, D>(mut root: Box<CoverNode<V>>, point: &[f64], base: f64, dist: &D) -> Box<CoverNode<V>>
where
    D: Fn(&[f64], &[f64]) -> f64,
{
    let mut d = dist(&root.point, point);
    while d > covdist(base, root.level) {
        let promoted = match detach_leaf(&mut root) {
            Some(q) => q,
            None => break,
        };
        let mut promoted = promoted;
        promoted.level = root.level + 1;
        promoted.invalidate();
        promoted.children.push(root);
        root = promoted;
        d = dist(&root.point, point);
        if d <= (base - 1.0) * covdist(base, root.level) {
            break;
        }
    }
    root
}

/// Greedy Algorithm-2 descent (step "insert2"): attaches `point`/`value`
/// somewhere in the subtree rooted at `node`, assumed to already cover
/// it. Descends into whichever existing child's covering radius already
/// reaches the point (breaking ties by distance), and otherwise attaches
/// it directly as a new child one level down.
pub(crate) fn insert2<V, D>(node: &mut CoverNode<V>, point: Vec<f64>, value: V, base: f64, dist: &D)
where
    D: Fn(&[f64], &[f64]) -> f64,
{
    node.invalidate();
    let mut best: Option<(usize, f64)> = None;
    for (i, child) in node.children.iter().enumerate() {
        let d = dist(&child.point, &point);
        if d <= covdist(base, child.level) && best.map_or(true, |(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    match best {
        Some((i, _)) => insert2(&mut node.children[i], point, value, base, dist),
        None => {
            let level = node.level - 1;
            node.children.push(Box::new(CoverNode::leaf(point, value, level)));
        }
    }
}
