// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The kd-tree node and the recursive delete machinery that keeps the
//! cycling-split invariant intact after a removal.

/// A single kd-tree node: a point entry plus the split axis it was
/// created at and its two children.
///
/// For every descendant of `lo`, `key[dim] <= point[dim]`; for every
/// descendant of `hi`, `key[dim] >= point[dim]`. `dim` cycles with
/// depth: a child's dim is `(parent.dim + 1) % dims`.
pub(crate) struct KdNode<V> {
    pub(crate) point: Vec<f64>,
    pub(crate) value: V,
    pub(crate) dim: usize,
    pub(crate) lo: Option<Box<KdNode<V>>>,
    pub(crate) hi: Option<Box<KdNode<V>>>,
}

impl<V> KdNode<V> {
    pub(crate) fn new(point: Vec<f64>, value: V, dim: usize) -> Self {
        KdNode {
            point,
            value,
            dim,
            lo: None,
            hi: None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        1 + self.lo.as_ref().map_or(0, |n| n.len()) + self.hi.as_ref().map_or(0, |n| n.len())
    }
}

/// Inserts `point`/`value` into the subtree rooted at `node` (installed at
/// split axis `dim`, cycling through `dims`). Ties on the split axis go to
/// `hi`; this also governs which side an exact query must continue into
/// when it only matches on the current axis (see `find_where`).
pub(crate) fn insert<V>(node: &mut Option<Box<KdNode<V>>>, point: Vec<f64>, value: V, dim: usize, dims: usize) {
    match node {
        None => *node = Some(Box::new(KdNode::new(point, value, dim))),
        Some(n) => {
            let next_dim = (dim + 1) % dims;
            if point[n.dim] < n.point[n.dim] {
                insert(&mut n.lo, point, value, next_dim, dims);
            } else {
                insert(&mut n.hi, point, value, next_dim, dims);
            }
        }
    }
}

/// Finds the first node whose coordinates equal `target`, following the
/// same tie-goes-hi rule `insert` uses so an exact duplicate coordinate is
/// always reachable along a single deterministic path.
pub(crate) fn find_exact<'a, V>(node: &'a Option<Box<KdNode<V>>>, target: &[f64]) -> Option<&'a KdNode<V>> {
    let n = node.as_ref()?;
    if n.point[n.dim] == target[n.dim] {
        if n.point == target {
            Some(n)
        } else {
            find_exact(&n.hi, target)
        }
    } else if target[n.dim] < n.point[n.dim] {
        find_exact(&n.lo, target)
    } else {
        find_exact(&n.hi, target)
    }
}

/// Mutable counterpart of [`find_exact`], used by `PointMap::insert` to
/// overwrite the value at an existing coordinate instead of adding a
/// duplicate node.
pub(crate) fn find_exact_mut<'a, V>(node: &'a mut Option<Box<KdNode<V>>>, target: &[f64]) -> Option<&'a mut KdNode<V>> {
    let n = node.as_mut()?;
    if n.point[n.dim] == target[n.dim] {
        if n.point == target {
            Some(n)
        } else {
            find_exact_mut(&mut n.hi, target)
        }
    } else if target[n.dim] < n.point[n.dim] {
        find_exact_mut(&mut n.lo, target)
    } else {
        find_exact_mut(&mut n.hi, target)
    }
}

/// Removes the first node matching `target` for which `accept(&value)`
/// holds, restoring the kd-tree invariant via [`delete_root`]. Returns the
/// removed value, if any.
pub(crate) fn remove_where<V, F>(node: Option<Box<KdNode<V>>>, target: &[f64], accept: &mut F) -> (Option<Box<KdNode<V>>>, Option<V>)
where
    F: FnMut(&V) -> bool,
{
    match node {
        None => (None, None),
        Some(n) => {
            let axis_eq = n.point[n.dim] == target[n.dim];
            let full_eq = axis_eq && n.point == target;
            if full_eq && accept(&n.value) {
                let (replacement, _point, value) = delete_root(n);
                (replacement, Some(value))
            } else if axis_eq {
                // either a genuine duplicate coordinate whose value didn't
                // match, or merely a tie on this one axis: both were routed
                // to `hi` by `insert`, so that is the only place left to look.
                let KdNode { point, value, dim, lo, hi } = *n;
                let (new_hi, removed) = remove_where(hi, target, accept);
                (Some(Box::new(KdNode { point, value, dim, lo, hi: new_hi })), removed)
            } else if target[n.dim] < n.point[n.dim] {
                let KdNode { point, value, dim, lo, hi } = *n;
                let (new_lo, removed) = remove_where(lo, target, accept);
                (Some(Box::new(KdNode { point, value, dim, lo: new_lo, hi })), removed)
            } else {
                let KdNode { point, value, dim, lo, hi } = *n;
                let (new_hi, removed) = remove_where(hi, target, accept);
                (Some(Box::new(KdNode { point, value, dim, lo, hi: new_hi })), removed)
            }
        }
    }
}

/// Deletes the root of a subtree in hand, restoring the invariant by
/// pulling the replacement key from whichever child exists: the minimum
/// (by this node's split axis) of `hi`, or else the maximum of `lo`.
fn delete_root<V>(node: Box<KdNode<V>>) -> (Option<Box<KdNode<V>>>, Vec<f64>, V) {
    let KdNode { point, value, dim, lo, hi } = *node;
    match hi {
        Some(hi_box) => {
            let (new_hi, min_point, min_value) = extract_min(hi_box, dim);
            (
                Some(Box::new(KdNode {
                    point: min_point,
                    value: min_value,
                    dim,
                    lo,
                    hi: new_hi,
                })),
                point,
                value,
            )
        }
        None => match lo {
            Some(lo_box) => {
                let (new_lo, max_point, max_value) = extract_max(lo_box, dim);
                (
                    Some(Box::new(KdNode {
                        point: max_point,
                        value: max_value,
                        dim,
                        lo: new_lo,
                        hi: None,
                    })),
                    point,
                    value,
                )
            }
            None => (None, point, value),
        },
    }
}

fn min_along_dim<V>(node: &KdNode<V>, target_dim: usize) -> f64 {
    let mut best = node.point[target_dim];
    if node.dim == target_dim {
        if let Some(lo) = &node.lo {
            best = best.min(min_along_dim(lo, target_dim));
        }
    } else {
        if let Some(lo) = &node.lo {
            best = best.min(min_along_dim(lo, target_dim));
        }
        if let Some(hi) = &node.hi {
            best = best.min(min_along_dim(hi, target_dim));
        }
    }
    best
}

fn max_along_dim<V>(node: &KdNode<V>, target_dim: usize) -> f64 {
    let mut best = node.point[target_dim];
    if node.dim == target_dim {
        if let Some(hi) = &node.hi {
            best = best.max(max_along_dim(hi, target_dim));
        }
    } else {
        if let Some(lo) = &node.lo {
            best = best.max(max_along_dim(lo, target_dim));
        }
        if let Some(hi) = &node.hi {
            best = best.max(max_along_dim(hi, target_dim));
        }
    }
    best
}

/// Extracts the node with the minimum value along `target_dim` out of the
/// subtree, reattaching everything else. The minimum may live across
/// either child whenever the node's own split axis differs from
/// `target_dim`, since the subtree is only partitioned along `target_dim`
/// at the depths where that is the active axis.
fn extract_min<V>(node: Box<KdNode<V>>, target_dim: usize) -> (Option<Box<KdNode<V>>>, Vec<f64>, V) {
    let KdNode { point, value, dim, lo, hi } = *node;
    if dim == target_dim {
        match lo {
            None => (hi, point, value),
            Some(lo_box) => {
                let (new_lo, min_point, min_value) = extract_min(lo_box, target_dim);
                (
                    Some(Box::new(KdNode { point, value, dim, lo: new_lo, hi })),
                    min_point,
                    min_value,
                )
            }
        }
    } else {
        let lo_v = lo.as_deref().map(|n| min_along_dim(n, target_dim)).unwrap_or(f64::INFINITY);
        let hi_v = hi.as_deref().map(|n| min_along_dim(n, target_dim)).unwrap_or(f64::INFINITY);
        let here_v = point[target_dim];
        if here_v <= lo_v && here_v <= hi_v {
            let (new_subtree, rem_point, rem_value) = delete_root(Box::new(KdNode { point, value, dim, lo, hi }));
            (new_subtree, rem_point, rem_value)
        } else if lo_v <= hi_v {
            let (new_lo, min_point, min_value) = extract_min(lo.unwrap(), target_dim);
            (
                Some(Box::new(KdNode { point, value, dim, lo: new_lo, hi })),
                min_point,
                min_value,
            )
        } else {
            let (new_hi, min_point, min_value) = extract_min(hi.unwrap(), target_dim);
            (
                Some(Box::new(KdNode { point, value, dim, lo, hi: new_hi })),
                min_point,
                min_value,
            )
        }
    }
}

/// Mirror of [`extract_min`] for the maximum along `target_dim`.
fn extract_max<V>(node: Box<KdNode<V>>, target_dim: usize) -> (Option<Box<KdNode<V>>>, Vec<f64>, V) {
    let KdNode { point, value, dim, lo, hi } = *node;
    if dim == target_dim {
        match hi {
            None => (lo, point, value),
            Some(hi_box) => {
                let (new_hi, max_point, max_value) = extract_max(hi_box, target_dim);
                (
                    Some(Box::new(KdNode { point, value, dim, lo, hi: new_hi })),
                    max_point,
                    max_value,
                )
            }
        }
    } else {
        let lo_v = lo.as_deref().map(|n| max_along_dim(n, target_dim)).unwrap_or(f64::NEG_INFINITY);
        let hi_v = hi.as_deref().map(|n| max_along_dim(n, target_dim)).unwrap_or(f64::NEG_INFINITY);
        let here_v = point[target_dim];
        if here_v >= lo_v && here_v >= hi_v {
            delete_root(Box::new(KdNode { point, value, dim, lo, hi }))
        } else if hi_v >= lo_v {
            let (new_hi, max_point, max_value) = extract_max(hi.unwrap(), target_dim);
            (
                Some(Box::new(KdNode { point, value, dim, lo, hi: new_hi })),
                max_point,
                max_value,
            )
        } else {
            let (new_lo, max_point, max_value) = extract_max(lo.unwrap(), target_dim);
            (
                Some(Box::new(KdNode { point, value, dim, lo: new_lo, hi })),
                max_point,
                max_value,
            )
        }
    }
}
