// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The common capability traits implemented by the point and box
//! engines. Window queries, kNN queries, the full-extent iterator and
//! resettable iterators are inherent methods on each concrete engine
//! instead (their return types are engine-specific iterators), so these
//! traits only cover the operations whose shape is identical
//! everywhere: mutation, exact lookup and the handful of size/lifecycle
//! accessors.
//!
//! Every method here returns a [`SpindexResult`]: a caller-supplied
//! point or box that does not match the index's fixed dimensionality is
//! rejected synchronously, the same way `insert`/`update` already were,
//! rather than indexing past the end of a coordinate slice.
//!
//! A cover tree does not implement any of these: it has no remove or
//! update, and its insert/1-nearest-neighbour shape is its own (see
//! `covertree`).

use crate::error::SpindexResult;

/// Accessors shared by every engine, point- or box-keyed.
pub trait SpatialIndex {
    /// The fixed dimensionality every point or box passed to this index
    /// must have.
    fn dims(&self) -> usize;
    /// Number of entries currently stored.
    fn size(&self) -> usize;
    /// Removes every entry, keeping `dims`.
    fn clear(&mut self);
}

/// A point-keyed index holding at most one value per distinct
/// coordinate: inserting again at an existing point replaces it.
pub trait PointMap<V>: SpatialIndex {
    /// Inserts `value` at `point`, returning the value it replaced, if
    /// any. Errs without modifying the index if `point.len() != dims()`.
    fn insert(&mut self, point: &[f64], value: V) -> SpindexResult<Option<V>>;
    /// Removes the entry at `point`, if any, returning its value. Errs
    /// (index unchanged) if `point.len() != dims()`.
    fn remove(&mut self, point: &[f64]) -> SpindexResult<Option<V>>;
    /// Moves the value stored at `old` to `new`, returning the value
    /// that previously sat at `new`, if any. Errs (index unchanged) if
    /// either point has the wrong dimensionality. If `old` names no
    /// entry this is a silent no-op, not an error: absence is never a
    /// caller error, see `crate::error`.
    fn update(&mut self, old: &[f64], new: &[f64]) -> SpindexResult<Option<V>>;
    /// The value stored at exactly `point`, if any. Errs if
    /// `point.len() != dims()`.
    fn query_exact(&self, point: &[f64]) -> SpindexResult<Option<&V>>;
}

/// A point-keyed index that may hold several values at the same
/// coordinates.
pub trait PointMultimap<V>: SpatialIndex {
    /// Adds `value` at `point` alongside whatever is already there.
    fn insert(&mut self, point: &[f64], value: V) -> SpindexResult<()>;
    /// Removes one entry equal to `value` at `point`, if present. Errs
    /// if `point.len() != dims()`.
    fn remove(&mut self, point: &[f64], value: &V) -> SpindexResult<bool>
    where
        V: PartialEq;
    /// Removes the first entry at `point` for which `pred` holds. Errs
    /// if `point.len() != dims()`.
    fn remove_if<F: FnMut(&V) -> bool>(&mut self, point: &[f64], pred: F) -> SpindexResult<bool>;
    /// Moves one entry equal to `value` from `old` to `new`.
    fn update(&mut self, old: &[f64], new: &[f64], value: &V) -> SpindexResult<bool>
    where
        V: PartialEq;
    /// Whether an entry equal to `value` sits at `point`. Errs if
    /// `point.len() != dims()`.
    fn contains(&self, point: &[f64], value: &V) -> SpindexResult<bool>
    where
        V: PartialEq;
}

/// A box-keyed index holding at most one value per distinct
/// `(lower, upper)` pair.
pub trait BoxMap<V>: SpatialIndex {
    /// Inserts `value` at the box `[lower, upper]`, returning the value
    /// it replaced, if any.
    fn insert(&mut self, lower: &[f64], upper: &[f64], value: V) -> SpindexResult<Option<V>>;
    /// Removes the entry at `[lower, upper]`, if any. Errs if either
    /// bound has the wrong dimensionality.
    fn remove(&mut self, lower: &[f64], upper: &[f64]) -> SpindexResult<Option<V>>;
    /// Moves the value at the old box to the new box. A silent no-op,
    /// not an error, if the old box names no entry.
    fn update(&mut self, old_lower: &[f64], old_upper: &[f64], new_lower: &[f64], new_upper: &[f64]) -> SpindexResult<Option<V>>;
    /// The value stored at exactly `[lower, upper]`, if any. Errs if
    /// either bound has the wrong dimensionality.
    fn query_exact(&self, lower: &[f64], upper: &[f64]) -> SpindexResult<Option<&V>>;
}

/// A box-keyed index that may hold several values at the same box.
pub trait BoxMultimap<V>: SpatialIndex {
    fn insert(&mut self, lower: &[f64], upper: &[f64], value: V) -> SpindexResult<()>;
    fn remove(&mut self, lower: &[f64], upper: &[f64], value: &V) -> SpindexResult<bool>
    where
        V: PartialEq;
    fn remove_if<F: FnMut(&V) -> bool>(&mut self, lower: &[f64], upper: &[f64], pred: F) -> SpindexResult<bool>;
    fn update(
        &mut self,
        old_lower: &[f64],
        old_upper: &[f64],
        new_lower: &[f64],
        new_upper: &[f64],
        value: &V,
    ) -> SpindexResult<bool>
    where
        V: PartialEq;
    fn contains(&self, lower: &[f64], upper: &[f64], value: &V) -> SpindexResult<bool>
    where
        V: PartialEq;
}
