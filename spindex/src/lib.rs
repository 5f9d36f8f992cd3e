// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # spindex
//!
//! Four in-memory multi-dimensional spatial indexes, built on the
//! heap/geometry primitives in [`spindex_core`]:
//!
//! - [`kdtree`] — a cycling-axis kd-tree.
//! - [`quadtree_point`] — a hypercube point quadtree ("HC2").
//! - [`quadtree_box`] — a hypercube box quadtree ("QR") with a
//!   straddle list for boxes that cross a node's centre.
//! - [`covertree`] — a levelled cover tree under a pluggable distance.
//!
//! The kd-tree and both quadtrees implement [`traits::PointMap`] /
//! [`traits::PointMultimap`] or [`traits::BoxMap`] / [`traits::BoxMultimap`]
//! depending on whether duplicate coordinates should replace or
//! accumulate; the cover tree has no map/multimap counterpart since it
//! supports neither remove nor update (see `covertree`'s module docs).
//! Window and kNN queries are inherent methods returning lazy,
//! restartable iterators rather than trait methods, since their return
//! types differ per engine.

pub mod covertree;
pub mod distance;
pub mod error;
pub mod kdtree;
pub mod quadtree_box;
pub mod quadtree_point;
pub mod traits;

pub use covertree::{CoverTree, CoverTreeBuilder};
pub use error::{SpindexError, SpindexResult};
pub use kdtree::KdTree;
pub use quadtree_box::BoxQuadTree;
pub use quadtree_point::PointQuadTree;
pub use traits::{BoxMap, BoxMultimap, PointMap, PointMultimap, SpatialIndex};
