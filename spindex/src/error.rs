// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The caller-error conditions every engine can raise. These are
//! signalled synchronously and never leave the tree mutated; "not
//! found" is not one of them, it is an ordinary absent result
//! (`Option::None` / `bool`), see the per-engine docs.

use std::error::Error;
use std::fmt;

/// Helper alias for a call that could be rejected as a caller error.
pub type SpindexResult<T> = Result<T, SpindexError>;

/// Invalid-argument conditions an index can detect at its boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SpindexError {
    /// A coordinate vector, box bound, or query centre did not have the
    /// index's fixed dimensionality.
    DimensionMismatch {
        /// The dimensionality the index was constructed with.
        expected: usize,
        /// The length of the offending slice.
        got: usize,
    },
    /// `queryKnn` was called with a negative `k`. `k == 0` is not an
    /// error: it yields an empty kNN iterator (see the boundary
    /// behaviour noted on each engine's `query_knn`).
    InvalidK {
        /// The invalid value of `k` that was supplied.
        k: i64,
    },
    /// A box entry had `lower[i] > upper[i]` on some axis.
    InvalidBox {
        /// The axis on which `lower > upper`.
        axis: usize,
    },
}

impl fmt::Display for SpindexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpindexError::DimensionMismatch { expected, got } => write!(
                f,
                "dimension mismatch: index has {} dimensions, got {}",
                expected, got
            ),
            SpindexError::InvalidK { k } => write!(f, "invalid k for a kNN query: {}", k),
            SpindexError::InvalidBox { axis } => {
                write!(f, "box has lower bound greater than upper bound on axis {}", axis)
            }
        }
    }
}

impl Error for SpindexError {}

/// Validates `got` against `expected`, the index's fixed dimensionality.
pub(crate) fn check_dims(expected: usize, got: usize) -> SpindexResult<()> {
    if expected != got {
        Err(SpindexError::DimensionMismatch { expected, got })
    } else {
        Ok(())
    }
}

/// Validates that `lower[i] <= upper[i]` for every axis.
pub(crate) fn check_box(lower: &[f64], upper: &[f64]) -> SpindexResult<()> {
    for (axis, (&lo, &hi)) in lower.iter().zip(upper).enumerate() {
        if lo > hi {
            return Err(SpindexError::InvalidBox { axis });
        }
    }
    Ok(())
}
