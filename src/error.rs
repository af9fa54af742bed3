// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

/// Errors raised by the bracketed root finder and the 2D minimizer.
///
/// These carry no geometry so that `optimize` stays usable on its own.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RootError {
    /// The function does not change sign over the bracket.
    #[error("no root in bracket: f({a})={fa}, f({b})={fb}")]
    NotBracketed {
        /// Left end of the bracket.
        a: f64,
        /// Right end of the bracket.
        b: f64,
        /// Function value at `a`.
        fa: f64,
        /// Function value at `b`.
        fb: f64,
    },
    /// The function returned a non-finite value.
    #[error("non-finite function value {fx} at x = {x}")]
    NonFinite {
        /// Where the function was evaluated.
        x: f64,
        /// The value it returned.
        fx: f64,
    },
    /// The iteration budget ran out before the tolerance was met.
    #[error("no convergence after {iters} iterations")]
    MaxIterations {
        /// Number of iterations performed.
        iters: usize,
    },
    /// A solver configuration value is out of range.
    #[error("invalid config: {reason}")]
    InvalidConfig {
        /// Which constraint was violated.
        reason: &'static str,
    },
}

/// Errors that can occur while building or solving a local update.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JmmError {
    /// The update specification is inconsistent (missing collaborator,
    /// far base vertex, non-finite raw data, ...).
    #[error("invalid update specification: {reason}")]
    InvalidSpec {
        /// Explanation of what is wrong.
        reason: String,
    },
    /// Exactly one base vertex carries a point-source jet.
    #[error("base jets mix point-source and finite values")]
    MixedPointSource,
    /// All base jets are point sources but no precomputed patch exists.
    #[error("no precomputed boundary data for base {base:?}")]
    MissingBoundaryData {
        /// Base vertex indices, if they were supplied.
        base: Vec<usize>,
    },
    /// Both endpoint values of an edge update are equal, so the boundary
    /// minimum is ambiguous.
    #[error("edge update endpoints have equal values ({value}); patch is malformed")]
    EqualEndpointValues {
        /// The shared endpoint value.
        value: f64,
    },
    /// A finite-difference perturbation did not move the minimizer.
    #[error("hessian not estimable: perturbation along axis {axis} left the minimizer unchanged")]
    HessianNotEstimable {
        /// The coordinate axis being perturbed.
        axis: usize,
    },
    /// Finite-difference step is too small or not finite.
    #[error("invalid finite difference step: {0}")]
    InvalidStep(f64),
    /// The 2D Newton iteration did not converge.
    #[error("update did not converge after {iters} iterations")]
    NotConverged {
        /// Number of iterations performed.
        iters: usize,
    },
    /// A result was requested before `solve` succeeded.
    #[error("update has not been solved")]
    NotSolved,
    /// A mesh cell references a vertex that does not exist.
    #[error("cell {cell} references vertex {index} but the mesh has {num_verts} vertices")]
    InvalidVertexIndex {
        /// The offending cell.
        cell: usize,
        /// The bad vertex index.
        index: usize,
        /// Number of vertices in the mesh.
        num_verts: usize,
    },
    /// A mesh cell has (numerically) zero volume.
    #[error("cell {0} is degenerate")]
    DegenerateCell(usize),
    /// A mesh vertex has a non-finite coordinate.
    #[error("vertex {0} has a non-finite coordinate")]
    NonFiniteCoordinate(usize),
    /// The worker thread pool could not be created.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
    /// The root finder or minimizer failed outright.
    #[error(transparent)]
    Root(#[from] RootError),
}

impl JmmError {
    pub(crate) fn spec(reason: impl Into<String>) -> Self {
        JmmError::InvalidSpec {
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for Results with JmmError.
pub type Result<T> = std::result::Result<T, JmmError>;
