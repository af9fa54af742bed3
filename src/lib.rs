// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Local update solvers for jet marching methods (JMM) on tetrahedral
//! meshes.
//!
//! A jet marching method propagates a front of accepted travel time jets
//! (value and gradient) across a mesh, solving the eikonal equation
//! |∇T| = 1. Each tentative value comes from a local update: the jets on
//! a base edge or face are interpolated by a cubic Bézier patch, and the
//! cost `T(xb) + |x - xb|` is minimized over base points `xb`. This crate
//! provides the edge and face updates, their geometric verdicts (causality,
//! degeneracy, physicality, reflection acceptance), finite difference
//! Hessians, and batch solving with rayon. The front propagation itself is
//! left to the caller, which exposes its state through [`Eikonal`].

#![warn(missing_docs)]

/// Parallel solving and ranking of independent updates.
pub mod batch;
/// Cubic Bernstein-Bézier patches over edges and triangles.
pub mod bezier;
/// Mesh and solver traits, vertex states and parents.
pub mod core;
/// Error types for the library.
pub mod error;
/// Two-parameter refinement of 2D updates along Hermite rays.
pub mod f4;
/// In-memory solver snapshot implementing [`Eikonal`].
pub mod field;
/// Rays and small geometric predicates.
pub mod geom;
/// Value and derivative jets.
pub mod jet;
/// In-memory tetrahedral mesh implementing [`Mesh`].
pub mod mesh;
/// Root finding and minimization kernels.
pub mod optimize;
/// Face (tetrahedron) update.
pub mod tetra_update;
/// Edge (triangle) update.
pub mod tri_update;

pub use crate::batch::{best_update, solve_all, LocalUpdate};
pub use crate::bezier::{Cubic, CubicEdge, CubicTriangle};
pub use crate::core::{Eikonal, FieldType, Mesh, Parent, State};
pub use crate::error::{JmmError, Result, RootError};
pub use crate::field::FieldSnapshot;
pub use crate::jet::{Jet2, Jet3, Jet3Hess};
pub use crate::mesh::TetMesh;
pub use crate::optimize::{HybridConfig, NewtonConfig};
pub use crate::tetra_update::TetraUpdate;
pub use crate::tri_update::{TriUpdate, TriUpdateSpec};
