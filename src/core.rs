// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use nalgebra::Vector3;

use crate::bezier::{CubicEdge, CubicTriangle};
use crate::jet::Jet3Hess;

/// Propagation state of a mesh vertex, as tracked by the front
/// propagation scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Not yet reached by the front.
    Far,
    /// Has a tentative value and sits in the scheduler's heap.
    Trial,
    /// Accepted; its jet will not change.
    Valid,
    /// State not tracked (e.g. boundary data supplied from outside).
    Unknown,
}

impl State {
    /// True if a vertex in this state can supply boundary data to an
    /// update.
    pub fn can_supply_jet(self) -> bool {
        matches!(self, State::Valid | State::Unknown)
    }
}

/// Kind of problem being solved by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Travel time from a point source.
    PointSource,
    /// Travel time of a reflected wavefront.
    Reflection,
}

/// Read-only access to the tetrahedral mesh.
///
/// Edge and face queries have default implementations in terms of
/// [`Mesh::vertex`].
pub trait Mesh {
    /// Number of vertices.
    fn num_verts(&self) -> usize;

    /// Coordinates of vertex `l`.
    fn vertex(&self, l: usize) -> Vector3<f64>;

    /// Indices of the cells incident on vertex `l`.
    fn vertex_cells(&self, l: usize) -> &[usize];

    /// True if cell `lc` contains `x` (boundary inclusive).
    fn cell_contains_point(&self, lc: usize, x: &Vector3<f64>) -> bool;

    /// Length of the shortest edge in the mesh.
    fn min_edge_length(&self) -> f64;

    /// True if `le` is a diffracting edge.
    fn is_diff_edge(&self, le: [usize; 2]) -> bool;

    /// Centroid of the triangle `lf`.
    fn face_centroid(&self, lf: [usize; 3]) -> Vector3<f64> {
        (self.vertex(lf[0]) + self.vertex(lf[1]) + self.vertex(lf[2])) / 3.0
    }

    /// Unit normal of the triangle `lf`, oriented by its vertex order.
    fn face_normal(&self, lf: [usize; 3]) -> Vector3<f64> {
        let x0 = self.vertex(lf[0]);
        let dx1 = self.vertex(lf[1]) - x0;
        let dx2 = self.vertex(lf[2]) - x0;
        dx1.cross(&dx2).normalize()
    }

    /// Unit tangent of the edge `le`, pointing from `le[0]` to `le[1]`.
    fn edge_tangent(&self, le: [usize; 2]) -> Vector3<f64> {
        (self.vertex(le[1]) - self.vertex(le[0])).normalize()
    }

    /// Midpoint of the edge `le`.
    fn edge_midpoint(&self, le: [usize; 2]) -> Vector3<f64> {
        0.5 * (self.vertex(le[0]) + self.vertex(le[1]))
    }
}

/// Read-only view of the global solver that local updates consult.
///
/// Implementors expose a snapshot of accepted data; none of these methods
/// mutate shared state.
pub trait Eikonal {
    /// The mesh type.
    type Mesh: Mesh;

    /// The mesh the field lives on.
    fn mesh(&self) -> &Self::Mesh;

    /// Propagation state of vertex `l`.
    fn state(&self, l: usize) -> State;

    /// Accepted jet at vertex `l`.
    fn jet(&self, l: usize) -> Jet3Hess;

    /// Problem type.
    fn field_type(&self) -> FieldType;

    /// Precomputed boundary patch for the diffracting edge `le`, if any.
    fn edge_bc(&self, le: [usize; 2]) -> Option<CubicEdge>;

    /// True if `le` has a precomputed boundary patch.
    fn has_edge_bc(&self, le: [usize; 2]) -> bool {
        self.edge_bc(le).is_some()
    }

    /// Precomputed boundary patch for the face `lf`, if any.
    fn face_bc(&self, lf: [usize; 3]) -> Option<CubicTriangle>;

    /// True if vertex `l` carries boundary conditions.
    fn has_bcs(&self, l: usize) -> bool;

    /// The reflecting boundary face incident on the edge `le`, if any.
    fn refl_face_inc_on_edge(&self, le: [usize; 2]) -> Option<[usize; 3]>;
}

/// Provenance of a solved update: which base vertices contributed and
/// with what barycentric weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parent {
    l: [usize; 3],
    b: [f64; 3],
    len: usize,
}

impl Parent {
    /// Parent of an edge update.
    pub fn edge(l: [usize; 2], b: [f64; 2]) -> Self {
        Parent {
            l: [l[0], l[1], usize::MAX],
            b: [b[0], b[1], f64::NAN],
            len: 2,
        }
    }

    /// Parent of a face update.
    pub fn face(l: [usize; 3], b: [f64; 3]) -> Self {
        Parent { l, b, len: 3 }
    }

    /// Number of parent vertices.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; a parent has at least two vertices.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Parent vertex indices.
    pub fn indices(&self) -> &[usize] {
        &self.l[..self.len]
    }

    /// Barycentric weights matching [`Parent::indices`].
    pub fn weights(&self) -> &[f64] {
        &self.b[..self.len]
    }

    /// Iterate over `(vertex, weight)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices().iter().copied().zip(self.weights().iter().copied())
    }

    /// True if every parent vertex with non-negligible weight carries
    /// boundary conditions.
    pub fn is_on_bc_boundary<E: Eikonal + ?Sized>(&self, eik: &E) -> bool {
        const ATOL: f64 = 1e-14;
        self.iter()
            .filter(|&(_, b)| b > ATOL)
            .all(|(l, _)| eik.has_bcs(l))
    }
}
