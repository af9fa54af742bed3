// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashSet;

use nalgebra::{Matrix3, Vector3};

use crate::core::Mesh;
use crate::error::{JmmError, Result};

/// Slack used by the point-in-cell test, in barycentric units.
const CONTAINS_EPS: f64 = 1e-12;

/// The six tetrahedra of the Kuhn subdivision of a unit cube, as
/// orderings of the axes along a monotone path from corner 0 to corner 7.
const KUHN_PATHS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

fn sorted_edge(le: [usize; 2]) -> [usize; 2] {
    if le[0] <= le[1] {
        le
    } else {
        [le[1], le[0]]
    }
}

/// An in-memory tetrahedral mesh with vertex-to-cell adjacency.
#[derive(Debug, Clone)]
pub struct TetMesh {
    verts: Vec<Vector3<f64>>,
    cells: Vec<[usize; 4]>,
    vert_cells: Vec<Vec<usize>>,
    /// Inverse of `[v1 - v0, v2 - v0, v3 - v0]` for each cell.
    inv_frames: Vec<Matrix3<f64>>,
    min_edge_length: f64,
    diff_edges: HashSet<[usize; 2]>,
}

impl TetMesh {
    /// Create a mesh from vertex coordinates and cells.
    ///
    /// # Errors
    /// Returns an error if a coordinate is not finite, a cell references a
    /// vertex out of range, or a cell has zero volume.
    pub fn new(verts: Vec<Vector3<f64>>, cells: Vec<[usize; 4]>) -> Result<Self> {
        if let Some(l) = verts.iter().position(|x| !x.iter().all(|c| c.is_finite())) {
            return Err(JmmError::NonFiniteCoordinate(l));
        }

        let num_verts = verts.len();
        let mut vert_cells = vec![Vec::new(); num_verts];
        let mut inv_frames = Vec::with_capacity(cells.len());
        let mut min_edge_length = f64::INFINITY;

        for (lc, cell) in cells.iter().enumerate() {
            if let Some(&index) = cell.iter().find(|&&l| l >= num_verts) {
                return Err(JmmError::InvalidVertexIndex {
                    cell: lc,
                    index,
                    num_verts,
                });
            }

            let x0 = verts[cell[0]];
            let frame = Matrix3::from_columns(&[
                verts[cell[1]] - x0,
                verts[cell[2]] - x0,
                verts[cell[3]] - x0,
            ]);
            let scale = frame.column_iter().map(|c| c.norm()).fold(0.0, f64::max);
            if frame.determinant().abs() <= 1e-14 * scale.powi(3) {
                return Err(JmmError::DegenerateCell(lc));
            }
            let inv = frame.try_inverse().ok_or(JmmError::DegenerateCell(lc))?;
            inv_frames.push(inv);

            for i in 0..4 {
                vert_cells[cell[i]].push(lc);
                for j in i + 1..4 {
                    let len = (verts[cell[i]] - verts[cell[j]]).norm();
                    min_edge_length = min_edge_length.min(len);
                }
            }
        }

        Ok(TetMesh {
            verts,
            cells,
            vert_cells,
            inv_frames,
            min_edge_length,
            diff_edges: HashSet::new(),
        })
    }

    /// Structured mesh of the cube `[0, (n - 1) h]^3` with `n` vertices per
    /// axis, each grid cube split into six tetrahedra. Vertex `(i, j, k)`
    /// has index `i + n j + n^2 k`.
    ///
    /// # Errors
    /// Returns an error if `n < 2` or `h` is not positive and finite.
    pub fn structured_cube(n: usize, h: f64) -> Result<Self> {
        if n < 2 {
            return Err(JmmError::spec(format!("structured cube needs n >= 2, got {n}")));
        }
        if !h.is_finite() || h <= 0.0 {
            return Err(JmmError::spec(format!("structured cube spacing must be positive, got {h}")));
        }

        let index = |i: usize, j: usize, k: usize| i + n * j + n * n * k;

        let mut verts = Vec::with_capacity(n * n * n);
        for k in 0..n {
            for j in 0..n {
                for i in 0..n {
                    verts.push(Vector3::new(i as f64, j as f64, k as f64) * h);
                }
            }
        }

        let mut cells = Vec::with_capacity(6 * (n - 1).pow(3));
        for k in 0..n - 1 {
            for j in 0..n - 1 {
                for i in 0..n - 1 {
                    for path in &KUHN_PATHS {
                        let mut corner = [0usize; 3];
                        let mut cell = [index(i, j, k); 4];
                        for (step, &axis) in path.iter().enumerate() {
                            corner[axis] = 1;
                            cell[step + 1] = index(i + corner[0], j + corner[1], k + corner[2]);
                        }
                        cells.push(cell);
                    }
                }
            }
        }

        TetMesh::new(verts, cells)
    }

    /// Mark edges as diffracting (builder method).
    pub fn with_diff_edges<I: IntoIterator<Item = [usize; 2]>>(mut self, edges: I) -> Self {
        self.diff_edges.extend(edges.into_iter().map(sorted_edge));
        self
    }

    /// The cells of the mesh.
    pub fn cells(&self) -> &[[usize; 4]] {
        &self.cells
    }

    /// Number of cells.
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Barycentric coordinates of `x` with respect to cell `lc`.
    pub fn cell_barycentric(&self, lc: usize, x: &Vector3<f64>) -> [f64; 4] {
        let c = self.inv_frames[lc] * (x - self.verts[self.cells[lc][0]]);
        [1.0 - c.x - c.y - c.z, c.x, c.y, c.z]
    }
}

impl Mesh for TetMesh {
    fn num_verts(&self) -> usize {
        self.verts.len()
    }

    fn vertex(&self, l: usize) -> Vector3<f64> {
        self.verts[l]
    }

    fn vertex_cells(&self, l: usize) -> &[usize] {
        &self.vert_cells[l]
    }

    fn cell_contains_point(&self, lc: usize, x: &Vector3<f64>) -> bool {
        self.cell_barycentric(lc, x).iter().all(|&b| b >= -CONTAINS_EPS)
    }

    fn min_edge_length(&self) -> f64 {
        self.min_edge_length
    }

    fn is_diff_edge(&self, le: [usize; 2]) -> bool {
        self.diff_edges.contains(&sorted_edge(le))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn unit_tet() -> TetMesh {
        TetMesh::new(
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
                Vector3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 1, 2, 3]],
        )
        .unwrap()
    }

    #[test]
    fn single_tet_containment() {
        let mesh = unit_tet();
        assert!(mesh.cell_contains_point(0, &Vector3::new(0.1, 0.1, 0.1)));
        assert!(mesh.cell_contains_point(0, &Vector3::new(0.0, 0.0, 0.0)));
        assert!(mesh.cell_contains_point(0, &Vector3::new(0.5, 0.5, 0.0)));
        assert!(!mesh.cell_contains_point(0, &Vector3::new(0.5, 0.5, 0.1)));
        assert!(!mesh.cell_contains_point(0, &Vector3::new(-0.01, 0.1, 0.1)));
    }

    #[test]
    fn single_tet_min_edge_length() {
        assert_abs_diff_eq!(unit_tet().min_edge_length(), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn structured_cube_counts() {
        let mesh = TetMesh::structured_cube(3, 0.5).unwrap();
        assert_eq!(mesh.num_verts(), 27);
        assert_eq!(mesh.num_cells(), 48);
        assert_abs_diff_eq!(mesh.min_edge_length(), 0.5, epsilon = 1e-15);
        // the centre vertex touches every cell of the eight cubes around it
        assert_eq!(mesh.vertex_cells(13).len(), 24);
        // every Kuhn path starts at the cube's origin corner
        assert_eq!(mesh.vertex_cells(0).len(), 6);
    }

    #[test]
    fn structured_cube_covers_domain() {
        let mesh = TetMesh::structured_cube(3, 1.0).unwrap();
        let probes = [
            Vector3::new(0.3, 1.7, 0.9),
            Vector3::new(1.99, 0.01, 1.5),
            Vector3::new(1.0, 1.0, 1.0),
        ];
        for p in &probes {
            assert!((0..mesh.num_cells()).any(|lc| mesh.cell_contains_point(lc, p)));
        }
        let outside = Vector3::new(1.0, 1.0, 2.1);
        assert!(!(0..mesh.num_cells()).any(|lc| mesh.cell_contains_point(lc, &outside)));
    }

    #[test]
    fn diff_edges_are_unordered() {
        let mesh = unit_tet().with_diff_edges([[2, 0]]);
        assert!(mesh.is_diff_edge([0, 2]));
        assert!(mesh.is_diff_edge([2, 0]));
        assert!(!mesh.is_diff_edge([0, 1]));
    }

    #[test]
    fn invalid_vertex_index() {
        let result = TetMesh::new(vec![Vector3::zeros(); 3], vec![[0, 1, 2, 3]]);
        assert!(matches!(
            result,
            Err(JmmError::InvalidVertexIndex { cell: 0, index: 3, .. })
        ));
    }

    #[test]
    fn degenerate_cell() {
        let result = TetMesh::new(
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
                Vector3::new(1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2, 3]],
        );
        assert!(matches!(result, Err(JmmError::DegenerateCell(0))));
    }

    #[test]
    fn non_finite_vertex() {
        let result = TetMesh::new(vec![Vector3::new(0.0, f64::NAN, 0.0)], vec![]);
        assert!(matches!(result, Err(JmmError::NonFiniteCoordinate(0))));
    }
}
