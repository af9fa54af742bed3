// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use nalgebra::Vector3;

use crate::core::Mesh;

/// A ray with origin `org` and unit direction `dir`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray3 {
    /// Origin of the ray.
    pub org: Vector3<f64>,
    /// Unit direction of the ray.
    pub dir: Vector3<f64>,
}

impl Ray3 {
    /// Create a ray; `dir` is normalized.
    pub fn new(org: Vector3<f64>, dir: Vector3<f64>) -> Self {
        Ray3 {
            org,
            dir: dir.normalize(),
        }
    }

    /// Point at arc length `t` along the ray.
    pub fn point(&self, t: f64) -> Vector3<f64> {
        self.org + t * self.dir
    }
}

/// Spherical linear interpolation between the directions of `p0` and
/// `p1` with barycentric weights `(1 - t, t)`. The result has unit norm.
///
/// Falls back to normalized linear interpolation when the directions
/// (nearly) coincide.
pub fn slerp(p0: &Vector3<f64>, p1: &Vector3<f64>, t: f64) -> Vector3<f64> {
    let q0 = p0.normalize();
    let q1 = p1.normalize();
    let cos = q0.dot(&q1).clamp(-1.0, 1.0);
    let omega = cos.acos();
    let sin = omega.sin();
    if sin.abs() < 1e-12 {
        return ((1.0 - t) * q0 + t * q1).normalize();
    }
    let w0 = ((1.0 - t) * omega).sin() / sin;
    let w1 = (t * omega).sin() / sin;
    (w0 * q0 + w1 * q1).normalize()
}

/// Cosine of the angle at `x` between `x0 - x` and `x1 - x`.
pub fn cos_angle_at(x: &Vector3<f64>, x0: &Vector3<f64>, x1: &Vector3<f64>) -> f64 {
    let d0 = x0 - x;
    let d1 = x1 - x;
    d0.dot(&d1) / (d0.norm() * d1.norm())
}

/// True if `x`, `x0` and `x1` lie on a common line within `atol`.
pub fn is_collinear(x: &Vector3<f64>, x0: &Vector3<f64>, x1: &Vector3<f64>, atol: f64) -> bool {
    let cos = cos_angle_at(x, x0, x1);
    !cos.is_finite() || (1.0 - cos.abs()).abs() < atol
}

/// Scale-free coplanarity measure of `x` and the triangle `xs`: the
/// volume spanned by `xs[i] - x` divided by the product of their lengths.
/// Zero for coplanar points, bounded by one.
pub fn coplanarity(x: &Vector3<f64>, xs: &[Vector3<f64>; 3]) -> f64 {
    let d0 = xs[0] - x;
    let d1 = xs[1] - x;
    let d2 = xs[2] - x;
    let vol = d0.dot(&d1.cross(&d2));
    vol.abs() / (d0.norm() * d1.norm() * d2.norm())
}

/// Union of the cells incident on each vertex in `verts`, without
/// duplicates.
pub fn incident_cells<M: Mesh + ?Sized>(mesh: &M, verts: &[usize]) -> Vec<usize> {
    let mut cells: Vec<usize> = Vec::new();
    for &l in verts {
        for &lc in mesh.vertex_cells(l) {
            if !cells.contains(&lc) {
                cells.push(lc);
            }
        }
    }
    cells
}

/// True if any cell in `cells` contains `p`.
pub fn any_cell_contains<M: Mesh + ?Sized>(mesh: &M, cells: &[usize], p: &Vector3<f64>) -> bool {
    cells.iter().any(|&lc| mesh.cell_contains_point(lc, p))
}
