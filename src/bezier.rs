// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Cubic Bernstein-Bézier patches over the base simplex of an update.
//!
//! Both patch types are evaluated through their polar form (blossom): with
//! barycentric arguments `u1, u2, u3`, the value is `B(b, b, b)`, the
//! derivative along a barycentric direction `a` (components summing to
//! zero) is `3 B(a, b, b)`, and the second derivative along `a` and `c` is
//! `6 B(a, c, b)`. Each blossom is a de Casteljau sweep with a different
//! argument at every level.

use nalgebra::Vector3;

use crate::jet::Jet3;

/// A cubic Bézier curve over an edge `[x0, x1]`, parametrized by
/// barycentric coordinates `b = (1 - lambda, lambda)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicEdge {
    c: [f64; 4],
}

impl CubicEdge {
    /// Build the Hermite interpolant matching values and gradients of
    /// `jets` at the endpoints `x`.
    pub fn from_jets(jets: &[Jet3; 2], x: &[Vector3<f64>; 2]) -> Self {
        let dx = x[1] - x[0];
        CubicEdge {
            c: [
                jets[0].f,
                jets[0].f + jets[0].df.dot(&dx) / 3.0,
                jets[1].f - jets[1].df.dot(&dx) / 3.0,
                jets[1].f,
            ],
        }
    }

    /// Use externally supplied Bernstein coefficients.
    pub fn from_coefficients(c: [f64; 4]) -> Self {
        CubicEdge { c }
    }

    /// Bernstein coefficients, ordered from the `x0` end.
    pub fn coefficients(&self) -> &[f64; 4] {
        &self.c
    }

    /// The same curve parametrized from the `x1` end.
    pub fn reversed(&self) -> Self {
        let c = self.c;
        CubicEdge {
            c: [c[3], c[2], c[1], c[0]],
        }
    }

    fn blossom(&self, u: [[f64; 2]; 3]) -> f64 {
        let mut c = self.c;
        for (level, u) in u.iter().enumerate() {
            for k in 0..3 - level {
                c[k] = u[0] * c[k] + u[1] * c[k + 1];
            }
        }
        c[0]
    }

    /// Value at barycentric point `b`.
    pub fn f(&self, b: [f64; 2]) -> f64 {
        self.blossom([b, b, b])
    }

    /// Derivative at `b` along barycentric direction `a`.
    pub fn df(&self, b: [f64; 2], a: [f64; 2]) -> f64 {
        3.0 * self.blossom([a, b, b])
    }

    /// Second derivative at `b` along barycentric direction `a` (twice).
    pub fn d2f(&self, b: [f64; 2], a: [f64; 2]) -> f64 {
        6.0 * self.blossom([a, a, b])
    }
}

/// Position of the Bernstein coefficient with multi-index
/// `(n - d, d - k, k)`; independent of the degree `n`.
#[inline]
const fn tri_index(d: usize, k: usize) -> usize {
    d * (d + 1) / 2 + k
}

/// A cubic Bézier patch over a triangle `[x0, x1, x2]`, parametrized by
/// barycentric coordinates `b = (b0, b1, b2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicTriangle {
    c: [f64; 10],
}

impl CubicTriangle {
    /// Build a patch matching the values and gradients in `jets` at the
    /// vertices `x`.
    ///
    /// The centre coefficient is not determined by vertex data; it is
    /// chosen so that the patch reproduces quadratics exactly.
    pub fn from_jets(jets: &[Jet3; 3], x: &[Vector3<f64>; 3]) -> Self {
        let edge = |i: usize, j: usize| jets[i].f + jets[i].df.dot(&(x[j] - x[i])) / 3.0;

        let mut c = [0.0; 10];
        c[tri_index(0, 0)] = jets[0].f;
        c[tri_index(3, 0)] = jets[1].f;
        c[tri_index(3, 3)] = jets[2].f;

        c[tri_index(1, 0)] = edge(0, 1);
        c[tri_index(1, 1)] = edge(0, 2);
        c[tri_index(2, 0)] = edge(1, 0);
        c[tri_index(3, 1)] = edge(1, 2);
        c[tri_index(2, 2)] = edge(2, 0);
        c[tri_index(3, 2)] = edge(2, 1);

        let vert_sum = jets[0].f + jets[1].f + jets[2].f;
        let edge_sum: f64 = [(1, 0), (1, 1), (2, 0), (3, 1), (2, 2), (3, 2)]
            .iter()
            .map(|&(d, k)| c[tri_index(d, k)])
            .sum();
        c[tri_index(2, 1)] = edge_sum / 4.0 - vert_sum / 6.0;

        CubicTriangle { c }
    }

    /// Use externally supplied Bernstein coefficients, ordered by
    /// `d = j + k` and then `k` for the multi-index `(i, j, k)`.
    pub fn from_coefficients(c: [f64; 10]) -> Self {
        CubicTriangle { c }
    }

    /// Bernstein coefficients.
    pub fn coefficients(&self) -> &[f64; 10] {
        &self.c
    }

    /// The same patch over the reordered triangle whose vertex `i` is
    /// vertex `perm[i]` of this one.
    pub fn permuted(&self, perm: [usize; 3]) -> Self {
        let mut c = [0.0; 10];
        for d in 0..=3 {
            for k in 0..=d {
                let new = [3 - d, d - k, k];
                let mut old = [0; 3];
                for i in 0..3 {
                    old[perm[i]] = new[i];
                }
                c[tri_index(d, k)] = self.c[tri_index(old[1] + old[2], old[2])];
            }
        }
        CubicTriangle { c }
    }

    fn blossom(&self, u: [[f64; 3]; 3]) -> f64 {
        let mut c = self.c;
        for (level, u) in u.iter().enumerate() {
            let degree = 3 - level;
            for d in 0..degree {
                for k in 0..=d {
                    c[tri_index(d, k)] = u[0] * c[tri_index(d, k)]
                        + u[1] * c[tri_index(d + 1, k)]
                        + u[2] * c[tri_index(d + 1, k + 1)];
                }
            }
        }
        c[0]
    }

    /// Value at barycentric point `b`.
    pub fn f(&self, b: [f64; 3]) -> f64 {
        self.blossom([b, b, b])
    }

    /// Derivative at `b` along barycentric direction `a`.
    pub fn df(&self, b: [f64; 3], a: [f64; 3]) -> f64 {
        3.0 * self.blossom([a, b, b])
    }

    /// Mixed second derivative at `b` along barycentric directions `a1`
    /// and `a2`.
    pub fn d2f(&self, b: [f64; 3], a1: [f64; 3], a2: [f64; 3]) -> f64 {
        6.0 * self.blossom([a1, a2, b])
    }
}

/// A cubic on `[0, 1]` stored in monomial form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cubic {
    a: [f64; 4],
}

impl Cubic {
    /// Hermite cubic with values `f0, f1` and derivatives `df0, df1` at
    /// `t = 0` and `t = 1`.
    pub fn from_hermite(f0: f64, f1: f64, df0: f64, df1: f64) -> Self {
        Cubic {
            a: [
                f0,
                df0,
                -3.0 * f0 + 3.0 * f1 - 2.0 * df0 - df1,
                2.0 * f0 - 2.0 * f1 + df0 + df1,
            ],
        }
    }

    /// Monomial coefficients `a0 + a1 t + a2 t^2 + a3 t^3`.
    pub fn from_monomial(a: [f64; 4]) -> Self {
        Cubic { a }
    }

    /// Value at `t`.
    pub fn f(&self, t: f64) -> f64 {
        let a = &self.a;
        a[0] + t * (a[1] + t * (a[2] + t * a[3]))
    }

    /// Derivative at `t`.
    pub fn df(&self, t: f64) -> f64 {
        let a = &self.a;
        a[1] + t * (2.0 * a[2] + t * 3.0 * a[3])
    }

    /// Second derivative at `t`.
    pub fn d2f(&self, t: f64) -> f64 {
        2.0 * self.a[2] + 6.0 * self.a[3] * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Matrix3;

    fn quadratic(x: &Vector3<f64>) -> (f64, Vector3<f64>, Matrix3<f64>) {
        // q = x^2 + 2xy - y^2 + 3x - z + 1
        let f = x.x * x.x + 2.0 * x.x * x.y - x.y * x.y + 3.0 * x.x - x.z + 1.0;
        let df = Vector3::new(2.0 * x.x + 2.0 * x.y + 3.0, 2.0 * x.x - 2.0 * x.y, -1.0);
        let d2f = Matrix3::new(2.0, 2.0, 0.0, 2.0, -2.0, 0.0, 0.0, 0.0, 0.0);
        (f, df, d2f)
    }

    fn jet_of(x: &Vector3<f64>) -> Jet3 {
        let (f, df, _) = quadratic(x);
        Jet3::new(f, df)
    }

    #[test]
    fn edge_interpolates_endpoints() {
        let x = [Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 2.0, 0.5)];
        let jets = [jet_of(&x[0]), jet_of(&x[1])];
        let patch = CubicEdge::from_jets(&jets, &x);
        assert_abs_diff_eq!(patch.f([1.0, 0.0]), jets[0].f, epsilon = 1e-14);
        assert_abs_diff_eq!(patch.f([0.0, 1.0]), jets[1].f, epsilon = 1e-14);
        let dx = x[1] - x[0];
        assert_abs_diff_eq!(
            patch.df([1.0, 0.0], [-1.0, 1.0]),
            jets[0].df.dot(&dx),
            epsilon = 1e-13
        );
        assert_abs_diff_eq!(
            patch.df([0.0, 1.0], [-1.0, 1.0]),
            jets[1].df.dot(&dx),
            epsilon = 1e-13
        );
    }

    #[test]
    fn edge_reproduces_quadratic() {
        let x = [Vector3::new(-1.0, 0.5, 0.0), Vector3::new(1.0, 1.0, 2.0)];
        let jets = [jet_of(&x[0]), jet_of(&x[1])];
        let patch = CubicEdge::from_jets(&jets, &x);
        let dx = x[1] - x[0];
        for i in 0..=10 {
            let lam = i as f64 / 10.0;
            let xl = x[0] + lam * dx;
            let (f, df, d2f) = quadratic(&xl);
            let b = [1.0 - lam, lam];
            assert_abs_diff_eq!(patch.f(b), f, epsilon = 1e-12);
            assert_abs_diff_eq!(patch.df(b, [-1.0, 1.0]), df.dot(&dx), epsilon = 1e-12);
            assert_abs_diff_eq!(
                patch.d2f(b, [-1.0, 1.0]),
                dx.dot(&(d2f * dx)),
                epsilon = 1e-11
            );
        }
    }

    #[test]
    fn triangle_reproduces_quadratic() {
        let x = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.2, 0.1),
            Vector3::new(0.3, 1.0, -0.4),
        ];
        let jets = [jet_of(&x[0]), jet_of(&x[1]), jet_of(&x[2])];
        let patch = CubicTriangle::from_jets(&jets, &x);
        let dx1 = x[1] - x[0];
        let dx2 = x[2] - x[0];
        let a1 = [-1.0, 1.0, 0.0];
        let a2 = [-1.0, 0.0, 1.0];
        for &(l1, l2) in &[(0.0, 0.0), (0.2, 0.3), (0.5, 0.5), (0.1, 0.8), (1.0, 0.0)] {
            let b = [1.0 - l1 - l2, l1, l2];
            let xb = x[0] + l1 * dx1 + l2 * dx2;
            let (f, df, d2f) = quadratic(&xb);
            assert_abs_diff_eq!(patch.f(b), f, epsilon = 1e-12);
            assert_abs_diff_eq!(patch.df(b, a1), df.dot(&dx1), epsilon = 1e-12);
            assert_abs_diff_eq!(patch.df(b, a2), df.dot(&dx2), epsilon = 1e-12);
            assert_abs_diff_eq!(patch.d2f(b, a1, a2), dx1.dot(&(d2f * dx2)), epsilon = 1e-11);
            assert_abs_diff_eq!(patch.d2f(b, a2, a2), dx2.dot(&(d2f * dx2)), epsilon = 1e-11);
        }
    }

    #[test]
    fn triangle_vertex_values() {
        let patch = CubicTriangle::from_coefficients([1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 3.0]);
        assert_eq!(patch.f([1.0, 0.0, 0.0]), 1.0);
        assert_eq!(patch.f([0.0, 1.0, 0.0]), 2.0);
        assert_eq!(patch.f([0.0, 0.0, 1.0]), 3.0);
    }

    #[test]
    fn reversed_edge_swaps_orientation() {
        let patch = CubicEdge::from_coefficients([1.0, 2.0, 4.0, 8.0]);
        let rev = patch.reversed();
        for &lam in &[0.0, 0.3, 0.9] {
            assert_abs_diff_eq!(rev.f([1.0 - lam, lam]), patch.f([lam, 1.0 - lam]), epsilon = 1e-14);
        }
    }

    #[test]
    fn permuted_triangle_agrees_pointwise() {
        let c: [f64; 10] = std::array::from_fn(|i| (i * i) as f64 - 3.0 * i as f64);
        let patch = CubicTriangle::from_coefficients(c);
        let perm = [2, 0, 1];
        let moved = patch.permuted(perm);
        let b = [0.2, 0.5, 0.3];
        let mut b_old = [0.0; 3];
        for i in 0..3 {
            b_old[perm[i]] = b[i];
        }
        assert_abs_diff_eq!(moved.f(b), patch.f(b_old), epsilon = 1e-13);
        assert_eq!(patch.permuted([0, 1, 2]), patch);
    }

    #[test]
    fn hermite_cubic_matches_endpoint_data() {
        let c = Cubic::from_hermite(1.0, 2.0, -0.5, 3.0);
        assert_abs_diff_eq!(c.f(0.0), 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(c.f(1.0), 2.0, epsilon = 1e-14);
        assert_abs_diff_eq!(c.df(0.0), -0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(c.df(1.0), 3.0, epsilon = 1e-14);
        let h = 1e-6;
        let fd = (c.df(0.4 + h) - c.df(0.4 - h)) / (2.0 * h);
        assert_abs_diff_eq!(c.d2f(0.4), fd, epsilon = 1e-6);
    }
}
