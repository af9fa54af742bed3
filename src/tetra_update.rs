// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Face ("tetrahedron") update: the travel time at a target point from
//! the jets at the three vertices of a base triangle.
//!
//! With `b = (1 - l0 - l1, l0, l1)` and `xb = x0 + l0 (x1 - x0) + l1 (x2 - x0)`
//! the cost is `T(b) + |x - xb|`, minimized over the unit triangle by
//! [`minimize_on_triangle`].

use nalgebra::{Matrix2, Matrix3x2, Vector2, Vector3};
use tracing::debug;

use crate::bezier::CubicTriangle;
use crate::core::{Eikonal, FieldType, Mesh, Parent};
use crate::error::{JmmError, Result};
use crate::geom::{any_cell_contains, coplanarity, incident_cells, Ray3};
use crate::jet::Jet3;
use crate::optimize::{barycentric, minimize_on_triangle, Eval2, NewtonConfig, ACTIVE_TOL};

const ATOL: f64 = 1e-14;

/// Barycentric directions of the two edges leaving `x0`.
const A1: [f64; 3] = [-1.0, 1.0, 0.0];
const A2: [f64; 3] = [-1.0, 0.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq)]
struct Solution {
    lam: Vector2<f64>,
    eval: Eval2,
    x_minus_xb: Vector3<f64>,
    len: f64,
    iters: usize,
}

/// A single face update.
#[derive(Debug, Clone)]
pub struct TetraUpdate {
    lhat: Option<usize>,
    lf: Option<[usize; 3]>,
    x: Vector3<f64>,
    xs: [Vector3<f64>; 3],
    dx: Matrix3x2<f64>,
    jets: [Jet3; 3],
    patch: CubicTriangle,
    from_bc: bool,
    cfg: NewtonConfig,
    sol: Option<Solution>,
}

fn is_finite3(v: &Vector3<f64>) -> bool {
    v.iter().all(|c| c.is_finite())
}

impl TetraUpdate {
    /// Update vertex `lhat` from the face `l` of `eik`'s mesh.
    ///
    /// # Errors
    /// See [`TetraUpdate::from_eik_without_l`].
    pub fn from_eik<E: Eikonal>(eik: &E, lhat: usize, l: [usize; 3]) -> Result<Self> {
        let mesh = eik.mesh();
        if lhat >= mesh.num_verts() {
            return Err(JmmError::spec(format!("target vertex {lhat} out of range")));
        }
        let mut u = Self::from_eik_without_l(eik, mesh.vertex(lhat), l)?;
        u.lhat = Some(lhat);
        Ok(u)
    }

    /// Update the point `x` from the face `l` of `eik`'s mesh.
    ///
    /// If all three base jets are point sources the base patch is the
    /// precomputed [`Eikonal::face_bc`] data.
    ///
    /// # Errors
    /// - [`JmmError::InvalidSpec`] for an out of range index, a base vertex
    ///   that cannot supply a jet, or non-finite data.
    /// - [`JmmError::MixedPointSource`] if some but not all base jets are
    ///   point sources.
    /// - [`JmmError::MissingBoundaryData`] if all are and there is no face
    ///   patch.
    pub fn from_eik_without_l<E: Eikonal>(eik: &E, x: Vector3<f64>, l: [usize; 3]) -> Result<Self> {
        let mesh = eik.mesh();
        for &li in &l {
            if li >= mesh.num_verts() {
                return Err(JmmError::spec(format!("base vertex {li} out of range")));
            }
            let state = eik.state(li);
            if !state.can_supply_jet() {
                return Err(JmmError::spec(format!("base vertex {li} is {state:?}")));
            }
        }
        let xs = l.map(|li| mesh.vertex(li));
        let jets = l.map(|li| Jet3::from(eik.jet(li)));

        let num_pt_src = jets.iter().filter(|jet| jet.is_point_source()).count();
        let (patch, from_bc) = match num_pt_src {
            0 => (Self::interpolate(&jets, &xs)?, false),
            3 => match eik.face_bc(l) {
                Some(patch) => (patch, true),
                None => return Err(JmmError::MissingBoundaryData { base: l.to_vec() }),
            },
            _ => return Err(JmmError::MixedPointSource),
        };

        Self::build(None, Some(l), x, xs, jets, patch, from_bc)
    }

    /// Update the point `x` from explicit vertex coordinates and jets.
    ///
    /// # Errors
    /// [`JmmError::InvalidSpec`] if any coordinate or jet is not finite.
    pub fn from_raw(x: Vector3<f64>, xs: [Vector3<f64>; 3], jets: [Jet3; 3]) -> Result<Self> {
        let patch = Self::interpolate(&jets, &xs)?;
        Self::build(None, None, x, xs, jets, patch, false)
    }

    fn interpolate(jets: &[Jet3; 3], xs: &[Vector3<f64>; 3]) -> Result<CubicTriangle> {
        if !jets.iter().all(Jet3::is_finite) {
            return Err(JmmError::spec("base jets are not finite"));
        }
        Ok(CubicTriangle::from_jets(jets, xs))
    }

    fn build(
        lhat: Option<usize>,
        lf: Option<[usize; 3]>,
        x: Vector3<f64>,
        xs: [Vector3<f64>; 3],
        jets: [Jet3; 3],
        patch: CubicTriangle,
        from_bc: bool,
    ) -> Result<Self> {
        if !is_finite3(&x) {
            return Err(JmmError::spec("target coordinates are not finite"));
        }
        if !xs.iter().all(is_finite3) {
            return Err(JmmError::spec("base coordinates are not finite"));
        }
        Ok(TetraUpdate {
            lhat,
            lf,
            x,
            xs,
            dx: Matrix3x2::from_columns(&[xs[1] - xs[0], xs[2] - xs[0]]),
            jets,
            patch,
            from_bc,
            cfg: NewtonConfig::default(),
            sol: None,
        })
    }

    /// Use `cfg` for the Newton iteration.
    pub fn with_config(mut self, cfg: NewtonConfig) -> Self {
        self.cfg = cfg;
        self
    }

    fn cost(&self, lam: &Vector2<f64>) -> (Eval2, Vector3<f64>, f64) {
        let b = barycentric(lam);
        let xb = self.xs[0] + self.dx * lam;
        let x_minus_xb = self.x - xb;
        let len = x_minus_xb.norm();
        let t = x_minus_xb / len;

        let dl = -(self.dx.transpose() * t);
        let dtx = self.dx.transpose() * t;
        let d2l = (self.dx.transpose() * self.dx - dtx * dtx.transpose()) / len;

        let p = &self.patch;
        let dt = Vector2::new(p.df(b, A1), p.df(b, A2));
        let d12 = p.d2f(b, A1, A2);
        let d2t = Matrix2::new(p.d2f(b, A1, A1), d12, d12, p.d2f(b, A2, A2));

        let eval = Eval2 {
            f: p.f(b) + len,
            g: dt + dl,
            h: d2t + d2l,
        };
        (eval, x_minus_xb, len)
    }

    /// Minimize the cost, starting from `lam0` (the centroid by default).
    ///
    /// # Errors
    /// - [`JmmError::Root`] for an invalid configuration or a non-finite
    ///   cost at the start.
    /// - [`JmmError::NotConverged`] if the iteration limit is reached.
    pub fn solve(&mut self, lam0: Option<[f64; 2]>) -> Result<()> {
        self.sol = None;
        let lam0 = lam0.map_or(Vector2::repeat(1.0 / 3.0), |l| Vector2::new(l[0], l[1]));
        let mut obj = |lam: &Vector2<f64>| self.cost(lam).0;
        let min = minimize_on_triangle(&mut obj, lam0, &self.cfg)?;
        if !min.converged {
            debug!(iters = min.iters, f = min.eval.f, "face update: Newton iteration did not converge");
            return Err(JmmError::NotConverged { iters: min.iters });
        }
        let (eval, x_minus_xb, len) = self.cost(&min.lam);
        self.sol = Some(Solution {
            lam: min.lam,
            eval,
            x_minus_xb,
            len,
            iters: min.iters,
        });
        Ok(())
    }

    fn sol(&self) -> Result<&Solution> {
        self.sol.as_ref().ok_or(JmmError::NotSolved)
    }

    /// True once [`TetraUpdate::solve`] has succeeded.
    pub fn is_solved(&self) -> bool {
        self.sol.is_some()
    }

    /// Newton iterations used by the last solve; zero before solving.
    pub fn num_iters(&self) -> usize {
        self.sol.map_or(0, |s| s.iters)
    }

    /// Solved parameters `(l0, l1)`.
    pub fn lambda(&self) -> Option<[f64; 2]> {
        self.sol.map(|s| [s.lam.x, s.lam.y])
    }

    /// Solved barycentric weights of the base vertices.
    pub fn bary(&self) -> Option<[f64; 3]> {
        self.sol.map(|s| barycentric(&s.lam))
    }

    /// Solved travel time; `+inf` before solving.
    pub fn value(&self) -> f64 {
        self.sol.map_or(f64::INFINITY, |s| s.eval.f)
    }

    /// Travel time and gradient at the target.
    ///
    /// # Errors
    /// [`JmmError::NotSolved`] before a successful solve.
    pub fn jet(&self) -> Result<Jet3> {
        let s = self.sol()?;
        Ok(Jet3::new(s.eval.f, s.x_minus_xb / s.len))
    }

    /// Length of the update ray.
    pub fn length(&self) -> Option<f64> {
        self.sol.map(|s| s.len)
    }

    /// Start of the update ray on the base face.
    pub fn base_point(&self) -> Option<Vector3<f64>> {
        self.sol.map(|s| self.x - s.x_minus_xb)
    }

    /// Unit direction of the update ray.
    pub fn direction(&self) -> Option<Vector3<f64>> {
        self.sol.map(|s| s.x_minus_xb / s.len)
    }

    /// Target coordinates.
    pub fn target(&self) -> Vector3<f64> {
        self.x
    }

    /// Target vertex, if the target is a mesh vertex.
    pub fn target_index(&self) -> Option<usize> {
        self.lhat
    }

    /// Base vertices, if the base is on the mesh.
    pub fn base_indices(&self) -> Option<[usize; 3]> {
        self.lf
    }

    /// True if the base patch is precomputed boundary data.
    pub fn uses_boundary_patch(&self) -> bool {
        self.from_bc
    }

    /// Base vertices and weights; `None` for raw updates or before
    /// solving.
    pub fn parent(&self) -> Option<Parent> {
        Some(Parent::face(self.lf?, self.bary()?))
    }

    /// True if the target is (numerically) coplanar with the base face.
    pub fn is_degenerate(&self) -> bool {
        coplanarity(&self.x, &self.xs) < ATOL
    }

    /// KKT multipliers of the constraints `b_i >= 0`; zero for inactive
    /// constraints.
    pub fn lagrange_multipliers(&self) -> Option<[f64; 3]> {
        const NORMALS: [[f64; 2]; 3] = [[-1.0, -1.0], [1.0, 0.0], [0.0, 1.0]];

        let s = self.sol?;
        let b = barycentric(&s.lam);
        let g = s.eval.g;
        let active: Vec<usize> = (0..3).filter(|&i| b[i] <= ACTIVE_TOL).collect();
        let n = |i: usize| Vector2::new(NORMALS[i][0], NORMALS[i][1]);

        let mut mult = [0.0; 3];
        match active.as_slice() {
            [] => {}
            &[i] => mult[i] = g.dot(&n(i)) / n(i).norm_squared(),
            &[i, j] => {
                let m = Matrix2::from_columns(&[n(i), n(j)]);
                let mu = m.lu().solve(&g)?;
                mult[i] = mu.x;
                mult[j] = mu.y;
            }
            _ => return None,
        }
        Some(mult)
    }

    /// True if the minimizer is interior, or every active constraint has
    /// a vanishing multiplier.
    pub fn has_interior_point_solution(&self) -> bool {
        let Some(b) = self.bary() else {
            return false;
        };
        b.iter().all(|&bi| bi > ATOL)
            || self
                .lagrange_multipliers()
                .is_some_and(|mult| mult.iter().all(|m| m.abs() <= ATOL))
    }

    fn active_mask(&self) -> [bool; 3] {
        self.bary().map_or([false; 3], |b| b.map(|bi| bi > ATOL))
    }

    /// Number of base vertices with non-negligible weight.
    pub fn num_active(&self) -> usize {
        self.active_mask().iter().filter(|&&a| a).count()
    }

    /// Base vertices with non-negligible weight.
    pub fn active_indices(&self) -> Vec<usize> {
        let (Some(lf), mask) = (self.lf, self.active_mask()) else {
            return Vec::new();
        };
        (0..3).filter(|&i| mask[i]).map(|i| lf[i]).collect()
    }

    /// True if base vertex `l` has non-negligible weight.
    pub fn index_is_active(&self, l: usize) -> bool {
        self.active_indices().contains(&l)
    }

    /// The two base vertices other than `l`.
    pub fn other_indices(&self, l: usize) -> Option<[usize; 2]> {
        let lf = self.lf?;
        let i = lf.iter().position(|&li| li == l)?;
        Some([lf[(i + 1) % 3], lf[(i + 2) % 3]])
    }

    /// Number of barycentric weights strictly between 0 and 1: three for
    /// an interior minimizer, two on an edge and none at a vertex.
    pub fn num_interior_coefs(&self) -> usize {
        self.bary().map_or(0, |b| {
            b.iter().filter(|&&bi| bi > ATOL && bi < 1.0 - ATOL).count()
        })
    }

    /// True if the minimizer lies on an edge of the base face and one of
    /// `others`, with the same target and a different face on that edge,
    /// reaches the same minimizer.
    pub fn is_bracketed_by(&self, others: &[TetraUpdate]) -> bool {
        let Some(lf) = self.lf else {
            return false;
        };
        if self.num_interior_coefs() != 2 {
            return false;
        }
        let active = self.active_indices();
        let &[l0, l1] = active.as_slice() else {
            return false;
        };
        others.iter().any(|other| {
            other
                .lf
                .is_some_and(|f| !same_face(f, lf) && f.contains(&l0) && f.contains(&l1))
                && (other.x - self.x).norm() < ATOL
                && same_minimizer(self, other)
        })
    }

    /// True if this update targets `lhat` from the face `l`, in any order.
    pub fn has_indices(&self, lhat: usize, l: [usize; 3]) -> bool {
        self.lhat == Some(lhat) && self.lf.is_some_and(|lf| same_face(lf, l))
    }

    /// True if the update ray points against the gradient at an active
    /// base vertex.
    pub fn is_backwards(&self) -> bool {
        let Some(t) = self.direction() else {
            return false;
        };
        let mask = self.active_mask();
        (0..3).any(|i| mask[i] && self.jets[i].is_finite() && t.dot(&self.jets[i].df) < 0.0)
    }

    /// True if the mesh blocks the update ray just after it leaves the
    /// base or just before it reaches the target vertex.
    pub fn ray_is_occluded<E: Eikonal>(&self, eik: &E) -> bool {
        let (Some(lf), Some(ray), Some(len)) = (self.lf, self.ray(), self.length()) else {
            return false;
        };
        if self.from_bc {
            return false;
        }
        let mesh = eik.mesh();
        let h = mesh.min_edge_length() / 4.0;

        let cells = incident_cells(mesh, &lf);
        if !any_cell_contains(mesh, &cells, &ray.point(h)) {
            return true;
        }
        self.lhat
            .is_some_and(|l| !any_cell_contains(mesh, mesh.vertex_cells(l), &ray.point(len - h)))
    }

    /// True if the update ray passes through the mesh around its start
    /// and is not occluded.
    ///
    /// Updates from precomputed boundary data and raw updates are always
    /// physical.
    pub fn update_ray_is_physical<E: Eikonal>(&self, eik: &E) -> bool {
        let Some(lf) = self.lf else {
            return true;
        };
        if self.from_bc {
            return true;
        }
        let Some(ray) = self.ray() else {
            return false;
        };
        let mesh = eik.mesh();
        let h = mesh.min_edge_length() / 4.0;
        let cells = incident_cells(mesh, &lf);
        any_cell_contains(mesh, &cells, &ray.point(-h)) && !self.ray_is_occluded(eik)
    }

    /// The update ray, from the base point towards the target.
    pub fn ray(&self) -> Option<Ray3> {
        Some(Ray3::new(self.base_point()?, self.sol?.x_minus_xb))
    }

    /// True if exactly two base vertices are active and they span a
    /// diffracting edge of `mesh`.
    pub fn emanates_from_diff_edge<M: Mesh + ?Sized>(&self, mesh: &M) -> bool {
        match self.active_indices().as_slice() {
            &[l0, l1] => mesh.is_diff_edge([l0, l1]),
            _ => false,
        }
    }

    /// True for a reflection problem whose base vertices all carry
    /// boundary conditions.
    pub fn updated_from_refl_bcs<E: Eikonal>(&self, eik: &E) -> bool {
        eik.field_type() == FieldType::Reflection
            && self.lf.is_some_and(|lf| lf.iter().all(|&l| eik.has_bcs(l)))
    }
}

fn same_face(a: [usize; 3], b: [usize; 3]) -> bool {
    let mut a = a;
    let mut b = b;
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

/// True if both updates are solved and their minimizers coincide.
pub fn same_minimizer(u1: &TetraUpdate, u2: &TetraUpdate) -> bool {
    match (u1.base_point(), u2.base_point()) {
        (Some(x1), Some(x2)) => (x1 - x2).norm() < ATOL,
        _ => false,
    }
}

/// True if both updates share a target vertex and a base face.
pub fn same_indices(u1: &TetraUpdate, u2: &TetraUpdate) -> bool {
    match (u1.lhat, u1.lf, u2.lhat, u2.lf) {
        (Some(l1), Some(f1), Some(l2), Some(f2)) => l1 == l2 && same_face(f1, f2),
        _ => false,
    }
}
