// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Edge ("triangle") update: the travel time at a target point from the
//! jets at the two endpoints of a base edge.
//!
//! The cost `f(lambda) = T(lambda) + L(lambda)` adds the cubic
//! interpolated base time at `xb = (1 - lambda) x0 + lambda x1` to the
//! straight-line distance `L = |x - xb|`. Its stationary point on `[0, 1]`
//! is found with [`hybrid`]; if there is none, or it is not a minimum,
//! the better endpoint is taken.

use std::cmp::Ordering;

use nalgebra::{Matrix3, Vector3};
use tracing::debug;

use crate::bezier::CubicEdge;
use crate::core::{Eikonal, FieldType, Mesh, Parent, State};
use crate::error::{JmmError, Result, RootError};
use crate::geom::{any_cell_contains, cos_angle_at, incident_cells, is_collinear, slerp, Ray3};
use crate::jet::{Jet3, Jet3Hess};
use crate::optimize::{hybrid, HybridConfig};

const ATOL: f64 = 1e-14;
const MULT_ATOL: f64 = 1e-15;

/// Where an update is being computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    /// A mesh vertex.
    Vertex(usize),
    /// An arbitrary point, e.g. a cut point between vertices.
    Point(Vector3<f64>),
}

/// Base edge of an update: either mesh vertices, whose jets come from the
/// solver, or raw coordinates with jets supplied directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeBase {
    /// Mesh vertices `[l0, l1]`.
    Vertices([usize; 2]),
    /// Explicit endpoints and their jets.
    Raw {
        /// Endpoint coordinates.
        x: [Vector3<f64>; 2],
        /// Endpoint jets.
        jets: [Jet3; 2],
    },
}

/// Everything needed to set up an edge update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriUpdateSpec {
    target: Target,
    base: EdgeBase,
    orig_index: Option<usize>,
    patch: Option<CubicEdge>,
}

impl TriUpdateSpec {
    /// Update vertex `l` from the edge `[l0, l1]`.
    pub fn from_vertices(l: usize, l0: usize, l1: usize) -> Self {
        TriUpdateSpec {
            target: Target::Vertex(l),
            base: EdgeBase::Vertices([l0, l1]),
            orig_index: None,
            patch: None,
        }
    }

    /// Update the point `x` from the edge `[l0, l1]`.
    pub fn from_point(x: Vector3<f64>, l0: usize, l1: usize) -> Self {
        TriUpdateSpec {
            target: Target::Point(x),
            base: EdgeBase::Vertices([l0, l1]),
            orig_index: None,
            patch: None,
        }
    }

    /// Update the point `x` from explicit endpoint data.
    pub fn from_raw(x: Vector3<f64>, xs: [Vector3<f64>; 2], jets: [Jet3; 2]) -> Self {
        TriUpdateSpec {
            target: Target::Point(x),
            base: EdgeBase::Raw { x: xs, jets },
            orig_index: None,
            patch: None,
        }
    }

    /// Tag the update with the index of the vertex it originated from.
    pub fn with_orig_index(mut self, index: usize) -> Self {
        self.orig_index = Some(index);
        self
    }

    /// Use a precomputed base patch instead of interpolating the jets.
    pub fn with_boundary_patch(mut self, patch: CubicEdge) -> Self {
        self.patch = Some(patch);
        self
    }

    /// The target of the update.
    pub fn target(&self) -> Target {
        self.target
    }

    /// The base of the update.
    pub fn base(&self) -> EdgeBase {
        self.base
    }

    /// True if the target or base refers to mesh vertices and so must be resolved
    /// against an [`Eikonal`].
    pub fn needs_eikonal(&self) -> bool {
        matches!(self.target, Target::Vertex(_)) || matches!(self.base, EdgeBase::Vertices(_))
    }
}

/// Spec data after indices have been looked up.
struct Resolved {
    l: Option<usize>,
    x: Vector3<f64>,
    le: Option<[usize; 2]>,
    xs: [Vector3<f64>; 2],
    jets: [Jet3; 2],
    state: [State; 2],
    edge_bc: Option<CubicEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    lam: f64,
    f: f64,
    df: f64,
    x_minus_xb: Vector3<f64>,
    len: f64,
}

/// A single edge update.
#[derive(Debug, Clone)]
pub struct TriUpdate {
    l: Option<usize>,
    le: Option<[usize; 2]>,
    x: Vector3<f64>,
    x0: Vector3<f64>,
    x1: Vector3<f64>,
    dx: Vector3<f64>,
    state: [State; 2],
    patch: CubicEdge,
    from_bc: bool,
    orig_index: Option<usize>,
    cfg: HybridConfig,
    sol: Option<Sample>,
}

fn check_index<M: Mesh + ?Sized>(mesh: &M, l: usize) -> Result<usize> {
    if l < mesh.num_verts() {
        Ok(l)
    } else {
        Err(JmmError::spec(format!(
            "vertex {l} out of range for a mesh with {} vertices",
            mesh.num_verts()
        )))
    }
}

fn is_finite3(v: &Vector3<f64>) -> bool {
    v.iter().all(|c| c.is_finite())
}

impl TriUpdate {
    /// Update vertex `l` from the edge `[l0, l1]` of `eik`'s mesh.
    ///
    /// # Errors
    /// See [`TriUpdate::new`].
    pub fn from_eik<E: Eikonal>(eik: &E, l: usize, l0: usize, l1: usize) -> Result<Self> {
        Self::new(&TriUpdateSpec::from_vertices(l, l0, l1), eik)
    }

    /// Update the point `x` from the edge `[l0, l1]` of `eik`'s mesh.
    ///
    /// # Errors
    /// See [`TriUpdate::new`].
    pub fn from_eik_without_l<E: Eikonal>(eik: &E, x: Vector3<f64>, l0: usize, l1: usize) -> Result<Self> {
        Self::new(&TriUpdateSpec::from_point(x, l0, l1), eik)
    }

    /// Update the point `x` from explicit endpoint coordinates and jets.
    ///
    /// # Errors
    /// See [`TriUpdate::new_raw`].
    pub fn from_raw(x: Vector3<f64>, xs: [Vector3<f64>; 2], jets: [Jet3; 2]) -> Result<Self> {
        Self::new_raw(&TriUpdateSpec::from_raw(x, xs, jets))
    }

    /// Set up an update, looking up vertex data in `eik`.
    ///
    /// # Errors
    /// - [`JmmError::InvalidSpec`] if an index is out of range, a base
    ///   vertex cannot supply a jet, or a coordinate or jet is not finite.
    /// - [`JmmError::MixedPointSource`] if exactly one base jet is a point
    ///   source.
    /// - [`JmmError::MissingBoundaryData`] if both are, and no precomputed
    ///   patch is available for a diffracting edge.
    pub fn new<E: Eikonal>(spec: &TriUpdateSpec, eik: &E) -> Result<Self> {
        let mesh = eik.mesh();

        let (l, x) = match spec.target {
            Target::Vertex(l) => (Some(check_index(mesh, l)?), mesh.vertex(l)),
            Target::Point(x) => (None, x),
        };

        let (le, xs, jets, state) = match spec.base {
            EdgeBase::Vertices(le) => {
                for &l in &le {
                    check_index(mesh, l)?;
                }
                (
                    Some(le),
                    le.map(|l| mesh.vertex(l)),
                    le.map(|l| Jet3::from(eik.jet(l))),
                    le.map(|l| eik.state(l)),
                )
            }
            EdgeBase::Raw { x, jets } => (None, x, jets, [State::Unknown; 2]),
        };

        let edge_bc = le
            .filter(|&le| mesh.is_diff_edge(le))
            .and_then(|le| eik.edge_bc(le));

        Self::build(
            spec,
            Resolved {
                l,
                x,
                le,
                xs,
                jets,
                state,
                edge_bc,
            },
        )
    }

    /// Set up an update from a spec that does not refer to mesh vertices.
    ///
    /// # Errors
    /// [`JmmError::InvalidSpec`] if `spec` refers to mesh vertices or the
    /// raw data is not finite; otherwise as for [`TriUpdate::new`].
    pub fn new_raw(spec: &TriUpdateSpec) -> Result<Self> {
        let x = match spec.target {
            Target::Point(x) => x,
            Target::Vertex(l) => {
                return Err(JmmError::spec(format!("target vertex {l} given without a solver")));
            }
        };
        let (xs, jets) = match spec.base {
            EdgeBase::Raw { x, jets } => (x, jets),
            EdgeBase::Vertices(le) => {
                return Err(JmmError::spec(format!("base vertices {le:?} given without a solver")));
            }
        };
        Self::build(
            spec,
            Resolved {
                l: None,
                x,
                le: None,
                xs,
                jets,
                state: [State::Unknown; 2],
                edge_bc: None,
            },
        )
    }

    fn build(spec: &TriUpdateSpec, r: Resolved) -> Result<Self> {
        if !is_finite3(&r.x) {
            return Err(JmmError::spec("target coordinates are not finite"));
        }
        if !r.xs.iter().all(is_finite3) {
            return Err(JmmError::spec("base coordinates are not finite"));
        }
        for (i, state) in r.state.iter().enumerate() {
            if !state.can_supply_jet() {
                let l = r.le.map_or(i, |le| le[i]);
                return Err(JmmError::spec(format!("base vertex {l} is {state:?}")));
            }
        }

        let pt_src = r.jets.map(|jet| jet.is_point_source());
        if pt_src[0] != pt_src[1] {
            return Err(JmmError::MixedPointSource);
        }

        let (patch, from_bc) = if let Some(patch) = spec.patch {
            (patch, true)
        } else if pt_src[0] && pt_src[1] {
            match (r.le, r.edge_bc) {
                (Some(_), Some(patch)) => (patch, true),
                (le, _) => {
                    return Err(JmmError::MissingBoundaryData {
                        base: le.map(Vec::from).unwrap_or_default(),
                    });
                }
            }
        } else {
            if !r.jets.iter().all(Jet3::is_finite) {
                return Err(JmmError::spec("base jets are not finite"));
            }
            (CubicEdge::from_jets(&r.jets, &r.xs), false)
        };

        Ok(TriUpdate {
            l: r.l,
            le: r.le,
            x: r.x,
            x0: r.xs[0],
            x1: r.xs[1],
            dx: r.xs[1] - r.xs[0],
            state: r.state,
            patch,
            from_bc,
            orig_index: spec.orig_index,
            cfg: HybridConfig::default(),
            sol: None,
        })
    }

    /// Use `cfg` for [`TriUpdate::solve`] and for the re-solves of
    /// [`TriUpdate::approx_hessian`].
    pub fn with_config(mut self, cfg: HybridConfig) -> Self {
        self.cfg = cfg;
        self
    }

    fn sample(&self, lam: f64) -> Sample {
        let xb = self.x0 + lam * self.dx;
        let x_minus_xb = self.x - xb;
        let len = x_minus_xb.norm();
        let dl = -self.dx.dot(&x_minus_xb) / len;
        let b = [1.0 - lam, lam];
        Sample {
            lam,
            f: self.patch.f(b) + len,
            df: self.patch.df(b, [-1.0, 1.0]) + dl,
            x_minus_xb,
            len,
        }
    }

    /// Solve with the configured root finder settings.
    ///
    /// # Errors
    /// See [`TriUpdate::solve_with`].
    pub fn solve(&mut self) -> Result<()> {
        let cfg = self.cfg;
        self.solve_with(&cfg)
    }

    /// Minimize the cost over the edge.
    ///
    /// # Errors
    /// - [`JmmError::Root`] if the configuration is invalid or the cost is
    ///   not finite at an endpoint.
    /// - [`JmmError::EqualEndpointValues`] if the minimum lies on the
    ///   boundary and both endpoints tie.
    pub fn solve_with(&mut self, cfg: &HybridConfig) -> Result<()> {
        cfg.validate()?;
        self.sol = None;

        let at0 = self.sample(0.0);
        let at1 = self.sample(1.0);
        if !at0.f.is_finite() {
            return Err(RootError::NonFinite { x: 0.0, fx: at0.f }.into());
        }
        if !at1.f.is_finite() {
            return Err(RootError::NonFinite { x: 1.0, fx: at1.f }.into());
        }

        match hybrid(|lam| self.sample(lam).df, 0.0, 1.0, cfg) {
            Ok(lam) => {
                let s = self.sample(lam);
                if s.f <= at0.f.min(at1.f) {
                    self.sol = Some(s);
                    return Ok(());
                }
                debug!(lam, f = s.f, "edge update: stationary point is not a minimum");
            }
            Err(err) => debug!(%err, "edge update: no interior stationary point"),
        }

        if at0.f == at1.f {
            return Err(JmmError::EqualEndpointValues { value: at0.f });
        }
        self.sol = Some(if at0.f < at1.f { at0 } else { at1 });
        Ok(())
    }

    fn sol(&self) -> Result<&Sample> {
        self.sol.as_ref().ok_or(JmmError::NotSolved)
    }

    /// True once [`TriUpdate::solve`] has succeeded.
    pub fn is_solved(&self) -> bool {
        self.sol.is_some()
    }

    /// Solved edge parameter.
    pub fn lambda(&self) -> Option<f64> {
        self.sol.map(|s| s.lam)
    }

    /// Solved travel time; `+inf` before solving.
    pub fn value(&self) -> f64 {
        self.sol.map_or(f64::INFINITY, |s| s.f)
    }

    /// Travel time and gradient at the target.
    ///
    /// # Errors
    /// [`JmmError::NotSolved`] before a successful solve.
    pub fn jet(&self) -> Result<Jet3> {
        let s = self.sol()?;
        Ok(Jet3::new(s.f, s.x_minus_xb / s.len))
    }

    /// Jet with the Hessian of a field diffracted by the line through the
    /// base edge.
    ///
    /// # Errors
    /// [`JmmError::NotSolved`] before a successful solve.
    pub fn jet_with_edge_hessian(&self) -> Result<Jet3Hess> {
        let jet = self.jet()?;

        let v1 = self.dx.normalize();
        let xproj = self.x0 + v1.dot(&(self.x - self.x0)) * v1;
        let mut v2 = self.x - xproj;
        let dist = v2.norm();
        v2 /= dist;

        let q1 = v1.cross(&v2);
        let q2 = jet.df.cross(&q1);
        let d2f = q1 * q1.transpose() / dist + q2 * q2.transpose() / jet.f;

        Ok(Jet3Hess::from_jet(jet, d2f))
    }

    /// Central difference estimate of the Hessian with step `h`: each
    /// row is the change in ray direction when the target moves by `±h`
    /// along one axis. The result is symmetrized.
    ///
    /// # Errors
    /// - [`JmmError::InvalidStep`] if `h` is below `1e-14` or not finite.
    /// - [`JmmError::HessianNotEstimable`] if a perturbation leaves the
    ///   edge parameter unchanged.
    /// - Any error from re-solving a perturbed update.
    pub fn approx_hessian(&self, h: f64) -> Result<Matrix3<f64>> {
        if !h.is_finite() || h < ATOL {
            return Err(JmmError::InvalidStep(h));
        }
        let lam = self.sol()?.lam;

        let mut hess = Matrix3::zeros();
        for axis in 0..3 {
            let mut row = Vector3::zeros();
            for sign in [1.0, -1.0] {
                let mut u = self.clone();
                u.x[axis] += sign * h;
                u.sol = None;
                u.solve()?;
                let s = u.sol()?;
                if (s.lam - lam).abs() < ATOL {
                    debug!(axis, h, "edge update: perturbation did not move the minimizer");
                    return Err(JmmError::HessianNotEstimable { axis });
                }
                row += sign * s.x_minus_xb / s.len;
            }
            hess.set_row(axis, &(row / (2.0 * h)).transpose());
        }

        Ok(0.5 * (hess + hess.transpose()))
    }

    /// Jet with the finite difference Hessian of [`TriUpdate::approx_hessian`].
    ///
    /// # Errors
    /// As for [`TriUpdate::approx_hessian`].
    pub fn approx_jet(&self, h: f64) -> Result<Jet3Hess> {
        Ok(Jet3Hess::from_jet(self.jet()?, self.approx_hessian(h)?))
    }

    /// Base vertices and their weights; `None` for raw updates or before
    /// solving.
    pub fn parent(&self) -> Option<Parent> {
        let lam = self.lambda()?;
        Some(Parent::edge(self.le?, [1.0 - lam, lam]))
    }

    /// Start of the update ray on the base edge.
    pub fn base_point(&self) -> Option<Vector3<f64>> {
        self.lambda().map(|lam| self.x0 + lam * self.dx)
    }

    /// Unit direction of the update ray.
    pub fn direction(&self) -> Option<Vector3<f64>> {
        self.sol.map(|s| s.x_minus_xb / s.len)
    }

    /// Length of the update ray.
    pub fn length(&self) -> Option<f64> {
        self.sol.map(|s| s.len)
    }

    /// The update ray, from the base point towards the target.
    pub fn ray(&self) -> Option<Ray3> {
        Some(Ray3::new(self.base_point()?, self.sol?.x_minus_xb))
    }

    /// Target coordinates.
    pub fn target(&self) -> Vector3<f64> {
        self.x
    }

    /// Target vertex, if the target is a mesh vertex.
    pub fn target_index(&self) -> Option<usize> {
        self.l
    }

    /// Base vertices, if the base is on the mesh.
    pub fn base_indices(&self) -> Option<[usize; 2]> {
        self.le
    }

    /// States of the base vertices at setup time.
    pub fn base_states(&self) -> [State; 2] {
        self.state
    }

    /// Index passed through [`TriUpdateSpec::with_orig_index`].
    pub fn orig_index(&self) -> Option<usize> {
        self.orig_index
    }

    /// The base patch.
    pub fn patch(&self) -> &CubicEdge {
        &self.patch
    }

    /// True if the base patch is precomputed boundary data.
    pub fn uses_boundary_patch(&self) -> bool {
        self.from_bc
    }

    /// Multiplier of the active bound constraint, zero in the interior.
    pub fn lagrange_multiplier(&self) -> Option<f64> {
        self.sol.map(|s| {
            if s.lam < MULT_ATOL {
                s.df
            } else if s.lam > 1.0 - MULT_ATOL {
                -s.df
            } else {
                0.0
            }
        })
    }

    /// True if the minimizer is interior, or pinned to an endpoint with a
    /// vanishing multiplier.
    pub fn has_interior_point_solution(&self) -> bool {
        let (Some(lam), Some(mult)) = (self.lambda(), self.lagrange_multiplier()) else {
            return false;
        };
        (ATOL < lam && lam < 1.0 - ATOL) || mult.abs() <= ATOL
    }

    /// The base vertex the minimizer is pinned to, if any.
    pub fn active_index(&self) -> Option<usize> {
        let (le, lam) = (self.le?, self.lambda()?);
        if lam < ATOL {
            Some(le[0])
        } else if lam > 1.0 - ATOL {
            Some(le[1])
        } else {
            None
        }
    }

    /// The base vertex opposite to the one the minimizer is pinned to.
    pub fn inactive_index(&self) -> Option<usize> {
        let (le, lam) = (self.le?, self.lambda()?);
        if lam < MULT_ATOL {
            Some(le[1])
        } else if lam > 1.0 - MULT_ATOL {
            Some(le[0])
        } else {
            None
        }
    }

    /// True if `l` is one of the base vertices.
    pub fn contains_base_index(&self, l: usize) -> bool {
        self.le.is_some_and(|le| le.contains(&l))
    }

    /// True if the solved value is finite.
    pub fn is_finite(&self) -> bool {
        self.value().is_finite()
    }

    /// True if the base edge subtends at most a right angle at the target.
    pub fn is_causal(&self) -> bool {
        cos_angle_at(&self.x, &self.x0, &self.x1) >= 0.0
    }

    /// True if the target and the base vertices are collinear.
    pub fn is_degenerate(&self) -> bool {
        is_collinear(&self.x, &self.x0, &self.x1, ATOL)
    }

    /// True if the minimizer coincides with an endpoint of `other`'s base.
    pub fn optimum_incident_on(&self, other: &TriUpdate) -> bool {
        self.base_point().is_some_and(|xb| {
            (other.x0 - xb).norm() < ATOL || (other.x1 - xb).norm() < ATOL
        })
    }

    /// True if the base edge is a diffracting edge of `mesh`.
    pub fn is_incident_on_diff_edge<M: Mesh + ?Sized>(&self, mesh: &M) -> bool {
        self.le.is_some_and(|le| mesh.is_diff_edge(le))
    }

    /// True for a reflection problem whose base vertices both carry
    /// boundary conditions.
    pub fn is_incident_on_refl_bcs<E: Eikonal>(&self, eik: &E) -> bool {
        eik.field_type() == FieldType::Reflection
            && self.le.is_some_and(|le| eik.has_bcs(le[0]) && eik.has_bcs(le[1]))
    }

    /// True if the update ray starts on boundary data only.
    pub fn emits_terminal_ray<E: Eikonal>(&self, eik: &E) -> bool {
        self.parent().is_some_and(|par| par.is_on_bc_boundary(eik))
    }

    /// True if the update ray passes through the mesh just before and
    /// after its start and just before it reaches the target.
    ///
    /// Updates from precomputed boundary data are always physical, as are
    /// updates whose base is not on the mesh. The end of the ray is only
    /// checked for vertex targets.
    pub fn update_ray_is_physical<E: Eikonal>(&self, eik: &E) -> bool {
        let Some(le) = self.le else {
            return true;
        };
        if self.from_bc || eik.has_edge_bc(le) {
            return true;
        }
        let Some(ray) = self.ray() else {
            return false;
        };

        let mesh = eik.mesh();
        let h = mesh.min_edge_length() / 4.0;

        let cells = incident_cells(mesh, &le);
        let xm = ray.point(-h);
        let xp = ray.point(h);
        if !any_cell_contains(mesh, &cells, &xm) || !any_cell_contains(mesh, &cells, &xp) {
            return false;
        }

        let Some(l) = self.l else {
            return true;
        };
        let len = self.length().unwrap_or(0.0);
        let xhatm = ray.point(len - h);
        any_cell_contains(mesh, mesh.vertex_cells(l), &xhatm)
    }

    /// Decide whether an update from an edge of a reflecting boundary
    /// reaches the target on the reflected side.
    ///
    /// The side is determined by the tangent `t = e x DT` of the reflector
    /// along the edge, where `DT` interpolates the endpoint gradients
    /// spherically, oriented away from the reflecting face.
    pub fn accept_refl_bcs_update<E: Eikonal>(&self, eik: &E) -> bool {
        let Some(lam) = self.lambda() else {
            return false;
        };
        if self.l.is_some_and(|l| eik.has_bcs(l)) {
            return false;
        }
        let Some(le) = self.le else {
            return true;
        };
        let Some(lf) = eik.refl_face_inc_on_edge(le) else {
            return true;
        };

        let mesh = eik.mesh();
        let x = &self.x;
        let xf = mesh.face_centroid(lf);
        let nu = mesh.face_normal(lf);
        if nu.dot(x) - nu.dot(&xf) < 0.0 {
            return true;
        }

        let e = mesh.edge_tangent(le);
        let xm = mesh.edge_midpoint(le);

        let df0 = eik.jet(le[0]).df;
        let df1 = eik.jet(le[1]).df;
        let (ok0, ok1) = (is_finite3(&df0), is_finite3(&df1));
        if lam.abs() < ATOL && !ok0 {
            return true;
        }
        if (1.0 - lam).abs() < ATOL && !ok1 {
            return true;
        }
        let dt = match (ok0, ok1) {
            (true, true) => slerp(&df0, &df1, lam),
            (true, false) => df0,
            (false, true) => df1,
            (false, false) => return true,
        };

        let mut t = e.cross(&dt).normalize();
        let dot = t.dot(&xf) - t.dot(&xm);
        // TODO: an exact zero here means the face centroid lies on the
        // plane through the edge; decide on a tolerance for this tie.
        if dot == 0.0 {
            return nu.dot(x) - nu.dot(&xm) < 0.0;
        }
        if dot > 0.0 {
            t = -t;
        }
        t.dot(x) - t.dot(&xm) > 0.0
    }
}

/// Order updates by value, with missing updates last.
pub fn cmp_by_value(u1: Option<&TriUpdate>, u2: Option<&TriUpdate>) -> Ordering {
    match (u1, u2) {
        (None, None) => Ordering::Equal,
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(u1), Some(u2)) => u1.value().partial_cmp(&u2.value()).unwrap_or(Ordering::Equal),
    }
}

/// True if both updates are present and agree in edge parameter and jet.
pub fn yield_same_update(u1: Option<&TriUpdate>, u2: Option<&TriUpdate>) -> bool {
    let (Some(u1), Some(u2)) = (u1, u2) else {
        return false;
    };
    let (Some(lam1), Some(lam2)) = (u1.lambda(), u2.lambda()) else {
        return false;
    };
    if (lam1 - lam2).abs() > ATOL {
        return false;
    }
    match (u1.jet(), u2.jet()) {
        (Ok(j1), Ok(j2)) => j1.approx_eq(&j2, ATOL),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn linear_update(x: Vector3<f64>) -> TriUpdate {
        // plane wave travelling along +x
        let xs = [Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0)];
        let df = Vector3::new(1.0, 0.0, 0.0);
        let jets = [Jet3::new(0.0, df), Jet3::new(1.0, df)];
        TriUpdate::from_raw(x, xs, jets).unwrap()
    }

    #[test]
    fn interior_solution_for_oblique_target() {
        let mut u = TriUpdate::from_raw(
            Vector3::new(0.5, 1.0, 0.0),
            [Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0)],
            [Jet3::new(0.0, Vector3::zeros()), Jet3::new(1.0, Vector3::new(1.0, 0.0, 0.0))],
        )
        .unwrap();
        u.solve().unwrap();
        let lam = u.lambda().unwrap();
        assert!(lam > 0.0 && lam < 1.0);
        assert!(u.has_interior_point_solution());
        // T = 2 lam^2 - lam^3 along the edge
        let t = 2.0 * lam * lam - lam.powi(3);
        let len = ((0.5 - lam).powi(2) + 1.0).sqrt();
        assert_abs_diff_eq!(u.value(), t + len, epsilon = 1e-13);
        assert_abs_diff_eq!(4.0 * lam - 3.0 * lam * lam, (0.5 - lam) / len, epsilon = 1e-12);
        assert_abs_diff_eq!(u.jet().unwrap().df.norm(), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn grazing_plane_wave_pins_to_start() {
        // T grows at unit speed along the edge, so no interior base point
        // beats the straight ray from x0
        let mut u = linear_update(Vector3::new(2.0, 0.5, 0.0));
        u.solve().unwrap();
        assert_eq!(u.lambda(), Some(0.0));
        assert!(u.lagrange_multiplier().unwrap() > 0.0);
        assert!(!u.has_interior_point_solution());
        assert_abs_diff_eq!(u.value(), 4.25f64.sqrt(), epsilon = 1e-14);
        assert_eq!(u.base_point(), Some(Vector3::zeros()));
    }

    #[test]
    fn accessors_before_solve() {
        let u = linear_update(Vector3::new(0.5, 1.0, 0.0));
        assert!(!u.is_solved());
        assert_eq!(u.value(), f64::INFINITY);
        assert!(matches!(u.jet(), Err(JmmError::NotSolved)));
        assert!(u.lambda().is_none());
        assert!(u.parent().is_none());
        assert!(!u.has_interior_point_solution());
        assert!(!u.is_finite());
    }

    #[test]
    fn raw_spec_rejects_vertices() {
        let spec = TriUpdateSpec::from_vertices(0, 1, 2);
        assert!(spec.needs_eikonal());
        assert!(matches!(TriUpdate::new_raw(&spec), Err(JmmError::InvalidSpec { .. })));
    }

    #[test]
    fn raw_spec_rejects_non_finite_jets() {
        let xs = [Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0)];
        let jets = [Jet3::new(0.0, Vector3::repeat(f64::NAN)), Jet3::new(1.0, Vector3::zeros())];
        let result = TriUpdate::from_raw(Vector3::new(0.0, 1.0, 0.0), xs, jets);
        assert!(matches!(result, Err(JmmError::InvalidSpec { .. })));
    }

    #[test]
    fn raw_point_sources_need_patch() {
        let xs = [Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0)];
        let jets = [Jet3::point_source(); 2];
        let x = Vector3::new(0.5, 1.0, 0.0);
        let spec = TriUpdateSpec::from_raw(x, xs, jets);
        assert!(matches!(
            TriUpdate::new_raw(&spec),
            Err(JmmError::MissingBoundaryData { .. })
        ));

        let patch = CubicEdge::from_coefficients([1.0; 4]);
        let mut u = TriUpdate::new_raw(&spec.with_boundary_patch(patch)).unwrap();
        assert!(u.uses_boundary_patch());
        u.solve().unwrap();
        assert_abs_diff_eq!(u.lambda().unwrap(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(u.value(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn symmetric_patch_ties_endpoints() {
        // T peaks mid-edge, so the only stationary point is a maximum and
        // the two endpoints tie
        let patch = CubicEdge::from_coefficients([0.0, 3.0, 3.0, 0.0]);
        let spec = TriUpdateSpec::from_raw(
            Vector3::new(0.5, 0.1, 0.0),
            [Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0)],
            [Jet3::new(0.0, Vector3::zeros()); 2],
        )
        .with_boundary_patch(patch);
        let mut u = TriUpdate::new_raw(&spec).unwrap();
        assert!(matches!(u.solve(), Err(JmmError::EqualEndpointValues { .. })));
        assert!(!u.is_solved());
    }

    #[test]
    fn degenerate_and_causal() {
        let u = linear_update(Vector3::new(-1.0, 0.0, 0.0));
        assert!(u.is_degenerate());
        let u = linear_update(Vector3::new(0.5, 1.0, 0.0));
        assert!(!u.is_degenerate());
        assert!(u.is_causal());
        let u = linear_update(Vector3::new(0.5, 0.2, 0.0));
        assert!(!u.is_causal());
        let u = linear_update(Vector3::new(2.0, 1.0, 0.0));
        assert!(u.is_causal());
    }

    #[test]
    fn orig_index_round_trips() {
        let spec = TriUpdateSpec::from_raw(
            Vector3::new(0.0, 1.0, 0.0),
            [Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0)],
            [Jet3::new(0.0, Vector3::zeros()); 2],
        )
        .with_orig_index(42);
        let u = TriUpdate::new_raw(&spec).unwrap();
        assert_eq!(u.orig_index(), Some(42));
        assert_eq!(u.target_index(), None);
        assert_eq!(u.base_indices(), None);
    }

    #[test]
    fn ordering_puts_missing_last() {
        let mut a = linear_update(Vector3::new(0.5, 1.0, 0.0));
        let mut b = linear_update(Vector3::new(0.5, 2.0, 0.0));
        a.solve().unwrap();
        b.solve().unwrap();
        assert_eq!(cmp_by_value(Some(&a), Some(&b)), Ordering::Less);
        assert_eq!(cmp_by_value(Some(&b), Some(&a)), Ordering::Greater);
        assert_eq!(cmp_by_value(Some(&a), None), Ordering::Less);
        assert_eq!(cmp_by_value(None, Some(&a)), Ordering::Greater);
        assert_eq!(cmp_by_value(None, None), Ordering::Equal);
    }

    #[test]
    fn same_update_detection() {
        let mut a = linear_update(Vector3::new(0.5, 1.0, 0.0));
        a.solve().unwrap();
        let b = a.clone();
        assert!(yield_same_update(Some(&a), Some(&b)));
        assert!(!yield_same_update(Some(&a), None));

        let mut c = linear_update(Vector3::new(0.5, 1.5, 0.0));
        c.solve().unwrap();
        assert!(!yield_same_update(Some(&a), Some(&c)));
    }

    #[test]
    fn optimum_incident_on_shared_vertex() {
        let mut u = linear_update(Vector3::new(2.0, 0.5, 0.0));
        u.solve().unwrap();
        let other = TriUpdate::from_raw(
            Vector3::new(2.0, 0.5, 0.0),
            [Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0)],
            [Jet3::new(0.0, Vector3::new(1.0, 0.0, 0.0)); 2],
        )
        .unwrap();
        assert!(u.optimum_incident_on(&other));
        assert!(!other.optimum_incident_on(&u));
    }

    #[test]
    fn hessian_step_validation() {
        let mut u = linear_update(Vector3::new(0.5, 1.0, 0.0));
        u.solve().unwrap();
        assert!(matches!(u.approx_hessian(1e-15), Err(JmmError::InvalidStep(_))));
        assert!(matches!(u.approx_hessian(f64::NAN), Err(JmmError::InvalidStep(_))));
    }

    #[test]
    fn edge_hessian_annihilates_gradient() {
        let mut u = TriUpdate::from_raw(
            Vector3::new(1.0, 0.0, 2.0),
            [Vector3::zeros(), Vector3::new(2.0, 2.0, 2.0)],
            [Jet3::new(0.0, Vector3::zeros()); 2],
        )
        .unwrap();
        u.solve().unwrap();
        let jet = u.jet_with_edge_hessian().unwrap();
        assert_abs_diff_eq!((jet.d2f * jet.df).norm(), 0.0, epsilon = 1e-13);
        assert_abs_diff_eq!((jet.d2f - jet.d2f.transpose()).norm(), 0.0, epsilon = 1e-15);
    }
}
