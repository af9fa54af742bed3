// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Allocation-free numerical kernels used by the local updates.
//!
//! [`hybrid`] is a bracketed 1D root finder combining bisection with
//! secant and inverse quadratic steps. [`minimize_on_triangle`] is a
//! projected Newton method over the unit triangle
//! `{l0 >= 0, l1 >= 0, l0 + l1 <= 1}`. Neither knows anything about
//! meshes or jets.

use nalgebra::{Matrix2, SymmetricEigen, Vector2};

use crate::error::RootError;

/// Configuration for [`hybrid`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridConfig {
    /// Maximum number of iterations.
    pub max_iters: usize,
    /// Absolute tolerance on the root location.
    pub x_abs_tol: f64,
    /// Relative tolerance on the root location.
    pub x_rel_tol: f64,
}

impl Default for HybridConfig {
    fn default() -> Self {
        HybridConfig {
            max_iters: 100,
            x_abs_tol: 1e-15,
            x_rel_tol: 4.0 * f64::EPSILON,
        }
    }
}

impl HybridConfig {
    /// Validates that the tolerances are finite and non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`RootError::InvalidConfig`] if a tolerance is out of range.
    pub fn validate(&self) -> Result<(), RootError> {
        if !self.x_abs_tol.is_finite() || self.x_abs_tol < 0.0 {
            return Err(RootError::InvalidConfig {
                reason: "x_abs_tol must be finite and non-negative",
            });
        }
        if !self.x_rel_tol.is_finite() || self.x_rel_tol < 0.0 {
            return Err(RootError::InvalidConfig {
                reason: "x_rel_tol must be finite and non-negative",
            });
        }
        Ok(())
    }
}

fn finite(x: f64, fx: f64) -> Result<f64, RootError> {
    if fx.is_finite() {
        Ok(fx)
    } else {
        Err(RootError::NonFinite { x, fx })
    }
}

/// Find a root of `f` in `[a, b]`.
///
/// `f(a)` and `f(b)` must have opposite signs, or one of them must be
/// exactly zero, in which case that endpoint is returned.
///
/// # Errors
///
/// Returns [`RootError::NotBracketed`] if there is no sign change,
/// [`RootError::NonFinite`] if `f` produces a non-finite value, and
/// [`RootError::MaxIterations`] if the tolerance is not reached.
pub fn hybrid<F>(mut f: F, a: f64, b: f64, cfg: &HybridConfig) -> Result<f64, RootError>
where
    F: FnMut(f64) -> f64,
{
    cfg.validate()?;

    let (mut a, mut b) = (a, b);
    let mut fa = finite(a, f(a))?;
    let mut fb = finite(b, f(b))?;

    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }
    if fa.signum() == fb.signum() {
        return Err(RootError::NotBracketed { a, b, fa, fb });
    }

    // `b` is the best estimate, `c` the contrapoint, `a` the previous `b`
    let (mut c, mut fc) = (b, fb);
    let mut d = b - a;
    let mut e = d;

    for _ in 0..cfg.max_iters {
        if fb.signum() == fc.signum() {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol = 2.0 * cfg.x_rel_tol * b.abs() + 0.5 * cfg.x_abs_tol;
        let m = 0.5 * (c - b);
        if m.abs() <= tol || fb == 0.0 {
            return Ok(b);
        }

        if e.abs() >= tol && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                (2.0 * m * s, 1.0 - s)
            } else {
                let q = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * m * q * (q - r) - (b - a) * (r - 1.0)),
                    (q - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };
            if p > 0.0 {
                q = -q;
            } else {
                p = -p;
            }
            if 2.0 * p < (3.0 * m * q - (tol * q).abs()).min((e * q).abs()) {
                e = d;
                d = p / q;
            } else {
                d = m;
                e = m;
            }
        } else {
            d = m;
            e = m;
        }

        a = b;
        fa = fb;
        b += if d.abs() > tol { d } else { tol.copysign(m) };
        fb = finite(b, f(b))?;
    }

    Err(RootError::MaxIterations {
        iters: cfg.max_iters,
    })
}

/// Value, gradient and Hessian of a function of two variables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eval2 {
    /// Function value.
    pub f: f64,
    /// Gradient.
    pub g: Vector2<f64>,
    /// Hessian.
    pub h: Matrix2<f64>,
}

/// A twice-differentiable cost over the unit triangle.
pub trait TriangleObjective {
    /// Evaluate the cost and its first two derivatives at `lam`.
    fn eval(&mut self, lam: &Vector2<f64>) -> Eval2;
}

impl<F> TriangleObjective for F
where
    F: FnMut(&Vector2<f64>) -> Eval2,
{
    fn eval(&mut self, lam: &Vector2<f64>) -> Eval2 {
        self(lam)
    }
}

/// Configuration for [`minimize_on_triangle`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonConfig {
    /// Maximum number of Newton iterations.
    pub max_iters: usize,
    /// Iteration stops once an accepted step is at most this long.
    pub step_tol: f64,
    /// Sufficient decrease constant for the backtracking line search.
    pub armijo: f64,
    /// Smallest line search step before a direction is abandoned.
    pub min_step: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        NewtonConfig {
            max_iters: 100,
            step_tol: 1e-13,
            armijo: 1e-4,
            min_step: 1e-12,
        }
    }
}

impl NewtonConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RootError::InvalidConfig`] if a value is out of range.
    pub fn validate(&self) -> Result<(), RootError> {
        if self.max_iters == 0 {
            return Err(RootError::InvalidConfig {
                reason: "max_iters must be positive",
            });
        }
        if !self.step_tol.is_finite() || self.step_tol < 0.0 {
            return Err(RootError::InvalidConfig {
                reason: "step_tol must be finite and non-negative",
            });
        }
        if !(self.armijo > 0.0 && self.armijo < 1.0) {
            return Err(RootError::InvalidConfig {
                reason: "armijo must lie in (0, 1)",
            });
        }
        if !(self.min_step > 0.0 && self.min_step <= 1.0) {
            return Err(RootError::InvalidConfig {
                reason: "min_step must lie in (0, 1]",
            });
        }
        Ok(())
    }
}

/// Result of [`minimize_on_triangle`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minimum2 {
    /// Final iterate.
    pub lam: Vector2<f64>,
    /// Cost and derivatives at `lam`.
    pub eval: Eval2,
    /// Number of iterations taken.
    pub iters: usize,
    /// Whether the stopping criterion was met.
    pub converged: bool,
}

/// Relative floor on the eigenvalues used by the modified Newton step.
const EIGEN_FLOOR: f64 = 1e-8;

/// Tolerance below which a barycentric coordinate counts as zero.
pub const ACTIVE_TOL: f64 = 1e-14;

/// Inward normals (in `lam` space) of the constraints `b0, b1, b2 >= 0`
/// where `b = (1 - l0 - l1, l0, l1)`.
const NORMALS: [[f64; 2]; 3] = [[-1.0, -1.0], [1.0, 0.0], [0.0, 1.0]];

/// Barycentric coordinates of `lam` in the unit triangle.
pub fn barycentric(lam: &Vector2<f64>) -> [f64; 3] {
    [1.0 - lam.x - lam.y, lam.x, lam.y]
}

/// True if `lam` lies in the closed unit triangle.
pub fn in_triangle(lam: &Vector2<f64>) -> bool {
    barycentric(lam).iter().all(|&b| b >= 0.0)
}

fn project_onto_segment(p: &Vector2<f64>, a: Vector2<f64>, b: Vector2<f64>) -> Vector2<f64> {
    let ab = b - a;
    let t = ((p - a).dot(&ab) / ab.norm_squared()).clamp(0.0, 1.0);
    a + t * ab
}

/// Euclidean projection of `p` onto the closed unit triangle.
pub fn project_onto_triangle(p: &Vector2<f64>) -> Vector2<f64> {
    if in_triangle(p) {
        return *p;
    }
    let o = Vector2::new(0.0, 0.0);
    let e1 = Vector2::new(1.0, 0.0);
    let e2 = Vector2::new(0.0, 1.0);
    [
        project_onto_segment(p, o, e1),
        project_onto_segment(p, o, e2),
        project_onto_segment(p, e1, e2),
    ]
    .into_iter()
    .min_by(|q1, q2| {
        (q1 - p)
            .norm_squared()
            .partial_cmp(&(q2 - p).norm_squared())
            .unwrap_or(std::cmp::Ordering::Equal)
    })
    .unwrap_or(o)
}

/// Newton step restricted to the line spanned by the unit vector `tau`.
fn reduced_newton(eval: &Eval2, tau: Vector2<f64>) -> Vector2<f64> {
    let slope = eval.g.dot(&tau);
    let curv = tau.dot(&(eval.h * tau));
    if curv > 0.0 {
        -(slope / curv) * tau
    } else {
        -slope * tau
    }
}

/// Newton step with the Hessian's eigenvalues replaced by their absolute
/// values, floored relative to the largest one.
fn modified_newton(eval: &Eval2) -> Option<Vector2<f64>> {
    let eig = SymmetricEigen::new(eval.h);
    let scale = eig.eigenvalues.amax();
    if !(scale.is_finite() && scale > 0.0) {
        return None;
    }
    let floor = scale * EIGEN_FLOOR;
    let v = eig.eigenvectors;
    let coef = v.transpose() * eval.g;
    let scaled = Vector2::new(
        coef.x / eig.eigenvalues.x.abs().max(floor),
        coef.y / eig.eigenvalues.y.abs().max(floor),
    );
    Some(-(v * scaled))
}

fn line_search<O: TriangleObjective>(
    obj: &mut O,
    lam: &Vector2<f64>,
    cur: &Eval2,
    dir: &Vector2<f64>,
    cfg: &NewtonConfig,
) -> Option<(Vector2<f64>, Eval2)> {
    let mut t = 1.0;
    while t >= cfg.min_step {
        let cand = project_onto_triangle(&(lam + t * dir));
        let next = obj.eval(&cand);
        if next.f.is_finite() && next.f <= cur.f + cfg.armijo * cur.g.dot(&(cand - lam)) {
            return Some((cand, next));
        }
        t *= 0.5;
    }
    None
}

/// Search directions to try from `lam`, in order of preference.
///
/// Constraints that are active and block the descent direction restrict
/// the Newton step to the corresponding edge of the triangle.
fn directions(lam: &Vector2<f64>, cur: &Eval2) -> ([Vector2<f64>; 4], usize) {
    let mut dirs = [Vector2::zeros(); 4];
    let mut n = 0;

    let b = barycentric(lam);
    let mut blocking = [false; 3];
    for i in 0..3 {
        let normal = Vector2::new(NORMALS[i][0], NORMALS[i][1]);
        blocking[i] = b[i] <= ACTIVE_TOL && cur.g.dot(&normal) > 0.0;
    }

    if blocking.iter().any(|&x| x) {
        for i in (0..3).filter(|&i| blocking[i]) {
            let tau = Vector2::new(-NORMALS[i][1], NORMALS[i][0]).normalize();
            dirs[n] = reduced_newton(cur, tau);
            n += 1;
        }
    } else if let Some(chol) = cur.h.cholesky() {
        dirs[n] = -chol.solve(&cur.g);
        n += 1;
    } else if let Some(dir) = modified_newton(cur) {
        dirs[n] = dir;
        n += 1;
    }

    dirs[n] = -cur.g;
    n += 1;
    (dirs, n)
}

/// Minimize `obj` over the closed unit triangle starting from `lam0`.
///
/// Each iteration tries a (possibly edge-restricted) Newton direction,
/// modified to be a descent direction where the Hessian is indefinite, and
/// falls back to steepest descent; steps are projected back onto the
/// triangle and accepted by backtracking on the Armijo condition. When no
/// direction yields descent the current iterate is a constrained
/// stationary point and is reported as converged.
///
/// # Errors
///
/// Returns [`RootError::InvalidConfig`] for a bad configuration and
/// [`RootError::NonFinite`] if the cost is not finite at the start point.
pub fn minimize_on_triangle<O: TriangleObjective>(
    obj: &mut O,
    lam0: Vector2<f64>,
    cfg: &NewtonConfig,
) -> Result<Minimum2, RootError> {
    cfg.validate()?;

    let mut lam = project_onto_triangle(&lam0);
    let mut cur = obj.eval(&lam);
    if !cur.f.is_finite() {
        return Err(RootError::NonFinite {
            x: lam.norm(),
            fx: cur.f,
        });
    }

    for iter in 1..=cfg.max_iters {
        let (dirs, n) = directions(&lam, &cur);
        let accepted = dirs[..n]
            .iter()
            .find_map(|dir| line_search(obj, &lam, &cur, dir, cfg));

        let Some((next_lam, next)) = accepted else {
            tracing::trace!(iter, f = cur.f, "minimize_on_triangle: no descent direction");
            return Ok(Minimum2 {
                lam,
                eval: cur,
                iters: iter,
                converged: true,
            });
        };

        let step = (next_lam - lam).norm();
        lam = next_lam;
        cur = next;
        tracing::trace!(iter, step, f = cur.f, l0 = lam.x, l1 = lam.y, "minimize_on_triangle: step");

        if step <= cfg.step_tol {
            return Ok(Minimum2 {
                lam,
                eval: cur,
                iters: iter,
                converged: true,
            });
        }
    }

    Ok(Minimum2 {
        lam,
        eval: cur,
        iters: cfg.max_iters,
        converged: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn hybrid_finds_cubic_root() {
        let root = hybrid(|x| x * x * x - 2.0 * x - 5.0, 2.0, 3.0, &HybridConfig::default()).unwrap();
        assert_abs_diff_eq!(root, 2.0945514815423265, epsilon = 1e-14);
    }

    #[test]
    fn hybrid_reversed_bracket() {
        let root = hybrid(|x| x - 0.25, 1.0, 0.0, &HybridConfig::default()).unwrap();
        assert_abs_diff_eq!(root, 0.25, epsilon = 1e-15);
    }

    #[test]
    fn hybrid_returns_zero_endpoint() {
        let root = hybrid(|x| x, 0.0, 1.0, &HybridConfig::default()).unwrap();
        assert_eq!(root, 0.0);
    }

    #[test]
    fn hybrid_rejects_missing_sign_change() {
        let result = hybrid(|x| x * x + 1.0, -1.0, 1.0, &HybridConfig::default());
        assert!(matches!(result, Err(RootError::NotBracketed { .. })));
    }

    #[test]
    fn hybrid_rejects_non_finite() {
        let result = hybrid(|x| 1.0 / x, 0.0, 1.0, &HybridConfig::default());
        assert!(matches!(result, Err(RootError::NonFinite { .. })));
    }

    #[test]
    fn hybrid_reports_iteration_limit() {
        let cfg = HybridConfig {
            max_iters: 1,
            ..HybridConfig::default()
        };
        let result = hybrid(|x| x.powi(3) - 0.3, 0.0, 1.0, &cfg);
        assert!(matches!(result, Err(RootError::MaxIterations { iters: 1 })));
    }

    #[test]
    fn hybrid_config_validation() {
        let cfg = HybridConfig {
            x_abs_tol: -1.0,
            ..HybridConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert!(HybridConfig::default().validate().is_ok());
    }

    #[test]
    fn projection_onto_triangle() {
        let p = project_onto_triangle(&Vector2::new(1.0, 1.0));
        assert_abs_diff_eq!(p.x, 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(p.y, 0.5, epsilon = 1e-15);

        let p = project_onto_triangle(&Vector2::new(-1.0, -2.0));
        assert_eq!(p, Vector2::new(0.0, 0.0));

        let p = project_onto_triangle(&Vector2::new(0.5, -0.3));
        assert_abs_diff_eq!(p.x, 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(p.y, 0.0, epsilon = 1e-15);

        let inside = Vector2::new(0.2, 0.3);
        assert_eq!(project_onto_triangle(&inside), inside);
    }

    fn quadratic(center: Vector2<f64>) -> impl FnMut(&Vector2<f64>) -> Eval2 {
        let h = Matrix2::new(2.0, 0.5, 0.5, 1.0);
        move |lam: &Vector2<f64>| {
            let d = lam - center;
            Eval2 {
                f: 0.5 * d.dot(&(h * d)),
                g: h * d,
                h,
            }
        }
    }

    #[test]
    fn minimizer_interior_quadratic() {
        let center = Vector2::new(0.2, 0.3);
        let mut obj = quadratic(center);
        let min = minimize_on_triangle(&mut obj, Vector2::new(1.0 / 3.0, 1.0 / 3.0), &NewtonConfig::default())
            .unwrap();
        assert!(min.converged);
        assert_abs_diff_eq!(min.lam.x, 0.2, epsilon = 1e-13);
        assert_abs_diff_eq!(min.lam.y, 0.3, epsilon = 1e-13);
        assert!(min.iters <= 3);
    }

    #[test]
    fn minimizer_boundary_quadratic() {
        // isotropic bowl centred outside the hypotenuse
        let mut obj = |lam: &Vector2<f64>| {
            let d = lam - Vector2::new(1.0, 1.0);
            Eval2 {
                f: d.norm_squared(),
                g: 2.0 * d,
                h: Matrix2::identity() * 2.0,
            }
        };
        let min = minimize_on_triangle(&mut obj, Vector2::new(0.1, 0.1), &NewtonConfig::default()).unwrap();
        assert!(min.converged);
        assert_abs_diff_eq!(min.lam.x, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(min.lam.y, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn minimizer_vertex_solution() {
        let mut obj = quadratic(Vector2::new(-1.0, -1.0));
        let min = minimize_on_triangle(&mut obj, Vector2::new(0.3, 0.3), &NewtonConfig::default()).unwrap();
        assert!(min.converged);
        assert_abs_diff_eq!(min.lam.norm(), 0.0, epsilon = 1e-12);
    }

    /// Gaussian well of width `s` centred at `c`. Its Hessian is
    /// indefinite wherever `|lam - c|^2 > s / 2`.
    fn gaussian_well(c: Vector2<f64>, s: f64) -> impl FnMut(&Vector2<f64>) -> Eval2 {
        move |lam: &Vector2<f64>| {
            let d = lam - c;
            let e = (-d.norm_squared() / s).exp();
            Eval2 {
                f: -e,
                g: (2.0 * e / s) * d,
                h: (2.0 * e / s) * (Matrix2::identity() - (2.0 / s) * d * d.transpose()),
            }
        }
    }

    #[test]
    fn minimizer_indefinite_start() {
        let c = Vector2::new(0.3, 0.3);
        let lam0 = Vector2::new(0.8, 0.1);
        let mut obj = gaussian_well(c, 0.02);
        assert!(obj(&lam0).h.cholesky().is_none());

        let min = minimize_on_triangle(&mut obj, lam0, &NewtonConfig::default()).unwrap();
        assert!(min.converged);
        assert!(min.iters < NewtonConfig::default().max_iters);
        assert_abs_diff_eq!(min.lam.x, 0.3, epsilon = 1e-8);
        assert_abs_diff_eq!(min.lam.y, 0.3, epsilon = 1e-8);
    }

    #[test]
    fn modified_newton_descends() {
        let eval = Eval2 {
            f: 0.0,
            g: Vector2::new(1.0, -2.0),
            h: Matrix2::new(1.0, 0.0, 0.0, -4.0),
        };
        let dir = modified_newton(&eval).unwrap();
        assert_abs_diff_eq!(dir.x, -1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(dir.y, 0.5, epsilon = 1e-14);
        assert!(dir.dot(&eval.g) < 0.0);
    }

    #[test]
    fn hybrid_default_tolerance() {
        assert_eq!(HybridConfig::default().x_rel_tol, 4.0 * f64::EPSILON);
    }

    #[test]
    fn minimizer_rejects_non_finite_start() {
        let mut obj = |_: &Vector2<f64>| Eval2 {
            f: f64::NAN,
            g: Vector2::zeros(),
            h: Matrix2::identity(),
        };
        let result = minimize_on_triangle(&mut obj, Vector2::zeros(), &NewtonConfig::default());
        assert!(matches!(result, Err(RootError::NonFinite { .. })));
    }
}
