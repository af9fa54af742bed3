// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Two-parameter refinement of a 2D update.
//!
//! A ray leaves the segment `[xy0, xy1]` at `xy_eta = xy0 + eta (xy1 - xy0)`
//! along the interpolated gradient `(Tx, Ty)(eta)` and arrives at `xy` with
//! tangent angle `theta`. The ray is the cubic Hermite curve with those
//! end tangents, and `F4(eta, theta)` is `T(eta)` plus its travel time.
//! Everything here is a pure function of its inputs.

use std::ops::{Add, Div, Mul, Neg, Sub};

use nalgebra::{Matrix2, Vector2};
use tracing::trace;

use crate::bezier::Cubic;
use crate::error::{JmmError, Result};
use crate::optimize::NewtonConfig;

/// Slowness (reciprocal speed) of a 2D medium.
pub trait Slowness2 {
    /// Slowness at `xy`.
    fn s(&self, xy: &Vector2<f64>) -> f64;
    /// Gradient of the slowness at `xy`.
    fn grad(&self, xy: &Vector2<f64>) -> Vector2<f64>;
}

/// A homogeneous medium.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantSlowness(pub f64);

impl Slowness2 for ConstantSlowness {
    fn s(&self, _xy: &Vector2<f64>) -> f64 {
        self.0
    }

    fn grad(&self, _xy: &Vector2<f64>) -> Vector2<f64> {
        Vector2::zeros()
    }
}

/// Inputs of [`f3`]: travel time along the base segment and the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct F3Inputs {
    /// Travel time along the segment, parametrized by `eta` in `[0, 1]`.
    pub t: Cubic,
    /// Target point.
    pub xy: Vector2<f64>,
    /// Start of the base segment.
    pub xy0: Vector2<f64>,
    /// End of the base segment.
    pub xy1: Vector2<f64>,
}

/// Straight ray cost `T(eta) + |xy - xy_eta|` and its derivative in `eta`.
pub fn f3(eta: f64, inputs: &F3Inputs) -> (f64, f64) {
    let dxy = inputs.xy1 - inputs.xy0;
    let r = inputs.xy - (inputs.xy0 + eta * dxy);
    let len = r.norm();
    (inputs.t.f(eta) + len, inputs.t.df(eta) - dxy.dot(&r) / len)
}

/// Inputs of [`f4`]: travel time and its gradient along the base
/// segment, and the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct F4Inputs {
    /// Travel time along the segment.
    pub t: Cubic,
    /// x component of the travel time gradient along the segment.
    pub tx: Cubic,
    /// y component of the travel time gradient along the segment.
    pub ty: Cubic,
    /// Target point.
    pub xy: Vector2<f64>,
    /// Start of the base segment.
    pub xy0: Vector2<f64>,
    /// End of the base segment.
    pub xy1: Vector2<f64>,
}

/// Value and partial derivatives of [`f4`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct F4Jet {
    /// `F4(eta, theta)`.
    pub f: f64,
    /// Partial derivative in `eta`.
    pub f_eta: f64,
    /// Partial derivative in `theta`.
    pub f_th: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Dual {
    val: f64,
    eps: f64,
}

impl Dual {
    fn new(val: f64, eps: f64) -> Self {
        Dual { val, eps }
    }

    fn constant(val: f64) -> Self {
        Dual { val, eps: 0.0 }
    }

    fn sqrt(self) -> Self {
        let r = self.val.sqrt();
        Dual::new(r, self.eps / (2.0 * r))
    }

    fn sin(self) -> Self {
        Dual::new(self.val.sin(), self.eps * self.val.cos())
    }

    fn cos(self) -> Self {
        Dual::new(self.val.cos(), -self.eps * self.val.sin())
    }
}

impl Add for Dual {
    type Output = Dual;
    fn add(self, rhs: Dual) -> Dual {
        Dual::new(self.val + rhs.val, self.eps + rhs.eps)
    }
}

impl Sub for Dual {
    type Output = Dual;
    fn sub(self, rhs: Dual) -> Dual {
        Dual::new(self.val - rhs.val, self.eps - rhs.eps)
    }
}

impl Mul for Dual {
    type Output = Dual;
    fn mul(self, rhs: Dual) -> Dual {
        Dual::new(self.val * rhs.val, self.val * rhs.eps + self.eps * rhs.val)
    }
}

impl Mul<Dual> for f64 {
    type Output = Dual;
    fn mul(self, rhs: Dual) -> Dual {
        Dual::new(self * rhs.val, self * rhs.eps)
    }
}

impl Div for Dual {
    type Output = Dual;
    fn div(self, rhs: Dual) -> Dual {
        Dual::new(
            self.val / rhs.val,
            (self.eps * rhs.val - self.val * rhs.eps) / (rhs.val * rhs.val),
        )
    }
}

impl Neg for Dual {
    type Output = Dual;
    fn neg(self) -> Dual {
        Dual::new(-self.val, -self.eps)
    }
}

/// A point or vector in the plane with dual components.
#[derive(Debug, Clone, Copy)]
struct DualVec {
    x: Dual,
    y: Dual,
}

impl DualVec {
    fn constant(v: &Vector2<f64>) -> Self {
        DualVec {
            x: Dual::constant(v.x),
            y: Dual::constant(v.y),
        }
    }

    fn norm(self) -> Dual {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    fn scale(self, a: Dual) -> Self {
        DualVec {
            x: a * self.x,
            y: a * self.y,
        }
    }

    fn axpy(self, a: f64, other: DualVec) -> Self {
        DualVec {
            x: self.x + a * other.x,
            y: self.y + a * other.y,
        }
    }
}

fn cubic_dual(c: &Cubic, t: Dual) -> Dual {
    Dual::new(c.f(t.val), c.df(t.val) * t.eps)
}

fn slowness_dual<S: Slowness2 + ?Sized>(slow: &S, p: DualVec) -> Dual {
    let at = Vector2::new(p.x.val, p.y.val);
    let g = slow.grad(&at);
    Dual::new(slow.s(&at), g.x * p.x.eps + g.y * p.y.eps)
}

/// Hermite basis `(h00, h10, h01, h11)` and its derivative at `sigma`.
fn hermite_basis(sigma: f64) -> ([f64; 4], [f64; 4]) {
    let s2 = sigma * sigma;
    let s3 = s2 * sigma;
    (
        [2.0 * s3 - 3.0 * s2 + 1.0, s3 - 2.0 * s2 + sigma, -2.0 * s3 + 3.0 * s2, s3 - s2],
        [
            6.0 * s2 - 6.0 * sigma,
            3.0 * s2 - 4.0 * sigma + 1.0,
            -6.0 * s2 + 6.0 * sigma,
            3.0 * s2 - 2.0 * sigma,
        ],
    )
}

fn f4_dual<S: Slowness2 + ?Sized>(eta: Dual, th: Dual, inputs: &F4Inputs, slow: &S) -> Dual {
    let xy = DualVec::constant(&inputs.xy);
    let xy0 = DualVec::constant(&inputs.xy0);
    let dxy = inputs.xy1 - inputs.xy0;
    let xy_eta = DualVec {
        x: xy0.x + eta * Dual::constant(dxy.x),
        y: xy0.y + eta * Dual::constant(dxy.y),
    };

    let chord = DualVec {
        x: xy.x - xy_eta.x,
        y: xy.y - xy_eta.y,
    };
    let len = chord.norm();

    let grad = DualVec {
        x: cubic_dual(&inputs.tx, eta),
        y: cubic_dual(&inputs.ty, eta),
    };
    let m0 = grad.scale(len / grad.norm());
    let m1 = DualVec { x: th.cos(), y: th.sin() }.scale(len);

    // Simpson's rule in the curve parameter
    let mut integral = Dual::constant(0.0);
    for (sigma, w) in [(0.0, 1.0), (0.5, 4.0), (1.0, 1.0)] {
        let (h, dh) = hermite_basis(sigma);
        let zero = DualVec::constant(&Vector2::zeros());
        let p = zero.axpy(h[0], xy_eta).axpy(h[1], m0).axpy(h[2], xy).axpy(h[3], m1);
        let dp = zero.axpy(dh[0], xy_eta).axpy(dh[1], m0).axpy(dh[2], xy).axpy(dh[3], m1);
        integral = integral + w * (slowness_dual(slow, p) * dp.norm());
    }

    cubic_dual(&inputs.t, eta) + (1.0 / 6.0) * integral
}

/// Evaluate `F4` and both partial derivatives at `(eta, th)`.
pub fn f4<S: Slowness2 + ?Sized>(eta: f64, th: f64, inputs: &F4Inputs, slow: &S) -> F4Jet {
    let d_eta = f4_dual(Dual::new(eta, 1.0), Dual::constant(th), inputs, slow);
    let d_th = f4_dual(Dual::constant(eta), Dual::new(th, 1.0), inputs, slow);
    F4Jet {
        f: d_eta.val,
        f_eta: d_eta.eps,
        f_th: d_th.eps,
    }
}

/// Result of [`refine_f4`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct F4Solution {
    /// Optimal position on the base segment.
    pub eta: f64,
    /// Optimal arrival angle.
    pub th: f64,
    /// `F4` and its partials at the optimum.
    pub jet: F4Jet,
    /// Newton iterations taken.
    pub iters: usize,
}

const HESS_STEP: f64 = 1e-6;

fn gradient(jet: &F4Jet) -> Vector2<f64> {
    Vector2::new(jet.f_eta, jet.f_th)
}

fn fd_hessian<S: Slowness2 + ?Sized>(eta: f64, th: f64, inputs: &F4Inputs, slow: &S) -> Matrix2<f64> {
    let h = HESS_STEP;
    let col = |de: f64, dt: f64| {
        let p = gradient(&f4(eta + de, th + dt, inputs, slow));
        let m = gradient(&f4(eta - de, th - dt, inputs, slow));
        (p - m) / (2.0 * h)
    };
    let hess = Matrix2::from_columns(&[col(h, 0.0), col(0.0, h)]);
    0.5 * (hess + hess.transpose())
}

/// Minimize `F4` by damped Newton iteration from `(eta0, th0)`, keeping
/// `eta` in `[0, 1]`.
///
/// # Errors
/// [`JmmError::Root`] for an invalid configuration, [`JmmError::NotConverged`]
/// if the iteration limit is reached.
pub fn refine_f4<S: Slowness2 + ?Sized>(
    inputs: &F4Inputs,
    slow: &S,
    start: (f64, f64),
    cfg: &NewtonConfig,
) -> Result<F4Solution> {
    cfg.validate()?;

    let (mut eta, mut th) = (start.0.clamp(0.0, 1.0), start.1);
    let mut jet = f4(eta, th, inputs, slow);

    for iter in 1..=cfg.max_iters {
        let g = gradient(&jet);
        let hess = fd_hessian(eta, th, inputs, slow);
        let pinned = (eta <= 0.0 && g.x > 0.0) || (eta >= 1.0 && g.x < 0.0);
        let dir = if pinned {
            // eta sits on a bound; iterate in theta alone
            let h11 = hess[(1, 1)];
            Vector2::new(0.0, if h11 > 0.0 { -g.y / h11 } else { -g.y })
        } else {
            match hess.cholesky() {
                Some(chol) => -chol.solve(&g),
                None => -g,
            }
        };

        let mut t = 1.0;
        let mut accepted = None;
        while t >= cfg.min_step {
            let cand_eta = (eta + t * dir.x).clamp(0.0, 1.0);
            let cand_th = th + t * dir.y;
            let cand = f4(cand_eta, cand_th, inputs, slow);
            if cand.f.is_finite() && cand.f <= jet.f {
                accepted = Some((cand_eta, cand_th, cand));
                break;
            }
            t *= 0.5;
        }

        let Some((next_eta, next_th, next)) = accepted else {
            return Ok(F4Solution { eta, th, jet, iters: iter });
        };
        let step = Vector2::new(next_eta - eta, next_th - th).norm();
        eta = next_eta;
        th = next_th;
        jet = next;
        trace!(iter, eta, th, f = jet.f, step, "refine_f4: step");

        if step <= cfg.step_tol {
            return Ok(F4Solution { eta, th, jet, iters: iter });
        }
    }

    Err(JmmError::NotConverged {
        iters: cfg.max_iters,
    })
}
