// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use nalgebra::{Matrix3, Vector3};

/// A bicubic 2-jet: value, both partials and the mixed partial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jet2 {
    /// Value.
    pub f: f64,
    /// Partial derivative in x.
    pub fx: f64,
    /// Partial derivative in y.
    pub fy: f64,
    /// Mixed partial derivative.
    pub fxy: f64,
}

impl Jet2 {
    /// Point-source sentinel: infinite value, undefined derivatives.
    pub fn point_source() -> Self {
        Jet2 {
            f: f64::INFINITY,
            fx: f64::NAN,
            fy: f64::NAN,
            fxy: f64::NAN,
        }
    }

    /// True if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.f.is_finite() && self.fx.is_finite() && self.fy.is_finite() && self.fxy.is_finite()
    }

    /// True if this jet is the point-source sentinel.
    pub fn is_point_source(&self) -> bool {
        self.f == f64::INFINITY
    }
}

/// A first-order 3D jet: travel time and its gradient.
///
/// A jet is either finite, in which case it describes the local linear
/// expansion of the travel time, or it is the point-source sentinel (value
/// `+inf`), which marks a vertex that must not be optimized through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jet3 {
    /// Travel time.
    pub f: f64,
    /// Gradient of the travel time.
    pub df: Vector3<f64>,
}

impl Jet3 {
    /// Create a jet from a value and a gradient.
    pub fn new(f: f64, df: Vector3<f64>) -> Self {
        Jet3 { f, df }
    }

    /// Placeholder for vertices whose jet has not been computed.
    pub fn empty() -> Self {
        Jet3 {
            f: f64::INFINITY,
            df: Vector3::repeat(f64::NAN),
        }
    }

    /// Point-source sentinel. Its value is always `+inf`; the travel time
    /// at the source itself is not stored in the jet.
    pub fn point_source() -> Self {
        Self::empty()
    }

    /// True if the value and every gradient component are finite.
    pub fn is_finite(&self) -> bool {
        self.f.is_finite() && self.df.iter().all(|v| v.is_finite())
    }

    /// True if any component is NaN.
    pub fn is_nan(&self) -> bool {
        self.f.is_nan() || self.df.iter().any(|v| v.is_nan())
    }

    /// True if this jet is the point-source sentinel.
    pub fn is_point_source(&self) -> bool {
        self.f == f64::INFINITY
    }

    /// Componentwise comparison with absolute tolerance `atol`.
    pub fn approx_eq(&self, other: &Jet3, atol: f64) -> bool {
        (self.f - other.f).abs() <= atol
            && self
                .df
                .iter()
                .zip(other.df.iter())
                .all(|(a, b)| (a - b).abs() <= atol)
    }
}

/// A second-order 3D jet: travel time, gradient and Hessian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jet3Hess {
    /// Travel time.
    pub f: f64,
    /// Gradient of the travel time.
    pub df: Vector3<f64>,
    /// Hessian of the travel time.
    pub d2f: Matrix3<f64>,
}

impl Jet3Hess {
    /// Create a jet with a Hessian.
    pub fn new(f: f64, df: Vector3<f64>, d2f: Matrix3<f64>) -> Self {
        Jet3Hess { f, df, d2f }
    }

    /// Attach a Hessian to a first-order jet.
    pub fn from_jet(jet: Jet3, d2f: Matrix3<f64>) -> Self {
        Jet3Hess {
            f: jet.f,
            df: jet.df,
            d2f,
        }
    }

    /// Placeholder for vertices whose jet has not been computed.
    pub fn empty() -> Self {
        Jet3Hess {
            f: f64::INFINITY,
            df: Vector3::repeat(f64::NAN),
            d2f: Matrix3::repeat(f64::NAN),
        }
    }

    /// Point-source sentinel, with value `+inf` like [`Jet3::point_source`].
    pub fn point_source() -> Self {
        Self::empty()
    }

    /// True if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.f.is_finite()
            && self.df.iter().all(|v| v.is_finite())
            && self.d2f.iter().all(|v| v.is_finite())
    }

    /// True if this jet is the point-source sentinel.
    pub fn is_point_source(&self) -> bool {
        self.f == f64::INFINITY
    }
}

impl From<Jet3Hess> for Jet3 {
    fn from(jet: Jet3Hess) -> Self {
        Jet3 {
            f: jet.f,
            df: jet.df,
        }
    }
}
