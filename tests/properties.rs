// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use nalgebra::{Matrix3, Vector3};
use proptest::prelude::*;

use eikonal_jmm::core::{Eikonal, FieldType, Mesh};
use eikonal_jmm::field::FieldSnapshot;
use eikonal_jmm::jet::{Jet3, Jet3Hess};
use eikonal_jmm::mesh::TetMesh;
use eikonal_jmm::tetra_update::TetraUpdate;
use eikonal_jmm::tri_update::{yield_same_update, TriUpdate};

fn coord() -> impl Strategy<Value = f64> {
    -2.0..2.0f64
}

fn direction() -> impl Strategy<Value = Vector3<f64>> {
    (coord(), coord(), coord())
        .prop_filter("direction must not vanish", |(x, y, z)| x * x + y * y + z * z > 1e-2)
        .prop_map(|(x, y, z)| Vector3::new(x, y, z).normalize())
}

fn plane_wave_edge(s: Vector3<f64>, x: Vector3<f64>) -> TriUpdate {
    let xs = [Vector3::zeros(), Vector3::x()];
    let jets = xs.map(|y| Jet3::new(s.dot(&y), s));
    TriUpdate::from_raw(x, xs, jets).unwrap()
}

proptest! {
    #[test]
    fn edge_minimizer_stays_on_edge_and_beats_endpoints(
        s in direction(),
        tx in coord(),
        ty in 0.5..2.0f64,
        tz in coord(),
    ) {
        let x = Vector3::new(tx, ty, tz);
        let mut u = plane_wave_edge(s, x);
        prop_assume!(u.solve().is_ok());

        let lam = u.lambda().unwrap();
        prop_assert!((0.0..=1.0).contains(&lam));

        let f0 = x.norm();
        let f1 = s.x + (x - Vector3::x()).norm();
        prop_assert!(u.value() <= f0.min(f1) + 1e-12);
        prop_assert!(u.value() >= s.dot(&x) - 1e-10);
    }

    #[test]
    fn finite_difference_hessian_is_symmetric(
        s in direction(),
        tx in 0.2..0.8f64,
        ty in 0.5..2.0f64,
        tz in coord(),
    ) {
        let mut u = plane_wave_edge(s, Vector3::new(tx, ty, tz));
        prop_assume!(u.solve().is_ok());
        if let Ok(hess) = u.approx_hessian(1e-5) {
            prop_assert!((hess - hess.transpose()).norm() <= 1e-12 * (1.0 + hess.norm()));
        }
    }

    #[test]
    fn indexed_and_raw_edge_updates_agree(
        px in coord(),
        py in coord(),
        pz in -3.0..-0.5f64,
        l in 18usize..27,
        edge in 0usize..3,
    ) {
        let mesh = TetMesh::structured_cube(3, 1.0).unwrap();
        let p = Vector3::new(px, py, pz);
        let field = FieldSnapshot::new(mesh, FieldType::PointSource).with_jets_from(|x| {
            let r = x - p;
            Jet3Hess::new(r.norm(), r.normalize(), Matrix3::zeros())
        });
        // base edges on the middle layer
        let (l0, l1) = [(9, 10), (10, 13), (13, 16)][edge];

        let mut indexed = TriUpdate::from_eik(&field, l, l0, l1).unwrap();
        let m = field.mesh();
        let jets = [l0, l1].map(|i| Jet3::from(field.jet(i)));
        let mut raw = TriUpdate::from_raw(m.vertex(l), [m.vertex(l0), m.vertex(l1)], jets).unwrap();

        let a = indexed.solve();
        let b = raw.solve();
        prop_assert_eq!(a.is_ok(), b.is_ok());
        if a.is_ok() {
            prop_assert!(yield_same_update(Some(&indexed), Some(&raw)));
        }
    }

    #[test]
    fn face_minimizer_stays_in_triangle(
        s in direction(),
        tx in coord(),
        ty in coord(),
        tz in 0.5..2.0f64,
    ) {
        let xs = [Vector3::zeros(), Vector3::x(), Vector3::y()];
        let jets = xs.map(|y| Jet3::new(s.dot(&y), s));
        let x = Vector3::new(tx, ty, tz);
        let mut u = TetraUpdate::from_raw(x, xs, jets).unwrap();
        prop_assume!(u.solve(None).is_ok());

        let b = u.bary().unwrap();
        prop_assert!(b.iter().all(|&bi| bi >= -1e-12));
        prop_assert!((b.iter().sum::<f64>() - 1.0).abs() < 1e-12);

        let vertex_best = (0..3)
            .map(|i| s.dot(&xs[i]) + (x - xs[i]).norm())
            .fold(f64::INFINITY, f64::min);
        prop_assert!(u.value() <= vertex_best + 1e-12);
    }
}
