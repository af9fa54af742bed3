// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;

use nalgebra::Vector3;

use crate::bezier::{CubicEdge, CubicTriangle};
use crate::core::{Eikonal, FieldType, Mesh, State};
use crate::error::{JmmError, Result};
use crate::jet::Jet3Hess;

fn sort3(lf: [usize; 3]) -> ([usize; 3], [usize; 3]) {
    let mut perm = [0, 1, 2];
    perm.sort_by_key(|&i| lf[i]);
    ([lf[perm[0]], lf[perm[1]], lf[perm[2]]], perm)
}

/// Read-only per-vertex data of a propagation round: states, accepted
/// jets and boundary conditions, over an owned mesh.
///
/// Vertices start out [`State::Far`] with an empty jet. Setters index by
/// vertex and panic if it is out of range, like slice indexing.
#[derive(Debug, Clone)]
pub struct FieldSnapshot<M> {
    mesh: M,
    ftype: FieldType,
    states: Vec<State>,
    jets: Vec<Jet3Hess>,
    has_bcs: Vec<bool>,
    // keyed by sorted vertex indices; patches stored in key order
    edge_bcs: HashMap<[usize; 2], CubicEdge>,
    face_bcs: HashMap<[usize; 3], CubicTriangle>,
    refl_faces: Vec<[usize; 3]>,
}

impl<M: Mesh> FieldSnapshot<M> {
    /// Create an empty snapshot over `mesh`.
    pub fn new(mesh: M, ftype: FieldType) -> Self {
        let n = mesh.num_verts();
        FieldSnapshot {
            mesh,
            ftype,
            states: vec![State::Far; n],
            jets: vec![Jet3Hess::empty(); n],
            has_bcs: vec![false; n],
            edge_bcs: HashMap::new(),
            face_bcs: HashMap::new(),
            refl_faces: Vec::new(),
        }
    }

    /// Mark every vertex valid, with the jet given by `jet_at` at its
    /// coordinates.
    pub fn with_jets_from<F>(mut self, jet_at: F) -> Self
    where
        F: Fn(&Vector3<f64>) -> Jet3Hess,
    {
        for l in 0..self.mesh.num_verts() {
            self.jets[l] = jet_at(&self.mesh.vertex(l));
            self.states[l] = State::Valid;
        }
        self
    }

    /// Accept `jet` at vertex `l`.
    pub fn with_valid(mut self, l: usize, jet: Jet3Hess) -> Self {
        self.set_jet(l, jet);
        self.states[l] = State::Valid;
        self
    }

    /// Override the state of vertex `l`.
    pub fn with_state(mut self, l: usize, state: State) -> Self {
        self.states[l] = state;
        self
    }

    /// Flag vertex `l` as carrying boundary conditions.
    pub fn with_bcs(mut self, l: usize) -> Self {
        self.has_bcs[l] = true;
        self
    }

    /// Register a precomputed patch for the edge `le`, parametrized from
    /// `le[0]` to `le[1]`.
    pub fn with_edge_bc(mut self, le: [usize; 2], patch: CubicEdge) -> Self {
        if le[0] <= le[1] {
            self.edge_bcs.insert(le, patch);
        } else {
            self.edge_bcs.insert([le[1], le[0]], patch.reversed());
        }
        self
    }

    /// Register a precomputed patch for the face `lf`, with vertex `i`
    /// of the patch at `lf[i]`.
    pub fn with_face_bc(mut self, lf: [usize; 3], patch: CubicTriangle) -> Self {
        let (key, perm) = sort3(lf);
        self.face_bcs.insert(key, patch.permuted(perm));
        self
    }

    /// Register a reflecting boundary face.
    ///
    /// # Errors
    /// [`JmmError::InvalidSpec`] if a face vertex is out of range.
    pub fn with_refl_face(mut self, lf: [usize; 3]) -> Result<Self> {
        let num_verts = self.mesh.num_verts();
        if let Some(&l) = lf.iter().find(|&&l| l >= num_verts) {
            return Err(JmmError::spec(format!(
                "reflecting face vertex {l} out of range for a mesh with {num_verts} vertices"
            )));
        }
        self.refl_faces.push(lf);
        Ok(self)
    }

    /// Replace the jet at vertex `l` without changing its state.
    pub fn set_jet(&mut self, l: usize, jet: Jet3Hess) {
        self.jets[l] = jet;
    }

    /// Change the state of vertex `l`.
    pub fn set_state(&mut self, l: usize, state: State) {
        self.states[l] = state;
    }

    /// Consume the snapshot, returning the mesh.
    pub fn into_mesh(self) -> M {
        self.mesh
    }
}

impl<M: Mesh> Eikonal for FieldSnapshot<M> {
    type Mesh = M;

    fn mesh(&self) -> &M {
        &self.mesh
    }

    fn state(&self, l: usize) -> State {
        self.states[l]
    }

    fn jet(&self, l: usize) -> Jet3Hess {
        self.jets[l]
    }

    fn field_type(&self) -> FieldType {
        self.ftype
    }

    fn edge_bc(&self, le: [usize; 2]) -> Option<CubicEdge> {
        if le[0] <= le[1] {
            self.edge_bcs.get(&le).copied()
        } else {
            self.edge_bcs.get(&[le[1], le[0]]).map(CubicEdge::reversed)
        }
    }

    fn face_bc(&self, lf: [usize; 3]) -> Option<CubicTriangle> {
        let (key, _) = sort3(lf);
        let patch = self.face_bcs.get(&key)?;
        let mut perm = [0; 3];
        for i in 0..3 {
            perm[i] = key.iter().position(|&l| l == lf[i])?;
        }
        Some(patch.permuted(perm))
    }

    fn has_bcs(&self, l: usize) -> bool {
        self.has_bcs[l]
    }

    fn refl_face_inc_on_edge(&self, le: [usize; 2]) -> Option<[usize; 3]> {
        self.refl_faces
            .iter()
            .find(|lf| lf.contains(&le[0]) && lf.contains(&le[1]))
            .copied()
    }
}
