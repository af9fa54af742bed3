// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Solving independent candidate updates in parallel.
//!
//! Updates own all the data they read, so a batch of them can be solved
//! on the rayon pool without synchronization. Choosing which solution to
//! accept is left to the caller; [`best_update`] only ranks by value.

use rayon::prelude::*;
use tracing::debug;

use crate::error::{JmmError, Result};
use crate::tetra_update::TetraUpdate;
use crate::tri_update::TriUpdate;

/// A local update that can be solved with its default configuration.
pub trait LocalUpdate: Send {
    /// Solve with default solver settings.
    fn solve_default(&mut self) -> Result<()>;

    /// Value at the target, `+inf` if unsolved.
    fn value(&self) -> f64;
}

impl LocalUpdate for TriUpdate {
    fn solve_default(&mut self) -> Result<()> {
        self.solve()
    }

    fn value(&self) -> f64 {
        TriUpdate::value(self)
    }
}

impl LocalUpdate for TetraUpdate {
    fn solve_default(&mut self) -> Result<()> {
        self.solve(None)
    }

    fn value(&self) -> f64 {
        TetraUpdate::value(self)
    }
}

/// Solve every update on the global rayon pool, returning one result per
/// update in input order.
pub fn solve_all<U: LocalUpdate>(updates: &mut [U]) -> Vec<Result<()>> {
    let results: Vec<Result<()>> = updates.par_iter_mut().map(|u| u.solve_default()).collect();
    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        debug!(failed, total = updates.len(), "solve_all: some updates failed");
    }
    results
}

/// Like [`solve_all`], on a dedicated pool of `num_threads` workers.
///
/// # Errors
/// [`JmmError::ThreadPool`] if the pool cannot be built.
pub fn solve_all_with_threads<U: LocalUpdate>(
    updates: &mut [U],
    num_threads: usize,
) -> Result<Vec<Result<()>>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| JmmError::ThreadPool(e.to_string()))?;
    Ok(pool.install(|| solve_all(updates)))
}

/// The update with the smallest finite value, if any.
pub fn best_update<U: LocalUpdate>(updates: &[U]) -> Option<&U> {
    updates
        .iter()
        .filter(|u| u.value().is_finite())
        .min_by(|a, b| a.value().total_cmp(&b.value()))
}
