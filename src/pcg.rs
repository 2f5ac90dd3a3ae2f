// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Preconditioned conjugate gradients over the Mapset vector space, solving
//! `(PᵀN⁻¹P) m = PᵀN⁻¹d`.

use log::info;
use thiserror::Error;

use crate::{
    comm::Communicator,
    config::RunConfig,
    error::MapMakerError,
    map::{Mapset, Precon},
    tod::TodVec,
};

/// Errors specific to the PCG driver.
#[derive(Error, Debug)]
pub enum PcgError {
    /// `p·q <= 0` or non-finite at the given iteration; the operator is
    /// either not SPD on this input or the computation has diverged.
    #[error("PCG numerical breakdown at iteration {iter}: p.q = {pq}")]
    NumericalBreakdown { iter: usize, pq: f64 },
}

/// Run PCG to solve `A x = b` where `A(p) = tods.dot(p, ..)`, starting from
/// `x0`, for up to `config.maxiter` iterations (§4.G), after seeding the
/// pointing kernels' worker pool from `config.num_threads`. `tol`, if given,
/// allows an early exit once `||r|| / ||b|| <= tol` -- an accepted extension
/// over the fixed-iteration baseline.
pub fn run_pcg(
    tods: &TodVec,
    b: &Mapset,
    x0: Mapset,
    precon: &Precon,
    comm: &dyn Communicator,
    config: &RunConfig,
    tol: Option<f64>,
) -> Result<Mapset, MapMakerError> {
    crate::pointing::set_nthread(config.num_threads);
    let maxiter = config.maxiter;
    let mut x = x0;

    let mut r = b.box_clone();
    let mut ax = b.box_clone();
    ax.clear();
    tods.dot(&x, &mut ax, comm, false)?;
    r.axpy(&ax, -1.0)?;

    let b_norm = b.dot(b)?.sqrt();

    let mut z = precon.apply(&r)?;
    let mut p = z.box_clone();
    let mut rho = r.dot(&z)?;

    if comm.rank() == 0 {
        info!("PCG: starting, ||r||/||b|| = {:.6e}", r.dot(&r)?.sqrt() / b_norm.max(1e-300));
    }

    for iter in 1..=maxiter {
        let mut q = p.box_clone();
        q.clear();
        tods.dot(&p, &mut q, comm, false)?;

        let pq = p.dot(&q)?;
        if pq <= 0.0 || !pq.is_finite() {
            return Err(MapMakerError::Pcg(PcgError::NumericalBreakdown { iter, pq }));
        }
        let alpha = rho / pq;

        x.axpy(&p, alpha)?;
        r.axpy(&q, -alpha)?;

        let r_norm = r.dot(&r)?.sqrt();
        if comm.rank() == 0 {
            info!(
                "PCG iteration {iter}/{maxiter}: ||r||/||b|| = {:.6e}",
                r_norm / b_norm.max(1e-300)
            );
        }
        if let Some(t) = tol {
            if r_norm / b_norm.max(1e-300) <= t {
                break;
            }
        }

        z = precon.apply(&r)?;
        let rho_new = r.dot(&z)?;
        if !rho_new.is_finite() {
            return Err(MapMakerError::Pcg(PcgError::NumericalBreakdown { iter, pq: rho_new }));
        }
        let beta = rho_new / rho;

        let mut new_p = z.box_clone();
        new_p.axpy(&p, beta)?;
        p = new_p;
        rho = rho_new;
    }

    Ok(x)
}
