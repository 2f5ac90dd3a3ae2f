// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The pointing operator: `tod2map` (scatter) and `map2tod` (gather) between
//! a flat detector/sample timestream and a flat map buffer. This is the inner
//! kernel of the whole crate -- correctness and performance here dominate.

use std::sync::atomic::{AtomicUsize, Ordering};

use lazy_static::lazy_static;
use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use rayon::ThreadPool;
use thiserror::Error;

/// Errors specific to the pointing kernels.
#[derive(Error, Debug)]
pub enum PointingError {
    /// A flat pixel index fell outside `[0, npix)`.
    #[error("ipix[{det}, {samp}] = {ipix} is out of range for a map of {npix} pixels")]
    OutOfRange {
        det: usize,
        samp: usize,
        ipix: i32,
        npix: usize,
    },

    /// `T` and `ipix` did not have the same shape.
    #[error("timestream shape {t_shape:?} does not match ipix shape {ipix_shape:?}")]
    ShapeMismatch {
        t_shape: (usize, usize),
        ipix_shape: (usize, usize),
    },
}

static NTHREAD: AtomicUsize = AtomicUsize::new(0);

lazy_static! {
    /// The process-global worker pool used by the `_omp`-suffixed kernels.
    /// Rebuilt lazily the first time `get_pool` is called after `set_nthread`
    /// changes the requested count.
    static ref POOL: std::sync::Mutex<Option<(usize, std::sync::Arc<ThreadPool>)>> =
        std::sync::Mutex::new(None);
}

/// Set the process-global worker count used by `tod2map_omp`/`map2tod_omp`.
/// `0` means "let rayon pick based on available cores".
pub fn set_nthread(n: usize) {
    NTHREAD.store(n, Ordering::SeqCst);
    // Force the pool to be rebuilt on next use.
    *POOL.lock().unwrap() = None;
}

/// Query the process-global worker count. `0` means "rayon's default".
pub fn get_nthread() -> usize {
    NTHREAD.load(Ordering::SeqCst)
}

fn get_pool() -> std::sync::Arc<ThreadPool> {
    let requested = get_nthread();
    let mut guard = POOL.lock().unwrap();
    if let Some((n, pool)) = guard.as_ref() {
        if *n == requested {
            return pool.clone();
        }
    }
    let pool = std::sync::Arc::new(
        rayon::ThreadPoolBuilder::new()
            .num_threads(requested)
            .build()
            .expect("failed to build rayon thread pool"),
    );
    *guard = Some((requested, pool.clone()));
    pool
}

fn check_shapes(t_shape: (usize, usize), ipix_shape: (usize, usize)) -> Result<(), PointingError> {
    if t_shape != ipix_shape {
        return Err(PointingError::ShapeMismatch {
            t_shape,
            ipix_shape,
        });
    }
    Ok(())
}

fn check_ipix(ipix: &Array2<i32>, npix: usize) -> Result<(), PointingError> {
    for ((det, samp), &p) in ipix.indexed_iter() {
        if p < 0 || p as usize >= npix {
            return Err(PointingError::OutOfRange {
                det,
                samp,
                ipix: p,
                npix,
            });
        }
    }
    Ok(())
}

/// `map2tod(T, M, ipix, add)`: for every `(i,s)`, `T[i,s] <- (add ? T[i,s] :
/// 0) + M[ipix[i,s]]`. Pure gather; serial reference implementation.
pub fn map2tod_simple(
    t: &mut ArrayViewMut2<f64>,
    m: &[f64],
    ipix: &Array2<i32>,
    add: bool,
) -> Result<(), PointingError> {
    check_shapes(t.dim(), ipix.dim())?;
    check_ipix(ipix, m.len())?;
    for ((det, samp), out) in t.indexed_iter_mut() {
        let p = ipix[[det, samp]] as usize;
        *out = if add { *out } else { 0.0 } + m[p];
    }
    Ok(())
}

/// Parallel gather. The gather has no data race to begin with (each output
/// element is written exactly once), so the parallel variant is just the
/// serial loop split over detector rows on the worker pool; its result is
/// bit-for-bit identical to [`map2tod_simple`].
pub fn map2tod_omp(
    t: &mut ArrayViewMut2<f64>,
    m: &[f64],
    ipix: &ArrayView2<i32>,
    add: bool,
) -> Result<(), PointingError> {
    check_shapes(t.dim(), ipix.dim())?;
    check_ipix(&ipix.to_owned(), m.len())?;
    let pool = get_pool();
    pool.install(|| {
        use rayon::prelude::*;
        t.axis_iter_mut(ndarray::Axis(0))
            .into_par_iter()
            .zip(ipix.axis_iter(ndarray::Axis(0)).into_par_iter())
            .for_each(|(mut row, ipix_row)| {
                for (out, &p) in row.iter_mut().zip(ipix_row.iter()) {
                    let p = p as usize;
                    *out = if add { *out } else { 0.0 } + m[p];
                }
            });
    });
    Ok(())
}

/// `tod2map(M, T, ipix)`: for every `(i,s)`, `M[ipix[i,s]] += T[i,s]`.
/// Scatter with accumulation; serial reference implementation with
/// deterministic ordering.
pub fn tod2map_simple(
    m: &mut [f64],
    t: &ArrayView2<f64>,
    ipix: &Array2<i32>,
) -> Result<(), PointingError> {
    check_shapes(t.dim(), ipix.dim())?;
    check_ipix(ipix, m.len())?;
    for ((det, samp), &val) in t.indexed_iter() {
        let p = ipix[[det, samp]] as usize;
        m[p] += val;
    }
    Ok(())
}

/// Parallel scatter. Each worker accumulates into a private map-sized
/// buffer (one per detector-row chunk it is handed); the private buffers are
/// then summed into `m`. The result equals [`tod2map_simple`]'s output up to
/// floating-point reassociation -- the two are bitwise equal only when the
/// worker count is 1, since summation order then coincides.
pub fn tod2map_omp(
    m: &mut [f64],
    t: &ArrayView2<f64>,
    ipix: &ArrayView2<i32>,
) -> Result<(), PointingError> {
    check_shapes(t.dim(), ipix.dim())?;
    check_ipix(&ipix.to_owned(), m.len())?;
    let npix = m.len();
    let pool = get_pool();
    let partials: Vec<Vec<f64>> = pool.install(|| {
        use rayon::prelude::*;
        t.axis_iter(ndarray::Axis(0))
            .into_par_iter()
            .zip(ipix.axis_iter(ndarray::Axis(0)).into_par_iter())
            .map(|(row, ipix_row)| {
                let mut partial = vec![0.0; npix];
                for (&val, &p) in row.iter().zip(ipix_row.iter()) {
                    partial[p as usize] += val;
                }
                partial
            })
            .collect()
    });
    for partial in partials {
        for (out, val) in m.iter_mut().zip(partial.iter()) {
            *out += val;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn map2tod_gathers_values() {
        let m = vec![10.0, 20.0, 30.0];
        let ipix = array![[0, 1, 2], [2, 0, 1]];
        let mut t = Array2::<f64>::zeros((2, 3));
        map2tod_simple(&mut t.view_mut(), &m, &ipix, false).unwrap();
        assert_eq!(t, array![[10.0, 20.0, 30.0], [30.0, 10.0, 20.0]]);
    }

    #[test]
    fn map2tod_add_accumulates() {
        let m = vec![1.0, 2.0];
        let ipix = array![[0, 1]];
        let mut t = array![[5.0, 5.0]];
        map2tod_simple(&mut t.view_mut(), &m, &ipix, true).unwrap();
        assert_eq!(t, array![[6.0, 7.0]]);
    }

    #[test]
    fn tod2map_scatters_and_accumulates() {
        let mut m = vec![0.0; 3];
        let t = array![[1.0, 2.0], [3.0, 4.0]];
        let ipix = array![[0, 1], [1, 2]];
        tod2map_simple(&mut m, &t.view(), &ipix).unwrap();
        assert_eq!(m, vec![1.0, 5.0, 4.0]);
    }

    #[test]
    fn serial_and_parallel_scatter_agree_single_threaded() {
        set_nthread(1);
        let npix = 16;
        let ndet = 4;
        let nsamp = 37;
        let mut rng_state: u64 = 12345;
        let mut next = || {
            rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((rng_state >> 33) as f64) / (u32::MAX as f64)
        };
        let t = Array2::from_shape_fn((ndet, nsamp), |_| next() * 10.0 - 5.0);
        let ipix = Array2::from_shape_fn((ndet, nsamp), |_| (next() * npix as f64) as i32);

        let mut m_serial = vec![0.0; npix];
        tod2map_simple(&mut m_serial, &t.view(), &ipix).unwrap();

        let mut m_omp = vec![0.0; npix];
        tod2map_omp(&mut m_omp, &t.view(), &ipix.view()).unwrap();

        assert_eq!(m_serial, m_omp);
    }

    #[test]
    fn serial_and_parallel_scatter_agree_multi_threaded() {
        set_nthread(4);
        let npix = 64;
        let ndet = 17;
        let nsamp = 101;
        let mut rng_state: u64 = 98765;
        let mut next = || {
            rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((rng_state >> 33) as f64) / (u32::MAX as f64)
        };
        let t = Array2::from_shape_fn((ndet, nsamp), |_| next() * 2.0 - 1.0);
        let ipix = Array2::from_shape_fn((ndet, nsamp), |_| (next() * npix as f64) as i32);

        let mut m_serial = vec![0.0; npix];
        tod2map_simple(&mut m_serial, &t.view(), &ipix).unwrap();

        let mut m_omp = vec![0.0; npix];
        tod2map_omp(&mut m_omp, &t.view(), &ipix.view()).unwrap();

        for (a, b) in m_serial.iter().zip(m_omp.iter()) {
            assert!((a - b).abs() <= 1e-9 * a.abs().max(1.0));
        }
        set_nthread(0);
    }

    #[test]
    fn out_of_range_ipix_is_an_error() {
        let mut m = vec![0.0; 2];
        let t = array![[1.0]];
        let ipix = array![[5]];
        assert!(tod2map_simple(&mut m, &t.view(), &ipix).is_err());
    }
}
