// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The per-TOD noise operator: an SVD-based detector rotation plus a
//! per-mode, per-frequency diagonal weight, applied via the r2r FFT shim.
//! Mode-diagonalizing the detector covariance and then weighting each mode's
//! frequency spectrum cheaply approximates a stationary-in-time,
//! mode-separable noise covariance.

use nalgebra::DMatrix;
use ndarray::{Array2, ArrayView2};
use thiserror::Error;

use crate::{fft::fft_r2r, math::smooth_many_vecs};

/// Errors from building or applying the noise operator.
#[derive(Error, Debug)]
pub enum NoiseError {
    /// The SVD of `dat_calib` failed to converge.
    #[error("SVD of detector data failed to converge ({ndet} x {nsamp})")]
    SvdFailed { ndet: usize, nsamp: usize },

    /// The input contained a NaN or infinite value.
    #[error("non-finite value encountered while building the noise model")]
    NonFinite,

    /// `mywt` was narrower than the number of frequencies the transform
    /// produces -- i.e. the `nfreq = nsamp/2 + 1` convention (§9) was
    /// violated.
    #[error("noise weight has {got} columns, need at least {need} (nfreq = nsamp/2 + 1)")]
    WeightTooNarrow { got: usize, need: usize },
}

/// `nfreq = nsamp/2 + 1`, the one true convention this crate uses for how
/// wide `mywt` must be (§9 Open Question, resolved).
pub fn nfreq_for_nsamp(nsamp: usize) -> usize {
    nsamp / 2 + 1
}

/// The rotation (`v`) and per-mode frequency weight (`mywt`) built once per
/// TOD by [`set_noise_smoothed_svd`].
#[derive(Debug, Clone)]
pub struct NoiseModel {
    /// `ndet x ndet` orthogonal rotation (`U^T` from the SVD of
    /// `dat_calib`).
    pub v: Array2<f64>,
    /// `ndet x nfreq` (or wider) positive weights; only the first `nfreq`
    /// columns are used when applying the operator.
    pub mywt: Array2<f64>,
}

/// Build a [`NoiseModel`] from raw detector data by mode-diagonalizing SVD
/// plus Gaussian-smoothed per-mode power spectra.
pub fn set_noise_smoothed_svd(
    dat_calib: &ArrayView2<f64>,
    fwhm: f64,
) -> Result<NoiseModel, NoiseError> {
    let (ndet, nsamp) = dat_calib.dim();
    if dat_calib.iter().any(|v| !v.is_finite()) {
        return Err(NoiseError::NonFinite);
    }

    let mat = DMatrix::from_fn(ndet, nsamp, |i, j| dat_calib[[i, j]]);
    let svd = nalgebra::linalg::SVD::new(mat, true, false);
    let u = svd.u.ok_or(NoiseError::SvdFailed { ndet, nsamp })?;

    let mut v = Array2::<f64>::zeros((ndet, ndet));
    for i in 0..ndet {
        for j in 0..ndet {
            // `v <- U^T`.
            v[[i, j]] = u[(j, i)];
        }
    }

    let dat_rot = v.dot(dat_calib);
    let dat_trans = fft_r2r(&dat_rot.view());
    let power: Array2<f64> = dat_trans.mapv(|x| x * x);
    let spec_smooth = smooth_many_vecs(&power.view(), fwhm);
    if spec_smooth.iter().any(|&p| p <= 0.0 || !p.is_finite()) {
        return Err(NoiseError::NonFinite);
    }
    let mywt = spec_smooth.mapv(|p| 1.0 / p);

    Ok(NoiseModel { v, mywt })
}

/// Apply `N^-1` to a `[ndet, nsamp]` timestream block: rotate into the
/// SVD-diagonal basis, weight each mode's spectrum, transform back, and
/// un-rotate.
pub fn apply_noise(model: &NoiseModel, dat: &ArrayView2<f64>) -> Result<Array2<f64>, NoiseError> {
    let (ndet, nsamp) = dat.dim();
    if model.v.nrows() != ndet || model.v.ncols() != ndet {
        return Err(NoiseError::NonFinite);
    }
    let nfreq = nfreq_for_nsamp(nsamp);
    if model.mywt.ncols() < nfreq {
        return Err(NoiseError::WeightTooNarrow {
            got: model.mywt.ncols(),
            need: nfreq,
        });
    }

    let dat_rot = model.v.dot(dat);
    let mut dat_ft = fft_r2r(&dat_rot.view());
    // Weight each detector row by its own spectrum, truncated/aligned to the
    // transform's output width.
    for (mut row, wrow) in dat_ft.rows_mut().into_iter().zip(model.mywt.rows()) {
        for (col, w) in row.iter_mut().zip(wrow.iter()) {
            *col *= w;
        }
    }
    let back = fft_r2r(&dat_ft.view());
    let result = model.v.t().dot(&back);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn identity_noise_is_symmetric_and_positive() {
        let model = NoiseModel {
            v: Array2::eye(2),
            mywt: Array2::from_elem((2, 2), 1.0),
        };
        let x = array![[1.0, 2.0], [3.0, -1.0]];
        let y = array![[0.5, -0.5], [2.0, 1.0]];

        let ninv_y = apply_noise(&model, &y.view()).unwrap();
        let ninv_x = apply_noise(&model, &x.view()).unwrap();

        let lhs: f64 = x.iter().zip(ninv_y.iter()).map(|(a, b)| a * b).sum();
        let rhs: f64 = ninv_x.iter().zip(y.iter()).map(|(a, b)| a * b).sum();
        assert!((lhs - rhs).abs() <= 1e-9 * lhs.abs().max(1.0));

        let quad: f64 = x.iter().zip(ninv_x.iter()).map(|(a, b)| a * b).sum();
        assert!(quad > 0.0);
    }

    #[test]
    fn svd_noise_model_is_symmetric() {
        let dat = array![[1.0, 2.0, 3.0, 4.0], [2.0, 1.0, 0.0, -1.0], [5.0, 4.0, 3.0, 2.0]];
        let model = set_noise_smoothed_svd(&dat.view(), 2.0).unwrap();

        let x = array![[1.0, -1.0, 2.0, 0.5], [0.1, 0.2, -0.3, 0.4], [1.0, 1.0, 1.0, 1.0]];
        let y = array![[0.0, 1.0, 0.0, -1.0], [2.0, -2.0, 1.0, 1.0], [0.5, 0.5, -0.5, -0.5]];

        let ninv_y = apply_noise(&model, &y.view()).unwrap();
        let ninv_x = apply_noise(&model, &x.view()).unwrap();

        let lhs: f64 = x.iter().zip(ninv_y.iter()).map(|(a, b)| a * b).sum();
        let rhs: f64 = ninv_x.iter().zip(y.iter()).map(|(a, b)| a * b).sum();
        assert!((lhs - rhs).abs() <= 1e-6 * lhs.abs().max(1.0));
    }

    #[test]
    fn weight_too_narrow_is_an_error() {
        let model = NoiseModel {
            v: Array2::eye(1),
            mywt: Array2::from_elem((1, 1), 1.0),
        };
        let x = array![[1.0, 2.0, 3.0, 4.0]];
        assert!(apply_noise(&model, &x.view()).is_err());
    }
}
