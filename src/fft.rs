// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A uniform real-to-real transform (DCT-I convention), applied per row of a
//! 2-D batch. Its own inverse up to the factor `2*(n-1)`.
//!
//! Built on top of `rustfft`'s complex FFT via the standard even-symmetric
//! extension: mirroring a length-`n` row to length `2*(n-1)` and taking the
//! real part of its complex FFT reproduces DCT-I exactly, so no bespoke
//! transform kernel needs to be maintained here.

use std::sync::Arc;

use ndarray::{Array2, ArrayView2};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

/// The factor by which applying [`fft_r2r_vec`] twice scales the original
/// row, for a row of length `n`.
pub fn round_trip_scale(n: usize) -> f64 {
    if n <= 1 {
        1.0
    } else {
        2.0 * (n - 1) as f64
    }
}

fn planner_for(n: usize) -> Arc<dyn Fft<f64>> {
    // `n == 1` never reaches the mirrored-extension path (handled specially
    // in `fft_r2r_vec`), so the smallest extension length planned here is 2.
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(2 * (n - 1))
}

/// DCT-I of a single row. `n == 1` is the degenerate case where the
/// transform is its own identity (there is nothing to mirror).
pub fn fft_r2r_vec(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n <= 1 {
        return x.to_vec();
    }
    let m = 2 * (n - 1);
    let mut buf: Vec<Complex64> = Vec::with_capacity(m);
    for &v in x {
        buf.push(Complex64::new(v, 0.0));
    }
    for j in (1..n - 1).rev() {
        buf.push(Complex64::new(x[j], 0.0));
    }
    debug_assert_eq!(buf.len(), m);

    let fft = planner_for(n);
    fft.process(&mut buf);

    buf[..n].iter().map(|c| c.re).collect()
}

/// Apply [`fft_r2r_vec`] to every row of a 2-D batch.
pub fn fft_r2r(batch: &ArrayView2<f64>) -> Array2<f64> {
    let (nrow, ncol) = batch.dim();
    let mut out = Array2::<f64>::zeros((nrow, ncol));
    for (row_in, mut row_out) in batch.rows().into_iter().zip(out.rows_mut()) {
        let row_vec: Vec<f64> = row_in.iter().copied().collect();
        let transformed = fft_r2r_vec(&row_vec);
        for (o, v) in row_out.iter_mut().zip(transformed.into_iter()) {
            *o = v;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn round_trip_scalar_vec() {
        let n = 1024;
        let mut state: u64 = 42;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 33) as f64) / (u32::MAX as f64) * 2.0 - 1.0
        };
        let v: Vec<f64> = (0..n).map(|_| next()).collect();
        let once = fft_r2r_vec(&v);
        let twice = fft_r2r_vec(&once);
        let scale = round_trip_scale(n);
        for (orig, back) in v.iter().zip(twice.iter()) {
            let expect = orig * scale;
            assert!(
                (expect - back).abs() <= 1e-6 * expect.abs().max(1.0),
                "{expect} vs {back}"
            );
        }
    }

    #[test]
    fn degenerate_single_sample_is_identity() {
        let v = vec![3.0];
        assert_eq!(fft_r2r_vec(&v), v);
        assert_eq!(round_trip_scale(1), 1.0);
    }

    #[test]
    fn batched_matches_per_row() {
        let batch = array![[1.0, 2.0, 3.0, 4.0], [5.0, -1.0, 0.5, 2.0]];
        let out = fft_r2r(&batch.view());
        for (row, expect_row) in batch.rows().into_iter().zip(out.rows()) {
            let expect = fft_r2r_vec(row.as_slice().unwrap());
            assert_eq!(expect_row.to_vec(), expect);
        }
    }
}
