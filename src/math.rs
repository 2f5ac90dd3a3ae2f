// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpers shared by the map padding policy and the noise operator: "good"
//! (7-smooth by default) FFT lengths, and Gaussian spectral smoothing in the
//! r2r-FFT domain.

use ndarray::{Array2, ArrayView2};

use crate::fft::{fft_r2r, fft_r2r_vec, round_trip_scale};

/// All integers `<= n` whose prime factorization uses only primes in
/// `primes`, sorted ascending. Generated by repeatedly multiplying the
/// smallest candidates by each prime (the "Hamming numbers" construction),
/// which is a more direct route to the same set than the source's
/// log-volume search.
pub fn find_good_fft_lens(n: u64, primes: &[u64]) -> Vec<u64> {
    if n == 0 {
        return Vec::new();
    }
    let mut results = vec![1u64];
    let mut frontier = vec![1u64];
    while let Some(&smallest) = frontier.iter().min() {
        let _ = smallest;
        let mut next_frontier = Vec::new();
        for &v in &frontier {
            for &p in primes {
                match v.checked_mul(p) {
                    Some(candidate) if candidate <= n => next_frontier.push(candidate),
                    _ => {}
                }
            }
        }
        next_frontier.sort_unstable();
        next_frontier.dedup();
        if next_frontier.is_empty() {
            break;
        }
        results.extend(next_frontier.iter().copied());
        frontier = next_frontier;
    }
    results.sort_unstable();
    results.dedup();
    results
}

/// Gaussian kernel used by [`smooth_vec`]/[`smooth_many_vecs`], normalized
/// under the r2r convention so that applying its forward transform preserves
/// the zero-frequency amplitude of whatever it convolves with.
fn gaussian_kernel_ft(n: usize, fwhm: f64) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    let sigma = fwhm / (8.0_f64 * std::f64::consts::LN_2).sqrt();
    let mut kernel: Vec<f64> = (0..n)
        .map(|i| (-0.5 * (i as f64 / sigma).powi(2)).exp())
        .collect();
    // r2r normalization: endpoints count once, interior samples count twice,
    // matching the DCT-I convention's implicit mirroring.
    let total = kernel[0] + kernel[n - 1] + 2.0 * kernel[1..n - 1].iter().sum::<f64>();
    for k in kernel.iter_mut() {
        *k /= total;
    }
    fft_r2r_vec(&kernel)
}

/// Smooth a single real vector with a Gaussian of the given FWHM (in
/// samples), in the r2r-FFT domain.
pub fn smooth_vec(vec: &[f64], fwhm: f64) -> Vec<f64> {
    let n = vec.len();
    let kernel_ft = gaussian_kernel_ft(n, fwhm);
    let vec_ft = fft_r2r_vec(vec);
    let product: Vec<f64> = vec_ft
        .iter()
        .zip(kernel_ft.iter())
        .map(|(a, b)| a * b)
        .collect();
    let back = fft_r2r_vec(&product);
    let scale = round_trip_scale(n);
    back.into_iter().map(|v| v / scale).collect()
}

/// Smooth every row of a 2-D batch with a shared Gaussian of the given FWHM.
pub fn smooth_many_vecs(vecs: &ArrayView2<f64>, fwhm: f64) -> Array2<f64> {
    let (nrow, ncol) = vecs.dim();
    let kernel_ft = gaussian_kernel_ft(ncol, fwhm);
    let vecs_ft = fft_r2r(vecs);
    let mut weighted = vecs_ft;
    for mut row in weighted.rows_mut() {
        for (v, k) in row.iter_mut().zip(kernel_ft.iter()) {
            *v *= k;
        }
    }
    let back = fft_r2r(&weighted.view());
    let scale = round_trip_scale(ncol);
    let mut out = Array2::<f64>::zeros((nrow, ncol));
    for (o, b) in out.iter_mut().zip(back.iter()) {
        *o = b / scale;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_smooth(mut n: u64, primes: &[u64]) -> bool {
        if n == 0 {
            return false;
        }
        for &p in primes {
            while n % p == 0 {
                n /= p;
            }
        }
        n == 1
    }

    #[test]
    fn good_lens_are_monotone_and_smooth() {
        let lens = find_good_fft_lens(1000, &[2, 3, 5, 7]);
        assert!(lens.windows(2).all(|w| w[0] < w[1]));
        for &l in &lens {
            assert!(l <= 1000);
            assert!(is_smooth(l, &[2, 3, 5, 7]));
        }
    }

    #[test]
    fn good_lens_exemplar() {
        let lens = find_good_fft_lens(1000, &[2, 3, 5, 7]);
        for want in [1000, 960, 945, 900, 896] {
            assert!(lens.contains(&want), "missing {want}");
        }
    }

    #[test]
    fn no_gaps_of_smooth_numbers_are_skipped() {
        let primes = [2, 3, 5, 7];
        let lens = find_good_fft_lens(200, &primes);
        for pair in lens.windows(2) {
            for candidate in (pair[0] + 1)..pair[1] {
                assert!(!is_smooth(candidate, &primes), "{candidate} should have been found");
            }
        }
    }

    #[test]
    fn smoothing_preserves_mean() {
        let v = vec![1.0, 2.0, 3.0, 4.0, 5.0, 4.0, 3.0, 2.0];
        let smoothed = smooth_vec(&v, 2.0);
        let mean_before: f64 = v.iter().sum::<f64>() / v.len() as f64;
        let mean_after: f64 = smoothed.iter().sum::<f64>() / smoothed.len() as f64;
        assert!((mean_before - mean_after).abs() < 1e-6);
    }
}
