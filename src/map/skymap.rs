// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The CAR-projected map: a rectangular grid of pixels whose size is padded
//! up to the nearest 7-smooth (by default) length so the noise FFT never
//! meets an unfriendly transform size.

use fitsio::{images::{ImageDescription, ImageType}, FitsFile};
use ndarray::Array2;

use crate::{config::RunConfig, io::IngestError, math::find_good_fft_lens, tod::Tod};

use super::SkyMapLike;

/// A CAR-projected (plate carrée) sky map with FFT-friendly padding.
#[derive(Debug, Clone)]
pub struct SkyMap {
    nx: usize,
    ny: usize,
    /// World-coordinate reference pixel (1-based, FITS convention) and value,
    /// in radians; `crval_x`/`crval_y` is the sky position at
    /// `(crpix_x, crpix_y)`.
    crval_x: f64,
    crval_y: f64,
    crpix_x: f64,
    crpix_y: f64,
    /// Pixel size in radians along each axis.
    cdelt_x: f64,
    cdelt_y: f64,
    data: Vec<f64>,
}

impl SkyMap {
    /// Build a map covering `(xmin, xmax) x (ymin, ymax)` (radians) at the
    /// given pixel size, with `nx`/`ny` padded up to the nearest length whose
    /// prime factors lie in `good_primes`.
    pub fn new(
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
        pix_size: f64,
        good_primes: &[u64],
    ) -> SkyMap {
        let raw_nx = ((xmax - xmin) / pix_size).ceil().max(1.0) as u64;
        let raw_ny = ((ymax - ymin) / pix_size).ceil().max(1.0) as u64;
        let nx = pad_up(raw_nx, good_primes) as usize;
        let ny = pad_up(raw_ny, good_primes) as usize;
        SkyMap {
            nx,
            ny,
            crval_x: xmin,
            crval_y: ymin,
            crpix_x: 1.0,
            crpix_y: 1.0,
            cdelt_x: pix_size,
            cdelt_y: pix_size,
            data: vec![0.0; nx * ny],
        }
    }

    /// Build a map the same way as [`SkyMap::new`], but take the padding
    /// margin and the good-FFT-length prime set from a [`RunConfig`] rather
    /// than from the caller directly: `config.map_pad` extra pixels are added
    /// on the upper edge of each axis before rounding up to a length whose
    /// prime factors lie in `config.good_fft_primes`.
    pub fn from_config(
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
        pix_size: f64,
        config: &RunConfig,
    ) -> SkyMap {
        let pad_margin = config.map_pad as f64 * pix_size;
        SkyMap::new(
            xmin,
            xmax + pad_margin,
            ymin,
            ymax + pad_margin,
            pix_size,
            &config.good_fft_primes,
        )
    }

    /// Flat pixel index of `(xpix, ypix)`, 0-based, row-major with `y` as the
    /// fast axis: `ipix = xpix * ny + ypix`.
    fn flat_index(&self, xpix: i64, ypix: i64) -> Option<usize> {
        if xpix < 0 || ypix < 0 || xpix as usize >= self.nx || ypix as usize >= self.ny {
            return None;
        }
        Some(xpix as usize * self.ny + ypix as usize)
    }
}

/// Smallest member of `find_good_fft_lens` that is `>= n`. Falls back to `n`
/// itself if the search needs to be extended (the caller's `n` is the floor,
/// not a hard cap).
fn pad_up(n: u64, primes: &[u64]) -> u64 {
    let mut ceiling = n.max(1);
    loop {
        let lens = find_good_fft_lens(ceiling, primes);
        if let Some(&best) = lens.iter().find(|&&l| l >= n) {
            return best;
        }
        ceiling = ceiling.saturating_mul(2);
    }
}

impl SkyMapLike for SkyMap {
    fn shape(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    fn as_slice(&self) -> &[f64] {
        &self.data
    }

    fn as_slice_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    fn box_clone(&self) -> Box<dyn SkyMapLike> {
        Box::new(self.clone())
    }

    fn get_pix(&self, tod: &Tod) -> Array2<i32> {
        let (ndet, nsamp) = tod.dx.dim();
        Array2::from_shape_fn((ndet, nsamp), |(i, s)| {
            let dx_deg = tod.dx[[i, s]].to_degrees();
            let dy_deg = tod.dy[[i, s]].to_degrees();
            let xpix = (((dx_deg - self.crval_x.to_degrees()) / self.cdelt_x.to_degrees()
                + self.crpix_x)
                .round_ties_even()) as i64
                - 1;
            let ypix = (((dy_deg - self.crval_y.to_degrees()) / self.cdelt_y.to_degrees()
                + self.crpix_y)
                .round_ties_even()) as i64
                - 1;
            match self.flat_index(xpix, ypix) {
                Some(p) => p as i32,
                None => -1,
            }
        })
    }

    fn write(&self, path: &std::path::Path) -> Result<(), IngestError> {
        let description = ImageDescription {
            data_type: ImageType::Double,
            dimensions: &[self.nx, self.ny],
        };
        let path_str = path.to_string_lossy().to_string();
        let mut fptr = FitsFile::create(&path_str)
            .open()
            .map_err(|e| IngestError::Fits(e.to_string()))?;
        let hdu = fptr
            .create_image("MAP".to_string(), &description)
            .map_err(|e| IngestError::Fits(e.to_string()))?;
        hdu.write_image(&mut fptr, &self.data)
            .map_err(|e| IngestError::Fits(e.to_string()))?;
        hdu.write_key(&mut fptr, "CTYPE1", "RA---CAR")
            .map_err(|e| IngestError::Fits(e.to_string()))?;
        hdu.write_key(&mut fptr, "CTYPE2", "DEC--CAR")
            .map_err(|e| IngestError::Fits(e.to_string()))?;
        hdu.write_key(&mut fptr, "CRVAL1", self.crval_x.to_degrees())
            .map_err(|e| IngestError::Fits(e.to_string()))?;
        hdu.write_key(&mut fptr, "CRVAL2", self.crval_y.to_degrees())
            .map_err(|e| IngestError::Fits(e.to_string()))?;
        hdu.write_key(&mut fptr, "CRPIX1", self.crpix_x)
            .map_err(|e| IngestError::Fits(e.to_string()))?;
        hdu.write_key(&mut fptr, "CRPIX2", self.crpix_y)
            .map_err(|e| IngestError::Fits(e.to_string()))?;
        hdu.write_key(&mut fptr, "CDELT1", self.cdelt_x.to_degrees())
            .map_err(|e| IngestError::Fits(e.to_string()))?;
        hdu.write_key(&mut fptr, "CDELT2", self.cdelt_y.to_degrees())
            .map_err(|e| IngestError::Fits(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_is_padded_to_a_good_length() {
        let map = SkyMap::new(0.0, 0.01, 0.0, 0.01, 0.001, &[2, 3, 5, 7]);
        let (nx, ny) = map.shape();
        assert!(nx >= 10);
        assert!(ny >= 10);
        let lens = find_good_fft_lens(nx as u64, &[2, 3, 5, 7]);
        assert!(lens.contains(&(nx as u64)));
    }

    #[test]
    fn from_config_applies_map_pad_and_good_fft_primes() {
        let config = crate::config::RunConfig {
            map_pad: 5,
            good_fft_primes: vec![2],
            ..crate::config::RunConfig::default()
        };
        let padded = SkyMap::from_config(0.0, 0.01, 0.0, 0.01, 0.001, &config);
        let unpadded = SkyMap::new(0.0, 0.01, 0.0, 0.01, 0.001, &[2]);
        let (px, _) = padded.shape();
        let (ux, _) = unpadded.shape();
        assert!(px > ux);
        let lens = find_good_fft_lens(px as u64, &[2]);
        assert!(lens.contains(&(px as u64)));
    }

    #[test]
    fn clear_zeros_every_pixel() {
        let mut map = SkyMap::new(0.0, 0.01, 0.0, 0.01, 0.005, &[2, 3, 5, 7]);
        map.as_slice_mut().iter_mut().for_each(|p| *p = 1.0);
        map.clear();
        assert!(map.as_slice().iter().all(|&p| p == 0.0));
    }

    #[test]
    fn axpy_and_dot_agree_with_direct_computation() {
        let mut a = SkyMap::new(0.0, 0.01, 0.0, 0.01, 0.005, &[2, 3, 5, 7]);
        let mut b = a.clone();
        for (i, v) in a.as_slice_mut().iter_mut().enumerate() {
            *v = i as f64;
        }
        for (i, v) in b.as_slice_mut().iter_mut().enumerate() {
            *v = 2.0 * i as f64;
        }
        let dot: f64 = SkyMapLike::dot(&a, &b).unwrap();
        let expect: f64 = a
            .as_slice()
            .iter()
            .zip(b.as_slice().iter())
            .map(|(x, y)| x * y)
            .sum();
        assert_eq!(dot, expect);

        a.axpy(&b, -1.0).unwrap();
        for (i, v) in a.as_slice().iter().enumerate() {
            assert_eq!(*v, (i as f64) - 2.0 * (i as f64));
        }
    }
}
