// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The simpler equirectangular map variant: a fixed `cos(dec)` scaling on the
//! RA axis rather than `SkyMap`'s FFT-padded CAR grid. Kept because the data
//! model names it explicitly, not because it is preferred.

use fitsio::{
    images::{ImageDescription, ImageType},
    FitsFile,
};
use ndarray::Array2;

use crate::{io::IngestError, tod::Tod};

use super::SkyMapLike;

/// An equirectangular map: `x = dx * cos(dec0)`, `y = dy`, with a single
/// fixed `cos(dec0)` scale rather than a per-row correction.
#[derive(Debug, Clone)]
pub struct SkyMapCar {
    nx: usize,
    ny: usize,
    xmin: f64,
    ymin: f64,
    pix_size: f64,
    /// `cos(dec0)`, fixed at construction; the RA axis is compressed by this
    /// factor before binning.
    cos_dec0: f64,
    data: Vec<f64>,
}

impl SkyMapCar {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64, pix_size: f64, dec0: f64) -> SkyMapCar {
        let cos_dec0 = dec0.cos();
        let nx = (((xmax - xmin) * cos_dec0) / pix_size).ceil().max(1.0) as usize;
        let ny = ((ymax - ymin) / pix_size).ceil().max(1.0) as usize;
        SkyMapCar {
            nx,
            ny,
            xmin,
            ymin,
            pix_size,
            cos_dec0,
            data: vec![0.0; nx * ny],
        }
    }

    fn flat_index(&self, xpix: i64, ypix: i64) -> Option<usize> {
        if xpix < 0 || ypix < 0 || xpix as usize >= self.nx || ypix as usize >= self.ny {
            return None;
        }
        Some(xpix as usize * self.ny + ypix as usize)
    }
}

impl SkyMapLike for SkyMapCar {
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
            let xpix = ((((tod.dx[[i, s]] - self.xmin) * self.cos_dec0) / self.pix_size)
                .round_ties_even()) as i64;
            let ypix = (((tod.dy[[i, s]] - self.ymin) / self.pix_size).round_ties_even()) as i64;
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
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ra_axis_is_compressed_by_cos_dec() {
        let dec0 = std::f64::consts::FRAC_PI_4;
        let map = SkyMapCar::new(0.0, 1.0, 0.0, 1.0, 0.1, dec0);
        let (nx, _ny) = map.shape();
        let uncompressed = (1.0 / 0.1).ceil() as usize;
        assert!(nx < uncompressed);
    }

    #[test]
    fn clear_and_box_clone_are_independent() {
        let mut a = SkyMapCar::new(0.0, 0.1, 0.0, 0.1, 0.01, 0.0);
        a.as_slice_mut().iter_mut().for_each(|v| *v = 1.0);
        let b = a.box_clone();
        a.clear();
        assert!(a.as_slice().iter().all(|&v| v == 0.0));
        assert!(b.as_slice().iter().all(|&v| v == 1.0));
    }
}
