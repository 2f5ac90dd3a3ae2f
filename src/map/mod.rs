// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The map container abstraction: a pixel grid plus the vector algebra PCG
//! needs (axpy, dot, clear, copy, mul), expressed as a trait so the PCG
//! driver (§4.G) is written once against `SkyMapLike` rather than a concrete
//! type.

mod mapset;
mod precon;
mod skymap;
mod skymap_car;

pub use mapset::Mapset;
pub use precon::Precon;
pub use skymap::SkyMap;
pub use skymap_car::SkyMapCar;

use ndarray::Array2;
use thiserror::Error;

use crate::{comm::Communicator, pointing::PointingError, tod::Tod};

/// Mapset/map shapes did not match across operands of `axpy`, `dot`, `mul`.
#[derive(Error, Debug)]
pub enum ConformabilityError {
    #[error("map shapes differ: {a:?} vs {b:?}")]
    ShapeMismatch { a: (usize, usize), b: (usize, usize) },

    #[error("mapset lengths differ: {a} vs {b}")]
    LengthMismatch { a: usize, b: usize },
}

/// The uniform contract every map-like PCG vector component exposes.
pub trait SkyMapLike: Send + Sync {
    /// Shape `(nx, ny)` of the pixel grid.
    fn shape(&self) -> (usize, usize);

    /// Flat, row-major view of the pixel buffer.
    fn as_slice(&self) -> &[f64];

    /// Mutable flat, row-major view of the pixel buffer.
    fn as_slice_mut(&mut self) -> &mut [f64];

    /// An independent copy; later mutation of one does not affect the other.
    fn box_clone(&self) -> Box<dyn SkyMapLike>;

    /// Zero every pixel.
    fn clear(&mut self) {
        self.as_slice_mut().iter_mut().for_each(|p| *p = 0.0);
    }

    /// Copy a conformable dense array in.
    fn assign(&mut self, arr: &Array2<f64>) -> Result<(), ConformabilityError> {
        if arr.dim() != self.shape() {
            return Err(ConformabilityError::ShapeMismatch {
                a: self.shape(),
                b: arr.dim(),
            });
        }
        self.as_slice_mut()
            .iter_mut()
            .zip(arr.iter())
            .for_each(|(o, v)| *o = *v);
        Ok(())
    }

    /// `self += a * other` elementwise.
    fn axpy(&mut self, other: &dyn SkyMapLike, a: f64) -> Result<(), ConformabilityError> {
        if self.shape() != other.shape() {
            return Err(ConformabilityError::ShapeMismatch {
                a: self.shape(),
                b: other.shape(),
            });
        }
        self.as_slice_mut()
            .iter_mut()
            .zip(other.as_slice().iter())
            .for_each(|(o, v)| *o += a * v);
        Ok(())
    }

    /// Sum of elementwise products; cross-rank reduction is the caller's
    /// responsibility.
    fn dot(&self, other: &dyn SkyMapLike) -> Result<f64, ConformabilityError> {
        if self.shape() != other.shape() {
            return Err(ConformabilityError::ShapeMismatch {
                a: self.shape(),
                b: other.shape(),
            });
        }
        Ok(self
            .as_slice()
            .iter()
            .zip(other.as_slice().iter())
            .map(|(a, b)| a * b)
            .sum())
    }

    /// Elementwise product into a new map; used for diagonal
    /// preconditioners.
    fn mul(&self, other: &dyn SkyMapLike) -> Result<Box<dyn SkyMapLike>, ConformabilityError> {
        if self.shape() != other.shape() {
            return Err(ConformabilityError::ShapeMismatch {
                a: self.shape(),
                b: other.shape(),
            });
        }
        let mut out = self.box_clone();
        out.as_slice_mut()
            .iter_mut()
            .zip(other.as_slice().iter())
            .for_each(|(o, v)| *o *= v);
        Ok(out)
    }

    /// From `(dx, dy)` radians, produce int32 `ipix`.
    fn get_pix(&self, tod: &Tod) -> Array2<i32>;

    /// Dispatch to `tod2map` (§4.A); clears first if `add` is false.
    fn tod2map(&mut self, tod: &Tod, t: &Array2<f64>, add: bool) -> Result<(), PointingError> {
        if !add {
            self.clear();
        }
        let shape = self.shape();
        crate::pointing::tod2map_omp(self.as_slice_mut(), &t.view(), &tod.ipix.view())?;
        debug_assert_eq!(self.shape(), shape);
        Ok(())
    }

    /// Dispatch to `map2tod` (§4.A).
    fn map2tod(&self, tod: &Tod, t: &mut Array2<f64>, add: bool) -> Result<(), PointingError> {
        crate::pointing::map2tod_omp(&mut t.view_mut(), self.as_slice(), &tod.ipix.view(), add)
    }

    /// Elementwise sum-reduce across the world communicator, in place.
    fn mpi_reduce(&mut self, comm: &dyn Communicator) {
        comm.allreduce_sum_f64(self.as_slice_mut());
    }

    /// Persist to a FITS image HDU with an embedded CAR WCS header.
    fn write(&self, path: &std::path::Path) -> Result<(), crate::io::IngestError>;
}
