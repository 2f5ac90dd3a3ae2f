// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! FITS TOD ingest: HDU 1 is a binary table with columns `PIXID, DX, DY,
//! TIME, FNU`, reshaped into the `[ndet, nsamp]` arrays `Tod` expects.

use std::{collections::HashSet, path::Path};

use fitsio::FitsFile;
use ndarray::Array2;

use super::IngestError;

/// The raw column data a FITS TOD ingest yields, reshaped to `[ndet,
/// nsamp]` and ready for [`crate::tod::Tod::from_fits_arrays`]-style
/// construction.
pub struct FitsTodArrays {
    pub ndet: usize,
    pub nsamp: usize,
    pub dx: Array2<f64>,
    pub dy: Array2<f64>,
    pub dat_calib: Array2<f64>,
    /// Median of the first row's consecutive `TIME` differences.
    pub dt: f64,
}

fn median(mut v: Vec<f64>) -> f64 {
    v.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = v.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        v[n / 2]
    } else {
        0.5 * (v[n / 2 - 1] + v[n / 2])
    }
}

fn reshape(flat: Vec<f64>, ndet: usize, nsamp: usize) -> Result<Array2<f64>, IngestError> {
    Array2::from_shape_vec((ndet, nsamp), flat)
        .map_err(|_| IngestError::RowCountMismatch { nrows: ndet * nsamp, ndet })
}

/// Read a FITS TOD file into flat, contiguous `[ndet, nsamp]` arrays.
pub fn read_fits_tod(path: &Path) -> Result<FitsTodArrays, IngestError> {
    let path_str = path.to_string_lossy().to_string();
    let mut fptr = FitsFile::open(&path_str).map_err(|e| IngestError::Fits(e.to_string()))?;
    let hdu = fptr.hdu(1).map_err(|e| IngestError::Fits(e.to_string()))?;

    let pixid: Vec<i64> = hdu
        .read_col(&mut fptr, "PIXID")
        .map_err(|_| IngestError::MissingFitsColumn("PIXID".to_string()))?;
    let dx_flat: Vec<f64> = hdu
        .read_col(&mut fptr, "DX")
        .map_err(|_| IngestError::MissingFitsColumn("DX".to_string()))?;
    let dy_flat: Vec<f64> = hdu
        .read_col(&mut fptr, "DY")
        .map_err(|_| IngestError::MissingFitsColumn("DY".to_string()))?;
    let time_flat: Vec<f64> = hdu
        .read_col(&mut fptr, "TIME")
        .map_err(|_| IngestError::MissingFitsColumn("TIME".to_string()))?;
    let fnu_flat: Vec<f64> = hdu
        .read_col(&mut fptr, "FNU")
        .map_err(|_| IngestError::MissingFitsColumn("FNU".to_string()))?;

    let nrows = pixid.len();
    let ndet = pixid.iter().collect::<HashSet<_>>().len().max(1);
    if nrows % ndet != 0 {
        return Err(IngestError::RowCountMismatch { nrows, ndet });
    }
    let nsamp = nrows / ndet;

    let dx = reshape(dx_flat, ndet, nsamp)?;
    let dy = reshape(dy_flat, ndet, nsamp)?;
    let dat_calib = reshape(fnu_flat, ndet, nsamp)?;
    let time = reshape(time_flat, ndet, nsamp)?;

    let row0: Vec<f64> = time.row(0).to_vec();
    let diffs: Vec<f64> = row0.windows(2).map(|w| w[1] - w[0]).collect();
    let dt = median(diffs);

    Ok(FitsTodArrays {
        ndet,
        nsamp,
        dx,
        dy,
        dat_calib,
        dt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_empty_is_zero() {
        assert_eq!(median(vec![]), 0.0);
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(vec![1.0, 2.0, 3.0, 4.0]), 2.5);
    }

    #[test]
    fn reshape_rejects_mismatched_row_count() {
        let flat = vec![1.0, 2.0, 3.0];
        assert!(reshape(flat, 2, 2).is_err());
    }
}
