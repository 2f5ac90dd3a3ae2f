// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A TOD owns one observation's per-sample arrays and applies
//! `A = PᵀN⁻¹P` to a Mapset; a TodVec is the ordered collection of TODs this
//! rank owns.

mod cuts;

pub use cuts::{Cuts, CutsVec};

use std::{collections::HashMap, time::{Duration, Instant}};

use ndarray::{Array2, ArrayView2};

use crate::{
    comm::Communicator,
    config::RunConfig,
    error::MapMakerError,
    map::Mapset,
    noise::{apply_noise, nfreq_for_nsamp, set_noise_smoothed_svd, NoiseError, NoiseModel},
};

/// One observation: per-sample pointing and calibrated data, plus the noise
/// model built from it.
#[derive(Debug, Clone)]
pub struct Tod {
    pub dx: Array2<f64>,
    pub dy: Array2<f64>,
    pub dat_calib: Array2<f64>,
    /// Flat pixel index per sample, populated once the owning map's
    /// pixelization is known (via `SkyMapLike::get_pix`).
    pub ipix: Array2<i32>,
    /// `ndet x ndet` SVD rotation built by `set_noise_smoothed_svd`.
    pub v: Array2<f64>,
    /// `ndet x nfreq` (or wider) per-mode frequency weight.
    pub mywt: Array2<f64>,
    /// Unique index within the owning TodVec.
    pub tag: usize,
    /// Median sample spacing, seconds.
    pub dt: f64,
    /// Per-detector identifiers from the ingest source.
    pub pixid: Vec<i64>,
    /// Source filename, kept for diagnostics.
    pub fname: String,
    /// User-added per-sample quantities not named above.
    pub extra: HashMap<String, Array2<f64>>,
}

impl Tod {
    /// Construct a TOD from raw per-sample arrays, with an empty noise model
    /// and `ipix` left to be filled in once a map's pixelization is known.
    pub fn new(dx: Array2<f64>, dy: Array2<f64>, dat_calib: Array2<f64>, dt: f64, fname: String) -> Tod {
        let (ndet, nsamp) = dx.dim();
        Tod {
            dx,
            dy,
            dat_calib,
            ipix: Array2::zeros((ndet, nsamp)),
            v: Array2::eye(ndet),
            mywt: Array2::from_elem((ndet, nfreq_for_nsamp(nsamp)), 1.0),
            tag: 0,
            dt,
            pixid: (0..ndet as i64).collect(),
            fname,
            extra: HashMap::new(),
        }
    }

    pub fn ndet(&self) -> usize {
        self.dx.nrows()
    }

    pub fn nsamp(&self) -> usize {
        self.dx.ncols()
    }

    /// Build and store this TOD's noise model (§4.C).
    pub fn set_noise_smoothed_svd(&mut self, fwhm: f64) -> Result<(), NoiseError> {
        let NoiseModel { v, mywt } = set_noise_smoothed_svd(&self.dat_calib.view(), fwhm)?;
        self.v = v;
        self.mywt = mywt;
        Ok(())
    }

    /// `N^-1 x`, per §4.C.
    pub fn apply_noise(&self, x: &ArrayView2<f64>) -> Result<Array2<f64>, NoiseError> {
        let model = NoiseModel {
            v: self.v.clone(),
            mywt: self.mywt.clone(),
        };
        apply_noise(&model, x)
    }

    /// `A = PᵀN⁻¹P` applied to `in`, accumulated into `out`: gather every
    /// input map into a timestream, apply the noise operator, scatter back
    /// into every output map.
    pub fn dot(&self, in_maps: &Mapset, out_maps: &mut Mapset) -> Result<(), MapMakerError> {
        let mut tmp = Array2::<f64>::zeros((self.ndet(), self.nsamp()));
        for comp in in_maps.components() {
            comp.map2tod(self, &mut tmp, true)?;
        }
        let filtered = self.apply_noise(&tmp.view())?;
        for comp in out_maps.components_mut() {
            comp.tod2map(self, &filtered, true)?;
        }
        Ok(())
    }

    /// Drop detectors where `keep[det]` is false, slicing every named array
    /// and every entry of `extra` by the same mask.
    pub fn cut_detectors(&mut self, keep: &[bool]) {
        let kept_rows: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect();

        let select = |arr: &Array2<f64>| -> Array2<f64> {
            arr.select(ndarray::Axis(0), &kept_rows)
        };
        self.dx = select(&self.dx);
        self.dy = select(&self.dy);
        self.dat_calib = select(&self.dat_calib);
        self.ipix = self.ipix.select(ndarray::Axis(0), &kept_rows);
        self.v = self.v.select(ndarray::Axis(0), &kept_rows).select(ndarray::Axis(1), &kept_rows);
        self.mywt = self.mywt.select(ndarray::Axis(0), &kept_rows);
        self.pixid = kept_rows.iter().map(|&i| self.pixid[i]).collect();
        for arr in self.extra.values_mut() {
            *arr = select(arr);
        }
    }

    /// `(xmin, xmax, ymin, ymax)` of this TOD's pointing, radians.
    pub fn lims(&self) -> (f64, f64, f64, f64) {
        let xmin = self.dx.iter().cloned().fold(f64::INFINITY, f64::min);
        let xmax = self.dx.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let ymin = self.dy.iter().cloned().fold(f64::INFINITY, f64::min);
        let ymax = self.dy.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        (xmin, xmax, ymin, ymax)
    }
}

/// The ordered collection of TODs this rank owns.
#[derive(Debug, Clone, Default)]
pub struct TodVec {
    tods: Vec<Tod>,
}

impl TodVec {
    pub fn new() -> TodVec {
        TodVec { tods: Vec::new() }
    }

    /// Append a TOD, assigning it the next `tag` in this rank's sequence.
    pub fn add_tod(&mut self, mut tod: Tod) {
        tod.tag = self.tods.len();
        self.tods.push(tod);
    }

    pub fn tods(&self) -> &[Tod] {
        &self.tods
    }

    pub fn tods_mut(&mut self) -> &mut [Tod] {
        &mut self.tods
    }

    pub fn len(&self) -> usize {
        self.tods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tods.is_empty()
    }

    /// Global `(xmin, xmax, ymin, ymax)` across every local TOD, reduced
    /// across ranks via `comm`.
    pub fn lims(&self, comm: &dyn Communicator) -> (f64, f64, f64, f64) {
        let mut xmin = f64::INFINITY;
        let mut xmax = f64::NEG_INFINITY;
        let mut ymin = f64::INFINITY;
        let mut ymax = f64::NEG_INFINITY;
        for tod in &self.tods {
            let (a, b, c, d) = tod.lims();
            xmin = xmin.min(a);
            xmax = xmax.max(b);
            ymin = ymin.min(c);
            ymax = ymax.max(d);
        }
        (
            comm.allreduce_min_f64(xmin),
            comm.allreduce_max_f64(xmax),
            comm.allreduce_min_f64(ymin),
            comm.allreduce_max_f64(ymax),
        )
    }

    /// Fill in every TOD's `ipix` from a map's pixelization.
    pub fn set_pix(&mut self, map: &dyn crate::map::SkyMapLike) {
        for tod in &mut self.tods {
            tod.ipix = map.get_pix(tod);
        }
    }

    /// Apply a [`RunConfig`] to this rank's TODs and the pointing kernels'
    /// worker pool: seed `pointing::set_nthread` from `config.num_threads`,
    /// then rebuild every TOD's noise model with `config.noise_smooth_fwhm`.
    pub fn configure(&mut self, config: &RunConfig) -> Result<(), NoiseError> {
        crate::pointing::set_nthread(config.num_threads);
        for tod in &mut self.tods {
            tod.set_noise_smoothed_svd(config.noise_smooth_fwhm)?;
        }
        Ok(())
    }

    /// `A = PᵀN⁻¹P` applied to `in`, summed over every local TOD then
    /// reduced across ranks. If `out` already holds a value, the TOD
    /// contributions are added to it; callers that want a fresh application
    /// should clear `out` first.
    ///
    /// When `report_times` is set, returns the wall-clock duration of each
    /// TOD's `dot` call, in the order the TODs were visited.
    pub fn dot(
        &self,
        in_maps: &Mapset,
        out_maps: &mut Mapset,
        comm: &dyn Communicator,
        report_times: bool,
    ) -> Result<Option<Vec<Duration>>, MapMakerError> {
        let mut timings = report_times.then(Vec::new);
        for tod in &self.tods {
            let start = Instant::now();
            tod.dot(in_maps, out_maps)?;
            if let Some(v) = timings.as_mut() {
                v.push(start.elapsed());
            }
        }
        out_maps.mpi_reduce(comm);
        Ok(timings)
    }

    /// `PᵀN⁻¹d`: clear `out`, accumulate each local TOD's noise-filtered
    /// data into it, then reduce across ranks.
    pub fn make_rhs(&self, out_maps: &mut Mapset, comm: &dyn Communicator) -> Result<(), MapMakerError> {
        out_maps.clear();
        for tod in &self.tods {
            let filtered = tod.apply_noise(&tod.dat_calib.view())?;
            for comp in out_maps.components_mut() {
                comp.tod2map(tod, &filtered, true)?;
            }
        }
        out_maps.mpi_reduce(comm);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn unit_tod() -> Tod {
        let dx = array![[0.0, 0.0]];
        let dy = array![[0.0, 0.0]];
        let dat = array![[5.0, 7.0]];
        let mut tod = Tod::new(dx, dy, dat, 1.0, "test".to_string());
        tod.ipix = array![[0, 1]];
        tod.v = Array2::eye(1);
        tod.mywt = Array2::from_elem((1, 2), 1.0);
        tod
    }

    #[test]
    fn cut_detectors_slices_named_fields_and_extra() {
        let dx = array![[0.0, 1.0], [2.0, 3.0]];
        let dy = array![[0.0, 1.0], [2.0, 3.0]];
        let dat = array![[1.0, 2.0], [3.0, 4.0]];
        let mut tod = Tod::new(dx, dy, dat, 1.0, "t".to_string());
        tod.extra.insert("foo".to_string(), array![[9.0, 9.0], [8.0, 8.0]]);

        tod.cut_detectors(&[false, true]);

        assert_eq!(tod.ndet(), 1);
        assert_eq!(tod.dx, array![[2.0, 3.0]]);
        assert_eq!(tod.extra["foo"], array![[8.0, 8.0]]);
    }

    #[test]
    fn tod_vec_lims_spans_all_tods() {
        let mut tv = TodVec::new();
        tv.add_tod(unit_tod());
        let mut second = unit_tod();
        second.dx = array![[-1.0, 2.0]];
        tv.add_tod(second);

        let comm = crate::comm::NullComm;
        let (xmin, xmax, _, _) = tv.lims(&comm);
        assert_eq!(xmin, -1.0);
        assert_eq!(xmax, 2.0);
    }

    #[test]
    fn add_tod_assigns_sequential_tags() {
        let mut tv = TodVec::new();
        tv.add_tod(unit_tod());
        tv.add_tod(unit_tod());
        assert_eq!(tv.tods()[0].tag, 0);
        assert_eq!(tv.tods()[1].tag, 1);
    }

    #[test]
    fn configure_rebuilds_noise_models_from_run_config() {
        let mut tv = TodVec::new();
        tv.add_tod(unit_tod());
        let config = RunConfig {
            noise_smooth_fwhm: 1.0,
            ..RunConfig::default()
        };
        tv.configure(&config).unwrap();
        assert_eq!(tv.tods()[0].mywt.ncols(), nfreq_for_nsamp(2));
    }
}
