// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A maximum-likelihood map-maker for scanning-telescope time-ordered data:
//! solves `(PᵀN⁻¹P) m = PᵀN⁻¹d` for the pixelized sky map `m` by
//! preconditioned conjugate gradients.
//!
//! This crate is the solver core only. Driving a real run -- choosing a
//! TOD set, wiring up MPI, picking a map footprint -- is left to a caller;
//! see the `config`, `logging`, and `io` modules for the seams a driver
//! binary uses.

pub mod comm;
pub mod config;
pub mod error;
pub mod fft;
pub mod io;
pub mod logging;
pub mod map;
pub mod math;
pub mod noise;
pub mod pcg;
pub mod pointing;
pub mod tod;

pub use config::RunConfig;
pub use error::MapMakerError;
pub use map::{Mapset, Precon, SkyMap, SkyMapCar, SkyMapLike};
pub use pcg::run_pcg;
pub use tod::{Tod, TodVec};
