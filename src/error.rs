// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all mapmaker-related errors. This should be the *only*
//! error enum that is publicly visible.

use thiserror::Error;

use crate::{io::IngestError, map::ConformabilityError, noise::NoiseError, pcg::PcgError, pointing::PointingError};

/// The *only* publicly visible error from mapmaker.
#[derive(Error, Debug)]
pub enum MapMakerError {
    /// Operands of a map/Mapset vector op did not have the same shape.
    #[error("conformability error: {0}")]
    Conformability(#[from] ConformabilityError),

    /// The pointing kernels (tod2map/map2tod) hit an error.
    #[error("pointing kernel error: {0}")]
    Pointing(#[from] PointingError),

    /// The noise operator hit an error (usually SVD failure).
    #[error("noise operator error: {0}")]
    Noise(#[from] NoiseError),

    /// PCG failed, usually due to numerical breakdown.
    #[error("PCG error: {0}")]
    Pcg(#[from] PcgError),

    /// An input file could not be parsed into the data model this crate
    /// expects.
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// A generic I/O error that can't be clarified further, e.g. a missing
    /// file.
    #[error("I/O error: {0}")]
    IO(#[from] std::io::Error),
}
