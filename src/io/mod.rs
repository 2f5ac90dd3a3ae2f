// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Thin contract-only adapters at the edge of the crate: legacy
//! binary-struct ingest, FITS TOD ingest, FITS map egest. File I/O lives
//! only here; the core never touches the filesystem directly.

mod fits_tod;
mod octave;

pub use fits_tod::read_fits_tod;
pub use octave::{read_octave_struct, OctaveValue};

use thiserror::Error;

/// Errors from parsing an ingest file into the data model this crate
/// expects.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The legacy octave-struct format used an `nbyte` tag this crate
    /// doesn't know how to decode.
    #[error("unsupported element size tag {0} in octave struct ingest")]
    UnsupportedNbyte(i32),

    /// A FITS column, HDU, or key that the contract requires was missing.
    #[error("FITS ingest is missing required column/key '{0}'")]
    MissingFitsColumn(String),

    /// `DX`/`DY`/`FNU` column lengths did not reshape evenly into
    /// `[ndet, nsamp]`.
    #[error("FITS row count {nrows} is not a multiple of ndet={ndet}")]
    RowCountMismatch { nrows: usize, ndet: usize },

    /// A lower-level `fitsio` call failed; wrapped as a string since
    /// `fitsio::errors::Error` is not `Send` in every version.
    #[error("FITS error: {0}")]
    Fits(String),

    /// A generic I/O failure reading the ingest file.
    #[error("I/O error reading ingest file: {0}")]
    Io(#[from] std::io::Error),
}
