// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Run-wide configuration knobs. A driver binary is expected to read a TOML
//! file (or fall back to defaults) and thread the result into the other
//! modules; this crate never reads files itself.

use serde::{Deserialize, Serialize};

/// The environment variable consulted by [`RunConfig::from_env_or_default`]
/// to seed the worker-thread hint. This is the *only* environment variable
/// this crate looks at.
pub const NUM_THREADS_ENV_VAR: &str = "MAPMAKER_NUM_THREADS";

/// Ambient configuration for a map-making run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of worker threads used by the pointing kernels' parallel
    /// variant. `0` means "let rayon pick based on available cores".
    pub num_threads: usize,

    /// Maximum PCG iterations.
    pub maxiter: usize,

    /// FWHM (in samples) of the Gaussian used to smooth per-mode noise power
    /// spectra in [`crate::noise`].
    pub noise_smooth_fwhm: f64,

    /// Prime factors allowed in a "good" FFT length (§4.H).
    pub good_fft_primes: Vec<u64>,

    /// Extra margin (in pixels) added to a [`crate::map::SkyMap`] before
    /// rounding up to a good FFT length.
    pub map_pad: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            num_threads: 0,
            maxiter: 25,
            noise_smooth_fwhm: 50.0,
            good_fft_primes: vec![2, 3, 5, 7],
            map_pad: 2,
        }
    }
}

impl RunConfig {
    /// Parse a `RunConfig` from a TOML string. Missing fields fall back to
    /// [`RunConfig::default`].
    pub fn from_toml_str(s: &str) -> Result<RunConfig, toml::de::Error> {
        toml::from_str(s)
    }

    /// Build the default config, but seed `num_threads` from
    /// [`NUM_THREADS_ENV_VAR`] if it is set and parses as a positive integer.
    ///
    /// This is the one place in the crate that looks at the environment; the
    /// rest of the code only ever sees the resulting struct.
    pub fn from_env_or_default() -> RunConfig {
        let mut config = RunConfig::default();
        if let Ok(val) = std::env::var(NUM_THREADS_ENV_VAR) {
            if let Ok(n) = val.parse::<usize>() {
                config.num_threads = n;
            }
        }
        config
    }
}
