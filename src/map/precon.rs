// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The PCG preconditioner, expressed as an explicit sum type rather than an
//! identity-returning operator overload.

use super::{ConformabilityError, Mapset};

/// `K` in `K^-1 A x = K^-1 b`. `run_pcg` (§4.G) matches on this explicitly
/// instead of relying on a `Mapset` operator overload that silently becomes
/// the identity when no preconditioner is configured.
pub enum Precon {
    /// No preconditioning; `apply` is the identity.
    Identity,
    /// A diagonal preconditioner, applied by componentwise multiplication.
    Diagonal(Mapset),
}

impl Precon {
    /// Apply the preconditioner to `r`, producing `z`.
    pub fn apply(&self, r: &Mapset) -> Result<Mapset, ConformabilityError> {
        match self {
            Precon::Identity => Ok(r.box_clone()),
            Precon::Diagonal(d) => d.mul(r),
        }
    }
}
