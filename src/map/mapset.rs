// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A list of map-like components treated as a single vector in PCG's state
//! space. Every operation is componentwise.

use crate::comm::Communicator;

use super::{ConformabilityError, SkyMapLike};

/// An ordered collection of boxed [`SkyMapLike`] components, algebraically a
/// single vector: two Mapsets are conformable iff they have the same length
/// and the i-th components have identical shapes.
pub struct Mapset {
    components: Vec<Box<dyn SkyMapLike>>,
}

impl Mapset {
    /// Build a Mapset from its components, in order.
    pub fn new(components: Vec<Box<dyn SkyMapLike>>) -> Mapset {
        Mapset { components }
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[Box<dyn SkyMapLike>] {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut [Box<dyn SkyMapLike>] {
        &mut self.components
    }

    fn check_conformable(&self, other: &Mapset) -> Result<(), ConformabilityError> {
        if self.len() != other.len() {
            return Err(ConformabilityError::LengthMismatch {
                a: self.len(),
                b: other.len(),
            });
        }
        Ok(())
    }

    /// An independent copy of every component.
    pub fn box_clone(&self) -> Mapset {
        Mapset {
            components: self.components.iter().map(|c| c.box_clone()).collect(),
        }
    }

    /// Zero every component.
    pub fn clear(&mut self) {
        self.components.iter_mut().for_each(|c| c.clear());
    }

    /// `self += a * other`, componentwise.
    pub fn axpy(&mut self, other: &Mapset, a: f64) -> Result<(), ConformabilityError> {
        self.check_conformable(other)?;
        for (mine, theirs) in self.components.iter_mut().zip(other.components.iter()) {
            mine.axpy(theirs.as_ref(), a)?;
        }
        Ok(())
    }

    /// Sum of per-component dot products. Cross-rank reduction, if any, must
    /// already have happened on each component (via [`Mapset::mpi_reduce`])
    /// before this is called, since a dot product computed on
    /// not-yet-reduced maps is only this rank's partial contribution.
    pub fn dot(&self, other: &Mapset) -> Result<f64, ConformabilityError> {
        self.check_conformable(other)?;
        let mut total = 0.0;
        for (mine, theirs) in self.components.iter().zip(other.components.iter()) {
            total += mine.dot(theirs.as_ref())?;
        }
        Ok(total)
    }

    /// Elementwise product, componentwise, into a freshly allocated Mapset.
    pub fn mul(&self, other: &Mapset) -> Result<Mapset, ConformabilityError> {
        self.check_conformable(other)?;
        let mut components = Vec::with_capacity(self.len());
        for (mine, theirs) in self.components.iter().zip(other.components.iter()) {
            components.push(mine.mul(theirs.as_ref())?);
        }
        Ok(Mapset { components })
    }

    /// Sum-reduce every component across the world communicator, in place.
    pub fn mpi_reduce(&mut self, comm: &dyn Communicator) {
        self.components.iter_mut().for_each(|c| c.mpi_reduce(comm));
    }
}
