// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Cross-rank reduction abstraction. MPI availability is a compile-time
//! feature (`--features mpi`), not a runtime probe: the single-rank
//! [`NullComm`] is used unless the caller opts into the real bindings.

/// A world communicator capable of the handful of collectives this crate
/// needs: elementwise sum-reduce of map-shaped buffers, and scalar min/max
/// for global pointing limits.
pub trait Communicator: Send + Sync {
    /// This rank's index in the world communicator.
    fn rank(&self) -> usize;

    /// The number of ranks in the world communicator.
    fn size(&self) -> usize;

    /// Sum `buf` elementwise across all ranks, in place.
    fn allreduce_sum_f64(&self, buf: &mut [f64]);

    /// Reduce `val` to the minimum across all ranks.
    fn allreduce_min_f64(&self, val: f64) -> f64;

    /// Reduce `val` to the maximum across all ranks.
    fn allreduce_max_f64(&self, val: f64) -> f64;
}

/// The always-available single-rank communicator. Every collective is a
/// no-op: the local value already *is* the global value.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullComm;

impl Communicator for NullComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn allreduce_sum_f64(&self, _buf: &mut [f64]) {}

    fn allreduce_min_f64(&self, val: f64) -> f64 {
        val
    }

    fn allreduce_max_f64(&self, val: f64) -> f64 {
        val
    }
}

#[cfg(feature = "mpi")]
pub mod mpi_comm {
    //! Real cross-process reduction, backed by the `mpi` crate (rsmpi).

    use mpi::{
        collective::SystemOperation,
        topology::SystemCommunicator,
        traits::{Communicator as _, CommunicatorCollectives},
    };

    use super::Communicator;

    /// A [`Communicator`] backed by the world communicator of an initialised
    /// MPI universe.
    pub struct MpiComm {
        world: SystemCommunicator,
    }

    impl MpiComm {
        /// Wrap an already-initialised world communicator. Initialising MPI
        /// itself (`mpi::initialize`) is a driver concern, since it must
        /// happen exactly once per process before anything else runs.
        pub fn new(world: SystemCommunicator) -> MpiComm {
            MpiComm { world }
        }
    }

    impl Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.world.rank() as usize
        }

        fn size(&self) -> usize {
            self.world.size() as usize
        }

        fn allreduce_sum_f64(&self, buf: &mut [f64]) {
            let input = buf.to_vec();
            self.world
                .all_reduce_into(&input, buf, SystemOperation::sum());
        }

        fn allreduce_min_f64(&self, val: f64) -> f64 {
            let mut out = val;
            self.world
                .all_reduce_into(&val, &mut out, SystemOperation::min());
            out
        }

        fn allreduce_max_f64(&self, val: f64) -> f64 {
            let mut out = val;
            self.world
                .all_reduce_into(&val, &mut out, SystemOperation::max());
            out
        }
    }
}
