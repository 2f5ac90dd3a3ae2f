// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-detector sparse cut masks, carried alongside a TOD but never read by
//! the PCG inner loop. They exist so [`crate::tod::Tod::cut_detectors`] has
//! somewhere to record cut state when detectors are removed.

/// One TOD's per-detector cut ranges: `cuts[det]` is `Some(ranges)` where
/// each `(start, end)` is a half-open `[start, end)` sample range, or `None`
/// if the detector has no cuts.
#[derive(Debug, Clone, Default)]
pub struct Cuts {
    per_detector: Vec<Option<Vec<(usize, usize)>>>,
}

impl Cuts {
    pub fn new(ndet: usize) -> Cuts {
        Cuts {
            per_detector: vec![None; ndet],
        }
    }

    pub fn ndet(&self) -> usize {
        self.per_detector.len()
    }

    pub fn ranges_for(&self, det: usize) -> Option<&[(usize, usize)]> {
        self.per_detector[det].as_deref()
    }

    pub fn set_ranges(&mut self, det: usize, ranges: Vec<(usize, usize)>) {
        self.per_detector[det] = if ranges.is_empty() { None } else { Some(ranges) };
    }

    /// Keep only the entries for detectors where `keep[det]` is true,
    /// preserving relative order. Mirrors [`crate::tod::Tod::cut_detectors`]'s
    /// boolean-mask slicing of its own named fields.
    pub fn retain(&mut self, keep: &[bool]) {
        let mut kept = Vec::with_capacity(keep.iter().filter(|&&k| k).count());
        for (entry, &k) in self.per_detector.iter().zip(keep.iter()) {
            if k {
                kept.push(entry.clone());
            }
        }
        self.per_detector = kept;
    }
}

/// The per-`TodVec` aggregate of [`Cuts`], indexed by each TOD's `tag`.
#[derive(Debug, Clone, Default)]
pub struct CutsVec {
    by_tag: Vec<Cuts>,
}

impl CutsVec {
    pub fn new() -> CutsVec {
        CutsVec { by_tag: Vec::new() }
    }

    pub fn push(&mut self, cuts: Cuts) {
        self.by_tag.push(cuts);
    }

    pub fn get(&self, tag: usize) -> Option<&Cuts> {
        self.by_tag.get(tag)
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}
