// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Visited-offset tracking for capability list walks.

use crate::spec::cfg_space::EXTENDED_CONFIG_SPACE_SIZE;
use bitvec::BitArr;
use bitvec::array::BitArray;

/// One bit per byte offset of the extended configuration space.
pub(crate) struct VisitedOffsets {
    bits: BitArr!(for EXTENDED_CONFIG_SPACE_SIZE as usize, in u64),
}

impl VisitedOffsets {
    pub fn new() -> Self {
        Self {
            bits: BitArray::ZERO,
        }
    }

    /// Marks `offset` as visited, returning false if it already was.
    ///
    /// Offsets outside the configuration space are never considered visited;
    /// callers bound their offsets before walking.
    pub fn insert(&mut self, offset: u16) -> bool {
        match self.bits.get_mut(usize::from(offset)) {
            Some(mut bit) => !bit.replace(true),
            None => true,
        }
    }
}
