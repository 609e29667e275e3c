// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Walker for the PCI Express extended capability list.
//!
//! Extended capabilities live in configuration space at or above 0x100, and
//! are only present on PCI Express functions. Each begins with a 32-bit
//! [`ExtendedCapabilityHeader`].

use crate::ConfigSpaceAccess;
use crate::DiscoveryError;
use crate::names::CapabilityName;
use crate::names::extended_capability_name;
use crate::spec::cfg_space::CONFIG_SPACE_SIZE;
use crate::spec::cfg_space::EXTENDED_CONFIG_SPACE_SIZE;
use crate::spec::ext_caps::EXTENDED_CAPABILITY_BASE;
use crate::spec::ext_caps::ExtendedCapabilityHeader;
use crate::spec::ext_caps::ExtendedCapabilityId;
use crate::spec::ext_caps::NEXT_POINTER_MASK;
use crate::visited::VisitedOffsets;
use serde::Serialize;

/// A capability found on the extended capability list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct ExtendedCapabilityRecord {
    /// The raw capability ID.
    pub id: ExtendedCapabilityId,
    /// The capability structure version.
    pub version: u8,
    /// The configuration space offset of the capability header.
    pub offset: u16,
    /// The name resolved from the capability ID.
    pub name: CapabilityName,
}

/// A lazy walk over a function's extended capability list.
///
/// Next pointers are masked with 0xFFC. The walk ends normally when a
/// header's next pointer is zero or points back into conventional
/// configuration space. A header of all zeroes at the base, or all ones
/// anywhere, means there is no (readable) extended capability list.
pub struct ExtendedCapabilityWalk<A> {
    access: A,
    next: u16,
    visited: VisitedOffsets,
}

impl<A: ConfigSpaceAccess> ExtendedCapabilityWalk<A> {
    /// Starts a walk at offset 0x100.
    ///
    /// Callers should only walk the extended list of functions with a PCI
    /// Express capability.
    pub fn new(access: A) -> Self {
        Self {
            access,
            next: EXTENDED_CAPABILITY_BASE,
            visited: VisitedOffsets::new(),
        }
    }

    fn in_bounds(offset: u16) -> bool {
        offset >= CONFIG_SPACE_SIZE && offset <= EXTENDED_CONFIG_SPACE_SIZE - 4
    }

    fn step(
        &mut self,
        cap_offset: u16,
    ) -> Result<Option<(ExtendedCapabilityRecord, u16)>, DiscoveryError> {
        if !self.visited.insert(cap_offset) {
            return Err(DiscoveryError::CyclicList { offset: cap_offset });
        }

        let raw = self
            .access
            .read_u32(cap_offset)
            .map_err(DiscoveryError::access(cap_offset))?;
        if raw == !0 || (raw == 0 && cap_offset == EXTENDED_CAPABILITY_BASE) {
            return Ok(None);
        }

        let header = ExtendedCapabilityHeader::from_bits(raw);
        let id = ExtendedCapabilityId(header.id());
        let record = ExtendedCapabilityRecord {
            id,
            version: header.version(),
            offset: cap_offset,
            name: extended_capability_name(id),
        };
        Ok(Some((record, header.next() & NEXT_POINTER_MASK)))
    }
}

impl<A: ConfigSpaceAccess> Iterator for ExtendedCapabilityWalk<A> {
    type Item = Result<ExtendedCapabilityRecord, DiscoveryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let cap_offset = std::mem::take(&mut self.next);
        if !Self::in_bounds(cap_offset) {
            return None;
        }
        match self.step(cap_offset) {
            Ok(Some((record, next))) => {
                self.next = next;
                Some(Ok(record))
            }
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

impl<A: ConfigSpaceAccess> std::iter::FusedIterator for ExtendedCapabilityWalk<A> {}

/// Walks the whole extended capability list.
///
/// Any failure discards the records gathered so far.
pub fn extended_capabilities(
    access: impl ConfigSpaceAccess,
) -> Result<Vec<ExtendedCapabilityRecord>, DiscoveryError> {
    ExtendedCapabilityWalk::new(access).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ConfigSpaceBuilder;
    use crate::test_helpers::CountingAccess;
    use crate::test_helpers::FailingAccess;

    #[test]
    fn decodes_header_fields() {
        let space = ConfigSpaceBuilder::new()
            .set_u32(0x100, 0x1481_0001)
            .set_u32(0x148, 0x0001_0003)
            .build();
        let records = extended_capabilities(&space).unwrap();
        assert_eq!(
            records,
            [
                ExtendedCapabilityRecord {
                    id: ExtendedCapabilityId::ADVANCED_ERROR_REPORTING,
                    version: 1,
                    offset: 0x100,
                    name: CapabilityName::Known("Advanced Error Reporting"),
                },
                ExtendedCapabilityRecord {
                    id: ExtendedCapabilityId::DEVICE_SERIAL_NUMBER,
                    version: 1,
                    offset: 0x148,
                    name: CapabilityName::Known("Device Serial Number"),
                },
            ]
        );
    }

    #[test]
    fn builder_chain() {
        let space = ConfigSpaceBuilder::new()
            .extended(0x100, ExtendedCapabilityId::ADVANCED_ERROR_REPORTING, 2)
            .extended(0x150, ExtendedCapabilityId::SRIOV, 1)
            .extended(0x300, ExtendedCapabilityId::L1_PM_SUBSTATES, 1)
            .build();
        let walk: Vec<_> = extended_capabilities(&space)
            .unwrap()
            .into_iter()
            .map(|r| (r.offset, r.id, r.version))
            .collect();
        assert_eq!(
            walk,
            [
                (0x100, ExtendedCapabilityId::ADVANCED_ERROR_REPORTING, 2),
                (0x150, ExtendedCapabilityId::SRIOV, 1),
                (0x300, ExtendedCapabilityId::L1_PM_SUBSTATES, 1),
            ]
        );
    }

    #[test]
    fn id_uses_full_low_word() {
        // 0x0101 must not be confused with AER (0x01).
        let space = ConfigSpaceBuilder::new().set_u32(0x100, 0x0001_0101).build();
        let records = extended_capabilities(&space).unwrap();
        assert_eq!(records[0].id, ExtendedCapabilityId(0x0101));
        assert!(records[0].name.is_reserved());
    }

    #[test]
    fn empty_extended_space() {
        let space = ConfigSpaceBuilder::new().build();
        assert!(extended_capabilities(&space).unwrap().is_empty());

        let space = ConfigSpaceBuilder::new().set_u32(0x100, !0).build();
        assert!(extended_capabilities(&space).unwrap().is_empty());
    }

    #[test]
    fn null_capability_after_base_is_reported() {
        let space = ConfigSpaceBuilder::new()
            .extended(0x100, ExtendedCapabilityId::ADVANCED_ERROR_REPORTING, 1)
            .extended(0x200, ExtendedCapabilityId::NULL, 0)
            .build();
        let records = extended_capabilities(&space).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name.as_str(), "Null Capability");
    }

    #[test]
    fn next_pointer_into_legacy_space_ends_walk() {
        let space = ConfigSpaceBuilder::new()
            .set_u32(0x100, 0x0401_0001)
            .build();
        assert_eq!(extended_capabilities(&space).unwrap().len(), 1);
    }

    #[test]
    fn next_pointer_reserved_bits_are_ignored() {
        let space = ConfigSpaceBuilder::new()
            .set_u32(0x100, 0x1431_0001)
            .set_u32(0x140, 0x0001_0003)
            .build();
        let offsets: Vec<_> = extended_capabilities(&space)
            .unwrap()
            .into_iter()
            .map(|r| r.offset)
            .collect();
        assert_eq!(offsets, [0x100, 0x140]);

        // 0xffe would need bytes past the end of config space unmasked.
        let space = ConfigSpaceBuilder::new()
            .set_u32(0x100, 0xffe1_0001)
            .set_u32(0xffc, 0x0001_0003)
            .build();
        let offsets: Vec<_> = extended_capabilities(&space)
            .unwrap()
            .into_iter()
            .map(|r| r.offset)
            .collect();
        assert_eq!(offsets, [0x100, 0xffc]);
    }

    #[test]
    fn short_snapshot_is_access_failure() {
        let space = crate::ConfigSpaceSnapshot::new(vec![0; 256]);
        assert!(matches!(
            extended_capabilities(&space),
            Err(DiscoveryError::AccessFailure { offset: 0x100, .. })
        ));
    }

    #[test]
    fn failed_read_mid_walk() {
        let space = ConfigSpaceBuilder::new()
            .extended(0x100, ExtendedCapabilityId::ADVANCED_ERROR_REPORTING, 1)
            .extended(0x140, ExtendedCapabilityId::DEVICE_SERIAL_NUMBER, 1)
            .build();
        let access = FailingAccess::new(space, 0x140);
        let mut walk = ExtendedCapabilityWalk::new(&access);
        assert!(walk.next().unwrap().is_ok());
        assert!(matches!(
            walk.next(),
            Some(Err(DiscoveryError::AccessFailure { offset: 0x140, .. }))
        ));
        assert!(walk.next().is_none());
    }

    #[test]
    fn loop_back_to_base_is_cyclic() {
        let space = ConfigSpaceBuilder::new()
            .extended(0x100, ExtendedCapabilityId::ADVANCED_ERROR_REPORTING, 1)
            .extended(0x180, ExtendedCapabilityId::VENDOR_SPECIFIC, 1)
            .set_u32(0x180, 0x1001_000b)
            .build();
        let err = extended_capabilities(&space).unwrap_err();
        assert!(matches!(err, DiscoveryError::CyclicList { offset: 0x100 }));
    }

    #[test]
    fn dense_cycle_terminates() {
        // Every dword from 0x100 up points at the next, and the last one wraps
        // around to the base.
        let mut builder = ConfigSpaceBuilder::new();
        for offset in (0x100..0x1000u16).step_by(4) {
            let next = if offset == 0xffc { 0x100 } else { offset + 4 };
            builder = builder.set_u32(offset, (u32::from(next) << 20) | 0x0001_0001);
        }
        let access = CountingAccess::new(builder.build());
        let results: Vec<_> = ExtendedCapabilityWalk::new(&access).collect();
        assert_eq!(results.len(), (0x1000 - 0x100) / 4 + 1);
        assert!(matches!(
            results.last(),
            Some(Err(DiscoveryError::CyclicList { offset: 0x100 }))
        ));
        assert_eq!(access.reads(), (0x1000 - 0x100) / 4);
    }

    #[test]
    fn walk_is_idempotent() {
        let space = ConfigSpaceBuilder::new()
            .extended(0x100, ExtendedCapabilityId::ADVANCED_ERROR_REPORTING, 1)
            .extended(0x140, ExtendedCapabilityId::LATENCY_TOLERANCE_REPORTING, 1)
            .build();
        assert_eq!(
            extended_capabilities(&space).unwrap(),
            extended_capabilities(&space).unwrap()
        );
    }
}
