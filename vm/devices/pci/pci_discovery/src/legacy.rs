// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Walker for the legacy PCI capability list.
//!
//! The list starts at the pointer in the Capabilities Pointer register
//! (offset 0x34). Each entry begins with a one-byte capability ID, followed by
//! a one-byte pointer to the next entry. A pointer of zero ends the list.

use crate::ConfigSpaceAccess;
use crate::DiscoveryError;
use crate::access::AccessError;
use crate::names::CapabilityName;
use crate::names::capability_name;
use crate::spec::caps::CapabilityId;
use crate::spec::caps::header;
use crate::spec::cfg_space::offset;
use crate::visited::VisitedOffsets;
use serde::Serialize;

/// A capability found on the legacy capability list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityRecord {
    /// The raw capability ID.
    pub id: CapabilityId,
    /// The configuration space offset of the capability header.
    pub offset: u16,
    /// The name resolved from the capability ID.
    pub name: CapabilityName,
}

/// A lazy walk over a function's legacy capability list.
///
/// Yields one record per capability, or a single error after which the walk
/// is finished. Each offset is visited at most once, so the walk always
/// terminates, even for devices reporting a cyclic list.
pub struct CapabilityWalk<A> {
    access: A,
    next: u16,
    visited: VisitedOffsets,
    pcie_present: bool,
}

impl<A: ConfigSpaceAccess> CapabilityWalk<A> {
    /// Starts a walk at the function's capabilities pointer.
    ///
    /// If the pointer is zero, or cannot be read, the walk is empty.
    pub fn new(access: A) -> Self {
        let next = access
            .read_u8(offset::CAPABILITIES_POINTER)
            .map_or(0, |ptr| ptr & header::POINTER_MASK);
        Self {
            access,
            next: next.into(),
            visited: VisitedOffsets::new(),
            pcie_present: false,
        }
    }

    /// Whether a PCI Express capability has been seen so far.
    ///
    /// Only meaningful for the whole list once the walk is exhausted.
    pub fn pcie_present(&self) -> bool {
        self.pcie_present
    }

    fn step(&mut self, cap_offset: u16) -> Result<(CapabilityRecord, u16), DiscoveryError> {
        if !self.visited.insert(cap_offset) {
            return Err(DiscoveryError::CyclicList { offset: cap_offset });
        }

        let id_offset = cap_offset + header::ID;
        let id = self
            .access
            .read_u8(id_offset)
            .map_err(DiscoveryError::access(id_offset))?;
        if id == 0xff {
            return Err(DiscoveryError::AccessFailure {
                offset: id_offset,
                source: AccessError::Privilege,
            });
        }

        let next_offset = cap_offset + header::NEXT;
        let next = self
            .access
            .read_u8(next_offset)
            .map_err(DiscoveryError::access(next_offset))?
            & header::POINTER_MASK;

        let id = CapabilityId(id);
        if id == CapabilityId::PCI_EXPRESS {
            self.pcie_present = true;
        }

        let record = CapabilityRecord {
            id,
            offset: cap_offset,
            name: capability_name(id),
        };
        Ok((record, next.into()))
    }
}

impl<A: ConfigSpaceAccess> Iterator for CapabilityWalk<A> {
    type Item = Result<CapabilityRecord, DiscoveryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == 0 {
            return None;
        }
        let cap_offset = std::mem::take(&mut self.next);
        Some(self.step(cap_offset).map(|(record, next)| {
            self.next = next;
            record
        }))
    }
}

impl<A: ConfigSpaceAccess> std::iter::FusedIterator for CapabilityWalk<A> {}

/// The complete legacy capability list of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityList {
    /// The capabilities, in list order.
    pub records: Vec<CapabilityRecord>,
    /// Whether a PCI Express capability was found.
    pub pcie_present: bool,
}

/// Walks the whole legacy capability list.
///
/// Any failure discards the records gathered so far; use [`CapabilityWalk`]
/// directly to keep a partial list.
pub fn capabilities(access: impl ConfigSpaceAccess) -> Result<CapabilityList, DiscoveryError> {
    let mut walk = CapabilityWalk::new(access);
    let records = walk.by_ref().collect::<Result<Vec<_>, _>>()?;
    Ok(CapabilityList {
        records,
        pcie_present: walk.pcie_present(),
    })
}

/// Returns the offset of the first capability with the given ID, if any.
pub fn find_capability(
    access: impl ConfigSpaceAccess,
    id: CapabilityId,
) -> Result<Option<u16>, DiscoveryError> {
    for record in CapabilityWalk::new(access) {
        let record = record?;
        if record.id == id {
            return Ok(Some(record.offset));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ConfigSpaceBuilder;
    use crate::test_helpers::CountingAccess;
    use crate::test_helpers::FailingAccess;

    #[test]
    fn no_capability_list() {
        let space = ConfigSpaceBuilder::new().build();
        let list = capabilities(&space).unwrap();
        assert!(list.records.is_empty());
        assert!(!list.pcie_present);
    }

    #[test]
    fn unreadable_pointer_is_empty_list() {
        let access = FailingAccess::new(ConfigSpaceBuilder::new().build(), 0x34);
        let list = capabilities(&access).unwrap();
        assert!(list.records.is_empty());
    }

    #[test]
    fn power_management_then_pcie() {
        let space = ConfigSpaceBuilder::new()
            .capability(0x40, CapabilityId::POWER_MANAGEMENT)
            .capability(0x50, CapabilityId::PCI_EXPRESS)
            .build();
        let list = capabilities(&space).unwrap();
        assert_eq!(
            list.records,
            [
                CapabilityRecord {
                    id: CapabilityId::POWER_MANAGEMENT,
                    offset: 0x40,
                    name: CapabilityName::Known("PCI Power Management Interface"),
                },
                CapabilityRecord {
                    id: CapabilityId::PCI_EXPRESS,
                    offset: 0x50,
                    name: CapabilityName::Known("PCI Express"),
                },
            ]
        );
        assert!(list.pcie_present);
    }

    #[test]
    fn follows_next_pointer_not_adjacent_bytes() {
        // Place the second capability far from the first, with junk in between
        // that would look like capability IDs to a byte-by-byte scan.
        let space = ConfigSpaceBuilder::new()
            .capability(0x40, CapabilityId::MSI)
            .capability(0xc0, CapabilityId::MSIX)
            .fill(0x44..0xc0, 0x10)
            .build();
        let list = capabilities(&space).unwrap();
        let ids: Vec<_> = list.records.iter().map(|r| (r.offset, r.id)).collect();
        assert_eq!(
            ids,
            [(0x40, CapabilityId::MSI), (0xc0, CapabilityId::MSIX)]
        );
        assert!(!list.pcie_present);
    }

    #[test]
    fn reserved_bits_of_pointers_are_ignored() {
        let space = ConfigSpaceBuilder::new()
            .capability(0x40, CapabilityId::MSI)
            .capability(0x60, CapabilityId::MSIX)
            .set_u8(0x34, 0x43)
            .set_u8(0x41, 0x62)
            .build();
        let offsets: Vec<_> = capabilities(&space)
            .unwrap()
            .records
            .iter()
            .map(|r| r.offset)
            .collect();
        assert_eq!(offsets, [0x40, 0x60]);
    }

    #[test]
    fn unknown_ids_resolve_to_reserved() {
        let space = ConfigSpaceBuilder::new()
            .capability(0x40, CapabilityId(0x16))
            .capability(0x48, CapabilityId(0xfe))
            .build();
        let list = capabilities(&space).unwrap();
        assert_eq!(list.records.len(), 2);
        assert!(list.records.iter().all(|r| r.name.is_reserved()));
        assert_eq!(list.records[1].id, CapabilityId(0xfe));
    }

    #[test]
    fn all_ones_id_is_privilege_failure() {
        let space = ConfigSpaceBuilder::new()
            .capability(0x40, CapabilityId::POWER_MANAGEMENT)
            .capability(0x50, CapabilityId(0xff))
            .build();
        let err = capabilities(&space).unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::AccessFailure {
                offset: 0x50,
                source: AccessError::Privilege
            }
        ));
    }

    #[test]
    fn failed_read_mid_walk_is_access_failure() {
        let space = ConfigSpaceBuilder::new()
            .capability(0x40, CapabilityId::POWER_MANAGEMENT)
            .capability(0x50, CapabilityId::PCI_EXPRESS)
            .build();
        let access = FailingAccess::new(space, 0x51);
        let err = capabilities(&access).unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::AccessFailure { offset: 0x51, .. }
        ));
    }

    #[test]
    fn self_loop_is_cyclic() {
        let space = ConfigSpaceBuilder::new()
            .capability(0x40, CapabilityId::POWER_MANAGEMENT)
            .set_u8(0x41, 0x40)
            .build();
        let mut walk = CapabilityWalk::new(&space);
        assert_eq!(walk.next().unwrap().unwrap().offset, 0x40);
        assert!(matches!(
            walk.next(),
            Some(Err(DiscoveryError::CyclicList { offset: 0x40 }))
        ));
        assert!(walk.next().is_none());
    }

    #[test]
    fn longer_cycle_is_cyclic() {
        let space = ConfigSpaceBuilder::new()
            .capability(0x40, CapabilityId::POWER_MANAGEMENT)
            .capability(0x60, CapabilityId::MSI)
            .capability(0x80, CapabilityId::PCI_EXPRESS)
            .set_u8(0x81, 0x60)
            .build();
        let err = capabilities(&space).unwrap_err();
        assert!(matches!(err, DiscoveryError::CyclicList { offset: 0x60 }));
    }

    #[test]
    fn every_pointer_value_terminates() {
        // Point every dword-aligned slot at every other one; whatever the
        // chain shape, the walk must end within the size of the space.
        for stride in [4u8, 8, 0x24, 0xfc] {
            let mut builder = ConfigSpaceBuilder::new().set_u8(0x34, 0x40);
            for slot in (0x40..=0xfcu16).step_by(4) {
                let next = (slot as u8).wrapping_add(stride) & 0xfc;
                builder = builder.set_u8(slot, 0x01).set_u8(slot + 1, next.max(0x40));
            }
            let access = CountingAccess::new(builder.build());
            let results: Vec<_> = CapabilityWalk::new(&access).collect();
            assert!(results.len() <= 64);
            assert!(matches!(
                results.last(),
                Some(Err(DiscoveryError::CyclicList { .. }))
            ));
            assert!(access.reads() <= 1 + 2 * 64);
        }
    }

    #[test]
    fn walk_is_idempotent() {
        let space = ConfigSpaceBuilder::new()
            .capability(0x40, CapabilityId::POWER_MANAGEMENT)
            .capability(0x50, CapabilityId::MSI)
            .capability(0x70, CapabilityId::PCI_EXPRESS)
            .capability(0xb0, CapabilityId::MSIX)
            .build();
        assert_eq!(capabilities(&space).unwrap(), capabilities(&space).unwrap());
    }

    #[test]
    fn find_capability_by_id() {
        let space = ConfigSpaceBuilder::new()
            .capability(0x40, CapabilityId::POWER_MANAGEMENT)
            .capability(0x50, CapabilityId::MSIX)
            .build();
        assert_eq!(
            find_capability(&space, CapabilityId::MSIX).unwrap(),
            Some(0x50)
        );
        assert_eq!(find_capability(&space, CapabilityId::MSI).unwrap(), None);
    }
}
