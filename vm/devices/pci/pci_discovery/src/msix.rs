// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! MSI-X capability decoding.

use crate::AccessError;
use crate::ConfigSpaceAccess;
use crate::DiscoveryError;
use crate::legacy::find_capability;
use crate::spec::caps::CapabilityId;
use crate::spec::caps::msix::BIR_MASK;
use crate::spec::caps::msix::MsixControl;
use crate::spec::caps::msix::offset;
use serde::Serialize;

/// The registers of a function's MSI-X capability.
///
/// The table and PBA fields hold the low 16 bits of the respective
/// offset/BIR registers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct MsixInfo {
    /// Configuration space offset of the capability header.
    pub capability_offset: u16,
    /// Message Control register.
    pub control: u16,
    /// Table offset and BAR indicator.
    pub table_offset_and_bir: u16,
    /// Pending Bit Array offset and BAR indicator.
    pub pba_offset_and_bir: u16,
}

impl MsixInfo {
    /// Reads the MSI-X registers of a capability at `capability_offset`.
    pub fn read(
        access: impl ConfigSpaceAccess,
        capability_offset: u16,
    ) -> Result<Self, DiscoveryError> {
        let read = |field: u16| -> Result<u16, DiscoveryError> {
            let at = capability_offset.checked_add(field).ok_or_else(|| {
                DiscoveryError::access(capability_offset)(AccessError::OutOfBounds {
                    offset: capability_offset,
                    width: 2,
                    len: usize::from(u16::MAX) + 1,
                })
            })?;
            access.read_u16(at).map_err(DiscoveryError::access(at))
        };
        Ok(Self {
            capability_offset,
            control: read(offset::CONTROL)?,
            table_offset_and_bir: read(offset::TABLE)?,
            pba_offset_and_bir: read(offset::PBA)?,
        })
    }

    /// The decoded Message Control register.
    pub fn control(&self) -> MsixControl {
        MsixControl::from_bits(self.control)
    }

    /// The number of entries in the MSI-X table.
    pub fn table_len(&self) -> u16 {
        self.control().table_size() + 1
    }

    /// The BAR holding the MSI-X table.
    pub fn table_bir(&self) -> u8 {
        (self.table_offset_and_bir & BIR_MASK) as u8
    }

    /// The low 16 bits of the table's offset within its BAR.
    pub fn table_offset(&self) -> u16 {
        self.table_offset_and_bir & !BIR_MASK
    }

    /// The BAR holding the Pending Bit Array.
    pub fn pba_bir(&self) -> u8 {
        (self.pba_offset_and_bir & BIR_MASK) as u8
    }

    /// The low 16 bits of the PBA's offset within its BAR.
    pub fn pba_offset(&self) -> u16 {
        self.pba_offset_and_bir & !BIR_MASK
    }
}

/// Finds and decodes the function's MSI-X capability.
///
/// Returns `Ok(None)` if the function has no MSI-X capability.
pub fn find_msix(access: impl ConfigSpaceAccess) -> Result<Option<MsixInfo>, DiscoveryError> {
    match find_capability(&access, CapabilityId::MSIX)? {
        Some(capability_offset) => MsixInfo::read(&access, capability_offset).map(Some),
        None => Ok(None),
    }
}
