// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Function identification from the configuration space header.

use crate::ConfigSpaceAccess;
use crate::DiscoveryError;
use crate::spec::cfg_space::Command;
use crate::spec::cfg_space::HeaderType;
use crate::spec::cfg_space::Status;
use crate::spec::cfg_space::offset;
use crate::spec::hwid::ClassCode;
use crate::spec::hwid::HardwareIds;
use serde::Serialize;

/// The identifying registers of a function's configuration space header.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    /// Vendor, device, revision and class codes.
    pub ids: HardwareIds,
    /// Command register (offset 0x04).
    pub command: u16,
    /// Status register (offset 0x06).
    pub status: u16,
    /// Header Type register (offset 0x0E).
    pub header_type: u8,
}

impl DeviceIdentity {
    /// Reads the identifying registers.
    ///
    /// Fails with [`DiscoveryError::NoDevice`] if the vendor ID reads as
    /// 0xFFFF, which is what reads of an absent function return.
    pub fn read(access: impl ConfigSpaceAccess) -> Result<Self, DiscoveryError> {
        let read_u8 = |at| access.read_u8(at).map_err(DiscoveryError::access(at));
        let read_u16 = |at| access.read_u16(at).map_err(DiscoveryError::access(at));

        let vendor_id = read_u16(offset::VENDOR_ID)?;
        if vendor_id == !0 {
            return Err(DiscoveryError::NoDevice);
        }

        Ok(Self {
            ids: HardwareIds {
                vendor_id,
                device_id: read_u16(offset::DEVICE_ID)?,
                revision_id: read_u8(offset::REVISION_ID)?,
                prog_if: read_u8(offset::PROG_IF)?,
                sub_class: read_u8(offset::SUB_CLASS)?,
                base_class: ClassCode(read_u8(offset::BASE_CLASS)?),
            },
            command: read_u16(offset::COMMAND)?,
            status: read_u16(offset::STATUS)?,
            header_type: read_u8(offset::HEADER_TYPE)?,
        })
    }

    /// The decoded Command register.
    pub fn command(&self) -> Command {
        Command::from_bits(self.command)
    }

    /// The decoded Status register.
    pub fn status(&self) -> Status {
        Status::from_bits(self.status)
    }

    /// The decoded Header Type register.
    pub fn header_type(&self) -> HeaderType {
        HeaderType::from_bits(self.header_type)
    }
}
