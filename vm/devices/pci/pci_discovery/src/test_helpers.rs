// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Helpers for building synthetic configuration spaces in tests.

use crate::AccessError;
use crate::ConfigSpaceAccess;
use crate::ConfigSpaceSnapshot;
use crate::spec::caps::CapabilityId;
use crate::spec::caps::header;
use crate::spec::cfg_space::EXTENDED_CONFIG_SPACE_SIZE;
use crate::spec::cfg_space::offset;
use crate::spec::ext_caps::ExtendedCapabilityHeader;
use crate::spec::ext_caps::ExtendedCapabilityId;
use std::cell::Cell;
use std::ops::Range;

/// Builds a 4 KiB configuration space, linking capabilities in the order
/// they are added.
pub struct ConfigSpaceBuilder {
    bytes: Vec<u8>,
    last_capability: Option<u16>,
    last_extended: Option<u16>,
}

impl ConfigSpaceBuilder {
    pub fn new() -> Self {
        Self {
            bytes: vec![0; EXTENDED_CONFIG_SPACE_SIZE.into()],
            last_capability: None,
            last_extended: None,
        }
        .ids(0x10ec, 0x8161)
    }

    pub fn ids(self, vendor_id: u16, device_id: u16) -> Self {
        self.set_u16(offset::VENDOR_ID, vendor_id)
            .set_u16(offset::DEVICE_ID, device_id)
    }

    pub fn class(self, base_class: u8, sub_class: u8, prog_if: u8) -> Self {
        self.set_u8(offset::BASE_CLASS, base_class)
            .set_u8(offset::SUB_CLASS, sub_class)
            .set_u8(offset::PROG_IF, prog_if)
    }

    /// Adds a legacy capability at `cap_offset`, with a next pointer of zero,
    /// and links the previous capability (or the capabilities pointer) to it.
    pub fn capability(mut self, cap_offset: u16, id: CapabilityId) -> Self {
        let link = match self.last_capability {
            Some(prev) => prev + header::NEXT,
            None => offset::CAPABILITIES_POINTER,
        };
        self.last_capability = Some(cap_offset);
        self.set_u8(link, cap_offset as u8)
            .set_u8(cap_offset + header::ID, id.0)
            .set_u8(cap_offset + header::NEXT, 0)
    }

    /// Adds an extended capability at `cap_offset`, with a next offset of
    /// zero, and links the previous extended capability to it.
    pub fn extended(mut self, cap_offset: u16, id: ExtendedCapabilityId, version: u8) -> Self {
        if let Some(prev) = self.last_extended {
            let header = ExtendedCapabilityHeader::from_bits(self.u32_at(prev)).with_next(cap_offset);
            self = self.set_u32(prev, header.into_bits());
        }
        self.last_extended = Some(cap_offset);
        let header = ExtendedCapabilityHeader::new()
            .with_id(id.0)
            .with_version(version);
        self.set_u32(cap_offset, header.into_bits())
    }

    pub fn set_u8(mut self, at: u16, value: u8) -> Self {
        self.bytes[usize::from(at)] = value;
        self
    }

    pub fn set_u16(self, at: u16, value: u16) -> Self {
        self.set_bytes(at, &value.to_le_bytes())
    }

    pub fn set_u32(self, at: u16, value: u32) -> Self {
        self.set_bytes(at, &value.to_le_bytes())
    }

    pub fn fill(mut self, range: Range<u16>, value: u8) -> Self {
        self.bytes[usize::from(range.start)..usize::from(range.end)].fill(value);
        self
    }

    pub fn build(self) -> ConfigSpaceSnapshot {
        ConfigSpaceSnapshot::new(self.bytes)
    }

    fn set_bytes(mut self, at: u16, value: &[u8]) -> Self {
        let at = usize::from(at);
        self.bytes[at..at + value.len()].copy_from_slice(value);
        self
    }

    fn u32_at(&self, at: u16) -> u32 {
        let at = usize::from(at);
        u32::from_le_bytes(self.bytes[at..at + 4].try_into().unwrap())
    }
}

/// Fails every read that touches `fail_at` or any offset above it.
pub struct FailingAccess {
    inner: ConfigSpaceSnapshot,
    fail_at: u16,
}

impl FailingAccess {
    pub fn new(inner: ConfigSpaceSnapshot, fail_at: u16) -> Self {
        Self { inner, fail_at }
    }

    fn check(&self, offset: u16, width: u16) -> Result<(), AccessError> {
        if u32::from(offset) + u32::from(width) > u32::from(self.fail_at) {
            Err(AccessError::Device(
                format!("injected failure at {offset:#x}").into(),
            ))
        } else {
            Ok(())
        }
    }
}

impl ConfigSpaceAccess for FailingAccess {
    fn read_u8(&self, offset: u16) -> Result<u8, AccessError> {
        self.check(offset, 1)?;
        self.inner.read_u8(offset)
    }

    fn read_u16(&self, offset: u16) -> Result<u16, AccessError> {
        self.check(offset, 2)?;
        self.inner.read_u16(offset)
    }

    fn read_u32(&self, offset: u16) -> Result<u32, AccessError> {
        self.check(offset, 4)?;
        self.inner.read_u32(offset)
    }
}

/// Counts the reads issued against a snapshot.
pub struct CountingAccess {
    inner: ConfigSpaceSnapshot,
    reads: Cell<usize>,
}

impl CountingAccess {
    pub fn new(inner: ConfigSpaceSnapshot) -> Self {
        Self {
            inner,
            reads: Cell::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    fn count(&self) {
        self.reads.set(self.reads.get() + 1);
    }
}

impl ConfigSpaceAccess for CountingAccess {
    fn read_u8(&self, offset: u16) -> Result<u8, AccessError> {
        self.count();
        self.inner.read_u8(offset)
    }

    fn read_u16(&self, offset: u16) -> Result<u16, AccessError> {
        self.count();
        self.inner.read_u16(offset)
    }

    fn read_u32(&self, offset: u16) -> Result<u32, AccessError> {
        self.count();
        self.inner.read_u32(offset)
    }
}
