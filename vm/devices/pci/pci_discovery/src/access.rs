// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Configuration space read access.
//!
//! Discovery never talks to hardware directly. Instead, callers provide a
//! [`ConfigSpaceAccess`] implementation backed by whatever transport they have
//! (port I/O, ECAM, a sysfs `config` file, a captured dump, ...).

use std::error::Error;
use thiserror::Error;
use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::U16;
use zerocopy::byteorder::little_endian::U32;

/// An error returned by a [`ConfigSpaceAccess`] implementation.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The read extends past the end of the accessible configuration space.
    #[error("{width}-byte read at offset {offset:#05x} is outside the {len}-byte config space")]
    OutOfBounds {
        /// The requested offset.
        offset: u16,
        /// The width of the read, in bytes.
        width: u8,
        /// The number of accessible bytes.
        len: usize,
    },
    /// The read returned the all-ones pattern, which is what configuration
    /// space reads produce when the caller lacks the privilege to see them.
    #[error("config space read returned all-ones, insufficient privilege?")]
    Privilege,
    /// The backing transport failed.
    #[error("config space transport failure")]
    Device(#[source] Box<dyn Error + Send + Sync>),
}

/// Read access to a single function's configuration space.
///
/// Offsets range over 0..=255 for conventional PCI, and 0..=4095 for PCI
/// Express extended configuration space.
pub trait ConfigSpaceAccess {
    /// Reads the byte at `offset`.
    fn read_u8(&self, offset: u16) -> Result<u8, AccessError>;

    /// Reads the little-endian word at `offset`.
    fn read_u16(&self, offset: u16) -> Result<u16, AccessError>;

    /// Reads the little-endian dword at `offset`.
    fn read_u32(&self, offset: u16) -> Result<u32, AccessError>;
}

impl<T: ConfigSpaceAccess + ?Sized> ConfigSpaceAccess for &T {
    fn read_u8(&self, offset: u16) -> Result<u8, AccessError> {
        (**self).read_u8(offset)
    }

    fn read_u16(&self, offset: u16) -> Result<u16, AccessError> {
        (**self).read_u16(offset)
    }

    fn read_u32(&self, offset: u16) -> Result<u32, AccessError> {
        (**self).read_u32(offset)
    }
}

impl<T: ConfigSpaceAccess + ?Sized> ConfigSpaceAccess for Box<T> {
    fn read_u8(&self, offset: u16) -> Result<u8, AccessError> {
        (**self).read_u8(offset)
    }

    fn read_u16(&self, offset: u16) -> Result<u16, AccessError> {
        (**self).read_u16(offset)
    }

    fn read_u32(&self, offset: u16) -> Result<u32, AccessError> {
        (**self).read_u32(offset)
    }
}

/// A captured copy of (a prefix of) a function's configuration space.
///
/// Reads past the end of the captured bytes fail with
/// [`AccessError::OutOfBounds`]. This matches what Linux does for
/// unprivileged readers of a sysfs `config` file, which only expose the first
/// 64 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSpaceSnapshot {
    bytes: Vec<u8>,
}

impl ConfigSpaceSnapshot {
    /// Wraps the given bytes, starting at configuration space offset 0.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// The captured bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The number of captured bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read<T: FromBytes>(&self, offset: u16) -> Result<T, AccessError> {
        self.bytes
            .get(usize::from(offset)..)
            .and_then(|bytes| T::read_from_prefix(bytes).ok())
            .map(|(v, _)| v)
            .ok_or(AccessError::OutOfBounds {
                offset,
                width: size_of::<T>() as u8,
                len: self.bytes.len(),
            })
    }
}

impl ConfigSpaceAccess for ConfigSpaceSnapshot {
    fn read_u8(&self, offset: u16) -> Result<u8, AccessError> {
        self.read::<u8>(offset)
    }

    fn read_u16(&self, offset: u16) -> Result<u16, AccessError> {
        Ok(self.read::<U16>(offset)?.get())
    }

    fn read_u32(&self, offset: u16) -> Result<u32, AccessError> {
        Ok(self.read::<U32>(offset)?.get())
    }
}
