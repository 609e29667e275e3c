// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! BAR resource classification.
//!
//! The platform describes each of a function's resources (BARs, expansion
//! ROM, bridge windows, ...) with a start, an end and a set of flags. This
//! module sorts them into memory-mapped, I/O-mapped, unpopulated or unknown.

use bitfield_struct::bitfield;
use serde::Serialize;

/// Resource flags, in the layout Linux uses for `IORESOURCE_*`.
///
/// These are the flags reported in the third column of a sysfs `resource`
/// file.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct ResourceFlags {
    /// Bus-specific bits.
    #[bits(8)]
    pub bus_specific: u8,
    /// I/O port space.
    pub io: bool,
    /// Memory space.
    pub mem: bool,
    /// Interrupt.
    pub irq: bool,
    /// DMA channel.
    pub dma: bool,
    /// Bus number range.
    pub bus: bool,
    /// Prefetchable memory.
    pub prefetch: bool,
    /// Read-only.
    pub readonly: bool,
    /// Cacheable.
    pub cacheable: bool,
    #[bits(4)]
    _alignment: u8,
    /// 64-bit memory BAR.
    pub mem_64: bool,
    /// Bridge forwarding window.
    pub window: bool,
    #[bits(5)]
    _reserved: u8,
    /// Userland may not map this resource.
    pub exclusive: bool,
    /// Disabled.
    pub disabled: bool,
    /// No address has been assigned yet.
    pub unset: bool,
    /// Automatically assigned.
    pub auto: bool,
    /// Claimed by a driver.
    pub busy: bool,
    #[bits(32)]
    _reserved2: u32,
}

/// One of a function's resource descriptors, as reported by the platform.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// The resource index (0-5 for BARs on most platforms).
    pub index: usize,
    /// First address of the resource.
    pub start: u64,
    /// Last address of the resource (inclusive).
    pub end: u64,
    /// The resource flags.
    pub flags: ResourceFlags,
}

impl ResourceDescriptor {
    /// The size of the resource in bytes, or zero if it is unassigned.
    ///
    /// A resource spanning the whole 64-bit space reports `u64::MAX`.
    pub fn len(&self) -> u64 {
        if self.end < self.start || (self.start == 0 && self.end == 0) {
            0
        } else {
            (self.end - self.start).saturating_add(1)
        }
    }
}

/// The address space a BAR decodes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BarKind {
    /// Memory-mapped.
    Memory,
    /// I/O-mapped.
    Io,
    /// No flags at all; nothing is behind this index.
    Unpopulated,
    /// Flags are set, but neither the memory nor the I/O flag.
    Unknown,
}

impl BarKind {
    /// Classifies a resource by its flags.
    pub fn classify(flags: ResourceFlags) -> Self {
        if flags.into_bits() == 0 {
            BarKind::Unpopulated
        } else if flags.mem() {
            BarKind::Memory
        } else if flags.io() {
            BarKind::Io
        } else {
            BarKind::Unknown
        }
    }
}

/// A classified resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct BarDescriptor {
    /// The resource index.
    pub index: usize,
    /// The classification.
    pub kind: BarKind,
    /// First address of the resource.
    pub start: u64,
    /// Size of the resource in bytes.
    pub len: u64,
    /// Whether the memory is prefetchable.
    pub prefetchable: bool,
    /// Whether this is a 64-bit memory BAR.
    pub is_64bit: bool,
}

impl From<&ResourceDescriptor> for BarDescriptor {
    fn from(resource: &ResourceDescriptor) -> Self {
        let kind = BarKind::classify(resource.flags);
        let is_memory = kind == BarKind::Memory;
        Self {
            index: resource.index,
            kind,
            start: resource.start,
            len: resource.len(),
            prefetchable: is_memory && resource.flags.prefetch(),
            is_64bit: is_memory && resource.flags.mem_64(),
        }
    }
}

/// Classifies every resource, in order. Never fails: every descriptor yields
/// exactly one [`BarDescriptor`].
pub fn classify_bars(resources: &[ResourceDescriptor]) -> Vec<BarDescriptor> {
    resources.iter().map(BarDescriptor::from).collect()
}
