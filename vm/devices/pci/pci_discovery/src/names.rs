// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Human-readable names for legacy and extended capability IDs.
//!
//! Each table covers every defined ID `0..=N` and ends with a single
//! `"Reserved"` entry at index `N + 1`. Lookups for IDs above `N` resolve to
//! [`CapabilityName::Reserved`] rather than indexing past the table.

use crate::spec::caps::CapabilityId;
use crate::spec::ext_caps::ExtendedCapabilityId;
use serde::Serialize;
use std::fmt;

const LEGACY_NAMES: [&str; 23] = [
    "Null Capability",
    "PCI Power Management Interface",
    "Accelerated Graphics Port",
    "Vital Product Data",
    "Slot Identification",
    "Message Signaled Interrupt",
    "CompactPCI Hot Swap",
    "PCI-X",
    "HyperTransport",
    "Vendor-Specific",
    "Debug Port",
    "CompactPCI Central Resource Control",
    "PCI Hot-Plug",
    "PCI Bridge Subsystem Vendor ID",
    "AGP 8x",
    "Secure Device",
    "PCI Express",
    "MSI-X",
    "Serial ATA Data/Index Configuration",
    "Advanced Features",
    "Enhanced Allocation",
    "Flattening Portal Bridge",
    "Reserved",
];

const EXTENDED_NAMES: [&str; 46] = [
    "Null Capability",
    "Advanced Error Reporting",
    "Virtual Channel",
    "Device Serial Number",
    "Power Budgeting",
    "Root Complex Link Declaration",
    "Root Complex Internal Link Control",
    "Root Complex Event Collector Endpoint Association",
    "Multi-Function Virtual Channel",
    "Virtual Channel (MFVC present)",
    "Root Complex Register Block Header",
    "Vendor-Specific Extended Capability",
    "Configuration Access Correlation",
    "Access Control Services",
    "Alternative Routing-ID Interpretation",
    "Address Translation Services",
    "Single Root I/O Virtualization",
    "Multi-Root I/O Virtualization",
    "Multicast",
    "Page Request Interface",
    "Reserved for AMD",
    "Resizable BAR",
    "Dynamic Power Allocation",
    "TPH Requester",
    "Latency Tolerance Reporting",
    "Secondary PCI Express",
    "Protocol Multiplexing",
    "Process Address Space ID",
    "LN Requester",
    "Downstream Port Containment",
    "L1 PM Substates",
    "Precision Time Measurement",
    "PCI Express over M-PHY",
    "FRS Queueing",
    "Readiness Time Reporting",
    "Designated Vendor-Specific Extended Capability",
    "VF Resizable BAR",
    "Data Link Feature",
    "Physical Layer 16.0 GT/s",
    "Lane Margining at the Receiver",
    "Hierarchy ID",
    "Native PCIe Enclosure Management",
    "Physical Layer 32.0 GT/s",
    "Alternate Protocol",
    "System Firmware Intermediary",
    "Reserved",
];

const LEGACY_RESERVED: usize = LEGACY_NAMES.len() - 1;
const EXTENDED_RESERVED: usize = EXTENDED_NAMES.len() - 1;

const _: () = assert!(LEGACY_RESERVED == CapabilityId::FLATTENING_PORTAL_BRIDGE.0 as usize + 1);
const _: () = assert!(
    EXTENDED_RESERVED == ExtendedCapabilityId::SYSTEM_FIRMWARE_INTERMEDIARY.0 as usize + 1
);

/// The name of a capability ID, or the reserved placeholder for IDs past the
/// end of the table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CapabilityName {
    /// A defined capability.
    Known(&'static str),
    /// An ID beyond the highest one defined.
    Reserved,
}

impl CapabilityName {
    /// The display string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityName::Known(name) => name,
            CapabilityName::Reserved => LEGACY_NAMES[LEGACY_RESERVED],
        }
    }

    /// Returns true for the reserved placeholder.
    pub fn is_reserved(&self) -> bool {
        matches!(self, CapabilityName::Reserved)
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl Serialize for CapabilityName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

fn lookup(table: &'static [&'static str], id: usize) -> CapabilityName {
    let reserved = table.len() - 1;
    if id < reserved {
        CapabilityName::Known(table[id])
    } else {
        CapabilityName::Reserved
    }
}

/// Resolves a legacy capability ID to its name.
pub fn capability_name(id: CapabilityId) -> CapabilityName {
    lookup(&LEGACY_NAMES, id.0.into())
}

/// Resolves a PCI Express extended capability ID to its name.
pub fn extended_capability_name(id: ExtendedCapabilityId) -> CapabilityName {
    lookup(&EXTENDED_NAMES, id.0.into())
}
