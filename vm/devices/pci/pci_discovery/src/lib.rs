// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Read-only discovery of the capability structures exposed by a PCI/PCIe
//! function's configuration space.
//!
//! The crate walks the legacy capability list, the PCI Express extended
//! capability list, classifies BAR resources, and decodes the MSI-X
//! capability. All reads go through a caller-provided [`ConfigSpaceAccess`]
//! implementation, which is only borrowed for the duration of a pass.
//!
//! ```
//! use pci_discovery::ConfigSpaceSnapshot;
//! use pci_discovery::DiscoveryConfig;
//!
//! let mut bytes = vec![0u8; 256];
//! bytes[0..2].copy_from_slice(&0x10ecu16.to_le_bytes());
//! let snapshot = ConfigSpaceSnapshot::new(bytes);
//! let report = pci_discovery::discover(&snapshot, &[], &DiscoveryConfig::default()).unwrap();
//! assert!(report.capabilities.is_empty());
//! assert!(!report.pcie_present);
//! ```

#![forbid(unsafe_code)]

pub mod access;
pub mod bar;
pub mod discovery;
pub mod extended;
pub mod identity;
pub mod legacy;
pub mod msix;
pub mod names;
pub mod report;
pub mod spec;

mod visited;

#[cfg(test)]
mod test_helpers;

pub use access::AccessError;
pub use access::ConfigSpaceAccess;
pub use access::ConfigSpaceSnapshot;
pub use bar::BarDescriptor;
pub use bar::BarKind;
pub use bar::ResourceDescriptor;
pub use bar::ResourceFlags;
pub use discovery::DiscoveryConfig;
pub use discovery::DiscoveryReport;
pub use discovery::ErrorPolicy;
pub use discovery::discover;
pub use extended::ExtendedCapabilityRecord;
pub use legacy::CapabilityRecord;
pub use msix::MsixInfo;
pub use names::CapabilityName;

use thiserror::Error;

/// An error that aborts a discovery pass.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A configuration space read failed, or returned the all-ones sentinel
    /// where a capability ID was expected.
    #[error("config space access failed at offset {offset:#05x}")]
    AccessFailure {
        /// The offset being read.
        offset: u16,
        /// The underlying accessor error.
        #[source]
        source: AccessError,
    },
    /// A next-capability pointer led back to an offset already visited in the
    /// same walk.
    #[error("capability list loops back to offset {offset:#05x}")]
    CyclicList {
        /// The revisited offset.
        offset: u16,
    },
    /// The vendor ID reads as all-ones, so no function is present.
    #[error("no device present (vendor id reads 0xffff)")]
    NoDevice,
}

impl DiscoveryError {
    pub(crate) fn access(offset: u16) -> impl FnOnce(AccessError) -> Self {
        move |source| Self::AccessFailure { offset, source }
    }
}
