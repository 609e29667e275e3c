// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Types and constants specified by the PCI and PCI Express specs.
//!
//! This module MUST NOT contain any vendor-specific constants!

/// Defines a newtype over an integer with named associated constants, which
/// (unlike a Rust `enum`) can hold any value of the underlying type.
///
/// Unnamed values are formatted as their raw hex value.
macro_rules! open_enum {
    (
        $(#[$a:meta])*
        $vis:vis enum $name:ident: $ty:ty {
            $(
                $(#[$va:meta])*
                $variant:ident = $value:expr,
            )*
        }
    ) => {
        $(#[$a])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
        #[serde(transparent)]
        $vis struct $name(pub $ty);

        impl $name {
            $(
                $(#[$va])*
                pub const $variant: Self = Self($value);
            )*
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match *self {
                    $(Self::$variant => f.pad(stringify!($variant)),)*
                    Self(v) => write!(f, "{:#x}", v),
                }
            }
        }

        impl From<$ty> for $name {
            fn from(v: $ty) -> Self {
                Self(v)
            }
        }

        impl From<$name> for $ty {
            fn from(v: $name) -> Self {
                v.0
            }
        }
    };
}

pub mod hwid {
    //! Hardware ID types and constants

    use core::fmt;
    use serde::Serialize;

    /// The hard-coded hardware IDs of a PCI function, as reflected in its
    /// configuration space registers.
    ///
    /// See PCI 2.3 Spec - 6.2.1 for details on each of these fields.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
    pub struct HardwareIds {
        /// Vendor ID (offset 0x00).
        pub vendor_id: u16,
        /// Device ID (offset 0x02).
        pub device_id: u16,
        /// Revision ID (offset 0x08).
        pub revision_id: u8,
        /// Programming interface (offset 0x09).
        pub prog_if: u8,
        /// Subclass (offset 0x0A).
        pub sub_class: u8,
        /// Base class (offset 0x0B).
        pub base_class: ClassCode,
    }

    open_enum! {
        /// ClassCode identifies the PCI device's type.
        ///
        /// Values pulled from <https://wiki.osdev.org/PCI#Class_Codes>.
        pub enum ClassCode: u8 {
            /// Unclassified
            UNCLASSIFIED = 0x00,
            /// Mass storage controller
            MASS_STORAGE_CONTROLLER = 0x01,
            /// Network controller
            NETWORK_CONTROLLER = 0x02,
            /// Display controller
            DISPLAY_CONTROLLER = 0x03,
            /// Multimedia controller
            MULTIMEDIA_CONTROLLER = 0x04,
            /// Memory controller
            MEMORY_CONTROLLER = 0x05,
            /// Bridge
            BRIDGE = 0x06,
            /// Simple communication controller
            SIMPLE_COMMUNICATION_CONTROLLER = 0x07,
            /// Base system peripheral
            BASE_SYSTEM_PERIPHERAL = 0x08,
            /// Input device controller
            INPUT_DEVICE_CONTROLLER = 0x09,
            /// Docking station
            DOCKING_STATION = 0x0A,
            /// Processor
            PROCESSOR = 0x0B,
            /// Serial bus controller
            SERIAL_BUS_CONTROLLER = 0x0C,
            /// Wireless controller
            WIRELESS_CONTROLLER = 0x0D,
            /// Intelligent controller
            INTELLIGENT_CONTROLLER = 0x0E,
            /// Satellite communication controller
            SATELLITE_COMMUNICATION_CONTROLLER = 0x0F,
            /// Encryption controller
            ENCRYPTION_CONTROLLER = 0x10,
            /// Signal processing controller
            SIGNAL_PROCESSING_CONTROLLER = 0x11,
            /// Processing accelerator
            PROCESSING_ACCELERATOR = 0x12,
            /// Non-essential instrumentation
            NONESSENTIAL_INSTRUMENTATION = 0x13,
            // 0x14 - 0x3F: Reserved
            /// Co-processor
            CO_PROCESSOR = 0x40,
            // 0x41 - 0xFE: Reserved
            /// Vendor specific
            UNASSIGNED = 0xFF,
        }
    }

    impl ClassCode {
        /// Returns true if the class code falls in one of the reserved ranges.
        pub fn is_reserved(&self) -> bool {
            let c = &self.0;
            (0x14..=0x3f).contains(c) || (0x41..=0xfe).contains(c)
        }
    }

    impl fmt::Display for ClassCode {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            if self.is_reserved() {
                return write!(f, "RESERVED({:#04x})", self.0);
            }
            fmt::Debug::fmt(self, f)
        }
    }
}

/// Configuration Space
///
/// Sources: PCI 2.3 Spec - Chapter 6
#[expect(missing_docs)] // primarily enums/structs with self-explanatory variants
pub mod cfg_space {
    use bitfield_struct::bitfield;

    /// Size of the conventional PCI configuration space.
    pub const CONFIG_SPACE_SIZE: u16 = 0x100;

    /// Size of the PCI Express extended configuration space.
    pub const EXTENDED_CONFIG_SPACE_SIZE: u16 = 0x1000;

    /// Offsets into the type 00h configuration space header that discovery
    /// reads.
    ///
    /// | Offset | Bits 31-24                 | Bits 23-16  | Bits 15-8           | Bits 7-0             |
    /// |--------|----------------------------|-------------|---------------------|--------------------- |
    /// | 0x0    | Device ID                  |             | Vendor ID           |                      |
    /// | 0x4    | Status                     |             | Command             |                      |
    /// | 0x8    | Class code                 |             |                     | Revision ID          |
    /// | 0xC    | BIST                       | Header type | Latency Timer       | Cache Line Size      |
    /// | 0x10   | Base address #0 (BAR0)     |             |                     |                      |
    /// | ...    |                            |             |                     |                      |
    /// | 0x34   | Reserved                   |             |                     | Capabilities Pointer |
    pub mod offset {
        pub const VENDOR_ID: u16 = 0x00;
        pub const DEVICE_ID: u16 = 0x02;
        pub const COMMAND: u16 = 0x04;
        pub const STATUS: u16 = 0x06;
        pub const REVISION_ID: u16 = 0x08;
        pub const PROG_IF: u16 = 0x09;
        pub const SUB_CLASS: u16 = 0x0A;
        pub const BASE_CLASS: u16 = 0x0B;
        pub const HEADER_TYPE: u16 = 0x0E;
        pub const BAR0: u16 = 0x10;
        pub const CAPABILITIES_POINTER: u16 = 0x34;
    }

    /// Command Register
    #[bitfield(u16)]
    #[derive(PartialEq, Eq)]
    pub struct Command {
        pub pio_enabled: bool,
        pub mmio_enabled: bool,
        pub bus_master: bool,
        pub special_cycles: bool,
        pub enable_memory_write_invalidate: bool,
        pub vga_palette_snoop: bool,
        pub parity_error_response: bool,
        /// must be 0
        #[bits(1)]
        _reserved: u16,
        pub enable_serr: bool,
        pub enable_fast_b2b: bool,
        pub intx_disable: bool,
        #[bits(5)]
        _reserved2: u16,
    }

    /// Status Register
    #[bitfield(u16)]
    #[derive(PartialEq, Eq)]
    pub struct Status {
        #[bits(3)]
        _reserved: u16,
        pub interrupt_status: bool,
        pub capabilities_list: bool,
        pub capable_mhz_66: bool,
        _reserved2: bool,
        pub capable_fast_b2b: bool,
        pub err_master_parity: bool,
        #[bits(2)]
        pub devsel: u8,
        pub abort_target_signaled: bool,
        pub abort_target_received: bool,
        pub abort_master_received: bool,
        pub err_signaled: bool,
        pub err_detected_parity: bool,
    }

    /// Header Type register
    #[bitfield(u8)]
    #[derive(PartialEq, Eq)]
    pub struct HeaderType {
        /// 0x00 for endpoints, 0x01 for PCI-to-PCI bridges, 0x02 for
        /// CardBus bridges.
        #[bits(7)]
        pub layout: u8,
        pub multi_function: bool,
    }
}

/// Capabilities
pub mod caps {
    use bitfield_struct::bitfield;

    open_enum! {
        /// Capability IDs
        ///
        /// Sources: PCI 3.0 Spec - Appendix H
        ///
        /// NOTE: this is a non-exhaustive list of named constants. Display
        /// names for every defined ID live in [`crate::names`].
        pub enum CapabilityId: u8 {
            /// Null capability
            NULL               = 0x00,
            /// PCI Power Management Interface
            POWER_MANAGEMENT   = 0x01,
            /// Message Signaled Interrupts
            MSI                = 0x05,
            /// Vendor-specific
            VENDOR_SPECIFIC    = 0x09,
            /// PCI Express
            PCI_EXPRESS        = 0x10,
            /// MSI-X
            MSIX               = 0x11,
            /// Flattening Portal Bridge, the highest defined ID
            FLATTENING_PORTAL_BRIDGE = 0x15,
        }
    }

    /// Offsets of the two bytes common to every legacy capability header.
    ///
    /// | Offset    | Bits 15-8    | Bits 7-0      |
    /// |-----------|--------------|---------------|
    /// | Cap + 0x0 | Next Pointer | Capability ID |
    pub mod header {
        /// Capability ID byte.
        pub const ID: u16 = 0x00;
        /// Next capability pointer byte.
        pub const NEXT: u16 = 0x01;
        /// The bottom two bits of a capability pointer are reserved.
        pub const POINTER_MASK: u8 = 0xFC;
    }

    /// MSI-X
    #[expect(missing_docs)] // primarily enums/structs with self-explanatory variants
    pub mod msix {
        use super::bitfield;

        /// Offsets into the MSI-X Capability structure
        ///
        /// Table pulled from <https://wiki.osdev.org/PCI>
        ///
        /// | Offset    | Bits 31-24         | Bits 23-16 | Bits 15-8    | Bits 7-3             | Bits 2-0 |
        /// |-----------|--------------------|------------|--------------|----------------------|----------|
        /// | Cap + 0x0 | Message Control    |            | Next Pointer | Capability ID (0x11) |          |
        /// | Cap + 0x4 | Table Offset       |            |              |                      | BIR      |
        /// | Cap + 0x8 | Pending Bit Offset |            |              |                      | BIR      |
        pub mod offset {
            pub const CONTROL: u16 = 0x02;
            pub const TABLE: u16 = 0x04;
            pub const PBA: u16 = 0x08;
        }

        /// Mask selecting the BAR Indicator Register from a table or PBA
        /// offset field.
        pub const BIR_MASK: u16 = 0x7;

        /// MSI-X Message Control register
        #[bitfield(u16)]
        #[derive(PartialEq, Eq)]
        pub struct MsixControl {
            /// Number of table entries, minus one.
            #[bits(11)]
            pub table_size: u16,
            #[bits(3)]
            _reserved: u8,
            pub function_mask: bool,
            pub enable: bool,
        }
    }
}

/// PCI Express extended capabilities
///
/// Sources: PCI Express Base Spec - Section 7.6
pub mod ext_caps {
    use bitfield_struct::bitfield;

    /// Offset of the first extended capability header.
    pub const EXTENDED_CAPABILITY_BASE: u16 = 0x100;

    /// The low two bits of a next pointer are reserved.
    pub const NEXT_POINTER_MASK: u16 = 0xFFC;

    open_enum! {
        /// Extended Capability IDs
        ///
        /// NOTE: this is a non-exhaustive list of named constants. Display
        /// names for every defined ID live in [`crate::names`].
        pub enum ExtendedCapabilityId: u16 {
            /// Null capability
            NULL                        = 0x0000,
            /// Advanced Error Reporting
            ADVANCED_ERROR_REPORTING    = 0x0001,
            /// Device Serial Number
            DEVICE_SERIAL_NUMBER        = 0x0003,
            /// Vendor-Specific Extended Capability
            VENDOR_SPECIFIC             = 0x000B,
            /// Single Root I/O Virtualization
            SRIOV                       = 0x0010,
            /// Latency Tolerance Reporting
            LATENCY_TOLERANCE_REPORTING = 0x0018,
            /// L1 PM Substates
            L1_PM_SUBSTATES             = 0x001E,
            /// System Firmware Intermediary, the highest defined ID
            SYSTEM_FIRMWARE_INTERMEDIARY = 0x002C,
        }
    }

    /// Extended capability header.
    ///
    /// | Bits 31-20             | Bits 19-16 | Bits 15-0     |
    /// |------------------------|------------|---------------|
    /// | Next Capability Offset | Version    | Capability ID |
    #[bitfield(u32)]
    #[derive(PartialEq, Eq)]
    pub struct ExtendedCapabilityHeader {
        /// Capability ID.
        pub id: u16,
        /// Capability structure version.
        #[bits(4)]
        pub version: u8,
        /// Offset of the next capability, or zero.
        #[bits(12)]
        pub next: u16,
    }
}
