// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Human-readable rendering of a [`DiscoveryReport`].
//!
//! The walkers themselves never log. Callers that want a record of a pass
//! either format the report with [`Display`](fmt::Display), or emit it as
//! structured `tracing` events with [`DiscoveryReport::trace`].

use crate::BarDescriptor;
use crate::BarKind;
use crate::DiscoveryReport;
use crate::MsixInfo;
use std::fmt;

impl DiscoveryReport {
    /// Emits one `info` event per discovered record.
    pub fn trace(&self) {
        let ids = &self.identity.ids;
        tracing::info!(
            vendor_id = format_args!("{:#06x}", ids.vendor_id),
            device_id = format_args!("{:#06x}", ids.device_id),
            revision_id = ids.revision_id,
            class = %ids.base_class,
            "pci function"
        );

        if self.capabilities.is_empty() {
            tracing::info!("no capabilities");
        }
        for cap in &self.capabilities {
            tracing::info!(
                offset = format_args!("{:#04x}", cap.offset),
                id = ?cap.id,
                name = %cap.name,
                "capability"
            );
        }
        tracing::info!(pcie_present = self.pcie_present, "pci express");

        for cap in self.extended.iter().flatten() {
            tracing::info!(
                offset = format_args!("{:#05x}", cap.offset),
                id = ?cap.id,
                version = cap.version,
                name = %cap.name,
                "extended capability"
            );
        }

        for bar in &self.bars {
            tracing::info!(
                index = bar.index,
                kind = ?bar.kind,
                start = format_args!("{:#x}", bar.start),
                len = bar.len,
                "bar"
            );
        }

        match &self.msix {
            Some(msix) => tracing::info!(
                offset = format_args!("{:#04x}", msix.capability_offset),
                control = format_args!("{:#06x}", msix.control),
                table = format_args!("{:#06x}", msix.table_offset_and_bir),
                pba = format_args!("{:#06x}", msix.pba_offset_and_bir),
                "msi-x"
            ),
            None => tracing::info!("no msi-x capability"),
        }

        if let Some(truncated) = &self.truncated {
            tracing::warn!(
                stage = ?truncated.stage,
                error = &truncated.error as &dyn std::error::Error,
                "discovery truncated"
            );
        }
    }
}

impl fmt::Display for DiscoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids = &self.identity.ids;
        writeln!(
            f,
            "{:04x}:{:04x} rev {:02x} class {} ({:02x}/{:02x})",
            ids.vendor_id,
            ids.device_id,
            ids.revision_id,
            ids.base_class,
            ids.sub_class,
            ids.prog_if,
        )?;

        writeln!(f, "capabilities:")?;
        if self.capabilities.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for cap in &self.capabilities {
            writeln!(f, "  [{:#04x}] {:#04x} {}", cap.offset, cap.id.0, cap.name)?;
        }
        writeln!(
            f,
            "pci express: {}",
            if self.pcie_present { "yes" } else { "no" }
        )?;

        if let Some(extended) = &self.extended {
            writeln!(f, "extended capabilities:")?;
            if extended.is_empty() {
                writeln!(f, "  (none)")?;
            }
            for cap in extended {
                writeln!(
                    f,
                    "  [{:#05x}] {:#06x} v{} {}",
                    cap.offset, cap.id.0, cap.version, cap.name
                )?;
            }
        }

        if !self.bars.is_empty() {
            writeln!(f, "bars:")?;
            for bar in &self.bars {
                writeln!(f, "  {bar}")?;
            }
        }

        match &self.msix {
            Some(msix) => writeln!(f, "{msix}")?,
            None => writeln!(f, "msi-x: absent")?,
        }

        if let Some(truncated) = &self.truncated {
            writeln!(
                f,
                "truncated: {:?} stopped: {}",
                truncated.stage, truncated.error
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for BarDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bar{}: ", self.index)?;
        match self.kind {
            BarKind::Unpopulated => return f.write_str("unpopulated"),
            BarKind::Memory => f.write_str("memory")?,
            BarKind::Io => f.write_str("i/o")?,
            BarKind::Unknown => f.write_str("unknown")?,
        }
        write!(f, " {:#x} ({:#x} bytes)", self.start, self.len)?;
        if self.is_64bit {
            f.write_str(" 64-bit")?;
        }
        if self.prefetchable {
            f.write_str(" prefetchable")?;
        }
        Ok(())
    }
}

impl fmt::Display for MsixInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let control = self.control();
        write!(
            f,
            "msi-x: at {:#04x}, {} entries{}{}, table bar{}+{:#x}, pba bar{}+{:#x}",
            self.capability_offset,
            self.table_len(),
            if control.enable() { ", enabled" } else { "" },
            if control.function_mask() {
                ", masked"
            } else {
                ""
            },
            self.table_bir(),
            self.table_offset(),
            self.pba_bir(),
            self.pba_offset(),
        )
    }
}
