// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Loading PCI functions from Linux sysfs.
//!
//! Each function is a directory under `/sys/bus/pci/devices`, named by its
//! `DDDD:BB:DD.F` address, holding (among others) a binary `config` file and
//! a textual `resource` file with one `start end flags` line per resource.

use anyhow::Context;
use pci_discovery::ConfigSpaceSnapshot;
use pci_discovery::ResourceDescriptor;
use pci_discovery::ResourceFlags;
use std::path::Path;
use std::path::PathBuf;

const DEVICES_DIR: &str = "bus/pci/devices";

/// A PCI function's sysfs directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsDevice {
    pub address: String,
    pub path: PathBuf,
}

/// Normalizes a `DDDD:BB:DD.F` or `BB:DD.F` address, or returns `None` if
/// `s` is not one.
pub fn parse_address(s: &str) -> Option<String> {
    let (segment, rest) = match s.matches(':').count() {
        2 => s.split_once(':')?,
        1 => ("0000", s),
        _ => return None,
    };
    let (bus, rest) = rest.split_once(':')?;
    let (device, function) = rest.split_once('.')?;

    let hex = |field: &str, digits: usize| {
        (field.len() == digits && field.bytes().all(|b| b.is_ascii_hexdigit()))
            .then(|| u16::from_str_radix(field, 16).ok())
            .flatten()
    };
    let segment = hex(segment, 4)?;
    let bus = hex(bus, 2)?;
    let device = hex(device, 2).filter(|&d| d < 0x20)?;
    let function = hex(function, 1).filter(|&f| f < 8)?;
    Some(format!("{segment:04x}:{bus:02x}:{device:02x}.{function:x}"))
}

/// Resolves a command-line device argument: either a PCI address, looked up
/// under `sysfs_root`, or a path to a device directory.
pub fn resolve(sysfs_root: &Path, device: &str) -> anyhow::Result<SysfsDevice> {
    let (address, path) = match parse_address(device) {
        Some(address) => {
            let path = sysfs_root.join(DEVICES_DIR).join(&address);
            (address, path)
        }
        None => {
            let path = PathBuf::from(device);
            let address = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| device.to_owned());
            (address, path)
        }
    };
    anyhow::ensure!(
        path.is_dir(),
        "{} is not a PCI device directory",
        path.display()
    );
    Ok(SysfsDevice { address, path })
}

/// Lists every function under `sysfs_root`, in address order.
pub fn list(sysfs_root: &Path) -> anyhow::Result<Vec<SysfsDevice>> {
    let mut devices = Vec::new();
    for entry in fs_err::read_dir(sysfs_root.join(DEVICES_DIR))? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(address) = name.to_str().and_then(parse_address) else {
            tracing::debug!(name = %name.to_string_lossy(), "skipping non-device entry");
            continue;
        };
        devices.push(SysfsDevice {
            address,
            path: entry.path(),
        });
    }
    devices.sort_by(|a, b| a.address.cmp(&b.address));
    Ok(devices)
}

impl SysfsDevice {
    /// Reads the `config` file.
    ///
    /// Unprivileged readers only see the first 64 bytes.
    pub fn config(&self) -> anyhow::Result<ConfigSpaceSnapshot> {
        let bytes = fs_err::read(self.path.join("config"))?;
        tracing::debug!(address = %self.address, len = bytes.len(), "read config space");
        Ok(ConfigSpaceSnapshot::new(bytes))
    }

    /// Reads and parses the `resource` file. A missing file yields no
    /// resources.
    pub fn resources(&self) -> anyhow::Result<Vec<ResourceDescriptor>> {
        let path = self.path.join("resource");
        if !path.exists() {
            tracing::debug!(address = %self.address, "no resource file");
            return Ok(Vec::new());
        }
        let text = fs_err::read_to_string(&path)?;
        text.lines()
            .enumerate()
            .map(|(index, line)| {
                parse_resource_line(index, line)
                    .with_context(|| format!("{}:{}", path.display(), index + 1))
            })
            .collect()
    }

    /// Reads a hex ID file such as `vendor` or `device`.
    pub fn read_id(&self, name: &str) -> anyhow::Result<u16> {
        let text = fs_err::read_to_string(self.path.join(name))?;
        parse_hex_u16(text.trim()).with_context(|| format!("bad {name} id {:?}", text.trim()))
    }
}

/// Parses one `0xSTART 0xEND 0xFLAGS` line of a `resource` file.
pub fn parse_resource_line(index: usize, line: &str) -> anyhow::Result<ResourceDescriptor> {
    let mut fields = line.split_whitespace().map(|field| {
        let digits = field.strip_prefix("0x").unwrap_or(field);
        u64::from_str_radix(digits, 16).with_context(|| format!("bad field {field:?}"))
    });
    let mut next = || {
        fields
            .next()
            .context("expected three fields")
            .and_then(|r| r)
    };
    let start = next()?;
    let end = next()?;
    let flags = next()?;
    Ok(ResourceDescriptor {
        index,
        start,
        end,
        flags: ResourceFlags::from_bits(flags),
    })
}

/// Parses a hex ID, with or without a `0x` prefix.
pub fn parse_hex_u16(s: &str) -> Result<u16, std::num::ParseIntError> {
    u16::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16)
}
