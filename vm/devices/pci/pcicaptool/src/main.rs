// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Command-line utility that reports the capabilities of PCI functions, as
//! exposed by Linux sysfs.

#![forbid(unsafe_code)]

mod sysfs;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use pci_discovery::DiscoveryConfig;
use pci_discovery::DiscoveryReport;
use pci_discovery::ErrorPolicy;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use sysfs::SysfsDevice;
use sysfs::parse_hex_u16;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "pcicaptool",
    about = "Report the capabilities of PCI functions",
    version,
    long_about = None,
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Don't walk the PCI Express extended capability list
    #[arg(long, global = true)]
    no_extended: bool,

    /// Keep the records found before a walk fails, instead of failing
    #[arg(long, global = true)]
    keep_partial: bool,

    /// Where sysfs is mounted
    #[arg(long, global = true, value_name = "DIR", default_value = "/sys")]
    sysfs_root: PathBuf,

    /// Log every discovered record to stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report a single function
    Show {
        /// A `DDDD:BB:DD.F` address, or a sysfs device directory
        device: String,
    },
    /// Report every function, optionally filtered by ID
    Scan {
        /// Only report functions with this vendor ID (hex)
        #[arg(long, value_name = "HEX", value_parser = parse_hex_u16)]
        vendor: Option<u16>,

        /// Only report functions with this device ID (hex)
        #[arg(long, value_name = "HEX", value_parser = parse_hex_u16)]
        device: Option<u16>,
    },
}

impl Cli {
    fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            walk_extended: !self.no_extended,
            error_policy: if self.keep_partial {
                ErrorPolicy::KeepPartial
            } else {
                ErrorPolicy::Discard
            },
            ..Default::default()
        }
    }
}

#[derive(Serialize)]
struct Entry<'a> {
    address: &'a str,
    #[serde(flatten)]
    report: &'a DiscoveryReport,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn discover(device: &SysfsDevice, config: &DiscoveryConfig) -> anyhow::Result<DiscoveryReport> {
    let snapshot = device.config()?;
    let resources = device.resources()?;
    let report = pci_discovery::discover(&snapshot, &resources, config).with_context(|| {
        format!(
            "failed to discover {} ({} config bytes readable)",
            device.address,
            snapshot.len()
        )
    })?;
    let _span = tracing::info_span!("device", address = %device.address).entered();
    report.trace();
    Ok(report)
}

fn matches_ids(device: &SysfsDevice, vendor: Option<u16>, device_id: Option<u16>) -> bool {
    let check = |name: &str, want: Option<u16>| match want {
        None => true,
        Some(want) => match device.read_id(name) {
            Ok(id) => id == want,
            Err(err) => {
                tracing::debug!(address = %device.address, error = %format!("{err:#}"), "skipping");
                false
            }
        },
    };
    check("vendor", vendor) && check("device", device_id)
}

fn run(cli: &Cli, out: &mut impl Write) -> anyhow::Result<()> {
    let config = cli.discovery_config();
    let mut entries = Vec::new();
    match &cli.command {
        Command::Show { device } => {
            let device = sysfs::resolve(&cli.sysfs_root, device)?;
            let report = discover(&device, &config)?;
            entries.push((device, report));
        }
        Command::Scan { vendor, device } => {
            for dev in sysfs::list(&cli.sysfs_root)? {
                if !matches_ids(&dev, *vendor, *device) {
                    continue;
                }
                match discover(&dev, &config) {
                    Ok(report) => entries.push((dev, report)),
                    Err(err) => tracing::warn!(error = %format!("{err:#}"), "skipping device"),
                }
            }
        }
    }

    if cli.json {
        let entries: Vec<_> = entries
            .iter()
            .map(|(device, report)| Entry {
                address: &device.address,
                report,
            })
            .collect();
        match (&cli.command, entries.as_slice()) {
            (Command::Show { .. }, [entry]) => serde_json::to_writer_pretty(&mut *out, entry)?,
            _ => serde_json::to_writer_pretty(&mut *out, &entries)?,
        }
        writeln!(out)?;
    } else {
        for (i, (device, report)) in entries.iter().enumerate() {
            if i > 0 {
                writeln!(out)?;
            }
            writeln!(out, "{}", device.address)?;
            write!(out, "{report}")?;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(&cli, &mut std::io::stdout().lock())
}
