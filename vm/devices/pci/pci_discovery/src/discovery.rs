// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A complete discovery pass over one function.

use crate::BarDescriptor;
use crate::CapabilityRecord;
use crate::ConfigSpaceAccess;
use crate::DiscoveryError;
use crate::ExtendedCapabilityRecord;
use crate::MsixInfo;
use crate::ResourceDescriptor;
use crate::bar::classify_bars;
use crate::extended::ExtendedCapabilityWalk;
use crate::identity::DeviceIdentity;
use crate::legacy::CapabilityWalk;
use crate::spec::caps::CapabilityId;
use serde::Serialize;
use serde::Serializer;

/// What to do when a walk fails part way through.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Fail the whole pass. A partial capability list is misleading, so this
    /// is the default.
    #[default]
    Discard,
    /// Keep what was gathered before the failure, record the failure in
    /// [`DiscoveryReport::truncated`], and skip the remaining walks.
    KeepPartial,
}

/// Options for a discovery pass.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Walk the extended capability list of PCI Express functions.
    pub walk_extended: bool,
    /// Decode the MSI-X capability, if present.
    pub decode_msix: bool,
    /// How to handle a failing walk.
    pub error_policy: ErrorPolicy,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            walk_extended: true,
            decode_msix: true,
            error_policy: ErrorPolicy::Discard,
        }
    }
}

/// The stage of a pass that failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// The legacy capability walk.
    Capabilities,
    /// The extended capability walk.
    ExtendedCapabilities,
    /// Reading the MSI-X registers.
    Msix,
}

/// A failure kept under [`ErrorPolicy::KeepPartial`].
#[derive(Debug, Serialize)]
pub struct Truncation {
    /// Where the pass stopped.
    pub stage: Stage,
    /// Why it stopped.
    #[serde(serialize_with = "serialize_error")]
    pub error: DiscoveryError,
}

fn serialize_error<S: Serializer>(error: &DiscoveryError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

/// Everything discovered about one function.
#[derive(Debug, Serialize)]
pub struct DiscoveryReport {
    /// The function's identifying registers.
    pub identity: DeviceIdentity,
    /// The legacy capabilities, in list order.
    pub capabilities: Vec<CapabilityRecord>,
    /// Whether the legacy list contains a PCI Express capability.
    pub pcie_present: bool,
    /// The extended capabilities, in list order, or `None` if the extended
    /// list was not walked.
    pub extended: Option<Vec<ExtendedCapabilityRecord>>,
    /// One classification per resource descriptor.
    pub bars: Vec<BarDescriptor>,
    /// The MSI-X registers, if the function has an MSI-X capability and
    /// decoding was requested.
    pub msix: Option<MsixInfo>,
    /// Set if a walk failed under [`ErrorPolicy::KeepPartial`].
    pub truncated: Option<Truncation>,
}

struct Pass {
    policy: ErrorPolicy,
    truncated: Option<Truncation>,
}

impl Pass {
    /// Collects a walk under the pass's error policy. Returns `None` if an
    /// earlier stage was truncated.
    fn collect<T>(
        &mut self,
        stage: Stage,
        walk: impl Iterator<Item = Result<T, DiscoveryError>>,
    ) -> Result<Option<Vec<T>>, DiscoveryError> {
        if self.truncated.is_some() {
            return Ok(None);
        }
        let mut records = Vec::new();
        for record in walk {
            match record {
                Ok(record) => records.push(record),
                Err(error) => self.fail(stage, error)?,
            }
        }
        Ok(Some(records))
    }

    fn fail(&mut self, stage: Stage, error: DiscoveryError) -> Result<(), DiscoveryError> {
        match self.policy {
            ErrorPolicy::Discard => Err(error),
            ErrorPolicy::KeepPartial => {
                self.truncated = Some(Truncation { stage, error });
                Ok(())
            }
        }
    }
}

/// Runs a discovery pass over one function.
///
/// Reads the header, walks the legacy capability list, walks the extended
/// list if the function is PCI Express, classifies `resources`, and decodes
/// MSI-X. The accessor is only borrowed for the duration of the call, and
/// nothing is written to configuration space, so the pass may be repeated
/// freely.
pub fn discover(
    access: impl ConfigSpaceAccess,
    resources: &[ResourceDescriptor],
    config: &DiscoveryConfig,
) -> Result<DiscoveryReport, DiscoveryError> {
    let identity = DeviceIdentity::read(&access)?;
    let mut pass = Pass {
        policy: config.error_policy,
        truncated: None,
    };

    let mut walk = CapabilityWalk::new(&access);
    let capabilities = pass
        .collect(Stage::Capabilities, walk.by_ref())?
        .unwrap_or_default();
    let pcie_present = walk.pcie_present();

    let extended = if config.walk_extended && pcie_present {
        pass.collect(
            Stage::ExtendedCapabilities,
            ExtendedCapabilityWalk::new(&access),
        )?
    } else {
        None
    };

    let bars = classify_bars(resources);

    let mut msix = None;
    if config.decode_msix
        && pass.truncated.is_none()
        && let Some(cap) = capabilities.iter().find(|r| r.id == CapabilityId::MSIX)
    {
        match MsixInfo::read(&access, cap.offset) {
            Ok(info) => msix = Some(info),
            Err(error) => pass.fail(Stage::Msix, error)?,
        }
    }

    Ok(DiscoveryReport {
        identity,
        capabilities,
        pcie_present,
        extended,
        bars,
        msix,
        truncated: pass.truncated,
    })
}
