//! The RAID segment type family.
//!
//! Every level and layout variant (raid1, raid4, raid5 and its four
//! rotations, raid6 and its three rotations) shares one implementation; the
//! variants differ only in name, parity device count and whether their
//! areas are mirrors of each other.

mod status;
mod target;
#[cfg(test)]
mod target_tests;
mod text;

use std::fmt;
use std::str::FromStr;

use tracing::debug;

pub use status::{DevHealth, RaidStatus, parse_sync_fraction};

use crate::activate::{CmdContext, TargetNode};
use crate::config::{ConfigNode, Formatter};
use crate::error::{Error, Result};
use crate::metadata::{Segment, VolumeLookup};
use crate::percent::{Percent, PercentTotals};
use crate::segtype::{SegTypeFlags, SegmentType};

/// Kernel target and module name shared by the whole family.
pub const RAID_TARGET: &str = "raid";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RaidVariant {
    Raid1,
    Raid4,
    Raid5,
    /// Left asymmetric parity rotation.
    Raid5La,
    /// Right asymmetric.
    Raid5Ra,
    /// Left symmetric.
    Raid5Ls,
    /// Right symmetric.
    Raid5Rs,
    Raid6,
    /// Zero restart.
    Raid6Zr,
    /// N restart.
    Raid6Nr,
    /// N continue.
    Raid6Nc,
}

impl RaidVariant {
    pub const ALL: [Self; 11] = [
        Self::Raid1,
        Self::Raid4,
        Self::Raid5,
        Self::Raid5La,
        Self::Raid5Ra,
        Self::Raid5Ls,
        Self::Raid5Rs,
        Self::Raid6,
        Self::Raid6Zr,
        Self::Raid6Nr,
        Self::Raid6Nc,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raid1 => "raid1",
            Self::Raid4 => "raid4",
            Self::Raid5 => "raid5",
            Self::Raid5La => "raid5_la",
            Self::Raid5Ra => "raid5_ra",
            Self::Raid5Ls => "raid5_ls",
            Self::Raid5Rs => "raid5_rs",
            Self::Raid6 => "raid6",
            Self::Raid6Zr => "raid6_zr",
            Self::Raid6Nr => "raid6_nr",
            Self::Raid6Nc => "raid6_nc",
        }
    }

    #[must_use]
    pub const fn parity_devs(self) -> u32 {
        match self {
            Self::Raid1 => 0,
            Self::Raid6 | Self::Raid6Zr | Self::Raid6Nr | Self::Raid6Nc => 2,
            _ => 1,
        }
    }

    #[must_use]
    pub const fn is_mirrored(self) -> bool {
        matches!(self, Self::Raid1)
    }
}

impl fmt::Display for RaidVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RaidVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| Error::UnknownSegmentType(s.to_string()))
    }
}

/// One RAID variant's segment type descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaidSegType {
    variant: RaidVariant,
    flags: SegTypeFlags,
    parity_devs: u32,
}

impl RaidSegType {
    #[must_use]
    pub fn new(variant: RaidVariant) -> Self {
        let mut flags = SegTypeFlags::RAID;
        if variant.is_mirrored() {
            flags |= SegTypeFlags::AREAS_MIRRORED;
        }
        let segtype = Self {
            variant,
            flags,
            parity_devs: variant.parity_devs(),
        };
        debug!("initialised segtype: {variant}");
        segtype
    }

    /// Builds the descriptor for a variant given by name.
    ///
    /// # Errors
    /// Returns [`Error::UnknownSegmentType`] for names outside the family.
    pub fn from_name(name: &str) -> Result<Self> {
        name.parse::<RaidVariant>()
            .map(Self::new)
            .map_err(Error::logged)
    }

    #[must_use]
    pub const fn variant(&self) -> RaidVariant {
        self.variant
    }
}

impl SegmentType for RaidSegType {
    fn name(&self) -> &str {
        self.variant.as_str()
    }

    fn flags(&self) -> SegTypeFlags {
        self.flags
    }

    fn parity_devs(&self) -> u32 {
        self.parity_devs
    }

    fn text_import_area_count(&self, sn: &ConfigNode) -> Result<u32> {
        text::import_area_count(sn)
    }

    fn text_import(
        &self,
        seg: &mut Segment,
        sn: &ConfigNode,
        vg: &dyn VolumeLookup,
    ) -> Result<()> {
        text::import(seg, sn, vg)
    }

    fn text_export(&self, seg: &Segment, f: &mut Formatter, vg: &dyn VolumeLookup) -> Result<()> {
        text::export(seg, f, vg)
    }

    fn add_target_line(
        &self,
        seg: &Segment,
        vg: &dyn VolumeLookup,
        node: &mut TargetNode,
        len: u64,
    ) -> Result<()> {
        target::add_target_line(self, seg, vg, node, len)
    }

    fn target_status_compatible(&self, target_type: &str) -> bool {
        status::compatible(target_type)
    }

    fn target_percent(
        &self,
        params: &str,
        seg: Option<&mut Segment>,
        totals: &mut PercentTotals,
    ) -> Result<Percent> {
        status::target_percent(self.name(), params, seg, totals)
    }

    fn target_present(&self, ctx: &CmdContext) -> bool {
        ctx.target_present(RAID_TARGET)
    }

    fn modules_needed(&self, modules: &mut Vec<String>) {
        modules.push(RAID_TARGET.to_string());
    }
}
