//! Device-mapper table construction for `raid` targets.

use std::fmt;

use bitflags::bitflags;
use tracing::warn;

use crate::error::{Error, Result};

bitflags! {
    /// Optional sync behaviour passed to the `raid` target.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RaidTargetFlags: u64 {
        const NOSYNC = 1 << 0;
        const FORCESYNC = 1 << 1;
    }
}

/// One metadata/data device pair; `None` renders as `-`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RaidDevice {
    pub meta: Option<String>,
    pub image: Option<String>,
}

/// A single `raid` line of a device-mapper table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RaidTarget {
    pub start: u64,
    pub length: u64,
    pub raid_type: String,
    pub region_size: u32,
    pub stripe_size: u32,
    /// Bitmask of device slots to rebuild.
    pub rebuilds: u64,
    pub flags: RaidTargetFlags,
    pub devices: Vec<RaidDevice>,
}

impl RaidTarget {
    pub fn add_device(&mut self, meta: Option<String>, image: Option<String>) {
        self.devices.push(RaidDevice { meta, image });
    }

    fn param_count(&self) -> u32 {
        let mut count = 1;
        if self.flags.intersects(RaidTargetFlags::NOSYNC | RaidTargetFlags::FORCESYNC) {
            count += 1;
        }
        if self.region_size != 0 {
            count += 2;
        }
        count + 2 * self.rebuilds.count_ones()
    }

    /// Target parameters, without the leading `<start> <length> raid`.
    #[must_use]
    pub fn params(&self) -> String {
        Params(self).to_string()
    }
}

struct Params<'a>(&'a RaidTarget);

impl fmt::Display for Params<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.0;
        write!(f, "{} {} {}", t.raid_type, t.param_count(), t.stripe_size)?;
        if t.flags.contains(RaidTargetFlags::NOSYNC) {
            f.write_str(" nosync")?;
        } else if t.flags.contains(RaidTargetFlags::FORCESYNC) {
            f.write_str(" sync")?;
        }
        if t.region_size != 0 {
            write!(f, " region_size {}", t.region_size)?;
        }
        for slot in (0..64).filter(|&i| t.rebuilds & (1u64 << i) != 0) {
            write!(f, " rebuild {slot}")?;
        }
        write!(f, " {}", t.devices.len())?;
        for dev in &t.devices {
            write!(
                f,
                " {} {}",
                dev.meta.as_deref().unwrap_or("-"),
                dev.image.as_deref().unwrap_or("-")
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for RaidTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} raid {}", self.start, self.length, Params(self))
    }
}

/// The table of one device-mapper device being prepared for activation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetNode {
    pub name: String,
    targets: Vec<RaidTarget>,
}

impl TargetNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: Vec::new(),
        }
    }

    /// Appends a `raid` target directly after the previous one.
    ///
    /// # Errors
    /// Returns an internal error for a zero-length target or an empty type name.
    pub fn add_raid_target(
        &mut self,
        length: u64,
        raid_type: &str,
        region_size: u32,
        stripe_size: u32,
        rebuilds: u64,
        flags: u64,
    ) -> Result<&mut RaidTarget> {
        if length == 0 || raid_type.is_empty() {
            return Err(Error::Internal(format!(
                "invalid raid target for {}: length {length}, type '{raid_type}'",
                self.name
            ))
            .logged());
        }
        if raid_type == "raid1" && stripe_size != 0 {
            warn!("ignoring stripe size {stripe_size} for raid1 target on {}", self.name);
        }
        let start = match self.targets.last() {
            Some(t) => t.start.checked_add(t.length).ok_or_else(|| {
                Error::Internal(format!(
                    "raid target for {} starts beyond the addressable sector range",
                    self.name
                ))
                .logged()
            })?,
            None => 0,
        };
        self.targets.push(RaidTarget {
            start,
            length,
            raid_type: raid_type.to_string(),
            region_size,
            stripe_size: if raid_type == "raid1" { 0 } else { stripe_size },
            rebuilds,
            flags: RaidTargetFlags::from_bits_truncate(flags),
            devices: Vec::new(),
        });
        let last = self.targets.len() - 1;
        Ok(&mut self.targets[last])
    }

    #[must_use]
    pub fn targets(&self) -> &[RaidTarget] {
        &self.targets
    }

    /// Total length in sectors.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.targets.iter().map(|t| t.length).sum()
    }

    /// Table lines in load order.
    #[must_use]
    pub fn table(&self) -> Vec<String> {
        self.targets.iter().map(ToString::to_string).collect()
    }
}
