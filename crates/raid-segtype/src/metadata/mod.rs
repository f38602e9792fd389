//! In-memory volume group: logical volumes and their segments.

mod segment;
mod text;
#[cfg(test)]
mod text_tests;

use std::fmt;

use bitflags::bitflags;

pub use segment::{AreaRef, AreaRole, RaidArea, SegStatus, Segment};
pub use text::{NO_METADATA, out_areas};

use crate::error::{Error, Result};

/// Handle of a logical volume inside its volume group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LvId(usize);

impl fmt::Display for LvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lv#{}", self.0)
    }
}

bitflags! {
    /// Persistent logical volume status words.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct LvStatus: u64 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const VISIBLE = 1 << 2;
        const RAID = 1 << 3;
        const RAID_META = 1 << 4;
        const RAID_IMAGE = 1 << 5;
    }
}

const STATUS_WORDS: [(LvStatus, &str); 6] = [
    (LvStatus::READ, "READ"),
    (LvStatus::WRITE, "WRITE"),
    (LvStatus::VISIBLE, "VISIBLE"),
    (LvStatus::RAID, "RAID"),
    (LvStatus::RAID_META, "RAID_META"),
    (LvStatus::RAID_IMAGE, "RAID_IMAGE"),
];

impl LvStatus {
    #[must_use]
    pub fn from_word(word: &str) -> Option<Self> {
        STATUS_WORDS
            .iter()
            .find(|(_, w)| *w == word)
            .map(|(flag, _)| *flag)
    }

    #[must_use]
    pub fn words(self) -> Vec<&'static str> {
        STATUS_WORDS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, w)| *w)
            .collect()
    }
}

#[derive(Debug)]
pub struct LogicalVolume {
    id: LvId,
    pub name: String,
    /// Persistent identifier, if the metadata carried one.
    pub uuid: Option<String>,
    pub status: LvStatus,
    pub segments: Vec<Segment>,
}

impl LogicalVolume {
    #[must_use]
    pub const fn id(&self) -> LvId {
        self.id
    }

    /// Size in logical extents.
    #[must_use]
    pub fn le_count(&self) -> u64 {
        self.segments
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.len))
    }
}

/// Name resolution for the volumes that segment areas point at.
pub trait VolumeLookup {
    fn vg_name(&self) -> &str;

    fn find_lv(&self, name: &str) -> Option<LvId>;

    fn lv_name(&self, id: LvId) -> Option<&str>;

    /// Device-mapper name of a volume: `<vg>-<lv>` with hyphens inside either part doubled.
    fn dm_name(&self, id: LvId) -> Option<String> {
        let lv = self.lv_name(id)?;
        Some(format!(
            "{}-{}",
            self.vg_name().replace('-', "--"),
            lv.replace('-', "--")
        ))
    }
}

#[derive(Debug)]
pub struct VolumeGroup {
    pub name: String,
    /// Extent size in 512-byte sectors.
    pub extent_size: u32,
    lvs: Vec<LogicalVolume>,
}

impl VolumeGroup {
    pub fn new(name: impl Into<String>, extent_size: u32) -> Self {
        Self {
            name: name.into(),
            extent_size,
            lvs: Vec::new(),
        }
    }

    /// Creates an empty logical volume.
    ///
    /// # Errors
    /// Returns an error if a volume with the same name already exists.
    pub fn add_lv(&mut self, name: &str, status: LvStatus) -> Result<LvId> {
        if self.find_lv(name).is_some() {
            return Err(Error::Internal(format!(
                "logical volume '{name}' already exists in volume group {}",
                self.name
            ))
            .logged());
        }
        let id = LvId(self.lvs.len());
        self.lvs.push(LogicalVolume {
            id,
            name: name.to_string(),
            uuid: None,
            status,
            segments: Vec::new(),
        });
        Ok(id)
    }

    #[must_use]
    pub fn lv(&self, id: LvId) -> Option<&LogicalVolume> {
        self.lvs.get(id.0)
    }

    pub fn lv_mut(&mut self, id: LvId) -> Option<&mut LogicalVolume> {
        self.lvs.get_mut(id.0)
    }

    #[must_use]
    pub fn lv_by_name(&self, name: &str) -> Option<&LogicalVolume> {
        self.lvs.iter().find(|lv| lv.name == name)
    }

    pub fn lvs(&self) -> impl Iterator<Item = &LogicalVolume> {
        self.lvs.iter()
    }
}

impl VolumeLookup for VolumeGroup {
    fn vg_name(&self) -> &str {
        &self.name
    }

    fn find_lv(&self, name: &str) -> Option<LvId> {
        self.lv_by_name(name).map(LogicalVolume::id)
    }

    fn lv_name(&self, id: LvId) -> Option<&str> {
        self.lv(id).map(|lv| lv.name.as_str())
    }
}
