//! Segments and their areas.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use super::LvId;
use crate::error::{Error, Result};
use crate::segtype::SegmentType;

bitflags! {
    /// Per-segment status bits.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SegStatus: u64 {
        /// Set once a RAID segment has been fully imported.
        const RAID = 1 << 0;
    }
}

/// What a sub-volume referenced by an area holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AreaRole {
    Metadata,
    Image,
}

impl fmt::Display for AreaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Metadata => "metadata",
            Self::Image => "image",
        })
    }
}

/// One device slot: the metadata sub-volume and the data image sharing an index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RaidArea {
    pub meta: Option<LvId>,
    pub image: Option<LvId>,
}

impl RaidArea {
    #[must_use]
    pub const fn get(&self, role: AreaRole) -> Option<LvId> {
        match role {
            AreaRole::Metadata => self.meta,
            AreaRole::Image => self.image,
        }
    }

    pub const fn set(&mut self, role: AreaRole, lv: LvId) {
        match role {
            AreaRole::Metadata => self.meta = Some(lv),
            AreaRole::Image => self.image = Some(lv),
        }
    }
}

/// Flattened view of one populated area entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AreaRef {
    pub slot: u32,
    pub role: AreaRole,
    pub lv: LvId,
}

/// A contiguous span of a logical volume implemented by one segment type.
#[derive(Debug)]
pub struct Segment {
    segtype: Arc<dyn SegmentType>,
    /// Owning logical volume.
    pub lv: LvId,
    /// First logical extent.
    pub le: u64,
    /// Length in logical extents.
    pub len: u64,
    /// Extents allocated to each area.
    pub area_len: u64,
    area_count: u32,
    areas: Vec<RaidArea>,
    /// Sync granularity in sectors; 0 means unset.
    pub region_size: u32,
    /// Striping unit in sectors; 0 means unset.
    pub stripe_size: u32,
    /// Sync progress, in extents.
    pub extents_copied: u64,
    pub status: SegStatus,
}

impl Segment {
    #[must_use]
    pub fn new(
        segtype: Arc<dyn SegmentType>,
        lv: LvId,
        le: u64,
        len: u64,
        area_len: u64,
        area_count: u32,
    ) -> Self {
        Self {
            segtype,
            lv,
            le,
            len,
            area_len,
            area_count,
            areas: Vec::new(),
            region_size: 0,
            stripe_size: 0,
            extents_copied: 0,
            status: SegStatus::empty(),
        }
    }

    #[must_use]
    pub const fn segtype(&self) -> &Arc<dyn SegmentType> {
        &self.segtype
    }

    #[must_use]
    pub const fn area_count(&self) -> u32 {
        self.area_count
    }

    /// Every slot in index order; slots never assigned read as empty.
    pub fn areas(&self) -> impl Iterator<Item = RaidArea> + '_ {
        (0..self.area_count).map(|slot| self.area(slot).unwrap_or_default())
    }

    /// The slot at `slot`, or `None` if it is out of range or was never assigned.
    #[must_use]
    pub fn area(&self, slot: u32) -> Option<RaidArea> {
        self.areas.get(slot as usize).copied()
    }

    /// Attaches `lv` to slot `slot` in the given role.
    ///
    /// # Errors
    /// Returns an internal error if `slot` is outside `0..area_count`.
    pub fn set_area_lv(&mut self, slot: u32, lv: LvId, role: AreaRole) -> Result<()> {
        if slot >= self.area_count {
            return Err(Error::Internal(format!(
                "area {slot} out of range for segment with {} areas",
                self.area_count
            ))
            .logged());
        }
        // Slots are materialised on first assignment, never from the declared count.
        let idx = slot as usize;
        if self.areas.len() <= idx {
            self.areas.resize(idx + 1, RaidArea::default());
        }
        self.areas[idx].set(role, lv);
        Ok(())
    }

    /// Populated entries in slot order, metadata before image within a slot.
    pub fn area_refs(&self) -> impl Iterator<Item = AreaRef> + '_ {
        (0u32..).zip(&self.areas).flat_map(|(slot, area)| {
            [AreaRole::Metadata, AreaRole::Image]
                .into_iter()
                .filter_map(move |role| area.get(role).map(|lv| AreaRef { slot, role, lv }))
        })
    }

    #[must_use]
    pub const fn is_raid(&self) -> bool {
        self.status.contains(SegStatus::RAID)
    }
}
