//! Segment type plugins and their registry.

pub mod raid;

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use bitflags::bitflags;
use tracing::debug;

use crate::activate::{CmdContext, TargetNode};
use crate::config::{ConfigNode, Formatter};
use crate::error::{Error, Result};
use crate::metadata::{Segment, VolumeLookup};
use crate::percent::{Percent, PercentTotals};

bitflags! {
    /// Capability bits of a segment type.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SegTypeFlags: u32 {
        /// Areas are complete copies of each other.
        const AREAS_MIRRORED = 1 << 0;
        const RAID = 1 << 1;
    }
}

/// SegmentType is the contract every layout plugin implements.
pub trait SegmentType: Debug + Send + Sync {
    /// Stable identifier, also used as the kernel target type name.
    fn name(&self) -> &str;

    fn flags(&self) -> SegTypeFlags;

    /// Number of devices holding parity rather than data.
    fn parity_devs(&self) -> u32 {
        0
    }

    /// Reads the mandatory device count of a segment section.
    ///
    /// # Errors
    /// Returns [`Error::ConfigMissing`] if the count is absent or not an unsigned 32-bit value.
    fn text_import_area_count(&self, sn: &ConfigNode) -> Result<u32>;

    /// Populates `seg` from its metadata section.
    ///
    /// # Errors
    /// Returns a config, lookup or count error describing the first problem found.
    fn text_import(&self, seg: &mut Segment, sn: &ConfigNode, vg: &dyn VolumeLookup)
    -> Result<()>;

    /// Writes the type-specific body of a segment section.
    ///
    /// # Errors
    /// Returns an internal error if an area references an unknown volume.
    fn text_export(&self, seg: &Segment, f: &mut Formatter, vg: &dyn VolumeLookup) -> Result<()>;

    /// Appends the kernel target for `seg`, `len` sectors long, to `node`.
    ///
    /// # Errors
    /// Returns a state error for missing parameters and an internal error for unusable segments.
    fn add_target_line(
        &self,
        seg: &Segment,
        vg: &dyn VolumeLookup,
        node: &mut TargetNode,
        len: u64,
    ) -> Result<()>;

    /// Whether a status line reporting `target_type` belongs to this plugin.
    fn target_status_compatible(&self, target_type: &str) -> bool;

    /// Parses sync progress out of a status line and accumulates it into `totals`.
    ///
    /// # Errors
    /// Returns [`Error::Parse`] for malformed text; `totals` is untouched in that case.
    fn target_percent(
        &self,
        params: &str,
        seg: Option<&mut Segment>,
        totals: &mut PercentTotals,
    ) -> Result<Percent>;

    /// Whether the running kernel supports this type. Memoised in `ctx`.
    fn target_present(&self, ctx: &CmdContext) -> bool;

    /// Appends the kernel modules needed for activation.
    fn modules_needed(&self, modules: &mut Vec<String>);
}

/// Owns every known segment type; segments hold shared handles into it.
#[derive(Debug, Default)]
pub struct Registry {
    types: BTreeMap<String, Arc<dyn SegmentType>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the whole RAID family.
    #[must_use]
    pub fn with_raid_types() -> Self {
        let mut registry = Self::new();
        for variant in raid::RaidVariant::ALL {
            registry.register(Arc::new(raid::RaidSegType::new(variant)));
        }
        registry
    }

    /// Adds a type, replacing any previous type of the same name.
    pub fn register(&mut self, segtype: Arc<dyn SegmentType>) {
        debug!("registered segtype: {}", segtype.name());
        self.types.insert(segtype.name().to_string(), segtype);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn SegmentType>> {
        self.types.get(name).cloned()
    }

    /// # Errors
    /// Returns [`Error::UnknownSegmentType`] if `name` is not registered.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn SegmentType>> {
        self.get(name)
            .ok_or_else(|| Error::UnknownSegmentType(name.to_string()).logged())
    }

    /// Routes a status line's type token: exact name first, then any compatible type.
    #[must_use]
    pub fn for_status(&self, target_type: &str) -> Option<Arc<dyn SegmentType>> {
        self.get(target_type).or_else(|| {
            self.types
                .values()
                .find(|t| t.target_status_compatible(target_type))
                .cloned()
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SegmentType>> {
        self.types.values()
    }

    /// Deduplicated kernel modules needed by every registered type.
    #[must_use]
    pub fn modules_needed(&self) -> Vec<String> {
        let mut modules = Vec::new();
        for t in self.types.values() {
            t.modules_needed(&mut modules);
        }
        modules.sort();
        modules.dedup();
        modules
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        if !self.types.is_empty() {
            debug!("releasing {} segtypes", self.types.len());
        }
    }
}
