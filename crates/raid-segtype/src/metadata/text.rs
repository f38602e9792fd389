//! Volume group metadata text: import, export and activation helpers built on segment types.

use tracing::debug;

use super::{AreaRole, LogicalVolume, LvId, LvStatus, Segment, VolumeGroup, VolumeLookup};
use crate::activate::{CmdContext, TargetNode};
use crate::config::{ConfigNode, ConfigValue, Formatter};
use crate::error::{Error, Result};
use crate::percent::{Percent, PercentTotals};
use crate::segtype::{Registry, SegTypeFlags};

/// Stands in for a slot's metadata volume when a mirrored segment has none.
pub const NO_METADATA: &str = "-";

/// Writes a segment's areas as `key = [ "meta", "image", ... ]`, one slot per line.
/// Mirrored segments may lack a metadata volume; it is written as [`NO_METADATA`].
///
/// # Errors
/// Returns an internal error if a slot is unpopulated or names an unknown volume.
pub fn out_areas(
    f: &mut Formatter,
    seg: &Segment,
    vg: &dyn VolumeLookup,
    key: &str,
) -> Result<()> {
    let mirrored = seg.segtype().flags().contains(SegTypeFlags::AREAS_MIRRORED);
    let mut rows = Vec::new();
    for (slot, area) in seg.areas().enumerate() {
        let name = |id: Option<LvId>, role: AreaRole| match id {
            None if mirrored && role == AreaRole::Metadata => Ok(NO_METADATA),
            _ => id.and_then(|id| vg.lv_name(id)).ok_or_else(|| {
                Error::Internal(format!("area {slot} has no exportable {role} volume")).logged()
            }),
        };
        rows.push(vec![
            name(area.meta, AreaRole::Metadata)?,
            name(area.image, AreaRole::Image)?,
        ]);
    }
    f.out_string_rows(key, &rows);
    Ok(())
}

fn missing(field: &str, segment: &str) -> Error {
    Error::ConfigMissing {
        field: field.into(),
        segment: segment.into(),
    }
    .logged()
}

fn read_status(lvn: &ConfigNode) -> Result<LvStatus> {
    let Some(words) = lvn.get_list("status") else {
        return Err(missing("status", lvn.key()));
    };
    words.iter().try_fold(LvStatus::empty(), |acc, word| {
        word.as_str()
            .and_then(LvStatus::from_word)
            .map(|flag| acc | flag)
            .ok_or_else(|| {
                Error::ConfigMalformed {
                    field: "status".into(),
                    segment: "-".into(),
                    lv: lvn.key().into(),
                    reason: format!("unknown status flag {word:?}"),
                }
                .logged()
            })
    })
}

fn read_segment(
    vg: &VolumeGroup,
    registry: &Registry,
    lv: LvId,
    sn: &ConfigNode,
) -> Result<Segment> {
    let le = sn
        .get_u64("start_extent")
        .ok_or_else(|| missing("start_extent", sn.key()))?;
    let len = sn
        .get_u64("extent_count")
        .ok_or_else(|| missing("extent_count", sn.key()))?;
    let type_name = sn.get_str("type").ok_or_else(|| missing("type", sn.key()))?;

    let segtype = registry.lookup(type_name)?;
    let area_count = segtype.text_import_area_count(sn)?;
    let mut seg = Segment::new(segtype.clone(), lv, le, len, len, area_count);
    segtype.text_import(&mut seg, sn, vg)?;
    Ok(seg)
}

fn read_segments(
    vg: &VolumeGroup,
    registry: &Registry,
    lv: LvId,
    lvn: &ConfigNode,
) -> Result<Vec<Segment>> {
    let expected = lvn
        .get_u32("segment_count")
        .ok_or_else(|| missing("segment_count", lvn.key()))?;
    let nodes: Vec<&ConfigNode> = lvn.sections().collect();
    if nodes.len() != expected as usize {
        return Err(Error::CountMismatch {
            segment: lvn.key().into(),
            detail: format!(
                "segment_count is {expected} but {} segment sections were found",
                nodes.len()
            ),
        }
        .logged());
    }

    let mut segments = Vec::with_capacity(nodes.len());
    let mut next_le = 0;
    for sn in nodes {
        let seg = read_segment(vg, registry, lv, sn)?;
        if seg.le != next_le {
            return Err(Error::ConfigMalformed {
                field: "start_extent".into(),
                segment: sn.key().into(),
                lv: lvn.key().into(),
                reason: format!("segment starts at extent {}, expected {next_le}", seg.le),
            }
            .logged());
        }
        next_le = seg.le.checked_add(seg.len).ok_or_else(|| {
            Error::ConfigMalformed {
                field: "extent_count".into(),
                segment: sn.key().into(),
                lv: lvn.key().into(),
                reason: format!("segment end overflows at extent {} + {}", seg.le, seg.len),
            }
            .logged()
        })?;
        segments.push(seg);
    }
    Ok(segments)
}

impl VolumeGroup {
    /// Builds a volume group from parsed metadata. `root` is either the
    /// volume group section or a document root whose first section it is.
    ///
    /// # Errors
    /// Returns the first config, lookup, count or segment type error encountered.
    pub fn import(root: &ConfigNode, registry: &Registry) -> Result<Self> {
        let vgn = if root.key().is_empty() {
            root.sections()
                .next()
                .ok_or_else(|| missing("volume group", "(root)"))?
        } else {
            root
        };
        let extent_size = vgn
            .get_u32("extent_size")
            .ok_or_else(|| missing("extent_size", vgn.key()))?;
        let mut vg = Self::new(vgn.key(), extent_size);

        let lv_nodes: Vec<&ConfigNode> = vgn
            .find("logical_volumes")
            .map(|n| n.sections().collect())
            .unwrap_or_default();

        // Every volume exists before any segment is read, so areas may
        // reference volumes declared later in the text.
        let mut ids = Vec::with_capacity(lv_nodes.len());
        for lvn in &lv_nodes {
            let id = vg.add_lv(lvn.key(), read_status(lvn)?)?;
            if let Some(lv) = vg.lv_mut(id) {
                lv.uuid = lvn.get_str("id").map(str::to_string);
            }
            ids.push(id);
        }
        for (&id, lvn) in ids.iter().zip(&lv_nodes) {
            let segments = read_segments(&vg, registry, id, lvn)?;
            if let Some(lv) = vg.lv_mut(id) {
                lv.segments = segments;
            }
        }

        debug!("imported volume group {} with {} volumes", vg.name, ids.len());
        Ok(vg)
    }

    /// Renders the volume group as metadata text.
    ///
    /// # Errors
    /// Propagates segment type export failures.
    pub fn export(&self) -> Result<String> {
        let mut f = Formatter::new();
        f.begin_section(&self.name);
        f.out_u64("extent_size", u64::from(self.extent_size));
        f.begin_section("logical_volumes");
        for lv in self.lvs() {
            self.export_lv(lv, &mut f)?;
        }
        f.end_section();
        f.end_section();
        Ok(f.finish())
    }

    fn export_lv(&self, lv: &LogicalVolume, f: &mut Formatter) -> Result<()> {
        f.begin_section(&lv.name);
        if let Some(uuid) = &lv.uuid {
            f.out_str("id", uuid);
        }
        let words = lv
            .status
            .words()
            .into_iter()
            .map(|w| ConfigValue::Str(w.to_string()))
            .collect();
        f.out_value("status", &ConfigValue::List(words));
        f.out_u64("segment_count", lv.segments.len() as u64);
        for (i, seg) in lv.segments.iter().enumerate() {
            f.begin_section(&format!("segment{}", i + 1));
            f.out_u64("start_extent", seg.le);
            f.out_u64("extent_count", seg.len);
            f.out_str("type", seg.segtype().name());
            seg.segtype().text_export(seg, f, self)?;
            f.end_section();
        }
        f.end_section();
        Ok(())
    }

    /// Appends a segment to a volume.
    ///
    /// # Errors
    /// Returns an internal error if `lv` is unknown or the segment does not start
    /// where the volume ends.
    pub fn push_segment(&mut self, lv: LvId, seg: Segment) -> Result<()> {
        let vg_name = self.name.clone();
        let volume = self.lv_mut(lv).ok_or_else(|| {
            Error::Internal(format!("no volume {lv} in volume group {vg_name}")).logged()
        })?;
        let end = volume.le_count();
        if seg.le != end || seg.lv != lv {
            return Err(Error::Internal(format!(
                "segment at extent {} does not continue {} at extent {end}",
                seg.le, volume.name
            ))
            .logged());
        }
        volume.segments.push(seg);
        Ok(())
    }

    /// Builds the device-mapper table for every segment of `lv`.
    ///
    /// # Errors
    /// Returns [`Error::KernelFeatureMissing`] if a segment's target is unavailable,
    /// or any error from the segment type's target line builder.
    pub fn activation_table(&self, lv: LvId, ctx: &CmdContext) -> Result<TargetNode> {
        let volume = self
            .lv(lv)
            .ok_or_else(|| Error::Internal(format!("no volume {lv} to activate")).logged())?;
        let name = self.dm_name(lv).unwrap_or_else(|| volume.name.clone());
        let mut node = TargetNode::new(name);
        let extent_size = u64::from(self.extent_size);
        for (i, seg) in volume.segments.iter().enumerate() {
            let segtype = seg.segtype();
            if !segtype.target_present(ctx) {
                return Err(Error::KernelFeatureMissing(segtype.name().to_string()).logged());
            }
            let sectors = seg.len.checked_mul(extent_size).ok_or_else(|| {
                Error::ConfigMalformed {
                    field: "extent_count".into(),
                    segment: format!("segment{}", i + 1),
                    lv: volume.name.clone(),
                    reason: format!(
                        "{} extents of {extent_size} sectors overflow a sector count",
                        seg.len
                    ),
                }
                .logged()
            })?;
            segtype.add_target_line(seg, self, &mut node, sectors)?;
        }
        Ok(node)
    }

    /// Feeds one status line per segment of `lv` through its segment type and
    /// returns the aggregate progress. Each segment's `extents_copied` is updated
    /// only once every line has parsed.
    ///
    /// # Errors
    /// Returns [`Error::CountMismatch`] when the number of lines differs from the
    /// number of segments and [`Error::Parse`] for lines of a foreign target type.
    pub fn sync_percent(&mut self, lv: LvId, statuses: &[&str]) -> Result<Percent> {
        let volume = self
            .lv_mut(lv)
            .ok_or_else(|| Error::Internal(format!("no volume {lv} to monitor")).logged())?;
        if statuses.len() != volume.segments.len() {
            return Err(Error::CountMismatch {
                segment: volume.name.clone(),
                detail: format!(
                    "{} status lines for {} segments",
                    statuses.len(),
                    volume.segments.len()
                ),
            }
            .logged());
        }

        // Every line is checked before any segment is updated.
        let mut totals = PercentTotals::default();
        for (seg, line) in volume.segments.iter().zip(statuses) {
            let segtype = seg.segtype();
            let token = line.split(' ').next().unwrap_or_default();
            if !segtype.target_status_compatible(token) {
                return Err(Error::Parse {
                    segtype: segtype.name().to_string(),
                    text: (*line).to_string(),
                }
                .logged());
            }
            segtype.target_percent(line, None, &mut totals)?;
        }
        for (seg, line) in volume.segments.iter_mut().zip(statuses) {
            let segtype = seg.segtype().clone();
            segtype.target_percent(line, Some(seg), &mut PercentTotals::default())?;
        }
        Ok(totals.percent())
    }
}
