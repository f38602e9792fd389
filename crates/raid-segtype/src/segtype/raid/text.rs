//! Metadata import and export of RAID segments.

use tracing::error;

use crate::config::{ConfigNode, ConfigValue, Formatter};
use crate::error::{Error, Result};
use crate::metadata::{AreaRole, LvId, NO_METADATA, SegStatus, Segment, VolumeLookup, out_areas};
use crate::segtype::SegTypeFlags;

pub(super) fn import_area_count(sn: &ConfigNode) -> Result<u32> {
    sn.get_u32("device_count").ok_or_else(|| {
        Error::ConfigMissing {
            field: "device_count".into(),
            segment: sn.key().into(),
        }
        .logged()
    })
}

fn optional_u32(sn: &ConfigNode, field: &str, lv: &str) -> Result<u32> {
    if sn.find(field).is_none() {
        return Ok(0);
    }
    sn.get_u32(field).ok_or_else(|| {
        Error::ConfigMalformed {
            field: field.into(),
            segment: sn.key().into(),
            lv: lv.into(),
            reason: "expected an unsigned 32-bit integer".into(),
        }
        .logged()
    })
}

pub(super) fn import(seg: &mut Segment, sn: &ConfigNode, vg: &dyn VolumeLookup) -> Result<()> {
    let seg_name = sn.key();
    let lv_name = vg.lv_name(seg.lv).unwrap_or("<unknown>").to_string();

    let region_size = optional_u32(sn, "region_size", &lv_name)?;
    let stripe_size = optional_u32(sn, "stripe_size", &lv_name)?;

    let Some(raids) = sn.find("raids") else {
        return Err(Error::ConfigMissing {
            field: "raids".into(),
            segment: format!("{seg_name} of logical volume {lv_name}"),
        }
        .logged());
    };
    let Some(ConfigValue::List(entries)) = raids.as_value() else {
        return Err(Error::ConfigMalformed {
            field: "raids".into(),
            segment: seg_name.into(),
            lv: lv_name,
            reason: "expected a list of volume names".into(),
        }
        .logged());
    };

    let mirrored = seg.segtype().flags().contains(SegTypeFlags::AREAS_MIRRORED);
    let pairs = import_areas(seg.area_count(), mirrored, entries, seg_name, &lv_name, vg)
        .inspect_err(|_| {
            error!("failed to import RAID images for segment {seg_name} of {lv_name}");
        })?;

    seg.region_size = region_size;
    seg.stripe_size = stripe_size;
    for (slot, (meta, image)) in (0u32..).zip(pairs) {
        if let Some(meta) = meta {
            seg.set_area_lv(slot, meta, AreaRole::Metadata)?;
        }
        seg.set_area_lv(slot, image, AreaRole::Image)?;
    }
    seg.status |= SegStatus::RAID;
    Ok(())
}

/// Resolves the interleaved `meta, image, meta, image, ...` list into one pair per slot.
/// Mirrored segments may name [`NO_METADATA`] in place of a metadata volume.
fn import_areas(
    area_count: u32,
    mirrored: bool,
    entries: &[ConfigValue],
    seg_name: &str,
    lv_name: &str,
    vg: &dyn VolumeLookup,
) -> Result<Vec<(Option<LvId>, LvId)>> {
    let mismatch = |detail: String| {
        Error::CountMismatch {
            segment: seg_name.into(),
            detail,
        }
        .logged()
    };

    if area_count == 0 {
        return Err(mismatch("no areas found".into()));
    }

    let mut entries_iter = entries.iter();
    let mut pairs = Vec::with_capacity((area_count as usize).min(entries.len() / 2));
    for _ in 0..area_count {
        let Some(meta) = entries_iter.next() else {
            break;
        };
        let meta = volume_name(meta, seg_name, lv_name)?;
        let Some(image) = entries_iter.next() else {
            return Err(mismatch(format!("missing data device after '{meta}'")));
        };
        let image = volume_name(image, seg_name, lv_name)?;

        let meta = if mirrored && meta == NO_METADATA {
            None
        } else {
            Some(resolve(vg, meta, seg_name)?)
        };
        pairs.push((meta, resolve(vg, image, seg_name)?));
    }

    if entries_iter.next().is_some() || pairs.len() < area_count as usize {
        return Err(mismatch(format!(
            "device_count {area_count} needs {} entries, found {}",
            2 * u64::from(area_count),
            entries.len()
        )));
    }
    Ok(pairs)
}

fn volume_name<'a>(value: &'a ConfigValue, seg_name: &str, lv_name: &str) -> Result<&'a str> {
    value.as_str().ok_or_else(|| {
        Error::ConfigMalformed {
            field: "raids".into(),
            segment: seg_name.into(),
            lv: lv_name.into(),
            reason: "bad volume name in areas array".into(),
        }
        .logged()
    })
}

fn resolve(vg: &dyn VolumeLookup, name: &str, seg_name: &str) -> Result<LvId> {
    vg.find_lv(name).ok_or_else(|| {
        Error::Lookup {
            name: name.into(),
            segment: seg_name.into(),
        }
        .logged()
    })
}

pub(super) fn export(seg: &Segment, f: &mut Formatter, vg: &dyn VolumeLookup) -> Result<()> {
    f.out_u64("device_count", u64::from(seg.area_count()));
    if seg.region_size != 0 {
        f.out_u64("region_size", u64::from(seg.region_size));
    }
    if seg.stripe_size != 0 {
        f.out_u64("stripe_size", u64::from(seg.stripe_size));
    }
    out_areas(f, seg, vg, "raids")
}
