use crate::activate::{RaidDevice, TargetNode};
use crate::error::{Error, Result};
use crate::metadata::{LvId, Segment, VolumeLookup};
use crate::segtype::{SegTypeFlags, SegmentType};

use super::RaidSegType;

pub(super) fn add_target_line(
    segtype: &RaidSegType,
    seg: &Segment,
    vg: &dyn VolumeLookup,
    node: &mut TargetNode,
    len: u64,
) -> Result<()> {
    let lv_name = vg.lv_name(seg.lv).unwrap_or("<unknown>");

    // No implicit default: the kernel needs a region size for every raid target.
    if seg.region_size == 0 {
        return Err(
            Error::State(format!("missing region size for raid segment of {lv_name}")).logged(),
        );
    }
    if seg.area_count() == 0 {
        return Err(Error::Internal(format!(
            "add_target_line called with no areas for {lv_name}"
        ))
        .logged());
    }

    let mirrored = segtype.flags().contains(SegTypeFlags::AREAS_MIRRORED);
    let devices = (0u32..)
        .zip(seg.areas())
        .map(|(slot, area)| {
            let meta = match area.meta {
                Some(id) => Some(device(vg, id, slot, lv_name)?),
                None if mirrored => None,
                None => return Err(unpopulated(slot, "metadata", lv_name)),
            };
            let image = match area.image {
                Some(id) => device(vg, id, slot, lv_name)?,
                None => return Err(unpopulated(slot, "image", lv_name)),
            };
            Ok(RaidDevice {
                meta,
                image: Some(image),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let target = node.add_raid_target(
        len,
        segtype.name(),
        seg.region_size,
        seg.stripe_size,
        0,
        0,
    )?;
    target.devices.extend(devices);
    Ok(())
}

fn device(vg: &dyn VolumeLookup, id: LvId, slot: u32, lv_name: &str) -> Result<String> {
    vg.dm_name(id).ok_or_else(|| {
        Error::Internal(format!(
            "area {slot} of {lv_name} references unknown volume {id}"
        ))
        .logged()
    })
}

fn unpopulated(slot: u32, role: &str, lv_name: &str) -> Error {
    Error::Internal(format!("area {slot} of {lv_name} has no {role} volume")).logged()
}
