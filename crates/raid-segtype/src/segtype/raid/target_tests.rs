use std::sync::Arc;

use crate::activate::{RaidDevice, TargetNode};
use crate::error::Error;
use crate::metadata::{AreaRole, LvId, LvStatus, Segment, VolumeGroup};
use crate::segtype::SegmentType;
use crate::segtype::raid::{RaidSegType, RaidVariant};

struct Fixture {
    vg: VolumeGroup,
    top: LvId,
    pairs: Vec<(LvId, LvId)>,
}

fn fixture(vg_name: &str, lv_name: &str, images: usize) -> Fixture {
    let mut vg = VolumeGroup::new(vg_name, 8192);
    let top = vg.add_lv(lv_name, LvStatus::VISIBLE).expect("add top");
    let pairs = (0..images)
        .map(|i| {
            let meta = vg
                .add_lv(&format!("{lv_name}_rmeta_{i}"), LvStatus::RAID_META)
                .expect("meta");
            let image = vg
                .add_lv(&format!("{lv_name}_rimage_{i}"), LvStatus::RAID_IMAGE)
                .expect("image");
            (meta, image)
        })
        .collect();
    Fixture { vg, top, pairs }
}

fn populated(segtype: &Arc<dyn SegmentType>, fx: &Fixture) -> Segment {
    let count = u32::try_from(fx.pairs.len()).expect("small");
    let mut seg = Segment::new(segtype.clone(), fx.top, 0, 4, 4, count);
    for (slot, &(meta, image)) in (0u32..).zip(&fx.pairs) {
        seg.set_area_lv(slot, meta, AreaRole::Metadata).expect("meta");
        seg.set_area_lv(slot, image, AreaRole::Image).expect("image");
    }
    seg
}

fn raid(variant: RaidVariant) -> Arc<dyn SegmentType> {
    Arc::new(RaidSegType::new(variant))
}

#[test]
fn builds_raid5_line_with_escaped_device_names() {
    let fx = fixture("vg-a", "data-lv", 3);
    let segtype = raid(RaidVariant::Raid5Ls);
    let mut seg = populated(&segtype, &fx);
    seg.region_size = 1024;
    seg.stripe_size = 128;

    let mut node = TargetNode::new("vg--a-data--lv");
    segtype
        .add_target_line(&seg, &fx.vg, &mut node, 32_768)
        .expect("target line");

    assert_eq!(
        node.table(),
        vec![
            "0 32768 raid raid5_ls 3 128 region_size 1024 3 \
             vg--a-data--lv_rmeta_0 vg--a-data--lv_rimage_0 \
             vg--a-data--lv_rmeta_1 vg--a-data--lv_rimage_1 \
             vg--a-data--lv_rmeta_2 vg--a-data--lv_rimage_2"
                .to_string()
        ]
    );
}

#[test]
fn missing_region_size_is_a_state_error_for_any_area_count() {
    for images in [0, 1, 3] {
        let fx = fixture("vg", "lv", images);
        let segtype = raid(RaidVariant::Raid6);
        let seg = populated(&segtype, &fx);
        let mut node = TargetNode::new("vg-lv");
        let err = segtype
            .add_target_line(&seg, &fx.vg, &mut node, 100)
            .expect_err("no region size");
        assert!(matches!(err, Error::State(_)), "{images} images: {err:?}");
        assert!(err.to_string().contains("lv"));
        assert!(node.targets().is_empty(), "nothing appended on failure");
    }
}

#[test]
fn zero_areas_is_an_internal_error() {
    let fx = fixture("vg", "lv", 0);
    let segtype = raid(RaidVariant::Raid4);
    let mut seg = populated(&segtype, &fx);
    seg.region_size = 512;
    let mut node = TargetNode::new("vg-lv");
    let err = segtype
        .add_target_line(&seg, &fx.vg, &mut node, 100)
        .expect_err("no areas");
    assert!(err.is_internal(), "{err:?}");
}

#[test]
fn mirrors_may_lack_metadata_devices() {
    let fx = fixture("vg", "m", 2);
    let segtype = raid(RaidVariant::Raid1);
    let mut seg = Segment::new(segtype.clone(), fx.top, 0, 4, 4, 2);
    seg.region_size = 2048;
    seg.stripe_size = 64;
    seg.set_area_lv(0, fx.pairs[0].1, AreaRole::Image).expect("image 0");
    seg.set_area_lv(1, fx.pairs[1].0, AreaRole::Metadata).expect("meta 1");
    seg.set_area_lv(1, fx.pairs[1].1, AreaRole::Image).expect("image 1");

    let mut node = TargetNode::new("vg-m");
    segtype
        .add_target_line(&seg, &fx.vg, &mut node, 4096)
        .expect("raid1 line");
    let target = &node.targets()[0];
    assert_eq!(target.stripe_size, 0, "raid1 ignores stripe size");
    assert_eq!(
        target.devices[0],
        RaidDevice {
            meta: None,
            image: Some("vg-m_rimage_0".into())
        }
    );
    assert_eq!(
        node.table()[0],
        "0 4096 raid raid1 3 0 region_size 2048 2 - vg-m_rimage_0 vg-m_rmeta_1 vg-m_rimage_1"
    );
}

#[test]
fn striped_levels_require_metadata_devices() {
    let fx = fixture("vg", "s", 2);
    let segtype = raid(RaidVariant::Raid5);
    let mut seg = Segment::new(segtype.clone(), fx.top, 0, 4, 4, 2);
    seg.region_size = 1024;
    seg.set_area_lv(0, fx.pairs[0].1, AreaRole::Image).expect("image 0");
    seg.set_area_lv(1, fx.pairs[1].0, AreaRole::Metadata).expect("meta 1");
    seg.set_area_lv(1, fx.pairs[1].1, AreaRole::Image).expect("image 1");

    let mut node = TargetNode::new("vg-s");
    let err = segtype
        .add_target_line(&seg, &fx.vg, &mut node, 4096)
        .expect_err("missing metadata");
    assert!(err.is_internal());
    assert!(node.targets().is_empty());
}

#[test]
fn consecutive_segments_are_laid_end_to_end() {
    let fx = fixture("vg", "lv", 2);
    let segtype = raid(RaidVariant::Raid1);
    let mut seg = populated(&segtype, &fx);
    seg.region_size = 1024;

    let mut node = TargetNode::new("vg-lv");
    segtype
        .add_target_line(&seg, &fx.vg, &mut node, 1000)
        .expect("first");
    segtype
        .add_target_line(&seg, &fx.vg, &mut node, 500)
        .expect("second");
    let starts: Vec<u64> = node.targets().iter().map(|t| t.start).collect();
    assert_eq!(starts, vec![0, 1000]);
    assert_eq!(node.length(), 1500);
}
