use std::sync::Arc;

use crate::activate::{CmdContext, KernelTargets};
use crate::config::parse;
use crate::error::Error;
use crate::metadata::{AreaRole, LvStatus, Segment, VolumeGroup, VolumeLookup};
use crate::percent::Percent;
use crate::segtype::Registry;

const VG_TEXT: &str = r#"
vg-test {
	extent_size = 8192
	logical_volumes {
		data {
			id = "Ab12-cd34"
			status = ["READ", "WRITE", "VISIBLE", "RAID"]
			segment_count = 2
			segment1 {
				start_extent = 0
				extent_count = 100
				type = "raid5_ls"
				device_count = 3
				region_size = 1024
				stripe_size = 128
				raids = [
					"data_rmeta_0", "data_rimage_0",
					"data_rmeta_1", "data_rimage_1",
					"data_rmeta_2", "data_rimage_2"
				]
			}
			segment2 {
				start_extent = 100
				extent_count = 50
				type = "raid5_ls"
				device_count = 3
				region_size = 1024
				stripe_size = 128
				raids = [
					"data_rmeta_0", "data_rimage_0",
					"data_rmeta_1", "data_rimage_1",
					"data_rmeta_2", "data_rimage_2"
				]
			}
		}
		data_rmeta_0 { status = ["READ", "WRITE", "RAID_META"] segment_count = 0 }
		data_rimage_0 { status = ["READ", "WRITE", "RAID_IMAGE"] segment_count = 0 }
		data_rmeta_1 { status = ["READ", "WRITE", "RAID_META"] segment_count = 0 }
		data_rimage_1 { status = ["READ", "WRITE", "RAID_IMAGE"] segment_count = 0 }
		data_rmeta_2 { status = ["READ", "WRITE", "RAID_META"] segment_count = 0 }
		data_rimage_2 { status = ["READ", "WRITE", "RAID_IMAGE"] segment_count = 0 }
	}
}
"#;

struct Kernel(bool);

impl KernelTargets for Kernel {
    fn target_present(&self, _target: &str, _load_module: bool) -> bool {
        self.0
    }
}

fn imported() -> VolumeGroup {
    let root = parse(VG_TEXT).expect("parse");
    VolumeGroup::import(&root, &Registry::with_raid_types()).expect("import")
}

#[test]
fn import_resolves_forward_references() {
    let vg = imported();
    assert_eq!(vg.name, "vg-test");
    assert_eq!(vg.extent_size, 8192);
    assert_eq!(vg.lvs().count(), 7);

    let data = vg.lv_by_name("data").expect("data");
    assert_eq!(data.uuid.as_deref(), Some("Ab12-cd34"));
    assert!(data.status.contains(LvStatus::RAID | LvStatus::VISIBLE));
    assert_eq!(data.le_count(), 150);
    assert_eq!(data.segments.len(), 2);

    let seg = &data.segments[1];
    assert_eq!(seg.segtype().name(), "raid5_ls");
    assert_eq!(seg.le, 100);
    assert_eq!(seg.area_len, 50);
    assert!(seg.is_raid());
    let image2 = vg.find_lv("data_rimage_2").expect("image 2");
    assert_eq!(seg.area(2).and_then(|a| a.get(AreaRole::Image)), Some(image2));
}

#[test]
fn export_reimports_to_the_same_volume_group() {
    let vg = imported();
    let text = vg.export().expect("export");
    assert!(text.starts_with("vg-test {\n\textent_size = 8192\n"));
    assert!(text.contains("\t\t\t\ttype = \"raid5_ls\"\n"));

    let again = VolumeGroup::import(&parse(&text).expect("reparse"), &Registry::with_raid_types())
        .expect("reimport");
    assert_eq!(again.export().expect("export again"), text);

    for (a, b) in vg.lvs().zip(again.lvs()) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.status, b.status);
        assert_eq!(a.uuid, b.uuid);
        for (sa, sb) in a.segments.iter().zip(&b.segments) {
            assert_eq!(
                sa.area_refs().collect::<Vec<_>>(),
                sb.area_refs().collect::<Vec<_>>()
            );
            assert_eq!((sa.region_size, sa.stripe_size), (sb.region_size, sb.stripe_size));
        }
    }
}

#[test]
fn segment_count_must_match_sections() {
    let text = VG_TEXT.replace("segment_count = 2", "segment_count = 3");
    let err = VolumeGroup::import(&parse(&text).expect("parse"), &Registry::with_raid_types())
        .expect_err("count mismatch");
    assert!(matches!(err, Error::CountMismatch { .. }), "{err:?}");
}

#[test]
fn unknown_segment_types_are_rejected() {
    let text = VG_TEXT.replacen("\"raid5_ls\"", "\"raid10_far\"", 1);
    let err = VolumeGroup::import(&parse(&text).expect("parse"), &Registry::with_raid_types())
        .expect_err("unknown type");
    assert!(matches!(err, Error::UnknownSegmentType(ref t) if t == "raid10_far"));
}

#[test]
fn unknown_status_words_are_rejected() {
    let text = VG_TEXT.replace("\"RAID_META\"", "\"LOCKED\"");
    let err = VolumeGroup::import(&parse(&text).expect("parse"), &Registry::with_raid_types())
        .expect_err("unknown status");
    assert!(matches!(err, Error::ConfigMalformed { ref field, .. } if field == "status"));
}

#[test]
fn gaps_between_segments_are_rejected() {
    let text = VG_TEXT.replace("start_extent = 100", "start_extent = 101");
    let err = VolumeGroup::import(&parse(&text).expect("parse"), &Registry::with_raid_types())
        .expect_err("gap");
    assert!(matches!(err, Error::ConfigMalformed { ref field, .. } if field == "start_extent"));
}

#[test]
fn oversized_device_count_fails_import() {
    let text = VG_TEXT.replacen("device_count = 3", "device_count = 4294967295", 1);
    let err = VolumeGroup::import(&parse(&text).expect("parse"), &Registry::with_raid_types())
        .expect_err("count mismatch");
    assert!(matches!(err, Error::CountMismatch { .. }), "{err:?}");
}

#[test]
fn activation_table_spans_every_segment() {
    let vg = imported();
    let data = vg.find_lv("data").expect("data");
    let node = vg
        .activation_table(data, &CmdContext::new(Kernel(true)))
        .expect("table");

    assert_eq!(node.name, "vg--test-data");
    let table = node.table();
    assert_eq!(table.len(), 2);
    assert!(table[0].starts_with(
        "0 819200 raid raid5_ls 3 128 region_size 1024 3 vg--test-data_rmeta_0 "
    ));
    assert!(table[1].starts_with("819200 409600 raid raid5_ls "));
    assert_eq!(node.length(), 150 * 8192);
}

#[test]
fn activation_rejects_sector_counts_that_overflow() {
    let text = VG_TEXT
        .replace("extent_count = 100", "extent_count = 4611686018427387904")
        .replace("start_extent = 100", "start_extent = 4611686018427387904");
    let vg = VolumeGroup::import(&parse(&text).expect("parse"), &Registry::with_raid_types())
        .expect("import");
    let data = vg.find_lv("data").expect("data");
    let err = vg
        .activation_table(data, &CmdContext::new(Kernel(true)))
        .expect_err("overflow");
    match err {
        Error::ConfigMalformed { field, segment, lv, .. } => {
            assert_eq!(field, "extent_count");
            assert_eq!(segment, "segment1");
            assert_eq!(lv, "data");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn activation_requires_the_kernel_target() {
    let vg = imported();
    let data = vg.find_lv("data").expect("data");
    let ctx = CmdContext::new(Kernel(false));
    let err = vg.activation_table(data, &ctx).expect_err("no raid target");
    assert!(matches!(err, Error::KernelFeatureMissing(ref name) if name == "raid5_ls"));
    assert!(ctx.features().is_checked("raid"));
}

#[test]
fn sync_percent_aggregates_segments() {
    let mut vg = imported();
    let data = vg.find_lv("data").expect("data");
    let p = vg
        .sync_percent(data, &["raid5_ls 3 AAA 100/100", "raid5_ls 3 aaa 25/100"])
        .expect("percent");
    assert_eq!(p, Percent::new(125, 200));
    assert_eq!(p.to_string(), "62.50%");

    let lv = vg.lv(data).expect("lv");
    assert_eq!(lv.segments[0].extents_copied, 100);
    assert_eq!(lv.segments[1].extents_copied, 12);
}

#[test]
fn sync_percent_checks_line_count_and_type() {
    let mut vg = imported();
    let data = vg.find_lv("data").expect("data");

    let err = vg
        .sync_percent(data, &["raid5_ls 3 AAA 1/1"])
        .expect_err("one line for two segments");
    assert!(matches!(err, Error::CountMismatch { .. }));

    let err = vg
        .sync_percent(data, &["linear 0 8192", "raid5_ls 3 AAA 1/1"])
        .expect_err("foreign target");
    assert!(matches!(err, Error::Parse { .. }));
}

#[test]
fn sync_percent_leaves_segments_untouched_on_a_bad_line() {
    let mut vg = imported();
    let data = vg.find_lv("data").expect("data");
    let err = vg
        .sync_percent(data, &["raid5_ls 3 AAA 100/100", "raid5_ls 3 AAA abc"])
        .expect_err("second line is malformed");
    assert!(matches!(err, Error::Parse { .. }), "{err:?}");

    let lv = vg.lv(data).expect("lv");
    assert!(lv.segments.iter().all(|seg| seg.extents_copied == 0));
}

#[test]
fn push_segment_enforces_contiguity() {
    let registry = Registry::with_raid_types();
    let raid1 = registry.lookup("raid1").expect("raid1");
    let mut vg = VolumeGroup::new("vg", 8192);
    let lv = vg.add_lv("m", LvStatus::VISIBLE).expect("lv");
    let other = vg.add_lv("n", LvStatus::VISIBLE).expect("lv");

    vg.push_segment(lv, Segment::new(Arc::clone(&raid1), lv, 0, 10, 10, 2))
        .expect("first segment");
    let err = vg
        .push_segment(lv, Segment::new(Arc::clone(&raid1), lv, 11, 5, 5, 2))
        .expect_err("gap");
    assert!(err.is_internal());
    let err = vg
        .push_segment(lv, Segment::new(Arc::clone(&raid1), other, 10, 5, 5, 2))
        .expect_err("wrong owner");
    assert!(err.is_internal());
    vg.push_segment(lv, Segment::new(raid1, lv, 10, 5, 5, 2))
        .expect("second segment");
    assert_eq!(vg.lv(lv).expect("lv").le_count(), 15);
}

#[test]
fn duplicate_volume_names_are_refused() {
    let mut vg = VolumeGroup::new("vg", 8192);
    vg.add_lv("a", LvStatus::VISIBLE).expect("first");
    assert!(vg.add_lv("a", LvStatus::VISIBLE).is_err());
    assert_eq!(vg.dm_name(vg.find_lv("a").expect("a")).as_deref(), Some("vg-a"));
}
