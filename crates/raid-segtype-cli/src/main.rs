mod cli;

use std::path::Path;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use raid_segtype::activate::{CmdContext, KernelTargets, SysfsTargets};
use raid_segtype::config;
use raid_segtype::device::{Device, DeviceIo, DryRun, OpenMode};
use raid_segtype::metadata::{VolumeGroup, VolumeLookup};
use raid_segtype::segtype::Registry;

use crate::cli::{Cli, Command, DeviceArgs, ModulesArgs, ShowArgs, StatusArgs, ZeroArgs};

/// Reports every target as available, for rendering tables off-host.
struct AssumePresent;

impl KernelTargets for AssumePresent {
    fn target_present(&self, _target: &str, _load_module: bool) -> bool {
        true
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = Registry::with_raid_types();

    match cli.command {
        Command::Show(args) => show(&registry, &args),
        Command::Export(args) => {
            let vg = load(&registry, &args.metadata)?;
            print!("{}", vg.export().context("export metadata")?);
            Ok(())
        }
        Command::Status(args) => status(&registry, &args),
        Command::Modules(args) => modules(&registry, &args),
        Command::Size(args) => size(&args),
        Command::Zero(args) => zero(&args),
    }
}

fn load(registry: &Registry, path: &Path) -> anyhow::Result<VolumeGroup> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read metadata from {}", path.display()))?;
    let root = config::parse(&text).with_context(|| format!("parse {}", path.display()))?;
    VolumeGroup::import(&root, registry)
        .with_context(|| format!("import volume group from {}", path.display()))
}

fn show(registry: &Registry, args: &ShowArgs) -> anyhow::Result<()> {
    let vg = load(registry, &args.source.metadata)?;
    let ctx = if args.assume_present {
        CmdContext::new(AssumePresent)
    } else {
        CmdContext::new(SysfsTargets::default())
    };

    println!("{} (extent size {} sectors)", vg.name, vg.extent_size);
    for lv in vg.lvs() {
        if lv.segments.is_empty() {
            continue;
        }
        println!(
            "  {} [{}] {} extents",
            lv.name,
            lv.status.words().join(","),
            lv.le_count()
        );
        for seg in &lv.segments {
            let segtype = seg.segtype();
            println!(
                "    {}..{} {} devices={} parity={} region={} stripe={}",
                seg.le,
                seg.le.saturating_add(seg.len),
                segtype.name(),
                seg.area_count(),
                segtype.parity_devs(),
                seg.region_size,
                seg.stripe_size
            );
        }
        match vg.activation_table(lv.id(), &ctx) {
            Ok(node) => {
                for line in node.table() {
                    println!("    {}: {line}", node.name);
                }
            }
            Err(err) => warn!(
                "no table for {}: {err}",
                vg.dm_name(lv.id()).unwrap_or_default()
            ),
        }
    }
    Ok(())
}

fn status(registry: &Registry, args: &StatusArgs) -> anyhow::Result<()> {
    let mut vg = load(registry, &args.source.metadata)?;
    let id = vg
        .find_lv(&args.lv)
        .with_context(|| format!("no logical volume {} in {}", args.lv, vg.name))?;
    let lines: Vec<&str> = args.lines.iter().map(String::as_str).collect();
    let total = vg
        .sync_percent(id, &lines)
        .with_context(|| format!("interpret status of {}", args.lv))?;

    if let Some(lv) = vg.lv(id) {
        for seg in &lv.segments {
            println!(
                "{} segment at {}: {}/{} extents in sync",
                lv.name, seg.le, seg.extents_copied, seg.area_len
            );
        }
    }
    println!("{}: {total}", args.lv);
    Ok(())
}

fn modules(registry: &Registry, args: &ModulesArgs) -> anyhow::Result<()> {
    let ctx = CmdContext::default();
    for module in registry.modules_needed() {
        if args.check {
            let present = ctx.target_present(&module);
            println!("{module}\t{}", if present { "present" } else { "missing" });
        } else {
            println!("{module}");
        }
    }
    Ok(())
}

fn size(args: &DeviceArgs) -> anyhow::Result<()> {
    let dev = Device::new(&args.device);
    let sectors = dev
        .size()
        .with_context(|| format!("size of {}", args.device.display()))?;
    println!("{sectors}");
    Ok(())
}

fn zero(args: &ZeroArgs) -> anyhow::Result<()> {
    if args.len == 0 {
        bail!("refusing to zero an empty range");
    }
    let mode = if args.dry_run {
        OpenMode::ReadOnly
    } else {
        OpenMode::ReadWrite
    };
    let mut dev = Device::new(&args.device);
    dev.open(mode)
        .with_context(|| format!("open {}", args.device.display()))?;

    if args.dry_run {
        let mut dry = DryRun::new(dev);
        dry.zero(args.offset, args.len)
            .with_context(|| format!("zero {}", args.device.display()))?;
        info!(
            "dry run: would have zeroed {} bytes at offset {} of {}",
            dry.skipped_bytes(),
            args.offset,
            args.device.display()
        );
        dev = dry.into_inner();
    } else {
        dev.zero(args.offset, args.len)
            .with_context(|| format!("zero {}", args.device.display()))?;
        info!(
            "zeroed {} bytes at offset {} of {}",
            args.len,
            args.offset,
            args.device.display()
        );
    }
    dev.close()
        .with_context(|| format!("close {}", args.device.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const METADATA: &str = r#"
vg0 {
	extent_size = 8192
	logical_volumes {
		m {
			status = ["READ", "WRITE", "VISIBLE"]
			segment_count = 1
			segment1 {
				start_extent = 0
				extent_count = 4
				type = "raid1"
				device_count = 2
				region_size = 1024
				raids = ["m_rmeta_0", "m_rimage_0", "m_rmeta_1", "m_rimage_1"]
			}
		}
		m_rmeta_0 { status = ["RAID_META"] segment_count = 0 }
		m_rimage_0 { status = ["RAID_IMAGE"] segment_count = 0 }
		m_rmeta_1 { status = ["RAID_META"] segment_count = 0 }
		m_rimage_1 { status = ["RAID_IMAGE"] segment_count = 0 }
	}
}
"#;

    #[test]
    fn load_reads_and_imports_a_metadata_file() {
        let mut tf = tempfile::NamedTempFile::new().expect("tmp file");
        tf.write_all(METADATA.as_bytes()).expect("write");

        let vg = load(&Registry::with_raid_types(), tf.path()).expect("load");
        let m = vg.lv_by_name("m").expect("m");
        assert_eq!(m.le_count(), 4);
        let node = vg
            .activation_table(m.id(), &CmdContext::new(AssumePresent))
            .expect("table");
        assert_eq!(
            node.table(),
            vec![
                "0 32768 raid raid1 3 0 region_size 1024 2 \
                 vg0-m_rmeta_0 vg0-m_rimage_0 vg0-m_rmeta_1 vg0-m_rimage_1"
                    .to_string()
            ]
        );
    }

    #[test]
    fn load_reports_the_failing_file() {
        let mut tf = tempfile::NamedTempFile::new().expect("tmp file");
        tf.write_all(b"vg0 {\n\textent_size = \n}\n").expect("write");

        let err = load(&Registry::with_raid_types(), tf.path()).expect_err("syntax error");
        assert!(format!("{err:#}").contains("line 3"), "{err:#}");
    }
}
