use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "raidseg",
    author,
    version,
    about = "Inspect RAID logical volume metadata"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List volumes, their RAID segments and the table lines they activate to.
    Show(ShowArgs),

    /// Re-export metadata in normalised form.
    Export(MetadataArgs),

    /// Interpret kernel status lines for a volume's segments.
    Status(StatusArgs),

    /// Kernel modules required by the RAID segment types.
    Modules(ModulesArgs),

    /// Print a device's size in 512-byte sectors.
    Size(DeviceArgs),

    /// Overwrite a byte range of a device with zeros.
    Zero(ZeroArgs),
}

#[derive(Args, Debug)]
pub struct MetadataArgs {
    #[arg(env = "RAIDSEG_METADATA")]
    pub metadata: PathBuf,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub source: MetadataArgs,

    /// Render table lines even if the kernel lacks the raid target.
    #[arg(long)]
    pub assume_present: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub source: MetadataArgs,

    #[arg(long)]
    pub lv: String,

    /// One status line per segment, in segment order.
    #[arg(required = true)]
    pub lines: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ModulesArgs {
    /// Also probe whether the kernel provides each target.
    #[arg(long)]
    pub check: bool,
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    pub device: PathBuf,
}

#[derive(Args, Debug)]
pub struct ZeroArgs {
    pub device: PathBuf,

    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    #[arg(long)]
    pub len: u64,

    #[arg(long, env = "RAIDSEG_DRY_RUN")]
    pub dry_run: bool,
}
