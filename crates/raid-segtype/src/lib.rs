//! RAID segment types for logical volume metadata: text import and export,
//! device-mapper table construction, and kernel status interpretation.
#![allow(clippy::cargo_common_metadata)]

pub mod activate;
pub mod config;
pub mod device;
pub mod error;
pub mod metadata;
pub mod percent;
pub mod segtype;

pub use error::{Error, Result};
