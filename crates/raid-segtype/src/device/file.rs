//! Block devices and regular files accessed through a file descriptor.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{FileExt, FileTypeExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{DeviceIo, SECTOR_SIZE, transfer_loop};
use crate::error::{Error, Result};

/// `_IO(0x12, 96)`: device size in 512-byte sectors as an unsigned long.
const BLKGETSIZE: libc::c_ulong = 0x1260;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// A device node or file that is opened and closed explicitly.
#[derive(Debug)]
pub struct Device {
    path: PathBuf,
    name: String,
    file: Option<File>,
}

impl Device {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self {
            path,
            name,
            file: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// # Errors
    /// Returns [`Error::AlreadyOpen`] if the device is open, or the OS error from `open`.
    pub fn open(&mut self, mode: OpenMode) -> Result<()> {
        if self.file.is_some() {
            return Err(Error::AlreadyOpen(self.name.clone()).logged());
        }
        let file = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(&self.path)
            .map_err(|e| Error::io("open", &self.name, e).logged())?;
        debug!("opened {} ({mode:?})", self.name);
        self.file = Some(file);
        Ok(())
    }

    /// # Errors
    /// Returns [`Error::NotOpen`] if the device is not open.
    pub fn close(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Err(Error::NotOpen(self.name.clone()).logged());
        };
        if let Err(err) = file.sync_all() {
            warn!("sync on close of {} failed: {err}", self.name);
        }
        Ok(())
    }

    fn file(&self) -> Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| Error::NotOpen(self.name.clone()).logged())
    }
}

fn blkgetsize(file: &File) -> io::Result<u64> {
    let mut sectors: libc::c_ulong = 0;
    // SAFETY: BLKGETSIZE stores a single unsigned long through the pointer.
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), BLKGETSIZE as _, &mut sectors) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(u64::from(sectors))
}

impl DeviceIo for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let file = self.file()?;
        let len = buf.len();
        transfer_loop(len, |done| file.read_at(&mut buf[done..], offset + done as u64))
            .map_err(|e| Error::io("read", &self.name, e).logged())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<usize> {
        let file = self.file()?;
        transfer_loop(data.len(), |done| {
            file.write_at(&data[done..], offset + done as u64)
        })
        .map_err(|e| Error::io("write", &self.name, e).logged())
    }

    /// Queried on a fresh descriptor, so the device need not be open.
    fn size(&self) -> Result<u64> {
        debug!("getting size of {}", self.name);
        let file = File::open(&self.path).map_err(|e| Error::io("open", &self.name, e).logged())?;
        let meta = file
            .metadata()
            .map_err(|e| Error::io("stat", &self.name, e).logged())?;
        if meta.file_type().is_block_device() {
            blkgetsize(&file).map_err(|e| Error::io("ioctl BLKGETSIZE", &self.name, e).logged())
        } else {
            Ok(meta.len() / SECTOR_SIZE)
        }
    }
}
