//! Positioned I/O on block devices and image files.

mod dry_run;
mod file;
mod image;

pub use dry_run::DryRun;
pub use file::{Device, OpenMode};
pub use image::ImageDevice;

use std::io;

use crate::error::{Error, Result};

/// Size unit reported by [`DeviceIo::size`].
pub const SECTOR_SIZE: u64 = 512;

const ZERO_CHUNK: usize = 4096;

/// DeviceIo is the seam between metadata code and storage.
pub trait DeviceIo {
    /// Name used in log and error messages.
    fn name(&self) -> &str;

    /// Reads up to `buf.len()` bytes at `offset`; a short count means end of device.
    ///
    /// # Errors
    /// Returns an error if the device is not open or the read fails before any byte arrives.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Writes `data` at `offset` and returns the number of bytes written.
    ///
    /// # Errors
    /// Returns an error if the device is not open or the write fails before any byte lands.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<usize>;

    /// Device size in 512-byte sectors.
    ///
    /// # Errors
    /// Returns an error if the size cannot be queried.
    fn size(&self) -> Result<u64>;

    /// Overwrites `len` bytes at `offset` with zeros, in chunks.
    ///
    /// # Errors
    /// Returns [`Error::PartialWrite`] if the device stops accepting data before `len` bytes.
    fn zero(&mut self, offset: u64, len: u64) -> Result<()> {
        let zeros = [0u8; ZERO_CHUNK];
        let mut remaining = len;
        let mut pos = offset;
        while remaining > 0 {
            let chunk = usize::try_from(remaining).map_or(ZERO_CHUNK, |r| r.min(ZERO_CHUNK));
            let written = self.write_at(pos, &zeros[..chunk])?;
            if written == 0 {
                break;
            }
            remaining -= written as u64;
            pos += written as u64;
        }
        if remaining != 0 {
            return Err(Error::PartialWrite {
                device: self.name().to_string(),
                requested: len,
                remaining,
            }
            .logged());
        }
        Ok(())
    }
}

/// Interrupted and would-block conditions are transient and retried.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

/// Drives `op` until `len` bytes are transferred, end of device is hit, or a
/// hard error occurs. A hard error after partial progress reports the progress.
fn transfer_loop(
    len: usize,
    mut op: impl FnMut(usize) -> io::Result<usize>,
) -> io::Result<usize> {
    let mut total = 0;
    while total < len {
        match op(total) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(err) if is_transient(&err) => {}
            Err(_) if total > 0 => break,
            Err(err) => return Err(err),
        }
    }
    Ok(total)
}
