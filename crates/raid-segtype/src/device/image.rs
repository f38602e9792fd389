//! Memory-mapped image files standing in for physical devices.

use memmap2::{MmapMut, MmapOptions};
use std::fs::File;
use std::path::{Path, PathBuf};

use super::{DeviceIo, SECTOR_SIZE};
use crate::error::{Error, Result};

pub struct ImageDevice {
    path: PathBuf,
    name: String,
    file: Option<File>,
    map: Option<MmapMut>,
    len: u64,
}

impl ImageDevice {
    /// Opens (creating if needed) an image of exactly `len` bytes and maps it.
    ///
    /// # Errors
    /// Returns an error if the image cannot be created, sized or mapped.
    pub fn open_prealloc(path: impl AsRef<Path>, len: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let name = path.display().to_string();

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::io("open", &name, e).logged())?;
        file.set_len(len)
            .map_err(|e| Error::io("truncate", &name, e).logged())?;

        let map_len = usize::try_from(len).map_err(|_| {
            Error::Internal(format!("image length {len} exceeds addressable size")).logged()
        })?;
        // SAFETY: the mapping is private to this struct and the file stays open alongside it.
        let map = unsafe { MmapOptions::new().len(map_len).map_mut(&file) }
            .map_err(|e| Error::io("mmap", &name, e).logged())?;

        Ok(Self {
            path,
            name,
            file: Some(file),
            map: Some(map),
            len,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flushes dirty pages to the backing file.
    ///
    /// # Errors
    /// Returns an error if the image is closed or msync fails.
    pub fn flush(&self) -> Result<()> {
        let map = self
            .map
            .as_ref()
            .ok_or_else(|| Error::NotOpen(self.name.clone()).logged())?;
        map.flush()
            .map_err(|e| Error::io("msync", &self.name, e).logged())
    }

    /// Unmaps and closes the image.
    ///
    /// # Errors
    /// Returns [`Error::NotOpen`] if already closed.
    pub fn close(&mut self) -> Result<()> {
        if self.map.is_none() {
            return Err(Error::NotOpen(self.name.clone()).logged());
        }
        self.flush()?;
        self.map.take();
        self.file.take();
        Ok(())
    }

    fn map_offset(&self, off: u64) -> Result<Option<usize>> {
        if self.map.is_none() {
            return Err(Error::NotOpen(self.name.clone()).logged());
        }
        if off >= self.len {
            return Ok(None);
        }
        Ok(usize::try_from(off).ok())
    }
}

impl DeviceIo for ImageDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let Some(off) = self.map_offset(offset)? else {
            return Ok(0);
        };
        let Some(map) = self.map.as_ref() else {
            return Ok(0);
        };
        let end = off.saturating_add(buf.len()).min(map.len());
        let src = &map[off..end];
        let n = src.len();
        buf[..n].copy_from_slice(src);
        Ok(n)
    }

    /// Writes past the end of the image are truncated.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<usize> {
        let Some(off) = self.map_offset(offset)? else {
            return Ok(0);
        };
        let Some(map) = self.map.as_mut() else {
            return Ok(0);
        };
        let end = off.saturating_add(data.len()).min(map.len());
        let dst = &mut map[off..end];
        let n = dst.len();
        dst.copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn size(&self) -> Result<u64> {
        Ok(self.len / SECTOR_SIZE)
    }
}
