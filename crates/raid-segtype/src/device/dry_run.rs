use tracing::debug;

use super::DeviceIo;
use crate::error::Result;

/// Passes reads through and reports every write as complete without touching storage.
#[derive(Debug)]
pub struct DryRun<D> {
    inner: D,
    skipped: u64,
}

impl<D: DeviceIo> DryRun<D> {
    pub const fn new(inner: D) -> Self {
        Self { inner, skipped: 0 }
    }

    /// Bytes that would have been written.
    #[must_use]
    pub const fn skipped_bytes(&self) -> u64 {
        self.skipped
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: DeviceIo> DeviceIo for DryRun<D> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.inner.read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<usize> {
        debug!(
            "dry run: skipping write of {} bytes at {offset} on {}",
            data.len(),
            self.inner.name()
        );
        self.skipped += data.len() as u64;
        Ok(data.len())
    }

    fn size(&self) -> Result<u64> {
        self.inner.size()
    }
}
