//! Activation context: kernel feature probing and device-mapper tables.

mod target;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

pub use target::{RaidDevice, RaidTarget, RaidTargetFlags, TargetNode};

use crate::error::{Error, Result};

/// Answers whether the running kernel provides a device-mapper target type.
pub trait KernelTargets: Send + Sync {
    /// `load_module` allows the probe to try loading the module first.
    fn target_present(&self, target: &str, load_module: bool) -> bool;
}

/// Probes `/sys/module/dm_<target>`, optionally after `modprobe dm-<target>`.
#[derive(Debug, Clone)]
pub struct SysfsTargets {
    module_root: PathBuf,
}

impl Default for SysfsTargets {
    fn default() -> Self {
        Self {
            module_root: PathBuf::from("/sys/module"),
        }
    }
}

impl SysfsTargets {
    pub fn with_root(module_root: impl Into<PathBuf>) -> Self {
        Self {
            module_root: module_root.into(),
        }
    }

    fn loaded(&self, target: &str) -> bool {
        self.module_root.join(format!("dm_{target}")).exists()
    }
}

impl KernelTargets for SysfsTargets {
    fn target_present(&self, target: &str, load_module: bool) -> bool {
        if self.loaded(target) {
            return true;
        }
        if !load_module {
            return false;
        }
        let module = format!("dm-{target}");
        match Command::new("modprobe").arg(&module).status() {
            Ok(status) if status.success() => self.loaded(target),
            Ok(status) => {
                warn!("modprobe {module} exited with {status}");
                false
            }
            Err(err) => {
                warn!("modprobe {module} could not be run: {err}");
                false
            }
        }
    }
}

/// Memoised probe results. Each target type is probed at most once per cache,
/// and the first answer is kept even if the kernel changes afterwards.
#[derive(Debug, Default)]
pub struct FeatureCache {
    probed: Mutex<HashMap<String, bool>>,
}

impl FeatureCache {
    pub fn check(&self, target: &str, probe: impl FnOnce() -> bool) -> bool {
        let mut probed = self.probed.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&present) = probed.get(target) {
            return present;
        }
        let present = probe();
        debug!("kernel target {target}: present={present}");
        probed.insert(target.to_string(), present);
        present
    }

    #[must_use]
    pub fn is_checked(&self, target: &str) -> bool {
        self.probed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(target)
    }
}

/// Per-command state handed to segment types during activation.
pub struct CmdContext {
    kernel: Box<dyn KernelTargets>,
    features: FeatureCache,
}

impl CmdContext {
    pub fn new(kernel: impl KernelTargets + 'static) -> Self {
        Self {
            kernel: Box::new(kernel),
            features: FeatureCache::default(),
        }
    }

    #[must_use]
    pub fn kernel(&self) -> &dyn KernelTargets {
        self.kernel.as_ref()
    }

    #[must_use]
    pub const fn features(&self) -> &FeatureCache {
        &self.features
    }

    /// Memoised presence check for `target`, loading its module if needed.
    pub fn target_present(&self, target: &str) -> bool {
        self.features
            .check(target, || self.kernel.target_present(target, true))
    }

    /// # Errors
    /// Returns [`Error::KernelFeatureMissing`] if the target is unavailable.
    pub fn require_target(&self, target: &str) -> Result<()> {
        if self.target_present(target) {
            Ok(())
        } else {
            Err(Error::KernelFeatureMissing(target.to_string()).logged())
        }
    }
}

impl Default for CmdContext {
    fn default() -> Self {
        Self::new(SysfsTargets::default())
    }
}

impl std::fmt::Debug for CmdContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmdContext")
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}
