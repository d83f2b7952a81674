//! Resolution of the external executables a build needs.
//!
//! Lookups never fail on their own: [`ToolLocator::locate`] returns `None`
//! and the caller decides whether absence is fatal. The `require_*` helpers
//! encode that decision for the tools the stages depend on.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};
use crate::layout::SourceLayout;
use crate::platform::{HostEnv, PlatformProfile};

/// Check that a path is an existing regular file we are allowed to execute.
pub fn is_executable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => {
            if !meta.is_file() {
                return false;
            }
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if meta.permissions().mode() & 0o111 == 0 {
                    return false;
                }
            }
            true
        }
        Err(_) => false,
    }
}

#[derive(Debug, Clone)]
pub struct ToolLocator {
    search_path: Option<OsString>,
    cwd: PathBuf,
}

impl ToolLocator {
    pub fn new(env: &HostEnv, cwd: impl Into<PathBuf>) -> Self {
        Self {
            search_path: env.path.clone(),
            cwd: cwd.into(),
        }
    }

    /// Find `name`, first as a path (relative to the working directory),
    /// then in each directory of the search path.
    ///
    /// Platform suffixes such as `.exe` are the caller's business.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        let direct = self.cwd.join(name);
        if is_executable(&direct) {
            return Some(direct);
        }

        let search_path = self.search_path.as_ref()?;
        which::which_in(name, Some(search_path), &self.cwd)
            .ok()
            .filter(|path| is_executable(path))
    }

    /// Resolve a tool that must exist, except in dry-run where the bare name
    /// stands in for it.
    pub fn require(&self, name: &str, dry_run: bool) -> Result<PathBuf> {
        match self.locate(name) {
            Some(path) => Ok(path),
            None if dry_run => Ok(PathBuf::from(name)),
            None => Err(BuildError::ToolNotFound {
                tool: name.to_string(),
                location: PathBuf::from(name),
            }),
        }
    }

    /// The make-equivalent for this platform: jom when available on Windows,
    /// falling back to nmake; make everywhere else.
    pub fn make_tool(&self, platform: &PlatformProfile, dry_run: bool) -> Result<PathBuf> {
        if platform.is_windows() {
            if let Some(jom) = self.locate("jom.exe") {
                return Ok(jom);
            }
            return self.require("nmake.exe", dry_run);
        }
        self.require("make", dry_run)
    }

    /// qmake lives at a fixed place inside Qt Base, built by an earlier stage.
    pub fn build_config_tool(layout: &SourceLayout, platform: &PlatformProfile) -> PathBuf {
        layout.qmake(platform)
    }

    /// Like [`ToolLocator::build_config_tool`], but verifies Qt Base actually
    /// produced it. Dry runs skip the check.
    pub fn require_build_config_tool(
        layout: &SourceLayout,
        platform: &PlatformProfile,
        dry_run: bool,
    ) -> Result<PathBuf> {
        let qmake = Self::build_config_tool(layout, platform);
        if !dry_run && !is_executable(&qmake) {
            return Err(BuildError::ToolNotFound {
                tool: "QMake".to_string(),
                location: qmake,
            });
        }
        Ok(qmake)
    }
}
