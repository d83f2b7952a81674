//! Everything a run knows before its first invocation.

use std::path::PathBuf;

use crate::layout::SourceLayout;
use crate::locate::ToolLocator;
use crate::options::BuildOptions;
use crate::platform::{HostEnv, PlatformProfile};

/// Why version-control operations are (not) available for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vcs {
    Enabled,
    /// `--skip-git` was given.
    SkippedByRequest,
    /// No `.git` directory at the source root, e.g. a release tarball.
    Absent,
}

/// Read-only inputs shared by every stage of one run.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub layout: SourceLayout,
    pub platform: PlatformProfile,
    pub options: BuildOptions,
    pub env: HostEnv,
    pub vcs: Vcs,
}

impl BuildContext {
    /// `root` must be absolute. The `.git` check happens here, once.
    pub fn new(
        root: impl Into<PathBuf>,
        platform: PlatformProfile,
        options: BuildOptions,
        env: HostEnv,
    ) -> Self {
        let layout = SourceLayout::new(root);
        let vcs = if options.skip.git {
            Vcs::SkippedByRequest
        } else if !layout.git_dir().is_dir() {
            tracing::info!(
                "No git checkout at {}, skipping all git operations",
                layout.root().display()
            );
            Vcs::Absent
        } else {
            Vcs::Enabled
        };

        Self {
            layout,
            platform,
            options,
            env,
            vcs,
        }
    }

    pub fn git_enabled(&self) -> bool {
        self.vcs == Vcs::Enabled
    }

    pub fn locator(&self) -> ToolLocator {
        ToolLocator::new(&self.env, self.layout.root())
    }

    /// Whether Qt Base's configure step runs. A git clean wipes the previous
    /// configuration, so it forces configure even when skipping was asked.
    pub fn configures_qtbase(&self) -> bool {
        let skip = &self.options.skip;
        !skip.qtbase && (self.options.git_clean_qtbase || !skip.configure_qtbase)
    }
}
