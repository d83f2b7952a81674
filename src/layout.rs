//! Fixed layout of the PhantomJS source tree.

use std::path::{Path, PathBuf};

use crate::platform::PlatformProfile;

/// Absolute paths inside a PhantomJS checkout.
#[derive(Debug, Clone)]
pub struct SourceLayout {
    root: PathBuf,
}

impl SourceLayout {
    /// `root` should already be absolute; every derived path inherits that.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn git_dir(&self) -> PathBuf {
        self.root.join(".git")
    }

    pub fn qtbase(&self) -> PathBuf {
        self.root.join("src/qt/qtbase")
    }

    /// Qt WebKit sources.
    pub fn webkit(&self) -> PathBuf {
        self.root.join("src/qt/webkit")
    }

    /// Install prefix for Qt WebKit, recreated on every engine build.
    pub fn qtwebkit(&self) -> PathBuf {
        self.root.join("src/qt/qtwebkit")
    }

    pub fn webkit_release_build(&self) -> PathBuf {
        self.webkit().join("WebKitBuild/Release")
    }

    pub fn webkit_driver(&self) -> PathBuf {
        self.webkit().join("Tools/Scripts/build-webkit")
    }

    pub fn sqlite_sources(&self) -> PathBuf {
        self.qtbase().join("src/3rdparty/sqlite")
    }

    /// Bundled third-party libraries used on Windows.
    pub fn third_party(&self) -> PathBuf {
        self.root.join("src/qt/3rdparty")
    }

    pub fn qtbase_configure(&self, platform: &PlatformProfile) -> PathBuf {
        self.qtbase()
            .join(format!("configure{}", platform.script_suffix()))
    }

    /// qmake is produced by the Qt Base build, so its location is fixed.
    pub fn qmake(&self, platform: &PlatformProfile) -> PathBuf {
        self.qtbase()
            .join("bin")
            .join(format!("qmake{}", platform.exe_suffix()))
    }
}
