//! Host facts captured once at startup.
//!
//! [`PlatformProfile`] describes the OS family and what that implies for the
//! option tables. [`HostEnv`] is the only place the process environment is
//! read; everything downstream receives it by reference so the rest of the
//! crate stays testable for any platform on any host.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

/// Fallback when the CPU count cannot be detected.
const DEFAULT_CPU_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Windows,
    Darwin,
    /// Linux, the BSDs and any other Unix.
    OtherUnix,
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Windows => write!(f, "windows"),
            OsFamily::Darwin => write!(f, "darwin"),
            OsFamily::OtherUnix => write!(f, "unix"),
        }
    }
}

/// Read-only facts about the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformProfile {
    pub family: OsFamily,
}

impl PlatformProfile {
    pub fn detect() -> Self {
        let family = if cfg!(windows) {
            OsFamily::Windows
        } else if cfg!(target_os = "macos") {
            OsFamily::Darwin
        } else {
            OsFamily::OtherUnix
        };
        Self { family }
    }

    pub fn for_family(family: OsFamily) -> Self {
        Self { family }
    }

    pub fn is_windows(&self) -> bool {
        self.family == OsFamily::Windows
    }

    /// Bundled ICU/libxml/OpenSSL/zlib must be passed explicitly on Windows.
    pub fn needs_third_party_search(&self) -> bool {
        self.is_windows()
    }

    /// OpenSSL has no system location on Darwin and has to be discovered.
    pub fn needs_openssl_discovery(&self) -> bool {
        self.family == OsFamily::Darwin
    }

    /// Qt's configure has no `-silent` on Windows.
    pub fn supports_silent(&self) -> bool {
        !self.is_windows()
    }

    /// Executable suffix appended by callers (`.exe` on Windows).
    pub fn exe_suffix(&self) -> &'static str {
        if self.is_windows() {
            ".exe"
        } else {
            ""
        }
    }

    /// Suffix of Qt Base's configure script.
    pub fn script_suffix(&self) -> &'static str {
        if self.is_windows() {
            ".bat"
        } else {
            ""
        }
    }
}

/// Snapshot of the environment variables and host resources a run consumes.
#[derive(Debug, Clone, Default)]
pub struct HostEnv {
    /// Inherited `MAKEFLAGS`, possibly carrying a `-j N` from an outer make.
    pub makeflags: Option<String>,
    /// `OPENSSL` override directory. An empty value counts as unset.
    pub openssl: Option<PathBuf>,
    /// Executable search path (`PATH`).
    pub path: Option<OsString>,
    pub cpu_count: usize,
}

impl HostEnv {
    pub fn capture() -> Self {
        let cpu_count = match std::thread::available_parallelism() {
            Ok(n) => n.get(),
            Err(e) => {
                tracing::warn!(
                    "Could not detect CPU count ({}), using {} cores",
                    e,
                    DEFAULT_CPU_COUNT
                );
                DEFAULT_CPU_COUNT
            }
        };

        Self {
            makeflags: std::env::var("MAKEFLAGS").ok(),
            openssl: std::env::var_os("OPENSSL")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            path: std::env::var_os("PATH"),
            cpu_count,
        }
    }
}
