//! Per-stage argument lists.
//!
//! The platform specific parts live in `tables.toml` as data: one ordered
//! flag list per OS family plus the shared configure flags, feature-disable
//! defines and Qt WebKit driver options. [`OptionProfileBuilder`] combines
//! those tables with the options of the run. Every method is a pure function
//! of its inputs (apart from the OpenSSL probe on Darwin), so each platform
//! branch can be tested on any host.
//!
//! Ordering contract: user-supplied extra flags are always appended after
//! every computed flag of the same list.

pub mod openssl;

use std::num::NonZeroUsize;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{BuildError, Result};
use crate::layout::SourceLayout;
use crate::options::BuildOptions;
use crate::platform::{HostEnv, OsFamily, PlatformProfile};

pub use openssl::{discover_openssl, OpensslLocation, OpensslTables};

const BUILTIN_TABLES: &str = include_str!("tables.toml");

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileTables {
    /// Emitted as `-D <define>` for configure and forwarded to Qt WebKit.
    pub compile_defines: Vec<String>,
    pub configure: ConfigureTables,
    pub openssl: OpensslTables,
    pub webkit: WebkitTables,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigureTables {
    pub common: Vec<String>,
    pub windows: WindowsOptions,
    pub unix: OptionList,
    pub darwin: OptionList,
    pub other_unix: OptionList,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowsOptions {
    pub options: Vec<String>,
    /// Bundled libraries under `src/qt/3rdparty`.
    pub third_party_libraries: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionList {
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebkitTables {
    pub driver_args: Vec<String>,
    pub cmake_args: Vec<String>,
    pub features: Vec<String>,
}

impl ProfileTables {
    /// Tables compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_TABLES)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// `-j N` in an inherited `MAKEFLAGS`, found anywhere in the value, not only
/// at its start.
static JOB_COUNT: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"-j\s*[0-9]+"));

/// Parallelism flags for make.
///
/// An explicit job count always wins. Otherwise a `-j N` already present in
/// the inherited `MAKEFLAGS` is left to the outer build; only when there is
/// none is the host CPU count injected.
pub fn job_flags(
    jobs: Option<NonZeroUsize>,
    makeflags: Option<&str>,
    cpu_count: usize,
) -> Result<Vec<String>> {
    if let Some(jobs) = jobs {
        return Ok(vec!["-j".to_string(), jobs.to_string()]);
    }
    if let Some(makeflags) = makeflags {
        let pattern = JOB_COUNT.as_ref().map_err(|e| BuildError::Pattern(e.clone()))?;
        if pattern.is_match(makeflags) {
            return Ok(Vec::new());
        }
    }
    Ok(vec!["-j".to_string(), cpu_count.to_string()])
}

/// Values substituted for `{name}` placeholders in the tables.
struct Placeholders {
    qtbase: String,
    qtwebkit: String,
    compile_defines: String,
    touch_events: &'static str,
}

impl Placeholders {
    fn expand(&self, template: &str) -> String {
        template
            .replace("{qtbase}", &self.qtbase)
            .replace("{qtwebkit}", &self.qtwebkit)
            .replace("{compile_defines}", &self.compile_defines)
            .replace("{touch_events}", self.touch_events)
    }

    fn expand_all(&self, templates: &[String]) -> Vec<String> {
        templates.iter().map(|t| self.expand(t)).collect()
    }
}

/// Builds the argument list of every stage for one run.
pub struct OptionProfileBuilder<'a> {
    tables: &'a ProfileTables,
    layout: &'a SourceLayout,
    platform: PlatformProfile,
    options: &'a BuildOptions,
    env: &'a HostEnv,
}

impl<'a> OptionProfileBuilder<'a> {
    pub fn new(
        tables: &'a ProfileTables,
        layout: &'a SourceLayout,
        platform: PlatformProfile,
        options: &'a BuildOptions,
        env: &'a HostEnv,
    ) -> Self {
        Self {
            tables,
            layout,
            platform,
            options,
            env,
        }
    }

    fn placeholders(&self) -> Placeholders {
        Placeholders {
            qtbase: self.layout.qtbase().display().to_string(),
            qtwebkit: self.layout.qtwebkit().display().to_string(),
            compile_defines: self.tables.compile_defines.join(" "),
            touch_events: if self.options.disable_touch_events {
                "OFF"
            } else {
                "ON"
            },
        }
    }

    /// Flags that follow the make tool on every make invocation.
    pub fn make_flags(&self) -> Result<Vec<String>> {
        if self.platform.is_windows() {
            return Ok(vec!["/NOLOGO".to_string()]);
        }
        job_flags(
            self.options.jobs,
            self.env.makeflags.as_deref(),
            self.env.cpu_count,
        )
    }

    /// Qt Base configure arguments: shared flags, feature defines, platform
    /// options, build mode, then the user's `--qt-config` flags.
    pub fn qtbase_configure_args(&self) -> Result<Vec<String>> {
        let placeholders = self.placeholders();
        let mut args = placeholders.expand_all(&self.tables.configure.common);

        for define in &self.tables.compile_defines {
            args.push("-D".to_string());
            args.push(define.clone());
        }

        args.extend(self.platform_configure_options()?);
        args.push(self.options.mode.configure_flag().to_string());
        args.extend(self.options.extra.qt_config.iter().cloned());
        Ok(args)
    }

    /// The OS-family branch of the configure options.
    pub fn platform_configure_options(&self) -> Result<Vec<String>> {
        let configure = &self.tables.configure;
        let mut options = Vec::new();

        match self.platform.family {
            OsFamily::Windows => {
                options.extend(configure.windows.options.iter().cloned());
                options.extend(self.third_party_flags());
                if self.options.silent {
                    tracing::warn!("--silent is not supported on Windows, ignoring it");
                }
            }
            OsFamily::Darwin | OsFamily::OtherUnix => {
                options.extend(configure.unix.options.iter().cloned());
                if self.options.silent && self.platform.supports_silent() {
                    options.push("-silent".to_string());
                }
                if self.platform.family == OsFamily::Darwin {
                    options.extend(configure.darwin.options.iter().cloned());
                } else {
                    options.extend(configure.other_unix.options.iter().cloned());
                }
                if self.platform.needs_openssl_discovery() {
                    options.extend(discover_openssl(
                        self.env.openssl.as_deref(),
                        &self.tables.openssl,
                    )?);
                }
            }
        }

        Ok(options)
    }

    /// `-I <dir>` pairs for every bundled library, followed by the `-L <dir>`
    /// pairs.
    fn third_party_flags(&self) -> Vec<String> {
        if !self.platform.needs_third_party_search() {
            return Vec::new();
        }
        let base = self.layout.third_party();
        let libraries = &self.tables.configure.windows.third_party_libraries;

        let mut includes = Vec::new();
        let mut libs = Vec::new();
        for library in libraries {
            includes.push("-I".to_string());
            includes.push(base.join(library).join("include").display().to_string());
            libs.push("-L".to_string());
            libs.push(base.join(library).join("lib").display().to_string());
        }
        includes.extend(libs);
        includes
    }

    /// Arguments of Qt WebKit's `build-webkit` driver.
    ///
    /// The cmake arguments travel as a single `--cmakeargs=...` argument; the
    /// compile definitions inside it are quoted so they stay one cmake value.
    pub fn webkit_driver_args(&self) -> Vec<String> {
        let placeholders = self.placeholders();
        let webkit = &self.tables.webkit;

        let mut args = webkit.driver_args.clone();
        args.push(format!(
            "--cmakeargs={}",
            placeholders.expand_all(&webkit.cmake_args).join(" ")
        ));
        args.extend(webkit.features.iter().cloned());
        args.extend(self.options.extra.webkit.iter().cloned());
        args
    }

    /// qmake arguments for PhantomJS itself: the flags meant for every qmake
    /// call, then the PhantomJS specific ones.
    pub fn phantomjs_qmake_args(&self) -> Vec<String> {
        self.options
            .extra
            .qmake
            .iter()
            .chain(self.options.extra.phantomjs.iter())
            .cloned()
            .collect()
    }
}
