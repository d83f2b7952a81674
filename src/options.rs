//! User-facing build options.
//!
//! [`BuildFlags`] is the raw, unchecked set of switches as the front-end
//! parsed them. [`BuildOptions`] is the validated snapshot used for the whole
//! run; the only way to get one is `BuildOptions::try_from(flags)`.

use std::num::NonZeroUsize;

use crate::error::{BuildError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Debug,
    #[default]
    Release,
}

impl Mode {
    /// Resolve the mutually exclusive mode switches. Neither set means release.
    pub fn from_flags(debug: bool, release: bool) -> Result<Self> {
        match (debug, release) {
            (true, true) => Err(BuildError::ConflictingModes),
            (true, false) => Ok(Mode::Debug),
            _ => Ok(Mode::Release),
        }
    }

    /// Qt Base configure flag for this mode.
    pub fn configure_flag(self) -> &'static str {
        match self {
            Mode::Debug => "-debug",
            Mode::Release => "-release",
        }
    }
}

/// Unvalidated switches, one field per command-line option.
#[derive(Debug, Clone, Default)]
pub struct BuildFlags {
    pub debug: bool,
    pub release: bool,
    pub jobs: Option<NonZeroUsize>,
    pub dry_run: bool,
    pub silent: bool,
    pub qmake_args: Vec<String>,
    pub webkit_qmake_args: Vec<String>,
    pub phantomjs_qmake_args: Vec<String>,
    pub qt_config: Vec<String>,
    pub git_clean_qtbase: bool,
    pub git_clean_qtwebkit: bool,
    pub skip_qtbase: bool,
    pub skip_configure_qtbase: bool,
    pub skip_qtwebkit: bool,
    pub skip_configure_qtwebkit: bool,
    pub skip_git: bool,
    pub disable_touch_events: bool,
}

/// Immutable configuration for one build run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub mode: Mode,
    pub jobs: Option<NonZeroUsize>,
    pub dry_run: bool,
    pub silent: bool,
    pub skip: SkipFlags,
    pub extra: ExtraFlags,
    pub git_clean_qtbase: bool,
    pub git_clean_qtwebkit: bool,
    pub disable_touch_events: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipFlags {
    pub git: bool,
    pub qtbase: bool,
    pub configure_qtbase: bool,
    pub qtwebkit: bool,
    pub configure_qtwebkit: bool,
}

/// Extra flags forwarded verbatim, already split on whitespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraFlags {
    /// Passed to every qmake call.
    pub qmake: Vec<String>,
    /// Appended to the Qt WebKit build driver.
    pub webkit: Vec<String>,
    /// Passed to the PhantomJS qmake call.
    pub phantomjs: Vec<String>,
    /// Appended to Qt Base configure.
    pub qt_config: Vec<String>,
}

impl TryFrom<BuildFlags> for BuildOptions {
    type Error = BuildError;

    fn try_from(flags: BuildFlags) -> Result<Self> {
        let mode = Mode::from_flags(flags.debug, flags.release)?;

        Ok(BuildOptions {
            mode,
            jobs: flags.jobs,
            dry_run: flags.dry_run,
            silent: flags.silent,
            skip: SkipFlags {
                git: flags.skip_git,
                qtbase: flags.skip_qtbase,
                configure_qtbase: flags.skip_configure_qtbase,
                qtwebkit: flags.skip_qtwebkit,
                configure_qtwebkit: flags.skip_configure_qtwebkit,
            },
            extra: ExtraFlags {
                qmake: split_words(&flags.qmake_args),
                webkit: split_words(&flags.webkit_qmake_args),
                phantomjs: split_words(&flags.phantomjs_qmake_args),
                qt_config: split_words(&flags.qt_config),
            },
            git_clean_qtbase: flags.git_clean_qtbase,
            git_clean_qtwebkit: flags.git_clean_qtwebkit,
            disable_touch_events: flags.disable_touch_events,
        })
    }
}

/// Split each repeated value on whitespace, keeping the overall order.
fn split_words(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split_whitespace())
        .map(str::to_string)
        .collect()
}
