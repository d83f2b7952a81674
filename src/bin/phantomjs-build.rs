//! Command-line front-end: parse switches, confirm, run the build.

use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use phantomjs_build::confirm::confirm_build;
use phantomjs_build::{
    BuildContext, BuildError, BuildFlags, BuildOptions, BuildOrchestrator, HostEnv,
    PlatformProfile, ProcessRunner, ProfileTables,
};

/// Build PhantomJS from sources.
#[derive(Parser, Debug)]
#[command(name = "phantomjs-build", version, about, long_about = None)]
struct Cli {
    /// Enable release build mode (the default)
    #[arg(short, long)]
    release: bool,

    /// Enable debug build mode
    #[arg(short, long)]
    debug: bool,

    /// How many parallel compile jobs to use. Defaults to the number of CPU cores
    #[arg(short, long, value_name = "N")]
    jobs: Option<NonZeroUsize>,

    /// Silently confirm the build
    #[arg(short, long)]
    confirm: bool,

    /// Only print what would be done without actually executing anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Reduce Qt Base configure output (not available on Windows)
    #[arg(short, long)]
    silent: bool,

    /// Additional arguments for every qmake call
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    qmake_args: Vec<String>,

    /// Additional arguments for the Qt WebKit build
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    webkit_qmake_args: Vec<String>,

    /// Additional arguments for the PhantomJS qmake call
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    phantomjs_qmake_args: Vec<String>,

    /// Additional arguments for Qt Base configure. May be repeated
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    qt_config: Vec<String>,

    /// Run 'git clean -xfd' in Qt Base before building
    #[arg(long)]
    git_clean_qtbase: bool,

    /// Run 'git clean -xfd' in Qt WebKit before building
    #[arg(long)]
    git_clean_qtwebkit: bool,

    /// Skip building Qt Base
    #[arg(long)]
    skip_qtbase: bool,

    /// Skip configuring Qt Base (ignored with --git-clean-qtbase)
    #[arg(long)]
    skip_configure_qtbase: bool,

    /// Skip building Qt WebKit
    #[arg(long)]
    skip_qtwebkit: bool,

    /// Skip configuring Qt WebKit and only run make in its build directory
    #[arg(long)]
    skip_configure_qtwebkit: bool,

    /// Skip all git operations
    #[arg(long)]
    skip_git: bool,

    /// Build Qt WebKit without touch event support
    #[arg(long)]
    disable_touch_events: bool,

    /// Log debug details to stderr
    #[arg(short, long)]
    verbose: bool,

    /// PhantomJS source checkout to build (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    source_root: Option<PathBuf>,
}

impl Cli {
    fn flags(&self) -> BuildFlags {
        BuildFlags {
            debug: self.debug,
            release: self.release,
            jobs: self.jobs,
            dry_run: self.dry_run,
            silent: self.silent,
            qmake_args: self.qmake_args.clone(),
            webkit_qmake_args: self.webkit_qmake_args.clone(),
            phantomjs_qmake_args: self.phantomjs_qmake_args.clone(),
            qt_config: self.qt_config.clone(),
            git_clean_qtbase: self.git_clean_qtbase,
            git_clean_qtwebkit: self.git_clean_qtwebkit,
            skip_qtbase: self.skip_qtbase,
            skip_configure_qtbase: self.skip_configure_qtbase,
            skip_qtwebkit: self.skip_qtwebkit,
            skip_configure_qtwebkit: self.skip_configure_qtwebkit,
            skip_git: self.skip_git,
            disable_touch_events: self.disable_touch_events,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .without_time()
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Build errors already carry their cause in the message.
            match e.downcast_ref::<BuildError>() {
                Some(build) => eprintln!("\nERROR: Failed to build PhantomJS! {}", build),
                None => eprintln!("\nERROR: Failed to build PhantomJS! {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let options = BuildOptions::try_from(cli.flags())?;

    let root = match &cli.source_root {
        Some(dir) => std::path::absolute(dir)
            .with_context(|| format!("resolving source root '{}'", dir.display()))?,
        None => std::env::current_dir().context("resolving current directory")?,
    };

    if !cli.confirm && !confirm_build(io::stdin().lock(), io::stdout().lock())? {
        return Ok(());
    }

    let ctx = BuildContext::new(root, PlatformProfile::detect(), options, HostEnv::capture());
    let tables = ProfileTables::builtin().context("loading built-in option tables")?;
    let mut runner = ProcessRunner::new(ctx.options.dry_run);

    let report = BuildOrchestrator::new(&ctx, &tables, &mut runner).run()?;
    tracing::info!("Build finished: {}", report);
    Ok(())
}
