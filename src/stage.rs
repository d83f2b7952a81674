//! The four build stages and the controller that runs them.
//!
//! Each stage goes `Pending -> Skipped` or `Pending -> Running -> Succeeded`.
//! A required invocation exiting nonzero moves it to `Failed`, which the
//! controller reports as [`BuildError::StageFailed`]; nothing is retried.
//! Sub-invocations within a stage run strictly one after another.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::context::{BuildContext, Vcs};
use crate::error::{BuildError, Result};
use crate::locate::ToolLocator;
use crate::plan::BuildPlan;
use crate::process::{BestEffort, Execute, ToolInvocation};

/// Library and mkspec prefixes Qt WebKit installs into Qt Base's tree.
const WEBKIT_LIB_PREFIX: &str = "libQt5WebKit";
const WEBKIT_MKSPEC_PREFIX: &str = "qt_lib_webkit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// git submodule init + update.
    FetchDependencies,
    /// Qt Base.
    BaseLayer,
    /// Qt WebKit.
    EngineLayer,
    /// PhantomJS.
    ApplicationLayer,
}

impl Stage {
    /// Dependency order.
    pub const ALL: [Stage; 4] = [
        Stage::FetchDependencies,
        Stage::BaseLayer,
        Stage::EngineLayer,
        Stage::ApplicationLayer,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::FetchDependencies => write!(f, "git submodules"),
            Stage::BaseLayer => write!(f, "Qt Base"),
            Stage::EngineLayer => write!(f, "Qt WebKit"),
            Stage::ApplicationLayer => write!(f, "PhantomJS"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The user asked for it.
    Requested,
    /// No git checkout, so there is nothing to fetch.
    NoVersionControl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Pending,
    Skipped(SkipReason),
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageState::Pending => write!(f, "pending"),
            StageState::Skipped(SkipReason::Requested) => write!(f, "skipped"),
            StageState::Skipped(SkipReason::NoVersionControl) => write!(f, "skipped (no git)"),
            StageState::Running => write!(f, "running"),
            StageState::Succeeded => write!(f, "succeeded"),
            StageState::Failed => write!(f, "failed"),
        }
    }
}

/// Runs single stages against an [`Execute`] implementation.
///
/// Tools are resolved on first use and cached for the rest of the run.
pub struct StageController<'a, E: Execute> {
    ctx: &'a BuildContext,
    plan: &'a BuildPlan,
    runner: &'a mut E,
    locator: ToolLocator,
    make_tool: Option<PathBuf>,
    git_tool: Option<PathBuf>,
}

impl<'a, E: Execute> StageController<'a, E> {
    pub fn new(ctx: &'a BuildContext, plan: &'a BuildPlan, runner: &'a mut E) -> Self {
        Self {
            ctx,
            plan,
            runner,
            locator: ctx.locator(),
            make_tool: None,
            git_tool: None,
        }
    }

    /// Why `stage` will not run, if it won't.
    pub fn skip_reason(&self, stage: Stage) -> Option<SkipReason> {
        let skip = &self.ctx.options.skip;
        match stage {
            Stage::FetchDependencies => match self.ctx.vcs {
                Vcs::Enabled => None,
                Vcs::SkippedByRequest => Some(SkipReason::Requested),
                Vcs::Absent => Some(SkipReason::NoVersionControl),
            },
            Stage::BaseLayer if skip.qtbase => Some(SkipReason::Requested),
            Stage::EngineLayer if skip.qtwebkit => Some(SkipReason::Requested),
            _ => None,
        }
    }

    /// Run `stage` to a terminal state. `Err` means the stage failed.
    pub fn run(&mut self, stage: Stage) -> Result<StageState> {
        tracing::debug!("{}: {}", stage, StageState::Pending);

        if let Some(reason) = self.skip_reason(stage) {
            let state = StageState::Skipped(reason);
            tracing::info!("Skipping {} ({})", stage, state);
            return Ok(state);
        }

        tracing::debug!("{}: {}", stage, StageState::Running);
        let result = match stage {
            Stage::FetchDependencies => self.fetch_dependencies(),
            Stage::BaseLayer => self.build_base_layer(),
            Stage::EngineLayer => self.build_engine_layer(),
            Stage::ApplicationLayer => self.build_application_layer(),
        };

        match result {
            Ok(()) => {
                tracing::debug!("{}: {}", stage, StageState::Succeeded);
                Ok(StageState::Succeeded)
            }
            Err(e) => {
                tracing::debug!("{}: {}", stage, StageState::Failed);
                Err(e.in_stage(stage))
            }
        }
    }

    fn fetch_dependencies(&mut self) -> Result<()> {
        let stage = Stage::FetchDependencies;
        let root = self.ctx.layout.root().to_path_buf();

        let init = self.git_invocation(&root, &["submodule", "init"])?;
        self.run_required(stage, &init, "Initialization of git submodules failed.")?;

        let update = self.git_invocation(&root, &["submodule", "update"])?;
        self.run_required(stage, &update, "Initial update of git submodules failed.")
    }

    fn build_base_layer(&mut self) -> Result<()> {
        let stage = Stage::BaseLayer;
        let (ctx, plan) = (self.ctx, self.plan);
        let layout = &ctx.layout;
        let qtbase = layout.qtbase();

        // Leftovers of a previous Qt WebKit install would shadow the rebuilt ones.
        self.runner.best_effort(&BestEffort::RemoveMatching {
            dir: qtbase.join("lib"),
            prefix: WEBKIT_LIB_PREFIX.to_string(),
        });
        self.runner.best_effort(&BestEffort::RemoveMatching {
            dir: qtbase.join("mkspecs/modules"),
            prefix: WEBKIT_MKSPEC_PREFIX.to_string(),
        });

        if ctx.options.git_clean_qtbase {
            self.git_clean(stage, &qtbase)?;
        }

        if let Some(args) = &plan.qtbase_configure {
            tracing::info!("configuring Qt Base, please wait...");
            let configure =
                ToolInvocation::new(layout.qtbase_configure(&ctx.platform), qtbase.clone())
                    .args(args.iter().cloned());
            self.run_required(stage, &configure, "Configuration of Qt Base failed.")?;
        }

        tracing::info!("building Qt Base, please wait...");
        let make = self.make_invocation(&qtbase)?;
        self.run_required(stage, &make, "Building Qt Base failed.")
    }

    fn build_engine_layer(&mut self) -> Result<()> {
        let stage = Stage::EngineLayer;
        let (ctx, plan) = (self.ctx, self.plan);
        let layout = &ctx.layout;
        let webkit = layout.webkit();
        let release_build = layout.webkit_release_build();
        let qtwebkit = layout.qtwebkit();
        let qtbase = layout.qtbase();
        let sqlite = layout.sqlite_sources().display().to_string();

        if ctx.options.git_clean_qtwebkit {
            self.git_clean(stage, &webkit)?;
        }

        if ctx.options.skip.configure_qtwebkit {
            tracing::info!("building Qt WebKit without reconfiguring, please wait...");
            let make = self
                .make_invocation(&release_build)?
                .env("SQLITE3SRCDIR", sqlite);
            self.run_required(stage, &make, "Building Qt WebKit failed.")?;
        } else {
            tracing::info!("configuring and building Qt WebKit, please wait...");
            let driver = ToolInvocation::new(layout.webkit_driver(), webkit)
                .args(plan.webkit_driver.iter().cloned())
                .env("SQLITE3SRCDIR", sqlite);
            self.run_required(stage, &driver, "Building Qt WebKit failed.")?;
        }

        self.runner.best_effort(&BestEffort::RemoveTree {
            path: qtwebkit.clone(),
        });

        let install = self.make_invocation(&release_build)?.arg("install");
        match self.runner.execute(&install) {
            Ok(0) => {}
            Ok(code) => tracing::warn!("Installing Qt WebKit exited with code {}", code),
            Err(e) => tracing::warn!("Installing Qt WebKit failed: {}", e),
        }

        self.runner.best_effort(&BestEffort::CopyMatching {
            from: qtwebkit.join("lib"),
            prefix: WEBKIT_LIB_PREFIX.to_string(),
            to: qtbase.join("lib"),
        });
        self.runner.best_effort(&BestEffort::CopyMatching {
            from: qtwebkit.join("mkspecs/modules"),
            prefix: WEBKIT_MKSPEC_PREFIX.to_string(),
            to: qtbase.join("mkspecs/modules"),
        });

        Ok(())
    }

    fn build_application_layer(&mut self) -> Result<()> {
        let stage = Stage::ApplicationLayer;
        let (ctx, plan) = (self.ctx, self.plan);
        let root = ctx.layout.root().to_path_buf();

        tracing::info!("Configuring PhantomJS, please wait...");
        let qmake = ToolLocator::require_build_config_tool(
            &ctx.layout,
            &ctx.platform,
            self.runner.is_dry_run(),
        )?;
        let configure =
            ToolInvocation::new(qmake, root.clone()).args(plan.phantomjs_qmake.iter().cloned());
        self.run_required(stage, &configure, "Configuration of PhantomJS failed.")?;

        tracing::info!("Building PhantomJS, please wait...");
        let make = self.make_invocation(&root)?;
        self.run_required(stage, &make, "Building PhantomJS failed.")
    }

    /// `git clean -xfd` in `dir`; a no-op when git is unavailable for this run.
    fn git_clean(&mut self, stage: Stage, dir: &Path) -> Result<()> {
        if !self.ctx.git_enabled() {
            tracing::debug!("not cleaning {}: git operations are skipped", dir.display());
            return Ok(());
        }
        let clean = self.git_invocation(dir, &["clean", "-xfd"])?;
        self.run_required(stage, &clean, "Cleaning with git failed.")
    }

    fn run_required(
        &mut self,
        stage: Stage,
        invocation: &ToolInvocation,
        message: &str,
    ) -> Result<()> {
        match self.runner.execute(invocation)? {
            0 => Ok(()),
            code => Err(BuildError::StageFailed {
                stage,
                message: message.to_string(),
                code,
            }),
        }
    }

    fn make_invocation(&mut self, dir: &Path) -> Result<ToolInvocation> {
        let tool = match self.make_tool.clone() {
            Some(tool) => tool,
            None => {
                let tool = self
                    .locator
                    .make_tool(&self.ctx.platform, self.runner.is_dry_run())?;
                self.make_tool = Some(tool.clone());
                tool
            }
        };
        Ok(ToolInvocation::new(tool, dir).args(self.plan.make_flags.iter().cloned()))
    }

    fn git_invocation(&mut self, dir: &Path, args: &[&str]) -> Result<ToolInvocation> {
        let tool = match self.git_tool.clone() {
            Some(tool) => tool,
            None => {
                let name = format!("git{}", self.ctx.platform.exe_suffix());
                let tool = self.locator.require(&name, self.runner.is_dry_run())?;
                self.git_tool = Some(tool.clone());
                tool
            }
        };
        Ok(ToolInvocation::new(tool, dir).args(args.iter().copied()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::options::{BuildFlags, BuildOptions};
    use crate::platform::{HostEnv, OsFamily, PlatformProfile};
    use crate::profile::ProfileTables;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Records everything instead of running it.
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub(crate) dry_run: bool,
        pub(crate) invocations: Vec<ToolInvocation>,
        pub(crate) best_effort: Vec<BestEffort>,
        /// Exit code by program file name; anything else exits 0.
        pub(crate) exit_codes: HashMap<String, i32>,
    }

    impl Recorder {
        pub(crate) fn programs(&self) -> Vec<String> {
            self.invocations
                .iter()
                .map(|i| {
                    i.program
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default()
                })
                .collect()
        }
    }

    impl Execute for Recorder {
        fn execute(&mut self, invocation: &ToolInvocation) -> Result<i32> {
            self.invocations.push(invocation.clone());
            let name = invocation
                .program
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(self.exit_codes.get(&name).copied().unwrap_or(0))
        }

        fn best_effort(&mut self, op: &BestEffort) {
            self.best_effort.push(op.clone());
        }

        fn is_dry_run(&self) -> bool {
            self.dry_run
        }
    }

    pub(crate) fn context(root: &Path, flags: BuildFlags) -> BuildContext {
        BuildContext::new(
            root,
            PlatformProfile::for_family(OsFamily::OtherUnix),
            BuildOptions::try_from(flags).unwrap(),
            HostEnv {
                cpu_count: 3,
                ..Default::default()
            },
        )
    }

    fn plan(ctx: &BuildContext) -> BuildPlan {
        BuildPlan::prepare(ctx, &ProfileTables::builtin().unwrap()).unwrap()
    }

    fn dry_recorder() -> Recorder {
        Recorder {
            dry_run: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_fetch_skipped_without_git_dir() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path(), BuildFlags::default());
        let plan = plan(&ctx);
        let mut recorder = dry_recorder();

        let state = StageController::new(&ctx, &plan, &mut recorder)
            .run(Stage::FetchDependencies)
            .unwrap();
        assert_eq!(state, StageState::Skipped(SkipReason::NoVersionControl));
        assert!(recorder.invocations.is_empty());
    }

    #[test]
    fn test_fetch_runs_init_then_update() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        let ctx = context(temp.path(), BuildFlags::default());
        let plan = plan(&ctx);
        let mut recorder = dry_recorder();

        let state = StageController::new(&ctx, &plan, &mut recorder)
            .run(Stage::FetchDependencies)
            .unwrap();
        assert_eq!(state, StageState::Succeeded);
        assert_eq!(recorder.invocations[0].args, ["submodule", "init"]);
        assert_eq!(recorder.invocations[1].args, ["submodule", "update"]);
        assert_eq!(recorder.invocations[0].working_dir, temp.path());
    }

    #[test]
    fn test_fetch_failure_stops_before_update() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        let ctx = context(temp.path(), BuildFlags::default());
        let plan = plan(&ctx);
        let mut recorder = dry_recorder();
        recorder.exit_codes.insert("git".into(), 128);

        let err = StageController::new(&ctx, &plan, &mut recorder)
            .run(Stage::FetchDependencies)
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::StageFailed {
                stage: Stage::FetchDependencies,
                code: 128,
                ..
            }
        ));
        assert_eq!(recorder.invocations.len(), 1);
    }

    #[test]
    fn test_base_layer_sequence() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        let ctx = context(
            temp.path(),
            BuildFlags {
                git_clean_qtbase: true,
                ..Default::default()
            },
        );
        let plan = plan(&ctx);
        let mut recorder = dry_recorder();

        StageController::new(&ctx, &plan, &mut recorder)
            .run(Stage::BaseLayer)
            .unwrap();

        assert_eq!(recorder.programs(), ["git", "configure", "make"]);
        assert_eq!(recorder.invocations[0].args, ["clean", "-xfd"]);
        let qtbase = temp.path().join("src/qt/qtbase");
        assert!(recorder.invocations.iter().all(|i| i.working_dir == qtbase));
        assert_eq!(recorder.invocations[2].args, ["-j", "3"]);
        assert_eq!(recorder.best_effort.len(), 2);
    }

    #[test]
    fn test_base_layer_skip_configure() {
        let temp = TempDir::new().unwrap();
        let ctx = context(
            temp.path(),
            BuildFlags {
                skip_configure_qtbase: true,
                git_clean_qtbase: false,
                ..Default::default()
            },
        );
        let plan = plan(&ctx);
        let mut recorder = dry_recorder();

        StageController::new(&ctx, &plan, &mut recorder)
            .run(Stage::BaseLayer)
            .unwrap();
        assert_eq!(recorder.programs(), ["make"]);
    }

    #[test]
    fn test_git_clean_ignored_without_git() {
        let temp = TempDir::new().unwrap();
        let ctx = context(
            temp.path(),
            BuildFlags {
                git_clean_qtbase: true,
                git_clean_qtwebkit: true,
                ..Default::default()
            },
        );
        let plan = plan(&ctx);
        let mut recorder = dry_recorder();

        let mut controller = StageController::new(&ctx, &plan, &mut recorder);
        controller.run(Stage::BaseLayer).unwrap();
        controller.run(Stage::EngineLayer).unwrap();
        assert!(!recorder.programs().contains(&"git".to_string()));
    }

    #[test]
    fn test_skip_flags_produce_no_invocations() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        let ctx = context(
            temp.path(),
            BuildFlags {
                skip_git: true,
                skip_qtbase: true,
                skip_qtwebkit: true,
                git_clean_qtbase: true,
                git_clean_qtwebkit: true,
                ..Default::default()
            },
        );
        let plan = plan(&ctx);
        let mut recorder = dry_recorder();

        let mut controller = StageController::new(&ctx, &plan, &mut recorder);
        for stage in [Stage::FetchDependencies, Stage::BaseLayer, Stage::EngineLayer] {
            assert_eq!(
                controller.run(stage).unwrap(),
                StageState::Skipped(SkipReason::Requested)
            );
        }
        assert!(recorder.invocations.is_empty());
        assert!(recorder.best_effort.is_empty());
    }

    #[test]
    fn test_skipped_layers_never_clean() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        let ctx = context(
            temp.path(),
            BuildFlags {
                skip_qtbase: true,
                skip_qtwebkit: true,
                git_clean_qtbase: true,
                git_clean_qtwebkit: true,
                ..Default::default()
            },
        );
        assert!(ctx.git_enabled());
        let plan = plan(&ctx);
        let mut recorder = dry_recorder();

        let mut controller = StageController::new(&ctx, &plan, &mut recorder);
        for stage in [Stage::BaseLayer, Stage::EngineLayer] {
            assert_eq!(
                controller.run(stage).unwrap(),
                StageState::Skipped(SkipReason::Requested)
            );
        }
        assert!(recorder.invocations.is_empty());
        assert!(recorder.best_effort.is_empty());
    }

    #[test]
    fn test_engine_layer_sequence() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path(), BuildFlags::default());
        let plan = plan(&ctx);
        let mut recorder = dry_recorder();

        StageController::new(&ctx, &plan, &mut recorder)
            .run(Stage::EngineLayer)
            .unwrap();

        assert_eq!(recorder.programs(), ["build-webkit", "make"]);
        let driver = &recorder.invocations[0];
        assert_eq!(driver.working_dir, temp.path().join("src/qt/webkit"));
        assert_eq!(
            driver.env,
            [(
                "SQLITE3SRCDIR".to_string(),
                temp.path()
                    .join("src/qt/qtbase/src/3rdparty/sqlite")
                    .display()
                    .to_string()
            )]
        );

        let install = &recorder.invocations[1];
        assert_eq!(install.args.last().unwrap(), "install");
        assert!(install.env.is_empty());
        assert_eq!(
            install.working_dir,
            temp.path().join("src/qt/webkit/WebKitBuild/Release")
        );

        assert!(matches!(recorder.best_effort[0], BestEffort::RemoveTree { .. }));
        assert!(matches!(
            recorder.best_effort[1],
            BestEffort::CopyMatching { .. }
        ));
        assert_eq!(recorder.best_effort.len(), 3);
    }

    #[test]
    fn test_engine_driver_failure_is_fatal() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path(), BuildFlags::default());
        let plan = plan(&ctx);
        let mut recorder = dry_recorder();
        recorder.exit_codes.insert("build-webkit".into(), 1);

        let err = StageController::new(&ctx, &plan, &mut recorder)
            .run(Stage::EngineLayer)
            .unwrap_err();
        assert!(err.to_string().contains("Building Qt WebKit failed."));
        assert!(recorder.best_effort.is_empty());
    }

    #[test]
    fn test_engine_install_failure_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path(), BuildFlags::default());
        let plan = plan(&ctx);
        let mut recorder = dry_recorder();
        recorder.exit_codes.insert("make".into(), 2);

        let state = StageController::new(&ctx, &plan, &mut recorder)
            .run(Stage::EngineLayer)
            .unwrap();
        assert_eq!(state, StageState::Succeeded);
        assert_eq!(recorder.best_effort.len(), 3);
    }

    #[test]
    fn test_engine_skip_configure_builds_directly() {
        let temp = TempDir::new().unwrap();
        let ctx = context(
            temp.path(),
            BuildFlags {
                skip_configure_qtwebkit: true,
                ..Default::default()
            },
        );
        let plan = plan(&ctx);
        let mut recorder = dry_recorder();

        StageController::new(&ctx, &plan, &mut recorder)
            .run(Stage::EngineLayer)
            .unwrap();
        assert_eq!(recorder.programs(), ["make", "make"]);
        assert_eq!(recorder.invocations[0].args, ["-j", "3"]);
        assert_eq!(recorder.invocations[1].args, ["-j", "3", "install"]);
    }

    #[test]
    fn test_application_layer() {
        let temp = TempDir::new().unwrap();
        let ctx = context(
            temp.path(),
            BuildFlags {
                phantomjs_qmake_args: vec!["CONFIG+=release".into()],
                ..Default::default()
            },
        );
        let plan = plan(&ctx);
        let mut recorder = dry_recorder();

        StageController::new(&ctx, &plan, &mut recorder)
            .run(Stage::ApplicationLayer)
            .unwrap();
        assert_eq!(recorder.programs(), ["qmake", "make"]);
        assert_eq!(recorder.invocations[0].args, ["CONFIG+=release"]);
        assert_eq!(recorder.invocations[0].working_dir, temp.path());
    }

    #[test]
    fn test_application_layer_needs_qmake() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path(), BuildFlags::default());
        let plan = plan(&ctx);
        let mut recorder = Recorder::default();

        let err = StageController::new(&ctx, &plan, &mut recorder)
            .run(Stage::ApplicationLayer)
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::ApplicationLayer));
        assert!(matches!(
            err,
            BuildError::Stage { ref source, .. } if matches!(**source, BuildError::ToolNotFound { .. })
        ));
        assert!(recorder.invocations.is_empty());
    }
}
