//! Build orchestration for PhantomJS from a source checkout.
//!
//! A run drives four stages in dependency order, each one delegating the real
//! work to an external tool:
//!
//! ```text
//! git submodules ──> Qt Base ──> Qt WebKit ──> PhantomJS
//!   (git)          (configure,   (build-webkit,  (qmake,
//!                   make)         make install)   make)
//! ```
//!
//! Every flag list is computed up front into a [`BuildPlan`], so contradictory
//! or unsatisfiable options fail before anything is started. Stages then run
//! through an [`Execute`] implementation; [`ProcessRunner`] spawns real
//! processes (or only echoes them in dry-run).
//!
//! # Example
//!
//! ```rust,ignore
//! use phantomjs_build::{
//!     BuildContext, BuildFlags, BuildOptions, BuildOrchestrator, HostEnv,
//!     PlatformProfile, ProcessRunner, ProfileTables,
//! };
//!
//! let options = BuildOptions::try_from(BuildFlags { dry_run: true, ..Default::default() })?;
//! let ctx = BuildContext::new("/src/phantomjs", PlatformProfile::detect(), options, HostEnv::capture());
//! let tables = ProfileTables::builtin()?;
//! let mut runner = ProcessRunner::new(ctx.options.dry_run);
//! let report = BuildOrchestrator::new(&ctx, &tables, &mut runner).run()?;
//! println!("{}", report);
//! ```

pub mod confirm;
pub mod context;
pub mod error;
pub mod layout;
pub mod locate;
pub mod options;
pub mod orchestrator;
pub mod plan;
pub mod platform;
pub mod process;
pub mod profile;
pub mod stage;

pub use context::{BuildContext, Vcs};
pub use error::{BuildError, Result};
pub use layout::SourceLayout;
pub use locate::ToolLocator;
pub use options::{BuildFlags, BuildOptions, Mode};
pub use orchestrator::{BuildOrchestrator, BuildReport};
pub use plan::BuildPlan;
pub use platform::{HostEnv, OsFamily, PlatformProfile};
pub use process::{BestEffort, Execute, ProcessRunner, ToolInvocation};
pub use profile::{OptionProfileBuilder, ProfileTables};
pub use stage::{SkipReason, Stage, StageController, StageState};
