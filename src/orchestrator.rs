//! Top-level driver: plan the run, then execute the stages in order.
//!
//! The first failing stage aborts the run. There is no rollback: whatever
//! earlier stages produced stays on disk, so a later run can pick up from
//! there with the matching `--skip-*` switches.

use std::fmt;

use crate::context::BuildContext;
use crate::error::Result;
use crate::plan::BuildPlan;
use crate::process::Execute;
use crate::profile::ProfileTables;
use crate::stage::{Stage, StageController, StageState};

/// Final state of every stage of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub stages: Vec<(Stage, StageState)>,
}

impl BuildReport {
    pub fn state(&self, stage: Stage) -> Option<StageState> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, state)| *state)
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .stages
            .iter()
            .map(|(stage, state)| format!("{}: {}", stage, state))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

pub struct BuildOrchestrator<'a, E: Execute> {
    ctx: &'a BuildContext,
    tables: &'a ProfileTables,
    runner: &'a mut E,
}

impl<'a, E: Execute> BuildOrchestrator<'a, E> {
    pub fn new(ctx: &'a BuildContext, tables: &'a ProfileTables, runner: &'a mut E) -> Self {
        Self {
            ctx,
            tables,
            runner,
        }
    }

    /// Plan, then run all four stages. Configuration errors surface before
    /// anything is executed; the first stage error ends the run.
    pub fn run(self) -> Result<BuildReport> {
        let plan = BuildPlan::prepare(self.ctx, self.tables)?;
        tracing::debug!("build plan: {:?}", plan);

        let mut controller = StageController::new(self.ctx, &plan, self.runner);
        let mut stages = Vec::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            match controller.run(stage) {
                Ok(state) => stages.push((stage, state)),
                Err(e) => {
                    tracing::error!("{} failed, not running the remaining stages", stage);
                    return Err(e);
                }
            }
        }

        Ok(BuildReport { stages })
    }
}
