//! Argument lists for the whole run, computed up front.
//!
//! Preparing the plan is where configuration errors surface (an undiscoverable
//! OpenSSL, a broken option table), before any external tool has been started.

use crate::context::BuildContext;
use crate::error::Result;
use crate::profile::{OptionProfileBuilder, ProfileTables};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    /// Follows the make tool on every make invocation.
    pub make_flags: Vec<String>,
    /// `None` when Qt Base configure will not run in this build.
    pub qtbase_configure: Option<Vec<String>>,
    pub webkit_driver: Vec<String>,
    pub phantomjs_qmake: Vec<String>,
}

impl BuildPlan {
    pub fn prepare(ctx: &BuildContext, tables: &ProfileTables) -> Result<Self> {
        let profile =
            OptionProfileBuilder::new(tables, &ctx.layout, ctx.platform, &ctx.options, &ctx.env);

        let qtbase_configure = if ctx.configures_qtbase() {
            Some(profile.qtbase_configure_args()?)
        } else {
            None
        };

        Ok(Self {
            make_flags: profile.make_flags()?,
            qtbase_configure,
            webkit_driver: profile.webkit_driver_args(),
            phantomjs_qmake: profile.phantomjs_qmake_args(),
        })
    }
}
