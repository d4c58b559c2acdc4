use hdt_core::planner::Plan;
use hdt_core::vars::Environment;
use hdt_core::{build_plan, expand_descriptors, load_dir, PlanOptions};

use crate::exit_codes;
use crate::utils::{build_environment, predefined_names};
use crate::CommonArgs;

pub fn compile_cmd(args: &CommonArgs) -> i32 {
    match compile_plan(args) {
        Ok((plan, _env)) => {
            print!("{}", plan.render());
            exit_codes::SUCCESS
        }
        Err(code) => code,
    }
}

/// Load, expand and plan; shared between `compile` and `run`. Errors are
/// already reported when this returns.
pub(crate) fn compile_plan(args: &CommonArgs) -> Result<(Plan, Environment), i32> {
    let project = match load_dir(&args.indir) {
        Ok(project) => project,
        Err(e) => {
            for error in &e.errors {
                tracing::error!("{error}");
            }
            return Err(exit_codes::ERRORS);
        }
    };

    let env = match build_environment(&project, &args.config, &args.vars) {
        Ok(env) => env,
        Err(message) => {
            tracing::error!("{message}");
            return Err(exit_codes::ERRORS);
        }
    };

    let expanded = match expand_descriptors(&project.descriptors, &project.vhosts, &project.catalog)
    {
        Ok(expanded) => expanded,
        Err(e) => {
            for violation in &e.violations {
                tracing::error!("{violation}");
            }
            return Err(exit_codes::ERRORS);
        }
    };

    let options = PlanOptions {
        test_filters: args.tests.clone(),
    };
    let predefined = predefined_names(&env);
    match build_plan(expanded, &predefined, &options) {
        Ok(plan) => Ok((plan, env)),
        Err(e) => {
            for violation in &e.violations {
                tracing::error!("{violation}");
            }
            Err(exit_codes::ERRORS)
        }
    }
}
