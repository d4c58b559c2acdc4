use std::sync::Arc;

use hdt_exec::{Executor, ExecutorConfig, ReqwestHttpClient};

use crate::cmd::compile::compile_plan;
use crate::exit_codes;
use crate::CommonArgs;

pub async fn run_cmd(args: &CommonArgs) -> i32 {
    let (plan, env) = match compile_plan(args) {
        Ok(compiled) => compiled,
        Err(code) => return code,
    };

    let client = match ReqwestHttpClient::new() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("{e}");
            return exit_codes::ERRORS;
        }
    };

    let executor = Executor::new(plan, client, ExecutorConfig::default());
    let report = executor.run(env).await;

    tracing::info!(
        passed = report.passed(),
        failed = report.failed(),
        "run finished"
    );
    if report.is_success() {
        exit_codes::SUCCESS
    } else {
        exit_codes::ERRORS
    }
}
