use hdt_core::paths::PathError;
use hdt_core::vars::SubstError;

use super::http::HttpError;

/// A runtime failure inside one run context. The first error of a waterfall
/// wins; cleanup stages still run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecError {
    #[error(transparent)]
    Subst(#[from] SubstError),
    #[error(transparent)]
    Transport(#[from] HttpError),
    #[error("expected status {expected}, got {actual}")]
    UnexpectedStatus { expected: u16, actual: u16 },
    #[error("response declared application/json but the body does not parse: {0}")]
    BadJson(String),
    #[error("response body failed schema validation: {}", .0.join("; "))]
    SchemaValidation(Vec<String>),
    #[error("hook {hook} failed: {message}")]
    Hook { hook: String, message: String },
    #[error("hook references unknown API {0}")]
    UnknownHookApi(String),
    #[error("action failed: {0}")]
    Action(String),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("variable {0} expands to an empty combination set")]
    EmptyCombination(String),
    #[error("serial variable {0} has no value")]
    MissingSerialVar(String),
}

/// Outcome of one run context (one node × one variable combination).
#[derive(Debug, Clone)]
pub struct ContextResult {
    pub id: String,
    pub api: String,
    pub error: Option<String>,
    /// True for preRun contexts: the error is recorded but never fails the
    /// run.
    pub ignored: bool,
}

impl ContextResult {
    pub fn passed(&self) -> bool {
        self.error.is_none() || self.ignored
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub contexts: Vec<ContextResult>,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.contexts.iter().filter(|c| !c.passed()).count()
    }

    pub fn passed(&self) -> usize {
        self.contexts.len() - self.failed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}
