#![forbid(unsafe_code)]

pub mod executor;

pub use crate::executor::{
    ContextResult, ExecError, Executor, ExecutorConfig, HttpClient, HttpError, HttpRequest,
    HttpResponse, ReqwestHttpClient, RunReport,
};
