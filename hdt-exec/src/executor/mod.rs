mod actions;
pub mod http;
mod hooks;
mod queue;
mod request;
mod result;
mod runner;
mod types;
mod validate;

pub use http::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use result::{ContextResult, ExecError, RunReport};
pub use runner::Executor;
pub use types::ExecutorConfig;
