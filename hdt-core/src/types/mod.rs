mod actions;
mod descriptor;
mod hooks;
mod request;
mod variable;
mod vhost;

pub use actions::{Action, ExtractFn, ValueSource, VarNew, VarSet};
pub use descriptor::{ApiDescriptor, ResponseDescriptor, TestSpec};
pub use hooks::{BoxFuture, Hook, HookCtx, HookDecls, HookFn, HookResult, HookSet};
pub use request::{BasicAuth, RequestTemplate};
pub use variable::{Catalog, VarDecl, VarValue};
pub use vhost::VirtualHost;
