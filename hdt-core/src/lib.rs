#![forbid(unsafe_code)]

pub mod error;
pub mod expand;
pub mod load;
pub mod paths;
pub mod planner;
pub mod schema;
pub mod swagger;
pub mod types;
pub mod vars;

pub use crate::error::{CompileError, HdtError, LoadError, LoadErrors, Violation};
pub use crate::expand::{expand_descriptors, ConcreteApi, Expanded};
pub use crate::load::{load_dir, LoadedProject};
pub use crate::planner::{build_plan, Node, NodeId, Plan, PlanOptions};
pub use crate::types::{
    Action, ApiDescriptor, BasicAuth, Catalog, Hook, HookSet, RequestTemplate,
    ResponseDescriptor, TestSpec, ValueSource, VarDecl, VarNew, VarValue, VirtualHost,
};
pub use crate::vars::{EnvValue, Environment, SubstError};
