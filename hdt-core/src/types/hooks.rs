use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type HookResult = Result<(), String>;

/// What a user hook function sees: the context's variable environment, the
/// chain break flag, and an escape hatch for ad-hoc HTTP calls routed
/// through the run's shared client.
pub trait HookCtx: Send {
    fn get_var(&self, name: &str) -> Option<JsonValue>;
    fn set_var(&mut self, name: &str, value: JsonValue);
    fn is_break(&self) -> bool;
    fn set_break(&mut self, brk: bool);
    fn send_request<'a>(&'a mut self, opts: JsonValue) -> BoxFuture<'a, Result<JsonValue, String>>;
}

pub type HookFn =
    Arc<dyn for<'a> Fn(&'a mut dyn HookCtx) -> BoxFuture<'a, HookResult> + Send + Sync>;

/// One entry in a hook chain. File-loaded descriptors can only carry the
/// `Api` form; `Func` hooks are attached programmatically.
#[derive(Clone)]
pub enum Hook {
    Api {
        /// Name of the peer Concrete API to run in this context.
        name: String,
        /// Response status codes that silently terminate the chain.
        quit: Vec<u16>,
        /// When false, a failure of this hook is logged and the chain
        /// continues.
        fatal: bool,
    },
    Func(HookFn),
}

impl Hook {
    pub fn api(name: impl Into<String>) -> Self {
        Hook::Api {
            name: name.into(),
            quit: Vec::new(),
            fatal: true,
        }
    }

    /// The peer API name this hook references, if any.
    pub fn api_name(&self) -> Option<&str> {
        match self {
            Hook::Api { name, .. } => Some(name),
            Hook::Func(_) => None,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Api { name, quit, fatal } => f
                .debug_struct("Api")
                .field("name", name)
                .field("quit", quit)
                .field("fatal", fatal)
                .finish(),
            Hook::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for Hook {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Full {
                hook: String,
                #[serde(default)]
                quit: Vec<u16>,
                #[serde(default = "default_fatal")]
                fatal: bool,
            },
        }
        fn default_fatal() -> bool {
            true
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Name(name) => Hook::api(name),
            Repr::Full { hook, quit, fatal } => Hook::Api {
                name: hook,
                quit,
                fatal,
            },
        })
    }
}

/// Hook fields as declared on a descriptor, response or test. `None` means
/// "not declared here" so inheritance can tell absence from an explicit
/// empty list.
#[derive(Clone, Default, serde::Deserialize)]
pub struct HookDecls {
    #[serde(default)]
    pub before: Option<Vec<Hook>>,
    #[serde(default, rename = "afterApi")]
    pub after_api: Option<Vec<Hook>>,
    #[serde(default, rename = "afterAll")]
    pub after_all: Option<Vec<Hook>>,
    #[serde(skip)]
    pub on_before_run: Option<HookFn>,
    #[serde(skip)]
    pub on_after_run: Option<HookFn>,
}

impl HookDecls {
    /// Per-field `??=`: keep this level's declaration, fall back to the
    /// parent's.
    pub fn or_inherit(&self, parent: &HookDecls) -> HookDecls {
        HookDecls {
            before: self.before.clone().or_else(|| parent.before.clone()),
            after_api: self.after_api.clone().or_else(|| parent.after_api.clone()),
            after_all: self.after_all.clone().or_else(|| parent.after_all.clone()),
            on_before_run: self
                .on_before_run
                .clone()
                .or_else(|| parent.on_before_run.clone()),
            on_after_run: self
                .on_after_run
                .clone()
                .or_else(|| parent.on_after_run.clone()),
        }
    }

    pub fn into_set(self) -> HookSet {
        HookSet {
            before: self.before.unwrap_or_default(),
            after_api: self.after_api.unwrap_or_default(),
            after_all: self.after_all.unwrap_or_default(),
            on_before_run: self.on_before_run,
            on_after_run: self.on_after_run,
        }
    }
}

impl fmt::Debug for HookDecls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDecls")
            .field("before", &self.before)
            .field("after_api", &self.after_api)
            .field("after_all", &self.after_all)
            .field("on_before_run", &self.on_before_run.as_ref().map(|_| ".."))
            .field("on_after_run", &self.on_after_run.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Resolved hook chains on a Concrete API.
#[derive(Clone, Default)]
pub struct HookSet {
    pub before: Vec<Hook>,
    pub after_api: Vec<Hook>,
    pub after_all: Vec<Hook>,
    pub on_before_run: Option<HookFn>,
    pub on_after_run: Option<HookFn>,
}

impl HookSet {
    /// Every peer API name referenced from any chain.
    pub fn api_refs(&self) -> impl Iterator<Item = &str> {
        self.before
            .iter()
            .chain(&self.after_api)
            .chain(&self.after_all)
            .filter_map(Hook::api_name)
    }
}

impl fmt::Debug for HookSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSet")
            .field("before", &self.before)
            .field("after_api", &self.after_api)
            .field("after_all", &self.after_all)
            .field("on_before_run", &self.on_before_run.as_ref().map(|_| ".."))
            .field("on_after_run", &self.on_after_run.as_ref().map(|_| ".."))
            .finish()
    }
}
