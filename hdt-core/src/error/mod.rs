use thiserror::Error;

#[derive(Debug, Error)]
pub enum HdtError {
    #[error(transparent)]
    Load(#[from] LoadErrors),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// A single load-phase failure. Load errors never abort the walk on their
/// own; the loader accumulates them into [`LoadErrors`] and reports at phase
/// end.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: failed to parse as JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}: failed to parse as YAML: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{path}: {message}")]
    BadManifest { path: String, message: String },
    #[error("duplicate descriptor name: {0}")]
    DuplicateName(String),
    #[error("variable {name}: cyclic definition (no fixed point after {rounds} rounds)")]
    CyclicVariable { name: String, rounds: usize },
    #[error("variable {name}: {reference} is not defined in the catalogue")]
    UndefinedVariable { name: String, reference: String },
    #[error("{path}: invalid ignore pattern {pattern:?}: {message}")]
    BadIgnorePattern {
        path: String,
        pattern: String,
        message: String,
    },
}

#[derive(Debug, Error)]
#[error("loading failed ({} errors)", errors.len())]
pub struct LoadErrors {
    pub errors: Vec<LoadError>,
}

impl LoadErrors {
    pub fn new(errors: Vec<LoadError>) -> Self {
        Self { errors }
    }
}

/// Compile-phase failures accumulated by descriptor expansion and the
/// planner. The run phase never starts while any violation is present.
#[derive(Debug, Error)]
#[error("compilation failed ({} violations)", violations.len())]
pub struct CompileError {
    pub violations: Vec<Violation>,
}

impl CompileError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// The API (or descriptor) the violation was found on.
    pub api: String,
    pub message: String,
}

impl Violation {
    pub fn new(api: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.api, self.message)
    }
}
