use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Default per-request timeout; a request template's `timeout` field
    /// overrides it.
    pub timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}
