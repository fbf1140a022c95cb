//! Configuration for the validate-then-run pipeline.

/// What the orchestrator does when the validation service cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ValidationPolicy {
    /// Log a warning and run the algorithm anyway.
    #[default]
    FailOpen,
    /// Treat an unreachable validator like a failed validation.
    FailClosed,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Domain name sent with every validation and run request.
    pub domain: String,
    pub validation_policy: ValidationPolicy,
    /// Affected items rendered per check before the "... and N more" line.
    pub max_items_per_check: usize,
    /// Live log lines buffered per subscriber before it lags.
    pub log_buffer: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            domain: "automotive".to_string(),
            validation_policy: ValidationPolicy::FailOpen,
            max_items_per_check: 5,
            log_buffer: 256,
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.validation_policy = policy;
        self
    }
}
