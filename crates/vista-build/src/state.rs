//! Process-scoped orchestration state

/// State that survives across builds
///
/// Owned by the compiler and only touched while a build runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorState {
    /// No build has finished in this process yet
    pub first_load: bool,
    /// The last build reported an error
    pub had_error: bool,
    /// Head markup written by the last reconciliation
    pub last_head: Option<String>,
    /// Body markup written by the last reconciliation
    pub last_body: Option<String>,
    /// Modules the session reported as changed in the last build
    pub changed_module_count: usize,
    /// Errors carry follow-up actions for the host
    pub actions_enabled: bool,
}

impl OrchestratorState {
    pub fn new() -> Self {
        Self {
            first_load: true,
            had_error: false,
            last_head: None,
            last_body: None,
            changed_module_count: 0,
            actions_enabled: false,
        }
    }
}

impl Default for OrchestratorState {
    fn default() -> Self {
        Self::new()
    }
}
