//! Compile tasks

use vista_config::ProjectSnapshot;

/// Build flags carried by a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileFlags {
    /// Stop after transpilation
    pub skip_eval: bool,
    /// Evaluate the task's entry instead of the template's entry candidates
    pub module_view: bool,
    /// Host offers follow-up actions on errors
    pub has_actions: bool,
    /// Sessions may resolve files through the host
    pub has_file_resolver: bool,
    /// Ask the registry to skip dependency preprocessing
    pub disable_dependency_preprocessing: bool,
}

/// One requested build: the project snapshot and its flags
#[derive(Debug, Clone, PartialEq)]
pub struct CompileTask {
    pub snapshot: ProjectSnapshot,
    pub flags: CompileFlags,
}

impl CompileTask {
    pub fn new(snapshot: ProjectSnapshot) -> Self {
        Self {
            snapshot,
            flags: CompileFlags::default(),
        }
    }

    pub fn with_flags(mut self, flags: CompileFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn skip_eval(mut self) -> Self {
        self.flags.skip_eval = true;
        self
    }

    pub fn module_view(mut self) -> Self {
        self.flags.module_view = true;
        self
    }

    pub fn project_id(&self) -> &str {
        &self.snapshot.project_id
    }
}
