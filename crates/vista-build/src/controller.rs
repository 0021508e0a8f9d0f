//! Build session lifecycle
//!
//! At most one session is live per process. It is created when none exists
//! or the project identity changed, and replaced when the resolved dependency
//! combination changed.

use crate::error::BuildResult;
use crate::session::{BuildSession, SessionFactory, SessionOptions};
use std::collections::BTreeMap;
use std::sync::Arc;
use vista_config::{Module, TemplateKind};
use vista_package::Combination;

/// The live session and what it was built against
pub struct LiveSession {
    pub session: Box<dyn BuildSession>,
    pub project_id: String,
    /// Combination whose manifest was last pushed into the session
    pub combination: Option<Combination>,
}

/// Result of preparing a session for a build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedSession {
    /// The session was created by this call
    pub newly_created: bool,
    /// The session has not seen the current manifest yet
    pub manifest_stale: bool,
}

pub struct SessionController {
    factory: Arc<dyn SessionFactory>,
    live: Option<LiveSession>,
}

impl SessionController {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            live: None,
        }
    }

    /// Dispose the live session if it was built against another combination
    ///
    /// Returns whether a session was disposed.
    pub fn invalidate_combination(&mut self, combination: &Combination) -> bool {
        let stale = self
            .live
            .as_ref()
            .and_then(|live| live.combination.as_ref())
            .is_some_and(|current| current != combination);

        if stale {
            tracing::debug!("Dependency combination changed, replacing build session");
            self.dispose();
        }
        stale
    }

    /// Make sure a session for `project_id` is live
    ///
    /// A live session for another project is disposed before the new one is
    /// created. The combination is recorded as the one the session is built
    /// against; the caller pushes the manifest when `manifest_stale` is set.
    pub fn prepare(
        &mut self,
        project_id: &str,
        template: TemplateKind,
        files: &BTreeMap<String, Module>,
        options: SessionOptions,
        combination: &Combination,
    ) -> BuildResult<PreparedSession> {
        if let Some(live) = self.live.as_mut() {
            if live.project_id == project_id {
                let manifest_stale = live.combination.as_ref() != Some(combination);
                live.combination = Some(combination.clone());
                return Ok(PreparedSession {
                    newly_created: false,
                    manifest_stale,
                });
            }

            tracing::debug!(
                "Project changed from '{}' to '{}', disposing build session",
                live.project_id,
                project_id
            );
            self.dispose();
        }

        let session = self.factory.create(project_id, template, files, options)?;
        self.live = Some(LiveSession {
            session,
            project_id: project_id.to_string(),
            combination: Some(combination.clone()),
        });

        Ok(PreparedSession {
            newly_created: true,
            manifest_stale: true,
        })
    }

    /// Dispose the live session; no-op when there is none
    pub fn dispose(&mut self) {
        if let Some(mut live) = self.live.take() {
            live.session.dispose();
        }
    }

    pub fn live(&self) -> Option<&LiveSession> {
        self.live.as_ref()
    }

    pub fn live_mut(&mut self) -> Option<&mut LiveSession> {
        self.live.as_mut()
    }

    pub fn has_live_session(&self) -> bool {
        self.live.is_some()
    }
}
