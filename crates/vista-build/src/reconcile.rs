//! Preview reconciliation
//!
//! Decides, before evaluation, whether the render surface needs a full
//! reload, a compiled-cache clear, or neither.

use crate::error::BuildResult;
use crate::session::BuildSession;
use crate::state::OrchestratorState;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::{Mutex, MutexGuard, PoisonError};
use vista_config::{ConfigurationSet, ProjectSnapshot, TemplateDefinition};

/// Where the preview is rendered
#[async_trait]
pub trait RenderSurface: Send + Sync {
    fn body(&self) -> String;

    fn set_body(&self, body: &str);

    /// Reload the whole evaluation environment
    fn reload(&self);

    /// Clear whatever the previous evaluation left on screen
    fn reset_screen(&self);

    /// Reset the error overlay, optionally keeping a visible error
    fn reset_overlay(&self, keep_error: bool);

    /// Ask the user to resume evaluation manually
    fn show_resume_prompt(&self);

    async fn load_external_resources(&self, resources: &[String]) -> BuildResult<()>;

    fn measured_height(&self) -> u32;
}

/// Head and body markup of a preview document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlParts {
    pub head: String,
    pub body: String,
}

/// Split a document into head and body markup
///
/// Only documents containing a `<body>` tag are split; anything else is
/// treated as body markup.
pub fn html_parts(markup: &str) -> HtmlParts {
    lazy_static! {
        static ref BODY_RE: Regex = Regex::new(r"(?s)<body>(.*)</body>").unwrap();
        static ref HEAD_RE: Regex = Regex::new(r"(?s)<head>(.*)</head>").unwrap();
    }

    if !markup.contains("<body>") {
        return HtmlParts {
            head: String::new(),
            body: markup.to_string(),
        };
    }

    let capture = |re: &Regex| {
        re.captures(markup)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
    };

    HtmlParts {
        head: capture(&*HEAD_RE).unwrap_or_default().to_string(),
        body: capture(&*BODY_RE).unwrap_or(markup).to_string(),
    }
}

/// Markup of the first HTML entry present in the project, or the template's
/// fallback skeleton
pub fn preview_markup(
    definition: &TemplateDefinition,
    configurations: &ConfigurationSet,
    snapshot: &ProjectSnapshot,
) -> String {
    definition
        .html_entries(configurations)
        .iter()
        .find_map(|path| snapshot.module(path))
        .map(|module| module.code.as_str())
        .filter(|code| !code.is_empty())
        .unwrap_or_else(|| definition.fallback_body())
        .to_string()
}

/// What reconciliation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Head changed; the environment was reloaded and evaluation is skipped
    Reloaded,
    /// Body changed; compiled output was dropped
    ClearedCompiledCache,
    Unchanged,
}

/// Apply the reconciliation rules for one build
pub fn reconcile(
    state: &mut OrchestratorState,
    markup: &str,
    html_disabled: bool,
    local_server: bool,
    surface: &dyn RenderSurface,
    session: &mut dyn BuildSession,
) -> Reconciliation {
    let HtmlParts { head, body } = html_parts(markup);

    let recorded = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

    let outcome = match (recorded(&state.last_head), recorded(&state.last_body)) {
        (Some(last_head), _) if !state.first_load && last_head != head => {
            tracing::debug!("Preview head changed, reloading");
            surface.reload();
            Reconciliation::Reloaded
        }
        (_, Some(last_body)) if last_body != body => {
            session.clear_compiled_cache();
            Reconciliation::ClearedCompiledCache
        }
        _ => Reconciliation::Unchanged,
    };

    if outcome != Reconciliation::Reloaded && !(state.first_load && html_disabled && !local_server)
    {
        surface.set_body(&body);
    }

    state.last_head = Some(head);
    state.last_body = Some(body);

    outcome
}

#[derive(Debug, Default)]
struct SurfaceState {
    body: String,
    height: u32,
    reloads: usize,
    screen_resets: usize,
    overlay_resets: Vec<bool>,
    resume_prompts: usize,
    resources: Vec<String>,
}

/// In-memory render surface
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    state: Mutex<SurfaceState>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_height(&self, height: u32) {
        self.state().height = height;
    }

    pub fn reload_count(&self) -> usize {
        self.state().reloads
    }

    pub fn screen_reset_count(&self) -> usize {
        self.state().screen_resets
    }

    /// `keep_error` flag of every overlay reset, in order
    pub fn overlay_resets(&self) -> Vec<bool> {
        self.state().overlay_resets.clone()
    }

    pub fn resume_prompt_count(&self) -> usize {
        self.state().resume_prompts
    }

    pub fn loaded_resources(&self) -> Vec<String> {
        self.state().resources.clone()
    }
}

#[async_trait]
impl RenderSurface for HeadlessSurface {
    fn body(&self) -> String {
        self.state().body.clone()
    }

    fn set_body(&self, body: &str) {
        self.state().body = body.to_string();
    }

    fn reload(&self) {
        let mut state = self.state();
        state.reloads += 1;
        state.body.clear();
    }

    fn reset_screen(&self) {
        self.state().screen_resets += 1;
    }

    fn reset_overlay(&self, keep_error: bool) {
        self.state().overlay_resets.push(keep_error);
    }

    fn show_resume_prompt(&self) {
        self.state().resume_prompts += 1;
    }

    async fn load_external_resources(&self, resources: &[String]) -> BuildResult<()> {
        let mut state = self.state();
        for resource in resources {
            if !state.resources.contains(resource) {
                state.resources.push(resource.clone());
            }
        }
        Ok(())
    }

    fn measured_height(&self) -> u32 {
        self.state().height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vista_config::TemplateKind;

    #[test]
    fn test_html_parts_without_body_tag() {
        let parts = html_parts(r#"<div id="root"></div>"#);
        assert_eq!(parts.head, "");
        assert_eq!(parts.body, r#"<div id="root"></div>"#);
    }

    #[test]
    fn test_html_parts_split() {
        let parts = html_parts(
            "<html><head><title>x</title></head><body>\n<div id=\"app\"></div>\n</body></html>",
        );
        assert_eq!(parts.head, "<title>x</title>");
        assert_eq!(parts.body, "\n<div id=\"app\"></div>\n");
    }

    #[test]
    fn test_html_parts_empty_body_falls_back_to_document() {
        let markup = "<head></head><body></body>";
        let parts = html_parts(markup);
        assert_eq!(parts.head, "");
        assert_eq!(parts.body, markup);
    }

    #[test]
    fn test_preview_markup_fallbacks() {
        let snapshot = ProjectSnapshot::new("p", TemplateKind::VueCli);
        let definition = TemplateKind::VueCli.definition();
        assert_eq!(
            preview_markup(&definition, &ConfigurationSet::new(), &snapshot),
            r#"<div id="app"></div>"#
        );

        let snapshot = ProjectSnapshot::new("p", TemplateKind::CreateReactApp)
            .with_module("/public/index.html", "<body><main></main></body>");
        let definition = TemplateKind::CreateReactApp.definition();
        assert_eq!(
            preview_markup(&definition, &ConfigurationSet::new(), &snapshot),
            "<body><main></main></body>"
        );
    }

    #[tokio::test]
    async fn test_headless_surface_dedupes_resources() {
        let surface = HeadlessSurface::new();
        let resources = vec!["a.css".to_string(), "a.css".to_string()];
        surface.load_external_resources(&resources).await.unwrap();
        assert_eq!(surface.loaded_resources(), vec!["a.css".to_string()]);
    }
}
