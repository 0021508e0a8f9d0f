//! Session lifecycle, preview reconciliation and cache lifecycle across
//! consecutive builds

mod common;

use common::*;
use common::assert_eq;
use serde_json::json;
use vista_build::*;

fn html_project(title: &str, body: &str) -> ProjectSnapshot {
    node_project("p1").with_module(
        "/index.html",
        format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, body
        ),
    )
}

mod sessions {
    use super::*;
    use super::assert_eq;

    #[tokio::test]
    async fn test_session_reused_for_same_combination() {
        let (mut compiler, fixture) = Fixture::compiler();

        compiler.compile(task(node_project("p1"))).await;
        let next = node_project("p1").with_module("/index.js", "module.exports = 2");
        compiler.compile(task(next)).await;

        assert_eq!(fixture.journal.count(|c| matches!(c, Call::Create { .. })), 1);
        assert_eq!(fixture.journal.count(|c| *c == Call::SetManifest(1)), 1);
        assert_eq!(fixture.journal.count(|c| *c == Call::UpdateModules(1)), 2);
        assert_eq!(fixture.journal.count(|c| matches!(c, Call::Dispose(_))), 0);
    }

    #[tokio::test]
    async fn test_combination_change_replaces_session() {
        let (mut compiler, fixture) = Fixture::compiler();

        compiler.compile(task(node_project("p1"))).await;
        let next = node_project("p1").with_module(
            "/package.json",
            r#"{ "dependencies": { "left-pad": "^1.0.0", "lodash": "^4.17.0" } }"#,
        );
        compiler.compile(task(next)).await;

        let dispose = fixture.journal.position(&Call::Dispose(1)).unwrap();
        let create = fixture
            .journal
            .position(&Call::Create {
                instance: 2,
                project: "p1".to_string(),
            })
            .unwrap();
        assert!(dispose < create);
        assert_eq!(fixture.journal.count(|c| *c == Call::SetManifest(2)), 1);
        assert!(fixture.packager.last().unwrap().contains("lodash"));
    }

    #[tokio::test]
    async fn test_project_change_replaces_session() {
        let (mut compiler, fixture) = Fixture::compiler();

        compiler.compile(task(node_project("p1"))).await;
        compiler.compile(task(node_project("p2"))).await;

        assert_eq!(
            fixture.journal.calls()
                .into_iter()
                .filter(|c| matches!(c, Call::Create { .. } | Call::Dispose(_)))
                .collect::<Vec<_>>(),
            vec![
                Call::Create {
                    instance: 1,
                    project: "p1".to_string(),
                },
                Call::Dispose(1),
                Call::Create {
                    instance: 2,
                    project: "p2".to_string(),
                },
            ]
        );
        assert_eq!(compiler.controller().live().unwrap().project_id, "p2");
    }

    #[tokio::test]
    async fn test_changed_modules_passed_to_teardown() {
        let (mut compiler, fixture) = Fixture::compiler();

        compiler.compile(task(node_project("p1"))).await;
        let next = node_project("p1").with_module("/index.js", "module.exports = 2");
        compiler.compile(task(next)).await;

        assert_eq!(
            fixture.journal.calls().last(),
            Some(&Call::Teardown {
                instance: 1,
                changed: vec!["/index.js".to_string()],
            })
        );
        assert_eq!(compiler.state().changed_module_count, 1);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let (mut compiler, fixture) = Fixture::compiler();

        compiler.compile(task(node_project("p1"))).await;
        compiler.dispose();
        compiler.dispose();

        assert_eq!(fixture.journal.count(|c| matches!(c, Call::Dispose(_))), 1);
        assert!(!compiler.controller().has_live_session());
    }
}

mod reconciliation {
    use super::*;
    use super::assert_eq;

    #[tokio::test]
    async fn test_first_build_writes_body() {
        let (mut compiler, fixture) = Fixture::compiler();

        compiler
            .compile(task(html_project("A", "<div id=\"root\"></div>")))
            .await;

        assert_eq!(fixture.surface.body(), "<div id=\"root\"></div>");
        assert_eq!(fixture.surface.reload_count(), 0);
        assert_eq!(
            compiler.state().last_head.as_deref(),
            Some("<title>A</title>")
        );
    }

    #[tokio::test]
    async fn test_head_change_reloads_without_evaluating() {
        let (mut compiler, mut fixture) = Fixture::compiler();

        compiler
            .compile(task(html_project("A", "<div id=\"root\"></div>")))
            .await;
        fixture.journal.clear();
        fixture.drain();

        let report = compiler
            .compile(task(html_project("B", "<div id=\"root\"></div>")))
            .await;

        assert!(report.reloaded);
        assert!(!report.had_error);
        assert_eq!(fixture.surface.reload_count(), 1);
        assert_eq!(fixture.journal.count(|c| matches!(c, Call::Evaluate { .. })), 0);
        assert_eq!(fixture.journal.count(|c| matches!(c, Call::ClearCompiledCache(_))), 0);
        assert_eq!(fixture.journal.count(|c| matches!(c, Call::Teardown { .. })), 1);
        assert!(kinds(&fixture.drain()).contains(&"success".to_string()));
        assert_eq!(
            compiler.state().last_head.as_deref(),
            Some("<title>B</title>")
        );
    }

    #[tokio::test]
    async fn test_body_change_clears_compiled_cache() {
        let (mut compiler, fixture) = Fixture::compiler();

        compiler
            .compile(task(html_project("A", "<div id=\"root\"></div>")))
            .await;
        fixture.journal.clear();

        compiler
            .compile(task(html_project("A", "<div id=\"app\"></div>")))
            .await;

        assert_eq!(fixture.surface.reload_count(), 0);
        assert_eq!(fixture.journal.count(|c| *c == Call::ClearCompiledCache(1)), 1);
        assert_eq!(fixture.journal.count(|c| matches!(c, Call::Evaluate { .. })), 1);
        assert_eq!(fixture.surface.body(), "<div id=\"app\"></div>");
    }

    #[tokio::test]
    async fn test_unchanged_markup_does_neither() {
        let (mut compiler, fixture) = Fixture::compiler();

        compiler
            .compile(task(html_project("A", "<div id=\"root\"></div>")))
            .await;
        fixture.journal.clear();

        let next = html_project("A", "<div id=\"root\"></div>")
            .with_module("/index.js", "module.exports = 2");
        compiler.compile(task(next)).await;

        assert_eq!(fixture.surface.reload_count(), 0);
        assert_eq!(fixture.journal.count(|c| matches!(c, Call::ClearCompiledCache(_))), 0);
        assert_eq!(fixture.journal.count(|c| matches!(c, Call::Evaluate { .. })), 1);
    }

    #[tokio::test]
    async fn test_fallback_body_without_html_entry() {
        let (mut compiler, fixture) = Fixture::compiler();

        compiler.compile(task(node_project("p1"))).await;

        assert_eq!(fixture.surface.body(), "<div id=\"root\"></div>");
    }

    #[tokio::test]
    async fn test_hot_reload_sessions_skip_reconciliation() {
        let (mut compiler, fixture) = Fixture::compiler();
        fixture.behave(|b| b.hot_reload = true);

        compiler
            .compile(task(html_project("A", "<div id=\"root\"></div>")))
            .await;
        compiler
            .compile(task(html_project("B", "<div id=\"root\"></div>")))
            .await;

        assert_eq!(fixture.surface.reload_count(), 0);
        assert_eq!(fixture.journal.count(|c| matches!(c, Call::Evaluate { .. })), 2);
        // Hot-reloading sessions keep the error overlay
        assert_eq!(fixture.surface.overlay_resets(), vec![false, true]);
    }
}

mod cache_lifecycle {
    use super::*;
    use super::assert_eq;

    fn cached_entry() -> CacheEntry {
        let mut snapshot = SessionSnapshot::new();
        snapshot.insert("modules".to_string(), json!(["/index.js"]));
        CacheEntry {
            project_id: "p1".to_string(),
            entry_path: Some("/index.js".to_string()),
            snapshot,
            changed_module_count: 0,
            first_load: true,
            saved_at: 0,
        }
    }

    #[tokio::test]
    async fn test_restores_before_manifest_on_first_build() {
        let (mut compiler, fixture) = Fixture::compiler();
        fixture.cache.inner.insert(cached_entry());

        compiler.compile(task(node_project("p1"))).await;

        let restore = fixture.journal.position(&Call::LoadSnapshot(1)).unwrap();
        let manifest = fixture.journal.position(&Call::SetManifest(1)).unwrap();
        assert!(restore < manifest);
    }

    #[tokio::test]
    async fn test_restores_only_once() {
        let (mut compiler, fixture) = Fixture::compiler();
        fixture.cache.inner.insert(cached_entry());

        compiler.compile(task(node_project("p1"))).await;
        compiler.compile(task(node_project("p2"))).await;

        assert_eq!(fixture.journal.count(|c| matches!(c, Call::LoadSnapshot(_))), 1);
    }

    #[tokio::test]
    async fn test_saves_compact_snapshot_after_success() {
        let (mut compiler, fixture) = Fixture::compiler();

        compiler.compile(task(node_project("p1"))).await;

        let entry = fixture.cache.inner.get("p1").unwrap();
        assert_eq!(entry.entry_path.as_deref(), Some("/index.js"));
        assert!(entry.first_load);
        assert_eq!(entry.changed_module_count, 2);
        assert_eq!(entry.snapshot["optimized"], true);
        assert!(!entry.snapshot.contains_key("cachedPaths"));
    }

    #[tokio::test]
    async fn test_poisoned_cache_evicted_once() {
        let (mut compiler, fixture) = Fixture::compiler();
        fixture.cache.inner.insert(cached_entry());
        fixture.behave(|b| {
            b.report_unchanged = true;
            b.fail_transpile = Some("stale module".to_string());
        });

        compiler.compile(task(node_project("p1"))).await;
        assert_eq!(fixture.cache.deletes(), 1);
        assert!(!fixture.cache.inner.contains("p1"));

        compiler.compile(task(node_project("p1"))).await;
        assert_eq!(fixture.cache.deletes(), 1);
    }

    #[tokio::test]
    async fn test_cache_failing_evaluation_evicted_not_saved() {
        let (mut compiler, fixture) = Fixture::compiler();
        fixture.cache.inner.insert(cached_entry());
        fixture.behave(|b| {
            b.report_unchanged = true;
            b.fail_evaluate = Some("stale compiled output".to_string());
        });

        let report = compiler.compile(task(node_project("p1"))).await;

        assert!(report.had_error);
        assert_eq!(fixture.cache.deletes(), 1);
        assert!(!fixture.cache.inner.contains("p1"));
        assert_eq!(fixture.journal.count(|c| *c == Call::ClearCache(1)), 1);
    }

    #[tokio::test]
    async fn test_no_eviction_when_modules_changed() {
        let (mut compiler, fixture) = Fixture::compiler();
        fixture.cache.inner.insert(cached_entry());
        fixture.behave(|b| b.fail_transpile = Some("syntax error".to_string()));

        compiler.compile(task(node_project("p1"))).await;

        assert_eq!(fixture.cache.deletes(), 0);
        assert!(fixture.cache.inner.contains("p1"));
    }

    #[tokio::test]
    async fn test_disabled_cache_persists_nothing() {
        let (compiler, fixture) = Fixture::compiler();
        let mut config = EngineConfig::default();
        config.cache.enabled = false;
        let mut compiler = compiler.with_config(config);

        compiler.compile(task(node_project("p1"))).await;

        assert!(!fixture.cache.inner.contains("p1"));
    }

    #[tokio::test]
    async fn test_fs_store_round_trip_through_builds() {
        let dir = tempfile::tempdir().unwrap();
        let (compiler, fixture) = Fixture::compiler();
        let mut compiler = compiler.with_cache_store(std::sync::Arc::new(FsCacheStore::new(dir.path())));

        compiler.compile(task(node_project("p1"))).await;

        let store = FsCacheStore::new(dir.path());
        assert!(store.entry_path("p1").exists());
        let entry = store.load("p1").await.unwrap().unwrap();
        assert_eq!(entry.project_id, "p1");
        assert_eq!(fixture.journal.count(|c| matches!(c, Call::LoadSnapshot(_))), 0);
    }
}
