//! End-to-end binding scenarios against the public API.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use quay::core::QualifiedName;
use quay::model::{EdgeKind, ModelError};
use quay::plugins::{self, SoftwarePlugin};
use quay::util::config::{load_config, project_config_path, DuplicatePolicy};
use quay::{
    ApplyRequest, Binder, BindingError, DeclarationRegistry, ModelShape, ModelValue, Project,
    RawDefinition, SoftwareFeatureDeclaration, SoftwareTypeDeclaration, ValueKind,
};
use tempfile::TempDir;

fn java_registry() -> DeclarationRegistry {
    let mut registry = DeclarationRegistry::new();
    plugins::register_builtin(&mut registry).unwrap();
    registry
}

fn java_binder() -> Binder {
    Binder::new(Arc::new(java_registry()))
}

// ============================================================================
// Parent ordering
// ============================================================================

#[test]
fn test_antlr_after_java_library_resolves_generated_sources() {
    let binder = java_binder();
    let project = Project::new("p", "/work/p");

    binder
        .apply(&project, "javaLibrary", &RawDefinition::new())
        .unwrap();
    let antlr = binder
        .apply(&project, "antlr", &RawDefinition::new())
        .unwrap();

    assert_eq!(
        antlr.model().path_value("generatedSourcesDir").unwrap(),
        PathBuf::from("build/generated-src/antlr/main")
    );
    assert!(project.tasks().contains("generateMainSources"));
}

#[test]
fn test_antlr_before_java_library_is_missing_parent() {
    let binder = java_binder();
    let project = Project::new("p", "/work/p");

    let err = binder
        .apply(&project, "antlr", &RawDefinition::new())
        .unwrap_err();

    match err {
        BindingError::MissingParent { parent, .. } => assert_eq!(parent, "javaLibrary"),
        other => panic!("expected MissingParent, got {other:?}"),
    }
    assert!(project.tasks().is_empty());
    assert!(binder.bindings(project.id()).is_empty());
}

#[test]
fn test_checkstyle_failure_does_not_stop_antlr() {
    let binder = java_binder();
    let project = Project::new("p", "/work/p");

    let report = binder.apply_all(vec![
        ApplyRequest::new(&project, "javaLibrary"),
        ApplyRequest::new(&project, "checkstyle")
            .with_definition(RawDefinition::new().with("ignoreFailures", "sometimes")),
        ApplyRequest::new(&project, "antlr"),
    ]);

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].declaration, "javaLibrary.checkstyle");
    assert!(report.skipped.is_empty());
    assert_eq!(report.applied.len(), 2);
    assert!(!report.is_success());

    let antlr = binder
        .binding(project.id(), &QualifiedName::parse("javaLibrary.antlr").unwrap())
        .unwrap();
    assert_eq!(
        antlr.model().path_value("generatedSourcesDir").unwrap(),
        PathBuf::from("build/generated-src/antlr/main")
    );
}

// ============================================================================
// At-most-once application
// ============================================================================

#[test]
fn test_concurrent_apply_binds_once() {
    let binder = java_binder();
    let project = Project::new("p", "/work/p");
    binder
        .apply(&project, "javaLibrary", &RawDefinition::new())
        .unwrap();

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| binder.apply(&project, "antlr", &RawDefinition::new())))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let applied = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(applied, 1);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(
        e,
        BindingError::DuplicateApplication { .. }
    )));
    assert_eq!(project.tasks().len(), 6);
}

#[test]
fn test_features_on_separate_projects_are_independent() {
    let binder = java_binder();
    let app = Project::new("app", "/work/app");
    let lib = Project::new("lib", "/work/lib");

    let report = binder.apply_all(vec![
        ApplyRequest::new(&app, "javaLibrary"),
        ApplyRequest::new(&app, "antlr"),
        ApplyRequest::new(&lib, "antlr"),
    ]);

    assert_eq!(report.applied.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].project, *lib.id());
    assert!(matches!(
        report.failed[0].error,
        BindingError::MissingParent { .. }
    ));
}

// ============================================================================
// Lazy values and the configuration phase
// ============================================================================

fn metrics_registry() -> DeclarationRegistry {
    let mut registry = DeclarationRegistry::new();
    registry
        .register(
            SoftwareTypeDeclaration::build("metrics")
                .model(ModelShape::new("Metrics").property("count", ValueKind::Integer))
                .bind(|_, _, _| Ok(())),
        )
        .unwrap();
    registry
}

#[test]
fn test_wait_returns_once_value_is_bound() {
    let binder = Binder::new(Arc::new(metrics_registry()));
    let project = Project::new("p", "/work/p");
    let binding = binder
        .apply(&project, "metrics", &RawDefinition::new())
        .unwrap();

    let model = binding.model().clone();
    let waiter = thread::spawn(move || model.wait("count"));

    binding.model().set("count", 3_i64).unwrap();
    assert_eq!(waiter.join().unwrap().unwrap(), ModelValue::Integer(3));
}

#[test]
fn test_wait_fails_when_phase_ends_unbound() {
    let binder = Binder::new(Arc::new(metrics_registry()));
    let project = Project::new("p", "/work/p");
    let binding = binder
        .apply(&project, "metrics", &RawDefinition::new())
        .unwrap();

    let model = binding.model().clone();
    let waiter = thread::spawn(move || model.wait("count"));

    let unresolved = binder.finish_configuration(project.id());
    assert_eq!(unresolved, vec![":p/metrics.count".to_string()]);

    match waiter.join().unwrap() {
        Err(ModelError::UnresolvedValue { phase_complete, .. }) => assert!(phase_complete),
        other => panic!("expected UnresolvedValue, got {other:?}"),
    }
}

#[test]
fn test_set_twice_is_already_bound() {
    let binder = java_binder();
    let project = Project::new("p", "/work/p");
    binder
        .apply(&project, "javaLibrary", &RawDefinition::new())
        .unwrap();
    let antlr = binder
        .apply(&project, "antlr", &RawDefinition::new())
        .unwrap();

    let err = antlr
        .model()
        .set("generatedSourcesDir", PathBuf::from("elsewhere"))
        .unwrap_err();
    assert!(matches!(err, ModelError::AlreadyBound { .. }));
}

// ============================================================================
// Cross-binding consumption
// ============================================================================

struct ReportPlugin;

impl SoftwarePlugin for ReportPlugin {
    fn id(&self) -> &'static str {
        "test.report"
    }

    fn register(&self, registry: &mut DeclarationRegistry) -> Result<(), BindingError> {
        registry.register(
            SoftwareFeatureDeclaration::build("grammarReport", "javaLibrary")
                .requires("javaLibrary.antlr")
                .model(ModelShape::new("GrammarReport").property("input", ValueKind::Path))
                .bind(|ctx, _, _, model| {
                    let antlr = ctx.consume("javaLibrary.antlr")?;
                    model.bind("input", &antlr.property("generatedSourcesDir")?)?;
                    Ok(())
                }),
        )?;
        Ok(())
    }
}

#[test]
fn test_consumer_reads_required_feature_model() {
    let mut registry = java_registry();
    ReportPlugin.register(&mut registry).unwrap();
    let binder = Binder::new(Arc::new(registry));
    let project = Project::new("p", "/work/p");

    let report = binder.apply_all(vec![
        ApplyRequest::new(&project, "grammarReport"),
        ApplyRequest::new(&project, "antlr"),
        ApplyRequest::new(&project, "javaLibrary"),
    ]);
    assert!(report.is_success(), "{report}");

    let snapshot = binder.graph().snapshot(project.id());
    assert!(snapshot.finished);
    assert!(snapshot.edges.iter().any(|e| e.kind == EdgeKind::Consumes
        && e.producer == ":p/javaLibrary.antlr"
        && e.consumer == ":p/javaLibrary.grammarReport"));

    let json = snapshot.to_json().unwrap();
    assert!(json.contains("build/generated-src/antlr/main"));

    let consumer = binder
        .binding(
            project.id(),
            &QualifiedName::parse("javaLibrary.grammarReport").unwrap(),
        )
        .unwrap();
    assert_eq!(
        consumer.model().get("input").unwrap(),
        ModelValue::Path(PathBuf::from("build/generated-src/antlr/main"))
    );
}

// ============================================================================
// Configuration and source files on disk
// ============================================================================

#[test]
fn test_project_config_controls_layout_and_duplicates() {
    let tmp = TempDir::new().unwrap();
    let config_path = project_config_path(tmp.path());
    fs::create_dir_all(config_path.parent().unwrap()).unwrap();
    fs::write(
        &config_path,
        "[binder]\njobs = 2\nduplicates = \"warn\"\n\n[layout]\nbuild_dir = \"out\"\n",
    )
    .unwrap();

    let config = load_config(&tmp.path().join("missing.toml"), &config_path);
    assert_eq!(config.binder.duplicate_policy(), DuplicatePolicy::Warn);

    let binder = Binder::with_config(Arc::new(java_registry()), &config.binder).unwrap();
    let project = Project::with_config("p", tmp.path(), &config);

    let report = binder.apply_all(vec![
        ApplyRequest::new(&project, "javaLibrary"),
        ApplyRequest::new(&project, "antlr"),
    ]);
    assert!(report.is_success());

    let again = binder.apply_all(vec![ApplyRequest::new(&project, "antlr")]);
    assert!(again.is_success());
    assert_eq!(again.ignored.len(), 1);

    let antlr = binder
        .binding(project.id(), &QualifiedName::parse("javaLibrary.antlr").unwrap())
        .unwrap();
    assert_eq!(
        antlr.model().path_value("generatedSourcesDir").unwrap(),
        PathBuf::from("out/generated-src/antlr/main")
    );
}

#[test]
fn test_grammar_files_are_found_under_project_root() {
    let tmp = TempDir::new().unwrap();
    let grammars = tmp.path().join("src/main/antlr/org/example");
    fs::create_dir_all(&grammars).unwrap();
    fs::write(grammars.join("Expr.g4"), "grammar Expr;").unwrap();
    fs::write(grammars.join("notes.txt"), "").unwrap();

    let binder = java_binder();
    let project = Project::new("p", tmp.path());
    binder
        .apply(&project, "javaLibrary", &RawDefinition::new())
        .unwrap();
    let antlr = binder
        .apply(&project, "antlr", &RawDefinition::new())
        .unwrap();

    let files = antlr
        .model()
        .source_set("grammar")
        .unwrap()
        .files(project.layout().root())
        .unwrap();
    assert_eq!(files, vec![grammars.join("Expr.g4")]);
}
