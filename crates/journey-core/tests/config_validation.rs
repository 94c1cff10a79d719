//! Configuration Validation Tests
//!
//! Load-time rejection through the public snapshot builder: cycles are named
//! from their earliest-declared member, every issue is accumulated in one pass, and catalog
//! problems stop the load before task references are checked.

use journey_core::config::dto::parse_document_json;
use journey_core::{Journey, LoadError, LocaleCatalog, PlatformCatalog, Rule};
use serde_json::{json, Value};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn document(tasks: Vec<Value>) -> String {
    json!({
        "cities": [
            {"id": "berlin", "name": "Berlin"},
            {"id": "aachen", "name": "Aachen"}
        ],
        "timeWindows": [
            {"id": "pre_arrival", "label": "Before arrival"},
            {"id": "week_1", "label": "Week 1"},
            {"id": "weeks_2_4", "label": "Weeks 2-4"}
        ],
        "modules": [
            {"id": "bureaucracy", "label": "Bureaucracy"},
            {"id": "finance", "label": "Finance"}
        ],
        "tasks": tasks
    })
    .to_string()
}

fn task(id: &str, deps: &[&str]) -> Value {
    json!({
        "id": id,
        "timeWindow": "week_1",
        "module": "bureaucracy",
        "title": id,
        "dependencies": deps
    })
}

fn build(json: &str) -> Result<Journey, LoadError> {
    build_with_platforms(json, PlatformCatalog::empty())
}

fn build_with_platforms(json: &str, platforms: PlatformCatalog) -> Result<Journey, LoadError> {
    let doc = parse_document_json(json).expect("test document parses");
    Journey::build(&doc, platforms, LocaleCatalog::default())
}

fn config_error(result: Result<Journey, LoadError>) -> journey_core::ConfigError {
    match result {
        Err(LoadError::Config(e)) => e,
        Err(other) => panic!("expected a config error, got {}", other),
        Ok(_) => panic!("expected the configuration to be rejected"),
    }
}

// ── Cycles ───────────────────────────────────────────────────────────────────

#[test]
fn three_task_cycle_is_named_in_order() {
    let err = config_error(build(&document(vec![
        task("A", &["B"]),
        task("B", &["C"]),
        task("C", &["A"]),
    ])));

    assert_eq!(err.cycles().len(), 1);
    assert_eq!(err.cycles()[0].path, vec!["A", "B", "C"]);
    assert_eq!(
        err.cycles()[0].to_string(),
        "dependency cycle: A -> B -> C -> A"
    );
    assert!(err
        .issues
        .iter()
        .any(|i| i.rule == Rule::Cycle && i.path == "tasks[0] (A).dependencies"));
}

#[test]
fn cycle_reached_through_an_outside_task_keeps_declaration_order() {
    let err = config_error(build(&document(vec![
        task("X", &["B"]),
        task("A", &["B"]),
        task("B", &["C"]),
        task("C", &["A"]),
    ])));

    assert_eq!(err.cycles().len(), 1);
    assert_eq!(err.cycles()[0].path, vec!["A", "B", "C"]);
    assert!(err
        .issues
        .iter()
        .any(|i| i.rule == Rule::Cycle && i.path == "tasks[1] (A).dependencies"));
}

#[test]
fn self_dependency_is_a_cycle() {
    let err = config_error(build(&document(vec![task("loop", &["loop"])])));
    assert_eq!(err.cycles()[0].path, vec!["loop"]);
}

#[test]
fn disjoint_cycles_are_all_reported() {
    let err = config_error(build(&document(vec![
        task("a", &["b"]),
        task("b", &["a"]),
        task("free", &[]),
        task("x", &["y"]),
        task("y", &["x"]),
    ])));
    let paths: Vec<Vec<String>> = err.cycles().iter().map(|c| c.path.clone()).collect();
    assert_eq!(paths.len(), 2);
    assert!(paths.contains(&vec!["a".to_string(), "b".to_string()]));
    assert!(paths.contains(&vec!["x".to_string(), "y".to_string()]));
}

// ── Accumulation ─────────────────────────────────────────────────────────────

#[test]
fn every_issue_is_reported_in_one_pass() {
    let mut wrong_module = task("wrong-module", &[]);
    wrong_module["module"] = json!("astrology");

    let mut wrong_variant = task("wrong-variant", &[]);
    wrong_variant["subtasks"] = json!([{"id": "q", "title": "Quiz", "type": "quiz"}]);

    let mut wrong_city = task("wrong-city", &["ghost"]);
    wrong_city["cityScope"] = json!(["paris"]);

    let err = config_error(build(&document(vec![
        wrong_module,
        wrong_variant,
        wrong_city,
        task("dup", &[]),
        task("dup", &[]),
    ])));

    for rule in [
        Rule::UnknownModule,
        Rule::UnknownVariant,
        Rule::UnknownCity,
        Rule::UnknownDependency,
        Rule::DuplicateTask,
    ] {
        assert!(err.has_rule(rule), "missing {} in {}", rule, err);
    }
    assert!(err.cycles().is_empty());
}

#[test]
fn unknown_variant_names_the_tag() {
    let mut t = task("t", &[]);
    t["subtasks"] = json!([{"id": "v", "title": "Video", "type": "video_call"}]);
    let err = config_error(build(&document(vec![t])));

    let issue = err
        .issues
        .iter()
        .find(|i| i.rule == Rule::UnknownVariant)
        .expect("unknown variant issue");
    assert_eq!(issue.path, "tasks[0] (t).subtasks[0]");
    assert!(issue.message.contains("video_call"));
}

#[test]
fn variant_fields_are_checked() {
    let mut t = task("t", &[]);
    t["subtasks"] = json!([
        {"id": "a", "title": "No key", "type": "form_criteria", "fields": ["x"]},
        {"id": "b", "title": "Extra", "type": "simple", "providers": ["n26"]}
    ]);
    let err = config_error(build(&document(vec![t])));
    let structure: Vec<_> = err
        .issues
        .iter()
        .filter(|i| i.rule == Rule::Structure)
        .map(|i| i.path.as_str())
        .collect();
    assert_eq!(
        structure,
        vec!["tasks[0] (t).subtasks[0]", "tasks[0] (t).subtasks[1]"]
    );
}

// ── Catalog and advisory checks ──────────────────────────────────────────────

#[test]
fn catalog_problems_fail_before_tasks() {
    let mut raw: Value = serde_json::from_str(&document(vec![task("a", &["ghost"])])).unwrap();
    raw["timeWindows"] = json!([]);
    let result = build(&raw.to_string());
    match result {
        Err(LoadError::Catalog(e)) => assert_eq!(e.issues[0].path, "timeWindows"),
        Err(other) => panic!("expected a catalog error, got {}", other),
        Ok(_) => panic!("empty phase list must be rejected"),
    }
}

#[test]
fn unknown_provider_is_only_a_warning() {
    let platforms = PlatformCatalog::from_json(
        r#"{"categories": {"banking": {"label": "Banking", "services": [
            {"id": "n26", "name": "N26", "baseUrl": "https://n26.com"}
        ]}}}"#,
    )
    .unwrap();
    let mut bank = task("bank", &[]);
    bank["module"] = json!("finance");
    bank["subtasks"] = json!([{
        "id": "choose", "title": "Choose", "type": "external_action", "required": true,
        "actionType": "bank_signup", "providers": ["n26", "volksbank"]
    }]);

    let journey = build_with_platforms(&document(vec![bank]), platforms).unwrap();
    let warnings = journey.config().warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].rule, Rule::UnknownProvider);
    assert_eq!(warnings[0].path, "tasks[0] (bank).subtasks[0].providers[1]");
}

#[test]
fn duplicate_dependencies_collapse() {
    let journey = build(&document(vec![task("a", &[]), task("b", &["a", "a", "a"])])).unwrap();
    assert_eq!(journey.graph().task("b").unwrap().dependencies, vec!["a"]);
}
