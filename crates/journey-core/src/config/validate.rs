use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::dto::TaskDto;
use crate::catalog::CatalogStore;
use crate::error::{ConfigIssue, CycleError, Rule};
use crate::graph::find_cycles;
use crate::platforms::PlatformCatalog;
use crate::subtask::{Subtask, SubtaskParseError};
use crate::task::Task;

/// Outcome of a validation pass. The model is usable only when `issues` is
/// empty; `warnings` never block.
#[derive(Debug, Default)]
pub(crate) struct Validation {
    pub tasks: Vec<Task>,
    pub issues: Vec<ConfigIssue>,
    pub cycles: Vec<CycleError>,
    pub warnings: Vec<ConfigIssue>,
}

struct Parsed {
    /// Position in the raw task list.
    position: usize,
    path: String,
    task: Task,
}

fn task_path(position: usize, raw: &Value) -> String {
    match raw.get("id").and_then(Value::as_str) {
        Some(id) => format!("tasks[{}] ({})", position, id),
        None => format!("tasks[{}]", position),
    }
}

fn is_identifier(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// Validate raw tasks against the catalog. Every stage runs and every issue
/// is collected; nothing short-circuits.
pub(crate) fn validate_tasks(
    raw: &[Value],
    catalog: &CatalogStore,
    platforms: Option<&PlatformCatalog>,
) -> Validation {
    let mut out = Validation::default();

    // 1. Structure
    let parsed = parse_structure(raw, &mut out.issues);

    // 2. References
    let raw_ids: HashSet<&str> = raw
        .iter()
        .filter_map(|t| t.get("id").and_then(Value::as_str))
        .collect();
    for p in &parsed {
        check_references(p, catalog, &raw_ids, platforms, &mut out);
    }

    // 3. Cycles
    check_cycles(&parsed, &mut out);

    // 4. Uniqueness
    check_uniqueness(&parsed, &mut out.issues);

    out.tasks = parsed.into_iter().map(|p| p.task).collect();
    out
}

fn parse_structure(raw: &[Value], issues: &mut Vec<ConfigIssue>) -> Vec<Parsed> {
    let mut parsed = Vec::with_capacity(raw.len());

    for (position, raw_task) in raw.iter().enumerate() {
        let path = task_path(position, raw_task);
        let dto: TaskDto = match serde_json::from_value(raw_task.clone()) {
            Ok(dto) => dto,
            Err(e) => {
                issues.push(ConfigIssue::new(Rule::Structure, &path, e.to_string()));
                continue;
            }
        };

        let mut structurally_sound = true;
        if dto.id.trim().is_empty() {
            issues.push(ConfigIssue::new(Rule::Structure, &path, "task id must not be empty"));
            structurally_sound = false;
        }

        let mut subtasks = Vec::with_capacity(dto.subtasks.len());
        for (j, raw_subtask) in dto.subtasks.iter().enumerate() {
            let sub_path = format!("{}.subtasks[{}]", path, j);
            match Subtask::from_value(raw_subtask) {
                Ok(subtask) => {
                    if let Some(problem) = empty_collection(&subtask) {
                        issues.push(ConfigIssue::new(Rule::Structure, &sub_path, problem));
                        structurally_sound = false;
                    }
                    subtasks.push(subtask);
                }
                Err(e) => {
                    let rule = match e {
                        SubtaskParseError::UnknownTag(_) => Rule::UnknownVariant,
                        _ => Rule::Structure,
                    };
                    issues.push(ConfigIssue::new(rule, &sub_path, e.to_string()));
                    structurally_sound = false;
                }
            }
        }

        if !structurally_sound {
            continue;
        }

        let mut dependencies: Vec<String> = Vec::with_capacity(dto.dependencies.len());
        for dep in dto.dependencies {
            if !dependencies.contains(&dep) {
                dependencies.push(dep);
            }
        }

        parsed.push(Parsed {
            position,
            path,
            task: Task {
                id: dto.id,
                time_window: dto.time_window,
                module: dto.module,
                title: dto.title,
                description: dto.description,
                dependencies,
                importance: dto.importance,
                repeat: dto.repeat,
                city_scope: dto.city_scope,
                subtasks,
                content_key: dto.content_key,
                city_note: dto.city_note,
                action_links: dto.action_links,
                document_checklist: dto.document_checklist,
            },
        });
    }

    parsed
}

fn empty_collection(subtask: &Subtask) -> Option<&'static str> {
    match subtask {
        Subtask::FormCriteria(form) if form.fields.is_empty() => {
            Some("form_criteria subtask must declare at least one field")
        }
        Subtask::ExternalAction(action) if action.providers.is_empty() => {
            Some("external_action subtask must list at least one provider")
        }
        _ => None,
    }
}

fn check_references(
    p: &Parsed,
    catalog: &CatalogStore,
    task_ids: &HashSet<&str>,
    platforms: Option<&PlatformCatalog>,
    out: &mut Validation,
) {
    let task = &p.task;
    let path = &p.path;

    if catalog.phase(&task.time_window).is_none() {
        out.issues.push(ConfigIssue::new(
            Rule::UnknownPhase,
            format!("{}.timeWindow", path),
            format!("unknown time window '{}'", task.time_window),
        ));
    }
    if catalog.module(&task.module).is_none() {
        out.issues.push(ConfigIssue::new(
            Rule::UnknownModule,
            format!("{}.module", path),
            format!("unknown module '{}'", task.module),
        ));
    }
    for (k, city) in task.city_scope.iter().enumerate() {
        if catalog.city(city).is_none() {
            out.issues.push(ConfigIssue::new(
                Rule::UnknownCity,
                format!("{}.cityScope[{}]", path, k),
                format!("unknown city '{}'", city),
            ));
        }
    }
    for (l, link) in task.action_links.iter().enumerate() {
        for (k, city) in link.city_scope.iter().enumerate() {
            if catalog.city(city).is_none() {
                out.issues.push(ConfigIssue::new(
                    Rule::UnknownCity,
                    format!("{}.actionLinks[{}].cityScope[{}]", path, l, k),
                    format!("unknown city '{}'", city),
                ));
            }
        }
    }
    for (k, dep) in task.dependencies.iter().enumerate() {
        if !task_ids.contains(dep.as_str()) {
            out.issues.push(ConfigIssue::new(
                Rule::UnknownDependency,
                format!("{}.dependencies[{}]", path, k),
                format!("dependency '{}' is not a known task", dep),
            ));
        }
    }

    for (j, subtask) in task.subtasks.iter().enumerate() {
        let sub_path = format!("{}.subtasks[{}]", path, j);
        match subtask {
            Subtask::LinkedTask(linked) if !task_ids.contains(linked.linked_task_id.as_str()) => {
                out.issues.push(ConfigIssue::new(
                    Rule::UnknownLinkedTask,
                    format!("{}.linkedTaskId", sub_path),
                    format!("linked task '{}' is not a known task", linked.linked_task_id),
                ));
            }
            Subtask::ExternalAction(action) => {
                for (k, provider) in action.providers.iter().enumerate() {
                    let provider_path = format!("{}.providers[{}]", sub_path, k);
                    if !is_identifier(provider) {
                        out.issues.push(ConfigIssue::new(
                            Rule::MalformedProvider,
                            provider_path,
                            format!("provider id '{}' must match [a-z0-9_-]+", provider),
                        ));
                    } else if let Some(directory) = platforms.filter(|d| !d.is_empty()) {
                        if !directory.contains(provider) {
                            let warning = ConfigIssue::new(
                                Rule::UnknownProvider,
                                provider_path,
                                format!("provider '{}' is not in the platform directory", provider),
                            );
                            tracing::warn!(
                                task = %task.id,
                                subtask = %action.id,
                                provider = %provider,
                                "provider missing from platform directory"
                            );
                            out.warnings.push(warning);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn check_cycles(parsed: &[Parsed], out: &mut Validation) {
    let mut position_of: HashMap<&str, usize> = HashMap::new();
    for (i, p) in parsed.iter().enumerate() {
        position_of.entry(p.task.id.as_str()).or_insert(i);
    }

    let adjacency: Vec<Vec<usize>> = parsed
        .iter()
        .map(|p| {
            p.task
                .dependencies
                .iter()
                .filter_map(|d| position_of.get(d.as_str()).copied())
                .collect()
        })
        .collect();

    for cycle in find_cycles(&adjacency) {
        let Some(&first) = cycle.first() else {
            continue;
        };
        let err = CycleError {
            path: cycle.iter().map(|&i| parsed[i].task.id.clone()).collect(),
        };
        out.issues.push(ConfigIssue::new(
            Rule::Cycle,
            format!("{}.dependencies", parsed[first].path),
            err.to_string(),
        ));
        out.cycles.push(err);
    }
}

fn check_uniqueness(parsed: &[Parsed], issues: &mut Vec<ConfigIssue>) {
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    for p in parsed {
        if let Some(first) = first_seen.get(p.task.id.as_str()) {
            issues.push(ConfigIssue::new(
                Rule::DuplicateTask,
                &p.path,
                format!("duplicate task id '{}' (first declared at tasks[{}])", p.task.id, first),
            ));
        } else {
            first_seen.insert(&p.task.id, p.position);
        }

        let mut document_ids = HashSet::new();
        for (j, document) in p.task.document_checklist.iter().enumerate() {
            if !document_ids.insert(document.id.as_str()) {
                issues.push(ConfigIssue::new(
                    Rule::DuplicateDocument,
                    format!("{}.documentChecklist[{}]", p.path, j),
                    format!("duplicate document id '{}'", document.id),
                ));
            }
        }

        let mut subtask_ids = HashSet::new();
        for (j, subtask) in p.task.subtasks.iter().enumerate() {
            if !subtask_ids.insert(subtask.id()) {
                issues.push(ConfigIssue::new(
                    Rule::DuplicateSubtask,
                    format!("{}.subtasks[{}]", p.path, j),
                    format!("duplicate subtask id '{}'", subtask.id()),
                ));
            }
        }
    }
}
