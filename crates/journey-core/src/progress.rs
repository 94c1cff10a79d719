//! Per-user progress
//!
//! [`UserProgress`] is the only mutable state in the system. It is owned by
//! the caller (or a [`crate::store::ProgressStore`]) and passed into every
//! resolution pass as a consistent snapshot.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::TaskGraph;
use crate::subtask::{is_task_complete, Subtask};
use crate::task::Task;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProgress {
    pub completed_task_ids: BTreeSet<String>,
    pub tasks: BTreeMap<String, TaskProgress>,
    /// criteriaKey -> field -> submitted value
    pub criteria: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskProgress {
    pub subtasks: BTreeMap<String, bool>,
    /// actionType -> providerId -> done
    pub actions: BTreeMap<String, BTreeMap<String, bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Ids from the task's document checklist the user has collected.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub documents: BTreeSet<String>,
}

impl TaskProgress {
    pub fn has_activity(&self) -> bool {
        self.subtasks.values().any(|done| *done)
            || self.actions.values().flat_map(|m| m.values()).any(|done| *done)
            || self.notes.as_deref().is_some_and(|n| !n.trim().is_empty())
            || !self.documents.is_empty()
    }
}

impl UserProgress {
    pub fn is_task_completed(&self, task_id: &str) -> bool {
        self.completed_task_ids.contains(task_id)
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskProgress> {
        self.tasks.get(task_id)
    }

    pub fn subtask_done(&self, task_id: &str, subtask_id: &str) -> bool {
        self.task(task_id)
            .and_then(|t| t.subtasks.get(subtask_id))
            .copied()
            .unwrap_or(false)
    }

    pub fn provider_done(&self, task_id: &str, action_type: &str, provider_id: &str) -> bool {
        self.task(task_id)
            .and_then(|t| t.actions.get(action_type))
            .and_then(|m| m.get(provider_id))
            .copied()
            .unwrap_or(false)
    }

    pub fn document_collected(&self, task_id: &str, document_id: &str) -> bool {
        self.task(task_id)
            .is_some_and(|t| t.documents.contains(document_id))
    }

    pub fn criteria_value(&self, criteria_key: &str, field: &str) -> Option<&Value> {
        self.criteria.get(criteria_key).and_then(|m| m.get(field))
    }

    pub fn set_subtask(&mut self, task_id: &str, subtask_id: &str, done: bool) {
        self.task_entry(task_id)
            .subtasks
            .insert(subtask_id.to_string(), done);
    }

    pub fn set_provider(&mut self, task_id: &str, action_type: &str, provider_id: &str, done: bool) {
        self.task_entry(task_id)
            .actions
            .entry(action_type.to_string())
            .or_default()
            .insert(provider_id.to_string(), done);
    }

    pub fn set_document(&mut self, task_id: &str, document_id: &str, collected: bool) {
        let documents = &mut self.task_entry(task_id).documents;
        if collected {
            documents.insert(document_id.to_string());
        } else {
            documents.remove(document_id);
        }
    }

    pub fn set_criteria(&mut self, criteria_key: &str, field: &str, value: Value) {
        self.criteria
            .entry(criteria_key.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    fn task_entry(&mut self, task_id: &str) -> &mut TaskProgress {
        self.tasks.entry(task_id.to_string()).or_default()
    }

    /// Apply an update that [`crate::Journey::validate_update`] accepted.
    pub fn apply(&mut self, update: &ValidatedUpdate) {
        match &update.0 {
            ProgressUpdate::ToggleSubtask {
                task_id,
                subtask_id,
            } => {
                let done = self.subtask_done(task_id, subtask_id);
                self.set_subtask(task_id, subtask_id, !done);
            }
            ProgressUpdate::SetCriteriaField {
                criteria_key,
                field,
                value,
                ..
            } => self.set_criteria(criteria_key, field, value.clone()),
            ProgressUpdate::MarkProvider {
                task_id,
                action_type,
                provider_id,
                done,
                ..
            } => self.set_provider(task_id, action_type, provider_id, *done),
            ProgressUpdate::SetTaskDone { task_id, done } => {
                if *done {
                    self.completed_task_ids.insert(task_id.clone());
                } else {
                    self.completed_task_ids.remove(task_id);
                }
            }
            ProgressUpdate::SetNotes { task_id, notes } => {
                let notes = notes.trim();
                self.task_entry(task_id).notes = (!notes.is_empty()).then(|| notes.to_string());
            }
            ProgressUpdate::MarkDocument {
                task_id,
                document_id,
                collected,
            } => self.set_document(task_id, document_id, *collected),
        }
    }
}

// ── Updates ──

/// A requested change to a user's progress.
///
/// `criteria_key` and `action_type` are filled in from the subtask definition
/// during validation; callers may leave them empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ProgressUpdate {
    #[serde(rename_all = "camelCase")]
    ToggleSubtask { task_id: String, subtask_id: String },
    #[serde(rename_all = "camelCase")]
    SetCriteriaField {
        task_id: String,
        subtask_id: String,
        #[serde(default)]
        criteria_key: String,
        field: String,
        value: Value,
    },
    #[serde(rename_all = "camelCase")]
    MarkProvider {
        task_id: String,
        subtask_id: String,
        #[serde(default)]
        action_type: String,
        provider_id: String,
        done: bool,
    },
    #[serde(rename_all = "camelCase")]
    SetTaskDone { task_id: String, done: bool },
    #[serde(rename_all = "camelCase")]
    SetNotes { task_id: String, notes: String },
    #[serde(rename_all = "camelCase")]
    MarkDocument {
        task_id: String,
        document_id: String,
        collected: bool,
    },
}

impl ProgressUpdate {
    pub fn task_id(&self) -> &str {
        match self {
            ProgressUpdate::ToggleSubtask { task_id, .. }
            | ProgressUpdate::SetCriteriaField { task_id, .. }
            | ProgressUpdate::MarkProvider { task_id, .. }
            | ProgressUpdate::SetTaskDone { task_id, .. }
            | ProgressUpdate::SetNotes { task_id, .. }
            | ProgressUpdate::MarkDocument { task_id, .. } => task_id,
        }
    }
}

/// An update that passed validation against the loaded configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedUpdate(ProgressUpdate);

impl ValidatedUpdate {
    pub(crate) fn new(update: ProgressUpdate) -> Self {
        Self(update)
    }

    pub fn update(&self) -> &ProgressUpdate {
        &self.0
    }
}

// ── Derived status ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

/// Done when recorded or settle-complete, in progress on any recorded
/// activity, otherwise todo.
pub fn derive_status(task: &Task, progress: &UserProgress) -> TaskStatus {
    if progress.is_task_completed(&task.id) || settles(task, progress) {
        return TaskStatus::Done;
    }

    let own_activity = progress.task(&task.id).is_some_and(TaskProgress::has_activity);
    let criteria_activity = task.subtasks.iter().any(|s| match s {
        Subtask::FormCriteria(form) => form.fields.iter().any(|f| {
            progress
                .criteria_value(&form.criteria_key, &f.name)
                .is_some_and(|v| !v.is_null())
        }),
        _ => false,
    });

    if own_activity || criteria_activity {
        TaskStatus::InProgress
    } else {
        TaskStatus::Todo
    }
}

/// A task with no required subtasks is only ever completed explicitly.
fn settles(task: &Task, progress: &UserProgress) -> bool {
    task.required_subtasks().next().is_some() && is_task_complete(task, progress)
}

/// Promote every task whose required subtasks are complete into
/// `completed_task_ids`, repeating until nothing changes. Returns the newly
/// completed ids in the order they settled.
pub fn settle(graph: &TaskGraph, progress: &mut UserProgress) -> Vec<String> {
    let mut settled = Vec::new();
    loop {
        let ready: Vec<String> = graph
            .topological_order()
            .into_iter()
            .filter(|t| !progress.is_task_completed(&t.id) && settles(t, progress))
            .map(|t| t.id.clone())
            .collect();
        if ready.is_empty() {
            break;
        }
        for id in ready {
            progress.completed_task_ids.insert(id.clone());
            settled.push(id);
        }
    }
    settled
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_partial_documents() {
        let progress: UserProgress = serde_json::from_value(json!({
            "completedTaskIds": ["a"],
            "tasks": {"b": {"subtasks": {"s1": true}}},
            "arrivalDate": "2026-03-01"
        }))
        .unwrap();
        assert!(progress.is_task_completed("a"));
        assert!(progress.subtask_done("b", "s1"));
        assert!(!progress.subtask_done("b", "s2"));
        assert_eq!(progress.arrival_date, NaiveDate::from_ymd_opt(2026, 3, 1));
        assert!(progress.criteria.is_empty());
    }

    #[test]
    fn toggle_flips_subtask() {
        let mut progress = UserProgress::default();
        let toggle = ValidatedUpdate::new(ProgressUpdate::ToggleSubtask {
            task_id: "a".into(),
            subtask_id: "s".into(),
        });
        progress.apply(&toggle);
        assert!(progress.subtask_done("a", "s"));
        progress.apply(&toggle);
        assert!(!progress.subtask_done("a", "s"));
    }

    #[test]
    fn set_task_done_adds_and_removes() {
        let mut progress = UserProgress::default();
        progress.apply(&ValidatedUpdate::new(ProgressUpdate::SetTaskDone {
            task_id: "a".into(),
            done: true,
        }));
        assert!(progress.is_task_completed("a"));
        progress.apply(&ValidatedUpdate::new(ProgressUpdate::SetTaskDone {
            task_id: "a".into(),
            done: false,
        }));
        assert!(!progress.is_task_completed("a"));
    }

    #[test]
    fn blank_notes_clear_the_entry() {
        let mut progress = UserProgress::default();
        progress.apply(&ValidatedUpdate::new(ProgressUpdate::SetNotes {
            task_id: "a".into(),
            notes: "call the landlord".into(),
        }));
        assert!(progress.task("a").unwrap().has_activity());
        progress.apply(&ValidatedUpdate::new(ProgressUpdate::SetNotes {
            task_id: "a".into(),
            notes: "   ".into(),
        }));
        assert_eq!(progress.task("a").unwrap().notes, None);
        assert!(!progress.task("a").unwrap().has_activity());
    }

    #[test]
    fn collected_documents_count_as_activity() {
        let mut progress = UserProgress::default();
        let mark = |collected| {
            ValidatedUpdate::new(ProgressUpdate::MarkDocument {
                task_id: "a".into(),
                document_id: "passport".into(),
                collected,
            })
        };
        progress.apply(&mark(true));
        assert!(progress.document_collected("a", "passport"));
        assert!(progress.task("a").unwrap().has_activity());

        progress.apply(&mark(false));
        assert!(!progress.document_collected("a", "passport"));
        assert!(!progress.task("a").unwrap().has_activity());
    }

    #[test]
    fn update_wire_format_is_tagged() {
        let update: ProgressUpdate = serde_json::from_value(json!({
            "op": "mark_provider",
            "taskId": "open-bank-account",
            "subtaskId": "choose_bank",
            "providerId": "n26",
            "done": true
        }))
        .unwrap();
        assert_eq!(update.task_id(), "open-bank-account");
    }
}
