//! Journey snapshot
//!
//! [`Journey`] bundles the validated task model, the locale catalog, and the
//! platform directory into one immutable, cheaply clonable value. A reload
//! builds a new snapshot; nothing inside one ever changes.
//!
//! Every per-user answer (the presented task list, update validation,
//! settling) is a pure function of the snapshot plus a [`UserProgress`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::catalog::{CatalogStore, JourneyPhase};
use crate::config::dto::JourneyDocument;
use crate::config::TaskConfig;
use crate::error::{LoadError, QueryError, UpdateError};
use crate::graph::TaskGraph;
use crate::locale::{locale_meta, LocaleCatalog, TextDirection};
use crate::phase::{arrival_start, bucket, resolve_current_phase, PhaseBucket};
use crate::platforms::PlatformCatalog;
use crate::progress::{self, derive_status, ProgressUpdate, TaskStatus, UserProgress, ValidatedUpdate};
use crate::subtask::{is_subtask_complete, CompletionPolicy, Subtask};
use crate::task::{ActionLink, Importance, Repeat, Task};

#[derive(Debug, Clone)]
pub struct Journey {
    config: Arc<TaskConfig>,
    locales: Arc<LocaleCatalog>,
    platforms: Arc<PlatformCatalog>,
}

/// Who is asking, and when.
#[derive(Debug, Clone, PartialEq)]
pub struct UserContext {
    pub city: Option<String>,
    pub locale: Option<String>,
    pub arrival: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

impl UserContext {
    pub fn new(
        city: Option<&str>,
        locale: Option<&str>,
        arrival: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            city: city.map(str::to_string),
            locale: locale.map(str::to_string),
            arrival,
            now,
        }
    }

    /// Take city, locale, and arrival date from the stored progress record.
    pub fn from_progress(progress: &UserProgress, now: DateTime<Utc>) -> Self {
        Self {
            city: progress.selected_city.clone(),
            locale: progress.locale.clone(),
            arrival: progress.arrival_date.map(arrival_start),
            now,
        }
    }
}

// ── Views ──

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyView {
    pub locale: String,
    pub direction: TextDirection,
    pub current_phase: PhaseView,
    pub tasks: Vec<TaskView>,
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseView {
    pub id: String,
    pub label: String,
    pub ordinal: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub module: String,
    pub module_label: String,
    pub time_window: String,
    pub time_window_label: String,
    pub bucket: PhaseBucket,
    pub importance: Importance,
    pub repeat: Repeat,
    pub locked: bool,
    pub blocked_by: Vec<String>,
    pub complete: bool,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub subtasks: Vec<SubtaskView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub action_links: Vec<ActionLink>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<DocumentView>,
}

/// One checklist item with the user's collected state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub id: String,
    pub label: String,
    pub optional: bool,
    pub collected: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskView {
    pub id: String,
    pub title: String,
    pub required: bool,
    pub complete: bool,
    #[serde(flatten)]
    pub detail: SubtaskDetail,
}

/// Variant-specific presentation data.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubtaskDetail {
    Simple {
        done: bool,
    },
    #[serde(rename_all = "camelCase")]
    FormCriteria {
        criteria_key: String,
        fields: Vec<FieldView>,
    },
    #[serde(rename_all = "camelCase")]
    ExternalAction {
        action_type: String,
        completion_policy: CompletionPolicy,
        providers: Vec<ProviderView>,
    },
    #[serde(rename_all = "camelCase")]
    LinkedTask {
        linked_task_id: String,
        linked_title: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderView {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub done: bool,
}

// ── Snapshot ──

impl Journey {
    pub fn new(config: TaskConfig, locales: LocaleCatalog, platforms: PlatformCatalog) -> Self {
        Self {
            config: Arc::new(config),
            locales: Arc::new(locales),
            platforms: Arc::new(platforms),
        }
    }

    /// Validate a raw document into a snapshot. Catalog issues fail first,
    /// since task references cannot be checked without a catalog.
    pub fn build(
        document: &JourneyDocument,
        platforms: PlatformCatalog,
        locales: LocaleCatalog,
    ) -> Result<Self, LoadError> {
        let catalog = Arc::new(CatalogStore::load(&document.catalog)?);
        let config = TaskConfig::load_with_platforms(&document.tasks, catalog, &platforms)?;
        Ok(Self::new(config, locales, platforms))
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CatalogStore {
        self.config.catalog()
    }

    pub fn graph(&self) -> &TaskGraph {
        self.config.graph()
    }

    pub fn locales(&self) -> &LocaleCatalog {
        &self.locales
    }

    pub fn platforms(&self) -> &PlatformCatalog {
        &self.platforms
    }

    pub fn current_phase(&self, ctx: &UserContext) -> &JourneyPhase {
        resolve_current_phase(ctx.arrival, ctx.now, self.catalog())
    }

    pub fn translate(&self, key: &str, locale: &str) -> String {
        self.locales.resolve(key, locale)
    }

    pub fn status(&self, task_id: &str, progress: &UserProgress) -> Result<TaskStatus, QueryError> {
        Ok(derive_status(self.config.task(task_id)?, progress))
    }

    /// The presented task list: visible tasks in topological order with
    /// localized text and every derived flag.
    pub fn task_list(
        &self,
        ctx: &UserContext,
        progress: &UserProgress,
    ) -> Result<JourneyView, QueryError> {
        let tasks = match ctx.city.as_deref() {
            Some(city) => self.config.visible_for(city)?,
            None => self.config.topological_order(),
        };

        let locale = self
            .locales
            .normalize(ctx.locale.as_deref().unwrap_or(self.locales.canonical()))
            .to_string();
        let current = self.current_phase(ctx);

        let views: Vec<TaskView> = tasks
            .into_iter()
            .map(|task| self.task_view(task, current, ctx, &locale, progress))
            .collect();
        let completed = views.iter().filter(|v| v.complete).count();

        Ok(JourneyView {
            direction: locale_meta(&locale).direction,
            current_phase: PhaseView {
                id: current.id.clone(),
                label: self.phase_label(current, &locale),
                ordinal: current.ordinal,
            },
            completed,
            total: views.len(),
            tasks: views,
            locale,
        })
    }

    fn phase_label(&self, phase: &JourneyPhase, locale: &str) -> String {
        self.locales
            .resolve_or(&format!("timeWindows.{}", phase.id), locale, &phase.label)
    }

    fn task_view(
        &self,
        task: &Task,
        current: &JourneyPhase,
        ctx: &UserContext,
        locale: &str,
        progress: &UserProgress,
    ) -> TaskView {
        let key = task.content_key();
        let text = |suffix: &str, fallback: &str| {
            self.locales
                .resolve_or(&format!("tasks.{}.{}", key, suffix), locale, fallback)
        };

        let (time_window_label, task_bucket) = match self.catalog().phase(&task.time_window) {
            Some(phase) => (self.phase_label(phase, locale), bucket(phase, current)),
            None => (task.time_window.clone(), PhaseBucket::Future),
        };
        let module_label = self
            .catalog()
            .module(&task.module)
            .map(|m| m.label.as_str())
            .unwrap_or(task.module.as_str());

        let blocked_by: Vec<String> = task
            .dependencies
            .iter()
            .filter(|d| !progress.is_task_completed(d))
            .cloned()
            .collect();
        let status = derive_status(task, progress);

        TaskView {
            id: task.id.clone(),
            title: text("title", &task.title),
            description: text("description", &task.description),
            module: task.module.clone(),
            module_label: self.locales.resolve_or(
                &format!("modules.{}", task.module),
                locale,
                module_label,
            ),
            time_window: task.time_window.clone(),
            time_window_label,
            bucket: task_bucket,
            importance: task.importance,
            repeat: task.repeat,
            locked: !blocked_by.is_empty(),
            blocked_by,
            complete: status == TaskStatus::Done,
            status,
            city_note: task
                .city_note
                .as_deref()
                .map(|note| text("cityNote", note)),
            notes: progress.task(&task.id).and_then(|t| t.notes.clone()),
            subtasks: task
                .subtasks
                .iter()
                .map(|s| self.subtask_view(task, s, locale, progress))
                .collect(),
            action_links: task
                .action_links
                .iter()
                .filter(|l| l.visible_in(ctx.city.as_deref()))
                .cloned()
                .collect(),
            documents: task
                .document_checklist
                .iter()
                .map(|d| DocumentView {
                    id: d.id.clone(),
                    label: text(&format!("documents.{}", d.id), &d.label),
                    optional: d.optional,
                    collected: progress.document_collected(&task.id, &d.id),
                })
                .collect(),
        }
    }

    fn subtask_view(
        &self,
        task: &Task,
        subtask: &Subtask,
        locale: &str,
        progress: &UserProgress,
    ) -> SubtaskView {
        let detail = match subtask {
            Subtask::Simple(s) => SubtaskDetail::Simple {
                done: progress.subtask_done(&task.id, &s.id),
            },
            Subtask::FormCriteria(form) => SubtaskDetail::FormCriteria {
                criteria_key: form.criteria_key.clone(),
                fields: form
                    .fields
                    .iter()
                    .map(|f| {
                        let value = progress.criteria_value(&form.criteria_key, &f.name);
                        FieldView {
                            name: f.name.clone(),
                            valid: value.is_some_and(|v| f.constraint.check(&f.name, v).is_ok()),
                            value: value.cloned(),
                        }
                    })
                    .collect(),
            },
            Subtask::ExternalAction(action) => SubtaskDetail::ExternalAction {
                action_type: action.action_type.clone(),
                completion_policy: action.completion_policy,
                providers: action
                    .providers
                    .iter()
                    .map(|id| {
                        let service = self.platforms.service(id);
                        ProviderView {
                            id: id.clone(),
                            name: service.map(|s| s.name.clone()).unwrap_or_else(|| id.clone()),
                            url: service.map(|s| s.base_url.clone()),
                            category: self.platforms.category_of(id).map(str::to_string),
                            done: progress.provider_done(&task.id, &action.action_type, id),
                        }
                    })
                    .collect(),
            },
            Subtask::LinkedTask(linked) => {
                let linked_title = match self.config.task(&linked.linked_task_id) {
                    Ok(target) => self.locales.resolve_or(
                        &format!("tasks.{}.title", target.content_key()),
                        locale,
                        &target.title,
                    ),
                    Err(_) => linked.linked_task_id.clone(),
                };
                SubtaskDetail::LinkedTask {
                    linked_task_id: linked.linked_task_id.clone(),
                    linked_title,
                }
            }
        };

        SubtaskView {
            id: subtask.id().to_string(),
            title: self.locales.resolve_or(
                &format!("tasks.{}.subtasks.{}", task.content_key(), subtask.id()),
                locale,
                subtask.title(),
            ),
            required: subtask.required(),
            complete: is_subtask_complete(task, subtask, progress),
            detail,
        }
    }

    // ── Updates ──

    /// Check an update against the loaded configuration. Rejected updates
    /// carry the reason and leave no trace; accepted ones have their
    /// `criteria_key` or `action_type` filled in from the subtask definition.
    pub fn validate_update(&self, update: ProgressUpdate) -> Result<ValidatedUpdate, UpdateError> {
        let task = self.config.task(update.task_id())?;

        let update = match update {
            ProgressUpdate::ToggleSubtask {
                task_id,
                subtask_id,
            } => {
                match find_subtask(task, &subtask_id)? {
                    Subtask::Simple(_) => {}
                    other => return Err(wrong_variant(other, "simple")),
                }
                ProgressUpdate::ToggleSubtask {
                    task_id,
                    subtask_id,
                }
            }
            ProgressUpdate::SetCriteriaField {
                task_id,
                subtask_id,
                field,
                value,
                ..
            } => {
                let form = match find_subtask(task, &subtask_id)? {
                    Subtask::FormCriteria(form) => form,
                    other => return Err(wrong_variant(other, "form_criteria")),
                };
                let form_field = form.field(&field).ok_or_else(|| UpdateError::UnknownField {
                    subtask_id: subtask_id.clone(),
                    field: field.clone(),
                })?;
                form_field.constraint.check(&field, &value)?;
                ProgressUpdate::SetCriteriaField {
                    task_id,
                    subtask_id,
                    criteria_key: form.criteria_key.clone(),
                    field,
                    value,
                }
            }
            ProgressUpdate::MarkProvider {
                task_id,
                subtask_id,
                provider_id,
                done,
                ..
            } => {
                let action = match find_subtask(task, &subtask_id)? {
                    Subtask::ExternalAction(action) => action,
                    other => return Err(wrong_variant(other, "external_action")),
                };
                if !action.lists_provider(&provider_id) {
                    return Err(UpdateError::UnknownProvider {
                        subtask_id,
                        provider_id,
                    });
                }
                ProgressUpdate::MarkProvider {
                    task_id,
                    subtask_id,
                    action_type: action.action_type.clone(),
                    provider_id,
                    done,
                }
            }
            ProgressUpdate::MarkDocument {
                task_id,
                document_id,
                collected,
            } => {
                if task.document(&document_id).is_none() {
                    return Err(UpdateError::UnknownDocument {
                        task_id,
                        document_id,
                    });
                }
                ProgressUpdate::MarkDocument {
                    task_id,
                    document_id,
                    collected,
                }
            }
            other @ (ProgressUpdate::SetTaskDone { .. } | ProgressUpdate::SetNotes { .. }) => other,
        };

        Ok(ValidatedUpdate::new(update))
    }

    /// Promote tasks whose required subtasks are all complete. Repeats until
    /// nothing changes, so chains of linked tasks settle in one call.
    pub fn settle(&self, progress: &mut UserProgress) -> Vec<String> {
        let settled = progress::settle(self.graph(), progress);
        if !settled.is_empty() {
            tracing::debug!(tasks = ?settled, "tasks settled");
        }
        settled
    }

    /// Validate, apply, and settle in one step. Returns the newly completed
    /// task ids.
    pub fn apply_update(
        &self,
        progress: &mut UserProgress,
        update: ProgressUpdate,
    ) -> Result<Vec<String>, UpdateError> {
        let validated = self.validate_update(update)?;
        progress.apply(&validated);
        Ok(self.settle(progress))
    }
}

fn find_subtask<'a>(task: &'a Task, subtask_id: &str) -> Result<&'a Subtask, UpdateError> {
    task.subtask(subtask_id)
        .ok_or_else(|| UpdateError::UnknownSubtask {
            task_id: task.id.clone(),
            subtask_id: subtask_id.to_string(),
        })
}

fn wrong_variant(subtask: &Subtask, expected: &'static str) -> UpdateError {
    UpdateError::WrongVariant {
        subtask_id: subtask.id().to_string(),
        expected,
        actual: subtask.kind(),
    }
}
