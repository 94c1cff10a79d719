//! Subtask Model
//!
//! Subtasks are a closed set of tagged variants. Each variant implements
//! [`CompletionCheckable`] once, and [`Subtask::as_checkable`] is the single
//! dispatch point; callers never match on the variant to decide completion.
//!
//! Adding a variant touches:
//!
//! - the variant struct and its `CompletionCheckable` impl
//! - the [`Subtask`] enum and its arm in [`Subtask::as_checkable`]
//! - the tag in [`Subtask::from_value`] and in [`KNOWN_VARIANTS`]
//! - the accessor arms in [`Subtask::id`], [`Subtask::title`],
//!   [`Subtask::required`] and [`Subtask::kind`]
//! - the detail arm of the subtask view in `journey.rs`
//!
//! The accessor and view matches are exhaustive, so the compiler lists every
//! arm still missing. The two tag lists are plain strings and are checked by
//! `every_known_tag_round_trips_through_kind` below.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::InvalidFieldValue;
use crate::progress::UserProgress;
use crate::task::Task;

/// Variant tags accepted in configuration.
pub const KNOWN_VARIANTS: &[&str] = &["simple", "form_criteria", "external_action", "linked_task"];

/// Everything a variant may consult to decide completion.
#[derive(Debug, Clone, Copy)]
pub struct CompletionContext<'a> {
    pub task_id: &'a str,
    pub progress: &'a UserProgress,
}

/// Capability implemented by every subtask variant.
pub trait CompletionCheckable {
    fn is_complete(&self, ctx: &CompletionContext<'_>) -> bool;
}

// ── Variants ──

/// Single boolean toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SimpleSubtask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub required: bool,
}

impl CompletionCheckable for SimpleSubtask {
    fn is_complete(&self, ctx: &CompletionContext<'_>) -> bool {
        ctx.progress.subtask_done(ctx.task_id, &self.id)
    }
}

/// Captures a set of named values into the user's criteria record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FormCriteriaSubtask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub required: bool,
    pub criteria_key: String,
    pub fields: Vec<FormField>,
}

impl FormCriteriaSubtask {
    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl CompletionCheckable for FormCriteriaSubtask {
    fn is_complete(&self, ctx: &CompletionContext<'_>) -> bool {
        self.fields.iter().all(|field| {
            ctx.progress
                .criteria_value(&self.criteria_key, &field.name)
                .is_some_and(|value| field.constraint.check(&field.name, value).is_ok())
        })
    }
}

/// Sign-ups or bookings on third-party platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExternalActionSubtask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub required: bool,
    pub action_type: String,
    pub providers: Vec<String>,
    #[serde(default)]
    pub completion_policy: CompletionPolicy,
}

impl ExternalActionSubtask {
    pub fn lists_provider(&self, provider_id: &str) -> bool {
        self.providers.iter().any(|p| p == provider_id)
    }
}

impl CompletionCheckable for ExternalActionSubtask {
    fn is_complete(&self, ctx: &CompletionContext<'_>) -> bool {
        let done = |provider: &String| {
            ctx.progress
                .provider_done(ctx.task_id, &self.action_type, provider)
        };
        match self.completion_policy {
            CompletionPolicy::All => !self.providers.is_empty() && self.providers.iter().all(done),
            CompletionPolicy::Any => self.providers.iter().any(done),
        }
    }
}

/// Points at another task; complete once that task is complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinkedTaskSubtask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub required: bool,
    pub linked_task_id: String,
}

impl CompletionCheckable for LinkedTaskSubtask {
    fn is_complete(&self, ctx: &CompletionContext<'_>) -> bool {
        ctx.progress.is_task_completed(&self.linked_task_id)
    }
}

/// How many listed providers must be marked done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    #[default]
    All,
    Any,
}

// ── Form fields ──

/// A named form field and the constraint its value must satisfy.
///
/// Written either as a bare name (`"maxRent"`, constraint `non_empty`) or as
/// `{"name": "maxRent", "constraint": {"kind": "numeric", "min": 0}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FormFieldDto")]
pub struct FormField {
    pub name: String,
    pub constraint: FieldConstraint,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FormFieldDto {
    Name(String),
    Spec(FieldSpec),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldSpec {
    name: String,
    #[serde(default)]
    constraint: FieldConstraint,
}

impl From<FormFieldDto> for FormField {
    fn from(dto: FormFieldDto) -> Self {
        match dto {
            FormFieldDto::Name(name) => FormField {
                name,
                constraint: FieldConstraint::NonEmpty,
            },
            FormFieldDto::Spec(FieldSpec { name, constraint }) => FormField { name, constraint },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum FieldConstraint {
    /// Present, not null, not a blank string.
    #[default]
    NonEmpty,
    /// A number, or a string that parses as one, within optional bounds.
    Numeric {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// A string equal to one of `values`.
    OneOf { values: Vec<String> },
}

impl FieldConstraint {
    /// Check a single submitted value.
    pub fn check(&self, field: &str, value: &Value) -> Result<(), InvalidFieldValue> {
        let reject = |reason: String| {
            Err(InvalidFieldValue {
                field: field.to_string(),
                reason,
            })
        };

        match self {
            FieldConstraint::NonEmpty => match value {
                Value::Null => reject("value is required".to_string()),
                Value::String(s) if s.trim().is_empty() => {
                    reject("value must not be blank".to_string())
                }
                _ => Ok(()),
            },
            FieldConstraint::Numeric { min, max } => {
                let number = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                let Some(number) = number.filter(|n| n.is_finite()) else {
                    return reject(format!("expected a number, got {}", value));
                };
                if let Some(min) = min {
                    if number < *min {
                        return reject(format!("{} is below the minimum {}", number, min));
                    }
                }
                if let Some(max) = max {
                    if number > *max {
                        return reject(format!("{} is above the maximum {}", number, max));
                    }
                }
                Ok(())
            }
            FieldConstraint::OneOf { values } => match value {
                Value::String(s) if values.iter().any(|v| v == s) => Ok(()),
                _ => reject(format!("expected one of [{}], got {}", values.join(", "), value)),
            },
        }
    }
}

// ── Closed variant set ──

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Subtask {
    Simple(SimpleSubtask),
    FormCriteria(FormCriteriaSubtask),
    ExternalAction(ExternalActionSubtask),
    LinkedTask(LinkedTaskSubtask),
}

/// Why a raw subtask could not be turned into a [`Subtask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtaskParseError {
    NotAnObject,
    UnknownTag(String),
    Fields { variant: &'static str, message: String },
}

impl std::fmt::Display for SubtaskParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubtaskParseError::NotAnObject => write!(f, "subtask must be an object"),
            SubtaskParseError::UnknownTag(tag) => write!(
                f,
                "unknown subtask type '{}' (expected one of {})",
                tag,
                KNOWN_VARIANTS.join(", ")
            ),
            SubtaskParseError::Fields { variant, message } => {
                write!(f, "invalid {} subtask: {}", variant, message)
            }
        }
    }
}

fn parse_variant<T: DeserializeOwned>(
    fields: Map<String, Value>,
    variant: &'static str,
) -> Result<T, SubtaskParseError> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| SubtaskParseError::Fields {
        variant,
        message: e.to_string(),
    })
}

impl Subtask {
    /// Dispatch a raw subtask on its `type` tag. A missing tag means `simple`.
    pub fn from_value(raw: &Value) -> Result<Self, SubtaskParseError> {
        let Value::Object(object) = raw else {
            return Err(SubtaskParseError::NotAnObject);
        };
        let mut fields = object.clone();
        let tag = match fields.remove("type") {
            None => "simple".to_string(),
            Some(Value::String(tag)) => tag,
            Some(other) => return Err(SubtaskParseError::UnknownTag(other.to_string())),
        };

        match tag.as_str() {
            "simple" => parse_variant(fields, "simple").map(Subtask::Simple),
            "form_criteria" => parse_variant(fields, "form_criteria").map(Subtask::FormCriteria),
            "external_action" => {
                parse_variant(fields, "external_action").map(Subtask::ExternalAction)
            }
            "linked_task" => parse_variant(fields, "linked_task").map(Subtask::LinkedTask),
            _ => Err(SubtaskParseError::UnknownTag(tag)),
        }
    }

    pub fn as_checkable(&self) -> &dyn CompletionCheckable {
        match self {
            Subtask::Simple(s) => s,
            Subtask::FormCriteria(s) => s,
            Subtask::ExternalAction(s) => s,
            Subtask::LinkedTask(s) => s,
        }
    }

    pub fn is_complete(&self, ctx: &CompletionContext<'_>) -> bool {
        self.as_checkable().is_complete(ctx)
    }

    pub fn id(&self) -> &str {
        match self {
            Subtask::Simple(s) => &s.id,
            Subtask::FormCriteria(s) => &s.id,
            Subtask::ExternalAction(s) => &s.id,
            Subtask::LinkedTask(s) => &s.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Subtask::Simple(s) => &s.title,
            Subtask::FormCriteria(s) => &s.title,
            Subtask::ExternalAction(s) => &s.title,
            Subtask::LinkedTask(s) => &s.title,
        }
    }

    pub fn required(&self) -> bool {
        match self {
            Subtask::Simple(s) => s.required,
            Subtask::FormCriteria(s) => s.required,
            Subtask::ExternalAction(s) => s.required,
            Subtask::LinkedTask(s) => s.required,
        }
    }

    /// The configuration tag for this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Subtask::Simple(_) => "simple",
            Subtask::FormCriteria(_) => "form_criteria",
            Subtask::ExternalAction(_) => "external_action",
            Subtask::LinkedTask(_) => "linked_task",
        }
    }
}

pub fn is_subtask_complete(task: &Task, subtask: &Subtask, progress: &UserProgress) -> bool {
    subtask.is_complete(&CompletionContext {
        task_id: &task.id,
        progress,
    })
}

/// Conjunction over the task's required subtasks. Optional ones never block.
pub fn is_task_complete(task: &Task, progress: &UserProgress) -> bool {
    task.required_subtasks()
        .all(|s| is_subtask_complete(task, s, progress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Importance, Repeat};
    use serde_json::json;

    fn task_with(subtasks: Vec<Subtask>) -> Task {
        Task {
            id: "t1".to_string(),
            time_window: "week_1".to_string(),
            module: "housing".to_string(),
            title: "T1".to_string(),
            description: String::new(),
            dependencies: vec![],
            importance: Importance::High,
            repeat: Repeat::Once,
            city_scope: vec![],
            subtasks,
            content_key: None,
            city_note: None,
            action_links: vec![],
            document_checklist: vec![],
        }
    }

    fn simple(id: &str, required: bool) -> Subtask {
        Subtask::Simple(SimpleSubtask {
            id: id.to_string(),
            title: id.to_string(),
            required,
        })
    }

    #[test]
    fn parses_each_variant() {
        let cases = [
            (json!({"id": "a", "title": "A", "type": "simple", "required": true}), "simple"),
            (
                json!({"id": "b", "title": "B", "type": "form_criteria", "criteriaKey": "housing_preferences", "fields": ["maxRent"]}),
                "form_criteria",
            ),
            (
                json!({"id": "c", "title": "C", "type": "external_action", "actionType": "bank_signup", "providers": ["n26"]}),
                "external_action",
            ),
            (
                json!({"id": "d", "title": "D", "type": "linked_task", "linkedTaskId": "other"}),
                "linked_task",
            ),
            (json!({"id": "e", "title": "E"}), "simple"),
        ];
        for (raw, kind) in cases {
            let parsed = Subtask::from_value(&raw).unwrap();
            assert_eq!(parsed.kind(), kind);
        }
    }

    #[test]
    fn rejects_unknown_tag() {
        let err = Subtask::from_value(&json!({"id": "x", "title": "X", "type": "checklist"}))
            .unwrap_err();
        assert_eq!(err, SubtaskParseError::UnknownTag("checklist".to_string()));
        assert!(err.to_string().contains("form_criteria"));
    }

    #[test]
    fn rejects_fields_from_another_variant() {
        let err = Subtask::from_value(&json!({
            "id": "x", "title": "X", "type": "simple", "providers": ["n26"]
        }))
        .unwrap_err();
        assert!(matches!(err, SubtaskParseError::Fields { variant: "simple", .. }));
    }

    #[test]
    fn rejects_missing_variant_fields() {
        let err = Subtask::from_value(&json!({
            "id": "x", "title": "X", "type": "external_action", "providers": ["n26"]
        }))
        .unwrap_err();
        match err {
            SubtaskParseError::Fields { variant, message } => {
                assert_eq!(variant, "external_action");
                assert!(message.contains("actionType"));
            }
            other => panic!("expected Fields error, got {:?}", other),
        }
    }

    #[test]
    fn form_fields_accept_names_and_specs() {
        let parsed = Subtask::from_value(&json!({
            "id": "prefs",
            "title": "Preferences",
            "type": "form_criteria",
            "criteriaKey": "housing_preferences",
            "fields": [
                "district",
                {"name": "maxRent", "constraint": {"kind": "numeric", "min": 0}},
                {"name": "type", "constraint": {"kind": "one_of", "values": ["wg", "apartment"]}}
            ]
        }))
        .unwrap();
        let Subtask::FormCriteria(form) = parsed else {
            panic!("expected form_criteria");
        };
        assert_eq!(form.fields[0].constraint, FieldConstraint::NonEmpty);
        assert_eq!(
            form.field("maxRent").unwrap().constraint,
            FieldConstraint::Numeric {
                min: Some(0.0),
                max: None
            }
        );
        assert!(matches!(
            form.field("type").unwrap().constraint,
            FieldConstraint::OneOf { .. }
        ));
    }

    #[test]
    fn form_field_specs_reject_unknown_keys() {
        let form = |field: Value| {
            Subtask::from_value(&json!({
                "id": "prefs",
                "title": "Preferences",
                "type": "form_criteria",
                "criteriaKey": "housing_preferences",
                "fields": [field]
            }))
        };
        let misspelled_key = form(json!({
            "name": "maxRent",
            "constrant": {"kind": "numeric", "min": 0}
        }));
        assert!(matches!(
            misspelled_key,
            Err(SubtaskParseError::Fields { variant: "form_criteria", .. })
        ));

        let misspelled_bound = form(json!({
            "name": "maxRent",
            "constraint": {"kind": "numeric", "minimum": 0}
        }));
        assert!(misspelled_bound.is_err());

        assert!(form(json!({"name": "maxRent"})).is_ok());
    }

    #[test]
    fn every_known_tag_round_trips_through_kind() {
        let extra = |tag: &str| match tag {
            "form_criteria" => json!({"criteriaKey": "k", "fields": ["f"]}),
            "external_action" => json!({"actionType": "signup", "providers": ["n26"]}),
            "linked_task" => json!({"linkedTaskId": "other"}),
            _ => json!({}),
        };
        for tag in KNOWN_VARIANTS {
            let mut raw = json!({"id": "s", "title": "S", "type": tag});
            if let (Some(target), Value::Object(more)) = (raw.as_object_mut(), extra(tag)) {
                target.extend(more);
            }
            let parsed = Subtask::from_value(&raw)
                .unwrap_or_else(|e| panic!("tag {} does not parse: {}", tag, e));
            assert_eq!(parsed.kind(), *tag);
            assert_eq!(parsed.id(), "s");
        }
    }

    #[test]
    fn constraint_checks() {
        let non_empty = FieldConstraint::NonEmpty;
        assert!(non_empty.check("f", &json!("x")).is_ok());
        assert!(non_empty.check("f", &json!(0)).is_ok());
        assert!(non_empty.check("f", &json!("  ")).is_err());
        assert!(non_empty.check("f", &Value::Null).is_err());

        let numeric = FieldConstraint::Numeric {
            min: Some(0.0),
            max: Some(3000.0),
        };
        assert!(numeric.check("maxRent", &json!(1200)).is_ok());
        assert!(numeric.check("maxRent", &json!("950.5")).is_ok());
        let err = numeric.check("maxRent", &json!("cheap")).unwrap_err();
        assert_eq!(err.field, "maxRent");
        assert!(numeric.check("maxRent", &json!(-1)).is_err());
        assert!(numeric.check("maxRent", &json!(5000)).is_err());

        let one_of = FieldConstraint::OneOf {
            values: vec!["wg".to_string(), "apartment".to_string()],
        };
        assert!(one_of.check("type", &json!("wg")).is_ok());
        assert!(one_of.check("type", &json!("castle")).is_err());
    }

    #[test]
    fn completion_composition() {
        let mut progress = UserProgress::default();
        progress.set_subtask("t1", "done-required", true);

        let mut task = task_with(vec![
            simple("done-required", true),
            simple("open-required", true),
            simple("open-optional", false),
        ]);
        assert!(!is_task_complete(&task, &progress));

        if let Subtask::Simple(s) = &mut task.subtasks[1] {
            s.required = false;
        }
        assert!(is_task_complete(&task, &progress));
    }

    #[test]
    fn form_criteria_needs_every_field_valid() {
        let task = task_with(vec![Subtask::FormCriteria(FormCriteriaSubtask {
            id: "form1".to_string(),
            title: "Form 1".to_string(),
            required: true,
            criteria_key: "housing_preferences".to_string(),
            fields: vec![
                FormField {
                    name: "maxRent".to_string(),
                    constraint: FieldConstraint::Numeric {
                        min: None,
                        max: None,
                    },
                },
                FormField {
                    name: "minSize".to_string(),
                    constraint: FieldConstraint::NonEmpty,
                },
            ],
        })]);

        let mut progress = UserProgress::default();
        progress.set_criteria("housing_preferences", "maxRent", json!(1000));
        assert!(!is_task_complete(&task, &progress));

        progress.set_criteria("housing_preferences", "minSize", json!(""));
        assert!(!is_task_complete(&task, &progress));

        progress.set_criteria("housing_preferences", "minSize", json!(50));
        assert!(is_task_complete(&task, &progress));

        progress.set_criteria("housing_preferences", "maxRent", json!("a lot"));
        assert!(!is_task_complete(&task, &progress));
    }

    #[test]
    fn external_action_policies() {
        let action = |policy| ExternalActionSubtask {
            id: "choose_bank".to_string(),
            title: "Choose a bank".to_string(),
            required: true,
            action_type: "bank_signup".to_string(),
            providers: vec!["n26".to_string(), "deutsche_bank".to_string()],
            completion_policy: policy,
        };
        let mut progress = UserProgress::default();
        progress.set_provider("t1", "bank_signup", "n26", true);
        let ctx = CompletionContext {
            task_id: "t1",
            progress: &progress,
        };

        assert!(!action(CompletionPolicy::All).is_complete(&ctx));
        assert!(action(CompletionPolicy::Any).is_complete(&ctx));

        progress.set_provider("t1", "bank_signup", "deutsche_bank", true);
        let ctx = CompletionContext {
            task_id: "t1",
            progress: &progress,
        };
        assert!(action(CompletionPolicy::All).is_complete(&ctx));
    }

    #[test]
    fn linked_task_follows_completed_set() {
        let linked = LinkedTaskSubtask {
            id: "go".to_string(),
            title: "Open the bank task".to_string(),
            required: true,
            linked_task_id: "open-bank-account".to_string(),
        };
        let mut progress = UserProgress::default();
        assert!(!linked.is_complete(&CompletionContext {
            task_id: "t1",
            progress: &progress
        }));
        progress.completed_task_ids.insert("open-bank-account".to_string());
        assert!(linked.is_complete(&CompletionContext {
            task_id: "t1",
            progress: &progress
        }));
    }
}
