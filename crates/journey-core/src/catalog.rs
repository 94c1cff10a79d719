//! Catalog Store
//!
//! Immutable view of the static reference data: cities, journey phases
//! (time windows), and modules. Validated once at load; read-only afterwards.

use std::collections::{HashMap, HashSet};

use chrono::TimeDelta;
use serde::Serialize;

use crate::config::dto::CatalogDto;
use crate::error::{CatalogIssue, QueryError, ValidationError};

/// Inclusive end day for well-known phase ids that do not declare `endDay`.
pub const DEFAULT_PHASE_END_DAYS: &[(&str, i64)] = &[
    ("pre_arrival", 0),
    ("week_1", 7),
    ("weeks_2_4", 28),
    ("month_2", 60),
    ("month_3", 90),
];

fn default_end_day(phase_id: &str) -> Option<i64> {
    DEFAULT_PHASE_END_DAYS
        .iter()
        .find(|(id, _)| *id == phase_id)
        .map(|(_, end)| *end)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct City {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Module {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Elapsed-time window of a phase, in days since arrival: `(start_day, end_day]`.
///
/// `None` on either side means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseWindow {
    pub start_day: Option<i64>,
    pub end_day: Option<i64>,
}

impl PhaseWindow {
    /// True when `elapsed` lies strictly after the window's start.
    pub fn has_started(&self, elapsed: TimeDelta) -> bool {
        match self.start_day {
            None => true,
            Some(start) => elapsed > TimeDelta::days(start),
        }
    }

    pub fn contains(&self, elapsed: TimeDelta) -> bool {
        self.has_started(elapsed)
            && self
                .end_day
                .is_none_or(|end| elapsed <= TimeDelta::days(end))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JourneyPhase {
    pub id: String,
    pub label: String,
    pub ordinal: u32,
    pub window: PhaseWindow,
}

#[derive(Debug, Clone)]
pub struct CatalogStore {
    cities: Vec<City>,
    /// Ordered by ordinal. Never empty.
    phases: Vec<JourneyPhase>,
    modules: Vec<Module>,
    city_index: HashMap<String, usize>,
    phase_index: HashMap<String, usize>,
    module_index: HashMap<String, usize>,
}

impl CatalogStore {
    /// Validate raw catalog data. Every issue is collected before failing.
    pub fn load(raw: &CatalogDto) -> Result<Self, ValidationError> {
        let mut issues = Vec::new();

        let city_index = index_unique(
            raw.cities.iter().map(|c| c.id.as_str()),
            "cities",
            &mut issues,
        );
        let module_index = index_unique(
            raw.modules.iter().map(|m| m.id.as_str()),
            "modules",
            &mut issues,
        );
        let phase_index = index_unique(
            raw.time_windows.iter().map(|t| t.id.as_str()),
            "timeWindows",
            &mut issues,
        );

        let phases = derive_phases(raw, &mut issues);

        if !issues.is_empty() {
            return Err(ValidationError { issues });
        }

        let cities = raw
            .cities
            .iter()
            .map(|c| City {
                id: c.id.clone(),
                name: c.name.clone(),
            })
            .collect();
        let modules = raw
            .modules
            .iter()
            .map(|m| Module {
                id: m.id.clone(),
                label: m.label.clone(),
                icon: m.icon.clone(),
            })
            .collect();

        Ok(Self {
            cities,
            phases,
            modules,
            city_index,
            phase_index,
            module_index,
        })
    }

    pub fn city(&self, id: &str) -> Option<&City> {
        self.city_index.get(id).map(|&i| &self.cities[i])
    }

    pub fn phase(&self, id: &str) -> Option<&JourneyPhase> {
        self.phase_index.get(id).map(|&i| &self.phases[i])
    }

    pub fn module(&self, id: &str) -> Option<&Module> {
        self.module_index.get(id).map(|&i| &self.modules[i])
    }

    /// Typed lookup for request paths.
    pub fn require_city(&self, id: &str) -> Result<&City, QueryError> {
        self.city(id)
            .ok_or_else(|| QueryError::UnknownCity(id.to_string()))
    }

    pub fn require_phase(&self, id: &str) -> Result<&JourneyPhase, QueryError> {
        self.phase(id)
            .ok_or_else(|| QueryError::UnknownPhase(id.to_string()))
    }

    pub fn phases_ordered(&self) -> &[JourneyPhase] {
        &self.phases
    }

    pub fn first_phase(&self) -> &JourneyPhase {
        &self.phases[0]
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }
}

/// Index ids by position, recording duplicates. First occurrence wins.
fn index_unique<'a>(
    ids: impl Iterator<Item = &'a str>,
    section: &str,
    issues: &mut Vec<CatalogIssue>,
) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    for (i, id) in ids.enumerate() {
        if id.trim().is_empty() {
            issues.push(CatalogIssue::new(
                format!("{}[{}]", section, i),
                "id must not be empty",
            ));
        } else if index.contains_key(id) {
            issues.push(CatalogIssue::new(
                format!("{}[{}]", section, i),
                format!("duplicate id '{}'", id),
            ));
        } else {
            index.insert(id.to_string(), i);
        }
    }
    index
}

/// Assign ordinals and windows in declaration order.
fn derive_phases(raw: &CatalogDto, issues: &mut Vec<CatalogIssue>) -> Vec<JourneyPhase> {
    let windows = &raw.time_windows;
    if windows.is_empty() {
        issues.push(CatalogIssue::new(
            "timeWindows",
            "at least one time window is required",
        ));
        return Vec::new();
    }

    let mut phases = Vec::with_capacity(windows.len());
    let mut seen_ordinals = HashSet::new();
    let mut previous_ordinal: Option<u32> = None;
    let mut previous_end: Option<i64> = None;
    let last = windows.len() - 1;

    for (i, tw) in windows.iter().enumerate() {
        let path = format!("timeWindows[{}] ({})", i, tw.id);
        let ordinal = tw.ordinal.unwrap_or(i as u32 + 1);

        if !seen_ordinals.insert(ordinal) {
            issues.push(CatalogIssue::new(
                &path,
                format!("ordinal {} is used more than once", ordinal),
            ));
        }
        if let Some(prev) = previous_ordinal {
            if ordinal <= prev {
                issues.push(CatalogIssue::new(
                    &path,
                    format!(
                        "ordinal {} must be greater than the preceding ordinal {}",
                        ordinal, prev
                    ),
                ));
            }
        }

        let end_day = tw.end_day.or_else(|| default_end_day(&tw.id));
        if end_day.is_none() && i != last {
            issues.push(CatalogIssue::new(
                &path,
                "no endDay declared and no default duration for this phase id",
            ));
        }
        if let (Some(prev), Some(end)) = (previous_end, end_day) {
            if end <= prev {
                issues.push(CatalogIssue::new(
                    &path,
                    format!(
                        "endDay {} must be greater than the preceding phase's endDay {}",
                        end, prev
                    ),
                ));
            }
        }

        phases.push(JourneyPhase {
            id: tw.id.clone(),
            label: tw.label.clone(),
            ordinal,
            window: PhaseWindow {
                start_day: previous_end,
                end_day,
            },
        });

        previous_ordinal = Some(ordinal);
        previous_end = end_day;
    }

    phases
}
