//! Journey Phase Resolver
//!
//! Maps elapsed time since arrival onto a catalog phase, and classifies tasks
//! relative to the user's current phase.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::catalog::{CatalogStore, JourneyPhase};
use crate::task::Task;

/// Where a task's phase sits relative to the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseBucket {
    Past,
    Current,
    Future,
}

/// The phase a user is in at `now`.
///
/// Without a start date the user has not arrived yet: the first phase. Past
/// the final boundary the last phase is returned.
pub fn resolve_current_phase<'a>(
    start: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    catalog: &'a CatalogStore,
) -> &'a JourneyPhase {
    let Some(start) = start else {
        return catalog.first_phase();
    };
    let elapsed = now - start;
    catalog
        .phases_ordered()
        .iter()
        .rev()
        .find(|p| p.window.has_started(elapsed))
        .unwrap_or_else(|| catalog.first_phase())
}

/// Midnight UTC on the arrival date.
pub fn arrival_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

pub fn bucket(task_phase: &JourneyPhase, current: &JourneyPhase) -> PhaseBucket {
    match task_phase.ordinal.cmp(&current.ordinal) {
        std::cmp::Ordering::Less => PhaseBucket::Past,
        std::cmp::Ordering::Equal => PhaseBucket::Current,
        std::cmp::Ordering::Greater => PhaseBucket::Future,
    }
}

/// Tasks grouped by bucket, order preserved within each group.
#[derive(Debug, Default, Serialize)]
pub struct Partition<'a> {
    pub past: Vec<&'a Task>,
    pub current: Vec<&'a Task>,
    pub future: Vec<&'a Task>,
}

/// Tasks whose phase is not in the catalog are skipped; validated configs
/// never contain any.
pub fn partition<'a>(
    tasks: impl IntoIterator<Item = &'a Task>,
    current: &JourneyPhase,
    catalog: &CatalogStore,
) -> Partition<'a> {
    let mut out = Partition::default();
    for task in tasks {
        let Some(phase) = catalog.phase(&task.time_window) else {
            continue;
        };
        match bucket(phase, current) {
            PhaseBucket::Past => out.past.push(task),
            PhaseBucket::Current => out.current.push(task),
            PhaseBucket::Future => out.future.push(task),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::dto::parse_document_json;
    use chrono::TimeDelta;
    use proptest::prelude::*;

    fn catalog() -> CatalogStore {
        let doc = parse_document_json(
            r#"{
                "timeWindows": [
                    {"id": "pre_arrival", "label": "Before arrival"},
                    {"id": "week_1", "label": "Week 1"},
                    {"id": "weeks_2_4", "label": "Weeks 2-4"},
                    {"id": "month_2", "label": "Month 2"},
                    {"id": "month_3", "label": "Month 3"}
                ]
            }"#,
        )
        .unwrap();
        CatalogStore::load(&doc.catalog).unwrap()
    }

    fn at(days: i64, seconds: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = arrival_start(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        (start, start + TimeDelta::days(days) + TimeDelta::seconds(seconds))
    }

    fn phase_at(catalog: &CatalogStore, days: i64, seconds: i64) -> String {
        let (start, now) = at(days, seconds);
        resolve_current_phase(Some(start), now, catalog).id.clone()
    }

    #[test]
    fn no_arrival_date_is_first_phase() {
        let c = catalog();
        assert_eq!(resolve_current_phase(None, Utc::now(), &c).id, "pre_arrival");
    }

    #[test]
    fn boundaries_belong_to_the_earlier_phase() {
        let c = catalog();
        assert_eq!(phase_at(&c, -3, 0), "pre_arrival");
        assert_eq!(phase_at(&c, 0, 0), "pre_arrival");
        assert_eq!(phase_at(&c, 0, 1), "week_1");
        assert_eq!(phase_at(&c, 7, 0), "week_1");
        assert_eq!(phase_at(&c, 7, 1), "weeks_2_4");
        assert_eq!(phase_at(&c, 45, 0), "month_2");
        assert_eq!(phase_at(&c, 90, 0), "month_3");
    }

    #[test]
    fn past_the_end_is_last_phase() {
        let c = catalog();
        assert_eq!(phase_at(&c, 400, 0), "month_3");
    }

    #[test]
    fn buckets_by_ordinal() {
        let c = catalog();
        let current = c.phase("weeks_2_4").unwrap();
        assert_eq!(bucket(c.phase("week_1").unwrap(), current), PhaseBucket::Past);
        assert_eq!(bucket(current, current), PhaseBucket::Current);
        assert_eq!(bucket(c.phase("month_3").unwrap(), current), PhaseBucket::Future);
    }

    fn task_in(id: &str, time_window: &str) -> Task {
        Task {
            id: id.to_string(),
            time_window: time_window.to_string(),
            module: "bureaucracy".to_string(),
            title: id.to_string(),
            description: String::new(),
            dependencies: vec![],
            importance: Default::default(),
            repeat: Default::default(),
            city_scope: vec![],
            subtasks: vec![],
            content_key: None,
            city_note: None,
            action_links: vec![],
            document_checklist: vec![],
        }
    }

    #[test]
    fn partition_keeps_order_and_skips_unknown_phases() {
        let c = catalog();
        let tasks = vec![
            task_in("visa", "pre_arrival"),
            task_in("bank", "week_1"),
            task_in("anmeldung", "week_1"),
            task_in("permit", "month_3"),
            task_in("orphan", "year_2"),
        ];
        let groups = partition(&tasks, c.phase("week_1").unwrap(), &c);
        let ids = |group: &[&Task]| group.iter().map(|t| t.id.clone()).collect::<Vec<_>>();

        assert_eq!(ids(&groups.past), vec!["visa"]);
        assert_eq!(ids(&groups.current), vec!["bank", "anmeldung"]);
        assert_eq!(ids(&groups.future), vec!["permit"]);
    }

    proptest! {
        #[test]
        fn later_now_never_moves_backwards(a in -100i64..500, b in -100i64..500) {
            let c = catalog();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let (start, _) = at(0, 0);
            let early = resolve_current_phase(Some(start), start + TimeDelta::hours(lo), &c);
            let late = resolve_current_phase(Some(start), start + TimeDelta::hours(hi), &c);
            prop_assert!(early.ordinal <= late.ordinal);
        }
    }
}
