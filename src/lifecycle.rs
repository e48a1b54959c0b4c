//! Creation, editing and deletion of cycle records, plus the cascades each one
//! triggers on neighboring cycles and on symptom period flags.
//!
//! The primary write of every mutation either succeeds or fails the call.
//! Cascades after it are best-effort: a failed step is logged and reported back
//! as a warning, and never undoes the primary write.

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{
    add_days, days_between, predicted_ovulation, Cycle, CycleDefaults, OvulationType,
    MAX_PERIOD_LENGTH,
};
use crate::reconcile::reconcile;
use crate::store::{CycleStore, SortOrder, SymptomStore};

/// A mutated cycle together with any cascade steps that did not apply.
#[derive(Debug, Clone)]
pub struct CycleChange {
    pub cycle: Cycle,
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct CycleLifecycleManager {
    cycles: Arc<dyn CycleStore>,
    symptoms: Arc<dyn SymptomStore>,
}

impl CycleLifecycleManager {
    pub fn new(cycles: Arc<dyn CycleStore>, symptoms: Arc<dyn SymptomStore>) -> Self {
        Self { cycles, symptoms }
    }

    pub async fn start_cycle(
        &self,
        user_id: Uuid,
        start_date: NaiveDate,
        defaults: CycleDefaults,
    ) -> Result<CycleChange, CoreError> {
        defaults.validate()?;
        let end_date = add_days(start_date, defaults.period_length - 1)?;
        let ovulation_date = predicted_ovulation(start_date, defaults.average_length)?;

        let previous = self.cycles.latest_before(user_id, start_date).await?;
        let next = self.cycles.earliest_after(user_id, start_date).await?;

        for twin in self.cycles.starting_on(user_id, start_date).await? {
            tracing::warn!(
                %user_id,
                existing_cycle = %twin.id,
                %start_date,
                "⚠️ New cycle starts on the same day as an existing one"
            );
        }
        if let Some(prev) = previous.as_ref().filter(|p| p.end_date >= start_date) {
            tracing::warn!(
                %user_id,
                previous_end = %prev.end_date,
                %start_date,
                "⚠️ New cycle overlaps the previous period"
            );
        }

        let cycle = Cycle {
            id: Uuid::new_v4(),
            user_id,
            start_date,
            end_date,
            average_length: defaults.average_length,
            // Back-filled cycles are already closed by the cycle after them.
            cycle_length: next.as_ref().map(|n| days_between(start_date, n.start_date)),
            period_length: defaults.period_length,
            ovulation_date,
            ovulation_type: OvulationType::Predicted,
        };

        self.cycles.insert(&cycle).await?;
        tracing::info!(%user_id, cycle_id = %cycle.id, %start_date, "🩸 Cycle started");

        let mut warnings = Vec::new();
        if let Some(prev) = previous {
            let length = days_between(prev.start_date, start_date);
            if let Err(e) = self.cycles.set_cycle_length(prev.id, Some(length)).await {
                warnings.push(cascade_failed(
                    format!("closing previous cycle {}", prev.id),
                    &e,
                ));
            }
        }

        Ok(CycleChange { cycle, warnings })
    }

    /// Cycles ascending by start date with realized lengths and confirmed
    /// ovulation filled in. Corrections are written back best-effort.
    pub async fn list_cycles(&self, user_id: Uuid) -> Result<Vec<Cycle>, CoreError> {
        let mut cycles = self.cycles.list(user_id, SortOrder::Ascending).await?;

        for correction in reconcile(&mut cycles) {
            if let Err(e) = self
                .cycles
                .set_ovulation(correction.cycle_id, correction.date, correction.kind)
                .await
            {
                tracing::warn!(
                    cycle_id = %correction.cycle_id,
                    error = %e,
                    "⚠️ Could not persist confirmed ovulation"
                );
            }
        }

        Ok(cycles)
    }

    pub async fn edit_cycle_end(
        &self,
        user_id: Uuid,
        cycle_id: Uuid,
        end_date: NaiveDate,
    ) -> Result<CycleChange, CoreError> {
        let current = self
            .cycles
            .find(user_id, cycle_id)
            .await?
            .ok_or(CoreError::CycleNotFound(cycle_id))?;

        let period_length = days_between(current.start_date, end_date) + 1;
        if period_length < 1 {
            return Err(CoreError::Validation(
                "end_date cannot be earlier than the cycle start".into(),
            ));
        }
        if period_length > MAX_PERIOD_LENGTH {
            return Err(CoreError::Validation(format!(
                "a period cannot last longer than {MAX_PERIOD_LENGTH} days"
            )));
        }

        let cycle = self
            .cycles
            .set_end(user_id, cycle_id, end_date, period_length)
            .await?
            .ok_or(CoreError::CycleNotFound(cycle_id))?;
        tracing::info!(%user_id, %cycle_id, %end_date, period_length, "✏️ Cycle end updated");

        let mut warnings = Vec::new();
        if let Some(from) = end_date.succ_opt().filter(|from| *from <= current.end_date) {
            warnings.extend(self.clear_period_days(user_id, from, current.end_date).await);
        }

        Ok(CycleChange { cycle, warnings })
    }

    /// Removes the cycle and returns it with the cascade warnings.
    pub async fn delete_cycle(
        &self,
        user_id: Uuid,
        cycle_id: Uuid,
    ) -> Result<CycleChange, CoreError> {
        let deleted = self
            .cycles
            .delete(user_id, cycle_id)
            .await?
            .ok_or(CoreError::CycleNotFound(cycle_id))?;
        tracing::info!(%user_id, %cycle_id, "🗑️ Cycle deleted");

        let mut warnings: Vec<String> = self
            .clear_period_days(user_id, deleted.start_date, deleted.end_date)
            .await
            .into_iter()
            .collect();
        warnings.extend(self.reopen_previous(user_id, &deleted).await);

        Ok(CycleChange { cycle: deleted, warnings })
    }

    /// Reverts the preceding cycle to predicted ovulation and re-derives its
    /// stored length from whatever now follows it.
    async fn reopen_previous(&self, user_id: Uuid, deleted: &Cycle) -> Vec<String> {
        let mut warnings = Vec::new();

        let previous = match self.cycles.latest_before(user_id, deleted.start_date).await {
            Ok(Some(previous)) => previous,
            Ok(None) => return warnings,
            Err(e) => {
                warnings.push(cascade_failed("looking up the previous cycle".into(), &e));
                return warnings;
            }
        };

        let reverted = match previous.predicted_ovulation() {
            Ok(date) => self
                .cycles
                .set_ovulation(previous.id, date, OvulationType::Predicted)
                .await
                .map_err(CoreError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = reverted {
            warnings.push(cascade_failed(
                format!("reverting ovulation of cycle {}", previous.id),
                &e,
            ));
        }

        let length = match self.cycles.earliest_after(user_id, previous.start_date).await {
            Ok(next) => next.map(|n| days_between(previous.start_date, n.start_date)),
            Err(e) => {
                warnings.push(cascade_failed("looking up the next cycle".into(), &e));
                return warnings;
            }
        };
        if let Err(e) = self.cycles.set_cycle_length(previous.id, length).await {
            warnings.push(cascade_failed(
                format!("updating length of cycle {}", previous.id),
                &e,
            ));
        }

        warnings
    }

    /// Unsets period data on `from..=to` and returns the warning if that failed.
    async fn clear_period_days(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Option<String> {
        self.symptoms
            .clear_period_range(user_id, from, to)
            .await
            .err()
            .map(|e| cascade_failed(format!("clearing period data from {from} to {to}"), &e))
    }
}

fn cascade_failed(step: String, error: &dyn std::error::Error) -> String {
    tracing::warn!(error = %error, "⚠️ Cascade step failed: {}", step);
    format!("{step} failed: {error}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BleedingIntensity, Symptom};
    use crate::store::MemoryStore;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn manager() -> (Arc<MemoryStore>, CycleLifecycleManager) {
        let store = Arc::new(MemoryStore::new());
        let manager = CycleLifecycleManager::new(store.clone(), store.clone());
        (store, manager)
    }

    fn period_symptom(user_id: Uuid, date: &str) -> Symptom {
        Symptom {
            user_id,
            date: d(date),
            is_period_day: true,
            mood: vec![],
            symptoms: vec!["cramps".into()],
            abdominal_pain_level: Some(4),
            bleeding_intensity: Some(BleedingIntensity::Medium),
            notes: String::new(),
        }
    }

    async fn stored(store: &MemoryStore, user_id: Uuid, id: Uuid) -> Cycle {
        CycleStore::find(store, user_id, id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn start_derives_end_and_predicted_ovulation() {
        let (_, manager) = manager();
        let user = Uuid::new_v4();
        let change = manager
            .start_cycle(user, d("2024-01-01"), CycleDefaults::default())
            .await
            .unwrap();

        assert_eq!(change.cycle.end_date, d("2024-01-05"));
        assert_eq!(change.cycle.ovulation_date, d("2024-01-15"));
        assert_eq!(change.cycle.ovulation_type, OvulationType::Predicted);
        assert_eq!(change.cycle.cycle_length, None);
        assert!(change.warnings.is_empty());
    }

    #[tokio::test]
    async fn start_closes_the_previous_cycle() {
        let (store, manager) = manager();
        let user = Uuid::new_v4();
        let a = manager.start_cycle(user, d("2024-01-01"), CycleDefaults::default()).await.unwrap();
        manager.start_cycle(user, d("2024-01-29"), CycleDefaults::default()).await.unwrap();

        assert_eq!(stored(&store, user, a.cycle.id).await.cycle_length, Some(28));
    }

    #[tokio::test]
    async fn back_filled_cycle_is_not_active() {
        let (_, manager) = manager();
        let user = Uuid::new_v4();
        manager.start_cycle(user, d("2024-01-01"), CycleDefaults::default()).await.unwrap();
        manager.start_cycle(user, d("2024-03-01"), CycleDefaults::default()).await.unwrap();
        let middle = manager.start_cycle(user, d("2024-01-30"), CycleDefaults::default()).await.unwrap();

        assert_eq!(middle.cycle.cycle_length, Some(31));
        let listed = manager.list_cycles(user).await.unwrap();
        let active: Vec<_> = listed.iter().filter(|c| c.cycle_length.is_none()).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].start_date, d("2024-03-01"));
        assert_eq!(listed[0].cycle_length, Some(29));
    }

    #[tokio::test]
    async fn list_confirms_ovulation_and_persists_it() {
        let (store, manager) = manager();
        let user = Uuid::new_v4();
        let a = manager.start_cycle(user, d("2024-01-01"), CycleDefaults::default()).await.unwrap();
        manager.start_cycle(user, d("2024-02-02"), CycleDefaults::default()).await.unwrap();

        let first = manager.list_cycles(user).await.unwrap();
        assert_eq!(first[0].ovulation_type, OvulationType::Confirmed);
        assert_eq!(first[0].ovulation_date, d("2024-01-19"));
        assert_eq!(stored(&store, user, a.cycle.id).await.ovulation_type, OvulationType::Confirmed);

        let second = manager.list_cycles(user).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn list_still_returns_corrections_when_write_back_fails() {
        let (store, manager) = manager();
        let user = Uuid::new_v4();
        let a = manager.start_cycle(user, d("2024-01-01"), CycleDefaults::default()).await.unwrap();
        manager.start_cycle(user, d("2024-02-02"), CycleDefaults::default()).await.unwrap();

        store.fail_cycle_writes(true);
        let listed = manager.list_cycles(user).await.unwrap();
        assert_eq!(listed[0].ovulation_type, OvulationType::Confirmed);
        assert_eq!(stored(&store, user, a.cycle.id).await.ovulation_type, OvulationType::Predicted);
    }

    #[tokio::test]
    async fn shortening_the_period_clears_dropped_days() {
        let (store, manager) = manager();
        let user = Uuid::new_v4();
        let a = manager.start_cycle(user, d("2024-01-01"), CycleDefaults::default()).await.unwrap();
        for day in ["2024-01-02", "2024-01-04", "2024-01-05"] {
            SymptomStore::upsert(&*store, &period_symptom(user, day)).await.unwrap();
        }

        let change = manager.edit_cycle_end(user, a.cycle.id, d("2024-01-03")).await.unwrap();
        assert_eq!(change.cycle.period_length, 3);
        assert_eq!(change.cycle.end_date, d("2024-01-03"));

        let kept = SymptomStore::find(&*store, user, d("2024-01-02")).await.unwrap().unwrap();
        assert!(kept.is_period_day);
        for day in ["2024-01-04", "2024-01-05"] {
            let cleared = SymptomStore::find(&*store, user, d(day)).await.unwrap().unwrap();
            assert!(!cleared.is_period_day);
            assert_eq!(cleared.bleeding_intensity, None);
            assert_eq!(cleared.abdominal_pain_level, None);
            assert_eq!(cleared.symptoms, vec!["cramps".to_string()]);
        }
    }

    #[tokio::test]
    async fn end_before_start_is_rejected_without_changes() {
        let (store, manager) = manager();
        let user = Uuid::new_v4();
        let a = manager.start_cycle(user, d("2024-01-10"), CycleDefaults::default()).await.unwrap();

        let err = manager.edit_cycle_end(user, a.cycle.id, d("2024-01-09")).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(stored(&store, user, a.cycle.id).await, a.cycle);

        // Same day as the start is a one-day period.
        let change = manager.edit_cycle_end(user, a.cycle.id, d("2024-01-10")).await.unwrap();
        assert_eq!(change.cycle.period_length, 1);
    }

    #[tokio::test]
    async fn implausibly_long_period_is_rejected() {
        let (store, manager) = manager();
        let user = Uuid::new_v4();
        let a = manager.start_cycle(user, d("2024-01-01"), CycleDefaults::default()).await.unwrap();

        for end in ["9999-12-31", "2024-02-01"] {
            let err = manager.edit_cycle_end(user, a.cycle.id, d(end)).await.unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)));
        }
        assert_eq!(stored(&store, user, a.cycle.id).await, a.cycle);

        let change = manager.edit_cycle_end(user, a.cycle.id, d("2024-01-31")).await.unwrap();
        assert_eq!(change.cycle.period_length, MAX_PERIOD_LENGTH);
        assert!(change.warnings.is_empty());
    }

    #[tokio::test]
    async fn start_past_the_calendar_is_rejected() {
        let (store, manager) = manager();
        let user = Uuid::new_v4();

        let err = manager
            .start_cycle(user, NaiveDate::MAX, CycleDefaults::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let huge = CycleDefaults { average_length: i64::MAX, period_length: 5 };
        let err = manager.start_cycle(user, d("2024-01-01"), huge).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        assert!(CycleStore::list(&*store, user, SortOrder::Ascending).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_day_starts_are_kept_in_id_order() {
        let (store, manager) = manager();
        let user = Uuid::new_v4();
        let a = manager.start_cycle(user, d("2024-01-01"), CycleDefaults::default()).await.unwrap();
        let b = manager.start_cycle(user, d("2024-01-01"), CycleDefaults::default()).await.unwrap();

        let twins = CycleStore::starting_on(&*store, user, d("2024-01-01")).await.unwrap();
        assert_eq!(twins.len(), 2);

        let mut ids = vec![a.cycle.id, b.cycle.id];
        ids.sort();
        let ascending: Vec<Uuid> = CycleStore::list(&*store, user, SortOrder::Ascending)
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ascending, ids);

        let descending: Vec<Uuid> = CycleStore::list(&*store, user, SortOrder::Descending)
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        ids.reverse();
        assert_eq!(descending, ids);
    }

    #[tokio::test]
    async fn edit_of_foreign_cycle_is_not_found() {
        let (_, manager) = manager();
        let owner = Uuid::new_v4();
        let a = manager.start_cycle(owner, d("2024-01-01"), CycleDefaults::default()).await.unwrap();

        let err = manager
            .edit_cycle_end(Uuid::new_v4(), a.cycle.id, d("2024-01-03"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CycleNotFound(id) if id == a.cycle.id));
    }

    #[tokio::test]
    async fn deleting_the_successor_reverts_to_predicted() {
        let (store, manager) = manager();
        let user = Uuid::new_v4();
        let defaults = CycleDefaults { average_length: 30, period_length: 5 };
        let a = manager.start_cycle(user, d("2024-01-01"), defaults).await.unwrap();
        let b = manager.start_cycle(user, d("2024-01-27"), defaults).await.unwrap();
        manager.list_cycles(user).await.unwrap();
        assert_eq!(stored(&store, user, a.cycle.id).await.ovulation_date, d("2024-01-13"));

        let change = manager.delete_cycle(user, b.cycle.id).await.unwrap();
        assert!(change.warnings.is_empty());

        let reverted = stored(&store, user, a.cycle.id).await;
        assert_eq!(reverted.ovulation_type, OvulationType::Predicted);
        assert_eq!(reverted.ovulation_date, d("2024-01-17"));
        assert_eq!(reverted.cycle_length, None);
    }

    #[tokio::test]
    async fn deleting_a_middle_cycle_relinks_neighbors() {
        let (_, manager) = manager();
        let user = Uuid::new_v4();
        manager.start_cycle(user, d("2024-01-01"), CycleDefaults::default()).await.unwrap();
        let b = manager.start_cycle(user, d("2024-01-29"), CycleDefaults::default()).await.unwrap();
        manager.start_cycle(user, d("2024-02-26"), CycleDefaults::default()).await.unwrap();

        manager.delete_cycle(user, b.cycle.id).await.unwrap();
        let listed = manager.list_cycles(user).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].cycle_length, Some(56));
        assert_eq!(listed[0].ovulation_type, OvulationType::Confirmed);
        assert_eq!(listed[0].ovulation_date, d("2024-02-12"));
    }

    #[tokio::test]
    async fn delete_clears_period_flags_in_range() {
        let (store, manager) = manager();
        let user = Uuid::new_v4();
        let a = manager.start_cycle(user, d("2024-01-01"), CycleDefaults::default()).await.unwrap();
        SymptomStore::upsert(&*store, &period_symptom(user, "2024-01-03")).await.unwrap();
        SymptomStore::upsert(&*store, &period_symptom(user, "2024-01-06")).await.unwrap();

        manager.delete_cycle(user, a.cycle.id).await.unwrap();
        let inside = SymptomStore::find(&*store, user, d("2024-01-03")).await.unwrap().unwrap();
        let outside = SymptomStore::find(&*store, user, d("2024-01-06")).await.unwrap().unwrap();
        assert!(!inside.is_period_day);
        assert!(outside.is_period_day);
    }

    #[tokio::test]
    async fn failed_symptom_clear_is_a_warning() {
        let (store, manager) = manager();
        let user = Uuid::new_v4();
        let a = manager.start_cycle(user, d("2024-01-01"), CycleDefaults::default()).await.unwrap();
        store.fail_symptom_clears(true);

        let change = manager.delete_cycle(user, a.cycle.id).await.unwrap();
        assert_eq!(change.warnings.len(), 1);
        assert!(change.warnings[0].contains("2024-01-01 to 2024-01-05"));
        assert!(CycleStore::find(&*store, user, a.cycle.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_unknown_cycle_fails() {
        let (_, manager) = manager();
        let err = manager.delete_cycle(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CoreError::CycleNotFound(_)));
    }
}
