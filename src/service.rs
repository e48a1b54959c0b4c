//! Composition layer: runs a mutation through the lifecycle manager, then
//! re-evaluates the alert rules against the refreshed state.

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::alerts;
use crate::clock::Clock;
use crate::error::CoreError;
use crate::lifecycle::CycleLifecycleManager;
use crate::models::{
    add_days, days_between, Alert, BleedingDay, BleedingRun, Cycle, CycleDefaults, CycleStat,
    CycleStatistics, CycleSummary, Symptom, SymptomEntry, SymptomPatch, validate_pain_level,
    DATE_FORMAT,
};
use crate::store::{CycleStore, ProfileStore, SymptomStore};

/// Result of a call plus the alert list evaluated right after it.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub alerts: Vec<Alert>,
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct CycleService {
    lifecycle: CycleLifecycleManager,
    symptoms: Arc<dyn SymptomStore>,
    profiles: Arc<dyn ProfileStore>,
    clock: Arc<dyn Clock>,
    defaults: CycleDefaults,
}

impl CycleService {
    pub fn new(
        cycles: Arc<dyn CycleStore>,
        symptoms: Arc<dyn SymptomStore>,
        profiles: Arc<dyn ProfileStore>,
        clock: Arc<dyn Clock>,
        defaults: CycleDefaults,
    ) -> Self {
        Self {
            lifecycle: CycleLifecycleManager::new(cycles, symptoms.clone()),
            symptoms,
            profiles,
            clock,
            defaults,
        }
    }

    pub async fn start_cycle(
        &self,
        user_id: Uuid,
        start_date: NaiveDate,
    ) -> Result<Outcome<Cycle>, CoreError> {
        let profile = self.profiles.find(user_id).await?;
        let defaults = CycleDefaults::resolve(profile.as_ref(), self.defaults);
        let change = self.lifecycle.start_cycle(user_id, start_date, defaults).await?;
        Ok(self.with_alerts(user_id, change.cycle, change.warnings).await)
    }

    pub async fn list_cycles(&self, user_id: Uuid) -> Result<Vec<Cycle>, CoreError> {
        self.lifecycle.list_cycles(user_id).await
    }

    pub async fn edit_cycle_end(
        &self,
        user_id: Uuid,
        cycle_id: Uuid,
        end_date: NaiveDate,
    ) -> Result<Outcome<Cycle>, CoreError> {
        let change = self.lifecycle.edit_cycle_end(user_id, cycle_id, end_date).await?;
        Ok(self.with_alerts(user_id, change.cycle, change.warnings).await)
    }

    pub async fn delete_cycle(
        &self,
        user_id: Uuid,
        cycle_id: Uuid,
    ) -> Result<Outcome<Cycle>, CoreError> {
        let change = self.lifecycle.delete_cycle(user_id, cycle_id).await?;
        Ok(self.with_alerts(user_id, change.cycle, change.warnings).await)
    }

    /// Evaluates every rule against the user's current data.
    pub async fn alerts(&self, user_id: Uuid) -> Result<Vec<Alert>, CoreError> {
        let mut cycles = self.lifecycle.list_cycles(user_id).await?;
        cycles.reverse();
        let symptoms = self.symptoms.list(user_id).await?;
        let profile = self.profiles.find(user_id).await?;

        Ok(alerts::evaluate(&cycles, &symptoms, profile.as_ref(), self.clock.today()))
    }

    async fn with_alerts<T>(&self, user_id: Uuid, value: T, mut warnings: Vec<String>) -> Outcome<T> {
        let alerts = match self.alerts(user_id).await {
            Ok(alerts) => alerts,
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "⚠️ Alert evaluation failed after mutation");
                warnings.push(format!("alert evaluation failed: {e}"));
                Vec::new()
            }
        };
        Outcome { value, alerts, warnings }
    }

    pub async fn get_symptom(&self, user_id: Uuid, date: NaiveDate) -> Result<Symptom, CoreError> {
        self.symptoms
            .find(user_id, date)
            .await?
            .ok_or(CoreError::SymptomNotFound(date))
    }

    /// Creates or replaces the entry for `date`. The flag is true when it was created.
    pub async fn save_symptom(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        entry: SymptomEntry,
    ) -> Result<Outcome<bool>, CoreError> {
        entry.validate()?;
        let created = self.symptoms.upsert(&entry.into_symptom(user_id, date)).await?;
        tracing::info!(%user_id, %date, created, "📝 Symptoms saved");
        Ok(self.with_alerts(user_id, created, Vec::new()).await)
    }

    /// Merges the fields present in `patch` into the stored entry.
    pub async fn update_symptom(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        patch: SymptomPatch,
    ) -> Result<Outcome<Symptom>, CoreError> {
        let mut symptom = self
            .symptoms
            .find(user_id, date)
            .await?
            .ok_or(CoreError::SymptomNotFound(date))?;
        patch.apply(&mut symptom);
        validate_pain_level(symptom.abdominal_pain_level)?;

        let symptom = self
            .symptoms
            .update(&symptom)
            .await?
            .ok_or(CoreError::SymptomNotFound(date))?;
        Ok(self.with_alerts(user_id, symptom, Vec::new()).await)
    }

    pub async fn delete_symptom(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Outcome<()>, CoreError> {
        if self.symptoms.delete(user_id, date).await? == 0 {
            return Err(CoreError::SymptomNotFound(date));
        }
        tracing::info!(%user_id, %date, "🗑️ Symptoms deleted");
        Ok(self.with_alerts(user_id, (), Vec::new()).await)
    }

    /// Days with a journal entry, as `YYYY-MM-DD`.
    pub async fn symptom_dates(&self, user_id: Uuid) -> Result<Vec<String>, CoreError> {
        Ok(self
            .symptoms
            .list(user_id)
            .await?
            .into_iter()
            .map(|s| s.date.format(DATE_FORMAT).to_string())
            .collect())
    }

    pub async fn cycle_statistics(&self, user_id: Uuid) -> Result<CycleStatistics, CoreError> {
        let cycles = self.lifecycle.list_cycles(user_id).await?;

        let stats: Vec<CycleStat> = cycles
            .iter()
            .enumerate()
            .map(|(i, c)| CycleStat {
                cycle_number: i + 1,
                start_date: c.start_date,
                end_date: c.end_date,
                period_length: c.period_length,
                cycle_length: c.cycle_length,
            })
            .collect();

        let lengths: Vec<i64> = stats.iter().filter_map(|s| s.cycle_length).collect();
        let average_cycle_length = if lengths.is_empty() {
            None
        } else {
            Some(lengths.iter().sum::<i64>() as f64 / lengths.len() as f64)
        };
        let count = stats.len() as f64;
        let total_period: i64 = stats.iter().map(|s| s.period_length).sum();

        Ok(CycleStatistics {
            average_period_length: if count > 0.0 { total_period as f64 / count } else { 0.0 },
            average_cycle_length,
            cycle_stats: stats,
        })
    }

    /// Where the user stands in the active cycle, or `None` with no history.
    pub async fn current_summary(&self, user_id: Uuid) -> Result<Option<CycleSummary>, CoreError> {
        let cycles = self.lifecycle.list_cycles(user_id).await?;
        let Some(cycle) = cycles.last() else {
            return Ok(None);
        };

        let today = self.clock.today();
        let cycle_day = days_between(cycle.start_date, today);
        let fertile = add_days(cycle.ovulation_date, -5)?..=cycle.ovulation_date;
        let expected_next = add_days(cycle.start_date, cycle.average_length)?;

        Ok(Some(CycleSummary {
            cycle_day,
            in_fertile_window: fertile.contains(&today),
            period_expected_in_days: days_between(today, expected_next),
            start_date: cycle.start_date,
            ovulation_date: cycle.ovulation_date,
            ovulation_type: cycle.ovulation_type,
        }))
    }

    /// Logged bleeding days grouped into runs of consecutive dates.
    pub async fn bleeding_history(&self, user_id: Uuid) -> Result<Vec<BleedingRun>, CoreError> {
        let symptoms = self.symptoms.list(user_id).await?;

        let mut runs: Vec<BleedingRun> = Vec::new();
        for symptom in symptoms {
            let Some(intensity) = symptom.bleeding_intensity else {
                continue;
            };
            let day = BleedingDay { date: symptom.date, intensity };

            match runs.last_mut() {
                Some(run) if days_between(run.end_date, day.date) == 1 => {
                    run.end_date = day.date;
                    run.days.push(day);
                }
                _ => runs.push(BleedingRun {
                    start_date: day.date,
                    end_date: day.date,
                    days: vec![day],
                }),
            }
        }

        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{AlertKind, BleedingIntensity, OvulationType, Profile};
    use crate::store::MemoryStore;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn service(store: Arc<MemoryStore>, today: &str) -> CycleService {
        CycleService::new(
            store.clone(),
            store.clone(),
            store,
            Arc::new(FixedClock(d(today))),
            CycleDefaults::default(),
        )
    }

    fn bleeding(intensity: BleedingIntensity) -> SymptomEntry {
        SymptomEntry {
            is_period_day: true,
            bleeding_intensity: Some(intensity),
            symptoms: vec!["all OK".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn two_starts_then_list_confirms_the_first() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store, "2024-01-30");
        let user = Uuid::new_v4();

        let a = service.start_cycle(user, d("2024-01-01")).await.unwrap();
        assert_eq!(a.value.end_date, d("2024-01-05"));
        assert_eq!(a.value.ovulation_date, d("2024-01-15"));
        service.start_cycle(user, d("2024-01-29")).await.unwrap();

        let cycles = service.list_cycles(user).await.unwrap();
        assert_eq!(cycles[0].cycle_length, Some(28));
        assert_eq!(cycles[0].ovulation_type, OvulationType::Confirmed);
        assert_eq!(cycles[0].ovulation_date, d("2024-01-15"));
        assert_eq!(cycles[1].cycle_length, None);
    }

    #[tokio::test]
    async fn profile_lengths_shape_new_cycles() {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        store.put_profile(Profile {
            user_id: user,
            cycle_length: Some(32),
            period_length: Some(6),
            last_gynecologist_visit: None,
        });
        let service = service(store, "2024-01-02");

        let outcome = service.start_cycle(user, d("2024-01-01")).await.unwrap();
        assert_eq!(outcome.value.average_length, 32);
        assert_eq!(outcome.value.end_date, d("2024-01-06"));
        assert_eq!(outcome.value.ovulation_date, d("2024-01-19"));
    }

    #[tokio::test]
    async fn implausible_profile_lengths_fall_back_to_defaults() {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        store.put_profile(Profile {
            user_id: user,
            cycle_length: Some(i64::MAX),
            period_length: Some(5_000),
            last_gynecologist_visit: None,
        });
        let service = service(store, "2024-01-02");

        let outcome = service.start_cycle(user, d("2024-01-01")).await.unwrap();
        assert_eq!(outcome.value.average_length, 28);
        assert_eq!(outcome.value.end_date, d("2024-01-05"));
    }

    #[tokio::test]
    async fn mutations_return_fresh_alerts() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store, "2024-02-10");
        let user = Uuid::new_v4();

        let outcome = service.start_cycle(user, d("2024-01-01")).await.unwrap();
        let kinds: Vec<_> = outcome.alerts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::DelayedPeriod]);
        assert_eq!(outcome.alerts[0].message, "Your period is 12 days late.");

        let cycle_id = outcome.value.id;
        let outcome = service.edit_cycle_end(user, cycle_id, d("2024-01-02")).await.unwrap();
        let kinds: Vec<_> = outcome.alerts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::PeriodTooShort, AlertKind::DelayedPeriod]);

        let outcome = service.delete_cycle(user, cycle_id).await.unwrap();
        assert!(outcome.alerts.is_empty());
        assert_eq!(outcome.value.id, cycle_id);
    }

    #[tokio::test]
    async fn alerts_without_profile_skip_the_visit_rule() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store, "2030-01-01");
        assert!(service.alerts(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_symptom_upserts() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store, "2024-05-03");
        let user = Uuid::new_v4();

        let first = service.save_symptom(user, d("2024-05-01"), bleeding(BleedingIntensity::Light)).await.unwrap();
        assert!(first.value);
        let second = service.save_symptom(user, d("2024-05-01"), bleeding(BleedingIntensity::Heavy)).await.unwrap();
        assert!(!second.value);

        let stored = service.get_symptom(user, d("2024-05-01")).await.unwrap();
        assert_eq!(stored.bleeding_intensity, Some(BleedingIntensity::Heavy));
        assert_eq!(service.symptom_dates(user).await.unwrap(), vec!["2024-05-01".to_string()]);
    }

    #[tokio::test]
    async fn update_keeps_fields_missing_from_the_patch() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store, "2024-05-03");
        let user = Uuid::new_v4();
        let entry = SymptomEntry {
            mood: vec!["calm".into()],
            abdominal_pain_level: Some(2),
            ..bleeding(BleedingIntensity::Heavy)
        };
        service.save_symptom(user, d("2024-05-01"), entry).await.unwrap();

        let patch = SymptomPatch { notes: Some("x".into()), ..Default::default() };
        let updated = service.update_symptom(user, d("2024-05-01"), patch).await.unwrap().value;
        assert_eq!(updated.notes, "x");
        assert_eq!(updated.mood, vec!["calm".to_string()]);
        assert_eq!(updated.bleeding_intensity, Some(BleedingIntensity::Heavy));
        assert_eq!(updated.abdominal_pain_level, Some(2));

        let patch = SymptomPatch { abdominal_pain_level: Some(Some(11)), ..Default::default() };
        assert!(matches!(
            service.update_symptom(user, d("2024-05-01"), patch).await,
            Err(CoreError::Validation(_))
        ));

        let patch = SymptomPatch { bleeding_intensity: Some(None), ..Default::default() };
        service.update_symptom(user, d("2024-05-01"), patch).await.unwrap();
        let stored = service.get_symptom(user, d("2024-05-01")).await.unwrap();
        assert_eq!(stored.bleeding_intensity, None);
        assert_eq!(stored.abdominal_pain_level, Some(2));
        assert_eq!(stored.notes, "x");
    }

    #[tokio::test]
    async fn symptom_validation_and_missing_entries() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store, "2024-05-03");
        let user = Uuid::new_v4();

        let bad = SymptomEntry { abdominal_pain_level: Some(9), ..Default::default() };
        assert!(matches!(
            service.save_symptom(user, d("2024-05-01"), bad).await,
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            service.update_symptom(user, d("2024-05-01"), SymptomPatch::default()).await,
            Err(CoreError::SymptomNotFound(_))
        ));
        assert!(matches!(
            service.delete_symptom(user, d("2024-05-01")).await,
            Err(CoreError::SymptomNotFound(_))
        ));
        assert!(matches!(
            service.get_symptom(user, d("2024-05-01")).await,
            Err(CoreError::SymptomNotFound(_))
        ));
    }

    #[tokio::test]
    async fn heavy_streak_alert_appears_on_the_fourth_save() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store, "2024-05-04");
        let user = Uuid::new_v4();

        for day in ["2024-05-01", "2024-05-02", "2024-05-03"] {
            let outcome = service.save_symptom(user, d(day), bleeding(BleedingIntensity::Heavy)).await.unwrap();
            assert!(outcome.alerts.is_empty());
        }
        let outcome = service.save_symptom(user, d("2024-05-04"), bleeding(BleedingIntensity::Heavy)).await.unwrap();
        let kinds: Vec<_> = outcome.alerts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::HeavyBleeding]);

        let outcome = service.delete_symptom(user, d("2024-05-02")).await.unwrap();
        assert!(outcome.alerts.is_empty());
    }

    #[tokio::test]
    async fn statistics_average_only_finished_cycles() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store, "2024-03-01");
        let user = Uuid::new_v4();
        let a = service.start_cycle(user, d("2024-01-01")).await.unwrap();
        service.start_cycle(user, d("2024-01-29")).await.unwrap();
        service.start_cycle(user, d("2024-02-28")).await.unwrap();
        service.edit_cycle_end(user, a.value.id, d("2024-01-07")).await.unwrap();

        let stats = service.cycle_statistics(user).await.unwrap();
        assert_eq!(stats.cycle_stats.len(), 3);
        assert_eq!(stats.average_cycle_length, Some(29.0));
        assert!((stats.average_period_length - 17.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.cycle_stats[2].cycle_length, None);

        let empty = service.cycle_statistics(Uuid::new_v4()).await.unwrap();
        assert_eq!(empty.average_cycle_length, None);
        assert_eq!(empty.average_period_length, 0.0);
    }

    #[tokio::test]
    async fn summary_tracks_the_active_cycle() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store, "2024-01-12");
        let user = Uuid::new_v4();
        assert!(service.current_summary(user).await.unwrap().is_none());

        service.start_cycle(user, d("2024-01-01")).await.unwrap();
        let summary = service.current_summary(user).await.unwrap().unwrap();
        assert_eq!(summary.cycle_day, 11);
        assert!(summary.in_fertile_window);
        assert_eq!(summary.period_expected_in_days, 17);
        assert_eq!(summary.ovulation_type, OvulationType::Predicted);
    }

    #[tokio::test]
    async fn bleeding_days_group_into_runs() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store, "2024-02-01");
        let user = Uuid::new_v4();
        for day in ["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-29", "2024-01-30"] {
            service.save_symptom(user, d(day), bleeding(BleedingIntensity::Medium)).await.unwrap();
        }
        service
            .save_symptom(user, d("2024-01-15"), SymptomEntry { notes: "fine".into(), ..Default::default() })
            .await
            .unwrap();

        let runs = service.bleeding_history(user).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].start_date, d("2024-01-01"));
        assert_eq!(runs[0].end_date, d("2024-01-03"));
        assert_eq!(runs[0].days.len(), 3);
        assert_eq!(runs[1].days.len(), 2);
    }
}
