//! In-process store used when no database is configured, and by the tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use super::{CycleStore, ProfileStore, SortOrder, SymptomStore};
use crate::error::StoreError;
use crate::models::{Cycle, OvulationType, Profile, Symptom};

#[derive(Default)]
struct Tables {
    cycles: HashMap<Uuid, Cycle>,
    symptoms: BTreeMap<(Uuid, NaiveDate), Symptom>,
    profiles: HashMap<Uuid, Profile>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_cycle_writes: AtomicBool,
    fail_symptom_clears: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Profiles are owned by an external service; this seeds one.
    pub fn put_profile(&self, profile: Profile) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.profiles.insert(profile.user_id, profile);
        }
    }

    /// Makes every cycle field update fail until switched off.
    pub fn fail_cycle_writes(&self, fail: bool) {
        self.fail_cycle_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_symptom_clears(&self, fail: bool) {
        self.fail_symptom_clears.store(fail, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }

    fn check_cycle_write(&self) -> Result<(), StoreError> {
        if self.fail_cycle_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Corrupt("cycle writes disabled".into()));
        }
        Ok(())
    }

    fn user_cycles(tables: &Tables, user_id: Uuid) -> Vec<Cycle> {
        let mut cycles: Vec<Cycle> = tables
            .cycles
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        cycles.sort_by_key(|c| (c.start_date, c.id));
        cycles
    }
}

#[async_trait]
impl CycleStore for MemoryStore {
    async fn insert(&self, cycle: &Cycle) -> Result<(), StoreError> {
        self.tables()?.cycles.insert(cycle.id, cycle.clone());
        Ok(())
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Cycle>, StoreError> {
        Ok(self
            .tables()?
            .cycles
            .get(&id)
            .filter(|c| c.user_id == user_id)
            .cloned())
    }

    async fn starting_on(&self, user_id: Uuid, date: NaiveDate) -> Result<Vec<Cycle>, StoreError> {
        let tables = self.tables()?;
        Ok(Self::user_cycles(&tables, user_id)
            .into_iter()
            .filter(|c| c.start_date == date)
            .collect())
    }

    async fn latest_before(
        &self,
        user_id: Uuid,
        before: NaiveDate,
    ) -> Result<Option<Cycle>, StoreError> {
        let tables = self.tables()?;
        Ok(Self::user_cycles(&tables, user_id)
            .into_iter()
            .filter(|c| c.start_date < before)
            .last())
    }

    async fn earliest_after(
        &self,
        user_id: Uuid,
        after: NaiveDate,
    ) -> Result<Option<Cycle>, StoreError> {
        let tables = self.tables()?;
        Ok(Self::user_cycles(&tables, user_id)
            .into_iter()
            .find(|c| c.start_date > after))
    }

    async fn list(&self, user_id: Uuid, order: SortOrder) -> Result<Vec<Cycle>, StoreError> {
        let tables = self.tables()?;
        let mut cycles = Self::user_cycles(&tables, user_id);
        if order == SortOrder::Descending {
            cycles.reverse();
        }
        Ok(cycles)
    }

    async fn set_cycle_length(
        &self,
        id: Uuid,
        cycle_length: Option<i64>,
    ) -> Result<u64, StoreError> {
        self.check_cycle_write()?;
        Ok(match self.tables()?.cycles.get_mut(&id) {
            Some(cycle) => {
                cycle.cycle_length = cycle_length;
                1
            }
            None => 0,
        })
    }

    async fn set_ovulation(
        &self,
        id: Uuid,
        date: NaiveDate,
        kind: OvulationType,
    ) -> Result<u64, StoreError> {
        self.check_cycle_write()?;
        Ok(match self.tables()?.cycles.get_mut(&id) {
            Some(cycle) => {
                cycle.ovulation_date = date;
                cycle.ovulation_type = kind;
                1
            }
            None => 0,
        })
    }

    async fn set_end(
        &self,
        user_id: Uuid,
        id: Uuid,
        end_date: NaiveDate,
        period_length: i64,
    ) -> Result<Option<Cycle>, StoreError> {
        let mut tables = self.tables()?;
        Ok(tables
            .cycles
            .get_mut(&id)
            .filter(|c| c.user_id == user_id)
            .map(|cycle| {
                cycle.end_date = end_date;
                cycle.period_length = period_length;
                cycle.clone()
            }))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Option<Cycle>, StoreError> {
        let mut tables = self.tables()?;
        if tables.cycles.get(&id).is_some_and(|c| c.user_id == user_id) {
            return Ok(tables.cycles.remove(&id));
        }
        Ok(None)
    }
}

#[async_trait]
impl SymptomStore for MemoryStore {
    async fn find(&self, user_id: Uuid, date: NaiveDate) -> Result<Option<Symptom>, StoreError> {
        Ok(self.tables()?.symptoms.get(&(user_id, date)).cloned())
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<Symptom>, StoreError> {
        Ok(self
            .tables()?
            .symptoms
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert(&self, symptom: &Symptom) -> Result<bool, StoreError> {
        let previous = self
            .tables()?
            .symptoms
            .insert((symptom.user_id, symptom.date), symptom.clone());
        Ok(previous.is_none())
    }

    async fn update(&self, symptom: &Symptom) -> Result<Option<Symptom>, StoreError> {
        let mut tables = self.tables()?;
        Ok(tables
            .symptoms
            .get_mut(&(symptom.user_id, symptom.date))
            .map(|existing| {
                *existing = symptom.clone();
                existing.clone()
            }))
    }

    async fn clear_period_range(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u64, StoreError> {
        if self.fail_symptom_clears.load(Ordering::SeqCst) {
            return Err(StoreError::Corrupt("symptom writes disabled".into()));
        }
        if to < from {
            return Ok(0);
        }
        let mut tables = self.tables()?;
        let mut touched = 0;
        for (_, symptom) in tables.symptoms.range_mut((user_id, from)..=(user_id, to)) {
            symptom.is_period_day = false;
            symptom.bleeding_intensity = None;
            symptom.abdominal_pain_level = None;
            touched += 1;
        }
        Ok(touched)
    }

    async fn delete(&self, user_id: Uuid, date: NaiveDate) -> Result<u64, StoreError> {
        Ok(self
            .tables()?
            .symptoms
            .remove(&(user_id, date))
            .map_or(0, |_| 1))
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn find(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        Ok(self.tables()?.profiles.get(&user_id).cloned())
    }
}
