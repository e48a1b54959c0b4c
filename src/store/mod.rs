//! Persistence contract consumed by the lifecycle manager and the service.
//!
//! Every query is scoped to a user. Neighbor lookups (`latest_before`,
//! `earliest_after`) are explicit queries rather than positions in a list.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Cycle, OvulationType, Profile, Symptom};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[async_trait]
pub trait CycleStore: Send + Sync {
    async fn insert(&self, cycle: &Cycle) -> Result<(), StoreError>;

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Cycle>, StoreError>;

    /// Cycles whose `start_date` equals `date`, ordered by id.
    async fn starting_on(&self, user_id: Uuid, date: NaiveDate) -> Result<Vec<Cycle>, StoreError>;

    /// Most recent cycle with `start_date < before`.
    async fn latest_before(&self, user_id: Uuid, before: NaiveDate)
        -> Result<Option<Cycle>, StoreError>;

    /// Oldest cycle with `start_date > after`.
    async fn earliest_after(&self, user_id: Uuid, after: NaiveDate)
        -> Result<Option<Cycle>, StoreError>;

    /// Ordered by start date, ties broken by id in the same direction.
    async fn list(&self, user_id: Uuid, order: SortOrder) -> Result<Vec<Cycle>, StoreError>;

    /// Returns the number of rows touched.
    async fn set_cycle_length(&self, id: Uuid, cycle_length: Option<i64>)
        -> Result<u64, StoreError>;

    async fn set_ovulation(
        &self,
        id: Uuid,
        date: NaiveDate,
        kind: OvulationType,
    ) -> Result<u64, StoreError>;

    /// Returns the updated record, or `None` when the cycle is not the user's.
    async fn set_end(
        &self,
        user_id: Uuid,
        id: Uuid,
        end_date: NaiveDate,
        period_length: i64,
    ) -> Result<Option<Cycle>, StoreError>;

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Option<Cycle>, StoreError>;
}

#[async_trait]
pub trait SymptomStore: Send + Sync {
    async fn find(&self, user_id: Uuid, date: NaiveDate) -> Result<Option<Symptom>, StoreError>;

    /// All of a user's entries, ascending by date.
    async fn list(&self, user_id: Uuid) -> Result<Vec<Symptom>, StoreError>;

    /// Writes the entry for its `(user_id, date)` in one step.
    /// Returns `true` when the row did not exist before.
    async fn upsert(&self, symptom: &Symptom) -> Result<bool, StoreError>;

    /// Overwrites an existing entry; `None` when there is nothing to overwrite.
    async fn update(&self, symptom: &Symptom) -> Result<Option<Symptom>, StoreError>;

    /// Unsets the period flag, bleeding and pain on every entry in `from..=to`.
    async fn clear_period_range(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u64, StoreError>;

    async fn delete(&self, user_id: Uuid, date: NaiveDate) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError>;
}
