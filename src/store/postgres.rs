use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

use super::{CycleStore, ProfileStore, SortOrder, SymptomStore};
use crate::error::StoreError;
use crate::models::{BleedingIntensity, Cycle, OvulationType, Profile, Symptom};

const CYCLE_COLUMNS: &str = "id, user_id, start_date, end_date, average_length, cycle_length, \
     period_length, ovulation_date, ovulation_type";

const SYMPTOM_COLUMNS: &str = "user_id, date, is_period_day, mood, symptoms, \
     abdominal_pain_level, bleeding_intensity, notes";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool and brings the schema up to date.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }
}

#[derive(FromRow)]
struct CycleRow {
    id: Uuid,
    user_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    average_length: i64,
    cycle_length: Option<i64>,
    period_length: i64,
    ovulation_date: NaiveDate,
    ovulation_type: String,
}

impl TryFrom<CycleRow> for Cycle {
    type Error = StoreError;

    fn try_from(row: CycleRow) -> Result<Self, Self::Error> {
        let ovulation_type = OvulationType::from_db(&row.ovulation_type).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown ovulation type {:?}", row.ovulation_type))
        })?;
        Ok(Cycle {
            id: row.id,
            user_id: row.user_id,
            start_date: row.start_date,
            end_date: row.end_date,
            average_length: row.average_length,
            cycle_length: row.cycle_length,
            period_length: row.period_length,
            ovulation_date: row.ovulation_date,
            ovulation_type,
        })
    }
}

#[derive(FromRow)]
struct SymptomRow {
    user_id: Uuid,
    date: NaiveDate,
    is_period_day: bool,
    mood: Vec<String>,
    symptoms: Vec<String>,
    abdominal_pain_level: Option<i16>,
    bleeding_intensity: Option<String>,
    notes: String,
}

impl TryFrom<SymptomRow> for Symptom {
    type Error = StoreError;

    fn try_from(row: SymptomRow) -> Result<Self, Self::Error> {
        let bleeding_intensity = match row.bleeding_intensity.as_deref() {
            None => None,
            Some(raw) => Some(BleedingIntensity::from_db(raw).ok_or_else(|| {
                StoreError::Corrupt(format!("unknown bleeding intensity {raw:?}"))
            })?),
        };
        Ok(Symptom {
            user_id: row.user_id,
            date: row.date,
            is_period_day: row.is_period_day,
            mood: row.mood,
            symptoms: row.symptoms,
            abdominal_pain_level: row.abdominal_pain_level,
            bleeding_intensity,
            notes: row.notes,
        })
    }
}

#[derive(FromRow)]
struct ProfileRow {
    user_id: Uuid,
    cycle_length: Option<i64>,
    period_length: Option<i64>,
    last_gynecologist_visit: Option<NaiveDate>,
}

fn cycles_from(rows: Vec<CycleRow>) -> Result<Vec<Cycle>, StoreError> {
    rows.into_iter().map(Cycle::try_from).collect()
}

#[async_trait]
impl CycleStore for PgStore {
    async fn insert(&self, cycle: &Cycle) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO cycles ({CYCLE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(cycle.id)
        .bind(cycle.user_id)
        .bind(cycle.start_date)
        .bind(cycle.end_date)
        .bind(cycle.average_length)
        .bind(cycle.cycle_length)
        .bind(cycle.period_length)
        .bind(cycle.ovulation_date)
        .bind(cycle.ovulation_type.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Cycle>, StoreError> {
        sqlx::query_as::<_, CycleRow>(&format!(
            "SELECT {CYCLE_COLUMNS} FROM cycles WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Cycle::try_from)
        .transpose()
    }

    async fn starting_on(&self, user_id: Uuid, date: NaiveDate) -> Result<Vec<Cycle>, StoreError> {
        let rows = sqlx::query_as::<_, CycleRow>(&format!(
            "SELECT {CYCLE_COLUMNS} FROM cycles
             WHERE user_id = $1 AND start_date = $2
             ORDER BY id ASC"
        ))
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        cycles_from(rows)
    }

    async fn latest_before(
        &self,
        user_id: Uuid,
        before: NaiveDate,
    ) -> Result<Option<Cycle>, StoreError> {
        sqlx::query_as::<_, CycleRow>(&format!(
            "SELECT {CYCLE_COLUMNS} FROM cycles
             WHERE user_id = $1 AND start_date < $2
             ORDER BY start_date DESC, id DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(before)
        .fetch_optional(&self.pool)
        .await?
        .map(Cycle::try_from)
        .transpose()
    }

    async fn earliest_after(
        &self,
        user_id: Uuid,
        after: NaiveDate,
    ) -> Result<Option<Cycle>, StoreError> {
        sqlx::query_as::<_, CycleRow>(&format!(
            "SELECT {CYCLE_COLUMNS} FROM cycles
             WHERE user_id = $1 AND start_date > $2
             ORDER BY start_date ASC, id ASC LIMIT 1"
        ))
        .bind(user_id)
        .bind(after)
        .fetch_optional(&self.pool)
        .await?
        .map(Cycle::try_from)
        .transpose()
    }

    async fn list(&self, user_id: Uuid, order: SortOrder) -> Result<Vec<Cycle>, StoreError> {
        let direction = match order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        let rows = sqlx::query_as::<_, CycleRow>(&format!(
            "SELECT {CYCLE_COLUMNS} FROM cycles
             WHERE user_id = $1
             ORDER BY start_date {direction}, id {direction}"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        cycles_from(rows)
    }

    async fn set_cycle_length(
        &self,
        id: Uuid,
        cycle_length: Option<i64>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE cycles SET cycle_length = $2 WHERE id = $1")
            .bind(id)
            .bind(cycle_length)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn set_ovulation(
        &self,
        id: Uuid,
        date: NaiveDate,
        kind: OvulationType,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE cycles SET ovulation_date = $2, ovulation_type = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(date)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn set_end(
        &self,
        user_id: Uuid,
        id: Uuid,
        end_date: NaiveDate,
        period_length: i64,
    ) -> Result<Option<Cycle>, StoreError> {
        sqlx::query_as::<_, CycleRow>(&format!(
            "UPDATE cycles SET end_date = $3, period_length = $4
             WHERE id = $1 AND user_id = $2
             RETURNING {CYCLE_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(end_date)
        .bind(period_length)
        .fetch_optional(&self.pool)
        .await?
        .map(Cycle::try_from)
        .transpose()
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Option<Cycle>, StoreError> {
        sqlx::query_as::<_, CycleRow>(&format!(
            "DELETE FROM cycles WHERE id = $1 AND user_id = $2 RETURNING {CYCLE_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Cycle::try_from)
        .transpose()
    }
}

#[async_trait]
impl SymptomStore for PgStore {
    async fn find(&self, user_id: Uuid, date: NaiveDate) -> Result<Option<Symptom>, StoreError> {
        sqlx::query_as::<_, SymptomRow>(&format!(
            "SELECT {SYMPTOM_COLUMNS} FROM symptoms WHERE user_id = $1 AND date = $2"
        ))
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?
        .map(Symptom::try_from)
        .transpose()
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<Symptom>, StoreError> {
        let rows = sqlx::query_as::<_, SymptomRow>(&format!(
            "SELECT {SYMPTOM_COLUMNS} FROM symptoms WHERE user_id = $1 ORDER BY date ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Symptom::try_from).collect()
    }

    async fn upsert(&self, symptom: &Symptom) -> Result<bool, StoreError> {
        // xmax is zero only on a freshly inserted row version.
        let (created,): (bool,) = sqlx::query_as(&format!(
            "INSERT INTO symptoms ({SYMPTOM_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (user_id, date) DO UPDATE SET
                 is_period_day = EXCLUDED.is_period_day,
                 mood = EXCLUDED.mood,
                 symptoms = EXCLUDED.symptoms,
                 abdominal_pain_level = EXCLUDED.abdominal_pain_level,
                 bleeding_intensity = EXCLUDED.bleeding_intensity,
                 notes = EXCLUDED.notes
             RETURNING (xmax = 0) AS created"
        ))
        .bind(symptom.user_id)
        .bind(symptom.date)
        .bind(symptom.is_period_day)
        .bind(&symptom.mood)
        .bind(&symptom.symptoms)
        .bind(symptom.abdominal_pain_level)
        .bind(symptom.bleeding_intensity.map(BleedingIntensity::as_str))
        .bind(&symptom.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if let Some(constraint) = db_err.constraint() {
                    tracing::info!("🔒 Constraint violated: {}", constraint);
                }
            }
            StoreError::from(e)
        })?;
        Ok(created)
    }

    async fn update(&self, symptom: &Symptom) -> Result<Option<Symptom>, StoreError> {
        sqlx::query_as::<_, SymptomRow>(&format!(
            "UPDATE symptoms SET is_period_day = $3, mood = $4, symptoms = $5,
                 abdominal_pain_level = $6, bleeding_intensity = $7, notes = $8
             WHERE user_id = $1 AND date = $2
             RETURNING {SYMPTOM_COLUMNS}"
        ))
        .bind(symptom.user_id)
        .bind(symptom.date)
        .bind(symptom.is_period_day)
        .bind(&symptom.mood)
        .bind(&symptom.symptoms)
        .bind(symptom.abdominal_pain_level)
        .bind(symptom.bleeding_intensity.map(BleedingIntensity::as_str))
        .bind(&symptom.notes)
        .fetch_optional(&self.pool)
        .await?
        .map(Symptom::try_from)
        .transpose()
    }

    async fn clear_period_range(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE symptoms
             SET is_period_day = FALSE, bleeding_intensity = NULL, abdominal_pain_level = NULL
             WHERE user_id = $1 AND date BETWEEN $2 AND $3",
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, user_id: Uuid, date: NaiveDate) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM symptoms WHERE user_id = $1 AND date = $2")
            .bind(user_id)
            .bind(date)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn find(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT user_id, cycle_length, period_length, last_gynecologist_visit
             FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| Profile {
            user_id: row.user_id,
            cycle_length: row.cycle_length,
            period_length: row.period_length,
            last_gynecologist_visit: row.last_gynecologist_visit,
        }))
    }
}
