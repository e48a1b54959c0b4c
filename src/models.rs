use serde::{ Serialize, Deserialize, Deserializer };
use uuid::Uuid;
use chrono::{Datelike, Days, NaiveDate};

use crate::error::CoreError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Years accepted on the wire.
pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2200;

pub const MAX_PERIOD_LENGTH: i64 = 31;
pub const MAX_CYCLE_LENGTH: i64 = 365;

/// Parses a `YYYY-MM-DD` wire date. Dates are day-granular, so UTC midnight is implied.
pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, CoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CoreError::Validation(format!("{field} is required")));
    }
    let date = NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
        CoreError::Validation(format!("{field} must be a date in YYYY-MM-DD format"))
    })?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(CoreError::Validation(format!(
            "{field} must fall between {MIN_YEAR} and {MAX_YEAR}"
        )));
    }
    Ok(date)
}

/// Whole days from `from` to `to`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    to.signed_duration_since(from).num_days()
}

pub fn add_days(date: NaiveDate, days: i64) -> Result<NaiveDate, CoreError> {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.ok_or_else(|| CoreError::Validation(format!("{date} shifted by {days} days is out of range")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OvulationType {
    Predicted,
    Confirmed,
}

impl OvulationType {
    pub fn as_str(self) -> &'static str {
        match self {
            OvulationType::Predicted => "predicted",
            OvulationType::Confirmed => "confirmed",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "predicted" => Some(OvulationType::Predicted),
            "confirmed" => Some(OvulationType::Confirmed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub average_length: i64,
    /// Realized length, known once a later cycle has started.
    pub cycle_length: Option<i64>,
    pub period_length: i64,
    pub ovulation_date: NaiveDate,
    pub ovulation_type: OvulationType,
}

impl Cycle {
    pub fn predicted_ovulation(&self) -> Result<NaiveDate, CoreError> {
        predicted_ovulation(self.start_date, self.average_length)
    }
}

pub fn predicted_ovulation(start_date: NaiveDate, average_length: i64) -> Result<NaiveDate, CoreError> {
    add_days(start_date, average_length.saturating_sub(14))
}

pub fn confirmed_ovulation(next_start: NaiveDate) -> Result<NaiveDate, CoreError> {
    add_days(next_start, -14)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BleedingIntensity {
    Light,
    Medium,
    Heavy,
}

impl BleedingIntensity {
    pub fn as_str(self) -> &'static str {
        match self {
            BleedingIntensity::Light => "light",
            BleedingIntensity::Medium => "medium",
            BleedingIntensity::Heavy => "heavy",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "light" => Some(BleedingIntensity::Light),
            "medium" => Some(BleedingIntensity::Medium),
            "heavy" => Some(BleedingIntensity::Heavy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symptom {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub is_period_day: bool,
    pub mood: Vec<String>,
    pub symptoms: Vec<String>,
    pub abdominal_pain_level: Option<i16>,
    pub bleeding_intensity: Option<BleedingIntensity>,
    pub notes: String,
}

/// Body of a symptom save/update; absent fields fall back to empty values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SymptomEntry {
    pub is_period_day: bool,
    pub mood: Vec<String>,
    pub symptoms: Vec<String>,
    pub abdominal_pain_level: Option<i16>,
    pub bleeding_intensity: Option<BleedingIntensity>,
    pub notes: String,
}

pub fn validate_pain_level(level: Option<i16>) -> Result<(), CoreError> {
    match level {
        Some(level) if !(0..=7).contains(&level) => Err(CoreError::Validation(
            "abdominal_pain_level must be between 0 and 7".into(),
        )),
        _ => Ok(()),
    }
}

impl SymptomEntry {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_pain_level(self.abdominal_pain_level)
    }

    pub fn into_symptom(self, user_id: Uuid, date: NaiveDate) -> Symptom {
        Symptom {
            user_id,
            date,
            is_period_day: self.is_period_day,
            mood: self.mood,
            symptoms: self.symptoms,
            abdominal_pain_level: self.abdominal_pain_level,
            bleeding_intensity: self.bleeding_intensity,
            notes: self.notes,
        }
    }
}

/// Partial update of a journal entry. Only the fields present in the body change;
/// `null` clears the nullable ones.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SymptomPatch {
    #[serde(default)]
    pub is_period_day: Option<bool>,
    #[serde(default)]
    pub mood: Option<Vec<String>>,
    #[serde(default)]
    pub symptoms: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present")]
    pub abdominal_pain_level: Option<Option<i16>>,
    #[serde(default, deserialize_with = "present")]
    pub bleeding_intensity: Option<Option<BleedingIntensity>>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Distinguishes an explicit `null` from a missing field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl SymptomPatch {
    pub fn apply(self, symptom: &mut Symptom) {
        if let Some(is_period_day) = self.is_period_day {
            symptom.is_period_day = is_period_day;
        }
        if let Some(mood) = self.mood {
            symptom.mood = mood;
        }
        if let Some(symptoms) = self.symptoms {
            symptom.symptoms = symptoms;
        }
        if let Some(level) = self.abdominal_pain_level {
            symptom.abdominal_pain_level = level;
        }
        if let Some(intensity) = self.bleeding_intensity {
            symptom.bleeding_intensity = intensity;
        }
        if let Some(notes) = self.notes {
            symptom.notes = notes;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub cycle_length: Option<i64>,
    pub period_length: Option<i64>,
    pub last_gynecologist_visit: Option<NaiveDate>,
}

/// Lengths applied to a freshly started cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleDefaults {
    pub average_length: i64,
    pub period_length: i64,
}

impl CycleDefaults {
    /// Profile values win when set and plausible; otherwise the fallbacks apply.
    pub fn resolve(profile: Option<&Profile>, fallback: CycleDefaults) -> Self {
        let pick = |value: Option<i64>, max: i64, default: i64| {
            value.filter(|v| (1..=max).contains(v)).unwrap_or(default)
        };
        Self {
            average_length: pick(
                profile.and_then(|p| p.cycle_length),
                MAX_CYCLE_LENGTH,
                fallback.average_length,
            ),
            period_length: pick(
                profile.and_then(|p| p.period_length),
                MAX_PERIOD_LENGTH,
                fallback.period_length,
            ),
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !(1..=MAX_CYCLE_LENGTH).contains(&self.average_length) {
            return Err(CoreError::Validation(format!(
                "cycle length must be between 1 and {MAX_CYCLE_LENGTH} days"
            )));
        }
        if !(1..=MAX_PERIOD_LENGTH).contains(&self.period_length) {
            return Err(CoreError::Validation(format!(
                "period length must be between 1 and {MAX_PERIOD_LENGTH} days"
            )));
        }
        Ok(())
    }
}

impl Default for CycleDefaults {
    fn default() -> Self {
        Self { average_length: 28, period_length: 5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    StrongAbdominalPain,
    HeavyBleeding,
    CycleTooShort,
    CycleTooLong,
    PeriodTooShort,
    PeriodTooLong,
    DelayedPeriod,
    MissedWellness,
    GynecologistVisitOverdue,
    IrregularCycles,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    #[serde(skip)]
    pub kind: AlertKind,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CycleSummary {
    pub cycle_day: i64,
    pub in_fertile_window: bool,
    pub period_expected_in_days: i64,
    pub start_date: NaiveDate,
    pub ovulation_date: NaiveDate,
    pub ovulation_type: OvulationType,
}

#[derive(Debug, Serialize)]
pub struct CycleStat {
    pub cycle_number: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub period_length: i64,
    pub cycle_length: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CycleStatistics {
    pub average_period_length: f64,
    pub average_cycle_length: Option<f64>,
    pub cycle_stats: Vec<CycleStat>,
}

#[derive(Debug, Serialize)]
pub struct BleedingRun {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Vec<BleedingDay>,
}

#[derive(Debug, Serialize)]
pub struct BleedingDay {
    pub date: NaiveDate,
    pub intensity: BleedingIntensity,
}
