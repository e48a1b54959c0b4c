//! Health alert rules.
//!
//! `evaluate` is a pure function of the cycle history, the symptom journal, the
//! profile and today's date. Rules run in a fixed order and each appends zero
//! or more alerts; none of them fail on missing optional data.

use chrono::NaiveDate;

use crate::models::{add_days, days_between, Alert, AlertKind, BleedingIntensity, Cycle, Profile, Symptom};

/// Symptom label meaning the user felt fine that day.
pub const ALL_OK_LABEL: &str = "all OK";

const PAIN_LEVEL_THRESHOLD: i16 = 5;
const PAIN_STREAK: usize = 3;
const HEAVY_BLEEDING_STREAK: usize = 4;
const MISSED_WELLNESS_STREAK: usize = 5;
const SHORT_CYCLE_DAYS: i64 = 20;
const LONG_CYCLE_DAYS: i64 = 40;
const SHORT_PERIOD_DAYS: i64 = 4;
const LONG_PERIOD_DAYS: i64 = 8;
const LATE_TOLERANCE_DAYS: i64 = 3;
const GYNECOLOGIST_INTERVAL_DAYS: i64 = 365;
const IRREGULAR_WINDOW: usize = 6;
const IRREGULAR_GAP_DELTA: i64 = 7;
const IRREGULAR_MIN_COUNT: usize = 3;

/// `cycles` newest first, `symptoms` in any order.
pub fn evaluate(
    cycles: &[Cycle],
    symptoms: &[Symptom],
    profile: Option<&Profile>,
    today: NaiveDate,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    strong_abdominal_pain(symptoms, &mut alerts);
    heavy_bleeding(symptoms, &mut alerts);
    cycle_length(cycles, &mut alerts);
    period_length(cycles, &mut alerts);
    delayed_period(cycles, today, &mut alerts);
    missed_wellness(symptoms, &mut alerts);
    gynecologist_visit(profile, today, &mut alerts);
    irregular_cycles(cycles, &mut alerts);

    alerts
}

fn push(alerts: &mut Vec<Alert>, kind: AlertKind, message: String) {
    alerts.push(Alert { kind, message });
}

/// True once `threshold` dates in a row are exactly one day apart.
/// Any other gap restarts the run at one.
fn has_streak(mut dates: Vec<NaiveDate>, threshold: usize) -> bool {
    dates.sort_unstable();

    let mut streak = 1;
    for pair in dates.windows(2) {
        streak = if days_between(pair[0], pair[1]) == 1 { streak + 1 } else { 1 };
        if streak == threshold {
            return true;
        }
    }
    false
}

fn dates_where(symptoms: &[Symptom], predicate: impl Fn(&Symptom) -> bool) -> Vec<NaiveDate> {
    symptoms.iter().filter(|s| predicate(s)).map(|s| s.date).collect()
}

fn strong_abdominal_pain(symptoms: &[Symptom], alerts: &mut Vec<Alert>) {
    let days = dates_where(symptoms, |s| {
        s.abdominal_pain_level.is_some_and(|level| level >= PAIN_LEVEL_THRESHOLD)
    });
    if has_streak(days, PAIN_STREAK) {
        push(
            alerts,
            AlertKind::StrongAbdominalPain,
            "This is the third day in a row you have logged abdominal pain above level 4.".into(),
        );
    }
}

fn heavy_bleeding(symptoms: &[Symptom], alerts: &mut Vec<Alert>) {
    let days = dates_where(symptoms, |s| s.bleeding_intensity == Some(BleedingIntensity::Heavy));
    if has_streak(days, HEAVY_BLEEDING_STREAK) {
        push(
            alerts,
            AlertKind::HeavyBleeding,
            "This is the fourth day in a row you have logged heavy bleeding.".into(),
        );
    }
}

fn cycle_length(cycles: &[Cycle], alerts: &mut Vec<Alert>) {
    let Some(length) = cycles.get(1).and_then(|c| c.cycle_length) else {
        return;
    };
    if length < SHORT_CYCLE_DAYS {
        push(
            alerts,
            AlertKind::CycleTooShort,
            format!("Your last cycle lasted only {length} days, which may be too short."),
        );
    }
    if length > LONG_CYCLE_DAYS {
        push(
            alerts,
            AlertKind::CycleTooLong,
            format!("Your last cycle lasted {length} days, which may be too long."),
        );
    }
}

fn period_length(cycles: &[Cycle], alerts: &mut Vec<Alert>) {
    let Some(current) = cycles.first() else {
        return;
    };
    let length = current.period_length;
    if length < SHORT_PERIOD_DAYS {
        push(
            alerts,
            AlertKind::PeriodTooShort,
            format!("Your current period has lasted only {length} days."),
        );
    }
    if length > LONG_PERIOD_DAYS {
        push(
            alerts,
            AlertKind::PeriodTooLong,
            format!("Your current period has already lasted {length} days."),
        );
    }
}

fn delayed_period(cycles: &[Cycle], today: NaiveDate, alerts: &mut Vec<Alert>) {
    let days_late = match cycles.iter().find(|c| c.cycle_length.is_none()) {
        Some(active) => days_between(active.start_date, today) - active.average_length,
        None => {
            let Some(last) = cycles
                .iter()
                .filter(|c| c.cycle_length.is_some())
                .max_by_key(|c| c.start_date)
            else {
                return;
            };
            let Ok(expected_next) = add_days(last.start_date, last.average_length) else {
                return;
            };
            days_between(expected_next, today)
        }
    };

    if days_late > LATE_TOLERANCE_DAYS {
        push(
            alerts,
            AlertKind::DelayedPeriod,
            format!("Your period is {days_late} days late."),
        );
    }
}

fn missed_wellness(symptoms: &[Symptom], alerts: &mut Vec<Alert>) {
    let days = dates_where(symptoms, |s| !s.symptoms.iter().any(|label| label == ALL_OK_LABEL));
    if has_streak(days, MISSED_WELLNESS_STREAK) {
        push(
            alerts,
            AlertKind::MissedWellness,
            format!("This is the fifth day in a row you have not marked \"{ALL_OK_LABEL}\"."),
        );
    }
}

fn gynecologist_visit(profile: Option<&Profile>, today: NaiveDate, alerts: &mut Vec<Alert>) {
    let Some(visit) = profile.and_then(|p| p.last_gynecologist_visit) else {
        return;
    };
    if days_between(visit, today) > GYNECOLOGIST_INTERVAL_DAYS {
        push(
            alerts,
            AlertKind::GynecologistVisitOverdue,
            "Your last gynecologist visit was over a year ago. Consider booking a check-up.".into(),
        );
    }
}

fn irregular_cycles(cycles: &[Cycle], alerts: &mut Vec<Alert>) {
    if cycles.len() < IRREGULAR_WINDOW {
        return;
    }
    let mut starts: Vec<NaiveDate> = cycles[..IRREGULAR_WINDOW].iter().map(|c| c.start_date).collect();
    starts.sort_unstable();

    let gaps: Vec<i64> = starts.windows(2).map(|w| days_between(w[0], w[1])).collect();
    let irregular = gaps
        .windows(2)
        .filter(|w| (w[1] - w[0]).abs() > IRREGULAR_GAP_DELTA)
        .count();

    if irregular >= IRREGULAR_MIN_COUNT {
        push(
            alerts,
            AlertKind::IrregularCycles,
            format!("Your last {IRREGULAR_WINDOW} cycles look irregular."),
        );
    }
}
