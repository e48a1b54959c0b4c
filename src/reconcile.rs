//! Derived-field reconciliation over a user's cycle history.
//!
//! Given cycles in ascending start order, every cycle that has a successor gets
//! its ovulation confirmed at `successor.start_date - 14 days` and, when the
//! stored realized length is missing, a computed one. The function is pure and
//! idempotent; callers decide what to persist from the returned corrections.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{confirmed_ovulation, days_between, Cycle, OvulationType};

/// An ovulation value that differs from what is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OvulationCorrection {
    pub cycle_id: Uuid,
    pub date: NaiveDate,
    pub kind: OvulationType,
}

pub fn reconcile(cycles: &mut [Cycle]) -> Vec<OvulationCorrection> {
    let mut corrections = Vec::new();

    for i in 0..cycles.len().saturating_sub(1) {
        let next_start = cycles[i + 1].start_date;
        let cycle = &mut cycles[i];

        // A successor at the very start of the calendar leaves ovulation as stored.
        if let Ok(confirmed) = confirmed_ovulation(next_start) {
            if cycle.ovulation_type != OvulationType::Confirmed || cycle.ovulation_date != confirmed {
                cycle.ovulation_date = confirmed;
                cycle.ovulation_type = OvulationType::Confirmed;
                corrections.push(OvulationCorrection {
                    cycle_id: cycle.id,
                    date: confirmed,
                    kind: OvulationType::Confirmed,
                });
            }
        }

        if cycle.cycle_length.is_none() {
            cycle.cycle_length = Some(days_between(cycle.start_date, next_start));
        }
    }

    corrections
}
