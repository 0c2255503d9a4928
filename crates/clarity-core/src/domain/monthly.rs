//! Monthly progress entries and the cumulative fold.
//!
//! One entry per (task, year, month); re-submitting a month corrects it in
//! place. The cumulative percentage is a deterministic fold over the entries
//! ordered by (year, month) ascending, so a late correction to an early month
//! propagates without double counting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// One month's reported contribution, unique per (task, year, month).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyEntry {
    pub task_id: TaskId,
    pub year: i32,
    pub month: u32,

    /// This month's contribution, 0-100.
    pub monthly_percentage: f64,

    /// Running total up to and including this month, capped at 100. Stored
    /// at write time and recomputed in full on every upsert so history stays
    /// consistent after corrections.
    pub accumulated: f64,

    pub comment: Option<String>,
    pub recorded_by: String,
    pub updated_at: DateTime<Utc>,
}

/// All entries of a task plus the headline cumulative value, for charting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyHistory {
    /// The latest entry's accumulated value, 0 when no entries exist.
    pub cumulative: f64,
    /// Entries ordered by (year, month) ascending.
    pub entries: Vec<MonthlyEntry>,
}

/// Recompute the stored accumulated values over (year, month)-ascending
/// entries: monotonic running sum, capped at 100.
///
/// Example: contributions 40, 70, 30 accumulate to 40, 100, 100.
///
/// Returns the final cumulative value (0.0 for an empty slice). The slice
/// must already be sorted ascending; the store keeps entries in a BTreeMap
/// keyed by (year, month) so iteration order is the chronological order.
pub fn recompute_accumulated(entries: &mut [MonthlyEntry]) -> f64 {
    let mut running = 0.0_f64;
    for entry in entries.iter_mut() {
        running = (running + entry.monthly_percentage).min(100.0);
        entry.accumulated = running;
    }
    running
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(year: i32, month: u32, pct: f64) -> MonthlyEntry {
        MonthlyEntry {
            task_id: TaskId::new(1),
            year,
            month,
            monthly_percentage: pct,
            accumulated: 0.0,
            comment: None,
            recorded_by: "ops".into(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn running_sum_caps_at_100() {
        let mut entries = vec![entry(2025, 1, 40.0), entry(2025, 2, 70.0), entry(2025, 3, 30.0)];
        let cumulative = recompute_accumulated(&mut entries);

        assert_eq!(entries[0].accumulated, 40.0);
        assert_eq!(entries[1].accumulated, 100.0);
        assert_eq!(entries[2].accumulated, 100.0);
        assert_eq!(cumulative, 100.0);
    }

    #[test]
    fn correcting_an_early_month_propagates_without_double_counting() {
        let mut entries = vec![entry(2025, 1, 40.0), entry(2025, 2, 30.0)];
        recompute_accumulated(&mut entries);
        assert_eq!(entries[1].accumulated, 70.0);

        // Correction: January was really 10.
        entries[0].monthly_percentage = 10.0;
        let cumulative = recompute_accumulated(&mut entries);

        assert_eq!(entries[0].accumulated, 10.0);
        assert_eq!(entries[1].accumulated, 40.0);
        assert_eq!(cumulative, 40.0);
    }

    #[test]
    fn empty_history_is_zero() {
        let mut entries: Vec<MonthlyEntry> = vec![];
        assert_eq!(recompute_accumulated(&mut entries), 0.0);
    }
}
