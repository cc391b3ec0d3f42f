//! Log merge and normalization
//!
//! This module turns an arbitrary collection of log entries into the canonical log:
//! - Sorted by date, with deterministic tie-breaks
//! - Fully identical entries collapsed
//! - First meter reading of each calendar day flagged as fasting

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use std::cmp::Ordering;

use crate::types::LogEntry;

/// Normalizer for building the canonical log
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    /// Offset used to decide which calendar day a reading belongs to
    offset: FixedOffset,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Utc.fix())
    }
}

impl Normalizer {
    /// Create a normalizer that groups fasting readings by days in `offset`
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Merge newly imported entries into an existing log
    pub fn merge(&self, existing: &[LogEntry], incoming: &[LogEntry]) -> Vec<LogEntry> {
        let mut entries = Vec::with_capacity(existing.len() + incoming.len());
        entries.extend_from_slice(existing);
        entries.extend_from_slice(incoming);
        self.normalize(entries)
    }

    /// Sort, deduplicate and fasting-flag a collection of entries
    pub fn normalize(&self, mut entries: Vec<LogEntry>) -> Vec<LogEntry> {
        let input_len = entries.len();

        entries.sort_by(compare_entries);
        entries.dedup_by(|current, previous| same_record(current, previous));

        tracing::debug!(
            input = input_len,
            output = entries.len(),
            "normalized log entries"
        );

        self.classify_fasting(entries)
    }

    /// Flag the first BGM reading of each calendar day.
    ///
    /// Expects entries in canonical order. The last fasting day is carried as
    /// the fold accumulator.
    fn classify_fasting(&self, entries: Vec<LogEntry>) -> Vec<LogEntry> {
        let capacity = entries.len();
        let (classified, _) = entries.into_iter().fold(
            (Vec::with_capacity(capacity), None::<NaiveDate>),
            |(mut out, last_day), entry| {
                let day = entry.date.with_timezone(&self.offset).date_naive();
                let is_fasting = entry.bgm.is_some() && last_day != Some(day);
                let next_day = if is_fasting { Some(day) } else { last_day };
                out.push(LogEntry { is_fasting, ..entry });
                (out, next_day)
            },
        );
        classified
    }
}

/// Merge two logs using UTC calendar days for fasting classification
pub fn merge(existing: &[LogEntry], incoming: &[LogEntry]) -> Vec<LogEntry> {
    Normalizer::default().merge(existing, incoming)
}

/// Normalize a log using UTC calendar days for fasting classification
pub fn normalize(entries: Vec<LogEntry>) -> Vec<LogEntry> {
    Normalizer::default().normalize(entries)
}

/// Canonical ordering: date, then cgm, then bgm (absent readings compare as 0),
/// then note (absent compares as empty), then event type.
pub fn compare_entries(a: &LogEntry, b: &LogEntry) -> Ordering {
    a.date
        .cmp(&b.date)
        .then_with(|| a.cgm.unwrap_or(0.0).total_cmp(&b.cgm.unwrap_or(0.0)))
        .then_with(|| a.bgm.unwrap_or(0.0).total_cmp(&b.bgm.unwrap_or(0.0)))
        .then_with(|| {
            a.note
                .as_deref()
                .unwrap_or("")
                .cmp(b.note.as_deref().unwrap_or(""))
        })
        .then_with(|| a.event_type.cmp(&b.event_type))
}

/// Two entries describe the same record when every user-supplied field matches
fn same_record(a: &LogEntry, b: &LogEntry) -> bool {
    a.date == b.date
        && a.cgm == b.cgm
        && a.bgm == b.bgm
        && a.note == b.note
        && a.event_type == b.event_type
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventType;
    use chrono::{DateTime, TimeZone};
    use pretty_assertions::assert_eq;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
    }

    fn mixed_log() -> Vec<LogEntry> {
        vec![
            LogEntry::cgm(at(15, 8, 10), 7.2),
            LogEntry::bgm(at(15, 19, 0), 6.1),
            LogEntry::event(at(15, 8, 0), EventType::Breakfast).with_note("oats"),
            LogEntry::cgm(at(15, 8, 0), 5.4),
            LogEntry::bgm(at(15, 7, 0), 5.2),
            LogEntry::bgm(at(16, 6, 45), 5.0),
            LogEntry::cgm(at(15, 8, 0), 5.1),
        ]
    }

    #[test]
    fn test_merge_sorts_by_date() {
        let merged = merge(&mixed_log(), &[]);
        assert!(merged.windows(2).all(|w| w[0].date <= w[1].date));
        assert_eq!(merged.len(), 7);
    }

    #[test]
    fn test_tie_breaks() {
        let merged = merge(&mixed_log(), &[]);
        let at_eight: Vec<&LogEntry> = merged.iter().filter(|e| e.date == at(15, 8, 0)).collect();

        // Event has no cgm, so it compares as 0 and sorts first
        assert_eq!(at_eight[0].event_type, Some(EventType::Breakfast));
        assert_eq!(at_eight[1].cgm, Some(5.1));
        assert_eq!(at_eight[2].cgm, Some(5.4));

        for pair in merged.windows(2) {
            if pair[0].date == pair[1].date {
                assert_ne!(compare_entries(&pair[0], &pair[1]), Ordering::Greater);
            }
        }
    }

    #[test]
    fn test_bgm_tie_break() {
        let merged = merge(
            &[
                LogEntry::bgm(at(15, 12, 0), 6.0),
                LogEntry::cgm(at(15, 12, 0), 5.0),
            ],
            &[
                LogEntry::bgm(at(15, 12, 0), 5.0),
                LogEntry::new(at(15, 12, 0)).with_note("lunch out"),
                LogEntry::bgm(at(15, 12, 0), 9.0),
            ],
        );

        let order: Vec<(Option<f64>, Option<f64>)> = merged.iter().map(|e| (e.cgm, e.bgm)).collect();
        // Absent readings compare as 0, so cgm is decided before bgm
        assert_eq!(
            order,
            vec![
                (None, None),
                (None, Some(5.0)),
                (None, Some(6.0)),
                (None, Some(9.0)),
                (Some(5.0), None),
            ]
        );
        assert_eq!(merged[0].note.as_deref(), Some("lunch out"));
    }

    #[test]
    fn test_note_tie_break() {
        let a = LogEntry::event(at(15, 12, 0), EventType::Lunch).with_note("soup");
        let b = LogEntry::event(at(15, 12, 0), EventType::Lunch).with_note("pasta");
        let c = LogEntry::event(at(15, 12, 0), EventType::Lunch);

        let merged = merge(&[a], &[b, c]);
        let notes: Vec<Option<&str>> = merged.iter().map(|e| e.note.as_deref()).collect();
        assert_eq!(notes, vec![None, Some("pasta"), Some("soup")]);
    }

    #[test]
    fn test_absent_reading_ties_with_zero() {
        let zero = LogEntry::cgm(at(15, 9, 0), 0.0).with_note("b");
        let absent = LogEntry::new(at(15, 9, 0)).with_note("a");

        let merged = merge(&[zero], &[absent]);
        // cgm 0.0 and absent cgm tie, so the note decides
        assert_eq!(merged[0].note.as_deref(), Some("a"));
        assert_eq!(merged[1].note.as_deref(), Some("b"));
    }

    #[test]
    fn test_dedup_identical_entries() {
        let entry = LogEntry::bgm(at(15, 7, 0), 5.2).with_note("finger");
        let merged = merge(&[entry.clone()], &[entry]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_same_timestamp_different_readings_kept() {
        let merged = merge(
            &[LogEntry::cgm(at(15, 7, 0), 5.2)],
            &[LogEntry::bgm(at(15, 7, 0), 5.2), LogEntry::cgm(at(15, 7, 0), 5.3)],
        );
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_events_differing_only_in_type_kept() {
        let merged = merge(
            &[LogEntry::event(at(15, 12, 0), EventType::Snack)],
            &[
                LogEntry::event(at(15, 12, 0), EventType::Lunch),
                LogEntry::event(at(15, 12, 0), EventType::Snack),
            ],
        );
        let types: Vec<Option<EventType>> = merged.iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![Some(EventType::Lunch), Some(EventType::Snack)]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let once = merge(&mixed_log(), &[]);
        let twice = merge(&once, &[]);
        assert_eq!(once, twice);

        let reimported = merge(&once, &mixed_log());
        assert_eq!(once, reimported);
    }

    #[test]
    fn test_fasting_flag_first_bgm_per_day() {
        let merged = merge(&mixed_log(), &[]);
        let fasting: Vec<(DateTime<Utc>, bool)> = merged
            .iter()
            .filter(|e| e.bgm.is_some())
            .map(|e| (e.date, e.is_fasting))
            .collect();

        assert_eq!(
            fasting,
            vec![
                (at(15, 7, 0), true),
                (at(15, 19, 0), false),
                (at(16, 6, 45), true),
            ]
        );
        assert!(merged.iter().filter(|e| e.bgm.is_none()).all(|e| !e.is_fasting));
    }

    #[test]
    fn test_fasting_uses_local_calendar_day() {
        // 23:30 UTC on the 15th is already the 16th at UTC+2
        let entries = vec![LogEntry::bgm(at(15, 23, 30), 6.0), LogEntry::bgm(at(16, 6, 0), 5.0)];

        let utc = Normalizer::default().normalize(entries.clone());
        assert!(utc[0].is_fasting && utc[1].is_fasting);

        let plus_two = Normalizer::new(FixedOffset::east_opt(2 * 3600).unwrap()).normalize(entries);
        assert!(plus_two[0].is_fasting);
        assert!(!plus_two[1].is_fasting);
    }

    #[test]
    fn test_stale_fasting_flag_recomputed() {
        let mut stale = LogEntry::bgm(at(15, 19, 0), 6.1);
        stale.is_fasting = true;

        let merged = merge(&[stale], &[LogEntry::bgm(at(15, 7, 0), 5.2)]);
        assert!(merged[0].is_fasting);
        assert!(!merged[1].is_fasting);
    }

    #[test]
    fn test_empty_input() {
        assert!(merge(&[], &[]).is_empty());
    }
}
