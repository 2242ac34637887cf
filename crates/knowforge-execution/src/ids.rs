//! Identifier formats for executions, snapshots and rollbacks
//!
//! Execution ids look like `exec-{suggestion_id}-{timestamp}` and the snapshot
//! id of an execution is `refactoring-{timestamp}`, so the snapshot can always
//! be recovered from the execution id alone. Timestamps use a compact UTC
//! format without `-` so that the last `-` of an execution id always
//! separates the suggestion id from the timestamp.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, NaiveDateTime, Utc};

/// Timestamp layout embedded in identifiers
pub const ID_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%6f";

const EXECUTION_PREFIX: &str = "exec-";
const DRY_RUN_PREFIX: &str = "dryrun-";
const SNAPSHOT_PREFIX: &str = "refactoring-";
const ROLLBACK_PREFIX: &str = "rollback-";

static LAST_MICROS: AtomicI64 = AtomicI64::new(0);

/// Current time, strictly increasing across calls in this process
pub fn next_timestamp() -> DateTime<Utc> {
    let now = Utc::now().timestamp_micros();
    let mut last = LAST_MICROS.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_MICROS.compare_exchange_weak(last, candidate, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return DateTime::from_timestamp_micros(candidate).unwrap_or_else(Utc::now),
            Err(actual) => last = actual,
        }
    }
}

/// Render a timestamp for use inside an identifier
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(ID_TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if value.contains('-') {
        return None;
    }
    NaiveDateTime::parse_from_str(value, ID_TIMESTAMP_FORMAT).ok()
}

/// `exec-{suggestion_id}-{timestamp}`
pub fn execution_id(suggestion_id: &str, timestamp: &DateTime<Utc>) -> String {
    format!("{}{}-{}", EXECUTION_PREFIX, suggestion_id, format_timestamp(timestamp))
}

/// Synthetic id for a dry run; never resolves to a snapshot
pub fn dry_run_execution_id(suggestion_id: &str, timestamp: &DateTime<Utc>) -> String {
    format!("{}{}", DRY_RUN_PREFIX, execution_id(suggestion_id, timestamp))
}

/// `refactoring-{timestamp}`
pub fn snapshot_id(timestamp: &DateTime<Utc>) -> String {
    format!("{}{}", SNAPSHOT_PREFIX, format_timestamp(timestamp))
}

/// `rollback-{execution_id}-{timestamp}`
pub fn rollback_id(execution_id: &str, timestamp: &DateTime<Utc>) -> String {
    format!("{}{}-{}", ROLLBACK_PREFIX, execution_id, format_timestamp(timestamp))
}

fn split_execution_id(execution_id: &str) -> Option<(&str, &str)> {
    let rest = execution_id.strip_prefix(EXECUTION_PREFIX)?;
    let (suggestion_id, timestamp) = rest.rsplit_once('-')?;
    if suggestion_id.is_empty() {
        return None;
    }
    parse_timestamp(timestamp)?;
    Some((suggestion_id, timestamp))
}

/// Snapshot id of an execution, or `None` if the id is not an execution id
pub fn find_snapshot_for_execution(execution_id: &str) -> Option<String> {
    split_execution_id(execution_id).map(|(_, timestamp)| format!("{}{}", SNAPSHOT_PREFIX, timestamp))
}

/// Suggestion id embedded in an execution id
pub fn suggestion_id_of_execution(execution_id: &str) -> Option<&str> {
    split_execution_id(execution_id).map(|(suggestion_id, _)| suggestion_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 15).unwrap()
    }

    #[test]
    fn test_formats() {
        let ts = fixed();
        assert_eq!(format_timestamp(&ts), "20261018T093015000000");
        assert_eq!(execution_id("s-1", &ts), "exec-s-1-20261018T093015000000");
        assert_eq!(snapshot_id(&ts), "refactoring-20261018T093015000000");
        assert_eq!(
            rollback_id("exec-s-1-20261018T093015000000", &ts),
            "rollback-exec-s-1-20261018T093015000000-20261018T093015000000"
        );
    }

    #[test]
    fn test_snapshot_from_execution_id() {
        let ts = fixed();
        let exec = execution_id("merge-a-b", &ts);
        assert_eq!(find_snapshot_for_execution(&exec), Some(snapshot_id(&ts)));
        assert_eq!(suggestion_id_of_execution(&exec), Some("merge-a-b"));
    }

    #[test]
    fn test_malformed_execution_ids() {
        assert_eq!(find_snapshot_for_execution(""), None);
        assert_eq!(find_snapshot_for_execution("exec-"), None);
        assert_eq!(find_snapshot_for_execution("exec-s1"), None);
        assert_eq!(find_snapshot_for_execution("exec--20261018T093015000000"), None);
        assert_eq!(find_snapshot_for_execution("exec-s1-notatimestamp"), None);
        assert_eq!(find_snapshot_for_execution("run-s1-20261018T093015000000"), None);
    }

    #[test]
    fn test_dry_run_ids_do_not_resolve() {
        let id = dry_run_execution_id("s1", &fixed());
        assert!(id.starts_with("dryrun-exec-s1-"));
        assert_eq!(find_snapshot_for_execution(&id), None);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let mut previous = next_timestamp();
        for _ in 0..1000 {
            let next = next_timestamp();
            assert!(next > previous);
            previous = next;
        }
    }
}
