//! Property-based tests for execution, snapshot and rollback identifiers

use chrono::{DateTime, Utc};
use knowforge_execution::ids::{
    dry_run_execution_id, execution_id, find_snapshot_for_execution, snapshot_id,
    suggestion_id_of_execution,
};
use proptest::prelude::*;

fn timestamp(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap()
}

proptest! {
    // The snapshot id is recoverable from the execution id alone, even when
    // the suggestion id itself contains '-'
    #[test]
    fn prop_snapshot_recovered_from_execution_id(
        suggestion_id in "[a-zA-Z0-9_-]{1,24}",
        micros in 0i64..4_000_000_000_000_000,
    ) {
        let started = timestamp(micros);
        let exec_id = execution_id(&suggestion_id, &started);

        prop_assert_eq!(find_snapshot_for_execution(&exec_id), Some(snapshot_id(&started)));
        prop_assert_eq!(suggestion_id_of_execution(&exec_id), Some(suggestion_id.as_str()));
    }

    #[test]
    fn prop_dry_run_ids_never_resolve(
        suggestion_id in "[a-z0-9-]{1,16}",
        micros in 0i64..4_000_000_000_000_000,
    ) {
        let id = dry_run_execution_id(&suggestion_id, &timestamp(micros));
        prop_assert_eq!(find_snapshot_for_execution(&id), None);
    }

    #[test]
    fn prop_arbitrary_text_never_panics(text in ".{0,40}") {
        let _ = find_snapshot_for_execution(&text);
        let _ = suggestion_id_of_execution(&text);
    }
}
