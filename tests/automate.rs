mod common;

use std::path::Path;

use common::{write_numbers, FakePortal, Outcome};
use tmscrap::process::Orchestrator;
use tmscrap::record::TrademarkRecord;
use tmscrap::table::Table;
use tmscrap::{is_worker_output, worker_output_path, Error};

const COMBINED: &str = "combined_trademark_data.csv";

fn numbers_in(table: &Table) -> Vec<String> {
    (0..table.len())
        .map(|i| table.cell(i, "TM Application No.").unwrap_or_default().to_string())
        .collect()
}

fn seed_combined(path: &Path, numbers: &[&str]) {
    let mut table = Table::default();
    for number in numbers {
        let mut record = TrademarkRecord::with_status("Registered");
        record.insert("TM Application No.", *number);
        table.push_record(&record);
    }
    table.write(path).unwrap();
}

fn leftover_shards(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok()?.file_name().into_string().ok())
        .filter(|name| is_worker_output(name))
        .collect()
}

#[tokio::test]
async fn merge_keeps_existing_rows_then_worker_order() {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("numbers.txt");
    let combined = dir.path().join(COMBINED);
    seed_combined(&combined, &["A", "B"]);
    // Two workers get [C, X] and [D, E]; X is a miss so worker 1 only writes C.
    write_numbers(&list, &["C", "X", "D", "E"]);

    let portal = FakePortal::new().with_outcome("X", Outcome::Status(404));
    let summary = Orchestrator::new(portal.clone(), dir.path(), &combined)
        .automate(&list, 2)
        .await
        .unwrap();

    assert_eq!(portal.bootstraps(), 2);
    assert_eq!((summary.workers, summary.attempted), (2, 4));
    assert_eq!((summary.written, summary.skipped, summary.merged_rows), (3, 1, 3));
    assert_eq!(numbers_in(&Table::read(&combined).unwrap()), ["A", "B", "C", "D", "E"]);
    assert!(leftover_shards(dir.path()).is_empty());
}

#[tokio::test]
async fn bad_records_do_not_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("numbers.txt");
    let combined = dir.path().join(COMBINED);
    write_numbers(&list, &["1000001", "1000002", "1000003", "1000004", "1000005"]);

    let portal = FakePortal::new()
        .with_outcome("1000003", Outcome::Garbage)
        .with_outcome("1000005", Outcome::Status(500));
    let summary = Orchestrator::new(portal, dir.path(), &combined)
        .automate(&list, 1)
        .await
        .unwrap();

    assert_eq!(summary.skipped, 2);
    let table = Table::read(&combined).unwrap();
    assert_eq!(numbers_in(&table), ["1000001", "1000002", "1000004"]);
    assert_eq!(table.cell(0, "status"), Some("Registered"));
}

#[tokio::test]
async fn aborted_worker_leaves_combined_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("numbers.txt");
    let combined = dir.path().join(COMBINED);
    seed_combined(&combined, &["A", "B"]);
    let before = std::fs::read(&combined).unwrap();
    write_numbers(&list, &["1", "2", "3", "4", "5", "6"]);

    // Worker 3 gets [5, 6] and dies on 6 after writing 5.
    let portal = FakePortal::new().with_outcome("6", Outcome::Fatal);
    let err = Orchestrator::new(portal, dir.path(), &combined)
        .automate(&list, 3)
        .await
        .unwrap_err();

    match err {
        Error::RunFailed { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].worker_id, 3);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(std::fs::read(&combined).unwrap(), before);
    assert!(leftover_shards(dir.path()).is_empty());
}

#[tokio::test]
async fn panicked_workers_are_reported_under_their_own_ids() {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("numbers.txt");
    let combined = dir.path().join(COMBINED);
    seed_combined(&combined, &["A"]);
    let before = std::fs::read(&combined).unwrap();
    write_numbers(&list, &["1", "2", "3", "4", "5", "6"]);

    // Workers 1 and 3 write their first number, then panic; worker 2 completes.
    let portal = FakePortal::new()
        .with_outcome("2", Outcome::Panic)
        .with_outcome("6", Outcome::Panic);
    let err = Orchestrator::new(portal, dir.path(), &combined)
        .automate(&list, 3)
        .await
        .unwrap_err();

    let Error::RunFailed { failures } = err else {
        panic!("expected a failed run");
    };
    let ids: Vec<usize> = failures.iter().map(|f| f.worker_id).collect();
    assert_eq!(ids, [1, 3]);
    for failure in &failures {
        match &failure.error {
            Error::WorkerFatal { worker_id, source } => {
                assert_eq!(*worker_id, failure.worker_id);
                assert!(matches!(**source, Error::RuntimeJoin(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(std::fs::read(&combined).unwrap(), before);
    assert!(leftover_shards(dir.path()).is_empty());
}

#[tokio::test]
async fn captcha_failure_in_one_worker_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("numbers.txt");
    let combined = dir.path().join(COMBINED);
    write_numbers(&list, &["1", "2", "3", "4"]);

    let portal = FakePortal::new().failing_bootstrap(2);
    let err = Orchestrator::new(portal.clone(), dir.path(), &combined)
        .automate(&list, 2)
        .await
        .unwrap_err();

    assert_eq!(portal.bootstraps(), 2);
    let Error::RunFailed { failures } = err else {
        panic!("expected a failed run");
    };
    match &failures[0].error {
        Error::WorkerFatal { source, .. } => {
            assert!(matches!(**source, Error::CaptchaUnavailable { .. }))
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!combined.exists());
    assert!(leftover_shards(dir.path()).is_empty());
}

#[tokio::test]
async fn stale_shards_from_a_failed_run_are_not_merged() {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("numbers.txt");
    let combined = dir.path().join(COMBINED);
    let stale = worker_output_path(dir.path(), 1);
    seed_combined(&stale, &["STALE"]);
    write_numbers(&list, &["1"]);

    Orchestrator::new(FakePortal::new(), dir.path(), &combined)
        .automate(&list, 4)
        .await
        .unwrap();

    assert_eq!(numbers_in(&Table::read(&combined).unwrap()), ["1"]);
}

#[tokio::test]
async fn empty_list_runs_no_workers() {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("numbers.txt");
    let combined = dir.path().join(COMBINED);
    std::fs::write(&list, "\n  \n").unwrap();

    let portal = FakePortal::new();
    let summary = Orchestrator::new(portal.clone(), dir.path(), &combined)
        .automate(&list, 3)
        .await
        .unwrap();

    assert_eq!(summary.workers, 0);
    assert_eq!(portal.bootstraps(), 0);
    assert!(!combined.exists());
}

#[tokio::test]
async fn zero_workers_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("numbers.txt");
    write_numbers(&list, &["1"]);

    let err = Orchestrator::new(FakePortal::new(), dir.path(), dir.path().join(COMBINED))
        .automate(&list, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}
