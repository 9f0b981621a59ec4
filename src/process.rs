use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::task::{spawn_blocking, JoinSet};
use tracing::{error, info, warn};

use crate::portal::Portal;
use crate::record::{parse_number_list, ApplicationNumber};
use crate::table::merge_outputs;
use crate::worker::{ChunkWorker, WorkerReport};
use crate::{info_time, is_worker_output, worker_output_path, Error, Result, WorkerFailure};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub workers: usize,
    pub attempted: usize,
    pub written: usize,
    pub skipped: usize,
    pub merged_rows: usize,
}

/// Runs chunk workers over a number list and folds their shards into the combined table.
pub struct Orchestrator<P: Portal> {
    portal: P,
    output_dir: PathBuf,
    combined_path: PathBuf,
}

impl<P: Portal> Orchestrator<P> {
    pub fn new(
        portal: P,
        output_dir: impl Into<PathBuf>,
        combined_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            portal,
            output_dir: output_dir.into(),
            combined_path: combined_path.into(),
        }
    }

    /// Scrapes every number in `number_list` with `worker_count` concurrent workers.
    ///
    /// The combined table only changes when every worker completed. If any worker aborted,
    /// all shards of this run are deleted and [`Error::RunFailed`] is returned.
    pub async fn automate(&self, number_list: &Path, worker_count: usize) -> Result<RunSummary> {
        let start_time = Local::now();
        let res = self.run(number_list, worker_count).await;
        match &res {
            Ok(summary) => info!(?summary, "Run succeeded"),
            Err(e) => error!(error = %e, "Error during processing"),
        }
        info_time!(start_time, "Process finished.");
        res
    }

    async fn run(&self, number_list: &Path, worker_count: usize) -> Result<RunSummary> {
        if worker_count == 0 {
            return Err(Error::InvalidConfig("worker_count must be at least 1".into()));
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        initial_cleanup(&self.output_dir).await?;

        let numbers = parse_number_list(&tokio::fs::read_to_string(number_list).await?);
        if numbers.is_empty() {
            warn!(path = %number_list.display(), "Number list is empty, nothing to do");
            return Ok(RunSummary::default());
        }

        let chunks = partition(numbers, worker_count);
        info!(
            total = chunks.iter().map(Vec::len).sum::<usize>(),
            workers = chunks.len(),
            "Started scraping"
        );

        let reports = match self.run_workers(chunks).await {
            Ok(reports) => reports,
            Err(e) => {
                cleanup_generated_files(&self.output_dir, worker_count).await;
                return Err(e);
            }
        };

        let shards: Vec<PathBuf> = reports.iter().map(|r| r.output.clone()).collect();
        let combined = self.combined_path.clone();
        let merged_rows = spawn_blocking(move || merge_outputs(&combined, &shards)).await??;

        Ok(RunSummary {
            workers: reports.len(),
            attempted: reports.iter().map(|r| r.attempted).sum(),
            written: reports.iter().map(|r| r.written).sum(),
            skipped: reports.iter().map(|r| r.skipped).sum(),
            merged_rows,
        })
    }

    /// Spawns one worker per chunk and waits for all of them. Reports come back in ordinal order.
    async fn run_workers(&self, chunks: Vec<Vec<ApplicationNumber>>) -> Result<Vec<WorkerReport>> {
        let worker_count = chunks.len();
        let mut set = JoinSet::new();
        // A panicked task can only be told apart by its task id.
        let mut task_workers = HashMap::with_capacity(worker_count);
        for (idx, chunk) in chunks.into_iter().enumerate() {
            let mut worker = ChunkWorker::new(idx + 1, self.portal.clone(), &self.output_dir);
            let worker_id = worker.id();
            let handle = set.spawn(async move { (worker_id, worker.run(&chunk).await) });
            task_workers.insert(handle.id(), worker_id);
        }

        let mut reports: Vec<Option<WorkerReport>> = vec![None; worker_count];
        let mut failures = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((worker_id, Ok(report))) => reports[worker_id - 1] = Some(report),
                Ok((worker_id, Err(error))) => failures.push(WorkerFailure { worker_id, error }),
                Err(e) => match task_workers.get(&e.id()).copied() {
                    Some(worker_id) => {
                        error!(worker_id, error = %e, "Worker task did not finish");
                        failures.push(WorkerFailure {
                            worker_id,
                            error: Error::worker_fatal(worker_id, Error::RuntimeJoin(e)),
                        });
                    }
                    None => return Err(Error::RuntimeJoin(e)),
                },
            }
        }

        if !failures.is_empty() {
            failures.sort_by_key(|f| f.worker_id);
            return Err(Error::RunFailed { failures });
        }
        Ok(reports.into_iter().flatten().collect())
    }
}

/// Splits `numbers` into at most `worker_count` contiguous chunks of `ceil(len / worker_count)`.
pub fn partition(
    numbers: Vec<ApplicationNumber>,
    worker_count: usize,
) -> Vec<Vec<ApplicationNumber>> {
    if numbers.is_empty() || worker_count == 0 {
        return Vec::new();
    }
    let chunk_size = numbers.len().div_ceil(worker_count);
    numbers.chunks(chunk_size).map(<[_]>::to_vec).collect()
}

/// Deletes leftover worker shards from an earlier run. Returns how many were removed.
pub async fn initial_cleanup(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if name.to_str().is_some_and(is_worker_output) {
            tokio::fs::remove_file(entry.path()).await?;
            info!(path = %entry.path().display(), "Deleted existing file");
            removed += 1;
        }
    }
    Ok(removed)
}

/// Removes every shard this run could have produced.
async fn cleanup_generated_files(dir: &Path, worker_count: usize) {
    for worker_id in 1..=worker_count {
        let path = worker_output_path(dir, worker_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!(path = %path.display(), "Deleted file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => error!(path = %path.display(), error = %e, "Failed to delete file"),
        }
    }
}
