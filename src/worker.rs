use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info, instrument, warn};

use crate::parse::parse_detail;
use crate::portal::Portal;
use crate::record::{ApplicationNumber, CaptchaToken, TrademarkRecord};
use crate::table::append_record;
use crate::{info_time, worker_output_path, Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Bootstrapping,
    Processing,
    Completed,
    Aborted,
}

/// What a completed worker hands back to the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    /// Only exists on disk if at least one record was written.
    pub output: PathBuf,
    pub attempted: usize,
    pub written: usize,
    pub skipped: usize,
}

/// Scrapes one chunk through one session, writing each record to its own shard as it goes.
pub struct ChunkWorker<P: Portal> {
    id: usize,
    portal: P,
    output: PathBuf,
    state: WorkerState,
}

impl<P: Portal> ChunkWorker<P> {
    pub fn new(id: usize, portal: P, output_dir: &Path) -> Self {
        Self {
            id,
            portal,
            output: worker_output_path(output_dir, id),
            state: WorkerState::Idle,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Bootstraps a session and walks the chunk in order.
    ///
    /// Fetch and parse failures of a single number are logged and skipped. Anything else
    /// deletes this worker's shard and is returned as [`Error::WorkerFatal`].
    #[instrument(name = "worker", skip_all, fields(worker_id = self.id, numbers = chunk.len()))]
    pub async fn run(&mut self, chunk: &[ApplicationNumber]) -> Result<WorkerReport> {
        let start_time = Local::now();

        self.transition(WorkerState::Bootstrapping);
        let (session, captcha) = match self.portal.bootstrap().await {
            Ok(bootstrapped) => bootstrapped,
            Err(e) => {
                error!(error = %e, "Error retrieving captcha");
                self.transition(WorkerState::Aborted);
                let e = match e {
                    e @ Error::CaptchaUnavailable { .. } => e,
                    other => Error::CaptchaUnavailable {
                        reason: other.to_string(),
                    },
                };
                return Err(Error::worker_fatal(self.id, e));
            }
        };

        self.transition(WorkerState::Processing);
        match self.process(&session, &captcha, chunk).await {
            Ok(report) => {
                self.transition(WorkerState::Completed);
                info_time!(
                    start_time,
                    "Worker {} finished: {} written, {} skipped",
                    self.id,
                    report.written,
                    report.skipped
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Error during data extraction, discarding partial output");
                self.discard_output().await;
                self.transition(WorkerState::Aborted);
                Err(Error::worker_fatal(self.id, e))
            }
        }
    }

    async fn process(
        &self,
        session: &P::Session,
        captcha: &CaptchaToken,
        chunk: &[ApplicationNumber],
    ) -> Result<WorkerReport> {
        let mut report = WorkerReport {
            worker_id: self.id,
            output: self.output.clone(),
            attempted: 0,
            written: 0,
            skipped: 0,
        };

        for number in chunk {
            report.attempted += 1;
            match self.fetch_record(session, captcha, number).await {
                Ok(record) => {
                    let path = self.output.clone();
                    spawn_blocking(move || append_record(&path, &record)).await??;
                    report.written += 1;
                    debug!(application_number = %number, "Record saved");
                }
                Err(e) if e.is_recoverable() => {
                    warn!(application_number = %number, error = %e, "Skipping application number");
                    report.skipped += 1;
                }
                Err(e) => {
                    error!(application_number = %number, "Unexpected failure, aborting chunk");
                    return Err(e);
                }
            }
        }
        Ok(report)
    }

    async fn fetch_record(
        &self,
        session: &P::Session,
        captcha: &CaptchaToken,
        number: &ApplicationNumber,
    ) -> Result<TrademarkRecord> {
        let page = self.portal.fetch(session, number, captcha).await?;
        spawn_blocking(move || parse_detail(&page)).await?
    }

    async fn discard_output(&self) {
        match tokio::fs::remove_file(&self.output).await {
            Ok(()) => info!(path = %self.output.display(), "Deleted partial output"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => error!(
                path = %self.output.display(),
                error = %e,
                "Failed to delete partial output"
            ),
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(from = ?self.state, to = ?next, "Worker state change");
        self.state = next;
    }
}
