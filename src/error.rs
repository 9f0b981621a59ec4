use std::fmt;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Couldn't obtain a captcha for the session: {reason}")]
    CaptchaUnavailable { reason: String },

    #[error("Portal responded with status {status}. Body: {body}")]
    FetchFailed { status: u16, body: String },

    #[error("Detail page is missing its status structure: {0}")]
    MalformedPage(String),

    #[error("Worker {worker_id} aborted its chunk: {source}")]
    WorkerFatal {
        worker_id: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("{}", RunFailures(.failures))]
    RunFailed { failures: Vec<WorkerFailure> },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("The selector you are trying to scrape for is missing. Selector: {0}")]
    ParseMissingSelector(String),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Csv Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Toml Error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Failures scoped to a single application number. The worker logs these and moves on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::FetchFailed { .. } | Error::MalformedPage(_))
    }

    pub(crate) fn worker_fatal(worker_id: usize, source: Error) -> Self {
        match source {
            already @ Error::WorkerFatal { .. } => already,
            source => Error::WorkerFatal {
                worker_id,
                source: Box::new(source),
            },
        }
    }
}

/// One aborted worker of a failed run.
#[derive(Debug)]
pub struct WorkerFailure {
    pub worker_id: usize,
    pub error: Error,
}

struct RunFailures<'a>(&'a [WorkerFailure]);

impl fmt::Display for RunFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            [] => write!(f, "Run failed"),
            [first, rest @ ..] => {
                write!(f, "Run failed in worker {}: {}", first.worker_id, first.error)?;
                if !rest.is_empty() {
                    write!(f, " (and {} more failed worker(s))", rest.len())?;
                }
                Ok(())
            }
        }
    }
}
