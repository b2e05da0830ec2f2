//! Writing extracted entries to disk.

use rayon::prelude::*;
use rwix_core::{fs::atomic_write, CancellationToken};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// One entry that could not be written.
#[derive(Debug, Error)]
#[error("failed to extract '{path}': {source}")]
pub struct ExtractionError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// An entry to extract.
pub(crate) struct Job<'a> {
    pub path: PathBuf,
    pub data: &'a [u8],
}

pub(crate) enum Outcome {
    Done(Vec<PathBuf>),
    Failed(Vec<PathBuf>, ExtractionError),
    Cancelled(Vec<PathBuf>),
}

/// Write every job in parallel. After the first failure no new entries are
/// started; entries already written stay on disk.
pub(crate) fn run(jobs: &[Job<'_>], cancellation: &CancellationToken) -> Outcome {
    let abort = AtomicBool::new(false);
    let results: Vec<Option<Result<PathBuf, ExtractionError>>> = jobs
        .par_iter()
        .map(|job| {
            if abort.load(Ordering::SeqCst) || cancellation.is_cancelled() {
                return None;
            }
            let result = atomic_write(&job.path, job.data)
                .map(|()| job.path.clone())
                .map_err(|source| {
                    abort.store(true, Ordering::SeqCst);
                    ExtractionError {
                        path: job.path.clone(),
                        source,
                    }
                });
            Some(result)
        })
        .collect();

    let mut extracted = Vec::new();
    let mut failure = None;
    for result in results.into_iter().flatten() {
        match result {
            Ok(path) => extracted.push(path),
            Err(e) => {
                failure.get_or_insert(e);
            }
        }
    }
    match failure {
        Some(e) => Outcome::Failed(extracted, e),
        None if cancellation.is_cancelled() && extracted.len() < jobs.len() => Outcome::Cancelled(extracted),
        None => Outcome::Done(extracted),
    }
}
