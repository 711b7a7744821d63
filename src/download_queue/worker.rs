use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::models::{Job, JobFailure};
use super::service::QueueService;
use crate::library::{detect_featuring, thumbnails_of, Organizer};

/// The single consumer of the download queue.
///
/// Jobs run one at a time in submission order. Download and organize calls
/// are awaited to completion; cancellation is only observed between them.
pub struct QueueWorker {
    service: Arc<QueueService>,
    organizer: Arc<dyn Organizer>,
}

impl QueueWorker {
    pub fn new(service: Arc<QueueService>, organizer: Arc<dyn Organizer>) -> Self {
        Self { service, organizer }
    }

    /// Drains the queue until `shutdown` fires. Shutdown is only noticed
    /// while waiting for the next job.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Download worker started");
        loop {
            let job = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Download worker shutting down");
                    break;
                }
                job = self.service.next_job() => job,
            };
            self.process(job).await;
        }
    }

    async fn process(&self, job: Job) {
        info!(
            "Starting job {}: '{}' by {} ({})",
            job.id, job.metadata.title, job.metadata.artist, job.url
        );
        self.service.begin_job(&job);

        // Run on its own task so a panicking collaborator fails the job
        // instead of the worker.
        let service = self.service.clone();
        let organizer = self.organizer.clone();
        let task_job = job.clone();
        let outcome = match tokio::spawn(async move {
            execute(&service, organizer.as_ref(), &task_job).await
        })
        .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("Job {} task failed: {}", job.id, err);
                Err(JobFailure::Aborted(err.to_string()))
            }
        };

        match &outcome {
            Ok(final_path) => info!("Job {} completed: {}", job.id, final_path),
            Err(JobFailure::Cancelled) => info!("Job {} cancelled by user", job.id),
            Err(failure) => warn!("Job {} failed: {}", job.id, failure),
        }
        self.service.finish_job(&job, &outcome);
        self.service.job_done();
    }
}

async fn execute(
    service: &QueueService,
    organizer: &dyn Organizer,
    job: &Job,
) -> Result<String, JobFailure> {
    // Checkpoint A
    let downloaded = service
        .downloader()
        .download(&job.url, &job.metadata)
        .await;

    // Checkpoint B: cancellation wins over the download outcome.
    if service.is_cancel_requested() {
        if let Ok(file) = &downloaded {
            discard(&file.path).await;
        }
        return Err(JobFailure::Cancelled);
    }

    let file = downloaded.map_err(|e| JobFailure::Download(e.to_string()))?;
    debug!("Job {} downloaded to {:?}", job.id, file.path);

    // Checkpoint C
    if service.is_cancel_requested() {
        discard(&file.path).await;
        return Err(JobFailure::Cancelled);
    }

    let featuring = detect_featuring(&job.metadata.title, &job.metadata.artist);
    if featuring.has_feat {
        debug!(
            "Job {} featuring detected: main={}, feat={:?}",
            job.id, featuring.main_artist, featuring.feat_artists
        );
    }

    let organized = organizer
        .organize(&file, &job.metadata, &featuring)
        .await
        .map_err(|e| JobFailure::Organize(e.to_string()))?;
    Ok(organized.final_path)
}

/// Removes a cancelled download and the thumbnails written alongside it.
async fn discard(path: &std::path::Path) {
    let mut leftovers = thumbnails_of(path);
    leftovers.push(path.to_path_buf());
    for leftover in leftovers {
        if let Err(err) = tokio::fs::remove_file(&leftover).await {
            debug!("Could not remove cancelled download {:?}: {}", leftover, err);
        }
    }
}
