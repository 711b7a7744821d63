use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::cancel::CancelToken;
use super::models::*;
use super::queue::JobQueue;
use crate::downloader::Downloader;

/// Front door of the download pipeline.
///
/// Created once at startup and shared between the HTTP handlers and the
/// worker. All operations return without waiting on the worker.
pub struct QueueService {
    queue: JobQueue,
    status: Mutex<DownloadStatus>,
    cancel: CancelToken,
    downloader: Arc<dyn Downloader>,
    temp_dir: PathBuf,
}

impl QueueService {
    pub fn new(capacity: usize, temp_dir: PathBuf, downloader: Arc<dyn Downloader>) -> Self {
        Self {
            queue: JobQueue::new(capacity),
            status: Mutex::new(DownloadStatus::default()),
            cancel: CancelToken::new(),
            downloader,
            temp_dir,
        }
    }

    fn status(&self) -> MutexGuard<'_, DownloadStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Enqueues a job and returns its 1-based queue position.
    pub fn submit(&self, job: Job) -> Result<usize, QueueError> {
        if job.url.trim().is_empty() {
            return Err(QueueError::Validation("URL is required".to_string()));
        }
        let (id, url, title) = (job.id, job.url.clone(), job.metadata.title.clone());
        let position = self.queue.try_push(job)?;
        info!(
            "Queued job {} '{}' ({}) at position {}/{}",
            id,
            title,
            url,
            position,
            self.queue.capacity()
        );
        Ok(position)
    }

    /// Enqueues jobs in order until the queue is full. Returns how many
    /// were accepted.
    pub fn submit_many(&self, jobs: Vec<Job>) -> usize {
        let total = jobs.len();
        let mut added = 0;
        for job in jobs {
            match self.submit(job) {
                Ok(_) => added += 1,
                Err(QueueError::QueueFull { .. }) => {
                    warn!("Queue full, {} jobs not added", total - added);
                    break;
                }
                Err(QueueError::Validation(reason)) => {
                    warn!("Skipping job: {}", reason);
                }
            }
        }
        added
    }

    pub fn get_status(&self) -> StatusSnapshot {
        let status = self.status().clone();
        // Progress is owned by the downloader and read outside the status lock.
        let progress = if status.in_progress {
            Some(self.downloader.progress())
        } else {
            None
        };
        StatusSnapshot {
            in_progress: status.in_progress,
            current_job: status.current_job,
            last_completed: status.last_completed,
            last_error: status.last_error,
            progress,
            queue_size: self.queue.len(),
            queue: self.queue.snapshot(),
        }
    }

    /// Requests cancellation of the job in progress. Returns false, without
    /// touching any state, when the worker is idle.
    pub fn cancel(&self) -> bool {
        let status = self.status();
        match &status.current_job {
            Some(job) if status.in_progress => {
                self.cancel.request();
                info!("Cancellation requested for job {} ({})", job.id, job.url);
                true
            }
            _ => false,
        }
    }

    /// Deletes the regular files directly inside the temp directory and resets
    /// the status. Queued jobs are kept.
    pub async fn cleanup(&self) -> std::io::Result<Vec<String>> {
        let mut deleted = Vec::new();
        if tokio::fs::try_exists(&self.temp_dir).await? {
            let mut entries = tokio::fs::read_dir(&self.temp_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if !entry.file_type().await?.is_file() {
                    continue;
                }
                tokio::fs::remove_file(entry.path()).await?;
                let name = entry.file_name().to_string_lossy().to_string();
                debug!("Deleted temp file {}", name);
                deleted.push(name);
            }
        }
        deleted.sort();

        *self.status() = DownloadStatus::default();
        self.downloader.reset_progress();
        info!("Cleanup removed {} temp files", deleted.len());
        Ok(deleted)
    }

    pub(crate) fn downloader(&self) -> &Arc<dyn Downloader> {
        &self.downloader
    }

    pub(crate) async fn next_job(&self) -> Job {
        self.queue.pop().await
    }

    pub(crate) fn job_done(&self) {
        self.queue.task_done();
    }

    /// Waits until every submitted job has been processed by the worker.
    pub async fn join(&self) {
        self.queue.join().await;
    }

    pub(crate) fn is_cancel_requested(&self) -> bool {
        self.cancel.is_requested()
    }

    pub(crate) fn begin_job(&self, job: &Job) {
        self.cancel.clear();
        let mut status = self.status();
        status.in_progress = true;
        status.current_job = Some(job.clone());
        status.last_error = None;
    }

    pub(crate) fn finish_job(&self, job: &Job, outcome: &Result<String, JobFailure>) {
        let mut status = self.status();
        status.in_progress = false;
        status.current_job = None;
        match outcome {
            Ok(final_path) => {
                status.last_completed = Some(CompletedRecord {
                    final_path: final_path.clone(),
                    metadata: job.metadata.clone(),
                    timestamp: Utc::now(),
                });
            }
            Err(failure) => {
                status.last_error = Some(ErrorRecord {
                    error: failure.to_string(),
                    metadata: job.metadata.clone(),
                    timestamp: Utc::now(),
                });
            }
        }
    }
}
