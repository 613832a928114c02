//! In-memory review queue.
//!
//! Jobs move through `Queued -> dispatched (1..quota times) -> awaiting
//! approval -> confirmed | retried | cancelled`. Every operation runs under a
//! single lock, so each one is atomic with respect to the others; `confirm`
//! keeps the lock while it writes to the archive.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;

use crate::imaging::pixel::{decode_color, decode_overlay, encode_png};
use crate::imaging::{apply_fracture, FractureParams, ImagingError};
use crate::models::job::{
    CarouselSide, ConfirmAction, Job, JobId, NewJob, PendingSummary, ResultOption,
};
use crate::services::storage::{StorageError, StorageKind, StorageSink};

/// Queue sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewSettings {
    /// Dispatch quota per job.
    pub results_per_image: u32,
    /// Carousel capacity.
    pub carousel_size: usize,
    pub noise_seed: Option<u64>,
}

/// A confirmed job on display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarouselEntry {
    pub result: Bytes,
    pub original: Bytes,
}

struct PendingEntry {
    job: Job,
    results: Vec<Bytes>,
}

struct ReviewState {
    next_id: u64,
    /// Head (front) is the newest job, tail (back) the next to dispatch.
    dispatch: VecDeque<JobId>,
    awaiting: HashMap<JobId, PendingEntry>,
    carousel: VecDeque<CarouselEntry>,
    rng: StdRng,
}

impl ReviewState {
    fn enqueue(&mut self, job: Job) {
        self.dispatch.push_front(job.id);
        self.awaiting.insert(
            job.id,
            PendingEntry {
                job,
                results: Vec::new(),
            },
        );
    }

    fn withdraw(&mut self, job_id: JobId) {
        self.dispatch.retain(|id| *id != job_id);
    }

    fn push_carousel(&mut self, entry: CarouselEntry, capacity: usize) {
        self.carousel.push_front(entry);
        self.carousel.truncate(capacity);
    }

    fn entry(&self, job_id: JobId) -> Result<&PendingEntry, ReviewError> {
        self.awaiting.get(&job_id).ok_or(ReviewError::NotFound(job_id))
    }
}

/// Orchestrates dispatch, review decisions and the display carousel.
pub struct ReviewQueue {
    settings: ReviewSettings,
    storage: Arc<dyn StorageSink>,
    state: Mutex<ReviewState>,
}

impl ReviewQueue {
    pub fn new(settings: ReviewSettings, storage: Arc<dyn StorageSink>) -> Self {
        let rng = match settings.noise_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            settings,
            storage,
            state: Mutex::new(ReviewState {
                next_id: 0,
                dispatch: VecDeque::new(),
                awaiting: HashMap::new(),
                carousel: VecDeque::new(),
                rng,
            }),
        }
    }

    pub fn settings(&self) -> &ReviewSettings {
        &self.settings
    }

    pub fn storage(&self) -> &Arc<dyn StorageSink> {
        &self.storage
    }

    /// Assign an id to a submission and enqueue it.
    pub async fn submit(&self, new_job: NewJob) -> JobId {
        let mut state = self.state.lock().await;
        let id = JobId(state.next_id);
        state.next_id += 1;

        let job = Job {
            id,
            original_image: new_job.original_image,
            owner_ref: new_job.owner_ref,
            metadata: new_job.metadata,
            remaining_dispatches: self.settings.results_per_image,
            created_at: Utc::now(),
        };
        state.enqueue(job);

        metrics::counter!("review_jobs_submitted_total").increment(1);
        tracing::info!(job_id = %id, queue_depth = state.dispatch.len(), "Job submitted");
        id
    }

    /// Insert a job at the head of the dispatch ordering with an empty
    /// result set. Replaces any previous entry for the same id.
    pub async fn enqueue(&self, job: Job) {
        let mut state = self.state.lock().await;
        state.next_id = state.next_id.max(job.id.0 + 1);
        state.withdraw(job.id);
        state.enqueue(job);
    }

    /// Hand the oldest dispatchable job to a worker.
    ///
    /// The same job is returned once per unit of its quota before it leaves
    /// the dispatch ordering.
    pub async fn dequeue(&self) -> Option<Job> {
        let mut state = self.state.lock().await;
        let state = &mut *state;
        while let Some(&job_id) = state.dispatch.back() {
            let Some(entry) = state.awaiting.get_mut(&job_id) else {
                state.dispatch.pop_back();
                continue;
            };
            let job = &mut entry.job;
            job.remaining_dispatches = job.remaining_dispatches.saturating_sub(1);
            if job.remaining_dispatches == 0 {
                state.dispatch.pop_back();
            }
            tracing::debug!(
                job_id = %job_id,
                remaining = job.remaining_dispatches,
                "Job dispatched"
            );
            return Some(job.clone());
        }
        None
    }

    /// Append a worker result to a pending job.
    pub async fn submit_result(&self, job_id: JobId, result: Bytes) -> Result<(), ReviewError> {
        let mut state = self.state.lock().await;
        let entry = state
            .awaiting
            .get_mut(&job_id)
            .ok_or(ReviewError::NotFound(job_id))?;
        entry.results.push(result);

        metrics::counter!("review_results_submitted_total").increment(1);
        tracing::info!(job_id = %job_id, results = entry.results.len(), "Result submitted");
        Ok(())
    }

    /// Composite a fracture overlay onto one candidate result, replacing it.
    ///
    /// The pixel work runs on the blocking pool; the queue lock stays held
    /// until the candidate is replaced.
    pub async fn composite_overlay(
        &self,
        job_id: JobId,
        choice: usize,
        overlay: &[u8],
        params: FractureParams,
    ) -> Result<(), ReviewError> {
        let mut state = self.state.lock().await;
        let entry = state.entry(job_id)?;
        let candidate = entry
            .results
            .get(choice)
            .cloned()
            .ok_or(ReviewError::InvalidChoice {
                job_id,
                choice,
                available: entry.results.len(),
            })?;
        let overlay = Bytes::copy_from_slice(overlay);
        let seed: u64 = state.rng.gen();

        let started = Instant::now();
        let encoded = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ImagingError> {
            let base = decode_color(&candidate)?;
            let overlay = decode_overlay(&overlay)?;
            let mut rng = StdRng::seed_from_u64(seed);
            encode_png(&apply_fracture(base, &overlay, &params, &mut rng))
        })
        .await??;
        metrics::histogram!("fracture_composite_seconds").record(started.elapsed().as_secs_f64());

        let entry = state
            .awaiting
            .get_mut(&job_id)
            .ok_or(ReviewError::NotFound(job_id))?;
        entry.results[choice] = Bytes::from(encoded);
        tracing::info!(job_id = %job_id, choice, x = params.x, y = params.y, "Overlay composited");
        Ok(())
    }

    /// Accept a result: archive it together with the original and put the
    /// pair on the carousel.
    ///
    /// The pending entry is gone once archiving starts; an archive failure is
    /// reported but the job is not restored.
    pub async fn confirm(
        &self,
        job_id: JobId,
        choice: usize,
        override_image: Option<Bytes>,
    ) -> Result<(), ReviewError> {
        let mut state = self.state.lock().await;
        let available = state.entry(job_id)?.results.len();
        if choice >= available {
            return Err(ReviewError::InvalidChoice {
                job_id,
                choice,
                available,
            });
        }
        let PendingEntry { job, mut results } = state
            .awaiting
            .remove(&job_id)
            .ok_or(ReviewError::NotFound(job_id))?;
        state.withdraw(job_id);

        if let Some(image) = override_image {
            results[choice] = image;
        }
        let result = results.swap_remove(choice);
        drop(results);

        let archived = self.archive(&job, &result).await;
        if let Err(e) = archived {
            metrics::counter!("review_archive_failures_total").increment(1);
            tracing::error!(job_id = %job_id, error = %e, "Archiving confirmed job failed");
            return Err(e.into());
        }

        state.push_carousel(
            CarouselEntry {
                result,
                original: job.original_image,
            },
            self.settings.carousel_size,
        );

        metrics::counter!("review_jobs_confirmed_total").increment(1);
        tracing::info!(job_id = %job_id, choice, "Job confirmed");
        Ok(())
    }

    async fn archive(&self, job: &Job, result: &[u8]) -> Result<(), StorageError> {
        self.storage
            .upload(
                &job.owner_ref,
                StorageKind::Normal,
                &job.original_image,
                &format!("{}_original.png", job.id),
            )
            .await?;
        self.storage
            .upload(
                &job.owner_ref,
                StorageKind::Xray,
                result,
                &format!("{}_result.png", job.id),
            )
            .await
    }

    /// Discard all results and queue the job again with a fresh quota.
    pub async fn retry(&self, job_id: JobId) -> Result<(), ReviewError> {
        let mut state = self.state.lock().await;
        let PendingEntry { mut job, .. } = state
            .awaiting
            .remove(&job_id)
            .ok_or(ReviewError::NotFound(job_id))?;
        state.withdraw(job_id);

        job.remaining_dispatches = self.settings.results_per_image;
        state.enqueue(job);

        metrics::counter!("review_jobs_retried_total").increment(1);
        tracing::info!(job_id = %job_id, "Job retried");
        Ok(())
    }

    /// Drop the job and everything attached to it.
    pub async fn cancel(&self, job_id: JobId) -> Result<(), ReviewError> {
        let mut state = self.state.lock().await;
        state
            .awaiting
            .remove(&job_id)
            .ok_or(ReviewError::NotFound(job_id))?;
        state.withdraw(job_id);

        metrics::counter!("review_jobs_cancelled_total").increment(1);
        tracing::info!(job_id = %job_id, "Job cancelled");
        Ok(())
    }

    /// Apply a reviewer decision.
    pub async fn resolve(
        &self,
        job_id: JobId,
        action: ConfirmAction,
        choice: usize,
        override_image: Option<Bytes>,
    ) -> Result<(), ReviewError> {
        match action {
            ConfirmAction::Confirm => self.confirm(job_id, choice, override_image).await,
            ConfirmAction::Retry => self.retry(job_id).await,
            ConfirmAction::Cancel => self.cancel(job_id).await,
        }
    }

    /// Snapshot of the carousel, most recent first.
    pub async fn list_carousel(&self) -> Vec<CarouselEntry> {
        let state = self.state.lock().await;
        state.carousel.iter().cloned().collect()
    }

    pub async fn carousel_image(&self, index: usize, side: CarouselSide) -> Option<Bytes> {
        let state = self.state.lock().await;
        let entry = state.carousel.get(index)?;
        Some(match side {
            CarouselSide::Xray => entry.result.clone(),
            CarouselSide::Original => entry.original.clone(),
        })
    }

    /// Jobs awaiting approval, ordered by id.
    pub async fn list_pending(&self) -> Vec<PendingSummary> {
        let state = self.state.lock().await;
        let mut pending: Vec<PendingSummary> = state
            .awaiting
            .values()
            .map(|entry| PendingSummary {
                job_id: entry.job.id,
                metadata: entry.job.metadata.clone(),
                result_count: entry.results.len(),
                remaining_dispatches: entry.job.remaining_dispatches,
                created_at: entry.job.created_at,
            })
            .collect();
        pending.sort_by_key(|p| p.job_id);
        pending
    }

    pub async fn result_image(
        &self,
        job_id: JobId,
        option: ResultOption,
    ) -> Result<Bytes, ReviewError> {
        let state = self.state.lock().await;
        let entry = state.entry(job_id)?;
        match option {
            ResultOption::Original => Ok(entry.job.original_image.clone()),
            ResultOption::Choice(choice) => {
                entry
                    .results
                    .get(choice)
                    .cloned()
                    .ok_or(ReviewError::InvalidChoice {
                        job_id,
                        choice,
                        available: entry.results.len(),
                    })
            }
        }
    }

    /// Number of jobs still eligible for dispatch.
    pub async fn queue_depth(&self) -> usize {
        self.state.lock().await.dispatch.len()
    }

    pub async fn awaiting_count(&self) -> usize {
        self.state.lock().await.awaiting.len()
    }

    pub async fn carousel_len(&self) -> usize {
        self.state.lock().await.carousel.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Invalid choice {choice} for job {job_id} ({available} results available)")]
    InvalidChoice {
        job_id: JobId,
        choice: usize,
        available: usize,
    },

    #[error(transparent)]
    Decode(#[from] ImagingError),

    #[error("Archive write failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Compositing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
