/*!
 * Translation progress registry and the global translation gate.
 *
 * This is the concurrency core of the proxy: every translation job, whether
 * interactive, embedded, or batch, must hold the single gate slot while it
 * talks to the LLM. Waiting jobs are visible to the dashboard as PENDING
 * with their queue position; the gate's FIFO ordering guarantees admission
 * order equals release order.
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};

/// Lifecycle state of a translation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    /// Holds the gate and is translating
    Active,
    /// Waiting for the gate
    Pending,
}

/// One tracked translation job
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationJob {
    pub fingerprint: String,
    pub file_name: String,
    pub total_cues: usize,
    pub completed_cues: usize,
    pub started_at: DateTime<Utc>,
    pub status: JobStatus,
    /// 0 for the active job, 1-based position for pending jobs
    pub queue_position: usize,
    pub progress_percent: u32,
    pub elapsed_seconds: i64,
}

#[derive(Default)]
struct RegistryState {
    jobs: HashMap<String, TranslationJob>,
    pending: Vec<String>,
}

/// In-memory registry of active and pending translation jobs plus the
/// process-wide single-slot translation gate.
pub struct ProgressRegistry {
    state: StdMutex<RegistryState>,
    gate: Arc<TokioMutex<()>>,
}

impl ProgressRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(ProgressRegistry {
            state: StdMutex::new(RegistryState::default()),
            gate: Arc::new(TokioMutex::new(())),
        })
    }

    /// Register a job and block until it holds the translation gate.
    ///
    /// A submission that finds the gate free goes ACTIVE directly; otherwise
    /// the job is visible as PENDING with its queue position until the fair
    /// lock admits it. The returned permit releases the gate and removes the
    /// job when dropped, so cleanup happens on every exit path.
    pub async fn begin(
        self: &Arc<Self>,
        fingerprint: &str,
        file_name: &str,
        total_cues: usize,
    ) -> TranslationPermit {
        if let Ok(slot) = self.gate.clone().try_lock_owned() {
            self.insert_job(fingerprint, file_name, total_cues, JobStatus::Active);
            info!("Started translation: {} ({})", file_name, fingerprint);
            return TranslationPermit {
                registry: Arc::clone(self),
                fingerprint: fingerprint.to_string(),
                _slot: slot,
            };
        }

        {
            let mut state = self.state.lock().unwrap();
            if !state.pending.iter().any(|fp| fp == fingerprint) {
                state.pending.push(fingerprint.to_string());
            }
            let position = state.pending.len();
            state.jobs.insert(
                fingerprint.to_string(),
                TranslationJob {
                    fingerprint: fingerprint.to_string(),
                    file_name: file_name.to_string(),
                    total_cues,
                    completed_cues: 0,
                    started_at: Utc::now(),
                    status: JobStatus::Pending,
                    queue_position: position,
                    progress_percent: 0,
                    elapsed_seconds: 0,
                },
            );
            info!(
                "Queued translation: {} ({}) - position {} in queue",
                file_name, fingerprint, position
            );
        }

        let slot = self.gate.clone().lock_owned().await;

        {
            let mut state = self.state.lock().unwrap();
            state.pending.retain(|fp| fp != fingerprint);
            if let Some(job) = state.jobs.get_mut(fingerprint) {
                job.status = JobStatus::Active;
                job.queue_position = 0;
                job.started_at = Utc::now();
            }
        }
        info!("Started translation (after wait): {} ({})", file_name, fingerprint);

        TranslationPermit {
            registry: Arc::clone(self),
            fingerprint: fingerprint.to_string(),
            _slot: slot,
        }
    }

    /// Advance the reported progress of a job.
    pub fn update(&self, fingerprint: &str, completed_cues: usize) {
        let mut state = self.state.lock().unwrap();
        if let Some(job) = state.jobs.get_mut(fingerprint) {
            job.completed_cues = completed_cues;
        }
    }

    /// Point-in-time copy of all jobs: the active one first, then pending
    /// jobs in queue order.
    pub fn snapshot(&self) -> Vec<TranslationJob> {
        let state = self.state.lock().unwrap();
        let now = Utc::now();
        let mut jobs: Vec<TranslationJob> = state
            .jobs
            .values()
            .map(|job| {
                let mut job = job.clone();
                job.queue_position = match job.status {
                    JobStatus::Active => 0,
                    JobStatus::Pending => state
                        .pending
                        .iter()
                        .position(|fp| *fp == job.fingerprint)
                        .map(|i| i + 1)
                        .unwrap_or(0),
                };
                job.progress_percent = if job.total_cues == 0 {
                    0
                } else {
                    ((job.completed_cues * 100) / job.total_cues) as u32
                };
                job.elapsed_seconds = (now - job.started_at).num_seconds().max(0);
                job
            })
            .collect();
        jobs.sort_by_key(|job| job.queue_position);
        jobs
    }

    /// Whether any job currently holds the gate.
    pub fn has_active(&self) -> bool {
        let state = self.state.lock().unwrap();
        state
            .jobs
            .values()
            .any(|job| job.status == JobStatus::Active)
    }

    fn insert_job(&self, fingerprint: &str, file_name: &str, total_cues: usize, status: JobStatus) {
        let mut state = self.state.lock().unwrap();
        state.jobs.insert(
            fingerprint.to_string(),
            TranslationJob {
                fingerprint: fingerprint.to_string(),
                file_name: file_name.to_string(),
                total_cues,
                completed_cues: 0,
                started_at: Utc::now(),
                status,
                queue_position: 0,
                progress_percent: 0,
                elapsed_seconds: 0,
            },
        );
    }

    fn finish(&self, fingerprint: &str) {
        let mut state = self.state.lock().unwrap();
        state.jobs.remove(fingerprint);
        state.pending.retain(|fp| fp != fingerprint);
        info!("Completed translation: {}", fingerprint);
    }
}

/// RAII handle for a job's slot at the translation gate. Dropping it removes
/// the job from the registry and releases the gate, which makes completion
/// idempotent and safe on failure paths.
pub struct TranslationPermit {
    registry: Arc<ProgressRegistry>,
    fingerprint: String,
    _slot: OwnedMutexGuard<()>,
}

impl TranslationPermit {
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl Drop for TranslationPermit {
    fn drop(&mut self) {
        self.registry.finish(&self.fingerprint);
    }
}
