//! Job tracking for background warm-up runs.
//!
//! Every cache warm-up the supervisor performs is recorded here with its
//! progress log, so the serving layer can show what the background worker did
//! and why a run failed.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// A single log entry with timestamp and message.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// What a background job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Precompute the opportunity scan of every active location
    OpportunityWarmup,
    /// Precompute heatmap chunks of every active location
    HeatmapWarmup,
}

/// Job status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Job metadata and logs.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Job {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub logs: Vec<LogEntry>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Summary of the run (e.g. number of chunks computed)
    pub result: Option<serde_json::Value>,
}

/// In-memory job tracker.
#[derive(Clone)]
pub struct JobTracker {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
    /// Finished jobs kept before the oldest are pruned
    retain_finished: usize,
}

impl JobTracker {
    /// Create a new job tracker keeping the last 100 finished jobs.
    pub fn new() -> Self {
        Self::with_retention(100)
    }

    pub fn with_retention(retain_finished: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            retain_finished,
        }
    }

    /// Create a new running job and return its ID.
    pub fn create_job(&self, kind: JobKind) -> String {
        let job_id = Uuid::new_v4().to_string();
        let job = Job {
            job_id: job_id.clone(),
            kind,
            status: JobStatus::Running,
            logs: vec![],
            created_at: chrono::Utc::now(),
            completed_at: None,
            result: None,
        };
        self.jobs.write().insert(job_id.clone(), job);
        job_id
    }

    /// Add a log entry to a job.
    pub fn log(&self, job_id: &str, level: LogLevel, message: impl Into<String>) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(job_id) {
            job.logs.push(LogEntry {
                timestamp: chrono::Utc::now(),
                level,
                message: message.into(),
            });
        }
    }

    /// Mark a job as completed with optional result.
    pub fn complete_job(&self, job_id: &str, result: Option<serde_json::Value>) {
        self.finish(job_id, JobStatus::Completed, |job| job.result = result);
    }

    /// Mark a job as failed.
    pub fn fail_job(&self, job_id: &str, error_message: impl Into<String>) {
        let message = error_message.into();
        self.finish(job_id, JobStatus::Failed, |job| {
            job.logs.push(LogEntry {
                timestamp: chrono::Utc::now(),
                level: LogLevel::Error,
                message,
            })
        });
    }

    /// Mark a job as cancelled by shutdown.
    pub fn cancel_job(&self, job_id: &str) {
        self.finish(job_id, JobStatus::Cancelled, |job| {
            job.logs.push(LogEntry {
                timestamp: chrono::Utc::now(),
                level: LogLevel::Warning,
                message: "cancelled by shutdown".to_string(),
            })
        });
    }

    fn finish<F: FnOnce(&mut Job)>(&self, job_id: &str, status: JobStatus, update: F) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(job_id) {
            job.status = status;
            job.completed_at = Some(chrono::Utc::now());
            update(job);
        }
        Self::prune(&mut jobs, self.retain_finished);
    }

    fn prune(jobs: &mut HashMap<String, Job>, retain: usize) {
        let mut finished: Vec<(chrono::DateTime<chrono::Utc>, String)> = jobs
            .values()
            .filter_map(|job| job.completed_at.map(|at| (at, job.job_id.clone())))
            .collect();
        if finished.len() <= retain {
            return;
        }
        finished.sort();
        let excess = finished.len() - retain;
        for (_, job_id) in finished.into_iter().take(excess) {
            jobs.remove(&job_id);
        }
    }

    /// Get a job by ID.
    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().get(job_id).cloned()
    }

    /// Get all logs for a job.
    pub fn get_logs(&self, job_id: &str) -> Vec<LogEntry> {
        self.jobs
            .read()
            .get(job_id)
            .map(|job| job.logs.clone())
            .unwrap_or_default()
    }

    /// All tracked jobs, newest first.
    pub fn list_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Jobs still running.
    pub fn running_jobs(&self) -> Vec<Job> {
        self.jobs
            .read()
            .values()
            .filter(|job| job.status == JobStatus::Running)
            .cloned()
            .collect()
    }
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new()
    }
}
