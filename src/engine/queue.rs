// Thread-safe render queue with reordering rules

use std::sync::Mutex;
use uuid::Uuid;

use crate::engine::job::{JobStatus, QueuedJob, RenderJob};

/// Ordered collection of queued jobs shared between the caller and the
/// queue processor. Every public operation is atomic under one mutex, and
/// reads hand out snapshots, never references into the list.
#[derive(Default)]
pub struct JobQueue {
    jobs: Mutex<Vec<QueuedJob>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job in Waiting state and return its id.
    pub fn add(&self, job: RenderJob) -> Uuid {
        let queued = QueuedJob::new(job);
        let id = queued.id;
        self.jobs.lock().unwrap().push(queued);
        id
    }

    /// Delete a job. Refused for unknown ids and for the running job.
    pub fn remove(&self, id: Uuid) -> bool {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.iter().position(|j| j.id == id) {
            Some(index) if jobs[index].status != JobStatus::Running => {
                jobs.remove(index);
                true
            }
            _ => false,
        }
    }

    /// Swap a waiting job with its predecessor. Refused for the first
    /// entry; only Waiting jobs are reorderable.
    pub fn move_up(&self, id: Uuid) -> bool {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.iter().position(|j| j.id == id) {
            Some(index) if index > 0 && jobs[index].status == JobStatus::Waiting => {
                jobs.swap(index, index - 1);
                true
            }
            _ => false,
        }
    }

    /// Swap a waiting job with its successor. Refused for the last entry;
    /// only Waiting jobs are reorderable.
    pub fn move_down(&self, id: Uuid) -> bool {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.iter().position(|j| j.id == id) {
            Some(index) if index + 1 < jobs.len() && jobs[index].status == JobStatus::Waiting => {
                jobs.swap(index, index + 1);
                true
            }
            _ => false,
        }
    }

    /// Set a job's status. False for unknown ids.
    pub fn update_status(&self, id: Uuid, status: JobStatus) -> bool {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.iter_mut().find(|j| j.id == id) {
            Some(job) => {
                job.status = status;
                true
            }
            None => false,
        }
    }

    /// Mark a job Failed and attach the error message in one step.
    pub fn record_failure(&self, id: Uuid, message: &str) -> bool {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.iter_mut().find(|j| j.id == id) {
            Some(job) => {
                job.status = JobStatus::Failed;
                job.error = Some(message.to_string());
                true
            }
            None => false,
        }
    }

    /// First Waiting job in current order, as a snapshot.
    pub fn get_next_waiting(&self) -> Option<QueuedJob> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.status == JobStatus::Waiting)
            .cloned()
    }

    pub fn has_waiting_jobs(&self) -> bool {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .any(|j| j.status == JobStatus::Waiting)
    }

    /// Drop every Completed job; Failed and Cancelled entries stay visible.
    pub fn clear_completed(&self) {
        self.jobs
            .lock()
            .unwrap()
            .retain(|j| j.status != JobStatus::Completed);
    }

    /// Copy of the whole queue. Mutations go through the other operations.
    pub fn get_all_jobs(&self) -> Vec<QueuedJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().unwrap().is_empty()
    }
}
