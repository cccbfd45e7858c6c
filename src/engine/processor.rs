// Sequential queue worker: one render job in flight at a time

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::job::{JobStatus, RenderJob, SubmitError};
use crate::engine::pipeline::{ProgressUpdate, RenderOutcome, RenderPipeline};
use crate::engine::queue::JobQueue;
use crate::engine::runner::ProcessRunner;

/// Lifecycle events reported to the collaborator while the queue drains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    JobStarted {
        id: Uuid,
    },
    JobProgress {
        id: Uuid,
        frame: u64,
        fps: u64,
        remaining: String,
    },
    JobCompleted {
        id: Uuid,
    },
    JobFailed {
        id: Uuid,
        error: String,
    },
    JobCancelled {
        id: Uuid,
    },
    QueueFinished,
}

/// The seam between the processor and the render pipeline, so processor
/// behavior is testable without spawning ffmpeg.
pub trait JobExecutor: Send + Sync + 'static {
    fn execute(
        &self,
        id: Uuid,
        job: &mut RenderJob,
        on_progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<RenderOutcome>;
}

impl JobExecutor for RenderPipeline {
    fn execute(
        &self,
        _id: Uuid,
        job: &mut RenderJob,
        on_progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<RenderOutcome> {
        self.render(job, on_progress)
    }
}

/// Drains the queue on a single worker thread, one job at a time — the
/// transcoder already saturates the machine, so there is deliberately no
/// job-level parallelism.
pub struct QueueProcessor {
    queue: Arc<JobQueue>,
    executor: Arc<dyn JobExecutor>,
    runner: Arc<ProcessRunner>,
    cancel: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    tx: Sender<QueueEvent>,
}

impl QueueProcessor {
    /// Build a processor and the receiving end of its event stream.
    pub fn new(
        queue: Arc<JobQueue>,
        executor: Arc<dyn JobExecutor>,
        runner: Arc<ProcessRunner>,
        cancel: Arc<AtomicBool>,
    ) -> (Self, Receiver<QueueEvent>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                queue,
                executor,
                runner,
                cancel,
                stop: Arc::new(AtomicBool::new(false)),
                running: Arc::new(AtomicBool::new(false)),
                tx,
            },
            rx,
        )
    }

    /// Validate a job and admit it to the queue.
    pub fn submit(&self, job: RenderJob) -> Result<Uuid, SubmitError> {
        let problems = job.validate();
        if !problems.is_empty() {
            return Err(SubmitError::Invalid(problems));
        }
        Ok(self.queue.add(job))
    }

    /// Start the worker thread. Not re-entrant: a second call while the
    /// loop is running is an error.
    pub fn start(&self) -> Result<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            bail!("queue processor is already running");
        }
        self.stop.store(false, Ordering::SeqCst);

        let queue = self.queue.clone();
        let executor = self.executor.clone();
        let cancel = self.cancel.clone();
        let stop = self.stop.clone();
        let running = self.running.clone();
        let tx = self.tx.clone();

        Ok(std::thread::spawn(move || {
            run_loop(&queue, executor.as_ref(), &cancel, &stop, &tx);
            running.store(false, Ordering::SeqCst);
        }))
    }

    /// Cooperatively cancel the job in flight: raise the flag the pipeline
    /// checks at its suspension points, then terminate the active child so
    /// a blocking read wakes up.
    pub fn cancel_current_job(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        self.runner.kill_active();
    }

    /// Clear the cancellation flag for the next run.
    pub fn resume(&self) {
        self.cancel.store(false, Ordering::SeqCst);
    }

    /// Ask the worker loop to stop after the current job.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Remove a job that is not running. False when refused.
    pub fn remove(&self, id: Uuid) -> bool {
        self.queue.remove(id)
    }

    /// Move a waiting job one position toward the front.
    pub fn move_up(&self, id: Uuid) -> bool {
        self.queue.move_up(id)
    }

    /// Move a waiting job one position toward the back.
    pub fn move_down(&self, id: Uuid) -> bool {
        self.queue.move_down(id)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

fn run_loop(
    queue: &JobQueue,
    executor: &dyn JobExecutor,
    cancel: &AtomicBool,
    stop: &AtomicBool,
    tx: &Sender<QueueEvent>,
) {
    while !stop.load(Ordering::SeqCst) && queue.has_waiting_jobs() {
        let Some(queued) = queue.get_next_waiting() else {
            break;
        };
        let id = queued.id;
        queue.update_status(id, JobStatus::Running);
        let _ = tx.send(QueueEvent::JobStarted { id });
        info!(%id, episode = %queued.job.episode, "job started");

        // The pipeline owns this clone's runtime state while it runs; the
        // queue keeps only status and error.
        let mut job = queued.job;
        let progress_tx = tx.clone();
        let result = executor.execute(id, &mut job, &mut |update: ProgressUpdate| {
            let _ = progress_tx.send(QueueEvent::JobProgress {
                id,
                frame: update.frame,
                fps: update.fps,
                remaining: update.remaining,
            });
        });

        match result {
            Ok(RenderOutcome::Completed) => {
                queue.update_status(id, JobStatus::Completed);
                let _ = tx.send(QueueEvent::JobCompleted { id });
                info!(%id, "job completed");
            }
            Ok(RenderOutcome::Cancelled) => {
                queue.update_status(id, JobStatus::Cancelled);
                let _ = tx.send(QueueEvent::JobCancelled { id });
                info!(%id, "job cancelled");
            }
            Err(err) => {
                if cancel.load(Ordering::SeqCst) {
                    // A killed child reports a failure exit; under an active
                    // cancel request that is a cancellation, not an error.
                    queue.update_status(id, JobStatus::Cancelled);
                    let _ = tx.send(QueueEvent::JobCancelled { id });
                    info!(%id, "job cancelled");
                } else {
                    let message = format!("{err:#}");
                    warn!(%id, error = %message, "job failed");
                    queue.record_failure(id, &message);
                    let _ = tx.send(QueueEvent::JobFailed { id, error: message });
                }
            }
        }

        // A cancellation pauses the queue; remaining jobs stay Waiting
        // until the caller resumes and restarts the processor.
        if cancel.load(Ordering::SeqCst) {
            break;
        }
    }

    let _ = tx.send(QueueEvent::QueueFinished);
}
