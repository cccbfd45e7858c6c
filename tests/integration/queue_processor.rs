// Queue processor sequencing, cancellation and failure isolation
//
// These tests inject a fake JobExecutor so no ffmpeg process is involved;
// the processor's observable behavior is the same either way.

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

use subrender::engine::{
    BuildState, JobExecutor, JobQueue, JobStatus, ProcessRunner, ProgressUpdate, QueueEvent,
    QueueProcessor, RenderJob, RenderOutcome, SubmitError,
};

use crate::common::helpers::fixture_job;

fn wiring(
    executor: Arc<dyn JobExecutor>,
) -> (
    QueueProcessor,
    Receiver<QueueEvent>,
    Arc<JobQueue>,
    Arc<AtomicBool>,
) {
    let queue = Arc::new(JobQueue::new());
    let runner = Arc::new(ProcessRunner::new());
    let cancel = Arc::new(AtomicBool::new(false));
    let (processor, events) =
        QueueProcessor::new(queue.clone(), executor, runner, cancel.clone());
    (processor, events, queue, cancel)
}

/// Collect events until QueueFinished; panics if the queue never finishes.
fn drain_until_finished(events: &Receiver<QueueEvent>) -> Vec<QueueEvent> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut collected = Vec::new();
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .expect("queue did not finish in time");
        let event = events.recv_timeout(remaining).expect("event stream closed");
        let finished = event == QueueEvent::QueueFinished;
        collected.push(event);
        if finished {
            return collected;
        }
    }
}

/// Completes every job after a short delay, recording execution order.
struct RecordingExecutor {
    log: Arc<Mutex<Vec<Uuid>>>,
    concurrent: Arc<AtomicBool>,
}

impl RecordingExecutor {
    fn new() -> (Self, Arc<Mutex<Vec<Uuid>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                log: log.clone(),
                concurrent: Arc::new(AtomicBool::new(false)),
            },
            log,
        )
    }
}

impl JobExecutor for RecordingExecutor {
    fn execute(
        &self,
        id: Uuid,
        _job: &mut RenderJob,
        on_progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<RenderOutcome> {
        assert!(
            !self.concurrent.swap(true, Ordering::SeqCst),
            "two jobs were executed simultaneously"
        );
        self.log.lock().unwrap().push(id);
        on_progress(ProgressUpdate {
            frame: 1,
            fps: 24,
            remaining: "00:00:01".to_string(),
        });
        thread::sleep(Duration::from_millis(20));
        self.concurrent.store(false, Ordering::SeqCst);
        Ok(RenderOutcome::Completed)
    }
}

/// Blocks until the shared cancel flag is raised, then reports Cancelled.
/// Falls through to Completed after a bounded wait so a broken test fails
/// fast instead of hanging.
struct BlockUntilCancel {
    cancel: Arc<AtomicBool>,
}

impl JobExecutor for BlockUntilCancel {
    fn execute(
        &self,
        _id: Uuid,
        _job: &mut RenderJob,
        _on_progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<RenderOutcome> {
        let deadline = Instant::now() + Duration::from_millis(500);
        while Instant::now() < deadline {
            if self.cancel.load(Ordering::SeqCst) {
                return Ok(RenderOutcome::Cancelled);
            }
            thread::sleep(Duration::from_millis(5));
        }
        Ok(RenderOutcome::Completed)
    }
}

/// Fails the job whose episode matches, completes everything else.
struct FailingExecutor {
    fail_episode: String,
}

impl JobExecutor for FailingExecutor {
    fn execute(
        &self,
        _id: Uuid,
        job: &mut RenderJob,
        _on_progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<RenderOutcome> {
        if job.episode == self.fail_episode {
            bail!("ffmpeg exited with exit status: 1");
        }
        Ok(RenderOutcome::Completed)
    }
}

#[test]
fn test_jobs_run_sequentially_in_fifo_order() {
    let (executor, log) = RecordingExecutor::new();
    let (processor, events, queue, _cancel) = wiring(Arc::new(executor));

    let a = fixture_job("Episode A", BuildState::SoftOnly);
    let b = fixture_job("Episode B", BuildState::SoftOnly);
    let id_a = processor.submit(a.job.clone()).unwrap();
    let id_b = processor.submit(b.job.clone()).unwrap();

    let worker = processor.start().unwrap();
    let collected = drain_until_finished(&events);
    worker.join().unwrap();

    // Execution order matches submission order.
    assert_eq!(*log.lock().unwrap(), vec![id_a, id_b]);

    // A's full lifecycle precedes B's start.
    let pos = |needle: &QueueEvent| collected.iter().position(|e| e == needle).unwrap();
    let started_a = pos(&QueueEvent::JobStarted { id: id_a });
    let completed_a = pos(&QueueEvent::JobCompleted { id: id_a });
    let started_b = pos(&QueueEvent::JobStarted { id: id_b });
    assert!(started_a < completed_a);
    assert!(completed_a < started_b);

    // Progress events were forwarded with the right id.
    assert!(collected.iter().any(|e| matches!(
        e,
        QueueEvent::JobProgress { id, frame: 1, .. } if *id == id_a
    )));

    let jobs = queue.get_all_jobs();
    assert!(jobs.iter().all(|j| j.status == JobStatus::Completed));
}

#[test]
fn test_cancel_pauses_queue_and_resume_continues() {
    // Wired by hand: the executor needs the same cancel flag the processor
    // gets, so the `wiring` helper doesn't fit here.
    let queue = Arc::new(JobQueue::new());
    let runner = Arc::new(ProcessRunner::new());
    let cancel = Arc::new(AtomicBool::new(false));
    let executor = Arc::new(BlockUntilCancel {
        cancel: cancel.clone(),
    });
    let (processor, events) =
        QueueProcessor::new(queue.clone(), executor, runner, cancel.clone());

    let a = fixture_job("Episode A", BuildState::SoftOnly);
    let b = fixture_job("Episode B", BuildState::SoftOnly);
    let id_a = processor.submit(a.job.clone()).unwrap();
    let id_b = processor.submit(b.job.clone()).unwrap();

    let worker = processor.start().unwrap();
    // Let A get picked up, then cancel it.
    thread::sleep(Duration::from_millis(50));
    processor.cancel_current_job();

    let collected = drain_until_finished(&events);
    worker.join().unwrap();

    // A cancelled, not failed; B untouched.
    assert!(collected.contains(&QueueEvent::JobCancelled { id: id_a }));
    assert!(!collected
        .iter()
        .any(|e| matches!(e, QueueEvent::JobFailed { .. })));
    assert!(!collected.contains(&QueueEvent::JobStarted { id: id_b }));

    let jobs = queue.get_all_jobs();
    assert_eq!(jobs[0].status, JobStatus::Cancelled);
    assert!(jobs[0].error.is_none(), "cancellation carries no error");
    assert_eq!(jobs[1].status, JobStatus::Waiting);

    // After resume, a new run picks B up; the executor times out into
    // Completed since nobody cancels again.
    processor.resume();
    let worker = processor.start().unwrap();
    let collected = drain_until_finished(&events);
    worker.join().unwrap();

    assert!(collected.contains(&QueueEvent::JobStarted { id: id_b }));
    assert!(collected.contains(&QueueEvent::JobCompleted { id: id_b }));
    assert_eq!(queue.get_all_jobs()[1].status, JobStatus::Completed);
}

#[test]
fn test_failure_is_isolated_and_carries_message() {
    let executor = Arc::new(FailingExecutor {
        fail_episode: "Episode A".to_string(),
    });
    let (processor, events, queue, _cancel) = wiring(executor);

    let a = fixture_job("Episode A", BuildState::SoftOnly);
    let b = fixture_job("Episode B", BuildState::SoftOnly);
    let id_a = processor.submit(a.job.clone()).unwrap();
    let id_b = processor.submit(b.job.clone()).unwrap();

    let worker = processor.start().unwrap();
    let collected = drain_until_finished(&events);
    worker.join().unwrap();

    assert!(collected.iter().any(|e| matches!(
        e,
        QueueEvent::JobFailed { id, error } if *id == id_a && error.contains("exit status")
    )));
    assert!(collected.contains(&QueueEvent::JobCompleted { id: id_b }));

    let jobs = queue.get_all_jobs();
    assert_eq!(jobs[0].status, JobStatus::Failed);
    assert!(jobs[0].error.as_deref().unwrap().contains("exit status"));
    assert_eq!(jobs[1].status, JobStatus::Completed);
}

#[test]
fn test_submit_rejects_invalid_jobs_with_full_problem_list() {
    let (executor, _) = RecordingExecutor::new();
    let (processor, _events, queue, _cancel) = wiring(Arc::new(executor));

    let mut fixture = fixture_job("Episode A", BuildState::SoftOnly);
    fixture.job.paths.raw = "/nonexistent/raw.mkv".into();
    fixture.job.paths.sub = Some("/nonexistent/subs.ass".into());
    fixture.job.episode = "bad/name".to_string();

    match processor.submit(fixture.job) {
        Err(SubmitError::Invalid(problems)) => {
            assert_eq!(problems.len(), 3, "all problems reported: {problems:?}");
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert!(queue.is_empty(), "rejected jobs never enter the queue");
}

#[test]
fn test_processor_is_not_reentrant() {
    let (executor, _) = RecordingExecutor::new();
    let (processor, events, _queue, _cancel) = wiring(Arc::new(executor));

    let a = fixture_job("Episode A", BuildState::SoftOnly);
    processor.submit(a.job.clone()).unwrap();

    let worker = processor.start().unwrap();
    assert!(processor.start().is_err(), "second start while running must fail");

    drain_until_finished(&events);
    worker.join().unwrap();

    // Once drained, the processor may be started again.
    let worker = processor.start().unwrap();
    drain_until_finished(&events);
    worker.join().unwrap();
}
