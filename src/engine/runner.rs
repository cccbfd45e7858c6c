// Child process lifecycle: spawn, line streaming, targeted termination

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long a terminated child gets to exit before the forced kill.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Lines of child output kept for error reporting.
const OUTPUT_TAIL_LINES: usize = 40;

const WAIT_POLL: Duration = Duration::from_millis(50);

#[derive(Clone)]
struct ActiveChild {
    pid: u32,
    child: Arc<Mutex<Child>>,
}

/// A spawned child with its output converted to a line stream.
///
/// stdout and stderr feed one merged channel: ffmpeg writes its stats lines
/// to stderr, and callers only care about lines, not which pipe carried
/// them. The last lines are retained for failure messages.
pub struct ProcessHandle {
    pid: u32,
    child: Arc<Mutex<Child>>,
    lines: Receiver<String>,
    tail: Arc<Mutex<VecDeque<String>>>,
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Blocking stream of output lines; ends when the child closes both
    /// pipes.
    pub fn lines(&self) -> &Receiver<String> {
        &self.lines
    }

    /// Wait for the child to exit. Polls so that a concurrent
    /// `kill_active` can take the child lock in between.
    pub fn wait(&self) -> Result<ExitStatus> {
        loop {
            let status = self
                .child
                .lock()
                .unwrap()
                .try_wait()
                .context("failed to wait for child process")?;
            if let Some(status) = status {
                return Ok(status);
            }
            thread::sleep(WAIT_POLL);
        }
    }

    /// The last output lines, joined, for error reporting.
    pub fn output_tail(&self) -> String {
        let tail = self.tail.lock().unwrap();
        tail.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

/// Spawns children directly from an argument vector — no shell is ever
/// involved — and tracks the single most-recently-started process so that
/// `kill_active` targets exactly the process this runner started.
#[derive(Default)]
pub struct ProcessRunner {
    active: Mutex<Option<ActiveChild>>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&self, tool: &str, args: &[String], cwd: Option<&Path>) -> Result<ProcessHandle> {
        let mut cmd = Command::new(tool);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn {tool}"))?;
        let pid = child.id();
        debug!(pid, tool, "spawned child process");

        let (tx, rx) = mpsc::channel();
        let tail = Arc::new(Mutex::new(VecDeque::with_capacity(OUTPUT_TAIL_LINES)));

        let stdout = child.stdout.take().context("failed to capture stdout")?;
        let stderr = child.stderr.take().context("failed to capture stderr")?;
        spawn_reader(stdout, tx.clone(), tail.clone());
        spawn_reader(stderr, tx, tail.clone());

        let child = Arc::new(Mutex::new(child));
        *self.active.lock().unwrap() = Some(ActiveChild {
            pid,
            child: child.clone(),
        });

        Ok(ProcessHandle {
            pid,
            child,
            lines: rx,
            tail,
        })
    }

    /// Forget the active process. Called after a child has been waited on.
    pub fn clear_active(&self) {
        *self.active.lock().unwrap() = None;
    }

    /// Terminate the process this runner most recently started, if any:
    /// graceful signal first, forced kill after the grace period.
    pub fn kill_active(&self) {
        let Some(active) = self.active.lock().unwrap().clone() else {
            return;
        };
        debug!(pid = active.pid, "terminating active child");
        terminate(&active);

        let deadline = Instant::now() + TERMINATE_GRACE;
        loop {
            match active.child.lock().unwrap().try_wait() {
                Ok(Some(_)) | Err(_) => break,
                Ok(None) => {}
            }
            if Instant::now() >= deadline {
                warn!(pid = active.pid, "grace period expired, killing child");
                let mut child = active.child.lock().unwrap();
                let _ = child.kill();
                let _ = child.wait();
                break;
            }
            thread::sleep(WAIT_POLL);
        }
        self.clear_active();
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    pipe: R,
    tx: Sender<String>,
    tail: Arc<Mutex<VecDeque<String>>>,
) {
    thread::spawn(move || {
        let reader = BufReader::new(pipe);
        for line in reader.lines().map_while(std::io::Result::ok) {
            {
                let mut tail = tail.lock().unwrap();
                if tail.len() == OUTPUT_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line.clone());
            }
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}

#[cfg(unix)]
fn terminate(active: &ActiveChild) {
    // SAFETY: plain signal send to a pid we spawned and still hold.
    unsafe {
        libc::kill(active.pid as i32, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn terminate(active: &ActiveChild) {
    let _ = active.child.lock().unwrap().kill();
}
