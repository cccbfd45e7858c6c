// Per-job render orchestration: probe, parameter math, per-flavor encodes

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::ffmpeg_cmd::{build_repair_args, format_args_for_display, FfmpegOptions};
use crate::engine::job::RenderJob;
use crate::engine::params::{calculate, estimated_size_gb};
use crate::engine::probe;
use crate::engine::runner::ProcessRunner;

/// ffmpeg's per-second stats line, e.g. `frame=  512 fps= 23 q=18.0 ...`.
static FRAME_PROGRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"frame=\s*(\d+)\s+fps=\s*(\d+)").expect("progress pattern"));

/// How a finished render ended. Failures are errors, not outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub frame: u64,
    pub fps: u64,
    /// Estimated remaining encode time as `HH:MM:SS`.
    pub remaining: String,
}

/// Drives one job through probe → calculate → per-flavor encodes → cleanup.
///
/// Shares the process runner and the cooperative cancel flag with the queue
/// processor: cancellation is observed between branches and on every output
/// line, and the processor additionally terminates the in-flight child.
pub struct RenderPipeline {
    config: Config,
    runner: Arc<ProcessRunner>,
    cancel: Arc<AtomicBool>,
}

impl RenderPipeline {
    pub fn new(config: Config, runner: Arc<ProcessRunner>, cancel: Arc<AtomicBool>) -> Self {
        Self {
            config,
            runner,
            cancel,
        }
    }

    /// Render every output flavor the job's build state asks for.
    ///
    /// Temp subtitle copies are removed afterwards no matter how the render
    /// ended; a failed branch aborts the remaining ones.
    pub fn render<F>(&self, job: &mut RenderJob, mut on_progress: F) -> Result<RenderOutcome>
    where
        F: FnMut(ProgressUpdate),
    {
        let mut temp_subs = Vec::new();
        let result = self.render_inner(job, &mut temp_subs, &mut on_progress);
        cleanup_temp_subs(&temp_subs);
        result
    }

    fn render_inner(
        &self,
        job: &mut RenderJob,
        temp_subs: &mut Vec<PathBuf>,
        on_progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<RenderOutcome> {
        if job.build.is_repair() {
            return self.run_repair(job, on_progress);
        }

        let probe_info = probe::probe_file(self.config.ffmpeg_binary(), &job.paths.raw)?;
        info!(
            episode = %job.episode,
            duration = probe_info.duration_seconds,
            resolution = %probe_info.resolution,
            "probe complete"
        );

        let size_gb = estimated_size_gb(&job.paths.raw)?;
        let params = calculate(
            size_gb,
            &probe_info.resolution,
            probe_info.duration_seconds,
            job.potato,
        );
        job.probe = Some(probe_info);
        job.params = Some(params.clone());

        if job.build.wants_softsub() {
            if self.cancelled() {
                return Ok(RenderOutcome::Cancelled);
            }
            let options = FfmpegOptions::softsub(job, &params, &self.config);
            if self.encode(job, &options, on_progress)? == RenderOutcome::Cancelled {
                return Ok(RenderOutcome::Cancelled);
            }
        }

        if job.build.wants_hardsub() {
            if self.cancelled() {
                return Ok(RenderOutcome::Cancelled);
            }
            let burn_sub = self.burnable_subtitle(job, temp_subs)?;
            let options = FfmpegOptions::hardsub(job, &params, &self.config, burn_sub, true);
            if self.encode(job, &options, on_progress)? == RenderOutcome::Cancelled {
                return Ok(RenderOutcome::Cancelled);
            }
        }

        if job.build.is_for_hardsubbers() {
            if self.cancelled() {
                return Ok(RenderOutcome::Cancelled);
            }
            let burn_sub = self.burnable_subtitle(job, temp_subs)?;
            let options = FfmpegOptions::hardsub(job, &params, &self.config, burn_sub, false);
            if self.encode(job, &options, on_progress)? == RenderOutcome::Cancelled {
                return Ok(RenderOutcome::Cancelled);
            }
        }

        Ok(RenderOutcome::Completed)
    }

    fn run_repair(
        &self,
        job: &RenderJob,
        on_progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<RenderOutcome> {
        if self.cancelled() {
            return Ok(RenderOutcome::Cancelled);
        }
        let output = job.paths.softsub_output.clone();
        let args = build_repair_args(&job.paths.raw, &output);
        ensure_parent_dir(&output)?;
        self.run_encode(job, &args, on_progress)
    }

    fn encode(
        &self,
        job: &RenderJob,
        options: &FfmpegOptions,
        on_progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<RenderOutcome> {
        ensure_parent_dir(&options.output)?;
        self.run_encode(job, &options.build_args(), on_progress)
    }

    fn run_encode(
        &self,
        job: &RenderJob,
        args: &[String],
        on_progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<RenderOutcome> {
        let ffmpeg = self.config.ffmpeg_binary();
        debug!(cmd = %format_args_for_display(ffmpeg, args), "starting encode");

        let handle = self
            .runner
            .run(ffmpeg, args, None)
            .with_context(|| format!("failed to start encode for {}", job.episode))?;

        let total_frames = job.probe.as_ref().map(|p| p.total_frames).unwrap_or(0.0);
        for line in handle.lines() {
            if self.cancelled() {
                break;
            }
            if let Some(update) = parse_progress_line(&line, total_frames) {
                on_progress(update);
            }
        }

        let status = handle.wait()?;
        self.runner.clear_active();

        if self.cancelled() {
            return Ok(RenderOutcome::Cancelled);
        }
        if !status.success() {
            bail!(
                "ffmpeg exited with {status} for {}: {}",
                job.episode,
                handle.output_tail()
            );
        }
        Ok(RenderOutcome::Completed)
    }

    /// Subtitle path safe to reference from a burn-in filter. Bracketed
    /// filenames are copied to the temp dir with the brackets stripped; the
    /// copy is tracked for post-job cleanup.
    fn burnable_subtitle(
        &self,
        job: &RenderJob,
        temp_subs: &mut Vec<PathBuf>,
    ) -> Result<Option<PathBuf>> {
        let Some(sub) = &job.paths.sub else {
            return Ok(None);
        };
        let name = sub
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if !name.contains('[') && !name.contains(']') {
            return Ok(Some(sub.clone()));
        }

        let cleaned: String = name.chars().filter(|c| *c != '[' && *c != ']').collect();
        let temp_dir = self.config.temp_dir();
        fs::create_dir_all(&temp_dir)
            .with_context(|| format!("failed to create temp dir {}", temp_dir.display()))?;
        let dest = temp_dir.join(cleaned);
        fs::copy(sub, &dest).with_context(|| {
            format!("failed to copy subtitle {} for burn-in", sub.display())
        })?;
        temp_subs.push(dest.clone());
        Ok(Some(dest))
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

fn parse_progress_line(line: &str, total_frames: f64) -> Option<ProgressUpdate> {
    let caps = FRAME_PROGRESS.captures(line)?;
    let frame: u64 = caps[1].parse().ok()?;
    let fps: u64 = caps[2].parse().ok()?;

    let remaining_frames = (total_frames - frame as f64).max(0.0);
    let remaining_seconds = remaining_frames / (fps as f64).ceil().max(1.0);
    Some(ProgressUpdate {
        frame,
        fps,
        remaining: format_remaining(remaining_seconds),
    })
}

/// `HH:MM:SS` rendering of a remaining-time estimate.
pub fn format_remaining(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create output directory {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Best-effort removal of sanitized subtitle copies; failure never changes
/// the job's outcome.
fn cleanup_temp_subs(paths: &[PathBuf]) {
    for path in paths {
        if let Err(err) = fs::remove_file(path) {
            warn!(path = %path.display(), %err, "failed to remove temp subtitle copy");
        }
    }
}
