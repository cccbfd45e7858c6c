// Command handlers wiring the CLI to the render engine

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::cli::{BuildMode, Cli, Commands, JobArgs};
use crate::config::Config;
use crate::engine::ffmpeg_cmd::{build_repair_args, format_args_for_display, FfmpegOptions};
use crate::engine::job::{BuildState, LogoState, NvencState, RenderJob, RenderPaths};
use crate::engine::params::{calculate, estimated_size_gb};
use crate::engine::pipeline::RenderPipeline;
use crate::engine::probe::{self, VideoProbeInfo};
use crate::engine::processor::{QueueEvent, QueueProcessor};
use crate::engine::queue::JobQueue;
use crate::engine::runner::ProcessRunner;
use crate::engine::{hardware, scan};

pub fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    match cli.command {
        Commands::CheckFfmpeg => cmd_check_ffmpeg(&config),
        Commands::Probe { file, json } => cmd_probe(&config, &file, json),
        Commands::Scan { directory } => cmd_scan(directory),
        Commands::DryRun { job } => cmd_dry_run(&config, &job),
        Commands::Render { job } => cmd_render(config, &job),
        Commands::InitConfig => cmd_init_config(),
    }
}

fn cmd_check_ffmpeg(config: &Config) -> Result<()> {
    let ffmpeg = config.ffmpeg_binary();
    match hardware::ffmpeg_version(ffmpeg) {
        Some(version) => println!("{version}"),
        None => bail!("{ffmpeg} is not runnable; install ffmpeg or set tools.ffmpeg"),
    }
    println!(
        "NVENC encoders: {}",
        if hardware::nvenc_available(ffmpeg) {
            "available"
        } else {
            "not available"
        }
    );
    if hardware::potato_recommended() {
        println!("This host looks resource-constrained; consider --potato.");
    }
    Ok(())
}

fn cmd_probe(config: &Config, file: &Path, json: bool) -> Result<()> {
    let info = probe::probe_file(config.ffmpeg_binary(), file)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("Duration:     {:.2}s", info.duration_seconds);
        println!("Total frames: {:.0}", info.total_frames);
        println!("Resolution:   {}", info.resolution);
        println!("Pixel format: {}", info.pixel_format);
        println!("Profile:      {}", info.video_profile);
    }
    Ok(())
}

fn cmd_scan(directory: Option<PathBuf>) -> Result<()> {
    let root = directory.unwrap_or_else(|| PathBuf::from("."));
    let found = scan::scan(&root);
    for path in &found {
        println!("{}", path.display());
    }
    println!("{} raw candidate(s)", found.len());
    Ok(())
}

fn cmd_dry_run(config: &Config, args: &JobArgs) -> Result<()> {
    let ffmpeg = config.ffmpeg_binary();
    for job in build_jobs(config, args)? {
        // Best-effort probe: a dry run should still print something useful
        // for files ffmpeg cannot read yet.
        let info = probe::probe_file(ffmpeg, &job.paths.raw).unwrap_or_else(|_| VideoProbeInfo::default());
        let size_gb = estimated_size_gb(&job.paths.raw).unwrap_or(0.0);
        let params = calculate(size_gb, &info.resolution, info.duration_seconds, job.potato);

        println!("# {}", job.episode);
        if job.build.is_repair() {
            let repair_args = build_repair_args(&job.paths.raw, &job.paths.softsub_output);
            println!("{}", format_args_for_display(ffmpeg, &repair_args));
            continue;
        }
        if job.build.wants_softsub() {
            let options = FfmpegOptions::softsub(&job, &params, config);
            println!("{}", format_args_for_display(ffmpeg, &options.build_args()));
        }
        if job.build.wants_hardsub() {
            let options =
                FfmpegOptions::hardsub(&job, &params, config, job.paths.sub.clone(), true);
            println!("{}", format_args_for_display(ffmpeg, &options.build_args()));
        }
        if job.build.is_for_hardsubbers() {
            let options =
                FfmpegOptions::hardsub(&job, &params, config, job.paths.sub.clone(), false);
            println!("{}", format_args_for_display(ffmpeg, &options.build_args()));
        }
    }
    Ok(())
}

fn cmd_render(config: Config, args: &JobArgs) -> Result<()> {
    let jobs = build_jobs(&config, args)?;

    let runner = Arc::new(ProcessRunner::new());
    let cancel = Arc::new(AtomicBool::new(false));
    let pipeline = RenderPipeline::new(config, runner.clone(), cancel.clone());
    let queue = Arc::new(JobQueue::new());
    let (processor, events) = QueueProcessor::new(queue.clone(), Arc::new(pipeline), runner, cancel);

    let mut episodes = HashMap::new();
    for job in jobs {
        let episode = job.episode.clone();
        match processor.submit(job) {
            Ok(id) => {
                episodes.insert(id, episode);
            }
            Err(err) => bail!("{episode}: {err}"),
        }
    }

    let worker = processor.start()?;
    let unknown = || "?".to_string();
    for event in events {
        match event {
            QueueEvent::JobStarted { id } => {
                println!("Rendering: {}", episodes.get(&id).cloned().unwrap_or_else(unknown));
            }
            QueueEvent::JobProgress { frame, fps, remaining, .. } => {
                print!("\rframe {frame} | {fps} fps | remaining {remaining}");
                std::io::stdout().flush().ok();
            }
            QueueEvent::JobCompleted { id } => {
                println!("\n✓ Completed: {}", episodes.get(&id).cloned().unwrap_or_else(unknown));
            }
            QueueEvent::JobFailed { id, error } => {
                println!(
                    "\n✗ Failed: {}: {error}",
                    episodes.get(&id).cloned().unwrap_or_else(unknown)
                );
            }
            QueueEvent::JobCancelled { id } => {
                println!("\n⊘ Cancelled: {}", episodes.get(&id).cloned().unwrap_or_else(unknown));
            }
            QueueEvent::QueueFinished => break,
        }
    }
    if worker.join().is_err() {
        bail!("queue processor thread panicked");
    }

    let failed = queue
        .get_all_jobs()
        .iter()
        .filter(|j| j.error.is_some())
        .count();
    if failed > 0 {
        bail!("{failed} job(s) failed");
    }
    Ok(())
}

fn cmd_init_config() -> Result<()> {
    let path = Config::config_path()?;
    if Config::exists() {
        println!("Config present at {}", path.display());
    } else {
        Config::ensure_default().context("failed to create default config")?;
        println!("Created default config at {}", path.display());
    }
    Ok(())
}

/// Expand the CLI arguments into one validated-shape job per raw input.
fn build_jobs(config: &Config, args: &JobArgs) -> Result<Vec<RenderJob>> {
    if args.raw.len() > 1 && (args.audio.is_some() || args.sub.is_some() || args.episode.is_some())
    {
        bail!("--audio/--sub/--episode only apply when a single raw is given");
    }

    let softsub_dir = args
        .softsub_dir
        .clone()
        .unwrap_or_else(|| config.output.softsub_dir.clone());
    let hardsub_dir = args
        .hardsub_dir
        .clone()
        .unwrap_or_else(|| config.output.hardsub_dir.clone());

    let build = match args.build {
        BuildMode::SoftAndHard => BuildState::SoftAndHard,
        BuildMode::SoftOnly => BuildState::SoftOnly,
        BuildMode::HardOnly => BuildState::HardOnly,
        BuildMode::ForHardsubbers => BuildState::ForHardsubbers,
        BuildMode::RawRepair => BuildState::RawRepair,
    };
    let nvenc = if args.nvenc || config.encoding.nvenc {
        NvencState::Enabled
    } else {
        NvencState::Disabled
    };
    let logo = if args.no_logo || config.logo_path().is_none() {
        LogoState::Skip
    } else {
        LogoState::Burn
    };
    let potato = args.potato || config.encoding.potato;

    let mut jobs = Vec::with_capacity(args.raw.len());
    for raw in &args.raw {
        let episode = match &args.episode {
            Some(name) => name.clone(),
            None => scan::episode_name_from(raw)
                .with_context(|| format!("cannot derive an episode name from {}", raw.display()))?,
        };
        let paths = RenderPaths::new(
            raw.clone(),
            args.audio.clone(),
            args.sub.clone(),
            &softsub_dir,
            &hardsub_dir,
            &episode,
        );
        jobs.push(RenderJob::new(episode, paths, build, nvenc, logo, potato));
    }
    Ok(jobs)
}
