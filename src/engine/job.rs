// Job model: render paths, build flavors, queue entries

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use uuid::Uuid;

use crate::engine::params::EncodingParams;
use crate::engine::probe::VideoProbeInfo;

/// Episode names end up in output filenames and stream titles, so the
/// allowed alphabet is deliberately narrow.
static EPISODE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9 _.\-\[\]]+$").expect("episode name pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Waiting,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal jobs can only leave the queue via remove/clear_completed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Which output flavors a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildState {
    SoftAndHard,
    SoftOnly,
    HardOnly,
    ForHardsubbers,
    RawRepair,
}

impl BuildState {
    pub fn wants_softsub(&self) -> bool {
        matches!(self, Self::SoftAndHard | Self::SoftOnly)
    }

    pub fn wants_hardsub(&self) -> bool {
        matches!(self, Self::SoftAndHard | Self::HardOnly)
    }

    /// Hardsub variant for external hardsubbers: audio stays in the raw,
    /// a separate audio input is never remapped.
    pub fn is_for_hardsubbers(&self) -> bool {
        matches!(self, Self::ForHardsubbers)
    }

    pub fn is_repair(&self) -> bool {
        matches!(self, Self::RawRepair)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NvencState {
    Enabled,
    Disabled,
}

impl NvencState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogoState {
    Burn,
    Skip,
}

impl LogoState {
    pub fn is_burn(&self) -> bool {
        matches!(self, Self::Burn)
    }
}

/// Encoder preset bundle for one output flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSettings {
    pub preset: String,
    pub tune: String,
    pub profile: String,
    pub level: String,
    pub pixel_format: String,
}

impl VideoSettings {
    /// Softsub MKV: 10-bit H.264, anime tune.
    pub fn softsub() -> Self {
        Self {
            preset: "slow".to_string(),
            tune: "animation".to_string(),
            profile: "high10".to_string(),
            level: "4.1".to_string(),
            pixel_format: "yuv420p10le".to_string(),
        }
    }

    /// Hardsub MP4: 10-bit HEVC.
    pub fn hardsub() -> Self {
        Self {
            preset: "slow".to_string(),
            tune: "animation".to_string(),
            profile: "main10".to_string(),
            level: "5.1".to_string(),
            pixel_format: "yuv420p10le".to_string(),
        }
    }

    /// Low-resource fallback: no tune, 8-bit 4:2:0, baseline "main" profile.
    pub fn potato() -> Self {
        Self {
            preset: "veryfast".to_string(),
            tune: String::new(),
            profile: "main".to_string(),
            level: "4.0".to_string(),
            pixel_format: "yuv420p".to_string(),
        }
    }
}

/// Input and output locations for one episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderPaths {
    pub raw: PathBuf,
    pub audio: Option<PathBuf>,
    pub sub: Option<PathBuf>,
    pub softsub_output: PathBuf,
    pub hardsub_output: PathBuf,
}

impl RenderPaths {
    pub fn new(
        raw: PathBuf,
        audio: Option<PathBuf>,
        sub: Option<PathBuf>,
        softsub_dir: &Path,
        hardsub_dir: &Path,
        episode: &str,
    ) -> Self {
        Self {
            raw,
            audio,
            sub,
            softsub_output: softsub_dir.join(format!("{episode}.mkv")),
            hardsub_output: hardsub_dir.join(format!("{episode}.mp4")),
        }
    }

    /// Every missing input, not just the first.
    pub fn missing_inputs(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.raw.is_file() {
            problems.push(format!("raw file not found: {}", self.raw.display()));
        }
        if let Some(audio) = &self.audio {
            if !audio.is_file() {
                problems.push(format!("audio file not found: {}", audio.display()));
            }
        }
        if let Some(sub) = &self.sub {
            if !sub.is_file() {
                problems.push(format!("subtitle file not found: {}", sub.display()));
            }
        }
        problems
    }
}

/// A fully described render request, as handed over by the collaborator UI.
///
/// `probe` and `params` are runtime state: empty at submission, populated by
/// the pipeline while the job runs. Nothing else touches them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderJob {
    pub episode: String,
    pub paths: RenderPaths,
    pub build: BuildState,
    pub nvenc: NvencState,
    pub logo: LogoState,
    pub potato: bool,

    #[serde(default)]
    pub probe: Option<VideoProbeInfo>,
    #[serde(default)]
    pub params: Option<EncodingParams>,
}

impl RenderJob {
    pub fn new(
        episode: String,
        paths: RenderPaths,
        build: BuildState,
        nvenc: NvencState,
        logo: LogoState,
        potato: bool,
    ) -> Self {
        Self {
            episode,
            paths,
            build,
            nvenc,
            logo,
            potato,
            probe: None,
            params: None,
        }
    }

    pub fn softsub_settings(&self) -> VideoSettings {
        if self.potato {
            VideoSettings::potato()
        } else {
            VideoSettings::softsub()
        }
    }

    pub fn hardsub_settings(&self) -> VideoSettings {
        if self.potato {
            VideoSettings::potato()
        } else {
            VideoSettings::hardsub()
        }
    }

    /// Every problem that makes the job unacceptable, as human-readable
    /// messages. Empty means the job may enter the queue.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = self.paths.missing_inputs();
        if !EPISODE_NAME.is_match(&self.episode) {
            problems.push(format!("invalid episode name: {:?}", self.episode));
        }
        problems
    }
}

/// Rejected before queue admission.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("job validation failed: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Queue entry wrapping a job with identity and lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: Uuid,
    pub job: RenderJob,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl QueuedJob {
    pub fn new(job: RenderJob) -> Self {
        Self {
            id: Uuid::new_v4(),
            job,
            status: JobStatus::Waiting,
            created_at: Utc::now(),
            error: None,
        }
    }
}
