// Renderer configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::engine::ffmpeg_cmd::StreamMetadata;

/// Everything the render pipeline needs from the environment, loaded once
/// and passed by reference into the engine. The engine never reads config
/// from disk on its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub branding: BrandingConfig,

    #[serde(default)]
    pub encoding: EncodingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    /// FFmpeg binary; a bare name resolves through PATH.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    /// Where sanitized subtitle copies live during a job. Defaults to a
    /// subdirectory of the system temp dir.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub softsub_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub hardsub_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrandingConfig {
    /// Release group tag, prefixed onto video stream titles.
    #[serde(default = "default_group")]
    pub group: String,

    /// Logo subtitle file burned into outputs when a job asks for it.
    #[serde(default)]
    pub logo: Option<PathBuf>,

    #[serde(default = "default_audio_title")]
    pub audio_title: String,

    #[serde(default = "default_audio_language")]
    pub audio_language: String,

    #[serde(default = "default_subtitle_title")]
    pub subtitle_title: String,

    #[serde(default = "default_subtitle_language")]
    pub subtitle_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncodingConfig {
    /// Prefer the NVENC encoders when a job does not say otherwise.
    #[serde(default)]
    pub nvenc: bool,

    /// Default jobs to potato mode on weak hosts.
    #[serde(default)]
    pub potato: bool,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    #[serde(default = "default_audio_sample_rate")]
    pub audio_sample_rate: String,

    /// Extra arguments appended to every invocation, shell-style quoted.
    #[serde(default)]
    pub extra_ffmpeg_args: String,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_group() -> String {
    "subrender".to_string()
}

fn default_audio_title() -> String {
    "Japanese Audio".to_string()
}

fn default_audio_language() -> String {
    "jpn".to_string()
}

fn default_subtitle_title() -> String {
    "English Subtitles".to_string()
}

fn default_subtitle_language() -> String {
    "eng".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_audio_sample_rate() -> String {
    "48000".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            temp_dir: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            softsub_dir: default_output_dir(),
            hardsub_dir: default_output_dir(),
        }
    }
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            group: default_group(),
            logo: None,
            audio_title: default_audio_title(),
            audio_language: default_audio_language(),
            subtitle_title: default_subtitle_title(),
            subtitle_language: default_subtitle_language(),
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            nvenc: false,
            potato: false,
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            audio_sample_rate: default_audio_sample_rate(),
            extra_ffmpeg_args: String::new(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine config directory")?
            .join("subrender");
        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk, or fall back to defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path).with_context(|| {
                format!("failed to read config file: {}", config_path.display())
            })?;
            let config: Config = toml::from_str(&contents).with_context(|| {
                format!("failed to parse config file: {}", config_path.display())
            })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&config_path, contents)
            .with_context(|| format!("failed to write config file: {}", config_path.display()))?;
        Ok(())
    }

    pub fn exists() -> bool {
        Self::config_path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Create a default config file if it doesn't exist
    pub fn ensure_default() -> Result<()> {
        if !Self::exists() {
            Config::default().save()?;
        }
        Ok(())
    }

    pub fn ffmpeg_binary(&self) -> &str {
        &self.tools.ffmpeg
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.tools
            .temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("subrender"))
    }

    pub fn logo_path(&self) -> Option<PathBuf> {
        self.branding.logo.clone()
    }

    /// Stream titles and languages stamped onto one episode's outputs.
    pub fn stream_metadata(&self, episode: &str) -> StreamMetadata {
        StreamMetadata {
            video_title: format!("[{}] {}", self.branding.group, episode),
            video_language: self.branding.audio_language.clone(),
            audio_title: self.branding.audio_title.clone(),
            audio_language: self.branding.audio_language.clone(),
            subtitle_title: self.branding.subtitle_title.clone(),
            subtitle_language: self.branding.subtitle_language.clone(),
        }
    }
}
