// FFmpeg argument construction for the softsub and hardsub output flavors

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::engine::job::{RenderJob, VideoSettings};
use crate::engine::params::EncodingParams;

/// Titles and languages stamped onto the output streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMetadata {
    pub video_title: String,
    pub video_language: String,
    pub audio_title: String,
    pub audio_language: String,
    pub subtitle_title: String,
    pub subtitle_language: String,
}

/// Everything needed to derive one ffmpeg invocation. Turning this into an
/// argument vector is pure; the same options always produce the same
/// arguments in the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegOptions {
    pub raw: PathBuf,
    pub audio: Option<PathBuf>,
    /// Subtitle mapped as a selectable stream. Softsub only.
    pub sub: Option<PathBuf>,
    /// Logo burned into the picture via the subtitles filter.
    pub burn_logo: Option<PathBuf>,
    /// Subtitle burned into the picture. Hardsub only; the path must already
    /// be bracket-sanitized.
    pub burn_sub: Option<PathBuf>,
    pub video_codec: String,
    pub nvenc: bool,
    pub params: EncodingParams,
    pub settings: VideoSettings,
    pub include_audio: bool,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub audio_sample_rate: String,
    pub metadata: StreamMetadata,
    pub extra_args: String,
    pub output: PathBuf,
}

impl FfmpegOptions {
    /// Softsub flavor: subtitle kept as a mapped stream, H.264 video,
    /// optionally only the logo burned in.
    pub fn softsub(job: &RenderJob, params: &EncodingParams, config: &Config) -> Self {
        let nvenc = job.nvenc.is_enabled();
        Self {
            raw: job.paths.raw.clone(),
            audio: job.paths.audio.clone(),
            sub: job.paths.sub.clone(),
            burn_logo: burn_logo_for(job, config),
            burn_sub: None,
            video_codec: if nvenc { "h264_nvenc" } else { "libx264" }.to_string(),
            nvenc,
            params: params.clone(),
            settings: job.softsub_settings(),
            include_audio: true,
            audio_codec: config.encoding.audio_codec.clone(),
            audio_bitrate: config.encoding.audio_bitrate.clone(),
            audio_sample_rate: config.encoding.audio_sample_rate.clone(),
            metadata: config.stream_metadata(&job.episode),
            extra_args: config.encoding.extra_ffmpeg_args.clone(),
            output: job.paths.softsub_output.clone(),
        }
    }

    /// Hardsub flavor: HEVC video, subtitle and/or logo burned into the
    /// picture, never mapped as a stream. `separate_audio` is false for the
    /// FOR_HARDSUBBERS variant, which leaves a provided audio file unmapped.
    pub fn hardsub(
        job: &RenderJob,
        params: &EncodingParams,
        config: &Config,
        burn_sub: Option<PathBuf>,
        separate_audio: bool,
    ) -> Self {
        let nvenc = job.nvenc.is_enabled();
        Self {
            raw: job.paths.raw.clone(),
            audio: if separate_audio {
                job.paths.audio.clone()
            } else {
                None
            },
            sub: None,
            burn_logo: burn_logo_for(job, config),
            burn_sub,
            video_codec: if nvenc { "hevc_nvenc" } else { "hevc" }.to_string(),
            nvenc,
            params: params.clone(),
            settings: job.hardsub_settings(),
            include_audio: true,
            audio_codec: config.encoding.audio_codec.clone(),
            audio_bitrate: config.encoding.audio_bitrate.clone(),
            audio_sample_rate: config.encoding.audio_sample_rate.clone(),
            metadata: config.stream_metadata(&job.episode),
            extra_args: config.encoding.extra_ffmpeg_args.clone(),
            output: job.paths.hardsub_output.clone(),
        }
    }

    /// Ordered argument vector for this invocation. Never a shell string;
    /// the vector goes to process creation as-is.
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into()];

        // Inputs.
        args.push("-i".into());
        args.push(self.raw.display().to_string());
        if let Some(audio) = &self.audio {
            args.push("-i".into());
            args.push(audio.display().to_string());
        }
        if let Some(sub) = &self.sub {
            args.push("-i".into());
            args.push(sub.display().to_string());
        }

        // Stream maps. The audio comes from the separate input when one is
        // given, otherwise from the raw itself.
        args.push("-map".into());
        args.push("0:v:0".into());
        let audio_input = usize::from(self.audio.is_some());
        if self.include_audio {
            args.push("-map".into());
            args.push(format!("{audio_input}:a"));
        }
        let sub_input = 1 + usize::from(self.audio.is_some());
        if self.sub.is_some() {
            args.push("-map".into());
            args.push(format!("{sub_input}:s"));
        }
        args.push("-dn".into());

        // Stream metadata, only for streams actually present.
        args.push("-metadata:s:v:0".into());
        args.push(format!("title={}", self.metadata.video_title));
        args.push("-metadata:s:v:0".into());
        args.push(format!("language={}", self.metadata.video_language));
        if self.include_audio {
            args.push("-metadata:s:a:0".into());
            args.push(format!("title={}", self.metadata.audio_title));
            args.push("-metadata:s:a:0".into());
            args.push(format!("language={}", self.metadata.audio_language));
        }
        if self.sub.is_some() {
            args.push("-metadata:s:s:0".into());
            args.push(format!("title={}", self.metadata.subtitle_title));
            args.push("-metadata:s:s:0".into());
            args.push(format!("language={}", self.metadata.subtitle_language));
        }

        // Burn-in filter chain: logo first, then subtitle.
        let mut filters = Vec::new();
        if let Some(logo) = &self.burn_logo {
            filters.push(format!("subtitles='{}'", logo.display()));
        }
        if let Some(burn_sub) = &self.burn_sub {
            filters.push(format!("subtitles='{}'", burn_sub.display()));
        }
        if !filters.is_empty() {
            args.push("-vf".into());
            args.push(filters.join(","));
        }

        // Video codec and rate control. CRF drives software encoders; the
        // CQ family drives NVENC. Never both.
        args.push("-c:v".into());
        args.push(self.video_codec.clone());
        if self.nvenc {
            args.push("-cq".into());
            args.push(self.params.cq.to_string());
            args.push("-qmin".into());
            args.push(self.params.qmin.to_string());
            args.push("-qmax".into());
            args.push(self.params.qmax.to_string());
        } else {
            args.push("-crf".into());
            args.push(self.params.crf.to_string());
        }
        args.push("-b:v".into());
        args.push(self.params.avg_bitrate.clone());
        args.push("-maxrate".into());
        args.push(self.params.max_bitrate.clone());
        args.push("-bufsize".into());
        args.push(self.params.buffer_size.clone());

        args.push("-preset".into());
        args.push(self.settings.preset.clone());
        // NVENC encoders reject x264 tune names; the potato preset carries
        // no tune at all.
        if !self.nvenc && !self.settings.tune.is_empty() {
            args.push("-tune".into());
            args.push(self.settings.tune.clone());
        }
        args.push("-profile:v".into());
        args.push(self.settings.profile.clone());
        args.push("-level:v".into());
        args.push(self.settings.level.clone());
        args.push("-pix_fmt".into());
        args.push(self.settings.pixel_format.clone());

        if self.include_audio {
            args.push("-c:a".into());
            args.push(self.audio_codec.clone());
            args.push("-b:a".into());
            args.push(self.audio_bitrate.clone());
            args.push("-ar".into());
            args.push(self.audio_sample_rate.clone());
        }
        if self.sub.is_some() {
            args.push("-c:s".into());
            args.push("copy".into());
        }

        append_extra_args(&mut args, &self.extra_args);

        args.push(self.output.display().to_string());
        args
    }
}

fn burn_logo_for(job: &RenderJob, config: &Config) -> Option<PathBuf> {
    if job.logo.is_burn() {
        config.logo_path()
    } else {
        None
    }
}

/// Minimal remux for damaged raws: re-encode video, copy everything else.
pub fn build_repair_args(raw: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        raw.display().to_string(),
        "-map".into(),
        "0".into(),
        "-c:v".into(),
        "libx264".into(),
        "-c:a".into(),
        "copy".into(),
        "-c:s".into(),
        "copy".into(),
        output.display().to_string(),
    ]
}

/// Append user-supplied extra arguments, shell-style split so quoted values
/// survive. Falls back to whitespace splitting on unbalanced quotes.
fn append_extra_args(args: &mut Vec<String>, extra: &str) {
    if extra.is_empty() {
        return;
    }
    if let Some(parsed) = shlex::split(extra) {
        args.extend(parsed);
    } else {
        args.extend(extra.split_whitespace().map(str::to_string));
    }
}

/// Render an invocation as a single shell-quoted string for logs and
/// dry-run output. Display only; execution always uses the vector.
pub fn format_args_for_display(tool: &str, args: &[String]) -> String {
    let mut parts = vec![tool.to_string()];
    parts.extend(args.iter().map(|arg| {
        if arg.contains(' ') {
            format!("\"{arg}\"")
        } else {
            arg.clone()
        }
    }));
    parts.join(" ")
}
