// Input probing by parsing ffmpeg banner output

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

/// NTSC film frame rate; anime raws are effectively always 23.976 fps.
pub const NTSC_FILM_FPS: f64 = 24000.0 / 1001.0;

static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Duration:\s*(\d+):(\d+):(\d+(?:\.\d+)?)").expect("duration pattern"));

static RESOLUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{3,4})x(\d{3,4})").expect("resolution pattern"));

/// Checked in priority order; `yuv420p` must not match inside `yuv420p10le`,
/// hence the trailing-delimiter requirement.
const PIXEL_FORMATS: [&str; 3] = ["p010le", "yuv420p10le", "yuv420p"];

const PROFILE_MARKERS: [(&str, &str); 4] = [
    ("(Main 10)", "main10"),
    ("(Main)", "main"),
    ("(High 10)", "high10"),
    ("(High)", "high"),
];

/// What the probe step learned about an input file. Unparsable fields keep
/// their defaults; probing never fails hard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProbeInfo {
    pub duration_seconds: f64,
    pub total_frames: f64,
    pub resolution: String,
    pub pixel_format: String,
    pub video_profile: String,
}

impl Default for VideoProbeInfo {
    fn default() -> Self {
        Self {
            duration_seconds: 0.0,
            total_frames: 0.0,
            resolution: "unknown".to_string(),
            pixel_format: "yuv420p".to_string(),
            video_profile: "main".to_string(),
        }
    }
}

/// True when `token` occurs in `line` followed by a delimiter that ends the
/// pixel-format word in ffmpeg output.
fn token_with_delimiter(line: &str, token: &str) -> bool {
    let mut search_from = 0;
    while let Some(pos) = line[search_from..].find(token) {
        let end = search_from + pos + token.len();
        match line.as_bytes().get(end) {
            Some(b',') | Some(b' ') | Some(b'(') => return true,
            _ => search_from = end,
        }
    }
    false
}

/// Parse the text ffmpeg prints when asked about an input file.
///
/// Pure and idempotent: the same text always yields the same result. The
/// first match wins per field, independent of line order.
pub fn parse_probe_output(text: &str) -> VideoProbeInfo {
    let mut info = VideoProbeInfo::default();
    let mut have_duration = false;
    let mut have_resolution = false;
    let mut have_pixel_format = false;
    let mut have_profile = false;

    for line in text.lines() {
        if !have_duration {
            if let Some(caps) = DURATION.captures(line) {
                let hours: f64 = caps[1].parse().unwrap_or(0.0);
                let minutes: f64 = caps[2].parse().unwrap_or(0.0);
                let seconds: f64 = caps[3].parse().unwrap_or(0.0);
                info.duration_seconds = hours * 3600.0 + minutes * 60.0 + seconds;
                have_duration = true;
            }
        }

        if !have_resolution {
            if let Some(caps) = RESOLUTION.captures(line) {
                if let Ok(height) = caps[2].parse::<u32>() {
                    info.resolution = if height < 4096 {
                        format!("{height}p")
                    } else {
                        format!("{}K", f64::from(height) / 1024.0)
                    };
                    have_resolution = true;
                }
            }
        }

        if line.contains("Video:") {
            if !have_pixel_format {
                for format in PIXEL_FORMATS {
                    if token_with_delimiter(line, format) {
                        info.pixel_format = format.to_string();
                        have_pixel_format = true;
                        break;
                    }
                }
            }
            if !have_profile {
                for (marker, profile) in PROFILE_MARKERS {
                    if line.contains(marker) {
                        info.video_profile = profile.to_string();
                        have_profile = true;
                        break;
                    }
                }
            }
        }
    }

    info.total_frames = info.duration_seconds * NTSC_FILM_FPS;
    info
}

/// Run ffmpeg against `path` and parse whatever it reports.
///
/// ffmpeg exits non-zero when invoked without an output file; the banner on
/// stderr is all we are after, so the exit status is ignored.
pub fn probe_file(ffmpeg: &str, path: &Path) -> Result<VideoProbeInfo> {
    let output = Command::new(ffmpeg)
        .arg("-hide_banner")
        .arg("-i")
        .arg(path)
        .output()
        .with_context(|| format!("failed to run {ffmpeg} to probe {}", path.display()))?;

    let text = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(parse_probe_output(&text))
}
