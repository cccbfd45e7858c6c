// Host capability checks: encoder availability and potato heuristic

use std::process::Command;
use sysinfo::System;
use tracing::debug;

const POTATO_MIN_MEMORY_BYTES: u64 = 8 * 1024 * 1024 * 1024;
const POTATO_MIN_CPUS: usize = 4;

/// First line of `ffmpeg -version`, if the tool runs at all.
pub fn ffmpeg_version(ffmpeg: &str) -> Option<String> {
    let output = Command::new(ffmpeg).arg("-version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
}

/// Whether this ffmpeg build carries the NVENC encoders both flavors need.
pub fn nvenc_available(ffmpeg: &str) -> bool {
    let Ok(output) = Command::new(ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .output()
    else {
        return false;
    };
    let text = String::from_utf8_lossy(&output.stdout);
    let available = text.contains("h264_nvenc") && text.contains("hevc_nvenc");
    debug!(available, "nvenc encoder check");
    available
}

/// Conservative guess at whether this host should default to potato mode.
pub fn potato_recommended() -> bool {
    let sys = System::new_all();
    sys.total_memory() < POTATO_MIN_MEMORY_BYTES || sys.cpus().len() < POTATO_MIN_CPUS
}
