// Rate-control parameter derivation from probe results

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound on the average video bitrate, in Mbps. Keeps episode files
/// within distribution-friendly sizes regardless of the source.
pub const BITRATE_CAP_MBPS: f64 = 6.0;

/// Rate-control values for one job. The bitrate fields are preformatted
/// ffmpeg arguments ("6M"); the quality fields feed `-crf` or
/// `-cq`/`-qmin`/`-qmax` depending on the encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingParams {
    pub avg_bitrate: String,
    pub max_bitrate: String,
    pub buffer_size: String,
    pub crf: u32,
    pub cq: u32,
    pub qmin: u32,
    pub qmax: u32,
}

/// Derive encoding parameters from the input size, detected resolution tier
/// and duration.
///
/// A zero duration means the probe could not read one; the bitrate then
/// falls back to the cap instead of dividing by zero.
pub fn calculate(
    file_size_gb: f64,
    resolution: &str,
    duration_seconds: f64,
    potato: bool,
) -> EncodingParams {
    let mut avg = if duration_seconds > 0.0 {
        (file_size_gb * 1024.0 * 8.0 / duration_seconds).min(BITRATE_CAP_MBPS)
    } else {
        BITRATE_CAP_MBPS
    };
    if potato {
        avg /= 2.0;
    }
    let max = avg * 1.5;
    let buffer = max * 2.0;

    // "2160p" is what the probe reports for 4K heights; "4K" covers callers
    // that label the tier themselves.
    let (crf, cq) = if potato {
        (23, 21)
    } else {
        match resolution {
            "1080p" | "2160p" | "4K" => (18, 19),
            "720p" => (20, 21),
            _ => (23, 23),
        }
    };

    EncodingParams {
        avg_bitrate: format_mbps(avg),
        max_bitrate: format_mbps(max),
        buffer_size: format_mbps(buffer),
        crf,
        cq,
        qmin: cq - 2,
        qmax: cq + 4,
    }
}

/// Size of a file in GiB, for the bitrate estimate.
pub fn estimated_size_gb(path: &Path) -> Result<f64> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?;
    Ok(metadata.len() as f64 / (1024.0 * 1024.0 * 1024.0))
}

fn format_mbps(mbps: f64) -> String {
    if (mbps - mbps.round()).abs() < 1e-9 {
        format!("{}M", mbps.round() as u64)
    } else {
        format!("{mbps:.2}M")
    }
}
