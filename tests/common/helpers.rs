// Shared fixtures for integration tests

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use subrender::config::Config;
use subrender::engine::{BuildState, LogoState, NvencState, RenderJob, RenderPaths};

/// A render job whose input files actually exist, so it passes validation.
/// Keep the TempDir alive for as long as the job is used.
pub struct JobFixture {
    pub dir: TempDir,
    pub job: RenderJob,
}

pub fn fixture_job(episode: &str, build: BuildState) -> JobFixture {
    let dir = TempDir::new().expect("temp dir");
    let raw = dir.path().join("raw.mkv");
    let audio = dir.path().join("audio.flac");
    let sub = dir.path().join("subs.ass");
    fs::write(&raw, b"raw").unwrap();
    fs::write(&audio, b"audio").unwrap();
    fs::write(&sub, b"subs").unwrap();

    let paths = RenderPaths::new(
        raw,
        Some(audio),
        Some(sub),
        &dir.path().join("soft"),
        &dir.path().join("hard"),
        episode,
    );
    let job = RenderJob::new(
        episode.to_string(),
        paths,
        build,
        NvencState::Disabled,
        LogoState::Skip,
        false,
    );
    JobFixture { dir, job }
}

/// Config with a logo configured, for burn-in assertions.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.branding.logo = Some(PathBuf::from("/assets/logo.ass"));
    config
}

pub fn joined(args: &[String]) -> String {
    args.join(" ")
}
