// End-to-end assertions on generated ffmpeg invocations
//
// These mirror what a queued job actually runs: options built from a real
// job + config, flattened to the final argument vector.

use subrender::engine::{
    build_repair_args, calculate, BuildState, FfmpegOptions, NvencState,
};

use crate::common::assertions::*;
use crate::common::helpers::*;

#[test]
fn test_softsub_command_shape() {
    let fixture = fixture_job("Show - 01", BuildState::SoftOnly);
    let params = calculate(2.0, "1080p", 1442.0, false);
    let config = test_config();

    let cmd = joined(&FfmpegOptions::softsub(&fixture.job, &params, &config).build_args());

    assert_cmd_contains(&cmd, "-y -i ");
    assert_cmd_contains(&cmd, "-map 0:v:0");
    assert_cmd_contains(&cmd, "-map 1:a");
    assert_cmd_contains(&cmd, "-map 2:s");
    assert_cmd_contains(&cmd, "-dn");
    assert_cmd_contains(&cmd, "-metadata:s:v:0 title=[subrender] Show - 01");
    assert_cmd_contains(&cmd, "-metadata:s:a:0 language=jpn");
    assert_cmd_contains(&cmd, "-metadata:s:s:0 language=eng");
    assert_cmd_contains(&cmd, "-c:v libx264");
    assert_cmd_contains(&cmd, "-crf 18");
    assert_cmd_contains(&cmd, "-b:v 6M");
    assert_cmd_contains(&cmd, "-maxrate 9M");
    assert_cmd_contains(&cmd, "-bufsize 18M");
    assert_cmd_contains(&cmd, "-preset slow");
    assert_cmd_contains(&cmd, "-tune animation");
    assert_cmd_contains(&cmd, "-profile:v high10");
    assert_cmd_contains(&cmd, "-pix_fmt yuv420p10le");
    assert_cmd_contains(&cmd, "-c:a aac");
    assert_cmd_contains(&cmd, "-b:a 192k");
    assert_cmd_contains(&cmd, "-ar 48000");
    assert_cmd_contains(&cmd, "-c:s copy");
    assert!(cmd.ends_with("Show - 01.mkv"), "output last: {cmd}");
}

#[test]
fn test_hardsub_nvenc_command_shape() {
    let mut fixture = fixture_job("Show - 01", BuildState::HardOnly);
    fixture.job.nvenc = NvencState::Enabled;
    let params = calculate(2.0, "1080p", 1442.0, false);
    let config = test_config();

    let burn_sub = fixture.job.paths.sub.clone();
    let options = FfmpegOptions::hardsub(&fixture.job, &params, &config, burn_sub, true);
    let cmd = joined(&options.build_args());

    assert_cmd_contains(&cmd, "-c:v hevc_nvenc");
    assert_cmd_contains(&cmd, "-cq 19");
    assert_cmd_contains(&cmd, "-qmin 17");
    assert_cmd_contains(&cmd, "-qmax 23");
    assert_cmd_not_contains(&cmd, "-crf");
    assert_cmd_not_contains(&cmd, "-tune");
    // Subtitle burned into the filter chain, not mapped.
    assert_cmd_contains(&cmd, "subtitles='");
    assert_cmd_not_contains(&cmd, "-map 2:s");
    assert_cmd_not_contains(&cmd, "-c:s copy");
    assert!(cmd.ends_with("Show - 01.mp4"), "output last: {cmd}");
}

#[test]
fn test_potato_command_shape() {
    let mut fixture = fixture_job("Show - 01", BuildState::SoftOnly);
    fixture.job.potato = true;
    let params = calculate(2.0, "1080p", 1442.0, true);
    let config = test_config();

    let cmd = joined(&FfmpegOptions::softsub(&fixture.job, &params, &config).build_args());

    assert_cmd_contains(&cmd, "-crf 23");
    assert_cmd_contains(&cmd, "-b:v 3M");
    assert_cmd_not_contains(&cmd, "-tune");
    assert_cmd_contains(&cmd, "-profile:v main");
    assert_cmd_contains(&cmd, "-pix_fmt yuv420p");
    assert_cmd_not_contains(&cmd, "yuv420p10le");
}

#[test]
fn test_softsub_without_optional_inputs_maps_from_raw() {
    let mut fixture = fixture_job("Show - 01", BuildState::SoftOnly);
    fixture.job.paths.audio = None;
    fixture.job.paths.sub = None;
    let params = calculate(2.0, "1080p", 1442.0, false);
    let config = test_config();

    let cmd = joined(&FfmpegOptions::softsub(&fixture.job, &params, &config).build_args());

    assert_cmd_contains(&cmd, "-map 0:a");
    assert_cmd_not_contains(&cmd, "-map 1:");
    assert_cmd_not_contains(&cmd, ":s copy");
    assert_cmd_not_contains(&cmd, "-metadata:s:s:0");
}

#[test]
fn test_repair_command_is_minimal() {
    let fixture = fixture_job("Show - 01", BuildState::RawRepair);
    let cmd = joined(&build_repair_args(
        &fixture.job.paths.raw,
        &fixture.job.paths.softsub_output,
    ));

    assert_cmd_contains(&cmd, "-c:v libx264");
    assert_cmd_contains(&cmd, "-c:a copy");
    assert_cmd_contains(&cmd, "-c:s copy");
    assert_cmd_not_contains(&cmd, "-crf");
    assert_cmd_not_contains(&cmd, "-vf");
    assert_cmd_not_contains(&cmd, "-metadata");
}

#[test]
fn test_identical_jobs_build_identical_commands() {
    let fixture = fixture_job("Show - 01", BuildState::SoftAndHard);
    let params = calculate(1.3, "720p", 1420.0, false);
    let config = test_config();

    for _ in 0..3 {
        let soft_a = FfmpegOptions::softsub(&fixture.job, &params, &config).build_args();
        let soft_b = FfmpegOptions::softsub(&fixture.job, &params, &config).build_args();
        assert_eq!(soft_a, soft_b);

        let burn = fixture.job.paths.sub.clone();
        let hard_a =
            FfmpegOptions::hardsub(&fixture.job, &params, &config, burn.clone(), true).build_args();
        let hard_b =
            FfmpegOptions::hardsub(&fixture.job, &params, &config, burn.clone(), true).build_args();
        assert_eq!(hard_a, hard_b);
    }
}
