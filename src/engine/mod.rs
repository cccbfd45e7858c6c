pub mod ffmpeg_cmd;
pub mod hardware;
pub mod job;
pub mod params;
pub mod pipeline;
pub mod probe;
pub mod processor;
pub mod queue;
pub mod runner;
pub mod scan;

pub use ffmpeg_cmd::{build_repair_args, format_args_for_display, FfmpegOptions, StreamMetadata};
pub use job::{
    BuildState, JobStatus, LogoState, NvencState, QueuedJob, RenderJob, RenderPaths, SubmitError,
    VideoSettings,
};
pub use params::{calculate, estimated_size_gb, EncodingParams, BITRATE_CAP_MBPS};
pub use pipeline::{format_remaining, ProgressUpdate, RenderOutcome, RenderPipeline};
pub use probe::{parse_probe_output, probe_file, VideoProbeInfo, NTSC_FILM_FPS};
pub use processor::{JobExecutor, QueueEvent, QueueProcessor};
pub use queue::JobQueue;
pub use runner::{ProcessHandle, ProcessRunner, TERMINATE_GRACE};
pub use scan::{episode_name_from, is_video_file, scan};
