//! Batch video conversion pipeline.
//!
//! Scans folders for video files, probes them with ffprobe, builds ffmpeg
//! transcode commands from a declarative target configuration, runs them one
//! at a time and commits outputs only after a duration verification. Two
//! workflows share the pipeline: in-place replacement of source files, and
//! sorting converted files into season folders under a separate root.

pub mod batch;
pub mod cache;
pub mod command;
pub mod config;
pub mod error;
pub mod exec;
pub mod ffprobe;
pub mod scan;
pub mod season;
pub mod select;
pub mod verify;

pub use batch::{run_batch, BatchReport, DestinationStrategy, PlannedConversion};
pub use cache::ProbeCache;
pub use command::{build, ConversionJob, EncoderRegistry, TranscodeSpec};
pub use config::{BatchOptions, MediaConfig, PipelineConfig};
pub use error::ConvertError;
pub use ffprobe::{probe_file, FFProbeData, MediaInfo};
pub use scan::find_video_files;
pub use season::season_folder;
pub use select::{select, StreamSelection};
pub use verify::{duration_accepted, verify_and_commit, CommitMode};
