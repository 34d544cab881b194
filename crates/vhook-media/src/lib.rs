//! FFmpeg CLI wrapper for the ad pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - A runner with timeouts and captured stderr
//! - The fixed filters used for placeholders, loudness and color grading
//! - The [`MediaTool`] seam the worker assembles videos through

pub mod command;
pub mod concat;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod tool;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use concat::write_concat_list;
pub use error::{MediaError, MediaResult};
pub use fs_utils::{copy_file, move_file, remove_files, write_file_atomic};
pub use tool::{FfmpegTool, MediaTool};
