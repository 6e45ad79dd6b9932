//! Frame sinks: the encoder pipe, the preview window and an in-memory collector.

pub mod ffmpeg;
pub mod preview;
pub mod sink;
