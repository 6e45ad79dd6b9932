#![forbid(unsafe_code)]

pub mod audio;
pub mod cache;
pub mod config;
pub mod encode;
pub mod foundation;
pub mod media;
pub mod motion;
pub mod render;
pub mod sequence;

pub use cache::CacheDir;
pub use config::file::{ConfigFile, default_config_path};
pub use config::settings::{Codec, Settings, TextType};
pub use encode::ffmpeg::{EncoderOpts, FfmpegSink};
pub use encode::preview::PreviewSink;
pub use encode::sink::{FrameSink, InMemorySink, SinkConfig};
pub use foundation::cancel::CancelToken;
pub use foundation::core::{Dimensions, ScaleFilter};
pub use foundation::error::{ButterflowError, ButterflowResult};
pub use media::frame::Frame;
pub use media::probe::{VideoInfo, probe_video};
pub use media::source::{FfmpegFrameSource, FrameSource, InMemoryFrameSource};
pub use motion::farneback::FarnebackFlow;
pub use motion::flow::{FlowField, FlowFilter, FlowParams, OpticalFlow};
pub use motion::interpolate::{CpuInterpolator, Interpolator};
pub use motion::kernel_cache::{KernelCache, flow_init};
pub use render::pipeline::{RenderJob, default_output_path, render_video};
pub use render::renderer::{RenderOpts, RenderReport, Renderer};
pub use sequence::parse::{parse_playback_rate, parse_sequence, parse_video_scale};
pub use sequence::sequence::VideoSequence;
pub use sequence::subregion::{Subregion, Target};
