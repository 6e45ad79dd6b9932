use std::path::PathBuf;
use std::str::FromStr;

use crate::config::file::ConfigFile;
use crate::foundation::core::ScaleFilter;
use crate::foundation::error::{ButterflowError, ButterflowResult};
use crate::motion::flow::{FlowFilter, FlowParams};

/// x264/x265 presets accepted by the encoder.
pub const PRESETS: [&str; 10] = [
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

/// Video codec used for the rendered stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    X264,
    X265,
}

impl Codec {
    /// libx265 on Linux, libx264 elsewhere.
    pub fn platform_default() -> Self {
        if cfg!(target_os = "linux") {
            Self::X265
        } else {
            Self::X264
        }
    }

    pub fn parse(s: &str) -> ButterflowResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "libx264" | "x264" | "h264" => Ok(Self::X264),
            "libx265" | "x265" | "hevc" | "h265" => Ok(Self::X265),
            other => Err(ButterflowError::invalid_input(format!(
                "unsupported codec '{other}' (expected libx264 or libx265)"
            ))),
        }
    }

    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            Self::X264 => "libx264",
            Self::X265 => "libx265",
        }
    }
}

/// Color style of the debug HUD text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TextType {
    #[default]
    Light,
    Dark,
    Stroke,
}

impl TextType {
    pub fn parse(s: &str) -> ButterflowResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "stroke" => Ok(Self::Stroke),
            other => Err(ButterflowError::invalid_input(format!(
                "unknown text type '{other}' (expected light, dark or stroke)"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Stroke => "stroke",
        }
    }
}

/// Immutable runtime settings: defaults overridden by the config file, then by CLI flags.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub av_tool: String,
    pub probe_tool: String,
    pub preview_tool: String,
    pub av_loglevel: String,
    pub enc_loglevel: String,
    pub codec: Codec,
    pub preset: String,
    pub crf: u32,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub audio_container: String,
    pub scaler_up: ScaleFilter,
    pub scaler_dn: ScaleFilter,
    pub text_type: TextType,
    pub hud_font: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub flow: FlowParams,
    pub threads: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            av_tool: "ffmpeg".to_string(),
            probe_tool: "ffprobe".to_string(),
            preview_tool: "ffplay".to_string(),
            av_loglevel: "error".to_string(),
            enc_loglevel: "info".to_string(),
            codec: Codec::platform_default(),
            preset: "veryslow".to_string(),
            crf: 18,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            audio_container: "m4a".to_string(),
            scaler_up: ScaleFilter::Triangle,
            scaler_dn: ScaleFilter::CatmullRom,
            text_type: TextType::Light,
            hud_font: None,
            cache_dir: None,
            flow: FlowParams::default(),
            threads: None,
        }
    }
}

const KNOWN_KEYS: [&str; 26] = [
    "av_tool",
    "probe_tool",
    "preview_tool",
    "av_loglevel",
    "enc_loglevel",
    "codec",
    "preset",
    "crf",
    "audio_codec",
    "audio_bitrate",
    "audio_container",
    "scaler_up",
    "scaler_dn",
    "text_type",
    "hud_font",
    "cache_dir",
    "pyr_scale",
    "levels",
    "winsize",
    "iters",
    "poly_n",
    "poly_s",
    "fast_pyr",
    "flow_filter",
    "threads",
    "version",
];

impl Settings {
    /// Defaults with every key present in `cfg` applied on top.
    pub fn from_config(cfg: &ConfigFile) -> ButterflowResult<Self> {
        let mut s = Self::default();

        for key in cfg.keys() {
            if !KNOWN_KEYS.contains(&key) {
                tracing::warn!(key, "ignoring unknown config key");
            }
        }

        if let Some(v) = cfg.get("av_tool") {
            s.av_tool = v.to_string();
        }
        if let Some(v) = cfg.get("probe_tool") {
            s.probe_tool = v.to_string();
        }
        if let Some(v) = cfg.get("preview_tool") {
            s.preview_tool = v.to_string();
        }
        if let Some(v) = cfg.get("av_loglevel") {
            s.av_loglevel = v.to_string();
        }
        if let Some(v) = cfg.get("enc_loglevel") {
            s.enc_loglevel = v.to_string();
        }
        if let Some(v) = cfg.get("codec") {
            s.codec = Codec::parse(v)?;
        }
        if let Some(v) = cfg.get("preset") {
            s.preset = v.to_ascii_lowercase();
        }
        if let Some(v) = parse_key::<u32>(cfg, "crf")? {
            s.crf = v;
        }
        if let Some(v) = cfg.get("audio_codec") {
            s.audio_codec = v.to_string();
        }
        if let Some(v) = cfg.get("audio_bitrate") {
            s.audio_bitrate = v.to_string();
        }
        if let Some(v) = cfg.get("audio_container") {
            s.audio_container = v.trim_start_matches('.').to_string();
        }
        if let Some(v) = cfg.get("scaler_up") {
            s.scaler_up = ScaleFilter::parse(v)?;
        }
        if let Some(v) = cfg.get("scaler_dn") {
            s.scaler_dn = ScaleFilter::parse(v)?;
        }
        if let Some(v) = cfg.get("text_type") {
            s.text_type = TextType::parse(v)?;
        }
        if let Some(v) = cfg.get("hud_font").filter(|v| !v.is_empty()) {
            s.hud_font = Some(PathBuf::from(v));
        }
        if let Some(v) = cfg.get("cache_dir").filter(|v| !v.is_empty()) {
            s.cache_dir = Some(PathBuf::from(v));
        }

        if let Some(v) = parse_key::<f64>(cfg, "pyr_scale")? {
            s.flow.pyr_scale = v;
        }
        if let Some(v) = parse_key::<u32>(cfg, "levels")? {
            s.flow.levels = v;
        }
        if let Some(v) = parse_key::<u32>(cfg, "winsize")? {
            s.flow.winsize = v;
        }
        if let Some(v) = parse_key::<u32>(cfg, "iters")? {
            s.flow.iters = v;
        }
        if let Some(v) = parse_key::<u32>(cfg, "poly_n")? {
            s.flow.poly_n = v;
        }
        if let Some(v) = parse_key::<f64>(cfg, "poly_s")? {
            s.flow.poly_sigma = v;
        }
        if let Some(v) = cfg.get("fast_pyr") {
            s.flow.fast_pyramids = parse_bool("fast_pyr", v)?;
        }
        if let Some(v) = cfg.get("flow_filter") {
            s.flow.filter = FlowFilter::parse(v)?;
        }
        if let Some(v) = parse_key::<usize>(cfg, "threads")? {
            s.threads = Some(v);
        }

        s.validate()?;
        Ok(s)
    }

    pub fn validate(&self) -> ButterflowResult<()> {
        if !PRESETS.contains(&self.preset.as_str()) {
            return Err(ButterflowError::invalid_input(format!(
                "preset '{}' is not one of {}",
                self.preset,
                PRESETS.join(", ")
            )));
        }
        if self.crf > 51 {
            return Err(ButterflowError::invalid_input(format!(
                "crf must be in 0..=51, got {}",
                self.crf
            )));
        }
        if let Some(n) = self.threads
            && n == 0
        {
            return Err(ButterflowError::invalid_input(
                "threads must be >= 1 when set",
            ));
        }
        self.flow.validate()
    }

    /// The settings as a config file, for seeding a fresh config on first run.
    pub fn to_config(&self) -> ConfigFile {
        let mut cfg = ConfigFile::new();
        cfg.set("av_loglevel", self.av_loglevel.clone());
        cfg.set("enc_loglevel", self.enc_loglevel.clone());
        cfg.set("codec", self.codec.ffmpeg_name());
        cfg.set("preset", self.preset.clone());
        cfg.set("crf", self.crf.to_string());
        cfg.set("audio_codec", self.audio_codec.clone());
        cfg.set("audio_bitrate", self.audio_bitrate.clone());
        cfg.set("audio_container", self.audio_container.clone());
        cfg.set("scaler_up", self.scaler_up.as_str());
        cfg.set("scaler_dn", self.scaler_dn.as_str());
        cfg.set("text_type", self.text_type.as_str());
        cfg.set("pyr_scale", self.flow.pyr_scale.to_string());
        cfg.set("levels", self.flow.levels.to_string());
        cfg.set("winsize", self.flow.winsize.to_string());
        cfg.set("iters", self.flow.iters.to_string());
        cfg.set("poly_n", self.flow.poly_n.to_string());
        cfg.set("poly_s", self.flow.poly_sigma.to_string());
        cfg.set("fast_pyr", self.flow.fast_pyramids.to_string());
        cfg.set("flow_filter", self.flow.filter.as_str());
        cfg.set("version", env!("CARGO_PKG_VERSION"));
        cfg
    }
}

fn parse_key<T: FromStr>(cfg: &ConfigFile, key: &str) -> ButterflowResult<Option<T>> {
    let Some(raw) = cfg.get(key) else {
        return Ok(None);
    };
    raw.parse::<T>().map(Some).map_err(|_| {
        ButterflowError::invalid_input(format!("config key '{key}' has invalid value '{raw}'"))
    })
}

fn parse_bool(key: &str, raw: &str) -> ButterflowResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ButterflowError::invalid_input(format!(
            "config key '{key}' expects a boolean, got '{raw}'"
        ))),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/config/settings.rs"]
mod tests;
