use std::ffi::OsString;
use std::io::{BufRead as _, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use butterflow::{
    ButterflowError, CacheDir, CancelToken, ConfigFile, FlowFilter, RenderJob, RenderOpts,
    RenderReport, Settings, Target, TextType, VideoSequence, default_config_path,
    default_output_path, flow_init, parse_playback_rate, parse_sequence, parse_video_scale,
    probe_video, render_video,
};

/// Single-dash multi-letter flags accepted as aliases of their long forms.
const LEGACY_FLAGS: [(&str, &str); 7] = [
    ("-vs", "--video-scale"),
    ("-sm", "--smooth-motion"),
    ("-mrk", "--mark-frames"),
    ("-tt", "--text-type"),
    ("-ff", "--flow-filter"),
    ("-mux", "--mux"),
    ("-prb", "--probe"),
];

const CONFIG_HEADER: &str = "butterflow configuration\nkey=value per line; CLI flags take precedence";

#[derive(Parser, Debug)]
#[command(
    name = "butterflow",
    version,
    about = "Make slow motion and smooth motion videos with optical flow"
)]
struct Cli {
    /// Input video.
    input: Option<PathBuf>,

    /// Output path (must end in .mp4). Defaults to `<input>_out.mp4`.
    #[arg(short = 'o', long = "output-path")]
    output: Option<PathBuf>,

    /// Playback rate: integer, decimal, num/den, or Nx of the source rate.
    #[arg(short = 'r', long = "playback-rate")]
    rate: Option<String>,

    /// Subregions, e.g. `a=0.5,b=1.2,fps=48:a=2,b=end,spd=0.25` or `full,dur=6`.
    #[arg(short = 's', long = "subregions")]
    subregions: Option<String>,

    /// Also render the parts of the video not covered by -s.
    #[arg(short = 'k', long = "keep-subregions")]
    keep_subregions: bool,

    /// Output size: WxH, W:-1, -1:H, or a scale factor.
    #[arg(long = "video-scale")]
    video_scale: Option<String>,

    /// Encode losslessly.
    #[arg(short = 'l', long = "lossless")]
    lossless: bool,

    /// Tune flow for smooth motion.
    #[arg(long = "smooth-motion")]
    smooth_motion: bool,

    /// Mux retimed source audio into the output.
    #[arg(long = "mux")]
    mux: bool,

    /// Show a preview window while rendering.
    #[arg(short = 'p', long = "show-preview")]
    preview: bool,

    /// Stamp debug info onto output frames.
    #[arg(short = 'a', long = "add-info")]
    add_info: bool,

    /// Mark interpolated frames with a red dot.
    #[arg(long = "mark-frames")]
    mark_frames: bool,

    /// HUD text style.
    #[arg(long = "text-type", value_enum)]
    text_type: Option<TextType>,

    #[arg(long = "pyr-scale")]
    pyr_scale: Option<f64>,
    #[arg(long)]
    levels: Option<u32>,
    #[arg(long)]
    winsize: Option<u32>,
    #[arg(long)]
    iters: Option<u32>,
    #[arg(long = "poly-n")]
    poly_n: Option<u32>,
    #[arg(long = "poly-s")]
    poly_s: Option<f64>,
    #[arg(long = "fast-pyr")]
    fast_pyr: bool,
    /// Flow averaging filter: box or gaussian.
    #[arg(long = "flow-filter")]
    flow_filter: Option<String>,

    /// Print source properties and exit.
    #[arg(long = "probe")]
    probe: bool,

    /// Print cache location and usage.
    #[arg(short = 'c', long = "cache")]
    cache: bool,

    /// Delete the cache directory.
    #[arg(long = "rm-cache")]
    rm_cache: bool,

    /// Skip the --rm-cache confirmation.
    #[arg(long)]
    yes: bool,

    #[arg(long = "cache-dir")]
    cache_dir: Option<PathBuf>,

    /// Config file to read instead of ~/.butterflow/config.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads for flow and interpolation.
    #[arg(long)]
    threads: Option<usize>,

    /// More logging (-v info, -vv debug).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors and hide the progress bar.
    #[arg(short = 'q', long)]
    quiet: bool,
}

fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|a| {
            LEGACY_FLAGS
                .iter()
                .find(|(short, _)| a.to_str() == Some(*short))
                .map(|(_, long)| OsString::from(*long))
                .unwrap_or(a)
        })
        .collect()
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };
    init_tracing(cli.verbose, cli.quiet);

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        if matches!(e.downcast_ref::<ButterflowError>(), Some(ButterflowError::Cancelled)) {
            eprintln!("note: temp files were left in the cache");
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = load_settings(&cli)?;
    let cache = CacheDir::resolve(settings.cache_dir.as_deref());

    if cli.cache {
        let usage = cache.usage()?;
        println!("cache: {}", cache.root().display());
        println!("files: {} ({})", usage.files, usage.human_size());
        return Ok(());
    }
    if cli.rm_cache {
        return remove_cache(&cache, cli.yes);
    }

    let input = cli
        .input
        .clone()
        .ok_or_else(|| ButterflowError::invalid_input("no input video given"))?;
    let info = probe_video(&input, &settings.probe_tool)?;
    if cli.probe {
        println!("{}", info.report());
        return Ok(());
    }
    tracing::info!("{}", info.report());

    let rate = match cli.rate.as_deref() {
        Some(r) => parse_playback_rate(r, info.rate())?,
        None => info.rate(),
    };
    let sequence = match cli.subregions.as_deref() {
        Some(s) => parse_sequence(s, info.duration_ms, info.frames)?,
        None => VideoSequence::whole(info.duration_ms, info.frames, Target::Spd(1.0))?,
    };
    let out_dims = match cli.video_scale.as_deref() {
        Some(s) => parse_video_scale(s, info.dims())?,
        None => info.dims().to_even(),
    };
    let dest = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&input));

    if let Some(n) = settings.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("failed to configure worker threads")?;
    }
    let kernels = flow_init(cache.root())?;
    let cancel = CancelToken::new();
    install_interrupt_handler(cancel.clone());

    let job = RenderJob {
        info,
        dest,
        sequence,
        opts: RenderOpts {
            rate,
            out_dims,
            scaler_up: settings.scaler_up,
            scaler_dn: settings.scaler_dn,
            keep_subregions: cli.keep_subregions,
            marker: cli.mark_frames,
        },
        lossless: cli.lossless,
        mux: cli.mux,
        preview: cli.preview,
        hud: cli.add_info,
    };

    let bar = progress_bar(cli.quiet);
    let report = render_video(&job, &settings, &cache, &kernels, &cancel, |written, total| {
        bar.set_length(total);
        bar.set_position(written);
    });
    bar.finish_and_clear();
    let report = report?;

    print_summary(&job, &report);
    Ok(())
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    let cfg = if path.exists() {
        ConfigFile::load(&path)?
    } else {
        let seeded = Settings::default().to_config();
        if cli.config.is_none() {
            match seeded.save(&path, CONFIG_HEADER) {
                Ok(()) => tracing::info!(path = %path.display(), "wrote default config"),
                Err(e) => tracing::warn!(path = %path.display(), "could not write default config: {e}"),
            }
        }
        seeded
    };
    let mut s = Settings::from_config(&cfg)?;

    if let Some(v) = cli.pyr_scale {
        s.flow.pyr_scale = v;
    }
    if let Some(v) = cli.levels {
        s.flow.levels = v;
    }
    if let Some(v) = cli.winsize {
        s.flow.winsize = v;
    }
    if let Some(v) = cli.iters {
        s.flow.iters = v;
    }
    if let Some(v) = cli.poly_n {
        s.flow.poly_n = v;
    }
    if let Some(v) = cli.poly_s {
        s.flow.poly_sigma = v;
    }
    if cli.fast_pyr {
        s.flow.fast_pyramids = true;
    }
    if let Some(f) = cli.flow_filter.as_deref() {
        s.flow.filter = FlowFilter::parse(f)?;
    }
    if cli.smooth_motion {
        s.flow = s.flow.smooth_motion();
    }
    if let Some(t) = cli.text_type {
        s.text_type = t;
    }
    if let Some(dir) = &cli.cache_dir {
        s.cache_dir = Some(dir.clone());
    }
    if cli.threads.is_some() {
        s.threads = cli.threads;
    }
    s.validate()?;
    tracing::debug!(flow = %s.flow.summary(), codec = s.codec.ffmpeg_name(), "settings loaded");
    Ok(s)
}

fn remove_cache(cache: &CacheDir, yes: bool) -> anyhow::Result<()> {
    if !yes {
        eprint!("delete '{}'? [y/N] ", cache.root().display());
        std::io::stderr().flush()?;
        let mut answer = String::new();
        std::io::stdin().lock().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("cache kept");
            return Ok(());
        }
    }
    if cache.clear()? {
        println!("removed {}", cache.root().display());
    } else {
        println!("no cache at {}", cache.root().display());
    }
    Ok(())
}

/// Trip `cancel` on Ctrl+C. The listener runs on its own thread with a small runtime.
fn install_interrupt_handler(cancel: CancelToken) {
    let spawned = std::thread::Builder::new()
        .name("butterflow-signal".into())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::warn!("interrupt handler unavailable: {e}");
                    return;
                }
            };
            rt.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted, stopping render");
                    cancel.cancel();
                }
            });
        });
    if let Err(e) = spawned {
        tracing::warn!("interrupt handler unavailable: {e}");
    }
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template(
        "Rendering {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}<{eta_precise}]",
    ) {
        bar.set_style(style.progress_chars("##-"));
    }
    bar
}

fn print_summary(job: &RenderJob, report: &RenderReport) {
    println!("wrote {}", display_path(&job.dest));
    println!(
        "source: {}  interpolated: {}  duped: {}  dropped: {}",
        report.source_frs, report.frs_interpolated, report.frs_duped, report.frs_dropped
    );
    println!(
        "written: {}/{} ({:.2}%)  duration: {:.2}s",
        report.frs_written,
        report.frs_to_render,
        report.write_ratio() * 100.0,
        report.duration_s(job.opts.rate)
    );
}

fn display_path(p: &Path) -> String {
    p.canonicalize()
        .unwrap_or_else(|_| p.to_path_buf())
        .display()
        .to_string()
}
