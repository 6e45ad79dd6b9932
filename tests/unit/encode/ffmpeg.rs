use super::*;

fn opts(codec: Codec, lossless: bool) -> EncoderOpts {
    let settings = Settings {
        codec,
        ..Settings::default()
    };
    EncoderOpts::from_settings(&settings, "/tmp/out.mp4", lossless)
}

fn cfg() -> SinkConfig {
    SinkConfig {
        width: 640,
        height: 360,
        rate: 60.0,
    }
}

fn pos(args: &[String], flag: &str) -> usize {
    args.iter()
        .position(|a| a == flag)
        .unwrap_or_else(|| panic!("missing {flag} in {args:?}"))
}

#[test]
fn raw_input_is_declared_before_the_pipe() {
    let args = encoder_args(&opts(Codec::X264, false), &cfg());
    assert_eq!(args[..3], ["-loglevel", "error", "-y"]);
    assert_eq!(args[pos(&args, "-pix_fmt") + 1], "bgr24");
    assert_eq!(args[pos(&args, "-s") + 1], "640x360");
    assert_eq!(args[pos(&args, "-r") + 1], "60");
    assert!(pos(&args, "-r") < pos(&args, "-i"));
    assert_eq!(args[pos(&args, "-i") + 1], "-");
    assert!(args.contains(&"-an".to_string()) && args.contains(&"-sn".to_string()));
    assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
}

#[test]
fn x264_quality_flags() {
    let args = encoder_args(&opts(Codec::X264, false), &cfg());
    assert_eq!(args[pos(&args, "-c:v") + 1], "libx264");
    assert_eq!(args[pos(&args, "-crf") + 1], "18");
    assert_eq!(args[pos(&args, "-level") + 1], "4.2");

    let lossless = encoder_args(&opts(Codec::X264, true), &cfg());
    assert_eq!(lossless[pos(&lossless, "-qp") + 1], "0");
    assert!(!lossless.contains(&"-crf".to_string()));
}

#[test]
fn x265_quality_flags() {
    let args = encoder_args(&opts(Codec::X265, false), &cfg());
    assert_eq!(args[pos(&args, "-c:v") + 1], "libx265");
    assert_eq!(args[pos(&args, "-x265-params") + 1], "log-level=info:crf=18");
    let lossless = encoder_args(&opts(Codec::X265, true), &cfg());
    assert_eq!(
        lossless[pos(&lossless, "-x265-params") + 1],
        "log-level=info:lossless=1"
    );
}

#[test]
fn display_aspect_is_appended_to_the_filter() {
    let mut o = opts(Codec::X264, false);
    let plain = encoder_args(&o, &cfg());
    assert_eq!(plain[pos(&plain, "-vf") + 1], "format=yuv420p");
    o.dar = Some((16, 9));
    let args = encoder_args(&o, &cfg());
    assert_eq!(args[pos(&args, "-vf") + 1], "format=yuv420p,setdar=16:9");
}

#[test]
fn odd_dimensions_are_rejected_before_spawning() {
    let mut sink = FfmpegSink::new(opts(Codec::X264, false));
    let err = sink
        .begin(SinkConfig {
            width: 641,
            height: 360,
            rate: 30.0,
        })
        .unwrap_err();
    assert!(matches!(err, ButterflowError::InvalidInput(_)));
}

#[test]
fn push_before_begin_fails() {
    let mut sink = FfmpegSink::new(opts(Codec::X264, false));
    assert!(sink.push_frame(&Frame::filled(2, 2, [0; 3])).is_err());
    assert!(sink.end().is_err());
}

#[test]
fn missing_tool_is_not_on_path() {
    assert!(!is_tool_on_path("butterflow-no-such-tool"));
}

#[test]
fn parent_dirs_are_created() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("a/b/out.mp4");
    ensure_parent_dir(&out).unwrap();
    assert!(tmp.path().join("a/b").is_dir());
    ensure_parent_dir(Path::new("relative.mp4")).unwrap();
}
