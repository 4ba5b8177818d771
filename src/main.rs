use anyhow::Context;
use capsule::capture::{CaptureSwitch, FramePacer};
use capsule::config::{SessionConfig, app_name, version};
use capsule::convert::PackedFormat;
use capsule::encoder::FfmpegBackend;
use capsule::source::{AudioSource, TestPatternSource, ToneSource};
use capsule::utils::sos::SignalOfStop;
use capsule::{Session, SessionControls};
use clap::{Arg, ArgAction, Command, value_parser};
use std::path::PathBuf;
use std::{panic, process};

/// Samples per tone chunk, about 10 ms at 48 kHz
const TONE_CHUNK: usize = 480;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new(app_name())
        .version(version())
        .about("Records a synthetic capture session into a container file")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON session configuration")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Output file, overrides the configuration")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("seconds")
                .short('s')
                .long("seconds")
                .value_name("SECONDS")
                .help("Stop after this many seconds of video")
                .value_parser(value_parser!(u64))
                .default_value("5"),
        )
        .arg(
            Arg::new("fps")
                .long("fps")
                .value_name("FPS")
                .help("Capture frame rate, overrides the configuration")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .value_parser(value_parser!(u32))
                .default_value("1280"),
        )
        .arg(
            Arg::new("height")
                .long("height")
                .value_parser(value_parser!(u32))
                .default_value("720"),
        )
        .arg(
            Arg::new("sample-rate")
                .long("sample-rate")
                .value_parser(value_parser!(u32))
                .default_value("48000"),
        )
        .arg(
            Arg::new("no-audio")
                .long("no-audio")
                .help("Record video only")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("pixel-format")
                .long("pixel-format")
                .value_name("ORDER")
                .help("Byte order of the captured pixels")
                .value_parser(["rgba", "bgra"]),
        )
        .arg(
            Arg::new("no-flip")
                .long("no-flip")
                .help("Source rows are already top-down")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SessionConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration '{}'", path.display()))?,
        None => SessionConfig::default(),
    };
    if let Some(output) = matches.get_one::<PathBuf>("output") {
        config.output_path = output.clone();
    }
    if let Some(fps) = matches.get_one::<u32>("fps") {
        config.frame_rate = *fps;
    }
    if let Some(order) = matches.get_one::<String>("pixel-format") {
        config.pixel_format = match order.as_str() {
            "rgba" => PackedFormat::Rgba,
            _ => PackedFormat::Bgra,
        };
    }
    if matches.get_flag("no-audio") {
        config.audio.enabled = false;
    }
    if matches.get_flag("no-flip") {
        config.vflip = false;
    }
    config.validate()?;

    let seconds = matches.get_one::<u64>("seconds").copied().unwrap_or_default();
    let width = matches.get_one::<u32>("width").copied().unwrap_or_default();
    let height = matches.get_one::<u32>("height").copied().unwrap_or_default();
    let sample_rate = matches.get_one::<u32>("sample-rate").copied().unwrap_or_default();

    // kill the process as soon as a thread panics
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        process::exit(105);
    }));

    let controls = SessionControls {
        switch: CaptureSwitch::new(true),
        stop: SignalOfStop::new(),
    };

    // SIGINT/SIGTERM stop the recording; the file is still finalized
    let stop = controls.stop.clone();
    ctrlc::set_handler(move || {
        log::info!("Interrupted, finishing recording");
        stop.cancel();
    })
    .context("Error setting Ctrl-C handler")?;

    let frames = TestPatternSource::new(
        width,
        height,
        FramePacer::new(config.frame_rate),
        controls.switch.clone(),
        controls.stop.clone(),
    )
    .with_limit(seconds * config.frame_rate as u64);
    let audio: Option<Box<dyn AudioSource>> = config
        .audio
        .enabled
        .then(|| Box::new(ToneSource::new(sample_rate, TONE_CHUNK)) as Box<dyn AudioSource>);

    let mut backend = FfmpegBackend::new();
    let session = Session::configure_with(&config, &mut backend, Box::new(frames), audio, controls)
        .context("Failed to start recording")?;
    let report = session.run().context("Recording failed")?;

    println!("{}: {}", config.output_path.display(), report);
    Ok(())
}
