pub mod bitrate;
pub mod error;
pub mod ffmpeg;
pub mod fstools;
pub mod media;
pub mod queue_processor;
pub mod transcode_state;
pub mod transcode_task;
pub mod transcoder;

#[cfg(all(test, unix))]
mod test_support;

use std::env;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, Receiver};

use human_repr::HumanCount;
use kdam::{term, tqdm, BarExt};
use rustop::opts;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use bitrate::Bitrate;
use ffmpeg::Encoder;
use ffmpeg::probe::DurationSource;
use fstools::{probe_writable, resolve_output_dir, select_media_files};
use queue_processor::{BatchReport, Orchestrator, ProgressUpdate};
use transcode_task::TranscodeJob;

const ENCODER_ENV: &str = "COMPRESSR_FFMPEG";
const PROGRESS_STEPS: usize = 1000;

struct Settings {
    files: Vec<PathBuf>,
    output: String,
    bitrate: String,
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
    probe_duration: bool,
}

fn main() -> ExitCode {
    let (args, _rest) = opts! {
        synopsis "Compress audio and video files with ffmpeg.";
        opt bitrate:String=String::from("128k"), desc:"Target bitrate: 64, 80, 96, 112, 128, 144, 160, 192, 224, 256, 288 or 320 (kbps).";
        opt output:String=String::from("."), desc:"Output folder, or one of downloads, documents, desktop.";
        opt ffmpeg:Option<String>, desc:"Path to the ffmpeg executable. Defaults to $COMPRESSR_FFMPEG, then PATH.";
        opt probe_duration:bool=false, desc:"Measure each input with ffprobe instead of assuming 60 seconds.";
        opt ffprobe:Option<String>, desc:"Path to the ffprobe executable.";
        opt verbose:bool=false, desc:"Log encoder command lines and phase changes.";
        param files:Vec<String>, desc:"Media files to compress (mp3, mp4, m4v, mov, qt, m4a, wav).";
    }.parse_or_exit();

    init_logging(args.verbose);

    let settings = Settings {
        files: args.files.iter().map(PathBuf::from).collect(),
        output: args.output,
        bitrate: args.bitrate,
        ffmpeg: args.ffmpeg.map(PathBuf::from).or_else(|| env::var_os(ENCODER_ENV).map(PathBuf::from)),
        ffprobe: args.ffprobe.map(PathBuf::from),
        probe_duration: args.probe_duration,
    };

    match run(settings) {
        Ok(report) if report.is_success() => {
            println!("Success! ^__^");
            ExitCode::SUCCESS
        },
        Ok(_) => {
            println!("Some files could not be compressed -__-");
            ExitCode::FAILURE
        },
        Err(err) => {
            println!("Failure -__-\n{}", err);
            ExitCode::FAILURE
        },
    }
}

fn init_logging(verbose: bool) {
    let filter = match verbose {
        true => EnvFilter::new("debug"),
        false => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(settings: Settings) -> Result<BatchReport, Box<dyn Error>> {
    let bitrate: Bitrate = settings.bitrate.parse()?;

    let inputs = select_media_files(&settings.files)?;
    println!("Selected {} file(s):", inputs.len());
    for input in &inputs {
        println!("  {}", input.display());
    }

    let output_dir = resolve_output_dir(&settings.output);
    if let Err(err) = probe_writable(&output_dir) {
        println!("Can't write to output directory: {}", err);
        return Err(Box::new(err));
    }
    println!("Selected output: {}", output_dir.display());

    // a missing encoder is left for the batch to report
    if let Ok(encoder) = Encoder::locate(settings.ffmpeg.as_deref()) {
        if !encoder.is_installed() {
            warn!("{} did not answer -version", encoder.path().display());
        }
    }

    let duration = match settings.probe_duration {
        true => {
            let encoder = Encoder::locate(settings.ffmpeg.as_deref())?;
            DurationSource::locate_probe(settings.ffprobe.as_deref(), encoder.path())?
        },
        false => DurationSource::default(),
    };

    let job = TranscodeJob::new(inputs, bitrate, output_dir)?;
    let orchestrator = Orchestrator::new();
    let (tx, rx) = mpsc::channel();
    let handle = orchestrator.spawn(job, settings.ffmpeg, duration, tx)?;

    render_progress(rx);

    let report = match handle.join() {
        Ok(result) => result?,
        Err(_) => return Err("the batch worker panicked".into()),
    };
    print_summary(&report);
    Ok(report)
}

/// Drives a progress bar from the batch's updates until the batch hangs up.
fn render_progress(rx: Receiver<ProgressUpdate>) {
    term::init(false);
    let mut pbar = tqdm!(
        total = PROGRESS_STEPS,
        desc = "compressing",
        position = 0,
        force_refresh = true
    );

    let mut last_message = String::new();
    for update in rx {
        pbar.set_postfix(update.message.clone());
        let _ = pbar.update_to((update.progress * PROGRESS_STEPS as f64) as usize);
        last_message = update.message;
    }

    eprintln!();
    println!("{}", last_message);
}

fn print_summary(report: &BatchReport) {
    for output in &report.outputs {
        let size = match fs::metadata(output) {
            Ok(metadata) => metadata.len().human_count_bytes().to_string(),
            Err(_) => String::from("missing"),
        };
        println!("  {} ({})", output.display(), size);
    }
    for (input, reason) in &report.failures {
        println!("  failed: {} ({})", input.display(), reason);
    }
    println!("{} of {} file(s) compressed.", report.outputs.len(), report.attempted);
}
