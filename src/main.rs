use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use motion_photo_muxer::{
    locate_explicit, locate_in_dir, logging, Batch, BatchConfig, Error, MergeOptions, Merger,
    Pairs, Verbosity, DEFAULT_PRESENTATION_TIMESTAMP_US,
};
use tracing::warn;

/// Exit code for bad arguments and inputs rejected before processing
const EXIT_USAGE: u8 = 2;
/// Exit code when no pair merged
const EXIT_NOTHING_MERGED: u8 = 1;

#[derive(Debug, Parser)]
#[command(
    name = "motion-photo-muxer",
    version,
    about = "Merge a photo and a video into a Microvideo-formatted Google Motion Photo"
)]
struct Cli {
    /// Process every photo/video pair in this directory (takes precedence over --photo/--video)
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Recurse into subdirectories of --dir
    #[arg(long)]
    recurse: bool,

    /// Path to the JPEG photo
    #[arg(long, value_name = "FILE")]
    photo: Option<PathBuf>,

    /// Path to the MOV or MP4 video
    #[arg(long, value_name = "FILE")]
    video: Option<PathBuf>,

    /// Directory for merged files; photos are updated in place when omitted
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Value written to MicroVideoPresentationTimestampUs
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_PRESENTATION_TIMESTAMP_US,
        allow_negative_numbers = true
    )]
    presentation_timestamp_us: i64,

    /// Show progress and debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn locate(cli: &Cli) -> Result<Pairs> {
    if let Some(dir) = &cli.dir {
        if cli.photo.is_some() || cli.video.is_some() {
            warn!("--dir given, ignoring --photo/--video");
        }
        return locate_in_dir(dir, cli.recurse)
            .with_context(|| format!("cannot scan {}", dir.display()));
    }

    match (&cli.photo, &cli.video) {
        (Some(photo), Some(video)) => {
            locate_explicit(photo, video).context("cannot merge the given photo and video")
        }
        _ => Err(Error::InvalidInput(
            "either --dir or both --photo and --video are required".into(),
        )
        .into()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_verbose_flag(cli.verbose);
    if let Err(err) = logging::init_tracing(verbosity) {
        eprintln!("warning: logging unavailable: {}", err);
    }

    let pairs = match locate(&cli) {
        Ok(pairs) => pairs,
        Err(err) => {
            eprintln!("error: {:#}", err);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let mut options = MergeOptions::new().set_presentation_timestamp_us(cli.presentation_timestamp_us);
    if let Some(output) = &cli.output {
        options = options.set_output_dir(output);
    }

    let batch = Batch::new(Merger::new(options), BatchConfig { verbosity });
    let report = batch.run(pairs);
    print!("{}", report);

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_NOTHING_MERGED)
    }
}
