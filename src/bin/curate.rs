//! Partition captured frames into training and validation sets.
//!
//! Counterpart to the ingest server: consumes the frame files the server
//! wrote, groups them into motion events by the timestamps in their names,
//! and moves each event whole into the train or valid directory.

use anyhow::{ensure, Context, Result};
use chrono::Duration;
use clap::Parser;
use fauna_watch::{dataset_split, motion_events};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Split captured frames into training and validation sets, keeping each motion event whole"
)]
struct Args {
    /// Directory with captured frame files
    source_directory: PathBuf,

    /// Destination for training files
    train_directory: PathBuf,

    /// Destination for validation files
    valid_directory: PathBuf,

    /// Fraction of motion events that go to the training set
    #[arg(long, default_value_t = 0.8)]
    ratio: f64,

    /// Maximum seconds between consecutive frames of one motion event
    #[arg(long, default_value_t = motion_events::DEFAULT_MAX_GAP_SECS)]
    max_gap_secs: i64,

    /// Seed for the split; omit for a different split every run
    #[arg(long)]
    seed: Option<u64>,

    /// Print the moves without performing them
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    ensure!(
        args.ratio > 0.0 && args.ratio < 1.0,
        "--ratio must be between 0 and 1, exclusive"
    );
    ensure!(args.max_gap_secs > 0, "--max-gap-secs must be positive");

    let frame_files = collect_frame_files(&args.source_directory)?;
    ensure!(
        !frame_files.is_empty(),
        "no .png frame files in {}",
        args.source_directory.display()
    );

    let events =
        motion_events::group_frame_files(frame_files, Duration::seconds(args.max_gap_secs))
            .context("failed to group frames into motion events")?;
    let event_count = events.len();
    let groups: Vec<Vec<PathBuf>> = events.into_iter().map(|event| event.frames).collect();

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let (train, valid) = dataset_split::split_groups(groups, args.ratio, &mut rng);

    move_files(&train, &args.train_directory, args.dry_run)?;
    move_files(&valid, &args.valid_directory, args.dry_run)?;

    println!(
        "{} motion events: {} files to {}, {} files to {}",
        event_count,
        train.len(),
        args.train_directory.display(),
        valid.len(),
        args.valid_directory.display()
    );

    Ok(())
}

/// All .png frame files directly inside the source directory.
fn collect_frame_files(source: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(source)
        .with_context(|| format!("failed to read {}", source.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to read an entry of {}", source.display()))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "png") {
            files.push(path);
        }
    }
    Ok(files)
}

/// Move files into the destination, creating it on demand.
fn move_files(files: &[PathBuf], destination: &Path, dry_run: bool) -> Result<()> {
    if dry_run {
        println!("mkdir {}", destination.display());
    } else {
        fs::create_dir_all(destination)
            .with_context(|| format!("failed to create {}", destination.display()))?;
    }

    for file in files {
        let file_name = file
            .file_name()
            .with_context(|| format!("{} has no file name", file.display()))?;
        let target = destination.join(file_name);
        if dry_run {
            println!("mv {} {}", file.display(), target.display());
        } else {
            fs::rename(file, &target).with_context(|| {
                format!("failed to move {} to {}", file.display(), target.display())
            })?;
        }
    }
    Ok(())
}
