use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mocap_bvh_core::{
    export, parse_motion, BlendshapeFormat, ConverterConfig, Converter, MalformedPolicy,
    ProgressSink,
};
use tracing_subscriber::EnvFilter;

fn main() -> mocap_bvh_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            output,
            fps,
            blendshapes,
            config,
            skip_malformed,
        } => run_convert(
            &input,
            &output,
            fps,
            blendshapes.as_deref(),
            config.as_deref(),
            skip_malformed,
        ),
        Commands::Inspect { input } => run_inspect(&input),
    }
}

fn run_convert(
    input: &Path,
    output: &Path,
    fps: f64,
    blendshapes: Option<&Path>,
    config: Option<&Path>,
    skip_malformed: bool,
) -> mocap_bvh_core::Result<()> {
    tracing::info!(?input, ?output, fps, "converting landmark frames");

    let mut config = match config {
        Some(path) => ConverterConfig::from_json_file(path)?,
        None => ConverterConfig::default(),
    };
    if skip_malformed {
        config.malformed = MalformedPolicy::Skip;
    }

    let converter = Converter::new(config)?;
    let json = std::fs::read_to_string(input)?;
    let conversion = converter.convert_json(&json, fps, &mut LogProgress::default())?;

    std::fs::write(output, conversion.to_bvh()?)?;

    if let Some(path) = blendshapes {
        let format = if path.extension().is_some_and(|ext| ext == "json") {
            BlendshapeFormat::Json
        } else {
            BlendshapeFormat::Csv
        };
        std::fs::write(path, export::blendshape_string(conversion.motion(), format)?)?;
        tracing::info!(?path, ?format, "wrote blendshape stream");
    }

    let report = conversion.report();
    tracing::info!(
        input_frames = report.input_frames,
        processed_frames = report.processed_frames,
        skipped = ?report.skipped,
        held_joints = report.held_joints,
        untracked_joints = report.untracked_joints,
        face_frames = report.face_frames,
        "wrote {}",
        output.display()
    );
    Ok(())
}

fn run_inspect(input: &Path) -> mocap_bvh_core::Result<()> {
    let text = std::fs::read_to_string(input)?;
    let motion = parse_motion(&text)?;
    tracing::info!(
        ?input,
        frames = motion.frame_count(),
        frame_time = motion.frame_time,
        channels = motion.channel_count,
        "motion section is consistent"
    );
    Ok(())
}

/// Logs progress roughly every tenth of the input.
#[derive(Debug, Default)]
struct LogProgress {
    last_decile: usize,
}

impl LogProgress {
    /// Whether `done` crosses into a new tenth of `total`, or finishes it.
    fn advance(&mut self, done: usize, total: usize) -> bool {
        let decile = done * 10 / total.max(1);
        if decile > self.last_decile || done == total {
            self.last_decile = decile;
            true
        } else {
            false
        }
    }
}

impl ProgressSink for LogProgress {
    fn report(&mut self, done: usize, total: usize) {
        if self.advance(done, total) {
            tracing::info!(done, total, "converted frames");
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert pose landmark JSON into BVH motion", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a JSON array of landmark frames into a BVH file.
    Convert {
        /// Landmark frames, as written by the pose extractor.
        input: PathBuf,
        /// Output path for the BVH file.
        output: PathBuf,
        /// Frame rate of the captured sequence.
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
        /// Also write facial blendshape weights here (`.json` for JSON,
        /// anything else for CSV).
        #[arg(short, long)]
        blendshapes: Option<PathBuf>,
        /// JSON converter configuration.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Drop malformed frames instead of aborting.
        #[arg(long)]
        skip_malformed: bool,
    },
    /// Check the MOTION section of a BVH file.
    Inspect {
        /// BVH file to read.
        input: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_logs_once_per_tenth() {
        let mut progress = LogProgress::default();
        let logged: Vec<usize> = (1..=100).filter(|&done| progress.advance(done, 100)).collect();
        assert_eq!(logged, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);

        let mut short = LogProgress::default();
        assert!(short.advance(1, 1));
    }
}
