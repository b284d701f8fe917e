//! Batch conversion: raw frames in, motion table and report out.
//!
//! Frames are processed strictly in order. The only state carried between
//! frames is the solver's hold-last-valid state and the neutral-face
//! calibration, both threaded through the loop explicitly.

use crate::blendshape::{self, Calibration};
use crate::config::{ConverterConfig, MalformedPolicy};
use crate::export::{self, BlendshapeFormat};
use crate::landmark::{normalize_frame, parse_frames, RawFrame};
use crate::motion::{MotionAccumulator, MotionTable};
use crate::skeleton::Skeleton;
use crate::solver::{PoseSolver, SolverState};
use crate::{MocapError, Result};

/// Receives `(frames_done, frames_total)` after every input frame.
pub trait ProgressSink {
    fn report(&mut self, done: usize, total: usize);
}

impl<F: FnMut(usize, usize)> ProgressSink for F {
    fn report(&mut self, done: usize, total: usize) {
        self(done, total)
    }
}

/// Progress sink that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _done: usize, _total: usize) {}
}

/// What happened during a conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    pub input_frames: usize,
    pub processed_frames: usize,
    /// Input indices dropped under [`MalformedPolicy::Skip`].
    pub skipped: Vec<usize>,
    /// Joint solves that reused an earlier rotation because their landmarks
    /// were unreliable, summed over all frames.
    pub held_joints: usize,
    /// Joint solves with no landmarks at all because the frame lacked their
    /// hand section, summed over all frames.
    pub untracked_joints: usize,
    /// Frames that carried face landmarks.
    pub face_frames: usize,
}

/// Result of a successful conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    skeleton: Skeleton,
    motion: MotionTable,
    report: ConversionReport,
}

impl Conversion {
    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn motion(&self) -> &MotionTable {
        &self.motion
    }

    pub fn report(&self) -> &ConversionReport {
        &self.report
    }

    pub fn to_bvh(&self) -> Result<String> {
        export::bvh_string(&self.skeleton, &self.motion)
    }

    pub fn to_blendshape_csv(&self) -> Result<String> {
        export::blendshape_string(&self.motion, BlendshapeFormat::Csv)
    }

    pub fn to_blendshape_json(&self) -> Result<String> {
        export::blendshape_string(&self.motion, BlendshapeFormat::Json)
    }
}

/// Converts landmark frames into BVH motion and blendshape weights.
#[derive(Debug, Clone)]
pub struct Converter {
    config: ConverterConfig,
    skeleton: Skeleton,
}

impl Converter {
    /// Builds the converter and its skeleton.
    pub fn new(config: ConverterConfig) -> Result<Self> {
        let skeleton = Skeleton::standard(config.solver.root_translation)?;
        Ok(Self { config, skeleton })
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// Parses a JSON array of frames and converts it.
    pub fn convert_json(
        &self,
        json: &str,
        fps: f64,
        progress: &mut dyn ProgressSink,
    ) -> Result<Conversion> {
        let frames = parse_frames(json)?;
        self.convert(&frames, fps, progress)
    }

    pub fn convert(
        &self,
        frames: &[RawFrame],
        fps: f64,
        progress: &mut dyn ProgressSink,
    ) -> Result<Conversion> {
        if frames.is_empty() {
            return Err(MocapError::EmptyInput);
        }

        let total = frames.len();
        let solver = PoseSolver::new(&self.skeleton, self.config.solver.clone());
        let mut accumulator = MotionAccumulator::with_arity(fps, self.skeleton.channel_count())?;
        let mut state = SolverState::new();
        let mut calibration: Option<Calibration> = None;
        let mut report = ConversionReport {
            input_frames: total,
            ..Default::default()
        };

        for (index, raw) in frames.iter().enumerate() {
            let frame = match normalize_frame(index, raw) {
                Ok(frame) => frame,
                Err(err) if self.config.malformed == MalformedPolicy::Skip => {
                    tracing::warn!(frame = index, %err, "skipping malformed frame");
                    report.skipped.push(index);
                    progress.report(index + 1, total);
                    continue;
                }
                Err(err) => return Err(err),
            };

            // The first frame that survives normalization is the neutral face.
            let neutral = calibration.get_or_insert_with(|| {
                if self.config.blendshape.calibrate_from_first_frame {
                    Calibration::capture(&frame).unwrap_or_default()
                } else {
                    Calibration::default()
                }
            });

            let (solved, next) = solver.solve(&frame, state);
            state = next;
            if !solved.held.is_empty() {
                tracing::debug!(frame = index, held = solved.held.len(), "holding joint rotations");
            }
            report.held_joints += solved.held.len();
            report.untracked_joints += solved.untracked.len();
            if frame.has_face() {
                report.face_frames += 1;
            }

            let weights = blendshape::extract(&frame, neutral);
            accumulator.push(solved.channels, weights)?;
            progress.report(index + 1, total);
        }

        let motion = accumulator.finish()?;
        report.processed_frames = motion.frame_count();
        tracing::info!(
            input = report.input_frames,
            processed = report.processed_frames,
            skipped = report.skipped.len(),
            held = report.held_joints,
            untracked = report.untracked_joints,
            "conversion finished"
        );

        Ok(Conversion {
            skeleton: self.skeleton.clone(),
            motion,
            report,
        })
    }
}
