//! Core library for the pose landmark to BVH converter.
//!
//! Raw landmark frames flow through the normalizer ([`landmark`]), the
//! rotation solver ([`solver`]) and the blendshape extractor
//! ([`blendshape`]). The results collect in a [`MotionTable`] and are rendered
//! by [`export`]. [`Converter`] wires the stages together for batch use.

pub mod blendshape;
pub mod config;
pub mod error;
pub mod export;
pub mod landmark;
pub mod motion;
pub mod pipeline;
pub mod skeleton;
pub mod solver;

#[cfg(test)]
mod test_support;

pub use blendshape::{BlendshapeUnit, BlendshapeVector, Calibration, BLENDSHAPE_UNITS};
pub use config::{BlendshapeConfig, ConverterConfig, MalformedPolicy, SolverConfig};
pub use error::{MocapError, Result};
pub use export::{parse_motion, BlendshapeFormat, ParsedMotion};
pub use landmark::{
    normalize_frame, parse_frames, BodyLandmark, Frame, HandLandmark, Landmark, LandmarkId,
    RawFrame, RawLandmark, Side,
};
pub use motion::{MotionAccumulator, MotionFrame, MotionTable};
pub use pipeline::{Conversion, ConversionReport, Converter, NoProgress, ProgressSink};
pub use skeleton::{Channel, Joint, Skeleton};
pub use solver::{PoseSolver, SolvedFrame, SolverState};
