use crate::blendshape::BlendshapeVector;
use crate::{MocapError, Result};

/// One processed frame: skeleton channels plus facial weights.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionFrame {
    pub channels: Vec<f64>,
    pub blendshapes: BlendshapeVector,
}

/// Rectangular, read-only motion data handed to the serializers.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionTable {
    fps: f64,
    channel_count: usize,
    frames: Vec<MotionFrame>,
}

impl MotionTable {
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Seconds per frame.
    pub fn frame_time(&self) -> f64 {
        1.0 / self.fps
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn frames(&self) -> &[MotionFrame] {
        &self.frames
    }

    pub fn channel_rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.frames.iter().map(|frame| frame.channels.as_slice())
    }
}

/// Collects frames in arrival order. Every channel vector must have the same
/// length; the first one pushed fixes it unless set up front.
#[derive(Debug)]
pub struct MotionAccumulator {
    fps: f64,
    arity: Option<usize>,
    frames: Vec<MotionFrame>,
}

impl MotionAccumulator {
    pub fn new(fps: f64) -> Result<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(MocapError::InvalidFrameRate(fps));
        }
        Ok(Self {
            fps,
            arity: None,
            frames: Vec::new(),
        })
    }

    pub fn with_arity(fps: f64, arity: usize) -> Result<Self> {
        let mut accumulator = Self::new(fps)?;
        accumulator.arity = Some(arity);
        Ok(accumulator)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn push(&mut self, channels: Vec<f64>, blendshapes: BlendshapeVector) -> Result<()> {
        let expected = *self.arity.get_or_insert(channels.len());
        if channels.len() != expected {
            return Err(MocapError::ChannelArityMismatch {
                frame: self.frames.len(),
                expected,
                found: channels.len(),
            });
        }
        self.frames.push(MotionFrame {
            channels,
            blendshapes,
        });
        Ok(())
    }

    /// Hands the collected frames over as a [`MotionTable`].
    pub fn finish(self) -> Result<MotionTable> {
        if self.frames.is_empty() {
            return Err(MocapError::EmptyInput);
        }
        Ok(MotionTable {
            fps: self.fps,
            channel_count: self.arity.unwrap_or_default(),
            frames: self.frames,
        })
    }
}
