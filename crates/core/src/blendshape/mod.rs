//! Facial blendshape weights from face-mesh distance ratios.
//!
//! Every unit measures one landmark pair, divided by the distance between the
//! outer eye corners so head distance from the camera cancels out. The weight
//! is the change from the neutral face over the unit's full-activation range.

use crate::landmark::{Frame, Landmark, FACE_COUNT};

/// Outer corners of the eyes; the denominator of every metric.
const REFERENCE_PAIR: (usize, usize) = (33, 263);

/// A facial expression unit driven by one landmark-pair distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendshapeUnit {
    pub name: &'static str,
    pub pair: (usize, usize),
    /// +1 when the distance grows with the expression, -1 when it shrinks.
    pub direction: f64,
    /// Neutral metric used when no neutral frame was captured.
    pub neutral: f64,
    /// Metric change that maps to a weight of 1.
    pub range: f64,
}

const fn unit(
    name: &'static str,
    pair: (usize, usize),
    direction: f64,
    neutral: f64,
    range: f64,
) -> BlendshapeUnit {
    BlendshapeUnit {
        name,
        pair,
        direction,
        neutral,
        range,
    }
}

pub const UNIT_COUNT: usize = 8;

pub const BLENDSHAPE_UNITS: [BlendshapeUnit; UNIT_COUNT] = [
    unit("jawOpen", (13, 14), 1.0, 0.02, 0.35),
    unit("mouthSmileLeft", (291, 152), 1.0, 0.55, 0.08),
    unit("mouthSmileRight", (61, 152), 1.0, 0.55, 0.08),
    unit("mouthPucker", (61, 291), -1.0, 0.55, 0.15),
    unit("browOuterUpLeft", (334, 386), 1.0, 0.20, 0.08),
    unit("browOuterUpRight", (105, 159), 1.0, 0.20, 0.08),
    unit("eyeBlinkLeft", (386, 374), -1.0, 0.11, 0.09),
    unit("eyeBlinkRight", (159, 145), -1.0, 0.11, 0.09),
];

/// Unit names in weight order.
pub fn unit_names() -> impl Iterator<Item = &'static str> {
    BLENDSHAPE_UNITS.iter().map(|unit| unit.name)
}

/// One frame's weights, in [`BLENDSHAPE_UNITS`] order. Each weight is in
/// [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlendshapeVector {
    weights: [f64; UNIT_COUNT],
}

impl BlendshapeVector {
    pub fn zeros() -> Self {
        Self::default()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        BLENDSHAPE_UNITS
            .iter()
            .position(|unit| unit.name == name)
            .map(|index| self.weights[index])
    }

    pub fn is_zero(&self) -> bool {
        self.weights.iter().all(|w| *w == 0.0)
    }
}

/// Neutral metrics the weights are measured against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    neutral: [f64; UNIT_COUNT],
}

impl Default for Calibration {
    /// Built-in neutral face constants.
    fn default() -> Self {
        let mut neutral = [0.0; UNIT_COUNT];
        for (slot, unit) in neutral.iter_mut().zip(BLENDSHAPE_UNITS.iter()) {
            *slot = unit.neutral;
        }
        Self { neutral }
    }
}

impl Calibration {
    /// Captures the neutral face from `frame`. `None` if the frame has no
    /// usable face data.
    pub fn capture(frame: &Frame) -> Option<Self> {
        frame
            .face()
            .and_then(metrics)
            .map(|neutral| Self { neutral })
    }
}

/// Computes blendshape weights for a frame. Frames without face data, or
/// with a degenerate face, produce all zeros.
pub fn extract(frame: &Frame, calibration: &Calibration) -> BlendshapeVector {
    let Some(current) = frame.face().and_then(metrics) else {
        return BlendshapeVector::zeros();
    };

    let mut weights = [0.0; UNIT_COUNT];
    for (index, unit) in BLENDSHAPE_UNITS.iter().enumerate() {
        let weight = (current[index] - calibration.neutral[index]) * unit.direction / unit.range;
        weights[index] = if weight.is_finite() {
            weight.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }
    BlendshapeVector { weights }
}

fn metrics(face: &[Landmark]) -> Option<[f64; UNIT_COUNT]> {
    if face.len() != FACE_COUNT {
        return None;
    }
    let reference = distance(face, REFERENCE_PAIR);
    if !reference.is_finite() || reference < 1e-9 {
        return None;
    }

    let mut metrics = [0.0; UNIT_COUNT];
    for (slot, unit) in metrics.iter_mut().zip(BLENDSHAPE_UNITS.iter()) {
        *slot = distance(face, unit.pair) / reference;
    }
    Some(metrics)
}

fn distance(face: &[Landmark], (a, b): (usize, usize)) -> f64 {
    let (a, b) = (&face[a], &face[b]);
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2) + (a.z - b.z).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::test_support::{neutral_face, t_pose_body};

    fn frame_with_face(face: &[Landmark]) -> Frame {
        Frame::from_body(&t_pose_body())
            .and_then(|frame| frame.with_face(face))
            .unwrap()
    }

    #[test]
    fn units_reference_face_mesh_indices() {
        for unit in BLENDSHAPE_UNITS {
            assert!(unit.pair.0 < FACE_COUNT && unit.pair.1 < FACE_COUNT, "{}", unit.name);
            assert!(unit.range > 0.0);
        }
        assert_eq!(unit_names().count(), UNIT_COUNT);
    }

    #[test]
    fn missing_face_yields_zeros() {
        let frame = Frame::from_body(&t_pose_body()).unwrap();
        let weights = extract(&frame, &Calibration::default());
        assert!(weights.is_zero());
        assert!(Calibration::capture(&frame).is_none());
    }

    #[test]
    fn neutral_frame_is_zero_against_itself() {
        let frame = frame_with_face(&neutral_face());
        let calibration = Calibration::capture(&frame).unwrap();
        assert!(extract(&frame, &calibration).is_zero());
    }

    #[test]
    fn open_jaw_raises_jaw_open() {
        let neutral = frame_with_face(&neutral_face());
        let calibration = Calibration::capture(&neutral).unwrap();

        let mut face = neutral_face();
        face[14].y += 0.033;
        let weights = extract(&frame_with_face(&face), &calibration);

        let jaw = weights.get("jawOpen").unwrap();
        assert!(jaw > 0.9 && jaw <= 1.0, "jawOpen = {jaw}");
        assert_eq!(weights.get("eyeBlinkLeft"), Some(0.0));
    }

    #[test]
    fn closed_eye_blinks() {
        let neutral = frame_with_face(&neutral_face());
        let calibration = Calibration::capture(&neutral).unwrap();

        let mut face = neutral_face();
        face[374] = face[386];
        let weights = extract(&frame_with_face(&face), &calibration);
        assert_eq!(weights.get("eyeBlinkLeft"), Some(1.0));
        assert_eq!(weights.get("eyeBlinkRight"), Some(0.0));
    }

    #[test]
    fn collapsed_face_yields_zeros() {
        let face = vec![Landmark::new(0.5, 0.5, 0.0); FACE_COUNT];
        let weights = extract(&frame_with_face(&face), &Calibration::default());
        assert!(weights.is_zero());
    }

    proptest! {
        #[test]
        fn weights_stay_in_unit_range(
            coords in proptest::collection::vec(
                (-1e3f64..1e3, -1e3f64..1e3, -1e3f64..1e3),
                FACE_COUNT,
            ),
            neutral in proptest::collection::vec(-10.0f64..10.0, UNIT_COUNT),
        ) {
            let face: Vec<Landmark> =
                coords.iter().map(|&(x, y, z)| Landmark::new(x, y, z)).collect();
            let frame = frame_with_face(&face);
            let mut calibration = Calibration::default();
            calibration.neutral.copy_from_slice(&neutral);

            for weight in extract(&frame, &calibration).weights() {
                prop_assert!((0.0..=1.0).contains(weight));
            }
        }
    }
}
