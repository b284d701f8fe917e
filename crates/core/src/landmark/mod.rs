//! Landmark enumeration, typed frames, and the normalizer that turns raw
//! per-frame JSON into them.
//!
//! Every [`Frame`] uses the holistic layout: 33 body points, 21 points per
//! hand, then the 468-point face mesh. Sections missing from the raw input are
//! filled with zero-visibility placeholders so the frame length never varies.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::{MocapError, Result};

pub const BODY_COUNT: usize = 33;
pub const HAND_COUNT: usize = 21;
pub const FACE_COUNT: usize = 468;
pub const LANDMARK_COUNT: usize = BODY_COUNT + 2 * HAND_COUNT + FACE_COUNT;

const LEFT_HAND_START: usize = BODY_COUNT;
const RIGHT_HAND_START: usize = LEFT_HAND_START + HAND_COUNT;
const FACE_START: usize = RIGHT_HAND_START + HAND_COUNT;

/// Body keypoints in the order produced by the pose tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyLandmark {
    pub const fn id(self) -> LandmarkId {
        LandmarkId(self as usize)
    }
}

/// Hand keypoints, shared by both hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist = 0,
    ThumbCmc = 1,
    ThumbMcp = 2,
    ThumbIp = 3,
    ThumbTip = 4,
    IndexMcp = 5,
    IndexPip = 6,
    IndexDip = 7,
    IndexTip = 8,
    MiddleMcp = 9,
    MiddlePip = 10,
    MiddleDip = 11,
    MiddleTip = 12,
    RingMcp = 13,
    RingPip = 14,
    RingDip = 15,
    RingTip = 16,
    PinkyMcp = 17,
    PinkyPip = 18,
    PinkyDip = 19,
    PinkyTip = 20,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn name(self) -> &'static str {
        match self {
            Side::Left => "Left",
            Side::Right => "Right",
        }
    }

    /// +1 for the left side of the character, -1 for the right. The skeleton
    /// faces +Z, so the character's left lies along +X.
    pub fn sign(self) -> f64 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }

    pub fn pick(self, left: BodyLandmark, right: BodyLandmark) -> BodyLandmark {
        match self {
            Side::Left => left,
            Side::Right => right,
        }
    }
}

/// Flat index into a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LandmarkId(pub usize);

impl LandmarkId {
    pub const fn body(landmark: BodyLandmark) -> Self {
        landmark.id()
    }

    pub const fn hand(side: Side, landmark: HandLandmark) -> Self {
        let start = match side {
            Side::Left => LEFT_HAND_START,
            Side::Right => RIGHT_HAND_START,
        };
        Self(start + landmark as usize)
    }

    /// Face mesh vertex `index` (0..468).
    pub const fn face(index: usize) -> Self {
        Self(FACE_START + index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// How a joint or aim point is located in a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LandmarkRef {
    Single(LandmarkId),
    Midpoint(LandmarkId, LandmarkId),
}

impl LandmarkRef {
    pub fn ids(&self) -> impl Iterator<Item = LandmarkId> {
        let (a, b) = match *self {
            LandmarkRef::Single(id) => (id, None),
            LandmarkRef::Midpoint(a, b) => (a, Some(b)),
        };
        std::iter::once(a).chain(b)
    }
}

impl From<BodyLandmark> for LandmarkRef {
    fn from(value: BodyLandmark) -> Self {
        LandmarkRef::Single(value.id())
    }
}

impl From<LandmarkId> for LandmarkRef {
    fn from(value: LandmarkId) -> Self {
        LandmarkRef::Single(value)
    }
}

/// One tracked point in normalized camera space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub visibility: f64,
}

impl Landmark {
    pub const MISSING: Landmark = Landmark {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        visibility: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility: 1.0,
        }
    }
}

/// A normalized frame. Always [`LANDMARK_COUNT`] landmarks long.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    landmarks: Vec<Landmark>,
    has_face: bool,
    has_left_hand: bool,
    has_right_hand: bool,
}

impl Frame {
    /// Builds a body-only frame from exactly [`BODY_COUNT`] landmarks.
    pub fn from_body(body: &[Landmark]) -> Option<Self> {
        if body.len() != BODY_COUNT {
            return None;
        }
        let mut landmarks = vec![Landmark::MISSING; LANDMARK_COUNT];
        landmarks[..BODY_COUNT].copy_from_slice(body);
        Some(Self {
            landmarks,
            has_face: false,
            has_left_hand: false,
            has_right_hand: false,
        })
    }

    /// Attaches face mesh points. Returns `None` unless exactly
    /// [`FACE_COUNT`] points are given.
    pub fn with_face(mut self, face: &[Landmark]) -> Option<Self> {
        if face.len() != FACE_COUNT {
            return None;
        }
        self.landmarks[FACE_START..].copy_from_slice(face);
        self.has_face = true;
        Some(self)
    }

    /// Attaches one hand's points. Returns `None` unless exactly
    /// [`HAND_COUNT`] points are given.
    pub fn with_hand(mut self, side: Side, hand: &[Landmark]) -> Option<Self> {
        if hand.len() != HAND_COUNT {
            return None;
        }
        let start = LandmarkId::hand(side, HandLandmark::Wrist).index();
        self.landmarks[start..start + HAND_COUNT].copy_from_slice(hand);
        match side {
            Side::Left => self.has_left_hand = true,
            Side::Right => self.has_right_hand = true,
        }
        Some(self)
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn get(&self, id: LandmarkId) -> Option<&Landmark> {
        self.landmarks.get(id.index())
    }

    pub fn has_face(&self) -> bool {
        self.has_face
    }

    pub fn has_hand(&self, side: Side) -> bool {
        match side {
            Side::Left => self.has_left_hand,
            Side::Right => self.has_right_hand,
        }
    }

    /// Whether the section holding `id` was present in the raw frame. Body
    /// landmarks always are.
    pub fn tracks(&self, id: LandmarkId) -> bool {
        match id.index() {
            i if i < LEFT_HAND_START => true,
            i if i < RIGHT_HAND_START => self.has_left_hand,
            i if i < FACE_START => self.has_right_hand,
            i if i < LANDMARK_COUNT => self.has_face,
            _ => false,
        }
    }

    /// The face mesh section, if the frame carried one.
    pub fn face(&self) -> Option<&[Landmark]> {
        self.has_face.then(|| &self.landmarks[FACE_START..])
    }

    /// Lowest visibility among the landmarks `reference` depends on.
    pub fn visibility(&self, reference: &LandmarkRef) -> f64 {
        reference
            .ids()
            .map(|id| self.get(id).map_or(0.0, |lm| lm.visibility))
            .fold(f64::INFINITY, f64::min)
    }

    /// Position of `reference` in skeleton space: Y up, character facing +Z,
    /// centred on the middle of the image.
    pub fn world_position(&self, reference: &LandmarkRef, scale: f64) -> DVec3 {
        match *reference {
            LandmarkRef::Single(id) => self.world_point(id, scale),
            LandmarkRef::Midpoint(a, b) => {
                (self.world_point(a, scale) + self.world_point(b, scale)) * 0.5
            }
        }
    }

    fn world_point(&self, id: LandmarkId, scale: f64) -> DVec3 {
        let lm = self.get(id).copied().unwrap_or(Landmark::MISSING);
        DVec3::new(lm.x - 0.5, 0.5 - lm.y, -lm.z) * scale
    }
}

/// One landmark as it arrives from the tracker. `visibility` is optional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawLandmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub visibility: Option<f64>,
}

/// Holistic capture: body plus optional face and hands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolisticFrame {
    #[serde(alias = "poseLandmarks")]
    pub pose: Vec<RawLandmark>,
    #[serde(default, alias = "faceLandmarks")]
    pub face: Option<Vec<RawLandmark>>,
    #[serde(default, alias = "leftHandLandmarks")]
    pub left_hand: Option<Vec<RawLandmark>>,
    #[serde(default, alias = "rightHandLandmarks")]
    pub right_hand: Option<Vec<RawLandmark>>,
}

/// A raw frame in either accepted JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFrame {
    /// Flat array of body landmarks.
    Pose(Vec<RawLandmark>),
    Holistic(HolisticFrame),
    /// Anything else. Kept so one bad frame does not fail the whole document;
    /// the normalizer rejects it.
    Unrecognized(serde_json::Value),
    /// Frame text that could not be read at all, such as a number too large
    /// for an `f64`. Holds the reader's message.
    #[serde(skip)]
    Unreadable(String),
}

/// Parses a JSON document holding an array of frames. Only the outer array
/// must be well formed; each frame is read on its own so a bad one surfaces
/// as a per-frame error from [`normalize_frame`].
pub fn parse_frames(json: &str) -> Result<Vec<RawFrame>> {
    let frames: Vec<Box<RawValue>> = serde_json::from_str(json)?;
    Ok(frames
        .iter()
        .map(|frame| {
            serde_json::from_str(frame.get())
                .unwrap_or_else(|err| RawFrame::Unreadable(err.to_string()))
        })
        .collect())
}

/// Validates `raw` and reshapes it into a [`Frame`]. `index` is only used
/// for error reporting.
pub fn normalize_frame(index: usize, raw: &RawFrame) -> Result<Frame> {
    match raw {
        RawFrame::Pose(pose) => body_frame(index, pose),
        RawFrame::Holistic(holistic) => {
            let mut frame = body_frame(index, &holistic.pose)?;
            if let Some(face) = &holistic.face {
                let face = convert_section(index, "face", face, FACE_COUNT)?;
                frame = frame
                    .with_face(&face)
                    .ok_or_else(|| MocapError::malformed(index, "face section rejected"))?;
            }
            for (side, hand) in [
                (Side::Left, &holistic.left_hand),
                (Side::Right, &holistic.right_hand),
            ] {
                if let Some(hand) = hand {
                    let section = format!("{} hand", side.name().to_lowercase());
                    let hand = convert_section(index, &section, hand, HAND_COUNT)?;
                    frame = frame
                        .with_hand(side, &hand)
                        .ok_or_else(|| MocapError::malformed(index, "hand section rejected"))?;
                }
            }
            Ok(frame)
        }
        RawFrame::Unrecognized(value) => Err(MocapError::malformed(index, describe_shape(value))),
        RawFrame::Unreadable(reason) => {
            Err(MocapError::malformed(index, format!("unreadable frame: {reason}")))
        }
    }
}

fn body_frame(index: usize, pose: &[RawLandmark]) -> Result<Frame> {
    let body = convert_section(index, "pose", pose, BODY_COUNT)?;
    Frame::from_body(&body).ok_or_else(|| MocapError::malformed(index, "pose section rejected"))
}

fn convert_section(
    index: usize,
    section: &str,
    raw: &[RawLandmark],
    expected: usize,
) -> Result<Vec<Landmark>> {
    if raw.len() != expected {
        return Err(MocapError::malformed(
            index,
            format!(
                "{section} has {} landmarks, expected {expected}",
                raw.len()
            ),
        ));
    }

    raw.iter()
        .enumerate()
        .map(|(i, lm)| {
            if !(lm.x.is_finite() && lm.y.is_finite() && lm.z.is_finite()) {
                return Err(MocapError::malformed(
                    index,
                    format!("{section} landmark {i} has a non-finite coordinate"),
                ));
            }
            let visibility = match lm.visibility {
                Some(v) if v.is_nan() => {
                    return Err(MocapError::malformed(
                        index,
                        format!("{section} landmark {i} has a NaN visibility"),
                    ))
                }
                Some(v) => v.clamp(0.0, 1.0),
                None => 1.0,
            };
            Ok(Landmark {
                x: lm.x,
                y: lm.y,
                z: lm.z,
                visibility,
            })
        })
        .collect()
}

fn describe_shape(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Array(_) => {
            match serde_json::from_value::<Vec<RawLandmark>>(value.clone()) {
                Err(err) => format!("invalid landmark array: {err}"),
                Ok(_) => "invalid landmark array".to_string(),
            }
        }
        serde_json::Value::Object(_) => {
            match serde_json::from_value::<HolisticFrame>(value.clone()) {
                Err(err) => format!("invalid holistic frame: {err}"),
                Ok(_) => "invalid holistic frame".to_string(),
            }
        }
        other => format!("expected an array or object, found {}", json_kind(other)),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
