//! Synthetic landmark fixtures shared by the unit tests.

use crate::landmark::{BodyLandmark, Landmark, BODY_COUNT, FACE_COUNT};

/// Landmark at skeleton-space position `(x, y, z)` centimetres, using the
/// default unit scale of 100.
pub fn world_landmark(x: f64, y: f64, z: f64) -> Landmark {
    Landmark::new(x / 100.0 + 0.5, 0.5 - y / 100.0, -z / 100.0)
}

/// Body landmarks standing in the skeleton's rest T-pose.
pub fn t_pose_body() -> Vec<Landmark> {
    use BodyLandmark::*;

    let mut body = vec![world_landmark(0.0, 0.0, 0.0); BODY_COUNT];
    let mut set = |landmark: BodyLandmark, x: f64, y: f64, z: f64| {
        body[landmark as usize] = world_landmark(x, y, z);
    };

    set(Nose, 0.0, 62.0, 10.0);
    for (side, s) in [(0, 1.0), (1, -1.0)] {
        let pick = |left: BodyLandmark, right: BodyLandmark| if side == 0 { left } else { right };
        set(pick(LeftEyeInner, RightEyeInner), s * 1.5, 65.0, 8.0);
        set(pick(LeftEye, RightEye), s * 3.0, 65.0, 8.0);
        set(pick(LeftEyeOuter, RightEyeOuter), s * 4.5, 65.0, 8.0);
        set(pick(LeftEar, RightEar), s * 7.0, 62.0, 0.0);
        set(pick(MouthLeft, MouthRight), s * 2.5, 57.0, 8.0);
        set(pick(LeftShoulder, RightShoulder), s * 18.0, 50.0, 0.0);
        set(pick(LeftElbow, RightElbow), s * 46.0, 50.0, 0.0);
        set(pick(LeftWrist, RightWrist), s * 71.0, 50.0, 0.0);
        set(pick(LeftPinky, RightPinky), s * 79.0, 50.0, -1.0);
        set(pick(LeftIndex, RightIndex), s * 79.0, 50.0, 1.0);
        set(pick(LeftThumb, RightThumb), s * 76.0, 50.0, 3.0);
        set(pick(LeftHip, RightHip), s * 9.0, 0.0, 0.0);
        set(pick(LeftKnee, RightKnee), s * 9.0, -42.0, 0.0);
        set(pick(LeftAnkle, RightAnkle), s * 9.0, -82.0, 0.0);
        set(pick(LeftHeel, RightHeel), s * 9.0, -86.0, -4.0);
        set(pick(LeftFootIndex, RightFootIndex), s * 9.0, -88.0, 14.0);
    }
    body
}

/// A relaxed face: closed mouth, open eyes, eye corners 0.1 apart.
pub fn neutral_face() -> Vec<Landmark> {
    let mut face = vec![Landmark::new(0.5, 0.5, 0.0); FACE_COUNT];
    let points: [(usize, f64, f64); 15] = [
        (33, 0.45, 0.4),
        (263, 0.55, 0.4),
        (13, 0.5, 0.6),
        (14, 0.5, 0.602),
        (61, 0.475, 0.6),
        (291, 0.525, 0.6),
        (152, 0.5, 0.65),
        (334, 0.54, 0.36),
        (386, 0.54, 0.38),
        (374, 0.54, 0.391),
        (105, 0.46, 0.36),
        (159, 0.46, 0.38),
        (145, 0.46, 0.391),
        (10, 0.5, 0.3),
        (1, 0.5, 0.5),
    ];
    for (index, x, y) in points {
        face[index] = Landmark::new(x, y, 0.0);
    }
    face
}
