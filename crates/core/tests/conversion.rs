//! End-to-end conversions from landmark JSON to BVH and blendshape output.

use mocap_bvh_core::{
    parse_motion, BodyLandmark, Converter, ConverterConfig, MocapError, NoProgress,
    BLENDSHAPE_UNITS,
};
use serde_json::{json, Value};

const BODY_COUNT: usize = 33;
const FACE_COUNT: usize = 468;

/// Landmark JSON at skeleton-space centimetres.
fn point(x: f64, y: f64, z: f64) -> Value {
    json!({"x": x / 100.0 + 0.5, "y": 0.5 - y / 100.0, "z": -z / 100.0})
}

/// A body standing in the rest T-pose, without visibility fields.
fn t_pose() -> Vec<Value> {
    use BodyLandmark::*;

    let mut body = vec![point(0.0, 0.0, 0.0); BODY_COUNT];
    body[Nose as usize] = point(0.0, 62.0, 10.0);
    let sides = [
        (
            1.0,
            [
                LeftEar, LeftShoulder, LeftElbow, LeftWrist, LeftPinky, LeftIndex, LeftHip,
                LeftKnee, LeftAnkle, LeftFootIndex,
            ],
        ),
        (
            -1.0,
            [
                RightEar, RightShoulder, RightElbow, RightWrist, RightPinky, RightIndex, RightHip,
                RightKnee, RightAnkle, RightFootIndex,
            ],
        ),
    ];
    for (s, [ear, shoulder, elbow, wrist, pinky, index, hip, knee, ankle, toe]) in sides {
        body[ear as usize] = point(s * 7.0, 62.0, 0.0);
        body[shoulder as usize] = point(s * 18.0, 50.0, 0.0);
        body[elbow as usize] = point(s * 46.0, 50.0, 0.0);
        body[wrist as usize] = point(s * 71.0, 50.0, 0.0);
        body[pinky as usize] = point(s * 79.0, 50.0, -1.0);
        body[index as usize] = point(s * 79.0, 50.0, 1.0);
        body[hip as usize] = point(s * 9.0, 0.0, 0.0);
        body[knee as usize] = point(s * 9.0, -42.0, 0.0);
        body[ankle as usize] = point(s * 9.0, -82.0, 0.0);
        body[toe as usize] = point(s * 9.0, -88.0, 14.0);
    }
    body
}

fn face(jaw_gap: f64) -> Vec<Value> {
    let mut face = vec![json!({"x": 0.5, "y": 0.5, "z": 0.0}); FACE_COUNT];
    let mut set = |index: usize, x: f64, y: f64| face[index] = json!({"x": x, "y": y, "z": 0.0});
    set(33, 0.45, 0.4);
    set(263, 0.55, 0.4);
    set(13, 0.5, 0.6);
    set(14, 0.5, 0.6 + jaw_gap);
    set(61, 0.475, 0.6);
    set(291, 0.525, 0.6);
    set(152, 0.5, 0.65);
    set(386, 0.54, 0.38);
    set(374, 0.54, 0.391);
    set(159, 0.46, 0.38);
    set(145, 0.46, 0.391);
    face
}

fn convert(document: &Value, fps: f64) -> mocap_bvh_core::Result<mocap_bvh_core::Conversion> {
    let converter = Converter::new(ConverterConfig::default())?;
    converter.convert_json(&document.to_string(), fps, &mut NoProgress)
}

/// Rotation channels of every row: all but the three root position values.
fn rotations(row: &[f64]) -> &[f64] {
    &row[3..]
}

#[test]
fn t_pose_sequence_is_rest_pose() {
    let document = json!([t_pose(), t_pose(), t_pose()]);
    let conversion = convert(&document, 30.0).unwrap();
    let bvh = conversion.to_bvh().unwrap();

    assert!(bvh.starts_with("HIERARCHY\nROOT Hips\n"));
    assert!(bvh.contains("\nFrames: 3\n"));
    assert!(bvh.contains("\nFrame Time: 0.0333"));

    let motion = parse_motion(&bvh).unwrap();
    assert_eq!(motion.frame_count(), 3);
    assert_eq!(motion.channel_count, conversion.skeleton().channel_count());
    for row in &motion.rows {
        assert!(rotations(row).iter().all(|v| *v == 0.0), "{row:?}");
    }
}

#[test]
fn body_only_input_reports_untracked_fingers_not_held() {
    let conversion = convert(&json!([t_pose(), t_pose()]), 30.0).unwrap();
    let report = conversion.report();
    assert_eq!(report.held_joints, 0);
    assert_eq!(report.untracked_joints, 2 * 30);
    assert_eq!(report.face_frames, 0);
}

#[test]
fn empty_input_fails() {
    let err = convert(&json!([]), 30.0).unwrap_err();
    assert!(matches!(err, MocapError::EmptyInput));
}

#[test]
fn frame_without_face_gets_zero_blendshapes() {
    let document = json!([
        {"pose": t_pose(), "face": face(0.002)},
        t_pose(),
        {"pose": t_pose(), "face": face(0.035)},
    ]);
    let conversion = convert(&document, 30.0).unwrap();
    let frames = conversion.motion().frames();

    assert_eq!(frames.len(), 3);
    assert!(frames[1].blendshapes.is_zero());
    assert!(frames[2].blendshapes.get("jawOpen").unwrap() > 0.9);

    let csv = conversion.to_blendshape_csv().unwrap();
    let rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[1]
        .split(',')
        .skip(2)
        .all(|weight| weight == "0.000000"));
}

#[test]
fn hidden_elbow_holds_previous_rotation() {
    let mut raised = t_pose();
    raised[BodyLandmark::LeftElbow as usize] = point(18.0, 78.0, 0.0);
    raised[BodyLandmark::LeftWrist as usize] = point(18.0, 103.0, 0.0);
    raised[BodyLandmark::LeftIndex as usize] = point(18.0, 111.0, 1.0);
    raised[BodyLandmark::LeftPinky as usize] = point(18.0, 111.0, -1.0);

    let mut hidden = t_pose();
    hidden[BodyLandmark::LeftElbow as usize]["visibility"] = json!(0.0);

    let conversion = convert(&json!([raised, hidden]), 30.0).unwrap();
    let skeleton = conversion.skeleton();
    let offset: usize = skeleton
        .joint_list()
        .iter()
        .take_while(|joint| joint.name != "LeftShoulder")
        .map(|joint| joint.channels.len())
        .sum();

    let frames = conversion.motion().frames();
    let before = &frames[0].channels[offset..offset + 3];
    let after = &frames[1].channels[offset..offset + 3];
    assert_eq!(before, after);
    assert!((before[0] - 90.0).abs() < 1e-6);
}

#[test]
fn output_is_byte_identical_across_runs() {
    let mut leaning = t_pose();
    leaning[BodyLandmark::LeftElbow as usize] = point(40.0, 62.0, 5.0);
    leaning[BodyLandmark::Nose as usize] = point(2.0, 61.0, 10.0);
    let document = json!([t_pose(), leaning, {"pose": t_pose(), "face": face(0.02)}]);

    let first = convert(&document, 24.0).unwrap();
    let second = convert(&document, 24.0).unwrap();

    assert_eq!(first.to_bvh().unwrap(), second.to_bvh().unwrap());
    assert_eq!(
        first.to_blendshape_csv().unwrap(),
        second.to_blendshape_csv().unwrap()
    );
    assert_eq!(
        first.to_blendshape_json().unwrap(),
        second.to_blendshape_json().unwrap()
    );
}

#[test]
fn motion_section_round_trips_within_precision() {
    let mut poses = Vec::new();
    for step in 0..6 {
        let mut body = t_pose();
        let angle = step as f64 * 0.3;
        body[BodyLandmark::LeftElbow as usize] =
            point(18.0 + 28.0 * angle.cos(), 50.0 + 28.0 * angle.sin(), 3.0 * step as f64);
        body[BodyLandmark::RightKnee as usize] = point(-9.0, -42.0, 4.0 * step as f64);
        poses.push(Value::Array(body));
    }

    let conversion = convert(&Value::Array(poses), 60.0).unwrap();
    let parsed = parse_motion(&conversion.to_bvh().unwrap()).unwrap();

    assert!((parsed.frame_time - 1.0 / 60.0).abs() < 1e-6);
    for (row, frame) in parsed.rows.iter().zip(conversion.motion().frames()) {
        assert_eq!(row.len(), frame.channels.len());
        for (parsed, original) in row.iter().zip(&frame.channels) {
            assert!((parsed - original).abs() <= 1e-6, "{parsed} vs {original}");
        }
    }
}

#[test]
fn malformed_frame_aborts_by_default() {
    let mut broken = t_pose();
    broken.pop();
    let err = convert(&json!([t_pose(), broken]), 30.0).unwrap_err();
    match err {
        MocapError::MalformedFrame { frame, reason } => {
            assert_eq!(frame, 1);
            assert!(reason.contains("32"), "{reason}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn blendshape_json_has_every_unit() {
    let document = json!([{"pose": t_pose(), "face": face(0.002)}]);
    let text = convert(&document, 30.0).unwrap().to_blendshape_json().unwrap();
    let json: Value = serde_json::from_str(&text).unwrap();

    let units: Vec<&str> = json["units"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    let expected: Vec<&str> = BLENDSHAPE_UNITS.iter().map(|unit| unit.name).collect();
    assert_eq!(units, expected);
}
