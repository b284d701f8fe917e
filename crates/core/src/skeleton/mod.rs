//! Static joint hierarchy and the fixed table it is built from.
//!
//! The rest pose is a T-pose in centimetres: the character faces +Z with Y
//! up, the left arm lies along +X and the legs point down -Y. Every joint is
//! positioned by a landmark (or the midpoint of two) and, when it has a bone,
//! aims at another landmark whose rest direction is given in the table.

use std::collections::HashMap;

use glam::DVec3;

use crate::landmark::{BodyLandmark, HandLandmark, LandmarkId, LandmarkRef, Side, LANDMARK_COUNT};
use crate::{MocapError, Result};

/// One animated scalar on a joint, named as it appears in `CHANNELS` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Xposition,
    Yposition,
    Zposition,
    Zrotation,
    Xrotation,
    Yrotation,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Xposition => "Xposition",
            Channel::Yposition => "Yposition",
            Channel::Zposition => "Zposition",
            Channel::Zrotation => "Zrotation",
            Channel::Xrotation => "Xrotation",
            Channel::Yrotation => "Yrotation",
        }
    }
}

/// Rotation channels in the order the solver emits them (intrinsic Z, X, Y).
pub const ROTATION_CHANNELS: [Channel; 3] =
    [Channel::Zrotation, Channel::Xrotation, Channel::Yrotation];

const ROOT_CHANNELS: [Channel; 6] = [
    Channel::Xposition,
    Channel::Yposition,
    Channel::Zposition,
    Channel::Zrotation,
    Channel::Xrotation,
    Channel::Yrotation,
];

/// Bone direction: the landmark this joint points at and the direction it
/// points in the rest pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aim {
    pub target: LandmarkRef,
    pub rest: DVec3,
}

/// Secondary axis that fixes rotation about the bone, e.g. the hip line for
/// the pelvis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Twist {
    pub from: LandmarkRef,
    pub to: LandmarkRef,
    pub rest: DVec3,
}

/// Table entry describing one joint before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct JointSpec {
    pub name: String,
    pub parent: Option<String>,
    pub source: LandmarkRef,
    pub offset: DVec3,
    pub aim: Option<Aim>,
    pub twist: Option<Twist>,
    pub end_site: Option<DVec3>,
}

impl JointSpec {
    pub fn new(
        name: impl Into<String>,
        parent: Option<&str>,
        source: impl Into<LandmarkRef>,
        offset: DVec3,
    ) -> Self {
        Self {
            name: name.into(),
            parent: parent.map(str::to_string),
            source: source.into(),
            offset,
            aim: None,
            twist: None,
            end_site: None,
        }
    }

    pub fn aim(mut self, target: impl Into<LandmarkRef>, rest: DVec3) -> Self {
        self.aim = Some(Aim {
            target: target.into(),
            rest,
        });
        self
    }

    pub fn twist(
        mut self,
        from: impl Into<LandmarkRef>,
        to: impl Into<LandmarkRef>,
        rest: DVec3,
    ) -> Self {
        self.twist = Some(Twist {
            from: from.into(),
            to: to.into(),
            rest,
        });
        self
    }

    pub fn end_site(mut self, offset: DVec3) -> Self {
        self.end_site = Some(offset);
        self
    }
}

/// A validated joint inside a [`Skeleton`].
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    /// Index of the parent in [`Skeleton::joint_list`]; `None` for the root.
    pub parent: Option<usize>,
    pub depth: usize,
    pub source: LandmarkRef,
    pub offset: DVec3,
    pub aim: Option<Aim>,
    pub twist: Option<Twist>,
    pub end_site: Option<DVec3>,
    pub channels: &'static [Channel],
}

/// Immutable joint tree stored in pre-order.
#[derive(Debug, Clone)]
pub struct Skeleton {
    joints: Vec<Joint>,
    children: Vec<Vec<usize>>,
    channel_count: usize,
}

impl Skeleton {
    /// Builds the fixed body + hands skeleton.
    pub fn standard(root_translation: bool) -> Result<Self> {
        Self::from_specs(&standard_specs(), root_translation)
    }

    /// Validates `specs` and lays the joints out in pre-order. Siblings keep
    /// their table order.
    pub fn from_specs(specs: &[JointSpec], root_translation: bool) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            if by_name.insert(spec.name.as_str(), index).is_some() {
                return Err(invalid(format!("duplicate joint `{}`", spec.name)));
            }
            validate_landmarks(spec)?;
        }

        let mut roots = Vec::new();
        let mut table_children = vec![Vec::new(); specs.len()];
        for (index, spec) in specs.iter().enumerate() {
            match &spec.parent {
                None => roots.push(index),
                Some(parent) if parent == &spec.name => {
                    return Err(invalid(format!("joint `{}` is its own parent", spec.name)));
                }
                Some(parent) => {
                    let parent_index = by_name.get(parent.as_str()).copied().ok_or_else(|| {
                        invalid(format!("joint `{}` has unknown parent `{parent}`", spec.name))
                    })?;
                    table_children[parent_index].push(index);
                }
            }
        }

        let root = match roots.as_slice() {
            [root] => *root,
            [] => return Err(invalid("no root joint")),
            many => return Err(invalid(format!("{} root joints", many.len()))),
        };

        // Depth-first walk from the root. Joints on a cycle are never reached.
        let mut order = Vec::with_capacity(specs.len());
        let mut stack = vec![(root, None::<usize>, 0usize)];
        let mut joints = Vec::with_capacity(specs.len());
        while let Some((table_index, parent, depth)) = stack.pop() {
            let spec = &specs[table_index];
            let channels: &'static [Channel] = if parent.is_none() && root_translation {
                &ROOT_CHANNELS
            } else {
                &ROTATION_CHANNELS
            };
            let new_index = joints.len();
            joints.push(Joint {
                name: spec.name.clone(),
                parent,
                depth,
                source: spec.source,
                offset: spec.offset,
                aim: spec.aim,
                twist: spec.twist,
                end_site: spec.end_site,
                channels,
            });
            order.push(table_index);
            for &child in table_children[table_index].iter().rev() {
                stack.push((child, Some(new_index), depth + 1));
            }
        }

        if joints.len() != specs.len() {
            let unreachable: Vec<&str> = specs
                .iter()
                .enumerate()
                .filter(|(index, _)| !order.contains(index))
                .map(|(_, spec)| spec.name.as_str())
                .collect();
            return Err(invalid(format!(
                "joints not connected to the root: {}",
                unreachable.join(", ")
            )));
        }

        let mut children = vec![Vec::new(); joints.len()];
        for (index, joint) in joints.iter().enumerate() {
            if let Some(parent) = joint.parent {
                children[parent].push(index);
            }
        }
        let channel_count = joints.iter().map(|joint| joint.channels.len()).sum();

        Ok(Self {
            joints,
            children,
            channel_count,
        })
    }

    /// Joints in pre-order; every parent precedes its children.
    pub fn joint_list(&self) -> &[Joint] {
        &self.joints
    }

    pub fn root_joint(&self) -> &Joint {
        &self.joints[0]
    }

    pub fn joint(&self, name: &str) -> Option<(usize, &Joint)> {
        self.joints
            .iter()
            .enumerate()
            .find(|(_, joint)| joint.name == name)
    }

    pub fn children(&self, index: usize) -> &[usize] {
        self.children.get(index).map_or(&[], Vec::as_slice)
    }

    /// Total number of channels in one frame's channel vector.
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Per-joint channel declarations, in channel-vector order.
    pub fn channel_layout(&self) -> impl Iterator<Item = (&str, &'static [Channel])> + '_ {
        self.joints
            .iter()
            .map(|joint| (joint.name.as_str(), joint.channels))
    }
}

fn invalid(message: impl Into<String>) -> MocapError {
    MocapError::InvalidSkeletonSpec(message.into())
}

fn validate_landmarks(spec: &JointSpec) -> Result<()> {
    let mut refs = vec![spec.source];
    if let Some(aim) = &spec.aim {
        refs.push(aim.target);
        if aim.rest.length() < 1e-9 {
            return Err(invalid(format!("joint `{}` has a zero rest direction", spec.name)));
        }
    }
    if let Some(twist) = &spec.twist {
        let Some(aim) = &spec.aim else {
            return Err(invalid(format!("joint `{}` has a twist but no aim", spec.name)));
        };
        if aim.rest.cross(twist.rest).length() < 1e-9 {
            return Err(invalid(format!(
                "joint `{}` twist axis is parallel to its aim",
                spec.name
            )));
        }
        refs.push(twist.from);
        refs.push(twist.to);
    }

    match refs
        .iter()
        .flat_map(LandmarkRef::ids)
        .find(|id| id.index() >= LANDMARK_COUNT)
    {
        Some(id) => Err(invalid(format!(
            "joint `{}` references landmark {} outside the frame",
            spec.name,
            id.index()
        ))),
        None => Ok(()),
    }
}

fn mid(a: BodyLandmark, b: BodyLandmark) -> LandmarkRef {
    LandmarkRef::Midpoint(a.id(), b.id())
}

/// (name, first hand landmark, offset from the wrist, rest direction,
/// segment lengths; the last length is the end site)
type FingerRow = (&'static str, HandLandmark, [f64; 3], [f64; 3], [f64; 3]);

const FINGERS: [FingerRow; 5] = [
    ("Thumb", HandLandmark::ThumbCmc, [2.0, 0.0, 2.5], [1.0, 0.0, 1.0], [3.5, 3.0, 2.0]),
    ("Index", HandLandmark::IndexMcp, [8.0, 0.0, 2.5], [1.0, 0.0, 0.0], [4.0, 2.5, 1.8]),
    ("Middle", HandLandmark::MiddleMcp, [8.0, 0.0, 0.8], [1.0, 0.0, 0.0], [4.5, 2.8, 1.8]),
    ("Ring", HandLandmark::RingMcp, [7.5, 0.0, -0.9], [1.0, 0.0, 0.0], [4.0, 2.6, 1.7]),
    ("Pinky", HandLandmark::PinkyMcp, [7.0, 0.0, -2.5], [1.0, 0.0, 0.0], [3.2, 2.0, 1.5]),
];

/// The fixed joint table.
pub fn standard_specs() -> Vec<JointSpec> {
    use BodyLandmark::*;

    let up = DVec3::Y;
    let mut specs = vec![
        JointSpec::new("Hips", None, mid(LeftHip, RightHip), DVec3::ZERO)
            .aim(mid(LeftShoulder, RightShoulder), up)
            .twist(RightHip, LeftHip, DVec3::X),
        JointSpec::new(
            "Neck",
            Some("Hips"),
            mid(LeftShoulder, RightShoulder),
            DVec3::new(0.0, 50.0, 0.0),
        )
        .aim(mid(LeftEar, RightEar), up)
        .twist(RightShoulder, LeftShoulder, DVec3::X),
        JointSpec::new("Head", Some("Neck"), mid(LeftEar, RightEar), DVec3::new(0.0, 12.0, 0.0))
            .aim(Nose, DVec3::Z)
            .twist(RightEar, LeftEar, DVec3::X)
            .end_site(DVec3::new(0.0, 0.0, 10.0)),
    ];

    for side in Side::BOTH {
        let s = side.sign();
        let name = side.name();
        let shoulder = format!("{name}Shoulder");
        let elbow = format!("{name}Elbow");
        let wrist = format!("{name}Wrist");
        let along = DVec3::new(s, 0.0, 0.0);

        let shoulder_at = side.pick(LeftShoulder, RightShoulder);
        let elbow_at = side.pick(LeftElbow, RightElbow);
        let wrist_at = side.pick(LeftWrist, RightWrist);
        let palm = mid(side.pick(LeftIndex, RightIndex), side.pick(LeftPinky, RightPinky));

        specs.push(
            JointSpec::new(&shoulder, Some("Neck"), shoulder_at, along * 18.0).aim(elbow_at, along),
        );
        specs.push(
            JointSpec::new(&elbow, Some(shoulder.as_str()), elbow_at, along * 28.0)
                .aim(wrist_at, along),
        );
        specs.push(
            JointSpec::new(&wrist, Some(elbow.as_str()), wrist_at, along * 25.0).aim(palm, along),
        );

        for (finger, base, offset, direction, lengths) in FINGERS {
            let mirror = |v: [f64; 3]| DVec3::new(v[0] * s, v[1], v[2]);
            let direction = mirror(direction).normalize();
            let hand = |step: usize| LandmarkId::hand(side, hand_landmark(base as usize + step));
            let names: Vec<String> = (1..=3).map(|n| format!("{name}{finger}{n}")).collect();

            specs.push(
                JointSpec::new(&names[0], Some(wrist.as_str()), hand(0), mirror(offset))
                    .aim(hand(1), direction),
            );
            specs.push(
                JointSpec::new(&names[1], Some(names[0].as_str()), hand(1), direction * lengths[0])
                    .aim(hand(2), direction),
            );
            specs.push(
                JointSpec::new(&names[2], Some(names[1].as_str()), hand(2), direction * lengths[1])
                    .aim(hand(3), direction)
                    .end_site(direction * lengths[2]),
            );
        }
    }

    for side in Side::BOTH {
        let name = side.name();
        let hip = format!("{name}Hip");
        let knee = format!("{name}Knee");
        let down = DVec3::NEG_Y;
        let hip_at = side.pick(LeftHip, RightHip);
        let knee_at = side.pick(LeftKnee, RightKnee);

        specs.push(
            JointSpec::new(&hip, Some("Hips"), hip_at, DVec3::new(side.sign() * 9.0, 0.0, 0.0))
                .aim(knee_at, down),
        );
        specs.push(
            JointSpec::new(&knee, Some(hip.as_str()), knee_at, DVec3::new(0.0, -42.0, 0.0))
                .aim(side.pick(LeftAnkle, RightAnkle), down),
        );
        let toe = DVec3::new(0.0, -6.0, 14.0);
        specs.push(
            JointSpec::new(
                format!("{name}Ankle"),
                Some(knee.as_str()),
                side.pick(LeftAnkle, RightAnkle),
                DVec3::new(0.0, -40.0, 0.0),
            )
            .aim(side.pick(LeftFootIndex, RightFootIndex), toe.normalize())
            .end_site(toe),
        );
    }

    specs
}

fn hand_landmark(index: usize) -> HandLandmark {
    use HandLandmark::*;

    const ALL: [HandLandmark; 21] = [
        Wrist, ThumbCmc, ThumbMcp, ThumbIp, ThumbTip, IndexMcp, IndexPip, IndexDip, IndexTip,
        MiddleMcp, MiddlePip, MiddleDip, MiddleTip, RingMcp, RingPip, RingDip, RingTip, PinkyMcp,
        PinkyPip, PinkyDip, PinkyTip,
    ];
    ALL[index.min(ALL.len() - 1)]
}
