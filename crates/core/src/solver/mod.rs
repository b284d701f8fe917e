//! Pose-to-rotation solver.
//!
//! Each joint's global orientation is the shortest-arc rotation taking its
//! rest aim direction onto the observed bone direction, corrected about the
//! bone by the twist axis when the joint has one. Local rotations are
//! `parent⁻¹ · global`, emitted as intrinsic Z-X-Y Euler angles in degrees to
//! match the `Zrotation Xrotation Yrotation` channel declarations.

use glam::{DQuat, DVec3, EulerRot};

use crate::config::SolverConfig;
use crate::landmark::{Frame, LandmarkRef};
use crate::skeleton::{Joint, Skeleton};

const EULER_ORDER: EulerRot = EulerRot::ZXY;

/// Last valid solve per joint, carried from one frame to the next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverState {
    rotations: Vec<Option<[f64; 3]>>,
    root_position: Option<DVec3>,
}

impl SolverState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Euler triplet (degrees) last solved for `joint`, if any.
    pub fn last_rotation(&self, joint: usize) -> Option<[f64; 3]> {
        self.rotations.get(joint).copied().flatten()
    }

    pub fn last_root_position(&self) -> Option<DVec3> {
        self.root_position
    }
}

/// Channel values for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedFrame {
    pub channels: Vec<f64>,
    /// Joints that reused their previous rotation (or the rest pose on the
    /// first frame) because their landmarks were unreliable.
    pub held: Vec<usize>,
    /// Joints that reused their previous rotation because the frame carried
    /// no hand or face section for them.
    pub untracked: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct PoseSolver<'a> {
    skeleton: &'a Skeleton,
    config: SolverConfig,
}

impl<'a> PoseSolver<'a> {
    pub fn new(skeleton: &'a Skeleton, config: SolverConfig) -> Self {
        Self { skeleton, config }
    }

    /// Solves `frame` given the state left by the previous frame and returns
    /// the state for the next one.
    pub fn solve(&self, frame: &Frame, previous: SolverState) -> (SolvedFrame, SolverState) {
        let joints = self.skeleton.joint_list();
        let mut next = previous;
        next.rotations.resize(joints.len(), None);

        let mut channels = Vec::with_capacity(self.skeleton.channel_count());
        let mut held = Vec::new();
        let mut untracked = Vec::new();
        let mut globals = Vec::with_capacity(joints.len());

        for (index, joint) in joints.iter().enumerate() {
            let parent_global = joint.parent.map_or(DQuat::IDENTITY, |parent| globals[parent]);

            if joint.channels.len() == 6 {
                let position = self.root_position(joint, frame).or(next.root_position);
                let position = match position {
                    Some(position) => {
                        next.root_position = Some(position);
                        position
                    }
                    None => DVec3::ZERO,
                };
                channels.extend_from_slice(&[position.x, position.y, position.z]);
            }

            let (euler, global) = match joint.aim {
                None => ([0.0; 3], parent_global),
                Some(_) => match self.observe(joint, frame) {
                    Some(global) => {
                        let local = parent_global.inverse() * global;
                        (to_degrees(local.to_euler(EULER_ORDER)), global)
                    }
                    None => {
                        let tracked = references(joint)
                            .iter()
                            .flat_map(LandmarkRef::ids)
                            .all(|id| frame.tracks(id));
                        if tracked {
                            held.push(index);
                        } else {
                            untracked.push(index);
                        }
                        let euler = next.rotations[index].unwrap_or([0.0; 3]);
                        (euler, parent_global * from_degrees(euler))
                    }
                },
            };

            next.rotations[index] = Some(euler);
            globals.push(global);
            channels.extend_from_slice(&euler);
        }

        let solved = SolvedFrame {
            channels,
            held,
            untracked,
        };
        (solved, next)
    }

    fn root_position(&self, joint: &Joint, frame: &Frame) -> Option<DVec3> {
        if frame.visibility(&joint.source) < self.config.visibility_threshold {
            return None;
        }
        let position = frame.world_position(&joint.source, self.config.unit_scale);
        position.is_finite().then_some(position)
    }

    /// Global orientation of `joint`, or `None` when its landmarks are not
    /// reliable enough to trust.
    fn observe(&self, joint: &Joint, frame: &Frame) -> Option<DQuat> {
        let aim = joint.aim.as_ref()?;
        let threshold = self.config.visibility_threshold;
        let scale = self.config.unit_scale;

        if references(joint)
            .iter()
            .any(|r| frame.visibility(r) < threshold)
        {
            return None;
        }

        let observed =
            frame.world_position(&aim.target, scale) - frame.world_position(&joint.source, scale);
        let direction = observed.try_normalize()?;
        let mut rotation = DQuat::from_rotation_arc(aim.rest.try_normalize()?, direction);

        if let Some(twist) = &joint.twist {
            let observed_axis =
                frame.world_position(&twist.to, scale) - frame.world_position(&twist.from, scale);
            let current = reject(rotation * twist.rest, direction).try_normalize();
            let target = reject(observed_axis, direction).try_normalize();
            // A twist axis lined up with the bone carries no roll; keep the swing.
            if let (Some(current), Some(target)) = (current, target) {
                let angle = direction
                    .dot(current.cross(target))
                    .atan2(current.dot(target));
                rotation = DQuat::from_axis_angle(direction, angle) * rotation;
            }
        }

        rotation.is_finite().then_some(rotation)
    }
}

/// Every landmark reference a joint's solve reads.
fn references(joint: &Joint) -> Vec<LandmarkRef> {
    let mut refs = vec![joint.source];
    if let Some(aim) = &joint.aim {
        refs.push(aim.target);
    }
    if let Some(twist) = &joint.twist {
        refs.extend([twist.from, twist.to]);
    }
    refs
}

fn reject(v: DVec3, normal: DVec3) -> DVec3 {
    v - normal * v.dot(normal)
}

fn to_degrees((a, b, c): (f64, f64, f64)) -> [f64; 3] {
    [a.to_degrees(), b.to_degrees(), c.to_degrees()]
}

fn from_degrees(euler: [f64; 3]) -> DQuat {
    DQuat::from_euler(
        EULER_ORDER,
        euler[0].to_radians(),
        euler[1].to_radians(),
        euler[2].to_radians(),
    )
}
