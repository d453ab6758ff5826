//! # Evaluator
//!
//! Turns one Instance into a matrix palette, using one Workspace as scratch.
//!
//! ## Pipeline
//!
//! ```text
//! validate ─► normal layers ─► additive layers ─► IK ─► local-to-model ─► palette
//!   (no writes)  (running avg)     (list order)    (opt)
//! ```
//!
//! 1. Normal layers, in stored order. The first qualifying layer is sampled
//!    straight into the accumulation buffer; every later one is sampled into
//!    the Workspace temp buffer and blended in against the running weight.
//! 2. Additive layers, in stored order, each composed onto the result of the
//!    previous one. Reordering them changes the pose.
//! 3. IK jobs, in stored order. Model space is derived once (or once per job
//!    with [`IkSnapshot::PerJob`]); corrections go straight into the
//!    accumulation buffer.
//! 4. Model space from the corrected pose, packed as column-major 3x4 blocks.
//!
//! Every structural check runs before the first buffer write, so a rejected
//! call leaves both Instance and Workspace exactly as they were. A kernel
//! failure mid-pipeline leaves them stale.

use glam::{Mat4, Quat};

use crate::animation::AnimationClip;
use crate::config::{IkSnapshot, PoseConfig};
use crate::descriptor::{BlendMode, IkDescriptor, LayerDescriptor};
use crate::error::{PoseError, PoseResult};
use crate::instance::Instance;
use crate::kernel::{
    blend_additive_into, blend_into, local_to_model, sample, solve_aim, solve_two_bone,
    TrackCursor, TwoBoneSettings,
};
use crate::memory::{ArenaHeader, ConsumerKind};
use crate::pose::{post_multiply_rotation, SoaTransform};
use crate::skeleton::Skeleton;
use crate::time;
use crate::workspace::{store_3x4, Workspace, PALETTE_STRIDE};

/// Runs the pose pipeline. Stateless apart from its configuration, so one
/// Evaluator can be shared by every worker.
#[derive(Clone, Debug)]
pub struct Evaluator {
    config: PoseConfig,
    two_bone: TwoBoneSettings,
}

impl Default for Evaluator {
    fn default() -> Self {
        let config = PoseConfig::default();
        Self {
            two_bone: config.ik.two_bone_settings(),
            config,
        }
    }
}

impl Evaluator {
    /// Creates an evaluator.
    ///
    /// # Errors
    ///
    /// [`PoseError::InvalidArgument`] if the config fails
    /// [`PoseConfig::validate`].
    pub fn new(config: PoseConfig) -> PoseResult<Self> {
        config.validate()?;
        Ok(Self {
            two_bone: config.ik.two_bone_settings(),
            config,
        })
    }

    /// Active configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &PoseConfig {
        &self.config
    }

    /// Evaluates `instance` into `workspace` and returns the palette
    /// (`12 * N` floats, joint order).
    ///
    /// # Errors
    ///
    /// - [`PoseError::InvalidArgument`]: skeleton or joint-count mismatch,
    ///   a corrupted arena header, no normal layer with a clip and positive
    ///   weight, a non-finite layer weight or time, a clip whose track count
    ///   differs from `N`, or an IK joint outside `[0, N)`. Nothing has been
    ///   written.
    /// - [`PoseError::KernelFailure`]: a kernel job failed mid-pipeline.
    ///   The accumulation buffer and palette are stale.
    pub fn run<'w>(
        &self,
        instance: &mut Instance<'_>,
        workspace: &'w mut Workspace<'_>,
    ) -> PoseResult<&'w [f32]> {
        if let Err(err) = self.evaluate(instance, workspace) {
            tracing::warn!(
                skeleton = instance.skeleton.id(),
                code = ?err.code(),
                error = %err,
                "pose evaluation failed"
            );
            return Err(err);
        }
        Ok(&*workspace.palette)
    }

    fn evaluate(&self, instance: &mut Instance<'_>, workspace: &mut Workspace<'_>) -> PoseResult<()> {
        validate(instance, workspace)?;

        let skeleton = &*instance.skeleton;
        let accum = &mut *instance.accum;
        let cursors = &mut *instance.cursors;
        let temp = &mut *workspace.temp;
        let model = &mut *workspace.model;

        tracing::trace!(
            skeleton = skeleton.id(),
            layers = instance.layers.len(),
            ik = instance.ik.len(),
            "evaluating pose"
        );

        // 1) Normal layers: streamed weighted average.
        let mut running_weight: Option<f32> = None;
        for (layer, clip) in qualifying(&instance.layers, BlendMode::Normal) {
            match running_weight {
                None => {
                    sample_layer(layer, clip, cursors, accum)?;
                    running_weight = Some(layer.weight);
                }
                Some(weight) => {
                    sample_layer(layer, clip, cursors, temp)?;
                    blend_into(
                        accum,
                        weight,
                        temp,
                        layer.weight,
                        skeleton.rest_pose_soa(),
                        self.config.blend_threshold,
                    )?;
                    running_weight = Some((weight + layer.weight).min(f32::MAX));
                }
            }
        }

        // 2) Additive layers: ordered, non-commutative.
        for (layer, clip) in qualifying(&instance.layers, BlendMode::Additive) {
            sample_layer(layer, clip, cursors, temp)?;
            blend_additive_into(accum, temp, layer.weight)?;
        }

        // 3) IK.
        if !instance.ik.is_empty() {
            local_to_model(skeleton, accum, model)?;
            let mut snapshot_stale = false;
            for job in &instance.ik {
                if job.weight().is_nan() || job.weight() <= 0.0 {
                    continue;
                }
                if snapshot_stale && self.config.ik.snapshot == IkSnapshot::PerJob {
                    local_to_model(skeleton, accum, model)?;
                }
                self.apply_ik(job, model, accum)?;
                snapshot_stale = true;
            }
        }

        // 4) Final model space and palette.
        local_to_model(skeleton, accum, model)?;
        for (matrix, block) in model
            .iter()
            .zip(workspace.palette.chunks_exact_mut(PALETTE_STRIDE))
        {
            store_3x4(matrix, block);
        }
        Ok(())
    }

    fn apply_ik(&self, job: &IkDescriptor, model: &[Mat4], accum: &mut [SoaTransform]) -> PoseResult<()> {
        match job {
            IkDescriptor::TwoBone(chain) => {
                let correction = solve_two_bone(
                    &model[chain.start],
                    &model[chain.mid],
                    &model[chain.end],
                    chain.target,
                    chain.pole,
                    chain.weight,
                    &self.two_bone,
                )?;
                apply_correction(accum, chain.start, correction.start)?;
                apply_correction(accum, chain.mid, correction.mid)
            }
            IkDescriptor::Aim(aim) => {
                let correction = solve_aim(&model[aim.joint], aim.target, aim.forward, aim.up, aim.weight)?;
                apply_correction(accum, aim.joint, correction)
            }
        }
    }
}

/// Structural checks. Runs before any buffer is written.
fn validate(instance: &Instance<'_>, workspace: &Workspace<'_>) -> PoseResult<()> {
    if instance.skeleton.id() != workspace.skeleton.id() {
        return Err(PoseError::invalid(format!(
            "instance skeleton {} does not match workspace skeleton {}",
            instance.skeleton.id(),
            workspace.skeleton.id()
        )));
    }
    let num_joints = instance.num_joints();
    if num_joints != workspace.num_joints() {
        return Err(PoseError::invalid(format!(
            "joint count mismatch: instance {num_joints}, workspace {}",
            workspace.num_joints()
        )));
    }
    check_header(instance.header, ConsumerKind::Instance, &instance.skeleton)?;
    check_header(workspace.header, ConsumerKind::Workspace, &workspace.skeleton)?;

    let mut have_base = false;
    for (layer, clip) in qualifying(&instance.layers, BlendMode::Normal)
        .chain(qualifying(&instance.layers, BlendMode::Additive))
    {
        if !layer.weight.is_finite() {
            return Err(PoseError::invalid(format!(
                "layer '{}' has non-finite weight",
                clip.name()
            )));
        }
        if !layer.time_seconds.is_finite() {
            return Err(PoseError::invalid(format!(
                "layer '{}' has non-finite time",
                clip.name()
            )));
        }
        if clip.track_count() != num_joints {
            return Err(PoseError::invalid(format!(
                "clip '{}' has {} tracks, skeleton has {num_joints} joints",
                clip.name(),
                clip.track_count()
            )));
        }
        have_base |= layer.mode == BlendMode::Normal;
    }
    if !have_base {
        return Err(PoseError::invalid(
            "no base pose: no normal layer with a clip and positive weight",
        ));
    }

    for (index, job) in instance.ik.iter().enumerate() {
        if let Some(joint) = job.joints().into_iter().find(|&joint| joint >= num_joints) {
            return Err(PoseError::invalid(format!(
                "IK job {index} references joint {joint}, skeleton has {num_joints}"
            )));
        }
    }
    Ok(())
}

/// Confirms an arena header still describes `skeleton` as a `kind` arena.
fn check_header(header: &ArenaHeader, kind: ConsumerKind, skeleton: &Skeleton) -> PoseResult<()> {
    let intact = header.is_valid()
        && header.kind() == Some(kind)
        && header.skeleton_id() == skeleton.id()
        && usize::try_from(header.num_joints()).ok() == Some(skeleton.num_joints())
        && usize::try_from(header.num_soa()).ok() == Some(skeleton.num_soa_joints());
    if intact {
        Ok(())
    } else {
        Err(PoseError::invalid(format!("{kind:?} arena header is corrupted")))
    }
}

/// Layers of `mode` that have a clip and a positive weight, in stored order.
fn qualifying(
    layers: &[LayerDescriptor],
    mode: BlendMode,
) -> impl Iterator<Item = (&LayerDescriptor, &AnimationClip)> {
    layers
        .iter()
        .filter(move |layer| layer.mode == mode)
        .filter_map(|layer| layer.active_clip().map(|clip| (layer, clip)))
}

fn sample_layer(
    layer: &LayerDescriptor,
    clip: &AnimationClip,
    cursors: &mut [TrackCursor],
    output: &mut [SoaTransform],
) -> PoseResult<()> {
    let ratio = time::ratio(layer.time_seconds, clip.duration(), layer.playback);
    sample(clip, ratio, cursors, output)?;
    Ok(())
}

fn apply_correction(accum: &mut [SoaTransform], joint: usize, correction: Quat) -> PoseResult<()> {
    if post_multiply_rotation(accum, joint, correction) {
        Ok(())
    } else {
        Err(PoseError::invalid(format!("joint {joint} outside the pose")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::Vec3;

    use super::*;
    use crate::descriptor::{AimIk, TwoBoneIk};
    use crate::memory::ArenaBuffer;
    use crate::pose::Transform;
    use crate::procedural::{chain_skeleton, constant_delta_clip, walk_clip};
    use crate::time::PlaybackMode;

    struct Rig {
        skeleton: Arc<Skeleton>,
        instance_bytes: ArenaBuffer,
        workspace_bytes: ArenaBuffer,
    }

    impl Rig {
        fn new(joints: usize) -> Self {
            let skeleton = Arc::new(chain_skeleton(joints, 1.0).unwrap());
            Self {
                instance_bytes: ArenaBuffer::new(Instance::required_bytes(&skeleton)).unwrap(),
                workspace_bytes: ArenaBuffer::new(Workspace::required_bytes(&skeleton)).unwrap(),
                skeleton,
            }
        }

        fn split(&mut self) -> (Instance<'_>, Workspace<'_>) {
            (
                Instance::init(self.instance_bytes.as_bytes_mut(), self.skeleton.clone()).unwrap(),
                Workspace::init(self.workspace_bytes.as_bytes_mut(), self.skeleton.clone()).unwrap(),
            )
        }
    }

    fn rest_clip(skeleton: &Skeleton) -> Arc<AnimationClip> {
        let tracks = skeleton
            .rest_pose()
            .iter()
            .map(crate::animation::JointTrack::constant)
            .collect();
        Arc::new(AnimationClip::new("rest", 1.0, tracks).unwrap())
    }

    #[test]
    fn test_rest_pose_palette() {
        let mut rig = Rig::new(3);
        let clip = rest_clip(&rig.skeleton);
        let (mut instance, mut workspace) = rig.split();
        instance.set_layers(&[LayerDescriptor::normal(clip, 0.0, PlaybackMode::Clamp, 1.0)]);

        let palette = Evaluator::default().run(&mut instance, &mut workspace).unwrap();
        assert_eq!(palette.len(), 36);
        // Joint 2 sits two bones up the chain.
        assert_eq!(&palette[24..36], &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_no_base_pose_fails_without_writes() {
        let mut rig = Rig::new(4);
        let clip = rest_clip(&rig.skeleton);
        let (mut instance, mut workspace) = rig.split();
        instance.set_layers(&[
            LayerDescriptor::normal(clip.clone(), 0.0, PlaybackMode::Clamp, 0.0),
            LayerDescriptor::additive(clip, 0.0, PlaybackMode::Clamp, 1.0),
        ]);
        workspace.palette.fill(-3.0);
        let before = instance.local_pose().to_vec();

        let err = Evaluator::default().run(&mut instance, &mut workspace).unwrap_err();
        assert!(matches!(err, PoseError::InvalidArgument(_)));
        assert!(workspace.palette().iter().all(|&v| v == -3.0));
        assert_eq!(instance.local_pose(), before.as_slice());
    }

    #[test]
    fn test_track_count_mismatch_is_invalid() {
        let mut rig = Rig::new(4);
        let other = chain_skeleton(5, 1.0).unwrap();
        let clip = Arc::new(walk_clip(&other).unwrap());
        let (mut instance, mut workspace) = rig.split();
        instance.set_layers(&[LayerDescriptor::normal(clip, 0.0, PlaybackMode::Wrap, 1.0)]);
        let err = Evaluator::default().run(&mut instance, &mut workspace).unwrap_err();
        assert!(matches!(err, PoseError::InvalidArgument(_)));
    }

    #[test]
    fn test_non_finite_time_is_invalid_without_writes() {
        let mut rig = Rig::new(4);
        let walk = Arc::new(walk_clip(&rig.skeleton).unwrap());
        let (mut instance, mut workspace) = rig.split();
        workspace.palette.fill(-3.0);
        let before = instance.local_pose().to_vec();

        for (time, playback) in [
            (f32::NAN, PlaybackMode::Wrap),
            (f32::NAN, PlaybackMode::Clamp),
            (f32::INFINITY, PlaybackMode::Wrap),
            (f32::NEG_INFINITY, PlaybackMode::Wrap),
        ] {
            instance.set_layers(&[LayerDescriptor::normal(walk.clone(), time, playback, 1.0)]);
            let err = Evaluator::default().run(&mut instance, &mut workspace).unwrap_err();
            assert!(matches!(err, PoseError::InvalidArgument(_)), "time {time} {playback:?}");
        }
        assert!(workspace.palette().iter().all(|&v| v == -3.0));
        assert_eq!(instance.local_pose(), before.as_slice());
    }

    #[test]
    fn test_huge_normal_weights_stay_finite() {
        let mut rig = Rig::new(4);
        let walk = Arc::new(walk_clip(&rig.skeleton).unwrap());
        let (mut instance, mut workspace) = rig.split();
        let evaluator = Evaluator::default();

        instance.set_layers(&[LayerDescriptor::normal(walk.clone(), 0.4, PlaybackMode::Wrap, 1.0)]);
        let single = evaluator.run(&mut instance, &mut workspace).unwrap().to_vec();

        for weight in [1e20, f32::MAX / 2.0, f32::MAX] {
            instance.set_layers(&[
                LayerDescriptor::normal(walk.clone(), 0.4, PlaybackMode::Wrap, weight),
                LayerDescriptor::normal(walk.clone(), 0.4, PlaybackMode::Wrap, weight),
            ]);
            let palette = evaluator.run(&mut instance, &mut workspace).unwrap();
            assert!(palette.iter().all(|v| v.is_finite()), "weight {weight}");
            let diff = palette
                .iter()
                .zip(&single)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f32::max);
            assert!(diff < 1e-4, "weight {weight}: diff {diff}");
        }
    }

    #[test]
    fn test_corrupted_header_is_invalid() {
        let mut rig = Rig::new(4);
        let clip = rest_clip(&rig.skeleton);
        let skeleton = rig.skeleton.clone();
        let (mut instance, mut workspace) = rig.split();
        instance.set_layers(&[LayerDescriptor::normal(clip, 0.0, PlaybackMode::Clamp, 1.0)]);
        Evaluator::default().run(&mut instance, &mut workspace).unwrap();

        // An Instance whose arena claims to be a Workspace.
        *instance.header = ArenaHeader::new(ConsumerKind::Workspace, &skeleton);
        let err = Evaluator::default().run(&mut instance, &mut workspace).unwrap_err();
        assert!(matches!(err, PoseError::InvalidArgument(_)));

        *instance.header = ArenaHeader::new(ConsumerKind::Instance, &skeleton);
        assert!(Evaluator::default().run(&mut instance, &mut workspace).is_ok());
    }

    #[test]
    fn test_ik_joint_out_of_range_is_invalid() {
        let mut rig = Rig::new(4);
        let clip = rest_clip(&rig.skeleton);
        let (mut instance, mut workspace) = rig.split();
        instance.set_layers(&[LayerDescriptor::normal(clip, 0.0, PlaybackMode::Wrap, 1.0)]);
        instance.set_ik(&[IkDescriptor::Aim(AimIk {
            joint: 4,
            target: Vec3::ONE,
            forward: Vec3::Y,
            up: Vec3::Z,
            weight: 1.0,
        })]);
        let err = Evaluator::default().run(&mut instance, &mut workspace).unwrap_err();
        assert!(matches!(err, PoseError::InvalidArgument(_)));
    }

    #[test]
    fn test_malformed_clip_is_kernel_failure() {
        let mut rig = Rig::new(2);
        let mut tracks = vec![crate::animation::JointTrack::constant(&Transform::IDENTITY); 2];
        tracks[1].rotations.clear();
        let clip = Arc::new(AnimationClip::new("broken", 1.0, tracks).unwrap());
        let (mut instance, mut workspace) = rig.split();
        instance.set_layers(&[LayerDescriptor::normal(clip, 0.5, PlaybackMode::Clamp, 1.0)]);
        let err = Evaluator::default().run(&mut instance, &mut workspace).unwrap_err();
        assert!(matches!(err, PoseError::KernelFailure(_)));
        assert_eq!(err.code(), crate::error::ErrorCode::KernelFailure);
    }

    #[test]
    fn test_two_bone_ik_moves_end_to_target() {
        let mut rig = Rig::new(4);
        let clip = rest_clip(&rig.skeleton);
        let (mut instance, mut workspace) = rig.split();
        instance.set_layers(&[LayerDescriptor::normal(clip, 0.0, PlaybackMode::Clamp, 1.0)]);
        let target = Vec3::new(0.8, 2.2, 0.0);
        instance.set_ik(&[IkDescriptor::TwoBone(TwoBoneIk {
            start: 1,
            mid: 2,
            end: 3,
            target,
            pole: Vec3::X,
            weight: 1.0,
        })]);

        let palette = Evaluator::default().run(&mut instance, &mut workspace).unwrap();
        let end = Vec3::from_slice(&palette[3 * 12 + 9..3 * 12 + 12]);
        assert!(end.abs_diff_eq(target, 1e-4), "end {end:?}");
        // The root is untouched.
        assert_eq!(&palette[9..12], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_aim_ik_rotates_joint() {
        let mut rig = Rig::new(2);
        let clip = rest_clip(&rig.skeleton);
        let (mut instance, mut workspace) = rig.split();
        instance.set_layers(&[LayerDescriptor::normal(clip, 0.0, PlaybackMode::Clamp, 1.0)]);
        instance.set_ik(&[IkDescriptor::Aim(AimIk {
            joint: 0,
            target: Vec3::new(5.0, 0.0, 0.0),
            forward: Vec3::Y,
            up: Vec3::Z,
            weight: 1.0,
        })]);

        Evaluator::default().run(&mut instance, &mut workspace).unwrap();
        // Joint 1 hangs one bone along the aimed +Y axis of joint 0.
        let child = workspace.model_matrices()[1].w_axis.truncate();
        assert!(child.abs_diff_eq(Vec3::X, 1e-5), "child {child:?}");
    }

    #[test]
    fn test_zero_weight_ik_is_skipped() {
        let mut rig = Rig::new(3);
        let clip = rest_clip(&rig.skeleton);
        let (mut instance, mut workspace) = rig.split();
        instance.set_layers(&[LayerDescriptor::normal(clip, 0.0, PlaybackMode::Clamp, 1.0)]);
        let reference = Evaluator::default()
            .run(&mut instance, &mut workspace)
            .unwrap()
            .to_vec();

        instance.set_ik(&[IkDescriptor::Aim(AimIk {
            joint: 0,
            target: Vec3::new(5.0, 0.0, 0.0),
            forward: Vec3::Y,
            up: Vec3::Z,
            weight: 0.0,
        })]);
        let palette = Evaluator::default().run(&mut instance, &mut workspace).unwrap();
        assert_eq!(palette, reference.as_slice());
    }

    #[test]
    fn test_snapshot_policies_differ_for_dependent_jobs() {
        // Two aims on a parent and its child: with a single snapshot the
        // child solves against its pre-correction frame.
        let jobs = [
            IkDescriptor::Aim(AimIk {
                joint: 0,
                target: Vec3::new(5.0, 0.0, 0.0),
                forward: Vec3::Y,
                up: Vec3::Z,
                weight: 1.0,
            }),
            IkDescriptor::Aim(AimIk {
                joint: 1,
                target: Vec3::new(1.0, 3.0, 0.0),
                forward: Vec3::Y,
                up: Vec3::Z,
                weight: 1.0,
            }),
        ];
        let mut palettes = Vec::new();
        for config in [PoseConfig::default(), PoseConfig::iterative_ik()] {
            let mut rig = Rig::new(3);
            let clip = rest_clip(&rig.skeleton);
            let (mut instance, mut workspace) = rig.split();
            instance.set_layers(&[LayerDescriptor::normal(clip, 0.0, PlaybackMode::Clamp, 1.0)]);
            instance.set_ik(&jobs);
            let evaluator = Evaluator::new(config).unwrap();
            palettes.push(evaluator.run(&mut instance, &mut workspace).unwrap().to_vec());
        }
        // Per-job: joint 1 sits at (1,0,0) and aims straight up at (1,3,0),
        // so joint 2 lands at (1,1,0).
        let per_job_tip = Vec3::from_slice(&palettes[1][2 * 12 + 9..2 * 12 + 12]);
        assert!(per_job_tip.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-4), "{per_job_tip:?}");
        assert_ne!(palettes[0], palettes[1]);
    }

    #[test]
    fn test_additive_delta_applies_on_top() {
        let mut rig = Rig::new(2);
        let clip = rest_clip(&rig.skeleton);
        let delta = Arc::new(
            constant_delta_clip(
                "lean",
                2,
                Transform::new(Vec3::ZERO, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2), Vec3::ONE),
            )
            .unwrap(),
        );
        let (mut instance, mut workspace) = rig.split();
        instance.set_layers(&[
            LayerDescriptor::additive(delta, 0.0, PlaybackMode::Clamp, 1.0),
            LayerDescriptor::normal(clip, 0.0, PlaybackMode::Clamp, 1.0),
        ]);
        let palette = Evaluator::default().run(&mut instance, &mut workspace).unwrap();
        // Root rotated 90 degrees about Z, so the child's +Y offset maps to -X.
        let child = Vec3::from_slice(&palette[12 + 9..12 + 12]);
        assert!(child.abs_diff_eq(Vec3::new(-1.0, 0.0, 0.0), 1e-5), "{child:?}");
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = PoseConfig {
            blend_threshold: -1.0,
            ..PoseConfig::default()
        };
        assert!(Evaluator::new(config).is_err());
    }
}
