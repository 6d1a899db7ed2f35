//! Branching tree builder
//!
//! A tree starts from a trunk standing on the edge of a circular boundary
//! and pointing toward its center. At the end of every segment a random
//! draw picks which sides fork; each fork is fitted inside the boundary or
//! dropped. Segments are tapered prisms, forks hang off triangular wedge
//! joints and bare tips are closed with pyramid caps.
//!
//! Everything is built in tree space: the trunk base is the origin and the
//! trunk grows along +y, which is how an obstacle is mounted on the wall.
//! Every bone pivots at the base of the part it moves: the trunk on the
//! origin, a wedge slot on its anchor, a branch on its slot and a cap on
//! the tip it closes.

use std::f32::consts::{FRAC_PI_2, TAU};

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec2, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::shape::{Anchor, Mesh, Shape, Side};
use super::skeleton::{Skeleton, SkinBinding};
use crate::{angle_to, normalize_angle, polar_to_cartesian};

/// Probability threshold above which a segment forks on both sides
const BOTH_SIDES_THRESHOLD: f32 = 0.2;
/// Trunk tip position along the boundary-to-center line
const TRUNK_REACH: f32 = 0.7;
/// Branch length relative to the reference edge of its parent
const BRANCH_LENGTH_RATIO: f32 = 0.7;
/// Branches shorter than this fraction of the trunk are not grown
const MIN_BRANCH_RATIO: f32 = 0.4;
/// Cap height relative to the tip width it closes
const CAP_HEIGHT_RATIO: f32 = 1.5;

/// Tree generation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeParams {
    /// Maximum number of bones (root included)
    pub num_branches: usize,
    /// Radius of the circle every branch tip must stay inside
    pub boundary_radius: f32,
    /// Number of evenly spaced trunk positions around the boundary
    pub num_sides: u32,
    /// Thickness of every segment along z
    pub depth: f32,
    /// Top width / bottom width of each segment
    pub taper: f32,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            num_branches: 16,
            boundary_radius: 1.2,
            num_sides: 8,
            depth: 0.08,
            taper: 0.55,
        }
    }
}

/// Vertex layout handed to a skinning renderer
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SkinnedVertex {
    pub position: [f32; 3],
    pub bone_indices: [u32; 2],
    pub bone_weights: [f32; 2],
}

/// Generated tree: geometry, skeleton and per-vertex skin bindings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeModel {
    pub mesh: Mesh,
    pub skeleton: Skeleton,
    pub skin: Vec<SkinBinding>,
    /// Number of tapered segments (trunk included)
    pub segments: usize,
    /// Center of the fitting boundary in tree space
    pub boundary_center: Vec2,
    pub boundary_radius: f32,
}

impl TreeModel {
    pub fn vertex_buffer(&self) -> Vec<SkinnedVertex> {
        self.mesh
            .vertices
            .iter()
            .zip(self.skin.iter())
            .map(|(v, binding)| SkinnedVertex {
                position: v.to_array(),
                bone_indices: binding.indices,
                bone_weights: binding.weights,
            })
            .collect()
    }

    pub fn index_buffer(&self) -> Vec<u32> {
        self.mesh.faces.iter().flatten().copied().collect()
    }
}

/// Placement of a shape in tree space: origin plus rotation about z.
/// Local +y is the growth direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub origin: Vec2,
    pub angle: f32,
}

impl Frame {
    pub const IDENTITY: Frame = Frame {
        origin: Vec2::ZERO,
        angle: 0.0,
    };

    /// Frame whose +y axis points along `direction` (radians, tree space)
    pub fn facing(origin: Vec2, direction: f32) -> Self {
        Self {
            origin,
            angle: direction - FRAC_PI_2,
        }
    }

    /// Rotate a local offset into tree orientation
    pub fn rotate(&self, local: Vec2) -> Vec2 {
        Vec2::from_angle(self.angle).rotate(local)
    }

    pub fn transform_point(&self, local: Vec2) -> Vec2 {
        self.origin + self.rotate(local)
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(
            Quat::from_rotation_z(self.angle),
            self.origin.extend(0.0),
        )
    }
}

/// A fork at the distal end of a segment.
///
/// The same wedge serves both slots, so it has to be oriented toward a
/// side before its anchor is read. Orienting fully replaces the previous
/// orientation.
#[derive(Debug, Clone)]
pub struct WedgeJoint {
    shape: Shape,
    frame: Frame,
    orientation: Anchor,
    slots: [Option<usize>; 2],
}

impl WedgeJoint {
    pub fn new(width: f32, depth: f32, frame: Frame) -> Self {
        let shape = Shape::TriangularWedge {
            width,
            depth,
            direction: None,
        };
        Self {
            orientation: shape.anchor(None),
            shape,
            frame,
            slots: [None, None],
        }
    }

    pub fn orient(&mut self, side: Side) {
        self.orientation = self.shape.anchor(Some(side));
    }

    /// Anchor of the current orientation in tree space
    pub fn anchor_world(&self) -> Vec2 {
        self.frame.transform_point(self.orientation.position.truncate())
    }

    fn slot(&self, side: Side) -> Option<usize> {
        self.slots[side as usize]
    }

    fn is_used(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }

    /// Final shape: single-slot joints close the wall they expose
    fn resolved_shape(&self) -> Shape {
        let direction = match self.slots {
            [Some(_), None] => Some(Side::Left),
            [None, Some(_)] => Some(Side::Right),
            _ => None,
        };
        match self.shape {
            Shape::TriangularWedge { width, depth, .. } => Shape::TriangularWedge {
                width,
                depth,
                direction,
            },
            other => other,
        }
    }

    fn binding(&self) -> SkinBinding {
        match self.slots {
            [Some(left), Some(right)] => SkinBinding::split(left, right),
            [Some(bone), None] | [None, Some(bone)] => SkinBinding::single(bone),
            [None, None] => SkinBinding::single(0),
        }
    }
}

/// A tapered segment placed in tree space
#[derive(Debug, Clone, Copy)]
struct Segment {
    bottom_width: f32,
    top_width: f32,
    height: f32,
    frame: Frame,
    bone: usize,
}

impl Segment {
    fn shape(&self, depth: f32) -> Shape {
        Shape::TaperedPrism {
            bottom_width: self.bottom_width,
            top_width: self.top_width,
            height: self.height,
            depth,
        }
    }

    fn tip(&self) -> Vec2 {
        self.frame.transform_point(Vec2::new(0.0, self.height))
    }

    fn base_corner(&self, side: Side) -> Vec2 {
        let half = self.bottom_width / 2.0;
        let x = match side {
            Side::Left => -half,
            Side::Right => half,
        };
        self.frame.transform_point(Vec2::new(x, 0.0))
    }
}

/// A shape ready for emission with its skin binding
struct Part {
    shape: Shape,
    frame: Frame,
    binding: SkinBinding,
}

/// Which sides a segment tries to fork on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    Both,
    One(Side),
}

impl Pattern {
    fn sides(self) -> &'static [Side] {
        match self {
            Pattern::Both => &Side::BOTH,
            Pattern::One(Side::Left) => &[Side::Left],
            Pattern::One(Side::Right) => &[Side::Right],
        }
    }
}

/// Mutable state threaded through the recursion
struct BuildContext<'a, R: Rng + ?Sized> {
    params: &'a TreeParams,
    rng: &'a mut R,
    skeleton: Skeleton,
    parts: Vec<Part>,
    /// Bones still available, root excluded
    remaining: usize,
    segments: usize,
    trunk_length: f32,
    boundary_center: Vec2,
}

impl<R: Rng + ?Sized> BuildContext<'_, R> {
    fn fits(&self, point: Vec2) -> bool {
        point.distance(self.boundary_center) < self.params.boundary_radius
    }

    fn draw_pattern(&mut self) -> Pattern {
        if self.rng.random::<f32>() > BOTH_SIDES_THRESHOLD {
            Pattern::Both
        } else if self.rng.random::<f32>() < 0.5 {
            Pattern::One(Side::Left)
        } else {
            Pattern::One(Side::Right)
        }
    }

    /// Pick a direction for a branch on `side` of `segment`, or None when
    /// the side should stay bare
    fn choose_branch(&mut self, segment: &Segment, origin: Vec2, side: Side) -> Option<(f32, f32)> {
        let tip = segment.tip();
        let corner = segment.base_corner(side);
        let length = tip.distance(corner) * BRANCH_LENGTH_RATIO;
        if length <= self.trunk_length * MIN_BRANCH_RATIO {
            return None;
        }

        // The cone opens from "back toward the base corner" outward by 90°
        let base = angle_to(tip, corner);
        let sweep = match side {
            Side::Left => -FRAC_PI_2,
            Side::Right => FRAC_PI_2,
        };
        let offset = self.rng.random::<f32>();
        let candidate = base + sweep * offset;

        [candidate, base, base + sweep]
            .into_iter()
            .find(|angle| self.fits(origin + polar_to_cartesian(length, *angle)))
            .map(|angle| (angle, length))
    }

    /// Grow forks and caps at the tip of `segment`
    fn populate(&mut self, segment: Segment, pattern: Pattern) {
        let mut joint = WedgeJoint::new(
            segment.top_width,
            self.params.depth,
            Frame {
                origin: segment.tip(),
                angle: segment.frame.angle,
            },
        );

        for &side in pattern.sides() {
            // A fork costs the slot bone plus the branch bone
            if self.remaining < 2 {
                break;
            }
            joint.orient(side);
            let origin = joint.anchor_world();
            let Some((direction, length)) = self.choose_branch(&segment, origin, side) else {
                continue;
            };

            let slot_bone = self.skeleton.push_bone(
                segment.bone,
                format!("{}-{}", joint.shape.bone_name(), side.as_str()),
                (origin - segment.frame.origin).extend(0.0),
                0.0,
            );
            joint.slots[side as usize] = Some(slot_bone);

            let frame = Frame::facing(origin, direction);
            let bottom_width = segment.top_width;
            let child = Segment {
                bottom_width,
                top_width: bottom_width * self.params.taper,
                height: length,
                frame,
                bone: 0,
            };
            // Folding swings the branch about its slot onto the parent axis
            let closed_angle = normalize_angle(segment.frame.angle - frame.angle);
            let bone = self.skeleton.push_bone(
                slot_bone,
                child.shape(self.params.depth).bone_name(),
                Vec3::ZERO,
                closed_angle,
            );
            self.remaining -= 2;
            let child = Segment { bone, ..child };
            self.add_segment(&child);

            let next = self.draw_pattern();
            self.populate(child, next);
        }

        if joint.is_used() {
            self.parts.push(Part {
                shape: joint.resolved_shape(),
                frame: joint.frame,
                binding: joint.binding(),
            });
            log::trace!(
                "joint at {:?}: left={:?} right={:?}",
                joint.frame.origin,
                joint.slot(Side::Left),
                joint.slot(Side::Right)
            );
        } else if self.remaining >= 1 {
            self.add_cap(&segment);
        }
    }

    fn add_segment(&mut self, segment: &Segment) {
        self.parts.push(Part {
            shape: segment.shape(self.params.depth),
            frame: segment.frame,
            binding: SkinBinding::single(segment.bone),
        });
        self.segments += 1;
    }

    fn add_cap(&mut self, segment: &Segment) {
        let shape = Shape::PyramidCap {
            width: segment.top_width,
            height: segment.top_width * CAP_HEIGHT_RATIO,
            depth: self.params.depth,
        };
        let frame = Frame {
            origin: segment.tip(),
            angle: segment.frame.angle,
        };
        let bone = self.skeleton.push_bone(
            segment.bone,
            shape.bone_name(),
            (frame.origin - segment.frame.origin).extend(0.0),
            0.0,
        );
        self.remaining -= 1;
        self.parts.push(Part {
            shape,
            frame,
            binding: SkinBinding::single(bone),
        });
    }

    fn finish(self) -> TreeModel {
        let mut mesh = Mesh::new();
        let mut skin = Vec::new();
        for part in &self.parts {
            let local = part.shape.mesh();
            mesh.append(&local, &part.frame.matrix());
            skin.extend(std::iter::repeat_n(part.binding, local.vertices.len()));
        }

        TreeModel {
            mesh,
            skeleton: self.skeleton,
            skin,
            segments: self.segments,
            boundary_center: self.boundary_center,
            boundary_radius: self.params.boundary_radius,
        }
    }
}

/// Build one tree.
///
/// The bone count never exceeds `params.num_branches` (and is at least 1,
/// the root). Branches that do not fit the boundary are silently dropped.
pub fn build_tree<R: Rng + ?Sized>(params: &TreeParams, rng: &mut R) -> TreeModel {
    let num_sides = params.num_sides.max(3);
    let radius = params.boundary_radius;

    // Trunk footprint on the boundary, in boundary-centered coordinates
    let start = rng.random_range(0..num_sides) as f32;
    let step = TAU / num_sides as f32;
    let a = polar_to_cartesian(radius, step * start);
    let b = polar_to_cartesian(radius, step * (start - 1.0));
    let tip = a.lerp(Vec2::ZERO, TRUNK_REACH);
    let base = (a + b) * 0.5;

    // Move into tree space: base at the origin, trunk along +y
    let placement = Frame::facing(base, angle_to(base, tip));
    let to_tree = |p: Vec2| Vec2::from_angle(-placement.angle).rotate(p - placement.origin);
    let boundary_center = to_tree(Vec2::ZERO);

    let trunk_length = base.distance(tip);
    let mut ctx = BuildContext {
        params,
        rng,
        skeleton: Skeleton::with_root(),
        parts: Vec::new(),
        remaining: params.num_branches.saturating_sub(1),
        segments: 0,
        trunk_length,
        boundary_center,
    };

    if ctx.remaining >= 1 {
        let bottom_width = a.distance(b);
        let bone = ctx.skeleton.push_bone(
            0,
            Shape::UNIT_TAPERED_PRISM.bone_name(),
            Vec3::ZERO,
            0.0,
        );
        ctx.remaining -= 1;
        let trunk = Segment {
            bottom_width,
            top_width: bottom_width * params.taper,
            height: trunk_length,
            frame: Frame::IDENTITY,
            bone,
        };
        ctx.add_segment(&trunk);
        ctx.populate(trunk, Pattern::Both);
    }

    let model = ctx.finish();
    debug_assert!(model.skeleton.validate(&model.skin).is_ok());
    log::debug!(
        "built tree: {} segments, {} bones, {} vertices",
        model.segments,
        model.skeleton.len(),
        model.mesh.vertices.len()
    );
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::geometry::BonePose;
    use rand::{RngCore, SeedableRng};
    use rand_pcg::Pcg32;

    /// Always yields the same bits and counts how often it was drawn from
    struct FixedRng {
        bits: u32,
        draws: usize,
    }

    impl FixedRng {
        /// `random::<f32>()` draws 0.5
        fn half() -> Self {
            Self {
                bits: 1 << 31,
                draws: 0,
            }
        }
    }

    impl RngCore for FixedRng {
        fn next_u32(&mut self) -> u32 {
            self.draws += 1;
            self.bits
        }

        fn next_u64(&mut self) -> u64 {
            self.draws += 1;
            u64::from(self.bits) << 32
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0);
        }
    }

    fn context<'a>(
        params: &'a TreeParams,
        rng: &'a mut FixedRng,
        trunk_length: f32,
        boundary_center: Vec2,
    ) -> BuildContext<'a, FixedRng> {
        BuildContext {
            params,
            rng,
            skeleton: Skeleton::with_root(),
            parts: Vec::new(),
            remaining: params.num_branches - 1,
            segments: 0,
            trunk_length,
            boundary_center,
        }
    }

    /// Upright segment from the origin to (0, 2)
    fn upright() -> Segment {
        Segment {
            bottom_width: 1.0,
            top_width: 0.5,
            height: 2.0,
            frame: Frame::IDENTITY,
            bone: 0,
        }
    }

    fn tight(num_branches: usize) -> TreeParams {
        TreeParams {
            num_branches,
            boundary_radius: 0.1,
            ..Default::default()
        }
    }

    fn tree(seed: u64, num_branches: usize) -> TreeModel {
        let params = TreeParams {
            num_branches,
            ..Default::default()
        };
        build_tree(&params, &mut Pcg32::seed_from_u64(seed))
    }

    #[test]
    fn test_same_seed_same_tree() {
        assert_eq!(tree(42, 16), tree(42, 16));
    }

    #[test]
    fn test_single_bone_budget_is_root_only() {
        let model = tree(1, 1);
        assert_eq!(model.skeleton.len(), 1);
        assert!(model.mesh.is_empty());
        assert_eq!(model.segments, 0);
    }

    #[test]
    fn test_trunk_stands_on_origin() {
        let model = tree(7, 16);
        // First part emitted is the trunk: bottom vertices straddle the origin
        let v0 = model.mesh.vertices[0];
        let v1 = model.mesh.vertices[1];
        assert!((v0.x + v1.x).abs() < 1e-5);
        assert!(v0.y.abs() < 1e-5);
        let trunk_bone = &model.skeleton.bones()[1];
        assert_eq!(trunk_bone.parent, 0);
        assert_eq!(trunk_bone.position, Vec3::ZERO);
    }

    #[test]
    fn test_trunk_tip_inside_boundary() {
        let model = tree(3, 16);
        let tip = segment_tip(&model, 1);
        assert!(model.boundary_center.y > 0.0);
        assert!(tip.distance(model.boundary_center) < model.boundary_radius);
    }

    #[test]
    fn test_buffers_match_mesh() {
        let model = tree(9, 16);
        let vertices = model.vertex_buffer();
        assert_eq!(vertices.len(), model.mesh.vertices.len());
        assert_eq!(model.index_buffer().len(), model.mesh.faces.len() * 3);
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(bytes.len(), vertices.len() * std::mem::size_of::<SkinnedVertex>());
    }

    #[test]
    fn test_rest_pose_skin_reproduces_mesh() {
        let model = tree(11, 16);
        let skinned = model.skeleton.skin(
            &model.mesh.vertices,
            &model.skin,
            &model.skeleton.rest_pose(),
        );
        for (a, b) in model.mesh.vertices.iter().zip(skinned.iter()) {
            assert!(a.distance(*b) < 1e-4);
        }
    }

    #[test]
    fn test_wedge_orientation_is_idempotent() {
        let frame = Frame {
            origin: Vec2::new(0.2, 0.9),
            angle: 0.4,
        };
        let mut fresh = WedgeJoint::new(0.3, 0.1, frame);
        fresh.orient(Side::Left);

        let mut reused = WedgeJoint::new(0.3, 0.1, frame);
        reused.orient(Side::Right);
        reused.orient(Side::Left);

        assert!(fresh.anchor_world().distance(reused.anchor_world()) < 1e-7);
        assert_eq!(fresh.orientation, reused.orientation);
    }

    #[test]
    fn test_wedge_slots_mirror() {
        let mut joint = WedgeJoint::new(1.0, 0.1, Frame::IDENTITY);
        joint.orient(Side::Left);
        let left = joint.anchor_world();
        joint.orient(Side::Right);
        let right = joint.anchor_world();
        assert!((left.x + right.x).abs() < 1e-6);
        assert!((left.y - right.y).abs() < 1e-6);
    }

    #[test]
    fn test_branch_tips_inside_boundary() {
        for seed in 0..32 {
            let model = tree(seed, 16);
            for index in branch_bones(&model) {
                let d = segment_tip(&model, index).distance(model.boundary_center);
                assert!(d < model.boundary_radius + 1e-4, "seed {seed}: {d}");
            }
        }
    }

    /// Bones that carry a branch segment (children of wedge slots)
    fn branch_bones(model: &TreeModel) -> Vec<usize> {
        let bones = model.skeleton.bones();
        (2..bones.len())
            .filter(|&i| bones[i].name == Shape::UNIT_TAPERED_PRISM.bone_name())
            .collect()
    }

    /// Center of the top face of the segment bound to `bone`
    fn segment_tip(model: &TreeModel, bone: usize) -> Vec2 {
        let first = model
            .skin
            .iter()
            .position(|b| *b == SkinBinding::single(bone))
            .expect("segment vertices");
        let top = &model.mesh.vertices[first + 4..first + 8];
        (top.iter().sum::<Vec3>() / 4.0).truncate()
    }

    /// Worst change in distance between a branch vertex and the pivot of
    /// its joint, after accounting for the branch's accumulated scale.
    /// Also returns how many vertices were measured.
    fn worst_joint_drift(model: &TreeModel, poses: &[BonePose]) -> (f32, usize) {
        let skeleton = &model.skeleton;
        let rest = skeleton.world_transforms(&[]);
        let posed = skeleton.world_transforms(poses);
        let skinned = skeleton.skin(&model.mesh.vertices, &model.skin, poses);
        let branches = branch_bones(model);

        let mut worst = 0.0f32;
        let mut measured = 0;
        for ((vertex, binding), moved) in model.mesh.vertices.iter().zip(&model.skin).zip(&skinned) {
            let bone = binding.indices[0] as usize;
            if binding.weights[0] != 1.0 || !branches.contains(&bone) {
                continue;
            }
            let Some(joint) = skeleton.bones()[bone].parent_index() else {
                continue;
            };
            let scale = posed[bone].x_axis.length();
            let before = vertex.distance(rest[joint].w_axis.truncate()) * scale;
            let after = moved.distance(posed[joint].w_axis.truncate());
            worst = worst.max((after - before).abs());
            measured += 1;
        }
        (worst, measured)
    }

    #[test]
    fn test_folded_branches_stay_on_their_joints() {
        let mut measured = 0;
        for seed in 0..16 {
            let model = tree(seed, 16);
            let mut poses = model.skeleton.rest_pose();
            for (pose, bone) in poses.iter_mut().zip(model.skeleton.bones()).skip(2) {
                pose.rotation_z = bone.closed_angle;
            }
            let (drift, count) = worst_joint_drift(&model, &poses);
            assert!(drift < 1e-4, "seed {seed}: {drift}");
            measured += count;
        }
        assert!(measured > 0);
    }

    #[test]
    fn test_trunk_stays_rooted_when_posed() {
        let model = tree(5, 16);
        let mut poses = model.skeleton.rest_pose();
        for (pose, bone) in poses.iter_mut().zip(model.skeleton.bones()) {
            pose.scale = Vec3::splat(0.5);
            pose.rotation_z = bone.closed_angle * 0.5;
        }
        assert!(model.skeleton.world_transforms(&poses)[1].w_axis.truncate().length() < 1e-6);

        let skinned = model.skeleton.skin(&model.mesh.vertices, &model.skin, &poses);
        // Trunk bottom vertices stay on the wall
        for (vertex, moved) in model.mesh.vertices.iter().zip(&skinned).take(4) {
            assert!(vertex.y.abs() < 1e-5);
            assert!(moved.y.abs() < 1e-5);
        }
        let (drift, _) = worst_joint_drift(&model, &poses);
        assert!(drift < 1e-4, "{drift}");
    }

    #[test]
    fn test_random_candidate_is_taken_when_it_fits() {
        let segment = upright();
        let origin = segment.tip();
        let length = origin.distance(segment.base_corner(Side::Left)) * BRANCH_LENGTH_RATIO;
        let base = angle_to(origin, segment.base_corner(Side::Left));
        let candidate = base - FRAC_PI_2 * 0.5;

        let params = tight(16);
        let mut rng = FixedRng::half();
        let center = origin + polar_to_cartesian(length, candidate);
        let mut ctx = context(&params, &mut rng, 1.0, center);
        let (angle, grown) = ctx
            .choose_branch(&segment, origin, Side::Left)
            .expect("candidate fits");
        assert!((angle - candidate).abs() < 1e-6);
        assert!((grown - length).abs() < 1e-6);
    }

    #[test]
    fn test_misfit_retries_cone_base() {
        let segment = upright();
        let origin = segment.tip();
        let length = origin.distance(segment.base_corner(Side::Right)) * BRANCH_LENGTH_RATIO;
        let base = angle_to(origin, segment.base_corner(Side::Right));

        let params = tight(16);
        let mut rng = FixedRng::half();
        let center = origin + polar_to_cartesian(length, base);
        let mut ctx = context(&params, &mut rng, 1.0, center);
        let (angle, _) = ctx
            .choose_branch(&segment, origin, Side::Right)
            .expect("cone base fits");
        assert_eq!(angle, base);
    }

    #[test]
    fn test_misfit_grows_branch_at_cone_edge() {
        let segment = upright();
        // Budget for exactly one fork: slot bone plus branch bone
        let params = tight(3);
        let mut joint = WedgeJoint::new(
            segment.top_width,
            params.depth,
            Frame {
                origin: segment.tip(),
                angle: 0.0,
            },
        );
        joint.orient(Side::Left);
        let origin = joint.anchor_world();
        let corner = segment.base_corner(Side::Left);
        let length = segment.tip().distance(corner) * BRANCH_LENGTH_RATIO;
        let edge = angle_to(segment.tip(), corner) - FRAC_PI_2;

        let mut rng = FixedRng::half();
        let center = origin + polar_to_cartesian(length, edge);
        let mut ctx = context(&params, &mut rng, 1.0, center);
        ctx.populate(upright(), Pattern::One(Side::Left));

        assert_eq!(ctx.skeleton.len(), 3);
        assert_eq!(ctx.remaining, 0);
        let branch = &ctx.parts[0];
        assert!(branch.frame.origin.distance(origin) < 1e-6);
        assert!((branch.frame.angle - Frame::facing(origin, edge).angle).abs() < 1e-6);
        // Slot bone on the anchor, branch bone sharing its pivot
        let bones = ctx.skeleton.bones();
        assert_eq!(bones[1].name, "wedge-left");
        assert_eq!(bones[1].parent, 0);
        assert_eq!(bones[1].position, origin.extend(0.0));
        assert_eq!(bones[2].parent, 1);
        assert_eq!(bones[2].position, Vec3::ZERO);
    }

    #[test]
    fn test_no_fit_abandons_side() {
        let segment = upright();
        let params = tight(16);
        let mut rng = FixedRng::half();
        let mut ctx = context(&params, &mut rng, 1.0, Vec2::new(10.0, 10.0));
        assert_eq!(ctx.choose_branch(&segment, segment.tip(), Side::Left), None);
        // Cone edges are tried without further draws
        assert_eq!(ctx.rng.draws, 1);
    }

    #[test]
    fn test_short_branch_is_dropped_without_retry() {
        let segment = upright();
        let params = TreeParams {
            boundary_radius: 100.0,
            ..Default::default()
        };
        let mut rng = FixedRng::half();
        // Branch length 0.7 * |tip - corner| ≈ 1.44 is below 0.4 * 10
        let mut ctx = context(&params, &mut rng, 10.0, Vec2::ZERO);
        assert_eq!(ctx.choose_branch(&segment, segment.tip(), Side::Left), None);
        assert_eq!(ctx.rng.draws, 0);

        ctx.populate(upright(), Pattern::Both);
        assert_eq!(ctx.skeleton.len(), 2);
        assert_eq!(ctx.skeleton.bones()[1].name, "pyramid-cap");
    }

    proptest! {
        #[test]
        fn prop_bone_count_and_order(seed in any::<u64>(), n in 1usize..40) {
            let model = tree(seed, n);
            let bones = model.skeleton.bones();
            prop_assert!(!bones.is_empty() && bones.len() <= n);
            prop_assert_eq!(bones[0].parent, -1);
            for (i, bone) in bones.iter().enumerate().skip(1) {
                prop_assert!(bone.parent >= 0 && (bone.parent as usize) < i);
            }
        }

        #[test]
        fn prop_skin_weights_normalized(seed in any::<u64>(), n in 1usize..40) {
            let model = tree(seed, n);
            prop_assert_eq!(model.skin.len(), model.mesh.vertices.len());
            for binding in &model.skin {
                prop_assert!((binding.weight_sum() - 1.0).abs() <= 1e-6);
            }
            prop_assert!(model.skeleton.validate(&model.skin).is_ok());
        }
    }
}
