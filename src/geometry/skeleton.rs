//! Bone hierarchy and skin weights
//!
//! Bones are stored in creation order with parents always earlier than
//! their children, so world transforms can be computed in a single pass.
//! Bone positions are offsets from the parent pivot expressed in tree space
//! (every rest rotation is identity).

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance for skin weight normalization
pub const WEIGHT_EPSILON: f32 = 1e-6;

/// Structural problems in a skeleton or its skin bindings
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkeletonError {
    #[error("skeleton has no root bone")]
    MissingRoot,

    #[error("root bone has parent {0}, expected -1")]
    RootHasParent(i32),

    #[error("bone {bone} references parent {parent}, which is not an earlier bone")]
    ParentNotEarlier { bone: usize, parent: i32 },

    #[error("vertex {vertex} is bound to unknown bone {bone}")]
    UnknownBone { vertex: usize, bone: u32 },

    #[error("vertex {vertex} has no influencing bone")]
    NoInfluence { vertex: usize },

    #[error("vertex {vertex} weights sum to {sum}, expected 1")]
    UnnormalizedWeights { vertex: usize, sum: f32 },

    #[error("{bindings} skin bindings for {vertices} vertices")]
    BindingCountMismatch { bindings: usize, vertices: usize },
}

/// A pivot in the skeleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    /// Index of the parent bone, -1 for the root
    pub parent: i32,
    pub name: String,
    /// Offset from the parent pivot
    pub position: Vec3,
    pub rotation: Quat,
    /// Rotation about z the bone folds toward when an obstacle closes
    #[serde(default)]
    pub closed_angle: f32,
}

impl Bone {
    pub fn parent_index(&self) -> Option<usize> {
        usize::try_from(self.parent).ok()
    }
}

/// Up to two (bone, weight) influences for one vertex
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkinBinding {
    pub indices: [u32; 2],
    pub weights: [f32; 2],
}

impl SkinBinding {
    /// Fully bound to one bone
    pub fn single(bone: usize) -> Self {
        Self {
            indices: [bone as u32, 0],
            weights: [1.0, 0.0],
        }
    }

    /// Evenly split between two bones
    pub fn split(a: usize, b: usize) -> Self {
        Self {
            indices: [a as u32, b as u32],
            weights: [0.5, 0.5],
        }
    }

    pub fn weight_sum(&self) -> f32 {
        self.weights[0] + self.weights[1]
    }

    /// Influences with a nonzero weight
    pub fn influences(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.indices
            .iter()
            .zip(self.weights.iter())
            .filter(|(_, w)| **w != 0.0)
            .map(|(i, w)| (*i as usize, *w))
    }
}

/// Per-bone animated state applied on top of the rest pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonePose {
    pub scale: Vec3,
    pub rotation_z: f32,
}

impl Default for BonePose {
    fn default() -> Self {
        Self {
            scale: Vec3::ONE,
            rotation_z: 0.0,
        }
    }
}

/// Bone hierarchy rooted at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    bones: Vec<Bone>,
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::with_root()
    }
}

impl Skeleton {
    /// A skeleton holding only the root bone at the origin
    pub fn with_root() -> Self {
        Self {
            bones: vec![Bone {
                parent: -1,
                name: "root".to_string(),
                position: Vec3::ZERO,
                rotation: Quat::IDENTITY,
                closed_angle: 0.0,
            }],
        }
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Append a bone and return its index.
    ///
    /// # Panics
    /// If `parent` is not an existing bone. Parents must be created first.
    pub fn push_bone(
        &mut self,
        parent: usize,
        name: impl Into<String>,
        position: Vec3,
        closed_angle: f32,
    ) -> usize {
        assert!(
            parent < self.bones.len(),
            "bone parent {parent} does not exist ({} bones)",
            self.bones.len()
        );
        self.bones.push(Bone {
            parent: parent as i32,
            name: name.into(),
            position,
            rotation: Quat::IDENTITY,
            closed_angle,
        });
        self.bones.len() - 1
    }

    /// Check the hierarchy and, when given, the skin bindings of a mesh
    pub fn validate(&self, skin: &[SkinBinding]) -> Result<(), SkeletonError> {
        let root = self.bones.first().ok_or(SkeletonError::MissingRoot)?;
        if root.parent != -1 {
            return Err(SkeletonError::RootHasParent(root.parent));
        }
        for (index, bone) in self.bones.iter().enumerate().skip(1) {
            match bone.parent_index() {
                Some(parent) if parent < index => {}
                _ => {
                    return Err(SkeletonError::ParentNotEarlier {
                        bone: index,
                        parent: bone.parent,
                    });
                }
            }
        }

        for (vertex, binding) in skin.iter().enumerate() {
            let mut influences = 0;
            for (bone, _) in binding.influences() {
                if bone >= self.bones.len() {
                    return Err(SkeletonError::UnknownBone {
                        vertex,
                        bone: bone as u32,
                    });
                }
                influences += 1;
            }
            if influences == 0 {
                return Err(SkeletonError::NoInfluence { vertex });
            }
            let sum = binding.weight_sum();
            if (sum - 1.0).abs() > WEIGHT_EPSILON {
                return Err(SkeletonError::UnnormalizedWeights { vertex, sum });
            }
        }
        Ok(())
    }

    pub fn rest_pose(&self) -> Vec<BonePose> {
        vec![BonePose::default(); self.bones.len()]
    }

    /// World transform of every bone for the given pose, parent-to-child.
    /// Missing pose entries fall back to the rest pose.
    pub fn world_transforms(&self, poses: &[BonePose]) -> Vec<Mat4> {
        let mut world: Vec<Mat4> = Vec::with_capacity(self.bones.len());
        for (index, bone) in self.bones.iter().enumerate() {
            let pose = poses.get(index).copied().unwrap_or_default();
            let local = Mat4::from_scale_rotation_translation(
                pose.scale,
                bone.rotation * Quat::from_rotation_z(pose.rotation_z),
                bone.position,
            );
            let transform = match bone.parent_index() {
                Some(parent) => world[parent] * local,
                None => local,
            };
            world.push(transform);
        }
        world
    }

    /// Linear-blend skinning of `vertices` (given in the rest pose)
    pub fn skin(&self, vertices: &[Vec3], bindings: &[SkinBinding], poses: &[BonePose]) -> Vec<Vec3> {
        let bind_inverse: Vec<Mat4> = self
            .world_transforms(&[])
            .iter()
            .map(|m| m.inverse())
            .collect();
        let skinning: Vec<Mat4> = self
            .world_transforms(poses)
            .iter()
            .zip(bind_inverse.iter())
            .map(|(world, inverse)| *world * *inverse)
            .collect();

        vertices
            .iter()
            .zip(bindings.iter())
            .map(|(vertex, binding)| {
                binding
                    .influences()
                    .filter_map(|(bone, weight)| {
                        skinning
                            .get(bone)
                            .map(|m| m.transform_point3(*vertex) * weight)
                    })
                    .fold(Vec3::ZERO, |acc, v| acc + v)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Skeleton {
        let mut skeleton = Skeleton::with_root();
        let a = skeleton.push_bone(0, "a", Vec3::new(0.0, 1.0, 0.0), 0.0);
        skeleton.push_bone(a, "b", Vec3::new(0.0, 1.0, 0.0), 0.5);
        skeleton
    }

    #[test]
    fn test_root_invariant() {
        let skeleton = Skeleton::with_root();
        assert_eq!(skeleton.len(), 1);
        assert_eq!(skeleton.bones()[0].parent, -1);
        assert!(skeleton.validate(&[]).is_ok());
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_push_bone_rejects_forward_parent() {
        let mut skeleton = Skeleton::with_root();
        skeleton.push_bone(3, "orphan", Vec3::ZERO, 0.0);
    }

    #[test]
    fn test_validate_reports_bad_bindings() {
        let skeleton = chain();
        assert!(skeleton.validate(&[SkinBinding::single(2)]).is_ok());
        assert_eq!(
            skeleton.validate(&[SkinBinding::single(7)]),
            Err(SkeletonError::UnknownBone { vertex: 0, bone: 7 })
        );
        let unweighted = SkinBinding {
            indices: [1, 0],
            weights: [0.0, 0.0],
        };
        assert_eq!(
            skeleton.validate(&[unweighted]),
            Err(SkeletonError::NoInfluence { vertex: 0 })
        );
        let heavy = SkinBinding {
            indices: [1, 2],
            weights: [0.7, 0.7],
        };
        assert!(matches!(
            skeleton.validate(&[heavy]),
            Err(SkeletonError::UnnormalizedWeights { vertex: 0, .. })
        ));
    }

    #[test]
    fn test_world_transforms_accumulate_offsets() {
        let world = chain().world_transforms(&[]);
        assert_eq!(world[2].w_axis.truncate(), Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_scaled_pose_collapses_toward_root() {
        let skeleton = chain();
        let poses = vec![
            BonePose {
                scale: Vec3::splat(0.5),
                rotation_z: 0.0,
            };
            3
        ];
        let world = skeleton.world_transforms(&poses);
        let tip = world[2].w_axis.truncate();
        // 0.5 * 1 + 0.25 * 1
        assert!((tip.y - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_rest_pose_skinning_is_identity() {
        let skeleton = chain();
        let vertices = vec![Vec3::new(0.3, 1.5, 0.1), Vec3::new(-0.2, 2.5, 0.0)];
        let bindings = vec![SkinBinding::single(1), SkinBinding::split(1, 2)];
        let skinned = skeleton.skin(&vertices, &bindings, &skeleton.rest_pose());
        for (a, b) in vertices.iter().zip(skinned.iter()) {
            assert!(a.distance(*b) < 1e-5);
        }
    }

    #[test]
    fn test_rotated_bone_moves_bound_vertex() {
        let skeleton = chain();
        let mut poses = skeleton.rest_pose();
        poses[2].rotation_z = std::f32::consts::FRAC_PI_2;
        // One unit above bone 2's pivot swings to its left
        let skinned = skeleton.skin(
            &[Vec3::new(0.0, 3.0, 0.0)],
            &[SkinBinding::single(2)],
            &poses,
        );
        assert!(skinned[0].distance(Vec3::new(-1.0, 2.0, 0.0)) < 1e-5);
    }
}
