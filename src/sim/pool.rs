//! Obstacle pool
//!
//! Every tree obstacle is built once at startup and recycled between the
//! active and inactive sets. Disabling an obstacle hides it and drops it
//! from the collision layer; nothing is allocated after construction.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::{Quat, Vec3};
use rand::Rng;

use super::physics::{BodyHandle, BodyShape, World};
use crate::consts::*;
use crate::geometry::{BonePose, TreeModel, TreeParams, build_tree};
use crate::polar_to_cartesian;

/// Index of an obstacle slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObstacleId(usize);

impl ObstacleId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A pooled tree obstacle
#[derive(Debug, Clone)]
pub struct Obstacle {
    /// Generated geometry, read-only after construction
    pub model: TreeModel,
    pub body: BodyHandle,
    pub position: Vec3,
    pub rotation: Quat,
    /// Already scored this layout
    pub passed: bool,
    pub active: bool,
    /// Current bone pose, one entry per bone
    pub pose: Vec<BonePose>,
}

/// Fixed arena of obstacles with active/inactive partitions
#[derive(Debug, Clone)]
pub struct ObstaclePool {
    obstacles: Vec<Obstacle>,
    active: Vec<ObstacleId>,
    inactive: Vec<ObstacleId>,
}

impl ObstaclePool {
    /// Build `size` distinct trees, each with a static trimesh body. All
    /// start disabled.
    pub fn new<R: Rng + ?Sized>(
        size: usize,
        params: &TreeParams,
        world: &mut World,
        rng: &mut R,
    ) -> Self {
        let mut obstacles = Vec::with_capacity(size);
        for _ in 0..size {
            let model = build_tree(params, rng);
            let body = world.create_body(
                0.0,
                BodyShape::TriMesh {
                    vertices: model.mesh.vertices.clone(),
                    indices: model.mesh.faces.clone(),
                },
            );
            world.set_collision_filter(body, 0, 0);
            let pose = model.skeleton.rest_pose();
            obstacles.push(Obstacle {
                model,
                body,
                position: Vec3::ZERO,
                rotation: Quat::IDENTITY,
                passed: false,
                active: false,
                pose,
            });
        }
        log::info!("Built obstacle pool of {} trees", size);

        Self {
            obstacles,
            active: Vec::new(),
            inactive: (0..size).map(ObstacleId).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    pub fn get(&self, id: ObstacleId) -> &Obstacle {
        &self.obstacles[id.0]
    }

    pub fn active(&self) -> &[ObstacleId] {
        &self.active
    }

    pub fn inactive(&self) -> &[ObstacleId] {
        &self.inactive
    }

    pub fn iter_active(&self) -> impl Iterator<Item = &Obstacle> + '_ {
        self.active.iter().map(|id| &self.obstacles[id.0])
    }

    /// Make visible, collidable and scoreable again
    fn enable(&mut self, id: ObstacleId, world: &mut World) {
        let obstacle = &mut self.obstacles[id.0];
        obstacle.active = true;
        obstacle.passed = false;
        world.set_collision_filter(obstacle.body, ACTIVE_COLLISION_LAYER, ACTIVE_COLLISION_LAYER);
    }

    fn disable(&mut self, id: ObstacleId, world: &mut World) {
        let obstacle = &mut self.obstacles[id.0];
        obstacle.active = false;
        world.set_collision_filter(obstacle.body, 0, 0);
    }

    /// Move an obstacle and its body
    pub fn place(&mut self, id: ObstacleId, position: Vec3, rotation: Quat, world: &mut World) {
        let obstacle = &mut self.obstacles[id.0];
        obstacle.position = position;
        obstacle.rotation = rotation;
        world.set_position(obstacle.body, position);
        world.set_orientation(obstacle.body, rotation);
    }

    /// Return every obstacle to the inactive set
    pub fn deactivate_all(&mut self, world: &mut World) {
        for index in 0..self.obstacles.len() {
            self.disable(ObstacleId(index), world);
        }
        self.active.clear();
        self.inactive = (0..self.obstacles.len()).map(ObstacleId).collect();
    }

    /// Lay out a new set of obstacles ahead of `player_z`.
    ///
    /// Activates up to `branch_count` obstacles (fewer if the pool runs
    /// out), each at a random angle on the tunnel wall, facing the center,
    /// spread over one tunnel segment beyond the next one.
    pub fn change_level<R: Rng + ?Sized>(
        &mut self,
        branch_count: usize,
        player_z: f32,
        world: &mut World,
        rng: &mut R,
    ) -> usize {
        self.deactivate_all(world);

        let spacing = TUNNEL_SEGMENT_LENGTH / branch_count.max(1) as f32;
        let mut remaining = branch_count;
        while remaining > 0 {
            remaining -= 1;
            let Some(id) = self.inactive.pop() else {
                log::debug!("Pool exhausted with {} obstacles left to place", remaining + 1);
                break;
            };
            self.enable(id, world);
            self.active.push(id);

            let angle = rng.random::<f32>() * TAU;
            let lateral = polar_to_cartesian(OBSTACLE_RING_FACTOR * TUNNEL_RADIUS, angle);
            let z = player_z - TUNNEL_SEGMENT_LENGTH - remaining as f32 * spacing;
            // Tree space +y points back toward the tunnel axis
            let rotation = Quat::from_rotation_z(angle + FRAC_PI_2);
            self.place(id, lateral.extend(z), rotation, world);
        }

        log::debug!(
            "Activated {} obstacles ({} requested)",
            self.active.len(),
            branch_count
        );
        self.active.len()
    }

    /// Flag active obstacles the player has just flown past.
    /// Returns how many were newly passed.
    pub fn mark_passed(&mut self, player_z: f32) -> usize {
        let mut count = 0;
        for id in &self.active {
            let obstacle = &mut self.obstacles[id.0];
            if !obstacle.passed && player_z < obstacle.position.z {
                obstacle.passed = true;
                count += 1;
            }
        }
        count
    }

    /// Disable obstacles that fell behind the camera.
    /// Returns how many were retired.
    pub fn retire_behind(&mut self, camera_z: f32, world: &mut World) -> usize {
        let behind: Vec<ObstacleId> = self
            .active
            .iter()
            .copied()
            .filter(|id| camera_z < self.obstacles[id.0].position.z)
            .collect();
        for &id in &behind {
            self.disable(id, world);
            self.inactive.push(id);
        }
        self.active.retain(|id| !behind.contains(id));
        behind.len()
    }

    /// Bloom/fold every active obstacle by its distance to the player.
    ///
    /// `t = |falloff - d| / falloff` clamped to [0, 1] scales every bone;
    /// bones past the trunk also swing toward their closed angle by `1 - t`.
    pub fn update_poses(&mut self, player_position: Vec3, falloff: f32) {
        for id in &self.active {
            let obstacle = &mut self.obstacles[id.0];
            let distance = obstacle.position.distance(player_position);
            let t = ((falloff - distance).abs() / falloff).clamp(0.0, 1.0);
            let bones = obstacle.model.skeleton.bones();
            for (index, (bone, pose)) in bones.iter().zip(obstacle.pose.iter_mut()).enumerate() {
                // (1, 1, 1) rescaled to length t·√3
                pose.scale = Vec3::splat(t);
                if index > 1 {
                    pose.rotation_z = bone.closed_angle * (1.0 - t);
                }
            }
        }
    }
}
