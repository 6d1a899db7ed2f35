//! Minimal rigid-body world
//!
//! Only what the game consumes from a physics engine: bodies with a sphere
//! or triangle-mesh shape, collision group/mask filtering, a fixed-step
//! `step` and a queue of "these two bodies touched" contacts. Obstacles
//! are static meshes, so mesh-mesh pairs are never tested.

use glam::{Quat, Vec3};

use crate::consts::MAX_SUBSTEPS;

/// Handle to a body owned by the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(usize);

impl BodyHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Collision shape in body-local space
#[derive(Debug, Clone)]
pub enum BodyShape {
    Sphere {
        radius: f32,
    },
    TriMesh {
        vertices: Vec<Vec3>,
        indices: Vec<[u32; 3]>,
    },
}

impl BodyShape {
    /// Radius of a sphere around the local origin enclosing the shape
    pub fn bounding_radius(&self) -> f32 {
        match self {
            BodyShape::Sphere { radius } => *radius,
            BodyShape::TriMesh { vertices, .. } => {
                vertices.iter().map(|v| v.length()).fold(0.0, f32::max)
            }
        }
    }
}

/// A simulated body
#[derive(Debug, Clone)]
pub struct Body {
    pub position: Vec3,
    pub orientation: Quat,
    pub velocity: Vec3,
    /// Zero mass bodies never integrate
    pub mass: f32,
    pub shape: BodyShape,
    pub collision_group: u32,
    pub collision_mask: u32,
    bounding_radius: f32,
}

impl Body {
    /// Both bodies accept each other's group
    pub fn can_collide(&self, other: &Body) -> bool {
        (self.collision_group & other.collision_mask) != 0
            && (other.collision_group & self.collision_mask) != 0
    }

    fn to_local(&self, point: Vec3) -> Vec3 {
        self.orientation.inverse() * (point - self.position)
    }

    fn to_world(&self, point: Vec3) -> Vec3 {
        self.position + self.orientation * point
    }
}

/// Two bodies touched during a step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub a: BodyHandle,
    pub b: BodyHandle,
    /// Closest point on `b` in world space
    pub point: Vec3,
    pub penetration: f32,
}

impl Contact {
    pub fn involves(&self, body: BodyHandle) -> bool {
        self.a == body || self.b == body
    }
}

/// Body container and stepper
#[derive(Debug, Clone, Default)]
pub struct World {
    bodies: Vec<Body>,
    accumulator: f32,
    contacts: Vec<Contact>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a body at the origin. New bodies collide with layer 1.
    pub fn create_body(&mut self, mass: f32, shape: BodyShape) -> BodyHandle {
        let bounding_radius = shape.bounding_radius();
        self.bodies.push(Body {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            mass,
            shape,
            collision_group: 1,
            collision_mask: 1,
            bounding_radius,
        });
        BodyHandle(self.bodies.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn body(&self, handle: BodyHandle) -> &Body {
        &self.bodies[handle.0]
    }

    pub fn set_position(&mut self, handle: BodyHandle, position: Vec3) {
        self.bodies[handle.0].position = position;
    }

    pub fn set_orientation(&mut self, handle: BodyHandle, orientation: Quat) {
        self.bodies[handle.0].orientation = orientation;
    }

    pub fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec3) {
        self.bodies[handle.0].velocity = velocity;
    }

    pub fn set_collision_filter(&mut self, handle: BodyHandle, group: u32, mask: u32) {
        let body = &mut self.bodies[handle.0];
        body.collision_group = group;
        body.collision_mask = mask;
    }

    /// Advance by whole `fixed_dt` substeps covering `elapsed` seconds.
    /// Leftover time carries over to the next call.
    pub fn step(&mut self, fixed_dt: f32, elapsed: f32) {
        self.accumulator += elapsed;
        let mut substeps = 0;
        while self.accumulator >= fixed_dt && substeps < MAX_SUBSTEPS {
            self.internal_step(fixed_dt);
            self.accumulator -= fixed_dt;
            substeps += 1;
        }
        if substeps == MAX_SUBSTEPS {
            self.accumulator %= fixed_dt;
        }
    }

    /// Take every contact reported since the last drain
    pub fn drain_contacts(&mut self) -> Vec<Contact> {
        std::mem::take(&mut self.contacts)
    }

    fn internal_step(&mut self, dt: f32) {
        for body in self.bodies.iter_mut().filter(|b| b.mass > 0.0) {
            body.position += body.velocity * dt;
        }

        for i in 0..self.bodies.len() {
            for j in (i + 1)..self.bodies.len() {
                let (a, b) = (&self.bodies[i], &self.bodies[j]);
                if !a.can_collide(b) {
                    continue;
                }
                if a.position.distance(b.position) > a.bounding_radius + b.bounding_radius {
                    continue;
                }
                let Some((point, penetration)) = test_pair(a, b) else {
                    continue;
                };
                let (ha, hb) = (BodyHandle(i), BodyHandle(j));
                let seen = self
                    .contacts
                    .iter()
                    .any(|c| c.a == ha && c.b == hb);
                if !seen {
                    self.contacts.push(Contact {
                        a: ha,
                        b: hb,
                        point,
                        penetration,
                    });
                }
            }
        }
    }
}

/// Narrow phase for one pair, returning the contact point and depth
fn test_pair(a: &Body, b: &Body) -> Option<(Vec3, f32)> {
    match (&a.shape, &b.shape) {
        (BodyShape::Sphere { radius: ra }, BodyShape::Sphere { radius: rb }) => {
            let delta = b.position - a.position;
            let distance = delta.length();
            (distance < ra + rb).then(|| {
                (
                    b.position - delta.normalize_or_zero() * *rb,
                    ra + rb - distance,
                )
            })
        }
        (BodyShape::Sphere { radius }, BodyShape::TriMesh { .. }) => {
            sphere_mesh(a.position, *radius, b)
        }
        (BodyShape::TriMesh { .. }, BodyShape::Sphere { radius }) => {
            sphere_mesh(b.position, *radius, a)
        }
        (BodyShape::TriMesh { .. }, BodyShape::TriMesh { .. }) => None,
    }
}

/// Deepest contact between a sphere and a triangle mesh body
fn sphere_mesh(center: Vec3, radius: f32, mesh: &Body) -> Option<(Vec3, f32)> {
    let BodyShape::TriMesh { vertices, indices } = &mesh.shape else {
        return None;
    };
    let local = mesh.to_local(center);

    let mut best: Option<(Vec3, f32)> = None;
    for [ia, ib, ic] in indices {
        let (a, b, c) = (
            vertices[*ia as usize],
            vertices[*ib as usize],
            vertices[*ic as usize],
        );
        // Zero-area triangles have no closest point
        if (b - a).cross(c - a).length_squared() < 1e-12 {
            continue;
        }
        let closest = closest_point_on_triangle(local, a, b, c);
        let distance = closest.distance(local);
        if distance < radius {
            let penetration = radius - distance;
            if best.is_none_or(|(_, p)| penetration > p) {
                best = Some((closest, penetration));
            }
        }
    }
    best.map(|(point, penetration)| (mesh.to_world(point), penetration))
}

/// Closest point to `p` on triangle `abc` (Voronoi region walk)
pub fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return a + ab * (d1 / (d1 - d3));
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return a + ac * (d2 / (d2 - d6));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        return b + (c - b) * ((d4 - d3) / ((d4 - d3) + (d5 - d6)));
    }

    let denom = 1.0 / (va + vb + vc);
    a + ab * (vb * denom) + ac * (vc * denom)
}
