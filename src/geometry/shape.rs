//! Primitive solids used as tree segments
//!
//! Shapes are generated lying on the x/y plane with +y as the growth axis
//! and +z pointing out of the tunnel wall. Rotations happen about z.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Which branching slot of a wedge joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// Local-space triangle mesh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Append another mesh transformed by `transform`, returning the index
    /// of its first vertex in this mesh
    pub fn append(&mut self, other: &Mesh, transform: &Mat4) -> u32 {
        let base = self.vertices.len() as u32;
        self.vertices
            .extend(other.vertices.iter().map(|v| transform.transform_point3(*v)));
        self.faces.extend(
            other
                .faces
                .iter()
                .map(|[a, b, c]| [a + base, b + base, c + base]),
        );
        base
    }
}

/// An attachment point in a shape's local space: position plus rotation about z
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub position: Vec3,
    pub angle: f32,
}

/// The three primitive solids a tree is assembled from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Trapezoidal box, open at top and bottom
    TaperedPrism {
        bottom_width: f32,
        top_width: f32,
        height: f32,
        depth: f32,
    },
    /// Equilateral triangular joint where a segment forks.
    /// `direction` selects which side wall is closed for single-sided joints.
    TriangularWedge {
        width: f32,
        depth: f32,
        direction: Option<Side>,
    },
    /// Terminal cap
    PyramidCap { width: f32, height: f32, depth: f32 },
}

impl Shape {
    pub const UNIT_TAPERED_PRISM: Shape = Shape::TaperedPrism {
        bottom_width: 1.0,
        top_width: 1.0,
        height: 1.0,
        depth: 1.0,
    };
    #[cfg(test)]
    pub const UNIT_WEDGE: Shape = Shape::TriangularWedge {
        width: 1.0,
        depth: 1.0,
        direction: None,
    };
    #[cfg(test)]
    pub const UNIT_PYRAMID_CAP: Shape = Shape::PyramidCap {
        width: 1.0,
        height: 1.0,
        depth: 1.0,
    };

    /// Bone name used for this shape in the skeleton
    pub fn bone_name(&self) -> &'static str {
        match self {
            Shape::TaperedPrism { .. } => "tapered-prism",
            Shape::TriangularWedge { .. } => "wedge",
            Shape::PyramidCap { .. } => "pyramid-cap",
        }
    }

    /// Attachment point for the next part. Prisms and caps attach at the
    /// top center; a wedge attaches on the slot for `side`, tilted 60° away
    /// from the axis so the two slots diverge at the equilateral angle.
    pub fn anchor(&self, side: Option<Side>) -> Anchor {
        match *self {
            Shape::TaperedPrism { height, .. } | Shape::PyramidCap { height, .. } => Anchor {
                position: Vec3::new(0.0, height, 0.0),
                angle: 0.0,
            },
            Shape::TriangularWedge { width, .. } => {
                let half_width = width / 2.0;
                let half_height = wedge_height(width) / 2.0;
                let (x, angle) = match side {
                    Some(Side::Left) => (-half_width / 2.0, std::f32::consts::FRAC_PI_3),
                    Some(Side::Right) => (half_width / 2.0, -std::f32::consts::FRAC_PI_3),
                    None => (0.0, 0.0),
                };
                Anchor {
                    position: Vec3::new(x, half_height, 0.0),
                    angle,
                }
            }
        }
    }

    /// Generate the local-space mesh
    pub fn mesh(&self) -> Mesh {
        match *self {
            Shape::TaperedPrism {
                bottom_width,
                top_width,
                height,
                depth,
            } => tapered_prism(bottom_width, top_width, height, depth),
            Shape::TriangularWedge {
                width,
                depth,
                direction,
            } => wedge(width, depth, direction),
            Shape::PyramidCap {
                width,
                height,
                depth,
            } => pyramid_cap(width, height, depth),
        }
    }
}

fn wedge_height(width: f32) -> f32 {
    3.0_f32.sqrt() * width / 2.0
}

fn tapered_prism(bottom_width: f32, top_width: f32, height: f32, depth: f32) -> Mesh {
    let hb = bottom_width / 2.0;
    let ht = top_width / 2.0;
    let hd = depth / 2.0;

    Mesh {
        vertices: vec![
            // Bottom, counter-clockwise from front-left
            Vec3::new(-hb, 0.0, hd),
            Vec3::new(hb, 0.0, hd),
            Vec3::new(hb, 0.0, -hd),
            Vec3::new(-hb, 0.0, -hd),
            // Top, counter-clockwise from front-left
            Vec3::new(-ht, height, hd),
            Vec3::new(ht, height, hd),
            Vec3::new(ht, height, -hd),
            Vec3::new(-ht, height, -hd),
        ],
        // Side walls only; the ends are never seen from outside
        faces: vec![
            // Front
            [0, 1, 5],
            [0, 5, 4],
            // Left
            [0, 4, 3],
            [4, 7, 3],
            // Back
            [2, 3, 7],
            [2, 7, 6],
            // Right
            [1, 2, 6],
            [1, 6, 5],
        ],
    }
}

//               5
//            .-o
//       4 .-'   \  back
//        o       o
// front / \   .-' 2
//      o---o-'
//     0     1
fn wedge(width: f32, depth: f32, direction: Option<Side>) -> Mesh {
    let hw = width / 2.0;
    let hd = depth / 2.0;
    let height = wedge_height(width);

    let mut faces = vec![
        // Front
        [0, 1, 4],
        // Back
        [2, 3, 5],
    ];
    match direction {
        // A left-only joint exposes its right wall
        Some(Side::Left) => faces.extend([[1, 2, 5], [1, 5, 4]]),
        Some(Side::Right) => faces.extend([[0, 4, 3], [4, 5, 3]]),
        None => {}
    }

    Mesh {
        vertices: vec![
            Vec3::new(-hw, 0.0, hd),
            Vec3::new(hw, 0.0, hd),
            Vec3::new(hw, 0.0, -hd),
            Vec3::new(-hw, 0.0, -hd),
            // Apex ridge, front to back
            Vec3::new(0.0, height, hd),
            Vec3::new(0.0, height, -hd),
        ],
        faces,
    }
}

fn pyramid_cap(width: f32, height: f32, depth: f32) -> Mesh {
    let hw = width / 2.0;
    let hd = depth / 2.0;

    Mesh {
        vertices: vec![
            Vec3::new(-hw, 0.0, hd),
            Vec3::new(hw, 0.0, hd),
            Vec3::new(hw, 0.0, -hd),
            Vec3::new(-hw, 0.0, -hd),
            Vec3::new(0.0, height, 0.0),
        ],
        faces: vec![[0, 1, 4], [1, 2, 4], [2, 3, 4], [3, 0, 4]],
    }
}
