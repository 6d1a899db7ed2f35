//! Procedural tree geometry
//!
//! Shapes are plain data; the builder assembles them into a skinned mesh
//! with its bone hierarchy. Nothing here depends on the simulation.

pub mod shape;
pub mod skeleton;
pub mod tree;

pub use shape::{Anchor, Mesh, Shape, Side};
pub use skeleton::{Bone, BonePose, Skeleton, SkeletonError, SkinBinding};
pub use tree::{Frame, SkinnedVertex, TreeModel, TreeParams, WedgeJoint, build_tree};
