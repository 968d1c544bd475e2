//! Geometry used by the culling passes

pub mod aabb;
pub mod frustum;

pub use aabb::Aabb;
pub use frustum::{Plane, Frustum};
