//! Shared types: identifiers, facing directions and bounding rectangles.

mod types;

pub use glam::IVec2;
pub use types::{Bounds, Direction, EntityId, IdAllocator, ObjectId};
