use glam::IVec2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a simulated entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// Unique identifier for a placed world object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Process-wide id source shared by the loader, the network glue and any
/// in-simulation spawning. Entity and object ids are drawn from separate
/// counters, both starting at 1.
#[derive(Debug)]
pub struct IdAllocator {
    next_entity: AtomicU64,
    next_object: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next_entity: AtomicU64::new(1),
            next_object: AtomicU64::new(1),
        }
    }

    pub fn next_entity(&self) -> EntityId {
        EntityId(self.next_entity.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_object(&self) -> ObjectId {
        ObjectId(self.next_object.fetch_add(1, Ordering::Relaxed))
    }

    /// Make sure `id` is never handed out, e.g. after restoring saved ids.
    ///
    /// Returns false for `u64::MAX`, which leaves no id after it and is
    /// refused.
    pub fn reserve_entity(&self, id: EntityId) -> bool {
        reserve(&self.next_entity, id.0)
    }

    pub fn reserve_object(&self, id: ObjectId) -> bool {
        reserve(&self.next_object, id.0)
    }
}

fn reserve(counter: &AtomicU64, id: u64) -> bool {
    match id.checked_add(1) {
        Some(next) => {
            counter.fetch_max(next, Ordering::Relaxed);
            true
        }
        None => false,
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Facing direction of an entity, sent verbatim to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit step in world space (y grows downwards).
    pub fn delta(self) -> IVec2 {
        match self {
            Self::Up => IVec2::new(0, -1),
            Self::Down => IVec2::new(0, 1),
            Self::Left => IVec2::new(-1, 0),
            Self::Right => IVec2::new(1, 0),
        }
    }
}

/// Axis-aligned rectangle relative to its owner's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub offset_x: i32,
    pub offset_y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn new(offset_x: i32, offset_y: i32, width: i32, height: i32) -> Self {
        Self {
            offset_x,
            offset_y,
            width,
            height,
        }
    }

    /// Whether the rectangle placed at `origin` contains `point`.
    pub fn contains(&self, origin: IVec2, point: IVec2) -> bool {
        let (left, top, right, bottom) = self.edges(origin);
        let (x, y) = (i64::from(point.x), i64::from(point.y));
        x >= left && x < right && y >= top && y < bottom
    }

    /// Whether this rectangle at `origin` overlaps `other` at `other_origin`.
    pub fn intersects(&self, origin: IVec2, other: &Bounds, other_origin: IVec2) -> bool {
        let (al, at, ar, ab) = self.edges(origin);
        let (bl, bt, br, bb) = other.edges(other_origin);
        al < br && bl < ar && at < bb && bt < ab
    }

    /// Left, top, right and bottom edges, widened so extreme coordinates
    /// cannot overflow.
    fn edges(&self, origin: IVec2) -> (i64, i64, i64, i64) {
        let left = i64::from(origin.x) + i64::from(self.offset_x);
        let top = i64::from(origin.y) + i64::from(self.offset_y);
        (left, top, left + i64::from(self.width), top + i64::from(self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_hands_out_unique_ids() {
        let ids = IdAllocator::new();
        let a = ids.next_entity();
        let b = ids.next_entity();
        assert_ne!(a, b);
        assert_eq!(a, EntityId(1));
        assert_eq!(ids.next_object(), ObjectId(1));
    }

    #[test]
    fn reserved_ids_are_skipped() {
        let ids = IdAllocator::new();
        ids.reserve_entity(EntityId(10));
        assert_eq!(ids.next_entity(), EntityId(11));
        // Reserving below the counter changes nothing.
        ids.reserve_entity(EntityId(2));
        assert_eq!(ids.next_entity(), EntityId(12));
        ids.reserve_object(ObjectId(4));
        assert_eq!(ids.next_object(), ObjectId(5));
    }

    #[test]
    fn last_id_cannot_be_reserved() {
        let ids = IdAllocator::new();
        assert!(!ids.reserve_entity(EntityId(u64::MAX)));
        assert!(!ids.reserve_object(ObjectId(u64::MAX)));
        assert_eq!(ids.next_entity(), EntityId(1));
        assert!(ids.reserve_entity(EntityId(u64::MAX - 1)));
        assert_eq!(ids.next_entity(), EntityId(u64::MAX));
    }

    #[test]
    fn bounds_contains_respects_offset() {
        let b = Bounds::new(-2, -2, 4, 4);
        let origin = IVec2::new(10, 10);
        assert!(b.contains(origin, IVec2::new(8, 8)));
        assert!(b.contains(origin, IVec2::new(11, 11)));
        assert!(!b.contains(origin, IVec2::new(12, 10)));
    }

    #[test]
    fn bounds_intersection() {
        let a = Bounds::new(0, 0, 4, 4);
        let b = Bounds::new(0, 0, 4, 4);
        assert!(a.intersects(IVec2::ZERO, &b, IVec2::new(3, 3)));
        assert!(!a.intersects(IVec2::ZERO, &b, IVec2::new(4, 0)));
    }

    #[test]
    fn bounds_at_coordinate_edge() {
        let b = Bounds::new(0, 0, 16, 16);
        let edge = IVec2::new(i32::MAX, i32::MAX);
        assert!(b.contains(edge, edge));
        assert!(b.intersects(edge, &b, edge));
        assert!(!b.intersects(edge, &b, IVec2::new(i32::MIN, i32::MIN)));
    }

    #[test]
    fn direction_delta() {
        assert_eq!(Direction::Up.delta(), IVec2::new(0, -1));
        assert_eq!(Direction::Right.delta(), IVec2::new(1, 0));
    }
}
