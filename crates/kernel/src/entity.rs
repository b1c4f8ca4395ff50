use crate::hooks::Behavior;
use realm_common::{Bounds, Direction, EntityId, IVec2};
use std::fmt;
use std::sync::Arc;

/// Per-tick change flags consumed by the broadcast gate.
///
/// Each tick starts with all flags clear; they are raised by intents applied
/// before the tick, by arbitration, or by behavior hooks, and cleared again
/// once the gate has looked at them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveFlags {
    pub speed_changed: bool,
    pub movement_cancelled: bool,
    pub force_update: bool,
}

impl MoveFlags {
    pub fn any(&self) -> bool {
        self.speed_changed || self.movement_cancelled || self.force_update
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A movable, simulated actor.
#[derive(Clone)]
pub struct Entity {
    id: EntityId,
    pub(crate) position: IVec2,
    speed: IVec2,
    facing: Direction,
    bounds: Bounds,
    pub(crate) flags: MoveFlags,
    behavior: Option<Arc<dyn Behavior>>,
}

impl Entity {
    pub fn new(id: EntityId, position: IVec2) -> Self {
        Self {
            id,
            position,
            speed: IVec2::ZERO,
            facing: Direction::default(),
            bounds: Bounds::default(),
            flags: MoveFlags::default(),
            behavior: None,
        }
    }

    /// Initial speed; unlike [`Entity::set_speed`] this does not raise `speed_changed`.
    pub fn with_speed(mut self, speed: IVec2) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_facing(mut self, facing: Direction) -> Self {
        self.facing = facing;
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_behavior(mut self, behavior: Arc<dyn Behavior>) -> Self {
        self.behavior = Some(behavior);
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn position(&self) -> IVec2 {
        self.position
    }

    pub fn speed(&self) -> IVec2 {
        self.speed
    }

    pub fn facing(&self) -> Direction {
        self.facing
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn flags(&self) -> MoveFlags {
        self.flags
    }

    pub fn behavior(&self) -> Option<&Arc<dyn Behavior>> {
        self.behavior.as_ref()
    }

    /// Teleport without raising any flag. Use [`Entity::force_update`] when
    /// clients must learn about it.
    pub fn set_position(&mut self, position: IVec2) {
        self.position = position;
    }

    pub fn set_speed(&mut self, speed: IVec2) {
        if self.speed != speed {
            self.speed = speed;
            self.flags.speed_changed = true;
        }
    }

    pub fn set_facing(&mut self, facing: Direction) {
        if self.facing != facing {
            self.facing = facing;
            self.flags.speed_changed = true;
        }
    }

    pub fn force_update(&mut self) {
        self.flags.force_update = true;
    }

    /// Built-in per-tick logic: apply the speed unless this tick's move was cancelled.
    pub(crate) fn integrate(&mut self) {
        if !self.flags.movement_cancelled {
            self.position = self.position.wrapping_add(self.speed);
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("speed", &self.speed)
            .field("facing", &self.facing)
            .field("bounds", &self.bounds)
            .field("flags", &self.flags)
            .field("has_behavior", &self.behavior.is_some())
            .finish()
    }
}
