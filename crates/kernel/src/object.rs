use crate::entity::Entity;
use crate::hooks::Behavior;
use realm_common::{Bounds, IVec2, ObjectId};
use std::fmt;
use std::sync::Arc;

/// A placed, normally static object. Objects take no part in movement
/// arbitration; only their behavior hooks may move them.
#[derive(Clone)]
pub struct WorldObject {
    id: ObjectId,
    type_name: String,
    position: IVec2,
    sprite: Option<String>,
    bounds: Bounds,
    behavior: Option<Arc<dyn Behavior>>,
}

impl WorldObject {
    pub fn new(id: ObjectId, type_name: impl Into<String>, position: IVec2) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            position,
            sprite: None,
            bounds: Bounds::default(),
            behavior: None,
        }
    }

    pub fn with_sprite(mut self, sprite: Option<String>) -> Self {
        self.sprite = sprite;
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_behavior(mut self, behavior: Option<Arc<dyn Behavior>>) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn position(&self) -> IVec2 {
        self.position
    }

    pub fn set_position(&mut self, position: IVec2) {
        self.position = position;
    }

    pub fn sprite(&self) -> Option<&str> {
        self.sprite.as_deref()
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn behavior(&self) -> Option<&Arc<dyn Behavior>> {
        self.behavior.as_ref()
    }

    /// Whether `point` lies inside the interaction rectangle.
    pub fn reaches(&self, point: IVec2) -> bool {
        self.bounds.contains(self.position, point)
    }

    /// Whether `entity` stands close enough to interact: its position lies
    /// inside the interaction rectangle or its bounds overlap it.
    pub fn in_reach(&self, entity: &Entity) -> bool {
        let at = entity.position();
        self.reaches(at) || entity.bounds().intersects(at, &self.bounds, self.position)
    }
}

impl fmt::Debug for WorldObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldObject")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("position", &self.position)
            .field("sprite", &self.sprite)
            .field("bounds", &self.bounds)
            .field("has_behavior", &self.behavior.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_common::EntityId;

    fn sign() -> WorldObject {
        WorldObject::new(ObjectId(1), "sign", IVec2::new(10, 10)).with_bounds(Bounds::new(0, 0, 8, 8))
    }

    #[test]
    fn point_inside_interaction_rectangle() {
        assert!(sign().reaches(IVec2::new(12, 12)));
        assert!(!sign().reaches(IVec2::new(18, 10)));
    }

    #[test]
    fn entity_reach_uses_position_or_bounds() {
        let sign = sign();
        assert!(sign.in_reach(&Entity::new(EntityId(1), IVec2::new(11, 17))));
        assert!(!sign.in_reach(&Entity::new(EntityId(1), IVec2::new(0, 0))));

        let wide = Entity::new(EntityId(2), IVec2::new(4, 4)).with_bounds(Bounds::new(0, 0, 8, 8));
        assert!(sign.in_reach(&wide));
    }
}
