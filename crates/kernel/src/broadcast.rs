use crate::entity::{Entity, MoveFlags};
use crate::world::World;
use realm_common::{Direction, EntityId};
use serde::{Deserialize, Serialize};

/// Movement notification sent to every connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMoved {
    pub entity_id: EntityId,
    pub facing_direction: Direction,
    pub area_name: String,
    pub x: i32,
    pub y: i32,
    pub horizontal_speed: i32,
    pub vertical_speed: i32,
}

impl EntityMoved {
    pub fn from_entity(area_name: &str, entity: &Entity) -> Self {
        Self {
            entity_id: entity.id(),
            facing_direction: entity.facing(),
            area_name: area_name.to_string(),
            x: entity.position().x,
            y: entity.position().y,
            horizontal_speed: entity.speed().x,
            vertical_speed: entity.speed().y,
        }
    }
}

/// Consumer of gate output. Implementations must not block.
pub trait BroadcastSink {
    fn broadcast(&mut self, message: EntityMoved);
}

impl BroadcastSink for Vec<EntityMoved> {
    fn broadcast(&mut self, message: EntityMoved) {
        self.push(message);
    }
}

pub fn should_broadcast(flags: MoveFlags) -> bool {
    flags.any()
}

/// Emit one message per flagged entity of `world`, then clear every flag so
/// the next tick starts clean. Returns the number of messages emitted.
pub fn gate(world: &mut World, sink: &mut dyn BroadcastSink) -> usize {
    let mut sent = 0;
    for area in world.areas.values_mut() {
        for entity in area.entities.values_mut() {
            if should_broadcast(entity.flags) {
                sink.broadcast(EntityMoved::from_entity(&area.name, entity));
                sent += 1;
            }
            entity.flags.clear();
        }
    }
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::{Area, TileGrid};
    use realm_common::IVec2;

    #[test]
    fn only_flagged_entities_are_sent() {
        let mut w = World::new("w");
        let a = w.add_area(Area::new("field", TileGrid::default())).unwrap();
        w.spawn_entity(a, Entity::new(EntityId(1), IVec2::ZERO)).unwrap();
        w.spawn_entity(a, Entity::new(EntityId(2), IVec2::new(3, 4))).unwrap();
        w.entity_mut(EntityId(2)).unwrap().force_update();

        let mut out = Vec::new();
        assert_eq!(gate(&mut w, &mut out), 1);
        assert_eq!(out[0].entity_id, EntityId(2));
        assert_eq!(out[0].area_name, "field");
        assert_eq!((out[0].x, out[0].y), (3, 4));

        // Flags were consumed.
        out.clear();
        assert_eq!(gate(&mut w, &mut out), 0);
    }

    #[test]
    fn wire_names_are_camel_case() {
        let msg = EntityMoved {
            entity_id: EntityId(4),
            facing_direction: Direction::Left,
            area_name: "default".into(),
            x: 1,
            y: -2,
            horizontal_speed: 3,
            vertical_speed: 0,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["entityId"], 4);
        assert_eq!(json["facingDirection"], "left");
        assert_eq!(json["areaName"], "default");
        assert_eq!(json["horizontalSpeed"], 3);
    }
}
