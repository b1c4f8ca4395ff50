use realm_common::{Direction, EntityId};
use realm_kernel::{World, WorldRegistry};
use serde::Serialize;
use std::fmt;

/// Read-only queries against the world registry for operators and the CLI.
pub struct WorldInspector;

impl WorldInspector {
    /// Counts across every loaded world.
    pub fn summary(registry: &WorldRegistry) -> RegistrySummary {
        let worlds: Vec<WorldSummary> = registry.iter().map(Self::world).collect();
        RegistrySummary {
            areas: worlds.iter().map(|w| w.areas.len()).sum(),
            entities: worlds.iter().map(WorldSummary::entity_count).sum(),
            objects: worlds.iter().map(WorldSummary::object_count).sum(),
            worlds,
        }
    }

    pub fn world(world: &World) -> WorldSummary {
        WorldSummary {
            name: world.name().to_string(),
            areas: world
                .areas()
                .map(|(_, area)| AreaSummary {
                    name: area.name().to_string(),
                    rows: area.tiles().rows(),
                    columns: area.tiles().columns(),
                    entities: area.entity_count(),
                    objects: area.object_count(),
                })
                .collect(),
        }
    }

    /// Locate an entity in any world.
    pub fn inspect_entity(registry: &WorldRegistry, id: EntityId) -> Option<EntityInfo> {
        let (world, area, entity) = registry.find_entity(id)?;
        let area_name = world.area(area).map(|a| a.name().to_string()).unwrap_or_default();
        Some(EntityInfo {
            id,
            world: world.name().to_string(),
            area: area_name,
            position: [entity.position().x, entity.position().y],
            speed: [entity.speed().x, entity.speed().y],
            facing: entity.facing(),
        })
    }

    /// Every entity id in `world`, area by area.
    pub fn list_entities(world: &World) -> Vec<EntityId> {
        world.areas().flat_map(|(_, area)| area.entities().map(|e| e.id())).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySummary {
    pub worlds: Vec<WorldSummary>,
    pub areas: usize,
    pub entities: usize,
    pub objects: usize,
}

impl fmt::Display for RegistrySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "worlds={} areas={} entities={} objects={}",
            self.worlds.len(),
            self.areas,
            self.entities,
            self.objects
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldSummary {
    pub name: String,
    pub areas: Vec<AreaSummary>,
}

impl WorldSummary {
    pub fn entity_count(&self) -> usize {
        self.areas.iter().map(|a| a.entities).sum()
    }

    pub fn object_count(&self) -> usize {
        self.areas.iter().map(|a| a.objects).sum()
    }
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "World '{}': {} area(s)", self.name, self.areas.len())?;
        for area in &self.areas {
            writeln!(
                f,
                "  {} {}x{} entities={} objects={}",
                area.name, area.rows, area.columns, area.entities, area.objects
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaSummary {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub entities: usize,
    pub objects: usize,
}

/// One entity, located.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityInfo {
    pub id: EntityId,
    pub world: String,
    pub area: String,
    pub position: [i32; 2],
    pub speed: [i32; 2],
    pub facing: Direction,
}

impl fmt::Display for EntityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in {}/{} pos=({}, {}) speed=({}, {}) facing={:?}",
            self.id,
            self.world,
            self.area,
            self.position[0],
            self.position[1],
            self.speed[0],
            self.speed[1],
            self.facing
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_common::{IVec2, ObjectId};
    use realm_kernel::{Area, Entity, TileGrid, WorldObject};

    fn registry() -> WorldRegistry {
        let mut world = World::new("default");
        let a = world.add_area(Area::new("a", TileGrid::new(4, 5).unwrap())).unwrap();
        let b = world.add_area(Area::new("b", TileGrid::default())).unwrap();
        world.spawn_entity(a, Entity::new(EntityId(1), IVec2::new(2, 3))).unwrap();
        world
            .spawn_entity(b, Entity::new(EntityId(2), IVec2::ZERO).with_speed(IVec2::new(1, 0)))
            .unwrap();
        world
            .place_object(a, WorldObject::new(ObjectId(1), "tree", IVec2::ZERO), 0)
            .unwrap();
        let mut reg = WorldRegistry::new();
        reg.add(world).unwrap();
        reg.add(World::new("empty")).unwrap();
        reg
    }

    #[test]
    fn summary_counts() {
        let summary = WorldInspector::summary(&registry());
        assert_eq!(summary.worlds.len(), 2);
        assert_eq!(summary.areas, 2);
        assert_eq!(summary.entities, 2);
        assert_eq!(summary.objects, 1);
        assert_eq!(summary.to_string(), "worlds=2 areas=2 entities=2 objects=1");
    }

    #[test]
    fn summary_empty_registry() {
        let summary = WorldInspector::summary(&WorldRegistry::new());
        assert_eq!(summary.entities, 0);
        assert!(summary.worlds.is_empty());
    }

    #[test]
    fn world_display_lists_areas() {
        let reg = registry();
        let text = WorldInspector::world(reg.get("default").unwrap()).to_string();
        assert!(text.contains("World 'default': 2 area(s)"));
        assert!(text.contains("a 4x5 entities=1 objects=1"));
    }

    #[test]
    fn inspect_entity_found() {
        let info = WorldInspector::inspect_entity(&registry(), EntityId(2)).unwrap();
        assert_eq!(info.area, "b");
        assert_eq!(info.speed, [1, 0]);
        assert!(info.to_string().starts_with("entity#2 in default/b"));
    }

    #[test]
    fn inspect_entity_not_found() {
        assert!(WorldInspector::inspect_entity(&registry(), EntityId(99)).is_none());
    }

    #[test]
    fn list_entities() {
        let reg = registry();
        let ids = WorldInspector::list_entities(reg.get("default").unwrap());
        assert_eq!(ids, vec![EntityId(1), EntityId(2)]);
    }

    #[test]
    fn summary_serializes() {
        let json = serde_json::to_value(WorldInspector::summary(&registry())).unwrap();
        assert_eq!(json["worlds"][0]["name"], "default");
    }
}
