use crate::entity::Entity;
use crate::error::{KernelError, KernelResult};
use crate::world::{AreaId, World};
use realm_common::EntityId;
use std::collections::BTreeMap;

/// All loaded worlds, keyed by name.
///
/// Owned by whoever drives the simulation; populated at startup and changed
/// only through `add`/`remove`, never while a tick is running.
#[derive(Debug, Default)]
pub struct WorldRegistry {
    worlds: BTreeMap<String, World>,
}

impl WorldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, world: World) -> KernelResult<()> {
        if self.worlds.contains_key(world.name()) {
            return Err(KernelError::DuplicateWorld(world.name().to_string()));
        }
        tracing::info!(world = %world.name(), areas = world.area_count(), "world loaded");
        self.worlds.insert(world.name().to_string(), world);
        Ok(())
    }

    /// Explicit unload.
    pub fn remove(&mut self, name: &str) -> Option<World> {
        let world = self.worlds.remove(name)?;
        tracing::info!(world = %name, "world unloaded");
        Some(world)
    }

    pub fn get(&self, name: &str) -> Option<&World> {
        self.worlds.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut World> {
        self.worlds.get_mut(name)
    }

    pub fn world_mut(&mut self, name: &str) -> KernelResult<&mut World> {
        self.worlds
            .get_mut(name)
            .ok_or_else(|| KernelError::UnknownWorld(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &World> {
        self.worlds.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut World> {
        self.worlds.values_mut()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.worlds.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.worlds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }

    /// Locate an entity across all worlds.
    pub fn find_entity(&self, id: EntityId) -> Option<(&World, AreaId, &Entity)> {
        self.worlds.values().find_map(|w| {
            let area = w.entity_area(id)?;
            Some((w, area, w.entity(id)?))
        })
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.worlds.values_mut().find_map(|w| w.entity_mut(id))
    }

    /// Remove an entity from whichever world holds it.
    pub fn despawn(&mut self, id: EntityId) -> Option<Entity> {
        self.worlds.values_mut().find_map(|w| w.despawn_entity(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::{Area, TileGrid};
    use realm_common::IVec2;

    #[test]
    fn duplicate_world_rejected() {
        let mut reg = WorldRegistry::new();
        reg.add(World::new("default")).unwrap();
        assert!(matches!(
            reg.add(World::new("default")),
            Err(KernelError::DuplicateWorld(_))
        ));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn remove_unloads() {
        let mut reg = WorldRegistry::new();
        reg.add(World::new("a")).unwrap();
        reg.add(World::new("b")).unwrap();
        assert!(reg.remove("a").is_some());
        assert!(reg.remove("a").is_none());
        assert_eq!(reg.names().collect::<Vec<_>>(), ["b"]);
        assert!(matches!(reg.world_mut("a"), Err(KernelError::UnknownWorld(_))));
    }

    #[test]
    fn find_and_despawn_across_worlds() {
        let mut reg = WorldRegistry::new();
        let mut w = World::new("second");
        let area = w.add_area(Area::new("a", TileGrid::default())).unwrap();
        w.spawn_entity(area, Entity::new(EntityId(5), IVec2::ZERO)).unwrap();
        reg.add(World::new("first")).unwrap();
        reg.add(w).unwrap();

        let (world, found_area, _) = reg.find_entity(EntityId(5)).unwrap();
        assert_eq!(world.name(), "second");
        assert_eq!(found_area, area);
        assert!(reg.find_entity_mut(EntityId(5)).is_some());
        assert!(reg.despawn(EntityId(5)).is_some());
        assert!(reg.find_entity(EntityId(5)).is_none());
    }
}
