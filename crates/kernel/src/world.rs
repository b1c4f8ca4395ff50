use crate::area::Area;
use crate::entity::Entity;
use crate::error::{KernelError, KernelResult};
use crate::hooks::{self, Behavior, Hook, HookContext, HookSubject};
use crate::object::WorldObject;
use realm_common::{EntityId, ObjectId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Arena key of an area inside its world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AreaId(pub u32);

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "area#{}", self.0)
    }
}

/// A named world: an arena of areas plus lookup indexes.
///
/// Areas are keyed by [`AreaId`] (BTreeMap, so iteration order is the order
/// areas were added). Entities and objects are owned by exactly one area;
/// the world only stores which area that is, as a lookup key.
pub struct World {
    name: String,
    pub(crate) areas: BTreeMap<AreaId, Area>,
    area_names: HashMap<String, AreaId>,
    entity_index: HashMap<EntityId, AreaId>,
    object_index: HashMap<ObjectId, AreaId>,
    next_area: u32,
    behavior: Option<Arc<dyn Behavior>>,
}

impl World {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            areas: BTreeMap::new(),
            area_names: HashMap::new(),
            entity_index: HashMap::new(),
            object_index: HashMap::new(),
            next_area: 0,
            behavior: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// World-level behavior, ticked once per tick before entities and objects.
    pub fn set_behavior(&mut self, behavior: Option<Arc<dyn Behavior>>) {
        self.behavior = behavior;
    }

    pub fn behavior(&self) -> Option<Arc<dyn Behavior>> {
        self.behavior.clone()
    }

    /// Add an area, indexing any entities and objects it already holds.
    pub fn add_area(&mut self, area: Area) -> KernelResult<AreaId> {
        if self.area_names.contains_key(area.name()) {
            return Err(KernelError::DuplicateArea(area.name().to_string()));
        }
        if let Some(id) = area.entities.keys().find(|id| self.entity_index.contains_key(*id)) {
            return Err(KernelError::DuplicateEntity(*id));
        }
        if let Some(id) = area.objects.keys().find(|id| self.object_index.contains_key(*id)) {
            return Err(KernelError::DuplicateObject(*id));
        }

        let id = AreaId(self.next_area);
        self.next_area += 1;
        for entity in area.entities.keys() {
            self.entity_index.insert(*entity, id);
        }
        for object in area.objects.keys() {
            self.object_index.insert(*object, id);
        }
        self.area_names.insert(area.name().to_string(), id);
        self.areas.insert(id, area);
        tracing::debug!(world = %self.name, area = %id, "area added");
        Ok(id)
    }

    /// Remove an area together with everything in it.
    pub fn remove_area(&mut self, id: AreaId) -> Option<Area> {
        let area = self.areas.remove(&id)?;
        self.area_names.remove(area.name());
        for entity in area.entities.keys() {
            self.entity_index.remove(entity);
        }
        for object in area.objects.keys() {
            self.object_index.remove(object);
        }
        Some(area)
    }

    pub fn area_id(&self, name: &str) -> Option<AreaId> {
        self.area_names.get(name).copied()
    }

    pub fn area(&self, id: AreaId) -> Option<&Area> {
        self.areas.get(&id)
    }

    pub fn area_mut(&mut self, id: AreaId) -> Option<&mut Area> {
        self.areas.get_mut(&id)
    }

    pub fn area_by_name(&self, name: &str) -> Option<&Area> {
        self.area_id(name).and_then(|id| self.areas.get(&id))
    }

    pub fn areas(&self) -> impl Iterator<Item = (AreaId, &Area)> {
        self.areas.iter().map(|(id, area)| (*id, area))
    }

    pub fn area_ids(&self) -> Vec<AreaId> {
        self.areas.keys().copied().collect()
    }

    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    pub fn spawn_entity(&mut self, area: AreaId, entity: Entity) -> KernelResult<EntityId> {
        let id = entity.id();
        if self.entity_index.contains_key(&id) {
            return Err(KernelError::DuplicateEntity(id));
        }
        let target = self.areas.get_mut(&area).ok_or(KernelError::UnknownArea(area))?;
        target.entities.insert(id, entity);
        self.entity_index.insert(id, area);
        tracing::debug!(world = %self.name, %area, entity = %id, "entity spawned");
        Ok(id)
    }

    pub fn despawn_entity(&mut self, id: EntityId) -> Option<Entity> {
        let area = self.entity_index.remove(&id)?;
        self.areas.get_mut(&area)?.entities.remove(&id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        let area = self.entity_index.get(&id)?;
        self.areas.get(area)?.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let area = self.entity_index.get(&id)?;
        self.areas.get_mut(area)?.entities.get_mut(&id)
    }

    pub fn entity_area(&self, id: EntityId) -> Option<AreaId> {
        self.entity_index.get(&id).copied()
    }

    pub fn entity_count(&self) -> usize {
        self.entity_index.len()
    }

    /// Place an object, running its `create` hook first.
    pub fn place_object(&mut self, area: AreaId, mut object: WorldObject, tick: u64) -> KernelResult<ObjectId> {
        let id = object.id();
        if self.object_index.contains_key(&id) {
            return Err(KernelError::DuplicateObject(id));
        }
        let target = self.areas.get_mut(&area).ok_or(KernelError::UnknownArea(area))?;
        if let Some(behavior) = object.behavior().cloned() {
            let mut ctx = HookContext::new(
                tick,
                HookSubject::Object {
                    area: &target.name,
                    object: &mut object,
                },
            );
            hooks::dispatch(behavior.as_ref(), Hook::Create, &mut ctx);
        }
        target.objects.insert(id, object);
        self.object_index.insert(id, area);
        Ok(id)
    }

    pub fn remove_object(&mut self, id: ObjectId) -> Option<WorldObject> {
        let area = self.object_index.remove(&id)?;
        self.areas.get_mut(&area)?.objects.remove(&id)
    }

    pub fn object(&self, id: ObjectId) -> Option<&WorldObject> {
        let area = self.object_index.get(&id)?;
        self.areas.get(area)?.objects.get(&id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut WorldObject> {
        let area = self.object_index.get(&id)?;
        self.areas.get_mut(area)?.objects.get_mut(&id)
    }

    pub fn object_area(&self, id: ObjectId) -> Option<AreaId> {
        self.object_index.get(&id).copied()
    }

    pub fn object_count(&self) -> usize {
        self.object_index.len()
    }

    /// Move an entity to another area: remove from the source first, then
    /// insert into the destination.
    pub(crate) fn transfer_entity(&mut self, id: EntityId, to: AreaId) -> KernelResult<()> {
        if !self.areas.contains_key(&to) {
            return Err(KernelError::UnknownArea(to));
        }
        let from = self.entity_index.get(&id).copied().ok_or(KernelError::UnknownEntity(id))?;
        if from == to {
            return Ok(());
        }
        let entity = self
            .areas
            .get_mut(&from)
            .and_then(|a| a.entities.remove(&id))
            .ok_or(KernelError::UnknownEntity(id))?;
        if let Some(dest) = self.areas.get_mut(&to) {
            dest.entities.insert(id, entity);
        }
        self.entity_index.insert(id, to);
        tracing::debug!(world = %self.name, entity = %id, %from, %to, "entity changed area");
        Ok(())
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("name", &self.name)
            .field("areas", &self.areas)
            .field("has_behavior", &self.behavior.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::TileGrid;
    use crate::hooks::HookResult;
    use realm_common::IVec2;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn world_with_two_areas() -> (World, AreaId, AreaId) {
        let mut w = World::new("default");
        let a = w.add_area(Area::new("a", TileGrid::new(4, 4).unwrap())).unwrap();
        let b = w.add_area(Area::new("b", TileGrid::new(4, 4).unwrap())).unwrap();
        (w, a, b)
    }

    #[test]
    fn duplicate_area_names_rejected() {
        let (mut w, _, _) = world_with_two_areas();
        let err = w.add_area(Area::new("a", TileGrid::default())).unwrap_err();
        assert!(matches!(err, KernelError::DuplicateArea(name) if name == "a"));
        assert_eq!(w.area_count(), 2);
    }

    #[test]
    fn spawn_and_despawn() {
        let (mut w, a, _) = world_with_two_areas();
        let id = w.spawn_entity(a, Entity::new(EntityId(7), IVec2::ZERO)).unwrap();
        assert_eq!(w.entity_area(id), Some(a));
        assert_eq!(w.entity_count(), 1);
        assert!(w.area(a).unwrap().contains_entity(id));

        assert!(w.despawn_entity(id).is_some());
        assert_eq!(w.entity_count(), 0);
        assert!(w.entity(id).is_none());
    }

    #[test]
    fn spawn_into_unknown_area_fails() {
        let (mut w, _, _) = world_with_two_areas();
        let err = w.spawn_entity(AreaId(99), Entity::new(EntityId(1), IVec2::ZERO));
        assert!(matches!(err, Err(KernelError::UnknownArea(AreaId(99)))));
    }

    #[test]
    fn duplicate_entity_rejected() {
        let (mut w, a, b) = world_with_two_areas();
        w.spawn_entity(a, Entity::new(EntityId(1), IVec2::ZERO)).unwrap();
        assert!(w.spawn_entity(b, Entity::new(EntityId(1), IVec2::ZERO)).is_err());
    }

    #[test]
    fn transfer_keeps_exactly_one_owner() {
        let (mut w, a, b) = world_with_two_areas();
        let id = w.spawn_entity(a, Entity::new(EntityId(1), IVec2::ZERO)).unwrap();
        w.transfer_entity(id, b).unwrap();
        assert!(!w.area(a).unwrap().contains_entity(id));
        assert!(w.area(b).unwrap().contains_entity(id));
        assert_eq!(w.entity_area(id), Some(b));
    }

    #[test]
    fn remove_area_drops_index_entries() {
        let (mut w, a, _) = world_with_two_areas();
        let id = w.spawn_entity(a, Entity::new(EntityId(1), IVec2::ZERO)).unwrap();
        let removed = w.remove_area(a).unwrap();
        assert_eq!(removed.entity_count(), 1);
        assert!(w.entity(id).is_none());
        assert!(w.area_id("a").is_none());
    }

    #[test]
    fn add_area_indexes_prefilled_contents() {
        let mut w = World::new("w");
        let mut area = Area::new("prefilled", TileGrid::default());
        area.entities.insert(EntityId(3), Entity::new(EntityId(3), IVec2::ZERO));
        let id = w.add_area(area).unwrap();
        assert_eq!(w.entity_area(EntityId(3)), Some(id));
    }

    struct CountCreates(AtomicUsize);
    impl Behavior for CountCreates {
        fn create(&self, _ctx: &mut HookContext<'_>) -> HookResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn place_object_runs_create_hook_once() {
        let (mut w, a, _) = world_with_two_areas();
        let counter = Arc::new(CountCreates(AtomicUsize::new(0)));
        let obj = WorldObject::new(ObjectId(1), "chest", IVec2::new(2, 2))
            .with_behavior(Some(counter.clone() as Arc<dyn Behavior>));
        let id = w.place_object(a, obj, 0).unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(w.object_area(id), Some(a));
        assert_eq!(w.object(id).unwrap().type_name(), "chest");
        assert!(w.remove_object(id).is_some());
        assert_eq!(w.object_count(), 0);
    }
}
