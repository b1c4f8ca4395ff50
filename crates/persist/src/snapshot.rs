use crate::layout::AreaFile;
use realm_common::{EntityId, IdAllocator};
use realm_kernel::{World, WorldRegistry};
use realm_script::ObjectTypeRegistry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub name: String,
    pub areas: Vec<AreaFile>,
}

/// Point-in-time copy of every loaded world.
///
/// Behaviors are not captured; they are re-resolved from the object type
/// registry on restore, which also re-runs each object's `create` hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Simulation tick at capture time.
    pub tick: u64,
    pub worlds: Vec<WorldSnapshot>,
}

impl RegistrySnapshot {
    pub fn capture(registry: &WorldRegistry, tick: u64) -> Self {
        let worlds = registry
            .iter()
            .map(|world| WorldSnapshot {
                name: world.name().to_string(),
                areas: world.areas().map(|(_, area)| AreaFile::capture(area)).collect(),
            })
            .collect();
        Self { tick, worlds }
    }

    pub fn entity_count(&self) -> usize {
        self.worlds
            .iter()
            .flat_map(|w| &w.areas)
            .map(|a| a.entities.len())
            .sum()
    }

    /// Drop entities that should not survive a restore, such as players
    /// bound to live connections.
    pub fn retain_entities(&mut self, mut keep: impl FnMut(EntityId) -> bool) {
        for area in self.worlds.iter_mut().flat_map(|w| w.areas.iter_mut()) {
            area.entities.retain(|e| e.id.is_none_or(|id| keep(EntityId(id))));
        }
    }

    /// Rebuild a registry. Areas that fail to rebuild are logged and skipped.
    pub fn restore(&self, types: &ObjectTypeRegistry, ids: &IdAllocator) -> WorldRegistry {
        let mut registry = WorldRegistry::new();
        for snap in &self.worlds {
            let mut world = World::new(&snap.name);
            for area in &snap.areas {
                if let Err(err) = area.build(&mut world, types, ids, self.tick) {
                    tracing::error!(world = %snap.name, area = %area.name, error = %err, "area not restored");
                }
            }
            if let Err(err) = registry.add(world) {
                tracing::error!(error = %err, "world not restored");
            }
        }
        registry
    }
}
