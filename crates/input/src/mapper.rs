use crate::intent::{Control, Intent};
use realm_common::{EntityId, IVec2};
use realm_kernel::WorldRegistry;
use std::collections::HashMap;

/// Speed applied per held control when none is configured.
pub const DEFAULT_WALK_SPEED: i32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("no loaded world holds {0}")]
    UnknownEntity(EntityId),
}

/// Turns held controls into entity speed and facing.
///
/// Speed is `walk_speed × (right − left, down − up)` over the held set, and
/// facing follows the most recently pressed control still held.
#[derive(Debug)]
pub struct InputMapper {
    walk_speed: i32,
    held: HashMap<EntityId, Vec<Control>>,
}

impl Default for InputMapper {
    fn default() -> Self {
        Self::new(DEFAULT_WALK_SPEED)
    }
}

impl InputMapper {
    pub fn new(walk_speed: i32) -> Self {
        Self {
            walk_speed,
            held: HashMap::new(),
        }
    }

    pub fn walk_speed(&self) -> i32 {
        self.walk_speed
    }

    pub fn held(&self, entity: EntityId) -> &[Control] {
        self.held.get(&entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Apply one intent. Entity flags are raised by the kernel setters only
    /// when speed or facing actually change.
    pub fn apply(&mut self, registry: &mut WorldRegistry, intent: Intent) -> Result<(), InputError> {
        let id = intent.entity();
        if let Intent::Reset { .. } = intent {
            self.forget(id);
            return Ok(());
        }
        let entity = registry.find_entity_mut(id).ok_or(InputError::UnknownEntity(id))?;

        match intent {
            Intent::ControlPressed { control, .. } => {
                let held = self.held.entry(id).or_default();
                held.retain(|c| *c != control);
                held.push(control);
                entity.set_speed(self.speed_for(id));
                entity.set_facing(control.direction());
            }
            Intent::ControlReleased { control, .. } => {
                if let Some(held) = self.held.get_mut(&id) {
                    held.retain(|c| *c != control);
                }
                entity.set_speed(self.speed_for(id));
                if let Some(last) = self.held(id).last() {
                    entity.set_facing(last.direction());
                }
            }
            Intent::SetSpeed { speed, .. } => entity.set_speed(speed),
            Intent::Face { facing, .. } => entity.set_facing(facing),
            Intent::Reset { .. } => {}
        }
        Ok(())
    }

    /// Drop the held controls of `entity`, e.g. once its player left.
    pub fn forget(&mut self, entity: EntityId) {
        self.held.remove(&entity);
    }

    /// Apply a batch, logging intents for entities that no longer exist.
    pub fn apply_all(&mut self, registry: &mut WorldRegistry, intents: impl IntoIterator<Item = Intent>) -> usize {
        let mut applied = 0;
        for intent in intents {
            match self.apply(registry, intent) {
                Ok(()) => applied += 1,
                Err(err) => tracing::debug!(error = %err, "intent dropped"),
            }
        }
        applied
    }

    fn speed_for(&self, id: EntityId) -> IVec2 {
        let axis = self.held(id).iter().fold(IVec2::ZERO, |acc, c| acc + c.direction().delta());
        // Opposite controls cancel out; a single axis never exceeds one step.
        axis.clamp(IVec2::splat(-1), IVec2::splat(1)) * self.walk_speed
    }
}
