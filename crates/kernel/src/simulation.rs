use crate::broadcast::{self, BroadcastSink};
use crate::error::{KernelError, KernelResult};
use crate::event::{Cancellable, Event, EventBus};
use crate::hooks::{self, Hook, HookContext, HookSubject};
use crate::movement::{self, ArbitrationReport};
use crate::registry::WorldRegistry;
use realm_common::{EntityId, ObjectId};

/// Published before an object's `interact` hook runs. Cancelling it
/// suppresses the hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInteractEvent {
    pub world: String,
    pub area: String,
    pub object: ObjectId,
    pub actor: Option<EntityId>,
    cancelled: bool,
}

impl Event for ObjectInteractEvent {}

impl Cancellable for ObjectInteractEvent {
    fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub arbitration: ArbitrationReport,
    pub hook_failures: usize,
    pub broadcasts: usize,
}

/// The simulation step: owns the world registry and the event bus and is the
/// only writer of world state.
#[derive(Debug, Default)]
pub struct Simulation {
    registry: WorldRegistry,
    bus: EventBus,
    tick: u64,
}

impl Simulation {
    pub fn new(registry: WorldRegistry) -> Self {
        Self {
            registry,
            bus: EventBus::new(),
            tick: 0,
        }
    }

    /// Continue counting from `tick`, e.g. after restoring a snapshot.
    pub fn resume(registry: WorldRegistry, tick: u64) -> Self {
        Self {
            tick,
            ..Self::new(registry)
        }
    }

    pub fn registry(&self) -> &WorldRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut WorldRegistry {
        &mut self.registry
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// Number of completed ticks.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn into_registry(self) -> WorldRegistry {
        self.registry
    }

    /// Advance every world by one tick, sending movement notifications to `sink`.
    pub fn step(&mut self, sink: &mut dyn BroadcastSink) -> TickReport {
        self.tick += 1;
        let tick = self.tick;
        let _span = tracing::debug_span!("tick", tick).entered();
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        for world in self.registry.iter_mut() {
            report.arbitration.merge(movement::arbitrate(world, &mut self.bus));
        }

        for world in self.registry.iter_mut() {
            if let Some(behavior) = world.behavior() {
                let mut ctx = HookContext::new(tick, HookSubject::World(&mut *world));
                if !hooks::dispatch(behavior.as_ref(), Hook::Tick, &mut ctx) {
                    report.hook_failures += 1;
                }
            }

            for area in world.areas.values_mut() {
                let area_name = area.name.as_str();
                for entity in area.entities.values_mut() {
                    entity.integrate();
                    if let Some(behavior) = entity.behavior().cloned() {
                        let mut ctx = HookContext::new(
                            tick,
                            HookSubject::Entity {
                                area: area_name,
                                entity,
                            },
                        );
                        if !hooks::dispatch(behavior.as_ref(), Hook::Tick, &mut ctx) {
                            report.hook_failures += 1;
                        }
                    }
                }
                for object in area.objects.values_mut() {
                    if let Some(behavior) = object.behavior().cloned() {
                        let mut ctx = HookContext::new(
                            tick,
                            HookSubject::Object {
                                area: area_name,
                                object,
                            },
                        );
                        if !hooks::dispatch(behavior.as_ref(), Hook::Tick, &mut ctx) {
                            report.hook_failures += 1;
                        }
                    }
                }
            }

            report.broadcasts += broadcast::gate(world, sink);
        }

        tracing::trace!(?report, "tick complete");
        report
    }

    /// Trigger an object's `interact` hook. Returns `Ok(false)` when a
    /// listener cancelled the interaction. Objects without a behavior, or
    /// whose behavior has no `interact`, succeed silently.
    ///
    /// An `actor` must stand in the object's area and within its interaction
    /// rectangle, otherwise [`KernelError::OutOfReach`] is returned.
    pub fn interact(&mut self, world: &str, object: ObjectId, actor: Option<EntityId>) -> KernelResult<bool> {
        let tick = self.tick;
        let target = self
            .registry
            .get_mut(world)
            .ok_or_else(|| KernelError::UnknownWorld(world.to_string()))?;
        let area_id = target.object_area(object).ok_or(KernelError::UnknownObject(object))?;
        let area = target.areas.get_mut(&area_id).ok_or(KernelError::UnknownArea(area_id))?;

        if let Some(entity) = actor {
            let obj = area.objects.get(&object).ok_or(KernelError::UnknownObject(object))?;
            let reachable = area.entities.get(&entity).is_some_and(|e| obj.in_reach(e));
            if !reachable {
                return Err(KernelError::OutOfReach { entity, object });
            }
        }

        let mut event = ObjectInteractEvent {
            world: world.to_string(),
            area: area.name.clone(),
            object,
            actor,
            cancelled: false,
        };
        self.bus.publish(&mut event);
        if event.is_cancelled() {
            tracing::debug!(%object, "interaction cancelled");
            return Ok(false);
        }

        let area_name = area.name.as_str();
        let Some(obj) = area.objects.get_mut(&object) else {
            return Err(KernelError::UnknownObject(object));
        };
        if let Some(behavior) = obj.behavior().cloned() {
            let mut ctx = HookContext::new(
                tick,
                HookSubject::Object {
                    area: area_name,
                    object: obj,
                },
            );
            hooks::dispatch(behavior.as_ref(), Hook::Interact, &mut ctx);
        }
        Ok(true)
    }
}
