//! Movement arbitration.
//!
//! Every entity proposes `position + speed` once per tick. The proposal is
//! published as a [`MoveEvent`]; listeners may cancel it, redirect it to
//! another area or rewrite the resolved position. The arbitrator reads only
//! the event's terminal state.
//!
//! Coordinate arithmetic wraps at the `i32` edges.

use crate::event::{Cancellable, Event, EventBus};
use crate::world::{AreaId, World};
use realm_common::{EntityId, IVec2};

/// Proposal for one entity's movement during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveEvent {
    entity: EntityId,
    source_area: AreaId,
    origin: IVec2,
    speed: IVec2,
    proposed: IVec2,
    pub new_area: AreaId,
    pub new_position: IVec2,
    cancelled: bool,
}

impl MoveEvent {
    pub fn new(entity: EntityId, source_area: AreaId, origin: IVec2, speed: IVec2) -> Self {
        let proposed = origin.wrapping_add(speed);
        Self {
            entity,
            source_area,
            origin,
            speed,
            proposed,
            new_area: source_area,
            new_position: proposed,
            cancelled: false,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn source_area(&self) -> AreaId {
        self.source_area
    }

    /// Position before this tick.
    pub fn origin(&self) -> IVec2 {
        self.origin
    }

    pub fn speed(&self) -> IVec2 {
        self.speed
    }

    /// The naive `origin + speed` candidate.
    pub fn proposed(&self) -> IVec2 {
        self.proposed
    }

    pub fn changes_area(&self) -> bool {
        self.new_area != self.source_area
    }
}

impl Event for MoveEvent {}

impl Cancellable for MoveEvent {
    fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }
}

/// Counters for one world's arbitration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArbitrationReport {
    pub evaluated: usize,
    pub cancelled: usize,
    pub corrected: usize,
    pub transferred: usize,
}

impl ArbitrationReport {
    pub fn merge(&mut self, other: ArbitrationReport) {
        self.evaluated += other.evaluated;
        self.cancelled += other.cancelled;
        self.corrected += other.corrected;
        self.transferred += other.transferred;
    }
}

/// Arbitrate every entity of `world` once.
///
/// Transfers are collected during the scan and applied after all areas of
/// the world were visited, so an entity moved into a later area is not
/// arbitrated twice in the same tick.
pub fn arbitrate(world: &mut World, bus: &mut EventBus) -> ArbitrationReport {
    let mut report = ArbitrationReport::default();
    let mut transfers: Vec<(EntityId, AreaId)> = Vec::new();

    for (area_id, area) in world.areas.iter_mut() {
        for entity in area.entities.values_mut() {
            report.evaluated += 1;
            let mut event = MoveEvent::new(entity.id(), *area_id, entity.position, entity.speed());
            bus.publish(&mut event);

            if event.is_cancelled() {
                entity.flags.movement_cancelled = true;
                report.cancelled += 1;
                continue;
            }

            if event.changes_area() {
                transfers.push((entity.id(), event.new_area));
            }

            let speed = entity.speed();
            let mut corrected = false;
            if event.new_position.x != event.proposed.x {
                entity.position.x = event.new_position.x.wrapping_sub(speed.x);
                corrected = true;
            }
            if event.new_position.y != event.proposed.y {
                entity.position.y = event.new_position.y.wrapping_sub(speed.y);
                corrected = true;
            }
            if corrected {
                entity.flags.force_update = true;
                report.corrected += 1;
            }
        }
    }

    for (entity, to) in transfers {
        match world.transfer_entity(entity, to) {
            Ok(()) => {
                report.transferred += 1;
                if let Some(moved) = world.entity_mut(entity) {
                    moved.flags.force_update = true;
                }
            }
            Err(err) => {
                tracing::warn!(world = %world.name(), %entity, error = %err, "dropping area transfer");
            }
        }
    }

    report
}
