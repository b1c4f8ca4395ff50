//! World Kernel: authoritative world state and the simulation tick step.
//!
//! # Invariants
//! - The simulation thread is the only writer of world state.
//! - An entity or object belongs to exactly one area once a tick completes.
//! - Each entity is arbitrated at most once per tick; cancellation wins over
//!   any rewrite carried by the same event.
//! - Behavior hook failures are logged and never abort a tick.
//! - The broadcast gate is the only path from the core to the network.

mod area;
mod broadcast;
mod entity;
mod error;
mod event;
pub mod hooks;
mod movement;
mod object;
mod registry;
mod simulation;
mod world;

pub use area::{Area, MAX_TILE_CELLS, TileGrid};
pub use broadcast::{BroadcastSink, EntityMoved, gate, should_broadcast};
pub use entity::{Entity, MoveFlags};
pub use error::{KernelError, KernelResult};
pub use event::{Cancellable, Event, EventBus, ListenerId};
pub use hooks::{Behavior, Hook, HookContext, HookError, HookResult, HookSubject};
pub use movement::{ArbitrationReport, MoveEvent, arbitrate};
pub use object::WorldObject;
pub use registry::WorldRegistry;
pub use simulation::{ObjectInteractEvent, Simulation, TickReport};
pub use world::{AreaId, World};
